//! Database backends
//!
//! The record-set engine talks to the database only through
//! [`SqlExecutor`]; [`Dialect`] covers the few places where SQL text differs
//! between drivers.

pub mod core;
pub mod postgres;

pub use core::{Dialect, ResultRow, SqlExecutor};
pub use postgres::PgExecutor;
