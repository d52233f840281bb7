//! Before/after triggers around writes of the current row

use std::sync::Arc;

use async_trait::async_trait;

use crate::model::row::Row;

/// Observes writes of the current row.
///
/// The `*ing` hooks run before the statement and may veto it by returning
/// `false`; `creating` and `updating` may also adjust the row. Bulk updates
/// and bulk deletes do not fire any hook.
#[async_trait]
pub trait RecordObserver: Send + Sync {
    async fn creating(&self, _row: &mut Row) -> bool {
        true
    }

    async fn created(&self, _row: &Row) {}

    async fn updating(&self, _row: &mut Row) -> bool {
        true
    }

    async fn updated(&self, _row: &Row) {}

    async fn deleting(&self, _row: &Row) -> bool {
        true
    }

    async fn deleted(&self, _row: &Row) {}
}

/// Observers of one table, run in registration order
#[derive(Clone, Default)]
pub struct Lifecycle {
    observers: Vec<Arc<dyn RecordObserver>>,
}

impl std::fmt::Debug for Lifecycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Lifecycle")
            .field("observers", &self.observers.len())
            .finish()
    }
}

impl Lifecycle {
    pub fn register(&mut self, observer: Arc<dyn RecordObserver>) {
        self.observers.push(observer);
    }

    pub fn has_observers(&self) -> bool {
        !self.observers.is_empty()
    }

    /// Stops at the first observer that vetoes
    pub async fn trigger_creating(&self, row: &mut Row) -> bool {
        for observer in &self.observers {
            if !observer.creating(row).await {
                return false;
            }
        }
        true
    }

    pub async fn trigger_created(&self, row: &Row) {
        for observer in &self.observers {
            observer.created(row).await;
        }
    }

    pub async fn trigger_updating(&self, row: &mut Row) -> bool {
        for observer in &self.observers {
            if !observer.updating(row).await {
                return false;
            }
        }
        true
    }

    pub async fn trigger_updated(&self, row: &Row) {
        for observer in &self.observers {
            observer.updated(row).await;
        }
    }

    pub async fn trigger_deleting(&self, row: &Row) -> bool {
        for observer in &self.observers {
            if !observer.deleting(row).await {
                return false;
            }
        }
        true
    }

    pub async fn trigger_deleted(&self, row: &Row) {
        for observer in &self.observers {
            observer.deleted(row).await;
        }
    }
}
