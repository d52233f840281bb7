//! Cursor movement over the rows of a record set

use crate::model::record_set::RecordSet;
use crate::model::row::Row;

impl RecordSet {
    /// Row under the cursor
    pub fn current_row(&self) -> Option<&Row> {
        self.rows.get(self.cursor)
    }

    /// Whether the cursor points at a row
    pub fn valid(&self) -> bool {
        self.cursor < self.rows.len()
    }

    /// Index of the current row
    pub fn key(&self) -> Option<usize> {
        self.valid().then_some(self.cursor)
    }

    /// Rewind to the first row and return it
    pub fn first(&mut self) -> Option<&Row> {
        self.cursor = 0;
        self.rows.first()
    }

    /// Return the current row and advance past it
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> Option<&Row> {
        let index = self.cursor;
        if index < self.rows.len() {
            self.cursor += 1;
            self.rows.get(index)
        } else {
            None
        }
    }

    /// Step back one row and return it; stepping back from the first row
    /// leaves the cursor invalid.
    pub fn previous(&mut self) -> Option<&Row> {
        if self.cursor == 0 || self.rows.is_empty() {
            self.cursor = self.rows.len();
            return None;
        }
        self.cursor = self.cursor.min(self.rows.len()) - 1;
        self.rows.get(self.cursor)
    }

    /// Move to the last row and return it
    pub fn last(&mut self) -> Option<&Row> {
        self.cursor = self.rows.len().saturating_sub(1);
        self.rows.last()
    }
}
