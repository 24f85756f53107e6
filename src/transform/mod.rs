//! Pure transformation layer: source entities → target rows and columns.
//!
//! No I/O here beyond reading fully-extracted snapshots — everything is a
//! function of its inputs, which is what keeps the mapping rules testable
//! without a live tenant on either side.

pub mod assignments;
pub mod columns;
pub mod contacts;
pub mod custom_fields;
pub mod dates;
pub mod duration;
pub mod hierarchy;
pub mod predecessors;
pub mod prefix;
pub mod priority;
pub mod resource;
pub mod sanitize;
pub mod summary;
pub mod task;

pub use prefix::project_prefix;
pub use priority::{priority_label, priority_label_or_default};
pub use sanitize::sanitize_name;

use crate::target::models::Sheet;
use std::collections::HashMap;

/// Title → column-id map for one sheet, shared by all row builders.
#[derive(Debug, Clone, Default)]
pub struct ColumnMap {
    ids: HashMap<String, u64>,
}

impl ColumnMap {
    pub fn from_sheet(sheet: &Sheet) -> Self {
        let mut map = Self::default();
        map.merge(&sheet.columns);
        map
    }

    /// Overlay further columns (e.g. a just-created batch) onto the map.
    pub fn merge(&mut self, columns: &[crate::target::models::Column]) {
        for c in columns {
            if let Some(id) = c.id {
                self.ids.insert(c.title.clone(), id);
            }
        }
    }

    pub fn get(&self, title: &str) -> Option<u64> {
        self.ids.get(title).copied()
    }

    pub fn contains(&self, title: &str) -> bool {
        self.ids.contains_key(title)
    }

    /// The raw map, for callers that need to pass it on.
    pub fn as_map(&self) -> &HashMap<String, u64> {
        &self.ids
    }
}
