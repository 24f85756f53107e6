//! In-memory mock implementation of SheetStore for testing.
//!
//! Stores workspaces, sheets, columns, and rows in
//! `tokio::sync::RwLock<HashMap<K, V>>` collections and assigns sequential
//! ids. Call counters back the idempotence and batch-optimization
//! assertions. Conditionally compiled with `#[cfg(test)]`.

use crate::error::{MigrationError, Result};
use crate::target::models::*;
use crate::target::traits::SheetStore;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;

/// In-memory mock implementation of SheetStore for testing.
#[derive(Default)]
pub struct MockSheetStore {
    next_id: AtomicU64,
    pub workspaces: RwLock<HashMap<u64, Workspace>>,
    /// sheet id → (workspace id, sheet)
    pub sheets: RwLock<HashMap<u64, (u64, Sheet)>>,

    // Call counters for observable-behavior assertions.
    pub sheet_get_calls: AtomicU64,
    pub workspace_create_calls: AtomicU64,
    pub sheet_create_calls: AtomicU64,
    pub column_add_calls: AtomicU64,
    pub row_add_calls: AtomicU64,
    pub row_update_calls: AtomicU64,
}

impl MockSheetStore {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1000),
            ..Default::default()
        }
    }

    fn alloc_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }

    /// Seed a workspace directly, bypassing counters.
    pub async fn seed_workspace(&self, name: &str) -> u64 {
        let id = self.alloc_id();
        self.workspaces.write().await.insert(
            id,
            Workspace {
                id,
                name: name.to_string(),
                permalink: None,
                access_level: Some("OWNER".into()),
            },
        );
        id
    }

    /// Seed a sheet with columns and rows directly, bypassing counters.
    pub async fn seed_sheet(&self, workspace_id: u64, mut sheet: Sheet) -> u64 {
        let id = self.alloc_id();
        sheet.id = id;
        for col in sheet.columns.iter_mut() {
            if col.id.is_none() {
                col.id = Some(self.alloc_id());
            }
        }
        for (i, row) in sheet.rows.iter_mut().enumerate() {
            if row.id.is_none() {
                row.id = Some(self.alloc_id());
            }
            row.row_number = Some(i as i64 + 1);
        }
        self.sheets.write().await.insert(id, (workspace_id, sheet));
        id
    }

    /// Total rows across all sheets — convenience for idempotence checks.
    pub async fn total_rows(&self) -> usize {
        self.sheets
            .read()
            .await
            .values()
            .map(|(_, s)| s.rows.len())
            .sum()
    }

    fn missing_sheet(sheet_id: u64) -> MigrationError {
        MigrationError::http_status(404, format!("sheet {} not found", sheet_id))
    }
}

#[async_trait]
impl SheetStore for MockSheetStore {
    async fn list_workspaces(&self) -> Result<Vec<Workspace>> {
        let mut all: Vec<Workspace> = self.workspaces.read().await.values().cloned().collect();
        all.sort_by_key(|w| w.id);
        Ok(all)
    }

    async fn get_workspace(&self, workspace_id: u64) -> Result<Workspace> {
        self.workspaces
            .read()
            .await
            .get(&workspace_id)
            .cloned()
            .ok_or_else(|| {
                MigrationError::http_status(404, format!("workspace {} not found", workspace_id))
            })
    }

    async fn get_workspace_sheets(&self, workspace_id: u64) -> Result<Vec<SheetInfo>> {
        let mut infos: Vec<SheetInfo> = self
            .sheets
            .read()
            .await
            .values()
            .filter(|(wid, _)| *wid == workspace_id)
            .map(|(_, s)| SheetInfo {
                id: s.id,
                name: s.name.clone(),
            })
            .collect();
        infos.sort_by_key(|s| s.id);
        Ok(infos)
    }

    async fn create_workspace(&self, name: &str) -> Result<Workspace> {
        self.workspace_create_calls.fetch_add(1, Ordering::SeqCst);
        let id = self.alloc_id();
        let ws = Workspace {
            id,
            name: name.to_string(),
            permalink: None,
            access_level: Some("OWNER".into()),
        };
        self.workspaces.write().await.insert(id, ws.clone());
        Ok(ws)
    }

    async fn get_sheet(&self, sheet_id: u64) -> Result<Sheet> {
        self.sheet_get_calls.fetch_add(1, Ordering::SeqCst);
        self.sheets
            .read()
            .await
            .get(&sheet_id)
            .map(|(_, s)| s.clone())
            .ok_or_else(|| Self::missing_sheet(sheet_id))
    }

    async fn create_sheet_in_workspace(
        &self,
        workspace_id: u64,
        spec: &SheetSpec,
    ) -> Result<Sheet> {
        self.sheet_create_calls.fetch_add(1, Ordering::SeqCst);
        let id = self.alloc_id();
        let mut columns = spec.columns.clone();
        for (i, col) in columns.iter_mut().enumerate() {
            col.id = Some(self.alloc_id());
            col.index = Some(i as i64);
        }
        let sheet = Sheet {
            id,
            name: spec.name.clone(),
            permalink: None,
            columns,
            rows: Vec::new(),
        };
        self.sheets
            .write()
            .await
            .insert(id, (workspace_id, sheet.clone()));
        Ok(sheet)
    }

    async fn rename_sheet(&self, sheet_id: u64, new_name: &str) -> Result<()> {
        let mut sheets = self.sheets.write().await;
        let (_, sheet) = sheets
            .get_mut(&sheet_id)
            .ok_or_else(|| Self::missing_sheet(sheet_id))?;
        sheet.name = new_name.to_string();
        Ok(())
    }

    async fn delete_rows(&self, sheet_id: u64, row_ids: &[u64]) -> Result<usize> {
        let mut sheets = self.sheets.write().await;
        let (_, sheet) = sheets
            .get_mut(&sheet_id)
            .ok_or_else(|| Self::missing_sheet(sheet_id))?;
        let before = sheet.rows.len();
        sheet.rows.retain(|r| !r.id.is_some_and(|id| row_ids.contains(&id)));
        Ok(before - sheet.rows.len())
    }

    async fn copy_sheet_to_workspace(
        &self,
        sheet_id: u64,
        workspace_id: u64,
        new_name: &str,
    ) -> Result<Sheet> {
        let source = self
            .sheets
            .read()
            .await
            .get(&sheet_id)
            .map(|(_, s)| s.clone())
            .ok_or_else(|| Self::missing_sheet(sheet_id))?;
        let id = self.alloc_id();
        let mut copy = source;
        copy.id = id;
        copy.name = new_name.to_string();
        for col in copy.columns.iter_mut() {
            col.id = Some(self.alloc_id());
        }
        for row in copy.rows.iter_mut() {
            row.id = Some(self.alloc_id());
        }
        self.sheets
            .write()
            .await
            .insert(id, (workspace_id, copy.clone()));
        Ok(copy)
    }

    async fn add_columns(&self, sheet_id: u64, columns: &[Column]) -> Result<Vec<Column>> {
        if columns.is_empty() {
            return Ok(Vec::new());
        }
        self.column_add_calls.fetch_add(1, Ordering::SeqCst);
        let mut sheets = self.sheets.write().await;
        let (_, sheet) = sheets
            .get_mut(&sheet_id)
            .ok_or_else(|| Self::missing_sheet(sheet_id))?;
        let mut created = Vec::with_capacity(columns.len());
        for col in columns {
            let mut col = col.clone();
            col.id = Some(self.alloc_id());
            let at = col
                .index
                .map(|i| (i as usize).min(sheet.columns.len()))
                .unwrap_or(sheet.columns.len());
            sheet.columns.insert(at, col.clone());
            created.push(col);
        }
        for (i, col) in sheet.columns.iter_mut().enumerate() {
            col.index = Some(i as i64);
        }
        Ok(created)
    }

    async fn update_column(&self, sheet_id: u64, column: &Column) -> Result<Column> {
        let mut sheets = self.sheets.write().await;
        let (_, sheet) = sheets
            .get_mut(&sheet_id)
            .ok_or_else(|| Self::missing_sheet(sheet_id))?;
        let slot = sheet
            .columns
            .iter_mut()
            .find(|c| c.id == column.id)
            .ok_or_else(|| {
                MigrationError::http_status(404, format!("column {:?} not found", column.id))
            })?;
        *slot = column.clone();
        Ok(column.clone())
    }

    async fn add_rows(&self, sheet_id: u64, rows: &[Row]) -> Result<Vec<Row>> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }
        self.row_add_calls.fetch_add(1, Ordering::SeqCst);
        let mut sheets = self.sheets.write().await;
        let (_, sheet) = sheets
            .get_mut(&sheet_id)
            .ok_or_else(|| Self::missing_sheet(sheet_id))?;
        let mut created = Vec::with_capacity(rows.len());
        for row in rows {
            let mut row = row.clone();
            row.id = Some(self.alloc_id());
            row.row_number = Some(sheet.rows.len() as i64 + 1);
            sheet.rows.push(row.clone());
            created.push(row);
        }
        Ok(created)
    }

    async fn update_rows(&self, sheet_id: u64, rows: &[Row]) -> Result<Vec<Row>> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }
        self.row_update_calls.fetch_add(1, Ordering::SeqCst);
        let mut sheets = self.sheets.write().await;
        let (_, sheet) = sheets
            .get_mut(&sheet_id)
            .ok_or_else(|| Self::missing_sheet(sheet_id))?;
        let mut updated = Vec::with_capacity(rows.len());
        for row in rows {
            let slot = sheet
                .rows
                .iter_mut()
                .find(|r| r.id == row.id)
                .ok_or_else(|| {
                    MigrationError::http_status(404, format!("row {:?} not found", row.id))
                })?;
            for cell in &row.cells {
                match slot.cells.iter_mut().find(|c| c.column_id == cell.column_id) {
                    Some(existing) => *existing = cell.clone(),
                    None => slot.cells.push(cell.clone()),
                }
            }
            if row.parent_id.is_some() {
                slot.parent_id = row.parent_id;
            }
            updated.push(slot.clone());
        }
        Ok(updated)
    }
}
