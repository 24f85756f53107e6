//! PMO Standards: the shared reference-data workspace.
//!
//! One tenant-wide workspace named exactly `"PMO Standards"` holds the
//! reference sheets picklist columns source their options from. Sheets are
//! created with fixed value sets on first run and union-merged afterwards —
//! values only ever accumulate, never get replaced, which is also why
//! cross-process races are tolerable. In-process, ensure/update operations
//! are serialized by a mutex so concurrent projects observe committed state.

use crate::error::{MigrationError, Result};
use crate::resilient;
use crate::target::models::*;
use crate::target::traits::SheetStore;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

/// The tenant-wide workspace name.
pub const WORKSPACE_NAME: &str = "PMO Standards";

/// The single column every reference sheet carries.
pub const NAME_COLUMN: &str = "Name";

/// The fixed reference sheets and their first-run value sets.
pub const STANDARD_SHEETS: [(&str, &[&str]); 6] = [
    (
        "Project - Status",
        &["Active", "Planning", "Completed", "On Hold", "Cancelled"],
    ),
    (
        "Project - Priority",
        &["Lowest", "Very Low", "Lower", "Medium", "Higher", "Very High", "Highest"],
    ),
    ("Task - Status", &["Not Started", "In Progress", "Complete"]),
    (
        "Task - Priority",
        &["Lowest", "Very Low", "Lower", "Medium", "Higher", "Very High", "Highest"],
    ),
    (
        "Task - Constraint Type",
        &["ASAP", "ALAP", "SNET", "SNLT", "FNET", "FNLT", "MSO", "MFO"],
    ),
    ("Resource - Type", &["Work", "Material", "Cost"]),
];

/// Namespaced sheet name for a discovered lookup, e.g. `Task - Department`.
pub fn lookup_sheet_name(entity_kind: &str, label: &str) -> String {
    format!("{entity_kind} - {label}")
}

/// Manages the PMO Standards workspace and exposes reference-sheet
/// `(sheet_id, column_id)` pairs to picklist consumers.
pub struct StandardsManager {
    store: Arc<dyn SheetStore>,
    /// Adopt this workspace instead of finding/creating by name.
    workspace_id_override: Option<u64>,
    /// Serializes every ensure/update across concurrent projects.
    ensure_lock: Mutex<()>,
    workspace: RwLock<Option<Workspace>>,
    refs: RwLock<HashMap<String, SourceSheetRef>>,
}

impl StandardsManager {
    pub fn new(store: Arc<dyn SheetStore>, workspace_id_override: Option<u64>) -> Self {
        Self {
            store,
            workspace_id_override,
            ensure_lock: Mutex::new(()),
            workspace: RwLock::new(None),
            refs: RwLock::new(HashMap::new()),
        }
    }

    /// Ensure the workspace and the six standard sheets exist, union-merging
    /// value sets. Idempotent; call once per run (further calls are cheap).
    pub async fn ensure(&self) -> Result<Workspace> {
        let _guard = self.ensure_lock.lock().await;

        if let Some(ws) = self.workspace.read().await.clone() {
            return Ok(ws);
        }

        let workspace = match self.workspace_id_override {
            Some(id) => {
                tracing::info!(workspace_id = id, "adopting configured PMO Standards workspace");
                self.store.get_workspace(id).await?
            }
            None => resilient::get_or_create_workspace(self.store.as_ref(), WORKSPACE_NAME).await?,
        };
        check_owner_access(&workspace)?;

        for (name, values) in STANDARD_SHEETS {
            let values: Vec<String> = values.iter().map(|v| v.to_string()).collect();
            self.ensure_sheet_inner(workspace.id, name, &values).await?;
        }

        *self.workspace.write().await = Some(workspace.clone());
        Ok(workspace)
    }

    /// Ensure a reference sheet (standard or discovered lookup) exists and
    /// contains at least `values`, returning its picklist source ref.
    pub async fn ensure_reference_sheet(
        &self,
        name: &str,
        values: &[String],
    ) -> Result<SourceSheetRef> {
        let workspace = self.ensure().await?;
        let _guard = self.ensure_lock.lock().await;
        self.ensure_sheet_inner(workspace.id, name, values).await
    }

    /// The cached source ref for a reference sheet, if ensured this run.
    pub async fn reference(&self, name: &str) -> Option<SourceSheetRef> {
        self.refs.read().await.get(name).copied()
    }

    async fn ensure_sheet_inner(
        &self,
        workspace_id: u64,
        name: &str,
        values: &[String],
    ) -> Result<SourceSheetRef> {
        let cached = self.refs.read().await.get(name).copied();
        if let Some(existing) = cached {
            self.union_merge(existing, values).await?;
            return Ok(existing);
        }

        let spec = SheetSpec {
            name: name.to_string(),
            columns: vec![Column::new(NAME_COLUMN, ColumnType::TextNumber).primary()],
        };
        let sheet = resilient::get_or_create_sheet(self.store.as_ref(), workspace_id, &spec).await?;
        let column_id = sheet
            .column_by_title(NAME_COLUMN)
            .and_then(|c| c.id)
            .or_else(|| sheet.primary_column().and_then(|c| c.id))
            .ok_or_else(|| {
                MigrationError::data_for(name, "reference sheet has no usable Name column")
            })?;

        let reference = SourceSheetRef {
            sheet_id: sheet.id,
            column_id,
        };
        self.union_merge_with(&sheet, reference, values).await?;
        self.refs.write().await.insert(name.to_string(), reference);
        Ok(reference)
    }

    async fn union_merge(&self, reference: SourceSheetRef, values: &[String]) -> Result<()> {
        let sheet = self.store.get_sheet(reference.sheet_id).await?;
        self.union_merge_with(&sheet, reference, values).await
    }

    /// Append the values the sheet does not have yet, sorted, preserving
    /// existing rows. Union over time, never replace.
    async fn union_merge_with(
        &self,
        sheet: &Sheet,
        reference: SourceSheetRef,
        values: &[String],
    ) -> Result<()> {
        let existing: Vec<&str> = sheet
            .rows
            .iter()
            .filter_map(|r| r.cell(reference.column_id))
            .filter_map(|c| c.value.as_ref())
            .filter_map(|v| v.as_str())
            .collect();

        let mut missing: Vec<&String> = values
            .iter()
            .filter(|v| !v.trim().is_empty() && !existing.contains(&v.as_str()))
            .collect();
        if missing.is_empty() {
            return Ok(());
        }
        missing.sort();
        missing.dedup();

        tracing::debug!(
            sheet = %sheet.name,
            adding = missing.len(),
            "union-merging reference values"
        );
        let rows: Vec<Row> = missing
            .into_iter()
            .map(|v| Row::at_bottom(vec![Cell::text(reference.column_id, v.clone())]))
            .collect();
        self.store.add_rows(reference.sheet_id, &rows).await?;
        Ok(())
    }
}

fn check_owner_access(workspace: &Workspace) -> Result<()> {
    match workspace.access_level.as_deref() {
        Some("OWNER") | None => Ok(()),
        Some(level) => Err(MigrationError::permission(format!(
            "PMO Standards workspace requires owner access, but the token has {level}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::target::mock::MockSheetStore;
    use std::sync::atomic::Ordering;

    fn manager(store: Arc<MockSheetStore>) -> StandardsManager {
        StandardsManager::new(store, None)
    }

    async fn sheet_values(store: &MockSheetStore, name: &str) -> Vec<String> {
        let sheets = store.sheets.read().await;
        let (_, sheet) = sheets.values().find(|(_, s)| s.name == name).unwrap();
        let col = sheet.primary_column().and_then(|c| c.id).unwrap();
        sheet
            .rows
            .iter()
            .filter_map(|r| r.cell(col))
            .filter_map(|c| c.value.as_ref())
            .filter_map(|v| v.as_str())
            .map(String::from)
            .collect()
    }

    #[tokio::test]
    async fn test_first_run_creates_all_standard_sheets() {
        let store = Arc::new(MockSheetStore::new());
        let mgr = manager(store.clone());
        let ws = mgr.ensure().await.unwrap();
        assert_eq!(ws.name, WORKSPACE_NAME);

        for (name, values) in STANDARD_SHEETS {
            let found = sheet_values(&store, name).await;
            for v in values {
                assert!(found.contains(&v.to_string()), "{name} missing {v}");
            }
        }
    }

    #[tokio::test]
    async fn test_union_merge_preserves_and_completes() {
        let store = Arc::new(MockSheetStore::new());
        let wid = store.seed_workspace(WORKSPACE_NAME).await;

        // Pre-existing partial sheet: {Active, Planning}.
        let col = Column::new(NAME_COLUMN, ColumnType::TextNumber).primary();
        let mut sheet = Sheet {
            id: 0,
            name: "Project - Status".into(),
            permalink: None,
            columns: vec![col],
            rows: vec![],
        };
        sheet.rows = vec![];
        let sheet_id = store.seed_sheet(wid, sheet).await;
        let col_id = store.get_sheet(sheet_id).await.unwrap().columns[0].id.unwrap();
        store
            .add_rows(
                sheet_id,
                &[
                    Row::at_bottom(vec![Cell::text(col_id, "Active")]),
                    Row::at_bottom(vec![Cell::text(col_id, "Planning")]),
                ],
            )
            .await
            .unwrap();

        manager(store.clone()).ensure().await.unwrap();

        let values = sheet_values(&store, "Project - Status").await;
        // Existing order preserved, missing appended sorted, no duplicates.
        assert_eq!(
            values,
            vec!["Active", "Planning", "Cancelled", "Completed", "On Hold"]
        );
    }

    #[tokio::test]
    async fn test_second_ensure_changes_nothing() {
        let store = Arc::new(MockSheetStore::new());
        let mgr = manager(store.clone());
        mgr.ensure().await.unwrap();
        let rows_after_first = store.total_rows().await;
        let creates_after_first = store.sheet_create_calls.load(Ordering::SeqCst);

        mgr.ensure().await.unwrap();
        assert_eq!(store.total_rows().await, rows_after_first);
        assert_eq!(
            store.sheet_create_calls.load(Ordering::SeqCst),
            creates_after_first
        );
    }

    #[tokio::test]
    async fn test_discovered_lookup_sheet() {
        let store = Arc::new(MockSheetStore::new());
        let mgr = manager(store.clone());
        let name = lookup_sheet_name("Task", "Department");
        assert_eq!(name, "Task - Department");

        let reference = mgr
            .ensure_reference_sheet(&name, &["Engineering".to_string()])
            .await
            .unwrap();
        assert!(reference.sheet_id > 0);
        let values = sheet_values(&store, "Task - Department").await;
        assert_eq!(values, vec!["Engineering"]);

        // Cached ref returned on a second call; values merge.
        let again = mgr
            .ensure_reference_sheet(&name, &["Marketing".to_string()])
            .await
            .unwrap();
        assert_eq!(again.sheet_id, reference.sheet_id);
        let values = sheet_values(&store, "Task - Department").await;
        assert_eq!(values, vec!["Engineering", "Marketing"]);
    }

    #[tokio::test]
    async fn test_reference_lookup_after_ensure() {
        let store = Arc::new(MockSheetStore::new());
        let mgr = manager(store);
        mgr.ensure().await.unwrap();
        assert!(mgr.reference("Task - Status").await.is_some());
        assert!(mgr.reference("No Such Sheet").await.is_none());
    }

    #[tokio::test]
    async fn test_concurrent_projects_single_create() {
        let store = Arc::new(MockSheetStore::new());
        let mgr = Arc::new(manager(store.clone()));
        let mut handles = Vec::new();
        for _ in 0..4 {
            let mgr = mgr.clone();
            handles.push(tokio::spawn(async move { mgr.ensure().await }));
        }
        for h in handles {
            h.await.unwrap().unwrap();
        }
        assert_eq!(store.workspace_create_calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            store.sheet_create_calls.load(Ordering::SeqCst),
            STANDARD_SHEETS.len() as u64
        );
    }
}
