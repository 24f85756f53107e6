//! Get-or-create primitives over the SheetStore seam.
//!
//! The rerunnability of the whole pipeline rests here: every structural
//! creation passes through one of these, so a partial run resumed later
//! adopts what already exists instead of duplicating it. Post-condition of
//! any get-or-create: the named resource exists and its identity is
//! returned — nothing about its contents is guaranteed.

use crate::error::Result;
use crate::target::models::*;
use crate::target::traits::SheetStore;

/// Adopt the workspace with this exact name, or create it.
pub async fn get_or_create_workspace(store: &dyn SheetStore, name: &str) -> Result<Workspace> {
    let existing = store
        .list_workspaces()
        .await?
        .into_iter()
        .find(|w| w.name == name);
    match existing {
        Some(ws) => {
            tracing::debug!(workspace = name, id = ws.id, "adopting existing workspace");
            Ok(ws)
        }
        None => {
            tracing::info!(workspace = name, "creating workspace");
            store.create_workspace(name).await
        }
    }
}

/// Exact-name sheet lookup among a workspace's children.
pub async fn find_sheet_in_workspace(
    store: &dyn SheetStore,
    workspace_id: u64,
    name: &str,
) -> Result<Option<SheetInfo>> {
    Ok(store
        .get_workspace_sheets(workspace_id)
        .await?
        .into_iter()
        .find(|s| s.name == name))
}

/// Case-insensitive substring sheet lookup. Used against template
/// workspaces whose sheets are not yet renamed.
pub async fn find_sheet_by_partial_name(
    store: &dyn SheetStore,
    workspace_id: u64,
    substring: &str,
) -> Result<Option<SheetInfo>> {
    let needle = substring.to_lowercase();
    Ok(store
        .get_workspace_sheets(workspace_id)
        .await?
        .into_iter()
        .find(|s| s.name.to_lowercase().contains(&needle)))
}

/// Adopt the sheet with this name (fetched in full, column set untouched),
/// or create it with the supplied columns. Reconciling an existing sheet's
/// columns is [`add_columns_if_not_exist`]'s job, not this one's.
pub async fn get_or_create_sheet(
    store: &dyn SheetStore,
    workspace_id: u64,
    spec: &SheetSpec,
) -> Result<Sheet> {
    match find_sheet_in_workspace(store, workspace_id, &spec.name).await? {
        Some(info) => {
            tracing::debug!(sheet = %spec.name, id = info.id, "adopting existing sheet");
            store.get_sheet(info.id).await
        }
        None => {
            tracing::info!(sheet = %spec.name, "creating sheet");
            store.create_sheet_in_workspace(workspace_id, spec).await
        }
    }
}

/// Exact-title column lookup.
pub async fn find_column_in_sheet(
    store: &dyn SheetStore,
    sheet_id: u64,
    title: &str,
) -> Result<Option<Column>> {
    let sheet = store.get_sheet(sheet_id).await?;
    Ok(sheet.columns.into_iter().find(|c| c.title == title))
}

/// Adopt the column with this title, or insert it. A spec with no index
/// lands right after the primary column.
pub async fn get_or_add_column(
    store: &dyn SheetStore,
    sheet_id: u64,
    spec: &Column,
) -> Result<Column> {
    if let Some(existing) = find_column_in_sheet(store, sheet_id, &spec.title).await? {
        return Ok(existing);
    }
    let mut spec = spec.clone();
    if spec.index.is_none() {
        spec.index = Some(1);
    }
    let created = store.add_columns(sheet_id, &[spec]).await?;
    created.into_iter().next().ok_or_else(|| {
        crate::error::MigrationError::data("column add returned an empty result")
    })
}

/// Ensure every spec'd column exists, with exactly one sheet fetch and at
/// most one batch add regardless of input size. Returns the resulting
/// column per spec, in spec order. All newly added columns share the same
/// insertion index (the count of existing columns), per the batch-insert
/// semantics of the target API.
pub async fn add_columns_if_not_exist(
    store: &dyn SheetStore,
    sheet_id: u64,
    specs: &[Column],
) -> Result<Vec<Column>> {
    let sheet = store.get_sheet(sheet_id).await?;

    let missing: Vec<&Column> = specs
        .iter()
        .filter(|spec| sheet.column_by_title(&spec.title).is_none())
        .collect();

    let mut created: Vec<Column> = Vec::new();
    if !missing.is_empty() {
        let insert_at = sheet.columns.len() as i64;
        let batch: Vec<Column> = missing
            .iter()
            .map(|spec| {
                let mut c = (*spec).clone();
                c.index = Some(insert_at);
                c
            })
            .collect();
        tracing::debug!(
            sheet_id,
            adding = batch.len(),
            existing = sheet.columns.len(),
            "adding missing columns in one batch"
        );
        created = store.add_columns(sheet_id, &batch).await?;
    }

    let resolved = specs
        .iter()
        .map(|spec| {
            sheet
                .column_by_title(&spec.title)
                .cloned()
                .or_else(|| created.iter().find(|c| c.title == spec.title).cloned())
                .expect("every spec is either existing or just created")
        })
        .collect();
    Ok(resolved)
}

/// Clear a sheet's data while keeping its structure. Returns rows deleted.
pub async fn delete_all_rows(store: &dyn SheetStore, sheet_id: u64) -> Result<usize> {
    let sheet = store.get_sheet(sheet_id).await?;
    let ids: Vec<u64> = sheet.rows.iter().filter_map(|r| r.id).collect();
    if ids.is_empty() {
        return Ok(0);
    }
    store.delete_rows(sheet_id, &ids).await
}

/// The target API has no workspace-level copy; this degrades to a plain
/// create. Template behavior is sheet-level copy at the pipeline layer.
pub async fn copy_workspace(
    store: &dyn SheetStore,
    _source_workspace_id: u64,
    new_name: &str,
) -> Result<Workspace> {
    get_or_create_workspace(store, new_name).await
}
