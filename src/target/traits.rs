//! SheetStore trait definition
//!
//! Abstract interface over the Smartsheet REST surface. Mirrors the public
//! async methods of `SmartsheetClient`, enabling testing with a mock
//! implementation and keeping the loader independent of the HTTP layer.

use crate::error::Result;
use crate::target::models::*;
use async_trait::async_trait;

/// Typed operations against the target sheet platform.
///
/// Batching rule: multi-element creates (`add_columns`, `add_rows`) are ONE
/// request per call; callers never loop single-element adds where a batch is
/// possible.
#[async_trait]
pub trait SheetStore: Send + Sync {
    // ========================================================================
    // Workspaces
    // ========================================================================

    /// List all workspaces visible to the token.
    async fn list_workspaces(&self) -> Result<Vec<Workspace>>;

    /// Get one workspace by id.
    async fn get_workspace(&self, workspace_id: u64) -> Result<Workspace>;

    /// List the sheets directly contained in a workspace.
    async fn get_workspace_sheets(&self, workspace_id: u64) -> Result<Vec<SheetInfo>>;

    /// Create a workspace.
    async fn create_workspace(&self, name: &str) -> Result<Workspace>;

    // ========================================================================
    // Sheets
    // ========================================================================

    /// Fetch a full sheet, columns and rows included.
    async fn get_sheet(&self, sheet_id: u64) -> Result<Sheet>;

    /// Create a sheet inside a workspace.
    async fn create_sheet_in_workspace(
        &self,
        workspace_id: u64,
        spec: &SheetSpec,
    ) -> Result<Sheet>;

    /// Rename a sheet.
    async fn rename_sheet(&self, sheet_id: u64, new_name: &str) -> Result<()>;

    /// Delete rows by id. Returns the number deleted.
    async fn delete_rows(&self, sheet_id: u64, row_ids: &[u64]) -> Result<usize>;

    /// Copy a sheet (structure and data) into a workspace under a new name.
    async fn copy_sheet_to_workspace(
        &self,
        sheet_id: u64,
        workspace_id: u64,
        new_name: &str,
    ) -> Result<Sheet>;

    // ========================================================================
    // Columns
    // ========================================================================

    /// Add one or more columns in a single request. Returns the created
    /// columns with ids assigned.
    async fn add_columns(&self, sheet_id: u64, columns: &[Column]) -> Result<Vec<Column>>;

    /// Update a column in place (options, source ref, validation).
    async fn update_column(&self, sheet_id: u64, column: &Column) -> Result<Column>;

    // ========================================================================
    // Rows
    // ========================================================================

    /// Add rows in a single request. Returns the created rows with ids and
    /// row numbers assigned, in input order.
    async fn add_rows(&self, sheet_id: u64, rows: &[Row]) -> Result<Vec<Row>>;

    /// Update existing rows in a single request.
    async fn update_rows(&self, sheet_id: u64, rows: &[Row]) -> Result<Vec<Row>>;
}
