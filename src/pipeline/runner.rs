//! Migration runner: sequences the dependency DAG per project and fans out
//! across projects.
//!
//! Per project the stages are strictly ordered (workspace → sheets →
//! columns → resource rows → task rows → summary → picklist wiring).
//! Across projects, work runs in parallel up to the configured concurrency.
//! Row loads are batched; task batches never split a parent from a child
//! that needs its row id.

use crate::error::{MigrationError, Result};
use crate::pipeline::progress::ProgressSink;
use crate::pipeline::state::*;
use crate::report::{FormulaFieldEntry, FormulaFieldsReport};
use crate::resilient;
use crate::source::client::{QueryOptions, SourceClient};
use crate::source::models::*;
use crate::standards::{lookup_sheet_name, StandardsManager};
use crate::target::models::{Cell, Column, Row, Sheet, SheetSpec, SourceSheetRef};
use crate::target::traits::SheetStore;
use crate::transform::assignments::{assignment_columns, group_by_task, TaskAssignments};
use crate::transform::columns::{resource_columns, summary_columns, task_columns, titles};
use crate::transform::custom_fields::{
    field_label, is_currency, plan_columns, resolve_value, CustomValue, PlannedCustomColumn,
};
use crate::transform::hierarchy::order_tasks;
use crate::transform::predecessors::{format_predecessors, parse_relations};
use crate::transform::resource::resource_row;
use crate::transform::summary::summary_rows;
use crate::transform::task::task_row;
use crate::transform::{project_prefix, sanitize_name, ColumnMap};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// Knobs for one run.
#[derive(Debug, Clone)]
pub struct MigrationOptions {
    pub batch_size: usize,
    pub concurrency: usize,
    pub dry_run: bool,
    pub template_workspace_id: Option<u64>,
}

impl Default for MigrationOptions {
    fn default() -> Self {
        Self {
            batch_size: 100,
            concurrency: 3,
            dry_run: false,
            template_workspace_id: None,
        }
    }
}

/// Drives the migration of one or more projects.
pub struct MigrationRunner {
    ctx: Arc<ProjectContext>,
}

/// Everything a single project's migration needs. Shared immutably across
/// the per-project tasks; per-project mutable state (row-id maps) lives in
/// the stage functions.
struct ProjectContext {
    source: Arc<SourceClient>,
    target: Arc<dyn SheetStore>,
    standards: Arc<StandardsManager>,
    progress: Arc<dyn ProgressSink>,
    report: Arc<FormulaFieldsReport>,
    options: MigrationOptions,
    cancel: CancellationToken,
}

impl MigrationRunner {
    pub fn new(
        source: Arc<SourceClient>,
        target: Arc<dyn SheetStore>,
        standards: Arc<StandardsManager>,
        progress: Arc<dyn ProgressSink>,
        report: Arc<FormulaFieldsReport>,
        options: MigrationOptions,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            ctx: Arc::new(ProjectContext {
                source,
                target,
                standards,
                progress,
                report,
                options,
                cancel,
            }),
        }
    }

    /// Migrate the given projects (all visible projects when the filter is
    /// empty). Setup failures (standards, schema, listing) abort the run;
    /// per-project failures land in the report.
    pub async fn run(&self, project_filter: &[String]) -> Result<MigrationReport> {
        if !self.ctx.options.dry_run {
            self.ctx.standards.ensure().await?;
        }

        let schema = Arc::new(self.ctx.source.get_custom_field_schema().await?);

        let all = self
            .ctx
            .source
            .list_projects(&QueryOptions::default())?
            .collect_all()
            .await?;
        let projects: Vec<Project> = if project_filter.is_empty() {
            all
        } else {
            all.into_iter()
                .filter(|p| project_filter.contains(&p.id) || project_filter.contains(&p.name))
                .collect()
        };
        tracing::info!(count = projects.len(), "starting migration");

        let semaphore = Arc::new(Semaphore::new(self.ctx.options.concurrency.max(1)));
        let mut join_set: JoinSet<ProjectOutcome> = JoinSet::new();
        for project in projects {
            let ctx = self.ctx.clone();
            let schema = schema.clone();
            let semaphore = semaphore.clone();
            join_set.spawn(async move {
                let _permit = semaphore.acquire_owned().await;
                ProjectMigration::new(ctx, schema, project).run().await
            });
        }

        let mut report = MigrationReport::default();
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok(outcome) => report.outcomes.push(outcome),
                Err(err) => tracing::error!(%err, "project task panicked"),
            }
        }

        if let Err(err) = self.ctx.report.write().await {
            tracing::warn!(%err, "failed to write the formula fields report");
        }
        Ok(report)
    }
}

/// One project's migration, with its private row-id maps.
struct ProjectMigration {
    ctx: Arc<ProjectContext>,
    schema: Arc<HashMap<String, Vec<CustomFieldDef>>>,
    project: Project,
    counts: LoadCounts,
    warnings: Vec<String>,
}

/// Extracted snapshot, immutable for the rest of the project's run.
struct Snapshot {
    tasks: Vec<ProjectTask>,
    resources: Vec<Resource>,
    resources_by_id: HashMap<String, Resource>,
    assignments: Vec<Assignment>,
}

/// The prepared target structures.
struct Prepared {
    workspace_id: u64,
    workspace_name: String,
    summary: SheetState,
    tasks: SheetState,
    resources: SheetState,
    task_customs: Vec<PlannedCustomColumn>,
    resource_customs: Vec<PlannedCustomColumn>,
}

/// A sheet plus its resolved column map and pre-existing rows.
struct SheetState {
    sheet: Sheet,
    cols: ColumnMap,
}

impl SheetState {
    /// Map of hidden source-guid → (row id, row number) for rerun matching.
    fn rows_by_source_id(&self) -> HashMap<String, (u64, i64)> {
        let Some(source_col) = self.cols.get(titles::SOURCE_ID) else {
            return HashMap::new();
        };
        self.sheet
            .rows
            .iter()
            .filter_map(|row| {
                let guid = row.cell(source_col)?.value.as_ref()?.as_str()?;
                Some((guid.to_string(), (row.id?, row.row_number.unwrap_or(0))))
            })
            .collect()
    }
}

impl ProjectMigration {
    fn new(
        ctx: Arc<ProjectContext>,
        schema: Arc<HashMap<String, Vec<CustomFieldDef>>>,
        project: Project,
    ) -> Self {
        Self {
            ctx,
            schema,
            project,
            counts: LoadCounts::default(),
            warnings: Vec::new(),
        }
    }

    async fn run(mut self) -> ProjectOutcome {
        let project_id = self.project.id.clone();
        let project_name = self.project.name.clone();
        tracing::info!(project = %project_name, "migrating project");

        let result = self.migrate().await;
        let (stage, error) = match result {
            Ok(()) => (ProjectStage::Done, None),
            Err(MigrationError::Cancelled) => {
                (ProjectStage::Cancelled, Some(MigrationError::Cancelled))
            }
            Err(err) => {
                tracing::error!(project = %project_name, %err, "project migration failed");
                (ProjectStage::Failed, Some(err))
            }
        };
        ProjectOutcome {
            project_id,
            project_name,
            stage,
            counts: self.counts,
            warnings: self.warnings,
            error,
        }
    }

    fn ensure_live(&self) -> Result<()> {
        if self.ctx.cancel.is_cancelled() {
            Err(MigrationError::Cancelled)
        } else {
            Ok(())
        }
    }

    async fn publish(&self, stage: ProjectStage, completed: u64, total: u64) {
        self.ctx
            .progress
            .publish(stage.as_str(), completed, total, Some(&self.project.name))
            .await;
    }

    async fn migrate(&mut self) -> Result<()> {
        let snapshot = self.extract().await?;

        if self.ctx.options.dry_run {
            return self.dry_run_summary(&snapshot);
        }

        let prepared = self.prepare(&snapshot).await?;
        self.load_resources(&snapshot, &prepared).await?;
        self.load_tasks(&snapshot, &prepared).await?;
        self.load_summary(&prepared).await?;
        self.configure_picklists(&snapshot, &prepared).await?;

        self.publish(ProjectStage::Done, 1, 1).await;
        Ok(())
    }

    // ========================================================================
    // Stage: Extracting
    // ========================================================================

    async fn extract(&mut self) -> Result<Snapshot> {
        self.ensure_live()?;
        self.publish(ProjectStage::Extracting, 0, 3).await;
        let pid = self.project.id.clone();

        let tasks = self
            .ctx
            .source
            .list_tasks(&pid, &QueryOptions::default())?
            .collect_all()
            .await?;
        // A task with no name breaks the structural row contract.
        if let Some(bad) = tasks.iter().find(|t| t.name.trim().is_empty()) {
            return Err(MigrationError::validation_for(
                bad.id.clone(),
                "task has no name",
            ));
        }
        self.publish(ProjectStage::Extracting, 1, 3).await;
        self.ensure_live()?;

        let resources = self
            .ctx
            .source
            .list_resources(Some(&pid))?
            .collect_all()
            .await?;
        self.publish(ProjectStage::Extracting, 2, 3).await;
        self.ensure_live()?;

        let assignments = self
            .ctx
            .source
            .list_assignments(&pid)?
            .collect_all()
            .await?;
        self.publish(ProjectStage::Extracting, 3, 3).await;

        let resources_by_id = resources
            .iter()
            .map(|r| (r.id.clone(), r.clone()))
            .collect();
        Ok(Snapshot {
            tasks,
            resources,
            resources_by_id,
            assignments,
        })
    }

    fn dry_run_summary(&mut self, snapshot: &Snapshot) -> Result<()> {
        let ordered = order_tasks(&snapshot.tasks);
        self.counts.tasks_added = ordered.len();
        self.counts.resources_added = snapshot.resources.len();
        tracing::info!(
            project = %self.project.name,
            tasks = snapshot.tasks.len(),
            resources = snapshot.resources.len(),
            assignments = snapshot.assignments.len(),
            "dry run: extraction and mapping complete, skipping target writes"
        );
        Ok(())
    }

    // ========================================================================
    // Stage: Preparing (workspace, sheets, columns)
    // ========================================================================

    async fn prepare(&mut self, snapshot: &Snapshot) -> Result<Prepared> {
        self.ensure_live()?;
        self.publish(ProjectStage::Preparing, 0, 4).await;

        let safe_name = sanitize_name(&self.project.name);
        if safe_name.is_empty() {
            return Err(MigrationError::validation_for(
                self.project.id.clone(),
                "project name sanitizes to an empty string",
            ));
        }
        let prefix = project_prefix(&safe_name);

        let workspace =
            resilient::get_or_create_workspace(self.ctx.target.as_ref(), &safe_name).await?;
        self.publish(ProjectStage::Preparing, 1, 4).await;

        // Custom-field column plans, per entity kind.
        let task_customs = plan_columns(
            self.schema.get("Task").map(Vec::as_slice).unwrap_or(&[]),
            &snapshot
                .tasks
                .iter()
                .map(|t| t.custom_fields())
                .collect::<Vec<_>>(),
        );
        let resource_customs = plan_columns(
            self.schema
                .get("Resource")
                .map(Vec::as_slice)
                .unwrap_or(&[]),
            &snapshot
                .resources
                .iter()
                .map(|r| r.custom_fields())
                .collect::<Vec<_>>(),
        );

        // Desired column sets: static skeletons + discovered columns.
        let mut desired_tasks = task_columns(&prefix);
        desired_tasks.extend(assignment_columns(
            &snapshot.assignments,
            &snapshot.resources_by_id,
        ));
        desired_tasks.extend(task_customs.iter().map(custom_column_spec));

        let mut desired_resources = resource_columns(&prefix);
        desired_resources.extend(resource_customs.iter().map(custom_column_spec));

        let summary = self
            .ensure_project_sheet(workspace.id, &safe_name, "Summary", summary_columns())
            .await?;
        self.publish(ProjectStage::Preparing, 2, 4).await;
        let tasks_sheet = self
            .ensure_project_sheet(workspace.id, &safe_name, "Tasks", desired_tasks)
            .await?;
        self.publish(ProjectStage::Preparing, 3, 4).await;
        let resources_sheet = self
            .ensure_project_sheet(workspace.id, &safe_name, "Resources", desired_resources)
            .await?;
        self.publish(ProjectStage::Preparing, 4, 4).await;

        Ok(Prepared {
            workspace_id: workspace.id,
            workspace_name: workspace.name,
            summary,
            tasks: tasks_sheet,
            resources: resources_sheet,
            task_customs,
            resource_customs,
        })
    }

    /// Get-or-create one of the three project sheets and reconcile its
    /// column set. Template workspaces are preferred as the source of new
    /// sheets when configured: the template sheet is copied, renamed by the
    /// copy, and cleared of data.
    async fn ensure_project_sheet(
        &mut self,
        workspace_id: u64,
        project_name: &str,
        kind: &str,
        desired_columns: Vec<Column>,
    ) -> Result<SheetState> {
        let target = self.ctx.target.clone();
        let store = target.as_ref();
        let name = format!("{project_name} - {kind}");

        let mut sheet = match resilient::find_sheet_in_workspace(store, workspace_id, &name).await?
        {
            Some(info) => store.get_sheet(info.id).await?,
            None => match self.ctx.options.template_workspace_id {
                Some(template_wid) => {
                    match resilient::find_sheet_by_partial_name(store, template_wid, kind).await? {
                        Some(template) => {
                            tracing::info!(sheet = %name, "copying sheet from template workspace");
                            let copied = store
                                .copy_sheet_to_workspace(template.id, workspace_id, &name)
                                .await?;
                            resilient::delete_all_rows(store, copied.id).await?;
                            store.get_sheet(copied.id).await?
                        }
                        None => {
                            self.warnings.push(format!(
                                "template workspace has no sheet matching {kind:?}; creating blank"
                            ));
                            store
                                .create_sheet_in_workspace(
                                    workspace_id,
                                    &SheetSpec {
                                        name: name.clone(),
                                        columns: desired_columns.clone(),
                                    },
                                )
                                .await?
                        }
                    }
                }
                None => {
                    store
                        .create_sheet_in_workspace(
                            workspace_id,
                            &SheetSpec {
                                name: name.clone(),
                                columns: desired_columns.clone(),
                            },
                        )
                        .await?
                }
            },
        };

        let before: BTreeSet<String> = sheet.columns.iter().map(|c| c.title.clone()).collect();
        let resolved =
            resilient::add_columns_if_not_exist(store, sheet.id, &desired_columns).await?;
        self.counts.columns_added += resolved
            .iter()
            .filter(|c| !before.contains(&c.title))
            .count();

        let mut cols = ColumnMap::from_sheet(&sheet);
        cols.merge(&resolved);
        // Keep the fetched rows for rerun matching; they predate any column
        // additions, which never touch rows.
        sheet.columns = {
            let mut merged = sheet.columns;
            for col in resolved {
                if !merged.iter().any(|c| c.title == col.title) {
                    merged.push(col);
                }
            }
            merged
        };
        Ok(SheetState { sheet, cols })
    }

    // ========================================================================
    // Stage: LoadingResources (flat, unordered)
    // ========================================================================

    async fn load_resources(&mut self, snapshot: &Snapshot, prepared: &Prepared) -> Result<()> {
        self.ensure_live()?;
        let total = snapshot.resources.len() as u64;
        self.publish(ProjectStage::LoadingResources, 0, total).await;

        let state = &prepared.resources;
        let existing = state.rows_by_source_id();

        let mut to_add: Vec<Row> = Vec::new();
        let mut to_update: Vec<Row> = Vec::new();
        for resource in &snapshot.resources {
            let mut row = resource_row(resource, &state.cols, &prepared.resource_customs);
            match existing.get(&resource.id) {
                Some((row_id, _)) => {
                    row.id = Some(*row_id);
                    row.to_bottom = None;
                    to_update.push(row);
                }
                None => to_add.push(row),
            }
        }

        let mut done = 0u64;
        for chunk in to_update.chunks(self.ctx.options.batch_size.max(1)) {
            self.ensure_live()?;
            self.ctx.target.update_rows(state.sheet.id, chunk).await?;
            self.counts.resources_updated += chunk.len();
            done += chunk.len() as u64;
            self.publish(ProjectStage::LoadingResources, done, total).await;
        }
        for chunk in to_add.chunks(self.ctx.options.batch_size.max(1)) {
            self.ensure_live()?;
            self.ctx.target.add_rows(state.sheet.id, chunk).await?;
            self.counts.resources_added += chunk.len();
            done += chunk.len() as u64;
            self.publish(ProjectStage::LoadingResources, done, total).await;
        }
        Ok(())
    }

    // ========================================================================
    // Stage: LoadingTasks (hierarchy-ordered, parent before child)
    // ========================================================================

    async fn load_tasks(&mut self, snapshot: &Snapshot, prepared: &Prepared) -> Result<()> {
        self.ensure_live()?;
        let state = &prepared.tasks;
        let ordered = order_tasks(&snapshot.tasks);
        let total = ordered.len() as u64;
        self.publish(ProjectStage::LoadingTasks, 0, total).await;

        let grouped = group_by_task(&snapshot.assignments, &snapshot.resources_by_id);
        let existing = state.rows_by_source_id();

        // task guid → (row id, row number), filled as rows land.
        let mut placed: HashMap<String, (u64, i64)> = HashMap::new();
        let mut done = 0u64;

        // Pending adds: (task guid, row). A batch flushes when full or when
        // the next task's parent is still waiting inside it.
        let mut pending: Vec<(String, Row)> = Vec::new();
        let mut pending_ids: BTreeSet<String> = BTreeSet::new();

        let mut updates: Vec<Row> = Vec::new();

        for node in &ordered {
            self.ensure_live()?;
            let task = node.task;
            let parent_guid = node.parent.map(|i| ordered[i].task.id.as_str());

            if let Some(parent) = parent_guid {
                if pending_ids.contains(parent) {
                    done += self
                        .flush_task_batch(state, &mut pending, &mut pending_ids, &mut placed)
                        .await? as u64;
                    self.publish(ProjectStage::LoadingTasks, done, total).await;
                }
            }

            let assignments: Option<&TaskAssignments> = grouped.get(&task.id);
            let mut row = task_row(task, &state.cols, assignments, &prepared.task_customs);
            // Parent rows (existing or flushed) have known ids by now.
            row.parent_id = parent_guid.and_then(|p| {
                placed
                    .get(p)
                    .or_else(|| existing.get(p))
                    .map(|(id, _)| *id)
            });

            match existing.get(&task.id) {
                Some((row_id, row_number)) => {
                    row.id = Some(*row_id);
                    row.to_bottom = None;
                    placed.insert(task.id.clone(), (*row_id, *row_number));
                    updates.push(row);
                    self.counts.tasks_updated += 1;
                }
                None => {
                    pending_ids.insert(task.id.clone());
                    pending.push((task.id.clone(), row));
                    if pending.len() >= self.ctx.options.batch_size.max(1) {
                        done += self
                            .flush_task_batch(state, &mut pending, &mut pending_ids, &mut placed)
                            .await? as u64;
                        self.publish(ProjectStage::LoadingTasks, done, total).await;
                    }
                }
            }
        }
        done += self
            .flush_task_batch(state, &mut pending, &mut pending_ids, &mut placed)
            .await? as u64;

        for chunk in updates.chunks(self.ctx.options.batch_size.max(1)) {
            self.ensure_live()?;
            self.ctx.target.update_rows(state.sheet.id, chunk).await?;
            done += chunk.len() as u64;
            self.publish(ProjectStage::LoadingTasks, done, total).await;
        }

        self.apply_predecessors(snapshot, state, &placed).await?;
        self.publish(ProjectStage::LoadingTasks, total, total).await;
        Ok(())
    }

    async fn flush_task_batch(
        &mut self,
        state: &SheetState,
        pending: &mut Vec<(String, Row)>,
        pending_ids: &mut BTreeSet<String>,
        placed: &mut HashMap<String, (u64, i64)>,
    ) -> Result<usize> {
        if pending.is_empty() {
            return Ok(0);
        }
        let rows: Vec<Row> = pending.iter().map(|(_, r)| r.clone()).collect();
        let created = self.ctx.target.add_rows(state.sheet.id, &rows).await?;
        for ((guid, _), created_row) in pending.iter().zip(created.iter()) {
            if let Some(id) = created_row.id {
                placed.insert(guid.clone(), (id, created_row.row_number.unwrap_or(0)));
            }
        }
        let flushed = pending.len();
        self.counts.tasks_added += flushed;
        pending.clear();
        pending_ids.clear();
        Ok(flushed)
    }

    /// Second pass: with every row number known, render and write the
    /// predecessor cells. Forward references resolve here.
    async fn apply_predecessors(
        &mut self,
        snapshot: &Snapshot,
        state: &SheetState,
        placed: &HashMap<String, (u64, i64)>,
    ) -> Result<()> {
        let Some(pred_col) = state.cols.get(titles::PREDECESSORS) else {
            return Ok(());
        };

        // The row map answers both guid and task-index references.
        let mut row_numbers: HashMap<String, i64> = HashMap::new();
        for task in &snapshot.tasks {
            if let Some((_, row_number)) = placed.get(&task.id) {
                row_numbers.insert(task.id.clone(), *row_number);
                row_numbers.insert(task.task_index.to_string(), *row_number);
            }
        }

        let mut updates: Vec<Row> = Vec::new();
        for task in &snapshot.tasks {
            let Some(raw) = task.predecessors.as_deref() else {
                continue;
            };
            let relations = parse_relations(raw);
            let Some(rendered) = format_predecessors(&relations, &row_numbers) else {
                continue;
            };
            let Some((row_id, _)) = placed.get(&task.id) else {
                continue;
            };
            updates.push(Row {
                id: Some(*row_id),
                cells: vec![Cell::text(pred_col, rendered)],
                ..Default::default()
            });
        }

        for chunk in updates.chunks(self.ctx.options.batch_size.max(1)) {
            self.ensure_live()?;
            self.ctx.target.update_rows(state.sheet.id, chunk).await?;
        }
        Ok(())
    }

    // ========================================================================
    // Stage: LoadingSummary (key-value rows)
    // ========================================================================

    async fn load_summary(&mut self, prepared: &Prepared) -> Result<()> {
        self.ensure_live()?;
        self.publish(ProjectStage::LoadingSummary, 0, 1).await;
        let state = &prepared.summary;

        let mut rows = summary_rows(&self.project, &state.cols);
        rows.extend(self.project_custom_rows(&state.cols));

        // Upsert by the Field cell: reruns update values in place.
        let field_col = state.cols.get(titles::FIELD);
        let existing_by_field: HashMap<String, u64> = match field_col {
            Some(col) => state
                .sheet
                .rows
                .iter()
                .filter_map(|row| {
                    let field = row.cell(col)?.value.as_ref()?.as_str()?;
                    Some((field.to_string(), row.id?))
                })
                .collect(),
            None => HashMap::new(),
        };

        let mut to_add: Vec<Row> = Vec::new();
        let mut to_update: Vec<Row> = Vec::new();
        for row in rows.drain(..) {
            let field = field_col
                .and_then(|col| row.cell(col))
                .and_then(|c| c.value.as_ref())
                .and_then(|v| v.as_str())
                .map(String::from);
            match field.and_then(|f| existing_by_field.get(&f).copied()) {
                Some(row_id) => {
                    let mut row = row;
                    row.id = Some(row_id);
                    row.to_bottom = None;
                    to_update.push(row);
                }
                None => to_add.push(row),
            }
        }

        self.counts.summary_rows = to_add.len() + to_update.len();
        if !to_update.is_empty() {
            self.ctx
                .target
                .update_rows(state.sheet.id, &to_update)
                .await?;
        }
        if !to_add.is_empty() {
            self.ctx.target.add_rows(state.sheet.id, &to_add).await?;
        }
        self.publish(ProjectStage::LoadingSummary, 1, 1).await;
        Ok(())
    }

    /// Project-level custom fields become additional key-value rows.
    fn project_custom_rows(&mut self, cols: &ColumnMap) -> Vec<Row> {
        let (Some(field_col), Some(value_col)) =
            (cols.get(titles::FIELD), cols.get(titles::VALUE))
        else {
            return Vec::new();
        };
        let defs = self.schema.get("Project").map(Vec::as_slice).unwrap_or(&[]);
        let customs = self.project.custom_fields();
        let planned = plan_columns(defs, &[customs.clone()]);

        let mut rows = Vec::new();
        for plan in &planned {
            let Some((_, raw)) = customs
                .iter()
                .find(|(name, _)| *name == plan.def.internal_name)
            else {
                continue;
            };
            let value = resolve_value(&plan.def, raw);
            let text = match value {
                CustomValue::Text(s) => s,
                CustomValue::Number(n) => n.to_string(),
                CustomValue::Bool(b) => b.to_string(),
                CustomValue::Date(d) => d,
                CustomValue::Multi(v) => v.join(", "),
                CustomValue::Empty => continue,
            };
            rows.push(Row::at_bottom(vec![
                Cell::text(field_col, plan.title.clone()),
                Cell::text(value_col, text),
            ]));
        }
        rows
    }

    // ========================================================================
    // Stage: Configuring (picklist wiring against PMO Standards)
    // ========================================================================

    async fn configure_picklists(&mut self, snapshot: &Snapshot, prepared: &Prepared) -> Result<()> {
        self.ensure_live()?;
        self.publish(ProjectStage::Configuring, 0, 1).await;

        // Fixed task/resource picklists bind to the standard sheets.
        for (sheet_state, column_title, standard_sheet) in [
            (&prepared.tasks, titles::STATUS, "Task - Status"),
            (&prepared.tasks, titles::PRIORITY, "Task - Priority"),
            (
                &prepared.tasks,
                titles::CONSTRAINT_TYPE,
                "Task - Constraint Type",
            ),
            (&prepared.resources, titles::RESOURCE_TYPE, "Resource - Type"),
        ] {
            let Some(reference) = self.ctx.standards.reference(standard_sheet).await else {
                self.warnings
                    .push(format!("no standards reference for {standard_sheet}"));
                continue;
            };
            self.bind_column(sheet_state, column_title, reference).await?;
        }

        // Departments are a discovered value set.
        let departments: Vec<String> = snapshot
            .resources
            .iter()
            .filter_map(|r| r.department.clone())
            .filter(|d| !d.trim().is_empty())
            .collect();
        if !departments.is_empty() {
            let reference = self
                .ctx
                .standards
                .ensure_reference_sheet(&lookup_sheet_name("Resource", "Department"), &departments)
                .await?;
            self.bind_column(&prepared.resources, titles::DEPARTMENT, reference)
                .await?;
        }

        // Custom lookup fields get namespaced reference sheets.
        self.bind_custom_lookups(&prepared.tasks, &prepared.task_customs, "Task", |t: &ProjectTask| {
            t.custom_fields()
        }, &snapshot.tasks)
        .await?;
        self.bind_custom_lookups(
            &prepared.resources,
            &prepared.resource_customs,
            "Resource",
            |r: &Resource| r.custom_fields(),
            &snapshot.resources,
        )
        .await?;

        self.report_formula_fields(snapshot, prepared).await;
        self.publish(ProjectStage::Configuring, 1, 1).await;
        Ok(())
    }

    async fn bind_custom_lookups<E>(
        &mut self,
        sheet_state: &SheetState,
        planned: &[PlannedCustomColumn],
        entity_kind: &str,
        customs_of: impl Fn(&E) -> Vec<(String, serde_json::Value)>,
        entities: &[E],
    ) -> Result<()> {
        for plan in planned.iter().filter(|p| p.def.has_lookup()) {
            // Seed with the schema's lookup table, then union the values
            // actually observed on entities (unresolved ids pass through).
            let mut values: Vec<String> = plan
                .def
                .lookup_entries
                .iter()
                .flatten()
                .map(|e| e.value.clone())
                .collect();
            for entity in entities {
                for (name, raw) in customs_of(entity) {
                    if name != plan.def.internal_name {
                        continue;
                    }
                    match resolve_value(&plan.def, &raw) {
                        CustomValue::Text(s) => values.push(s),
                        CustomValue::Multi(v) => values.extend(v),
                        _ => {}
                    }
                }
            }
            let sheet_name = lookup_sheet_name(entity_kind, &field_label(&plan.def));
            let reference = self
                .ctx
                .standards
                .ensure_reference_sheet(&sheet_name, &values)
                .await?;
            self.bind_column(sheet_state, &plan.title, reference).await?;
        }
        Ok(())
    }

    /// Point a picklist column's options at a PMO Standards sheet.
    async fn bind_column(
        &mut self,
        sheet_state: &SheetState,
        column_title: &str,
        reference: SourceSheetRef,
    ) -> Result<()> {
        let Some(column) = sheet_state.sheet.column_by_title(column_title) else {
            self.warnings.push(format!(
                "cannot bind {column_title:?}: column not found in {}",
                sheet_state.sheet.name
            ));
            return Ok(());
        };
        let mut column = column.clone();
        column.source_sheet_ref = Some(reference);
        column.validation = Some(true);
        // Binding drops any literal option list; the reference is canonical.
        column.options = None;
        self.ctx
            .target
            .update_column(sheet_state.sheet.id, &column)
            .await?;
        Ok(())
    }

    /// Every formula-bearing custom field lands in the CSV report, with a
    /// few materialized values as samples.
    async fn report_formula_fields(&mut self, snapshot: &Snapshot, prepared: &Prepared) {
        let task_values: Vec<Vec<(String, serde_json::Value)>> =
            snapshot.tasks.iter().map(|t| t.custom_fields()).collect();
        let resource_values: Vec<Vec<(String, serde_json::Value)>> =
            snapshot.resources.iter().map(|r| r.custom_fields()).collect();

        for (sheet_state, planned, entity_kind, values) in [
            (&prepared.tasks, &prepared.task_customs, "Task", &task_values),
            (
                &prepared.resources,
                &prepared.resource_customs,
                "Resource",
                &resource_values,
            ),
        ] {
            for plan in planned.iter().filter(|p| p.def.is_formula()) {
                let samples: Vec<String> = values
                    .iter()
                    .flatten()
                    .filter(|(name, _)| *name == plan.def.internal_name)
                    .filter_map(|(_, raw)| match resolve_value(&plan.def, raw) {
                        CustomValue::Text(s) => Some(s),
                        CustomValue::Number(n) => Some(n.to_string()),
                        CustomValue::Bool(b) => Some(b.to_string()),
                        CustomValue::Date(d) => Some(d),
                        CustomValue::Multi(v) => Some(v.join(", ")),
                        CustomValue::Empty => None,
                    })
                    .take(3)
                    .collect();
                let column_id = sheet_state.cols.get(&plan.title).unwrap_or(0);
                self.ctx
                    .report
                    .append(FormulaFieldEntry {
                        workspace_name: prepared.workspace_name.clone(),
                        workspace_id: prepared.workspace_id,
                        sheet_name: sheet_state.sheet.name.clone(),
                        sheet_id: sheet_state.sheet.id,
                        column_name: plan.title.clone(),
                        column_id,
                        internal_field_name: plan.def.internal_name.clone(),
                        display_name: field_label(&plan.def),
                        entity_type: entity_kind.to_string(),
                        sample_values: samples.join("; "),
                    })
                    .await;
            }
        }
    }
}

/// Column spec for a planned custom field.
fn custom_column_spec(plan: &PlannedCustomColumn) -> Column {
    let column = Column::new(plan.title.clone(), plan.column_type);
    if is_currency(&plan.def) {
        column.currency()
    } else {
        column
    }
}
