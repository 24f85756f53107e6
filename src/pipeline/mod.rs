//! Migration orchestration: runner, progress, and per-project state

pub mod progress;
pub mod runner;
pub mod state;

pub use progress::{ProgressSink, ThrottledProgress, TracingProgress};
pub use runner::{MigrationOptions, MigrationRunner};
pub use state::{MigrationReport, ProjectOutcome, ProjectStage};

#[cfg(test)]
mod tests {
    use super::progress::TracingProgress;
    use super::runner::{MigrationOptions, MigrationRunner};
    use crate::auth::StaticTokenProvider;
    use crate::report::FormulaFieldsReport;
    use crate::retry::RetryPolicy;
    use crate::source::client::SourceClient;
    use crate::source::rate_limit::RateLimiter;
    use crate::standards::StandardsManager;
    use crate::target::mock::MockSheetStore;
    use crate::target::models::*;
    use serde_json::json;
    use std::sync::atomic::Ordering;
    use std::sync::Arc;
    use std::time::Duration;
    use tempfile::TempDir;
    use tokio_util::sync::CancellationToken;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    struct Fixture {
        server: MockServer,
        store: Arc<MockSheetStore>,
        report_dir: TempDir,
    }

    impl Fixture {
        async fn new() -> Self {
            Self {
                server: MockServer::start().await,
                store: Arc::new(MockSheetStore::new()),
                report_dir: TempDir::new().unwrap(),
            }
        }

        async fn mount(&self, route: &str, body: serde_json::Value) {
            Mock::given(method("GET"))
                .and(path(route))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "value": body })))
                .mount(&self.server)
                .await;
        }

        fn runner(&self, cancel: CancellationToken) -> MigrationRunner {
            let source = Arc::new(SourceClient::with_base_url(
                self.server.uri(),
                Arc::new(StaticTokenProvider("test-token".into())),
                Arc::new(RateLimiter::per_minute(10_000)),
                RetryPolicy::new(2, Duration::from_millis(1)),
                cancel.clone(),
            ));
            let standards = Arc::new(StandardsManager::new(self.store.clone(), None));
            let report = Arc::new(FormulaFieldsReport::new(
                self.report_dir.path().join("formulas.csv"),
            ));
            MigrationRunner::new(
                source,
                self.store.clone(),
                standards,
                Arc::new(TracingProgress),
                report,
                MigrationOptions::default(),
                cancel,
            )
        }

        async fn run(&self) -> crate::pipeline::state::MigrationReport {
            self.runner(CancellationToken::new())
                .run(&[])
                .await
                .unwrap()
        }

        async fn sheet_named(&self, name: &str) -> Sheet {
            let sheets = self.store.sheets.read().await;
            sheets
                .values()
                .find(|(_, s)| s.name == name)
                .map(|(_, s)| s.clone())
                .unwrap_or_else(|| panic!("no sheet named {name}"))
        }

        async fn workspace_named(&self, name: &str) -> Option<Workspace> {
            self.store
                .workspaces
                .read()
                .await
                .values()
                .find(|w| w.name == name)
                .cloned()
        }
    }

    fn row_with_primary<'a>(sheet: &'a Sheet, value: &str) -> &'a Row {
        let col = sheet.primary_column().and_then(|c| c.id).unwrap();
        sheet
            .rows
            .iter()
            .find(|r| {
                r.cell(col)
                    .and_then(|c| c.value.as_ref())
                    .and_then(|v| v.as_str())
                    == Some(value)
            })
            .unwrap_or_else(|| panic!("no row with primary value {value}"))
    }

    async fn mount_scenario_a(fx: &Fixture) {
        fx.mount(
            "/Projects",
            json!([{
                "ProjectId": "p1",
                "ProjectName": "Alpha",
                "ProjectPriority": 800,
                "ProjectStartDate": "2024-03-15T09:00:00Z",
                "ProjectCreatedDate": "2024-01-01T00:00:00Z",
                "ProjectModifiedDate": "2024-02-01T00:00:00Z"
            }]),
        )
        .await;
        fx.mount(
            "/Projects(guid'p1')/Tasks",
            json!([
                {"TaskId": "t1", "ProjectId": "p1", "TaskName": "T1", "TaskOutlineLevel": 0, "TaskIndex": 1},
                {"TaskId": "t2", "ProjectId": "p1", "TaskName": "T2", "TaskOutlineLevel": 1, "TaskIndex": 2},
                {"TaskId": "t3", "ProjectId": "p1", "TaskName": "T3", "TaskOutlineLevel": 0, "TaskIndex": 3}
            ]),
        )
        .await;
        fx.mount(
            "/Projects(guid'p1')/ProjectResources",
            json!([{
                "ResourceId": "r1",
                "ResourceName": "Jane",
                "ResourceEmailAddress": "j@x.com",
                "ResourceType": "Work"
            }]),
        )
        .await;
        fx.mount(
            "/Projects(guid'p1')/Assignments",
            json!([{
                "AssignmentId": "a1",
                "TaskId": "t2",
                "ResourceId": "r1",
                "ProjectId": "p1"
            }]),
        )
        .await;
        fx.mount("/CustomFields", json!([])).await;
    }

    #[tokio::test]
    async fn test_scenario_simple_project() {
        let fx = Fixture::new().await;
        mount_scenario_a(&fx).await;

        let report = fx.run().await;
        assert_eq!(report.exit_code(), 0, "{:?}", report.summary_lines());

        // Workspace and the three sheets exist.
        assert!(fx.workspace_named("Alpha").await.is_some());
        let tasks = fx.sheet_named("Alpha - Tasks").await;
        let summary = fx.sheet_named("Alpha - Summary").await;
        fx.sheet_named("Alpha - Resources").await;

        // Hierarchy: T2 under T1, T3 a root.
        assert_eq!(tasks.rows.len(), 3);
        let t1 = row_with_primary(&tasks, "T1");
        let t2 = row_with_primary(&tasks, "T2");
        let t3 = row_with_primary(&tasks, "T3");
        assert_eq!(t2.parent_id, t1.id);
        assert_eq!(t3.parent_id, None);

        // Team Members column is a multi-contact list carrying Jane on T2.
        let members = tasks.column_by_title("Team Members").unwrap();
        assert_eq!(members.column_type, ColumnType::MultiContactList);
        let cell = t2.cell(members.id.unwrap()).unwrap();
        match cell.object_value.as_ref().unwrap() {
            ObjectValue::MultiContact { values } => {
                assert_eq!(values.len(), 1);
                assert_eq!(values[0].name.as_deref(), Some("Jane"));
                assert_eq!(values[0].email.as_deref(), Some("j@x.com"));
            }
            other => panic!("expected multi-contact, got {other:?}"),
        }

        // Summary priority row maps 800 → Very High.
        let priority = row_with_primary(&summary, "Priority");
        let value_col = summary.column_by_title("Value").unwrap().id.unwrap();
        assert_eq!(
            priority.cell(value_col).unwrap().value.as_ref().unwrap(),
            "Very High"
        );
    }

    #[tokio::test]
    async fn test_scenario_rerun_is_idempotent() {
        let fx = Fixture::new().await;
        mount_scenario_a(&fx).await;

        let report = fx.run().await;
        assert_eq!(report.exit_code(), 0, "{:?}", report.summary_lines());

        let workspaces_after_first = fx.store.workspaces.read().await.len();
        let sheets_after_first = fx.store.sheets.read().await.len();
        let rows_after_first = fx.store.total_rows().await;
        let creates_after_first = fx.store.sheet_create_calls.load(Ordering::SeqCst);
        let column_adds_after_first = fx.store.column_add_calls.load(Ordering::SeqCst);
        let tasks_first = fx.sheet_named("Alpha - Tasks").await;
        let column_count_first = tasks_first.columns.len();

        // Fresh runner and standards manager, same target tenant.
        let report = fx.run().await;
        assert_eq!(report.exit_code(), 0, "{:?}", report.summary_lines());
        assert_eq!(report.outcomes[0].counts.tasks_added, 0);
        assert_eq!(report.outcomes[0].counts.tasks_updated, 3);

        assert_eq!(fx.store.workspaces.read().await.len(), workspaces_after_first);
        assert_eq!(fx.store.sheets.read().await.len(), sheets_after_first);
        assert_eq!(fx.store.total_rows().await, rows_after_first);
        assert_eq!(
            fx.store.sheet_create_calls.load(Ordering::SeqCst),
            creates_after_first
        );
        assert_eq!(
            fx.store.column_add_calls.load(Ordering::SeqCst),
            column_adds_after_first
        );
        let tasks_second = fx.sheet_named("Alpha - Tasks").await;
        assert_eq!(tasks_second.columns.len(), column_count_first);
    }

    #[tokio::test]
    async fn test_scenario_mixed_assignment_types() {
        let fx = Fixture::new().await;
        fx.mount(
            "/Projects",
            json!([{"ProjectId": "p2", "ProjectName": "Build", "ProjectPriority": 500}]),
        )
        .await;
        fx.mount(
            "/Projects(guid'p2')/Tasks",
            json!([{"TaskId": "t1", "ProjectId": "p2", "TaskName": "Install", "TaskOutlineLevel": 0, "TaskIndex": 1}]),
        )
        .await;
        fx.mount(
            "/Projects(guid'p2')/ProjectResources",
            json!([
                {"ResourceId": "w1", "ResourceName": "Jane", "ResourceEmailAddress": "j@x.com", "ResourceType": "Work"},
                {"ResourceId": "m1", "ResourceName": "Crane A", "ResourceType": "Material"},
                {"ResourceId": "c1", "ResourceName": "Travel", "ResourceType": "Cost"}
            ]),
        )
        .await;
        fx.mount(
            "/Projects(guid'p2')/Assignments",
            json!([
                {"AssignmentId": "a1", "TaskId": "t1", "ResourceId": "w1", "ProjectId": "p2"},
                {"AssignmentId": "a2", "TaskId": "t1", "ResourceId": "m1", "ProjectId": "p2"},
                {"AssignmentId": "a3", "TaskId": "t1", "ResourceId": "c1", "ProjectId": "p2"}
            ]),
        )
        .await;
        fx.mount("/CustomFields", json!([])).await;

        let report = fx.run().await;
        assert_eq!(report.exit_code(), 0, "{:?}", report.summary_lines());

        let tasks = fx.sheet_named("Build - Tasks").await;
        let members = tasks.column_by_title("Team Members").unwrap();
        let equipment = tasks.column_by_title("Equipment").unwrap();
        let cost_centers = tasks.column_by_title("Cost Centers").unwrap();
        assert_eq!(members.column_type, ColumnType::MultiContactList);
        assert_eq!(equipment.column_type, ColumnType::MultiPicklist);
        assert_eq!(cost_centers.column_type, ColumnType::MultiPicklist);
        assert!(equipment
            .options
            .as_ref()
            .unwrap()
            .contains(&"Crane A".to_string()));
        assert!(cost_centers
            .options
            .as_ref()
            .unwrap()
            .contains(&"Travel".to_string()));

        // The one task has values in all three columns.
        let t1 = row_with_primary(&tasks, "Install");
        assert!(t1.cell(members.id.unwrap()).is_some());
        assert!(t1.cell(equipment.id.unwrap()).is_some());
        assert!(t1.cell(cost_centers.id.unwrap()).is_some());
    }

    #[tokio::test]
    async fn test_scenario_lookup_custom_field() {
        let fx = Fixture::new().await;
        fx.mount(
            "/Projects",
            json!([{"ProjectId": "p3", "ProjectName": "Lookup"}]),
        )
        .await;
        fx.mount(
            "/Projects(guid'p3')/Tasks",
            json!([{
                "TaskId": "t1", "ProjectId": "p3", "TaskName": "Research",
                "TaskOutlineLevel": 0, "TaskIndex": 1,
                "Custom_dept": "Entry_7"
            }]),
        )
        .await;
        fx.mount("/Projects(guid'p3')/ProjectResources", json!([])).await;
        fx.mount("/Projects(guid'p3')/Assignments", json!([])).await;
        fx.mount(
            "/CustomFields",
            json!([{
                "CustomFieldId": "cf-dept",
                "InternalName": "Custom_dept",
                "DisplayName": "Department",
                "FieldType": 21,
                "EntityType": "Task",
                "LookupEntries": [{"EntryId": "Entry_7", "Value": "Engineering"}]
            }]),
        )
        .await;

        let report = fx.run().await;
        assert_eq!(report.exit_code(), 0, "{:?}", report.summary_lines());

        // The PMO Standards workspace gained a Task - Department sheet with
        // the lookup's display value.
        let dept_sheet = fx.sheet_named("Task - Department").await;
        let name_col = dept_sheet.primary_column().unwrap().id.unwrap();
        assert!(dept_sheet.rows.iter().any(|r| {
            r.cell(name_col)
                .and_then(|c| c.value.as_ref())
                .and_then(|v| v.as_str())
                == Some("Engineering")
        }));

        // The Tasks sheet column is a picklist sourcing from that sheet.
        let tasks = fx.sheet_named("Lookup - Tasks").await;
        let dept_col = tasks.column_by_title("Custom - Department").unwrap();
        assert_eq!(dept_col.column_type, ColumnType::Picklist);
        let reference = dept_col.source_sheet_ref.unwrap();
        assert_eq!(reference.sheet_id, dept_sheet.id);

        // The task's cell resolved the entry id to the display value.
        let t1 = row_with_primary(&tasks, "Research");
        assert_eq!(
            t1.cell(dept_col.id.unwrap()).unwrap().value.as_ref().unwrap(),
            "Engineering"
        );
    }

    #[tokio::test]
    async fn test_cancelled_run_surfaces_cancellation() {
        let fx = Fixture::new().await;
        mount_scenario_a(&fx).await;

        let cancel = CancellationToken::new();
        let runner = fx.runner(cancel.clone());
        cancel.cancel();
        // Cancellation before extraction aborts the run at the first
        // blocking operation; the error maps to exit code 5.
        let err = runner.run(&[]).await.unwrap_err();
        assert!(matches!(err, crate::error::MigrationError::Cancelled));
        assert_eq!(err.exit_code(), 5);
    }

    #[tokio::test]
    async fn test_task_without_name_fails_project() {
        let fx = Fixture::new().await;
        fx.mount(
            "/Projects",
            json!([{"ProjectId": "p4", "ProjectName": "Broken"}]),
        )
        .await;
        fx.mount(
            "/Projects(guid'p4')/Tasks",
            json!([{"TaskId": "t1", "ProjectId": "p4", "TaskName": "  ", "TaskOutlineLevel": 0, "TaskIndex": 1}]),
        )
        .await;
        fx.mount("/Projects(guid'p4')/ProjectResources", json!([])).await;
        fx.mount("/Projects(guid'p4')/Assignments", json!([])).await;
        fx.mount("/CustomFields", json!([])).await;

        let report = fx.run().await;
        assert_eq!(report.failed(), 1);
        assert_eq!(report.exit_code(), 1, "validation failure exit code");
    }

    #[tokio::test]
    async fn test_dry_run_writes_nothing() {
        let fx = Fixture::new().await;
        mount_scenario_a(&fx).await;

        let cancel = CancellationToken::new();
        let source = Arc::new(SourceClient::with_base_url(
            fx.server.uri(),
            Arc::new(StaticTokenProvider("t".into())),
            Arc::new(RateLimiter::per_minute(10_000)),
            RetryPolicy::new(2, Duration::from_millis(1)),
            cancel.clone(),
        ));
        let standards = Arc::new(StandardsManager::new(fx.store.clone(), None));
        let report_file = Arc::new(FormulaFieldsReport::new(
            fx.report_dir.path().join("formulas.csv"),
        ));
        let runner = MigrationRunner::new(
            source,
            fx.store.clone(),
            standards,
            Arc::new(TracingProgress),
            report_file,
            MigrationOptions {
                dry_run: true,
                ..Default::default()
            },
            cancel,
        );
        let report = runner.run(&[]).await.unwrap();
        assert_eq!(report.exit_code(), 0);
        assert_eq!(report.outcomes[0].counts.tasks_added, 3);

        // No target writes at all: no project workspace, no PMO Standards.
        assert!(fx.workspace_named("Alpha").await.is_none());
        assert!(fx.store.workspaces.read().await.is_empty());
        assert_eq!(fx.store.total_rows().await, 0);
    }
}
