//! Per-project state machine and run-level aggregation.

use crate::error::MigrationError;
use serde::Serialize;

/// Stages of one project's migration, in dependency order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectStage {
    Pending,
    Extracting,
    Preparing,
    LoadingResources,
    LoadingTasks,
    LoadingSummary,
    Configuring,
    Done,
    Failed,
    Cancelled,
}

impl ProjectStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Extracting => "extracting",
            Self::Preparing => "preparing",
            Self::LoadingResources => "loading_resources",
            Self::LoadingTasks => "loading_tasks",
            Self::LoadingSummary => "loading_summary",
            Self::Configuring => "configuring",
            Self::Done => "done",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed | Self::Cancelled)
    }
}

/// Load counters for one project.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct LoadCounts {
    pub tasks_added: usize,
    pub tasks_updated: usize,
    pub resources_added: usize,
    pub resources_updated: usize,
    pub summary_rows: usize,
    pub columns_added: usize,
}

/// The terminal record for one project.
#[derive(Debug, Serialize)]
pub struct ProjectOutcome {
    pub project_id: String,
    pub project_name: String,
    pub stage: ProjectStage,
    pub counts: LoadCounts,
    /// Collected per-entity validation/data problems that degraded fields
    /// without failing the project.
    pub warnings: Vec<String>,
    /// The error that failed the project, when it did.
    #[serde(skip)]
    pub error: Option<MigrationError>,
}

impl ProjectOutcome {
    pub fn succeeded(&self) -> bool {
        self.stage == ProjectStage::Done
    }
}

/// Aggregated result of a run across all projects.
#[derive(Debug, Default)]
pub struct MigrationReport {
    pub outcomes: Vec<ProjectOutcome>,
}

impl MigrationReport {
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.succeeded()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| o.stage == ProjectStage::Failed)
            .count()
    }

    pub fn cancelled(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| o.stage == ProjectStage::Cancelled)
            .count()
    }

    /// Process exit code reflecting the worst outcome.
    pub fn exit_code(&self) -> i32 {
        if self.cancelled() > 0 {
            return 5;
        }
        if self.failed() == 0 {
            return 0;
        }
        if self.succeeded() > 0 {
            // Partial success with errors.
            return 4;
        }
        // Everything failed: surface the first error's own code.
        self.outcomes
            .iter()
            .find_map(|o| o.error.as_ref())
            .map(|e| e.exit_code())
            .unwrap_or(4)
    }

    /// One line per project, plus the error hint where applicable.
    pub fn summary_lines(&self) -> Vec<String> {
        let mut lines = Vec::new();
        for outcome in &self.outcomes {
            match &outcome.error {
                None => lines.push(format!(
                    "{}: {} ({} tasks, {} resources, {} warnings)",
                    outcome.project_name,
                    outcome.stage.as_str(),
                    outcome.counts.tasks_added + outcome.counts.tasks_updated,
                    outcome.counts.resources_added + outcome.counts.resources_updated,
                    outcome.warnings.len(),
                )),
                Some(err) => {
                    lines.push(format!(
                        "{}: {}: {}",
                        outcome.project_name,
                        outcome.stage.as_str(),
                        err
                    ));
                    lines.push(format!("  what to do: {}", err.hint()));
                }
            }
        }
        lines
    }
}
