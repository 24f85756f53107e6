//! Project Online → Smartsheet migrator
//!
//! An ETL engine that copies project-management data out of a Microsoft
//! Project Online tenant (OData) into Smartsheet workspaces:
//! - one workspace per source project, with Summary / Tasks / Resources sheets
//! - a shared "PMO Standards" workspace anchoring cross-sheet picklists
//! - rerunnable end to end: every creation is get-or-create, every row
//!   carries a hidden source guid for upsert matching

pub mod auth;
pub mod error;
pub mod pipeline;
pub mod report;
pub mod resilient;
pub mod retry;
pub mod source;
pub mod standards;
pub mod target;
pub mod transform;

use crate::auth::{AuthManager, DeviceCodeDisplay, TokenCache, TracingDisplay};
use crate::error::{MigrationError, Result};
use crate::pipeline::progress::{ProgressSink, ThrottledProgress, TracingProgress};
use crate::pipeline::runner::{MigrationOptions, MigrationRunner};
use crate::report::FormulaFieldsReport;
use crate::retry::RetryPolicy;
use crate::source::client::SourceClient;
use crate::source::rate_limit::{RateLimiter, DEFAULT_REQUESTS_PER_MINUTE};
use crate::standards::StandardsManager;
use crate::target::client::SmartsheetClient;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Deployment shape for migrated projects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolutionType {
    /// One standalone workspace per project (the default).
    StandaloneWorkspaces,
    /// Projects grouped under a portfolio workspace.
    Portfolio,
}

impl SolutionType {
    fn parse(raw: &str) -> Result<Self> {
        match raw {
            "StandaloneWorkspaces" => Ok(Self::StandaloneWorkspaces),
            "Portfolio" => Ok(Self::Portfolio),
            other => Err(MigrationError::config(format!(
                "SOLUTION_TYPE must be StandaloneWorkspaces or Portfolio, got {other:?}"
            ))),
        }
    }
}

/// Application configuration, read once from the environment at start.
#[derive(Debug, Clone)]
pub struct Config {
    pub smartsheet_api_token: String,
    pub tenant_id: String,
    pub client_id: String,
    pub project_online_url: String,
    pub use_device_code_flow: Option<bool>,
    pub token_cache_dir: PathBuf,
    pub pmo_standards_workspace_id: Option<u64>,
    pub template_workspace_id: Option<u64>,
    pub solution_type: SolutionType,
    pub log_level: String,
    pub batch_size: usize,
    pub max_retries: u32,
    pub retry_delay: Duration,
    pub dry_run: bool,
    pub concurrency: usize,
    pub requests_per_minute: u32,
    pub formula_report_path: PathBuf,
}

fn required(var: &str) -> Result<String> {
    std::env::var(var)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| MigrationError::config(format!("{var} is not set")))
}

fn parse_var<T: std::str::FromStr>(var: &str) -> Result<Option<T>> {
    match std::env::var(var) {
        Ok(raw) if !raw.trim().is_empty() => raw.trim().parse::<T>().map(Some).map_err(|_| {
            MigrationError::config(format!("{var} has an unparseable value {raw:?}"))
        }),
        _ => Ok(None),
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        let smartsheet_api_token = required("SMARTSHEET_API_TOKEN")?;
        if smartsheet_api_token.len() != 26
            || !smartsheet_api_token.chars().all(|c| c.is_ascii_alphanumeric())
        {
            return Err(MigrationError::config(
                "SMARTSHEET_API_TOKEN must be 26 alphanumeric characters",
            ));
        }

        let solution_type = match std::env::var("SOLUTION_TYPE") {
            Ok(raw) if !raw.trim().is_empty() => SolutionType::parse(raw.trim())?,
            _ => SolutionType::StandaloneWorkspaces,
        };

        Ok(Self {
            smartsheet_api_token,
            tenant_id: required("TENANT_ID")?,
            client_id: required("CLIENT_ID")?,
            project_online_url: required("PROJECT_ONLINE_URL")?,
            use_device_code_flow: parse_var::<bool>("USE_DEVICE_CODE_FLOW")?,
            token_cache_dir: std::env::var("TOKEN_CACHE_DIR")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from)
                .unwrap_or_else(TokenCache::default_dir),
            pmo_standards_workspace_id: parse_var::<u64>("PMO_STANDARDS_WORKSPACE_ID")?,
            template_workspace_id: parse_var::<u64>("TEMPLATE_WORKSPACE_ID")?,
            solution_type,
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "INFO".into()),
            batch_size: parse_var::<usize>("BATCH_SIZE")?.unwrap_or(100),
            max_retries: parse_var::<u32>("MAX_RETRIES")?.unwrap_or(3),
            retry_delay: Duration::from_millis(parse_var::<u64>("RETRY_DELAY")?.unwrap_or(1000)),
            dry_run: parse_var::<bool>("DRY_RUN")?.unwrap_or(false),
            concurrency: parse_var::<usize>("PROJECT_CONCURRENCY")?.unwrap_or(3),
            requests_per_minute: parse_var::<u32>("SOURCE_REQUESTS_PER_MINUTE")?
                .unwrap_or(DEFAULT_REQUESTS_PER_MINUTE),
            formula_report_path: std::env::var("FORMULA_REPORT_PATH")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("formula-fields-report.csv")),
        })
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_retries.max(1), self.retry_delay)
    }
}

/// Shared application state with all services initialized.
#[derive(Clone)]
pub struct AppState {
    pub auth: Arc<AuthManager>,
    pub source: Arc<SourceClient>,
    pub target: Arc<SmartsheetClient>,
    pub standards: Arc<StandardsManager>,
    pub runner: Arc<MigrationRunner>,
    pub config: Arc<Config>,
}

impl AppState {
    /// Wire up all services from the configuration.
    pub fn new(config: Config, cancel: CancellationToken) -> Result<Self> {
        let display: Arc<dyn DeviceCodeDisplay> = Arc::new(TracingDisplay);
        let auth = Arc::new(AuthManager::new(
            config.tenant_id.clone(),
            config.client_id.clone(),
            &config.project_online_url,
            TokenCache::new(config.token_cache_dir.clone()),
            display,
        )?);

        let retry = config.retry_policy();
        let limiter = Arc::new(RateLimiter::per_minute(config.requests_per_minute));
        let source = Arc::new(SourceClient::new(
            &config.project_online_url,
            auth.clone(),
            limiter,
            retry,
            cancel.clone(),
        )?);
        let target = Arc::new(SmartsheetClient::new(
            config.smartsheet_api_token.clone(),
            retry,
            cancel.clone(),
        ));
        let standards = Arc::new(StandardsManager::new(
            target.clone(),
            config.pmo_standards_workspace_id,
        ));

        let progress: Arc<dyn ProgressSink> =
            Arc::new(ThrottledProgress::new(Arc::new(TracingProgress)));
        let report = Arc::new(FormulaFieldsReport::new(config.formula_report_path.clone()));
        let runner = Arc::new(MigrationRunner::new(
            source.clone(),
            target.clone(),
            standards.clone(),
            progress,
            report,
            MigrationOptions {
                batch_size: config.batch_size,
                concurrency: config.concurrency,
                dry_run: config.dry_run,
                template_workspace_id: config.template_workspace_id,
            },
            cancel,
        ));

        Ok(Self {
            auth,
            source,
            target,
            standards,
            runner,
            config: Arc::new(config),
        })
    }
}
