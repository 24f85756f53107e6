//! pmo-migrate — CLI entry point
//!
//! Verbs: `import` (run a migration), `validate` (check config and
//! connectivity), `config` (print the resolved configuration), `auth-clear`
//! (drop cached tokens). Exit codes: 0 success, 1 validation failure,
//! 2 authentication failure, 3 configuration error, 4 partial success with
//! errors, 5 cancelled.

use anyhow::Result;
use clap::{Parser, Subcommand};
use pmo_migrator::error::MigrationError;
use pmo_migrator::target::traits::SheetStore;
use pmo_migrator::{AppState, Config};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "pmo-migrate")]
#[command(about = "Migrate Project Online projects into Smartsheet workspaces")]
struct Cli {
    /// Verbose logging (equivalent to LOG_LEVEL=DEBUG)
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Migrate one or more projects
    Import {
        /// Source project id or name; repeatable. All projects when omitted.
        #[arg(long)]
        source: Vec<String>,

        /// Existing destination workspace id to adopt for PMO Standards
        #[arg(long, env = "PMO_STANDARDS_WORKSPACE_ID")]
        destination: Option<u64>,

        /// Extract and map, but write nothing to the target
        #[arg(long)]
        dry_run: bool,

        /// Only migrate entities modified since this date (reserved)
        #[arg(long, hide = true)]
        since: Option<String>,

        /// Incremental sync mode (reserved)
        #[arg(long, hide = true)]
        incremental: bool,
    },

    /// Check configuration and connectivity to both ends
    Validate,

    /// Print the resolved configuration
    Config,

    /// Clear cached OAuth tokens
    #[command(name = "auth:clear")]
    AuthClear,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let default_filter = if cli.verbose {
        "debug".to_string()
    } else {
        match std::env::var("LOG_LEVEL").as_deref() {
            Ok("SILENT") => "off".to_string(),
            Ok(level) => level.to_lowercase(),
            Err(_) => "info,pmo_migrator=info".to_string(),
        }
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let exit = run(cli).await;
    std::process::exit(exit);
}

async fn run(cli: Cli) -> i32 {
    let mut config = match Config::from_env() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{err}");
            eprintln!("what to do: {}", err.hint());
            return err.exit_code();
        }
    };

    // Ctrl-C flips the cancellation token; everything blocking observes it.
    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("cancellation requested; stopping new work");
                cancel.cancel();
            }
        });
    }

    match cli.command {
        Commands::Import {
            source,
            destination,
            dry_run,
            since,
            incremental,
        } => {
            if since.is_some() || incremental {
                tracing::warn!("--since/--incremental are reserved and currently ignored");
            }
            if dry_run {
                config.dry_run = true;
            }
            if destination.is_some() {
                config.pmo_standards_workspace_id = destination;
            }
            run_import(config, cancel, &source).await
        }
        Commands::Validate => run_validate(config, cancel).await,
        Commands::Config => {
            print_config(&config);
            0
        }
        Commands::AuthClear => match AppState::new(config, cancel) {
            Ok(state) => {
                state.auth.clear_all_caches().await;
                println!("token caches cleared");
                0
            }
            Err(err) => {
                eprintln!("{err}");
                err.exit_code()
            }
        },
    }
}

async fn run_import(config: Config, cancel: CancellationToken, filter: &[String]) -> i32 {
    let state = match AppState::new(config, cancel) {
        Ok(state) => state,
        Err(err) => {
            eprintln!("{err}");
            eprintln!("what to do: {}", err.hint());
            return err.exit_code();
        }
    };

    match state.runner.run(filter).await {
        Ok(report) => {
            for line in report.summary_lines() {
                println!("{line}");
            }
            println!(
                "done: {} succeeded, {} failed, {} cancelled",
                report.succeeded(),
                report.failed(),
                report.cancelled()
            );
            report.exit_code()
        }
        Err(err) => {
            eprintln!("{err}");
            eprintln!("what to do: {}", err.hint());
            err.exit_code()
        }
    }
}

async fn run_validate(config: Config, cancel: CancellationToken) -> i32 {
    let state = match AppState::new(config, cancel) {
        Ok(state) => state,
        Err(err) => {
            eprintln!("{err}");
            return err.exit_code();
        }
    };

    println!("checking source authentication...");
    if !state.auth.test_authentication().await {
        eprintln!("source authentication failed");
        eprintln!(
            "what to do: {}",
            MigrationError::auth(
                pmo_migrator::error::AuthErrorKind::Refresh,
                "validation".to_string(),
            )
            .hint()
        );
        return 2;
    }
    println!("source authentication ok");

    println!("checking target connectivity...");
    match state.target.list_workspaces().await {
        Ok(workspaces) => {
            println!("target ok ({} workspaces visible)", workspaces.len());
            0
        }
        Err(err) => {
            eprintln!("target check failed: {err}");
            eprintln!("what to do: {}", err.hint());
            1
        }
    }
}

fn print_config(config: &Config) {
    println!("PROJECT_ONLINE_URL       = {}", config.project_online_url);
    println!("TENANT_ID                = {}", config.tenant_id);
    println!("CLIENT_ID                = {}", config.client_id);
    println!("SMARTSHEET_API_TOKEN     = ****{}", mask_tail(&config.smartsheet_api_token));
    println!("SOLUTION_TYPE            = {:?}", config.solution_type);
    println!("TOKEN_CACHE_DIR          = {}", config.token_cache_dir.display());
    println!(
        "PMO_STANDARDS_WORKSPACE_ID = {}",
        config
            .pmo_standards_workspace_id
            .map(|v| v.to_string())
            .unwrap_or_else(|| "(create by name)".into())
    );
    println!(
        "TEMPLATE_WORKSPACE_ID    = {}",
        config
            .template_workspace_id
            .map(|v| v.to_string())
            .unwrap_or_else(|| "(create blank)".into())
    );
    println!("BATCH_SIZE               = {}", config.batch_size);
    println!("MAX_RETRIES              = {}", config.max_retries);
    println!("RETRY_DELAY              = {:?}", config.retry_delay);
    println!("DRY_RUN                  = {}", config.dry_run);
    println!("LOG_LEVEL                = {}", config.log_level);
}

fn mask_tail(token: &str) -> &str {
    let len = token.len();
    &token[len.saturating_sub(4)..]
}
