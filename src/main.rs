use anyhow::Context;
use clap::{Parser, Subcommand};
use comfy_table::Table;
use configuration::Settings;
use engine::{PgQueryInput, TimerScheduler};
use events::StdoutRouter;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;

mod telemetry;

/// The main entry point for the pg-query input.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load PG_QUERY__* overrides from a .env file, if there is one.
    dotenvy::dotenv().ok();

    // Parse command-line arguments
    let cli = Cli::parse();
    let _log_guard = telemetry::init(cli.log_dir.as_deref())?;

    // Configuration errors are fatal: nothing is started.
    let settings = configuration::load_config(&cli.config)
        .with_context(|| format!("Invalid configuration in {}", cli.config.display()))?;

    // Execute the appropriate command
    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => handle_run(settings).await,
        Commands::Once => handle_once(settings).await,
        Commands::Check => handle_check(settings),
    }
}

// ==============================================================================
// CLI Structure
// ==============================================================================

/// Periodically runs SQL queries against PostgreSQL and emits every row as a
/// tagged JSON event on stdout.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long, short, default_value = "pg_query.toml")]
    config: PathBuf,

    /// Also write logs to a daily rolling file in this directory.
    #[arg(long)]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Clone, Copy)]
enum Commands {
    /// Poll on the configured interval until interrupted (default).
    Run,
    /// Run every query once, then exit.
    Once,
    /// Validate the configuration and list the queries without connecting.
    Check,
}

// ==============================================================================
// Command Logic
// ==============================================================================

async fn handle_run(settings: Settings) -> anyhow::Result<()> {
    let mut input = PgQueryInput::configure(settings, Arc::new(StdoutRouter::new()))?;

    let mut scheduler = TimerScheduler::new();
    input.start(&mut scheduler);

    let (stop_tx, stop_rx) = watch::channel(false);
    tokio::spawn(async move {
        shutdown_signal().await;
        tracing::info!("Shutdown requested, finishing the current cycle.");
        let _ = stop_tx.send(true);
    });

    scheduler.run(&mut input, stop_rx).await;
    input.shutdown().await;
    Ok(())
}

async fn handle_once(settings: Settings) -> anyhow::Result<()> {
    let mut input = PgQueryInput::configure(settings, Arc::new(StdoutRouter::new()))?;
    input.run_queries().await;
    input.shutdown().await;
    Ok(())
}

fn handle_check(settings: Settings) -> anyhow::Result<()> {
    println!(
        "Configuration OK: {}:{}/{} (sslmode {}), every {}s, {} attempt(s) {}s apart",
        settings.host,
        settings.port,
        settings.database,
        settings.sslmode,
        settings.interval,
        settings.try_count.max(1),
        settings.try_delay
    );

    // Building the input validates it end to end; no connection is opened.
    let input = PgQueryInput::configure(settings, Arc::new(StdoutRouter::new()))?;
    let executor = input.executor();

    let mut table = Table::new();
    table.set_header(vec!["#", "Tag", "SQL"]);
    for (index, query) in executor.queries().iter().enumerate() {
        table.add_row(vec![
            (index + 1).to_string(),
            executor.event_tag(query.tag.as_deref()),
            query.sql.clone(),
        ]);
    }
    println!("{table}");
    Ok(())
}

/// Resolves on ctrl-c, or SIGTERM on unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for ctrl-c.");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM.");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
