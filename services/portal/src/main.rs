//! PrepDesk portal entry point.
//!
//! # Purpose
//! `serve` (the default) runs the HTTP API and the metrics listener. The
//! batch commands reconcile the user collection against a roster file or the
//! students directory and print their report as JSON; they fail only on
//! fatal errors, never on per-record ones.
use anyhow::Context;
use clap::{Parser, Subcommand};
use portal::app::{build_router, build_state, build_store};
use portal::config::PortalConfig;
use portal::datasets::Datasets;
use portal::observability;
use portal::roster::{backfill_role_numbers, import_roster};
use prepdesk_identity::roster::{AccessControlDocument, RolePolicy};
use serde::Serialize;
use std::future::Future;
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(name = "portal")]
#[command(about = "PrepDesk student portal")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP server and the metrics listener
    Serve,
    /// Reconcile an access-control document into the user collection
    ImportRoster {
        file: PathBuf,
        /// json-wins or protect-super-admins; defaults to the configured policy
        #[arg(long)]
        policy: Option<RolePolicy>,
    },
    /// Union every known role number into each student record
    BackfillRoleNumbers {
        /// Access-control document whose student identifiers are also merged
        #[arg(long)]
        access_control: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = PortalConfig::from_env_or_yaml().context("portal config")?;
    let _metrics = observability::init_observability(&config.environment);

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => {
            run_with_shutdown(config, async {
                let _ = tokio::signal::ctrl_c().await;
            })
            .await
        }
        Command::ImportRoster { file, policy } => {
            let document = read_roster(&file)?;
            let store = build_store(&config)?;
            let policy = policy.unwrap_or(config.role_policy);
            let report = import_roster(store.as_ref(), &document, policy)
                .await
                .context("roster import")?;
            print_report(&report)
        }
        Command::BackfillRoleNumbers { access_control } => {
            let roster = access_control.as_deref().map(read_roster).transpose()?;
            let datasets = Datasets::load(&config.data_dir)?;
            let store = build_store(&config)?;
            let report =
                backfill_role_numbers(store.as_ref(), &datasets.directory, roster.as_ref())
                    .await
                    .context("role-number backfill")?;
            print_report(&report)
        }
    }
}

fn read_roster(path: &Path) -> anyhow::Result<AccessControlDocument> {
    let raw =
        std::fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    AccessControlDocument::from_json_str(&raw).with_context(|| format!("parse {}", path.display()))
}

fn print_report<T: Serialize>(report: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(report)?);
    Ok(())
}

async fn run_with_shutdown<F>(config: PortalConfig, shutdown: F) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let metrics_handle = observability::init_observability(&config.environment);
    let state = build_state(&config)?;
    let backend = state.store.backend_name();

    let (metrics_stop, metrics_stopped) = tokio::sync::oneshot::channel::<()>();
    let metrics_task = tokio::spawn(observability::serve_metrics(
        metrics_handle,
        config.metrics_bind,
        async move {
            let _ = metrics_stopped.await;
        },
    ));

    let app = build_router(state);
    let addr = config.bind_addr;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, %backend, environment = %config.environment, "portal listening");
    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown)
        .await?;

    let _ = metrics_stop.send(());
    match metrics_task.await {
        Ok(Err(err)) => tracing::warn!(error = %err, "metrics listener failed"),
        Err(err) => tracing::warn!(error = %err, "metrics task panicked"),
        Ok(Ok(())) => {}
    }
    Ok(())
}
