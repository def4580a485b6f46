//! shopwatchd — the shopwatch daemon.
//!
//! Single binary that assembles the whole service:
//! - Shop state store (redb)
//! - One in-process work queue per operation
//! - Orchestration controller
//! - REST API
//! - Scheduled orchestration loops
//!
//! # Usage
//!
//! ```text
//! shopwatchd run --port 8080 --data-dir /var/lib/shopwatch --country DE
//! ```

use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tokio::sync::watch;
use tracing::{error, info, warn};

use shopwatch_core::types::{OperationType, OrchestrationDefaults, OrchestrationRequest};
use shopwatch_orchestrator::OrchestrationController;
use shopwatch_queue::InMemoryWorkQueue;
use shopwatch_state::ShopStateStore;

#[derive(Parser)]
#[command(name = "shopwatchd", about = "shopwatch daemon")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the daemon (API server plus scheduled orchestration runs).
    Run {
        /// Port to listen on.
        #[arg(long, default_value = "8080")]
        port: u16,

        /// Data directory for persistent state.
        #[arg(long, default_value = "/var/lib/shopwatch")]
        data_dir: PathBuf,

        /// Country partition scheduled runs operate on.
        #[arg(long, default_value = "DE")]
        country: String,

        /// Days a completion must age before a shop is due again.
        #[arg(long, default_value = "2")]
        cutoff_days: i64,

        /// Seconds between scheduled crawl orchestrations (0 disables).
        #[arg(long, default_value = "3600")]
        crawl_interval: u64,

        /// Seconds between scheduled scrape orchestrations (0 disables).
        #[arg(long, default_value = "3600")]
        scrape_interval: u64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,shopwatchd=debug,shopwatch=debug".parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Run {
            port,
            data_dir,
            country,
            cutoff_days,
            crawl_interval,
            scrape_interval,
        } => {
            run_daemon(
                port,
                data_dir,
                country,
                cutoff_days,
                crawl_interval,
                scrape_interval,
            )
            .await
        }
    }
}

async fn run_daemon(
    port: u16,
    data_dir: PathBuf,
    country: String,
    cutoff_days: i64,
    crawl_interval: u64,
    scrape_interval: u64,
) -> anyhow::Result<()> {
    info!("shopwatch daemon starting");

    // Ensure data directory exists.
    std::fs::create_dir_all(&data_dir)?;
    let db_path = data_dir.join("shopwatch.redb");

    // ── Initialize subsystems ──────────────────────────────────

    let store = ShopStateStore::open(&db_path)?;
    info!(path = ?db_path, "state store opened");

    let mut queues: HashMap<OperationType, Arc<dyn shopwatch_core::ports::WorkQueue>> =
        HashMap::new();
    for operation in [OperationType::Crawl, OperationType::Scrape] {
        let queue_name = operation.spec().queue_name;
        queues.insert(operation, Arc::new(InMemoryWorkQueue::new(queue_name)));
        info!(queue = queue_name, "work queue initialized");
    }

    let defaults = OrchestrationDefaults {
        country,
        cutoff_days,
    };
    let mut controller = OrchestrationController::new(Arc::new(store.clone()), defaults);
    for (operation, queue) in &queues {
        controller = controller.with_queue(*operation, queue.clone());
    }
    let controller = Arc::new(controller);
    info!("orchestration controller initialized");

    // ── Shutdown signal ────────────────────────────────────────

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // ── Scheduled orchestration loops ──────────────────────────

    let mut loop_handles = Vec::new();
    for (operation, interval) in [
        (OperationType::Crawl, crawl_interval),
        (OperationType::Scrape, scrape_interval),
    ] {
        if interval == 0 {
            warn!(operation = operation.as_str(), "scheduled runs disabled");
            continue;
        }
        let controller = controller.clone();
        let shutdown = shutdown_rx.clone();
        loop_handles.push(tokio::spawn(async move {
            schedule_loop(controller, operation, Duration::from_secs(interval), shutdown).await;
        }));
    }

    // ── Start API server ───────────────────────────────────────

    let router = shopwatch_api::build_router(shopwatch_api::ApiState {
        store,
        controller,
        queues,
    });
    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    info!(%addr, "API server starting");

    let listener = tokio::net::TcpListener::bind(addr).await?;

    // Graceful shutdown on Ctrl-C.
    let server = axum::serve(listener, router).with_graceful_shutdown(async move {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install CTRL+C handler");
        info!("shutdown signal received");
        let _ = shutdown_tx.send(true);
    });

    server.await?;

    // Wait for background loops.
    for handle in loop_handles {
        let _ = handle.await;
    }

    info!("shopwatch daemon stopped");
    Ok(())
}

/// Run one operation's orchestration on a fixed interval until shutdown.
async fn schedule_loop(
    controller: Arc<OrchestrationController>,
    operation: OperationType,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    info!(
        operation = operation.as_str(),
        interval_secs = interval.as_secs(),
        "orchestration loop started"
    );

    let request = OrchestrationRequest {
        operation: operation.as_str().to_string(),
        country: None,
        cutoff_days: None,
    };

    loop {
        tokio::select! {
            _ = tokio::time::sleep(interval) => {
                match controller.run(&request).await {
                    Ok(summary) => info!(
                        operation = operation.as_str(),
                        shops_found = summary.shops_found,
                        shops_enqueued = summary.shops_enqueued,
                        shops_failed = summary.shops_failed,
                        "scheduled orchestration completed"
                    ),
                    Err(e) => error!(
                        operation = operation.as_str(),
                        error = %e,
                        "scheduled orchestration failed"
                    ),
                }
            }
            _ = shutdown.changed() => {
                info!(operation = operation.as_str(), "orchestration loop shutting down");
                break;
            }
        }
    }
}
