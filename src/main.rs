mod cli;

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use cli::Cli;
use graveyard::scheduler::Scheduler;
use graveyard::server::{self, AppContext};
use gy_core::EventBus;
use gy_db::init_pool;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing. Respect RUST_LOG; otherwise derive the level
    // from the debug flag. With --log-dir, logs additionally go to a
    // daily-rotated file.
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.debug {
            "graveyard=debug,gy_db=debug,tower_http=debug".to_string()
        } else {
            "graveyard=info,gy_db=info".to_string()
        }
    });

    let _file_guard = match &cli.log_dir {
        Some(log_dir) => {
            std::fs::create_dir_all(log_dir)
                .with_context(|| format!("creating log dir {}", log_dir.display()))?;
            let appender = tracing_appender::rolling::daily(log_dir, "graveyard.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::fmt()
                .with_env_filter(EnvFilter::new(&env_filter))
                .with_writer(writer)
                .with_ansi(false)
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(EnvFilter::new(&env_filter))
                .init();
            None
        }
    };

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(run(cli))
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    // Singleton behavior: a busy port means another instance runs.
    let listener = match TcpListener::bind(("127.0.0.1", cli.port)).await {
        Ok(listener) => listener,
        Err(e) if e.kind() == std::io::ErrorKind::AddrInUse => {
            eprintln!(
                "port {} is already in use; is graveyard already running?",
                cli.port
            );
            std::process::exit(1);
        }
        Err(e) => return Err(e).with_context(|| format!("binding port {}", cli.port)),
    };

    if let Some(parent) = cli.database.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating data dir {}", parent.display()))?;
    }
    std::fs::create_dir_all(&cli.cache_dir)
        .with_context(|| format!("creating cache dir {}", cli.cache_dir.display()))?;

    let db_path = cli.database.to_string_lossy().to_string();
    let pool = init_pool(&db_path).context("opening the archive database")?;

    let bus = Arc::new(EventBus::default());
    let (scheduler, events_rx) = Scheduler::new(pool.clone(), cli.cache_dir.clone(), bus.clone());

    scheduler
        .start_workers()
        .map_err(|e| anyhow::anyhow!(e.to_string()))?;
    tokio::spawn(scheduler.clone().run_event_loop(events_rx));

    tracing::info!(port = cli.port, database = %cli.database.display(), "graveyard started");

    let ctx = AppContext {
        pool,
        scheduler: scheduler.clone(),
        bus,
    };

    let result = server::serve(listener, ctx).await;

    tracing::info!("shutting down");
    scheduler.stop_workers();
    result.context("serving")
}
