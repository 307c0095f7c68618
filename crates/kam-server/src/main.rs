use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use kam::store::{MemoryStore, SqliteStore, Store};
use kam::{Registry, RegistryConfig, DEFAULT_MAX_TTL_SECONDS};
use kam_server::{AppState, ServerConfig};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "kam-server")]
#[command(about = "Key Authorization Mapping service")]
struct Args {
    #[arg(long, env = "KAM_LISTEN", default_value = "127.0.0.1:8000")]
    listen: SocketAddr,

    #[arg(long, env = "KAM_DB_PATH", default_value = "kam.db")]
    db_path: PathBuf,

    /// Keep records in memory only; nothing survives a restart.
    #[arg(long)]
    memory: bool,

    /// Log filter, e.g. `info` or `kam=debug,tower_http=debug`.
    #[arg(long, env = "KAM_LOG", default_value = "info")]
    log: String,

    #[arg(long, env = "KAM_MAX_BODY_BYTES", default_value_t = 64 * 1024)]
    max_body_bytes: usize,

    #[arg(long, env = "KAM_REQUEST_TIMEOUT_MS", default_value_t = 10_000)]
    request_timeout_ms: u64,

    #[arg(long, env = "KAM_MAX_TTL_SECONDS", default_value_t = DEFAULT_MAX_TTL_SECONDS)]
    max_ttl_seconds: i64,
}

impl Args {
    fn config(&self) -> ServerConfig {
        ServerConfig {
            listen: self.listen,
            db_path: self.db_path.clone(),
            max_body_bytes: self.max_body_bytes,
            request_timeout_ms: self.request_timeout_ms,
            registry: RegistryConfig {
                max_ttl_seconds: self.max_ttl_seconds,
            },
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // RUST_LOG wins over --log when set.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = args.config();
    if args.memory {
        tracing::warn!("using in-memory store; records will not survive a restart");
        run(MemoryStore::new(), config).await
    } else {
        let store = SqliteStore::open(&config.db_path)
            .with_context(|| format!("opening {}", config.db_path.display()))?;
        run(store, config).await
    }
}

async fn run<S: Store + 'static>(store: S, config: ServerConfig) -> anyhow::Result<()> {
    let registry = Registry::new(store, config.registry.clone());
    let listener = tokio::net::TcpListener::bind(config.listen)
        .await
        .with_context(|| format!("binding {}", config.listen))?;

    tracing::info!(
        addr = %config.listen,
        db_path = %config.db_path.display(),
        max_ttl_seconds = config.registry.max_ttl_seconds,
        "starting KAM server"
    );

    kam_server::serve(listener, AppState::new(registry), &config, shutdown_signal()).await?;

    tracing::info!("KAM server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown requested");
}
