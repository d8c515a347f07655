use clap::{Parser, ValueEnum};
use std::net::SocketAddr;
use std::path::PathBuf;
use tendering_core::StoreConfig;
use tendering_service::{build_router, fixtures, ServiceConfig, ServiceState};
use tracing::info;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum StorageMode {
    Auto,
    Memory,
    Postgres,
}

#[derive(Debug, Parser)]
#[command(name = "tenderingd", version, about = "Tendering marketplace REST service")]
struct Cli {
    /// Socket address to bind, e.g. 127.0.0.1:8080
    #[arg(long, default_value = "127.0.0.1:8080", env = "SERVER_ADDRESS")]
    listen: SocketAddr,
    /// Storage backend. `auto` picks postgres when a database url is configured.
    #[arg(long, value_enum, default_value_t = StorageMode::Auto, env = "TENDERING_STORAGE")]
    storage: StorageMode,
    /// PostgreSQL url for tender/bid persistence.
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,
    /// Max PostgreSQL pool connections.
    #[arg(long, default_value_t = 5, env = "TENDERING_PG_MAX_CONNECTIONS")]
    pg_max_connections: u32,
    /// JSON file with directory rows (organizations, employees,
    /// responsibility links) seeded at startup.
    #[arg(long, env = "TENDERING_FIXTURES")]
    fixtures: Option<PathBuf>,
}

fn resolve_storage(cli: &Cli) -> anyhow::Result<StoreConfig> {
    let storage = match cli.storage {
        StorageMode::Memory => StoreConfig::Memory,
        StorageMode::Postgres => {
            let database_url = cli.database_url.clone().ok_or_else(|| {
                anyhow::anyhow!("storage=postgres requires --database-url or DATABASE_URL")
            })?;
            StoreConfig::postgres(database_url, cli.pg_max_connections)
        }
        StorageMode::Auto => match cli.database_url.clone() {
            Some(database_url) => StoreConfig::postgres(database_url, cli.pg_max_connections),
            None => StoreConfig::Memory,
        },
    };

    Ok(storage)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "tendering_service=info,info".to_string()),
        )
        .init();

    let cli = Cli::parse();
    let storage = resolve_storage(&cli)?;
    let backend = storage.label();

    let directory = match &cli.fixtures {
        Some(path) => Some(fixtures::load(path)?),
        None => None,
    };

    let state = ServiceState::bootstrap(ServiceConfig { storage, directory }).await?;
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(cli.listen).await?;
    info!(backend, "tendering-service listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutting down");
        })
        .await?;

    Ok(())
}
