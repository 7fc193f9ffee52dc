use std::env;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;
use tracing::info;

use reservation_service::config::{ServiceConfig, CONFIG_PATH_ENV};
use reservation_service::store::ScyllaStore;
use reservation_service::{build_router, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    let config_path =
        env::var(CONFIG_PATH_ENV).with_context(|| format!("{CONFIG_PATH_ENV} must be set"))?;
    let config = ServiceConfig::load(Path::new(&config_path))?;
    info!(
        account = %config.account.name,
        keyspace = %config.cassandra.keyspace,
        "loaded configuration"
    );

    let store = ScyllaStore::connect(&config.cassandra).await?;
    let state = AppState {
        store: Arc::new(store),
    };
    let app = build_router(state);

    let ip: std::net::IpAddr = config.network.server.ip.parse()?;
    let addr = SocketAddr::from((ip, config.network.server.port));
    info!(%addr, "starting reservation-service");
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
