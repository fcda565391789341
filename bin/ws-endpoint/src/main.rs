//! WebSub Callback Endpoint Server
//!
//! Serves the callback routes hubs use to verify subscribe/unsubscribe
//! intents, report denials and deliver content.
//!
//! Configuration comes from a TOML file and `WEBSUB_*` variables (see
//! `ws-config`); command-line flags override both.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tokio::{net::TcpListener, signal};
use tower_http::trace::TraceLayer;
use tracing::info;

use ws_config::ConfigLoader;
use ws_endpoint::{create_router, CallbackState};
use ws_store::{SqliteSubscriptionStore, SubscriptionStore};

#[derive(Parser, Debug)]
#[command(name = "ws-endpoint")]
#[command(about = "WebSub subscriber callback endpoint")]
struct Args {
    /// Config file path
    #[arg(long)]
    config: Option<PathBuf>,

    /// Listen host
    #[arg(long)]
    host: Option<String>,

    /// Listen port
    #[arg(long)]
    port: Option<u16>,

    /// SQLite database URL, e.g. sqlite://websub.db
    #[arg(long)]
    database: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();

    ws_common::logging::init_logging("ws-endpoint");

    let args = Args::parse();

    let loader = match &args.config {
        Some(path) => ConfigLoader::with_path(path),
        None => ConfigLoader::new(),
    };
    let mut config = loader.load()?;
    if let Some(host) = args.host {
        config.http.host = host;
    }
    if let Some(port) = args.port {
        config.http.port = port;
    }
    if let Some(database) = args.database {
        config.database.url = database;
    }
    config.validate()?;

    info!(version = env!("CARGO_PKG_VERSION"), "Starting WebSub callback endpoint");

    let store = Arc::new(SqliteSubscriptionStore::connect(&config.database).await?);
    store.init_schema().await?;

    let state = CallbackState::new(store, config.endpoint.max_content_bytes);
    let app = create_router(state).layer(TraceLayer::new_for_http());

    let addr = config.http.bind_address();
    let listener = TcpListener::bind(&addr).await?;
    info!(addr = %addr, "Callback endpoint listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Callback endpoint shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_args_definition() {
        Args::command().debug_assert();
    }
}
