//! idmesh server binary.
//!
//! Startup order: configuration, logging, DB path check, policy load, store
//! seed, token service, then serve. Any failure before serving exits
//! non-zero.
//!
//! # Usage
//!
//! ```bash
//! JWT_SECRET=dev-secret idmesh
//! JWT_SECRET=dev-secret HTTP_PORT=9000 idmesh --json-logs
//! ```

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Parser;
use tokio::signal;
use tracing::info;

use idmesh_api::http::{create_router, AppState};
use idmesh_api::observability::{init_logging, parse_log_level, LoggingConfig};
use idmesh_domain::{PolicyLoader, PolicyStore};
use idmesh_server::seed::seed_initial_data;
use idmesh_server::{AuthzService, ServiceConfig, TokenService};
use idmesh_storage::MemoryRecordStore;

/// Identity and access microservice: tokens, SCIM provisioning, and ABAC
/// policy decisions.
#[derive(Parser, Debug)]
#[command(name = "idmesh")]
#[command(version, about, long_about = None)]
struct Args {
    /// Emit logs as JSON (for production log pipelines)
    #[arg(long)]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = ServiceConfig::from_env()?;

    init_logging(LoggingConfig {
        json_format: args.json_logs,
        default_level: parse_log_level(&config.log_level),
    });

    info!(version = env!("CARGO_PKG_VERSION"), "starting idmesh");

    // DB_PATH is reserved for the persistence driver; an unusable path is a
    // deployment error and aborts startup.
    prepare_db_path(&config.db_path)?;

    PolicyLoader::ensure_file(&config.policies_path)?;
    let set = PolicyLoader::load(&config.policies_path)?;
    info!(
        policies = set.explicit_rules().len(),
        path = %config.policies_path,
        "policy set loaded"
    );
    let policies = Arc::new(PolicyStore::new(set));

    let storage = MemoryRecordStore::new_shared();
    seed_initial_data(storage.as_ref()).await?;

    let tokens = Arc::new(TokenService::from_config(&config, Arc::clone(&storage))?);
    let authz = Arc::new(AuthzService::new(
        policies,
        PathBuf::from(&config.policies_path),
    ));

    let state = AppState::new(storage, tokens, authz);
    let router = create_router(state);

    let addr: SocketAddr = format!("0.0.0.0:{}", config.http_port).parse()?;
    info!(%addr, "HTTP server listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("server shutdown complete");
    Ok(())
}

/// Ensures the directory holding DB_PATH exists and is creatable.
fn prepare_db_path(db_path: &str) -> anyhow::Result<()> {
    if let Some(parent) = Path::new(db_path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .map_err(|e| anyhow::anyhow!("DB_PATH '{db_path}' is not usable: {e}"))?;
        }
    }
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
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
        _ = ctrl_c => {
            info!("received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            info!("received SIGTERM, initiating graceful shutdown");
        }
    }
}
