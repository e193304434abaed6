//! Proxy coordinator node.
//!
//! ```text
//!            admin API / proxy-cli                         peers
//!                   │                                        │
//!                   ▼                                        ▼
//!   ┌──────────────────────────────── node ───────────────────────────────┐
//!   │  http (axum) ── /admin/* ──┐          ┌── POST /cluster/rpc        │
//!   │                            ▼          ▼                             │
//!   │                       service (orchestrator, status cycle)          │
//!   │                            │                                        │
//!   │          ┌─────────────────┼──────────────────┐                     │
//!   │          ▼                 ▼                  ▼                     │
//!   │     coordinator      reset builder      cluster rpc (reqwest)       │
//!   │   (journal, gens)    (container walk)        │                      │
//!   │          │                                   ▼                      │
//!   │          ▼                                 peers                    │
//!   │     proxy handler ── master only ──▶ proxies                        │
//!   └─────────────────────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use clap::Parser;
use tokio::net::TcpListener;

use proxy_coordinator::cluster::HttpClusterRpc;
use proxy_coordinator::config::loader::load_config;
use proxy_coordinator::config::watcher::ConfigWatcher;
use proxy_coordinator::container::StaticContainer;
use proxy_coordinator::election::SwitchableElection;
use proxy_coordinator::lifecycle::{signals, Shutdown};
use proxy_coordinator::model::NodeId;
use proxy_coordinator::observability::{logging, metrics};
use proxy_coordinator::service::ServiceError;
use proxy_coordinator::{HttpServer, ProxyService};

#[derive(Parser)]
#[command(name = "proxy-coordinator")]
#[command(about = "Coordinates reverse-proxy registration across a cluster", long_about = None)]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "proxy-coordinator.toml")]
    config: PathBuf,

    /// Start as master regardless of `cluster.master`.
    #[arg(long)]
    master: bool,
}

#[tokio::main]
async fn main() -> Result<(), ServiceError> {
    let args = Args::parse();
    let config = load_config(&args.config)?;

    logging::init_logging(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "proxy-coordinator starting");

    tracing::info!(
        node = %config.node.name,
        bind_address = %config.node.bind_address,
        peers = config.cluster.peers.len(),
        proxies = config.proxies.addresses.len(),
        engines = config.engines.len(),
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let node_id = NodeId::generate(&config.node.name);
    let election = Arc::new(SwitchableElection::new(args.master || config.cluster.master));
    let rpc = Arc::new(HttpClusterRpc::new(
        &config.cluster.peers,
        Duration::from_millis(config.cluster.rpc_timeout_ms),
    )?);
    let container = Arc::new(StaticContainer::from_config(&config.engines));
    let listener = TcpListener::bind(&config.node.bind_address).await?;
    let shared = Arc::new(ArcSwap::from_pointee(config));

    let service = Arc::new(ProxyService::new(node_id, shared.clone(), election, rpc, container));
    service.start().await?;

    let runtime = tokio::runtime::Handle::current();
    let reloaded = service.clone();
    let watcher = ConfigWatcher::new(&args.config, shared).on_reload(move |config| {
        let service = reloaded.clone();
        let engines = config.engines.clone();
        runtime.spawn(async move {
            if let Err(e) = service.reload_engines(&engines).await {
                tracing::warn!(error = %e, "Failed to remove dropped engines from proxies");
            }
        });
    });
    let _watcher = match watcher.run() {
        Ok(watcher) => Some(watcher),
        Err(e) => {
            tracing::warn!(error = %e, "Config hot reload disabled");
            None
        }
    };

    let shutdown = Arc::new(Shutdown::new());
    signals::spawn_signal_listener(shutdown.clone());

    let cycle = {
        let service = service.clone();
        let signal = shutdown.subscribe();
        tokio::spawn(async move { service.run(signal).await })
    };

    let server = HttpServer::new(service.clone());
    let served = server.run(listener, shutdown.subscribe()).await;

    shutdown.trigger();
    if let Err(e) = cycle.await {
        tracing::error!(error = %e, "Status cycle task failed");
    }
    service.stop().await?;
    served?;

    tracing::info!("Shutdown complete");
    Ok(())
}
