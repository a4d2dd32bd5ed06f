//! # MeshMend Node
//!
//! Entry point of a MeshMend node.
//!
//! ## Startup Sequence
//!
//! 1. Install logging (`RUST_LOG`, default `info`)
//! 2. Load configuration (TOML file from the first argument or `MESH_CONFIG`,
//!    then `MESH_*` environment overrides)
//! 3. Build the node and join the in-process mesh
//! 4. Start one in-memory node per configured peer (single-host demo mode)
//! 5. Start event handlers, log stats until Ctrl+C
//!
//! ```text
//!   mesh-node ──┬── node "edge-1" (configured, filesystem store)
//!               ├── node "edge-2" (demo peer, in memory)
//!               └── node "edge-3" (demo peer, in memory)
//!          all joined through one LoopbackMesh and one NodeKeyring
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use mm_01_dissemination::DisseminationApi;
use mm_02_update_pipeline::UpdatePipelineApi;
use mm_03_self_healing::SelfHealingApi;
use node_runtime::adapters::LoopbackMesh;
use node_runtime::{NodeConfig, NodeRuntime};
use shared_crypto::NodeKeyring;
use shared_types::{SystemTimeSource, TimeSource};
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

const STATS_INTERVAL: Duration = Duration::from_secs(30);

fn config_path() -> Option<PathBuf> {
    std::env::args_os()
        .nth(1)
        .map(PathBuf::from)
        .or_else(|| std::env::var_os("MESH_CONFIG").map(PathBuf::from))
}

/// A demo peer knows the main node and every other demo peer.
fn demo_peer_config(main: &NodeConfig, peer: &str) -> NodeConfig {
    let mut config = NodeConfig::in_memory(peer);
    config.dissemination.fanout = main.dissemination.fanout;
    config.dissemination.max_hops = main.dissemination.max_hops;
    config.pipeline = main.pipeline.clone();
    config.healing = main.healing.clone();
    config.dissemination.peers = std::iter::once(main.identity.node_id.clone())
        .chain(main.dissemination.peers.iter().filter(|p| p.as_str() != peer).cloned())
        .collect();
    config
}

fn log_stats(runtime: &NodeRuntime) {
    let container = runtime.container();
    let gossip = container.dissemination.stats();
    let pipeline = container.pipeline.stats();
    let healing = container.healing.stats();
    info!(
        node = %container.node_id,
        peers = gossip.peer_count,
        seen = gossip.seen_len,
        processed = gossip.processed,
        duplicates = gossip.duplicates,
        forwards = gossip.forwards_dispatched,
        applied = pipeline.applied,
        in_flight = pipeline.in_flight,
        issues = healing.issues_stored,
        fixes_applied = healing.fixes_applied,
        "Node stats"
    );
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let path = config_path();
    let config = NodeConfig::load(path.as_deref()).context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;

    info!("===========================================");
    info!("  MeshMend Node v{}", env!("CARGO_PKG_VERSION"));
    info!("  Node: {}", config.identity.node_id);
    info!("===========================================");

    let mesh = Arc::new(LoopbackMesh::new());
    let keyring = Arc::new(NodeKeyring::new());
    let time: Arc<dyn TimeSource> = Arc::new(SystemTimeSource);

    let demo_peers: Vec<NodeConfig> = config
        .dissemination
        .peers
        .iter()
        .map(|peer| demo_peer_config(&config, peer))
        .collect();

    let main_node = NodeRuntime::new(config, mesh.clone(), keyring.clone(), time.clone())
        .await
        .context("Failed to build node")?;

    let mut peers = Vec::with_capacity(demo_peers.len());
    for peer_config in demo_peers {
        let peer_id = peer_config.identity.node_id.clone();
        let peer = NodeRuntime::new(peer_config, mesh.clone(), keyring.clone(), time.clone())
            .await
            .with_context(|| format!("Failed to build demo peer {}", peer_id))?;
        peers.push(peer);
    }

    main_node.start();
    for peer in &peers {
        peer.start();
    }
    info!(nodes = mesh.nodes().len(), "Node is running. Press Ctrl+C to stop.");

    let mut stats = tokio::time::interval(STATS_INTERVAL);
    stats.tick().await;
    loop {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                signal.context("Failed to listen for Ctrl+C")?;
                break;
            }
            _ = stats.tick() => log_stats(&main_node),
        }
    }

    for peer in &peers {
        peer.shutdown().await;
    }
    main_node.shutdown().await;

    Ok(())
}
