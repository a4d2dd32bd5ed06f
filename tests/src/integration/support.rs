//! Test fixture: a set of nodes sharing one `LoopbackMesh`, one keyring and
//! one manually driven clock.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use node_runtime::adapters::LoopbackMesh;
use node_runtime::{NodeConfig, NodeRuntime, SubsystemContainer};
use shared_crypto::NodeKeyring;
use shared_types::{FixedTimeSource, NodeId, TimeSource};

/// Clock start for every test mesh.
pub const BASE_TIME: u64 = 1_700_000_000;

/// How long `wait_until` polls before failing the test.
pub const WAIT_TIMEOUT: Duration = Duration::from_secs(5);

pub struct TestMesh {
    pub mesh: Arc<LoopbackMesh>,
    pub keyring: Arc<NodeKeyring>,
    pub time: Arc<FixedTimeSource>,
    nodes: BTreeMap<String, NodeRuntime>,
}

impl Default for TestMesh {
    fn default() -> Self {
        Self::new()
    }
}

impl TestMesh {
    pub fn new() -> Self {
        Self {
            mesh: Arc::new(LoopbackMesh::new()),
            keyring: Arc::new(NodeKeyring::new()),
            time: Arc::new(FixedTimeSource::new(BASE_TIME)),
            nodes: BTreeMap::new(),
        }
    }

    /// Adds an in-memory node gossiping to `peers`, with default settings.
    pub async fn add_node(&mut self, id: &str, peers: &[&str]) -> Arc<SubsystemContainer> {
        self.add_node_with(id, peers, |_| {}).await
    }

    /// Adds a node after letting `tweak` adjust its configuration.
    pub async fn add_node_with(
        &mut self,
        id: &str,
        peers: &[&str],
        tweak: impl FnOnce(&mut NodeConfig),
    ) -> Arc<SubsystemContainer> {
        let mut config = NodeConfig::in_memory(id);
        config.dissemination.peers = peers.iter().map(|p| p.to_string()).collect();
        tweak(&mut config);

        let time: Arc<dyn TimeSource> = self.time.clone();
        let runtime = NodeRuntime::new(config, self.mesh.clone(), self.keyring.clone(), time)
            .await
            .expect("node builds");
        runtime.start();
        let container = runtime.container();
        self.nodes.insert(id.to_string(), runtime);
        container
    }

    pub fn node(&self, id: &str) -> Arc<SubsystemContainer> {
        self.nodes
            .get(id)
            .unwrap_or_else(|| panic!("no node {}", id))
            .container()
    }

    pub fn ids(&self) -> Vec<NodeId> {
        self.nodes.keys().map(|id| NodeId::new(id.as_str())).collect()
    }

    pub async fn shutdown(self) {
        for runtime in self.nodes.values() {
            runtime.shutdown().await;
        }
    }
}

/// Polls `condition` until it holds, panicking after `WAIT_TIMEOUT`.
pub async fn wait_until(what: &str, condition: impl Fn() -> bool) {
    let deadline = tokio::time::Instant::now() + WAIT_TIMEOUT;
    while !condition() {
        if tokio::time::Instant::now() >= deadline {
            panic!("timed out waiting for {}", what);
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Lets spawned sends and handler tasks run for a moment, for asserting
/// that something did NOT happen.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(100)).await;
}

/// Runs `future` with the default wait timeout.
pub async fn within<T>(what: &str, future: impl Future<Output = T>) -> T {
    tokio::time::timeout(WAIT_TIMEOUT, future)
        .await
        .unwrap_or_else(|_| panic!("timed out waiting for {}", what))
}
