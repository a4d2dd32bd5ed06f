//! # Node Runtime
//!
//! Owns one node's container and the handler tasks that connect its
//! subsystems.
//!
//! ## Startup Sequence
//!
//! 1. Build the container (identity, bus, store, mm-01, mm-02, mm-03)
//! 2. Subscribe the handlers to the bus
//! 3. Spawn the handlers
//!
//! ## Shutdown Sequence
//!
//! 1. Leave the mesh so peers stop reaching this node
//! 2. Signal shutdown to all handlers
//! 3. Wait for them to drain (bounded)

use std::sync::Arc;
use std::time::Duration;

use mm_01_dissemination::DisseminationApi;
use parking_lot::Mutex;
use shared_bus::{EventFilter, EventTopic};
use shared_crypto::NodeKeyring;
use shared_types::TimeSource;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::adapters::LoopbackMesh;
use crate::container::{ContainerError, NodeConfig, SubsystemContainer};
use crate::handlers::{EnvelopeRouter, FailureFeedbackHandler};

/// How long shutdown waits for handlers before abandoning them.
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// One running mesh node.
pub struct NodeRuntime {
    container: Arc<SubsystemContainer>,
    mesh: Arc<LoopbackMesh>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
    handlers: Mutex<Vec<JoinHandle<()>>>,
}

impl NodeRuntime {
    pub async fn new(
        config: NodeConfig,
        mesh: Arc<LoopbackMesh>,
        keyring: Arc<NodeKeyring>,
        time: Arc<dyn TimeSource>,
    ) -> Result<Self, ContainerError> {
        info!(node = %config.identity.node_id, "Creating MeshMend node runtime");
        let container = Arc::new(SubsystemContainer::new(config, mesh.clone(), keyring, time).await?);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        Ok(Self {
            container,
            mesh,
            shutdown_tx,
            shutdown_rx,
            handlers: Mutex::new(Vec::new()),
        })
    }

    /// Spawns the handlers. Calling it again while running is a no-op.
    pub fn start(&self) {
        let mut handlers = self.handlers.lock();
        if !handlers.is_empty() {
            warn!(node = %self.container.node_id, "Node runtime already started");
            return;
        }

        let bus = &self.container.event_bus;

        let router = EnvelopeRouter::new(
            bus.subscribe(EventFilter::topics(vec![EventTopic::Dissemination])),
            self.container.pipeline.clone(),
            self.container.healing.clone(),
        );
        handlers.push(tokio::spawn(router.run(self.shutdown_rx.clone())));

        let feedback = FailureFeedbackHandler::new(
            bus.subscribe(EventFilter::topics(vec![EventTopic::Pipeline, EventTopic::SelfHealing])),
            self.container.healing.clone(),
        );
        handlers.push(tokio::spawn(feedback.run(self.shutdown_rx.clone())));

        info!(
            node = %self.container.node_id,
            peers = self.container.dissemination.peers().len(),
            "Node runtime started"
        );
    }

    pub async fn shutdown(&self) {
        info!(node = %self.container.node_id, "Initiating graceful shutdown...");
        self.mesh.unregister(&self.container.node_id);

        if let Err(e) = self.shutdown_tx.send(true) {
            error!("Failed to send shutdown signal: {}", e);
        }

        let handlers: Vec<_> = self.handlers.lock().drain(..).collect();
        for handle in handlers {
            match tokio::time::timeout(SHUTDOWN_GRACE, handle).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => error!(error = %e, "Handler task failed"),
                Err(_) => warn!("Handler did not stop within the grace period"),
            }
        }

        info!(node = %self.container.node_id, "Shutdown complete");
    }

    pub fn container(&self) -> Arc<SubsystemContainer> {
        Arc::clone(&self.container)
    }

    pub fn is_running(&self) -> bool {
        !self.handlers.lock().is_empty() && !*self.shutdown_rx.borrow()
    }
}
