//! # Subsystem Container
//!
//! Holds one node's subsystem instances and the adapters behind their ports.
//!
//! ## Initialization Order
//!
//! ```text
//! Phase 1: Identity (validated config, node key, keyring entry)
//! Phase 2: Shared infrastructure (event bus, content store)
//! Phase 3: Dissemination (mm-01)
//! Phase 4: Update pipeline (mm-02) with category appliers
//! Phase 5: Self-healing (mm-03), broadcasting through mm-01
//! Phase 6: Relay verifiers registered on mm-01, node joins the mesh
//! ```
//!
//! Self-healing and dissemination never reference each other directly:
//! self-healing broadcasts through [`FixBroadcastAdapter`] and dissemination
//! screens Fix envelopes through [`HealingRelayVerifier`], both registered
//! after construction.

use std::sync::Arc;

use mm_01_dissemination::{DisseminationApi, DisseminationPorts, DisseminationService};
use mm_02_update_pipeline::adapters::{standard_appliers, BlocklistApplier, ConfigMerger};
use mm_02_update_pipeline::{PipelinePorts, UpdatePipelineService};
use mm_03_self_healing::{HealingPorts, SelfHealingService};
use shared_bus::InMemoryEventBus;
use shared_crypto::{CryptoError, Ed25519KeyPair, Ed25519PublicKey, NodeKeyring};
use shared_types::{
    ContentStore, InMemoryContentStore, NodeId, StoreError, TimeSource, UpdateCategory,
};
use thiserror::Error;
use tracing::{info, instrument};

use crate::adapters::{
    FixBroadcastAdapter, FsContentStore, HealingRelayVerifier, KeyringSigner, KeyringVerifier,
    LocalFixExecutor, LoopbackMesh, PipelineRelayVerifier,
};
use crate::container::config::{ConfigError, NodeConfig};

#[derive(Debug, Error)]
pub enum ContainerError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Node key: {0}")]
    Crypto(#[from] CryptoError),

    #[error("Content store: {0}")]
    Store(#[from] StoreError),
}

/// All subsystems of one mesh node.
pub struct SubsystemContainer {
    pub node_id: NodeId,

    /// Dissemination (mm-01)
    pub dissemination: Arc<DisseminationService>,
    /// Update pipeline (mm-02)
    pub pipeline: Arc<UpdatePipelineService>,
    /// Self-healing (mm-03)
    pub healing: Arc<SelfHealingService>,

    // =========================================================================
    // SHARED INFRASTRUCTURE
    // =========================================================================
    pub event_bus: Arc<InMemoryEventBus>,
    pub store: Arc<dyn ContentStore>,
    pub keyring: Arc<NodeKeyring>,
    pub signer: Arc<KeyringSigner>,

    // =========================================================================
    // NODE STATE TOUCHED BY UPDATES AND FIXES
    // =========================================================================
    /// Configuration document shared by the Configuration applier and
    /// ConfigChange fixes.
    pub config_document: Arc<ConfigMerger>,
    pub blocklist: Arc<BlocklistApplier>,
    pub fix_executor: Arc<LocalFixExecutor>,

    pub config: NodeConfig,
}

impl SubsystemContainer {
    /// Builds a node and registers it on `mesh`.
    ///
    /// The node's public key is added to `keyring`; nodes sharing a keyring
    /// can verify each other.
    #[instrument(name = "subsystem_init", skip_all, fields(node = %config.identity.node_id))]
    pub async fn new(
        config: NodeConfig,
        mesh: Arc<LoopbackMesh>,
        keyring: Arc<NodeKeyring>,
        time: Arc<dyn TimeSource>,
    ) -> Result<Self, ContainerError> {
        // =====================================================================
        // PHASE 1: Identity
        // =====================================================================
        config.validate()?;
        let node_id = config.node_id();
        let keypair = match &config.identity.signing_seed {
            Some(seed) => Ed25519KeyPair::from_seed_hex(seed)?,
            None => Ed25519KeyPair::generate(),
        };
        let signer = Arc::new(KeyringSigner::new(keypair));
        keyring.register(node_id.clone(), signer.public_key());
        let verifier = Arc::new(KeyringVerifier::new(keyring.clone()));
        info!(node = %node_id, public_key = %signer.public_key().to_hex(), "Phase 1: identity ready");

        // =====================================================================
        // PHASE 2: Shared Infrastructure
        // =====================================================================
        let event_bus = Arc::new(InMemoryEventBus::with_capacity(config.bus.channel_capacity));
        let store: Arc<dyn ContentStore> = if config.storage.in_memory {
            Arc::new(InMemoryContentStore::new())
        } else {
            Arc::new(FsContentStore::open(config.storage.data_dir.join("payloads")).await?)
        };

        // =====================================================================
        // PHASE 3: Dissemination (mm-01)
        // =====================================================================
        let dissemination = Arc::new(DisseminationService::new(
            config.dissemination_config(),
            node_id.clone(),
            DisseminationPorts {
                transport: mesh.clone(),
                signer: signer.clone(),
                store: store.clone(),
                events: event_bus.clone(),
                time: time.clone(),
            },
        ));
        info!("  [mm-01] Dissemination initialized");

        // =====================================================================
        // PHASE 4: Update Pipeline (mm-02)
        // =====================================================================
        let pipeline = Arc::new(UpdatePipelineService::new(
            config.pipeline_config(),
            node_id.clone(),
            PipelinePorts {
                fetcher: mesh.clone(),
                verifier: verifier.clone(),
                store: store.clone(),
                events: event_bus.clone(),
                time: time.clone(),
            },
        ));
        for applier in standard_appliers() {
            pipeline.register_applier(applier);
        }
        let config_document = Arc::new(ConfigMerger::default());
        let blocklist = Arc::new(BlocklistApplier::new());
        pipeline.register_applier(config_document.clone());
        pipeline.register_applier(blocklist.clone());
        info!("  [mm-02] Update pipeline initialized");

        // =====================================================================
        // PHASE 5: Self-Healing (mm-03)
        // =====================================================================
        let fix_executor = Arc::new(LocalFixExecutor::new(
            config_document.clone(),
            config.healing.command_allowlist.clone(),
        ));
        let healing = Arc::new(SelfHealingService::new(
            config.healing_config(),
            node_id.clone(),
            HealingPorts {
                signer: signer.clone(),
                verifier: verifier.clone(),
                broadcaster: Arc::new(FixBroadcastAdapter::new(dissemination.clone())),
                executor: fix_executor.clone(),
                fetcher: mesh.clone(),
                store: store.clone(),
                events: event_bus.clone(),
                time,
            },
        ));
        info!("  [mm-03] Self-healing initialized");

        // =====================================================================
        // PHASE 6: Relay Verifiers and Mesh Membership
        // =====================================================================
        dissemination.set_default_verifier(Arc::new(PipelineRelayVerifier::new(pipeline.clone())));
        dissemination.register_verifier(
            UpdateCategory::Fix,
            Arc::new(HealingRelayVerifier::new(healing.clone())),
        );

        let engine: Arc<dyn DisseminationApi> = dissemination.clone();
        mesh.register(node_id.clone(), Arc::downgrade(&engine), store.clone());
        for peer in &config.dissemination.peers {
            dissemination.add_peer(NodeId::new(peer.as_str())).await;
        }
        info!(peers = dissemination.peers().len(), "Phase 6: node joined the mesh");

        Ok(Self {
            node_id,
            dissemination,
            pipeline,
            healing,
            event_bus,
            store,
            keyring,
            signer,
            config_document,
            blocklist,
            fix_executor,
            config,
        })
    }

    pub fn public_key(&self) -> Ed25519PublicKey {
        self.signer.public_key()
    }
}
