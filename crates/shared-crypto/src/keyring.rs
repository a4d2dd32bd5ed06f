//! # Node Keyring
//!
//! Maps node ids to their Ed25519 public keys. An origin is verifiable only
//! once its key has been registered here.

use std::collections::HashMap;

use parking_lot::RwLock;
use shared_types::NodeId;

use crate::signatures::{Ed25519PublicKey, Ed25519Signature};
use crate::CryptoError;

/// Known public keys, shared by every verifier on a node.
#[derive(Default)]
pub struct NodeKeyring {
    keys: RwLock<HashMap<NodeId, Ed25519PublicKey>>,
}

impl NodeKeyring {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers or replaces the key for `node`.
    pub fn register(&self, node: NodeId, key: Ed25519PublicKey) {
        self.keys.write().insert(node, key);
    }

    pub fn revoke(&self, node: &NodeId) -> bool {
        self.keys.write().remove(node).is_some()
    }

    pub fn key_for(&self, node: &NodeId) -> Option<Ed25519PublicKey> {
        self.keys.read().get(node).copied()
    }

    pub fn knows(&self, node: &NodeId) -> bool {
        self.keys.read().contains_key(node)
    }

    pub fn len(&self) -> usize {
        self.keys.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.read().is_empty()
    }

    /// Verifies `signature` over `message` by `signer`.
    pub fn verify(&self, signer: &NodeId, message: &[u8], signature: &[u8]) -> Result<(), CryptoError> {
        let key = self
            .key_for(signer)
            .ok_or_else(|| CryptoError::UnknownSigner(signer.to_string()))?;
        let signature = Ed25519Signature::from_slice(signature)?;
        key.verify(message, &signature)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Ed25519KeyPair;

    #[test]
    fn test_verify_known_and_unknown_signer() {
        let keyring = NodeKeyring::new();
        let alice = Ed25519KeyPair::generate();
        keyring.register(NodeId::new("alice"), alice.public_key());

        let sig = alice.sign(b"msg").to_vec();
        assert!(keyring.verify(&NodeId::new("alice"), b"msg", &sig).is_ok());
        assert_eq!(
            keyring.verify(&NodeId::new("bob"), b"msg", &sig),
            Err(CryptoError::UnknownSigner("bob".into()))
        );
        assert_eq!(
            keyring.verify(&NodeId::new("alice"), b"other", &sig),
            Err(CryptoError::SignatureVerificationFailed)
        );
        assert_eq!(
            keyring.verify(&NodeId::new("alice"), b"msg", &[]),
            Err(CryptoError::InvalidSignatureFormat(0))
        );
    }

    #[test]
    fn test_revoke() {
        let keyring = NodeKeyring::new();
        keyring.register(NodeId::new("a"), Ed25519KeyPair::generate().public_key());
        assert!(keyring.knows(&NodeId::new("a")));
        assert!(keyring.revoke(&NodeId::new("a")));
        assert!(!keyring.revoke(&NodeId::new("a")));
        assert!(keyring.is_empty());
    }
}
