//! # Signing Adapters
//!
//! Ed25519 signing with the node key and verification against the shared
//! [`NodeKeyring`]. One signer serves both envelope and fix signatures.

use std::sync::Arc;

use mm_01_dissemination::EnvelopeSigner;
use mm_02_update_pipeline::OriginVerifier;
use mm_03_self_healing::{FixSigner, FixVerifier};
use shared_crypto::{Ed25519KeyPair, Ed25519PublicKey, NodeKeyring};
use shared_types::NodeId;

/// Signs with the local node key.
pub struct KeyringSigner {
    keypair: Ed25519KeyPair,
}

impl KeyringSigner {
    pub fn new(keypair: Ed25519KeyPair) -> Self {
        Self { keypair }
    }

    pub fn public_key(&self) -> Ed25519PublicKey {
        self.keypair.public_key()
    }

    fn sign_bytes(&self, message: &[u8]) -> Vec<u8> {
        self.keypair.sign(message).to_vec()
    }
}

impl EnvelopeSigner for KeyringSigner {
    fn sign(&self, message: &[u8]) -> Result<Vec<u8>, String> {
        Ok(self.sign_bytes(message))
    }
}

impl FixSigner for KeyringSigner {
    fn sign(&self, message: &[u8]) -> Result<Vec<u8>, String> {
        Ok(self.sign_bytes(message))
    }
}

/// Verifies signatures by looking up the signer's registered key.
#[derive(Clone)]
pub struct KeyringVerifier {
    keyring: Arc<NodeKeyring>,
}

impl KeyringVerifier {
    pub fn new(keyring: Arc<NodeKeyring>) -> Self {
        Self { keyring }
    }
}

impl OriginVerifier for KeyringVerifier {
    fn verify(&self, origin: &NodeId, message: &[u8], signature: &[u8]) -> Result<(), String> {
        self.keyring
            .verify(origin, message, signature)
            .map_err(|e| e.to_string())
    }
}

impl FixVerifier for KeyringVerifier {
    fn verify(&self, signer: &NodeId, message: &[u8], signature: &[u8]) -> Result<(), String> {
        self.keyring
            .verify(signer, message, signature)
            .map_err(|e| e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_then_verify_through_keyring() {
        let keyring = Arc::new(NodeKeyring::new());
        let signer = KeyringSigner::new(Ed25519KeyPair::from_seed([7u8; 32]));
        keyring.register(NodeId::new("node-a"), signer.public_key());
        let verifier = KeyringVerifier::new(keyring);

        let sig = EnvelopeSigner::sign(&signer, b"id:1.0.0:hash:Configuration").unwrap();
        assert!(OriginVerifier::verify(&verifier, &NodeId::new("node-a"), b"id:1.0.0:hash:Configuration", &sig).is_ok());
        assert!(OriginVerifier::verify(&verifier, &NodeId::new("node-a"), b"tampered", &sig).is_err());

        let err = FixVerifier::verify(&verifier, &NodeId::new("node-b"), b"x", &sig).unwrap_err();
        assert!(err.contains("node-b"));
    }
}
