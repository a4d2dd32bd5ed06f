//! # Shared Crypto
//!
//! ## Components
//!
//! | Module | Algorithm | Use Case |
//! |--------|-----------|----------|
//! | `signatures` | Ed25519 | Envelope and fix signing |
//! | `keyring` | Ed25519 | Origin public key lookup |
//! | `hashing` | SHA-256, BLAKE3 | Payload digests, issue pattern keys |
//!
//! ## Security Properties
//!
//! - **Ed25519**: Deterministic nonces, no RNG dependency
//! - **SHA-256**: Wire-visible digest; all nodes must agree on it

#![warn(clippy::all)]

pub mod errors;
pub mod hashing;
pub mod keyring;
pub mod signatures;

// Re-exports
pub use errors::CryptoError;
pub use hashing::{content_digest, is_content_digest, matches_content_digest, pattern_key};
pub use keyring::NodeKeyring;
pub use signatures::{Ed25519KeyPair, Ed25519PublicKey, Ed25519Signature};
