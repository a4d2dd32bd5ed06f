//! # MeshMend Test Suite
//!
//! Cross-crate scenarios run against real nodes joined through an
//! in-process mesh.
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! └── integration/
//!     ├── support.rs    # TestMesh fixture, wait_until
//!     ├── gossip.rs     # dedup, hop bound, fan-out, end-to-end relay
//!     ├── pipeline.rs   # freshness, trust, unsafe payloads, failure feedback
//!     └── healing.rs    # fix dissemination and confidence gating
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p mm-tests
//! cargo test -p mm-tests integration::gossip::
//! ```

pub mod integration;
