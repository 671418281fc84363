//! bionic-core - Core library for Bionic Memory
//!
//! This crate provides the pure engine pieces shared by the SDK, CLI and server:
//!
//! - **decay**: Newton-cooling decay model and cooling profiles
//! - **clustering**: Clustering suppression of near-duplicate candidates
//! - **store**: Vector store seam with in-memory and SQLite backends
//! - **types**: Records, tiers and stats
//! - **utils**: Record ids, timestamps and validation

pub mod clustering;
pub mod decay;
pub mod error;
pub mod store;
pub mod types;
pub mod utils;

// Re-export commonly used types
pub use clustering::{ClusteringSuppression, RetrievalParameters};
pub use decay::{CoolingProfile, DecayModel};
pub use error::{Error, Result};
pub use store::{InMemoryVectorStore, Selector, VectorStore, WhereFilter};
#[cfg(feature = "db")]
pub use store::SqliteVectorStore;
pub use types::*;
