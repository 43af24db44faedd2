//! Shroud - privacy-preserving data contribution pipeline
//!
//! Records are anonymized and encrypted locally, stored by content address,
//! and only their reference and integrity digest are submitted to a ledger.
//!
//! Key principles:
//! - Identity never leaves the process (subject ids are hashed)
//! - Only ciphertext reaches storage
//! - Store first, then reference from the ledger
//! - Submit at most once; confirmation polling is safe to repeat

pub mod config;
pub mod crypto;
pub mod ledger;
pub mod pipeline;
pub mod record;
pub mod storage;

pub use config::PipelineConfig;
pub use pipeline::{ContributionError, ContributionPipeline, ContributionResult};
