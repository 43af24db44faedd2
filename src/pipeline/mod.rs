//! Privacy-preserving contribution pipeline.
//!
//! Wires the anonymizer, cipher, blob store, digest and ledger together and
//! reports each contribution as a typed `ContributionResult` or a typed
//! `ContributionError`.

pub mod contribution;
pub mod error;

pub use contribution::{ContributionPipeline, ContributionResult, CONFIRMATION_GRACE};
pub use error::{ContributionError, PipelineStage};
