//! Pipeline stages and the typed failure of every pipeline operation.

use crate::crypto::{CipherError, IntegrityDigest};
use crate::ledger::{ConfirmationId, ContributionId, LedgerError};
use crate::storage::StoreError;
use std::fmt;
use thiserror::Error;

/// Stage of a single `submit` (or retrieval) invocation.
///
/// `Validating → Anonymizing → Encrypting → Storing → Digesting →
/// Submitting → Confirming → Succeeded`, or `Retrieving → Verifying →
/// Decrypting` on the read path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineStage {
    Validating,
    Anonymizing,
    Encrypting,
    Storing,
    Digesting,
    Submitting,
    Confirming,
    Succeeded,
    Retrieving,
    Verifying,
    Decrypting,
}

impl PipelineStage {
    pub fn as_str(self) -> &'static str {
        match self {
            PipelineStage::Validating => "validating",
            PipelineStage::Anonymizing => "anonymizing",
            PipelineStage::Encrypting => "encrypting",
            PipelineStage::Storing => "storing",
            PipelineStage::Digesting => "digesting",
            PipelineStage::Submitting => "submitting",
            PipelineStage::Confirming => "confirming",
            PipelineStage::Succeeded => "succeeded",
            PipelineStage::Retrieving => "retrieving",
            PipelineStage::Verifying => "verifying",
            PipelineStage::Decrypting => "decrypting",
        }
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Typed failure of a pipeline operation.
#[derive(Debug, Error)]
pub enum ContributionError {
    #[error("Invalid category: {0}")]
    InvalidCategory(String),

    #[error("Storage failed: {0}")]
    Storage(#[from] StoreError),

    #[error("Ledger call failed: {0}")]
    Ledger(#[from] LedgerError),

    #[error("Ledger rejected submission {confirmation_id}: {reason}")]
    LedgerRejected {
        confirmation_id: ConfirmationId,
        reason: String,
    },

    #[error("Confirmation not observed in time for {confirmation_id}; poll again with the same id")]
    ConfirmationTimeout { confirmation_id: ConfirmationId },

    #[error("Polling confirmation {confirmation_id} failed: {source}; poll again with the same id")]
    ConfirmationFailed {
        confirmation_id: ConfirmationId,
        #[source]
        source: LedgerError,
    },

    #[error("Encryption failed: {0}")]
    Encryption(CipherError),

    #[error("Decryption failed: {0}")]
    Decryption(CipherError),

    #[error("Serialization failed: {0}")]
    Serialization(String),

    #[error("Integrity digest mismatch: expected {expected}, got {actual}")]
    IntegrityMismatch {
        expected: IntegrityDigest,
        actual: IntegrityDigest,
    },

    #[error("No contribution with id {0} on the ledger")]
    UnknownContribution(ContributionId),
}

impl ContributionError {
    /// Whether retrying can succeed without changing the input.
    ///
    /// Storage and ledger transport failures warrant rerunning the pipeline;
    /// a confirmation timeout warrants re-polling, never resubmitting.
    pub fn is_retryable(&self) -> bool {
        match self {
            ContributionError::Storage(err) => !matches!(
                err,
                StoreError::InvalidReference(_) | StoreError::NotFound(_) | StoreError::Corrupted(_)
            ),
            ContributionError::Ledger(err) => crate::ledger::confirm::is_ledger_error_retryable(err),
            ContributionError::ConfirmationTimeout { .. } => true,
            ContributionError::ConfirmationFailed { source, .. } => {
                !matches!(source, LedgerError::UnknownConfirmation(_))
            }
            _ => false,
        }
    }

    /// Stage the failure belongs to.
    pub fn stage(&self) -> PipelineStage {
        match self {
            ContributionError::InvalidCategory(_) => PipelineStage::Validating,
            ContributionError::Storage(_) => PipelineStage::Storing,
            ContributionError::Ledger(_) => PipelineStage::Submitting,
            ContributionError::LedgerRejected { .. }
            | ContributionError::ConfirmationTimeout { .. }
            | ContributionError::ConfirmationFailed { .. } => PipelineStage::Confirming,
            ContributionError::Encryption(_) | ContributionError::Serialization(_) => {
                PipelineStage::Encrypting
            }
            ContributionError::Decryption(_) => PipelineStage::Decrypting,
            ContributionError::IntegrityMismatch { .. } => PipelineStage::Verifying,
            ContributionError::UnknownContribution(_) => PipelineStage::Retrieving,
        }
    }

    /// Confirmation id to re-poll with, if the ledger accepted the submission.
    pub fn confirmation_id(&self) -> Option<&ConfirmationId> {
        match self {
            ContributionError::LedgerRejected { confirmation_id, .. }
            | ContributionError::ConfirmationTimeout { confirmation_id }
            | ContributionError::ConfirmationFailed { confirmation_id, .. } => Some(confirmation_id),
            _ => None,
        }
    }
}
