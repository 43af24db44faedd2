//! Trait abstraction for the ledger the pipeline submits to.
//!
//! The ledger accepts a content reference, integrity digest and category,
//! and later reports the submission finalized (with a typed result) or
//! rejected. Implementations:
//! - **JSON-RPC**: HTTP JSON-RPC 2.0 endpoint fronting the contract
//! - **Mock**: in-memory ledger with scripted behaviour and call counters

use crate::config::DEFAULT_POLL_INTERVAL;
use crate::crypto::IntegrityDigest;
use crate::record::Category;
use crate::storage::ContentReference;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Ledger-issued identifier of an accepted submission (e.g. a transaction
/// hash). Safe to poll repeatedly.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConfirmationId(String);

impl ConfirmationId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for ConfirmationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Ledger-assigned contribution number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContributionId(pub u64);

impl fmt::Display for ContributionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What the pipeline sends to the ledger, exactly once per contribution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionRequest {
    pub content_reference: ContentReference,
    pub category: Category,
    pub integrity_digest: IntegrityDigest,
}

/// Typed payload of a finalized submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalizedResult {
    pub contribution_id: ContributionId,
    pub reward_amount: u128,
    /// Block (or sequence number) the submission was finalized in, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block: Option<u64>,
}

/// Single observation of a submission's state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfirmationStatus {
    Pending,
    Finalized(FinalizedResult),
    Rejected { reason: String },
}

/// Result of waiting for a submission to settle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfirmationOutcome {
    Finalized(FinalizedResult),
    Rejected { reason: String },
    TimedOut,
}

/// Aggregate counts read from the ledger.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerStats {
    pub total_contributions: u64,
    pub by_category: BTreeMap<Category, u64>,
    pub total_rewards: u128,
}

/// A finalized contribution as recorded on the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContributionEntry {
    pub contribution_id: ContributionId,
    pub content_reference: ContentReference,
    pub integrity_digest: IntegrityDigest,
    pub category: Category,
    pub reward_amount: u128,
}

/// Whether a ledger's finalizations are real.
///
/// `Simulated` ledgers invent contribution ids and rewards in process; their
/// results must never be mistaken for on-chain finality.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerMode {
    #[default]
    Live,
    Simulated,
}

/// Result type for ledger operations.
pub type LedgerResult<T> = Result<T, LedgerError>;

/// Ledger transport and protocol errors. An explicit rejection of a
/// submission is not an error here; it is a `ConfirmationStatus`.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Ledger unavailable: {0}")]
    Unavailable(String),

    #[error("Ledger RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("Invalid response from ledger: {0}")]
    InvalidResponse(String),

    #[error("Unknown confirmation id: {0}")]
    UnknownConfirmation(ConfirmationId),
}

impl From<reqwest::Error> for LedgerError {
    fn from(e: reqwest::Error) -> Self {
        LedgerError::Unavailable(e.to_string())
    }
}

/// Trait abstraction for ledger operations.
///
/// Enables mock implementations for testing.
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Submit a request; returns once the ledger has accepted it (not
    /// necessarily finalized).
    async fn submit(&self, request: &SubmissionRequest) -> LedgerResult<ConfirmationId>;

    /// Observe the current state of a submission. Idempotent.
    async fn confirmation_status(&self, id: &ConfirmationId) -> LedgerResult<ConfirmationStatus>;

    /// Wait until the submission is finalized or rejected, or `patience`
    /// runs out. Safe to call again with the same id after `TimedOut`.
    async fn await_confirmation(
        &self,
        id: &ConfirmationId,
        patience: Duration,
    ) -> LedgerResult<ConfirmationOutcome> {
        super::confirm::poll_until_final(self, id, patience, self.poll_interval()).await
    }

    /// Interval between confirmation polls.
    fn poll_interval(&self) -> Duration {
        DEFAULT_POLL_INTERVAL
    }

    /// Aggregate counts.
    async fn read_stats(&self) -> LedgerResult<LedgerStats>;

    /// Look up a finalized contribution.
    async fn contribution(&self, id: ContributionId) -> LedgerResult<Option<ContributionEntry>>;

    /// `Simulated` for in-process ledgers.
    fn mode(&self) -> LedgerMode {
        LedgerMode::Live
    }

    /// Short backend name for logs.
    fn backend_name(&self) -> &'static str;
}
