//! Ledger submission and confirmation.
//!
//! The pipeline submits each contribution exactly once and then polls for
//! finality. Polling is idempotent and may be resumed with the confirmation
//! id after a timeout.

pub mod confirm;
pub mod json_rpc;
pub mod mock;
pub mod traits;

pub use confirm::{backoff_interval, poll_until_final, MAX_POLL_INTERVAL};
pub use json_rpc::JsonRpcLedgerClient;
pub use mock::{MockBehavior, MockLedgerClient};
pub use traits::{
    ConfirmationId, ConfirmationOutcome, ConfirmationStatus, ContributionEntry, ContributionId,
    FinalizedResult, LedgerClient, LedgerError, LedgerMode, LedgerResult, LedgerStats,
    SubmissionRequest,
};
