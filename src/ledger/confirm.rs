//! Confirmation polling with capped exponential backoff.
//!
//! - Poll `confirmation_status` until finalized, rejected, or out of patience
//! - Interval doubles after each pending poll, capped at `MAX_POLL_INTERVAL`
//! - Transient transport errors are polled through; anything else returns
//!
//! Polling never resubmits. Calling again with the same id after `TimedOut`
//! picks up where the ledger is.

use super::traits::{
    ConfirmationId, ConfirmationOutcome, ConfirmationStatus, LedgerClient, LedgerError,
    LedgerResult,
};
use std::time::Duration;
use tokio::time::{sleep, Instant};

/// Upper bound for the interval between polls.
pub const MAX_POLL_INTERVAL: Duration = Duration::from_secs(30);

/// Poll until the submission settles or `patience` elapses.
pub async fn poll_until_final<L>(
    ledger: &L,
    id: &ConfirmationId,
    patience: Duration,
    initial_interval: Duration,
) -> LedgerResult<ConfirmationOutcome>
where
    L: LedgerClient + ?Sized,
{
    let deadline = Instant::now() + patience;
    let mut attempt: u32 = 0;

    loop {
        match ledger.confirmation_status(id).await {
            Ok(ConfirmationStatus::Finalized(result)) => {
                return Ok(ConfirmationOutcome::Finalized(result))
            }
            Ok(ConfirmationStatus::Rejected { reason }) => {
                return Ok(ConfirmationOutcome::Rejected { reason })
            }
            Ok(ConfirmationStatus::Pending) => {}
            Err(err) if is_ledger_error_retryable(&err) => {
                tracing::warn!(
                    confirmation_id = %id,
                    attempt = attempt + 1,
                    error = %err,
                    "confirmation poll failed, will retry"
                );
            }
            Err(err) => return Err(err),
        }

        let now = Instant::now();
        if now >= deadline {
            tracing::debug!(confirmation_id = %id, attempts = attempt + 1, "confirmation timed out");
            return Ok(ConfirmationOutcome::TimedOut);
        }

        let wait = backoff_interval(initial_interval, attempt).min(deadline - now);
        sleep(wait).await;
        attempt = attempt.saturating_add(1);
    }
}

/// `initial * 2^attempt`, capped at `MAX_POLL_INTERVAL`.
pub fn backoff_interval(initial: Duration, attempt: u32) -> Duration {
    let factor = 2u32.saturating_pow(attempt.min(16));
    initial.saturating_mul(factor).min(MAX_POLL_INTERVAL)
}

/// Only transport failures are worth polling through.
pub fn is_ledger_error_retryable(err: &LedgerError) -> bool {
    matches!(err, LedgerError::Unavailable(_))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::traits::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    type Step = fn() -> LedgerResult<ConfirmationStatus>;

    /// Ledger whose status calls follow a script, then repeat the last entry.
    struct ScriptedLedger {
        script: Vec<Step>,
        polls: AtomicU32,
    }

    impl ScriptedLedger {
        fn new(script: Vec<Step>) -> Self {
            Self {
                script,
                polls: AtomicU32::new(0),
            }
        }

        fn polls(&self) -> u32 {
            self.polls.load(Ordering::SeqCst)
        }
    }

    fn pending() -> LedgerResult<ConfirmationStatus> {
        Ok(ConfirmationStatus::Pending)
    }

    fn finalized() -> LedgerResult<ConfirmationStatus> {
        Ok(ConfirmationStatus::Finalized(FinalizedResult {
            contribution_id: ContributionId(7),
            reward_amount: 100,
            block: None,
        }))
    }

    fn rejected() -> LedgerResult<ConfirmationStatus> {
        Ok(ConfirmationStatus::Rejected {
            reason: "malformed digest".to_string(),
        })
    }

    fn unavailable() -> LedgerResult<ConfirmationStatus> {
        Err(LedgerError::Unavailable("connection reset".to_string()))
    }

    fn rpc_error() -> LedgerResult<ConfirmationStatus> {
        Err(LedgerError::Rpc {
            code: -32602,
            message: "invalid params".to_string(),
        })
    }

    #[async_trait]
    impl LedgerClient for ScriptedLedger {
        async fn submit(&self, _request: &SubmissionRequest) -> LedgerResult<ConfirmationId> {
            Ok(ConfirmationId::new("scripted"))
        }

        async fn confirmation_status(
            &self,
            _id: &ConfirmationId,
        ) -> LedgerResult<ConfirmationStatus> {
            let n = self.polls.fetch_add(1, Ordering::SeqCst) as usize;
            let step = self.script[n.min(self.script.len() - 1)];
            step()
        }

        fn poll_interval(&self) -> Duration {
            Duration::from_millis(1)
        }

        async fn read_stats(&self) -> LedgerResult<LedgerStats> {
            Ok(LedgerStats::default())
        }

        async fn contribution(
            &self,
            _id: ContributionId,
        ) -> LedgerResult<Option<ContributionEntry>> {
            Ok(None)
        }

        fn backend_name(&self) -> &'static str {
            "scripted"
        }
    }

    fn id() -> ConfirmationId {
        ConfirmationId::new("0xfeed")
    }

    #[tokio::test]
    async fn test_finalizes_after_pending_polls() {
        let ledger = ScriptedLedger::new(vec![pending as Step, pending, finalized]);
        let outcome = ledger
            .await_confirmation(&id(), Duration::from_secs(5))
            .await
            .unwrap();

        assert!(matches!(outcome, ConfirmationOutcome::Finalized(ref r) if r.contribution_id == ContributionId(7)));
        assert_eq!(ledger.polls(), 3);
    }

    #[tokio::test]
    async fn test_rejection_returned_immediately() {
        let ledger = ScriptedLedger::new(vec![rejected as Step]);
        let outcome = ledger
            .await_confirmation(&id(), Duration::from_secs(5))
            .await
            .unwrap();

        assert_eq!(
            outcome,
            ConfirmationOutcome::Rejected {
                reason: "malformed digest".to_string()
            }
        );
        assert_eq!(ledger.polls(), 1);
    }

    #[tokio::test]
    async fn test_times_out_when_never_final() {
        let ledger = ScriptedLedger::new(vec![pending as Step]);
        let outcome = ledger
            .await_confirmation(&id(), Duration::from_millis(30))
            .await
            .unwrap();

        assert_eq!(outcome, ConfirmationOutcome::TimedOut);
        assert!(ledger.polls() >= 1);
    }

    #[tokio::test]
    async fn test_zero_patience_polls_once() {
        let ledger = ScriptedLedger::new(vec![pending as Step]);
        let outcome = ledger.await_confirmation(&id(), Duration::ZERO).await.unwrap();

        assert_eq!(outcome, ConfirmationOutcome::TimedOut);
        assert_eq!(ledger.polls(), 1);
    }

    #[tokio::test]
    async fn test_polls_through_transient_errors() {
        let ledger = ScriptedLedger::new(vec![unavailable as Step, unavailable, finalized]);
        let outcome = ledger
            .await_confirmation(&id(), Duration::from_secs(5))
            .await
            .unwrap();

        assert!(matches!(outcome, ConfirmationOutcome::Finalized(_)));
    }

    #[tokio::test]
    async fn test_protocol_error_stops_polling() {
        let ledger = ScriptedLedger::new(vec![rpc_error as Step, finalized]);
        let result = ledger.await_confirmation(&id(), Duration::from_secs(5)).await;

        assert!(matches!(result, Err(LedgerError::Rpc { .. })));
        assert_eq!(ledger.polls(), 1);
    }

    #[test]
    fn test_backoff_interval() {
        let initial = Duration::from_millis(500);
        assert_eq!(backoff_interval(initial, 0), Duration::from_millis(500));
        assert_eq!(backoff_interval(initial, 1), Duration::from_secs(1));
        assert_eq!(backoff_interval(initial, 3), Duration::from_secs(4));
        assert_eq!(backoff_interval(initial, 10), MAX_POLL_INTERVAL);
        assert_eq!(backoff_interval(initial, u32::MAX), MAX_POLL_INTERVAL);
    }

    #[test]
    fn test_is_ledger_error_retryable() {
        assert!(is_ledger_error_retryable(&LedgerError::Unavailable(
            "timeout".to_string()
        )));
        assert!(!is_ledger_error_retryable(&LedgerError::InvalidResponse(
            "bad json".to_string()
        )));
        assert!(!is_ledger_error_retryable(&LedgerError::UnknownConfirmation(
            ConfirmationId::new("x")
        )));
    }
}
