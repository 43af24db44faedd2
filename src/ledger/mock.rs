//! Mock ledger for testing.
//!
//! Submissions are held pending and settled on poll according to a
//! configurable `MockBehavior`. Once settled, the outcome is fixed, so
//! repeated polls of the same id return the same result.

use super::traits::*;
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// Reward credited per finalized contribution unless overridden.
pub const DEFAULT_MOCK_REWARD: u128 = 100;

/// How pending submissions settle when polled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockBehavior {
    /// Finalize on the first poll.
    FinalizeImmediately,
    /// Stay pending for this many polls, then finalize.
    FinalizeAfterPolls(u32),
    /// Reject on the first poll with this reason.
    Reject(String),
    /// Stay pending forever.
    NeverFinalize,
}

/// Mock ledger client for testing.
#[derive(Clone)]
pub struct MockLedgerClient {
    state: Arc<Mutex<MockState>>,
}

struct MockState {
    behavior: MockBehavior,
    reward: u128,
    poll_interval: Duration,
    submit_failure: Option<String>,
    pending: HashMap<ConfirmationId, PendingSubmission>,
    settled: HashMap<ConfirmationId, ConfirmationStatus>,
    entries: BTreeMap<ContributionId, ContributionEntry>,
    submissions: Vec<SubmissionRequest>,
    next_contribution_id: u64,
    submit_calls: usize,
    status_calls: usize,
}

struct PendingSubmission {
    request: SubmissionRequest,
    polls: u32,
}

impl MockLedgerClient {
    /// Create a mock ledger that finalizes on the first poll.
    pub fn new() -> Self {
        Self::with_behavior(MockBehavior::FinalizeImmediately)
    }

    pub fn with_behavior(behavior: MockBehavior) -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState {
                behavior,
                reward: DEFAULT_MOCK_REWARD,
                poll_interval: Duration::from_millis(5),
                submit_failure: None,
                pending: HashMap::new(),
                settled: HashMap::new(),
                entries: BTreeMap::new(),
                submissions: Vec::new(),
                next_contribution_id: 1,
                submit_calls: 0,
                status_calls: 0,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Change how still-pending submissions settle from now on.
    pub fn set_behavior(&self, behavior: MockBehavior) {
        self.lock().behavior = behavior;
    }

    pub fn set_reward(&self, reward: u128) {
        self.lock().reward = reward;
    }

    pub fn set_poll_interval(&self, interval: Duration) {
        self.lock().poll_interval = interval;
    }

    /// Make every subsequent `submit` fail with `LedgerError::Unavailable`.
    pub fn fail_submits(&self, message: impl Into<String>) {
        self.lock().submit_failure = Some(message.into());
    }

    pub fn heal(&self) {
        self.lock().submit_failure = None;
    }

    pub fn submit_calls(&self) -> usize {
        self.lock().submit_calls
    }

    pub fn status_calls(&self) -> usize {
        self.lock().status_calls
    }

    /// Every request accepted so far, in submission order.
    pub fn submissions(&self) -> Vec<SubmissionRequest> {
        self.lock().submissions.clone()
    }
}

impl Default for MockLedgerClient {
    fn default() -> Self {
        Self::new()
    }
}

impl MockState {
    fn finalize(&mut self, id: &ConfirmationId, request: SubmissionRequest) -> ConfirmationStatus {
        let contribution_id = ContributionId(self.next_contribution_id);
        self.next_contribution_id += 1;

        self.entries.insert(
            contribution_id,
            ContributionEntry {
                contribution_id,
                content_reference: request.content_reference,
                integrity_digest: request.integrity_digest,
                category: request.category,
                reward_amount: self.reward,
            },
        );

        let status = ConfirmationStatus::Finalized(FinalizedResult {
            contribution_id,
            reward_amount: self.reward,
            block: Some(contribution_id.0),
        });
        self.settled.insert(id.clone(), status.clone());
        status
    }
}

#[async_trait]
impl LedgerClient for MockLedgerClient {
    async fn submit(&self, request: &SubmissionRequest) -> LedgerResult<ConfirmationId> {
        let mut state = self.lock();
        state.submit_calls += 1;

        if let Some(message) = &state.submit_failure {
            return Err(LedgerError::Unavailable(message.clone()));
        }

        let id = ConfirmationId::new(format!("0x{}", uuid::Uuid::new_v4().simple()));
        state.submissions.push(request.clone());
        state.pending.insert(
            id.clone(),
            PendingSubmission {
                request: request.clone(),
                polls: 0,
            },
        );
        Ok(id)
    }

    async fn confirmation_status(&self, id: &ConfirmationId) -> LedgerResult<ConfirmationStatus> {
        let mut state = self.lock();
        state.status_calls += 1;

        if let Some(status) = state.settled.get(id) {
            return Ok(status.clone());
        }

        let behavior = state.behavior.clone();
        let polls = match state.pending.get_mut(id) {
            Some(pending) => {
                pending.polls += 1;
                pending.polls
            }
            None => return Err(LedgerError::UnknownConfirmation(id.clone())),
        };

        let settle = match behavior {
            MockBehavior::FinalizeImmediately => true,
            MockBehavior::FinalizeAfterPolls(n) => polls > n,
            MockBehavior::Reject(_) => true,
            MockBehavior::NeverFinalize => false,
        };
        if !settle {
            return Ok(ConfirmationStatus::Pending);
        }

        let Some(pending) = state.pending.remove(id) else {
            return Err(LedgerError::UnknownConfirmation(id.clone()));
        };

        match behavior {
            MockBehavior::Reject(reason) => {
                let status = ConfirmationStatus::Rejected { reason };
                state.settled.insert(id.clone(), status.clone());
                Ok(status)
            }
            _ => Ok(state.finalize(id, pending.request)),
        }
    }

    fn poll_interval(&self) -> Duration {
        self.lock().poll_interval
    }

    async fn read_stats(&self) -> LedgerResult<LedgerStats> {
        let state = self.lock();
        let mut stats = LedgerStats::default();
        for entry in state.entries.values() {
            stats.total_contributions += 1;
            *stats.by_category.entry(entry.category).or_insert(0) += 1;
            stats.total_rewards += entry.reward_amount;
        }
        Ok(stats)
    }

    async fn contribution(&self, id: ContributionId) -> LedgerResult<Option<ContributionEntry>> {
        Ok(self.lock().entries.get(&id).cloned())
    }

    fn mode(&self) -> LedgerMode {
        LedgerMode::Simulated
    }

    fn backend_name(&self) -> &'static str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{ChunkDigest, FlatDigest};
    use crate::record::Category;
    use crate::storage::ContentReference;

    fn request(category: Category) -> SubmissionRequest {
        SubmissionRequest {
            content_reference: ContentReference::sha256_of(b"blob"),
            category,
            integrity_digest: FlatDigest.digest(b"blob"),
        }
    }

    #[tokio::test]
    async fn test_finalize_immediately() {
        let ledger = MockLedgerClient::new();
        let id = ledger.submit(&request(Category::TradingData)).await.unwrap();

        let result = match ledger.confirmation_status(&id).await.unwrap() {
            ConfirmationStatus::Finalized(result) => result,
            other => panic!("expected finalized, got {:?}", other),
        };
        assert_eq!(result.contribution_id, ContributionId(1));
        assert_eq!(result.reward_amount, DEFAULT_MOCK_REWARD);
    }

    #[test]
    fn test_mock_ledger_is_simulated() {
        assert_eq!(MockLedgerClient::new().mode(), LedgerMode::Simulated);
    }

    #[tokio::test]
    async fn test_settled_status_is_stable() {
        let ledger = MockLedgerClient::new();
        let id = ledger.submit(&request(Category::RiskMetrics)).await.unwrap();

        let first = ledger.confirmation_status(&id).await.unwrap();
        let second = ledger.confirmation_status(&id).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(ledger.read_stats().await.unwrap().total_contributions, 1);
    }

    #[tokio::test]
    async fn test_finalize_after_polls() {
        let ledger = MockLedgerClient::with_behavior(MockBehavior::FinalizeAfterPolls(2));
        let id = ledger.submit(&request(Category::MlDataset)).await.unwrap();

        assert_eq!(ledger.confirmation_status(&id).await.unwrap(), ConfirmationStatus::Pending);
        assert_eq!(ledger.confirmation_status(&id).await.unwrap(), ConfirmationStatus::Pending);
        assert!(matches!(
            ledger.confirmation_status(&id).await.unwrap(),
            ConfirmationStatus::Finalized(_)
        ));
    }

    #[tokio::test]
    async fn test_reject() {
        let ledger =
            MockLedgerClient::with_behavior(MockBehavior::Reject("duplicate digest".to_string()));
        let id = ledger.submit(&request(Category::ComplianceData)).await.unwrap();

        assert_eq!(
            ledger.confirmation_status(&id).await.unwrap(),
            ConfirmationStatus::Rejected {
                reason: "duplicate digest".to_string()
            }
        );
        assert_eq!(ledger.read_stats().await.unwrap().total_contributions, 0);
    }

    #[tokio::test]
    async fn test_never_finalize_then_release() {
        let ledger = MockLedgerClient::with_behavior(MockBehavior::NeverFinalize);
        let id = ledger.submit(&request(Category::MarketSignals)).await.unwrap();

        let outcome = ledger
            .await_confirmation(&id, Duration::from_millis(20))
            .await
            .unwrap();
        assert_eq!(outcome, ConfirmationOutcome::TimedOut);

        ledger.set_behavior(MockBehavior::FinalizeImmediately);
        let outcome = ledger
            .await_confirmation(&id, Duration::from_millis(20))
            .await
            .unwrap();
        assert!(matches!(outcome, ConfirmationOutcome::Finalized(_)));
        assert_eq!(ledger.submit_calls(), 1);
    }

    #[tokio::test]
    async fn test_unknown_confirmation() {
        let ledger = MockLedgerClient::new();
        let result = ledger
            .confirmation_status(&ConfirmationId::new("0xmissing"))
            .await;
        assert!(matches!(result, Err(LedgerError::UnknownConfirmation(_))));
    }

    #[tokio::test]
    async fn test_submit_failure_injection() {
        let ledger = MockLedgerClient::new();
        ledger.fail_submits("rpc down");

        let result = ledger.submit(&request(Category::TradingData)).await;
        assert!(matches!(result, Err(LedgerError::Unavailable(_))));
        assert_eq!(ledger.submit_calls(), 1);
        assert!(ledger.submissions().is_empty());

        ledger.heal();
        assert!(ledger.submit(&request(Category::TradingData)).await.is_ok());
    }

    #[tokio::test]
    async fn test_stats_and_lookup() {
        let ledger = MockLedgerClient::new();
        ledger.set_reward(250);

        for category in [Category::TradingData, Category::TradingData, Category::MlDataset] {
            let id = ledger.submit(&request(category)).await.unwrap();
            ledger.confirmation_status(&id).await.unwrap();
        }

        let stats = ledger.read_stats().await.unwrap();
        assert_eq!(stats.total_contributions, 3);
        assert_eq!(stats.by_category[&Category::TradingData], 2);
        assert_eq!(stats.by_category[&Category::MlDataset], 1);
        assert_eq!(stats.total_rewards, 750);

        let entry = ledger.contribution(ContributionId(3)).await.unwrap().unwrap();
        assert_eq!(entry.category, Category::MlDataset);
        assert!(ledger.contribution(ContributionId(99)).await.unwrap().is_none());
    }
}
