//! The contribution pipeline.
//!
//! ```text
//! RawRecord ─▶ anonymize ─▶ encrypt ─▶ BlobStore::put ─▶ digest(ciphertext)
//!           ─▶ LedgerClient::submit ─▶ await confirmation ─▶ ContributionResult
//! ```
//!
//! Content is stored before the ledger ever sees its reference, so a ledger
//! failure can leave an orphaned blob but never a reference to missing
//! content. No step is retried here; re-polling a confirmation id is the
//! only safe repeat and is exposed as `await_confirmation`.

use super::error::{ContributionError, PipelineStage};
use crate::config::{
    ConfigError, DigestMode, LedgerBackend, PipelineConfig, StorageBackend,
    DEFAULT_CONFIRMATION_TIMEOUT,
};
use crate::crypto::{
    open_record, seal_record, AesGcmCipher, ChunkDigest, Cipher, CipherError, FlatDigest,
    IntegrityDigest, MerkleDigest,
};
use crate::ledger::{
    ConfirmationId, ConfirmationOutcome, ContributionId, FinalizedResult, JsonRpcLedgerClient,
    LedgerClient, LedgerMode, LedgerStats, MockLedgerClient, SubmissionRequest,
};
use crate::record::{AnonymizedRecord, Anonymizer, Category, RawRecord, UnknownCategory};
use crate::storage::{
    BlobStore, ContentReference, Durability, FsBlobStore, IpfsBlobStore, MemoryBlobStore,
};
use serde::{Deserialize, Serialize};
use std::num::NonZeroU64;
use std::sync::Arc;
use std::time::Duration;

/// Extra time granted beyond the confirmation timeout before the pipeline
/// stops waiting on a ledger client that ignores its patience argument.
pub const CONFIRMATION_GRACE: Duration = Duration::from_secs(5);

/// Successful outcome of one contribution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContributionResult {
    pub contribution_id: ContributionId,
    pub content_reference: ContentReference,
    pub reward_amount: u128,
    pub confirmation_id: ConfirmationId,
    pub integrity_digest: IntegrityDigest,
    pub category: Category,
    /// `Ephemeral` when the blob store keeps nothing beyond this process.
    pub durability: Durability,
    /// `Simulated` when the id and reward were invented by an in-process ledger.
    pub ledger: LedgerMode,
}

impl ContributionResult {
    /// Stored durably and finalized on a live ledger.
    pub fn is_authoritative(&self) -> bool {
        self.durability == Durability::Persistent && self.ledger == LedgerMode::Live
    }
}

/// Anonymize → encrypt → store → digest → submit → confirm.
///
/// Holds only shared, immutable capabilities; `submit` calls are
/// independent and may run concurrently.
#[derive(Clone)]
pub struct ContributionPipeline {
    store: Arc<dyn BlobStore>,
    ledger: Arc<dyn LedgerClient>,
    cipher: Arc<dyn Cipher>,
    digest: Arc<dyn ChunkDigest>,
    anonymizer: Anonymizer,
    confirmation_timeout: Duration,
}

impl ContributionPipeline {
    /// Pipeline with AES-256-GCM, a flat digest and default anonymization.
    pub fn new(store: Arc<dyn BlobStore>, ledger: Arc<dyn LedgerClient>) -> Self {
        Self {
            store,
            ledger,
            cipher: Arc::new(AesGcmCipher::new()),
            digest: Arc::new(FlatDigest),
            anonymizer: Anonymizer::new(),
            confirmation_timeout: DEFAULT_CONFIRMATION_TIMEOUT,
        }
    }

    pub fn with_cipher(mut self, cipher: Arc<dyn Cipher>) -> Self {
        self.cipher = cipher;
        self
    }

    pub fn with_digest(mut self, digest: Arc<dyn ChunkDigest>) -> Self {
        self.digest = digest;
        self
    }

    pub fn with_anonymizer(mut self, anonymizer: Anonymizer) -> Self {
        self.anonymizer = anonymizer;
        self
    }

    pub fn with_confirmation_timeout(mut self, timeout: Duration) -> Self {
        self.confirmation_timeout = timeout;
        self
    }

    /// Build backends and policies from validated configuration.
    pub fn from_config(config: &PipelineConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let store: Arc<dyn BlobStore> = match config.storage.backend {
            StorageBackend::Memory => Arc::new(MemoryBlobStore::new()),
            StorageBackend::Filesystem => {
                let path = config.storage.path.clone().ok_or_else(|| {
                    ConfigError::Invalid("storage.path is required".to_string())
                })?;
                Arc::new(FsBlobStore::new(path))
            }
            StorageBackend::Ipfs => {
                let api_url = config.storage.api_url.clone().unwrap_or_default();
                let store = IpfsBlobStore::new(api_url, config.storage.request_timeout)
                    .map_err(|e| ConfigError::Invalid(format!("IPFS client: {}", e)))?;
                Arc::new(store)
            }
        };

        let ledger: Arc<dyn LedgerClient> = match config.ledger.backend {
            LedgerBackend::Memory => {
                let ledger = MockLedgerClient::new();
                ledger.set_poll_interval(config.ledger.poll_interval);
                Arc::new(ledger)
            }
            LedgerBackend::JsonRpc => {
                let endpoint = config.ledger.endpoint.clone().unwrap_or_default();
                let client = JsonRpcLedgerClient::new(
                    endpoint,
                    config.ledger.request_timeout,
                    config.ledger.poll_interval,
                )
                .map_err(|e| ConfigError::Invalid(format!("ledger client: {}", e)))?;
                Arc::new(client)
            }
        };

        let digest: Arc<dyn ChunkDigest> = match config.digest.mode {
            DigestMode::Flat => Arc::new(FlatDigest),
            DigestMode::Merkle => Arc::new(MerkleDigest::new(config.digest.chunk_size)),
        };

        let bucket = NonZeroU64::new(config.anonymizer.amount_bucket).ok_or_else(|| {
            ConfigError::Invalid("anonymizer.amount_bucket must be greater than zero".to_string())
        })?;
        let mut anonymizer = Anonymizer::new().with_amount_bucket(bucket);
        if let Some(pepper) = &config.anonymizer.subject_pepper {
            anonymizer = anonymizer.with_subject_pepper(pepper);
        }

        tracing::info!(
            storage = store.backend_name(),
            ledger = ledger.backend_name(),
            digest = ?config.digest.mode,
            "contribution pipeline configured"
        );

        Ok(Self::new(store, ledger)
            .with_digest(digest)
            .with_anonymizer(anonymizer)
            .with_confirmation_timeout(config.ledger.confirmation_timeout))
    }

    pub fn store(&self) -> &Arc<dyn BlobStore> {
        &self.store
    }

    pub fn ledger(&self) -> &Arc<dyn LedgerClient> {
        &self.ledger
    }

    pub fn confirmation_timeout(&self) -> Duration {
        self.confirmation_timeout
    }

    /// Submit a record under a category given by name (`"TRADING_DATA"`) or
    /// ordinal (`"0"`). An unknown category fails before any I/O.
    pub async fn submit(
        &self,
        record: &RawRecord,
        category: &str,
        encryption_key: &str,
    ) -> Result<ContributionResult, ContributionError> {
        log_stage(PipelineStage::Validating);
        let category: Category = category
            .parse()
            .map_err(|UnknownCategory(input)| ContributionError::InvalidCategory(input))?;

        self.submit_category(record, category, encryption_key).await
    }

    /// Submit a record under a typed category.
    pub async fn submit_category(
        &self,
        record: &RawRecord,
        category: Category,
        encryption_key: &str,
    ) -> Result<ContributionResult, ContributionError> {
        log_stage(PipelineStage::Anonymizing);
        let anonymized = self.anonymizer.anonymize(record);

        log_stage(PipelineStage::Encrypting);
        let ciphertext = seal_record(self.cipher.as_ref(), &anonymized, encryption_key)
            .map_err(|e| match e {
                CipherError::Serialization(message) => ContributionError::Serialization(message),
                other => ContributionError::Encryption(other),
            })?;

        log_stage(PipelineStage::Storing);
        let content_reference = self.store.put(&ciphertext).await?;
        let durability = self.store.durability();
        if durability == Durability::Ephemeral {
            tracing::warn!(
                reference = %content_reference,
                backend = self.store.backend_name(),
                "contribution stored in ephemeral blob store; content will not outlive this process"
            );
        }

        log_stage(PipelineStage::Digesting);
        let integrity_digest = self.digest.digest(&ciphertext);

        log_stage(PipelineStage::Submitting);
        let request = SubmissionRequest {
            content_reference: content_reference.clone(),
            category,
            integrity_digest,
        };
        let confirmation_id = self.ledger.submit(&request).await?;
        tracing::info!(
            confirmation_id = %confirmation_id,
            reference = %content_reference,
            category = %category,
            "contribution submitted"
        );

        let finalized = self.await_confirmation(&confirmation_id).await?;
        let ledger = self.ledger.mode();
        if ledger == LedgerMode::Simulated {
            tracing::warn!(
                confirmation_id = %confirmation_id,
                backend = self.ledger.backend_name(),
                "contribution finalized by a simulated ledger; id and reward are not on chain"
            );
        }

        log_stage(PipelineStage::Succeeded);
        tracing::info!(
            contribution_id = %finalized.contribution_id,
            reward = %finalized.reward_amount,
            "contribution finalized"
        );

        Ok(ContributionResult {
            contribution_id: finalized.contribution_id,
            content_reference,
            reward_amount: finalized.reward_amount,
            confirmation_id,
            integrity_digest,
            category,
            durability,
            ledger,
        })
    }

    /// Wait for a previously accepted submission to settle. Safe to call
    /// repeatedly with the same id; never resubmits.
    pub async fn await_confirmation(
        &self,
        confirmation_id: &ConfirmationId,
    ) -> Result<FinalizedResult, ContributionError> {
        log_stage(PipelineStage::Confirming);
        let patience = self.confirmation_timeout;

        let outcome = tokio::time::timeout(
            patience.saturating_add(CONFIRMATION_GRACE),
            self.ledger.await_confirmation(confirmation_id, patience),
        )
        .await;

        match outcome {
            Ok(Ok(ConfirmationOutcome::Finalized(result))) => Ok(result),
            Ok(Ok(ConfirmationOutcome::Rejected { reason })) => {
                tracing::warn!(confirmation_id = %confirmation_id, reason = %reason, "ledger rejected submission");
                Err(ContributionError::LedgerRejected {
                    confirmation_id: confirmation_id.clone(),
                    reason,
                })
            }
            Ok(Ok(ConfirmationOutcome::TimedOut)) | Err(_) => {
                tracing::warn!(
                    confirmation_id = %confirmation_id,
                    patience = %humantime::format_duration(patience),
                    "confirmation not observed in time"
                );
                Err(ContributionError::ConfirmationTimeout {
                    confirmation_id: confirmation_id.clone(),
                })
            }
            Ok(Err(source)) => {
                tracing::warn!(confirmation_id = %confirmation_id, error = %source, "confirmation polling failed");
                Err(ContributionError::ConfirmationFailed {
                    confirmation_id: confirmation_id.clone(),
                    source,
                })
            }
        }
    }

    /// Fetch, verify and decrypt stored content.
    ///
    /// When `expected` is given the ciphertext must match it under this
    /// pipeline's digest before decryption is attempted.
    pub async fn retrieve(
        &self,
        reference: &ContentReference,
        encryption_key: &str,
        expected: Option<IntegrityDigest>,
    ) -> Result<AnonymizedRecord, ContributionError> {
        log_stage(PipelineStage::Retrieving);
        let ciphertext = self.store.get(reference).await?;

        if let Some(expected) = expected {
            log_stage(PipelineStage::Verifying);
            let actual = self.digest.digest(&ciphertext);
            if actual != expected {
                tracing::warn!(reference = %reference, %expected, %actual, "integrity digest mismatch");
                return Err(ContributionError::IntegrityMismatch { expected, actual });
            }
        }

        log_stage(PipelineStage::Decrypting);
        open_record(self.cipher.as_ref(), &ciphertext, encryption_key)
            .map_err(ContributionError::Decryption)
    }

    /// Look a contribution up on the ledger and retrieve it, verified against
    /// the on-ledger digest.
    pub async fn retrieve_contribution(
        &self,
        contribution_id: ContributionId,
        encryption_key: &str,
    ) -> Result<AnonymizedRecord, ContributionError> {
        let entry = self
            .ledger
            .contribution(contribution_id)
            .await?
            .ok_or(ContributionError::UnknownContribution(contribution_id))?;

        self.retrieve(
            &entry.content_reference,
            encryption_key,
            Some(entry.integrity_digest),
        )
        .await
    }

    /// Aggregate counts from the ledger.
    pub async fn stats(&self) -> Result<LedgerStats, ContributionError> {
        Ok(self.ledger.read_stats().await?)
    }
}

fn log_stage(stage: PipelineStage) {
    tracing::debug!(stage = %stage, "pipeline stage");
}
