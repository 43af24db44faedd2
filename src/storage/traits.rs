//! Trait abstraction for content-addressed blob storage.
//!
//! The pipeline stores ciphertext through `BlobStore` and only ever sees the
//! returned `ContentReference`. Implementations:
//! - **IPFS**: HTTP RPC API of an IPFS node
//! - **Filesystem**: content-addressed files under a local root
//! - **Memory**: explicit in-memory double, flagged `Durability::Ephemeral`

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use thiserror::Error;

/// Prefix of references computed locally from content.
pub const SHA256_REFERENCE_PREFIX: &str = "sha256-";

/// Opaque identifier of stored content, derived from that content.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentReference(String);

impl ContentReference {
    pub fn new(reference: impl Into<String>) -> Self {
        Self(reference.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// `sha256-<hex>` reference for `data`.
    pub fn sha256_of(data: &[u8]) -> Self {
        Self(format!(
            "{}{}",
            SHA256_REFERENCE_PREFIX,
            hex::encode(Sha256::digest(data))
        ))
    }

    /// Hex part of a well-formed `sha256-` reference.
    pub fn sha256_hex(&self) -> Option<&str> {
        let hex_part = self.0.strip_prefix(SHA256_REFERENCE_PREFIX)?;
        let well_formed = hex_part.len() == 64
            && hex_part
                .chars()
                .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c));
        well_formed.then_some(hex_part)
    }
}

impl fmt::Display for ContentReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Whether stored content survives the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Durability {
    /// Backed by a real store.
    Persistent,
    /// Degraded mode: content is lost when the process exits.
    Ephemeral,
}

/// Result type for blob store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur during blob store operations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Content not found: {0}")]
    NotFound(ContentReference),

    #[error("Invalid content reference: {0}")]
    InvalidReference(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Store rejected request (HTTP {status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("Invalid response from store: {0}")]
    InvalidResponse(String),

    #[error("Stored content does not match its reference: {0}")]
    Corrupted(ContentReference),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<reqwest::Error> for StoreError {
    fn from(e: reqwest::Error) -> Self {
        StoreError::Unavailable(e.to_string())
    }
}

/// Content-addressed blob storage.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store `data`, returning once the store has acknowledged it.
    async fn put(&self, data: &[u8]) -> StoreResult<ContentReference>;

    /// Fetch previously stored content.
    async fn get(&self, reference: &ContentReference) -> StoreResult<Vec<u8>>;

    /// Durability of stored content.
    fn durability(&self) -> Durability {
        Durability::Persistent
    }

    /// Short backend name for logs.
    fn backend_name(&self) -> &'static str;
}
