//! In-memory blob store.
//!
//! Explicit test double and degraded-mode backend. Every result stored here
//! is flagged `Durability::Ephemeral`, so it can never be mistaken for content
//! held by a real store.

use super::traits::*;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

/// In-memory content-addressed store with call counters and failure
/// injection.
#[derive(Clone, Default)]
pub struct MemoryBlobStore {
    state: Arc<Mutex<MemoryState>>,
}

#[derive(Default)]
struct MemoryState {
    blobs: HashMap<ContentReference, Vec<u8>>,
    put_calls: usize,
    get_calls: usize,
    put_failure: Option<String>,
    get_failure: Option<String>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        // A poisoned lock only means a panicking test thread; the map is still usable
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Make every subsequent `put` fail with `StoreError::Unavailable`.
    pub fn fail_puts(&self, message: impl Into<String>) {
        self.lock().put_failure = Some(message.into());
    }

    /// Make every subsequent `get` fail with `StoreError::Unavailable`.
    pub fn fail_gets(&self, message: impl Into<String>) {
        self.lock().get_failure = Some(message.into());
    }

    /// Clear injected failures.
    pub fn heal(&self) {
        let mut state = self.lock();
        state.put_failure = None;
        state.get_failure = None;
    }

    /// Replace stored bytes behind an existing reference (tamper simulation).
    pub fn overwrite(&self, reference: &ContentReference, data: Vec<u8>) {
        self.lock().blobs.insert(reference.clone(), data);
    }

    pub fn put_calls(&self) -> usize {
        self.lock().put_calls
    }

    pub fn get_calls(&self) -> usize {
        self.lock().get_calls
    }

    pub fn len(&self) -> usize {
        self.lock().blobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().blobs.is_empty()
    }

    pub fn contains(&self, reference: &ContentReference) -> bool {
        self.lock().blobs.contains_key(reference)
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put(&self, data: &[u8]) -> StoreResult<ContentReference> {
        let mut state = self.lock();
        state.put_calls += 1;

        if let Some(message) = &state.put_failure {
            return Err(StoreError::Unavailable(message.clone()));
        }

        let reference = ContentReference::sha256_of(data);
        state
            .blobs
            .entry(reference.clone())
            .or_insert_with(|| data.to_vec());
        Ok(reference)
    }

    async fn get(&self, reference: &ContentReference) -> StoreResult<Vec<u8>> {
        let mut state = self.lock();
        state.get_calls += 1;

        if let Some(message) = &state.get_failure {
            return Err(StoreError::Unavailable(message.clone()));
        }

        state
            .blobs
            .get(reference)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(reference.clone()))
    }

    fn durability(&self) -> Durability {
        Durability::Ephemeral
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_and_get() {
        let store = MemoryBlobStore::new();
        let reference = store.put(b"ciphertext").await.unwrap();

        assert_eq!(store.get(&reference).await.unwrap(), b"ciphertext");
        assert_eq!(store.put_calls(), 1);
        assert_eq!(store.get_calls(), 1);
    }

    #[tokio::test]
    async fn test_put_is_content_addressed() {
        let store = MemoryBlobStore::new();
        let a = store.put(b"same").await.unwrap();
        let b = store.put(b"same").await.unwrap();

        assert_eq!(a, b);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_get_not_found() {
        let store = MemoryBlobStore::new();
        let result = store.get(&ContentReference::sha256_of(b"missing")).await;
        assert!(matches!(result, Err(StoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_injected_put_failure() {
        let store = MemoryBlobStore::new();
        store.fail_puts("node offline");

        let result = store.put(b"data").await;
        assert!(matches!(result, Err(StoreError::Unavailable(ref m)) if m == "node offline"));
        assert!(store.is_empty());

        store.heal();
        assert!(store.put(b"data").await.is_ok());
    }

    #[tokio::test]
    async fn test_overwrite_simulates_tampering() {
        let store = MemoryBlobStore::new();
        let reference = store.put(b"original").await.unwrap();
        store.overwrite(&reference, b"tampered".to_vec());

        assert_eq!(store.get(&reference).await.unwrap(), b"tampered");
    }

    #[test]
    fn test_memory_store_is_ephemeral() {
        assert_eq!(MemoryBlobStore::new().durability(), Durability::Ephemeral);
    }
}
