//! IPFS-backed blob store over the node's HTTP RPC API.
//!
//! - `put` → `POST {api}/api/v0/add?pin=true&cid-version=1` (multipart)
//! - `get` → `POST {api}/api/v0/cat?arg=<cid>`
//!
//! The returned CID is the content reference.

use super::traits::*;
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

/// Blob store talking to an IPFS node (Kubo-compatible RPC API).
#[derive(Debug, Clone)]
pub struct IpfsBlobStore {
    client: Client,
    api_url: String,
}

#[derive(Debug, Deserialize)]
struct AddResponse {
    #[serde(rename = "Hash")]
    hash: String,
}

impl IpfsBlobStore {
    pub fn new(api_url: impl Into<String>, request_timeout: Duration) -> StoreResult<Self> {
        let client = Client::builder().timeout(request_timeout).build()?;
        Ok(Self {
            client,
            api_url: api_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    fn endpoint(&self, command: &str) -> String {
        format!("{}/api/v0/{}", self.api_url, command)
    }
}

/// Extract the CID from an `add` response body.
///
/// `add` streams one JSON object per line (directories add more); the last
/// object describes the root of what was added.
fn parse_add_response(body: &str) -> StoreResult<ContentReference> {
    let last = body
        .lines()
        .filter(|line| !line.trim().is_empty())
        .last()
        .ok_or_else(|| StoreError::InvalidResponse("empty add response".to_string()))?;

    let parsed: AddResponse = serde_json::from_str(last)
        .map_err(|e| StoreError::InvalidResponse(format!("add response: {}", e)))?;

    if parsed.hash.is_empty() {
        return Err(StoreError::InvalidResponse("add response has empty Hash".to_string()));
    }
    Ok(ContentReference::new(parsed.hash))
}

#[async_trait]
impl BlobStore for IpfsBlobStore {
    async fn put(&self, data: &[u8]) -> StoreResult<ContentReference> {
        let form = Form::new().part(
            "file",
            Part::bytes(data.to_vec()).file_name("contribution.bin"),
        );

        let response = self
            .client
            .post(self.endpoint("add"))
            .query(&[("pin", "true"), ("cid-version", "1")])
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(StoreError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let reference = parse_add_response(&body)?;
        tracing::debug!(reference = %reference, bytes = data.len(), "blob pinned on IPFS");
        Ok(reference)
    }

    async fn get(&self, reference: &ContentReference) -> StoreResult<Vec<u8>> {
        if reference.is_empty() {
            return Err(StoreError::InvalidReference(String::new()));
        }

        let response = self
            .client
            .post(self.endpoint("cat"))
            .query(&[("arg", reference.as_str())])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            // Kubo answers 500 with "not found"-style messages for unknown CIDs
            if body.contains("not found") || status == reqwest::StatusCode::NOT_FOUND {
                return Err(StoreError::NotFound(reference.clone()));
            }
            return Err(StoreError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response.bytes().await?.to_vec())
    }

    fn backend_name(&self) -> &'static str {
        "ipfs"
    }
}
