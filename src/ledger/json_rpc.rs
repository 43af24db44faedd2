//! JSON-RPC 2.0 ledger client.
//!
//! ## Methods
//!
//! | method                       | params                                   | result                 |
//! |------------------------------|------------------------------------------|------------------------|
//! | `shroud_submitContribution`  | `[{contentReference, category, integrityDigest}]` | confirmation id |
//! | `shroud_getSubmissionStatus` | `[confirmationId]`                       | status object          |
//! | `shroud_getStats`            | `[]`                                     | stats object           |
//! | `shroud_getContribution`     | `[contributionId]`                       | entry object or `null` |
//!
//! Categories travel as their ordinal. Numeric quantities (ids, rewards)
//! are accepted as JSON numbers, decimal strings or `0x` hex strings, since
//! contract-facing gateways disagree on how to encode 256-bit integers.

use super::traits::*;
use crate::crypto::IntegrityDigest;
use crate::record::Category;
use crate::storage::ContentReference;
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

pub const METHOD_SUBMIT: &str = "shroud_submitContribution";
pub const METHOD_STATUS: &str = "shroud_getSubmissionStatus";
pub const METHOD_STATS: &str = "shroud_getStats";
pub const METHOD_CONTRIBUTION: &str = "shroud_getContribution";

/// Ledger client speaking JSON-RPC 2.0 over HTTP.
#[derive(Debug)]
pub struct JsonRpcLedgerClient {
    client: Client,
    endpoint: String,
    poll_interval: Duration,
    next_id: AtomicU64,
}

#[derive(Debug, Serialize)]
struct RpcRequest<'a, P: Serialize> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: P,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcErrorObject>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
}

impl JsonRpcLedgerClient {
    pub fn new(
        endpoint: impl Into<String>,
        request_timeout: Duration,
        poll_interval: Duration,
    ) -> LedgerResult<Self> {
        let client = Client::builder().timeout(request_timeout).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            poll_interval,
            next_id: AtomicU64::new(1),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn call<P, R>(&self, method: &str, params: P) -> LedgerResult<R>
    where
        P: Serialize + Send,
        R: DeserializeOwned,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let request = RpcRequest {
            jsonrpc: "2.0",
            id,
            method,
            params,
        };

        let response = self.client.post(&self.endpoint).json(&request).send().await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() && body.trim().is_empty() {
            return Err(LedgerError::Unavailable(format!("HTTP {}", status)));
        }

        let result = parse_rpc_response(&body)?;
        tracing::trace!(method, id, "ledger call completed");
        serde_json::from_value(result)
            .map_err(|e| LedgerError::InvalidResponse(format!("{}: {}", method, e)))
    }
}

/// Unwrap a JSON-RPC response envelope into its `result`.
fn parse_rpc_response(body: &str) -> LedgerResult<Value> {
    let response: RpcResponse = serde_json::from_str(body)
        .map_err(|e| LedgerError::InvalidResponse(format!("not a JSON-RPC response: {}", e)))?;

    if let Some(error) = response.error {
        return Err(LedgerError::Rpc {
            code: error.code,
            message: error.message,
        });
    }
    Ok(response.result.unwrap_or(Value::Null))
}

fn submission_params(request: &SubmissionRequest) -> Value {
    json!([{
        "contentReference": request.content_reference.as_str(),
        "category": request.category.ordinal(),
        "integrityDigest": request.integrity_digest.to_hex(),
    }])
}

/// Parse a number, decimal string or `0x` hex string.
fn parse_quantity(value: &Value) -> Option<u128> {
    match value {
        Value::Number(n) => n.as_u64().map(u128::from),
        Value::String(s) => {
            let s = s.trim();
            match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
                Some(hex_digits) => u128::from_str_radix(hex_digits, 16).ok(),
                None => s.parse().ok(),
            }
        }
        _ => None,
    }
}

fn required_quantity(object: &Value, field: &str) -> LedgerResult<u128> {
    let value = object
        .get(field)
        .ok_or_else(|| LedgerError::InvalidResponse(format!("missing field {}", field)))?;
    parse_quantity(value)
        .ok_or_else(|| LedgerError::InvalidResponse(format!("{} is not a quantity: {}", field, value)))
}

fn required_contribution_id(object: &Value) -> LedgerResult<ContributionId> {
    let raw = required_quantity(object, "contributionId")?;
    u64::try_from(raw)
        .map(ContributionId)
        .map_err(|_| LedgerError::InvalidResponse(format!("contributionId out of range: {}", raw)))
}

fn parse_category(value: &Value) -> LedgerResult<Category> {
    let category = match value {
        Value::String(s) => s.parse().ok(),
        other => parse_quantity(other)
            .and_then(|n| u8::try_from(n).ok())
            .and_then(Category::from_ordinal),
    };
    category.ok_or_else(|| LedgerError::InvalidResponse(format!("unknown category: {}", value)))
}

fn parse_status(value: &Value) -> LedgerResult<ConfirmationStatus> {
    let status = value
        .get("status")
        .and_then(Value::as_str)
        .ok_or_else(|| LedgerError::InvalidResponse("status object without status".to_string()))?;

    match status.to_ascii_lowercase().as_str() {
        "pending" => Ok(ConfirmationStatus::Pending),
        "finalized" | "confirmed" => Ok(ConfirmationStatus::Finalized(FinalizedResult {
            contribution_id: required_contribution_id(value)?,
            reward_amount: required_quantity(value, "rewardAmount")?,
            block: value
                .get("block")
                .and_then(parse_quantity)
                .and_then(|b| u64::try_from(b).ok()),
        })),
        "rejected" | "reverted" => Ok(ConfirmationStatus::Rejected {
            reason: value
                .get("reason")
                .and_then(Value::as_str)
                .unwrap_or("no reason given")
                .to_string(),
        }),
        other => Err(LedgerError::InvalidResponse(format!(
            "unknown submission status: {}",
            other
        ))),
    }
}

fn parse_stats(value: &Value) -> LedgerResult<LedgerStats> {
    let total_contributions = u64::try_from(required_quantity(value, "totalContributions")?)
        .map_err(|_| LedgerError::InvalidResponse("totalContributions out of range".to_string()))?;
    let total_rewards = required_quantity(value, "totalRewards")?;

    let mut by_category = BTreeMap::new();
    match value.get("byCategory") {
        // Indexed by ordinal
        Some(Value::Array(counts)) => {
            for (ordinal, count) in counts.iter().enumerate() {
                let category = u8::try_from(ordinal)
                    .ok()
                    .and_then(Category::from_ordinal)
                    .ok_or_else(|| {
                        LedgerError::InvalidResponse(format!("unknown category ordinal {}", ordinal))
                    })?;
                by_category.insert(category, quantity_u64(count)?);
            }
        }
        // Keyed by name or ordinal
        Some(Value::Object(counts)) => {
            for (key, count) in counts {
                let category = parse_category(&Value::String(key.clone()))?;
                by_category.insert(category, quantity_u64(count)?);
            }
        }
        Some(Value::Null) | None => {}
        Some(other) => {
            return Err(LedgerError::InvalidResponse(format!(
                "byCategory has unexpected shape: {}",
                other
            )))
        }
    }

    Ok(LedgerStats {
        total_contributions,
        by_category,
        total_rewards,
    })
}

fn quantity_u64(value: &Value) -> LedgerResult<u64> {
    parse_quantity(value)
        .and_then(|n| u64::try_from(n).ok())
        .ok_or_else(|| LedgerError::InvalidResponse(format!("not a count: {}", value)))
}

fn parse_entry(value: &Value) -> LedgerResult<Option<ContributionEntry>> {
    if value.is_null() {
        return Ok(None);
    }

    let content_reference = value
        .get("contentReference")
        .and_then(Value::as_str)
        .ok_or_else(|| LedgerError::InvalidResponse("entry without contentReference".to_string()))?;
    let integrity_digest: IntegrityDigest = value
        .get("integrityDigest")
        .and_then(Value::as_str)
        .ok_or_else(|| LedgerError::InvalidResponse("entry without integrityDigest".to_string()))?
        .parse()
        .map_err(|e| LedgerError::InvalidResponse(format!("integrityDigest: {}", e)))?;
    let category = parse_category(
        value
            .get("category")
            .ok_or_else(|| LedgerError::InvalidResponse("entry without category".to_string()))?,
    )?;

    Ok(Some(ContributionEntry {
        contribution_id: required_contribution_id(value)?,
        content_reference: ContentReference::new(content_reference),
        integrity_digest,
        category,
        reward_amount: required_quantity(value, "rewardAmount")?,
    }))
}

#[async_trait]
impl LedgerClient for JsonRpcLedgerClient {
    async fn submit(&self, request: &SubmissionRequest) -> LedgerResult<ConfirmationId> {
        let id: String = self.call(METHOD_SUBMIT, submission_params(request)).await?;
        if id.is_empty() {
            return Err(LedgerError::InvalidResponse(
                "empty confirmation id".to_string(),
            ));
        }
        Ok(ConfirmationId::new(id))
    }

    async fn confirmation_status(&self, id: &ConfirmationId) -> LedgerResult<ConfirmationStatus> {
        let value: Value = self.call(METHOD_STATUS, json!([id.as_str()])).await?;
        if value.is_null() {
            return Err(LedgerError::UnknownConfirmation(id.clone()));
        }
        parse_status(&value)
    }

    fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    async fn read_stats(&self) -> LedgerResult<LedgerStats> {
        let value: Value = self.call(METHOD_STATS, json!([])).await?;
        parse_stats(&value)
    }

    async fn contribution(&self, id: ContributionId) -> LedgerResult<Option<ContributionEntry>> {
        let value: Value = self.call(METHOD_CONTRIBUTION, json!([id.0])).await?;
        parse_entry(&value)
    }

    fn backend_name(&self) -> &'static str {
        "json-rpc"
    }
}
