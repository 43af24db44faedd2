//! Record and category types shared by the anonymizer, the cipher helpers
//! and the ledger vocabulary.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// Identity field removed by anonymization.
pub const SUBJECT_ID_FIELD: &str = "subjectId";

/// One-way digest of the identity field.
pub const SUBJECT_HASH_FIELD: &str = "subjectHash";

/// Event time, epoch milliseconds or RFC 3339.
pub const TIMESTAMP_FIELD: &str = "timestamp";

/// Numeric quantity rounded to a bucket.
pub const AMOUNT_FIELD: &str = "amount";

/// Per-invocation random value attached to every anonymized record.
pub const NONCE_FIELD: &str = "nonce";

/// Caller-owned input record: field name to JSON value.
///
/// The pipeline only ever borrows a `RawRecord`; anonymization works on a copy.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawRecord(Map<String, Value>);

impl RawRecord {
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Builder-style insert.
    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(field.into(), value.into());
        self
    }

    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(field.into(), value.into());
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Parse a JSON object. Anything other than an object is rejected.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

impl From<Map<String, Value>> for RawRecord {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

/// Output of the anonymizer.
///
/// Never contains `subjectId`; always contains a `nonce`. There are no
/// mutable accessors, a produced record stays as it was produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnonymizedRecord(Map<String, Value>);

impl AnonymizedRecord {
    /// Only the anonymizer (and deserialization) builds these.
    pub(crate) fn from_fields(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn subject_hash(&self) -> Option<&str> {
        self.0.get(SUBJECT_HASH_FIELD).and_then(Value::as_str)
    }

    pub fn nonce(&self) -> Option<&str> {
        self.0.get(NONCE_FIELD).and_then(Value::as_str)
    }

    /// Canonical JSON: object keys in lexicographic order (serde_json's
    /// default `Map` is ordered), no insignificant whitespace.
    pub fn to_canonical_json(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(&self.0)
    }

    pub fn from_canonical_json(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}

/// Contribution category. Ordinals are part of the ledger wire contract and
/// must never be renumbered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Category {
    TradingData = 0,
    MarketSignals = 1,
    RiskMetrics = 2,
    ComplianceData = 3,
    MlDataset = 4,
}

impl Category {
    pub const ALL: [Category; 5] = [
        Category::TradingData,
        Category::MarketSignals,
        Category::RiskMetrics,
        Category::ComplianceData,
        Category::MlDataset,
    ];

    pub fn ordinal(self) -> u8 {
        self as u8
    }

    pub fn from_ordinal(ordinal: u8) -> Option<Self> {
        Self::ALL.get(ordinal as usize).copied()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Category::TradingData => "TRADING_DATA",
            Category::MarketSignals => "MARKET_SIGNALS",
            Category::RiskMetrics => "RISK_METRICS",
            Category::ComplianceData => "COMPLIANCE_DATA",
            Category::MlDataset => "ML_DATASET",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unknown category name or out-of-range ordinal.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown category: {0:?}")]
pub struct UnknownCategory(pub String);

impl FromStr for Category {
    type Err = UnknownCategory;

    /// Accepts `TRADING_DATA`, `trading-data`, ... and the ordinals `0`..`4`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if let Ok(ordinal) = trimmed.parse::<u8>() {
            return Self::from_ordinal(ordinal).ok_or_else(|| UnknownCategory(s.to_string()));
        }

        let normalized = trimmed.to_ascii_uppercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|c| c.as_str() == normalized)
            .ok_or_else(|| UnknownCategory(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_category_ordinals_are_fixed() {
        assert_eq!(Category::TradingData.ordinal(), 0);
        assert_eq!(Category::MarketSignals.ordinal(), 1);
        assert_eq!(Category::RiskMetrics.ordinal(), 2);
        assert_eq!(Category::ComplianceData.ordinal(), 3);
        assert_eq!(Category::MlDataset.ordinal(), 4);
    }

    #[test]
    fn test_category_parse_names_and_ordinals() {
        assert_eq!("TRADING_DATA".parse::<Category>().unwrap(), Category::TradingData);
        assert_eq!("ml-dataset".parse::<Category>().unwrap(), Category::MlDataset);
        assert_eq!(" risk_metrics ".parse::<Category>().unwrap(), Category::RiskMetrics);
        assert_eq!("3".parse::<Category>().unwrap(), Category::ComplianceData);
    }

    #[test]
    fn test_category_parse_rejects_unknown() {
        assert!("UNKNOWN".parse::<Category>().is_err());
        assert!("5".parse::<Category>().is_err());
        assert!("".parse::<Category>().is_err());
    }

    #[test]
    fn test_category_display_roundtrip() {
        for category in Category::ALL {
            assert_eq!(category.to_string().parse::<Category>().unwrap(), category);
        }
    }

    #[test]
    fn test_category_serde_uses_wire_names() {
        let encoded = serde_json::to_string(&Category::MarketSignals).unwrap();
        assert_eq!(encoded, "\"MARKET_SIGNALS\"");
    }

    #[test]
    fn test_raw_record_from_json_requires_object() {
        let record = RawRecord::from_json(r#"{"subjectId":"alice","amount":5}"#).unwrap();
        assert_eq!(record.len(), 2);
        assert_eq!(record.get("amount"), Some(&json!(5)));

        assert!(RawRecord::from_json("[1, 2, 3]").is_err());
    }

    #[test]
    fn test_canonical_json_sorts_keys() {
        let mut fields = Map::new();
        fields.insert("zeta".to_string(), json!(1));
        fields.insert("alpha".to_string(), json!(2));
        let record = AnonymizedRecord::from_fields(fields);

        let bytes = record.to_canonical_json().unwrap();
        assert_eq!(bytes, br#"{"alpha":2,"zeta":1}"#.to_vec());
    }
}
