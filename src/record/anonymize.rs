//! Field-level anonymization of contribution records.
//!
//! Transforms, applied to a copy of the caller's record:
//!
//! - `subjectId` → `subjectHash` (SHA-256, or HMAC-SHA256 with a pepper)
//! - `timestamp` → start of its containing UTC hour
//! - `amount` → nearest multiple of the bucket, ties away from zero
//! - `nonce` → fresh 128-bit random value, hex encoded
//!
//! Absent fields are skipped. Values that cannot be coarsened (a timestamp
//! that does not parse, a non-numeric amount) are dropped rather than passed
//! through at full precision.

use super::types::{
    AnonymizedRecord, RawRecord, AMOUNT_FIELD, NONCE_FIELD, SUBJECT_HASH_FIELD, SUBJECT_ID_FIELD,
    TIMESTAMP_FIELD,
};
use chrono::{DateTime, SecondsFormat, TimeZone, Utc};
use hkdf::Hkdf;
use rand::RngCore;
use ring::hmac;
use serde_json::{Number, Value};
use sha2::{Digest, Sha256};
use std::num::NonZeroU64;
use zeroize::Zeroizing;

/// Milliseconds in one hour.
pub const HOUR_MS: i64 = 3_600_000;

/// Default `amount` bucket.
pub const DEFAULT_AMOUNT_BUCKET: NonZeroU64 = match NonZeroU64::new(1000) {
    Some(bucket) => bucket,
    None => unreachable!(),
};

/// Nonce length in bytes (128 bits).
pub const NONCE_LEN: usize = 16;

const SUBJECT_PEPPER_SALT: &[u8] = b"shroud-subject-hash-v1";

#[derive(Debug, Clone)]
enum SubjectHasher {
    Sha256,
    Keyed(hmac::Key),
}

impl SubjectHasher {
    fn hash(&self, subject: &str) -> String {
        match self {
            Self::Sha256 => hex::encode(Sha256::digest(subject.as_bytes())),
            Self::Keyed(key) => hex::encode(hmac::sign(key, subject.as_bytes()).as_ref()),
        }
    }
}

/// Record anonymizer. Cheap to clone and safe to share across tasks.
#[derive(Debug, Clone)]
pub struct Anonymizer {
    amount_bucket: NonZeroU64,
    subject_hasher: SubjectHasher,
}

impl Default for Anonymizer {
    fn default() -> Self {
        Self {
            amount_bucket: DEFAULT_AMOUNT_BUCKET,
            subject_hasher: SubjectHasher::Sha256,
        }
    }
}

impl Anonymizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_amount_bucket(mut self, bucket: NonZeroU64) -> Self {
        self.amount_bucket = bucket;
        self
    }

    /// Key the subject hash with a secret pepper (HMAC-SHA256 over an
    /// HKDF-derived key) so low-entropy ids cannot be recovered by hashing
    /// candidate values.
    pub fn with_subject_pepper(mut self, pepper: &str) -> Self {
        let hkdf = Hkdf::<Sha256>::new(Some(SUBJECT_PEPPER_SALT), pepper.as_bytes());
        let mut key = Zeroizing::new([0u8; 32]);
        // 32 bytes is always a valid HKDF-SHA256 output length
        if hkdf.expand(b"hmac-sha256-key", &mut key[..]).is_ok() {
            self.subject_hasher = SubjectHasher::Keyed(hmac::Key::new(hmac::HMAC_SHA256, &key[..]));
        }
        self
    }

    pub fn amount_bucket(&self) -> NonZeroU64 {
        self.amount_bucket
    }

    /// Anonymize with a freshly generated nonce.
    pub fn anonymize(&self, record: &RawRecord) -> AnonymizedRecord {
        self.anonymize_with_nonce(record, &generate_nonce())
    }

    /// Deterministic core: identical inputs give identical output.
    pub fn anonymize_with_nonce(&self, record: &RawRecord, nonce: &str) -> AnonymizedRecord {
        let mut fields = record.fields().clone();

        if let Some(subject) = fields.remove(SUBJECT_ID_FIELD) {
            let subject = match subject {
                Value::String(s) => s,
                other => other.to_string(),
            };
            fields.insert(
                SUBJECT_HASH_FIELD.to_string(),
                Value::String(self.subject_hasher.hash(&subject)),
            );
        }

        if let Some(timestamp) = fields.remove(TIMESTAMP_FIELD) {
            match coarsen_timestamp(&timestamp) {
                Some(truncated) => {
                    fields.insert(TIMESTAMP_FIELD.to_string(), truncated);
                }
                None => tracing::debug!("dropping unparseable timestamp"),
            }
        }

        if let Some(amount) = fields.remove(AMOUNT_FIELD) {
            match self.coarsen_amount(&amount) {
                Some(rounded) => {
                    fields.insert(AMOUNT_FIELD.to_string(), rounded);
                }
                None => tracing::debug!("dropping non-numeric amount"),
            }
        }

        fields.insert(NONCE_FIELD.to_string(), Value::String(nonce.to_string()));

        AnonymizedRecord::from_fields(fields)
    }

    fn coarsen_amount(&self, amount: &Value) -> Option<Value> {
        let bucket = self.amount_bucket.get() as i128;
        match amount {
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Some(int_value(round_to_bucket_i128(i as i128, bucket)))
                } else if let Some(u) = n.as_u64() {
                    Some(int_value(round_to_bucket_i128(u as i128, bucket)))
                } else {
                    n.as_f64()
                        .and_then(|f| float_value(round_to_bucket_f64(f, bucket as f64)))
                }
            }
            Value::String(s) => {
                let s = s.trim();
                if let Ok(i) = s.parse::<i64>() {
                    Some(int_value(round_to_bucket_i128(i as i128, bucket)))
                } else {
                    s.parse::<f64>()
                        .ok()
                        .filter(|f| f.is_finite())
                        .and_then(|f| float_value(round_to_bucket_f64(f, bucket as f64)))
                }
            }
            _ => None,
        }
    }
}

/// Anonymize with the default anonymizer (plain SHA-256 subject hash,
/// 1000-unit amount bucket).
pub fn anonymize(record: &RawRecord) -> AnonymizedRecord {
    Anonymizer::default().anonymize(record)
}

/// Start of the UTC hour containing `ts_ms`. Uses euclidean remainder so
/// pre-epoch values also move backwards to their hour boundary.
pub fn truncate_to_hour_ms(ts_ms: i64) -> i64 {
    ts_ms - ts_ms.rem_euclid(HOUR_MS)
}

/// Nearest multiple of `bucket`, ties away from zero: `1500 → 2000`,
/// `-1500 → -2000`, `-1499 → -1000`.
pub fn round_to_bucket(amount: i64, bucket: NonZeroU64) -> i128 {
    round_to_bucket_i128(amount as i128, bucket.get() as i128)
}

fn round_to_bucket_i128(amount: i128, bucket: i128) -> i128 {
    let quotient = amount / bucket;
    let remainder = amount % bucket;
    let adjusted = if remainder.abs() * 2 >= bucket {
        quotient + amount.signum()
    } else {
        quotient
    };
    adjusted * bucket
}

fn round_to_bucket_f64(amount: f64, bucket: f64) -> f64 {
    // f64::round is ties-away-from-zero, matching the integer path
    (amount / bucket).round() * bucket
}

fn coarsen_timestamp(timestamp: &Value) -> Option<Value> {
    match timestamp {
        Value::Number(n) => {
            if let Some(ms) = n.as_i64() {
                Some(Value::from(truncate_to_hour_ms(ms)))
            } else if let Some(ms) = n.as_u64() {
                Some(Value::from(ms - ms % HOUR_MS as u64))
            } else {
                n.as_f64()
                    .and_then(|f| float_value((f / HOUR_MS as f64).floor() * HOUR_MS as f64))
            }
        }
        Value::String(s) => {
            let s = s.trim();
            if let Ok(ms) = s.parse::<i64>() {
                return Some(Value::String(truncate_to_hour_ms(ms).to_string()));
            }
            let parsed = DateTime::parse_from_rfc3339(s).ok()?;
            let truncated = truncate_to_hour_ms(parsed.timestamp_millis());
            let hour = Utc.timestamp_millis_opt(truncated).single()?;
            Some(Value::String(hour.to_rfc3339_opts(SecondsFormat::Millis, true)))
        }
        _ => None,
    }
}

fn int_value(value: i128) -> Value {
    if let Ok(i) = i64::try_from(value) {
        Value::from(i)
    } else if let Ok(u) = u64::try_from(value) {
        Value::from(u)
    } else {
        Number::from_f64(value as f64).map_or(Value::Null, Value::Number)
    }
}

fn float_value(value: f64) -> Option<Value> {
    if value.fract() == 0.0 && value >= i64::MIN as f64 && value <= i64::MAX as f64 {
        return Some(Value::from(value as i64));
    }
    Number::from_f64(value).map(Value::Number)
}

fn generate_nonce() -> String {
    let mut bytes = [0u8; NONCE_LEN];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}
