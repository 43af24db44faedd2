//! Property-based tests for anonymization
//!
//! - Identity field never survives, hash is deterministic
//! - Timestamp truncation lands on an hour boundary and is idempotent
//! - Amount rounding lands on a bucket multiple within half a bucket

use super::anonymize::{round_to_bucket, truncate_to_hour_ms, Anonymizer, HOUR_MS};
use super::types::RawRecord;
use proptest::prelude::*;
use serde_json::Value;
use std::num::NonZeroU64;

proptest! {
    /// Property: subjectId is always removed and replaced by a stable hash
    #[test]
    fn subject_id_never_survives(subject in "[a-zA-Z0-9@._-]{1,64}") {
        let record = RawRecord::new().with("subjectId", subject.clone());
        let anonymizer = Anonymizer::new();

        let first = anonymizer.anonymize(&record);
        let second = anonymizer.anonymize(&record);

        prop_assert!(!first.contains("subjectId"));
        prop_assert!(first.subject_hash().is_some());
        prop_assert_eq!(first.subject_hash(), second.subject_hash());
        prop_assert_ne!(first.subject_hash(), Some(subject.as_str()));
    }

    /// Property: truncation is an hour boundary at or before the input
    #[test]
    fn timestamp_truncation_is_hour_start(ts in -4_000_000_000_000i64..4_000_000_000_000i64) {
        let truncated = truncate_to_hour_ms(ts);

        prop_assert_eq!(truncated.rem_euclid(HOUR_MS), 0);
        prop_assert!(truncated <= ts);
        prop_assert!(ts - truncated < HOUR_MS);
    }

    /// Property: anonymizing an already-anonymized timestamp changes nothing
    #[test]
    fn timestamp_truncation_is_idempotent(ts in 0i64..4_000_000_000_000i64) {
        let anonymizer = Anonymizer::new();
        let once = anonymizer.anonymize(&RawRecord::new().with("timestamp", ts));
        let once_ts = once.get("timestamp").and_then(Value::as_i64).unwrap();

        let twice = anonymizer.anonymize(&RawRecord::new().with("timestamp", once_ts));
        prop_assert_eq!(twice.get("timestamp").and_then(Value::as_i64), Some(once_ts));
    }

    /// Property: rounding yields the nearest bucket multiple
    #[test]
    fn amount_rounds_to_nearest_bucket(
        amount in -1_000_000_000i64..1_000_000_000i64,
        bucket in 1u64..100_000u64,
    ) {
        let bucket = NonZeroU64::new(bucket).unwrap();
        let rounded = round_to_bucket(amount, bucket);
        let b = bucket.get() as i128;

        prop_assert_eq!(rounded % b, 0);
        prop_assert!((rounded - amount as i128).abs() * 2 <= b);
    }

    /// Property: rounding is symmetric around zero
    #[test]
    fn amount_rounding_is_symmetric(amount in 0i64..1_000_000_000i64) {
        let bucket = NonZeroU64::new(1000).unwrap();
        prop_assert_eq!(round_to_bucket(-amount, bucket), -round_to_bucket(amount, bucket));
    }
}
