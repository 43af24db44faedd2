//! Contribution records and their anonymization.
//!
//! A `RawRecord` belongs to the caller. The anonymizer copies it, removes the
//! identity field, coarsens time and amount, and attaches a nonce, producing
//! an immutable `AnonymizedRecord` that lives for one pipeline invocation.

pub mod anonymize;
pub mod types;

#[cfg(test)]
mod proptests;

pub use anonymize::{anonymize, round_to_bucket, truncate_to_hour_ms, Anonymizer, HOUR_MS};
pub use types::{AnonymizedRecord, Category, RawRecord, UnknownCategory};
