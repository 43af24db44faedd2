//! Property-based tests for record encryption and integrity digests
//!
//! - Cipher roundtrip, key isolation, nonce freshness
//! - Digest determinism, single-byte sensitivity, split invariance

use super::cipher::{open_record, seal_record, AesGcmCipher, Cipher, CipherError};
use super::digest::{ChunkDigest, FlatDigest, MerkleDigest};
use crate::record::{Anonymizer, RawRecord};
use proptest::prelude::*;

proptest! {
    /// Property: decrypt(encrypt(x, k), k) == x
    #[test]
    fn cipher_roundtrip_preserves_data(
        data in prop::collection::vec(any::<u8>(), 0..10_000),
        key in "[ -~]{1,64}",
    ) {
        let cipher = AesGcmCipher::new();
        let ciphertext = cipher.encrypt(&data, &key).unwrap();
        prop_assert_eq!(cipher.decrypt(&ciphertext, &key).unwrap(), data);
    }

    /// Property: a different key never opens the envelope
    #[test]
    fn cipher_wrong_key_fails(
        data in prop::collection::vec(any::<u8>(), 0..1000),
        key in "[a-z0-9]{1,32}",
        other in "[a-z0-9]{1,32}",
    ) {
        prop_assume!(key != other);

        let cipher = AesGcmCipher::new();
        let ciphertext = cipher.encrypt(&data, &key).unwrap();
        let result = cipher.decrypt(&ciphertext, &other);
        prop_assert!(matches!(result, Err(CipherError::Decryption)));
    }

    /// Property: sealed records reopen to an equal record
    #[test]
    fn sealed_record_roundtrip(
        subject in "[a-z]{1,16}",
        amount in -1_000_000i64..1_000_000i64,
        ts in 0i64..4_000_000_000_000i64,
        note in "[ -~]{0,40}",
    ) {
        let record = Anonymizer::new().anonymize(
            &RawRecord::new()
                .with("subjectId", subject)
                .with("amount", amount)
                .with("timestamp", ts)
                .with("note", note),
        );
        let cipher = AesGcmCipher::new();

        let sealed = seal_record(&cipher, &record, "k1").unwrap();
        let opened = open_record(&cipher, &sealed, "k1").unwrap();
        prop_assert_eq!(opened, record);
    }

    /// Property: flipping any single byte changes the digest
    #[test]
    fn digest_detects_single_byte_change(
        data in prop::collection::vec(any::<u8>(), 1..4096),
        index in any::<prop::sample::Index>(),
        flip in 1u8..=255u8,
    ) {
        let original = FlatDigest.digest(&data);
        prop_assert_eq!(original, FlatDigest.digest(&data));

        let mut changed = data.clone();
        let i = index.index(changed.len());
        changed[i] ^= flip;
        prop_assert_ne!(original, FlatDigest.digest(&changed));
    }

    /// Property: flat digest ignores chunk boundaries
    #[test]
    fn flat_digest_split_invariant(
        data in prop::collection::vec(any::<u8>(), 0..4096),
        split in any::<prop::sample::Index>(),
    ) {
        let at = if data.is_empty() { 0 } else { split.index(data.len()) };
        let (head, tail) = data.split_at(at);
        prop_assert_eq!(FlatDigest.digest(&data), FlatDigest.digest_chunks(&[head, tail]));
    }

    /// Property: merkle digest is deterministic for any chunk size
    #[test]
    fn merkle_digest_deterministic(
        data in prop::collection::vec(any::<u8>(), 0..4096),
        chunk_size in 1usize..512,
    ) {
        let merkle = MerkleDigest::new(chunk_size);
        prop_assert_eq!(merkle.digest(&data), merkle.digest(&data));
    }
}
