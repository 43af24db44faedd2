//! Symmetric encryption of anonymized records.
//!
//! ## Envelope
//!
//! ```text
//! version (1 byte) || nonce (12 bytes) || AES-256-GCM ciphertext || tag (16 bytes)
//! ```
//!
//! The 256-bit AES key is derived from the caller's key string with
//! HKDF-SHA256 under a versioned salt. No key material is stored here; the
//! caller supplies the key on every call.
//!
//! A wrong key and a corrupted ciphertext are indistinguishable: both fail
//! GCM tag verification and surface as `CipherError::Decryption`.

use crate::record::AnonymizedRecord;
use hkdf::Hkdf;
use ring::aead::{Aad, LessSafeKey, Nonce, UnboundKey, AES_256_GCM, NONCE_LEN};
use ring::rand::{SecureRandom, SystemRandom};
use sha2::Sha256;
use thiserror::Error;
use zeroize::Zeroizing;

/// Envelope format version.
pub const ENVELOPE_VERSION: u8 = 1;

/// Smallest well-formed envelope: header plus an empty plaintext's tag.
pub const MIN_ENVELOPE_LEN: usize = 1 + NONCE_LEN + 16;

/// HKDF salt for record encryption keys
const ENCRYPTION_SALT: &[u8] = b"shroud-record-encryption-v1";

/// HKDF info for the AES key
const ENCRYPTION_INFO: &[u8] = b"aes-256-gcm-key";

/// Errors from the cipher adapter
#[derive(Debug, Error)]
pub enum CipherError {
    #[error("Encryption key must not be empty")]
    EmptyKey,

    #[error("Encryption failed: {0}")]
    Encryption(String),

    #[error("Decryption failed: wrong key or corrupted ciphertext")]
    Decryption,

    #[error("Record could not be serialized: {0}")]
    Serialization(String),

    #[error("Malformed envelope: {0}")]
    MalformedEnvelope(String),

    #[error("Decrypted payload is not a valid record: {0}")]
    MalformedPlaintext(String),

    #[error("Key derivation failed: {0}")]
    KeyDerivation(String),
}

/// Symmetric cipher keyed per call by the caller.
pub trait Cipher: Send + Sync {
    fn encrypt(&self, plaintext: &[u8], key: &str) -> Result<Vec<u8>, CipherError>;

    fn decrypt(&self, ciphertext: &[u8], key: &str) -> Result<Vec<u8>, CipherError>;
}

/// AES-256-GCM with HKDF-SHA256 key derivation and a random nonce per call.
#[derive(Debug, Default, Clone, Copy)]
pub struct AesGcmCipher;

impl AesGcmCipher {
    pub fn new() -> Self {
        Self
    }
}

impl Cipher for AesGcmCipher {
    fn encrypt(&self, plaintext: &[u8], key: &str) -> Result<Vec<u8>, CipherError> {
        let sealing_key = build_key(key)?;

        // Random nonce per encryption, never reused under the same key
        let mut nonce_bytes = [0u8; NONCE_LEN];
        SystemRandom::new()
            .fill(&mut nonce_bytes)
            .map_err(|_| CipherError::Encryption("RNG failure".to_string()))?;
        let nonce = Nonce::assume_unique_for_key(nonce_bytes);

        let mut in_out = plaintext.to_vec();
        sealing_key
            .seal_in_place_append_tag(nonce, Aad::from([ENVELOPE_VERSION]), &mut in_out)
            .map_err(|e| CipherError::Encryption(format!("seal failed: {}", e)))?;

        let mut envelope = Vec::with_capacity(1 + NONCE_LEN + in_out.len());
        envelope.push(ENVELOPE_VERSION);
        envelope.extend_from_slice(&nonce_bytes);
        envelope.extend_from_slice(&in_out);
        Ok(envelope)
    }

    fn decrypt(&self, ciphertext: &[u8], key: &str) -> Result<Vec<u8>, CipherError> {
        if ciphertext.len() < MIN_ENVELOPE_LEN {
            return Err(CipherError::MalformedEnvelope(format!(
                "{} bytes, need at least {}",
                ciphertext.len(),
                MIN_ENVELOPE_LEN
            )));
        }
        if ciphertext[0] != ENVELOPE_VERSION {
            return Err(CipherError::MalformedEnvelope(format!(
                "unsupported version {}",
                ciphertext[0]
            )));
        }

        let opening_key = build_key(key)?;
        let nonce = Nonce::try_assume_unique_for_key(&ciphertext[1..1 + NONCE_LEN])
            .map_err(|_| CipherError::MalformedEnvelope("invalid nonce".to_string()))?;

        let mut in_out = ciphertext[1 + NONCE_LEN..].to_vec();
        let plaintext = opening_key
            .open_in_place(nonce, Aad::from([ENVELOPE_VERSION]), &mut in_out)
            .map_err(|_| CipherError::Decryption)?;
        Ok(plaintext.to_vec())
    }
}

fn build_key(key: &str) -> Result<LessSafeKey, CipherError> {
    if key.is_empty() {
        return Err(CipherError::EmptyKey);
    }
    let derived = derive_encryption_key(key)?;
    let unbound = UnboundKey::new(&AES_256_GCM, &derived[..])
        .map_err(|e| CipherError::KeyDerivation(format!("key creation failed: {}", e)))?;
    Ok(LessSafeKey::new(unbound))
}

/// Derive the AES-256 key from the caller's key string.
fn derive_encryption_key(key: &str) -> Result<Zeroizing<[u8; 32]>, CipherError> {
    let hkdf = Hkdf::<Sha256>::new(Some(ENCRYPTION_SALT), key.as_bytes());
    let mut okm = Zeroizing::new([0u8; 32]);
    hkdf.expand(ENCRYPTION_INFO, &mut okm[..])
        .map_err(|e| CipherError::KeyDerivation(format!("HKDF expand failed: {}", e)))?;
    Ok(okm)
}

/// Encrypt the canonical JSON form of a record.
pub fn seal_record(
    cipher: &dyn Cipher,
    record: &AnonymizedRecord,
    key: &str,
) -> Result<Vec<u8>, CipherError> {
    let plaintext = Zeroizing::new(
        record
            .to_canonical_json()
            .map_err(|e| CipherError::Serialization(e.to_string()))?,
    );
    cipher.encrypt(&plaintext, key)
}

/// Decrypt and parse a sealed record. Plaintext that does not parse as a
/// record object is rejected, never returned as valid.
pub fn open_record(
    cipher: &dyn Cipher,
    ciphertext: &[u8],
    key: &str,
) -> Result<AnonymizedRecord, CipherError> {
    let plaintext = Zeroizing::new(cipher.decrypt(ciphertext, key)?);
    AnonymizedRecord::from_canonical_json(&plaintext)
        .map_err(|e| CipherError::MalformedPlaintext(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{Anonymizer, RawRecord};

    fn sample() -> AnonymizedRecord {
        Anonymizer::new().anonymize(
            &RawRecord::new()
                .with("subjectId", "alice")
                .with("amount", 1234)
                .with("desk", "rates"),
        )
    }

    #[test]
    fn test_encrypt_decrypt_roundtrip() {
        let cipher = AesGcmCipher::new();
        let ciphertext = cipher.encrypt(b"secret payload", "k1").unwrap();
        assert_eq!(cipher.decrypt(&ciphertext, "k1").unwrap(), b"secret payload");
    }

    #[test]
    fn test_envelope_layout() {
        let ciphertext = AesGcmCipher::new().encrypt(b"abc", "k1").unwrap();
        assert_eq!(ciphertext[0], ENVELOPE_VERSION);
        assert_eq!(ciphertext.len(), MIN_ENVELOPE_LEN + 3);
    }

    #[test]
    fn test_decrypt_with_wrong_key() {
        let cipher = AesGcmCipher::new();
        let ciphertext = cipher.encrypt(b"secret", "k1").unwrap();
        assert!(matches!(
            cipher.decrypt(&ciphertext, "k2"),
            Err(CipherError::Decryption)
        ));
    }

    #[test]
    fn test_tampered_ciphertext_fails() {
        let cipher = AesGcmCipher::new();
        let mut ciphertext = cipher.encrypt(b"secret", "k1").unwrap();
        let last = ciphertext.len() - 1;
        ciphertext[last] ^= 0xFF;
        assert!(matches!(
            cipher.decrypt(&ciphertext, "k1"),
            Err(CipherError::Decryption)
        ));
    }

    #[test]
    fn test_truncated_and_unknown_version_envelopes() {
        let cipher = AesGcmCipher::new();
        assert!(matches!(
            cipher.decrypt(&[ENVELOPE_VERSION; 5], "k1"),
            Err(CipherError::MalformedEnvelope(_))
        ));

        let mut ciphertext = cipher.encrypt(b"secret", "k1").unwrap();
        ciphertext[0] = 9;
        assert!(matches!(
            cipher.decrypt(&ciphertext, "k1"),
            Err(CipherError::MalformedEnvelope(_))
        ));
    }

    #[test]
    fn test_empty_key_rejected() {
        let cipher = AesGcmCipher::new();
        assert!(matches!(cipher.encrypt(b"x", ""), Err(CipherError::EmptyKey)));
    }

    #[test]
    fn test_same_plaintext_different_ciphertexts() {
        let cipher = AesGcmCipher::new();
        let a = cipher.encrypt(b"same", "k1").unwrap();
        let b = cipher.encrypt(b"same", "k1").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_seal_open_record_roundtrip() {
        let cipher = AesGcmCipher::new();
        let record = sample();
        let sealed = seal_record(&cipher, &record, "k1").unwrap();
        let opened = open_record(&cipher, &sealed, "k1").unwrap();
        assert_eq!(opened, record);
    }

    #[test]
    fn test_seal_record_empty_key_fails_before_output() {
        let cipher = AesGcmCipher::new();
        assert!(matches!(
            seal_record(&cipher, &sample(), ""),
            Err(CipherError::EmptyKey)
        ));
    }

    #[test]
    fn test_open_record_rejects_non_record_plaintext() {
        let cipher = AesGcmCipher::new();
        let sealed = cipher.encrypt(b"not json at all", "k1").unwrap();
        assert!(matches!(
            open_record(&cipher, &sealed, "k1"),
            Err(CipherError::MalformedPlaintext(_))
        ));
    }
}
