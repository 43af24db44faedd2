//! Cryptographic building blocks for the contribution pipeline.
//!
//! - `cipher`: AES-256-GCM record encryption keyed per call (HKDF-SHA256)
//! - `digest`: integrity digests over stored ciphertext (flat or Merkle)

pub mod cipher;
pub mod digest;

#[cfg(test)]
mod proptests;

pub use cipher::{open_record, seal_record, AesGcmCipher, Cipher, CipherError};
pub use digest::{ChunkDigest, FlatDigest, IntegrityDigest, InvalidDigest, MerkleDigest};
