//! Integrity digests over stored ciphertext.
//!
//! The digest interface takes an ordered sequence of chunks so that a tree
//! digest can replace the flat one without touching callers:
//!
//! - `FlatDigest`: SHA-256 over all chunks in order. Split-invariant, so a
//!   single blob and any chunking of it give the same digest.
//! - `MerkleDigest`: binary Merkle root over fixed-size chunks, with domain
//!   separated leaf and node hashes.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

/// 32-byte integrity digest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IntegrityDigest([u8; 32]);

impl IntegrityDigest {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }
}

impl fmt::Display for IntegrityDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Digest text was not 32 bytes of hex.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid digest: {0}")]
pub struct InvalidDigest(String);

impl FromStr for IntegrityDigest {
    type Err = InvalidDigest;

    /// Accepts 64 hex chars with or without a `0x` prefix.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let hex_part = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(hex_part).map_err(|e| InvalidDigest(e.to_string()))?;
        let array: [u8; 32] = bytes
            .try_into()
            .map_err(|v: Vec<u8>| InvalidDigest(format!("expected 32 bytes, got {}", v.len())))?;
        Ok(Self(array))
    }
}

impl Serialize for IntegrityDigest {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for IntegrityDigest {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Digest over an ordered sequence of chunks.
pub trait ChunkDigest: Send + Sync {
    fn digest_chunks(&self, chunks: &[&[u8]]) -> IntegrityDigest;

    /// Digest of a single contiguous ciphertext.
    fn digest(&self, ciphertext: &[u8]) -> IntegrityDigest {
        self.digest_chunks(&[ciphertext])
    }
}

/// Single SHA-256 over the concatenated chunks.
#[derive(Debug, Default, Clone, Copy)]
pub struct FlatDigest;

impl ChunkDigest for FlatDigest {
    fn digest_chunks(&self, chunks: &[&[u8]]) -> IntegrityDigest {
        let mut hasher = Sha256::new();
        for chunk in chunks {
            hasher.update(chunk);
        }
        IntegrityDigest(hasher.finalize().into())
    }
}

/// Default Merkle chunk size: 64KB
pub const DEFAULT_MERKLE_CHUNK_SIZE: usize = 64 * 1024;

const LEAF_PREFIX: u8 = 0x00;
const NODE_PREFIX: u8 = 0x01;

/// Binary Merkle root over chunks.
///
/// `digest` splits a contiguous ciphertext into `chunk_size` pieces;
/// `digest_chunks` uses the caller's chunk boundaries as leaves. An odd node
/// at any level is promoted unchanged. Empty input hashes as one empty leaf.
#[derive(Debug, Clone, Copy)]
pub struct MerkleDigest {
    chunk_size: usize,
}

impl Default for MerkleDigest {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_MERKLE_CHUNK_SIZE,
        }
    }
}

impl MerkleDigest {
    /// `chunk_size` of zero falls back to the default.
    pub fn new(chunk_size: usize) -> Self {
        if chunk_size == 0 {
            return Self::default();
        }
        Self { chunk_size }
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }
}

impl ChunkDigest for MerkleDigest {
    fn digest_chunks(&self, chunks: &[&[u8]]) -> IntegrityDigest {
        let mut level: Vec<[u8; 32]> = if chunks.is_empty() {
            vec![hash_leaf(&[])]
        } else {
            chunks.iter().map(|c| hash_leaf(c)).collect()
        };

        while level.len() > 1 {
            level = level
                .chunks(2)
                .map(|pair| match pair {
                    [left, right] => hash_pair(left, right),
                    [single] => *single,
                    _ => unreachable!("chunks(2) yields one or two items"),
                })
                .collect();
        }

        IntegrityDigest(level[0])
    }

    fn digest(&self, ciphertext: &[u8]) -> IntegrityDigest {
        let chunks: Vec<&[u8]> = ciphertext.chunks(self.chunk_size).collect();
        self.digest_chunks(&chunks)
    }
}

fn hash_leaf(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update([LEAF_PREFIX]);
    hasher.update(data);
    hasher.finalize().into()
}

fn hash_pair(left: &[u8; 32], right: &[u8; 32]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update([NODE_PREFIX]);
    hasher.update(left);
    hasher.update(right);
    hasher.finalize().into()
}
