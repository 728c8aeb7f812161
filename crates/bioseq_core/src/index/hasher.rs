//! Content hashing for sequences.

use crate::types::ContentHash;
use sha2::{Digest, Sha256};

/// Maps a sequence to the bucket it is indexed under.
///
/// Equal sequences must hash equally. Collisions are allowed: the index
/// compares sequences on every bucket hit.
pub trait SequenceHasher {
    /// Hashes `sequence`.
    fn hash(&self, sequence: &str) -> ContentHash;
}

/// Default hasher: the first 8 bytes of the SHA-256 digest.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sha256Hasher;

impl SequenceHasher for Sha256Hasher {
    fn hash(&self, sequence: &str) -> ContentHash {
        let digest = Sha256::digest(sequence.as_bytes());
        let mut prefix = [0u8; 8];
        prefix.copy_from_slice(&digest[..8]);
        ContentHash(u64::from_be_bytes(prefix))
    }
}

impl<F> SequenceHasher for F
where
    F: Fn(&str) -> ContentHash,
{
    fn hash(&self, sequence: &str) -> ContentHash {
        self(sequence)
    }
}
