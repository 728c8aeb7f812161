//! Duplicate detection by sequence content.
//!
//! - [`SequenceHasher`] - Maps sequences to bucket hashes
//! - [`Sha256Hasher`] - Default hasher
//! - [`DuplicateIndex`] - Hash buckets of store keys

mod duplicate;
mod hasher;

pub use duplicate::DuplicateIndex;
pub use hasher::{SequenceHasher, Sha256Hasher};
