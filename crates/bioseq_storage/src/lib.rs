//! # bioseq storage
//!
//! Byte-level storage backends for the bioseq sequence store.
//!
//! Backends are **opaque byte stores**: they append, read back and flush
//! bytes, and know nothing about the transaction log written on top of them.
//!
//! ## Available Backends
//!
//! - [`InMemoryBackend`] - For tests and throwaway stores
//! - [`FileBackend`] - Persistent storage through OS file APIs, opened
//!   read-write or read-only
//!
//! ## Example
//!
//! ```rust
//! use bioseq_storage::{StorageBackend, InMemoryBackend};
//!
//! let mut backend = InMemoryBackend::new();
//! let offset = backend.append(b"ACGT,a;b,0").unwrap();
//! let data = backend.read_at(offset, 10).unwrap();
//! assert_eq!(&data, b"ACGT,a;b,0");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod error;
mod file;
mod memory;

pub use backend::StorageBackend;
pub use error::{StorageError, StorageResult};
pub use file::FileBackend;
pub use memory::InMemoryBackend;
