//! PWA Cache Storage Layer
//!
//! This crate provides the bucket store the offline agent keeps its
//! versioned asset caches in, with in-memory and local disk backends.

pub mod backend;
pub mod error;
pub mod key;
pub mod local;
pub mod memory;
#[cfg(any(test, feature = "test-util"))]
pub mod testing;

pub use backend::{BucketStore, CachedResponse};
pub use error::StorageError;
pub use key::{MatchOptions, RequestKey};
pub use local::LocalStore;
pub use memory::MemoryStore;

#[cfg(any(test, feature = "test-util"))]
pub use testing::FaultyStore;
