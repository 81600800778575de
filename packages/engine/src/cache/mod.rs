mod backend;
mod provider;

pub use backend::{CacheBackend, FileBackend, MemoryBackend};
pub use provider::{CacheEntry, CacheProvider, PendingChanges};
