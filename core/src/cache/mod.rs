// Audio artifact cache: key derivation and the on-disk LRU/TTL store

pub mod key;
pub mod store;

pub use key::{derive, CacheKey};
pub use store::{default_cache_dir, CacheEntry, CacheStats, TtsCache};

use std::sync::Arc;
use tokio::sync::Mutex;

/// Cache handle shared between the orchestrator and the admin tools.
pub type SharedCache = Arc<Mutex<TtsCache>>;

pub fn shared(cache: TtsCache) -> SharedCache {
    Arc::new(Mutex::new(cache))
}
