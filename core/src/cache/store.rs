//! On-disk audio cache with LRU eviction and TTL expiry.
//!
//! Each entry owns one artifact file inside the cache directory, named by the
//! key digest plus the source extension. Metadata is kept in memory and
//! rewritten wholesale to `cache_metadata.json` whenever membership changes.
//! Entry and file lifecycles are coupled: whenever an entry leaves the index its
//! file is deleted, and an entry whose file vanished is never served.
//!
//! Single-process, single-writer. Two processes sharing one cache directory
//! will overwrite each other's metadata.

use crate::audio::utils::{now_secs, remove_file_best_effort};
use crate::cache::key::CacheKey;
use crate::config::CacheConfig;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const METADATA_FILE: &str = "cache_metadata.json";

/// Metadata for one cached artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub file_path: PathBuf,
    /// Unix seconds
    pub created_at: f64,
    #[serde(default)]
    pub access_count: u64,
    /// Unix seconds; falls back to `created_at` for older metadata
    #[serde(default)]
    pub last_accessed: f64,
}

impl CacheEntry {
    pub fn new(file_path: PathBuf) -> Self {
        let now = now_secs();
        Self {
            file_path,
            created_at: now,
            access_count: 0,
            last_accessed: now,
        }
    }

    /// Record a successful lookup.
    pub fn touch(&mut self) {
        self.access_count += 1;
        self.last_accessed = now_secs();
    }

    pub fn is_expired(&self, ttl_seconds: f64) -> bool {
        now_secs() - self.created_at > ttl_seconds
    }

    pub fn exists(&self) -> bool {
        self.file_path.exists()
    }
}

/// Snapshot returned by [`TtsCache::stats`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheStats {
    pub entries: usize,
    pub max_size: usize,
    pub hits: u64,
    pub misses: u64,
    /// Percentage, two decimals
    pub hit_rate: f64,
    pub total_size_mb: f64,
    pub ttl_hours: f64,
}

struct Slot {
    entry: CacheEntry,
    seq: u64,
}

/// TTS audio cache.
pub struct TtsCache {
    cache_dir: PathBuf,
    metadata_file: PathBuf,
    max_size: usize,
    ttl_seconds: f64,
    slots: HashMap<String, Slot>,
    // seq -> hash, lowest seq is least recently used
    recency: BTreeMap<u64, String>,
    next_seq: u64,
    hits: u64,
    misses: u64,
}

/// Default location: `<user cache dir>/openai-tts-mcp/cache`.
pub fn default_cache_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("openai-tts-mcp")
        .join("cache")
}

impl TtsCache {
    pub fn new(max_size: usize, ttl_hours: u64, cache_dir: Option<PathBuf>) -> Result<Self> {
        Self::with_ttl_seconds(
            max_size,
            ttl_hours as f64 * 3600.0,
            cache_dir.unwrap_or_else(default_cache_dir),
        )
    }

    pub fn from_config(cfg: &CacheConfig) -> Result<Self> {
        Self::new(cfg.max_size, cfg.ttl_hours, cfg.dir.clone())
    }

    /// Open (or create) a cache directory, restore metadata and purge stale
    /// entries.
    pub fn with_ttl_seconds(max_size: usize, ttl_seconds: f64, cache_dir: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&cache_dir)?;
        let metadata_file = cache_dir.join(METADATA_FILE);

        let mut cache = Self {
            cache_dir,
            metadata_file,
            max_size,
            ttl_seconds,
            slots: HashMap::new(),
            recency: BTreeMap::new(),
            next_seq: 0,
            hits: 0,
            misses: 0,
        };
        cache.load_metadata();
        cache.cleanup();
        Ok(cache)
    }

    fn load_metadata(&mut self) {
        if !self.metadata_file.exists() {
            return;
        }

        let parsed = std::fs::read_to_string(&self.metadata_file)
            .map_err(crate::TtsError::from)
            .and_then(|raw| {
                serde_json::from_str::<HashMap<String, CacheEntry>>(&raw)
                    .map_err(crate::TtsError::from)
            });

        let records = match parsed {
            Ok(records) => records,
            Err(e) => {
                warn!(target: "tts_cache", error = %e, "Failed to load cache metadata; starting empty");
                remove_file_best_effort(&self.metadata_file);
                return;
            }
        };

        // Recency is rebuilt from last_accessed, which every touch and insert
        // updates, so the oldest access is the LRU position.
        let mut restored: Vec<(String, CacheEntry)> = records
            .into_iter()
            .map(|(hash, mut entry)| {
                if entry.last_accessed <= 0.0 {
                    entry.last_accessed = entry.created_at;
                }
                (hash, entry)
            })
            .filter(|(_, entry)| entry.exists() && !entry.is_expired(self.ttl_seconds))
            .collect();
        restored.sort_by(|a, b| a.1.last_accessed.total_cmp(&b.1.last_accessed));

        for (hash, entry) in restored {
            self.insert_mru(hash, entry);
        }

        info!(target: "tts_cache", entries = self.slots.len(), "Loaded cache entries from metadata");
    }

    fn save_metadata(&self) {
        let snapshot: BTreeMap<&str, &CacheEntry> = self
            .slots
            .iter()
            .map(|(hash, slot)| (hash.as_str(), &slot.entry))
            .collect();

        let written = serde_json::to_string_pretty(&snapshot)
            .map_err(crate::TtsError::from)
            .and_then(|json| std::fs::write(&self.metadata_file, json).map_err(Into::into));
        if let Err(e) = written {
            warn!(target: "tts_cache", error = %e, "Failed to save cache metadata");
        }
    }

    fn insert_mru(&mut self, hash: String, entry: CacheEntry) {
        let seq = self.next_seq;
        self.next_seq += 1;
        if let Some(old) = self.slots.insert(hash.clone(), Slot { entry, seq }) {
            self.recency.remove(&old.seq);
        }
        self.recency.insert(seq, hash);
    }

    fn promote(&mut self, hash: &str) {
        let seq = self.next_seq;
        if let Some(slot) = self.slots.get_mut(hash) {
            self.next_seq += 1;
            self.recency.remove(&slot.seq);
            slot.seq = seq;
            self.recency.insert(seq, hash.to_string());
        }
    }

    fn remove_entry(&mut self, hash: &str) -> Option<CacheEntry> {
        let slot = self.slots.remove(hash)?;
        self.recency.remove(&slot.seq);
        Some(slot.entry)
    }

    /// Evict the least recently used entry and delete its file.
    fn evict_lru(&mut self) -> bool {
        let Some((_, hash)) = self.recency.pop_first() else {
            return false;
        };
        if let Some(slot) = self.slots.remove(&hash) {
            remove_file_best_effort(&slot.entry.file_path);
            debug!(target: "tts_cache", key = %hash, "Evicted LRU cache entry");
        }
        true
    }

    /// Look up a cached artifact.
    ///
    /// A hit promotes the entry to most recently used. Expired entries and
    /// entries whose file disappeared are purged and reported as a miss.
    pub fn get(&mut self, key: &CacheKey) -> Option<PathBuf> {
        let hash = key.to_hash();

        let stale = match self.slots.get(&hash) {
            None => {
                self.misses += 1;
                debug!(target: "tts_cache", key = %key, "Cache miss");
                return None;
            }
            Some(slot) => slot.entry.is_expired(self.ttl_seconds) || !slot.entry.exists(),
        };

        if stale {
            if let Some(entry) = self.remove_entry(&hash) {
                remove_file_best_effort(&entry.file_path);
            }
            self.save_metadata();
            self.misses += 1;
            debug!(target: "tts_cache", key = %key, "Cache entry stale; purged");
            return None;
        }

        self.promote(&hash);
        let slot = self.slots.get_mut(&hash)?;
        slot.entry.touch();
        self.hits += 1;
        debug!(target: "tts_cache", key = %key, "Cache hit");
        Some(slot.entry.file_path.clone())
    }

    /// Copy `source` into the cache under `key`.
    ///
    /// A missing source or a failed copy is logged and skipped; callers never
    /// see caching as a failure of their request.
    pub fn put(&mut self, key: &CacheKey, source: &Path) {
        if !source.exists() {
            warn!(target: "tts_cache", path = %source.display(), "Source file does not exist");
            return;
        }
        if self.max_size == 0 {
            debug!(target: "tts_cache", "Cache capacity is zero; not caching");
            return;
        }

        let hash = key.to_hash();
        let file_name = match source.extension().and_then(|e| e.to_str()) {
            Some(ext) => format!("{hash}.{ext}"),
            None => hash.clone(),
        };
        let cache_path = self.cache_dir.join(file_name);

        if let Err(e) = std::fs::copy(source, &cache_path) {
            warn!(target: "tts_cache", error = %e, path = %source.display(), "Failed to cache file");
            return;
        }

        if let Some(previous) = self.remove_entry(&hash) {
            if previous.file_path != cache_path {
                remove_file_best_effort(&previous.file_path);
            }
        } else {
            while self.slots.len() >= self.max_size {
                if !self.evict_lru() {
                    break;
                }
            }
        }

        self.insert_mru(hash, CacheEntry::new(cache_path.clone()));
        self.save_metadata();
        debug!(target: "tts_cache", key = %key, path = %cache_path.display(), "Cached file");
    }

    /// Remove every cached artifact and the metadata file, and reset counters.
    pub fn clear(&mut self) {
        for slot in self.slots.values() {
            remove_file_best_effort(&slot.entry.file_path);
        }
        self.slots.clear();
        self.recency.clear();
        remove_file_best_effort(&self.metadata_file);
        self.hits = 0;
        self.misses = 0;
        info!(target: "tts_cache", "Cache cleared");
    }

    pub fn stats(&self) -> CacheStats {
        let total_requests = self.hits + self.misses;
        let hit_rate = if total_requests > 0 {
            self.hits as f64 / total_requests as f64 * 100.0
        } else {
            0.0
        };

        let total_bytes: u64 = self
            .slots
            .values()
            .filter_map(|slot| std::fs::metadata(&slot.entry.file_path).ok())
            .map(|m| m.len())
            .sum();

        CacheStats {
            entries: self.slots.len(),
            max_size: self.max_size,
            hits: self.hits,
            misses: self.misses,
            hit_rate: round2(hit_rate),
            total_size_mb: round2(total_bytes as f64 / (1024.0 * 1024.0)),
            ttl_hours: self.ttl_seconds / 3600.0,
        }
    }

    /// Change capacity, evicting least recently used entries as needed.
    pub fn resize(&mut self, new_max_size: usize) {
        self.max_size = new_max_size;
        while self.slots.len() > self.max_size {
            if !self.evict_lru() {
                break;
            }
        }
        self.save_metadata();
        info!(target: "tts_cache", max_size = new_max_size, "Cache resized");
    }

    /// Drop every expired entry or entry whose file is gone. Returns the
    /// number removed.
    pub fn cleanup(&mut self) -> usize {
        let stale: Vec<String> = self
            .slots
            .iter()
            .filter(|(_, slot)| {
                slot.entry.is_expired(self.ttl_seconds) || !slot.entry.exists()
            })
            .map(|(hash, _)| hash.clone())
            .collect();

        for hash in &stale {
            if let Some(entry) = self.remove_entry(hash) {
                remove_file_best_effort(&entry.file_path);
            }
        }

        if !stale.is_empty() {
            info!(target: "tts_cache", removed = stale.len(), "Cleaned up expired cache entries");
            self.save_metadata();
        }
        stale.len()
    }

    pub fn entry(&self, key: &CacheKey) -> Option<&CacheEntry> {
        self.slots.get(&key.to_hash()).map(|slot| &slot.entry)
    }

    pub fn contains(&self, key: &CacheKey) -> bool {
        self.slots.contains_key(&key.to_hash())
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    pub fn metadata_path(&self) -> &Path {
        &self.metadata_file
    }
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}
