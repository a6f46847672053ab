use crate::cache::SharedCache;
use crate::tools::{Tool, ToolError, ToolResult};
use async_trait::async_trait;
use serde_json::{json, Value};

fn require(cache: &Option<SharedCache>) -> ToolResult<&SharedCache> {
    cache
        .as_ref()
        .ok_or_else(|| ToolError::ExecutionFailed("Audio cache is disabled".to_string()))
}

fn no_arguments() -> Value {
    json!({
        "type": "object",
        "properties": {}
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// get_cache_stats
// ─────────────────────────────────────────────────────────────────────────────

pub struct CacheStatsTool {
    cache: Option<SharedCache>,
}

impl CacheStatsTool {
    pub fn new(cache: Option<SharedCache>) -> Self {
        Self { cache }
    }
}

#[async_trait]
impl Tool for CacheStatsTool {
    fn name(&self) -> String {
        "get_cache_stats".to_string()
    }

    fn description(&self) -> String {
        "Show audio cache statistics: entries, hit rate and disk usage".to_string()
    }

    fn parameters(&self) -> Value {
        no_arguments()
    }

    async fn call(&self, _arguments: Value) -> ToolResult<Value> {
        let Some(cache) = &self.cache else {
            return Ok(json!({ "success": true, "enabled": false }));
        };
        let stats = cache.lock().await.stats();
        let mut out = serde_json::to_value(stats)
            .map_err(|e| ToolError::Internal(format!("Failed to encode stats: {e}")))?;
        if let Some(map) = out.as_object_mut() {
            map.insert("success".into(), json!(true));
            map.insert("enabled".into(), json!(true));
        }
        Ok(out)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// clear_cache
// ─────────────────────────────────────────────────────────────────────────────

pub struct ClearCacheTool {
    cache: Option<SharedCache>,
}

impl ClearCacheTool {
    pub fn new(cache: Option<SharedCache>) -> Self {
        Self { cache }
    }
}

#[async_trait]
impl Tool for ClearCacheTool {
    fn name(&self) -> String {
        "clear_cache".to_string()
    }

    fn description(&self) -> String {
        "Delete every cached audio file and reset cache statistics".to_string()
    }

    fn parameters(&self) -> Value {
        no_arguments()
    }

    async fn call(&self, _arguments: Value) -> ToolResult<Value> {
        let mut cache = require(&self.cache)?.lock().await;
        let removed = cache.len();
        cache.clear();
        Ok(json!({
            "success": true,
            "removed": removed,
            "message": format!("Cleared {removed} cached audio files"),
        }))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// cleanup_cache
// ─────────────────────────────────────────────────────────────────────────────

pub struct CleanupCacheTool {
    cache: Option<SharedCache>,
}

impl CleanupCacheTool {
    pub fn new(cache: Option<SharedCache>) -> Self {
        Self { cache }
    }
}

#[async_trait]
impl Tool for CleanupCacheTool {
    fn name(&self) -> String {
        "cleanup_cache".to_string()
    }

    fn description(&self) -> String {
        "Remove expired cache entries and entries whose files are missing".to_string()
    }

    fn parameters(&self) -> Value {
        no_arguments()
    }

    async fn call(&self, _arguments: Value) -> ToolResult<Value> {
        let mut cache = require(&self.cache)?.lock().await;
        let removed = cache.cleanup();
        Ok(json!({
            "success": true,
            "removed": removed,
            "entries": cache.len(),
        }))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// resize_cache
// ─────────────────────────────────────────────────────────────────────────────

pub struct ResizeCacheTool {
    cache: Option<SharedCache>,
}

impl ResizeCacheTool {
    pub fn new(cache: Option<SharedCache>) -> Self {
        Self { cache }
    }
}

#[async_trait]
impl Tool for ResizeCacheTool {
    fn name(&self) -> String {
        "resize_cache".to_string()
    }

    fn description(&self) -> String {
        "Change the maximum number of cached entries, evicting least recently used ones".to_string()
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "max_size": {
                    "type": "integer",
                    "minimum": 0,
                    "description": "New maximum number of entries"
                }
            },
            "required": ["max_size"]
        })
    }

    async fn call(&self, arguments: Value) -> ToolResult<Value> {
        let max_size = arguments["max_size"].as_u64().ok_or_else(|| {
            ToolError::InvalidArguments("'max_size' must be a non-negative integer".to_string())
        })?;
        let max_size = usize::try_from(max_size)
            .map_err(|_| ToolError::InvalidArguments("'max_size' is too large".to_string()))?;

        let mut cache = require(&self.cache)?.lock().await;
        cache.resize(max_size);
        Ok(json!({
            "success": true,
            "max_size": cache.max_size(),
            "entries": cache.len(),
        }))
    }
}
