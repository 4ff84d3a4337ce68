//! Engine configuration.
//!
//! [`EngineConfig`] can be built in code, read from environment variables,
//! or loaded from a JSON file:
//! - `CELLGRAPH_MEMO_CAPACITY`: memoized values kept by the LRU policy (default: 4096)
//! - `CELLGRAPH_CACHE_POLICY`: `lru` or `unbounded` (default: `lru`)
//! - `CELLGRAPH_HASH_CACHE_LIMIT`: contexts remembered per cell fingerprint map (default: 1024)

use std::num::NonZeroUsize;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::memo::{CachePolicy, LruPolicy, UnboundedPolicy};

pub const DEFAULT_MEMO_CAPACITY: usize = 4096;
pub const DEFAULT_HASH_CACHE_LIMIT: usize = 1024;

/// Which [`CachePolicy`] backs the memo table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CachePolicyKind {
    #[default]
    Lru,
    Unbounded,
}

impl FromStr for CachePolicyKind {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "lru" => Ok(CachePolicyKind::Lru),
            "unbounded" => Ok(CachePolicyKind::Unbounded),
            other => Err(EngineError::Config {
                reason: format!("unknown cache policy '{other}' (expected 'lru' or 'unbounded')"),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub memo_capacity: usize,
    pub cache_policy: CachePolicyKind,
    pub hash_cache_limit: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            memo_capacity: DEFAULT_MEMO_CAPACITY,
            cache_policy: CachePolicyKind::Lru,
            hash_cache_limit: DEFAULT_HASH_CACHE_LIMIT,
        }
    }
}

impl EngineConfig {
    /// Reads overrides from the process environment.
    pub fn from_env() -> Result<Self, EngineError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Reads overrides through `lookup`, starting from the defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, EngineError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = EngineConfig::default();
        if let Some(raw) = lookup("CELLGRAPH_MEMO_CAPACITY") {
            config.memo_capacity = parse_usize("CELLGRAPH_MEMO_CAPACITY", &raw)?;
        }
        if let Some(raw) = lookup("CELLGRAPH_CACHE_POLICY") {
            config.cache_policy = raw.parse()?;
        }
        if let Some(raw) = lookup("CELLGRAPH_HASH_CACHE_LIMIT") {
            config.hash_cache_limit = parse_usize("CELLGRAPH_HASH_CACHE_LIMIT", &raw)?;
        }
        config.validate()?;
        Ok(config)
    }

    /// Loads a JSON config file. Missing fields take their defaults.
    pub fn from_json_file(path: &Path) -> Result<Self, EngineError> {
        let data = std::fs::read_to_string(path).map_err(|e| EngineError::Config {
            reason: format!("cannot read '{}': {e}", path.display()),
        })?;
        Self::from_json_str(&data)
    }

    pub fn from_json_str(data: &str) -> Result<Self, EngineError> {
        let config: EngineConfig = serde_json::from_str(data).map_err(|e| EngineError::Config {
            reason: format!("malformed config: {e}"),
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        if self.memo_capacity == 0 {
            return Err(EngineError::Config {
                reason: "memo_capacity must be at least 1".into(),
            });
        }
        if self.hash_cache_limit == 0 {
            return Err(EngineError::Config {
                reason: "hash_cache_limit must be at least 1".into(),
            });
        }
        Ok(())
    }

    /// Builds the memo storage policy this config asks for.
    pub(crate) fn build_policy(&self) -> Result<Box<dyn CachePolicy>, EngineError> {
        match self.cache_policy {
            CachePolicyKind::Lru => {
                let capacity =
                    NonZeroUsize::new(self.memo_capacity).ok_or_else(|| EngineError::Config {
                        reason: "memo_capacity must be at least 1".into(),
                    })?;
                Ok(Box::new(LruPolicy::new(capacity)))
            }
            CachePolicyKind::Unbounded => Ok(Box::new(UnboundedPolicy::new())),
        }
    }
}

fn parse_usize(name: &str, raw: &str) -> Result<usize, EngineError> {
    raw.trim().parse().map_err(|_| EngineError::Config {
        reason: format!("{name} must be a non-negative integer, got '{raw}'"),
    })
}
