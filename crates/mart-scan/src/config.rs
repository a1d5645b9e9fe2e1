//! # Scan Configuration
//!
//! Configuration for the scan runtime.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     MART_QUIET_MS=250                                                  │
//! │     MART_REMOTE_ENABLED=false                                          │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/mart-pos/scan.toml (Linux)                               │
//! │     ~/Library/Application Support/com.mart.pos/scan.toml (macOS)       │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! │     QUIET_MS = 300, DEDUP_MS = 1000                                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! # scan.toml
//! [timing]
//! quiet_ms = 300
//! dedup_ms = 1000
//! min_token_len = 6
//!
//! [resolver]
//! remote_enabled = true
//! remote_timeout_ms = 800
//! snapshot_ttl_secs = 300
//!
//! [labels]
//! max_code128_len = 48
//! ```

use std::path::PathBuf;
use std::time::Duration;

use mart_core::{ScanTiming, DEDUP_MS, MAX_CODE128_LEN, MIN_TOKEN_LEN, QUIET_MS};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::error::{ScanError, ScanResult};

// =============================================================================
// Timing Settings
// =============================================================================

/// Classifier and deduplicator timing, shared by every surface.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct TimingSettings {
    /// Inactivity before a candidate buffer completes (ms).
    #[serde(default = "default_quiet_ms")]
    pub quiet_ms: u64,

    /// Duplicate suppression window (ms).
    #[serde(default = "default_dedup_ms")]
    pub dedup_ms: u64,

    #[serde(default = "default_min_token_len")]
    pub min_token_len: usize,
}

fn default_quiet_ms() -> u64 {
    QUIET_MS
}

fn default_dedup_ms() -> u64 {
    DEDUP_MS
}

fn default_min_token_len() -> usize {
    MIN_TOKEN_LEN
}

impl Default for TimingSettings {
    fn default() -> Self {
        TimingSettings {
            quiet_ms: default_quiet_ms(),
            dedup_ms: default_dedup_ms(),
            min_token_len: default_min_token_len(),
        }
    }
}

// =============================================================================
// Resolver Settings
// =============================================================================

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ResolverSettings {
    /// Whether tier 1 (remote registry) is consulted at all.
    #[serde(default = "default_true")]
    pub remote_enabled: bool,

    /// Upper bound on a single remote lookup (ms).
    #[serde(default = "default_remote_timeout_ms")]
    pub remote_timeout_ms: u64,

    /// Age after which the local snapshot is refreshed (seconds).
    #[serde(default = "default_snapshot_ttl_secs")]
    pub snapshot_ttl_secs: u64,
}

fn default_true() -> bool {
    true
}

fn default_remote_timeout_ms() -> u64 {
    800
}

fn default_snapshot_ttl_secs() -> u64 {
    300
}

impl ResolverSettings {
    pub fn remote_timeout(&self) -> Duration {
        Duration::from_millis(self.remote_timeout_ms)
    }

    pub fn snapshot_ttl(&self) -> Duration {
        Duration::from_secs(self.snapshot_ttl_secs)
    }
}

impl Default for ResolverSettings {
    fn default() -> Self {
        ResolverSettings {
            remote_enabled: true,
            remote_timeout_ms: default_remote_timeout_ms(),
            snapshot_ttl_secs: default_snapshot_ttl_secs(),
        }
    }
}

// =============================================================================
// Label Settings
// =============================================================================

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct LabelSettings {
    /// Longest value accepted for the CODE128 fallback.
    #[serde(default = "default_max_code128_len")]
    pub max_code128_len: usize,
}

fn default_max_code128_len() -> usize {
    MAX_CODE128_LEN
}

impl Default for LabelSettings {
    fn default() -> Self {
        LabelSettings {
            max_code128_len: default_max_code128_len(),
        }
    }
}

// =============================================================================
// Scan Config
// =============================================================================

/// Complete scan runtime configuration.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct ScanConfig {
    #[serde(default)]
    pub timing: TimingSettings,

    #[serde(default)]
    pub resolver: ResolverSettings,

    #[serde(default)]
    pub labels: LabelSettings,
}

impl ScanConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (scan.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> ScanResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading scan config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Loads config or returns default if load fails.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load scan config: {}. Using defaults.", e);
            Self::default()
        })
    }

    /// Validates the configuration.
    pub fn validate(&self) -> ScanResult<()> {
        let timing = &self.timing;

        if timing.quiet_ms == 0 {
            return Err(ScanError::InvalidConfig(
                "quiet_ms must be greater than 0".into(),
            ));
        }

        // A quiet interval longer than the dedup window would let a single
        // scan's echo land after the window closes.
        if timing.quiet_ms >= timing.dedup_ms {
            return Err(ScanError::InvalidConfig(format!(
                "quiet_ms ({}) must be less than dedup_ms ({})",
                timing.quiet_ms, timing.dedup_ms
            )));
        }

        // The token length may be raised, never lowered.
        if timing.min_token_len < MIN_TOKEN_LEN {
            return Err(ScanError::InvalidConfig(format!(
                "min_token_len ({}) must be at least {}",
                timing.min_token_len, MIN_TOKEN_LEN
            )));
        }

        if self.resolver.remote_timeout_ms == 0 {
            return Err(ScanError::InvalidConfig(
                "remote_timeout_ms must be greater than 0".into(),
            ));
        }

        if self.labels.max_code128_len == 0 {
            return Err(ScanError::InvalidConfig(
                "max_code128_len must be greater than 0".into(),
            ));
        }

        Ok(())
    }

    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Applies `MART_*` overrides from `lookup`. Unparseable values are
    /// logged and ignored.
    fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        fn parsed<T: std::str::FromStr>(key: &str, value: Option<String>) -> Option<T> {
            let value = value?;
            match value.trim().parse() {
                Ok(v) => Some(v),
                Err(_) => {
                    warn!(key = key, value = %value, "Ignoring unparseable environment override");
                    None
                }
            }
        }

        if let Some(ms) = parsed("MART_QUIET_MS", lookup("MART_QUIET_MS")) {
            debug!(quiet_ms = ms, "Overriding quiet interval from environment");
            self.timing.quiet_ms = ms;
        }

        if let Some(ms) = parsed("MART_DEDUP_MS", lookup("MART_DEDUP_MS")) {
            debug!(dedup_ms = ms, "Overriding dedup window from environment");
            self.timing.dedup_ms = ms;
        }

        if let Some(len) = parsed("MART_MIN_TOKEN_LEN", lookup("MART_MIN_TOKEN_LEN")) {
            self.timing.min_token_len = len;
        }

        if let Some(enabled) = parsed("MART_REMOTE_ENABLED", lookup("MART_REMOTE_ENABLED")) {
            debug!(remote_enabled = enabled, "Overriding remote lookup from environment");
            self.resolver.remote_enabled = enabled;
        }

        if let Some(ms) = parsed("MART_REMOTE_TIMEOUT_MS", lookup("MART_REMOTE_TIMEOUT_MS")) {
            self.resolver.remote_timeout_ms = ms;
        }

        if let Some(secs) = parsed("MART_SNAPSHOT_TTL_SECS", lookup("MART_SNAPSHOT_TTL_SECS")) {
            self.resolver.snapshot_ttl_secs = secs;
        }

        if let Some(len) = parsed("MART_MAX_CODE128_LEN", lookup("MART_MAX_CODE128_LEN")) {
            self.labels.max_code128_len = len;
        }
    }

    /// Returns the default config file path.
    fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "mart", "pos")
            .map(|dirs| dirs.config_dir().join("scan.toml"))
    }

    // =========================================================================
    // Convenience Methods
    // =========================================================================

    /// Timing constants for classifiers and the deduplicator.
    pub fn scan_timing(&self) -> ScanTiming {
        ScanTiming {
            quiet: Duration::from_millis(self.timing.quiet_ms),
            dedup_window: Duration::from_millis(self.timing.dedup_ms),
            min_token_len: self.timing.min_token_len,
        }
    }
}
