//! Configuration settings for the loom materialization engine.
//!
//! This module defines the process-wide settings: network timeout, where the
//! built-in templates live, the on-disk bundle root, and the driver's tick
//! pacing. Configuration can be loaded from environment variables or
//! constructed programmatically.

use core::time::Duration;
use std::env;
use std::path::PathBuf;

/// Default network timeout in seconds.
pub const DEFAULT_TIMEOUT_SEC: u64 = 5;
/// Default bundle prefix for built-in content templates.
pub const DEFAULT_BUILTIN_TEMPLATE_PREFIX: &str = "Views/Default/";

/// Runtime configuration for resource fetching and scheduling.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoomConfig {
    /// Timeout for network image and descriptor fetches; 0 disables it
    pub timeout_sec: u64,
    /// Bundle path prefix the built-in content templates load from
    pub builtin_template_prefix: String,
    /// Directory backing the local bundle, if any
    pub bundle_root: Option<PathBuf>,
    /// Wall-clock pause between scheduler ticks in drive loops
    pub tick_interval_ms: u64,
    /// Ceiling on ticks a drive loop may run before giving up
    pub max_ticks: u64,
}

impl Default for LoomConfig {
    fn default() -> Self {
        Self {
            timeout_sec: DEFAULT_TIMEOUT_SEC,
            builtin_template_prefix: String::from(DEFAULT_BUILTIN_TEMPLATE_PREFIX),
            bundle_root: None,
            tick_interval_ms: 16,
            max_ticks: 100_000,
        }
    }
}

impl LoomConfig {
    /// Construct a configuration with explicit values.
    ///
    /// # Arguments
    ///
    /// * `timeout_sec` - Network timeout in seconds (0 disables the timeout)
    /// * `builtin_template_prefix` - Bundle prefix for built-in templates
    /// * `bundle_root` - Optional directory backing the local bundle
    #[inline]
    #[must_use]
    pub fn new(
        timeout_sec: u64,
        builtin_template_prefix: impl Into<String>,
        bundle_root: Option<PathBuf>,
    ) -> Self {
        Self {
            timeout_sec,
            builtin_template_prefix: builtin_template_prefix.into(),
            bundle_root,
            ..Self::default()
        }
    }

    /// Load configuration from environment variables.
    ///
    /// Reads the following environment variables:
    /// - `LOOM_TIMEOUT_SEC`: Network timeout in seconds (default: 5, 0 disables)
    /// - `LOOM_BUILTIN_TEMPLATE_PREFIX`: Built-in template prefix (default: `Views/Default/`)
    /// - `LOOM_BUNDLE_ROOT`: Directory backing the local bundle
    /// - `LOOM_TICK_INTERVAL_MS`: Pause between ticks in drive loops (default: 16)
    /// - `LOOM_MAX_TICKS`: Drive loop tick ceiling (default: 100000)
    #[inline]
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let timeout_sec = env::var("LOOM_TIMEOUT_SEC")
            .ok()
            .and_then(|val| val.parse::<u64>().ok())
            .unwrap_or(defaults.timeout_sec);
        let builtin_template_prefix = env::var("LOOM_BUILTIN_TEMPLATE_PREFIX")
            .ok()
            .filter(|val| !val.is_empty())
            .unwrap_or(defaults.builtin_template_prefix);
        let bundle_root = env::var_os("LOOM_BUNDLE_ROOT").map(PathBuf::from);
        let tick_interval_ms = env::var("LOOM_TICK_INTERVAL_MS")
            .ok()
            .and_then(|val| val.parse::<u64>().ok())
            .unwrap_or(defaults.tick_interval_ms);
        let max_ticks = env::var("LOOM_MAX_TICKS")
            .ok()
            .and_then(|val| val.parse::<u64>().ok())
            .unwrap_or(defaults.max_ticks)
            .max(1);
        Self {
            timeout_sec,
            builtin_template_prefix,
            bundle_root,
            tick_interval_ms,
            max_ticks,
        }
    }

    /// Get the network timeout as a `Duration`.
    ///
    /// # Returns
    ///
    /// The timeout if one is configured, otherwise `None`
    #[inline]
    #[must_use]
    pub const fn timeout(&self) -> Option<Duration> {
        if self.timeout_sec == 0 {
            None
        } else {
            Some(Duration::from_secs(self.timeout_sec))
        }
    }

    /// Get the pause between drive-loop ticks.
    #[inline]
    #[must_use]
    pub const fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    /// Bundle path of the built-in template for a tag name.
    #[inline]
    #[must_use]
    pub fn builtin_template_path(&self, tag_name: &str) -> String {
        format!("{}{tag_name}", self.builtin_template_prefix)
    }
}
