//! Tuning parameters for the field diff codec and the record aligner
//!
//! All tuning is passed explicitly at construction time; nothing is kept in process-wide
//! state.

use std::path::PathBuf;
use std::time::Duration;

/// Default time budget for a single field comparison
pub const DEFAULT_DIFF_TIMEOUT: Duration = Duration::from_micros(500);

/// Default number of characters searched for an optimal edit script
pub const DEFAULT_MATCH_WINDOW: usize = 1000;

/// Default number of original records scanned ahead when resynchronizing
pub const DEFAULT_RESYNC_WINDOW: usize = 1024;

/// Tuning of the string diff primitive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiffConfig {
    /// Time budget per field comparison.
    ///
    /// Once exceeded the diff falls back to a coarser, but still valid, edit script.
    pub timeout: Duration,

    /// Maximum length (in characters) of the differing middle section of two fields that
    /// is searched for an optimal edit script.
    ///
    /// Longer sections are encoded as a plain replacement.
    pub match_window: usize,
}
impl Default for DiffConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_DIFF_TIMEOUT,
            match_window: DEFAULT_MATCH_WINDOW,
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct DiffConfigBuilder {
    timeout: Option<Duration>,
    match_window: Option<usize>,
}
impl DiffConfigBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
    #[must_use]
    pub fn match_window(mut self, match_window: usize) -> Self {
        self.match_window = Some(match_window);
        self
    }
    #[must_use]
    pub fn build(self) -> DiffConfig {
        DiffConfig {
            timeout: self.timeout.unwrap_or(DEFAULT_DIFF_TIMEOUT),
            match_window: self.match_window.unwrap_or(DEFAULT_MATCH_WINDOW),
        }
    }
}

/// Configuration of a delta creation or rebuild pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeltaConfig {
    /// Tuning of the field diff codec
    pub diff: DiffConfig,

    /// Number of original records scanned ahead for a matching identifier key before a
    /// processed record is treated as an insertion (always at least 1)
    pub resync_window: usize,

    /// Directory receiving temporary files (defaults to the system temp directory)
    pub temp_dir: Option<PathBuf>,
}
impl Default for DeltaConfig {
    fn default() -> Self {
        Self {
            diff: DiffConfig::default(),
            resync_window: DEFAULT_RESYNC_WINDOW,
            temp_dir: None,
        }
    }
}

/// Builder for [`DeltaConfig`]
///
/// ```
/// # use fqdelta::{DeltaConfigBuilder, DiffConfigBuilder};
/// # use std::time::Duration;
/// let config = DeltaConfigBuilder::default()
///     .diff(DiffConfigBuilder::new().timeout(Duration::from_millis(2)).build())
///     .resync_window(64)
///     .build();
/// assert_eq!(config.resync_window, 64);
/// ```
#[derive(Debug, Default, Clone)]
pub struct DeltaConfigBuilder {
    diff: Option<DiffConfig>,
    resync_window: Option<usize>,
    temp_dir: Option<PathBuf>,
}
impl DeltaConfigBuilder {
    #[must_use]
    pub fn diff(mut self, diff: DiffConfig) -> Self {
        self.diff = Some(diff);
        self
    }
    #[must_use]
    pub fn resync_window(mut self, resync_window: usize) -> Self {
        self.resync_window = Some(resync_window);
        self
    }
    #[must_use]
    pub fn temp_dir(mut self, temp_dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = Some(temp_dir.into());
        self
    }
    #[must_use]
    pub fn build(self) -> DeltaConfig {
        DeltaConfig {
            diff: self.diff.unwrap_or_default(),
            resync_window: self.resync_window.unwrap_or(DEFAULT_RESYNC_WINDOW).max(1),
            temp_dir: self.temp_dir,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = DeltaConfigBuilder::default().build();
        assert_eq!(config, DeltaConfig::default());
        assert_eq!(config.diff.timeout, Duration::from_micros(500));
    }

    #[test]
    fn test_resync_window_is_at_least_one() {
        let config = DeltaConfigBuilder::default().resync_window(0).build();
        assert_eq!(config.resync_window, 1);
    }
}
