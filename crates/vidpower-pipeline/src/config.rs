//! Pipeline Configuration
//!
//! Runtime knobs for the coordinator task. The per-session video settings
//! live in [`ModelConfig`](vidpower_model::ModelConfig); this config covers
//! how the pipeline itself runs.
//!
//! # Examples
//!
//! ```rust
//! use std::time::Duration;
//! use vidpower_pipeline::PipelineConfig;
//!
//! // Using builder pattern
//! let config = PipelineConfig::builder()
//!     .refresh_interval(Duration::from_millis(16))
//!     .resolve_timeout(Duration::from_secs(10))
//!     .build();
//!
//! // Using struct literal with defaults
//! let config = PipelineConfig {
//!     command_channel_size: 64,
//!     ..Default::default()
//! };
//! assert!(config.validate().is_ok());
//! ```

use std::time::Duration;

/// Configuration for a [`Pipeline`](crate::Pipeline)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Capacity of the command channel (default: 32)
    pub command_channel_size: usize,

    /// Capacity of the decoder event channel (default: 1)
    ///
    /// This bounds how far a self-pacing decoder can run ahead of the
    /// presenter. Keep it small.
    pub event_channel_capacity: usize,

    /// Period of the display refresh tick (default: none)
    ///
    /// With `None` the presenter only advances on explicit
    /// [`PipelineHandle::display_refresh`](crate::PipelineHandle::display_refresh)
    /// calls, which is what deterministic tests want.
    pub refresh_interval: Option<Duration>,

    /// Asset resolution timeout (default: 30s)
    ///
    /// Enforced by the coordinator on every reset, whatever decoder it drives.
    pub resolve_timeout: Option<Duration>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            command_channel_size: 32,
            event_channel_capacity: 1,
            refresh_interval: None,
            resolve_timeout: Some(Duration::from_secs(30)),
        }
    }
}

impl PipelineConfig {
    /// Create a builder
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder::default()
    }

    /// Validate configuration
    ///
    /// Returns a list of issues if the config is invalid.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut issues = Vec::new();

        if self.command_channel_size == 0 {
            issues.push("command_channel_size must be at least 1".to_string());
        }

        if self.event_channel_capacity == 0 {
            issues.push("event_channel_capacity must be at least 1".to_string());
        }

        if self.event_channel_capacity > 8 {
            issues.push("event_channel_capacity should not exceed 8".to_string());
        }

        if self.refresh_interval.is_some_and(|interval| interval.is_zero()) {
            issues.push("refresh_interval cannot be zero".to_string());
        }

        if self.resolve_timeout.is_some_and(|timeout| timeout.is_zero()) {
            issues.push("resolve_timeout cannot be zero".to_string());
        }

        if issues.is_empty() {
            Ok(())
        } else {
            Err(issues)
        }
    }
}

/// Builder for [`PipelineConfig`]
#[derive(Debug, Clone, Default)]
pub struct PipelineConfigBuilder {
    command_channel_size: Option<usize>,
    event_channel_capacity: Option<usize>,
    refresh_interval: Option<Duration>,
    resolve_timeout: Option<Option<Duration>>,
}

impl PipelineConfigBuilder {
    /// Set command channel capacity
    #[must_use]
    pub fn command_channel_size(mut self, size: usize) -> Self {
        self.command_channel_size = Some(size);
        self
    }

    /// Set decoder event channel capacity
    #[must_use]
    pub fn event_channel_capacity(mut self, capacity: usize) -> Self {
        self.event_channel_capacity = Some(capacity);
        self
    }

    /// Drive the presenter from a periodic refresh tick
    #[must_use]
    pub fn refresh_interval(mut self, interval: Duration) -> Self {
        self.refresh_interval = Some(interval);
        self
    }

    /// Set asset resolution timeout
    #[must_use]
    pub fn resolve_timeout(mut self, timeout: Duration) -> Self {
        self.resolve_timeout = Some(Some(timeout));
        self
    }

    /// Wait for asset resolution indefinitely
    #[must_use]
    pub fn no_resolve_timeout(mut self) -> Self {
        self.resolve_timeout = Some(None);
        self
    }

    /// Build the configuration
    #[must_use]
    pub fn build(self) -> PipelineConfig {
        let defaults = PipelineConfig::default();

        PipelineConfig {
            command_channel_size: self
                .command_channel_size
                .unwrap_or(defaults.command_channel_size),
            event_channel_capacity: self
                .event_channel_capacity
                .unwrap_or(defaults.event_channel_capacity),
            refresh_interval: self.refresh_interval.or(defaults.refresh_interval),
            resolve_timeout: self.resolve_timeout.unwrap_or(defaults.resolve_timeout),
        }
    }
}
