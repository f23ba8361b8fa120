//! Session and job tracker configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

fn default_tick_interval_ms() -> u64 {
    1000
}

fn default_rest_seconds() -> u32 {
    90
}

fn default_auto_start_rest() -> bool {
    true
}

fn default_poll_interval_secs() -> u64 {
    5
}

fn default_true() -> bool {
    true
}

// ============================================================================
// SessionConfig
// ============================================================================

/// Configuration for a workout session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Tick interval in milliseconds (100-1000)
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
    /// Rest used when an exercise has no rest time (0-900)
    #[serde(default = "default_rest_seconds")]
    pub default_rest_seconds: u32,
    /// Start the rest countdown after each logged set
    #[serde(default = "default_auto_start_rest")]
    pub auto_start_rest: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval_ms(),
            default_rest_seconds: default_rest_seconds(),
            auto_start_rest: default_auto_start_rest(),
        }
    }
}

impl SessionConfig {
    /// Sets the tick interval.
    pub fn with_tick_interval_ms(mut self, ms: u64) -> Self {
        self.tick_interval_ms = ms;
        self
    }

    /// Sets the default rest.
    pub fn with_default_rest_seconds(mut self, seconds: u32) -> Self {
        self.default_rest_seconds = seconds;
        self
    }

    /// Sets whether rest starts automatically after a logged set.
    pub fn with_auto_start_rest(mut self, enabled: bool) -> Self {
        self.auto_start_rest = enabled;
        self
    }

    /// Tick interval as a duration.
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    /// Validates the configuration.
    ///
    /// Returns an error message if validation fails.
    pub fn validate(&self) -> Result<(), String> {
        if self.tick_interval_ms < 100 || self.tick_interval_ms > 1000 {
            return Err("tick interval must be between 100 and 1000 ms".to_string());
        }
        if self.default_rest_seconds > 900 {
            return Err("default rest must be at most 900 seconds".to_string());
        }
        Ok(())
    }
}

// ============================================================================
// JobTrackerConfig
// ============================================================================

/// Configuration for the background job tracker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobTrackerConfig {
    /// User whose jobs are tracked
    pub user_id: String,
    /// Poll interval in seconds (1-60)
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    /// Schedule a local notification when a job completes
    #[serde(default = "default_true")]
    pub notify_on_complete: bool,
    /// Ask for push permission before starting a generation
    #[serde(default = "default_true")]
    pub request_push_permission: bool,
}

impl JobTrackerConfig {
    /// Creates a configuration for the given user.
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            poll_interval_secs: default_poll_interval_secs(),
            notify_on_complete: true,
            request_push_permission: true,
        }
    }

    /// Sets the poll interval.
    pub fn with_poll_interval_secs(mut self, secs: u64) -> Self {
        self.poll_interval_secs = secs;
        self
    }

    /// Sets whether completions schedule a local notification.
    pub fn with_notify_on_complete(mut self, enabled: bool) -> Self {
        self.notify_on_complete = enabled;
        self
    }

    /// Sets whether push permission is requested before generating.
    pub fn with_request_push_permission(mut self, enabled: bool) -> Self {
        self.request_push_permission = enabled;
        self
    }

    /// Poll interval as a duration.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    /// Validates the configuration.
    ///
    /// Returns an error message if validation fails.
    pub fn validate(&self) -> Result<(), String> {
        if self.user_id.trim().is_empty() {
            return Err("user id must not be empty".to_string());
        }
        if self.poll_interval_secs < 1 || self.poll_interval_secs > 60 {
            return Err("poll interval must be between 1 and 60 seconds".to_string());
        }
        Ok(())
    }
}
