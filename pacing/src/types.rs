use std::fmt;
use std::time::Duration;

use pacing_core::SchedulerError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::backoff::{
    DEFAULT_DELAY_FACTOR, DEFAULT_MAX_ATTEMPTS, DEFAULT_MAX_DELAY, DEFAULT_RANDOMIZATION_FACTOR,
};

/// Which engine a [`PolicyRef`] configures.
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PolicyKind {
    Debounce,
    Throttle,
    Backoff,
}

impl fmt::Display for PolicyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PolicyKind::Debounce => "debounce",
            PolicyKind::Throttle => "throttle",
            PolicyKind::Backoff => "backoff",
        };
        f.write_str(name)
    }
}

/// Named policy stored in a [`PolicyConfig`].
///
/// Fields that do not apply to `kind` are ignored.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct PolicyRef {
    pub name: String,
    pub kind: PolicyKind,
    #[serde(default)]
    pub wait_ms: Option<u64>,
    #[serde(default)]
    pub leading: Option<bool>,
    #[serde(default)]
    pub trailing: Option<bool>,
    #[serde(default)]
    pub max_wait_ms: Option<u64>,
    #[serde(default)]
    pub delay_factor_ms: Option<u64>,
    #[serde(default)]
    pub randomization_factor: Option<f64>,
    #[serde(default)]
    pub max_delay_ms: Option<u64>,
    #[serde(default)]
    pub max_attempts: Option<u32>,
}

impl PolicyRef {
    /// Quiet period for debounce and throttle policies.
    pub fn wait(&self) -> Option<Duration> {
        self.wait_ms.map(Duration::from_millis)
    }

    /// Whether the leading edge fires. Throttles default to `true`, debounces to `false`.
    pub fn leading(&self) -> bool {
        self.leading.unwrap_or(self.kind == PolicyKind::Throttle)
    }

    pub fn trailing(&self) -> bool {
        self.trailing.unwrap_or(true)
    }

    pub fn max_wait(&self) -> Option<Duration> {
        self.max_wait_ms.map(Duration::from_millis)
    }

    pub fn delay_factor(&self) -> Duration {
        self.delay_factor_ms
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_DELAY_FACTOR)
    }

    pub fn randomization_factor(&self) -> f64 {
        self.randomization_factor.unwrap_or(DEFAULT_RANDOMIZATION_FACTOR)
    }

    pub fn max_delay(&self) -> Duration {
        self.max_delay_ms
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_MAX_DELAY)
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts.unwrap_or(DEFAULT_MAX_ATTEMPTS)
    }
}

/// Policy configuration file structure.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct PolicyConfig {
    pub policies: Vec<PolicyRef>,
}

/// Errors surfaced while building or configuring the wrappers.
///
/// Failures of wrapped functions are never converted into this type; they
/// reach the caller unchanged.
#[derive(Debug, Error)]
pub enum PacingError {
    #[error("invalid configuration: {0}")]
    Configuration(String),
    #[error("policy `{0}` not found")]
    PolicyNotFound(String),
    #[error("policy `{name}` is a {actual} policy, not {expected}")]
    PolicyKindMismatch {
        name: String,
        expected: PolicyKind,
        actual: PolicyKind,
    },
    #[error("invalid policy `{name}`: {reason}")]
    InvalidPolicy { name: String, reason: String },
    #[error(transparent)]
    Scheduler(#[from] SchedulerError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Config(#[from] serde_yaml_bw::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl PacingError {
    pub fn configuration(reason: impl Into<String>) -> Self {
        PacingError::Configuration(reason.into())
    }

    pub fn policy_not_found(name: impl Into<String>) -> Self {
        PacingError::PolicyNotFound(name.into())
    }

    pub fn invalid_policy(name: impl Into<String>, reason: impl Into<String>) -> Self {
        PacingError::InvalidPolicy {
            name: name.into(),
            reason: reason.into(),
        }
    }
}
