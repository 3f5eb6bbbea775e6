//! Configuration types.
//!
//! Mirrors the shape the host platform feeds us: per-filter enablement flags
//! and thresholds, a manual-approval block, and a per-group auto-accept rule
//! table. Pattern strings stay raw here; they are compiled once into a
//! [`RuleSet`](crate::rules::RuleSet) at load time.

use std::str::FromStr;
use std::time::Duration;

use regex::Regex;
use serde::Deserialize;

use crate::error::ConfigError;

/// Top-level moderation configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ModerationConfig {
    /// Throttle window in minutes for the duplicate-request counter.
    pub interval: u32,
    /// Global comment denylist.
    pub deny_patterns: DenyPatternConfig,
    /// Duplicate-request throttle.
    pub unique: UniqueConfig,
    /// Prior-membership check.
    pub rejoin: RejoinConfig,
    /// Per-group auto-accept rules.
    pub auto_accept: Vec<AutoAcceptRuleConfig>,
    /// Manual escalation to a human reviewer.
    pub manual: ManualConfig,
}

impl Default for ModerationConfig {
    fn default() -> Self {
        Self {
            interval: 5,
            deny_patterns: DenyPatternConfig::default(),
            unique: UniqueConfig::default(),
            rejoin: RejoinConfig::default(),
            auto_accept: Vec::new(),
            manual: ManualConfig::default(),
        }
    }
}

impl ModerationConfig {
    /// Expiry window for the duplicate-request counter.
    pub fn throttle_window(&self) -> Duration {
        Duration::from_secs(u64::from(self.interval) * 60)
    }

    /// Validate the configuration, returning the first error found.
    ///
    /// This is the configuration-time rejection surface: hosts that want
    /// malformed patterns or notify targets to be load errors call this.
    /// The engine itself degrades the offending rule to a no-op instead.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for pattern in &self.deny_patterns.patterns {
            Regex::new(pattern).map_err(|e| ConfigError::InvalidPattern {
                pattern: pattern.clone(),
                reason: e.to_string(),
            })?;
        }
        for rule in &self.auto_accept {
            if let Some(keyword) = &rule.keyword {
                Regex::new(keyword).map_err(|e| ConfigError::InvalidPattern {
                    pattern: keyword.clone(),
                    reason: e.to_string(),
                })?;
            }
        }
        if let Some(raw) = &self.manual.notify_target {
            raw.parse::<NotifyTarget>()?;
        }
        if self.interval == 0 {
            return Err(ConfigError::InvalidValue {
                key: "interval".into(),
                message: "throttle window must be at least one minute".into(),
            });
        }
        Ok(())
    }
}

/// Global comment denylist configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DenyPatternConfig {
    pub enable: bool,
    /// Regex patterns tested against the request comment, in order.
    pub patterns: Vec<String>,
}

/// Duplicate-request throttle configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UniqueConfig {
    pub enable: bool,
    /// Post-increment counts in `[2, deny_threshold]` are denied.
    pub deny_threshold: u64,
}

impl Default for UniqueConfig {
    fn default() -> Self {
        Self {
            enable: false,
            deny_threshold: 2,
        }
    }
}

/// Prior-membership (rejoin) check configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RejoinConfig {
    pub enable: bool,
    /// Groups whose membership is scanned for the applicant.
    pub groups: Vec<String>,
}

/// One per-group auto-accept rule.
///
/// A rule matches when every configured clause holds. A rule with neither
/// clause never matches.
#[derive(Debug, Clone, Deserialize)]
pub struct AutoAcceptRuleConfig {
    /// Target group this rule applies to.
    pub guild_id: String,
    /// Regex the request comment must match.
    #[serde(default)]
    pub keyword: Option<String>,
    /// Minimum applicant reputation.
    #[serde(default)]
    pub min_level: Option<i64>,
}

/// Fallback action when the manual-review timer fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeoutAction {
    Accept,
    Reject,
}

/// Manual escalation configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ManualConfig {
    pub enable: bool,
    /// Minutes before the fallback action fires. 0 disables the timeout.
    pub timeout_minutes: u64,
    pub timeout_action: TimeoutAction,
    /// Reviewer address, `"guild:<id>"` or `"private:<id>"`.
    pub notify_target: Option<String>,
}

impl Default for ManualConfig {
    fn default() -> Self {
        Self {
            enable: false,
            timeout_minutes: 0,
            timeout_action: TimeoutAction::Reject,
            notify_target: None,
        }
    }
}

/// Parsed reviewer address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotifyTarget {
    /// A group conversation.
    Guild(String),
    /// A direct conversation with one reviewer.
    Private(String),
}

impl FromStr for NotifyTarget {
    type Err = ConfigError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let malformed = || ConfigError::InvalidNotifyTarget { raw: raw.into() };
        let (kind, id) = raw.split_once(':').ok_or_else(malformed)?;
        if id.is_empty() {
            return Err(malformed());
        }
        match kind {
            "guild" => Ok(Self::Guild(id.to_string())),
            "private" => Ok(Self::Private(id.to_string())),
            _ => Err(malformed()),
        }
    }
}
