//! Compiled filter rules.
//!
//! All user-configured pattern strings are validated and compiled here, once,
//! at configuration load. Invalid patterns are skipped with a logged warning;
//! the offending rule degrades to a no-op instead of failing the pipeline or
//! erroring on every evaluation.

use std::collections::HashMap;

use regex::Regex;
use tracing::warn;

use crate::config::ModerationConfig;

/// A compiled per-group auto-accept rule.
///
/// `keyword` and `min_level` are AND-ed; a rule where neither survived
/// compilation is dropped entirely (it could never match).
#[derive(Debug, Clone)]
pub struct AutoAcceptRule {
    /// Regex the request comment must match.
    pub keyword: Option<Regex>,
    /// Minimum applicant reputation.
    pub min_level: Option<i64>,
}

/// The full compiled rule set, read-only during evaluation.
#[derive(Debug, Default)]
pub struct RuleSet {
    deny_patterns: Vec<Regex>,
    auto_accept: HashMap<String, AutoAcceptRule>,
}

impl RuleSet {
    /// Compile the configured patterns.
    pub fn compile(config: &ModerationConfig) -> Self {
        let mut deny_patterns = Vec::new();
        if config.deny_patterns.enable {
            for pattern in &config.deny_patterns.patterns {
                match Regex::new(pattern) {
                    Ok(regex) => deny_patterns.push(regex),
                    Err(e) => {
                        warn!(pattern = %pattern, error = %e, "Skipping invalid deny pattern");
                    }
                }
            }
        }

        let mut auto_accept = HashMap::new();
        for rule in &config.auto_accept {
            let keyword = match &rule.keyword {
                Some(raw) => match Regex::new(raw) {
                    Ok(regex) => Some(regex),
                    Err(e) => {
                        // An unusable keyword means the rule can never match.
                        warn!(
                            guild_id = %rule.guild_id,
                            pattern = %raw,
                            error = %e,
                            "Dropping auto-accept rule with invalid keyword"
                        );
                        continue;
                    }
                },
                None => None,
            };
            if keyword.is_none() && rule.min_level.is_none() {
                warn!(
                    guild_id = %rule.guild_id,
                    "Dropping auto-accept rule with no keyword and no min_level"
                );
                continue;
            }
            auto_accept.insert(
                rule.guild_id.clone(),
                AutoAcceptRule {
                    keyword,
                    min_level: rule.min_level,
                },
            );
        }

        Self {
            deny_patterns,
            auto_accept,
        }
    }

    /// Compiled global deny patterns, in configuration order.
    pub fn deny_patterns(&self) -> &[Regex] {
        &self.deny_patterns
    }

    /// Look up the auto-accept rule for a target group.
    pub fn auto_accept(&self, guild_id: &str) -> Option<&AutoAcceptRule> {
        self.auto_accept.get(guild_id)
    }
}
