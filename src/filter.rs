//! Deny/accept filter chain.
//!
//! Runs each join request through the ordered, short-circuiting checks:
//! global deny patterns → duplicate-request throttle → prior-membership scan
//! → auto-accept rule lookup. Anything the chain cannot decide falls through
//! as [`Decision::Undecided`] for manual escalation.

use std::sync::Arc;

use futures::StreamExt;
use tracing::{debug, warn};

use crate::config::ModerationConfig;
use crate::counter::RateCounter;
use crate::rules::RuleSet;
use crate::transport::{ChatTransport, JoinRequest};

/// Outcome of filter evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Auto-deny with the given reason.
    Deny(DenyReason),
    /// Auto-accept via a matching rule.
    Accept,
    /// No filter decided; escalate or leave to the platform default.
    Undecided,
}

/// Why a request was auto-denied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    GlobalPattern,
    DuplicateRequest,
    Rejoin,
}

impl DenyReason {
    /// Stable reason code for logs and metrics.
    pub fn code(&self) -> &'static str {
        match self {
            Self::GlobalPattern => "global-pattern",
            Self::DuplicateRequest => "duplicate-request",
            Self::Rejoin => "rejoin",
        }
    }

    /// Denial text sent back to the applicant. The platform caps this at
    /// 30 characters.
    pub fn message(&self) -> &'static str {
        match self {
            Self::GlobalPattern => "验证消息包含违规内容",
            Self::DuplicateRequest => "请勿重复发送入群申请",
            Self::Rejoin => "请勿频繁退群后再次申请",
        }
    }
}

/// Ordered, short-circuiting filter evaluation.
pub struct FilterChain {
    config: Arc<ModerationConfig>,
    rules: Arc<RuleSet>,
    counter: Arc<dyn RateCounter>,
    transport: Arc<dyn ChatTransport>,
}

impl FilterChain {
    pub fn new(
        config: Arc<ModerationConfig>,
        rules: Arc<RuleSet>,
        counter: Arc<dyn RateCounter>,
        transport: Arc<dyn ChatTransport>,
    ) -> Self {
        Self {
            config,
            rules,
            counter,
            transport,
        }
    }

    /// Evaluate a join request against the full chain.
    pub async fn evaluate(&self, request: &JoinRequest) -> Decision {
        // 1. Global deny patterns against the comment, in order.
        for regex in self.rules.deny_patterns() {
            if regex.is_match(&request.comment) {
                debug!(
                    request_id = %request.request_id,
                    pattern = %regex.as_str(),
                    "Comment matched global deny pattern"
                );
                return Decision::Deny(DenyReason::GlobalPattern);
            }
        }

        // 2. Duplicate-request throttle. The counter is incremented on every
        // evaluation; the rejoin check below reads the same count.
        let key = format!("{}:unique", request.applicant_id);
        let count = self
            .counter
            .increment(&key, self.config.throttle_window())
            .await;
        let threshold = self.config.unique.deny_threshold;
        if self.config.unique.enable && count >= 2 && count <= threshold {
            debug!(
                request_id = %request.request_id,
                count,
                threshold,
                "Duplicate request within throttle window"
            );
            return Decision::Deny(DenyReason::DuplicateRequest);
        }

        // 3. Prior-membership scan, first match across groups wins.
        if self.config.rejoin.enable
            && count <= threshold
            && self.is_prior_member(&request.applicant_id).await
        {
            return Decision::Deny(DenyReason::Rejoin);
        }

        // 4. Auto-accept rule for the target group.
        let Some(rule) = self.rules.auto_accept(&request.group_id) else {
            return Decision::Undecided;
        };
        if let Some(keyword) = &rule.keyword
            && !keyword.is_match(&request.comment)
        {
            return Decision::Undecided;
        }
        if let Some(min_level) = rule.min_level {
            let level = match self.transport.reputation(&request.applicant_id).await {
                Ok(level) => level,
                Err(e) => {
                    warn!(
                        applicant_id = %request.applicant_id,
                        error = %e,
                        "Reputation fetch failed; treating rule as non-match"
                    );
                    return Decision::Undecided;
                }
            };
            if level < min_level {
                return Decision::Undecided;
            }
        }
        debug!(
            request_id = %request.request_id,
            guild_id = %request.group_id,
            "Auto-accept rule matched"
        );
        Decision::Accept
    }

    /// Scan the configured groups for the applicant. Transport failures are
    /// logged and treated as non-member.
    async fn is_prior_member(&self, applicant_id: &str) -> bool {
        for group_id in &self.config.rejoin.groups {
            match self.transport.member_ids(group_id).await {
                Ok(mut members) => {
                    while let Some(member) = members.next().await {
                        if member == applicant_id {
                            debug!(applicant_id, group_id = %group_id, "Applicant is a prior member");
                            return true;
                        }
                    }
                }
                Err(e) => {
                    warn!(
                        group_id = %group_id,
                        error = %e,
                        "Membership scan failed; treating as non-member"
                    );
                }
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    use async_trait::async_trait;
    use chrono::Utc;

    use crate::config::AutoAcceptRuleConfig;
    use crate::counter::MemoryCounter;
    use crate::error::TransportError;
    use crate::transport::MemberStream;

    #[derive(Default)]
    struct StubTransport {
        members: HashMap<String, Vec<String>>,
        levels: HashMap<String, i64>,
        fail_lookups: bool,
    }

    #[async_trait]
    impl ChatTransport for StubTransport {
        async fn submit_decision(
            &self,
            _request_id: &str,
            _approve: bool,
            _reason: &str,
        ) -> Result<(), TransportError> {
            Ok(())
        }

        async fn member_ids(&self, group_id: &str) -> Result<MemberStream<'_>, TransportError> {
            if self.fail_lookups {
                return Err(TransportError::LookupFailed {
                    subject: format!("group {group_id}"),
                    reason: "stub failure".into(),
                });
            }
            let members = self.members.get(group_id).cloned().unwrap_or_default();
            Ok(Box::pin(tokio_stream::iter(members)))
        }

        async fn reputation(&self, user_id: &str) -> Result<i64, TransportError> {
            if self.fail_lookups {
                return Err(TransportError::LookupFailed {
                    subject: format!("user {user_id}"),
                    reason: "stub failure".into(),
                });
            }
            self.levels
                .get(user_id)
                .copied()
                .ok_or_else(|| TransportError::LookupFailed {
                    subject: format!("user {user_id}"),
                    reason: "unknown user".into(),
                })
        }

        async fn send_message(&self, _group_id: &str, _text: &str) -> Result<(), TransportError> {
            Ok(())
        }

        async fn send_direct_message(
            &self,
            _user_id: &str,
            _text: &str,
        ) -> Result<(), TransportError> {
            Ok(())
        }
    }

    fn request(applicant: &str, group: &str, comment: &str) -> JoinRequest {
        JoinRequest {
            request_id: format!("req-{applicant}-{group}"),
            applicant_id: applicant.into(),
            group_id: group.into(),
            comment: comment.into(),
            submitted_at: Utc::now(),
        }
    }

    fn chain(config: ModerationConfig, transport: StubTransport) -> FilterChain {
        let rules = Arc::new(RuleSet::compile(&config));
        FilterChain::new(
            Arc::new(config),
            rules,
            Arc::new(MemoryCounter::new()),
            Arc::new(transport),
        )
    }

    #[tokio::test]
    async fn deny_pattern_wins_over_auto_accept() {
        let mut config = ModerationConfig::default();
        config.deny_patterns.enable = true;
        config.deny_patterns.patterns = vec!["通过一下".into()];
        config.auto_accept.push(AutoAcceptRuleConfig {
            guild_id: "G".into(),
            keyword: Some("通过一下".into()),
            min_level: None,
        });
        let chain = chain(config, StubTransport::default());

        let decision = chain.evaluate(&request("a", "G", "通过一下")).await;
        assert_eq!(decision, Decision::Deny(DenyReason::GlobalPattern));
    }

    #[tokio::test]
    async fn first_request_never_denied_as_duplicate() {
        let mut config = ModerationConfig::default();
        config.unique.enable = true;
        config.unique.deny_threshold = 2;
        let chain = chain(config, StubTransport::default());

        let req = request("a", "G", "hello");
        assert_eq!(chain.evaluate(&req).await, Decision::Undecided);
        assert_eq!(
            chain.evaluate(&req).await,
            Decision::Deny(DenyReason::DuplicateRequest)
        );
        // Count 3 is past the threshold, so the duplicate rule no longer fires.
        assert_eq!(chain.evaluate(&req).await, Decision::Undecided);
    }

    #[tokio::test]
    async fn duplicate_rule_disabled_never_denies() {
        let mut config = ModerationConfig::default();
        config.unique.enable = false;
        let chain = chain(config, StubTransport::default());

        let req = request("a", "G", "hello");
        for _ in 0..3 {
            assert_eq!(chain.evaluate(&req).await, Decision::Undecided);
        }
    }

    #[tokio::test]
    async fn prior_member_denied_as_rejoin() {
        let mut config = ModerationConfig::default();
        config.rejoin.enable = true;
        config.rejoin.groups = vec!["G1".into(), "G2".into()];
        let mut transport = StubTransport::default();
        transport
            .members
            .insert("G2".into(), vec!["x".into(), "a".into()]);
        let chain = chain(config, transport);

        let decision = chain.evaluate(&request("a", "G", "hello")).await;
        assert_eq!(decision, Decision::Deny(DenyReason::Rejoin));
    }

    #[tokio::test]
    async fn rejoin_skipped_past_threshold() {
        let mut config = ModerationConfig::default();
        config.rejoin.enable = true;
        config.rejoin.groups = vec!["G1".into()];
        config.unique.deny_threshold = 2;
        let mut transport = StubTransport::default();
        transport.members.insert("G1".into(), vec!["a".into()]);
        let chain = chain(config, transport);

        let req = request("a", "G", "hello");
        assert_eq!(
            chain.evaluate(&req).await,
            Decision::Deny(DenyReason::Rejoin)
        );
        assert_eq!(
            chain.evaluate(&req).await,
            Decision::Deny(DenyReason::Rejoin)
        );
        // Counter is now past the threshold; the rejoin check stands down.
        assert_eq!(chain.evaluate(&req).await, Decision::Undecided);
    }

    #[tokio::test]
    async fn membership_scan_failure_is_non_member() {
        let mut config = ModerationConfig::default();
        config.rejoin.enable = true;
        config.rejoin.groups = vec!["G1".into()];
        let transport = StubTransport {
            fail_lookups: true,
            ..Default::default()
        };
        let chain = chain(config, transport);

        assert_eq!(
            chain.evaluate(&request("a", "G", "hi")).await,
            Decision::Undecided
        );
    }

    #[tokio::test]
    async fn auto_accept_on_keyword() {
        let mut config = ModerationConfig::default();
        config.auto_accept.push(AutoAcceptRuleConfig {
            guild_id: "G".into(),
            keyword: Some("^学习$".into()),
            min_level: None,
        });
        let chain = chain(config, StubTransport::default());

        assert_eq!(
            chain.evaluate(&request("a", "G", "学习")).await,
            Decision::Accept
        );
        assert_eq!(
            chain.evaluate(&request("b", "G", "玩游戏")).await,
            Decision::Undecided
        );
    }

    #[tokio::test]
    async fn auto_accept_requires_both_clauses() {
        let mut config = ModerationConfig::default();
        config.auto_accept.push(AutoAcceptRuleConfig {
            guild_id: "G".into(),
            keyword: Some("学习".into()),
            min_level: Some(10),
        });
        let mut transport = StubTransport::default();
        transport.levels.insert("high".into(), 20);
        transport.levels.insert("low".into(), 5);
        let chain = chain(config, transport);

        assert_eq!(
            chain.evaluate(&request("high", "G", "来学习")).await,
            Decision::Accept
        );
        assert_eq!(
            chain.evaluate(&request("low", "G", "来学习")).await,
            Decision::Undecided
        );
        assert_eq!(
            chain.evaluate(&request("high", "G", "别的")).await,
            Decision::Undecided
        );
    }

    #[tokio::test]
    async fn reputation_failure_is_non_match() {
        let mut config = ModerationConfig::default();
        config.auto_accept.push(AutoAcceptRuleConfig {
            guild_id: "G".into(),
            keyword: None,
            min_level: Some(0),
        });
        let transport = StubTransport {
            fail_lookups: true,
            ..Default::default()
        };
        let chain = chain(config, transport);

        assert_eq!(
            chain.evaluate(&request("a", "G", "hi")).await,
            Decision::Undecided
        );
    }

    #[tokio::test]
    async fn no_rule_for_group_is_undecided() {
        let chain = chain(ModerationConfig::default(), StubTransport::default());
        assert_eq!(
            chain.evaluate(&request("a", "G", "hi")).await,
            Decision::Undecided
        );
    }

    #[test]
    fn deny_reason_codes() {
        assert_eq!(DenyReason::GlobalPattern.code(), "global-pattern");
        assert_eq!(DenyReason::DuplicateRequest.code(), "duplicate-request");
        assert_eq!(DenyReason::Rejoin.code(), "rejoin");
    }
}
