//! Reviewer notification channel.
//!
//! Wraps the transport with a parsed notify target and builds the notice
//! texts. A missing or malformed target disables notification silently:
//! sends become no-ops and the moderation pipeline keeps running.

use std::sync::Arc;

use tracing::warn;

use crate::config::NotifyTarget;
use crate::error::TransportError;
use crate::transport::{ChatTransport, IncomingMessage, JoinRequest};

/// Target-addressed reviewer notifications.
pub struct Notifier {
    transport: Arc<dyn ChatTransport>,
    target: Option<NotifyTarget>,
}

impl Notifier {
    pub fn new(transport: Arc<dyn ChatTransport>, target: Option<NotifyTarget>) -> Self {
        Self { transport, target }
    }

    pub fn target(&self) -> Option<&NotifyTarget> {
        self.target.as_ref()
    }

    /// Whether an inbound message is addressed to the bound target.
    ///
    /// Guild targets accept messages originating in that group; private
    /// targets accept direct messages from that reviewer. With no target
    /// bound, nothing is addressed to us.
    pub fn accepts(&self, message: &IncomingMessage) -> bool {
        match &self.target {
            Some(NotifyTarget::Guild(id)) => message.origin_group_id.as_deref() == Some(id),
            Some(NotifyTarget::Private(id)) => {
                message.origin_group_id.is_none() && message.sender_id == *id
            }
            None => false,
        }
    }

    /// Send to the bound target. No-op when no target is bound.
    pub async fn send(&self, text: &str) -> Result<(), TransportError> {
        match &self.target {
            Some(NotifyTarget::Guild(id)) => self.transport.send_message(id, text).await,
            Some(NotifyTarget::Private(id)) => self.transport.send_direct_message(id, text).await,
            None => Ok(()),
        }
    }

    /// Send, logging delivery failures instead of propagating them.
    ///
    /// Notification is always best-effort: a failed send never re-triggers or
    /// blocks the resolution it reports on.
    pub async fn send_best_effort(&self, text: &str) {
        if let Err(e) = self.send(text).await {
            warn!(error = %e, "Failed to deliver reviewer notification");
        }
    }
}

// ── Notice texts ────────────────────────────────────────────────────

/// Escalation notice: the pending request plus a command usage hint.
pub fn pending_notice(seq: u32, request: &JoinRequest) -> String {
    format!(
        "入群申请 #{seq}\n申请人：{applicant}\n目标群：{group}\n验证消息:{comment}\n\
         回复 y{seq} 通过，n{seq} 理由 拒绝；ya / na 处理全部",
        applicant = request.applicant_id,
        group = request.group_id,
        comment = request.comment,
    )
}

/// Confirmation after a manual resolution.
pub fn resolution_notice(seq: u32, request: &JoinRequest, approved: bool, reason: &str) -> String {
    let verdict = if approved { "已通过" } else { "已拒绝" };
    if reason.is_empty() {
        format!("申请 #{seq}（{}）{verdict}", request.applicant_id)
    } else {
        format!(
            "申请 #{seq}（{}）{verdict}：{reason}",
            request.applicant_id
        )
    }
}

/// Confirmation after an auto-resolution by the filter chain.
pub fn auto_notice(request: &JoinRequest, approved: bool, reason: &str) -> String {
    let verdict = if approved {
        "已自动通过"
    } else {
        "已自动拒绝"
    };
    if reason.is_empty() {
        format!(
            "{} 申请加入 {} {verdict}",
            request.applicant_id, request.group_id
        )
    } else {
        format!(
            "{} 申请加入 {} {verdict}：{reason}",
            request.applicant_id, request.group_id
        )
    }
}

/// Notice when the manual-review timer fired.
pub fn timeout_notice(seq: u32, request: &JoinRequest, approved: bool) -> String {
    let verdict = if approved { "已超时通过" } else { "已超时拒绝" };
    format!("申请 #{seq}（{}）{verdict}", request.applicant_id)
}

/// Summary after a bulk resolution.
pub fn bulk_notice(approved: bool, resolved: usize, total: usize) -> String {
    let verdict = if approved { "通过" } else { "拒绝" };
    format!("已批量{verdict} {resolved}/{total} 条申请")
}

/// Reply when a command names an unknown sequence number.
pub fn not_found_notice(seq: u32) -> String {
    format!("没有编号为 #{seq} 的待审申请")
}

/// Reply when the external resolve call failed for a single resolution.
pub fn resolution_failed_notice(seq: u32) -> String {
    format!("申请 #{seq} 处理失败，请稍后重试")
}
