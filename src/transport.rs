//! Transport collaborator surface — platform events in, platform actions out.
//!
//! The chat platform adapter implements [`ChatTransport`]; the engine never
//! talks to the wire itself. Adapters convert their native join-request and
//! message events into [`JoinRequest`] and [`IncomingMessage`] and feed them
//! to the dispatcher.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};

use crate::error::TransportError;

/// An applicant's petition to join a managed group.
///
/// Immutable once received; dropped after resolution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JoinRequest {
    /// Platform-assigned opaque token identifying the request.
    pub request_id: String,
    /// The applicant.
    pub applicant_id: String,
    /// Target group.
    pub group_id: String,
    /// Free-text verification comment.
    pub comment: String,
    /// When the platform received the request.
    pub submitted_at: DateTime<Utc>,
}

/// An inbound text message, the reviewer command surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncomingMessage {
    /// Who sent it.
    pub sender_id: String,
    /// Originating group, or `None` for a direct conversation.
    pub origin_group_id: Option<String>,
    /// Message text.
    pub text: String,
}

/// Lazy, finite sequence of member ids.
pub type MemberStream<'a> = BoxStream<'a, String>;

/// Chat platform adapter. Pure I/O; moderation logic stays out of here.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Resolve a join request on the platform.
    async fn submit_decision(
        &self,
        request_id: &str,
        approve: bool,
        reason: &str,
    ) -> Result<(), TransportError>;

    /// Current membership of a group, as a lazy stream.
    async fn member_ids(&self, group_id: &str) -> Result<MemberStream<'_>, TransportError>;

    /// Applicant reputation on the platform.
    async fn reputation(&self, user_id: &str) -> Result<i64, TransportError>;

    /// Send a text message to a group.
    async fn send_message(&self, group_id: &str, text: &str) -> Result<(), TransportError>;

    /// Send a direct message to a user.
    async fn send_direct_message(&self, user_id: &str, text: &str) -> Result<(), TransportError>;
}
