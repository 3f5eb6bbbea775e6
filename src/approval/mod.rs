//! Manual-approval state machine.
//!
//! Per-request lifecycle: `Pending → {Approved, Rejected, TimedOut}`. An
//! escalated request is registered under a sequence number, announced to the
//! reviewer target, and then resolved by exactly one of: a single command, a
//! bulk command, the timeout fallback, or supersession by a newer request for
//! the same (applicant, group) pair.

pub mod command;
pub mod registry;

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::config::{ManualConfig, TimeoutAction};
use crate::error::ResolutionError;
use crate::notify::{self, Notifier};
use crate::transport::{ChatTransport, IncomingMessage, JoinRequest};

pub use command::Command;
pub use registry::{ApprovalRegistry, PendingApproval};

/// Drives escalated requests through notification, command handling, and
/// timeout fallback.
pub struct ApprovalManager {
    transport: Arc<dyn ChatTransport>,
    notifier: Arc<Notifier>,
    registry: Arc<ApprovalRegistry>,
    /// `None` when the timeout is disabled.
    timeout: Option<Duration>,
    timeout_action: TimeoutAction,
}

impl ApprovalManager {
    pub fn new(
        transport: Arc<dyn ChatTransport>,
        notifier: Arc<Notifier>,
        registry: Arc<ApprovalRegistry>,
        manual: &ManualConfig,
    ) -> Self {
        let timeout =
            (manual.timeout_minutes > 0).then(|| Duration::from_secs(manual.timeout_minutes * 60));
        Self {
            transport,
            notifier,
            registry,
            timeout,
            timeout_action: manual.timeout_action,
        }
    }

    /// Number of approvals currently awaiting a decision.
    pub async fn pending(&self) -> usize {
        self.registry.len().await
    }

    /// Escalate a request for manual review.
    ///
    /// Supersedes any pending approval for the same (applicant, group) pair,
    /// assigns a sequence number, arms the timeout, and announces the request
    /// to the reviewer target. Returns the assigned sequence number.
    pub async fn escalate(self: &Arc<Self>, request: JoinRequest) -> u32 {
        let announced = request.clone();
        let request_id = request.request_id.clone();
        let seq = self
            .registry
            .register(request, |seq| {
                self.timeout.map(|after| {
                    let manager = Arc::clone(self);
                    tokio::spawn(async move {
                        tokio::time::sleep(after).await;
                        manager.resolve_timeout(seq, &request_id).await;
                    })
                })
            })
            .await;

        info!(
            seq,
            applicant_id = %announced.applicant_id,
            group_id = %announced.group_id,
            "Escalated join request for manual review"
        );
        self.notifier
            .send_best_effort(&notify::pending_notice(seq, &announced))
            .await;
        seq
    }

    /// Route an inbound message into the command listener.
    ///
    /// Returns whether the message was consumed as a command. Messages not
    /// addressed to the bound target are never commands.
    pub async fn handle_command(&self, message: &IncomingMessage) -> bool {
        if !self.notifier.accepts(message) {
            return false;
        }
        let Some(cmd) = command::parse(&message.text) else {
            return false;
        };
        debug!(sender_id = %message.sender_id, ?cmd, "Reviewer command received");
        match cmd {
            Command::Single {
                approve,
                seq,
                reason,
            } => self.resolve_single(seq, approve, &reason).await,
            Command::Bulk { approve, reason } => {
                self.resolve_all(approve, &reason).await;
            }
        }
        true
    }

    /// Resolve one pending approval by sequence number.
    async fn resolve_single(&self, seq: u32, approve: bool, reason: &str) {
        // Removing the entry before any await on the transport is what makes
        // double resolution impossible.
        let Some(entry) = self.registry.take(seq).await else {
            let e = ResolutionError::NotFound { seq };
            warn!(error = %e, "Command named an unknown pending approval");
            self.notifier
                .send_best_effort(&notify::not_found_notice(seq))
                .await;
            return;
        };

        match self.submit(&entry.request, approve, reason).await {
            Ok(()) => {
                info!(
                    seq,
                    approve,
                    request_id = %entry.request.request_id,
                    "Pending approval resolved by command"
                );
                self.notifier
                    .send_best_effort(&notify::resolution_notice(
                        seq,
                        &entry.request,
                        approve,
                        reason,
                    ))
                    .await;
            }
            Err(e) => {
                error!(seq, error = %e, "Resolution failed");
                self.notifier
                    .send_best_effort(&notify::resolution_failed_notice(seq))
                    .await;
            }
        }
    }

    /// Resolve every currently pending approval with one decision.
    ///
    /// Individual failures are logged and counted; the batch never aborts.
    /// Returns the number successfully resolved.
    pub async fn resolve_all(&self, approve: bool, reason: &str) -> usize {
        let pending = self.registry.drain().await;
        let total = pending.len();
        let mut resolved = 0;
        for entry in pending {
            match self.submit(&entry.request, approve, reason).await {
                Ok(()) => resolved += 1,
                Err(e) => {
                    error!(
                        seq = entry.seq,
                        request_id = %entry.request.request_id,
                        error = %e,
                        "Bulk resolution failed for one approval"
                    );
                }
            }
        }
        info!(approve, resolved, total, "Bulk resolution complete");
        self.notifier
            .send_best_effort(&notify::bulk_notice(approve, resolved, total))
            .await;
        resolved
    }

    /// Timeout fallback. A stale timer (its entry already resolved or
    /// superseded) finds nothing to take and is a no-op.
    async fn resolve_timeout(&self, seq: u32, request_id: &str) {
        let Some(entry) = self.registry.take_if(seq, request_id).await else {
            return;
        };
        let approve = self.timeout_action == TimeoutAction::Accept;
        info!(seq, approve, request_id, "Pending approval timed out");
        match self.submit(&entry.request, approve, "").await {
            Ok(()) => {
                self.notifier
                    .send_best_effort(&notify::timeout_notice(seq, &entry.request, approve))
                    .await;
            }
            Err(e) => {
                error!(seq, error = %e, "Timeout resolution failed");
            }
        }
    }

    async fn submit(
        &self,
        request: &JoinRequest,
        approve: bool,
        reason: &str,
    ) -> Result<(), ResolutionError> {
        self.transport
            .submit_decision(&request.request_id, approve, reason)
            .await
            .map_err(|e| ResolutionError::SubmitFailed {
                request_id: request.request_id.clone(),
                reason: e.to_string(),
            })
    }
}
