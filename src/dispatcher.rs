//! Request dispatcher — the engine's entry point.
//!
//! Two event hooks drive the whole core: [`Dispatcher::handle_request`] for
//! incoming join requests and [`Dispatcher::handle_message`] for the reviewer
//! command stream. Everything else hangs off these.

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::approval::{ApprovalManager, ApprovalRegistry};
use crate::config::{ModerationConfig, NotifyTarget};
use crate::counter::RateCounter;
use crate::filter::{Decision, FilterChain};
use crate::notify::{self, Notifier};
use crate::rules::RuleSet;
use crate::transport::{ChatTransport, IncomingMessage, JoinRequest};

/// Orchestrates filter evaluation and manual escalation.
pub struct Dispatcher {
    config: Arc<ModerationConfig>,
    filter: FilterChain,
    approvals: Arc<ApprovalManager>,
    transport: Arc<dyn ChatTransport>,
    notifier: Arc<Notifier>,
}

impl Dispatcher {
    /// Strict constructor: reject malformed patterns and notify targets as
    /// load errors instead of degrading them.
    pub fn try_new(
        config: ModerationConfig,
        transport: Arc<dyn ChatTransport>,
        counter: Arc<dyn RateCounter>,
    ) -> crate::error::Result<Self> {
        config.validate()?;
        Ok(Self::new(config, transport, counter))
    }

    /// Wire up the engine from configuration and the two collaborators.
    ///
    /// Patterns and the notify target are compiled/parsed here, once. A
    /// malformed notify target disables notification (with a logged warning)
    /// instead of failing; use [`Dispatcher::try_new`] to make it a load
    /// error.
    pub fn new(
        config: ModerationConfig,
        transport: Arc<dyn ChatTransport>,
        counter: Arc<dyn RateCounter>,
    ) -> Self {
        let config = Arc::new(config);
        let rules = Arc::new(RuleSet::compile(&config));

        let target = config.manual.notify_target.as_deref().and_then(|raw| {
            match raw.parse::<NotifyTarget>() {
                Ok(target) => Some(target),
                Err(e) => {
                    warn!(error = %e, "Notification disabled");
                    None
                }
            }
        });
        let notifier = Arc::new(Notifier::new(Arc::clone(&transport), target));

        let approvals = Arc::new(ApprovalManager::new(
            Arc::clone(&transport),
            Arc::clone(&notifier),
            Arc::new(ApprovalRegistry::new()),
            &config.manual,
        ));
        let filter = FilterChain::new(
            Arc::clone(&config),
            rules,
            counter,
            Arc::clone(&transport),
        );

        Self {
            config,
            filter,
            approvals,
            transport,
            notifier,
        }
    }

    /// Incoming-join-request hook.
    pub async fn handle_request(&self, request: JoinRequest) {
        info!(
            request_id = %request.request_id,
            applicant_id = %request.applicant_id,
            group_id = %request.group_id,
            "Processing join request"
        );
        match self.filter.evaluate(&request).await {
            Decision::Deny(reason) => {
                info!(
                    request_id = %request.request_id,
                    code = reason.code(),
                    "Join request auto-denied"
                );
                self.resolve(&request, false, reason.message()).await;
            }
            Decision::Accept => {
                info!(request_id = %request.request_id, "Join request auto-accepted");
                self.resolve(&request, true, "").await;
            }
            Decision::Undecided => {
                if self.config.manual.enable {
                    self.approvals.escalate(request).await;
                } else {
                    debug!(
                        request_id = %request.request_id,
                        "Undecided and manual review disabled; leaving to platform default"
                    );
                }
            }
        }
    }

    /// Incoming-message hook. Returns whether the message was consumed as a
    /// reviewer command.
    pub async fn handle_message(&self, message: &IncomingMessage) -> bool {
        self.approvals.handle_command(message).await
    }

    /// Number of approvals currently awaiting a reviewer.
    pub async fn pending(&self) -> usize {
        self.approvals.pending().await
    }

    /// Submit a filter-chain decision and send the best-effort confirmation.
    async fn resolve(&self, request: &JoinRequest, approve: bool, reason: &str) {
        if let Err(e) = self
            .transport
            .submit_decision(&request.request_id, approve, reason)
            .await
        {
            error!(
                request_id = %request.request_id,
                error = %e,
                "Failed to submit decision"
            );
            return;
        }
        self.notifier
            .send_best_effort(&notify::auto_notice(request, approve, reason))
            .await;
    }
}
