//! Public-read sharing through Web Access Control
//!
//! Sharing a conversation grants public Read on three things: the conversation
//! resource, its message container, and (through `acl:default` on that
//! container) every message in it. The owner keeps full control in every
//! policy this module writes.

use std::sync::Arc;

use crate::config::PolicyDiscoveryMode;
use crate::error::{PodError, Result};
use crate::storage::ids::ConversationId;
use crate::storage::traits::MessageStore;
use crate::storage::types::PolicyDocument;
use crate::transport::{CONTENT_TYPE_TURTLE, Method, PodRequest, parse_link_header};

use super::codec;
use super::containers;
use super::context::PodContext;
use super::message::PodMessageStore;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GrantOutcome {
    /// No policy existed; a fresh one was written
    Created,
    /// Public read was added to an existing policy
    Updated,
    AlreadyPublic,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RevokeOutcome {
    NotShared,
    /// Public grant removed, other authorizations kept
    Updated,
    /// Nothing was left, the policy resource was deleted
    Removed,
}

/// How many policy changes of a share/unshare went through
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AccessReport {
    pub applied: usize,
    pub failed: usize,
}

impl AccessReport {
    fn record<T>(&mut self, target: &str, result: Result<T>) {
        match result {
            Ok(_) => self.applied += 1,
            Err(e) => {
                tracing::warn!(target_url = %target, error = %e, "access change failed");
                self.failed += 1;
            }
        }
    }

    /// Fold in the conversation's own change, which decides the overall result
    fn conclude<T>(
        mut self,
        conversation_id: &ConversationId,
        conversation_change: Result<T>,
        action: &str,
    ) -> Result<Self> {
        let ok = conversation_change.is_ok();
        if ok {
            self.applied += 1;
        } else {
            self.failed += 1;
        }
        tracing::info!(
            conversation_id = %conversation_id,
            applied = self.applied,
            failed = self.failed,
            ok,
            "{}",
            action
        );
        conversation_change.map(|_| self)
    }
}

#[derive(Clone, Debug)]
pub struct AccessControlManager {
    ctx: Arc<PodContext>,
    messages: PodMessageStore,
}

impl AccessControlManager {
    pub fn new(ctx: Arc<PodContext>, messages: PodMessageStore) -> Self {
        Self { ctx, messages }
    }

    /// URL of the policy governing `resource`
    ///
    /// Prefers the server's `Link: rel="acl"` header and falls back to the
    /// `.acl` suffix when the header is absent or the HEAD is not a success.
    pub async fn discover_policy_path(&self, resource: &str) -> String {
        let fallback = format!("{}.acl", resource);
        if self.ctx.config().policy_discovery == PolicyDiscoveryMode::Suffix {
            return fallback;
        }

        let response = match self.ctx.send(PodRequest::head(resource)).await {
            Ok(response) if response.is_success() => response,
            Ok(response) => {
                tracing::debug!(resource = %resource, status = %response.status, "policy probe refused, using suffix");
                return fallback;
            }
            Err(e) => {
                tracing::debug!(resource = %resource, error = %e, "policy discovery failed, using suffix");
                return fallback;
            }
        };
        let links = parse_link_header(&response.header_values("link"));
        let advertised = links
            .into_iter()
            .find(|(_, rel)| rel == "acl")
            .and_then(|(target, _)| url::Url::parse(resource).ok()?.join(&target).ok());
        match advertised {
            Some(url) => url.to_string(),
            None => fallback,
        }
    }

    /// Current policy document; `None` when the resource has none of its own
    pub async fn read_policy(&self, policy_url: &str) -> Result<Option<PolicyDocument>> {
        let response = self
            .ctx
            .send(PodRequest::get(policy_url).header("Accept", CONTENT_TYPE_TURTLE))
            .await?;
        if response.is_not_found() {
            return Ok(None);
        }
        if !response.is_success() {
            return Err(response.error_for(&Method::GET, policy_url));
        }
        Ok(Some(PolicyDocument::from_turtle(&response.body, policy_url)))
    }

    async fn write_policy(&self, policy_url: &str, document: &PolicyDocument) -> Result<()> {
        let request = PodRequest::put(policy_url)
            .body(CONTENT_TYPE_TURTLE, document.to_turtle(policy_url));
        let response = self.ctx.send(request).await?;
        if !response.is_success() {
            return Err(response.error_for(&Method::PUT, policy_url));
        }
        Ok(())
    }

    /// Let anyone read `resource` (and, for a container, everything in it)
    pub async fn grant_public_read(
        &self,
        resource: &str,
        is_container: bool,
        owner_web_id: &str,
    ) -> Result<GrantOutcome> {
        let policy_url = self.discover_policy_path(resource).await;
        let existing = match self.read_policy(&policy_url).await {
            Ok(existing) => existing,
            Err(e) => {
                tracing::warn!(policy = %policy_url, error = %e, "existing policy unreadable, replacing it");
                None
            }
        };

        let (document, outcome) = match existing {
            None => (
                PolicyDocument::public_read(&policy_url, resource, owner_web_id, is_container),
                GrantOutcome::Created,
            ),
            Some(document) if document.has_public_read() => return Ok(GrantOutcome::AlreadyPublic),
            Some(mut document) => {
                if !document.has_owner_grant(owner_web_id) {
                    document.add_owner_grant(&policy_url, resource, owner_web_id, is_container);
                }
                document.add_public_grant(&policy_url, resource, is_container);
                (document, GrantOutcome::Updated)
            }
        };

        self.write_policy(&policy_url, &document).await?;
        tracing::debug!(resource = %resource, outcome = ?outcome, "granted public read");
        Ok(outcome)
    }

    /// Withdraw public access from `resource`, keeping every other grant
    pub async fn revoke_public_read(&self, resource: &str) -> Result<RevokeOutcome> {
        let policy_url = self.discover_policy_path(resource).await;
        let Some(mut document) = self.read_policy(&policy_url).await? else {
            return Ok(RevokeOutcome::NotShared);
        };
        if !document.remove_public() {
            return Ok(RevokeOutcome::NotShared);
        }

        let outcome = if document.is_empty() {
            codec::delete(&self.ctx, &policy_url).await?;
            RevokeOutcome::Removed
        } else {
            self.write_policy(&policy_url, &document).await?;
            RevokeOutcome::Updated
        };
        tracing::debug!(resource = %resource, outcome = ?outcome, "revoked public read");
        Ok(outcome)
    }

    async fn ensure_owned(&self, conversation_id: &ConversationId) -> Result<String> {
        let url = self.ctx.layout().conversation(conversation_id);
        match codec::read_json(&self.ctx, &url).await? {
            Some(stored) => {
                codec::check_owner(&stored, self.ctx.owner(), &url)
                    .map_err(PodError::conceal_ownership)?;
                Ok(url)
            }
            None => Err(PodError::NotFound(url)),
        }
    }

    /// Make a conversation and all of its messages publicly readable
    ///
    /// Both targets are always attempted. A failure on the conversation itself
    /// is returned once the container has been handled; a failure on the
    /// message container is only counted in the report.
    pub async fn share_conversation(&self, conversation_id: &ConversationId) -> Result<AccessReport> {
        let conversation_url = self.ensure_owned(conversation_id).await?;
        let owner = self.ctx.identity().web_id.clone();
        let conversation_grant = self.grant_public_read(&conversation_url, false, &owner).await;

        let mut report = AccessReport::default();
        let layout = self.ctx.layout();
        let container = layout.messages_container(conversation_id);
        let container_grant = async {
            containers::ensure_container(&self.ctx, &layout.messages_root()).await?;
            containers::ensure_container(&self.ctx, &container).await?;
            self.grant_public_read(&container, true, &owner).await
        }
        .await;
        report.record(&container, container_grant);

        report.conclude(conversation_id, conversation_grant, "shared conversation")
    }

    /// Undo `share_conversation`, including any per-message grants
    ///
    /// Every target is attempted even when an earlier one fails.
    pub async fn unshare_conversation(&self, conversation_id: &ConversationId) -> Result<AccessReport> {
        let conversation_url = self.ensure_owned(conversation_id).await?;
        let conversation_revoke = self.revoke_public_read(&conversation_url).await;

        let mut report = AccessReport::default();
        let layout = self.ctx.layout();
        let container = layout.messages_container(conversation_id);
        let revoked = self.revoke_public_read(&container).await;
        report.record(&container, revoked);

        match self.messages.list_by_conversation(conversation_id).await {
            Ok(messages) => {
                for message in messages {
                    let url = layout.message(conversation_id, &message.message_id);
                    let revoked = self.revoke_public_read(&url).await;
                    report.record(&url, revoked);
                }
            }
            Err(e) => report.record::<()>(&container, Err(e)),
        }

        report.conclude(conversation_id, conversation_revoke, "unshared conversation")
    }
}
