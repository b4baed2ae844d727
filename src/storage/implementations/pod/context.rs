//! Per-user state shared by every Pod store

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::config::PodConfig;
use crate::error::Result;
use crate::storage::ids::{ConversationId, MessageId, UserId};
use crate::transport::{PodFetch, PodRequest, PodResponse};

use super::listing::{self, ContainerListing};

/// Who is calling: the opaque user id stored in records, and the WebID used
/// for discovery and access-control grants
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PodIdentity {
    pub user_id: UserId,
    pub web_id: String,
}

impl PodIdentity {
    pub fn new(user_id: impl Into<UserId>, web_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            web_id: web_id.into(),
        }
    }
}

/// Fixed resource layout under the storage root
///
/// ```text
/// {root}conversations/{conversationId}.json
/// {root}messages/{conversationId}/{messageId}.json
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PodLayout {
    root: String,
}

impl PodLayout {
    pub fn new(root: impl Into<String>) -> Self {
        let mut root = root.into();
        if !root.ends_with('/') {
            root.push('/');
        }
        Self { root }
    }

    pub fn root(&self) -> &str {
        &self.root
    }

    pub fn conversations_container(&self) -> String {
        format!("{}conversations/", self.root)
    }

    pub fn messages_root(&self) -> String {
        format!("{}messages/", self.root)
    }

    pub fn conversation(&self, conversation_id: &ConversationId) -> String {
        format!(
            "{}{}.json",
            self.conversations_container(),
            conversation_id.as_path_segment()
        )
    }

    pub fn messages_container(&self, conversation_id: &ConversationId) -> String {
        format!("{}{}/", self.messages_root(), conversation_id.as_path_segment())
    }

    pub fn message(&self, conversation_id: &ConversationId, message_id: &MessageId) -> String {
        format!(
            "{}{}.json",
            self.messages_container(conversation_id),
            message_id.as_path_segment()
        )
    }
}

/// Transport, identity, layout and configuration for one user
pub struct PodContext {
    fetch: Arc<dyn PodFetch>,
    identity: PodIdentity,
    layout: PodLayout,
    config: PodConfig,
    degraded_listings: AtomicU64,
}

impl std::fmt::Debug for PodContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PodContext")
            .field("identity", &self.identity)
            .field("layout", &self.layout)
            .finish()
    }
}

impl PodContext {
    pub fn new(
        fetch: Arc<dyn PodFetch>,
        identity: PodIdentity,
        layout: PodLayout,
        config: PodConfig,
    ) -> Self {
        Self {
            fetch,
            identity,
            layout,
            config,
            degraded_listings: AtomicU64::new(0),
        }
    }

    pub fn identity(&self) -> &PodIdentity {
        &self.identity
    }

    pub fn owner(&self) -> &UserId {
        &self.identity.user_id
    }

    pub fn layout(&self) -> &PodLayout {
        &self.layout
    }

    pub fn config(&self) -> &PodConfig {
        &self.config
    }

    pub async fn send(&self, request: PodRequest) -> Result<PodResponse> {
        self.fetch.fetch(request).await
    }

    /// List a container; failures other than 404 are counted
    pub async fn list(&self, container: &str) -> ContainerListing {
        let listing = listing::list_container(self.fetch.as_ref(), container).await;
        if listing.is_degraded() {
            self.degraded_listings.fetch_add(1, Ordering::Relaxed);
        }
        listing
    }

    /// Number of listings that came back empty because the request failed
    pub fn degraded_listings(&self) -> u64 {
        self.degraded_listings.load(Ordering::Relaxed)
    }
}
