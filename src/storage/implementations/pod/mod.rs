//! Solid Pod storage
//!
//! Conversations and messages live as JSON resources in the user's Pod:
//!
//! ```text
//! {storage}/{root_container}/
//!   conversations/{conversationId}.json
//!   messages/{conversationId}/{messageId}.json
//! ```
//!
//! `PodStorage` is the composition root: it resolves the storage location
//! once and hands out the stores, all sharing one `PodContext`.

mod acl;
mod codec;
mod containers;
mod context;
mod conversation;
mod cursor;
mod listing;
mod message;
mod resolver;
mod share;

pub use acl::{AccessControlManager, AccessReport, GrantOutcome, RevokeOutcome};
pub use context::{PodContext, PodIdentity, PodLayout};
pub use conversation::PodConversationStore;
pub use cursor::{SortKey, SortValue};
pub use listing::{ContainerListing, ListingStatus, list_container};
pub use message::PodMessageStore;
pub use resolver::{advertised_storage, derive_storage_base, resolve_storage_root};
pub use share::{PublicShareReader, SharedConversation, shared_locations};

use std::sync::Arc;

use crate::config::PodConfig;
use crate::error::Result;
use crate::storage::ids::ConversationId;
use crate::transport::PodFetch;

/// Stores for one user's Pod
#[derive(Clone, Debug)]
pub struct PodStorage {
    ctx: Arc<PodContext>,
    conversations: PodConversationStore,
    messages: PodMessageStore,
    access: AccessControlManager,
}

impl PodStorage {
    /// Resolve the storage root for `identity` and build the stores
    pub async fn connect(
        config: PodConfig,
        fetch: Arc<dyn PodFetch>,
        identity: PodIdentity,
    ) -> Result<Self> {
        config.validate()?;
        let root = resolve_storage_root(fetch.as_ref(), &identity.web_id, &config).await?;
        Ok(Self::with_root(config, fetch, identity, root))
    }

    /// Build the stores over an already known root container
    pub fn with_root(
        config: PodConfig,
        fetch: Arc<dyn PodFetch>,
        identity: PodIdentity,
        root: impl Into<String>,
    ) -> Self {
        let ctx = Arc::new(PodContext::new(fetch, identity, PodLayout::new(root), config));
        let messages = PodMessageStore::new(ctx.clone());
        let conversations = PodConversationStore::new(ctx.clone(), messages.clone());
        let access = AccessControlManager::new(ctx.clone(), messages.clone());
        Self {
            ctx,
            conversations,
            messages,
            access,
        }
    }

    pub fn conversations(&self) -> &PodConversationStore {
        &self.conversations
    }

    pub fn messages(&self) -> &PodMessageStore {
        &self.messages
    }

    pub fn access(&self) -> &AccessControlManager {
        &self.access
    }

    pub fn layout(&self) -> &PodLayout {
        self.ctx.layout()
    }

    pub fn identity(&self) -> &PodIdentity {
        self.ctx.identity()
    }

    /// Where a reader without credentials finds a conversation
    pub fn shared_locations(&self, conversation_id: &ConversationId) -> (String, String) {
        shared_locations(self.ctx.layout(), conversation_id)
    }

    /// Listings that failed and were treated as empty since construction
    pub fn degraded_listings(&self) -> u64 {
        self.ctx.degraded_listings()
    }
}
