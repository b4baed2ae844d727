//! Reading a shared conversation without credentials
//!
//! Everything goes through an unauthenticated transport. The read is
//! all-or-nothing: if the conversation, the listing or any message cannot be
//! read, the share is treated as unavailable.

use std::sync::Arc;

use crate::storage::ids::{ConversationId, MessageId};
use crate::storage::types::{ConversationRecord, MessageRecord};
use crate::transport::{CONTENT_TYPE_JSON, PodFetch, PodRequest};

use super::context::PodLayout;
use super::listing::{self, ListingStatus};

/// A publicly readable conversation and its messages, oldest first
#[derive(Clone, Debug, PartialEq)]
pub struct SharedConversation {
    pub conversation: ConversationRecord,
    pub messages: Vec<MessageRecord>,
}

/// Conversation URL and message container URL to hand to readers
pub fn shared_locations(layout: &PodLayout, conversation_id: &ConversationId) -> (String, String) {
    (
        layout.conversation(conversation_id),
        layout.messages_container(conversation_id),
    )
}

pub struct PublicShareReader {
    fetch: Arc<dyn PodFetch>,
}

impl PublicShareReader {
    pub fn new(fetch: Arc<dyn PodFetch>) -> Self {
        Self { fetch }
    }

    async fn read<T: serde::de::DeserializeOwned>(&self, url: &str) -> Option<T> {
        let request = PodRequest::get(url).header("Accept", CONTENT_TYPE_JSON);
        let response = match self.fetch.fetch(request).await {
            Ok(response) => response,
            Err(e) => {
                tracing::debug!(url = %url, error = %e, "shared resource unreachable");
                return None;
            }
        };
        if !response.is_success() {
            tracing::debug!(url = %url, status = %response.status, "shared resource not readable");
            return None;
        }
        match serde_json::from_str(&response.body) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::debug!(url = %url, error = %e, "shared resource malformed");
                None
            }
        }
    }

    /// Read a shared conversation, up to and including `target_message_id`
    ///
    /// When the target is not among the messages the whole thread is returned.
    pub async fn read_shared_conversation(
        &self,
        conversation_url: &str,
        messages_container_url: &str,
        target_message_id: Option<&MessageId>,
    ) -> Option<SharedConversation> {
        let mut conversation: ConversationRecord = self.read(conversation_url).await?;

        let listing = listing::list_container(self.fetch.as_ref(), messages_container_url).await;
        if listing.status != ListingStatus::Listed {
            tracing::debug!(container = %messages_container_url, status = ?listing.status, "shared messages not listable");
            return None;
        }

        let mut messages = Vec::new();
        for member in listing.json_members() {
            let message: MessageRecord = self.read(member).await?;
            if message.conversation_id == conversation.conversation_id {
                messages.push(message);
            }
        }
        messages.sort_by_key(|m| m.created_at);

        if let Some(target) = target_message_id {
            match messages.iter().position(|m| m.message_id == *target) {
                Some(idx) => messages.truncate(idx + 1),
                None => {
                    tracing::debug!(message_id = %target, "target message not in share, returning full thread");
                }
            }
        }

        conversation.messages = messages.iter().map(MessageRecord::reference).collect();
        Some(SharedConversation {
            conversation,
            messages,
        })
    }
}
