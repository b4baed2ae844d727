//! MessageStore trait for messages within a conversation

use async_trait::async_trait;

use crate::error::Result;
use crate::storage::ids::{ConversationId, MessageId};
use crate::storage::types::{MessageFields, MessageRecord};

/// Which messages `delete_range` removes
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DeleteScope {
    /// Every message created strictly after the given one
    After(MessageId),
    /// Exactly these messages
    Only(Vec<MessageId>),
    All,
}

/// Message persistence
///
/// Same ownership and consistency rules as `ConversationStore`.
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Create the message, or merge `fields` into the existing one
    async fn save(
        &self,
        conversation_id: &ConversationId,
        message_id: &MessageId,
        fields: MessageFields,
    ) -> Result<MessageRecord>;

    /// Get one message, `None` when absent or not owned by the caller
    async fn get(
        &self,
        conversation_id: &ConversationId,
        message_id: &MessageId,
    ) -> Result<Option<MessageRecord>>;

    /// All messages of a conversation, oldest first
    async fn list_by_conversation(&self, conversation_id: &ConversationId) -> Result<Vec<MessageRecord>>;

    /// Merge `fields` into an existing message
    ///
    /// Without `conversation_id` the owning conversation is looked up by
    /// scanning the message containers.
    async fn update(
        &self,
        message_id: &MessageId,
        fields: MessageFields,
        conversation_id: Option<&ConversationId>,
    ) -> Result<MessageRecord>;

    /// Delete messages; returns how many were removed
    async fn delete_range(&self, conversation_id: &ConversationId, scope: DeleteScope) -> Result<usize>;
}
