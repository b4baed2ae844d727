//! ConversationStore trait for conversation lifecycle operations
//!
//! MessageStore is a separate trait for the messages inside a conversation.

use async_trait::async_trait;

use crate::error::Result;
use crate::storage::ids::ConversationId;
use crate::storage::types::{ConversationFields, ConversationPage, ConversationQuery, ConversationRecord};

/// Conversation persistence
///
/// Every operation is scoped to the owner the store was built for; another
/// owner's conversation looks exactly like a missing one.
///
/// Writes are read-merge-write with no locking. Two concurrent saves to the
/// same conversation can lose one writer's fields (last PUT wins).
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Create or merge-update a conversation
    ///
    /// With `new_conversation_id` the conversation is written under the new id
    /// and the old resource is removed afterwards.
    async fn save(
        &self,
        conversation_id: &ConversationId,
        fields: ConversationFields,
        new_conversation_id: Option<&ConversationId>,
    ) -> Result<ConversationRecord>;

    /// Get a conversation, `None` when absent or not owned by the caller
    async fn get(&self, conversation_id: &ConversationId) -> Result<Option<ConversationRecord>>;

    /// One page of the caller's conversations
    async fn list_by_cursor(&self, query: &ConversationQuery) -> Result<ConversationPage>;

    /// Delete conversations and their messages; returns how many were deleted
    async fn delete_batch(&self, conversation_ids: &[ConversationId]) -> Result<usize>;
}
