//! Pod-backed MessageStore
//!
//! One JSON resource per message at `messages/{conversationId}/{messageId}.json`.
//! Reads are sequential; there is no index beyond the container listing.

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::Arc;

use crate::error::{PodError, Result};
use crate::storage::helper::{member_name, merge_fields, now, stamp_timestamps};
use crate::storage::ids::{ConversationId, MessageId};
use crate::storage::traits::{DeleteScope, MessageStore};
use crate::storage::types::{MessageFields, MessageRecord};

use super::codec::{self, WriteMode};
use super::containers;
use super::context::PodContext;

#[derive(Clone, Debug)]
pub struct PodMessageStore {
    ctx: Arc<PodContext>,
}

impl PodMessageStore {
    pub fn new(ctx: Arc<PodContext>) -> Self {
        Self { ctx }
    }

    /// Keys nobody may change through a write
    fn pin_identity(&self, fields: &mut Map<String, Value>, cid: &ConversationId, mid: &MessageId) {
        fields.insert("messageId".to_string(), Value::String(mid.as_str().to_string()));
        fields.insert(
            "conversationId".to_string(),
            Value::String(cid.as_str().to_string()),
        );
        fields.insert(
            "owner".to_string(),
            Value::String(self.ctx.owner().as_str().to_string()),
        );
    }

    fn belongs_here(&self, record: &MessageRecord, cid: &ConversationId) -> bool {
        record.owner == *self.ctx.owner() && record.conversation_id == *cid
    }

    async fn create(
        &self,
        url: &str,
        cid: &ConversationId,
        mid: &MessageId,
        fields: MessageFields,
    ) -> Result<MessageRecord> {
        let mut document = Map::new();
        merge_fields(&mut document, fields.to_fields());
        document.remove("updatedAt");
        self.pin_identity(&mut document, cid, mid);
        stamp_timestamps(&mut document, now());

        let record: MessageRecord = codec::decode(document, url)?;
        codec::write_json(&self.ctx, url, &codec::encode(&record, url)?, WriteMode::Create).await?;
        Ok(record)
    }

    /// Find which conversation holds `mid` by probing each message container
    async fn locate(&self, mid: &MessageId) -> Result<Option<ConversationId>> {
        let listing = self.ctx.list(&self.ctx.layout().messages_root()).await;
        let containers = listing.child_containers();
        let cap = self.ctx.config().max_reverse_lookup_containers;
        if containers.len() > cap {
            tracing::warn!(
                message_id = %mid,
                containers = containers.len(),
                cap,
                "reverse lookup truncated"
            );
        }

        for container in containers.into_iter().take(cap) {
            let candidate = format!("{}{}.json", container, mid.as_path_segment());
            match codec::exists(&self.ctx, &candidate).await {
                Ok(true) => return Ok(member_name(container).map(ConversationId::from)),
                Ok(false) => {}
                Err(e) => {
                    tracing::warn!(url = %candidate, error = %e, "reverse lookup probe failed");
                }
            }
        }
        Ok(None)
    }
}

#[async_trait]
impl MessageStore for PodMessageStore {
    async fn save(
        &self,
        conversation_id: &ConversationId,
        message_id: &MessageId,
        fields: MessageFields,
    ) -> Result<MessageRecord> {
        let layout = self.ctx.layout();
        containers::ensure_container(&self.ctx, &layout.messages_root()).await?;
        containers::ensure_container(&self.ctx, &layout.messages_container(conversation_id))
            .await?;

        let url = layout.message(conversation_id, message_id);
        if codec::exists(&self.ctx, &url).await? {
            let mut patch = fields.to_fields();
            self.pin_identity(&mut patch, conversation_id, message_id);
            codec::read_merge(&self.ctx, &url, patch, self.ctx.owner())
                .await
                .map_err(PodError::conceal_ownership)
        } else {
            let record = self.create(&url, conversation_id, message_id, fields).await?;
            tracing::debug!(conversation_id = %conversation_id, message_id = %message_id, "created message");
            Ok(record)
        }
    }

    async fn get(
        &self,
        conversation_id: &ConversationId,
        message_id: &MessageId,
    ) -> Result<Option<MessageRecord>> {
        let url = self.ctx.layout().message(conversation_id, message_id);
        let record = codec::read_record::<MessageRecord>(&self.ctx, &url).await?;
        Ok(record.filter(|r| self.belongs_here(r, conversation_id)))
    }

    async fn list_by_conversation(
        &self,
        conversation_id: &ConversationId,
    ) -> Result<Vec<MessageRecord>> {
        let container = self.ctx.layout().messages_container(conversation_id);
        let listing = self.ctx.list(&container).await;

        let mut messages = Vec::new();
        for member in listing.json_members() {
            match codec::read_record::<MessageRecord>(&self.ctx, member).await {
                Ok(Some(record)) if self.belongs_here(&record, conversation_id) => {
                    messages.push(record)
                }
                Ok(Some(_)) => {
                    tracing::debug!(url = %member, "skipping message of another owner or conversation");
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(url = %member, error = %e, "skipping unreadable message");
                }
            }
        }

        messages.sort_by_key(|m| m.created_at);
        Ok(messages)
    }

    async fn update(
        &self,
        message_id: &MessageId,
        fields: MessageFields,
        conversation_id: Option<&ConversationId>,
    ) -> Result<MessageRecord> {
        let conversation_id = match conversation_id {
            Some(id) => id.clone(),
            None => self
                .locate(message_id)
                .await?
                .ok_or_else(|| PodError::ConversationIdRequired(message_id.to_string()))?,
        };

        let url = self.ctx.layout().message(&conversation_id, message_id);
        let mut patch = fields.to_fields();
        self.pin_identity(&mut patch, &conversation_id, message_id);
        codec::read_merge(&self.ctx, &url, patch, self.ctx.owner())
            .await
            .map_err(PodError::conceal_ownership)
    }

    async fn delete_range(&self, conversation_id: &ConversationId, scope: DeleteScope) -> Result<usize> {
        let messages = self.list_by_conversation(conversation_id).await?;
        let targets: Vec<&MessageRecord> = match &scope {
            DeleteScope::All => messages.iter().collect(),
            DeleteScope::Only(ids) => messages
                .iter()
                .filter(|m| ids.contains(&m.message_id))
                .collect(),
            DeleteScope::After(reference) => {
                match messages.iter().find(|m| m.message_id == *reference) {
                    Some(anchor) => messages
                        .iter()
                        .filter(|m| m.created_at > anchor.created_at)
                        .collect(),
                    None => {
                        tracing::debug!(message_id = %reference, "reference message not found, nothing deleted");
                        Vec::new()
                    }
                }
            }
        };

        let layout = self.ctx.layout();
        for message in &targets {
            codec::delete(&self.ctx, &layout.message(conversation_id, &message.message_id)).await?;
        }
        tracing::debug!(conversation_id = %conversation_id, deleted = targets.len(), "deleted messages");
        Ok(targets.len())
    }
}
