//! Pod-backed ConversationStore
//!
//! One JSON resource per conversation at `conversations/{conversationId}.json`.
//! The `messages` array only ever holds references; it is rebuilt from the
//! message container on every save and on every `get`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::sync::Arc;

use crate::error::{PodError, Result};
use crate::storage::helper::{merge_fields, now, stamp_timestamps};
use crate::storage::ids::ConversationId;
use crate::storage::traits::{ConversationStore, DeleteScope, MessageStore};
use crate::storage::types::{
    ConversationFields, ConversationPage, ConversationQuery, ConversationRecord, MessageRecord,
    SortDirection,
};

use super::codec::{self, WriteMode};
use super::containers;
use super::context::PodContext;
use super::cursor::SortKey;
use super::message::PodMessageStore;

/// Fill a missing model/endpoint from the first message that names both
fn backfill_model(record: &mut ConversationRecord, messages: &[MessageRecord]) {
    if record.model.is_some() && record.endpoint.is_some() {
        return;
    }
    let source = messages
        .iter()
        .find(|m| m.model.is_some() && m.endpoint.is_some());
    if let Some(message) = source {
        if record.model.is_none() {
            record.model = message.model.clone();
        }
        if record.endpoint.is_none() {
            record.endpoint = message.endpoint.clone();
        }
    }
}

fn matches_query(record: &ConversationRecord, query: &ConversationQuery, at: DateTime<Utc>) -> bool {
    if record.is_archived != query.is_archived {
        return false;
    }
    if !query.tags.is_empty() && !query.tags.iter().any(|t| record.tags.contains(t)) {
        return false;
    }
    if record.is_expired(at) {
        return false;
    }
    match query.search.as_deref().map(str::trim) {
        Some(search) if !search.is_empty() => record
            .title
            .as_deref()
            .map(|title| title.to_lowercase().contains(&search.to_lowercase()))
            .unwrap_or(false),
        _ => true,
    }
}

#[derive(Clone, Debug)]
pub struct PodConversationStore {
    ctx: Arc<PodContext>,
    messages: PodMessageStore,
}

impl PodConversationStore {
    pub fn new(ctx: Arc<PodContext>, messages: PodMessageStore) -> Self {
        Self { ctx, messages }
    }

    /// Stored document if it exists and belongs to the caller
    async fn load_owned(&self, url: &str) -> Result<Option<Map<String, Value>>> {
        match codec::read_json(&self.ctx, url).await? {
            Some(stored) => {
                codec::check_owner(&stored, self.ctx.owner(), url)?;
                Ok(Some(stored))
            }
            None => Ok(None),
        }
    }
}

#[async_trait]
impl ConversationStore for PodConversationStore {
    async fn save(
        &self,
        conversation_id: &ConversationId,
        fields: ConversationFields,
        new_conversation_id: Option<&ConversationId>,
    ) -> Result<ConversationRecord> {
        let target_id = new_conversation_id.unwrap_or(conversation_id);
        let renamed = target_id != conversation_id;
        let layout = self.ctx.layout();
        containers::ensure_base_structure(&self.ctx).await?;

        let url = layout.conversation(target_id);
        let old_url = layout.conversation(conversation_id);

        let existing = self
            .load_owned(&url)
            .await
            .map_err(PodError::conceal_ownership)?;
        let exists = existing.is_some();
        let base = match existing {
            Some(stored) => Some(stored),
            None if renamed => self
                .load_owned(&old_url)
                .await
                .map_err(PodError::conceal_ownership)?,
            None => None,
        };

        let mut patch = fields.to_fields();
        patch.remove("updatedAt");
        let mut document = match base {
            Some(stored) => {
                patch.remove("createdAt");
                stored
            }
            None => Map::new(),
        };
        merge_fields(&mut document, patch);
        document.insert(
            "conversationId".to_string(),
            Value::String(target_id.as_str().to_string()),
        );
        document.insert(
            "owner".to_string(),
            Value::String(self.ctx.owner().as_str().to_string()),
        );

        let messages = self.messages.list_by_conversation(target_id).await?;
        let references: Vec<Value> = messages
            .iter()
            .map(|m| codec::encode(&m.reference(), &url))
            .collect::<Result<_>>()?;
        document.insert("messages".to_string(), Value::Array(references));
        stamp_timestamps(&mut document, now());

        let mut record: ConversationRecord = codec::decode(document, &url)?;
        backfill_model(&mut record, &messages);

        let mode = if exists { WriteMode::Overwrite } else { WriteMode::Create };
        codec::write_json(&self.ctx, &url, &codec::encode(&record, &url)?, mode).await?;

        if renamed {
            if let Err(e) = codec::delete(&self.ctx, &old_url).await {
                tracing::warn!(from = %conversation_id, to = %target_id, error = %e, "old conversation left behind after rename");
            }
        }
        tracing::debug!(conversation_id = %target_id, created = !exists, "saved conversation");
        Ok(record)
    }

    async fn get(&self, conversation_id: &ConversationId) -> Result<Option<ConversationRecord>> {
        let url = self.ctx.layout().conversation(conversation_id);
        let Some(mut record) = codec::read_record::<ConversationRecord>(&self.ctx, &url).await? else {
            return Ok(None);
        };
        if record.owner != *self.ctx.owner() {
            tracing::debug!(conversation_id = %conversation_id, "conversation belongs to another owner");
            return Ok(None);
        }

        let messages = self.messages.list_by_conversation(conversation_id).await?;
        record.messages = messages.iter().map(MessageRecord::reference).collect();
        backfill_model(&mut record, &messages);
        Ok(Some(record))
    }

    async fn list_by_cursor(&self, query: &ConversationQuery) -> Result<ConversationPage> {
        let cursor = query
            .cursor
            .as_deref()
            .map(|token| SortKey::decode(token, query.sort_by))
            .transpose()?;

        let listing = self
            .ctx
            .list(&self.ctx.layout().conversations_container())
            .await;
        let at = now();
        let mut matching: Vec<(SortKey, ConversationRecord)> = Vec::new();
        for member in listing.json_members() {
            let record = match codec::read_record::<ConversationRecord>(&self.ctx, member).await {
                Ok(Some(record)) => record,
                Ok(None) => continue,
                Err(e) => {
                    tracing::warn!(url = %member, error = %e, "skipping unreadable conversation");
                    continue;
                }
            };
            if record.owner != *self.ctx.owner() || !matches_query(&record, query, at) {
                continue;
            }
            matching.push((SortKey::of(&record, query.sort_by), record));
        }

        let limit = query.limit.max(1);
        let descending = query.sort_direction == SortDirection::Desc;
        matching.sort_by(|(a, _), (b, _)| if descending { b.cmp(a) } else { a.cmp(b) });

        let mut page: Vec<(SortKey, ConversationRecord)> = matching
            .into_iter()
            .filter(|(key, _)| match &cursor {
                Some(c) if descending => key.cmp(c) == Ordering::Less,
                Some(c) => key.cmp(c) == Ordering::Greater,
                None => true,
            })
            .take(limit.saturating_add(1))
            .collect();

        let next_cursor = if page.len() > limit {
            page.truncate(limit);
            page.last().map(|(key, _)| key.encode())
        } else {
            None
        };

        Ok(ConversationPage {
            conversations: page.into_iter().map(|(_, record)| record).collect(),
            next_cursor,
        })
    }

    async fn delete_batch(&self, conversation_ids: &[ConversationId]) -> Result<usize> {
        let layout = self.ctx.layout();
        let mut deleted = 0;
        for conversation_id in conversation_ids {
            let url = layout.conversation(conversation_id);
            match self.load_owned(&url).await {
                Ok(Some(_)) => {}
                Ok(None) | Err(PodError::OwnershipMismatch(_)) => {
                    tracing::debug!(conversation_id = %conversation_id, "nothing to delete");
                    continue;
                }
                Err(e) => return Err(e),
            }

            self.messages
                .delete_range(conversation_id, DeleteScope::All)
                .await?;
            let container = layout.messages_container(conversation_id);
            if let Err(e) = codec::delete(&self.ctx, &container).await {
                tracing::warn!(container = %container, error = %e, "message container not removed");
            }
            codec::delete(&self.ctx, &url).await?;
            deleted += 1;
        }
        tracing::info!(requested = conversation_ids.len(), deleted, "deleted conversations");
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: serde_json::Value) -> ConversationRecord {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_matches_query_filters() {
        let at = Utc::now();
        let r = record(json!({
            "conversationId": "c1", "owner": "u1", "title": "Rust Tips",
            "tags": ["dev"], "createdAt": "2024-01-01T00:00:00Z", "updatedAt": "2024-01-01T00:00:00Z"
        }));

        let query = ConversationQuery {
            search: Some("rust".into()),
            ..Default::default()
        };
        assert!(matches_query(&r, &query, at));

        let query = ConversationQuery {
            tags: vec!["ops".into()],
            ..Default::default()
        };
        assert!(!matches_query(&r, &query, at));

        let query = ConversationQuery {
            is_archived: true,
            ..Default::default()
        };
        assert!(!matches_query(&r, &query, at));
    }

    #[test]
    fn test_expired_hidden() {
        let r = record(json!({
            "conversationId": "c1", "owner": "u1", "expiredAt": "2020-01-01T00:00:00Z",
            "createdAt": "2019-01-01T00:00:00Z", "updatedAt": "2019-01-01T00:00:00Z"
        }));
        assert!(!matches_query(&r, &ConversationQuery::default(), Utc::now()));
    }

    #[test]
    fn test_backfill_model() {
        let mut r = record(json!({
            "conversationId": "c1", "owner": "u1",
            "createdAt": "2024-01-01T00:00:00Z", "updatedAt": "2024-01-01T00:00:00Z"
        }));
        let message: MessageRecord = serde_json::from_value(json!({
            "messageId": "m1", "conversationId": "c1", "owner": "u1",
            "model": "gpt-4o", "endpoint": "openAI",
            "createdAt": "2024-01-01T00:00:00Z", "updatedAt": "2024-01-01T00:00:00Z"
        }))
        .unwrap();
        backfill_model(&mut r, &[message]);
        assert_eq!(r.model.as_deref(), Some("gpt-4o"));
        assert_eq!(r.endpoint.as_deref(), Some("openAI"));
    }
}
