//! Conversation resource types and listing queries

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeSet;

use crate::storage::ids::{ConversationId, UserId};
use crate::storage::types::message::{MessageReference, deserialize_refs};

/// Stored conversation document
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationRecord {
    pub conversation_id: ConversationId,
    pub owner: UserId,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub agent_id: Option<String>,
    #[serde(default)]
    pub assistant_id: Option<String>,
    #[serde(default)]
    pub spec: Option<String>,
    #[serde(default)]
    pub is_archived: bool,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    /// Past expiry hides the conversation from listings
    #[serde(default)]
    pub expired_at: Option<DateTime<Utc>>,
    /// References only, never message bodies
    #[serde(default, deserialize_with = "deserialize_refs")]
    pub messages: Vec<MessageReference>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ConversationRecord {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expired_at.map(|at| at <= now).unwrap_or(false)
    }
}

/// Partial conversation write; `None` fields are left alone
#[derive(Clone, Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationFields {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assistant_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spec: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_archived: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<BTreeSet<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expired_at: Option<DateTime<Utc>>,
    /// Only honored when the conversation is first created
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ConversationFields {
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Default::default()
        }
    }

    pub fn with_model(mut self, model: impl Into<String>, endpoint: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self.endpoint = Some(endpoint.into());
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = Some(tags.into_iter().map(Into::into).collect());
        self
    }

    pub fn archived(mut self, is_archived: bool) -> Self {
        self.is_archived = Some(is_archived);
        self
    }

    pub fn to_fields(&self) -> Map<String, Value> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        }
    }
}

// ============================================================================
// Listing
// ============================================================================

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortField {
    #[default]
    UpdatedAt,
    CreatedAt,
    Title,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

/// Filters and page position for `list_by_cursor`
#[derive(Clone, Debug)]
pub struct ConversationQuery {
    /// Opaque token from a previous page
    pub cursor: Option<String>,
    pub limit: usize,
    /// Archived conversations are listed only when this is true, and then exclusively
    pub is_archived: bool,
    /// Keep conversations carrying at least one of these tags
    pub tags: Vec<String>,
    /// Case-insensitive substring match on the title
    pub search: Option<String>,
    pub sort_by: SortField,
    pub sort_direction: SortDirection,
}

impl Default for ConversationQuery {
    fn default() -> Self {
        Self {
            cursor: None,
            limit: 25,
            is_archived: false,
            tags: Vec::new(),
            search: None,
            sort_by: SortField::default(),
            sort_direction: SortDirection::default(),
        }
    }
}

impl ConversationQuery {
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn after(mut self, cursor: Option<String>) -> Self {
        self.cursor = cursor;
        self
    }

    pub fn sorted_by(mut self, field: SortField, direction: SortDirection) -> Self {
        self.sort_by = field;
        self.sort_direction = direction;
        self
    }
}

/// One page of conversations
#[derive(Clone, Debug)]
pub struct ConversationPage {
    pub conversations: Vec<ConversationRecord>,
    /// Present when another page follows
    pub next_cursor: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_record_defaults() {
        let record: ConversationRecord = serde_json::from_value(json!({
            "conversationId": "c1",
            "owner": "u1",
            "createdAt": "2024-01-01T00:00:00Z",
            "updatedAt": "2024-01-02T00:00:00Z",
            "messages": ["m1"]
        }))
        .unwrap();
        assert!(!record.is_archived);
        assert!(record.tags.is_empty());
        assert_eq!(record.messages.len(), 1);
        assert!(!record.is_expired(Utc::now()));
    }

    #[test]
    fn test_null_messages_is_empty() {
        let record: ConversationRecord = serde_json::from_value(json!({
            "conversationId": "c1",
            "owner": "u1",
            "createdAt": "2024-01-01T00:00:00Z",
            "updatedAt": "2024-01-02T00:00:00Z",
            "messages": null
        }))
        .unwrap();
        assert!(record.messages.is_empty());
    }

    #[test]
    fn test_expiry() {
        let mut record: ConversationRecord = serde_json::from_value(json!({
            "conversationId": "c1",
            "owner": "u1",
            "createdAt": "2024-01-01T00:00:00Z",
            "updatedAt": "2024-01-02T00:00:00Z",
            "expiredAt": "2000-01-01T00:00:00Z"
        }))
        .unwrap();
        assert!(record.is_expired(Utc::now()));
        record.expired_at = None;
        assert!(!record.is_expired(Utc::now()));
    }

    #[test]
    fn test_fields_serialize_only_set_keys() {
        let fields = ConversationFields::titled("X").to_fields();
        assert_eq!(fields.len(), 1);
        assert_eq!(fields["title"], "X");
    }
}
