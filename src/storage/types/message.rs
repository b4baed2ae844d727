//! Message resource types
//!
//! - `MessageRecord` - the JSON document at `messages/{conversationId}/{messageId}.json`
//! - `MessageFields` - a partial write; omitted fields keep their stored value
//! - `MessageRef` - the shapes a conversation's `messages` array has held over time

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::storage::ids::{ConversationId, MessageId, UserId};

/// One block of a multi-part response (text, tool call, image, ...)
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ContentPart {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(flatten)]
    pub data: Map<String, Value>,
}

impl ContentPart {
    pub fn text(text: impl Into<String>) -> Self {
        let mut data = Map::new();
        data.insert("text".to_string(), Value::String(text.into()));
        Self {
            kind: "text".to_string(),
            data,
        }
    }
}

/// Stored message document
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageRecord {
    pub message_id: MessageId,
    pub conversation_id: ConversationId,
    pub owner: UserId,
    /// `None` marks a root message
    #[serde(default)]
    pub parent_message_id: Option<MessageId>,
    #[serde(default)]
    pub text: String,
    /// Structured content blocks
    #[serde(default)]
    pub content: Option<Vec<ContentPart>>,
    #[serde(default)]
    pub sender: Option<String>,
    #[serde(default)]
    pub is_created_by_user: bool,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub finish_reason: Option<String>,
    #[serde(default)]
    pub token_count: Option<u64>,
    #[serde(default)]
    pub error: Option<bool>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Fields this crate does not interpret, kept across merges
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl MessageRecord {
    pub fn reference(&self) -> MessageReference {
        MessageReference {
            message_id: self.message_id.clone(),
            created_at: Some(self.created_at),
        }
    }
}

/// What to do with the structured content on a write
#[derive(Clone, Debug, Default, PartialEq)]
pub enum ContentPatch {
    /// Field omitted: keep whatever is stored
    #[default]
    Keep,
    /// Explicit null
    Clear,
    /// Explicit list, possibly empty
    Replace(Vec<ContentPart>),
}

/// Partial message write
///
/// `None` means "not part of this write". On create the record starts from
/// defaults; on update the stored value is kept.
#[derive(Clone, Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageFields {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_message_id: Option<MessageId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip)]
    pub content: ContentPatch,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sender: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_created_by_user: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_count: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<bool>,
    /// Only honored when the message is first created
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl MessageFields {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Default::default()
        }
    }

    pub fn with_parent(mut self, parent: MessageId) -> Self {
        self.parent_message_id = Some(parent);
        self
    }

    pub fn with_sender(mut self, sender: impl Into<String>, is_created_by_user: bool) -> Self {
        self.sender = Some(sender.into());
        self.is_created_by_user = Some(is_created_by_user);
        self
    }

    pub fn with_model(mut self, model: impl Into<String>, endpoint: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self.endpoint = Some(endpoint.into());
        self
    }

    pub fn with_content(mut self, content: ContentPatch) -> Self {
        self.content = content;
        self
    }

    pub fn created_at(mut self, at: DateTime<Utc>) -> Self {
        self.created_at = Some(at);
        self
    }

    /// The JSON keys this write sets
    pub fn to_fields(&self) -> Map<String, Value> {
        let mut fields = match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        };
        match &self.content {
            ContentPatch::Keep => {}
            ContentPatch::Clear => {
                fields.insert("content".to_string(), Value::Null);
            }
            ContentPatch::Replace(parts) => {
                let parts = serde_json::to_value(parts).unwrap_or(Value::Array(Vec::new()));
                fields.insert("content".to_string(), parts);
            }
        }
        fields
    }
}

/// Entry of a conversation's `messages` array
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageReference {
    pub message_id: MessageId,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// Shapes found in stored `messages` arrays
///
/// Older documents hold bare ids or whole embedded messages. They are accepted
/// on read and normalized to `Reference`; writes only ever emit references.
#[derive(Clone, Debug, PartialEq)]
pub enum MessageRef {
    Id(MessageId),
    Reference(MessageReference),
    Inline(Box<MessageRecord>),
}

impl MessageRef {
    pub fn normalize(self) -> MessageReference {
        match self {
            MessageRef::Id(message_id) => MessageReference {
                message_id,
                created_at: None,
            },
            MessageRef::Reference(reference) => reference,
            MessageRef::Inline(record) => record.reference(),
        }
    }

    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::String(id) => Some(MessageRef::Id(MessageId::from(id))),
            Value::Object(map) => {
                let embedded = map
                    .keys()
                    .any(|k| k != "messageId" && k != "createdAt");
                if embedded {
                    if let Ok(record) = serde_json::from_value::<MessageRecord>(Value::Object(map.clone())) {
                        return Some(MessageRef::Inline(Box::new(record)));
                    }
                }
                let message_id = map.get("messageId")?.as_str()?.to_string();
                let created_at = map
                    .get("createdAt")
                    .and_then(|v| v.as_str())
                    .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                    .map(|dt| dt.with_timezone(&Utc));
                Some(MessageRef::Reference(MessageReference {
                    message_id: MessageId::from(message_id),
                    created_at,
                }))
            }
            _ => None,
        }
    }
}

/// Deserialize any mix of `MessageRef` shapes into references
pub fn deserialize_refs<'de, D>(deserializer: D) -> Result<Vec<MessageReference>, D::Error>
where
    D: Deserializer<'de>,
{
    let values = Option::<Vec<Value>>::deserialize(deserializer)?.unwrap_or_default();
    Ok(values
        .into_iter()
        .filter_map(MessageRef::from_value)
        .map(MessageRef::normalize)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_fields_omit_unset() {
        let fields = MessageFields::text("hello").to_fields();
        assert_eq!(fields.len(), 1);
        assert_eq!(fields["text"], "hello");
    }

    #[test]
    fn test_content_patch_variants() {
        let keep = MessageFields::default().to_fields();
        assert!(!keep.contains_key("content"));

        let clear = MessageFields::default()
            .with_content(ContentPatch::Clear)
            .to_fields();
        assert!(clear["content"].is_null());

        let empty = MessageFields::default()
            .with_content(ContentPatch::Replace(vec![]))
            .to_fields();
        assert_eq!(empty["content"], json!([]));
    }

    #[test]
    fn test_message_ref_shapes() {
        let inline = json!({
            "messageId": "m3",
            "conversationId": "c1",
            "owner": "u1",
            "text": "inline",
            "createdAt": "2024-01-01T00:00:03Z",
            "updatedAt": "2024-01-01T00:00:03Z"
        });
        let values = json!([
            "m1",
            {"messageId": "m2", "createdAt": "2024-01-01T00:00:02Z"},
            inline,
            {"text": "no id"}
        ]);
        let refs = deserialize_refs(values).unwrap();
        assert_eq!(refs.len(), 3);
        assert_eq!(refs[0].message_id.as_str(), "m1");
        assert!(refs[0].created_at.is_none());
        assert_eq!(refs[1].message_id.as_str(), "m2");
        assert_eq!(refs[2].message_id.as_str(), "m3");
        assert!(refs[2].created_at.is_some());
    }

    #[test]
    fn test_record_keeps_unknown_fields() {
        let value = json!({
            "messageId": "m1",
            "conversationId": "c1",
            "owner": "u1",
            "createdAt": "2024-01-01T00:00:00Z",
            "updatedAt": "2024-01-01T00:00:00Z",
            "plugin": {"name": "x"}
        });
        let record: MessageRecord = serde_json::from_value(value).unwrap();
        assert_eq!(record.extra["plugin"]["name"], "x");
        let back = serde_json::to_value(&record).unwrap();
        assert_eq!(back["plugin"]["name"], "x");
    }
}
