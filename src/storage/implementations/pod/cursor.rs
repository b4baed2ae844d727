//! Opaque page cursors
//!
//! A cursor is the sort key of the last conversation on a page: the sort field
//! value, then `updatedAt`, then the conversation id, so that records sharing a
//! timestamp or title still have a total order. Encoded as URL-safe base64 of
//! its JSON form.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{PodError, Result};
use crate::storage::ids::ConversationId;
use crate::storage::types::{ConversationRecord, SortField};

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "k", content = "v", rename_all = "lowercase")]
pub enum SortValue {
    Time(DateTime<Utc>),
    Text(String),
}

impl SortValue {
    fn matches(&self, field: SortField) -> bool {
        matches!(
            (self, field),
            (SortValue::Time(_), SortField::UpdatedAt | SortField::CreatedAt)
                | (SortValue::Text(_), SortField::Title)
        )
    }
}

/// Total order over conversations for one sort field
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SortKey {
    pub primary: SortValue,
    pub updated_at: DateTime<Utc>,
    pub id: ConversationId,
}

impl SortKey {
    pub fn of(record: &ConversationRecord, field: SortField) -> Self {
        let primary = match field {
            SortField::UpdatedAt => SortValue::Time(record.updated_at),
            SortField::CreatedAt => SortValue::Time(record.created_at),
            SortField::Title => SortValue::Text(record.title.clone().unwrap_or_default()),
        };
        Self {
            primary,
            updated_at: record.updated_at,
            id: record.conversation_id.clone(),
        }
    }

    pub fn encode(&self) -> String {
        let json = serde_json::to_vec(self).unwrap_or_default();
        URL_SAFE_NO_PAD.encode(json)
    }

    /// Decode a cursor produced for `field`
    pub fn decode(token: &str, field: SortField) -> Result<Self> {
        let bytes = URL_SAFE_NO_PAD
            .decode(token.trim())
            .map_err(|e| PodError::InvalidCursor(e.to_string()))?;
        let key: SortKey =
            serde_json::from_slice(&bytes).map_err(|e| PodError::InvalidCursor(e.to_string()))?;
        if !key.primary.matches(field) {
            return Err(PodError::InvalidCursor(format!(
                "cursor does not belong to a {:?} ordering",
                field
            )));
        }
        Ok(key)
    }
}
