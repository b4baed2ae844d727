//! Storage abstractions for chat persistence
//!
//! Traits live in `traits/`, shared record types in `types/`, and the Solid
//! Pod implementation in `implementations/pod/`.

pub mod helper;
pub mod ids;
pub mod implementations;
pub mod traits;
pub mod turtle;
pub mod types;

pub use ids::{ConversationId, MessageId, UserId};
pub use implementations::pod::{
    AccessControlManager, AccessReport, GrantOutcome, PodConversationStore, PodIdentity,
    PodLayout, PodMessageStore, PodStorage, PublicShareReader, RevokeOutcome, SharedConversation,
};
pub use traits::{ConversationStore, DeleteScope, MessageStore};
pub use types::{
    ContentPart, ContentPatch, ConversationFields, ConversationPage, ConversationQuery,
    ConversationRecord, MessageFields, MessageRecord, MessageReference, SortDirection, SortField,
};
