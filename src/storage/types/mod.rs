//! Storage types
//!
//! Shared types used by storage traits and implementations.

pub mod conversation;
pub mod message;
pub mod policy;

pub use conversation::{
    ConversationFields, ConversationPage, ConversationQuery, ConversationRecord, SortDirection,
    SortField,
};
pub use message::{
    ContentPart, ContentPatch, MessageFields, MessageRecord, MessageRef, MessageReference,
};
pub use policy::{AccessMode, Authorization, PolicyDocument, Subject};
