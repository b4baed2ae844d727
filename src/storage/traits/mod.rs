//! Storage trait definitions
//!
//! All storage traits are defined here, with implementations in `implementations/`.

mod conversation;
mod message;

pub use conversation::ConversationStore;
pub use message::{DeleteScope, MessageStore};
