//! Chat conversation storage in Solid Pods
//!
//! Conversations and their messages are kept as JSON resources in the user's
//! own Pod, reached through a caller-supplied authenticated transport.
//! Conversations can be shared read-only with the public by editing the Pod's
//! access-control policies, and read back without credentials.
//!
//! ```no_run
//! # async fn demo() -> pod_storage::Result<()> {
//! use std::sync::Arc;
//! use pod_storage::{ConversationFields, ConversationId, ConversationStore, PodConfig, PodIdentity, PodStorage};
//! use pod_storage::transport::MemoryPod;
//!
//! let pod = MemoryPod::new("https://pod.example/alice/profile/card#me", "https://pod.example/alice/");
//! let identity = PodIdentity::new("user-1", pod.owner_web_id());
//! let storage = PodStorage::connect(PodConfig::default(), Arc::new(pod.owner_client()), identity).await?;
//! storage
//!     .conversations()
//!     .save(&ConversationId::from("c1"), ConversationFields::titled("Hello"), None)
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod logging;
pub mod storage;
pub mod transport;

pub use config::{CredentialSource, PodConfig, PolicyDiscoveryMode};
pub use error::{PodError, Result};
pub use storage::*;
