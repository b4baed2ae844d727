//! Shared fixtures: a MemoryPod owned by Alice and stores built over it

#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use std::sync::Arc;

use pod_storage::transport::MemoryPod;
use pod_storage::{PodConfig, PodIdentity, PodStorage};

pub const WEB_ID: &str = "https://pod.example/alice/profile/card#me";
pub const BASE: &str = "https://pod.example/alice/";
pub const ROOT: &str = "https://pod.example/alice/chat/";
pub const USER: &str = "user-alice";

pub fn make_pod() -> MemoryPod {
    MemoryPod::new(WEB_ID, BASE)
}

/// Stores acting with the owner's credentials, recording `user` as owner
pub fn storage_for(pod: &MemoryPod, user: &str) -> PodStorage {
    PodStorage::with_root(
        PodConfig::default(),
        Arc::new(pod.owner_client()),
        PodIdentity::new(user, WEB_ID),
        ROOT,
    )
}

pub fn make_storage() -> (MemoryPod, PodStorage) {
    let pod = make_pod();
    let storage = storage_for(&pod, USER);
    (pod, storage)
}

pub fn at(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
}
