//! Storage location resolution and the PodStorage composition root

mod common;

use std::sync::Arc;

use pod_storage::transport::MemoryPod;
use pod_storage::{
    ConversationFields, ConversationId, ConversationStore, PodConfig, PodError, PodIdentity,
    PodStorage,
};

use common::{BASE, ROOT, USER, WEB_ID, make_pod};

#[tokio::test]
async fn test_connect_uses_advertised_storage() {
    let pod = make_pod();
    let storage = PodStorage::connect(
        PodConfig::default(),
        Arc::new(pod.owner_client()),
        PodIdentity::new(USER, WEB_ID),
    )
    .await
    .unwrap();
    assert_eq!(storage.layout().root(), ROOT);

    storage
        .conversations()
        .save(&ConversationId::from("c1"), ConversationFields::titled("first"), None)
        .await
        .unwrap();
    assert!(pod.contains(&format!("{}conversations/c1.json", ROOT)));
}

#[tokio::test]
async fn test_connect_derives_storage_from_web_id() {
    let pod = MemoryPod::unadvertised(WEB_ID, BASE);
    let storage = PodStorage::connect(
        PodConfig::default(),
        Arc::new(pod.owner_client()),
        PodIdentity::new(USER, WEB_ID),
    )
    .await
    .unwrap();
    assert_eq!(storage.layout().root(), ROOT);
}

#[tokio::test]
async fn test_configured_origin_wins() {
    let pod = make_pod();
    let config = PodConfig {
        storage_origin: Some("https://pod.example/alice/custom".to_string()),
        root_container: "librechat".to_string(),
        ..Default::default()
    };
    let storage = PodStorage::connect(config, Arc::new(pod.owner_client()), PodIdentity::new(USER, WEB_ID))
        .await
        .unwrap();
    assert_eq!(storage.layout().root(), "https://pod.example/alice/custom/librechat/");
}

#[tokio::test]
async fn test_unresolvable_storage() {
    let pod = make_pod();
    let stranger = "https://pod.example/bob/profile/card#me";
    let err = PodStorage::connect(
        PodConfig::default(),
        Arc::new(pod.owner_client()),
        PodIdentity::new("user-bob", stranger),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, PodError::StorageUnresolvable(_)));

    let err = PodStorage::connect(
        PodConfig::default(),
        Arc::new(pod.owner_client()),
        PodIdentity::new(USER, "urn:uuid:1234"),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, PodError::StorageUnresolvable(_)));
}

#[tokio::test]
async fn test_invalid_config_rejected() {
    let pod = make_pod();
    let config = PodConfig {
        root_container: "a/b".to_string(),
        ..Default::default()
    };
    let err = PodStorage::connect(config, Arc::new(pod.owner_client()), PodIdentity::new(USER, WEB_ID))
        .await
        .unwrap_err();
    assert!(matches!(err, PodError::Config(_)));
}
