//! MessageStore behavior against an in-memory Pod

mod common;

use pod_storage::transport::CONTENT_TYPE_JSON;
use pod_storage::{
    ContentPart, ContentPatch, ConversationId, DeleteScope, MessageFields, MessageId,
    MessageStore, PodError,
};

use common::{ROOT, USER, at, make_storage, storage_for};

async fn seed_thread(storage: &pod_storage::PodStorage, cid: &ConversationId, ids: &[&str]) {
    for (n, mid) in ids.iter().enumerate() {
        storage
            .messages()
            .save(
                cid,
                &MessageId::from(*mid),
                MessageFields::text(format!("text of {}", mid)).created_at(at(n as i64 * 10)),
            )
            .await
            .unwrap();
    }
}

fn ids(messages: &[pod_storage::MessageRecord]) -> Vec<&str> {
    messages.iter().map(|m| m.message_id.as_str()).collect()
}

#[tokio::test]
async fn test_save_forces_identity_fields() {
    let (_pod, storage) = make_storage();
    let cid = ConversationId::from("c1");
    let mut fields = MessageFields::text("hello").with_sender("User", true);
    fields
        .extra
        .insert("owner".to_string(), serde_json::json!("someone-else"));

    let saved = storage
        .messages()
        .save(&cid, &MessageId::from("m1"), fields)
        .await
        .unwrap();
    assert_eq!(saved.owner.as_str(), USER);
    assert_eq!(saved.conversation_id, cid);
    assert_eq!(saved.message_id.as_str(), "m1");
    assert!(saved.is_created_by_user);
    assert!(saved.parent_message_id.is_none());
}

#[tokio::test]
async fn test_list_is_ordered_by_creation() {
    let (_pod, storage) = make_storage();
    let cid = ConversationId::from("c1");
    for (mid, secs) in [("zeta", 30), ("alpha", 10), ("mid", 20)] {
        storage
            .messages()
            .save(&cid, &MessageId::from(mid), MessageFields::text(mid).created_at(at(secs)))
            .await
            .unwrap();
    }

    let listed = storage.messages().list_by_conversation(&cid).await.unwrap();
    assert_eq!(ids(&listed), vec!["alpha", "mid", "zeta"]);
}

#[tokio::test]
async fn test_list_skips_foreign_records() {
    let (pod, storage) = make_storage();
    let cid = ConversationId::from("c1");
    seed_thread(&storage, &cid, &["m1"]).await;

    pod.put_resource(
        &format!("{}messages/c1/stray.json", ROOT),
        CONTENT_TYPE_JSON,
        serde_json::json!({
            "messageId": "stray", "conversationId": "c2", "owner": USER,
            "createdAt": "2024-01-01T00:00:00.000Z", "updatedAt": "2024-01-01T00:00:00.000Z"
        })
        .to_string(),
    );
    pod.put_resource(
        &format!("{}messages/c1/broken.json", ROOT),
        CONTENT_TYPE_JSON,
        "{not json",
    );

    let listed = storage.messages().list_by_conversation(&cid).await.unwrap();
    assert_eq!(ids(&listed), vec!["m1"]);
}

#[tokio::test]
async fn test_update_merges_and_keeps_created_at() {
    let (_pod, storage) = make_storage();
    let cid = ConversationId::from("c1");
    let mid = MessageId::from("m1");
    let created = storage
        .messages()
        .save(
            &cid,
            &mid,
            MessageFields::text("draft")
                .with_model("gpt-4o", "openAI")
                .with_content(ContentPatch::Replace(vec![ContentPart::text("draft")])),
        )
        .await
        .unwrap();

    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    let updated = storage
        .messages()
        .update(&mid, MessageFields::text("final").created_at(at(0)), Some(&cid))
        .await
        .unwrap();

    assert_eq!(updated.text, "final");
    assert_eq!(updated.model.as_deref(), Some("gpt-4o"));
    assert_eq!(updated.content, created.content);
    assert_eq!(updated.created_at, created.created_at);
    assert!(updated.updated_at > created.updated_at);
}

#[tokio::test]
async fn test_content_patch_clear_and_empty() {
    let (_pod, storage) = make_storage();
    let cid = ConversationId::from("c1");
    let mid = MessageId::from("m1");
    storage
        .messages()
        .save(
            &cid,
            &mid,
            MessageFields::text("x").with_content(ContentPatch::Replace(vec![ContentPart::text("x")])),
        )
        .await
        .unwrap();

    let emptied = storage
        .messages()
        .update(&mid, MessageFields::default().with_content(ContentPatch::Replace(Vec::new())), Some(&cid))
        .await
        .unwrap();
    assert_eq!(emptied.content, Some(Vec::new()));

    let cleared = storage
        .messages()
        .update(&mid, MessageFields::default().with_content(ContentPatch::Clear), Some(&cid))
        .await
        .unwrap();
    assert_eq!(cleared.content, None);
}

#[tokio::test]
async fn test_update_without_conversation_id_finds_it() {
    let (_pod, storage) = make_storage();
    seed_thread(&storage, &ConversationId::from("c1"), &["a1", "a2"]).await;
    seed_thread(&storage, &ConversationId::from("c2"), &["b1"]).await;

    let updated = storage
        .messages()
        .update(&MessageId::from("b1"), MessageFields::text("edited"), None)
        .await
        .unwrap();
    assert_eq!(updated.conversation_id.as_str(), "c2");
    assert_eq!(updated.text, "edited");
}

#[tokio::test]
async fn test_update_unknown_message_without_conversation() {
    let (_pod, storage) = make_storage();
    seed_thread(&storage, &ConversationId::from("c1"), &["a1"]).await;

    let err = storage
        .messages()
        .update(&MessageId::from("ghost"), MessageFields::text("x"), None)
        .await
        .unwrap_err();
    assert!(matches!(err, PodError::ConversationIdRequired(_)));
}

#[tokio::test]
async fn test_update_missing_message_is_not_found() {
    let (_pod, storage) = make_storage();
    let err = storage
        .messages()
        .update(
            &MessageId::from("ghost"),
            MessageFields::text("x"),
            Some(&ConversationId::from("c1")),
        )
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_foreign_message_looks_missing() {
    let (pod, alice) = make_storage();
    let mallory = storage_for(&pod, "user-mallory");
    let cid = ConversationId::from("c1");
    let mid = MessageId::from("m1");
    seed_thread(&alice, &cid, &["m1"]).await;

    assert!(mallory.messages().get(&cid, &mid).await.unwrap().is_none());
    assert!(mallory.messages().list_by_conversation(&cid).await.unwrap().is_empty());
    let err = mallory
        .messages()
        .save(&cid, &mid, MessageFields::text("overwrite"))
        .await
        .unwrap_err();
    assert!(err.is_not_found());

    let original = alice.messages().get(&cid, &mid).await.unwrap().unwrap();
    assert_eq!(original.text, "text of m1");
}

// ============================================================================
// Delete
// ============================================================================

#[tokio::test]
async fn test_delete_after_reference() {
    let (_pod, storage) = make_storage();
    let cid = ConversationId::from("c1");
    seed_thread(&storage, &cid, &["m1", "m2", "m3", "m4"]).await;

    let removed = storage
        .messages()
        .delete_range(&cid, DeleteScope::After(MessageId::from("m2")))
        .await
        .unwrap();
    assert_eq!(removed, 2);

    let left = storage.messages().list_by_conversation(&cid).await.unwrap();
    assert_eq!(ids(&left), vec!["m1", "m2"]);
}

#[tokio::test]
async fn test_delete_after_unknown_reference_is_noop() {
    let (_pod, storage) = make_storage();
    let cid = ConversationId::from("c1");
    seed_thread(&storage, &cid, &["m1", "m2"]).await;

    let removed = storage
        .messages()
        .delete_range(&cid, DeleteScope::After(MessageId::from("ghost")))
        .await
        .unwrap();
    assert_eq!(removed, 0);
    assert_eq!(storage.messages().list_by_conversation(&cid).await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_delete_only_listed() {
    let (_pod, storage) = make_storage();
    let cid = ConversationId::from("c1");
    seed_thread(&storage, &cid, &["m1", "m2", "m3"]).await;

    let removed = storage
        .messages()
        .delete_range(
            &cid,
            DeleteScope::Only(vec![MessageId::from("m1"), MessageId::from("m3"), MessageId::from("nope")]),
        )
        .await
        .unwrap();
    assert_eq!(removed, 2);

    let left = storage.messages().list_by_conversation(&cid).await.unwrap();
    assert_eq!(ids(&left), vec!["m2"]);
}
