use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::json;
use store::{
    CollectionSchema, IndexSchema, Key, LocalStore, MemoryBackend, StoreError, StoreResult, TransactionMode,
    VersionChange,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Account {
    email: String,
    full_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Post {
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<i64>,
    user_id: String,
    visibility: String,
}

fn schema_v1(change: &mut VersionChange) -> StoreResult<()> {
    change.create_collection("accounts", CollectionSchema::keyed("email"))?;
    change.create_collection(
        "posts",
        CollectionSchema::auto_increment("id")
            .with_index("userId", IndexSchema::new("userId"))
            .with_index("visibility", IndexSchema::new("visibility")),
    )?;
    Ok(())
}

async fn open() -> anyhow::Result<LocalStore> {
    Ok(LocalStore::open(Arc::new(MemoryBackend::new()), "tx-db", 1, &schema_v1).await?)
}

fn account(email: &str) -> Account {
    Account { email: email.into(), full_name: "Ana Pérez".into() }
}

fn post(user: &str, visibility: &str) -> Post {
    Post { id: None, user_id: user.into(), visibility: visibility.into() }
}

#[tokio::test]
async fn multi_collection_commit_is_atomic() -> anyhow::Result<()> {
    let store = open().await?;
    let mut tx = store.transaction(&["accounts", "posts"], TransactionMode::ReadWrite).await?;
    tx.add("accounts", &account("ana@gmail.com"))?;
    let id = tx.add("posts", &post("ana@gmail.com", "public"))?;
    assert_eq!(id, Key::Int(1));
    tx.commit().await?;

    assert!(store.get::<Account>("accounts", "ana@gmail.com").await?.is_some());
    let posts: Vec<Post> = store.get_all_by_index("posts", "userId", "ana@gmail.com").await?;
    assert_eq!(posts[0].id, Some(1));
    Ok(())
}

#[tokio::test]
async fn failure_aborts_every_write_in_the_transaction() -> anyhow::Result<()> {
    let store = open().await?;
    store.add("accounts", &account("ana@gmail.com")).await?;

    let mut tx = store.transaction(&["accounts", "posts"], TransactionMode::ReadWrite).await?;
    tx.add("posts", &post("ana@gmail.com", "public"))?;
    let dup = tx.add("accounts", &account("ana@gmail.com")).unwrap_err();
    assert!(dup.is_recoverable());
    assert!(tx.is_aborted());
    assert!(matches!(tx.count("posts"), Err(StoreError::TransactionAborted(_))));
    assert!(matches!(tx.commit().await, Err(StoreError::TransactionAborted(_))));

    assert_eq!(store.count("posts").await?, 0);
    assert_eq!(store.count("accounts").await?, 1);
    Ok(())
}

#[tokio::test]
async fn dropped_transaction_rolls_back() -> anyhow::Result<()> {
    let store = open().await?;
    {
        let mut tx = store.transaction(&["posts"], TransactionMode::ReadWrite).await?;
        tx.add("posts", &post("a@gmail.com", "private"))?;
        assert_eq!(tx.count("posts")?, 1);
    }
    assert_eq!(store.count("posts").await?, 0);

    // The rolled back id was never published, so it is handed out again.
    assert_eq!(store.add("posts", &post("a@gmail.com", "private")).await?, Key::Int(1));
    Ok(())
}

#[tokio::test]
async fn read_only_and_scope_violations() -> anyhow::Result<()> {
    let store = open().await?;
    let mut ro = store.transaction(&["posts"], TransactionMode::ReadOnly).await?;
    assert!(matches!(ro.add("posts", &post("a", "public")), Err(StoreError::ReadOnly(_))));
    drop(ro);

    let mut rw = store.transaction(&["posts"], TransactionMode::ReadWrite).await?;
    assert!(matches!(rw.get::<Account>("accounts", "x"), Err(StoreError::NotInScope(_))));
    Ok(())
}

#[tokio::test]
async fn auto_increment_ids_are_never_reused() -> anyhow::Result<()> {
    let store = open().await?;
    for _ in 0..3 {
        store.add("posts", &post("a@gmail.com", "public")).await?;
    }
    assert!(store.delete("posts", 3).await?);
    assert_eq!(store.add("posts", &post("a@gmail.com", "public")).await?, Key::Int(4));

    // An explicit id above the counter moves it forward.
    store.put("posts", &Post { id: Some(10), ..post("a@gmail.com", "public") }).await?;
    assert_eq!(store.add("posts", &post("a@gmail.com", "public")).await?, Key::Int(11));
    Ok(())
}

#[tokio::test]
async fn exhausting_the_key_generator_aborts_the_transaction() -> anyhow::Result<()> {
    let store = open().await?;
    store.add("posts", &post("ana@gmail.com", "public")).await?;

    let mut tx = store.transaction(&["posts"], TransactionMode::ReadWrite).await?;
    tx.add("posts", &post("ana@gmail.com", "private"))?;
    let last = Post { id: Some(i64::MAX), ..post("ana@gmail.com", "public") };
    assert!(matches!(tx.put("posts", &last), Err(StoreError::InvalidKey { .. })));
    assert!(tx.is_aborted());
    assert!(matches!(tx.commit().await, Err(StoreError::TransactionAborted(_))));

    assert_eq!(store.count("posts").await?, 1);
    assert_eq!(store.add("posts", &post("ana@gmail.com", "public")).await?, Key::Int(2));
    Ok(())
}

#[tokio::test]
async fn iterate_and_delete_visits_the_starting_snapshot() -> anyhow::Result<()> {
    let store = open().await?;
    for user in ["a", "b", "a", "c", "a"] {
        store.add("posts", &post(user, "public")).await?;
    }
    let removed = store.iterate_and_delete("posts", |p: &Post| p.user_id == "a").await?;
    assert_eq!(removed, 3);

    let left: Vec<Post> = store.get_all("posts").await?;
    assert_eq!(left.iter().map(|p| p.user_id.as_str()).collect::<Vec<_>>(), vec!["b", "c"]);
    assert!(store.get_all_by_index::<Post>("posts", "userId", "a").await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn reads_see_earlier_writes_in_the_same_transaction() -> anyhow::Result<()> {
    let store = open().await?;
    let mut tx = store.transaction(&["posts"], TransactionMode::ReadWrite).await?;
    tx.add("posts", &post("a", "private"))?;
    tx.put("posts", &Post { id: Some(1), ..post("a", "public") })?;
    let public: Vec<Post> = tx.get_all_by_index("posts", "visibility", "public")?;
    assert_eq!(public.len(), 1);
    tx.commit().await?;
    Ok(())
}

#[tokio::test]
async fn writers_on_one_collection_are_serialized() -> anyhow::Result<()> {
    let store = open().await?;
    let mut first = store.transaction(&["posts"], TransactionMode::ReadWrite).await?;
    first.add("posts", &post("a", "public"))?;

    let second = {
        let store = store.clone();
        tokio::spawn(async move {
            let mut tx = store.transaction(&["posts"], TransactionMode::ReadWrite).await?;
            let seen = tx.count("posts")?;
            tx.add("posts", &post("b", "public"))?;
            tx.commit().await?;
            Ok::<_, StoreError>(seen)
        })
    };

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(!second.is_finished());
    first.commit().await?;

    assert_eq!(second.await??, 1);
    assert_eq!(store.count("posts").await?, 2);
    Ok(())
}

#[tokio::test]
async fn readers_on_other_collections_are_not_blocked() -> anyhow::Result<()> {
    let store = open().await?;
    let _writer = store.transaction(&["posts"], TransactionMode::ReadWrite).await?;
    let read = tokio::time::timeout(Duration::from_secs(1), store.count("accounts")).await?;
    assert_eq!(read?, 0);
    Ok(())
}

#[tokio::test]
async fn malformed_records_are_rejected() -> anyhow::Result<()> {
    let store = open().await?;
    let err = store.add("accounts", &json!({"fullName": "no email"})).await.unwrap_err();
    assert!(matches!(err, StoreError::InvalidKey { .. }));

    let err = store.add("accounts", &json!(["not", "an", "object"])).await.unwrap_err();
    assert!(matches!(err, StoreError::InvalidRecord { .. }));

    let err = store.get_all_by_index::<Post>("posts", "nope", "x").await.unwrap_err();
    assert!(matches!(err, StoreError::UnknownIndex { .. }));
    Ok(())
}
