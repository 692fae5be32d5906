use std::collections::HashSet;

use super::{Language, Participant, SessionStore, SessionUpdate};
use crate::error::Error;

fn alice() -> Participant {
    Participant {
        user_id: "u-alice".to_string(),
        username: "alice".to_string(),
    }
}

fn bob() -> Participant {
    Participant {
        user_id: "u-bob".to_string(),
        username: "bob".to_string(),
    }
}

#[tokio::test]
async fn it_creates_sessions_with_creator_as_sole_participant() {
    let store = SessionStore::new();
    let session = store
        .create("Two Sum", None, Language::Python, &alice())
        .await
        .unwrap();

    assert_eq!(session.title, "Two Sum");
    assert_eq!(session.language, Language::Python);
    assert!(session.code.is_empty());
    assert_eq!(session.created_by, "u-alice");
    assert_eq!(session.participants, vec![alice()]);
    assert_eq!(session.created_at, session.updated_at);
}

#[tokio::test]
async fn it_rejects_blank_titles() {
    let store = SessionStore::new();
    let err = store
        .create("   ", None, Language::Go, &alice())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
}

#[tokio::test]
async fn it_overwrites_with_the_last_write() {
    let store = SessionStore::new();
    let session = store
        .create("LWW", None, Language::Python, &alice())
        .await
        .unwrap();

    let first = SessionUpdate {
        code: Some("print('first')".to_string()),
        ..Default::default()
    };
    let second = SessionUpdate {
        code: Some("print('second')".to_string()),
        ..Default::default()
    };

    // Neither write errors; the later one silently wins.
    store.update(&session.id, first).await.unwrap();
    store.update(&session.id, second).await.unwrap();

    let stored = store.get(&session.id).await.unwrap();
    assert_eq!(stored.code, "print('second')");
}

#[tokio::test]
async fn it_never_moves_updated_at_backwards() {
    let store = SessionStore::new();
    let session = store
        .create("Clock", None, Language::Python, &alice())
        .await
        .unwrap();

    let mut previous = session.updated_at;
    for n in 0..3 {
        let updated = store
            .update(
                &session.id,
                SessionUpdate {
                    code: Some(format!("print({n})")),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(updated.updated_at >= previous);
        previous = updated.updated_at;
    }
}

#[tokio::test]
async fn it_updates_metadata_partially() {
    let store = SessionStore::new();
    let session = store
        .create("Draft", None, Language::Python, &alice())
        .await
        .unwrap();

    let updated = store
        .update(
            &session.id,
            SessionUpdate {
                title: Some("Final".to_string()),
                language: Some(Language::Javascript),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(updated.title, "Final");
    assert_eq!(updated.language, Language::Javascript);
    // Untouched fields survive the partial update.
    assert!(updated.code.is_empty());
    assert_eq!(updated.created_by, "u-alice");
}

#[tokio::test]
async fn it_deletes_terminally() {
    let store = SessionStore::new();
    let session = store
        .create("Short lived", None, Language::Cpp, &alice())
        .await
        .unwrap();

    store.delete(&session.id).await.unwrap();

    assert!(matches!(
        store.get(&session.id).await.unwrap_err(),
        Error::NotFound(_)
    ));
    assert!(matches!(
        store.delete(&session.id).await.unwrap_err(),
        Error::NotFound(_)
    ));
}

#[tokio::test]
async fn it_adds_participants_idempotently() {
    let store = SessionStore::new();
    let session = store
        .create("Pairing", None, Language::Java, &alice())
        .await
        .unwrap();

    store.add_participant(&session.id, &bob()).await.unwrap();
    store.add_participant(&session.id, &bob()).await.unwrap();

    let stored = store.get(&session.id).await.unwrap();
    assert_eq!(stored.participants.len(), 2);
}

#[tokio::test]
async fn it_paginates_without_gaps_or_overlap() {
    let store = SessionStore::new();
    for n in 0..7 {
        store
            .create(&format!("session {n}"), None, Language::Python, &alice())
            .await
            .unwrap();
    }

    let mut seen = HashSet::new();
    let mut offset = 0;
    loop {
        let page = store.list(3, offset).await;
        assert_eq!(page.total, 7);
        if page.items.is_empty() {
            break;
        }
        for item in &page.items {
            assert!(seen.insert(item.id.clone()), "duplicate across pages");
        }
        offset += 3;
    }
    assert_eq!(seen.len(), 7);
}

#[tokio::test]
async fn it_orders_the_directory_newest_first() {
    let store = SessionStore::new();
    for n in 0..4 {
        store
            .create(&format!("session {n}"), None, Language::Python, &alice())
            .await
            .unwrap();
    }

    let page = store.list(10, 0).await;
    for pair in page.items.windows(2) {
        assert!(pair[0].created_at >= pair[1].created_at);
    }
}

#[tokio::test]
async fn it_clamps_the_page_size() {
    let store = SessionStore::new();
    for n in 0..3 {
        store
            .create(&format!("session {n}"), None, Language::Python, &alice())
            .await
            .unwrap();
    }

    let page = store.list(0, 0).await;
    assert_eq!(page.items.len(), 1);
    assert_eq!(page.total, 3);
}

#[tokio::test]
async fn it_summarizes_without_code() {
    let store = SessionStore::new();
    let session = store
        .create("Summary", None, Language::Python, &alice())
        .await
        .unwrap();
    store
        .update(
            &session.id,
            SessionUpdate {
                code: Some("print('hidden')".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    store.add_participant(&session.id, &bob()).await.unwrap();

    let page = store.list(10, 0).await;
    assert_eq!(page.items.len(), 1);
    assert_eq!(page.items[0].participant_count, 2);

    // The wire shape of a summary carries no code buffer at all.
    let value = serde_json::to_value(&page.items[0]).unwrap();
    assert!(value.get("code").is_none());
}
