//! Query-level tests against an in-memory database

use chrono::{Duration, Utc};
use naturae_common::db::{
    self, cards, decks, likes, media, profiles, progress, species, MediaType, Species,
};
use naturae_common::quota::{self, QuotaLimits};
use naturae_common::review::Rating;
use naturae_common::Error;
use sqlx::SqlitePool;
use tempfile::TempDir;
use uuid::Uuid;

async fn setup() -> SqlitePool {
    let pool = db::init_memory_database().await.unwrap();
    profiles::ensure_profile(&pool, "alice", Some("alice@example.com")).await.unwrap();
    profiles::ensure_profile(&pool, "bob", None).await.unwrap();
    pool
}

async fn deck(pool: &SqlitePool, owner: &str, title: &str, is_public: bool) -> db::Deck {
    decks::create_deck(
        pool,
        owner,
        &decks::NewDeck {
            title: title.to_string(),
            description: None,
            is_public,
        },
    )
    .await
    .unwrap()
}

async fn card(pool: &SqlitePool, deck_id: Uuid, front: &str) -> db::Card {
    cards::insert_card(
        pool,
        deck_id,
        &cards::NewCard {
            front_text: front.to_string(),
            back_text: format!("{} back", front),
            ..cards::NewCard::default()
        },
    )
    .await
    .unwrap()
}

#[tokio::test]
async fn test_init_database_on_disk_is_idempotent() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("nested").join("naturae.db");

    let pool = db::init_database(&path).await.unwrap();
    pool.close().await;
    assert!(path.exists());

    let pool = db::init_database(&path).await.unwrap();
    profiles::ensure_profile(&pool, "u1", None).await.unwrap();
}

#[tokio::test]
async fn test_ensure_profile_keeps_existing_email() {
    let pool = setup().await;
    let profile = profiles::ensure_profile(&pool, "alice", None).await.unwrap();
    assert_eq!(profile.email.as_deref(), Some("alice@example.com"));
    assert_eq!(profile.storage_used_bytes, 0);
}

#[tokio::test]
async fn test_username_conflict() {
    let pool = setup().await;
    let update = profiles::ProfileUpdate {
        username: Some("vogelaar".to_string()),
        ..Default::default()
    };
    profiles::update_profile(&pool, "alice", &update).await.unwrap();

    let err = profiles::update_profile(&pool, "bob", &update).await.unwrap_err();
    assert!(matches!(err, Error::Conflict(_)));

    let found = profiles::load_profile_by_username(&pool, "vogelaar").await.unwrap().unwrap();
    assert_eq!(found.user_id, "alice");
}

#[tokio::test]
async fn test_soft_deleted_deck_is_hidden() {
    let pool = setup().await;
    let d = deck(&pool, "alice", "Vogels", true).await;

    assert!(decks::soft_delete_deck(&pool, d.id).await.unwrap());
    assert!(decks::load_deck(&pool, d.id).await.unwrap().is_none());
    assert!(decks::list_user_decks(&pool, "alice").await.unwrap().is_empty());
    assert_eq!(decks::count_public_decks(&pool, None).await.unwrap(), 0);
}

#[tokio::test]
async fn test_public_deck_search_and_sort() {
    let pool = setup().await;
    let birds = deck(&pool, "alice", "Vogels 100%", true).await;
    deck(&pool, "alice", "Bomen", true).await;
    deck(&pool, "bob", "Geheime vogels", false).await;

    likes::toggle_like(&pool, "bob", birds.id).await.unwrap();

    assert_eq!(decks::count_public_decks(&pool, None).await.unwrap(), 2);
    assert_eq!(decks::count_public_decks(&pool, Some("vogel")).await.unwrap(), 1);
    assert_eq!(decks::count_public_decks(&pool, Some("100%")).await.unwrap(), 1);
    assert_eq!(decks::count_public_decks(&pool, Some("_")).await.unwrap(), 0);

    let popular = decks::list_public_decks(&pool, None, decks::DeckSort::Popular, 24, 0)
        .await
        .unwrap();
    assert_eq!(popular[0].id, birds.id);

    let second_page = decks::list_public_decks(&pool, None, decks::DeckSort::Newest, 1, 1)
        .await
        .unwrap();
    assert_eq!(second_page.len(), 1);
}

#[tokio::test]
async fn test_cards_append_and_reorder() {
    let pool = setup().await;
    let d = deck(&pool, "alice", "Vogels", false).await;
    let a = card(&pool, d.id, "Merel").await;
    let b = card(&pool, d.id, "Koolmees").await;
    let c = card(&pool, d.id, "Pimpelmees").await;
    assert_eq!((a.position, b.position, c.position), (0, 1, 2));

    assert_eq!(decks::refresh_card_count(&pool, d.id).await.unwrap(), 3);

    cards::reorder_cards(&pool, d.id, &[c.id, a.id, b.id]).await.unwrap();
    let fronts: Vec<String> = cards::list_cards(&pool, d.id)
        .await
        .unwrap()
        .into_iter()
        .map(|c| c.front_text)
        .collect();
    assert_eq!(fronts, vec!["Pimpelmees", "Merel", "Koolmees"]);

    let err = cards::reorder_cards(&pool, d.id, &[a.id, b.id]).await.unwrap_err();
    assert!(matches!(err, Error::InvalidInput(_)));
}

#[tokio::test]
async fn test_delete_card_cascades_media() {
    let pool = setup().await;
    let d = deck(&pool, "alice", "Vogels", false).await;
    let c = card(&pool, d.id, "Merel").await;

    let mut upload = media::NewMedia::linked(MediaType::Audio, "/media/alice/abc.mp3".to_string());
    upload.size_bytes = 1234;
    upload.storage_path = Some("alice/abc.mp3".to_string());
    let m = media::insert_media(&pool, c.id, &upload).await.unwrap();

    let stored = media::stored_files_for_card(&pool, c.id).await.unwrap();
    assert_eq!(stored, vec![("alice/abc.mp3".to_string(), 1234)]);

    assert!(cards::delete_card(&pool, c.id).await.unwrap());
    assert!(media::load_media(&pool, m.id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_media_grouped_by_card() {
    let pool = setup().await;
    let d = deck(&pool, "alice", "Vogels", false).await;
    let a = card(&pool, d.id, "Merel").await;
    let b = card(&pool, d.id, "Koolmees").await;

    for url in ["https://static.inaturalist.org/1.jpg", "https://static.inaturalist.org/2.jpg"] {
        media::insert_media(&pool, a.id, &media::NewMedia::linked(MediaType::Image, url.to_string()))
            .await
            .unwrap();
    }

    let grouped = media::list_media_for_deck(&pool, d.id).await.unwrap();
    assert_eq!(grouped.get(&a.id).map(Vec::len), Some(2));
    assert!(grouped.get(&b.id).is_none());
    assert_eq!(grouped[&a.id][1].position, 1);
}

#[tokio::test]
async fn test_like_toggle_reports_server_state() {
    let pool = setup().await;
    let d = deck(&pool, "alice", "Vogels", true).await;

    let first = likes::toggle_like(&pool, "bob", d.id).await.unwrap();
    assert_eq!(first, likes::LikeState { liked: true, like_count: 1 });
    assert!(likes::is_liked(&pool, "bob", d.id).await.unwrap());

    let second = likes::toggle_like(&pool, "bob", d.id).await.unwrap();
    assert_eq!(second, likes::LikeState { liked: false, like_count: 0 });
    assert!(!likes::is_liked(&pool, "bob", d.id).await.unwrap());
}

#[tokio::test]
async fn test_species_upsert_merges_common_names() {
    let pool = setup().await;

    let first = species::upsert_species(&pool, &Species::manual("Apus apus", Some("Gierzwaluw")))
        .await
        .unwrap();

    let mut english = Species::manual("Apus apus", None);
    english.common_names.insert("en".to_string(), "Common Swift".to_string());
    english.gbif_key = Some(5228676);
    let merged = species::upsert_species(&pool, &english).await.unwrap();

    assert_eq!(merged.id, first.id);
    assert_eq!(merged.common_names.get("nl").map(String::as_str), Some("Gierzwaluw"));
    assert_eq!(merged.common_names.get("en").map(String::as_str), Some("Common Swift"));
    assert_eq!(merged.gbif_key, Some(5228676));

    let found = species::find_by_scientific_name(&pool, "apus APUS").await.unwrap();
    assert_eq!(found.map(|s| s.id), Some(first.id));
}

#[tokio::test]
async fn test_study_queue_orders_due_cards_first() {
    let pool = setup().await;
    let d = deck(&pool, "alice", "Vogels", false).await;
    let a = card(&pool, d.id, "Merel").await;
    let b = card(&pool, d.id, "Koolmees").await;
    let c = card(&pool, d.id, "Pimpelmees").await;

    let now = Utc::now();
    // a: not due for a day, b: due a minute ago, c: never seen
    progress::record_review(&pool, "alice", a.id, Rating::Good, now).await.unwrap();
    progress::record_review(&pool, "alice", b.id, Rating::Again, now - Duration::minutes(2))
        .await
        .unwrap();

    let queue = progress::study_queue(&pool, "alice", d.id, now, 10).await.unwrap();
    let order: Vec<Uuid> = queue.iter().map(|q| q.card.id).collect();
    assert_eq!(order, vec![c.id, b.id, a.id]);
    assert!(queue[0].due && queue[1].due && !queue[2].due);
    assert_eq!(queue[2].progress.times_correct, 1);

    // Progress is per user
    let bob_queue = progress::study_queue(&pool, "bob", d.id, now, 10).await.unwrap();
    assert!(bob_queue.iter().all(|q| q.due && q.progress.times_seen == 0));
}

#[tokio::test]
async fn test_record_review_accumulates() {
    let pool = setup().await;
    let d = deck(&pool, "alice", "Vogels", false).await;
    let a = card(&pool, d.id, "Merel").await;
    let now = Utc::now();

    progress::record_review(&pool, "alice", a.id, Rating::Good, now).await.unwrap();
    let p = progress::record_review(&pool, "alice", a.id, Rating::Easy, now).await.unwrap();

    assert_eq!(p.times_seen, 2);
    assert_eq!(p.times_correct, 2);
    assert_eq!(p.last_rating, Some(Rating::Easy));
    let next = p.next_review.unwrap();
    assert!(next > now + Duration::days(3) && next <= now + Duration::days(4));
}

#[tokio::test]
async fn test_quota_reserve_and_release() {
    let pool = setup().await;
    let limits = QuotaLimits {
        free_bytes: 1000,
        pro_bytes: 5000,
        max_upload_bytes: 800,
    };

    assert_eq!(quota::reserve(&pool, "alice", 600, &limits).await.unwrap(), 600);
    let err = quota::reserve(&pool, "alice", 500, &limits).await.unwrap_err();
    assert!(matches!(err, Error::QuotaExceeded { needed: 500, available: 400 }));

    assert_eq!(quota::release(&pool, "alice", 600).await.unwrap(), 0);
    assert_eq!(quota::release(&pool, "alice", 100).await.unwrap(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_reserves_never_exceed_limit() {
    let temp = TempDir::new().unwrap();
    let pool = db::init_database(&temp.path().join("naturae.db")).await.unwrap();
    profiles::ensure_profile(&pool, "alice", None).await.unwrap();
    let limits = QuotaLimits {
        free_bytes: 1000,
        pro_bytes: 5000,
        max_upload_bytes: 800,
    };

    let mut tasks = tokio::task::JoinSet::new();
    for _ in 0..16 {
        let pool = pool.clone();
        tasks.spawn(async move { quota::reserve(&pool, "alice", 600, &limits).await });
    }

    let mut granted = 0;
    while let Some(result) = tasks.join_next().await {
        match result.unwrap() {
            Ok(_) => granted += 1,
            Err(Error::QuotaExceeded { needed, .. }) => assert_eq!(needed, 600),
            Err(other) => panic!("unexpected error: {other:?}"),
        }
    }

    assert_eq!(granted, 1);
    let profile = profiles::load_profile(&pool, "alice").await.unwrap().unwrap();
    assert_eq!(profile.storage_used_bytes, 600);
}
