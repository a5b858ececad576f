//! End-to-end claim flow over the in-memory backends: upload as an
//! anonymous visitor, register, claim, and verify the migrated state.

use tapfolio::claim::{ClaimError, ClaimOutcome, ClaimService};
use tapfolio::storage::paths::{anon_object_path, collect_card_paths};
use tapfolio::storage::{InMemoryObjectStorage, ObjectStorage};
use tapfolio::store::{CardStore, InMemoryStore, UserStore};
use tapfolio::types::{Card, GalleryItem, UploadRecord, User};
use tapfolio::StorageConfig;

use chrono::Utc;

const ANON_ID: &str = "device-7f3a";

struct World {
    store: InMemoryStore,
    storage: InMemoryObjectStorage,
    service: ClaimService<InMemoryStore, InMemoryStore, InMemoryObjectStorage>,
    config: StorageConfig,
}

impl World {
    fn new() -> Self {
        let store = InMemoryStore::new();
        let storage = InMemoryObjectStorage::new();
        let config = StorageConfig::default();
        let service = ClaimService::new(
            store.clone(),
            store.clone(),
            storage.clone(),
            config.clone(),
        );
        Self {
            store,
            storage,
            service,
            config,
        }
    }

    /// Upload an object the way the (out-of-scope) upload endpoint would:
    /// into the anon bucket under the visitor's namespace, recorded on the
    /// card's audit list.
    async fn upload_for_card(&self, card: &mut Card, kind: &str, ext: &str, data: &[u8]) -> String {
        let path = anon_object_path(ANON_ID, &card.id, kind, ext);
        let stored = self
            .storage
            .upload(data.to_vec(), "image/jpeg", &path, &self.config.anon_bucket, false)
            .await
            .unwrap();
        card.uploads.push(UploadRecord {
            kind: kind.to_string(),
            path: stored.path.clone(),
            url: stored.url,
            created_at: Utc::now(),
        });
        stored.path
    }
}

async fn seed_card_with_media(world: &World) -> Card {
    let mut card = Card::anonymous("card_42", ANON_ID);

    let avatar = world.upload_for_card(&mut card, "avatar", "png", b"avatar").await;
    let photo = world.upload_for_card(&mut card, "gallery", "jpg", b"photo").await;
    let thumb = world
        .upload_for_card(&mut card, "gallerythumb", "jpg", b"thumb")
        .await;

    card.design.avatar_path = Some(avatar);
    card.gallery.push(GalleryItem {
        path: Some(photo),
        thumb_path: Some(thumb),
        url: None,
        thumb_url: None,
    });

    world.store.save_card(&card).await.unwrap();
    card
}

#[tokio::test]
async fn claim_moves_every_object_without_loss() {
    let world = World::new();
    let card = seed_card_with_media(&world).await;
    let referenced_before = collect_card_paths(&card).len();
    world.store.save_user(&User::new("user_9")).await.unwrap();

    let outcome = world
        .service
        .claim("user_9", Some(ANON_ID), true)
        .await
        .unwrap();
    assert!(matches!(outcome, ClaimOutcome::Claimed { .. }));

    let card = world.store.get_card("card_42").await.unwrap().unwrap();
    assert_eq!(card.user.as_deref(), Some("user_9"));
    assert_eq!(card.anonymous_id, None);

    // Same number of references as before, all under the user namespace,
    // all independently downloadable from the public bucket.
    let paths = collect_card_paths(&card);
    assert_eq!(paths.len(), referenced_before);
    for path in &paths {
        assert!(
            path.starts_with("cards/user/user_9/card_42/"),
            "unexpected path: {path}"
        );
        world
            .storage
            .read(&world.config.public_bucket, path)
            .await
            .expect("migrated object must be downloadable");
    }

    // URL fields were rebuilt from the new paths, not reused.
    let avatar_path = card.design.avatar_path.as_deref().unwrap();
    assert_eq!(
        card.design.avatar_url.as_deref().unwrap(),
        world
            .storage
            .public_url(&world.config.public_bucket, avatar_path)
    );
    for item in &card.gallery {
        let url = item.url.as_deref().unwrap();
        assert!(url.contains("cards/user/user_9/"));
    }

    // The anon bucket is empty; nothing points at the old locations.
    assert_eq!(world.storage.object_count(&world.config.anon_bucket), 0);

    let user = world.store.get_user("user_9").await.unwrap().unwrap();
    assert_eq!(user.card_id.as_deref(), Some("card_42"));
}

#[tokio::test]
async fn repeat_claim_is_a_stable_no_op() {
    let world = World::new();
    seed_card_with_media(&world).await;
    world.store.save_user(&User::new("user_9")).await.unwrap();

    world
        .service
        .claim("user_9", Some(ANON_ID), true)
        .await
        .unwrap();
    let card_after_first = world.store.get_card("card_42").await.unwrap().unwrap();
    let public_count = world.storage.object_count(&world.config.public_bucket);

    let second = world
        .service
        .claim("user_9", Some(ANON_ID), false)
        .await
        .unwrap();
    assert_eq!(
        second,
        ClaimOutcome::AlreadyHasCard {
            card_id: "card_42".to_string()
        }
    );

    // Media and ownership state are byte-identical after the repeat.
    assert_eq!(
        world.store.get_card("card_42").await.unwrap().unwrap(),
        card_after_first
    );
    assert_eq!(
        world.storage.object_count(&world.config.public_bucket),
        public_count
    );
}

#[tokio::test]
async fn failed_migration_aborts_before_any_document_write() {
    let world = World::new();
    let original = seed_card_with_media(&world).await;
    world.store.save_user(&User::new("user_9")).await.unwrap();

    let victim = original.gallery[0].path.clone().unwrap();
    world.storage.fail_copies_of(&victim);

    let err = world
        .service
        .claim("user_9", Some(ANON_ID), true)
        .await
        .unwrap_err();
    assert!(matches!(err, ClaimError::MediaMigrationFailed(_)));
    assert_eq!(err.code(), "MEDIA_MIGRATION_FAILED");

    // Documents untouched, claim retryable.
    let card = world.store.get_card("card_42").await.unwrap().unwrap();
    assert_eq!(card, original);
    let user = world.store.get_user("user_9").await.unwrap().unwrap();
    assert!(user.card_id.is_none());

    world.storage.clear_copy_failures();
    let outcome = world
        .service
        .claim("user_9", Some(ANON_ID), true)
        .await
        .unwrap();
    assert!(matches!(outcome, ClaimOutcome::Claimed { .. }));
}

#[tokio::test]
async fn two_users_cannot_claim_the_same_card() {
    let world = World::new();
    seed_card_with_media(&world).await;
    world.store.save_user(&User::new("user_a")).await.unwrap();
    world.store.save_user(&User::new("user_b")).await.unwrap();

    world
        .service
        .claim("user_a", Some(ANON_ID), true)
        .await
        .unwrap();

    // The anonymous token no longer matches any card: the loser of the
    // race sees nothing to claim.
    let err = world
        .service
        .claim("user_b", Some(ANON_ID), true)
        .await
        .unwrap_err();
    assert!(matches!(err, ClaimError::NoAnonCard));
}
