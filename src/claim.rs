//! Anonymous-to-user card claim and media migration.
//!
//! Claiming attaches a card held by an anonymous visitor to a freshly
//! registered user, moving every stored object into the user's namespace in
//! the public bucket and rewriting the document's paths and URLs.
//!
//! The workflow has no transaction to lean on. Correctness comes from
//! strict ordering: all storage copies happen before any document write,
//! so a failure at any point leaves the documents untouched and the claim
//! retryable. A crash between copy and commit strands unreferenced new
//! objects, which is harmless; the reverse (a committed card pointing at
//! missing media) cannot happen.

use std::collections::BTreeMap;

use axum::http::StatusCode;
use tracing::{debug, info, warn};

use crate::config::StorageConfig;
use crate::error::TapfolioError;
use crate::storage::paths::{collect_card_paths, normalize_paths, rewrite_to_user_namespace};
use crate::storage::ObjectStorage;
use crate::store::{CardStore, UserStore};
use crate::types::Card;

/// Successful claim results.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ClaimOutcome {
    /// The card now belongs to the user and its media has been migrated.
    Claimed {
        card_id: String,
        migrated_objects: usize,
    },
    /// The user already owns a card; repeating a successful claim lands
    /// here and never triggers a second migration.
    AlreadyHasCard { card_id: String },
    /// Nothing to do: non-strict claim without a visitor token.
    NothingToClaim,
}

/// Claim failures. Most of these are expected control flow rather than
/// genuine faults, which is why the workflow returns them instead of
/// throwing past the core boundary.
#[derive(Debug, thiserror::Error)]
pub enum ClaimError {
    #[error("Acting user is missing or unknown")]
    Unauthorized,

    #[error("Claim requires a visitor token")]
    MissingAnonId,

    #[error("User already has a card")]
    UserAlreadyHasCard,

    #[error("No anonymous card found for this visitor")]
    NoAnonCard,

    #[error("Card already belongs to another user")]
    CardAlreadyClaimed,

    /// A storage copy failed. The card and user documents are guaranteed
    /// unmodified; the claim can be retried.
    #[error("Media migration failed: {0}")]
    MediaMigrationFailed(String),

    #[error(transparent)]
    Store(#[from] TapfolioError),
}

impl ClaimError {
    /// Stable code string for this error, translated 1:1 by the HTTP layer.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Unauthorized => "UNAUTHORIZED",
            Self::MissingAnonId => "MISSING_ANON_ID",
            Self::UserAlreadyHasCard => "USER_ALREADY_HAS_CARD",
            Self::NoAnonCard => "NO_ANON_CARD",
            Self::CardAlreadyClaimed => "CARD_ALREADY_CLAIMED",
            Self::MediaMigrationFailed(_) => "MEDIA_MIGRATION_FAILED",
            Self::Store(inner) => inner.code(),
        }
    }

    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::MissingAnonId => StatusCode::BAD_REQUEST,
            Self::UserAlreadyHasCard | Self::CardAlreadyClaimed => StatusCode::CONFLICT,
            Self::NoAnonCard => StatusCode::NOT_FOUND,
            Self::MediaMigrationFailed(_) => StatusCode::BAD_GATEWAY,
            Self::Store(inner) => inner.status_code(),
        }
    }
}

/// One migrated object: where it was and where it now lives.
struct MigratedObject {
    old_path: String,
    new_path: String,
    source_bucket: String,
}

/// Orchestrates the claim workflow over the persistence and storage
/// collaborators.
pub struct ClaimService<C, U, S>
where
    C: CardStore,
    U: UserStore,
    S: ObjectStorage,
{
    cards: C,
    users: U,
    storage: S,
    config: StorageConfig,
}

impl<C, U, S> ClaimService<C, U, S>
where
    C: CardStore,
    U: UserStore,
    S: ObjectStorage,
{
    pub fn new(cards: C, users: U, storage: S, config: StorageConfig) -> Self {
        Self {
            cards,
            users,
            storage,
            config,
        }
    }

    /// Claim the anonymous card identified by `anonymous_id` for `user_id`.
    ///
    /// In strict mode, every precondition failure is an error; in
    /// non-strict mode the "nothing to do" cases collapse into successful
    /// no-ops. Repeating a successful claim always returns
    /// [`ClaimOutcome::AlreadyHasCard`].
    pub async fn claim(
        &self,
        user_id: &str,
        anonymous_id: Option<&str>,
        strict: bool,
    ) -> Result<ClaimOutcome, ClaimError> {
        if user_id.trim().is_empty() {
            return Err(ClaimError::Unauthorized);
        }

        let anonymous_id = match anonymous_id.map(str::trim) {
            Some(id) if !id.is_empty() => id,
            _ if strict => return Err(ClaimError::MissingAnonId),
            _ => return Ok(ClaimOutcome::NothingToClaim),
        };

        let mut user = self
            .users
            .get_user(user_id)
            .await?
            .ok_or(ClaimError::Unauthorized)?;

        if let Some(card_id) = &user.card_id {
            if strict {
                return Err(ClaimError::UserAlreadyHasCard);
            }
            return Ok(ClaimOutcome::AlreadyHasCard {
                card_id: card_id.clone(),
            });
        }

        let mut card = self
            .cards
            .find_card_by_anonymous_id(anonymous_id)
            .await?
            .ok_or(ClaimError::NoAnonCard)?;

        if card.user.is_some() {
            return Err(ClaimError::CardAlreadyClaimed);
        }

        // Storage first, documents second. Nothing below may touch the
        // stores until every object has landed in the public bucket.
        let migrated = self.migrate_media(&card, user_id).await?;

        if !migrated.is_empty() {
            let mapping: BTreeMap<String, String> = migrated
                .iter()
                .map(|m| (m.old_path.clone(), m.new_path.clone()))
                .collect();
            rewrite_card_references(&mut card, &mapping, &|path| {
                self.storage.public_url(&self.config.public_bucket, path)
            });
        }

        // Ownership switch. A unique-constraint conflict here means another
        // claim for this user won the race; the new objects we copied are
        // unreferenced and will age out, so the loss is clean.
        card.user = Some(user_id.to_string());
        card.anonymous_id = None;
        match self.cards.save_card(&card).await {
            Ok(()) => {}
            Err(TapfolioError::Conflict(_)) => return Err(ClaimError::UserAlreadyHasCard),
            Err(err) => return Err(err.into()),
        }

        user.card_id = Some(card.id.clone());
        self.users.save_user(&user).await?;

        info!(
            target: "tapfolio::claim",
            user_id = %user_id,
            card_id = %card.id,
            migrated_objects = migrated.len(),
            "Card claimed"
        );

        // Best-effort cleanup of the pre-migration objects. Failures are
        // swallowed: no surviving reference points at them.
        self.cleanup_old_objects(&migrated).await;

        Ok(ClaimOutcome::Claimed {
            card_id: card.id,
            migrated_objects: migrated.len(),
        })
    }

    /// Copy every referenced object into the user's namespace in the public
    /// bucket. Aborts on the first failure, before any document write.
    async fn migrate_media(
        &self,
        card: &Card,
        user_id: &str,
    ) -> Result<Vec<MigratedObject>, ClaimError> {
        let mut migrated = Vec::new();

        for old_path in collect_card_paths(card) {
            let Some(new_path) = rewrite_to_user_namespace(&old_path, user_id) else {
                // Paths outside the namespace convention are carried over
                // verbatim; there is nothing to copy.
                debug!(
                    target: "tapfolio::claim",
                    card_id = %card.id,
                    path = %old_path,
                    "Path does not follow the namespace convention, leaving as-is"
                );
                continue;
            };
            if new_path == old_path {
                continue;
            }

            // The object normally lives in the anon-private bucket; older
            // cards uploaded straight to the public bucket.
            let source_bucket = match self
                .storage
                .copy_between_buckets(
                    &self.config.anon_bucket,
                    &self.config.public_bucket,
                    &old_path,
                    &new_path,
                )
                .await
            {
                Ok(()) => self.config.anon_bucket.clone(),
                Err(_) => {
                    self.storage
                        .copy_between_buckets(
                            &self.config.public_bucket,
                            &self.config.public_bucket,
                            &old_path,
                            &new_path,
                        )
                        .await
                        .map_err(|err| ClaimError::MediaMigrationFailed(err.to_string()))?;
                    self.config.public_bucket.clone()
                }
            };

            migrated.push(MigratedObject {
                old_path,
                new_path,
                source_bucket,
            });
        }

        Ok(migrated)
    }

    async fn cleanup_old_objects(&self, migrated: &[MigratedObject]) {
        if migrated.is_empty() {
            return;
        }

        let mut by_bucket: BTreeMap<&str, Vec<String>> = BTreeMap::new();
        for object in migrated {
            by_bucket
                .entry(object.source_bucket.as_str())
                .or_default()
                .push(object.old_path.clone());
        }

        for (bucket, paths) in by_bucket {
            let safe_paths = normalize_paths(paths);
            if safe_paths.is_empty() {
                continue;
            }
            let buckets = vec![bucket.to_string()];
            if let Err(err) = self.storage.remove_objects(&safe_paths, &buckets).await {
                warn!(
                    target: "tapfolio::claim",
                    bucket = %bucket,
                    count = safe_paths.len(),
                    error = %err,
                    "Failed to remove pre-migration objects; they are unreferenced and will linger"
                );
            }
        }
    }
}

/// Swap every path reference on the card to its migrated location and
/// recompute the paired URL fields. URLs are always rebuilt from the new
/// path, never reused.
fn rewrite_card_references(
    card: &mut Card,
    mapping: &BTreeMap<String, String>,
    public_url: &dyn Fn(&str) -> String,
) {
    let rewrite = |path: &mut Option<String>, url: &mut Option<String>| {
        if let Some(p) = path {
            if let Some(new_path) = mapping.get(p) {
                *url = Some(public_url(new_path));
                *path = Some(new_path.clone());
            }
        }
    };

    let design = &mut card.design;
    rewrite(&mut design.background_path, &mut design.background_url);
    rewrite(
        &mut design.background_thumb_path,
        &mut design.background_thumb_url,
    );
    rewrite(&mut design.avatar_path, &mut design.avatar_url);
    rewrite(&mut design.logo_path, &mut design.logo_url);

    for item in &mut card.gallery {
        rewrite(&mut item.path, &mut item.url);
        rewrite(&mut item.thumb_path, &mut item.thumb_url);
    }

    for upload in &mut card.uploads {
        if let Some(new_path) = mapping.get(&upload.path) {
            upload.url = public_url(new_path);
            upload.path = new_path.clone();
        }
    }
}
