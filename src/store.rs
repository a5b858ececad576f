//! Persistence traits for card and user documents.
//!
//! Implement these against your database. The contract is atomic
//! single-document upserts plus a unique constraint on `Card.user`; no
//! multi-document transactions are assumed anywhere in the core. An
//! in-memory backend is provided for development and testing.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::types::{Card, User};

/// Trait for storing card documents.
#[async_trait]
pub trait CardStore: Send + Sync {
    /// Get a card by ID.
    async fn get_card(&self, card_id: &str) -> Result<Option<Card>>;

    /// Find the card held by an anonymous visitor token.
    async fn find_card_by_anonymous_id(&self, anonymous_id: &str) -> Result<Option<Card>>;

    /// Upsert a card document atomically.
    ///
    /// Implementations must enforce a unique constraint on `Card.user` and
    /// surface a violation as [`TapfolioError::Conflict`]; the claim
    /// workflow relies on that as its last line of defense against
    /// concurrent claims.
    ///
    /// [`TapfolioError::Conflict`]: crate::error::TapfolioError::Conflict
    async fn save_card(&self, card: &Card) -> Result<()>;

    /// Permanently delete a card document. Deleting a missing card is a
    /// no-op.
    async fn delete_card(&self, card_id: &str) -> Result<()>;

    /// All cards whose `trial_delete_at` milestone is set and has passed.
    async fn list_trial_delete_due(&self, now: DateTime<Utc>) -> Result<Vec<Card>>;
}

/// Trait for storing user documents.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Get a user by ID.
    async fn get_user(&self, user_id: &str) -> Result<Option<User>>;

    /// Upsert a user document atomically.
    async fn save_user(&self, user: &User) -> Result<()>;
}

pub use memory::InMemoryStore;

/// In-memory card/user store for development and testing.
pub mod memory {
    use std::collections::HashMap;
    use std::sync::{Arc, RwLock};

    use super::*;
    use crate::error::TapfolioError;

    #[derive(Default)]
    struct Inner {
        cards: RwLock<HashMap<String, Card>>,
        users: RwLock<HashMap<String, User>>,
    }

    /// In-memory store implementing both [`CardStore`] and [`UserStore`].
    ///
    /// Wraps data in `Arc` for cheap cloning.
    #[derive(Clone, Default)]
    pub struct InMemoryStore {
        inner: Arc<Inner>,
    }

    impl InMemoryStore {
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        /// Number of stored cards (for tests).
        #[must_use]
        pub fn card_count(&self) -> usize {
            self.inner.cards.read().unwrap().len()
        }
    }

    #[async_trait]
    impl CardStore for InMemoryStore {
        async fn get_card(&self, card_id: &str) -> Result<Option<Card>> {
            Ok(self.inner.cards.read().unwrap().get(card_id).cloned())
        }

        async fn find_card_by_anonymous_id(&self, anonymous_id: &str) -> Result<Option<Card>> {
            Ok(self
                .inner
                .cards
                .read()
                .unwrap()
                .values()
                .find(|c| c.anonymous_id.as_deref() == Some(anonymous_id))
                .cloned())
        }

        async fn save_card(&self, card: &Card) -> Result<()> {
            if card.id.trim().is_empty() {
                return Err(TapfolioError::invalid_card("missing id"));
            }

            let mut cards = self.inner.cards.write().unwrap();

            // Unique constraint on the owner reference.
            if let Some(owner) = &card.user {
                let taken = cards
                    .values()
                    .any(|c| c.id != card.id && c.user.as_deref() == Some(owner.as_str()));
                if taken {
                    return Err(TapfolioError::conflict(format!(
                        "user already owns a card: {owner}"
                    )));
                }
            }

            cards.insert(card.id.clone(), card.clone());
            Ok(())
        }

        async fn delete_card(&self, card_id: &str) -> Result<()> {
            self.inner.cards.write().unwrap().remove(card_id);
            Ok(())
        }

        async fn list_trial_delete_due(&self, now: DateTime<Utc>) -> Result<Vec<Card>> {
            Ok(self
                .inner
                .cards
                .read()
                .unwrap()
                .values()
                .filter(|c| c.trial_delete_at.map_or(false, |at| now >= at))
                .cloned()
                .collect())
        }
    }

    #[async_trait]
    impl UserStore for InMemoryStore {
        async fn get_user(&self, user_id: &str) -> Result<Option<User>> {
            Ok(self.inner.users.read().unwrap().get(user_id).cloned())
        }

        async fn save_user(&self, user: &User) -> Result<()> {
            self.inner
                .users
                .write()
                .unwrap()
                .insert(user.id.clone(), user.clone());
            Ok(())
        }
    }
}
