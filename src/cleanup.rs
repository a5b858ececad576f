//! Periodic purge of trial-expired, unpaid cards.
//!
//! The sweep is an owned scheduler component: each instance holds its own
//! single-flight flag, so overlapping ticks are skipped rather than queued
//! and tests can construct independent jobs. Two processes sweeping at once
//! is accepted: object and document deletes are idempotent.
//!
//! Order of operations per card is storage first, document second. The
//! document is only removed once its objects are gone (or there was nothing
//! to remove); a failed removal leaves the card for the next sweep.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::time::{interval_at, Duration, Instant};
use tracing::{debug, info, warn};

use crate::billing::resolve_billing;
use crate::config::{CleanupConfig, StorageConfig};
use crate::storage::paths::{collect_card_paths, normalize_paths};
use crate::storage::ObjectStorage;
use crate::store::CardStore;
use crate::types::Card;

/// Outcome of one sweep.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SweepStats {
    /// Cards matched by the due query.
    pub scanned: usize,
    /// Cards (and their objects) permanently deleted.
    pub deleted: usize,
    /// Cards skipped because they were paid by processing time.
    pub skipped_paid: usize,
    /// Cards left in place because object removal failed.
    pub failed: usize,
}

/// Recurring sweep that destroys cards whose trial grace window has passed.
pub struct TrialCleanupJob<C, S>
where
    C: CardStore,
    S: ObjectStorage,
{
    cards: C,
    storage: S,
    config: CleanupConfig,
    storage_config: StorageConfig,
    running: AtomicBool,
}

impl<C, S> TrialCleanupJob<C, S>
where
    C: CardStore,
    S: ObjectStorage,
{
    pub fn new(cards: C, storage: S, config: CleanupConfig, storage_config: StorageConfig) -> Self {
        Self {
            cards,
            storage,
            config,
            storage_config,
            running: AtomicBool::new(false),
        }
    }

    /// Run one sweep at `now`. Returns `None` when another sweep is already
    /// in flight on this job instance.
    pub async fn sweep(&self, now: DateTime<Utc>) -> Option<SweepStats> {
        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!(target: "tapfolio::cleanup", "Sweep already in flight, skipping");
            return None;
        }

        let stats = self.run(now).await;
        self.running.store(false, Ordering::Release);

        info!(
            target: "tapfolio::cleanup",
            scanned = stats.scanned,
            deleted = stats.deleted,
            skipped_paid = stats.skipped_paid,
            failed = stats.failed,
            "Trial cleanup sweep finished"
        );
        Some(stats)
    }

    async fn run(&self, now: DateTime<Utc>) -> SweepStats {
        let mut stats = SweepStats::default();

        let due = match self.cards.list_trial_delete_due(now).await {
            Ok(cards) => cards,
            Err(err) => {
                warn!(target: "tapfolio::cleanup", error = %err, "Due-card query failed");
                return stats;
            }
        };
        stats.scanned = due.len();

        for card in due {
            // A card may have been paid between the query and processing.
            if resolve_billing(&card, now).is_paid {
                stats.skipped_paid += 1;
                continue;
            }

            match self.purge_card(&card).await {
                Ok(()) => stats.deleted += 1,
                Err(err) => {
                    stats.failed += 1;
                    warn!(
                        target: "tapfolio::cleanup",
                        card_id = %card.id,
                        error = %err,
                        "Purge failed; card left for next sweep"
                    );
                }
            }
        }

        stats
    }

    /// Remove a card's objects, then its document. The document survives
    /// any removal failure.
    async fn purge_card(&self, card: &Card) -> crate::error::Result<()> {
        let paths = normalize_paths(collect_card_paths(card));
        if !paths.is_empty() {
            let buckets = vec![
                self.storage_config.public_bucket.clone(),
                self.storage_config.anon_bucket.clone(),
            ];
            self.storage.remove_objects(&paths, &buckets).await?;
        }

        self.cards.delete_card(&card.id).await?;
        debug!(
            target: "tapfolio::cleanup",
            card_id = %card.id,
            objects = paths.len(),
            "Expired trial card deleted"
        );
        Ok(())
    }

    /// Spawn the periodic loop. The first sweep runs after the configured
    /// initial delay, then every `interval_secs`.
    pub fn start(self: Arc<Self>) -> tokio::task::JoinHandle<()>
    where
        C: 'static,
        S: 'static,
    {
        let period = Duration::from_secs(self.config.interval_secs.max(1));
        let first = Instant::now() + Duration::from_secs(self.config.initial_delay_secs);

        tokio::spawn(async move {
            info!(
                target: "tapfolio::cleanup",
                interval_secs = self.config.interval_secs,
                "Trial cleanup job started"
            );
            let mut ticker = interval_at(first, period);
            loop {
                ticker.tick().await;
                self.sweep(Utc::now()).await;
            }
        })
    }
}

/// Process-wide entry point: build and start the cleanup job at boot.
///
/// Returns the job handle so callers can trigger or inspect sweeps; the
/// spawned loop runs for the lifetime of the process, no explicit teardown
/// required. Honors `config.enabled`.
pub fn start_trial_cleanup_job<C, S>(
    cards: C,
    storage: S,
    config: CleanupConfig,
    storage_config: StorageConfig,
) -> Arc<TrialCleanupJob<C, S>>
where
    C: CardStore + 'static,
    S: ObjectStorage + 'static,
{
    let job = Arc::new(TrialCleanupJob::new(cards, storage, config, storage_config));
    if job.config.enabled {
        Arc::clone(&job).start();
    } else {
        info!(target: "tapfolio::cleanup", "Trial cleanup job disabled by config");
    }
    job
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryObjectStorage;
    use crate::store::InMemoryStore;
    use crate::types::{BillingInfo, BillingStatus, GalleryItem, Plan};
    use chrono::{Duration as ChronoDuration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap()
    }

    fn job(
        store: &InMemoryStore,
        storage: &InMemoryObjectStorage,
    ) -> TrialCleanupJob<InMemoryStore, InMemoryObjectStorage> {
        TrialCleanupJob::new(
            store.clone(),
            storage.clone(),
            CleanupConfig::default(),
            StorageConfig::default(),
        )
    }

    /// A trial card that became delete-due before `now`, holding `paths`.
    async fn seed_due_card(
        store: &InMemoryStore,
        storage: &InMemoryObjectStorage,
        id: &str,
        now: DateTime<Utc>,
        paths: &[&str],
    ) -> Card {
        let mut card = Card::new(id);
        card.trial_started_at = Some(now - ChronoDuration::days(15));
        card.trial_ends_at = Some(now - ChronoDuration::days(8));
        card.trial_delete_at = Some(now - ChronoDuration::days(1));
        for (i, path) in paths.iter().enumerate() {
            storage.put("tapfolio-public", path, vec![i as u8]);
            storage.put("tapfolio-anon", path, vec![i as u8]);
            card.gallery.push(GalleryItem {
                path: Some((*path).to_string()),
                ..GalleryItem::default()
            });
        }
        store.save_card(&card).await.unwrap();
        card
    }

    #[tokio::test]
    async fn test_sweep_deletes_due_unpaid_cards_and_objects() {
        let store = InMemoryStore::new();
        let storage = InMemoryObjectStorage::new();
        let now = t0();
        seed_due_card(
            &store,
            &storage,
            "card_due",
            now,
            &["cards/anon/h/card_due/gallery/a.jpg", "cards/anon/h/card_due/gallery/b.jpg"],
        )
        .await;

        let stats = job(&store, &storage).sweep(now).await.unwrap();
        assert_eq!(stats.scanned, 1);
        assert_eq!(stats.deleted, 1);
        assert_eq!(stats.failed, 0);

        assert!(store.get_card("card_due").await.unwrap().is_none());
        assert_eq!(storage.object_count("tapfolio-public"), 0);
        assert_eq!(storage.object_count("tapfolio-anon"), 0);
    }

    #[tokio::test]
    async fn test_sweep_skips_cards_paid_since_query() {
        let store = InMemoryStore::new();
        let storage = InMemoryObjectStorage::new();
        let now = t0();
        let mut card = seed_due_card(&store, &storage, "card_paid", now, &[]).await;
        card.billing = Some(BillingInfo {
            status: BillingStatus::Active,
            plan: Plan::Monthly,
            paid_until: Some(now + ChronoDuration::days(30)),
            ..BillingInfo::default()
        });
        store.save_card(&card).await.unwrap();

        let stats = job(&store, &storage).sweep(now).await.unwrap();
        assert_eq!(stats.scanned, 1);
        assert_eq!(stats.skipped_paid, 1);
        assert_eq!(stats.deleted, 0);
        assert!(store.get_card("card_paid").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_removal_failure_keeps_document_for_next_sweep() {
        let store = InMemoryStore::new();
        let storage = InMemoryObjectStorage::new();
        let now = t0();
        seed_due_card(
            &store,
            &storage,
            "card_due",
            now,
            &["cards/anon/h/card_due/gallery/a.jpg"],
        )
        .await;
        storage.fail_removals(true);

        let sweep_job = job(&store, &storage);
        let stats = sweep_job.sweep(now).await.unwrap();
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.deleted, 0);
        assert!(store.get_card("card_due").await.unwrap().is_some());

        // Storage recovers; the next sweep finishes the purge.
        storage.fail_removals(false);
        let stats = sweep_job.sweep(now).await.unwrap();
        assert_eq!(stats.deleted, 1);
        assert!(store.get_card("card_due").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_card_with_nothing_to_remove_is_deleted() {
        let store = InMemoryStore::new();
        let storage = InMemoryObjectStorage::new();
        let now = t0();
        // References only a path outside the namespace; nothing deletable.
        let mut card = seed_due_card(&store, &storage, "card_odd", now, &[]).await;
        card.design.avatar_path = Some("../secrets".to_string());
        store.save_card(&card).await.unwrap();
        // Even with removals failing there is nothing to remove.
        storage.fail_removals(true);

        let stats = job(&store, &storage).sweep(now).await.unwrap();
        assert_eq!(stats.deleted, 1);
        assert!(store.get_card("card_odd").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_sweep_is_single_flight() {
        let store = InMemoryStore::new();
        let storage = InMemoryObjectStorage::new();
        let now = t0();
        seed_due_card(&store, &storage, "card_due", now, &[]).await;

        let sweep_job = job(&store, &storage);
        sweep_job.running.store(true, Ordering::Release);
        assert_eq!(sweep_job.sweep(now).await, None);
        assert!(store.get_card("card_due").await.unwrap().is_some());

        sweep_job.running.store(false, Ordering::Release);
        assert!(sweep_job.sweep(now).await.is_some());
    }

    #[tokio::test]
    async fn test_cards_not_yet_due_are_untouched() {
        let store = InMemoryStore::new();
        let storage = InMemoryObjectStorage::new();
        let now = t0();

        let mut card = Card::new("card_fresh");
        card.trial_started_at = Some(now);
        card.trial_ends_at = Some(now + ChronoDuration::days(7));
        card.trial_delete_at = Some(now + ChronoDuration::days(14));
        store.save_card(&card).await.unwrap();

        let stats = job(&store, &storage).sweep(now).await.unwrap();
        assert_eq!(stats.scanned, 0);
        assert!(store.get_card("card_fresh").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_start_trial_cleanup_job_returns_usable_handle() {
        let store = InMemoryStore::new();
        let storage = InMemoryObjectStorage::new();

        let config = CleanupConfig {
            enabled: false,
            ..CleanupConfig::default()
        };
        let handle =
            start_trial_cleanup_job(store.clone(), storage, config, StorageConfig::default());
        // Disabled job spawns no loop but can still sweep on demand.
        assert!(handle.sweep(t0()).await.is_some());
    }
}
