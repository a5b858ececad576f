//! Trial lifecycle state machine.
//!
//! Cards start a fixed 7-day trial on their first authenticated write,
//! followed by a 7-day grace window before the card becomes eligible for
//! permanent deletion. Paid cards are immune to every check here.
//!
//! All functions take an explicit `now` so callers (and tests) control the
//! clock. [`ensure_trial_started`] is the only mutating function and is
//! idempotent: calling it twice never restarts or reshapes a trial window.

use chrono::{DateTime, Duration, Utc};

use crate::billing::resolve_billing;
use crate::error::{Result, TapfolioError};
use crate::types::{BillingInfo, BillingStatus, Card, Plan};

/// Length of the trial window, in days.
pub const TRIAL_DAYS: i64 = 7;

/// Grace period between trial end and deletion eligibility, in days.
pub const GRACE_DAYS: i64 = 7;

/// The three trial milestones, computed together.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TrialDates {
    pub started: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub delete_at: DateTime<Utc>,
}

/// Compute the trial milestones for a trial starting at `now`.
#[must_use]
pub fn compute_trial_dates(now: DateTime<Utc>) -> TrialDates {
    let ends_at = now + Duration::days(TRIAL_DAYS);
    TrialDates {
        started: now,
        ends_at,
        delete_at: ends_at + Duration::days(GRACE_DAYS),
    }
}

/// Start the card's trial if it has not started yet.
///
/// Returns whether the document changed and needs persisting. No-op for
/// paid cards. Existing trial fields are never overwritten; a card with a
/// complete trial window only gets its `billing.status` normalized from
/// `free` to `trial` if an earlier write left it stale.
pub fn ensure_trial_started(card: &mut Card, now: DateTime<Utc>) -> bool {
    if resolve_billing(card, now).is_paid {
        return false;
    }

    if card.has_trial_fields() {
        if let Some(billing) = &mut card.billing {
            if billing.status == BillingStatus::Free {
                billing.status = BillingStatus::Trial;
            }
        }
        return false;
    }

    // Fill only the missing milestones, anchoring each on whatever is
    // already present so a partially stamped card keeps its window.
    let started = card.trial_started_at.unwrap_or(now);
    let ends_at = card
        .trial_ends_at
        .unwrap_or(started + Duration::days(TRIAL_DAYS));
    let delete_at = card
        .trial_delete_at
        .unwrap_or(ends_at + Duration::days(GRACE_DAYS));

    card.trial_started_at = Some(started);
    card.trial_ends_at = Some(ends_at);
    card.trial_delete_at = Some(delete_at);

    match &mut card.billing {
        Some(billing) => {
            billing.status = BillingStatus::Trial;
            if billing.plan == Plan::Free && card.plan != Plan::Free {
                billing.plan = card.plan;
            }
        }
        None => {
            card.billing = Some(BillingInfo {
                status: BillingStatus::Trial,
                plan: card.plan,
                ..BillingInfo::default()
            });
        }
    }

    tracing::info!(
        target: "tapfolio::trial",
        card_id = %card.id,
        trial_ends_at = %ends_at,
        "Trial started"
    );

    true
}

/// Gate for all write operations: fails with [`TapfolioError::TrialExpired`]
/// when an unpaid card's trial window has passed.
pub fn assert_not_locked(card: &Card, now: DateTime<Utc>) -> Result<()> {
    if resolve_billing(card, now).is_paid {
        return Ok(());
    }

    match card.trial_ends_at {
        Some(ends_at) if now >= ends_at => Err(TapfolioError::TrialExpired),
        _ => Ok(()),
    }
}

/// Read-time counterpart of [`assert_not_locked`]: whether an unpaid card's
/// trial has expired. Same threshold, no error.
#[must_use]
pub fn is_trial_expired(card: &Card, now: DateTime<Utc>) -> bool {
    if resolve_billing(card, now).is_paid {
        return false;
    }
    card.trial_ends_at.map_or(false, |ends_at| now >= ends_at)
}

/// Whether an unpaid card has passed its deletion milestone and may be
/// permanently destroyed.
#[must_use]
pub fn is_trial_delete_due(card: &Card, now: DateTime<Utc>) -> bool {
    if resolve_billing(card, now).is_paid {
        return false;
    }
    card.trial_delete_at
        .map_or(false, |delete_at| now >= delete_at)
}
