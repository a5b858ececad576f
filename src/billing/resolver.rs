//! Effective billing resolution.
//!
//! A card's billing truth can come from four places. Exactly one wins:
//! a live admin override beats the stored billing sub-document, which beats
//! the legacy `plan` field, which beats the free default.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::types::{BillingStatus, Card, Plan};

/// Which source produced the effective billing state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum BillingSource {
    AdminOverride,
    Billing,
    LegacyPlan,
}

/// The single resolved billing truth for a card at a point in time.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EffectiveBilling {
    pub status: BillingStatus,
    pub plan: Plan,
    pub paid_until: Option<DateTime<Utc>>,
    pub source: BillingSource,
    /// Paid right now: status is active and the paid period has not lapsed.
    pub is_paid: bool,
    /// Paid, or inside an active trial window.
    pub is_entitled: bool,
}

/// Resolve the effective billing state for `card` at `now`.
///
/// Never fails; a card with no billing data resolves to the free default
/// via its legacy plan field.
#[must_use]
pub fn resolve_billing(card: &Card, now: DateTime<Utc>) -> EffectiveBilling {
    let (status, plan, paid_until, source) = match &card.admin_override {
        Some(ov) if ov.is_live(now) => (
            BillingStatus::Active,
            ov.plan,
            Some(ov.until),
            BillingSource::AdminOverride,
        ),
        _ => match &card.billing {
            Some(billing) => (
                billing.status,
                billing.plan,
                billing.paid_until,
                BillingSource::Billing,
            ),
            None => {
                let status = if card.plan.is_paid() {
                    BillingStatus::Active
                } else {
                    BillingStatus::Free
                };
                (status, card.plan, None, BillingSource::LegacyPlan)
            }
        },
    };

    // An active status with no paid_until is paid indefinitely: data written
    // before paid periods were tracked has no end date.
    let is_paid =
        status == BillingStatus::Active && paid_until.map_or(true, |until| until > now);

    let in_trial_window = card.trial_ends_at.map_or(false, |ends| now < ends);
    let is_entitled = is_paid || in_trial_window;

    EffectiveBilling {
        status,
        plan,
        paid_until,
        source,
        is_paid,
        is_entitled,
    }
}
