//! Effective feature-tier resolution.
//!
//! Admin tier grants are checked strictly in order: card-level, then
//! user-level, then whatever the effective billing plan grants. An `until`
//! of `None` on a grant means it never expires.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::types::{Card, Tier, User};

use super::resolver::EffectiveBilling;

/// Which rule produced the effective tier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum TierSource {
    CardAdminTier,
    UserAdminTier,
    BillingDerived,
    /// Terminal free fallback. Billing resolution always yields a plan, so
    /// resolution never actually lands here; kept for totality.
    Default,
}

/// The single resolved feature-level truth for a card at a point in time.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EffectiveTier {
    pub tier: Tier,
    pub source: TierSource,
    /// When the winning grant expires, if it is time-bounded.
    pub until: Option<DateTime<Utc>>,
}

fn grant_is_live(until: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
    until.map_or(true, |u| u > now)
}

/// Resolve the effective tier for a card/user pair at `now`.
///
/// `user` is `None` for anonymous cards. Never fails; falls back to the
/// free tier.
#[must_use]
pub fn resolve_effective_tier(
    card: &Card,
    user: Option<&User>,
    effective_billing: &EffectiveBilling,
    now: DateTime<Utc>,
) -> EffectiveTier {
    if let Some(tier) = card.admin_tier {
        if grant_is_live(card.admin_tier_until, now) {
            return EffectiveTier {
                tier,
                source: TierSource::CardAdminTier,
                until: card.admin_tier_until,
            };
        }
    }

    if let Some(user) = user {
        if let Some(tier) = user.admin_tier {
            if grant_is_live(user.admin_tier_until, now) {
                return EffectiveTier {
                    tier,
                    source: TierSource::UserAdminTier,
                    until: user.admin_tier_until,
                };
            }
        }
    }

    EffectiveTier {
        tier: Tier::for_plan(effective_billing.plan),
        source: TierSource::BillingDerived,
        until: effective_billing.paid_until,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::billing::resolve_billing;
    use crate::types::Plan;
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_card_admin_tier_beats_user_admin_tier() {
        let now = t0();
        let mut card = Card::new("card_1");
        card.admin_tier = Some(Tier::Premium);
        card.admin_tier_until = Some(now + Duration::days(3));

        let mut user = User::new("user_1");
        user.admin_tier = Some(Tier::Basic);

        let billing = resolve_billing(&card, now);
        let eff = resolve_effective_tier(&card, Some(&user), &billing, now);
        assert_eq!(eff.tier, Tier::Premium);
        assert_eq!(eff.source, TierSource::CardAdminTier);
        assert_eq!(eff.until, Some(now + Duration::days(3)));
    }

    #[test]
    fn test_expired_card_grant_falls_through_to_user() {
        let now = t0();
        let mut card = Card::new("card_1");
        card.admin_tier = Some(Tier::Premium);
        card.admin_tier_until = Some(now - Duration::hours(1));

        let mut user = User::new("user_1");
        user.admin_tier = Some(Tier::Basic);

        let billing = resolve_billing(&card, now);
        let eff = resolve_effective_tier(&card, Some(&user), &billing, now);
        assert_eq!(eff.tier, Tier::Basic);
        assert_eq!(eff.source, TierSource::UserAdminTier);
    }

    #[test]
    fn test_unbounded_grant_is_always_live() {
        let now = t0();
        let mut card = Card::new("card_1");
        card.admin_tier = Some(Tier::Basic);
        card.admin_tier_until = None;

        let billing = resolve_billing(&card, now);
        let eff = resolve_effective_tier(&card, None, &billing, now + Duration::days(365));
        assert_eq!(eff.tier, Tier::Basic);
        assert_eq!(eff.source, TierSource::CardAdminTier);
        assert_eq!(eff.until, None);
    }

    #[test]
    fn test_billing_derived_tier() {
        let now = t0();
        let mut card = Card::new("card_1");
        card.plan = Plan::Yearly;

        let billing = resolve_billing(&card, now);
        let eff = resolve_effective_tier(&card, None, &billing, now);
        assert_eq!(eff.tier, Tier::Premium);
        assert_eq!(eff.source, TierSource::BillingDerived);

        card.plan = Plan::Monthly;
        let billing = resolve_billing(&card, now);
        assert_eq!(
            resolve_effective_tier(&card, None, &billing, now).tier,
            Tier::Basic
        );

        card.plan = Plan::Free;
        let billing = resolve_billing(&card, now);
        let eff = resolve_effective_tier(&card, None, &billing, now);
        assert_eq!(eff.tier, Tier::Free);
        assert_eq!(eff.source, TierSource::BillingDerived);
    }
}
