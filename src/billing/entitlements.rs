//! Entitlement calculation.
//!
//! Combines the effective billing and tier into the final capability set
//! the HTTP layer ships to clients. Feature availability per plan lives in
//! a static table; tiers map onto plan feature sets via
//! [`Tier::feature_plan`](crate::types::Tier::feature_plan).

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::types::{BillingStatus, Card, Plan, Tier};

use super::resolver::EffectiveBilling;
use super::tier::EffectiveTier;

/// Maximum number of gallery items per card. Global, not tier-dependent.
pub const GALLERY_LIMIT: u32 = 10;

/// Feature switches granted by a plan.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PlanFeatures {
    pub lead_form: bool,
    pub video: bool,
    pub reviews: bool,
}

impl PlanFeatures {
    /// Static feature table.
    #[must_use]
    pub fn for_plan(plan: Plan) -> Self {
        match plan {
            Plan::Free => Self {
                lead_form: false,
                video: false,
                reviews: false,
            },
            Plan::Monthly => Self {
                lead_form: true,
                video: false,
                reviews: false,
            },
            Plan::Yearly => Self {
                lead_form: true,
                video: true,
                reviews: true,
            },
        }
    }
}

/// Why a card is locked for editing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum LockedReason {
    #[serde(rename = "TRIAL_EXPIRED")]
    TrialExpired,
}

/// Depth of analytics available to a card.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalyticsLevel {
    None,
    /// Premium-depth preview for cards inside an active unpaid trial.
    Demo,
    Basic,
    Premium,
}

impl AnalyticsLevel {
    /// Days of analytics history retained at this level.
    #[must_use]
    pub fn retention_days(&self) -> u32 {
        match self {
            Self::Premium | Self::Demo => 30,
            Self::Basic => 7,
            Self::None => 0,
        }
    }
}

/// Design customization switches.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DesignEntitlements {
    pub custom_colors: bool,
    pub custom_fonts: bool,
}

/// The final, UI-facing capability set for a card.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Entitlements {
    pub can_edit: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locked_reason: Option<LockedReason>,
    pub gallery_limit: u32,
    pub can_upload_gallery: bool,
    pub can_use_leads: bool,
    pub can_use_video: bool,
    pub can_use_reviews: bool,
    pub analytics_level: AnalyticsLevel,
    pub can_view_analytics: bool,
    pub analytics_retention_days: u32,
    pub design: DesignEntitlements,
}

/// Compute the entitlement set for a card at `now`.
///
/// Pure; both resolved inputs must have been computed for the same `now`.
#[must_use]
pub fn compute_entitlements(
    card: &Card,
    effective_billing: &EffectiveBilling,
    effective_tier: &EffectiveTier,
    now: DateTime<Utc>,
) -> Entitlements {
    let can_edit = effective_billing.is_entitled;

    let trial_has_ended = card.trial_ends_at.map_or(false, |ends| now >= ends);
    let locked_reason = if !can_edit && trial_has_ended {
        Some(LockedReason::TrialExpired)
    } else {
        None
    };

    let features = PlanFeatures::for_plan(effective_tier.tier.feature_plan());

    let in_unpaid_trial = effective_billing.status == BillingStatus::Trial
        && effective_billing.is_entitled
        && !effective_billing.is_paid;
    let analytics_level = match effective_tier.tier {
        Tier::Premium => AnalyticsLevel::Premium,
        Tier::Basic => AnalyticsLevel::Basic,
        Tier::Free if in_unpaid_trial => AnalyticsLevel::Demo,
        Tier::Free => AnalyticsLevel::None,
    };

    Entitlements {
        can_edit,
        locked_reason,
        gallery_limit: GALLERY_LIMIT,
        can_upload_gallery: can_edit && GALLERY_LIMIT > 0,
        can_use_leads: features.lead_form,
        can_use_video: features.video,
        can_use_reviews: features.reviews,
        analytics_level,
        can_view_analytics: analytics_level != AnalyticsLevel::None,
        analytics_retention_days: analytics_level.retention_days(),
        design: DesignEntitlements {
            custom_colors: effective_tier.tier != Tier::Free,
            custom_fonts: effective_tier.tier != Tier::Free,
        },
    }
}
