//! Billing resolution and entitlements.
//!
//! Everything in this module is a pure function of loaded documents and a
//! caller-supplied `now`: no I/O, no clock reads, safe to call from
//! concurrent request handlers without coordination.
//!
//! Resolution happens in three steps:
//!
//! 1. [`resolve_billing`] — collapse admin override, stored billing and the
//!    legacy plan field into one [`EffectiveBilling`].
//! 2. [`resolve_effective_tier`] — apply admin tier overrides on top of the
//!    billing-derived tier.
//! 3. [`compute_entitlements`] — turn both into the UI-facing capability set.

mod entitlements;
mod resolver;
mod tier;

pub use entitlements::{
    AnalyticsLevel, DesignEntitlements, Entitlements, LockedReason, PlanFeatures,
    compute_entitlements, GALLERY_LIMIT,
};
pub use resolver::{BillingSource, EffectiveBilling, resolve_billing};
pub use tier::{EffectiveTier, TierSource, resolve_effective_tier};
