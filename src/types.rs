//! Card and user documents as explicit typed structs.
//!
//! The persisted documents were historically loosely shaped; every optional
//! field is modeled as an `Option` here so absence is explicit rather than
//! a runtime surprise.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Billing plan. `Free` is the absence of a paid plan.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Plan {
    #[default]
    Free,
    Monthly,
    Yearly,
}

impl Plan {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Free => "free",
            Self::Monthly => "monthly",
            Self::Yearly => "yearly",
        }
    }

    /// Whether this plan is a paid subscription plan.
    #[must_use]
    pub fn is_paid(&self) -> bool {
        matches!(self, Self::Monthly | Self::Yearly)
    }
}

impl std::fmt::Display for Plan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Billing status of a card.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BillingStatus {
    #[default]
    Free,
    Trial,
    Active,
}

impl BillingStatus {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Free => "free",
            Self::Trial => "trial",
            Self::Active => "active",
        }
    }
}

impl std::fmt::Display for BillingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Feature tier. Orthogonal to billing: admins can grant a tier without
/// a matching subscription.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    #[default]
    Free,
    Basic,
    Premium,
}

impl Tier {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Free => "free",
            Self::Basic => "basic",
            Self::Premium => "premium",
        }
    }

    /// Map a billing plan to the tier it grants.
    #[must_use]
    pub fn for_plan(plan: Plan) -> Self {
        match plan {
            Plan::Yearly => Self::Premium,
            Plan::Monthly => Self::Basic,
            Plan::Free => Self::Free,
        }
    }

    /// Map a tier back to the plan whose feature set it unlocks.
    #[must_use]
    pub fn feature_plan(&self) -> Plan {
        match self {
            Self::Premium => Plan::Yearly,
            Self::Basic => Plan::Monthly,
            Self::Free => Plan::Free,
        }
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Billing sub-document stored on a card.
///
/// Written by the payment webhook pipeline (out of scope here); the core
/// only reads it, except for the trial promotion in
/// [`ensure_trial_started`](crate::trial::ensure_trial_started).
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BillingInfo {
    pub status: BillingStatus,
    pub plan: Plan,
    /// End of the paid period. Absent on an `Active` status means paid
    /// indefinitely (pre-migration data shape, deliberately preserved).
    pub paid_until: Option<DateTime<Utc>>,
    /// Provider-specific feature grants, passed through untouched.
    #[serde(default)]
    pub features: serde_json::Value,
    /// Identifier of the paying account at the provider.
    pub payer: Option<String>,
}

/// Time-bounded manual billing grant set by an operator.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AdminOverride {
    pub plan: Plan,
    /// The override is live strictly before this instant.
    pub until: DateTime<Utc>,
    pub by_admin: String,
    pub reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl AdminOverride {
    /// Whether the override is still live at `now`.
    #[must_use]
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.until > now
    }
}

/// Card design settings. Only the stored media references matter to the
/// core; colors, fonts and layout live with the UI.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Design {
    pub background_path: Option<String>,
    pub background_url: Option<String>,
    pub background_thumb_path: Option<String>,
    pub background_thumb_url: Option<String>,
    pub avatar_path: Option<String>,
    pub avatar_url: Option<String>,
    pub logo_path: Option<String>,
    pub logo_url: Option<String>,
}

/// A single gallery entry on a card.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct GalleryItem {
    pub path: Option<String>,
    pub thumb_path: Option<String>,
    pub url: Option<String>,
    pub thumb_url: Option<String>,
}

/// Append-only audit record of a stored object.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UploadRecord {
    /// Object kind, e.g. "background", "gallery", "avatar".
    pub kind: String,
    pub path: String,
    pub url: String,
    pub created_at: DateTime<Utc>,
}

/// A business card document.
///
/// Ownership is exclusive: at most one of `user` / `anonymous_id` is set.
/// The claim workflow is the only code that flips one to the other.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Card {
    pub id: String,
    /// Owning user, once claimed.
    pub user: Option<String>,
    /// Opaque visitor token while the card is anonymous.
    pub anonymous_id: Option<String>,
    /// Legacy plan field, superseded by `billing` where present.
    #[serde(default)]
    pub plan: Plan,
    pub billing: Option<BillingInfo>,
    pub admin_override: Option<AdminOverride>,
    pub admin_tier: Option<Tier>,
    pub admin_tier_until: Option<DateTime<Utc>>,
    /// Trial milestones; set together by the trial lifecycle, never
    /// overwritten once present.
    pub trial_started_at: Option<DateTime<Utc>>,
    pub trial_ends_at: Option<DateTime<Utc>>,
    pub trial_delete_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub design: Design,
    #[serde(default)]
    pub gallery: Vec<GalleryItem>,
    #[serde(default)]
    pub uploads: Vec<UploadRecord>,
}

impl Card {
    /// Create a fresh draft card with no owner and no trial fields.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    /// Create a draft card held by an anonymous visitor.
    #[must_use]
    pub fn anonymous(id: impl Into<String>, anonymous_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            anonymous_id: Some(anonymous_id.into()),
            ..Self::default()
        }
    }

    /// Whether all three trial milestones are present.
    #[must_use]
    pub fn has_trial_fields(&self) -> bool {
        self.trial_started_at.is_some()
            && self.trial_ends_at.is_some()
            && self.trial_delete_at.is_some()
    }
}

/// Subscription summary stored on a user.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct UserSubscription {
    pub status: String,
    pub expires_at: Option<DateTime<Utc>>,
    pub provider: Option<String>,
}

/// A registered user account.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    /// The user's card, at most one. Enforced by the claim logic plus a
    /// unique constraint at the persistence layer.
    pub card_id: Option<String>,
    #[serde(default)]
    pub plan: Plan,
    pub subscription: Option<UserSubscription>,
    pub admin_tier: Option<Tier>,
    pub admin_tier_until: Option<DateTime<Utc>>,
}

impl User {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }
}
