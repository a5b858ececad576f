//! Tapfolio core — the entitlement, trial and claim engine behind the
//! Tapfolio digital business-card platform.
//!
//! The HTTP layer, views and CRUD plumbing live elsewhere; this crate owns
//! the parts with real invariants:
//!
//! - **Billing resolution**: collapse admin overrides, the stored billing
//!   sub-document and the legacy plan field into one effective state
//!   ([`billing::resolve_billing`]).
//! - **Tier and entitlements**: admin-tier precedence and the final
//!   UI-facing capability set ([`billing::resolve_effective_tier`],
//!   [`billing::compute_entitlements`]).
//! - **Trial lifecycle**: start-once trials, write locks after expiry,
//!   deletion eligibility ([`trial`]).
//! - **Claim migration**: moving an anonymous card and its stored media to
//!   a registered user, storage-first and retryable ([`claim`]).
//! - **Trial cleanup**: the periodic sweep destroying expired, unpaid
//!   cards ([`cleanup`]).
//!
//! Persistence and object storage are collaborators behind the
//! [`store::CardStore`]/[`store::UserStore`] and [`storage::ObjectStorage`]
//! traits; in-memory backends are included for development and testing.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use tapfolio::{claim::ClaimService, cleanup, Config};
//! use tapfolio::storage::InMemoryObjectStorage;
//! use tapfolio::store::InMemoryStore;
//!
//! #[tokio::main]
//! async fn main() {
//!     tapfolio::init_tracing();
//!     let config = Config::from_env();
//!
//!     let store = InMemoryStore::new();
//!     let storage = InMemoryObjectStorage::new();
//!
//!     let claims = ClaimService::new(
//!         store.clone(),
//!         store.clone(),
//!         storage.clone(),
//!         config.storage.clone(),
//!     );
//!
//!     cleanup::start_trial_cleanup_job(store, storage, config.cleanup, config.storage);
//!     // ... hand `claims` to the HTTP layer
//! }
//! ```

pub mod billing;
pub mod claim;
pub mod cleanup;
mod config;
mod error;
pub mod storage;
pub mod store;
pub mod trial;
pub mod types;

// Re-exports for the public API surface the HTTP layer consumes.
pub use billing::{
    compute_entitlements, resolve_billing, resolve_effective_tier, AnalyticsLevel,
    EffectiveBilling, EffectiveTier, Entitlements, LockedReason,
};
pub use claim::{ClaimError, ClaimOutcome, ClaimService};
pub use cleanup::{start_trial_cleanup_job, SweepStats, TrialCleanupJob};
pub use config::{CleanupConfig, Config, StorageConfig};
pub use error::{Result, TapfolioError};
pub use trial::{
    assert_not_locked, compute_trial_dates, ensure_trial_started, is_trial_delete_due,
    is_trial_expired,
};
pub use types::{Card, User};

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize tracing/logging with sensible defaults.
///
/// Call early in `main()`, before starting the cleanup job or serving
/// requests.
///
/// # Environment Variables
///
/// - `RUST_LOG`: log level filter (e.g. "info", "tapfolio=debug")
/// - `TAPFOLIO_LOG_JSON`: set to "true" for JSON formatted logs
pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let json_logs = std::env::var("TAPFOLIO_LOG_JSON")
        .map(|v| v.parse::<bool>().unwrap_or(false))
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}
