//! Application state and dependency injection.

use std::time::Duration;

use konvert_opendal::{ReleaseStore, StorageResult};
use url::Url;

use crate::service::{DeliveryMode, ServiceConfig};

/// Download delivery policy, decided once at startup from configuration.
///
/// Each request reads the policy exactly once and commits to a single
/// strategy; redirect and stream deliveries are never mixed.
#[derive(Debug, Clone)]
pub struct DeliveryPolicy {
    /// Selected delivery strategy.
    pub mode: DeliveryMode,
    /// Public bucket base URL; when present, redirects skip presigning and
    /// point directly at the public bucket.
    pub public_base_url: Option<Url>,
    /// Validity window for presigned download URLs.
    pub signed_url_ttl: Duration,
}

impl DeliveryPolicy {
    /// Presigned URLs stay valid for four hours.
    pub const DEFAULT_SIGNED_URL_TTL: Duration = Duration::from_secs(4 * 60 * 60);
}

impl Default for DeliveryPolicy {
    fn default() -> Self {
        Self {
            mode: DeliveryMode::default(),
            public_base_url: None,
            signed_url_ttl: Self::DEFAULT_SIGNED_URL_TTL,
        }
    }
}

/// Application state.
///
/// Used for the [`State`] extraction (dependency injection).
///
/// [`State`]: axum::extract::State
#[must_use = "state does nothing unless you use it"]
#[derive(Clone)]
pub struct ServiceState {
    release_store: ReleaseStore,
    delivery: DeliveryPolicy,
}

impl ServiceState {
    /// Creates application state from already-constructed parts.
    pub fn new(release_store: ReleaseStore, delivery: DeliveryPolicy) -> Self {
        Self {
            release_store,
            delivery,
        }
    }

    /// Initializes application state from configuration.
    pub fn from_config(config: &ServiceConfig) -> StorageResult<Self> {
        Ok(Self::new(config.connect_storage()?, config.delivery_policy()))
    }

    /// Returns the release store.
    pub fn release_store(&self) -> &ReleaseStore {
        &self.release_store
    }
}

macro_rules! impl_di {
    ($($f:ident: $t:ty),+) => {$(
        impl axum::extract::FromRef<ServiceState> for $t {
            fn from_ref(state: &ServiceState) -> Self {
                state.$f.clone()
            }
        }
    )+};
}

impl_di!(release_store: ReleaseStore);
impl_di!(delivery: DeliveryPolicy);
