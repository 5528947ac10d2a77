//! Service configuration.

use anyhow::{Result as AnyhowResult, anyhow};
use konvert_opendal::{R2Config, ReleaseStore, StorageConfig, StorageResult};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::service::DeliveryPolicy;

/// How the download endpoint delivers installer bytes.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[derive(strum::Display, strum::EnumString)]
#[cfg_attr(feature = "config", derive(clap::ValueEnum))]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DeliveryMode {
    /// Redirect clients to a time-limited presigned URL (no bytes proxied).
    #[default]
    Redirect,
    /// Stream object bytes through this server.
    Stream,
}

/// App [`state`] configuration.
///
/// [`state`]: crate::service::ServiceState
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "config", derive(clap::Args))]
#[must_use = "config does nothing unless you use it"]
pub struct ServiceConfig {
    /// Cloudflare account identifier for the R2 bucket.
    #[cfg_attr(feature = "config", arg(long, env = "R2_ACCOUNT_ID"))]
    pub r2_account_id: String,

    /// R2 bucket holding installer binaries.
    #[cfg_attr(
        feature = "config",
        arg(long, env = "R2_BUCKET", default_value = "konvert-downloads")
    )]
    pub r2_bucket: String,

    /// R2 access key ID.
    #[cfg_attr(feature = "config", arg(long, env = "R2_ACCESS_KEY_ID"))]
    pub r2_access_key_id: String,

    /// R2 secret access key.
    #[cfg_attr(feature = "config", arg(long, env = "R2_SECRET_ACCESS_KEY"))]
    pub r2_secret_access_key: String,

    /// Explicit R2 endpoint override (defaults to the account-derived one).
    #[cfg_attr(feature = "config", arg(long, env = "R2_ENDPOINT"))]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub r2_endpoint: Option<String>,

    /// Public base URL of the bucket, used for redirects when the bucket is
    /// exposed directly.
    #[cfg_attr(feature = "config", arg(long, env = "R2_PUBLIC_URL"))]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub r2_public_url: Option<Url>,

    /// Download delivery strategy.
    #[cfg_attr(
        feature = "config",
        arg(long, env = "DOWNLOAD_DELIVERY", value_enum, default_value_t)
    )]
    #[serde(default)]
    pub delivery: DeliveryMode,
}

impl ServiceConfig {
    /// Validates all configuration values and returns errors for invalid settings.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration value is invalid:
    /// - Account ID and credentials must not be empty
    /// - Endpoint override must be an HTTP(S) URL if provided
    pub fn validate(&self) -> AnyhowResult<()> {
        if self.r2_account_id.is_empty() {
            return Err(anyhow!("R2 account ID cannot be empty"));
        }

        if self.r2_bucket.is_empty() {
            return Err(anyhow!("R2 bucket cannot be empty"));
        }

        if self.r2_access_key_id.is_empty() {
            return Err(anyhow!("R2 access key ID cannot be empty"));
        }

        if self.r2_secret_access_key.is_empty() {
            return Err(anyhow!("R2 secret access key cannot be empty"));
        }

        if let Some(ref endpoint) = self.r2_endpoint
            && !endpoint.starts_with("http://")
            && !endpoint.starts_with("https://")
        {
            return Err(anyhow!(
                "R2 endpoint must start with 'http://' or 'https://'"
            ));
        }

        Ok(())
    }

    /// Builds the storage configuration for this service.
    pub fn storage_config(&self) -> StorageConfig {
        let mut r2 = R2Config::new(&self.r2_account_id, &self.r2_bucket).with_credentials(
            &self.r2_access_key_id,
            &self.r2_secret_access_key,
        );

        if let Some(ref endpoint) = self.r2_endpoint {
            r2 = r2.with_endpoint(endpoint);
        }

        StorageConfig::R2(r2)
    }

    /// Connects to the object store.
    pub fn connect_storage(&self) -> StorageResult<ReleaseStore> {
        ReleaseStore::new(self.storage_config())
    }

    /// Builds the delivery policy for the download endpoint.
    pub fn delivery_policy(&self) -> DeliveryPolicy {
        DeliveryPolicy {
            mode: self.delivery,
            public_base_url: self.r2_public_url.clone(),
            signed_url_ttl: DeliveryPolicy::DEFAULT_SIGNED_URL_TTL,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ServiceConfig {
        ServiceConfig {
            r2_account_id: "0a1b2c3d".to_string(),
            r2_bucket: "konvert-downloads".to_string(),
            r2_access_key_id: "key".to_string(),
            r2_secret_access_key: "secret".to_string(),
            r2_endpoint: None,
            r2_public_url: None,
            delivery: DeliveryMode::default(),
        }
    }

    #[test]
    fn default_delivery_is_redirect() {
        assert_eq!(DeliveryMode::default(), DeliveryMode::Redirect);
    }

    #[test]
    fn valid_config_passes() {
        assert!(config().validate().is_ok());
    }

    #[test]
    fn empty_credentials_fail_validation() {
        let mut config = config();
        config.r2_access_key_id.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn endpoint_override_must_be_http() {
        let mut config = config();
        config.r2_endpoint = Some("localhost:9000".to_string());
        assert!(config.validate().is_err());
    }
}
