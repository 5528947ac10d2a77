//! Storage configuration types.

use serde::{Deserialize, Serialize};

/// Storage backend configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
#[non_exhaustive]
pub enum StorageConfig {
    /// Cloudflare R2 (S3-compatible) storage.
    #[cfg(feature = "s3")]
    R2(R2Config),
    /// In-memory storage, for tests and local development.
    #[cfg(any(test, feature = "memory"))]
    Memory,
}

impl StorageConfig {
    /// Returns the backend name as a static string.
    pub fn backend_name(&self) -> &'static str {
        match self {
            #[cfg(feature = "s3")]
            Self::R2(_) => "r2",
            #[cfg(any(test, feature = "memory"))]
            Self::Memory => "memory",
        }
    }
}

/// Cloudflare R2 configuration.
///
/// R2 is addressed through its S3-compatible API: region is always `auto`
/// and the endpoint is derived from the account id unless an explicit
/// override is provided.
#[cfg(feature = "s3")]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct R2Config {
    /// Cloudflare account identifier.
    pub account_id: String,
    /// Bucket holding the installer binaries.
    pub bucket: String,
    /// Access key ID.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_key_id: Option<String>,
    /// Secret access key.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret_access_key: Option<String>,
    /// Custom endpoint URL, overriding the account-derived one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
}

#[cfg(feature = "s3")]
impl R2Config {
    /// Creates a new R2 configuration.
    pub fn new(account_id: impl Into<String>, bucket: impl Into<String>) -> Self {
        Self {
            account_id: account_id.into(),
            bucket: bucket.into(),
            access_key_id: None,
            secret_access_key: None,
            endpoint: None,
        }
    }

    /// Sets the access credentials.
    pub fn with_credentials(
        mut self,
        access_key_id: impl Into<String>,
        secret_access_key: impl Into<String>,
    ) -> Self {
        self.access_key_id = Some(access_key_id.into());
        self.secret_access_key = Some(secret_access_key.into());
        self
    }

    /// Sets a custom endpoint.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Returns the effective endpoint URL.
    pub fn endpoint(&self) -> String {
        self.endpoint
            .clone()
            .unwrap_or_else(|| format!("https://{}.r2.cloudflarestorage.com", self.account_id))
    }
}

#[cfg(all(test, feature = "s3"))]
mod tests {
    use super::*;

    #[test]
    fn endpoint_derived_from_account_id() {
        let config = R2Config::new("0a1b2c3d", "konvert-downloads");
        assert_eq!(config.endpoint(), "https://0a1b2c3d.r2.cloudflarestorage.com");
    }

    #[test]
    fn endpoint_override_wins() {
        let config = R2Config::new("0a1b2c3d", "konvert-downloads")
            .with_endpoint("http://localhost:9000");
        assert_eq!(config.endpoint(), "http://localhost:9000");
    }
}
