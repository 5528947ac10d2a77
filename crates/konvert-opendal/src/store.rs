//! Release store built on OpenDAL operators.

use std::time::Duration;

use opendal::{FuturesBytesStream, Metadata, Operator, services};

use crate::TRACING_TARGET;
use crate::config::StorageConfig;
use crate::error::{StorageError, StorageResult};
use crate::range::ByteRange;

/// Object store holding the Konvert installer binaries.
///
/// Wraps an OpenDAL [`Operator`]; clones share the underlying client and
/// are cheap, so one store is built at startup and handed to every request.
#[derive(Clone)]
pub struct ReleaseStore {
    operator: Operator,
    config: StorageConfig,
}

impl ReleaseStore {
    /// Creates a new release store from configuration.
    pub fn new(config: StorageConfig) -> StorageResult<Self> {
        let operator = Self::create_operator(&config)?;

        tracing::info!(
            target: TRACING_TARGET,
            backend = config.backend_name(),
            "storage backend initialized"
        );

        Ok(Self { operator, config })
    }

    /// Returns the configuration for this store.
    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    /// Verifies that the backend is reachable with the configured credentials.
    pub async fn check(&self) -> StorageResult<()> {
        Ok(self.operator.check().await?)
    }

    /// Fetches object metadata without reading any bytes.
    pub async fn stat(&self, key: &str) -> StorageResult<ObjectStat> {
        let meta = self.operator.stat(key).await?;
        Ok(ObjectStat::from_metadata(&meta))
    }

    /// Fetches an object, or a byte sub-range of it, as a streamed body.
    ///
    /// The returned stream is a pass-through over the store's response; the
    /// object is never buffered whole. An unsatisfiable range yields
    /// [`StorageError::RangeNotSatisfied`] before any bytes are requested.
    pub async fn fetch(
        &self,
        key: &str,
        range: Option<ByteRange>,
    ) -> StorageResult<ObjectDownload> {
        let meta = self.operator.stat(key).await?;
        let total_size = meta.content_length();

        let segment = match range {
            Some(range) => {
                let segment = range.resolve(total_size).ok_or_else(|| {
                    StorageError::range_not_satisfied(format!(
                        "{range} against {key} ({total_size} bytes)"
                    ))
                })?;
                Some(segment)
            }
            None => None,
        };

        let reader = self.operator.reader(key).await?;
        let stream = match segment {
            Some((start, end)) => reader.into_bytes_stream(start..=end).await,
            None => reader.into_bytes_stream(..).await,
        }
        .map_err(|err| StorageError::read(err.to_string()))?;

        tracing::debug!(
            target: TRACING_TARGET,
            key = %key,
            total_size = total_size,
            segment = ?segment,
            "object fetch started"
        );

        Ok(ObjectDownload {
            stream,
            total_size,
            segment,
            content_type: meta.content_type().map(Into::into),
            etag: meta.etag().map(Into::into),
        })
    }

    /// Generates a time-limited presigned GET URL for an object.
    ///
    /// The `Content-Disposition` override (and optional `Content-Type`
    /// override) are embedded into the signed request so the direct download
    /// carries correct headers even when the stored metadata is wrong.
    pub async fn presign_download(
        &self,
        key: &str,
        ttl: Duration,
        content_disposition: &str,
        content_type: Option<&str>,
    ) -> StorageResult<String> {
        let mut presign = self
            .operator
            .presign_read_with(key, ttl)
            .override_content_disposition(content_disposition);

        if let Some(content_type) = content_type {
            presign = presign.override_content_type(content_type);
        }

        let request = presign.await?;

        tracing::debug!(
            target: TRACING_TARGET,
            key = %key,
            ttl_secs = ttl.as_secs(),
            "presigned download URL generated"
        );

        Ok(request.uri().to_string())
    }

    /// Lists objects under a prefix, up to `limit` entries per page.
    pub async fn list(&self, prefix: &str, limit: usize) -> StorageResult<Vec<ObjectSummary>> {
        let entries = self
            .operator
            .list_with(prefix)
            .limit(limit)
            .await
            .map_err(|err| StorageError::list(err.to_string()))?;

        Ok(entries
            .iter()
            .filter(|entry| !entry.path().ends_with('/'))
            .map(|entry| ObjectSummary {
                key: entry.path().to_string(),
                size: entry.metadata().content_length(),
                last_modified: convert_last_modified(entry.metadata()),
            })
            .collect())
    }

    /// Writes an object, replacing any previous content.
    ///
    /// Used by the release publishing tooling; the request handlers never
    /// write.
    pub async fn put(&self, key: &str, data: bytes::Bytes) -> StorageResult<()> {
        self.operator
            .write(key, data)
            .await
            .map_err(|err| StorageError::write(err.to_string()))?;
        Ok(())
    }

    /// Creates an OpenDAL operator based on configuration.
    #[allow(unreachable_patterns)]
    fn create_operator(config: &StorageConfig) -> StorageResult<Operator> {
        match config {
            #[cfg(feature = "s3")]
            StorageConfig::R2(r2) => {
                let mut builder = services::S3::default()
                    .bucket(&r2.bucket)
                    .region("auto")
                    .endpoint(&r2.endpoint());

                if let Some(ref access_key_id) = r2.access_key_id {
                    builder = builder.access_key_id(access_key_id);
                }

                if let Some(ref secret_access_key) = r2.secret_access_key {
                    builder = builder.secret_access_key(secret_access_key);
                }

                Operator::new(builder)
                    .map(|op| op.finish())
                    .map_err(|err| StorageError::init(err.to_string()))
            }

            #[cfg(any(test, feature = "memory"))]
            StorageConfig::Memory => Operator::new(services::Memory::default())
                .map(|op| op.finish())
                .map_err(|err| StorageError::init(err.to_string())),

            // Unreachable when the config was built with the same features
            // enabled as this crate.
            _ => Err(StorageError::init(format!(
                "backend {:?} is not supported with current features",
                config.backend_name()
            ))),
        }
    }
}

impl std::fmt::Debug for ReleaseStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReleaseStore")
            .field("backend", &self.config.backend_name())
            .finish()
    }
}

/// Object metadata from a head lookup.
#[derive(Debug, Clone)]
pub struct ObjectStat {
    /// Object size in bytes.
    pub size: u64,
    /// Stored content type, if any.
    pub content_type: Option<String>,
    /// Entity tag, with surrounding quotes stripped.
    pub etag: Option<String>,
    /// Last modification time.
    pub last_modified: Option<jiff::Timestamp>,
    /// SHA-256 checksum from custom object metadata, if published.
    pub sha256: Option<String>,
}

impl ObjectStat {
    fn from_metadata(meta: &Metadata) -> Self {
        let sha256 = meta.user_metadata().and_then(|user| {
            user.get("sha256")
                .or_else(|| user.get("x-amz-meta-sha256"))
                .cloned()
        });

        Self {
            size: meta.content_length(),
            content_type: meta.content_type().map(Into::into),
            etag: meta.etag().map(|etag| etag.trim_matches('"').to_string()),
            last_modified: convert_last_modified(meta),
            sha256,
        }
    }
}

/// A streamed object body with the headers-relevant metadata around it.
pub struct ObjectDownload {
    /// Pass-through byte stream over the object (or its sub-range).
    pub stream: FuturesBytesStream,
    /// Full object size in bytes.
    pub total_size: u64,
    /// Resolved inclusive `(start, end)` pair when a range was requested.
    pub segment: Option<(u64, u64)>,
    /// Stored content type, if any.
    pub content_type: Option<String>,
    /// Entity tag as reported by the store.
    pub etag: Option<String>,
}

impl ObjectDownload {
    /// Returns true when this download covers a sub-range of the object.
    pub fn is_partial(&self) -> bool {
        self.segment.is_some()
    }

    /// Number of body bytes that will be delivered.
    pub fn content_length(&self) -> u64 {
        match self.segment {
            Some((start, end)) => end - start + 1,
            None => self.total_size,
        }
    }
}

impl std::fmt::Debug for ObjectDownload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectDownload")
            .field("total_size", &self.total_size)
            .field("segment", &self.segment)
            .field("content_type", &self.content_type)
            .field("etag", &self.etag)
            .finish_non_exhaustive()
    }
}

/// A listing entry under a prefix.
#[derive(Debug, Clone)]
pub struct ObjectSummary {
    /// Full object key.
    pub key: String,
    /// Object size in bytes, as reported by the listing.
    pub size: u64,
    /// Last modification time, as reported by the listing.
    pub last_modified: Option<jiff::Timestamp>,
}

// The listing and stat APIs report chrono timestamps; the rest of the
// workspace speaks jiff.
fn convert_last_modified(meta: &Metadata) -> Option<jiff::Timestamp> {
    meta.last_modified()
        .and_then(|dt| jiff::Timestamp::from_second(dt.timestamp()).ok())
}
