//! Prelude module for convenient imports.

#[cfg(feature = "s3")]
pub use crate::config::R2Config;
pub use crate::config::StorageConfig;
pub use crate::error::{StorageError, StorageResult};
pub use crate::range::ByteRange;
pub use crate::store::{ObjectDownload, ObjectStat, ObjectSummary, ReleaseStore};
