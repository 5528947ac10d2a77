#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

mod config;
mod error;
mod range;
mod store;

#[doc(hidden)]
pub mod prelude;

#[cfg(feature = "s3")]
pub use config::R2Config;
pub use config::StorageConfig;
pub use error::{StorageError, StorageResult};
pub use range::ByteRange;
pub use store::{ObjectDownload, ObjectStat, ObjectSummary, ReleaseStore};

/// Tracing target for storage operations.
pub const TRACING_TARGET: &str = "konvert_opendal";
