//! The object store.
//!
//! [`FilesystemStore`] is the reference backend: a flat, filesystem-backed
//! layout with one directory per bucket, one directory per object (named by
//! the percent-encoded key) holding the content file and a metadata sidecar,
//! dot-prefixed XML files for bucket subresources, and a `.uploads` area for
//! in-flight multipart uploads.

mod fs;
pub mod list;
pub mod metadata;

pub use fs::{
    FilesystemStore, MIN_PART_SIZE, ObjectPage, StoredObject, UploadInfo, metadata_for_put,
    validate_bucket_name,
};
pub use list::{ListParams, MAX_KEYS_LIMIT};
pub use metadata::{DEFAULT_CONTENT_TYPE, ObjectMetadata};

/// The bucket/object subresource kinds the store can persist.
///
/// Only `cors`, `website`, and `tagging` are behaviorally interpreted; the
/// rest round-trip as opaque XML.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubresourceKind {
    Cors,
    Website,
    Tagging,
    Acl,
    Lifecycle,
}

impl SubresourceKind {
    /// The on-disk file name for this subresource.
    #[must_use]
    pub fn file_name(&self) -> &'static str {
        match self {
            Self::Cors => ".cors.xml",
            Self::Website => ".website.xml",
            Self::Tagging => ".tagging.xml",
            Self::Acl => ".acl.xml",
            Self::Lifecycle => ".lifecycle.xml",
        }
    }
}
