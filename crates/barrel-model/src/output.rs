//! Typed response documents serialized to XML by `barrel-xml`.

use chrono::{DateTime, Utc};

use crate::types::{BucketInfo, ObjectInfo, Owner};

/// `ListBuckets` response body.
#[derive(Debug, Clone)]
pub struct ListAllMyBucketsResult {
    pub owner: Owner,
    pub buckets: Vec<BucketInfo>,
}

/// Shared body of `ListObjects` (v1) and `ListObjectsV2`.
///
/// The serializer selects v1 (`Marker`/`NextMarker`) or v2
/// (`KeyCount`/`ContinuationToken`/`StartAfter`) fields based on
/// [`ListBucketResult::list_type`].
#[derive(Debug, Clone)]
pub struct ListBucketResult {
    pub list_type: ListType,
    pub name: String,
    pub prefix: String,
    pub delimiter: Option<String>,
    pub max_keys: u32,
    pub is_truncated: bool,
    pub contents: Vec<ObjectInfo>,
    pub common_prefixes: Vec<String>,

    // V1 fields
    pub marker: String,
    pub next_marker: Option<String>,

    // V2 fields
    pub key_count: u32,
    pub continuation_token: Option<String>,
    pub next_continuation_token: Option<String>,
    pub start_after: Option<String>,
}

/// Which listing protocol version a [`ListBucketResult`] represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListType {
    V1,
    V2,
}

/// `CreateMultipartUpload` response body.
#[derive(Debug, Clone)]
pub struct InitiateMultipartUploadResult {
    pub bucket: String,
    pub key: String,
    pub upload_id: String,
}

/// `CompleteMultipartUpload` response body.
#[derive(Debug, Clone)]
pub struct CompleteMultipartUploadResult {
    /// Absolute URL of the completed object.
    pub location: String,
    pub bucket: String,
    pub key: String,
    /// Quoted composite ETag.
    pub etag: String,
}

/// `CopyObject` / `UploadPartCopy` response body.
#[derive(Debug, Clone)]
pub struct CopyObjectResult {
    pub last_modified: DateTime<Utc>,
    /// Quoted ETag of the destination.
    pub etag: String,
}

/// `DeleteObjects` response body.
#[derive(Debug, Clone, Default)]
pub struct DeleteResult {
    pub deleted: Vec<DeletedObject>,
    pub errors: Vec<DeleteError>,
}

/// A successfully deleted key.
#[derive(Debug, Clone)]
pub struct DeletedObject {
    pub key: String,
}

/// A per-key bulk delete failure.
#[derive(Debug, Clone)]
pub struct DeleteError {
    pub key: String,
    pub code: String,
    pub message: String,
}

/// The stub `AccessControlPolicy` document returned for `?acl` reads.
///
/// The emulator does not enforce ACLs; this document always grants
/// `FULL_CONTROL` to the fixed owner.
#[derive(Debug, Clone)]
pub struct AccessControlPolicy {
    pub owner: Owner,
}

/// `GetBucketLocation` response body. The emulator is region-less, so the
/// constraint is always empty (us-east-1 semantics).
#[derive(Debug, Clone, Default)]
pub struct LocationConstraint {
    pub location: Option<String>,
}
