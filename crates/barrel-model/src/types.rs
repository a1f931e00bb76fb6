//! Core S3 data types: storage classes, owners, summaries, and the bucket
//! subresource configuration documents.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};

use crate::error::{S3Error, S3ErrorCode};

// ---------------------------------------------------------------------------
// Storage class
// ---------------------------------------------------------------------------

/// The storage class attached to an object.
///
/// The emulator stores the class verbatim and returns it in listings and
/// HEAD/GET responses; it has no behavioral effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StorageClass {
    /// The default storage class.
    #[default]
    Standard,
    ReducedRedundancy,
    StandardIa,
    OnezoneIa,
    IntelligentTiering,
    Glacier,
    DeepArchive,
    Outposts,
}

impl StorageClass {
    /// The wire name of this storage class.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Standard => "STANDARD",
            Self::ReducedRedundancy => "REDUCED_REDUNDANCY",
            Self::StandardIa => "STANDARD_IA",
            Self::OnezoneIa => "ONEZONE_IA",
            Self::IntelligentTiering => "INTELLIGENT_TIERING",
            Self::Glacier => "GLACIER",
            Self::DeepArchive => "DEEP_ARCHIVE",
            Self::Outposts => "OUTPOSTS",
        }
    }
}

impl FromStr for StorageClass {
    type Err = S3Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "STANDARD" => Ok(Self::Standard),
            "REDUCED_REDUNDANCY" => Ok(Self::ReducedRedundancy),
            "STANDARD_IA" => Ok(Self::StandardIa),
            "ONEZONE_IA" => Ok(Self::OnezoneIa),
            "INTELLIGENT_TIERING" => Ok(Self::IntelligentTiering),
            "GLACIER" => Ok(Self::Glacier),
            "DEEP_ARCHIVE" => Ok(Self::DeepArchive),
            "OUTPOSTS" => Ok(Self::Outposts),
            _ => Err(S3Error::new(S3ErrorCode::InvalidStorageClass)),
        }
    }
}

impl fmt::Display for StorageClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Owner / bucket / object summaries
// ---------------------------------------------------------------------------

/// The owner identity reported in listings and ACL documents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Owner {
    /// Canonical user ID (an opaque hex string).
    pub id: String,
    /// Display name.
    pub display_name: String,
}

impl Default for Owner {
    fn default() -> Self {
        Self {
            id: "123456789000".to_owned(),
            display_name: "S3rver".to_owned(),
        }
    }
}

/// A bucket as reported by `ListBuckets`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketInfo {
    /// Bucket name.
    pub name: String,
    /// Creation timestamp.
    pub creation_date: DateTime<Utc>,
}

/// An object summary as reported by listings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectInfo {
    /// The full object key.
    pub key: String,
    /// Last modification time.
    pub last_modified: DateTime<Utc>,
    /// The bare ETag (no surrounding quotes).
    pub etag: String,
    /// Content length in bytes.
    pub size: u64,
    /// Storage class.
    pub storage_class: StorageClass,
}

// ---------------------------------------------------------------------------
// CORS configuration
// ---------------------------------------------------------------------------

/// A bucket CORS configuration: an ordered sequence of rules.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CorsConfiguration {
    /// Rules, evaluated first-match.
    pub rules: Vec<CorsRule>,
}

/// One `<CORSRule>` element.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CorsRule {
    /// Allowed origins; each may contain at most one `*` wildcard.
    pub allowed_origins: Vec<String>,
    /// Allowed methods (`GET`, `PUT`, `POST`, `DELETE`, `HEAD`).
    pub allowed_methods: Vec<String>,
    /// Allowed request headers (matched case-insensitively, `*` wildcard).
    pub allowed_headers: Vec<String>,
    /// Response headers exposed to the browser.
    pub expose_headers: Vec<String>,
    /// Preflight cache lifetime in seconds.
    pub max_age_seconds: Option<i32>,
}

// ---------------------------------------------------------------------------
// Website configuration
// ---------------------------------------------------------------------------

/// A bucket static-website configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WebsiteConfiguration {
    /// Index document settings. Required by S3 schema.
    pub index_document: Option<IndexDocument>,
    /// Optional error document served on 4xx.
    pub error_document: Option<ErrorDocument>,
    /// Routing rules evaluated in order.
    pub routing_rules: Vec<RoutingRule>,
}

/// `<IndexDocument>`: the suffix appended to directory-style requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexDocument {
    /// The suffix, e.g. `index.html`. Must not be empty or contain `/`.
    pub suffix: String,
}

/// `<ErrorDocument>`: the object served for 4xx responses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorDocument {
    /// The key of the error object.
    pub key: String,
}

/// A single `<RoutingRule>`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoutingRule {
    /// When absent, the rule matches every request.
    pub condition: Option<RoutingRuleCondition>,
    /// The redirect to apply when the condition holds.
    pub redirect: Redirect,
}

/// `<Condition>` of a routing rule. Either member may be omitted; both
/// present means both must hold.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoutingRuleCondition {
    /// Prefix the request key must start with.
    pub key_prefix_equals: Option<String>,
    /// HTTP status the response would have had (e.g. `404`).
    pub http_error_code_returned_equals: Option<u16>,
}

/// `<Redirect>` of a routing rule.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Redirect {
    /// `http` or `https`; defaults to the request protocol.
    pub protocol: Option<String>,
    /// Redirect target host; defaults to the request host.
    pub host_name: Option<String>,
    /// Replace the matched key prefix with this string.
    pub replace_key_prefix_with: Option<String>,
    /// Replace the entire key with this string. Mutually exclusive with
    /// `replace_key_prefix_with`.
    pub replace_key_with: Option<String>,
    /// Redirect status code; defaults to 301.
    pub http_redirect_code: Option<u16>,
}

// ---------------------------------------------------------------------------
// Tagging
// ---------------------------------------------------------------------------

/// A `<Tagging>` document (bucket- or object-level).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tagging {
    /// The tag set.
    pub tag_set: Vec<Tag>,
}

/// A single tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag {
    pub key: String,
    pub value: String,
}

// ---------------------------------------------------------------------------
// Bulk delete
// ---------------------------------------------------------------------------

/// The parsed `<Delete>` request body of `DeleteObjects`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Delete {
    /// Keys to delete.
    pub objects: Vec<ObjectIdentifier>,
    /// When set, successful deletions are omitted from the response.
    pub quiet: bool,
}

/// One `<Object>` inside a bulk delete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectIdentifier {
    pub key: String,
}

// ---------------------------------------------------------------------------
// Multipart completion
// ---------------------------------------------------------------------------

/// The parsed `<CompleteMultipartUpload>` request body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompletedMultipartUpload {
    /// Parts in the order supplied by the client.
    pub parts: Vec<CompletedPart>,
}

/// One `<Part>` reference in a completion request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedPart {
    /// Part number (1..=10000).
    pub part_number: u16,
    /// The ETag returned by `UploadPart`, with or without quotes.
    pub etag: String,
}

// ---------------------------------------------------------------------------
// Copy directive
// ---------------------------------------------------------------------------

/// The `x-amz-metadata-directive` header of `CopyObject`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MetadataDirective {
    /// Preserve the source object's metadata (the default).
    #[default]
    Copy,
    /// Use the metadata supplied on the copy request.
    Replace,
}

impl FromStr for MetadataDirective {
    type Err = S3Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "COPY" => Ok(Self::Copy),
            "REPLACE" => Ok(Self::Replace),
            other => Err(S3Error::invalid_argument(
                "Unknown metadata directive",
                "x-amz-metadata-directive",
                other,
            )),
        }
    }
}
