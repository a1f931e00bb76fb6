//! Object metadata sidecars.
//!
//! Every stored object directory holds a `.metadata.json` file with the
//! attributes that are not derivable from the content file itself.

use std::collections::BTreeMap;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use barrel_model::types::StorageClass;

/// The default content type for objects stored without one.
pub const DEFAULT_CONTENT_TYPE: &str = "binary/octet-stream";

/// Persisted attributes of a stored object.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ObjectMetadata {
    /// MIME type; defaults to `binary/octet-stream`.
    pub content_type: String,
    /// Bare (unquoted) ETag.
    pub etag: String,
    /// Content length in bytes; always equals the content file's size.
    pub size: u64,
    /// Last modification time, UTC.
    pub last_modified: DateTime<Utc>,
    /// Storage class, serialized by its wire name.
    #[serde(
        serialize_with = "serialize_storage_class",
        deserialize_with = "deserialize_storage_class"
    )]
    pub storage_class: StorageClass,
    /// `x-amz-website-redirect-location`, if set at PUT time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website_redirect_location: Option<String>,
    /// User metadata (`x-amz-meta-*`); keys stored ASCII-lowercased,
    /// values byte-preserved.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub user_metadata: BTreeMap<String, String>,
}

impl Default for ObjectMetadata {
    fn default() -> Self {
        Self {
            content_type: DEFAULT_CONTENT_TYPE.to_owned(),
            etag: String::new(),
            size: 0,
            last_modified: Utc::now(),
            storage_class: StorageClass::default(),
            website_redirect_location: None,
            user_metadata: BTreeMap::new(),
        }
    }
}

fn serialize_storage_class<S>(class: &StorageClass, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_str(class.as_str())
}

fn deserialize_storage_class<'de, D>(deserializer: D) -> Result<StorageClass, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let name = String::deserialize(deserializer)?;
    StorageClass::from_str(&name).map_err(serde::de::Error::custom)
}
