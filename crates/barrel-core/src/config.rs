//! Service configuration.
//!
//! A plain options struct assembled by the CLI (or by tests through the
//! builder) and passed down to the store and HTTP layers.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;

/// Configuration for a Barrel instance.
///
/// # Examples
///
/// ```
/// use barrel_core::ServiceConfig;
///
/// let config = ServiceConfig::builder()
///     .directory("/tmp/barrel-data".into())
///     .build();
/// assert_eq!(config.port, 4568);
/// assert!(config.vhost_buckets);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, TypedBuilder)]
#[serde(rename_all = "camelCase")]
pub struct ServiceConfig {
    /// Root directory of the object store. Required.
    pub directory: PathBuf,

    /// Bind address.
    #[builder(default = String::from("localhost"))]
    pub address: String,

    /// Bind port.
    #[builder(default = 4568)]
    pub port: u16,

    /// Suppress request logging.
    #[builder(default = false)]
    pub silent: bool,

    /// The service endpoint matched against vhost-style Host headers.
    #[builder(default = String::from("amazonaws.com"))]
    pub service_endpoint: String,

    /// Whether arbitrary hostnames resolve to bucket names.
    #[builder(default = true)]
    pub vhost_buckets: bool,

    /// Accept well-formed but incorrect signatures. Test-only escape hatch.
    #[builder(default = false)]
    pub allow_mismatched_signatures: bool,

    /// Private key path handed to the TLS terminator.
    #[builder(default)]
    pub key_path: Option<PathBuf>,

    /// Certificate path handed to the TLS terminator.
    #[builder(default)]
    pub cert_path: Option<PathBuf>,

    /// Buckets created (with optional subresource configs) at startup.
    #[builder(default)]
    pub configure_buckets: Vec<BucketPreset>,

    /// The region reported in event records and credential scopes.
    #[builder(default = String::from("us-east-1"))]
    pub region: String,
}

/// A bucket to create at startup, with optional config documents.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BucketPreset {
    /// Bucket name.
    pub name: String,
    /// Paths of XML config documents (CORS or website), applied in order.
    pub config_files: Vec<PathBuf>,
}

impl ServiceConfig {
    /// The `host:port` string this instance listens on.
    #[must_use]
    pub fn bind_target(&self) -> String {
        format!("{}:{}", self.address, self.port)
    }

    /// The HTTP endpoint prefix for absolute URLs the emulator hands out
    /// (POST-form redirects, multipart completion locations, website
    /// redirects).
    #[must_use]
    pub fn endpoint_url(&self) -> String {
        let scheme = if self.cert_path.is_some() { "https" } else { "http" };
        format!("{scheme}://{}:{}", self.address, self.port)
    }
}
