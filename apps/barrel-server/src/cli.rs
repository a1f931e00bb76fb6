//! Command line interface definition.

use std::path::PathBuf;

use clap::{ArgAction, Parser};

use barrel_core::config::{BucketPreset, ServiceConfig};

/// Barrel: a local, file-backed S3-compatible server for offline testing.
#[derive(Debug, Parser)]
#[command(name = "barrel")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Data directory where buckets and objects are stored.
    #[arg(short = 'd', long = "directory", value_name = "DIR")]
    pub directory: PathBuf,

    /// Address to bind.
    #[arg(short = 'a', long = "address", default_value = "localhost")]
    pub address: String,

    /// Port to bind.
    #[arg(short = 'p', long = "port", default_value_t = 4568)]
    pub port: u16,

    /// Suppress per-request logging.
    #[arg(short = 's', long = "silent")]
    pub silent: bool,

    /// Private key file (PEM). Enables TLS together with --cert.
    #[arg(long = "key", value_name = "FILE", requires = "cert")]
    pub key: Option<PathBuf>,

    /// Certificate file (PEM). Enables TLS together with --key.
    #[arg(long = "cert", value_name = "FILE", requires = "key")]
    pub cert: Option<PathBuf>,

    /// Service endpoint matched against virtual-host-style Host headers.
    #[arg(long = "service-endpoint", default_value = "amazonaws.com")]
    pub service_endpoint: String,

    /// Accept well-formed but incorrect signatures. Testing only.
    #[arg(long = "allow-mismatched-signatures")]
    pub allow_mismatched_signatures: bool,

    /// Disable resolving arbitrary hostnames as bucket names.
    #[arg(long = "no-vhost-buckets")]
    pub no_vhost_buckets: bool,

    /// Create a bucket at startup, optionally applying CORS/website config
    /// documents. Repeatable: --configure-bucket NAME [CONFIG.xml ...]
    #[arg(
        long = "configure-bucket",
        value_name = "NAME [CONFIG...]",
        num_args = 1..,
        value_parser = clap::value_parser!(String),
        action = ArgAction::Append
    )]
    pub configure_bucket: Vec<Vec<String>>,
}

impl Cli {
    /// Convert parsed arguments into the service configuration.
    #[must_use]
    pub fn into_config(self) -> ServiceConfig {
        let configure_buckets = self
            .configure_bucket
            .into_iter()
            .filter_map(|mut group| {
                if group.is_empty() {
                    return None;
                }
                let name = group.remove(0);
                Some(BucketPreset {
                    name,
                    config_files: group.into_iter().map(PathBuf::from).collect(),
                })
            })
            .collect();

        ServiceConfig::builder()
            .directory(self.directory)
            .address(self.address)
            .port(self.port)
            .silent(self.silent)
            .service_endpoint(self.service_endpoint)
            .vhost_buckets(!self.no_vhost_buckets)
            .allow_mismatched_signatures(self.allow_mismatched_signatures)
            .key_path(self.key)
            .cert_path(self.cert)
            .configure_buckets(configure_buckets)
            .build()
    }
}
