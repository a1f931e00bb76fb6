//! Host and path resolution.
//!
//! Computes `(service, bucket, key)` for a request by examining the `Host`
//! header, the URI path, query parameters, and headers:
//!
//! - Hosts matching `^(?:(.+)\.)?s3(-website)?([-.][^.]+)?\.{endpoint}$`
//!   select vhost-style addressing; the `-website` segment selects the
//!   static-website service.
//! - Any other hostname is itself taken as a bucket when vhost buckets are
//!   enabled, unless it is an IP address, `localhost`, the machine's
//!   hostname, or the configured bind address.
//! - SDK requests (any `x-amz-*` header or query parameter) always target
//!   the API service.
//!
//! After host resolution the path is parsed as `/{bucket}/{key…}`,
//! `/{bucket}`, or `/` with percent-decoding; trailing slashes in keys are
//! significant.

use http::Method;
use percent_encoding::percent_decode_str;
use regex::Regex;

use barrel_auth::canonical::parse_query;
use barrel_model::{S3Error, S3ErrorCode, S3Operation};

/// Which of the two endpoint families a request targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum S3ServiceKind {
    /// The REST API service (`s3`).
    Api,
    /// The static-website service (`s3-website`).
    Website,
}

/// The outcome of host/path resolution.
#[derive(Debug, Clone)]
pub struct ResolvedTarget {
    /// API or website service.
    pub service: S3ServiceKind,
    /// The resolved bucket, if any.
    pub bucket: Option<String>,
    /// The resolved (decoded) key, if any. Empty segments stay significant:
    /// `/b/` resolves to bucket `b` with no key, `/b//` to key `/`.
    pub key: Option<String>,
    /// Whether the bucket came from the Host header.
    pub vhost: bool,
    /// Whether the request looks SDK-issued (`x-amz-*` present).
    pub sdk: bool,
}

/// Resolves hosts against the configured service endpoint.
#[derive(Debug, Clone)]
pub struct HostResolver {
    pattern: Regex,
    vhost_buckets: bool,
    address: String,
    local_hostname: Option<String>,
}

impl HostResolver {
    /// Build a resolver for a service endpoint (e.g. `amazonaws.com`).
    ///
    /// `address` is the configured bind address, excluded from
    /// hostname-as-bucket resolution.
    #[must_use]
    pub fn new(service_endpoint: &str, vhost_buckets: bool, address: &str) -> Self {
        let pattern = Regex::new(&format!(
            r"^(?:(.+)\.)?s3(-website)?([-.][^.]+)?\.{}$",
            regex::escape(service_endpoint)
        ))
        .expect("endpoint pattern is valid");
        Self {
            pattern,
            vhost_buckets,
            address: address.to_owned(),
            local_hostname: std::env::var("HOSTNAME").ok(),
        }
    }

    /// Resolve a request to its target service, bucket, and key.
    pub fn resolve<B>(&self, req: &http::Request<B>) -> ResolvedTarget {
        let sdk = is_sdk_request(req);
        let host = req
            .headers()
            .get(http::header::HOST)
            .and_then(|v| v.to_str().ok())
            .map(strip_port)
            .unwrap_or_default();

        let (service, vhost_bucket) = match self.pattern.captures(host) {
            Some(captures) => {
                let bucket = captures.get(1).map(|m| m.as_str().to_owned());
                let website = captures.get(2).is_some() && !sdk;
                (
                    if website {
                        S3ServiceKind::Website
                    } else {
                        S3ServiceKind::Api
                    },
                    bucket,
                )
            }
            None if self.vhost_buckets && self.is_bucket_like(host) => {
                (S3ServiceKind::Api, Some(host.to_owned()))
            }
            None => (S3ServiceKind::Api, None),
        };

        let path = req.uri().path();
        let (bucket, key, vhost) = match vhost_bucket {
            Some(bucket) => {
                let key = decode_key(path.strip_prefix('/').unwrap_or(path));
                (Some(bucket), non_empty(key), true)
            }
            None => {
                let (bucket, key) = parse_path(path);
                (bucket, key, false)
            }
        };

        ResolvedTarget {
            service,
            bucket,
            key,
            vhost,
            sdk,
        }
    }

    /// Whether an unmatched hostname should itself be treated as a bucket.
    fn is_bucket_like(&self, host: &str) -> bool {
        if host.is_empty() || host == "localhost" || host == self.address {
            return false;
        }
        if host.parse::<std::net::IpAddr>().is_ok() {
            return false;
        }
        if self.local_hostname.as_deref() == Some(host) {
            return false;
        }
        true
    }
}

/// Whether the request carries any `x-amz-*` header or query parameter.
fn is_sdk_request<B>(req: &http::Request<B>) -> bool {
    let header_hit = req
        .headers()
        .keys()
        .any(|name| name.as_str().starts_with("x-amz-"));
    if header_hit {
        return true;
    }
    parse_query(req.uri().query().unwrap_or(""))
        .iter()
        .any(|(name, _)| name.to_ascii_lowercase().starts_with("x-amz-"))
}

fn strip_port(host: &str) -> &str {
    // Bracketed IPv6 literal: keep the address inside the brackets.
    if let Some(rest) = host.strip_prefix('[') {
        return rest.split(']').next().unwrap_or(rest);
    }
    host.split(':').next().unwrap_or(host)
}

fn parse_path(path: &str) -> (Option<String>, Option<String>) {
    let trimmed = path.strip_prefix('/').unwrap_or(path);
    if trimmed.is_empty() {
        return (None, None);
    }
    match trimmed.split_once('/') {
        Some((bucket, key)) => (Some(decode_key(bucket)), non_empty(decode_key(key))),
        None => (Some(decode_key(trimmed)), None),
    }
}

fn decode_key(raw: &str) -> String {
    percent_decode_str(raw).decode_utf8_lossy().into_owned()
}

fn non_empty(key: String) -> Option<String> {
    if key.is_empty() { None } else { Some(key) }
}

// ---------------------------------------------------------------------------
// Operation identification
// ---------------------------------------------------------------------------

/// Identify the operation from method, target shape, query, and headers.
///
/// # Errors
///
/// Returns `MethodNotAllowed` (or `NotImplemented` for recognized but
/// unsupported operations) when no operation fits.
pub fn identify_operation(
    method: &Method,
    has_bucket: bool,
    has_key: bool,
    query: &[(String, String)],
    headers: &http::HeaderMap,
) -> Result<S3Operation, S3Error> {
    match (has_bucket, has_key) {
        (false, _) => match *method {
            Method::GET => Ok(S3Operation::ListBuckets),
            _ => Err(S3Error::with_message(
                S3ErrorCode::MethodNotAllowed,
                "Only GET is allowed at the service level",
            )),
        },
        (true, false) => identify_bucket_operation(method, query),
        (true, true) => identify_object_operation(method, query, headers),
    }
}

fn query_has(query: &[(String, String)], name: &str) -> bool {
    query.iter().any(|(n, _)| n == name)
}

fn query_value<'a>(query: &'a [(String, String)], name: &str) -> Option<&'a str> {
    query.iter().find(|(n, _)| n == name).map(|(_, v)| v.as_str())
}

fn identify_bucket_operation(
    method: &Method,
    query: &[(String, String)],
) -> Result<S3Operation, S3Error> {
    match *method {
        Method::GET => Ok(identify_bucket_get(query)),
        Method::PUT => Ok(identify_bucket_put(query)),
        Method::DELETE => Ok(identify_bucket_delete(query)),
        Method::HEAD => Ok(S3Operation::HeadBucket),
        Method::POST => Ok(if query_has(query, "delete") {
            S3Operation::DeleteObjects
        } else {
            S3Operation::PostObject
        }),
        _ => Err(S3Error::new(S3ErrorCode::MethodNotAllowed)),
    }
}

fn identify_bucket_get(query: &[(String, String)]) -> S3Operation {
    if query_value(query, "list-type") == Some("2") {
        return S3Operation::ListObjectsV2;
    }
    if query_has(query, "location") {
        return S3Operation::GetBucketLocation;
    }
    if query_has(query, "cors") {
        return S3Operation::GetBucketCors;
    }
    if query_has(query, "website") {
        return S3Operation::GetBucketWebsite;
    }
    if query_has(query, "tagging") {
        return S3Operation::GetBucketTagging;
    }
    if query_has(query, "acl") {
        return S3Operation::GetBucketAcl;
    }
    if query_has(query, "lifecycle") {
        return S3Operation::GetBucketLifecycle;
    }
    S3Operation::ListObjects
}

fn identify_bucket_put(query: &[(String, String)]) -> S3Operation {
    if query_has(query, "cors") {
        return S3Operation::PutBucketCors;
    }
    if query_has(query, "website") {
        return S3Operation::PutBucketWebsite;
    }
    if query_has(query, "tagging") {
        return S3Operation::PutBucketTagging;
    }
    if query_has(query, "acl") {
        return S3Operation::PutBucketAcl;
    }
    if query_has(query, "lifecycle") {
        return S3Operation::PutBucketLifecycle;
    }
    S3Operation::CreateBucket
}

fn identify_bucket_delete(query: &[(String, String)]) -> S3Operation {
    if query_has(query, "cors") {
        return S3Operation::DeleteBucketCors;
    }
    if query_has(query, "website") {
        return S3Operation::DeleteBucketWebsite;
    }
    if query_has(query, "tagging") {
        return S3Operation::DeleteBucketTagging;
    }
    if query_has(query, "lifecycle") {
        return S3Operation::DeleteBucketLifecycle;
    }
    S3Operation::DeleteBucket
}

fn identify_object_operation(
    method: &Method,
    query: &[(String, String)],
    headers: &http::HeaderMap,
) -> Result<S3Operation, S3Error> {
    let has_copy_source = headers.contains_key("x-amz-copy-source");

    match *method {
        Method::GET => {
            if query_has(query, "tagging") {
                return Ok(S3Operation::GetObjectTagging);
            }
            if query_has(query, "acl") {
                return Ok(S3Operation::GetObjectAcl);
            }
            if query_has(query, "uploadId") {
                return Err(S3Error::with_message(
                    S3ErrorCode::NotImplemented,
                    "ListParts is not implemented",
                ));
            }
            Ok(S3Operation::GetObject)
        }
        Method::HEAD => Ok(S3Operation::HeadObject),
        Method::PUT => {
            if query_has(query, "tagging") {
                return Ok(S3Operation::PutObjectTagging);
            }
            if query_has(query, "acl") {
                return Ok(S3Operation::PutObjectAcl);
            }
            if query_has(query, "partNumber") && query_has(query, "uploadId") {
                return Ok(if has_copy_source {
                    S3Operation::UploadPartCopy
                } else {
                    S3Operation::UploadPart
                });
            }
            Ok(if has_copy_source {
                S3Operation::CopyObject
            } else {
                S3Operation::PutObject
            })
        }
        Method::DELETE => {
            if query_has(query, "tagging") {
                return Ok(S3Operation::DeleteObjectTagging);
            }
            if query_has(query, "uploadId") {
                return Ok(S3Operation::AbortMultipartUpload);
            }
            Ok(S3Operation::DeleteObject)
        }
        Method::POST => {
            if query_has(query, "uploads") {
                return Ok(S3Operation::CreateMultipartUpload);
            }
            if query_has(query, "uploadId") {
                return Ok(S3Operation::CompleteMultipartUpload);
            }
            Err(S3Error::new(S3ErrorCode::MethodNotAllowed))
        }
        _ => Err(S3Error::new(S3ErrorCode::MethodNotAllowed)),
    }
}
