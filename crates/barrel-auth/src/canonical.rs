//! Canonical request construction.
//!
//! SigV4 signs a normalized text rendering of the request. The rules applied
//! here:
//!
//! - **URI**: each path segment RFC-3986 percent-encoded with the AWS
//!   unreserved set, `/` preserved. The bucket always appears as a path
//!   component, even when the client addressed it through the Host header.
//! - **Query**: every parameter except `X-Amz-Signature`, re-encoded,
//!   `=` always present, sorted by name then value.
//! - **Headers**: lowercased names, values trimmed and internal whitespace
//!   runs collapsed to a single space, sorted, each pair terminated by `\n`.
//! - **Payload**: the value of `x-amz-content-sha256` verbatim, or
//!   `UNSIGNED-PAYLOAD`.

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, percent_decode_str, utf8_percent_encode};

/// Everything except RFC-3986 unreserved characters is percent-encoded.
const AWS_STRICT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// Like [`AWS_STRICT`] but preserving `/`, for path encoding.
const AWS_PATH: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~')
    .remove(b'/');

/// Percent-encode a string with the AWS SigV4 character set.
///
/// With `encode_slash` false, `/` is left intact (used for URI paths).
#[must_use]
pub fn uri_encode(input: &str, encode_slash: bool) -> String {
    let set = if encode_slash { AWS_STRICT } else { AWS_PATH };
    utf8_percent_encode(input, set).to_string()
}

/// Build the canonical URI for a bucket/key pair.
///
/// The bucket segment is always present as a path component regardless of
/// how the client addressed the bucket; SDKs sign against the path-style
/// form. `mount` is the sub-path prefix the service is mounted at (empty for
/// root mounts).
#[must_use]
pub fn canonical_uri(mount: &str, bucket: Option<&str>, key: Option<&str>) -> String {
    let mut uri = String::from(mount.trim_end_matches('/'));
    match (bucket, key) {
        (Some(bucket), Some(key)) => {
            uri.push('/');
            uri.push_str(&uri_encode(bucket, true));
            uri.push('/');
            uri.push_str(&uri_encode(key, false));
        }
        (Some(bucket), None) => {
            uri.push('/');
            uri.push_str(&uri_encode(bucket, true));
        }
        _ => uri.push('/'),
    }
    uri
}

/// Parse a raw query string into decoded name/value pairs, preserving order.
#[must_use]
pub fn parse_query(query: &str) -> Vec<(String, String)> {
    query
        .split('&')
        .filter(|s| !s.is_empty())
        .map(|pair| match pair.split_once('=') {
            Some((name, value)) => (decode(name), decode(value)),
            None => (decode(pair), String::new()),
        })
        .collect()
}

fn decode(s: &str) -> String {
    // Query components encode spaces as '+' in some clients.
    let s = s.replace('+', " ");
    percent_decode_str(&s).decode_utf8_lossy().into_owned()
}

/// Build the canonical query string.
///
/// `X-Amz-Signature` is excluded (it cannot sign itself); the remaining
/// parameters are strictly encoded and sorted by name, then value.
#[must_use]
pub fn canonical_query(pairs: &[(String, String)]) -> String {
    let mut encoded: Vec<(String, String)> = pairs
        .iter()
        .filter(|(name, _)| name != "X-Amz-Signature")
        .map(|(name, value)| (uri_encode(name, true), uri_encode(value, true)))
        .collect();
    encoded.sort();
    encoded
        .iter()
        .map(|(name, value)| format!("{name}={value}"))
        .collect::<Vec<_>>()
        .join("&")
}

/// Build the canonical headers block from `(name, value)` pairs.
///
/// Names are lowercased and sorted; values are trimmed and internal
/// whitespace runs collapse to a single space. Every pair is terminated by
/// a newline.
#[must_use]
pub fn canonical_headers(pairs: &[(String, String)]) -> String {
    let mut normalized: Vec<(String, String)> = pairs
        .iter()
        .map(|(name, value)| (name.to_ascii_lowercase(), collapse_whitespace(value)))
        .collect();
    normalized.sort();

    let mut out = String::new();
    for (name, value) in normalized {
        out.push_str(&name);
        out.push(':');
        out.push_str(&value);
        out.push('\n');
    }
    out
}

/// Trim surrounding whitespace and collapse internal runs to single spaces.
fn collapse_whitespace(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Join signed header names with `;` in sorted order.
#[must_use]
pub fn signed_headers_string(names: &[String]) -> String {
    let mut sorted: Vec<String> = names.iter().map(|n| n.to_ascii_lowercase()).collect();
    sorted.sort();
    sorted.join(";")
}

/// Assemble the full canonical request.
#[must_use]
pub fn build_canonical_request(
    method: &str,
    canonical_uri: &str,
    canonical_query: &str,
    canonical_headers: &str,
    signed_headers: &str,
    payload_hash: &str,
) -> String {
    format!(
        "{method}\n{canonical_uri}\n{canonical_query}\n{canonical_headers}\n{signed_headers}\n{payload_hash}"
    )
}
