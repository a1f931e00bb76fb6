//! AWS Signature Version 4 verification.
//!
//! [`authenticate`] is the single entry point: it detects which
//! authentication form the request carries (Authorization header, presigned
//! query string, legacy v2, or none), rejects ambiguous combinations, and
//! verifies the signature by reconstructing the canonical request.
//!
//! The flow for a header-signed request:
//!
//! 1. Parse the `Authorization` header into credential scope, signed header
//!    list, and signature.
//! 2. Check the request timestamp against the server clock (±15 minutes).
//! 3. Rebuild the canonical request; the URI is always the path-style
//!    `/{bucket}/{key}` form regardless of how the client addressed the
//!    bucket.
//! 4. Derive the signing key through the HMAC chain and compare signatures
//!    in constant time.

use chrono::{DateTime, Duration, TimeZone, Utc};
use hmac::{Hmac, Mac};
use http::Method;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use tracing::debug;

use crate::canonical::{
    build_canonical_request, canonical_headers, canonical_query, canonical_uri, parse_query,
    signed_headers_string,
};
use crate::credentials::{Account, AccountRegistry};
use crate::error::AuthError;
use crate::presigned;

/// The only supported signing algorithm.
pub const ALGORITHM: &str = "AWS4-HMAC-SHA256";

/// Sentinel payload hash for unsigned bodies.
pub const UNSIGNED_PAYLOAD: &str = "UNSIGNED-PAYLOAD";

/// Sentinel payload hash declaring an `aws-chunked` signed streaming body.
pub const STREAMING_PAYLOAD: &str = "STREAMING-AWS4-HMAC-SHA256-PAYLOAD";

/// Maximum allowed distance between request and server time.
pub const MAX_SKEW_SECONDS: i64 = 900;

type HmacSha256 = Hmac<Sha256>;

/// The outcome of request authentication.
#[derive(Debug, Clone)]
pub enum Authentication {
    /// No authentication mechanism was present.
    Anonymous,
    /// The request carried a valid SigV4 signature.
    Signed(SignedIdentity),
}

impl Authentication {
    /// Whether the request was signed.
    #[must_use]
    pub fn is_signed(&self) -> bool {
        matches!(self, Self::Signed(_))
    }
}

/// A verified signer, plus the context needed to validate a chunked body.
#[derive(Debug, Clone)]
pub struct SignedIdentity {
    /// The account that signed the request.
    pub account: Account,
    /// Present when the payload is `STREAMING-AWS4-HMAC-SHA256-PAYLOAD`.
    pub chunk_context: Option<ChunkContext>,
}

/// Everything needed to verify the per-chunk signature chain of a streaming
/// upload.
#[derive(Debug, Clone)]
pub struct ChunkContext {
    /// The derived signing key.
    pub signing_key: Vec<u8>,
    /// The request timestamp in ISO 8601 basic form.
    pub timestamp: String,
    /// The credential scope `{date}/{region}/{service}/aws4_request`.
    pub scope: String,
    /// The request signature; seed of the chunk signature chain.
    pub seed_signature: String,
}

/// Parsed components of a SigV4 `Authorization` header.
#[derive(Debug, Clone)]
struct ParsedAuthorization {
    access_key_id: String,
    date: String,
    region: String,
    service: String,
    signed_headers: Vec<String>,
    signature: String,
}

/// Authenticate an HTTP request.
///
/// `bucket` and `key` are the resolved (decoded) target; the canonical URI
/// is rebuilt from them in path-style form. `now` is injected for testability
/// and is always UTC.
///
/// # Errors
///
/// Returns an [`AuthError`] describing the failure; the caller converts it
/// into the S3 error envelope.
pub fn authenticate(
    parts: &http::request::Parts,
    bucket: Option<&str>,
    key: Option<&str>,
    registry: &AccountRegistry,
    now: DateTime<Utc>,
    allow_mismatched: bool,
) -> Result<Authentication, AuthError> {
    let query_pairs = parse_query(parts.uri.query().unwrap_or(""));
    let auth_header = parts
        .headers
        .get(http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());
    let has_presigned = query_pairs.iter().any(|(name, _)| name == "X-Amz-Algorithm");

    // Legacy v2 signatures are always rejected.
    let has_v2_header = auth_header.is_some_and(|h| h.starts_with("AWS ") && !h.starts_with(ALGORITHM));
    let has_v2_query = query_pairs.iter().any(|(name, _)| name == "AWSAccessKeyId");
    if has_v2_header || has_v2_query {
        return Err(AuthError::LegacySignatureVersion);
    }

    match (auth_header, has_presigned) {
        (Some(_), true) => Err(AuthError::MultipleAuthMechanisms),
        (Some(header), false) => verify_header_auth(
            parts,
            header,
            bucket,
            key,
            &query_pairs,
            registry,
            now,
            allow_mismatched,
        )
        .map(Authentication::Signed),
        (None, true) => presigned::verify_presigned(
            parts,
            bucket,
            key,
            &query_pairs,
            registry,
            now,
            allow_mismatched,
        )
        .map(Authentication::Signed),
        (None, false) => Ok(Authentication::Anonymous),
    }
}

/// Parse a SigV4 `Authorization` header value.
fn parse_authorization_header(header: &str) -> Result<ParsedAuthorization, AuthError> {
    let rest = header.strip_prefix(ALGORITHM).ok_or_else(|| {
        AuthError::MalformedHeader(format!("Unsupported algorithm in Authorization header: {header}"))
    })?;

    let mut credential = None;
    let mut signed_headers = None;
    let mut signature = None;

    for part in rest.split(',') {
        let part = part.trim();
        if let Some(value) = part.strip_prefix("Credential=") {
            credential = Some(value);
        } else if let Some(value) = part.strip_prefix("SignedHeaders=") {
            signed_headers = Some(value);
        } else if let Some(value) = part.strip_prefix("Signature=") {
            signature = Some(value);
        }
    }

    let credential = credential.ok_or_else(|| {
        AuthError::MalformedHeader("Authorization header is missing the Credential component".to_owned())
    })?;
    let signed_headers = signed_headers.ok_or_else(|| {
        AuthError::MalformedHeader("Authorization header is missing the SignedHeaders component".to_owned())
    })?;
    let signature = signature.ok_or_else(|| {
        AuthError::MalformedHeader("Authorization header is missing the Signature component".to_owned())
    })?;

    let cred_parts: Vec<&str> = credential.splitn(5, '/').collect();
    if cred_parts.len() != 5 || cred_parts[4] != "aws4_request" {
        return Err(AuthError::MalformedHeader(format!(
            "Invalid credential scope: {credential}"
        )));
    }

    Ok(ParsedAuthorization {
        access_key_id: cred_parts[0].to_owned(),
        date: cred_parts[1].to_owned(),
        region: cred_parts[2].to_owned(),
        service: cred_parts[3].to_owned(),
        signed_headers: signed_headers.split(';').map(str::to_owned).collect(),
        signature: signature.to_owned(),
    })
}

#[allow(clippy::too_many_arguments)]
fn verify_header_auth(
    parts: &http::request::Parts,
    header: &str,
    bucket: Option<&str>,
    key: Option<&str>,
    query_pairs: &[(String, String)],
    registry: &AccountRegistry,
    now: DateTime<Utc>,
    allow_mismatched: bool,
) -> Result<SignedIdentity, AuthError> {
    let parsed = parse_authorization_header(header)?;

    let account = registry
        .lookup(&parsed.access_key_id)
        .ok_or_else(|| AuthError::InvalidAccessKeyId(parsed.access_key_id.clone()))?
        .clone();

    let timestamp = request_timestamp(parts)?;
    check_skew(timestamp, now)?;

    let payload_hash = parts
        .headers
        .get("x-amz-content-sha256")
        .and_then(|v| v.to_str().ok())
        .unwrap_or(UNSIGNED_PAYLOAD)
        .to_owned();

    let header_pairs = collect_signed_headers(parts, &parsed.signed_headers)?;
    let canonical_request = build_canonical_request(
        canonical_method(parts),
        &canonical_uri("", bucket, key),
        &canonical_query(query_pairs),
        &canonical_headers(&header_pairs),
        &signed_headers_string(&parsed.signed_headers),
        &payload_hash,
    );

    debug!(canonical_request, "reconstructed canonical request");

    let timestamp_str = format_amz_date(timestamp);
    let scope = format!(
        "{}/{}/{}/aws4_request",
        parsed.date, parsed.region, parsed.service
    );
    let string_to_sign = build_string_to_sign(
        &timestamp_str,
        &scope,
        &hex::encode(Sha256::digest(canonical_request.as_bytes())),
    );

    let signing_key = derive_signing_key(
        &account.secret_access_key,
        &parsed.date,
        &parsed.region,
        &parsed.service,
    );
    let expected = compute_signature(&signing_key, &string_to_sign);

    let matches: bool = expected
        .as_bytes()
        .ct_eq(parsed.signature.as_bytes())
        .into();
    if !matches && !allow_mismatched {
        debug!(%expected, provided = %parsed.signature, "signature mismatch");
        return Err(AuthError::SignatureDoesNotMatch { string_to_sign });
    }

    let chunk_context = (payload_hash == STREAMING_PAYLOAD).then(|| ChunkContext {
        signing_key,
        timestamp: timestamp_str,
        scope,
        seed_signature: parsed.signature.clone(),
    });

    Ok(SignedIdentity {
        account,
        chunk_context,
    })
}

/// The method used in the canonical request. CORS preflights sign the method
/// they are asking about, not OPTIONS itself.
fn canonical_method(parts: &http::request::Parts) -> &str {
    if parts.method == Method::OPTIONS {
        if let Some(requested) = parts
            .headers
            .get("access-control-request-method")
            .and_then(|v| v.to_str().ok())
        {
            return requested;
        }
    }
    parts.method.as_str()
}

/// Collect `(name, value)` pairs for every signed header.
fn collect_signed_headers(
    parts: &http::request::Parts,
    signed: &[String],
) -> Result<Vec<(String, String)>, AuthError> {
    let mut pairs = Vec::with_capacity(signed.len());
    for name in signed {
        let value = parts
            .headers
            .get(name.as_str())
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| {
                AuthError::AccessDenied(format!("Signed header '{name}' is missing from the request"))
            })?;
        pairs.push((name.clone(), value.to_owned()));
    }
    Ok(pairs)
}

/// Extract and parse the request timestamp from `x-amz-date` or `Date`.
pub(crate) fn request_timestamp(parts: &http::request::Parts) -> Result<DateTime<Utc>, AuthError> {
    if let Some(value) = parts
        .headers
        .get("x-amz-date")
        .and_then(|v| v.to_str().ok())
    {
        return parse_amz_date(value);
    }
    if let Some(value) = parts.headers.get(http::header::DATE).and_then(|v| v.to_str().ok()) {
        return DateTime::parse_from_rfc2822(value)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|_| AuthError::AccessDenied(format!("Invalid Date header: {value}")));
    }
    Err(AuthError::AccessDenied(
        "AWS authentication requires a valid Date or x-amz-date header".to_owned(),
    ))
}

/// Parse an ISO 8601 basic timestamp (`20130524T000000Z`).
pub(crate) fn parse_amz_date(value: &str) -> Result<DateTime<Utc>, AuthError> {
    let naive = chrono::NaiveDateTime::parse_from_str(value, "%Y%m%dT%H%M%SZ")
        .map_err(|_| AuthError::AccessDenied(format!("Invalid X-Amz-Date: {value}")))?;
    Ok(Utc.from_utc_datetime(&naive))
}

/// Format a timestamp in ISO 8601 basic form.
#[must_use]
pub fn format_amz_date(ts: DateTime<Utc>) -> String {
    ts.format("%Y%m%dT%H%M%SZ").to_string()
}

/// Reject requests whose timestamp is more than 15 minutes from server time.
pub(crate) fn check_skew(request: DateTime<Utc>, now: DateTime<Utc>) -> Result<(), AuthError> {
    let skew = (now - request).num_seconds().abs();
    if skew > MAX_SKEW_SECONDS {
        return Err(AuthError::RequestTimeTooSkewed {
            request_time: format_amz_date(request),
            server_time: format_amz_date(now),
        });
    }
    Ok(())
}

/// Build the SigV4 string to sign.
#[must_use]
pub fn build_string_to_sign(timestamp: &str, scope: &str, canonical_hash: &str) -> String {
    format!("{ALGORITHM}\n{timestamp}\n{scope}\n{canonical_hash}")
}

/// Derive the SigV4 signing key through the HMAC chain.
///
/// ```text
/// kDate    = HMAC("AWS4" + secret, date)
/// kRegion  = HMAC(kDate, region)
/// kService = HMAC(kRegion, service)
/// kSigning = HMAC(kService, "aws4_request")
/// ```
#[must_use]
pub fn derive_signing_key(secret: &str, date: &str, region: &str, service: &str) -> Vec<u8> {
    let k_date = hmac_sha256(format!("AWS4{secret}").as_bytes(), date.as_bytes());
    let k_region = hmac_sha256(&k_date, region.as_bytes());
    let k_service = hmac_sha256(&k_region, service.as_bytes());
    hmac_sha256(&k_service, b"aws4_request")
}

/// HMAC the string to sign and hex-encode the result.
#[must_use]
pub fn compute_signature(signing_key: &[u8], string_to_sign: &str) -> String {
    hex::encode(hmac_sha256(signing_key, string_to_sign.as_bytes()))
}

pub(crate) fn hmac_sha256(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC accepts keys of any length");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

/// Hex SHA-256 of a payload, as used for `x-amz-content-sha256`.
#[must_use]
pub fn hash_payload(payload: &[u8]) -> String {
    hex::encode(Sha256::digest(payload))
}
