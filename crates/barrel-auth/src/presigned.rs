//! Presigned-URL (query string) SigV4 verification.
//!
//! Presigned requests carry the whole credential set in the query string:
//! `X-Amz-Algorithm`, `X-Amz-Credential`, `X-Amz-Date`, `X-Amz-Expires`,
//! `X-Amz-SignedHeaders`, and `X-Amz-Signature`. The canonical request is
//! rebuilt the same way as for header-signed requests, except the signature
//! parameter itself is excluded from the canonical query and the payload is
//! unsigned unless declared otherwise.

use chrono::{DateTime, Duration, Utc};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use tracing::debug;

use crate::canonical::{
    build_canonical_request, canonical_headers, canonical_query, canonical_uri,
    signed_headers_string,
};
use crate::credentials::AccountRegistry;
use crate::error::AuthError;
use crate::sigv4::{
    ALGORITHM, SignedIdentity, UNSIGNED_PAYLOAD, build_string_to_sign, compute_signature,
    derive_signing_key, parse_amz_date,
};

/// The query parameters a presigned URL must carry.
const REQUIRED_PARAMS: [&str; 6] = [
    "X-Amz-Algorithm",
    "X-Amz-Credential",
    "X-Amz-Date",
    "X-Amz-Expires",
    "X-Amz-SignedHeaders",
    "X-Amz-Signature",
];

/// Maximum presign lifetime: seven days, in seconds.
const MAX_EXPIRES: i64 = 604_800;

/// Verify a presigned request.
///
/// # Errors
///
/// Returns an [`AuthError`] when the parameter set is incomplete, the URL
/// has expired, or the signature does not match.
pub fn verify_presigned(
    parts: &http::request::Parts,
    bucket: Option<&str>,
    key: Option<&str>,
    query_pairs: &[(String, String)],
    registry: &AccountRegistry,
    now: DateTime<Utc>,
    allow_mismatched: bool,
) -> Result<SignedIdentity, AuthError> {
    for required in REQUIRED_PARAMS {
        if !query_pairs.iter().any(|(name, _)| name == required) {
            return Err(AuthError::QueryParameters(format!(
                "Query-string authentication version 4 requires the {} parameter",
                REQUIRED_PARAMS.join(", ")
            )));
        }
    }

    let algorithm = query_value(query_pairs, "X-Amz-Algorithm").unwrap_or_default();
    if algorithm != ALGORITHM {
        return Err(AuthError::QueryParameters(format!(
            "Unsupported Algorithm: {algorithm}"
        )));
    }

    let credential = query_value(query_pairs, "X-Amz-Credential").unwrap_or_default();
    let cred_parts: Vec<&str> = credential.splitn(5, '/').collect();
    if cred_parts.len() != 5 || cred_parts[4] != "aws4_request" {
        return Err(AuthError::QueryParameters(format!(
            "Invalid credential scope: {credential}"
        )));
    }
    let (access_key_id, date, region, service) =
        (cred_parts[0], cred_parts[1], cred_parts[2], cred_parts[3]);

    let account = registry
        .lookup(access_key_id)
        .ok_or_else(|| AuthError::InvalidAccessKeyId(access_key_id.to_owned()))?
        .clone();

    let timestamp_str = query_value(query_pairs, "X-Amz-Date").unwrap_or_default();
    let timestamp = parse_amz_date(timestamp_str)?;

    let expires: i64 = query_value(query_pairs, "X-Amz-Expires")
        .unwrap_or_default()
        .parse()
        .map_err(|_| {
            AuthError::QueryParameters("X-Amz-Expires must be a number of seconds".to_owned())
        })?;
    if !(1..=MAX_EXPIRES).contains(&expires) {
        return Err(AuthError::AccessDenied(format!(
            "X-Amz-Expires must be between 1 and {MAX_EXPIRES} seconds"
        )));
    }
    if timestamp + Duration::seconds(expires) < now {
        return Err(AuthError::AccessDenied("Request has expired".to_owned()));
    }

    let signed_headers: Vec<String> = query_value(query_pairs, "X-Amz-SignedHeaders")
        .unwrap_or_default()
        .split(';')
        .map(str::to_owned)
        .collect();
    let provided_signature = query_value(query_pairs, "X-Amz-Signature")
        .unwrap_or_default()
        .to_owned();

    let mut header_pairs = Vec::with_capacity(signed_headers.len());
    for name in &signed_headers {
        let value = parts
            .headers
            .get(name.as_str())
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| {
                AuthError::AccessDenied(format!("Signed header '{name}' is missing from the request"))
            })?;
        header_pairs.push((name.clone(), value.to_owned()));
    }

    // Presigned payloads are unsigned unless the client declared a hash.
    let payload_hash = parts
        .headers
        .get("x-amz-content-sha256")
        .and_then(|v| v.to_str().ok())
        .unwrap_or(UNSIGNED_PAYLOAD)
        .to_owned();

    let canonical_request = build_canonical_request(
        parts.method.as_str(),
        &canonical_uri("", bucket, key),
        &canonical_query(query_pairs),
        &canonical_headers(&header_pairs),
        &signed_headers_string(&signed_headers),
        &payload_hash,
    );

    debug!(canonical_request, "reconstructed presigned canonical request");

    let scope = format!("{date}/{region}/{service}/aws4_request");
    let string_to_sign = build_string_to_sign(
        timestamp_str,
        &scope,
        &hex::encode(Sha256::digest(canonical_request.as_bytes())),
    );

    let signing_key = derive_signing_key(&account.secret_access_key, date, region, service);
    let expected = compute_signature(&signing_key, &string_to_sign);

    let matches: bool = expected
        .as_bytes()
        .ct_eq(provided_signature.as_bytes())
        .into();
    if !matches && !allow_mismatched {
        debug!(%expected, provided = %provided_signature, "presigned signature mismatch");
        return Err(AuthError::SignatureDoesNotMatch { string_to_sign });
    }

    Ok(SignedIdentity {
        account,
        chunk_context: None,
    })
}

fn query_value<'a>(pairs: &'a [(String, String)], name: &str) -> Option<&'a str> {
    pairs
        .iter()
        .find(|(n, _)| n == name)
        .map(|(_, v)| v.as_str())
}
