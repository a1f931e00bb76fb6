//! The object controller: PUT/GET/HEAD/DELETE, copy, tagging, and the ACL
//! stub.

use std::collections::BTreeMap;
use std::str::FromStr;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use http::{Response, StatusCode};
use md5::{Digest, Md5};
use percent_encoding::percent_decode_str;

use barrel_core::events::EventKind;
use barrel_core::store::{ObjectMetadata, SubresourceKind, metadata_for_put};
use barrel_model::output::{AccessControlPolicy, CopyObjectResult};
use barrel_model::types::{MetadataDirective, Owner, StorageClass, Tagging};
use barrel_model::{S3Error, S3ErrorCode};
use barrel_xml::{from_xml, to_xml};

use crate::body::S3ResponseBody;
use crate::handlers::{OpContext, emit_event, malformed_xml, xml_serialize_failed};
use crate::response::{empty_response, http_date, quoted_etag, set_header, xml_response};
use crate::service::ServiceState;

type HandlerResult = Result<Response<S3ResponseBody>, S3Error>;

/// The GET/HEAD query parameters that may override response headers, and
/// the headers they map to.
const OVERRIDABLE_HEADERS: [(&str, &str); 6] = [
    ("response-content-type", "content-type"),
    ("response-content-language", "content-language"),
    ("response-expires", "expires"),
    ("response-cache-control", "cache-control"),
    ("response-content-disposition", "content-disposition"),
    ("response-content-encoding", "content-encoding"),
];

// ---------------------------------------------------------------------------
// PUT
// ---------------------------------------------------------------------------

/// `PUT /{bucket}/{key}` — store an object.
pub async fn put_object(
    state: &ServiceState,
    ctx: &OpContext,
    parts: &http::request::Parts,
    body: &Bytes,
) -> HandlerResult {
    let bucket = ctx.bucket()?;
    let key = ctx.key()?;

    verify_content_md5(parts, body)?;
    let metadata = metadata_from_request(parts, &ctx.query)?;
    let stored = state.store.put_object(bucket, key, body, metadata).await?;

    emit_event(
        state,
        ctx,
        EventKind::Put,
        bucket,
        key,
        Some(stored.size),
        Some(stored.etag.clone()),
    );

    let mut response = empty_response(StatusCode::OK)?;
    set_header(&mut response, "etag", &quoted_etag(&stored.etag));
    Ok(response)
}

/// `PUT /{bucket}/{key}` with `x-amz-copy-source` — CopyObject.
pub async fn copy_object(
    state: &ServiceState,
    ctx: &OpContext,
    parts: &http::request::Parts,
) -> HandlerResult {
    let dst_bucket = ctx.bucket()?;
    let dst_key = ctx.key()?;

    let (src_bucket, src_key) = parse_copy_source(parts)?;
    let directive = match header_str(parts, "x-amz-metadata-directive") {
        Some(raw) => MetadataDirective::from_str(raw)?,
        None => MetadataDirective::default(),
    };

    if src_bucket == dst_bucket && src_key == dst_key && directive == MetadataDirective::Copy {
        return Err(S3Error::with_message(
            S3ErrorCode::InvalidRequest,
            "This copy request is illegal because it is being performed on itself without changing the object's metadata, storage class, website redirect location or encryption attributes.",
        ));
    }

    if state.store.get_bucket(&src_bucket).await?.is_none() {
        return Err(S3Error::new(S3ErrorCode::NoSuchBucket).with_extra("BucketName", src_bucket));
    }
    let source = state
        .store
        .get_object(&src_bucket, &src_key)
        .await?
        .ok_or_else(|| S3Error::new(S3ErrorCode::NoSuchKey).with_extra("Key", src_key.clone()))?;

    let metadata = match directive {
        MetadataDirective::Copy => {
            let mut metadata = source.metadata.clone();
            // The storage class may change even on a metadata-preserving copy.
            if let Some(class) = header_str(parts, "x-amz-storage-class") {
                metadata.storage_class = class.parse()?;
            }
            metadata
        }
        MetadataDirective::Replace => metadata_from_request(parts, &ctx.query)?,
    };

    let stored = state
        .store
        .put_object(dst_bucket, dst_key, &source.content, metadata)
        .await?;

    emit_event(
        state,
        ctx,
        EventKind::Copy,
        dst_bucket,
        dst_key,
        Some(stored.size),
        Some(stored.etag.clone()),
    );

    let result = CopyObjectResult {
        last_modified: stored.last_modified,
        etag: quoted_etag(&stored.etag),
    };
    xml_response(StatusCode::OK, to_xml("CopyObjectResult", &result).map_err(xml_serialize_failed)?)
}

// ---------------------------------------------------------------------------
// GET / HEAD
// ---------------------------------------------------------------------------

/// `GET /{bucket}/{key}` and `HEAD /{bucket}/{key}`.
pub async fn get_object(
    state: &ServiceState,
    ctx: &OpContext,
    parts: &http::request::Parts,
    include_body: bool,
) -> HandlerResult {
    let bucket = ctx.bucket()?;
    let key = ctx.key()?;

    let overrides = validate_overrides(ctx)?;

    if state.store.get_bucket(bucket).await?.is_none() {
        return Err(S3Error::new(S3ErrorCode::NoSuchBucket).with_extra("BucketName", bucket));
    }
    let metadata = state
        .store
        .head_object(bucket, key)
        .await?
        .ok_or_else(|| S3Error::new(S3ErrorCode::NoSuchKey).with_extra("Key", key))?;

    if let Some(response) = evaluate_conditionals(parts, &metadata)? {
        return Ok(response);
    }

    let range = match header_str(parts, "range") {
        Some(raw) => resolve_range(raw, metadata.size),
        None => RangeOutcome::Full,
    };

    let (status, start_end) = match range {
        RangeOutcome::Full => (StatusCode::OK, None),
        RangeOutcome::Partial(start, end) => (StatusCode::PARTIAL_CONTENT, Some((start, end))),
        RangeOutcome::Unsatisfiable => {
            return Err(S3Error::new(S3ErrorCode::InvalidRange)
                .with_extra("ActualObjectSize", metadata.size.to_string()));
        }
    };

    let content = if include_body {
        let stored = match start_end {
            Some((start, end)) => state.store.get_object_range(bucket, key, start, end).await?,
            None => state.store.get_object(bucket, key).await?,
        }
        .ok_or_else(|| S3Error::new(S3ErrorCode::NoSuchKey).with_extra("Key", key))?;
        Some(stored.content)
    } else {
        None
    };

    let content_length = match start_end {
        Some((start, end)) => end - start + 1,
        None => metadata.size,
    };

    let mut response = Response::builder()
        .status(status)
        .body(match content {
            Some(bytes) => S3ResponseBody::from_bytes(bytes),
            None => S3ResponseBody::empty(),
        })
        .map_err(|err| S3Error::internal_error(err.to_string()))?;

    set_header(&mut response, "content-type", &metadata.content_type);
    set_header(&mut response, "etag", &quoted_etag(&metadata.etag));
    set_header(&mut response, "last-modified", &http_date(&metadata.last_modified));
    set_header(&mut response, "accept-ranges", "bytes");
    set_header(&mut response, "content-length", &content_length.to_string());
    if let Some((start, end)) = start_end {
        set_header(
            &mut response,
            "content-range",
            &format!("bytes {start}-{end}/{}", metadata.size),
        );
    }
    if metadata.storage_class != StorageClass::Standard {
        set_header(&mut response, "x-amz-storage-class", metadata.storage_class.as_str());
    }
    if let Some(location) = &metadata.website_redirect_location {
        set_header(&mut response, "x-amz-website-redirect-location", location);
    }
    for (name, value) in &metadata.user_metadata {
        if let (Ok(header_name), Ok(header_value)) = (
            http::header::HeaderName::from_bytes(name.as_bytes()),
            http::header::HeaderValue::from_str(value),
        ) {
            response.headers_mut().insert(header_name, header_value);
        }
    }

    for (header, value) in overrides {
        set_header(&mut response, header, &value);
    }

    Ok(response)
}

// ---------------------------------------------------------------------------
// DELETE
// ---------------------------------------------------------------------------

/// `DELETE /{bucket}/{key}`.
pub async fn delete_object(state: &ServiceState, ctx: &OpContext) -> HandlerResult {
    let bucket = ctx.bucket()?;
    let key = ctx.key()?;
    let existed = state.store.delete_object(bucket, key).await?;
    if existed {
        emit_event(state, ctx, EventKind::Delete, bucket, key, None, None);
    }
    empty_response(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// Tagging / ACL subresources
// ---------------------------------------------------------------------------

/// `GET /{bucket}/{key}?tagging`.
pub async fn get_object_tagging(state: &ServiceState, ctx: &OpContext) -> HandlerResult {
    let bucket = ctx.bucket()?;
    let key = ctx.key()?;
    require_object(state, bucket, key).await?;

    match state
        .store
        .get_subresource(bucket, Some(key), SubresourceKind::Tagging)
        .await?
    {
        Some(xml) => xml_response(StatusCode::OK, xml.into_bytes()),
        None => xml_response(StatusCode::OK, to_xml("Tagging", &Tagging::default()).map_err(xml_serialize_failed)?),
    }
}

/// `PUT /{bucket}/{key}?tagging`.
pub async fn put_object_tagging(
    state: &ServiceState,
    ctx: &OpContext,
    body: &Bytes,
) -> HandlerResult {
    let bucket = ctx.bucket()?;
    let key = ctx.key()?;
    require_object(state, bucket, key).await?;

    let _parsed: Tagging = from_xml(body).map_err(malformed_xml)?;
    state
        .store
        .put_subresource(
            bucket,
            Some(key),
            SubresourceKind::Tagging,
            &String::from_utf8_lossy(body),
        )
        .await?;
    empty_response(StatusCode::OK)
}

/// `DELETE /{bucket}/{key}?tagging`.
pub async fn delete_object_tagging(state: &ServiceState, ctx: &OpContext) -> HandlerResult {
    let bucket = ctx.bucket()?;
    let key = ctx.key()?;
    require_object(state, bucket, key).await?;
    state
        .store
        .delete_subresource(bucket, Some(key), SubresourceKind::Tagging)
        .await?;
    empty_response(StatusCode::NO_CONTENT)
}

/// `GET /{bucket}/{key}?acl` — the stub full-control policy.
pub async fn get_object_acl(state: &ServiceState, ctx: &OpContext) -> HandlerResult {
    require_object(state, ctx.bucket()?, ctx.key()?).await?;
    let policy = AccessControlPolicy {
        owner: Owner::default(),
    };
    xml_response(StatusCode::OK, to_xml("AccessControlPolicy", &policy).map_err(xml_serialize_failed)?)
}

/// `PUT /{bucket}/{key}?acl` — accepted and discarded.
pub async fn put_object_acl(state: &ServiceState, ctx: &OpContext) -> HandlerResult {
    require_object(state, ctx.bucket()?, ctx.key()?).await?;
    empty_response(StatusCode::OK)
}

async fn require_object(state: &ServiceState, bucket: &str, key: &str) -> Result<(), S3Error> {
    if state.store.get_bucket(bucket).await?.is_none() {
        return Err(S3Error::new(S3ErrorCode::NoSuchBucket).with_extra("BucketName", bucket));
    }
    if state.store.head_object(bucket, key).await?.is_none() {
        return Err(S3Error::new(S3ErrorCode::NoSuchKey).with_extra("Key", key));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Request attribute extraction
// ---------------------------------------------------------------------------

pub(crate) fn header_str<'a>(parts: &'a http::request::Parts, name: &str) -> Option<&'a str> {
    parts.headers.get(name).and_then(|v| v.to_str().ok())
}

/// Build object metadata from a PUT/copy/initiate request.
///
/// `x-amz-meta-*` pairs are collected from both headers and query
/// parameters (presigned uploads); names are ASCII-lowercased, values are
/// preserved byte-for-byte.
pub(crate) fn metadata_from_request(
    parts: &http::request::Parts,
    query: &[(String, String)],
) -> Result<ObjectMetadata, S3Error> {
    let content_type = header_str(parts, "content-type").map(str::to_owned);
    let storage_class = match header_str(parts, "x-amz-storage-class") {
        Some(raw) => raw.parse::<StorageClass>()?,
        None => StorageClass::default(),
    };
    let website_redirect_location =
        header_str(parts, "x-amz-website-redirect-location").map(str::to_owned);

    let mut user_metadata = BTreeMap::new();
    for (name, value) in parts.headers.iter() {
        let name = name.as_str().to_ascii_lowercase();
        if name.starts_with("x-amz-meta-") {
            if let Ok(value) = value.to_str() {
                user_metadata.insert(name, value.to_owned());
            }
        }
    }
    for (name, value) in query {
        let lowered = name.to_ascii_lowercase();
        if lowered.starts_with("x-amz-meta-") {
            user_metadata.insert(lowered, value.clone());
        }
    }

    Ok(metadata_for_put(
        content_type,
        storage_class,
        website_redirect_location,
        user_metadata,
    ))
}

/// Verify the `Content-MD5` header against the body, when present.
fn verify_content_md5(parts: &http::request::Parts, body: &Bytes) -> Result<(), S3Error> {
    let Some(declared) = header_str(parts, "content-md5") else {
        return Ok(());
    };
    let decoded = BASE64
        .decode(declared)
        .ok()
        .filter(|bytes| bytes.len() == 16)
        .ok_or_else(|| S3Error::new(S3ErrorCode::InvalidDigest))?;
    if decoded != Md5::digest(body).as_slice() {
        return Err(S3Error::new(S3ErrorCode::BadDigest));
    }
    Ok(())
}

/// Parse `x-amz-copy-source: /{bucket}/{key}` (URL-encoded, optional
/// leading slash and `?versionId` suffix).
pub(crate) fn parse_copy_source(
    parts: &http::request::Parts,
) -> Result<(String, String), S3Error> {
    let raw = header_str(parts, "x-amz-copy-source").ok_or_else(|| {
        S3Error::invalid_argument("Missing copy source", "x-amz-copy-source", "")
    })?;
    let raw = raw.split('?').next().unwrap_or(raw);
    let decoded = percent_decode_str(raw).decode_utf8_lossy().into_owned();
    let trimmed = decoded.strip_prefix('/').unwrap_or(&decoded);
    match trimmed.split_once('/') {
        Some((bucket, key)) if !bucket.is_empty() && !key.is_empty() => {
            Ok((bucket.to_owned(), key.to_owned()))
        }
        _ => Err(S3Error::invalid_argument(
            "Copy Source must mention the source bucket and key: sourcebucket/sourcekey",
            "x-amz-copy-source",
            raw,
        )),
    }
}

/// Validate `response-*` header overrides and return `(header, value)`
/// pairs to apply.
fn validate_overrides(ctx: &OpContext) -> Result<Vec<(&'static str, String)>, S3Error> {
    let mut overrides = Vec::new();
    for (name, value) in &ctx.query {
        if !name.starts_with("response-") {
            continue;
        }
        let Some((_, header)) = OVERRIDABLE_HEADERS
            .iter()
            .find(|(param, _)| *param == name.as_str())
        else {
            return Err(S3Error::invalid_argument(
                format!("{name} is not an overridable response header"),
                name,
                value,
            ));
        };
        overrides.push((*header, value.clone()));
    }
    if !overrides.is_empty() && !ctx.is_signed() {
        return Err(S3Error::with_message(
            S3ErrorCode::InvalidRequest,
            "Request specific response headers cannot be used for anonymous GET requests.",
        ));
    }
    Ok(overrides)
}

// ---------------------------------------------------------------------------
// Conditional requests
// ---------------------------------------------------------------------------

/// Evaluate `If-Match` / `If-None-Match` / `If-(Un)Modified-Since`.
///
/// Returns `Some(304 response)` when the client's cached copy is current;
/// fails with `PreconditionFailed` when a strong precondition breaks.
fn evaluate_conditionals(
    parts: &http::request::Parts,
    metadata: &ObjectMetadata,
) -> Result<Option<Response<S3ResponseBody>>, S3Error> {
    let etag = &metadata.etag;

    if let Some(expected) = header_str(parts, "if-match") {
        let matched = expected == "*"
            || expected
                .split(',')
                .any(|candidate| candidate.trim().trim_matches('"') == etag);
        if !matched {
            return Err(S3Error::new(S3ErrorCode::PreconditionFailed));
        }
    }

    if let Some(raw) = header_str(parts, "if-unmodified-since") {
        if let Some(threshold) = parse_http_date(raw) {
            if metadata.last_modified > threshold {
                return Err(S3Error::new(S3ErrorCode::PreconditionFailed));
            }
        }
    }

    let none_match_hit = header_str(parts, "if-none-match").is_some_and(|expected| {
        expected == "*"
            || expected
                .split(',')
                .any(|candidate| candidate.trim().trim_matches('"') == etag)
    });
    let modified_since_miss = header_str(parts, "if-modified-since")
        .and_then(parse_http_date)
        .is_some_and(|threshold| metadata.last_modified <= threshold);

    if none_match_hit || modified_since_miss {
        let mut response = Response::builder()
            .status(StatusCode::NOT_MODIFIED)
            .body(S3ResponseBody::empty())
            .map_err(|err| S3Error::internal_error(err.to_string()))?;
        set_header(&mut response, "etag", &quoted_etag(etag));
        set_header(&mut response, "last-modified", &http_date(&metadata.last_modified));
        return Ok(Some(response));
    }

    Ok(None)
}

fn parse_http_date(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
}

// ---------------------------------------------------------------------------
// Range resolution
// ---------------------------------------------------------------------------

/// The outcome of resolving a `Range` header against an object size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RangeOutcome {
    /// No (or unparseable) range: serve the whole entity as 200.
    Full,
    /// Serve `[start, end]` inclusive as 206.
    Partial(u64, u64),
    /// Wholly out of bounds: 416.
    Unsatisfiable,
}

/// Resolve a `Range: bytes=…` header.
///
/// Partially out-of-bounds ranges clamp to the object end; wholly
/// out-of-bounds ranges are unsatisfiable; malformed headers are ignored.
pub(crate) fn resolve_range(raw: &str, size: u64) -> RangeOutcome {
    let Some(spec) = raw.strip_prefix("bytes=") else {
        return RangeOutcome::Full;
    };
    let Some((start_raw, end_raw)) = spec.split_once('-') else {
        return RangeOutcome::Full;
    };

    if start_raw.is_empty() {
        // Suffix range: the last N bytes.
        let Ok(suffix) = end_raw.parse::<u64>() else {
            return RangeOutcome::Full;
        };
        if suffix == 0 || size == 0 {
            return RangeOutcome::Unsatisfiable;
        }
        return RangeOutcome::Partial(size.saturating_sub(suffix), size - 1);
    }

    let Ok(start) = start_raw.parse::<u64>() else {
        return RangeOutcome::Full;
    };
    if size == 0 || start > size - 1 {
        return RangeOutcome::Unsatisfiable;
    }

    let end = if end_raw.is_empty() {
        size - 1
    } else {
        match end_raw.parse::<u64>() {
            // Clamp a partially out-of-bounds end to the object end.
            Ok(end) => end.min(size - 1),
            Err(_) => return RangeOutcome::Full,
        }
    };

    if end < start {
        return RangeOutcome::Full;
    }
    RangeOutcome::Partial(start, end)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_resolve_in_bounds_range() {
        assert_eq!(resolve_range("bytes=0-4", 10), RangeOutcome::Partial(0, 4));
        assert_eq!(resolve_range("bytes=5-9", 10), RangeOutcome::Partial(5, 9));
    }

    #[test]
    fn test_should_serve_open_ended_range_as_full_206() {
        assert_eq!(resolve_range("bytes=0-", 10), RangeOutcome::Partial(0, 9));
        assert_eq!(resolve_range("bytes=4-", 10), RangeOutcome::Partial(4, 9));
    }

    #[test]
    fn test_should_clamp_partially_out_of_bounds_range() {
        assert_eq!(resolve_range("bytes=5-100", 10), RangeOutcome::Partial(5, 9));
    }

    #[test]
    fn test_should_reject_wholly_out_of_bounds_range() {
        assert_eq!(resolve_range("bytes=10-20", 10), RangeOutcome::Unsatisfiable);
        assert_eq!(resolve_range("bytes=0-4", 0), RangeOutcome::Unsatisfiable);
    }

    #[test]
    fn test_should_resolve_suffix_range() {
        assert_eq!(resolve_range("bytes=-3", 10), RangeOutcome::Partial(7, 9));
        assert_eq!(resolve_range("bytes=-100", 10), RangeOutcome::Partial(0, 9));
        assert_eq!(resolve_range("bytes=-0", 10), RangeOutcome::Unsatisfiable);
    }

    #[test]
    fn test_should_ignore_malformed_range() {
        assert_eq!(resolve_range("bytes=a-b", 10), RangeOutcome::Full);
        assert_eq!(resolve_range("items=0-4", 10), RangeOutcome::Full);
        assert_eq!(resolve_range("bytes=9-2", 10), RangeOutcome::Full);
    }

    #[test]
    fn test_should_parse_copy_source_forms() {
        let parts = |value: &str| {
            http::Request::builder()
                .uri("/")
                .header("x-amz-copy-source", value)
                .body(())
                .expect("valid request")
                .into_parts()
                .0
        };

        assert_eq!(
            parse_copy_source(&parts("/src-bucket/a/b.txt")).unwrap(),
            ("src-bucket".to_owned(), "a/b.txt".to_owned())
        );
        assert_eq!(
            parse_copy_source(&parts("src-bucket/a%20b.txt")).unwrap(),
            ("src-bucket".to_owned(), "a b.txt".to_owned())
        );
        assert_eq!(
            parse_copy_source(&parts("/src-bucket/key?versionId=null")).unwrap(),
            ("src-bucket".to_owned(), "key".to_owned())
        );
        assert!(parse_copy_source(&parts("/just-a-bucket")).is_err());
    }
}
