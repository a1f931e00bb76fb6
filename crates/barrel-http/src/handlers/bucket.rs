//! The bucket controller: bucket CRUD, listings, subresource configs, and
//! bulk delete.

use http::{Response, StatusCode};

use barrel_core::events::EventKind;
use barrel_core::{cors, website};
use barrel_core::store::list::{
    MAX_KEYS_LIMIT, decode_continuation_token, encode_continuation_token,
};
use barrel_core::store::{ListParams, SubresourceKind};
use barrel_model::output::{
    AccessControlPolicy, DeleteResult, DeletedObject, ListAllMyBucketsResult, ListBucketResult,
    ListType, LocationConstraint,
};
use barrel_model::types::{CorsConfiguration, Delete, Owner, Tagging, WebsiteConfiguration};
use barrel_model::{S3Error, S3ErrorCode};
use barrel_xml::{from_xml, to_xml};
use bytes::Bytes;

use crate::body::S3ResponseBody;
use crate::handlers::{OpContext, emit_event, malformed_xml, xml_serialize_failed};
use crate::response::{empty_response, set_header, xml_response};
use crate::service::ServiceState;

type HandlerResult = Result<Response<S3ResponseBody>, S3Error>;

/// `GET /` — list all buckets.
pub async fn list_buckets(state: &ServiceState, _ctx: &OpContext) -> HandlerResult {
    let buckets = state.store.list_buckets().await?;
    let result = ListAllMyBucketsResult {
        owner: Owner::default(),
        buckets,
    };
    xml_response(StatusCode::OK, to_xml("ListAllMyBucketsResult", &result).map_err(xml_serialize_failed)?)
}

/// `PUT /{bucket}` — create a bucket.
pub async fn create_bucket(state: &ServiceState, ctx: &OpContext) -> HandlerResult {
    let bucket = ctx.bucket()?;
    state.store.create_bucket(bucket).await?;
    let mut response = empty_response(StatusCode::OK)?;
    set_header(&mut response, "location", &format!("/{bucket}"));
    Ok(response)
}

/// `HEAD /{bucket}`.
pub async fn head_bucket(state: &ServiceState, ctx: &OpContext) -> HandlerResult {
    let bucket = ctx.bucket()?;
    if state.store.get_bucket(bucket).await?.is_none() {
        return Err(S3Error::new(S3ErrorCode::NoSuchBucket));
    }
    empty_response(StatusCode::OK)
}

/// `DELETE /{bucket}`.
pub async fn delete_bucket(state: &ServiceState, ctx: &OpContext) -> HandlerResult {
    state.store.delete_bucket(ctx.bucket()?).await?;
    empty_response(StatusCode::NO_CONTENT)
}

/// `GET /{bucket}` — ListObjects (v1) and ListObjectsV2.
pub async fn list_objects(state: &ServiceState, ctx: &OpContext, v2: bool) -> HandlerResult {
    let bucket = ctx.bucket()?;

    let prefix = ctx.query_value("prefix").unwrap_or_default().to_owned();
    let delimiter = ctx
        .query_value("delimiter")
        .filter(|d| !d.is_empty())
        .map(str::to_owned);
    let max_keys = match ctx.query_value("max-keys") {
        Some(raw) => raw.parse::<u32>().map_err(|_| {
            S3Error::invalid_argument(
                "Provided max-keys is not an integer or is out of range",
                "max-keys",
                raw,
            )
        })?,
        None => MAX_KEYS_LIMIT,
    }
    .min(MAX_KEYS_LIMIT);

    let (start_after, marker, continuation_token, start_after_echo) = if v2 {
        let continuation = ctx.query_value("continuation-token").map(str::to_owned);
        let start_after = ctx.query_value("start-after").map(str::to_owned);
        let effective = continuation
            .as_deref()
            .and_then(decode_continuation_token)
            .or_else(|| start_after.clone());
        (effective, String::new(), continuation, start_after)
    } else {
        let marker = ctx.query_value("marker").unwrap_or_default().to_owned();
        let effective = (!marker.is_empty()).then(|| marker.clone());
        (effective, marker, None, None)
    };

    let page = state
        .store
        .list_objects(
            bucket,
            &ListParams {
                prefix: prefix.clone(),
                delimiter: delimiter.clone(),
                start_after,
                max_keys,
            },
        )
        .await?;

    let key_count = (page.objects.len() + page.common_prefixes.len()) as u32;
    let next_continuation_token = (v2 && page.is_truncated)
        .then(|| page.last_emitted.as_deref().map(encode_continuation_token))
        .flatten();

    let result = ListBucketResult {
        list_type: if v2 { ListType::V2 } else { ListType::V1 },
        name: bucket.to_owned(),
        prefix,
        delimiter,
        max_keys,
        is_truncated: page.is_truncated,
        contents: page.objects,
        common_prefixes: page.common_prefixes,
        marker,
        next_marker: page.next_marker,
        key_count,
        continuation_token,
        next_continuation_token,
        start_after: start_after_echo,
    };

    xml_response(StatusCode::OK, to_xml("ListBucketResult", &result).map_err(xml_serialize_failed)?)
}

// ---------------------------------------------------------------------------
// Subresources
// ---------------------------------------------------------------------------

/// `GET /{bucket}?cors`.
pub async fn get_cors(state: &ServiceState, ctx: &OpContext) -> HandlerResult {
    let bucket = ctx.bucket()?;
    match state
        .store
        .get_subresource(bucket, None, SubresourceKind::Cors)
        .await?
    {
        Some(xml) => xml_response(StatusCode::OK, xml.into_bytes()),
        None => Err(S3Error::new(S3ErrorCode::NoSuchCORSConfiguration)
            .with_extra("BucketName", bucket)),
    }
}

/// `PUT /{bucket}?cors` — validate then persist.
pub async fn put_cors(state: &ServiceState, ctx: &OpContext, body: &Bytes) -> HandlerResult {
    let bucket = ctx.bucket()?;
    let config: CorsConfiguration = from_xml(body).map_err(malformed_xml)?;
    cors::validate_config(&config)?;
    state
        .store
        .put_subresource(bucket, None, SubresourceKind::Cors, &String::from_utf8_lossy(body))
        .await?;
    empty_response(StatusCode::OK)
}

/// `DELETE /{bucket}?cors`.
pub async fn delete_cors(state: &ServiceState, ctx: &OpContext) -> HandlerResult {
    state
        .store
        .delete_subresource(ctx.bucket()?, None, SubresourceKind::Cors)
        .await?;
    empty_response(StatusCode::NO_CONTENT)
}

/// `GET /{bucket}?website`.
pub async fn get_website(state: &ServiceState, ctx: &OpContext) -> HandlerResult {
    let bucket = ctx.bucket()?;
    match state
        .store
        .get_subresource(bucket, None, SubresourceKind::Website)
        .await?
    {
        Some(xml) => xml_response(StatusCode::OK, xml.into_bytes()),
        None => Err(S3Error::new(S3ErrorCode::NoSuchWebsiteConfiguration)
            .with_extra("BucketName", bucket)),
    }
}

/// `PUT /{bucket}?website` — validate then persist.
pub async fn put_website(state: &ServiceState, ctx: &OpContext, body: &Bytes) -> HandlerResult {
    let bucket = ctx.bucket()?;
    let config: WebsiteConfiguration = from_xml(body).map_err(malformed_xml)?;
    website::validate_config(&config)?;
    state
        .store
        .put_subresource(bucket, None, SubresourceKind::Website, &String::from_utf8_lossy(body))
        .await?;
    empty_response(StatusCode::OK)
}

/// `DELETE /{bucket}?website`.
pub async fn delete_website(state: &ServiceState, ctx: &OpContext) -> HandlerResult {
    state
        .store
        .delete_subresource(ctx.bucket()?, None, SubresourceKind::Website)
        .await?;
    empty_response(StatusCode::NO_CONTENT)
}

/// `GET /{bucket}?tagging`.
pub async fn get_bucket_tagging(state: &ServiceState, ctx: &OpContext) -> HandlerResult {
    let bucket = ctx.bucket()?;
    match state
        .store
        .get_subresource(bucket, None, SubresourceKind::Tagging)
        .await?
    {
        Some(xml) => xml_response(StatusCode::OK, xml.into_bytes()),
        None => Err(S3Error::new(S3ErrorCode::NoSuchTagSet).with_extra("BucketName", bucket)),
    }
}

/// `PUT /{bucket}?tagging`.
pub async fn put_bucket_tagging(
    state: &ServiceState,
    ctx: &OpContext,
    body: &Bytes,
) -> HandlerResult {
    let bucket = ctx.bucket()?;
    let _parsed: Tagging = from_xml(body).map_err(malformed_xml)?;
    state
        .store
        .put_subresource(bucket, None, SubresourceKind::Tagging, &String::from_utf8_lossy(body))
        .await?;
    empty_response(StatusCode::NO_CONTENT)
}

/// `DELETE /{bucket}?tagging`.
pub async fn delete_bucket_tagging(state: &ServiceState, ctx: &OpContext) -> HandlerResult {
    state
        .store
        .delete_subresource(ctx.bucket()?, None, SubresourceKind::Tagging)
        .await?;
    empty_response(StatusCode::NO_CONTENT)
}

/// `GET /{bucket}?lifecycle` — opaque round-trip.
pub async fn get_lifecycle(state: &ServiceState, ctx: &OpContext) -> HandlerResult {
    let bucket = ctx.bucket()?;
    match state
        .store
        .get_subresource(bucket, None, SubresourceKind::Lifecycle)
        .await?
    {
        Some(xml) => xml_response(StatusCode::OK, xml.into_bytes()),
        None => Err(S3Error::new(S3ErrorCode::NoSuchLifecycleConfiguration)
            .with_extra("BucketName", bucket)),
    }
}

/// `PUT /{bucket}?lifecycle` — stored verbatim, never enforced.
pub async fn put_lifecycle(state: &ServiceState, ctx: &OpContext, body: &Bytes) -> HandlerResult {
    state
        .store
        .put_subresource(
            ctx.bucket()?,
            None,
            SubresourceKind::Lifecycle,
            &String::from_utf8_lossy(body),
        )
        .await?;
    empty_response(StatusCode::OK)
}

/// `DELETE /{bucket}?lifecycle`.
pub async fn delete_lifecycle(state: &ServiceState, ctx: &OpContext) -> HandlerResult {
    state
        .store
        .delete_subresource(ctx.bucket()?, None, SubresourceKind::Lifecycle)
        .await?;
    empty_response(StatusCode::NO_CONTENT)
}

/// `GET /{bucket}?acl` — the stub full-control policy.
pub async fn get_bucket_acl(state: &ServiceState, ctx: &OpContext) -> HandlerResult {
    let bucket = ctx.bucket()?;
    if state.store.get_bucket(bucket).await?.is_none() {
        return Err(S3Error::new(S3ErrorCode::NoSuchBucket));
    }
    let policy = AccessControlPolicy {
        owner: Owner::default(),
    };
    xml_response(StatusCode::OK, to_xml("AccessControlPolicy", &policy).map_err(xml_serialize_failed)?)
}

/// `PUT /{bucket}?acl` — accepted and discarded.
pub async fn put_bucket_acl(state: &ServiceState, ctx: &OpContext) -> HandlerResult {
    let bucket = ctx.bucket()?;
    if state.store.get_bucket(bucket).await?.is_none() {
        return Err(S3Error::new(S3ErrorCode::NoSuchBucket));
    }
    empty_response(StatusCode::OK)
}

/// `GET /{bucket}?location` — always the empty (us-east-1) constraint.
pub async fn get_location(state: &ServiceState, ctx: &OpContext) -> HandlerResult {
    let bucket = ctx.bucket()?;
    if state.store.get_bucket(bucket).await?.is_none() {
        return Err(S3Error::new(S3ErrorCode::NoSuchBucket));
    }
    xml_response(
        StatusCode::OK,
        to_xml("LocationConstraint", &LocationConstraint::default()).map_err(xml_serialize_failed)?,
    )
}

// ---------------------------------------------------------------------------
// Bulk delete
// ---------------------------------------------------------------------------

/// `POST /{bucket}?delete` — DeleteObjects.
///
/// Every named key "succeeds": deleting a nonexistent key reports success,
/// matching S3.
pub async fn delete_objects(state: &ServiceState, ctx: &OpContext, body: &Bytes) -> HandlerResult {
    let bucket = ctx.bucket()?;
    let delete: Delete = from_xml(body).map_err(malformed_xml)?;
    if delete.objects.is_empty() {
        return Err(S3Error::new(S3ErrorCode::MalformedXML));
    }

    let mut result = DeleteResult::default();
    for object in &delete.objects {
        let existed = state.store.delete_object(bucket, &object.key).await?;
        if existed {
            emit_event(
                state,
                ctx,
                EventKind::Delete,
                bucket,
                &object.key,
                None,
                None,
            );
        }
        if !delete.quiet {
            result.deleted.push(DeletedObject {
                key: object.key.clone(),
            });
        }
    }

    xml_response(StatusCode::OK, to_xml("DeleteResult", &result).map_err(xml_serialize_failed)?)
}
