//! The multipart upload controller.

use bytes::Bytes;
use chrono::Utc;
use http::{Response, StatusCode};

use barrel_core::events::EventKind;
use barrel_model::output::{
    CompleteMultipartUploadResult, CopyObjectResult, InitiateMultipartUploadResult,
};
use barrel_model::types::CompletedMultipartUpload;
use barrel_model::{S3Error, S3ErrorCode};
use barrel_xml::{from_xml, to_xml};

use crate::body::S3ResponseBody;
use crate::handlers::object::{header_str, metadata_from_request, parse_copy_source, resolve_range};
use crate::handlers::{OpContext, emit_event, malformed_xml, xml_serialize_failed};
use crate::response::{empty_response, quoted_etag, set_header, xml_response};
use crate::service::ServiceState;

type HandlerResult = Result<Response<S3ResponseBody>, S3Error>;

/// Part numbers accepted by `UploadPart`.
const PART_NUMBER_RANGE: std::ops::RangeInclusive<u32> = 1..=10_000;

/// `POST /{bucket}/{key}?uploads` — InitiateMultipartUpload.
pub async fn create_upload(
    state: &ServiceState,
    ctx: &OpContext,
    parts: &http::request::Parts,
) -> HandlerResult {
    let bucket = ctx.bucket()?;
    let key = ctx.key()?;

    let metadata = metadata_from_request(parts, &ctx.query)?;
    let upload_id = state.store.initiate_multipart(bucket, key, metadata).await?;

    let result = InitiateMultipartUploadResult {
        bucket: bucket.to_owned(),
        key: key.to_owned(),
        upload_id,
    };
    xml_response(StatusCode::OK, to_xml("InitiateMultipartUploadResult", &result).map_err(xml_serialize_failed)?)
}

/// `PUT /{bucket}/{key}?partNumber=N&uploadId=…` — UploadPart.
pub async fn upload_part(state: &ServiceState, ctx: &OpContext, body: &Bytes) -> HandlerResult {
    let bucket = ctx.bucket()?;
    let upload_id = required_upload_id(ctx)?;
    let part_number = parse_part_number(ctx)?;

    let etag = state
        .store
        .upload_part(bucket, upload_id, part_number, body)
        .await?;

    let mut response = empty_response(StatusCode::OK)?;
    set_header(&mut response, "etag", &quoted_etag(&etag));
    Ok(response)
}

/// `PUT /{bucket}/{key}?partNumber=N&uploadId=…` with `x-amz-copy-source` —
/// UploadPartCopy.
pub async fn upload_part_copy(
    state: &ServiceState,
    ctx: &OpContext,
    parts: &http::request::Parts,
) -> HandlerResult {
    let bucket = ctx.bucket()?;
    let upload_id = required_upload_id(ctx)?;
    let part_number = parse_part_number(ctx)?;

    let (src_bucket, src_key) = parse_copy_source(parts)?;
    if state.store.get_bucket(&src_bucket).await?.is_none() {
        return Err(S3Error::new(S3ErrorCode::NoSuchBucket).with_extra("BucketName", src_bucket));
    }
    let metadata = state
        .store
        .head_object(&src_bucket, &src_key)
        .await?
        .ok_or_else(|| S3Error::new(S3ErrorCode::NoSuchKey).with_extra("Key", src_key.clone()))?;

    let source = match header_str(parts, "x-amz-copy-source-range") {
        Some(raw) => {
            use crate::handlers::object::RangeOutcome;
            match resolve_range(raw, metadata.size) {
                RangeOutcome::Partial(start, end) => state
                    .store
                    .get_object_range(&src_bucket, &src_key, start, end)
                    .await?,
                RangeOutcome::Full | RangeOutcome::Unsatisfiable => {
                    return Err(S3Error::invalid_argument(
                        "The x-amz-copy-source-range value must be of the form bytes=first-last where first and last are the zero-based offsets of the first and last bytes to copy",
                        "x-amz-copy-source-range",
                        raw,
                    ));
                }
            }
        }
        None => state.store.get_object(&src_bucket, &src_key).await?,
    }
    .ok_or_else(|| S3Error::new(S3ErrorCode::NoSuchKey).with_extra("Key", src_key))?;

    let etag = state
        .store
        .upload_part(bucket, upload_id, part_number, &source.content)
        .await?;

    let result = CopyObjectResult {
        last_modified: Utc::now(),
        etag: quoted_etag(&etag),
    };
    xml_response(StatusCode::OK, to_xml("CopyPartResult", &result).map_err(xml_serialize_failed)?)
}

/// `POST /{bucket}/{key}?uploadId=…` — CompleteMultipartUpload.
pub async fn complete_upload(
    state: &ServiceState,
    ctx: &OpContext,
    body: &Bytes,
) -> HandlerResult {
    let bucket = ctx.bucket()?;
    let upload_id = required_upload_id(ctx)?;

    let completion: CompletedMultipartUpload = from_xml(body).map_err(malformed_xml)?;
    let (key, metadata) = state
        .store
        .complete_multipart(bucket, upload_id, &completion.parts)
        .await?;

    emit_event(
        state,
        ctx,
        EventKind::CompleteMultipartUpload,
        bucket,
        &key,
        Some(metadata.size),
        Some(metadata.etag.clone()),
    );

    let result = CompleteMultipartUploadResult {
        location: format!("{}/{bucket}/{key}", state.config.endpoint_url()),
        bucket: bucket.to_owned(),
        key,
        etag: quoted_etag(&metadata.etag),
    };
    xml_response(StatusCode::OK, to_xml("CompleteMultipartUploadResult", &result).map_err(xml_serialize_failed)?)
}

/// `DELETE /{bucket}/{key}?uploadId=…` — AbortMultipartUpload.
pub async fn abort_upload(state: &ServiceState, ctx: &OpContext) -> HandlerResult {
    state
        .store
        .abort_multipart(ctx.bucket()?, required_upload_id(ctx)?)
        .await?;
    empty_response(StatusCode::NO_CONTENT)
}

fn required_upload_id(ctx: &OpContext) -> Result<&str, S3Error> {
    ctx.query_value("uploadId")
        .ok_or_else(|| S3Error::invalid_argument("Missing uploadId", "uploadId", ""))
}

fn parse_part_number(ctx: &OpContext) -> Result<u16, S3Error> {
    let raw = ctx
        .query_value("partNumber")
        .ok_or_else(|| S3Error::invalid_argument("Missing partNumber", "partNumber", ""))?;
    raw.parse::<u32>()
        .ok()
        .filter(|n| PART_NUMBER_RANGE.contains(n))
        .map(|n| n as u16)
        .ok_or_else(|| {
            S3Error::invalid_argument(
                "Part number must be an integer between 1 and 10000, inclusive",
                "partNumber",
                raw,
            )
        })
}
