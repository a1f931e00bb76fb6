//! The website-service request handler.
//!
//! Bridges the HTTP layer and the core website engine: resolves the bucket
//! and its website configuration, runs the engine, and renders the outcome
//! (object body, redirect, or HTML error page). Errors on this endpoint are
//! HTML documents, not XML envelopes.

use http::{Method, Response, StatusCode};

use barrel_core::website::{self, WebsiteOutcome, WebsiteRequest};
use barrel_model::S3ErrorCode;
use bytes::Bytes;

use crate::body::S3ResponseBody;
use crate::response::{html_error_response, http_date, quoted_etag, set_header};
use crate::router::ResolvedTarget;
use crate::service::ServiceState;

/// Handle a request addressed to the `s3-website` service.
pub async fn handle(
    state: &ServiceState,
    req: &http::Request<Bytes>,
    target: &ResolvedTarget,
    request_id: &str,
) -> Response<S3ResponseBody> {
    if req.method() != Method::GET && req.method() != Method::HEAD {
        return html_error_response(
            StatusCode::METHOD_NOT_ALLOWED,
            S3ErrorCode::MethodNotAllowed,
            "The specified method is not allowed against this resource.",
            None,
            request_id,
        );
    }

    let Some(bucket) = target.bucket.as_deref() else {
        return html_error_response(
            StatusCode::NOT_FOUND,
            S3ErrorCode::NoSuchBucket,
            "The specified bucket does not exist",
            None,
            request_id,
        );
    };

    match serve(state, req, target, bucket, request_id).await {
        Ok(response) => response,
        Err(err) => {
            tracing::error!(error = %err, bucket, "website request failed");
            html_error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                S3ErrorCode::InternalError,
                "We encountered an internal error. Please try again.",
                None,
                request_id,
            )
        }
    }
}

async fn serve(
    state: &ServiceState,
    req: &http::Request<Bytes>,
    target: &ResolvedTarget,
    bucket: &str,
    request_id: &str,
) -> Result<Response<S3ResponseBody>, barrel_core::StoreError> {
    if state.store.get_bucket(bucket).await?.is_none() {
        return Ok(html_error_response(
            StatusCode::NOT_FOUND,
            S3ErrorCode::NoSuchBucket,
            "The specified bucket does not exist",
            None,
            request_id,
        ));
    }

    let Some(config) = state.bucket_website(bucket).await else {
        return Ok(html_error_response(
            StatusCode::NOT_FOUND,
            S3ErrorCode::NoSuchWebsiteConfiguration,
            "The specified bucket does not have a website configuration",
            None,
            request_id,
        ));
    };

    let host = req
        .headers()
        .get(http::header::HOST)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    let key = target.key.as_deref().unwrap_or_default();

    let outcome = website::resolve_request(
        &state.store,
        &config,
        WebsiteRequest {
            bucket,
            key,
            scheme: state.scheme(),
            host,
            path_style: !target.vhost,
        },
    )
    .await?;

    let include_body = req.method() == Method::GET;
    Ok(render_outcome(state, bucket, outcome, include_body, request_id).await?)
}

async fn render_outcome(
    state: &ServiceState,
    bucket: &str,
    outcome: WebsiteOutcome,
    include_body: bool,
    request_id: &str,
) -> Result<Response<S3ResponseBody>, barrel_core::StoreError> {
    match outcome {
        WebsiteOutcome::Serve { key, status } => {
            let Some(stored) = state.store.get_object(bucket, &key).await? else {
                return Ok(html_error_response(
                    StatusCode::NOT_FOUND,
                    S3ErrorCode::NoSuchKey,
                    "The specified key does not exist.",
                    Some(&key),
                    request_id,
                ));
            };

            // Per-object redirect metadata overrides the body response.
            if let Some(location) = &stored.metadata.website_redirect_location {
                let mut response = Response::builder()
                    .status(StatusCode::MOVED_PERMANENTLY)
                    .body(S3ResponseBody::empty())
                    .expect("redirect response should be valid");
                set_header(&mut response, "location", location);
                return Ok(response);
            }

            let mut response = Response::builder()
                .status(status)
                .body(if include_body {
                    S3ResponseBody::from_bytes(stored.content)
                } else {
                    S3ResponseBody::empty()
                })
                .expect("object response should be valid");
            set_header(&mut response, "content-type", &stored.metadata.content_type);
            set_header(&mut response, "etag", &quoted_etag(&stored.metadata.etag));
            set_header(
                &mut response,
                "last-modified",
                &http_date(&stored.metadata.last_modified),
            );
            set_header(
                &mut response,
                "content-length",
                &stored.metadata.size.to_string(),
            );
            Ok(response)
        }
        WebsiteOutcome::Redirect { location, status } => {
            let mut response = Response::builder()
                .status(status)
                .body(S3ResponseBody::empty())
                .expect("redirect response should be valid");
            set_header(&mut response, "location", &location);
            Ok(response)
        }
        WebsiteOutcome::Error { status, code, key } => {
            let message = match code {
                S3ErrorCode::NoSuchKey => "The specified key does not exist.",
                _ => "An error occurred",
            };
            Ok(html_error_response(
                status,
                code,
                message,
                key.as_deref(),
                request_id,
            ))
        }
    }
}
