//! The request pipeline.
//!
//! [`handle_request`] runs a fully-buffered request through host resolution,
//! the CORS preflight short-circuit, the website service, the SigV4 gate
//! (including chunked-body decoding), operation identification, and
//! dispatch. [`S3Service`] wraps it in a hyper `Service` that collects the
//! body first.

use std::convert::Infallible;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use bytes::Bytes;
use chrono::Utc;
use http::{Method, Request, Response, StatusCode};
use http_body_util::BodyExt;
use hyper::body::Incoming;
use hyper::service::Service;
use tracing::{debug, info, warn};
use uuid::Uuid;

use barrel_auth::canonical::parse_query;
use barrel_auth::chunked::decode_chunked_body;
use barrel_auth::{AccountRegistry, Authentication, authenticate};
use barrel_core::events::EventEmitter;
use barrel_core::{FilesystemStore, ServiceConfig};
use barrel_core::cors;
use barrel_model::types::{CorsConfiguration, WebsiteConfiguration};
use barrel_model::{S3Error, S3ErrorCode, S3Operation};
use barrel_xml::from_xml;

use crate::body::S3ResponseBody;
use crate::handlers::{OpContext, bucket, multipart, object, post, website};
use crate::response::{error_to_response, set_header};
use crate::router::{HostResolver, ResolvedTarget, S3ServiceKind, identify_operation};

/// Shared state of a running emulator instance.
#[derive(Debug)]
pub struct ServiceState {
    /// The object store.
    pub store: FilesystemStore,
    /// The fixed account registry.
    pub registry: AccountRegistry,
    /// The object-event emitter.
    pub emitter: EventEmitter,
    /// The host resolver.
    pub resolver: HostResolver,
    /// Instance configuration.
    pub config: ServiceConfig,
}

impl ServiceState {
    /// Assemble the state for a store and configuration.
    #[must_use]
    pub fn new(store: FilesystemStore, config: ServiceConfig) -> Self {
        let resolver = HostResolver::new(
            &config.service_endpoint,
            config.vhost_buckets,
            &config.address,
        );
        let emitter = EventEmitter::new(config.region.clone(), 128);
        Self {
            store,
            registry: AccountRegistry::default(),
            emitter,
            resolver,
            config,
        }
    }

    /// The listener scheme.
    #[must_use]
    pub fn scheme(&self) -> &'static str {
        if self.config.cert_path.is_some() {
            "https"
        } else {
            "http"
        }
    }

    /// The bucket's parsed CORS configuration, if stored and valid.
    pub async fn bucket_cors(&self, bucket: &str) -> Option<CorsConfiguration> {
        let xml = self
            .store
            .get_subresource(bucket, None, barrel_core::store::SubresourceKind::Cors)
            .await
            .ok()??;
        from_xml(xml.as_bytes()).ok()
    }

    /// The bucket's parsed website configuration, if stored and valid.
    pub async fn bucket_website(&self, bucket: &str) -> Option<WebsiteConfiguration> {
        let xml = self
            .store
            .get_subresource(bucket, None, barrel_core::store::SubresourceKind::Website)
            .await
            .ok()??;
        from_xml(xml.as_bytes()).ok()
    }
}

/// Run one buffered request through the full pipeline.
///
/// This is the transport-independent entry point; the in-process tests call
/// it directly.
pub async fn handle_request(
    state: &ServiceState,
    req: Request<Bytes>,
    source_ip: &str,
) -> Response<S3ResponseBody> {
    let request_id = Uuid::new_v4().simple().to_string().to_uppercase();
    let method = req.method().clone();
    let uri = req.uri().clone();
    let origin = req
        .headers()
        .get(http::header::ORIGIN)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);

    let target = state.resolver.resolve(&req);
    debug!(
        %method, %uri,
        service = ?target.service,
        bucket = ?target.bucket,
        key = ?target.key,
        request_id,
        "resolved request target"
    );

    let mut response = route(state, req, &target, &request_id, source_ip).await;

    if method != Method::OPTIONS {
        apply_simple_cors(state, &target, origin.as_deref(), &method, &mut response).await;
    }

    if !state.config.silent {
        info!(%method, %uri, status = response.status().as_u16(), request_id, "handled request");
    }

    set_header(&mut response, "x-amz-request-id", &request_id);
    set_header(&mut response, "x-amz-id-2", &request_id);
    response.headers_mut().insert(
        http::header::SERVER,
        http::header::HeaderValue::from_static("Barrel"),
    );

    // HEAD responses keep entity headers but never a body.
    if method == Method::HEAD {
        *response.body_mut() = S3ResponseBody::empty();
    }

    response
}

async fn route(
    state: &ServiceState,
    req: Request<Bytes>,
    target: &ResolvedTarget,
    request_id: &str,
    source_ip: &str,
) -> Response<S3ResponseBody> {
    if req.method() == Method::OPTIONS {
        return preflight(state, &req, target, request_id).await;
    }

    if target.service == S3ServiceKind::Website && !target.sdk {
        return website::handle(state, &req, target, request_id).await;
    }

    match api_request(state, req, target, request_id, source_ip).await {
        Ok(response) => response,
        Err(err) => {
            debug!(code = err.code.as_str(), message = %err.message, request_id, "request failed");
            error_to_response(&err, request_id)
        }
    }
}

/// The API-service path: SigV4 gate, chunked decoding, identify, dispatch.
async fn api_request(
    state: &ServiceState,
    req: Request<Bytes>,
    target: &ResolvedTarget,
    request_id: &str,
    source_ip: &str,
) -> Result<Response<S3ResponseBody>, S3Error> {
    let (parts, mut body) = req.into_parts();

    let auth = authenticate(
        &parts,
        target.bucket.as_deref(),
        target.key.as_deref(),
        &state.registry,
        Utc::now(),
        state.config.allow_mismatched_signatures,
    )
    .map_err(S3Error::from)?;

    // Signed streaming bodies are decoded (and their chunk signature chain
    // verified) before any handler sees them.
    if let Authentication::Signed(identity) = &auth {
        if let Some(chunk_context) = &identity.chunk_context {
            let declared = parts
                .headers
                .get("x-amz-decoded-content-length")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .ok_or_else(|| S3Error::new(S3ErrorCode::MissingContentLength))?;
            body = decode_chunked_body(&body, chunk_context, declared).map_err(S3Error::from)?;
        }
    }

    let query = parse_query(parts.uri.query().unwrap_or(""));
    let operation = identify_operation(
        &parts.method,
        target.bucket.is_some(),
        target.key.is_some(),
        &query,
        &parts.headers,
    )?;

    let ctx = OpContext {
        request_id: request_id.to_owned(),
        bucket: target.bucket.clone(),
        key: target.key.clone(),
        query,
        auth,
        source_ip: source_ip.to_owned(),
    };

    debug!(operation = %operation, request_id, "dispatching operation");
    dispatch(state, operation, &ctx, &parts, &body).await
}

/// Map an operation to its handler.
async fn dispatch(
    state: &ServiceState,
    operation: S3Operation,
    ctx: &OpContext,
    parts: &http::request::Parts,
    body: &Bytes,
) -> Result<Response<S3ResponseBody>, S3Error> {
    match operation {
        S3Operation::ListBuckets => bucket::list_buckets(state, ctx).await,
        S3Operation::CreateBucket => bucket::create_bucket(state, ctx).await,
        S3Operation::DeleteBucket => bucket::delete_bucket(state, ctx).await,
        S3Operation::HeadBucket => bucket::head_bucket(state, ctx).await,
        S3Operation::ListObjects => bucket::list_objects(state, ctx, false).await,
        S3Operation::ListObjectsV2 => bucket::list_objects(state, ctx, true).await,
        S3Operation::GetBucketCors => bucket::get_cors(state, ctx).await,
        S3Operation::PutBucketCors => bucket::put_cors(state, ctx, body).await,
        S3Operation::DeleteBucketCors => bucket::delete_cors(state, ctx).await,
        S3Operation::GetBucketWebsite => bucket::get_website(state, ctx).await,
        S3Operation::PutBucketWebsite => bucket::put_website(state, ctx, body).await,
        S3Operation::DeleteBucketWebsite => bucket::delete_website(state, ctx).await,
        S3Operation::GetBucketTagging => bucket::get_bucket_tagging(state, ctx).await,
        S3Operation::PutBucketTagging => bucket::put_bucket_tagging(state, ctx, body).await,
        S3Operation::DeleteBucketTagging => bucket::delete_bucket_tagging(state, ctx).await,
        S3Operation::GetBucketAcl => bucket::get_bucket_acl(state, ctx).await,
        S3Operation::PutBucketAcl => bucket::put_bucket_acl(state, ctx).await,
        S3Operation::GetBucketLifecycle => bucket::get_lifecycle(state, ctx).await,
        S3Operation::PutBucketLifecycle => bucket::put_lifecycle(state, ctx, body).await,
        S3Operation::DeleteBucketLifecycle => bucket::delete_lifecycle(state, ctx).await,
        S3Operation::GetBucketLocation => bucket::get_location(state, ctx).await,
        S3Operation::DeleteObjects => bucket::delete_objects(state, ctx, body).await,
        S3Operation::PostObject => post::post_object(state, ctx, parts, body).await,
        S3Operation::PutObject => object::put_object(state, ctx, parts, body).await,
        S3Operation::CopyObject => object::copy_object(state, ctx, parts).await,
        S3Operation::GetObject => object::get_object(state, ctx, parts, true).await,
        S3Operation::HeadObject => object::get_object(state, ctx, parts, false).await,
        S3Operation::DeleteObject => object::delete_object(state, ctx).await,
        S3Operation::GetObjectTagging => object::get_object_tagging(state, ctx).await,
        S3Operation::PutObjectTagging => object::put_object_tagging(state, ctx, body).await,
        S3Operation::DeleteObjectTagging => object::delete_object_tagging(state, ctx).await,
        S3Operation::GetObjectAcl => object::get_object_acl(state, ctx).await,
        S3Operation::PutObjectAcl => object::put_object_acl(state, ctx).await,
        S3Operation::CreateMultipartUpload => multipart::create_upload(state, ctx, parts).await,
        S3Operation::UploadPart => multipart::upload_part(state, ctx, body).await,
        S3Operation::UploadPartCopy => multipart::upload_part_copy(state, ctx, parts).await,
        S3Operation::CompleteMultipartUpload => multipart::complete_upload(state, ctx, body).await,
        S3Operation::AbortMultipartUpload => multipart::abort_upload(state, ctx).await,
    }
}

// ---------------------------------------------------------------------------
// CORS
// ---------------------------------------------------------------------------

/// Handle an OPTIONS preflight against the bucket's CORS configuration.
async fn preflight(
    state: &ServiceState,
    req: &Request<Bytes>,
    target: &ResolvedTarget,
    request_id: &str,
) -> Response<S3ResponseBody> {
    let denied = || {
        error_to_response(
            &S3Error::with_message(
                S3ErrorCode::AccessDenied,
                "CORSResponse: This CORS request is not allowed. This is usually because the evalution of Origin, request method / Access-Control-Request-Method or Access-Control-Request-Headers are not whitelisted by the resource's CORS spec.",
            ),
            request_id,
        )
    };

    let origin = req
        .headers()
        .get(http::header::ORIGIN)
        .and_then(|v| v.to_str().ok());
    let requested_method = req
        .headers()
        .get("access-control-request-method")
        .and_then(|v| v.to_str().ok());
    let (Some(origin), Some(requested_method)) = (origin, requested_method) else {
        return error_to_response(
            &S3Error::with_message(
                S3ErrorCode::InvalidRequest,
                "Insufficient information. Origin request header needed.",
            ),
            request_id,
        );
    };

    let requested_headers: Vec<String> = req
        .headers()
        .get("access-control-request-headers")
        .and_then(|v| v.to_str().ok())
        .map(|raw| {
            raw.split(',')
                .map(|h| h.trim().to_owned())
                .filter(|h| !h.is_empty())
                .collect()
        })
        .unwrap_or_default();

    let Some(bucket) = target.bucket.as_deref() else {
        return denied();
    };
    let Some(config) = state.bucket_cors(bucket).await else {
        return denied();
    };

    match cors::match_preflight(&config, origin, requested_method, &requested_headers) {
        Some(matched) => {
            let mut response = Response::builder()
                .status(StatusCode::OK)
                .body(S3ResponseBody::empty())
                .expect("preflight response should be valid");
            set_header(&mut response, "access-control-allow-origin", &matched.allow_origin);
            set_header(
                &mut response,
                "access-control-allow-methods",
                &matched.allow_methods.join(", "),
            );
            if !matched.allow_headers.is_empty() {
                set_header(
                    &mut response,
                    "access-control-allow-headers",
                    &matched.allow_headers.join(", "),
                );
            }
            if let Some(age) = matched.max_age_seconds {
                set_header(&mut response, "access-control-max-age", &age.to_string());
            }
            set_header(&mut response, "vary", "Origin, Access-Control-Request-Headers, Access-Control-Request-Method");
            response
        }
        None => denied(),
    }
}

/// Attach simple-request CORS headers to a response when a rule matches.
async fn apply_simple_cors(
    state: &ServiceState,
    target: &ResolvedTarget,
    origin: Option<&str>,
    method: &Method,
    response: &mut Response<S3ResponseBody>,
) {
    let (Some(origin), Some(bucket)) = (origin, target.bucket.as_deref()) else {
        return;
    };
    let Some(config) = state.bucket_cors(bucket).await else {
        return;
    };
    let Some(matched) = cors::match_simple(&config, origin, method.as_str()) else {
        return;
    };

    set_header(response, "access-control-allow-origin", &matched.allow_origin);

    let mut exposed = matched.expose_headers.clone();
    if response.status() == StatusCode::PARTIAL_CONTENT {
        for header in ["Accept-Ranges", "Content-Range"] {
            if !exposed.iter().any(|h| h.eq_ignore_ascii_case(header)) {
                exposed.push(header.to_owned());
            }
        }
    }
    if !exposed.is_empty() {
        set_header(response, "access-control-expose-headers", &exposed.join(", "));
    }
    set_header(response, "vary", "Origin");
}

// ---------------------------------------------------------------------------
// hyper glue
// ---------------------------------------------------------------------------

/// hyper `Service` wrapper around [`handle_request`].
#[derive(Debug, Clone)]
pub struct S3Service {
    state: Arc<ServiceState>,
    remote_ip: String,
}

impl S3Service {
    /// Wrap shared state; the remote IP defaults to loopback until
    /// [`Self::with_remote_ip`] pins it per connection.
    #[must_use]
    pub fn new(state: Arc<ServiceState>) -> Self {
        Self {
            state,
            remote_ip: "127.0.0.1".to_owned(),
        }
    }

    /// A per-connection clone carrying the peer address for event records.
    #[must_use]
    pub fn with_remote_ip(&self, remote_ip: impl Into<String>) -> Self {
        Self {
            state: Arc::clone(&self.state),
            remote_ip: remote_ip.into(),
        }
    }
}

impl Service<Request<Incoming>> for S3Service {
    type Response = Response<S3ResponseBody>;
    type Error = Infallible;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn call(&self, req: Request<Incoming>) -> Self::Future {
        let state = Arc::clone(&self.state);
        let remote_ip = self.remote_ip.clone();

        Box::pin(async move {
            let (parts, incoming) = req.into_parts();
            let body = match incoming.collect().await {
                Ok(collected) => collected.to_bytes(),
                Err(err) => {
                    warn!(error = %err, "failed to collect request body");
                    let response = error_to_response(
                        &S3Error::with_message(
                            S3ErrorCode::IncompleteBody,
                            "The request body terminated unexpectedly",
                        ),
                        "unknown",
                    );
                    return Ok(response);
                }
            };
            let req = Request::from_parts(parts, body);
            Ok(handle_request(&state, req, &remote_ip).await)
        })
    }
}
