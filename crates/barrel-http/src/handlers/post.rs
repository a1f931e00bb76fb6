//! The browser-upload controller (`POST /{bucket}` with
//! `multipart/form-data`).
//!
//! Only form fields appearing before the `file` field participate in object
//! creation. `success_action_redirect` (or the legacy `redirect` field)
//! takes precedence over `success_action_status`.

use std::collections::BTreeMap;

use http::{Response, StatusCode};

use barrel_core::events::EventKind;
use barrel_core::store::metadata_for_put;
use barrel_model::types::StorageClass;
use barrel_model::{S3Error, S3ErrorCode};

use crate::body::S3ResponseBody;
use crate::form::{PostForm, extract_boundary, parse_form};
use crate::handlers::object::header_str;
use crate::handlers::{OpContext, emit_event};
use crate::response::{empty_response, quoted_etag, set_header, xml_response};
use crate::service::ServiceState;

type HandlerResult = Result<Response<S3ResponseBody>, S3Error>;

/// `POST /{bucket}` — create an object from a browser form upload.
pub async fn post_object(
    state: &ServiceState,
    ctx: &OpContext,
    parts: &http::request::Parts,
    body: &bytes::Bytes,
) -> HandlerResult {
    let bucket = ctx.bucket()?;

    let content_type = header_str(parts, "content-type").unwrap_or_default();
    let boundary = extract_boundary(content_type)?;
    let form = parse_form(body, &boundary)?;

    let key_template = form.field("key").ok_or_else(|| {
        S3Error::invalid_argument(
            "Bucket POST must contain a field named 'key'. If it is specified, please check the order of the fields.",
            "key",
            "",
        )
    })?;
    if key_template.is_empty() {
        return Err(S3Error::invalid_argument(
            "User key must have a length greater than 0.",
            "key",
            "",
        ));
    }

    let file = form.file.as_ref().ok_or_else(|| {
        S3Error::invalid_argument(
            "POST requires exactly one file upload per request.",
            "file",
            "0",
        )
    })?;

    let filename = file.filename.as_deref().unwrap_or_default();
    let key = key_template.replace("${filename}", filename);

    let metadata = metadata_for_put(
        form.field("Content-Type")
            .map(str::to_owned)
            .or_else(|| file.content_type.clone()),
        match form.field("x-amz-storage-class") {
            Some(raw) => raw.parse::<StorageClass>()?,
            None => StorageClass::default(),
        },
        form.field("x-amz-website-redirect-location").map(str::to_owned),
        collect_form_metadata(&form),
    );

    let stored = state.store.put_object(bucket, &key, &file.data, metadata).await?;

    emit_event(
        state,
        ctx,
        EventKind::Post,
        bucket,
        &key,
        Some(stored.size),
        Some(stored.etag.clone()),
    );

    success_response(state, &form, bucket, &key, &stored.etag)
}

/// `x-amz-meta-*` form fields, lowercased.
fn collect_form_metadata(form: &PostForm) -> BTreeMap<String, String> {
    form.fields
        .iter()
        .filter_map(|(name, value)| {
            let lowered = name.to_ascii_lowercase();
            lowered
                .starts_with("x-amz-meta-")
                .then(|| (lowered, value.clone()))
        })
        .collect()
}

/// Build the success response per the form's `success_action_*` fields.
fn success_response(
    state: &ServiceState,
    form: &PostForm,
    bucket: &str,
    key: &str,
    etag: &str,
) -> HandlerResult {
    let redirect = form
        .field("success_action_redirect")
        .or_else(|| form.field("redirect"))
        .filter(|url| url.starts_with("http://") || url.starts_with("https://"));

    if let Some(url) = redirect {
        let separator = if url.contains('?') { '&' } else { '?' };
        let location = format!(
            "{url}{separator}bucket={bucket}&key={}&etag={}",
            barrel_auth::canonical::uri_encode(key, true),
            barrel_auth::canonical::uri_encode(&quoted_etag(etag), true),
        );
        let mut response = empty_response(StatusCode::SEE_OTHER)?;
        set_header(&mut response, "location", &location);
        return Ok(response);
    }

    match form.field("success_action_status") {
        Some("200") => empty_response(StatusCode::OK),
        Some("201") => {
            let body = format!(
                "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\
                 <PostResponse>\
                 <Location>{}/{bucket}/{key}</Location>\
                 <Bucket>{bucket}</Bucket>\
                 <Key>{key}</Key>\
                 <ETag>{}</ETag>\
                 </PostResponse>",
                state.config.endpoint_url(),
                quoted_etag(etag),
            );
            let mut response = xml_response(StatusCode::CREATED, body.into_bytes())?;
            set_header(&mut response, "content-type", "application/xml");
            Ok(response)
        }
        _ => empty_response(StatusCode::NO_CONTENT),
    }
}
