//! Response encoding: XML error envelopes, website HTML error pages, and
//! shared header helpers.

use chrono::{DateTime, Utc};
use http::header::HeaderValue;
use http::{Response, StatusCode};
use tracing::error;

use barrel_model::{S3Error, S3ErrorCode};
use barrel_xml::error_envelope;

use crate::body::S3ResponseBody;

/// Render an error as the standard S3 XML envelope.
///
/// Exceptions per the wire contract: 304 and 204 responses carry no body.
#[must_use]
pub fn error_to_response(err: &S3Error, request_id: &str) -> Response<S3ResponseBody> {
    let status = err.status();

    if status == StatusCode::NOT_MODIFIED || status == StatusCode::NO_CONTENT {
        return Response::builder()
            .status(status)
            .body(S3ResponseBody::empty())
            .expect("static response should be valid");
    }

    let body = error_envelope(err.code.as_str(), &err.message, &err.extra, request_id)
        .unwrap_or_else(|encode_err| {
            error!(error = %encode_err, "failed to encode error envelope");
            Vec::new()
        });

    Response::builder()
        .status(status)
        .header(http::header::CONTENT_TYPE, "application/xml")
        .body(S3ResponseBody::from_xml(body))
        .expect("error response should be valid")
}

/// Render an error as the website-service HTML page.
///
/// The document embeds `Code:` and `Key:` lines the way S3's static-website
/// endpoint does.
#[must_use]
pub fn html_error_response(
    status: StatusCode,
    code: S3ErrorCode,
    message: &str,
    key: Option<&str>,
    request_id: &str,
) -> Response<S3ResponseBody> {
    let reason = status.canonical_reason().unwrap_or("Error");
    let mut items = format!("<li>Code: {code}</li>\n<li>Message: {message}</li>\n");
    if let Some(key) = key {
        items.push_str(&format!("<li>Key: {key}</li>\n"));
    }
    items.push_str(&format!("<li>RequestId: {request_id}</li>\n"));

    let body = format!(
        "<!DOCTYPE html>\n\
         <html>\n\
         <head><title>{status_code} {reason}</title></head>\n\
         <body>\n\
         <h1>{status_code} {reason}</h1>\n\
         <ul>\n{items}</ul>\n\
         </body>\n\
         </html>\n",
        status_code = status.as_u16(),
    );

    Response::builder()
        .status(status)
        .header(http::header::CONTENT_TYPE, "text/html; charset=utf-8")
        .body(S3ResponseBody::from_string(body))
        .expect("html error response should be valid")
}

/// An XML document response.
///
/// # Errors
///
/// Returns an internal error if the response cannot be assembled.
pub fn xml_response(status: StatusCode, body: Vec<u8>) -> Result<Response<S3ResponseBody>, S3Error> {
    Response::builder()
        .status(status)
        .header(http::header::CONTENT_TYPE, "application/xml")
        .body(S3ResponseBody::from_xml(body))
        .map_err(|err| S3Error::internal_error(err.to_string()))
}

/// An empty response with the given status.
///
/// # Errors
///
/// Returns an internal error if the response cannot be assembled.
pub fn empty_response(status: StatusCode) -> Result<Response<S3ResponseBody>, S3Error> {
    Response::builder()
        .status(status)
        .body(S3ResponseBody::empty())
        .map_err(|err| S3Error::internal_error(err.to_string()))
}

/// Set a header if the value is representable; silently skip otherwise.
pub fn set_header(response: &mut Response<S3ResponseBody>, name: &'static str, value: &str) {
    if let Ok(hv) = HeaderValue::from_str(value) {
        response.headers_mut().insert(name, hv);
    }
}

/// Wrap a bare ETag in the quotes the wire format requires.
#[must_use]
pub fn quoted_etag(etag: &str) -> String {
    format!("\"{etag}\"")
}

/// Format a timestamp as an HTTP date (`Sun, 02 Feb 2025 16:45:09 GMT`).
#[must_use]
pub fn http_date(ts: &DateTime<Utc>) -> String {
    ts.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}
