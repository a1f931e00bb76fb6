//! Operation handlers: the bucket, object, multipart, POST-form, and
//! website controllers.
//!
//! Handlers receive the shared [`ServiceState`], the per-request
//! [`OpContext`], and the request parts/body, and produce either a response
//! or an [`S3Error`] that the service layer encodes.

pub mod bucket;
pub mod multipart;
pub mod object;
pub mod post;
pub mod website;

use barrel_auth::Authentication;
use barrel_core::events::{EventKind, ObjectEvent};
use barrel_model::{S3Error, S3ErrorCode};

use crate::service::ServiceState;

/// Per-request context shared by every handler.
#[derive(Debug)]
pub struct OpContext {
    /// The request id echoed in responses and event records.
    pub request_id: String,
    /// The resolved bucket, if any.
    pub bucket: Option<String>,
    /// The resolved key, if any.
    pub key: Option<String>,
    /// Decoded query parameters in request order.
    pub query: Vec<(String, String)>,
    /// The authentication outcome.
    pub auth: Authentication,
    /// Peer address for event records.
    pub source_ip: String,
}

impl OpContext {
    /// The bucket, or an internal error if routing let a bucket-less request
    /// through (which it never should).
    pub fn bucket(&self) -> Result<&str, S3Error> {
        self.bucket
            .as_deref()
            .ok_or_else(|| S3Error::internal_error("operation dispatched without a bucket"))
    }

    /// The key, with the same guarantee as [`Self::bucket`].
    pub fn key(&self) -> Result<&str, S3Error> {
        self.key
            .as_deref()
            .ok_or_else(|| S3Error::internal_error("operation dispatched without a key"))
    }

    /// First value of a query parameter.
    #[must_use]
    pub fn query_value(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Whether the request was signed.
    #[must_use]
    pub fn is_signed(&self) -> bool {
        self.auth.is_signed()
    }
}

/// Publish an object mutation event. Best-effort by construction.
pub(crate) fn emit_event(
    state: &ServiceState,
    ctx: &OpContext,
    kind: EventKind,
    bucket: &str,
    key: &str,
    size: Option<u64>,
    etag: Option<String>,
) {
    state.emitter.emit(&ObjectEvent {
        kind,
        bucket: bucket.to_owned(),
        key: key.to_owned(),
        size,
        etag,
        source_ip: ctx.source_ip.clone(),
        request_id: ctx.request_id.clone(),
    });
}

/// Map an XML parsing failure on a request body to `MalformedXML`.
pub(crate) fn malformed_xml(err: barrel_xml::XmlError) -> S3Error {
    tracing::debug!(error = %err, "rejecting malformed request XML");
    S3Error::new(S3ErrorCode::MalformedXML)
}

/// Map a failure while serializing a response document to `InternalError`.
pub(crate) fn xml_serialize_failed(err: barrel_xml::XmlError) -> S3Error {
    tracing::error!(error = %err, "failed to serialize response XML");
    S3Error::internal_error("We encountered an internal error. Please try again.")
}
