//! The unified S3 error carrier.
//!
//! Every failure that crosses the HTTP boundary is an [`S3Error`]: a
//! well-known [`S3ErrorCode`], a human-readable message, and an optional set
//! of extra XML elements (for example `StringToSign` on signature mismatches,
//! or `Chunk` / `BadChunkSize` on streaming-upload violations). The HTTP
//! layer renders the error as the standard S3 envelope:
//!
//! ```xml
//! <?xml version="1.0" encoding="UTF-8"?>
//! <Error>
//!   <Code>NoSuchKey</Code>
//!   <Message>The specified key does not exist.</Message>
//!   <RequestId>...</RequestId>
//! </Error>
//! ```

use std::fmt;

use http::StatusCode;

/// Well-known S3 error codes produced by the emulator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum S3ErrorCode {
    /// Access denied.
    AccessDenied,
    /// The `Authorization` header is malformed.
    AuthorizationHeaderMalformed,
    /// The presigned-URL query parameter set is incomplete or invalid.
    AuthorizationQueryParametersError,
    /// The Content-MD5 did not match the received body.
    BadDigest,
    /// The bucket is not empty and cannot be deleted.
    BucketNotEmpty,
    /// A multipart part (other than the last) is below the minimum size.
    EntityTooSmall,
    /// The received body was shorter than the declared decoded length.
    IncompleteBody,
    /// An unexpected internal failure.
    InternalError,
    /// The access key ID does not exist.
    InvalidAccessKeyId,
    /// A request argument is invalid.
    InvalidArgument,
    /// The bucket name violates naming rules.
    InvalidBucketName,
    /// A streaming-upload chunk was smaller than the minimum chunk size.
    InvalidChunkSizeError,
    /// The Content-MD5 header is not a valid base64 MD5 digest.
    InvalidDigest,
    /// A part referenced by CompleteMultipartUpload is missing or mismatched.
    InvalidPart,
    /// The part list was not in ascending order.
    InvalidPartOrder,
    /// The requested byte range cannot be satisfied.
    InvalidRange,
    /// The request is structurally invalid.
    InvalidRequest,
    /// The storage class is not one of the supported values.
    InvalidStorageClass,
    /// The request XML is not well-formed or fails schema validation.
    MalformedXML,
    /// The HTTP method is not allowed against this resource.
    MethodNotAllowed,
    /// The Content-Length (or decoded content length) header is required.
    MissingContentLength,
    /// The specified bucket does not exist.
    NoSuchBucket,
    /// The bucket has no CORS configuration.
    NoSuchCORSConfiguration,
    /// The specified key does not exist.
    NoSuchKey,
    /// The bucket has no lifecycle configuration.
    NoSuchLifecycleConfiguration,
    /// The bucket has no tag set.
    NoSuchTagSet,
    /// The specified multipart upload does not exist.
    NoSuchUpload,
    /// The bucket has no website configuration.
    NoSuchWebsiteConfiguration,
    /// The requested functionality is not implemented.
    NotImplemented,
    /// Conditional GET: the resource has not been modified.
    NotModified,
    /// A request precondition did not hold.
    PreconditionFailed,
    /// The request timestamp is too far from the server time.
    RequestTimeTooSkewed,
    /// The computed signature does not match the provided one.
    SignatureDoesNotMatch,
}

impl S3ErrorCode {
    /// The wire name of this error code, as emitted in `<Code>`.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AccessDenied => "AccessDenied",
            Self::AuthorizationHeaderMalformed => "AuthorizationHeaderMalformed",
            Self::AuthorizationQueryParametersError => "AuthorizationQueryParametersError",
            Self::BadDigest => "BadDigest",
            Self::BucketNotEmpty => "BucketNotEmpty",
            Self::EntityTooSmall => "EntityTooSmall",
            Self::IncompleteBody => "IncompleteBody",
            Self::InternalError => "InternalError",
            Self::InvalidAccessKeyId => "InvalidAccessKeyId",
            Self::InvalidArgument => "InvalidArgument",
            Self::InvalidBucketName => "InvalidBucketName",
            Self::InvalidChunkSizeError => "InvalidChunkSizeError",
            Self::InvalidDigest => "InvalidDigest",
            Self::InvalidPart => "InvalidPart",
            Self::InvalidPartOrder => "InvalidPartOrder",
            Self::InvalidRange => "InvalidRange",
            Self::InvalidRequest => "InvalidRequest",
            Self::InvalidStorageClass => "InvalidStorageClass",
            Self::MalformedXML => "MalformedXML",
            Self::MethodNotAllowed => "MethodNotAllowed",
            Self::MissingContentLength => "MissingContentLength",
            Self::NoSuchBucket => "NoSuchBucket",
            Self::NoSuchCORSConfiguration => "NoSuchCORSConfiguration",
            Self::NoSuchKey => "NoSuchKey",
            Self::NoSuchLifecycleConfiguration => "NoSuchLifecycleConfiguration",
            Self::NoSuchTagSet => "NoSuchTagSet",
            Self::NoSuchUpload => "NoSuchUpload",
            Self::NoSuchWebsiteConfiguration => "NoSuchWebsiteConfiguration",
            Self::NotImplemented => "NotImplemented",
            Self::NotModified => "NotModified",
            Self::PreconditionFailed => "PreconditionFailed",
            Self::RequestTimeTooSkewed => "RequestTimeTooSkewed",
            Self::SignatureDoesNotMatch => "SignatureDoesNotMatch",
        }
    }

    /// The HTTP status code this error surfaces with.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::NoSuchBucket
            | Self::NoSuchKey
            | Self::NoSuchUpload
            | Self::NoSuchTagSet
            | Self::NoSuchCORSConfiguration
            | Self::NoSuchLifecycleConfiguration
            | Self::NoSuchWebsiteConfiguration => StatusCode::NOT_FOUND,
            Self::BucketNotEmpty => StatusCode::CONFLICT,
            Self::InvalidBucketName
            | Self::MalformedXML
            | Self::InvalidArgument
            | Self::InvalidRequest
            | Self::InvalidStorageClass
            | Self::AuthorizationHeaderMalformed
            | Self::AuthorizationQueryParametersError
            | Self::BadDigest
            | Self::InvalidDigest
            | Self::InvalidPart
            | Self::InvalidPartOrder
            | Self::EntityTooSmall
            | Self::IncompleteBody => StatusCode::BAD_REQUEST,
            Self::SignatureDoesNotMatch
            | Self::AccessDenied
            | Self::InvalidAccessKeyId
            | Self::RequestTimeTooSkewed
            | Self::InvalidChunkSizeError => StatusCode::FORBIDDEN,
            Self::MissingContentLength => StatusCode::LENGTH_REQUIRED,
            Self::PreconditionFailed => StatusCode::PRECONDITION_FAILED,
            Self::NotModified => StatusCode::NOT_MODIFIED,
            Self::InvalidRange => StatusCode::RANGE_NOT_SATISFIABLE,
            Self::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            Self::NotImplemented => StatusCode::NOT_IMPLEMENTED,
            Self::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl fmt::Display for S3ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An S3 error: code, message, and any extra XML elements for the envelope.
#[derive(Debug, Clone)]
pub struct S3Error {
    /// The well-known error code.
    pub code: S3ErrorCode,
    /// The human-readable message emitted in `<Message>`.
    pub message: String,
    /// Extra `<Name>Value</Name>` elements appended before `<RequestId>`.
    pub extra: Vec<(String, String)>,
}

impl S3Error {
    /// Create an error with the code's default message.
    #[must_use]
    pub fn new(code: S3ErrorCode) -> Self {
        Self::with_message(code, default_message(code))
    }

    /// Create an error with an explicit message.
    #[must_use]
    pub fn with_message(code: S3ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            extra: Vec::new(),
        }
    }

    /// Append an extra XML element to the error envelope.
    #[must_use]
    pub fn with_extra(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra.push((name.into(), value.into()));
        self
    }

    /// `InvalidArgument` carrying the offending argument name and value.
    #[must_use]
    pub fn invalid_argument(
        message: impl Into<String>,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self::with_message(S3ErrorCode::InvalidArgument, message)
            .with_extra("ArgumentName", name)
            .with_extra("ArgumentValue", value)
    }

    /// `SignatureDoesNotMatch` carrying the computed string to sign and its
    /// hex-encoded bytes, as real S3 does.
    #[must_use]
    pub fn signature_mismatch(string_to_sign: &str) -> Self {
        let bytes = string_to_sign
            .as_bytes()
            .iter()
            .map(|b| format!("{b:02x}"))
            .collect::<Vec<_>>()
            .join(" ");
        Self::new(S3ErrorCode::SignatureDoesNotMatch)
            .with_extra("StringToSign", string_to_sign)
            .with_extra("StringToSignBytes", bytes)
    }

    /// An opaque internal error. The message never carries implementation
    /// detail to the client.
    #[must_use]
    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::with_message(S3ErrorCode::InternalError, message)
    }

    /// The HTTP status code for this error.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.code.status()
    }
}

impl fmt::Display for S3Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for S3Error {}

/// Convenience result alias used across the workspace.
pub type S3Result<T> = Result<T, S3Error>;

/// The default message for each error code, matching S3 wording.
fn default_message(code: S3ErrorCode) -> &'static str {
    match code {
        S3ErrorCode::AccessDenied => "Access Denied",
        S3ErrorCode::AuthorizationHeaderMalformed => {
            "The authorization header is malformed; the authorization header requires three components: Credential, SignedHeaders, and Signature."
        }
        S3ErrorCode::AuthorizationQueryParametersError => {
            "Query-string authentication version 4 requires the X-Amz-Algorithm, X-Amz-Credential, X-Amz-Signature, X-Amz-Date, X-Amz-SignedHeaders, and X-Amz-Expires parameters."
        }
        S3ErrorCode::BadDigest => {
            "The Content-MD5 you specified did not match what we received."
        }
        S3ErrorCode::BucketNotEmpty => "The bucket you tried to delete is not empty",
        S3ErrorCode::EntityTooSmall => {
            "Your proposed upload is smaller than the minimum allowed object size. Each part must be at least 5 MB in size, except the last part."
        }
        S3ErrorCode::IncompleteBody => {
            "The request body terminated unexpectedly"
        }
        S3ErrorCode::InternalError => {
            "We encountered an internal error. Please try again."
        }
        S3ErrorCode::InvalidAccessKeyId => {
            "The AWS Access Key Id you provided does not exist in our records."
        }
        S3ErrorCode::InvalidArgument => "Invalid Argument",
        S3ErrorCode::InvalidBucketName => "The specified bucket is not valid.",
        S3ErrorCode::InvalidChunkSizeError => {
            "Only the last chunk is allowed to have a size less than 8192 bytes"
        }
        S3ErrorCode::InvalidDigest => {
            "The Content-MD5 you specified is not valid."
        }
        S3ErrorCode::InvalidPart => {
            "One or more of the specified parts could not be found. The part may not have been uploaded, or the specified entity tag may not match the part's entity tag."
        }
        S3ErrorCode::InvalidPartOrder => {
            "The list of parts was not in ascending order. Parts must be ordered by part number."
        }
        S3ErrorCode::InvalidRange => "The requested range is not satisfiable",
        S3ErrorCode::InvalidRequest => "Invalid Request",
        S3ErrorCode::InvalidStorageClass => "The storage class you specified is not valid",
        S3ErrorCode::MalformedXML => {
            "The XML you provided was not well-formed or did not validate against our published schema"
        }
        S3ErrorCode::MethodNotAllowed => {
            "The specified method is not allowed against this resource."
        }
        S3ErrorCode::MissingContentLength => {
            "You must provide the Content-Length HTTP header."
        }
        S3ErrorCode::NoSuchBucket => "The specified bucket does not exist",
        S3ErrorCode::NoSuchCORSConfiguration => "The CORS configuration does not exist",
        S3ErrorCode::NoSuchKey => "The specified key does not exist.",
        S3ErrorCode::NoSuchLifecycleConfiguration => "The lifecycle configuration does not exist",
        S3ErrorCode::NoSuchTagSet => "The TagSet does not exist",
        S3ErrorCode::NoSuchUpload => {
            "The specified upload does not exist. The upload ID may be invalid, or the upload may have been aborted or completed."
        }
        S3ErrorCode::NoSuchWebsiteConfiguration => {
            "The specified bucket does not have a website configuration"
        }
        S3ErrorCode::NotImplemented => {
            "A header you provided implies functionality that is not implemented."
        }
        S3ErrorCode::NotModified => "Not Modified",
        S3ErrorCode::PreconditionFailed => {
            "At least one of the pre-conditions you specified did not hold"
        }
        S3ErrorCode::RequestTimeTooSkewed => {
            "The difference between the request time and the server's time is too large."
        }
        S3ErrorCode::SignatureDoesNotMatch => {
            "The request signature we calculated does not match the signature you provided. Check your key and signing method."
        }
    }
}
