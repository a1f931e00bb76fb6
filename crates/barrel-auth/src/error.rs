//! Authentication errors and their S3 wire mapping.

use barrel_model::{S3Error, S3ErrorCode};

/// Errors produced during request authentication.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// The request carried more than one authentication mechanism.
    #[error("only one auth mechanism allowed")]
    MultipleAuthMechanisms,

    /// The request used AWS Signature Version 2, which is not supported.
    #[error("unsupported signature version")]
    LegacySignatureVersion,

    /// The `Authorization` header could not be parsed.
    #[error("malformed authorization header: {0}")]
    MalformedHeader(String),

    /// The presigned query parameter set is incomplete or invalid.
    #[error("invalid query parameters: {0}")]
    QueryParameters(String),

    /// The access key ID is not registered.
    #[error("unknown access key id: {0}")]
    InvalidAccessKeyId(String),

    /// Access denied (missing/unparseable date, expired presign, …).
    #[error("access denied: {0}")]
    AccessDenied(String),

    /// The request timestamp is more than 15 minutes from server time.
    #[error("request time too skewed: request {request_time}, server {server_time}")]
    RequestTimeTooSkewed {
        request_time: String,
        server_time: String,
    },

    /// The computed signature did not match the provided one.
    #[error("signature does not match")]
    SignatureDoesNotMatch {
        /// The string to sign the server computed, echoed to the client.
        string_to_sign: String,
    },

    /// Streaming upload without `x-amz-decoded-content-length`.
    #[error("missing decoded content length")]
    MissingDecodedContentLength,

    /// The chunk stream did not add up to the declared decoded length.
    #[error("incomplete streaming body")]
    IncompleteBody,

    /// A non-final chunk was below the minimum chunk size.
    #[error("chunk {chunk} too small: {size} bytes")]
    InvalidChunkSize {
        /// 1-based ordinal of the offending chunk as reported by S3.
        chunk: usize,
        /// The undersized chunk's byte length.
        size: usize,
    },

    /// The chunk framing itself could not be parsed.
    #[error("malformed chunk framing: {0}")]
    MalformedChunk(String),
}

impl From<AuthError> for S3Error {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::MultipleAuthMechanisms => S3Error::with_message(
                S3ErrorCode::InvalidArgument,
                "Only one auth mechanism allowed; only the X-Amz-Algorithm query parameter, Signature query string parameter or the Authorization header should be specified",
            ),
            AuthError::LegacySignatureVersion => S3Error::with_message(
                S3ErrorCode::InvalidArgument,
                "Unsupported Authorization Type",
            )
            .with_extra("ArgumentName", "Authorization"),
            AuthError::MalformedHeader(message) => {
                S3Error::with_message(S3ErrorCode::AuthorizationHeaderMalformed, message)
            }
            AuthError::QueryParameters(message) => {
                S3Error::with_message(S3ErrorCode::AuthorizationQueryParametersError, message)
            }
            AuthError::InvalidAccessKeyId(key) => {
                S3Error::new(S3ErrorCode::InvalidAccessKeyId).with_extra("AWSAccessKeyId", key)
            }
            AuthError::AccessDenied(message) => {
                S3Error::with_message(S3ErrorCode::AccessDenied, message)
            }
            AuthError::RequestTimeTooSkewed {
                request_time,
                server_time,
            } => S3Error::new(S3ErrorCode::RequestTimeTooSkewed)
                .with_extra("RequestTime", request_time)
                .with_extra("ServerTime", server_time),
            AuthError::SignatureDoesNotMatch { string_to_sign } => {
                S3Error::signature_mismatch(&string_to_sign)
            }
            AuthError::MissingDecodedContentLength => {
                S3Error::new(S3ErrorCode::MissingContentLength)
            }
            AuthError::IncompleteBody => S3Error::with_message(
                S3ErrorCode::IncompleteBody,
                "The request body terminated unexpectedly",
            ),
            AuthError::InvalidChunkSize { chunk, size } => {
                S3Error::new(S3ErrorCode::InvalidChunkSizeError)
                    .with_extra("Chunk", chunk.to_string())
                    .with_extra("BadChunkSize", size.to_string())
            }
            AuthError::MalformedChunk(message) => {
                S3Error::with_message(S3ErrorCode::IncompleteBody, message)
            }
        }
    }
}
