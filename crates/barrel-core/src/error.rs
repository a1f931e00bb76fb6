//! Store errors and their S3 wire mapping.

use barrel_model::{S3Error, S3ErrorCode};

/// Errors produced by the object store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The specified bucket does not exist.
    #[error("no such bucket: {bucket}")]
    NoSuchBucket { bucket: String },

    /// The specified key does not exist.
    #[error("no such key: {key}")]
    NoSuchKey { key: String },

    /// The bucket still contains objects or incomplete uploads.
    #[error("bucket not empty: {bucket}")]
    BucketNotEmpty { bucket: String },

    /// The bucket name violates naming rules.
    #[error("invalid bucket name: {name}")]
    InvalidBucketName { name: String },

    /// The multipart upload does not exist.
    #[error("no such upload: {upload_id}")]
    NoSuchUpload { upload_id: String },

    /// A completion part is missing or its ETag does not match.
    #[error("invalid part")]
    InvalidPart,

    /// Completion parts were not in ascending part-number order.
    #[error("invalid part order")]
    InvalidPartOrder,

    /// A non-final part is below the 5 MiB minimum.
    #[error("entity too small")]
    EntityTooSmall,

    /// The requested range is entirely outside the object.
    #[error("range not satisfiable")]
    InvalidRange,

    /// Filesystem failure underneath the store.
    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A metadata sidecar could not be parsed.
    #[error("corrupt object metadata: {0}")]
    CorruptMetadata(#[from] serde_json::Error),
}

impl From<StoreError> for S3Error {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NoSuchBucket { bucket } => {
                S3Error::new(S3ErrorCode::NoSuchBucket).with_extra("BucketName", bucket)
            }
            StoreError::NoSuchKey { key } => {
                S3Error::new(S3ErrorCode::NoSuchKey).with_extra("Key", key)
            }
            StoreError::BucketNotEmpty { bucket } => {
                S3Error::new(S3ErrorCode::BucketNotEmpty).with_extra("BucketName", bucket)
            }
            StoreError::InvalidBucketName { .. } => S3Error::new(S3ErrorCode::InvalidBucketName),
            StoreError::NoSuchUpload { .. } => S3Error::new(S3ErrorCode::NoSuchUpload),
            StoreError::InvalidPart => S3Error::new(S3ErrorCode::InvalidPart),
            StoreError::InvalidPartOrder => S3Error::new(S3ErrorCode::InvalidPartOrder),
            StoreError::EntityTooSmall => S3Error::new(S3ErrorCode::EntityTooSmall),
            StoreError::InvalidRange => S3Error::new(S3ErrorCode::InvalidRange),
            StoreError::Io(source) => {
                tracing::error!(error = %source, "store I/O failure");
                S3Error::internal_error("We encountered an internal error. Please try again.")
            }
            StoreError::CorruptMetadata(source) => {
                tracing::error!(error = %source, "corrupt metadata sidecar");
                S3Error::internal_error("We encountered an internal error. Please try again.")
            }
        }
    }
}

/// Convenience result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_map_store_errors_to_s3_codes() {
        let cases: Vec<(StoreError, S3ErrorCode)> = vec![
            (
                StoreError::NoSuchBucket {
                    bucket: "b".to_owned(),
                },
                S3ErrorCode::NoSuchBucket,
            ),
            (
                StoreError::NoSuchKey { key: "k".to_owned() },
                S3ErrorCode::NoSuchKey,
            ),
            (
                StoreError::BucketNotEmpty {
                    bucket: "b".to_owned(),
                },
                S3ErrorCode::BucketNotEmpty,
            ),
            (StoreError::InvalidPart, S3ErrorCode::InvalidPart),
            (StoreError::EntityTooSmall, S3ErrorCode::EntityTooSmall),
            (StoreError::InvalidRange, S3ErrorCode::InvalidRange),
        ];
        for (err, code) in cases {
            let s3: S3Error = err.into();
            assert_eq!(s3.code, code);
        }
    }

    #[test]
    fn test_should_not_leak_io_detail() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "/secret/path denied");
        let s3: S3Error = StoreError::Io(io).into();
        assert_eq!(s3.code, S3ErrorCode::InternalError);
        assert!(!s3.message.contains("/secret/path"));
    }
}
