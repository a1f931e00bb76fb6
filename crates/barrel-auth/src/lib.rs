//! AWS Signature Version 4 verification for the Barrel S3 emulator.
//!
//! Every non-OPTIONS, non-website request passes through [`sigv4::authenticate`],
//! which detects the authentication form in use (Authorization header,
//! presigned query string, or anonymous), reconstructs the canonical request,
//! and verifies the signature against the account registry.
//!
//! Streaming uploads declared with `x-amz-content-sha256:
//! STREAMING-AWS4-HMAC-SHA256-PAYLOAD` are decoded and verified chunk by
//! chunk by [`chunked::decode_chunked_body`] using the seed signature from
//! the request.

pub mod canonical;
pub mod chunked;
pub mod credentials;
pub mod error;
pub mod presigned;
pub mod sigv4;

pub use credentials::{Account, AccountRegistry};
pub use error::AuthError;
pub use sigv4::{Authentication, authenticate};
