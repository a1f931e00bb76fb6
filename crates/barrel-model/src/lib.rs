//! Wire-level types for the Barrel S3 emulator.
//!
//! This crate defines the vocabulary shared by every other Barrel crate:
//!
//! - [`error::S3Error`] and [`error::S3ErrorCode`]: the unified error carrier
//!   that the HTTP layer renders into S3 XML error envelopes.
//! - [`operations::S3Operation`]: one variant per dispatchable S3 operation.
//! - [`types`]: storage classes, owners, object summaries, and the bucket
//!   subresource configuration documents (CORS, website, tagging).
//! - [`output`]: typed response documents serialized to XML by `barrel-xml`.
//!
//! The crate is deliberately free of I/O and async code so it can be depended
//! on from every layer without pulling in the runtime.

pub mod error;
pub mod operations;
pub mod output;
pub mod types;

pub use error::{S3Error, S3ErrorCode, S3Result};
pub use operations::S3Operation;
