//! The HTTP pipeline of the Barrel S3 emulator.
//!
//! A request flows through an explicit pipeline:
//!
//! ```text
//! parse host (router) -> CORS preflight? -> website service?
//!        -> SigV4 gate (auth) -> identify operation -> handler
//!        -> response encoding (+ simple-CORS headers, common headers)
//! ```
//!
//! [`service::S3Service`] wraps the pipeline in a hyper `Service`;
//! [`service::handle_request`] is the transport-free entry point used by the
//! in-process tests.

pub mod body;
pub mod form;
pub mod handlers;
pub mod response;
pub mod router;
pub mod service;

pub use body::S3ResponseBody;
pub use router::{HostResolver, ResolvedTarget, S3ServiceKind};
pub use service::{S3Service, ServiceState, handle_request};
