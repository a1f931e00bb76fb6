//! S3 RestXml codec for the Barrel emulator.
//!
//! Request bodies (CORS and website configurations, bulk deletes, multipart
//! completions, tag sets) are parsed by [`deserialize::from_xml`]; response
//! documents are produced by [`serialize::to_xml`]. Both sides follow the AWS
//! RestXml conventions:
//!
//! - Namespace `http://s3.amazonaws.com/doc/2006-03-01/` on response roots.
//! - XML declaration `<?xml version="1.0" encoding="UTF-8"?>`.
//! - ISO 8601 timestamps with millisecond precision.
//! - Entity-encoded text is unescaped on ingestion so values like
//!   `url?test=1&key=` survive a config round-trip.

pub mod deserialize;
pub mod error;
pub mod serialize;

pub use deserialize::{S3Deserialize, from_xml, root_element_name};
pub use error::XmlError;
pub use serialize::{S3Serialize, error_envelope, to_xml};
