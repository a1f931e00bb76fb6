//! The response body type.
//!
//! Supports buffered bodies (XML documents, object content, HTML error
//! pages) and empty bodies (204, 304, HEAD, redirects). Both modes implement
//! [`http_body::Body`] so responses plug straight into hyper.

use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use http_body::Frame;

/// Response body for every Barrel response.
#[derive(Debug, Default)]
pub enum S3ResponseBody {
    /// Buffered content; `None` once the single frame has been emitted.
    Buffered(Option<Bytes>),
    /// No body at all.
    #[default]
    Empty,
}

impl S3ResponseBody {
    /// A buffered body from raw bytes.
    #[must_use]
    pub fn from_bytes(data: impl Into<Bytes>) -> Self {
        Self::Buffered(Some(data.into()))
    }

    /// A buffered body from a string.
    #[must_use]
    pub fn from_string(s: impl Into<String>) -> Self {
        Self::Buffered(Some(Bytes::from(s.into())))
    }

    /// A buffered body from an XML byte vector.
    #[must_use]
    pub fn from_xml(xml: Vec<u8>) -> Self {
        Self::Buffered(Some(Bytes::from(xml)))
    }

    /// The empty body.
    #[must_use]
    pub fn empty() -> Self {
        Self::Empty
    }

    /// The body's bytes, for tests and assertions.
    #[must_use]
    pub fn as_bytes(&self) -> Bytes {
        match self {
            Self::Buffered(Some(bytes)) => bytes.clone(),
            _ => Bytes::new(),
        }
    }
}

impl http_body::Body for S3ResponseBody {
    type Data = Bytes;
    type Error = std::io::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        match self.get_mut() {
            Self::Buffered(slot) => Poll::Ready(slot.take().map(|bytes| Ok(Frame::data(bytes)))),
            Self::Empty => Poll::Ready(None),
        }
    }

    fn is_end_stream(&self) -> bool {
        match self {
            Self::Buffered(slot) => slot.is_none(),
            Self::Empty => true,
        }
    }

    fn size_hint(&self) -> http_body::SizeHint {
        match self {
            Self::Buffered(Some(bytes)) => http_body::SizeHint::with_exact(bytes.len() as u64),
            _ => http_body::SizeHint::with_exact(0),
        }
    }
}
