//! XML codec errors.

/// Errors produced while encoding or decoding S3 XML documents.
#[derive(Debug, thiserror::Error)]
pub enum XmlError {
    /// The underlying reader reported malformed XML.
    #[error("malformed XML: {0}")]
    Malformed(#[from] quick_xml::Error),

    /// Writing to the output buffer failed.
    #[error("XML write error: {0}")]
    Io(#[from] std::io::Error),

    /// A required element was absent.
    #[error("missing required element: {0}")]
    MissingElement(String),

    /// An element's text content could not be parsed.
    #[error("invalid element content: {0}")]
    ParseError(String),

    /// The document structure did not match the expected schema.
    #[error("unexpected element: {0}")]
    UnexpectedElement(String),
}
