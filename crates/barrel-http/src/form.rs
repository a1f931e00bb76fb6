//! `multipart/form-data` parsing for browser-based POST uploads.
//!
//! A synchronous byte-scan parser over the collected body. Field order is
//! preserved because the POST Object contract only honors fields that appear
//! before the `file` field; everything after it is ignored.

use bytes::Bytes;

use barrel_model::{S3Error, S3ErrorCode};

/// A parsed POST form.
#[derive(Debug, Default)]
pub struct PostForm {
    /// Non-file fields appearing before the file part, in submission order.
    pub fields: Vec<(String, String)>,
    /// The uploaded file part, if any.
    pub file: Option<FilePart>,
}

impl PostForm {
    /// First value of a named field.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }
}

/// The uploaded file part.
#[derive(Debug)]
pub struct FilePart {
    /// The filename from `Content-Disposition`, if supplied.
    pub filename: Option<String>,
    /// The part's `Content-Type`, if supplied.
    pub content_type: Option<String>,
    /// The file bytes.
    pub data: Bytes,
}

/// Extract the boundary from a `multipart/form-data` Content-Type.
///
/// # Errors
///
/// Non-multipart content types are rejected with 412 `PreconditionFailed`,
/// as S3 does for POST uploads.
pub fn extract_boundary(content_type: &str) -> Result<String, S3Error> {
    if !content_type
        .to_ascii_lowercase()
        .starts_with("multipart/form-data")
    {
        return Err(S3Error::with_message(
            S3ErrorCode::PreconditionFailed,
            "At least one of the pre-conditions you specified did not hold",
        ));
    }

    for part in content_type.split(';') {
        if let Some(value) = part.trim().strip_prefix("boundary=") {
            let boundary = value.trim_matches('"');
            if boundary.is_empty() {
                break;
            }
            return Ok(boundary.to_owned());
        }
    }

    Err(S3Error::with_message(
        S3ErrorCode::InvalidRequest,
        "Missing boundary in multipart/form-data Content-Type",
    ))
}

/// Parse a multipart body into ordered fields and the file part.
///
/// Parsing stops collecting fields at the `file` part; later fields are
/// discarded per the POST Object contract.
///
/// # Errors
///
/// Returns `MalformedPOSTRequest`-style errors as `InvalidRequest`.
pub fn parse_form(body: &[u8], boundary: &str) -> Result<PostForm, S3Error> {
    let delimiter = format!("--{boundary}");
    let end_delimiter = format!("--{boundary}--");

    let mut form = PostForm::default();

    for part in split_parts(body, delimiter.as_bytes(), end_delimiter.as_bytes()) {
        let Some((headers, content)) = split_headers_body(part) else {
            continue;
        };
        let disposition = parse_content_disposition(headers);
        let Some(name) = disposition.name else {
            continue;
        };

        if name == "file" {
            form.file = Some(FilePart {
                filename: disposition.filename,
                content_type: parse_part_content_type(headers),
                data: Bytes::copy_from_slice(content),
            });
            // Only fields before the file participate.
            break;
        }
        let value = String::from_utf8_lossy(content).into_owned();
        form.fields.push((name, value));
    }

    Ok(form)
}

/// Split the body into parts by boundary delimiter.
fn split_parts<'a>(body: &'a [u8], delimiter: &[u8], end_delimiter: &[u8]) -> Vec<&'a [u8]> {
    let mut parts = Vec::new();
    let mut remaining = body;

    // Skip the preamble before the first delimiter.
    match find_bytes(remaining, delimiter) {
        Some(pos) => {
            remaining = &remaining[pos + delimiter.len()..];
            remaining = skip_crlf(remaining);
        }
        None => return parts,
    }

    loop {
        if remaining.starts_with(end_delimiter)
            || remaining
                .strip_prefix(b"\r\n")
                .is_some_and(|r| r.starts_with(end_delimiter))
        {
            break;
        }

        match find_bytes(remaining, delimiter) {
            Some(pos) => {
                parts.push(strip_trailing_crlf(&remaining[..pos]));
                remaining = &remaining[pos + delimiter.len()..];
                remaining = skip_crlf(remaining);
            }
            None => {
                let part = strip_trailing_crlf(remaining);
                if !part.is_empty() {
                    parts.push(part);
                }
                break;
            }
        }
    }

    parts
}

/// Split a part into its header block and content at the first blank line.
fn split_headers_body(part: &[u8]) -> Option<(&[u8], &[u8])> {
    let separator = b"\r\n\r\n";
    find_bytes(part, separator).map(|pos| (&part[..pos], &part[pos + separator.len()..]))
}

struct ContentDisposition {
    name: Option<String>,
    filename: Option<String>,
}

fn parse_content_disposition(headers: &[u8]) -> ContentDisposition {
    let headers = String::from_utf8_lossy(headers);
    let mut name = None;
    let mut filename = None;

    for line in headers.split("\r\n") {
        let Some((header, value)) = line.split_once(':') else {
            continue;
        };
        if !header.eq_ignore_ascii_case("content-disposition") {
            continue;
        }
        for param in value.split(';') {
            let param = param.trim();
            if let Some(v) = param.strip_prefix("name=") {
                name = Some(v.trim_matches('"').to_owned());
            } else if let Some(v) = param.strip_prefix("filename=") {
                filename = Some(v.trim_matches('"').to_owned());
            }
        }
    }

    ContentDisposition { name, filename }
}

fn parse_part_content_type(headers: &[u8]) -> Option<String> {
    let headers = String::from_utf8_lossy(headers);
    for line in headers.split("\r\n") {
        let Some((header, value)) = line.split_once(':') else {
            continue;
        };
        if header.eq_ignore_ascii_case("content-type") {
            return Some(value.trim().to_owned());
        }
    }
    None
}

fn find_bytes(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

fn skip_crlf(bytes: &[u8]) -> &[u8] {
    bytes.strip_prefix(b"\r\n").unwrap_or(bytes)
}

fn strip_trailing_crlf(bytes: &[u8]) -> &[u8] {
    bytes.strip_suffix(b"\r\n").unwrap_or(bytes)
}
