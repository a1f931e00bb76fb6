//! Signed streaming upload (`aws-chunked`) decoding.
//!
//! Bodies declared with `x-amz-content-sha256:
//! STREAMING-AWS4-HMAC-SHA256-PAYLOAD` arrive as a sequence of framed
//! chunks:
//!
//! ```text
//! hex(len);chunk-signature=hex(sig)\r\n
//! <len payload bytes>\r\n
//! ```
//!
//! Each chunk signature chains off the previous one (the request signature
//! seeds the chain):
//!
//! ```text
//! AWS4-HMAC-SHA256-PAYLOAD
//! {timestamp}
//! {credential scope}
//! {previous signature}
//! hex(SHA256(""))
//! hex(SHA256(chunk payload))
//! ```
//!
//! The stream must end with a zero-length chunk, every non-final chunk must
//! be at least 8 KiB, and the decoded byte count must equal the
//! `x-amz-decoded-content-length` header.

use bytes::{BufMut, Bytes, BytesMut};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use tracing::debug;

use crate::error::AuthError;
use crate::sigv4::{ChunkContext, compute_signature};

/// Minimum size of every chunk except the last.
pub const MIN_CHUNK_SIZE: usize = 8192;

/// The algorithm line of per-chunk strings to sign.
const CHUNK_ALGORITHM: &str = "AWS4-HMAC-SHA256-PAYLOAD";

/// Decode and verify a signed streaming body.
///
/// `decoded_length` is the value of the `x-amz-decoded-content-length`
/// header (its presence is enforced by the caller, which maps absence to
/// `MissingContentLength`).
///
/// # Errors
///
/// - [`AuthError::InvalidChunkSize`] when a non-final chunk is under 8 KiB.
/// - [`AuthError::SignatureDoesNotMatch`] when a chunk signature breaks the
///   chain.
/// - [`AuthError::IncompleteBody`] when the stream is unterminated or the
///   decoded byte count disagrees with the declared length.
pub fn decode_chunked_body(
    body: &[u8],
    ctx: &ChunkContext,
    decoded_length: u64,
) -> Result<Bytes, AuthError> {
    let empty_hash = hex::encode(Sha256::digest(b""));
    let mut decoded = BytesMut::with_capacity(decoded_length.min(1u64 << 24) as usize);
    let mut previous_signature = ctx.seed_signature.clone();
    let mut pos = 0usize;
    let mut ordinal = 0usize;
    let mut previous_size: Option<usize> = None;
    let mut terminated = false;

    while pos < body.len() {
        let header_end = find_crlf(body, pos).ok_or(AuthError::IncompleteBody)?;
        let header = std::str::from_utf8(&body[pos..header_end])
            .map_err(|_| AuthError::MalformedChunk("chunk header is not UTF-8".to_owned()))?;
        let (size, signature) = parse_chunk_header(header)?;
        ordinal += 1;

        // A chunk is known not to be the final data chunk once a further
        // data chunk arrives; the undersize error is reported at that point,
        // against the current ordinal, matching S3.
        if size != 0 {
            if let Some(prev) = previous_size {
                if prev < MIN_CHUNK_SIZE {
                    return Err(AuthError::InvalidChunkSize {
                        chunk: ordinal,
                        size: prev,
                    });
                }
            }
        }

        pos = header_end + 2;
        let payload_end = pos
            .checked_add(size)
            .filter(|end| *end <= body.len())
            .ok_or(AuthError::IncompleteBody)?;
        let payload = &body[pos..payload_end];
        pos = payload_end;

        if body.len() >= pos + 2 && &body[pos..pos + 2] == b"\r\n" {
            pos += 2;
        } else if size != 0 {
            return Err(AuthError::IncompleteBody);
        }

        let string_to_sign = format!(
            "{CHUNK_ALGORITHM}\n{}\n{}\n{previous_signature}\n{empty_hash}\n{}",
            ctx.timestamp,
            ctx.scope,
            hex::encode(Sha256::digest(payload)),
        );
        let expected = compute_signature(&ctx.signing_key, &string_to_sign);
        let matches: bool = expected.as_bytes().ct_eq(signature.as_bytes()).into();
        if !matches {
            debug!(ordinal, "chunk signature mismatch");
            return Err(AuthError::SignatureDoesNotMatch { string_to_sign });
        }
        previous_signature = signature;

        if size == 0 {
            terminated = true;
            break;
        }

        decoded.put_slice(payload);
        previous_size = Some(size);
    }

    if !terminated {
        return Err(AuthError::IncompleteBody);
    }
    if decoded.len() as u64 != decoded_length {
        return Err(AuthError::IncompleteBody);
    }

    Ok(decoded.freeze())
}

/// Parse `hex(len);chunk-signature=hex(sig)`.
fn parse_chunk_header(header: &str) -> Result<(usize, String), AuthError> {
    let (size_hex, rest) = header
        .split_once(';')
        .ok_or_else(|| AuthError::MalformedChunk(format!("invalid chunk header: {header}")))?;
    let size = usize::from_str_radix(size_hex, 16)
        .map_err(|_| AuthError::MalformedChunk(format!("invalid chunk length: {size_hex}")))?;
    let signature = rest
        .strip_prefix("chunk-signature=")
        .ok_or_else(|| AuthError::MalformedChunk(format!("missing chunk signature: {header}")))?;
    if signature.len() != 64 || !signature.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(AuthError::MalformedChunk(format!(
            "invalid chunk signature: {signature}"
        )));
    }
    Ok((size, signature.to_owned()))
}

fn find_crlf(body: &[u8], from: usize) -> Option<usize> {
    body[from..]
        .windows(2)
        .position(|w| w == b"\r\n")
        .map(|offset| from + offset)
}
