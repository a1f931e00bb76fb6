//! ETag computation.
//!
//! Single-part objects carry the hex MD5 of their content. Multipart objects
//! carry a composite tag: the hex MD5 of the concatenated raw part digests,
//! suffixed with `-{part count}`.

use md5::{Digest, Md5};

/// Hex MD5 of a byte slice; the ETag of a single-part object.
#[must_use]
pub fn etag_of(data: &[u8]) -> String {
    hex::encode(Md5::digest(data))
}

/// Composite multipart ETag from the bare (unquoted) hex ETags of the parts.
///
/// `HEX(MD5(MD5(part1) ‖ … ‖ MD5(partN)))-N`.
///
/// Part ETags that are not valid hex contribute nothing to the digest; that
/// cannot happen for tags produced by `UploadPart`.
#[must_use]
pub fn composite_etag(part_etags: &[String]) -> String {
    let mut hasher = Md5::new();
    for etag in part_etags {
        if let Ok(raw) = hex::decode(etag) {
            hasher.update(&raw);
        }
    }
    format!("{}-{}", hex::encode(hasher.finalize()), part_etags.len())
}

/// Strip surrounding double quotes from a client-supplied ETag.
#[must_use]
pub fn unquote_etag(etag: &str) -> &str {
    etag.trim_matches('"')
}
