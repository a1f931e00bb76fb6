//! Listing pagination.
//!
//! Operates on the sorted key set of a bucket: keys are filtered by prefix,
//! collapsed into common prefixes when a delimiter is set, and paginated by
//! `max-keys`. Keys and common prefixes both count toward the page size and
//! are emitted interleaved in lexicographic order, exactly as S3 does.

use std::collections::HashSet;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;

/// The default and maximum `max-keys` value.
pub const MAX_KEYS_LIMIT: u32 = 1000;

/// Parameters of a listing request, shared by v1 and v2.
#[derive(Debug, Clone, Default)]
pub struct ListParams {
    /// Only keys starting with this prefix are returned.
    pub prefix: String,
    /// Collapse keys sharing a prefix up to the next occurrence of this
    /// delimiter into a single common prefix.
    pub delimiter: Option<String>,
    /// Exclusive lower bound: v1 `marker`, v2 `start-after` or decoded
    /// continuation token. May name a nonexistent key.
    pub start_after: Option<String>,
    /// Page size; clamped to [`MAX_KEYS_LIMIT`] by the caller.
    pub max_keys: u32,
}

/// One emitted listing entry, in lexicographic order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListItem {
    /// An object key.
    Key(String),
    /// A delimiter-collapsed common prefix.
    CommonPrefix(String),
}

impl ListItem {
    /// The string value of the entry, used for markers.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Key(key) | Self::CommonPrefix(key) => key,
        }
    }
}

/// A paginated view over a bucket's key set.
#[derive(Debug, Clone, Default)]
pub struct KeyPage {
    /// Emitted entries in order.
    pub items: Vec<ListItem>,
    /// Whether more entries follow this page.
    pub is_truncated: bool,
    /// The last emitted entry (key or common prefix), used to derive both
    /// the v1 `NextMarker` and the v2 continuation token.
    pub last_emitted: Option<String>,
}

impl KeyPage {
    /// The v1 `NextMarker`: populated only when a delimiter was in use and
    /// the page is truncated.
    #[must_use]
    pub fn next_marker(&self, delimiter_set: bool) -> Option<String> {
        if delimiter_set && self.is_truncated {
            self.last_emitted.clone()
        } else {
            None
        }
    }

    /// Keys on this page, in order.
    #[must_use]
    pub fn keys(&self) -> Vec<&str> {
        self.items
            .iter()
            .filter_map(|item| match item {
                ListItem::Key(key) => Some(key.as_str()),
                ListItem::CommonPrefix(_) => None,
            })
            .collect()
    }

    /// Common prefixes on this page, in order.
    #[must_use]
    pub fn common_prefixes(&self) -> Vec<&str> {
        self.items
            .iter()
            .filter_map(|item| match item {
                ListItem::CommonPrefix(prefix) => Some(prefix.as_str()),
                ListItem::Key(_) => None,
            })
            .collect()
    }
}

/// Paginate a sorted key set.
///
/// `sorted_keys` must be in strict lexicographic byte order; the store
/// guarantees this by sorting directory entries after decoding.
#[must_use]
pub fn paginate(sorted_keys: &[String], params: &ListParams) -> KeyPage {
    if params.max_keys == 0 {
        return KeyPage::default();
    }
    let max = params.max_keys.min(MAX_KEYS_LIMIT) as usize;

    let mut page = KeyPage::default();
    let mut seen_prefixes: HashSet<String> = HashSet::new();

    for key in sorted_keys {
        if let Some(after) = &params.start_after {
            if key.as_str() <= after.as_str() {
                continue;
            }
        }
        if !key.starts_with(&params.prefix) {
            continue;
        }

        let item = match &params.delimiter {
            Some(delimiter) if !delimiter.is_empty() => {
                let rest = &key[params.prefix.len()..];
                match rest.find(delimiter.as_str()) {
                    Some(pos) => {
                        let prefix =
                            format!("{}{}", params.prefix, &rest[..pos + delimiter.len()]);
                        if seen_prefixes.contains(&prefix) {
                            continue;
                        }
                        seen_prefixes.insert(prefix.clone());
                        ListItem::CommonPrefix(prefix)
                    }
                    None => ListItem::Key(key.clone()),
                }
            }
            _ => ListItem::Key(key.clone()),
        };

        if page.items.len() >= max {
            page.is_truncated = true;
            break;
        }
        page.last_emitted = Some(item.as_str().to_owned());
        page.items.push(item);
    }

    page
}

/// Encode a continuation token from the last emitted entry.
#[must_use]
pub fn encode_continuation_token(last_emitted: &str) -> String {
    BASE64.encode(last_emitted)
}

/// Decode a v2 continuation token back into an exclusive marker.
///
/// Undecodable tokens are treated as absent rather than erroring, matching
/// the forgiving behavior of the emulator.
#[must_use]
pub fn decode_continuation_token(token: &str) -> Option<String> {
    BASE64
        .decode(token)
        .ok()
        .and_then(|bytes| String::from_utf8(bytes).ok())
}
