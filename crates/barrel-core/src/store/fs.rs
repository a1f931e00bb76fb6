//! The filesystem-backed object store.
//!
//! # Layout
//!
//! ```text
//! {root}/
//!   .tmp/                          scratch area for atomic writes
//!   {bucket}/
//!     .cors.xml, .website.xml, …   bucket subresource configs
//!     .uploads/{uploadId}/
//!       .metadata.json             target key + initiate-time metadata
//!       part-{n}                   raw part content
//!     {pct(key)}/
//!       content                    raw object bytes
//!       .metadata.json             ObjectMetadata sidecar
//!       .tagging.xml, …            object subresource configs
//! ```
//!
//! Object keys are percent-encoded into single directory names (the store is
//! flat; `/` has no structural meaning). Writes land in `.tmp` and are
//! renamed into place so readers always observe a complete object, and a
//! per-key mutex serializes writers to the same object.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, percent_decode_str, utf8_percent_encode};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tracing::debug;
use uuid::Uuid;

use barrel_model::types::{BucketInfo, CompletedPart, ObjectInfo};

use crate::checksums::{composite_etag, etag_of, unquote_etag};
use crate::error::{StoreError, StoreResult};
use crate::store::list::{self, ListParams};
use crate::store::metadata::ObjectMetadata;
use crate::store::SubresourceKind;

/// Minimum size of every multipart part except the last, in bytes.
pub const MIN_PART_SIZE: u64 = 5 * 1024 * 1024;

/// Characters percent-encoded in on-disk object directory names.
///
/// `.` is encoded so that object directories can never collide with the
/// dot-prefixed internal entries (`.uploads`, `.cors.xml`, …).
const FS_NAME: &AsciiSet = &NON_ALPHANUMERIC.remove(b'-').remove(b'_').remove(b'~');

const CONTENT_FILE: &str = "content";
const METADATA_FILE: &str = ".metadata.json";
const UPLOADS_DIR: &str = ".uploads";
const TMP_DIR: &str = ".tmp";

type KeyLock = Arc<tokio::sync::Mutex<()>>;

/// A stored object: its metadata sidecar plus (a window of) its content.
#[derive(Debug, Clone)]
pub struct StoredObject {
    /// The metadata sidecar. `size` is always the full object size, even
    /// for range reads.
    pub metadata: ObjectMetadata,
    /// The requested content bytes.
    pub content: Bytes,
}

/// An in-flight multipart upload's persisted state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadInfo {
    /// The key the completed object will be stored under.
    pub key: String,
    /// Metadata captured at initiate time.
    pub metadata: ObjectMetadata,
}

/// One page of a bucket listing with metadata resolved.
#[derive(Debug, Clone, Default)]
pub struct ObjectPage {
    /// Objects on this page, in lexicographic key order.
    pub objects: Vec<ObjectInfo>,
    /// Common prefixes, in order of first appearance (lexicographic).
    pub common_prefixes: Vec<String>,
    /// Whether more entries follow.
    pub is_truncated: bool,
    /// V1 `NextMarker` (delimited + truncated listings only).
    pub next_marker: Option<String>,
    /// The last emitted key or prefix; feeds the v2 continuation token.
    pub last_emitted: Option<String>,
}

/// The filesystem-backed store.
#[derive(Debug)]
pub struct FilesystemStore {
    root: PathBuf,
    key_locks: DashMap<(String, String), KeyLock>,
}

impl FilesystemStore {
    /// Open (creating if necessary) a store rooted at `root`.
    ///
    /// # Errors
    ///
    /// Returns an error if the root or scratch directories cannot be created.
    pub async fn open(root: impl Into<PathBuf>) -> StoreResult<Self> {
        let root = root.into();
        fs::create_dir_all(root.join(TMP_DIR)).await?;
        debug!(root = %root.display(), "opened filesystem store");
        Ok(Self {
            root,
            key_locks: DashMap::new(),
        })
    }

    /// Remove every bucket and recreate an empty store.
    ///
    /// # Errors
    ///
    /// Returns an error if the root cannot be removed or recreated.
    pub async fn reset(&self) -> StoreResult<()> {
        fs::remove_dir_all(&self.root).await?;
        fs::create_dir_all(self.root.join(TMP_DIR)).await?;
        self.key_locks.clear();
        Ok(())
    }

    /// The store's root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    // -----------------------------------------------------------------------
    // Buckets
    // -----------------------------------------------------------------------

    /// List all buckets sorted by name.
    ///
    /// # Errors
    ///
    /// Returns an error on directory read failure.
    pub async fn list_buckets(&self) -> StoreResult<Vec<BucketInfo>> {
        let mut buckets = Vec::new();
        let mut entries = fs::read_dir(&self.root).await?;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with('.') || !entry.file_type().await?.is_dir() {
                continue;
            }
            let creation_date = modified_time(&entry.metadata().await?);
            buckets.push(BucketInfo {
                name,
                creation_date,
            });
        }
        buckets.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(buckets)
    }

    /// Fetch a single bucket, or `None` if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error on filesystem failure other than absence.
    pub async fn get_bucket(&self, bucket: &str) -> StoreResult<Option<BucketInfo>> {
        match fs::metadata(self.bucket_path(bucket)).await {
            Ok(meta) if meta.is_dir() => Ok(Some(BucketInfo {
                name: bucket.to_owned(),
                creation_date: modified_time(&meta),
            })),
            Ok(_) => Ok(None),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    /// Create a bucket. Creating an existing bucket is a no-op, as in
    /// us-east-1.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidBucketName`] for invalid names.
    pub async fn create_bucket(&self, bucket: &str) -> StoreResult<BucketInfo> {
        validate_bucket_name(bucket)?;
        let path = self.bucket_path(bucket);
        fs::create_dir_all(&path).await?;
        let meta = fs::metadata(&path).await?;
        debug!(bucket, "created bucket");
        Ok(BucketInfo {
            name: bucket.to_owned(),
            creation_date: modified_time(&meta),
        })
    }

    /// Delete a bucket.
    ///
    /// # Errors
    ///
    /// [`StoreError::NoSuchBucket`] if absent; [`StoreError::BucketNotEmpty`]
    /// while it holds objects or incomplete multipart uploads.
    pub async fn delete_bucket(&self, bucket: &str) -> StoreResult<()> {
        self.require_bucket(bucket).await?;
        if !self.list_keys(bucket).await?.is_empty() || self.has_uploads(bucket).await? {
            return Err(StoreError::BucketNotEmpty {
                bucket: bucket.to_owned(),
            });
        }
        fs::remove_dir_all(self.bucket_path(bucket)).await?;
        debug!(bucket, "deleted bucket");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Objects
    // -----------------------------------------------------------------------

    /// List objects with prefix/delimiter/marker pagination.
    ///
    /// # Errors
    ///
    /// [`StoreError::NoSuchBucket`] if the bucket is absent.
    pub async fn list_objects(&self, bucket: &str, params: &ListParams) -> StoreResult<ObjectPage> {
        self.require_bucket(bucket).await?;
        let keys = self.list_keys(bucket).await?;
        let page = list::paginate(&keys, params);

        let mut objects = Vec::new();
        let mut common_prefixes = Vec::new();
        for item in &page.items {
            match item {
                list::ListItem::Key(key) => {
                    // The key was present when the page was computed; tolerate
                    // a concurrent delete by skipping it.
                    if let Some(meta) = self.head_object(bucket, key).await? {
                        objects.push(ObjectInfo {
                            key: key.clone(),
                            last_modified: meta.last_modified,
                            etag: meta.etag,
                            size: meta.size,
                            storage_class: meta.storage_class,
                        });
                    }
                }
                list::ListItem::CommonPrefix(prefix) => common_prefixes.push(prefix.clone()),
            }
        }

        Ok(ObjectPage {
            objects,
            common_prefixes,
            is_truncated: page.is_truncated,
            next_marker: page.next_marker(params.delimiter.is_some()),
            last_emitted: page.last_emitted,
        })
    }

    /// Read an object's metadata sidecar without touching the content.
    ///
    /// # Errors
    ///
    /// Returns an error on filesystem failure other than absence.
    pub async fn head_object(&self, bucket: &str, key: &str) -> StoreResult<Option<ObjectMetadata>> {
        let path = self.object_path(bucket, key).join(METADATA_FILE);
        match fs::read(&path).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    /// Fetch an object in full.
    ///
    /// # Errors
    ///
    /// Returns an error on filesystem failure other than absence.
    pub async fn get_object(&self, bucket: &str, key: &str) -> StoreResult<Option<StoredObject>> {
        let Some(metadata) = self.head_object(bucket, key).await? else {
            return Ok(None);
        };
        let content = fs::read(self.object_path(bucket, key).join(CONTENT_FILE)).await?;
        Ok(Some(StoredObject {
            metadata,
            content: Bytes::from(content),
        }))
    }

    /// Fetch a clamped byte window `[start, end]` (inclusive) of an object.
    ///
    /// The caller is responsible for range validation against the object
    /// size; this method only reads the window.
    ///
    /// # Errors
    ///
    /// Returns an error on filesystem failure other than absence.
    pub async fn get_object_range(
        &self,
        bucket: &str,
        key: &str,
        start: u64,
        end_inclusive: u64,
    ) -> StoreResult<Option<StoredObject>> {
        let Some(metadata) = self.head_object(bucket, key).await? else {
            return Ok(None);
        };
        let mut file = fs::File::open(self.object_path(bucket, key).join(CONTENT_FILE)).await?;
        file.seek(std::io::SeekFrom::Start(start)).await?;
        let len = end_inclusive - start + 1;
        let mut content = Vec::with_capacity(len as usize);
        file.take(len).read_to_end(&mut content).await?;
        Ok(Some(StoredObject {
            metadata,
            content: Bytes::from(content),
        }))
    }

    /// Store an object, computing its ETag and size.
    ///
    /// Overwrite is atomic: concurrent readers observe either the previous
    /// object in full or the new one.
    ///
    /// # Errors
    ///
    /// [`StoreError::NoSuchBucket`] if the bucket is absent.
    pub async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        content: &Bytes,
        mut metadata: ObjectMetadata,
    ) -> StoreResult<ObjectMetadata> {
        metadata.etag = etag_of(content);
        metadata.size = content.len() as u64;
        metadata.last_modified = Utc::now();
        self.write_object(bucket, key, content, metadata).await
    }

    /// Store an object whose ETag and size are already fixed (multipart
    /// completion).
    async fn write_object(
        &self,
        bucket: &str,
        key: &str,
        content: &[u8],
        metadata: ObjectMetadata,
    ) -> StoreResult<ObjectMetadata> {
        self.require_bucket(bucket).await?;

        let lock = self.key_lock(bucket, key);
        let _guard = lock.lock().await;

        let dir = self.object_path(bucket, key);
        fs::create_dir_all(&dir).await?;
        self.write_atomic(&dir.join(CONTENT_FILE), content).await?;
        self.write_atomic(&dir.join(METADATA_FILE), &serde_json::to_vec(&metadata)?)
            .await?;
        debug!(bucket, key, etag = %metadata.etag, size = metadata.size, "stored object");
        Ok(metadata)
    }

    /// Copy an object, giving the destination the supplied metadata.
    ///
    /// # Errors
    ///
    /// [`StoreError::NoSuchKey`] if the source is absent.
    pub async fn copy_object(
        &self,
        src_bucket: &str,
        src_key: &str,
        dst_bucket: &str,
        dst_key: &str,
        metadata: ObjectMetadata,
    ) -> StoreResult<ObjectMetadata> {
        self.require_bucket(src_bucket).await?;
        let source =
            self.get_object(src_bucket, src_key)
                .await?
                .ok_or_else(|| StoreError::NoSuchKey {
                    key: src_key.to_owned(),
                })?;
        self.put_object(dst_bucket, dst_key, &source.content, metadata)
            .await
    }

    /// Delete an object. Returns whether it existed.
    ///
    /// # Errors
    ///
    /// [`StoreError::NoSuchBucket`] if the bucket is absent.
    pub async fn delete_object(&self, bucket: &str, key: &str) -> StoreResult<bool> {
        self.require_bucket(bucket).await?;

        let lock = self.key_lock(bucket, key);
        let _guard = lock.lock().await;

        let dir = self.object_path(bucket, key);
        match fs::remove_dir_all(&dir).await {
            Ok(()) => {
                debug!(bucket, key, "deleted object");
                Ok(true)
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(err.into()),
        }
    }

    // -----------------------------------------------------------------------
    // Multipart uploads
    // -----------------------------------------------------------------------

    /// Begin a multipart upload, capturing the object metadata to apply at
    /// completion.
    ///
    /// # Errors
    ///
    /// [`StoreError::NoSuchBucket`] if the bucket is absent.
    pub async fn initiate_multipart(
        &self,
        bucket: &str,
        key: &str,
        metadata: ObjectMetadata,
    ) -> StoreResult<String> {
        self.require_bucket(bucket).await?;
        let upload_id = Uuid::new_v4().simple().to_string();
        let dir = self.upload_path(bucket, &upload_id);
        fs::create_dir_all(&dir).await?;
        let info = UploadInfo {
            key: key.to_owned(),
            metadata,
        };
        self.write_atomic(&dir.join(METADATA_FILE), &serde_json::to_vec(&info)?)
            .await?;
        debug!(bucket, key, upload_id, "initiated multipart upload");
        Ok(upload_id)
    }

    /// Look up an in-flight upload.
    ///
    /// # Errors
    ///
    /// [`StoreError::NoSuchUpload`] if absent.
    pub async fn get_upload(&self, bucket: &str, upload_id: &str) -> StoreResult<UploadInfo> {
        let path = self.upload_path(bucket, upload_id).join(METADATA_FILE);
        match fs::read(&path).await {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                Err(StoreError::NoSuchUpload {
                    upload_id: upload_id.to_owned(),
                })
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Store one part. Re-uploading a part number overwrites it.
    ///
    /// Returns the part's bare ETag.
    ///
    /// # Errors
    ///
    /// [`StoreError::NoSuchUpload`] if the upload is absent.
    pub async fn upload_part(
        &self,
        bucket: &str,
        upload_id: &str,
        part_number: u16,
        content: &Bytes,
    ) -> StoreResult<String> {
        self.get_upload(bucket, upload_id).await?;
        let path = self
            .upload_path(bucket, upload_id)
            .join(format!("part-{part_number}"));
        self.write_atomic(&path, content).await?;
        let etag = etag_of(content);
        debug!(bucket, upload_id, part_number, %etag, "stored part");
        Ok(etag)
    }

    /// Assemble the named parts into the final object and drop the upload.
    ///
    /// Parts must be listed in strictly increasing part-number order with
    /// matching ETags; all but the last must be at least 5 MiB.
    ///
    /// # Errors
    ///
    /// [`StoreError::InvalidPartOrder`], [`StoreError::InvalidPart`], or
    /// [`StoreError::EntityTooSmall`] per the rules above.
    pub async fn complete_multipart(
        &self,
        bucket: &str,
        upload_id: &str,
        parts: &[CompletedPart],
    ) -> StoreResult<(String, ObjectMetadata)> {
        let info = self.get_upload(bucket, upload_id).await?;

        if parts.is_empty() {
            return Err(StoreError::InvalidPart);
        }
        if parts.windows(2).any(|w| w[0].part_number >= w[1].part_number) {
            return Err(StoreError::InvalidPartOrder);
        }

        let mut content = Vec::new();
        let mut part_etags = Vec::with_capacity(parts.len());
        for (index, part) in parts.iter().enumerate() {
            let path = self
                .upload_path(bucket, upload_id)
                .join(format!("part-{}", part.part_number));
            let bytes = match fs::read(&path).await {
                Ok(bytes) => bytes,
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                    return Err(StoreError::InvalidPart);
                }
                Err(err) => return Err(err.into()),
            };
            let etag = etag_of(&bytes);
            if unquote_etag(&part.etag) != etag {
                return Err(StoreError::InvalidPart);
            }
            let is_last = index == parts.len() - 1;
            if !is_last && (bytes.len() as u64) < MIN_PART_SIZE {
                return Err(StoreError::EntityTooSmall);
            }
            part_etags.push(etag);
            content.extend_from_slice(&bytes);
        }

        let mut metadata = info.metadata;
        metadata.etag = composite_etag(&part_etags);
        metadata.size = content.len() as u64;
        metadata.last_modified = Utc::now();
        let metadata = self
            .write_object(bucket, &info.key, &content, metadata)
            .await?;

        fs::remove_dir_all(self.upload_path(bucket, upload_id)).await?;
        debug!(bucket, key = %info.key, upload_id, etag = %metadata.etag, "completed multipart upload");
        Ok((info.key, metadata))
    }

    /// Abort an upload, removing all stored parts.
    ///
    /// # Errors
    ///
    /// [`StoreError::NoSuchUpload`] if absent.
    pub async fn abort_multipart(&self, bucket: &str, upload_id: &str) -> StoreResult<()> {
        self.get_upload(bucket, upload_id).await?;
        fs::remove_dir_all(self.upload_path(bucket, upload_id)).await?;
        debug!(bucket, upload_id, "aborted multipart upload");
        Ok(())
    }

    /// Whether the bucket has incomplete multipart uploads.
    ///
    /// # Errors
    ///
    /// Returns an error on filesystem failure other than absence.
    pub async fn has_uploads(&self, bucket: &str) -> StoreResult<bool> {
        let path = self.bucket_path(bucket).join(UPLOADS_DIR);
        match fs::read_dir(&path).await {
            Ok(mut entries) => Ok(entries.next_entry().await?.is_some()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(err.into()),
        }
    }

    // -----------------------------------------------------------------------
    // Subresources
    // -----------------------------------------------------------------------

    /// Read a subresource config document.
    ///
    /// `key` selects an object-level subresource; `None` is bucket-level.
    ///
    /// # Errors
    ///
    /// [`StoreError::NoSuchBucket`] if the bucket is absent.
    pub async fn get_subresource(
        &self,
        bucket: &str,
        key: Option<&str>,
        kind: SubresourceKind,
    ) -> StoreResult<Option<String>> {
        self.require_bucket(bucket).await?;
        let path = self.subresource_path(bucket, key, kind);
        match fs::read_to_string(&path).await {
            Ok(xml) => Ok(Some(xml)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    /// Store a subresource config document.
    ///
    /// # Errors
    ///
    /// [`StoreError::NoSuchBucket`] if the bucket is absent.
    pub async fn put_subresource(
        &self,
        bucket: &str,
        key: Option<&str>,
        kind: SubresourceKind,
        xml: &str,
    ) -> StoreResult<()> {
        self.require_bucket(bucket).await?;
        let path = self.subresource_path(bucket, key, kind);
        self.write_atomic(&path, xml.as_bytes()).await?;
        debug!(bucket, ?key, kind = kind.file_name(), "stored subresource config");
        Ok(())
    }

    /// Delete a subresource config. Returns whether it existed.
    ///
    /// # Errors
    ///
    /// [`StoreError::NoSuchBucket`] if the bucket is absent.
    pub async fn delete_subresource(
        &self,
        bucket: &str,
        key: Option<&str>,
        kind: SubresourceKind,
    ) -> StoreResult<bool> {
        self.require_bucket(bucket).await?;
        let path = self.subresource_path(bucket, key, kind);
        match fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(err.into()),
        }
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    /// Sorted, decoded object keys of a bucket.
    async fn list_keys(&self, bucket: &str) -> StoreResult<Vec<String>> {
        let mut keys = Vec::new();
        let mut entries = fs::read_dir(self.bucket_path(bucket)).await?;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with('.') || !entry.file_type().await?.is_dir() {
                continue;
            }
            keys.push(percent_decode_str(&name).decode_utf8_lossy().into_owned());
        }
        keys.sort();
        Ok(keys)
    }

    async fn require_bucket(&self, bucket: &str) -> StoreResult<()> {
        if self.get_bucket(bucket).await?.is_none() {
            return Err(StoreError::NoSuchBucket {
                bucket: bucket.to_owned(),
            });
        }
        Ok(())
    }

    /// Write through the scratch area then rename into place.
    async fn write_atomic(&self, dest: &Path, data: &[u8]) -> StoreResult<()> {
        let tmp = self
            .root
            .join(TMP_DIR)
            .join(Uuid::new_v4().simple().to_string());
        fs::write(&tmp, data).await?;
        fs::rename(&tmp, dest).await?;
        Ok(())
    }

    fn key_lock(&self, bucket: &str, key: &str) -> KeyLock {
        self.key_locks
            .entry((bucket.to_owned(), key.to_owned()))
            .or_default()
            .clone()
    }

    fn bucket_path(&self, bucket: &str) -> PathBuf {
        self.root.join(bucket)
    }

    fn object_path(&self, bucket: &str, key: &str) -> PathBuf {
        self.bucket_path(bucket)
            .join(utf8_percent_encode(key, FS_NAME).to_string())
    }

    fn upload_path(&self, bucket: &str, upload_id: &str) -> PathBuf {
        self.bucket_path(bucket).join(UPLOADS_DIR).join(upload_id)
    }

    fn subresource_path(&self, bucket: &str, key: Option<&str>, kind: SubresourceKind) -> PathBuf {
        match key {
            Some(key) => self.object_path(bucket, key).join(kind.file_name()),
            None => self.bucket_path(bucket).join(kind.file_name()),
        }
    }
}

/// Validate a bucket name against the DNS-label rules S3 applies:
/// 3–63 characters of lowercase letters, digits, hyphens, and dots, starting
/// and ending alphanumeric, with no empty dot-separated labels.
///
/// # Errors
///
/// Returns [`StoreError::InvalidBucketName`] on violation.
pub fn validate_bucket_name(name: &str) -> StoreResult<()> {
    let invalid = || StoreError::InvalidBucketName {
        name: name.to_owned(),
    };

    if !(3..=63).contains(&name.len()) {
        return Err(invalid());
    }
    if !name
        .bytes()
        .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-' || b == b'.')
    {
        return Err(invalid());
    }
    for label in name.split('.') {
        let bytes = label.as_bytes();
        let Some((&first, &last)) = bytes.first().zip(bytes.last()) else {
            return Err(invalid());
        };
        if !first.is_ascii_alphanumeric() || !last.is_ascii_alphanumeric() {
            return Err(invalid());
        }
    }
    Ok(())
}

fn modified_time(meta: &std::fs::Metadata) -> DateTime<Utc> {
    meta.modified()
        .map(DateTime::<Utc>::from)
        .unwrap_or_else(|_| Utc::now())
}

/// Build an [`ObjectMetadata`] for a PUT from request-derived attributes.
#[must_use]
pub fn metadata_for_put(
    content_type: Option<String>,
    storage_class: barrel_model::types::StorageClass,
    website_redirect_location: Option<String>,
    user_metadata: BTreeMap<String, String>,
) -> ObjectMetadata {
    ObjectMetadata {
        content_type: content_type.unwrap_or_else(|| super::DEFAULT_CONTENT_TYPE.to_owned()),
        storage_class,
        website_redirect_location,
        user_metadata,
        ..ObjectMetadata::default()
    }
}

#[cfg(test)]
mod tests {
    use barrel_model::types::StorageClass;
    use tempfile::TempDir;

    use super::*;

    async fn store() -> (TempDir, FilesystemStore) {
        let dir = TempDir::new().expect("temp dir");
        let store = FilesystemStore::open(dir.path()).await.expect("open store");
        (dir, store)
    }

    fn body(data: &str) -> Bytes {
        Bytes::from(data.as_bytes().to_vec())
    }

    #[tokio::test]
    async fn test_should_round_trip_put_and_get() {
        let (_dir, store) = store().await;
        store.create_bucket("bucket-a").await.expect("create bucket");

        let meta = store
            .put_object("bucket-a", "greeting.txt", &body("hello"), ObjectMetadata::default())
            .await
            .expect("put");
        assert_eq!(meta.etag, "5d41402abc4b2a76b9719d911017c592");
        assert_eq!(meta.size, 5);

        let stored = store
            .get_object("bucket-a", "greeting.txt")
            .await
            .expect("get")
            .expect("object exists");
        assert_eq!(stored.content.as_ref(), b"hello");
        assert_eq!(stored.metadata.etag, meta.etag);
    }

    #[tokio::test]
    async fn test_should_keep_trailing_slash_keys_distinct() {
        let (_dir, store) = store().await;
        store.create_bucket("bucket-a").await.expect("create bucket");

        store
            .put_object("bucket-a", "foo", &body("X"), ObjectMetadata::default())
            .await
            .expect("put foo");
        store
            .put_object("bucket-a", "foo/", &body("Y"), ObjectMetadata::default())
            .await
            .expect("put foo/");

        let foo = store.get_object("bucket-a", "foo").await.unwrap().unwrap();
        let foo_slash = store.get_object("bucket-a", "foo/").await.unwrap().unwrap();
        assert_eq!(foo.content.as_ref(), b"X");
        assert_eq!(foo_slash.content.as_ref(), b"Y");
    }

    #[tokio::test]
    async fn test_should_refuse_deleting_non_empty_bucket() {
        let (_dir, store) = store().await;
        store.create_bucket("bucket-a").await.expect("create bucket");
        store
            .put_object("bucket-a", "k", &body("x"), ObjectMetadata::default())
            .await
            .expect("put");

        let err = store.delete_bucket("bucket-a").await.unwrap_err();
        assert!(matches!(err, StoreError::BucketNotEmpty { .. }));

        assert!(store.delete_object("bucket-a", "k").await.expect("delete"));
        store.delete_bucket("bucket-a").await.expect("delete bucket");
        assert!(store.get_bucket("bucket-a").await.expect("get").is_none());
    }

    #[tokio::test]
    async fn test_should_refuse_deleting_bucket_with_pending_upload() {
        let (_dir, store) = store().await;
        store.create_bucket("bucket-a").await.expect("create bucket");
        store
            .initiate_multipart("bucket-a", "big.bin", ObjectMetadata::default())
            .await
            .expect("initiate");

        let err = store.delete_bucket("bucket-a").await.unwrap_err();
        assert!(matches!(err, StoreError::BucketNotEmpty { .. }));
    }

    #[tokio::test]
    async fn test_should_read_object_range() {
        let (_dir, store) = store().await;
        store.create_bucket("bucket-a").await.expect("create bucket");
        store
            .put_object("bucket-a", "k", &body("0123456789"), ObjectMetadata::default())
            .await
            .expect("put");

        let window = store
            .get_object_range("bucket-a", "k", 2, 5)
            .await
            .expect("range")
            .expect("object exists");
        assert_eq!(window.content.as_ref(), b"2345");
        assert_eq!(window.metadata.size, 10);
    }

    #[tokio::test]
    async fn test_should_assemble_multipart_upload() {
        let (_dir, store) = store().await;
        store.create_bucket("bucket-a").await.expect("create bucket");

        let part1 = Bytes::from(vec![b'a'; MIN_PART_SIZE as usize]);
        let part2 = body("tail");
        let upload_id = store
            .initiate_multipart("bucket-a", "big.bin", ObjectMetadata::default())
            .await
            .expect("initiate");
        let etag1 = store
            .upload_part("bucket-a", &upload_id, 1, &part1)
            .await
            .expect("part 1");
        let etag2 = store
            .upload_part("bucket-a", &upload_id, 2, &part2)
            .await
            .expect("part 2");

        let (key, meta) = store
            .complete_multipart(
                "bucket-a",
                &upload_id,
                &[
                    CompletedPart {
                        part_number: 1,
                        etag: format!("\"{etag1}\""),
                    },
                    CompletedPart {
                        part_number: 2,
                        etag: etag2.clone(),
                    },
                ],
            )
            .await
            .expect("complete");

        assert_eq!(key, "big.bin");
        assert!(meta.etag.ends_with("-2"));
        assert_eq!(meta.etag, composite_etag(&[etag1, etag2]));

        let stored = store.get_object("bucket-a", "big.bin").await.unwrap().unwrap();
        assert_eq!(stored.content.len(), MIN_PART_SIZE as usize + 4);
        assert_eq!(&stored.content[MIN_PART_SIZE as usize..], b"tail");

        // The upload is gone once completed.
        let err = store.get_upload("bucket-a", &upload_id).await.unwrap_err();
        assert!(matches!(err, StoreError::NoSuchUpload { .. }));
    }

    #[tokio::test]
    async fn test_should_reject_out_of_order_completion() {
        let (_dir, store) = store().await;
        store.create_bucket("bucket-a").await.expect("create bucket");
        let upload_id = store
            .initiate_multipart("bucket-a", "k", ObjectMetadata::default())
            .await
            .expect("initiate");

        let err = store
            .complete_multipart(
                "bucket-a",
                &upload_id,
                &[
                    CompletedPart {
                        part_number: 2,
                        etag: "x".to_owned(),
                    },
                    CompletedPart {
                        part_number: 1,
                        etag: "y".to_owned(),
                    },
                ],
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidPartOrder));
    }

    #[tokio::test]
    async fn test_should_reject_mismatched_part_etag() {
        let (_dir, store) = store().await;
        store.create_bucket("bucket-a").await.expect("create bucket");
        let upload_id = store
            .initiate_multipart("bucket-a", "k", ObjectMetadata::default())
            .await
            .expect("initiate");
        store
            .upload_part("bucket-a", &upload_id, 1, &body("data"))
            .await
            .expect("part");

        let err = store
            .complete_multipart(
                "bucket-a",
                &upload_id,
                &[CompletedPart {
                    part_number: 1,
                    etag: "\"0000\"".to_owned(),
                }],
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidPart));
    }

    #[tokio::test]
    async fn test_should_reject_undersized_non_final_part() {
        let (_dir, store) = store().await;
        store.create_bucket("bucket-a").await.expect("create bucket");
        let upload_id = store
            .initiate_multipart("bucket-a", "k", ObjectMetadata::default())
            .await
            .expect("initiate");
        let etag1 = store
            .upload_part("bucket-a", &upload_id, 1, &body("small"))
            .await
            .expect("part 1");
        let etag2 = store
            .upload_part("bucket-a", &upload_id, 2, &body("tail"))
            .await
            .expect("part 2");

        let err = store
            .complete_multipart(
                "bucket-a",
                &upload_id,
                &[
                    CompletedPart {
                        part_number: 1,
                        etag: etag1,
                    },
                    CompletedPart {
                        part_number: 2,
                        etag: etag2,
                    },
                ],
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::EntityTooSmall));
    }

    #[tokio::test]
    async fn test_should_overwrite_re_uploaded_part() {
        let (_dir, store) = store().await;
        store.create_bucket("bucket-a").await.expect("create bucket");
        let upload_id = store
            .initiate_multipart("bucket-a", "k", ObjectMetadata::default())
            .await
            .expect("initiate");

        store
            .upload_part("bucket-a", &upload_id, 1, &body("first"))
            .await
            .expect("part v1");
        let etag = store
            .upload_part("bucket-a", &upload_id, 1, &body("second"))
            .await
            .expect("part v2");

        let (_, meta) = store
            .complete_multipart(
                "bucket-a",
                &upload_id,
                &[CompletedPart {
                    part_number: 1,
                    etag,
                }],
            )
            .await
            .expect("complete");
        let stored = store.get_object("bucket-a", "k").await.unwrap().unwrap();
        assert_eq!(stored.content.as_ref(), b"second");
        assert!(meta.etag.ends_with("-1"));
    }

    #[tokio::test]
    async fn test_should_round_trip_subresources() {
        let (_dir, store) = store().await;
        store.create_bucket("bucket-a").await.expect("create bucket");

        let xml = "<CORSConfiguration><CORSRule/></CORSConfiguration>";
        store
            .put_subresource("bucket-a", None, SubresourceKind::Cors, xml)
            .await
            .expect("put cors");
        let read = store
            .get_subresource("bucket-a", None, SubresourceKind::Cors)
            .await
            .expect("get cors");
        assert_eq!(read.as_deref(), Some(xml));

        assert!(store
            .delete_subresource("bucket-a", None, SubresourceKind::Cors)
            .await
            .expect("delete"));
        assert!(store
            .get_subresource("bucket-a", None, SubresourceKind::Cors)
            .await
            .expect("get after delete")
            .is_none());
    }

    #[tokio::test]
    async fn test_should_store_object_level_subresources() {
        let (_dir, store) = store().await;
        store.create_bucket("bucket-a").await.expect("create bucket");
        store
            .put_object("bucket-a", "k", &body("x"), ObjectMetadata::default())
            .await
            .expect("put");

        store
            .put_subresource("bucket-a", Some("k"), SubresourceKind::Tagging, "<Tagging/>")
            .await
            .expect("put tagging");
        let read = store
            .get_subresource("bucket-a", Some("k"), SubresourceKind::Tagging)
            .await
            .expect("get tagging");
        assert_eq!(read.as_deref(), Some("<Tagging/>"));
    }

    #[tokio::test]
    async fn test_should_list_objects_with_pagination() {
        let (_dir, store) = store().await;
        store.create_bucket("bucket-a").await.expect("create bucket");
        for key in ["akey1", "akey2", "akey3", "key/key1", "key1", "key2", "key3"] {
            store
                .put_object("bucket-a", key, &body("x"), ObjectMetadata::default())
                .await
                .expect("put");
        }

        let page = store
            .list_objects(
                "bucket-a",
                &ListParams {
                    prefix: String::new(),
                    delimiter: Some("/".to_owned()),
                    start_after: None,
                    max_keys: 1000,
                },
            )
            .await
            .expect("list");
        assert_eq!(page.objects.len(), 6);
        assert_eq!(page.common_prefixes, vec!["key/"]);
        assert!(!page.is_truncated);
    }

    #[tokio::test]
    async fn test_should_preserve_user_metadata_bytes() {
        let (_dir, store) = store().await;
        store.create_bucket("bucket-a").await.expect("create bucket");

        let mut user_metadata = BTreeMap::new();
        user_metadata.insert("x-amz-meta-note".to_owned(), "Exact  Value".to_owned());
        let metadata = metadata_for_put(
            Some("text/plain".to_owned()),
            StorageClass::Glacier,
            None,
            user_metadata.clone(),
        );
        store
            .put_object("bucket-a", "k", &body("x"), metadata)
            .await
            .expect("put");

        let head = store.head_object("bucket-a", "k").await.unwrap().unwrap();
        assert_eq!(head.user_metadata, user_metadata);
        assert_eq!(head.storage_class, StorageClass::Glacier);
        assert_eq!(head.content_type, "text/plain");
    }

    #[tokio::test]
    async fn test_should_reset_store() {
        let (_dir, store) = store().await;
        store.create_bucket("bucket-a").await.expect("create bucket");
        store.reset().await.expect("reset");
        assert!(store.list_buckets().await.expect("list").is_empty());
    }

    #[test]
    fn test_should_validate_bucket_names() {
        assert!(validate_bucket_name("my-bucket").is_ok());
        assert!(validate_bucket_name("a.b.c").is_ok());
        assert!(validate_bucket_name("abc").is_ok());

        assert!(validate_bucket_name("ab").is_err());
        assert!(validate_bucket_name(&"a".repeat(64)).is_err());
        assert!(validate_bucket_name("UPPER").is_err());
        assert!(validate_bucket_name("-leading").is_err());
        assert!(validate_bucket_name("trailing-").is_err());
        assert!(validate_bucket_name("double..dot").is_err());
        assert!(validate_bucket_name("under_score").is_err());
    }
}
