//! Local directory backend: a bucket is a directory under the project root
//! and an object is a file, its key being the `/`-joined relative path.
//!
//! Every key component but the last names a directory ending in `.d`, and
//! the last names a file ending in `.obj`.
//! The two name spaces never overlap, so `a` and `a/b` can both be stored.
//!
//! Uploads are staged in a temporary file under the root and renamed into
//! place on commit, so a reader never observes a partial object.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use tempfile::NamedTempFile;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::error::{StoreError, StoreResult};
use crate::listing::paginate;
use crate::traits::{Download, ObjectClient, Upload};
use crate::types::{ListOptions, ObjectInfo, ObjectPage, SystemMetadata};

/// Directory under the project root that holds uploads in flight.
const STAGING_DIR: &str = ".objds-staging";

/// Suffix of every object file.
const OBJECT_SUFFIX: &str = ".obj";

/// Suffix of every directory inside a bucket.
const DIR_SUFFIX: &str = ".d";

/// Renames attempted before a commit gives up on a vanishing parent.
const PERSIST_ATTEMPTS: usize = 3;

/// Object client backed by a directory tree on the local filesystem.
#[derive(Debug)]
pub struct FsObjectClient {
    root: PathBuf,
    closed: AtomicBool,
}

impl FsObjectClient {
    /// Open a project rooted at `root`, creating the directory if needed.
    pub fn open(root: impl AsRef<Path>) -> StoreResult<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        Ok(Self {
            root,
            closed: AtomicBool::new(false),
        })
    }

    /// The project root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn check_open(&self) -> StoreResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(StoreError::Closed);
        }
        Ok(())
    }

    fn bucket_dir(&self, bucket: &str) -> StoreResult<PathBuf> {
        if bucket.is_empty() || bucket.starts_with('.') || bucket.contains(['/', '\\']) {
            return Err(StoreError::BucketNotFound(bucket.to_string()));
        }
        Ok(self.root.join(bucket))
    }

    fn existing_bucket_dir(&self, bucket: &str) -> StoreResult<PathBuf> {
        let dir = self.bucket_dir(bucket)?;
        if !dir.is_dir() {
            return Err(StoreError::BucketNotFound(bucket.to_string()));
        }
        Ok(dir)
    }

    fn object_path(&self, bucket: &str, key: &str) -> StoreResult<PathBuf> {
        validate_key(key)?;
        let mut path = self.existing_bucket_dir(bucket)?;
        let (dirs, name) = match key.rsplit_once('/') {
            Some((dirs, name)) => (Some(dirs), name),
            None => (None, key),
        };
        if let Some(dirs) = dirs {
            path.extend(dirs.split('/').map(|d| format!("{d}{DIR_SUFFIX}")));
        }
        path.push(format!("{name}{OBJECT_SUFFIX}"));
        Ok(path)
    }

    /// Directory holding every object whose key starts with `prefix`, or
    /// `None` if no valid key can start with it.
    fn listing_root(&self, bucket_dir: &Path, prefix: &str) -> Option<PathBuf> {
        let mut dir = bucket_dir.to_path_buf();
        if let Some((dirs, _)) = prefix.rsplit_once('/') {
            for component in dirs.split('/') {
                if matches!(component, "" | "." | "..") || component.contains('\\') {
                    return None;
                }
                dir.push(format!("{component}{DIR_SUFFIX}"));
            }
        }
        Some(dir)
    }

    fn object_file(&self, bucket: &str, key: &str) -> StoreResult<(PathBuf, fs::Metadata)> {
        let path = self.object_path(bucket, key)?;
        match fs::metadata(&path) {
            Ok(meta) if meta.is_file() => Ok((path, meta)),
            Ok(_) => Err(StoreError::not_found(bucket, key)),
            Err(e) => Err(map_not_found(e, bucket, key)),
        }
    }
}

/// Reject keys that do not map onto a relative path inside the bucket.
fn validate_key(key: &str) -> StoreResult<()> {
    let invalid = |reason: &str| StoreError::InvalidKey {
        key: key.to_string(),
        reason: reason.to_string(),
    };
    if key.is_empty() {
        return Err(invalid("key must not be empty"));
    }
    if key.contains('\\') {
        return Err(invalid("key must not contain '\\'"));
    }
    for component in key.split('/') {
        match component {
            "" => return Err(invalid("path components must not be empty")),
            "." | ".." => return Err(invalid("path components must not be '.' or '..'")),
            _ => {}
        }
    }
    Ok(())
}

/// Recover a key from an object file path relative to its bucket.
fn decode_key(relative: &Path) -> Option<String> {
    let mut components = relative
        .components()
        .map(|c| c.as_os_str().to_str())
        .collect::<Option<Vec<&str>>>()?;
    let name = components
        .pop()?
        .strip_suffix(OBJECT_SUFFIX)
        .filter(|n| !n.is_empty())?;

    let mut key = String::with_capacity(relative.as_os_str().len());
    for dir in components {
        key.push_str(dir.strip_suffix(DIR_SUFFIX).filter(|d| !d.is_empty())?);
        key.push('/');
    }
    key.push_str(name);
    Some(key)
}

/// Rename a staged upload onto `dest`, creating parent directories as
/// needed. A concurrent delete may prune a parent between the two steps, so
/// a missing parent is recreated and the rename retried.
fn persist_staged(mut staged: NamedTempFile, dest: &Path) -> io::Result<()> {
    let mut attempt = 1;
    loop {
        match staged.persist(dest) {
            Ok(_) => return Ok(()),
            Err(e) if e.error.kind() == io::ErrorKind::NotFound && attempt < PERSIST_ATTEMPTS => {
                staged = e.file;
                if let Some(parent) = dest.parent() {
                    fs::create_dir_all(parent)?;
                }
                attempt += 1;
            }
            Err(e) => return Err(e.error),
        }
    }
}

fn map_not_found(err: io::Error, bucket: &str, key: &str) -> StoreError {
    if err.kind() == io::ErrorKind::NotFound {
        StoreError::not_found(bucket, key)
    } else {
        StoreError::Io(err)
    }
}

fn system_metadata(meta: &fs::Metadata) -> SystemMetadata {
    SystemMetadata {
        created: meta.created().or_else(|_| meta.modified()).ok(),
        content_length: meta.len(),
    }
}

struct FsUpload {
    staged: NamedTempFile,
    dest: PathBuf,
}

impl Write for FsUpload {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.staged.write(data)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.staged.flush()
    }
}

impl Upload for FsUpload {
    fn commit(self: Box<Self>) -> StoreResult<()> {
        let FsUpload { staged, dest } = *self;
        staged.as_file().sync_all()?;
        persist_staged(staged, &dest)?;
        Ok(())
    }

    fn abort(self: Box<Self>) -> StoreResult<()> {
        self.staged.close()?;
        Ok(())
    }
}

impl ObjectClient for FsObjectClient {
    fn upload_object(&self, bucket: &str, key: &str) -> StoreResult<Box<dyn Upload>> {
        self.check_open()?;
        let dest = self.object_path(bucket, key)?;
        let staging = self.root.join(STAGING_DIR);
        fs::create_dir_all(&staging)?;
        let staged = NamedTempFile::new_in(&staging)?;
        Ok(Box::new(FsUpload { staged, dest }))
    }

    fn download_object(&self, bucket: &str, key: &str) -> StoreResult<Download> {
        self.check_open()?;
        let (path, _) = self.object_file(bucket, key)?;
        let file = File::open(&path).map_err(|e| map_not_found(e, bucket, key))?;
        Ok(Box::new(file))
    }

    fn stat_object(&self, bucket: &str, key: &str) -> StoreResult<ObjectInfo> {
        self.check_open()?;
        let (_, meta) = self.object_file(bucket, key)?;
        Ok(ObjectInfo::object(key, system_metadata(&meta)))
    }

    fn delete_object(&self, bucket: &str, key: &str) -> StoreResult<()> {
        self.check_open()?;
        let bucket_dir = self.existing_bucket_dir(bucket)?;
        let (path, _) = self.object_file(bucket, key)?;
        fs::remove_file(&path).map_err(|e| map_not_found(e, bucket, key))?;

        // Prune directories left empty, stopping at the bucket.
        let mut dir = path.parent();
        while let Some(d) = dir {
            if d == bucket_dir.as_path() || fs::remove_dir(d).is_err() {
                break;
            }
            dir = d.parent();
        }
        Ok(())
    }

    fn list_objects_page(
        &self,
        bucket: &str,
        options: &ListOptions,
        cursor: Option<&str>,
    ) -> StoreResult<ObjectPage> {
        self.check_open()?;
        let bucket_dir = self.existing_bucket_dir(bucket)?;

        let mut entries: Vec<(String, SystemMetadata)> = Vec::new();
        let Some(walk_root) = self.listing_root(&bucket_dir, &options.prefix) else {
            return Ok(paginate(entries, options, cursor));
        };
        if !walk_root.is_dir() {
            return Ok(paginate(entries, options, cursor));
        }

        for entry in WalkDir::new(&walk_root).min_depth(1) {
            let entry = entry.map_err(|e| StoreError::Io(e.into()))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let relative = entry
                .path()
                .strip_prefix(&bucket_dir)
                .map_err(|e| StoreError::Backend(e.to_string()))?;
            let Some(key) = decode_key(relative) else {
                warn!(path = %entry.path().display(), "skipping foreign file in bucket");
                continue;
            };
            // Keys at or before the cursor collapse to prefixes at or before
            // it too, so they can never appear on this page.
            if !key.starts_with(options.prefix.as_str())
                || cursor.is_some_and(|c| key.as_str() <= c)
            {
                continue;
            }
            let meta = entry.metadata().map_err(|e| StoreError::Io(e.into()))?;
            entries.push((key, system_metadata(&meta)));
        }
        entries.sort_by(|(a, _), (b, _)| a.cmp(b));
        debug!(
            bucket,
            root = %walk_root.display(),
            candidates = entries.len(),
            "walked bucket subtree"
        );

        Ok(paginate(entries, options, cursor))
    }

    fn ensure_bucket(&self, bucket: &str) -> StoreResult<()> {
        self.check_open()?;
        fs::create_dir_all(self.bucket_dir(bucket)?)?;
        Ok(())
    }

    fn close(&self) -> StoreResult<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    fn client() -> (tempfile::TempDir, FsObjectClient) {
        let dir = tempfile::tempdir().unwrap();
        let client = FsObjectClient::open(dir.path()).unwrap();
        client.ensure_bucket("bkt").unwrap();
        (dir, client)
    }

    fn upload(client: &FsObjectClient, key: &str, data: &[u8]) -> StoreResult<()> {
        let mut up = client.upload_object("bkt", key)?;
        up.write_all(data)?;
        up.commit()
    }

    #[test]
    fn upload_download_roundtrip() {
        let (_dir, client) = client();
        upload(&client, "a/b/c", b"payload").unwrap();
        let mut buf = Vec::new();
        client
            .download_object("bkt", "a/b/c")
            .unwrap()
            .read_to_end(&mut buf)
            .unwrap();
        assert_eq!(buf, b"payload");
        assert_eq!(client.stat_object("bkt", "a/b/c").unwrap().system.content_length, 7);
    }

    #[test]
    fn upload_is_staged_until_commit() {
        let (_dir, client) = client();
        let mut up = client.upload_object("bkt", "k").unwrap();
        up.write_all(b"pending").unwrap();
        assert!(client.stat_object("bkt", "k").unwrap_err().is_object_not_found());
        up.abort().unwrap();
        assert!(client.stat_object("bkt", "k").unwrap_err().is_object_not_found());
    }

    #[test]
    fn empty_object() {
        let (_dir, client) = client();
        upload(&client, "empty", b"").unwrap();
        assert_eq!(client.stat_object("bkt", "empty").unwrap().system.content_length, 0);
    }

    #[test]
    fn missing_and_directory_keys_are_not_found() {
        let (_dir, client) = client();
        upload(&client, "a/b", b"x").unwrap();
        assert!(client.stat_object("bkt", "nope").unwrap_err().is_object_not_found());
        assert!(client.stat_object("bkt", "a").unwrap_err().is_object_not_found());
        assert!(client.delete_object("bkt", "nope").unwrap_err().is_object_not_found());
    }

    #[test]
    fn delete_prunes_empty_directories() {
        let (dir, client) = client();
        upload(&client, "x/y/z", b"1").unwrap();
        client.delete_object("bkt", "x/y/z").unwrap();
        assert!(!dir.path().join("bkt").join("x.d").exists());
        assert!(dir.path().join("bkt").is_dir());
    }

    #[test]
    fn parent_and_child_keys_coexist() {
        let (_dir, client) = client();
        upload(&client, "a", b"parent").unwrap();
        upload(&client, "a/b", b"child").unwrap();
        upload(&client, "x/y", b"child first").unwrap();
        upload(&client, "x", b"parent last").unwrap();

        let mut buf = Vec::new();
        client
            .download_object("bkt", "a")
            .unwrap()
            .read_to_end(&mut buf)
            .unwrap();
        assert_eq!(buf, b"parent");
        assert_eq!(client.stat_object("bkt", "a/b").unwrap().system.content_length, 5);
        assert_eq!(client.stat_object("bkt", "x").unwrap().system.content_length, 11);

        let opts = ListOptions::default().recursive(true);
        let page = client.list_objects_page("bkt", &opts, None).unwrap();
        let keys: Vec<&str> = page.items.iter().map(|i| i.key.as_str()).collect();
        assert_eq!(keys, vec!["a", "a/b", "x", "x/y"]);

        client.delete_object("bkt", "a").unwrap();
        assert!(client.stat_object("bkt", "a").unwrap_err().is_object_not_found());
        assert!(client.stat_object("bkt", "a/b").is_ok());
    }

    #[test]
    fn keys_shaped_like_the_on_disk_suffixes() {
        let (_dir, client) = client();
        upload(&client, "k", b"1").unwrap();
        upload(&client, "k.obj/v", b"2").unwrap();
        upload(&client, "k.d", b"3").unwrap();
        upload(&client, "k/w", b"4").unwrap();

        let opts = ListOptions::default().recursive(true);
        let page = client.list_objects_page("bkt", &opts, None).unwrap();
        let keys: Vec<&str> = page.items.iter().map(|i| i.key.as_str()).collect();
        assert_eq!(keys, vec!["k", "k.d", "k.obj/v", "k/w"]);
    }

    #[test]
    fn commit_recreates_a_pruned_parent() {
        let (dir, client) = client();
        upload(&client, "p/q/keep", b"1").unwrap();
        let mut up = client.upload_object("bkt", "p/q/new").unwrap();
        up.write_all(b"2").unwrap();

        // A delete prunes the parent between opening and committing.
        client.delete_object("bkt", "p/q/keep").unwrap();
        assert!(!dir.path().join("bkt").join("p.d").exists());

        up.commit().unwrap();
        assert_eq!(client.stat_object("bkt", "p/q/new").unwrap().system.content_length, 1);
    }

    #[test]
    fn persist_retries_when_the_parent_is_missing() {
        let dir = tempfile::tempdir().unwrap();
        let mut staged = NamedTempFile::new_in(dir.path()).unwrap();
        staged.write_all(b"data").unwrap();
        let dest = dir.path().join("gone.d").join("deeper.d").join("k.obj");

        persist_staged(staged, &dest).unwrap();
        assert_eq!(fs::read(&dest).unwrap(), b"data");
    }

    #[test]
    fn prefix_listing_is_scoped_to_its_directory() {
        let (dir, client) = client();
        upload(&client, "a/sub/x", b"1").unwrap();
        upload(&client, "a/sub/y", b"2").unwrap();
        upload(&client, "a/other", b"3").unwrap();
        upload(&client, "b/1", b"4").unwrap();
        // Not reachable from the walk rooted at `a.d`.
        fs::write(dir.path().join("bkt").join("stray"), b"junk").unwrap();

        let opts = ListOptions::with_prefix("a/su").recursive(true);
        let page = client.list_objects_page("bkt", &opts, None).unwrap();
        let keys: Vec<&str> = page.items.iter().map(|i| i.key.as_str()).collect();
        assert_eq!(keys, vec!["a/sub/x", "a/sub/y"]);

        for prefix in ["zz/", "a//", "../"] {
            let opts = ListOptions::with_prefix(prefix).recursive(true);
            let page = client.list_objects_page("bkt", &opts, None).unwrap();
            assert!(page.items.is_empty(), "prefix {prefix:?}");
        }
    }

    #[test]
    fn later_pages_skip_keys_before_the_cursor() {
        let (_dir, client) = client();
        for key in ["m/1", "m/2", "m/3", "n/1"] {
            upload(&client, key, b"x").unwrap();
        }
        let opts = ListOptions::default().page_size(1);
        let first = client.list_objects_page("bkt", &opts, None).unwrap();
        assert_eq!(first.items[0].key, "m/");
        assert!(first.more);
        let second = client.list_objects_page("bkt", &opts, Some("m/")).unwrap();
        assert_eq!(second.items[0].key, "n/");
        assert!(!second.more);
    }

    #[test]
    fn foreign_files_are_skipped() {
        let (dir, client) = client();
        upload(&client, "k", b"x").unwrap();
        fs::write(dir.path().join("bkt").join("README"), b"not an object").unwrap();
        let page = client
            .list_objects_page("bkt", &ListOptions::default().recursive(true), None)
            .unwrap();
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].key, "k");
    }

    #[test]
    fn rejects_unrepresentable_keys() {
        let (_dir, client) = client();
        for key in ["", "a//b", "../escape", "a/./b", "trailing/"] {
            assert!(
                matches!(client.stat_object("bkt", key), Err(StoreError::InvalidKey { .. })),
                "key {key:?} should be rejected"
            );
        }
    }

    #[test]
    fn missing_bucket() {
        let (_dir, client) = client();
        assert!(matches!(
            client.stat_object("other", "k"),
            Err(StoreError::BucketNotFound(_))
        ));
        assert!(matches!(
            client.list_objects_page("other", &ListOptions::default(), None),
            Err(StoreError::BucketNotFound(_))
        ));
    }

    #[test]
    fn listing_skips_staging_and_sorts() {
        let (_dir, client) = client();
        upload(&client, "b/1", b"z").unwrap();
        upload(&client, "a/2", b"yy").unwrap();
        upload(&client, "a/1", b"x").unwrap();
        let _pending = client.upload_object("bkt", "a/3").unwrap();

        let opts = ListOptions::with_prefix("a/").recursive(true).system(true);
        let page = client.list_objects_page("bkt", &opts, None).unwrap();
        let keys: Vec<&str> = page.items.iter().map(|i| i.key.as_str()).collect();
        assert_eq!(keys, vec!["a/1", "a/2"]);
        assert_eq!(page.items[1].system.content_length, 2);
    }

    #[test]
    fn closed_client_rejects_calls() {
        let (_dir, client) = client();
        client.close().unwrap();
        assert!(matches!(client.stat_object("bkt", "k"), Err(StoreError::Closed)));
    }
}
