//! Prefix listings: page assembly for backends and the lazy cursor that
//! walks pages for callers.

use tracing::debug;

use crate::error::StoreResult;
use crate::traits::ObjectClient;
use crate::types::{ListOptions, ObjectInfo, ObjectPage, SystemMetadata};

/// Assemble one listing page from a snapshot of a bucket.
///
/// `entries` must be sorted by key. Keys outside `options.prefix` are
/// skipped. In a non-recursive listing every key with a `/` after the prefix
/// collapses into a single prefix entry. Items at or before `cursor` are
/// skipped, then at most `options.page_size` items are taken.
pub fn paginate<I, K>(entries: I, options: &ListOptions, cursor: Option<&str>) -> ObjectPage
where
    I: IntoIterator<Item = (K, SystemMetadata)>,
    K: AsRef<str>,
{
    let limit = options.page_size.max(1);
    let mut items: Vec<ObjectInfo> = Vec::new();
    let mut more = false;

    for (key, system) in entries {
        let key = key.as_ref();
        let Some(rest) = key.strip_prefix(options.prefix.as_str()) else {
            continue;
        };

        let item = match rest.find('/') {
            Some(idx) if !options.recursive => {
                let end = options.prefix.len() + idx + 1;
                ObjectInfo::prefix(&key[..end])
            }
            _ => {
                let system = if options.system {
                    system
                } else {
                    SystemMetadata::default()
                };
                ObjectInfo::object(key, system)
            }
        };

        if cursor.is_some_and(|c| item.key.as_str() <= c) {
            continue;
        }
        // Collapsed prefixes arrive as runs of equal keys.
        if items.last().is_some_and(|last| last.key == item.key) {
            continue;
        }
        if items.len() == limit {
            more = true;
            break;
        }
        items.push(item);
    }

    ObjectPage { items, more }
}

/// Lazy, forward-only iterator over a paginated listing.
///
/// Pages are fetched on demand. The first error is yielded once and the
/// iterator is fused afterwards.
pub struct ObjectListing<'a> {
    client: &'a dyn ObjectClient,
    bucket: String,
    options: ListOptions,
    page: std::vec::IntoIter<ObjectInfo>,
    cursor: Option<String>,
    more: bool,
}

impl<'a> ObjectListing<'a> {
    /// Prepare a listing. No remote call is made until the first `next()`.
    pub fn new(
        client: &'a dyn ObjectClient,
        bucket: impl Into<String>,
        options: ListOptions,
    ) -> Self {
        Self {
            client,
            bucket: bucket.into(),
            options,
            page: Vec::new().into_iter(),
            cursor: None,
            more: true,
        }
    }

    /// The options this listing was opened with.
    pub fn options(&self) -> &ListOptions {
        &self.options
    }
}

impl Iterator for ObjectListing<'_> {
    type Item = StoreResult<ObjectInfo>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(item) = self.page.next() {
                self.cursor = Some(item.key.clone());
                return Some(Ok(item));
            }
            if !self.more {
                return None;
            }

            match self
                .client
                .list_objects_page(&self.bucket, &self.options, self.cursor.as_deref())
            {
                Ok(page) => {
                    debug!(
                        bucket = %self.bucket,
                        prefix = %self.options.prefix,
                        items = page.items.len(),
                        more = page.more,
                        "fetched listing page"
                    );
                    self.more = page.more && !page.items.is_empty();
                    self.page = page.items.into_iter();
                }
                Err(e) => {
                    self.more = false;
                    return Some(Err(e));
                }
            }
        }
    }
}

impl std::fmt::Debug for ObjectListing<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectListing")
            .field("bucket", &self.bucket)
            .field("options", &self.options)
            .field("cursor", &self.cursor)
            .field("more", &self.more)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{ClientOp, InMemoryObjectClient};

    fn meta(len: u64) -> SystemMetadata {
        SystemMetadata {
            created: None,
            content_length: len,
        }
    }

    fn keys(page: &ObjectPage) -> Vec<&str> {
        page.items.iter().map(|i| i.key.as_str()).collect()
    }

    const SNAPSHOT: &[(&str, u64)] = &[
        ("a/1", 1),
        ("a/2", 2),
        ("a/sub/x", 3),
        ("a/sub/y", 4),
        ("b/1", 5),
    ];

    fn snapshot() -> impl Iterator<Item = (&'static str, SystemMetadata)> {
        SNAPSHOT.iter().map(|(k, len)| (*k, meta(*len)))
    }

    #[test]
    fn recursive_prefix_listing() {
        let opts = ListOptions::with_prefix("a/").recursive(true).system(true);
        let page = paginate(snapshot(), &opts, None);
        assert_eq!(keys(&page), vec!["a/1", "a/2", "a/sub/x", "a/sub/y"]);
        assert_eq!(page.items[2].system.content_length, 3);
        assert!(!page.more);
    }

    #[test]
    fn non_recursive_collapses_prefixes() {
        let opts = ListOptions::with_prefix("a/");
        let page = paginate(snapshot(), &opts, None);
        assert_eq!(keys(&page), vec!["a/1", "a/2", "a/sub/"]);
        assert!(page.items[2].is_prefix);
    }

    #[test]
    fn metadata_omitted_unless_requested() {
        let opts = ListOptions::with_prefix("b/").recursive(true);
        let page = paginate(snapshot(), &opts, None);
        assert_eq!(page.items[0].system, SystemMetadata::default());
    }

    #[test]
    fn pages_resume_after_cursor() {
        let opts = ListOptions::default().recursive(true).page_size(2);
        let first = paginate(snapshot(), &opts, None);
        assert_eq!(keys(&first), vec!["a/1", "a/2"]);
        assert!(first.more);

        let second = paginate(snapshot(), &opts, Some("a/2"));
        assert_eq!(keys(&second), vec!["a/sub/x", "a/sub/y"]);
        assert!(second.more);

        let third = paginate(snapshot(), &opts, Some("a/sub/y"));
        assert_eq!(keys(&third), vec!["b/1"]);
        assert!(!third.more);
    }

    #[test]
    fn collapsed_prefix_not_repeated_across_pages() {
        let opts = ListOptions::default().page_size(1);
        let first = paginate(snapshot(), &opts, None);
        assert_eq!(keys(&first), vec!["a/"]);
        let second = paginate(snapshot(), &opts, Some("a/"));
        assert_eq!(keys(&second), vec!["b/"]);
        assert!(!second.more);
    }

    #[test]
    fn listing_walks_every_page_lazily() {
        let client = InMemoryObjectClient::with_bucket("bkt");
        for i in 0..7 {
            client.insert("bkt", &format!("k/{i}"), vec![0; i]).unwrap();
        }

        let opts = ListOptions::with_prefix("k/")
            .recursive(true)
            .system(true)
            .page_size(3);
        let mut listing = ObjectListing::new(&client, "bkt", opts);
        assert!(client.calls().is_empty());

        let first = listing.next().unwrap().unwrap();
        assert_eq!(first.key, "k/0");
        assert_eq!(client.count_calls(ClientOp::List), 1);

        let rest: Vec<_> = listing.map(|r| r.unwrap()).collect();
        assert_eq!(rest.len(), 6);
        assert_eq!(rest[5].system.content_length, 6);
        assert_eq!(client.count_calls(ClientOp::List), 3);
    }

    #[test]
    fn list_objects_through_a_shared_client() {
        let client: std::sync::Arc<dyn ObjectClient> =
            std::sync::Arc::new(InMemoryObjectClient::with_bucket("bkt"));
        for key in ["p/1", "p/2", "q/1"] {
            client.upload_object("bkt", key).unwrap().commit().unwrap();
        }

        let keys: Vec<String> = client
            .list_objects("bkt", ListOptions::with_prefix("p/").page_size(1))
            .map(|item| item.unwrap().key)
            .collect();
        assert_eq!(keys, vec!["p/1", "p/2"]);
    }

    #[test]
    fn listing_error_is_terminal() {
        let client = InMemoryObjectClient::new();
        let mut listing = ObjectListing::new(&client, "missing", ListOptions::default());
        assert!(matches!(
            listing.next(),
            Some(Err(crate::StoreError::BucketNotFound(_)))
        ));
        assert!(listing.next().is_none());
        assert!(listing.next().is_none());
    }
}
