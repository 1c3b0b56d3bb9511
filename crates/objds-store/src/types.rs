use std::time::SystemTime;

/// Number of listing items requested per page when none is configured.
pub const DEFAULT_PAGE_SIZE: usize = 1000;

/// System metadata attached to an object by the backend.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SystemMetadata {
    /// When the object was committed, if the backend knows.
    pub created: Option<SystemTime>,
    /// Size of the object payload in bytes.
    pub content_length: u64,
}

/// An entry returned by `stat_object` or a listing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ObjectInfo {
    /// Flat object key (or collapsed prefix ending in `/`).
    pub key: String,
    /// `true` for a collapsed prefix in a non-recursive listing.
    pub is_prefix: bool,
    /// System metadata. Zeroed when the listing did not request it.
    pub system: SystemMetadata,
}

impl ObjectInfo {
    /// An entry for a stored object.
    pub fn object(key: impl Into<String>, system: SystemMetadata) -> Self {
        Self {
            key: key.into(),
            is_prefix: false,
            system,
        }
    }

    /// An entry for a collapsed prefix.
    pub fn prefix(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            is_prefix: true,
            system: SystemMetadata::default(),
        }
    }
}

/// Options for a prefix listing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ListOptions {
    /// Only keys starting with this string are listed. No leading `/`.
    pub prefix: String,
    /// List every key below the prefix instead of collapsing at the next `/`.
    pub recursive: bool,
    /// Populate [`SystemMetadata`] on each item.
    pub system: bool,
    /// Maximum number of items per page.
    pub page_size: usize,
}

impl Default for ListOptions {
    fn default() -> Self {
        Self {
            prefix: String::new(),
            recursive: false,
            system: false,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl ListOptions {
    /// Options listing everything under `prefix`, non-recursive, no metadata.
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            ..Default::default()
        }
    }

    pub fn recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    pub fn system(mut self, system: bool) -> Self {
        self.system = system;
        self
    }

    pub fn page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }
}

/// One page of a listing.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ObjectPage {
    /// Items in ascending key order.
    pub items: Vec<ObjectInfo>,
    /// Whether items remain after the last one in this page.
    pub more: bool,
}
