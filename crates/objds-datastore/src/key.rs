//! Hierarchical datastore keys and the storage key codec.
//!
//! A datastore key is a `/`-separated path that always starts with `/`.
//! The object store keeps the same path without the leading separator:
//!
//! ```
//! use objds_datastore::{to_datastore_key, to_storage_key, Key};
//!
//! let key = Key::new("/blocks/abc");
//! assert_eq!(to_storage_key(&key), "blocks/abc");
//! assert_eq!(to_datastore_key("blocks/abc"), key);
//! ```

use std::fmt;

/// Separator between key namespaces.
pub const SEPARATOR: char = '/';

/// A hierarchical datastore key in canonical form.
///
/// Canonical keys start with `/`, contain no empty namespaces and have no
/// trailing `/` (except the root key `/` itself).
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Key(String);

impl Key {
    /// Build a canonical key from any path-like string.
    ///
    /// Adds the leading `/`, collapses repeated separators, drops a trailing
    /// separator, and resolves `.` and `..` namespaces.
    pub fn new(raw: impl AsRef<str>) -> Self {
        let mut parts: Vec<&str> = Vec::new();
        for part in raw.as_ref().split(SEPARATOR) {
            match part {
                "" | "." => {}
                ".." => {
                    parts.pop();
                }
                _ => parts.push(part),
            }
        }
        let mut canonical = String::with_capacity(raw.as_ref().len() + 1);
        if parts.is_empty() {
            canonical.push(SEPARATOR);
        }
        for part in parts {
            canonical.push(SEPARATOR);
            canonical.push_str(part);
        }
        Self(canonical)
    }

    /// The root key `/`.
    pub fn root() -> Self {
        Self(SEPARATOR.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0.len() == 1
    }

    /// Append a namespace: `/a`.child("b") == `/a/b`.
    pub fn child(&self, name: &str) -> Self {
        Self::new(format!("{}{SEPARATOR}{name}", self.0))
    }

    /// The key one level up. The parent of the root is the root.
    pub fn parent(&self) -> Self {
        match self.0.rfind(SEPARATOR) {
            Some(0) | None => Self::root(),
            Some(idx) => Self(self.0[..idx].to_string()),
        }
    }

    /// The last namespace, or `""` for the root.
    pub fn name(&self) -> &str {
        self.namespaces().next_back().unwrap_or("")
    }

    /// The namespaces of this key, outermost first.
    pub fn namespaces(&self) -> impl DoubleEndedIterator<Item = &str> {
        self.0.split(SEPARATOR).filter(|part| !part.is_empty())
    }

    /// `/a` is an ancestor of `/a/b` but not of `/a` or `/ab`.
    pub fn is_ancestor_of(&self, other: &Key) -> bool {
        if self.is_root() {
            return !other.is_root();
        }
        other
            .0
            .strip_prefix(self.0.as_str())
            .is_some_and(|rest| rest.starts_with(SEPARATOR))
    }
}

impl Default for Key {
    fn default() -> Self {
        Self::root()
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Key {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Key {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

impl From<String> for Key {
    fn from(raw: String) -> Self {
        Self::new(raw)
    }
}

/// Flat object key for a datastore key: exactly one leading `/` removed.
pub fn to_storage_key(key: &Key) -> &str {
    key.0.strip_prefix(SEPARATOR).unwrap_or(&key.0)
}

/// Datastore key for a flat object key: a `/` prepended, nothing else.
///
/// This is the exact inverse of [`to_storage_key`]. Storage keys are taken
/// as they are, so an object written by another tool under `a//b` comes back
/// as `/a//b` rather than being cleaned.
pub fn to_datastore_key(storage_key: &str) -> Key {
    Key(format!("{SEPARATOR}{storage_key}"))
}
