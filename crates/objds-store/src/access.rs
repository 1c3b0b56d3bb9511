//! Access grants and the built-in [`LocalConnector`].

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::error::{StoreError, StoreResult};
use crate::localfs::FsObjectClient;
use crate::memory::InMemoryObjectClient;
use crate::traits::{Connector, ObjectClient};

/// A parsed access credential of the form `<scheme>://<location>`.
///
/// # Examples
///
/// ```
/// use objds_store::AccessGrant;
///
/// let grant = AccessGrant::parse("file:///var/lib/objds").unwrap();
/// assert_eq!(grant.scheme(), "file");
/// assert_eq!(grant.location(), "/var/lib/objds");
/// assert!(AccessGrant::parse("no-scheme").is_err());
/// ```
#[derive(Clone, PartialEq, Eq)]
pub struct AccessGrant {
    scheme: String,
    location: String,
}

impl AccessGrant {
    pub fn parse(grant: &str) -> StoreResult<Self> {
        let grant = grant.trim();
        if grant.is_empty() {
            return Err(StoreError::InvalidAccess("access grant is empty".into()));
        }
        let Some((scheme, location)) = grant.split_once("://") else {
            return Err(StoreError::InvalidAccess(
                "expected <scheme>://<location>".into(),
            ));
        };
        let valid_scheme = !scheme.is_empty()
            && scheme
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '+' || c == '-');
        if !valid_scheme {
            return Err(StoreError::InvalidAccess(format!("invalid scheme {scheme:?}")));
        }
        Ok(Self {
            scheme: scheme.to_ascii_lowercase(),
            location: location.to_string(),
        })
    }

    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    pub fn location(&self) -> &str {
        &self.location
    }
}

impl FromStr for AccessGrant {
    type Err = StoreError;

    fn from_str(s: &str) -> StoreResult<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for AccessGrant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}", self.scheme, self.location)
    }
}

// Grants may embed secrets; keep the location out of debug output.
impl fmt::Debug for AccessGrant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessGrant")
            .field("scheme", &self.scheme)
            .finish_non_exhaustive()
    }
}

/// Opens local projects.
///
/// - `mem://<name>` opens a fresh, empty [`InMemoryObjectClient`]. The name
///   is informational; two opens never share data.
/// - `file://<dir>` opens an [`FsObjectClient`] rooted at `<dir>`.
#[derive(Clone, Copy, Debug, Default)]
pub struct LocalConnector;

impl Connector for LocalConnector {
    fn open_project(&self, access: &AccessGrant) -> StoreResult<Arc<dyn ObjectClient>> {
        match access.scheme() {
            "mem" => Ok(Arc::new(InMemoryObjectClient::new())),
            "file" => {
                if access.location().is_empty() {
                    return Err(StoreError::InvalidAccess(
                        "file grant needs a directory".into(),
                    ));
                }
                Ok(Arc::new(FsObjectClient::open(access.location())?))
            }
            other => Err(StoreError::InvalidAccess(format!(
                "unsupported scheme {other:?}"
            ))),
        }
    }
}
