//! Query descriptors and lazily produced query results.
//!
//! Queries run over a recursive listing of the bucket. Only prefix
//! selection and the keys-only flag are honored: orders and filters are
//! rejected before any remote call, and `offset`/`limit` are carried but
//! not applied.

use std::fmt;

use objds_store::{ListOptions, ObjectClient};
use tracing::debug;

use crate::error::{DatastoreError, DsResult, Operation};
use crate::key::{to_datastore_key, Key, SEPARATOR};
use crate::translate;

/// Comparison operator used by [`Filter`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CompareOp {
    Equal,
    NotEqual,
    GreaterThan,
    GreaterThanOrEqual,
    LessThan,
    LessThanOrEqual,
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let op = match self {
            Self::Equal => "==",
            Self::NotEqual => "!=",
            Self::GreaterThan => ">",
            Self::GreaterThanOrEqual => ">=",
            Self::LessThan => "<",
            Self::LessThanOrEqual => "<=",
        };
        f.write_str(op)
    }
}

/// Result ordering a caller may request. Not supported by this datastore.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Order {
    KeyAscending,
    KeyDescending,
    ValueAscending,
    ValueDescending,
}

impl fmt::Display for Order {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let order = match self {
            Self::KeyAscending => "KEY",
            Self::KeyDescending => "desc(KEY)",
            Self::ValueAscending => "VALUE",
            Self::ValueDescending => "desc(VALUE)",
        };
        f.write_str(order)
    }
}

/// Result filter a caller may request. Not supported by this datastore.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Filter {
    KeyPrefix(String),
    KeyCompare { op: CompareOp, key: String },
    ValueCompare { op: CompareOp, value: Vec<u8> },
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::KeyPrefix(prefix) => write!(f, "PREFIX({prefix:?})"),
            Self::KeyCompare { op, key } => write!(f, "KEY {op} {key:?}"),
            Self::ValueCompare { op, value } => write!(f, "VALUE {op} {} bytes", value.len()),
        }
    }
}

/// A query descriptor.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Query {
    /// Only keys starting with this string are returned.
    pub prefix: String,
    /// Skip fetching values.
    pub keys_only: bool,
    /// Sizes are always returned; kept for callers that set it.
    pub returns_sizes: bool,
    /// Rejected when non-empty.
    pub orders: Vec<Order>,
    /// Rejected when non-empty.
    pub filters: Vec<Filter>,
    /// Not applied.
    pub offset: usize,
    /// Not applied.
    pub limit: usize,
}

impl Query {
    /// A query for every key under `prefix`, values included.
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            ..Default::default()
        }
    }

    pub fn keys_only(mut self, keys_only: bool) -> Self {
        self.keys_only = keys_only;
        self
    }

    /// Fail with [`DatastoreError::UnsupportedQuery`] if the descriptor
    /// asks for ordering or filtering.
    pub fn validate(&self) -> DsResult<()> {
        if !self.orders.is_empty() || !self.filters.is_empty() {
            return Err(DatastoreError::UnsupportedQuery(
                "filters or orders are not supported".into(),
            ));
        }
        Ok(())
    }

    /// The listing prefix: the query prefix without its leading separator.
    pub fn storage_prefix(&self) -> &str {
        self.prefix.strip_prefix(SEPARATOR).unwrap_or(&self.prefix)
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SELECT keys")?;
        if !self.keys_only {
            f.write_str(",vals")?;
        }
        if !self.prefix.is_empty() {
            write!(f, " FROM {:?}", self.prefix)?;
        }
        if !self.filters.is_empty() {
            let filters: Vec<String> = self.filters.iter().map(ToString::to_string).collect();
            write!(f, " FILTER [{}]", filters.join(", "))?;
        }
        if !self.orders.is_empty() {
            let orders: Vec<String> = self.orders.iter().map(ToString::to_string).collect();
            write!(f, " ORDER [{}]", orders.join(", "))?;
        }
        if self.offset > 0 {
            write!(f, " OFFSET {}", self.offset)?;
        }
        if self.limit > 0 {
            write!(f, " LIMIT {}", self.limit)?;
        }
        Ok(())
    }
}

/// One query match.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Entry {
    pub key: Key,
    /// `None` for keys-only queries.
    pub value: Option<Vec<u8>>,
    /// Size of the stored value in bytes.
    pub size: u64,
}

/// Where a [`Results`] sequence stands.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResultsState {
    /// More entries may follow.
    Open,
    /// The listing ran out cleanly.
    Exhausted,
    /// An error was yielded; nothing follows it.
    Failed,
}

type NextFn<'a> = Box<dyn FnMut() -> Option<DsResult<Entry>> + 'a>;
type CloseFn<'a> = Box<dyn FnOnce() -> DsResult<()> + 'a>;

/// A lazy, single-pass sequence of query matches.
///
/// Yields `Ok(entry)` items until the source runs out or fails. At most one
/// `Err` is yielded and it is always the last item. The close hook runs
/// exactly once, on [`close`](Results::close) or on drop.
pub struct Results<'a> {
    query: Query,
    next: NextFn<'a>,
    close: Option<CloseFn<'a>>,
    state: ResultsState,
}

impl<'a> Results<'a> {
    /// Build results from a `next` producer and a `close` hook.
    pub fn from_fn(
        query: Query,
        next: impl FnMut() -> Option<DsResult<Entry>> + 'a,
        close: impl FnOnce() -> DsResult<()> + 'a,
    ) -> Self {
        Self {
            query,
            next: Box::new(next),
            close: Some(Box::new(close)),
            state: ResultsState::Open,
        }
    }

    /// Results over entries already in memory.
    pub fn from_entries(query: Query, entries: Vec<Entry>) -> Self {
        let mut entries = entries.into_iter();
        Self::from_fn(query, move || entries.next().map(Ok), || Ok(()))
    }

    /// The query that produced these results.
    pub fn query(&self) -> &Query {
        &self.query
    }

    pub fn state(&self) -> ResultsState {
        self.state
    }

    /// Collect every remaining entry, stopping at the first error.
    pub fn rest(mut self) -> DsResult<Vec<Entry>> {
        let mut entries = Vec::new();
        for result in self.by_ref() {
            entries.push(result?);
        }
        self.close()?;
        Ok(entries)
    }

    /// Run the close hook.
    pub fn close(mut self) -> DsResult<()> {
        match self.close.take() {
            Some(close) => close(),
            None => Ok(()),
        }
    }
}

impl Iterator for Results<'_> {
    type Item = DsResult<Entry>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.state != ResultsState::Open {
            return None;
        }
        match (self.next)() {
            Some(Ok(entry)) => Some(Ok(entry)),
            Some(Err(e)) => {
                self.state = ResultsState::Failed;
                Some(Err(e))
            }
            None => {
                self.state = ResultsState::Exhausted;
                None
            }
        }
    }
}

impl Drop for Results<'_> {
    fn drop(&mut self) {
        if let Some(close) = self.close.take() {
            let _ = close();
        }
    }
}

impl fmt::Debug for Results<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Results")
            .field("query", &self.query)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

/// Run `query` against a bucket.
///
/// Validation happens first, so an unsupported descriptor never reaches the
/// client. The listing itself is lazy: pages are fetched as entries are
/// pulled. Unless the query is keys-only, `hydrate` fetches each value.
pub fn run<'a>(
    client: &'a dyn ObjectClient,
    bucket: &'a str,
    query: Query,
    hydrate: impl Fn(&Key) -> DsResult<Vec<u8>> + 'a,
) -> DsResult<Results<'a>> {
    query.validate()?;
    if query.offset > 0 || query.limit > 0 {
        debug!(
            offset = query.offset,
            limit = query.limit,
            "query offset and limit are not applied"
        );
    }

    let options = ListOptions::with_prefix(query.storage_prefix())
        .recursive(true)
        .system(true);
    let mut listing = client.list_objects(bucket, options);
    let keys_only = query.keys_only;
    let prefix = Key::new(&query.prefix);

    let next = move || {
        let item = match listing.next()? {
            Ok(item) => item,
            Err(e) => return Some(Err(translate::failure(Operation::Query, &prefix, e))),
        };
        let key = to_datastore_key(&item.key);
        let value = if keys_only {
            None
        } else {
            match hydrate(&key) {
                Ok(value) => Some(value),
                Err(e) => return Some(Err(e)),
            }
        };
        Some(Ok(Entry {
            key,
            value,
            size: item.system.content_length,
        }))
    };

    Ok(Results::from_fn(query, next, || Ok(())))
}
