//! Request/response contract for externally supplied data.
//!
//! Requests are fire-and-forget: the grid hands a [`DataRequest`] to the source and later feeds
//! whatever [`DataResponse`] arrives back through [`crate::grid::Grid::receive`]. There is no
//! cancellation; a newer request simply supersedes older ones and their responses are dropped.

use crate::column::Column;
use crate::error::GridError;
use crate::error::GridResult;
use crate::query::GroupKey;
use crate::query::Query;
use crate::query::QueryEngine;
use crate::query::ResultRow;
use crate::record::Record;
use std::collections::HashSet;
use std::collections::VecDeque;
use tracing::debug;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RequestId(pub u64);

#[derive(Clone, Debug, PartialEq)]
pub struct DataRequest {
    pub id: RequestId,
    pub query: Query,
}

#[derive(Clone, Debug, PartialEq)]
pub struct DataResponse {
    pub id: RequestId,
    /// Rows already filtered, sorted and paged by the source.
    pub records: Vec<Record>,
}

/// A provider of rows for a query.
pub trait DataSource {
    fn request(&mut self, request: DataRequest);

    /// Returns the next completed response, if any.
    fn poll(&mut self) -> Option<DataResponse>;
}

/// Hands out request ids and recognises stale responses.
#[derive(Clone, Debug, Default)]
pub struct RequestTracker {
    next: u64,
    latest: Option<RequestId>,
}

impl RequestTracker {
    pub fn begin(&mut self) -> RequestId {
        self.next += 1;
        let id = RequestId(self.next);
        self.latest = Some(id);
        id
    }

    pub fn latest(&self) -> Option<RequestId> {
        self.latest
    }

    /// Accepts `id` only if it is the latest issued request. Accepting clears the pending state.
    pub fn accept(&mut self, id: RequestId) -> GridResult<()> {
        match self.latest {
            Some(latest) if latest == id => {
                self.latest = None;
                Ok(())
            }
            latest => {
                let expected = latest.unwrap_or_default();
                debug!(
                    target: "ratatui_grid::source",
                    got = id.0,
                    expected = expected.0,
                    "dropping stale response"
                );
                Err(GridError::StaleResponse { expected, got: id })
            }
        }
    }

    pub fn is_pending(&self) -> bool {
        self.latest.is_some()
    }
}

/// A [`DataSource`] backed by a local record list.
///
/// Responses are queued and released by [`DataSource::poll`], which lets callers (and tests)
/// deliver them out of order.
pub struct InMemorySource {
    records: Vec<Record>,
    columns: Vec<Column>,
    queue: VecDeque<DataResponse>,
}

impl InMemorySource {
    pub fn new(records: Vec<Record>, columns: Vec<Column>) -> Self {
        Self {
            records,
            columns,
            queue: VecDeque::new(),
        }
    }

    /// Pops the most recent response instead of the oldest one.
    pub fn poll_latest(&mut self) -> Option<DataResponse> {
        self.queue.pop_back()
    }
}

impl DataSource for InMemorySource {
    fn request(&mut self, request: DataRequest) {
        let collapsed: HashSet<GroupKey> = HashSet::new();
        let result = QueryEngine::run(&self.records, &request.query, &self.columns, &collapsed);
        let records = result
            .rows
            .iter()
            .filter_map(|r| match r {
                ResultRow::Data { index, .. } => self.records.get(*index).cloned(),
                ResultRow::Group { .. } => None,
            })
            .collect();
        self.queue.push_back(DataResponse {
            id: request.id,
            records,
        });
    }

    fn poll(&mut self) -> Option<DataResponse> {
        self.queue.pop_front()
    }
}
