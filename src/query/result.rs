//! Query status snapshots

use std::fmt;
use std::sync::Arc;

/// Error stored in query state; cheap to clone into every aggregate that
/// surfaces it.
#[derive(Clone)]
pub struct QueryError(Arc<eyre::Report>);

impl From<eyre::Report> for QueryError {
    fn from(report: eyre::Report) -> Self {
        Self(Arc::new(report))
    }
}

impl fmt::Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "QueryError({})", self.0)
    }
}

impl std::error::Error for QueryError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryStatus {
    /// Never fetched
    Idle,
    /// First fetch in flight, no data yet
    Loading,
    Success,
    Error,
}

/// Snapshot of one query
#[derive(Debug, Clone)]
pub struct QueryResult<T> {
    pub status: QueryStatus,
    pub data: Option<T>,
    pub error: Option<QueryError>,
    /// A background refetch is running (data may still be present)
    pub is_fetching: bool,
}

impl<T> QueryResult<T> {
    pub fn idle() -> Self {
        Self {
            status: QueryStatus::Idle,
            data: None,
            error: None,
            is_fetching: false,
        }
    }

    pub fn loading() -> Self {
        Self {
            status: QueryStatus::Loading,
            data: None,
            error: None,
            is_fetching: true,
        }
    }

    pub fn success(data: T) -> Self {
        Self {
            status: QueryStatus::Success,
            data: Some(data),
            error: None,
            is_fetching: false,
        }
    }

    pub fn failure(error: impl Into<QueryError>) -> Self {
        Self {
            status: QueryStatus::Error,
            data: None,
            error: Some(error.into()),
            is_fetching: false,
        }
    }

    pub fn is_idle(&self) -> bool {
        self.status == QueryStatus::Idle
    }

    pub fn is_loading(&self) -> bool {
        self.status == QueryStatus::Loading
    }

    pub fn is_success(&self) -> bool {
        self.status == QueryStatus::Success
    }

    pub fn is_error(&self) -> bool {
        self.status == QueryStatus::Error
    }
}

/// Status view of any query regardless of its data type
pub trait QueryState {
    fn status(&self) -> QueryStatus;
    fn error(&self) -> Option<&QueryError>;
    fn has_data(&self) -> bool;
}

impl<T> QueryState for QueryResult<T> {
    fn status(&self) -> QueryStatus {
        self.status
    }

    fn error(&self) -> Option<&QueryError> {
        self.error.as_ref()
    }

    fn has_data(&self) -> bool {
        self.data.is_some()
    }
}
