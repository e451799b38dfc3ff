//! Query layer
//!
//! Responsible for:
//! - Status snapshots for every independent fetch
//! - Read-through caching keyed by descriptive tuples
//! - All-or-nothing composition of N fetches into one view-model

mod aggregate;
mod cache;
mod handle;
mod result;

pub use aggregate::{aggregate, aggregate_all, refetch_all, AggregateQueryResult, QuerySet};
pub use cache::{QueryCache, QueryKey};
pub use handle::{Query, QueryOptions, Refetch};
pub use result::{QueryError, QueryResult, QueryState, QueryStatus};
