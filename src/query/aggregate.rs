//! Multi-Source Aggregator
//!
//! Folds N independent query snapshots into one status. The combiner only
//! ever sees a complete set of inputs: a ratio computed from half-stale,
//! half-fresh reads is never produced.
//!
//! Heterogeneous queries compose as tuples of `&QueryResult<_>` (up to six),
//! homogeneous ones as a slice.

use futures::future::try_join_all;
use serde::Serialize;

use super::handle::Refetch;
use super::result::{QueryError, QueryResult, QueryState, QueryStatus};

/// Composite status over every input
#[derive(Debug, Clone, Serialize)]
pub struct AggregateQueryResult<R> {
    pub is_loading: bool,
    pub is_success: bool,
    pub is_error: bool,
    pub is_idle: bool,
    pub data: R,
    #[serde(skip)]
    pub error: Option<QueryError>,
}

impl<R> AggregateQueryResult<R> {
    /// Surfaced error if any input failed, otherwise the combined data
    pub fn into_result(self) -> Result<R, QueryError> {
        match self.error {
            Some(error) if self.is_error => Err(error),
            _ => Ok(self.data),
        }
    }
}

/// Collapse an aggregate back into a single snapshot so it can feed a
/// larger aggregate.
impl<T> From<AggregateQueryResult<Option<T>>> for QueryResult<T> {
    fn from(agg: AggregateQueryResult<Option<T>>) -> Self {
        let status = if agg.is_error {
            QueryStatus::Error
        } else if agg.is_success {
            QueryStatus::Success
        } else if agg.is_idle {
            QueryStatus::Idle
        } else {
            QueryStatus::Loading
        };

        QueryResult {
            status,
            data: agg.data,
            error: agg.error,
            is_fetching: agg.is_loading,
        }
    }
}

/// A fixed set of query snapshots whose data can be extracted together
pub trait QuerySet {
    type Data;

    fn states(&self) -> Vec<&dyn QueryState>;

    /// `Some` only if every input has data
    fn data(&self) -> Option<Self::Data>;
}

macro_rules! impl_query_set_for_tuple {
    ($($ty:ident . $idx:tt),+) => {
        impl<'a, $($ty: Clone),+> QuerySet for ($(&'a QueryResult<$ty>,)+) {
            type Data = ($($ty,)+);

            fn states(&self) -> Vec<&dyn QueryState> {
                vec![$(self.$idx as &dyn QueryState),+]
            }

            fn data(&self) -> Option<Self::Data> {
                Some(($(self.$idx.data.clone()?,)+))
            }
        }
    };
}

impl_query_set_for_tuple!(A.0);
impl_query_set_for_tuple!(A.0, B.1);
impl_query_set_for_tuple!(A.0, B.1, C.2);
impl_query_set_for_tuple!(A.0, B.1, C.2, D.3);
impl_query_set_for_tuple!(A.0, B.1, C.2, D.3, E.4);
impl_query_set_for_tuple!(A.0, B.1, C.2, D.3, E.4, F.5);

impl<'a, T: Clone> QuerySet for &'a [QueryResult<T>] {
    type Data = Vec<T>;

    fn states(&self) -> Vec<&dyn QueryState> {
        self.iter().map(|q| q as &dyn QueryState).collect()
    }

    fn data(&self) -> Option<Self::Data> {
        self.iter().map(|q| q.data.clone()).collect()
    }
}

/// Combine a set of snapshots.
///
/// `combine` runs only when every input has data; otherwise `fallback` is
/// returned as `data`. The surfaced error is the first erroring input's.
pub fn aggregate<Q, R>(queries: Q, combine: impl FnOnce(Q::Data) -> R, fallback: R) -> AggregateQueryResult<R>
where
    Q: QuerySet,
{
    let states = queries.states();

    let is_loading = states.iter().any(|s| s.status() == QueryStatus::Loading);
    let is_success = states.iter().all(|s| s.status() == QueryStatus::Success);
    let is_error = states.iter().any(|s| s.status() == QueryStatus::Error);
    let is_idle = states.iter().all(|s| s.status() == QueryStatus::Idle);
    let error = states
        .iter()
        .filter(|s| s.status() == QueryStatus::Error)
        .find_map(|s| s.error().cloned());

    let data = match queries.data() {
        Some(inputs) => combine(inputs),
        None => fallback,
    };

    AggregateQueryResult {
        is_loading,
        is_success,
        is_error,
        is_idle,
        data,
        error,
    }
}

/// Homogeneous shorthand: all values or the fallback
pub fn aggregate_all<T: Clone>(queries: &[QueryResult<T>]) -> AggregateQueryResult<Option<Vec<T>>> {
    aggregate(queries, Some, None)
}

/// Refetch every query concurrently.
///
/// Resolves when all complete and rejects on the first failure. Dropping the
/// returned future cancels whatever is still in flight.
pub async fn refetch_all(queries: &[&dyn Refetch]) -> Result<(), QueryError> {
    try_join_all(queries.iter().map(|q| q.refetch_erased())).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{Query, QueryKey, QueryOptions};
    use std::time::Duration;

    #[test]
    fn test_all_success_combines() {
        let supply = QueryResult::success(100.0);
        let price = QueryResult::success(2.0);
        let issued = QueryResult::success(40.0);

        let result = aggregate(
            (&supply, &price, &issued),
            |(s, p, i)| Some(s * p / i),
            None,
        );

        assert!(result.is_success);
        assert!(!result.is_loading && !result.is_error && !result.is_idle);
        assert_eq!(result.data, Some(5.0));
        assert!(result.error.is_none());
    }

    #[test]
    fn test_missing_data_returns_fallback() {
        let supply = QueryResult::success(100.0);
        let price: QueryResult<f64> = QueryResult::loading();

        let mut called = false;
        let result = aggregate(
            (&supply, &price),
            |(s, p)| {
                called = true;
                s * p
            },
            -1.0,
        );

        assert!(!called);
        assert!(result.is_loading);
        assert!(!result.is_success);
        assert_eq!(result.data, -1.0);
    }

    #[test]
    fn test_first_error_surfaces() {
        let ok = QueryResult::success(1u8);
        let first: QueryResult<u8> = QueryResult::failure(eyre::eyre!("subgraph down"));
        let second: QueryResult<String> = QueryResult::failure(eyre::eyre!("price api down"));

        let result = aggregate((&ok, &first, &second), |_| "combined", "fallback");

        assert!(result.is_error);
        assert!(!result.is_success);
        assert_eq!(result.data, "fallback");
        assert_eq!(result.error.unwrap().to_string(), "subgraph down");
    }

    #[test]
    fn test_success_iff_every_input_succeeds() {
        let cases: Vec<Vec<QueryResult<u32>>> = vec![
            vec![QueryResult::success(1), QueryResult::success(2)],
            vec![QueryResult::success(1), QueryResult::idle()],
            vec![QueryResult::loading(), QueryResult::success(2)],
            vec![QueryResult::failure(eyre::eyre!("x")), QueryResult::success(2)],
            vec![QueryResult::idle(), QueryResult::idle()],
        ];

        for case in &cases {
            let result = aggregate_all(case);
            let every = case.iter().all(|q| q.is_success());
            assert_eq!(result.is_success, every);
            assert_eq!(result.data.is_some(), case.iter().all(|q| q.data.is_some()));
        }

        assert!(aggregate_all(&cases[4]).is_idle);
        assert!(!aggregate_all(&cases[1]).is_idle);
    }

    #[test]
    fn test_nested_aggregate_keeps_error() {
        let prices = vec![QueryResult::success(2.0), QueryResult::failure(eyre::eyre!("quote missing"))];
        let inner: QueryResult<Vec<f64>> = aggregate_all(&prices).into();
        let supply = QueryResult::success(100.0);

        let outer = aggregate((&supply, &inner), |(s, p)| Some(s * p[0]), None);

        assert!(outer.is_error);
        assert_eq!(outer.data, None);
        assert_eq!(outer.into_result().unwrap_err().to_string(), "quote missing");
    }

    #[test]
    fn test_into_result_passes_data_through() {
        let a = QueryResult::success(3u32);
        let result = aggregate((&a,), |(v,)| Some(v * 2), None);
        assert_eq!(result.into_result().unwrap(), Some(6));
    }

    #[tokio::test]
    async fn test_refetch_all_rejects_on_failure() {
        let options = QueryOptions {
            retries: 0,
            retry_delay: Duration::ZERO,
            ..Default::default()
        };
        let good = Query::new(QueryKey::new(["good"]), || async { Ok(1u32) }).with_options(options);
        let bad = Query::new(QueryKey::new(["bad"]), || async {
            Err::<String, _>(eyre::eyre!("rpc error"))
        })
        .with_options(options);

        assert!(refetch_all(&[&good]).await.is_ok());
        assert!(good.state().is_success());

        let err = refetch_all(&[&good, &bad]).await.unwrap_err();
        assert_eq!(err.to_string(), "rpc error");
        assert!(bad.state().is_error());
    }
}
