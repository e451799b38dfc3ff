//! Subgraph pagination
//!
//! Subgraphs cap a single selection at 1000 entities, so longer histories
//! are read in pages with `first`/`skip` until `max` entities have arrived or
//! a short page signals the end.

use async_trait::async_trait;
use eyre::{eyre, Result};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, trace};

/// Largest page a subgraph will return
pub const MAX_PAGE_SIZE: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderDirection {
    Asc,
    Desc,
}

impl OrderDirection {
    fn as_str(&self) -> &'static str {
        match self {
            OrderDirection::Asc => "asc",
            OrderDirection::Desc => "desc",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Selection {
    /// Filter, e.g. `{"timestamp_gt": 1600000000}`
    pub filter: BTreeMap<String, Value>,
    pub order_by: Option<String>,
    pub order_direction: Option<OrderDirection>,
}

/// One paged entity query
#[derive(Debug, Clone)]
pub struct EntityQuery {
    pub api: String,
    pub entity: String,
    pub selection: Selection,
    pub properties: Vec<String>,
    pub max: usize,
}

impl EntityQuery {
    pub fn new(api: &str, entity: &str, properties: &[&str], max: usize) -> Self {
        Self {
            api: api.to_string(),
            entity: entity.to_string(),
            selection: Selection::default(),
            properties: properties.iter().map(|p| p.to_string()).collect(),
            max,
        }
    }

    pub fn filter(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.selection.filter.insert(field.to_string(), value.into());
        self
    }

    pub fn order_by(mut self, field: &str, direction: OrderDirection) -> Self {
        self.selection.order_by = Some(field.to_string());
        self.selection.order_direction = Some(direction);
        self
    }

    /// GraphQL text for one page
    pub fn to_graphql(&self, first: usize, skip: usize) -> String {
        let mut args = vec![format!("first: {}", first), format!("skip: {}", skip)];

        if !self.selection.filter.is_empty() {
            // JSON scalars and lists are valid GraphQL literals
            let filter = self
                .selection
                .filter
                .iter()
                .map(|(k, v)| format!("{}: {}", k, v))
                .collect::<Vec<_>>()
                .join(", ");
            args.push(format!("where: {{{}}}", filter));
        }
        if let Some(ref order_by) = self.selection.order_by {
            args.push(format!("orderBy: {}", order_by));
        }
        if let Some(direction) = self.selection.order_direction {
            args.push(format!("orderDirection: {}", direction.as_str()));
        }

        format!(
            "{{{}({}) {{ {} }}}}",
            self.entity,
            args.join(", "),
            self.properties.join(" ")
        )
    }
}

/// Drive `fetch_page(first, skip)` until `max` entities or a short page
pub async fn paginate<F, Fut>(max: usize, page_size: usize, mut fetch_page: F) -> Result<Vec<Value>>
where
    F: FnMut(usize, usize) -> Fut,
    Fut: Future<Output = Result<Vec<Value>>>,
{
    let page_size = page_size.clamp(1, MAX_PAGE_SIZE);
    let mut results = Vec::new();

    while results.len() < max {
        let first = page_size.min(max - results.len());
        let page = fetch_page(first, results.len()).await?;
        let received = page.len();
        trace!("Page at skip={} returned {} entities", results.len(), received);

        results.extend(page.into_iter().take(first));

        if received < first {
            break;
        }
    }

    Ok(results)
}

#[async_trait]
pub trait SubgraphClient: Send + Sync {
    /// Flat list of matching entities, paged transparently up to `query.max`
    async fn query_entities(&self, query: &EntityQuery) -> Result<Vec<Value>>;
}

#[derive(Debug, Deserialize)]
struct GraphQLResponse {
    data: Option<Map<String, Value>>,
    errors: Option<Vec<GraphQLError>>,
}

#[derive(Debug, Deserialize)]
struct GraphQLError {
    message: String,
}

/// Pull the entity array out of a GraphQL response body
pub fn parse_page(body: &str, entity: &str) -> Result<Vec<Value>> {
    let response: GraphQLResponse = serde_json::from_str(body)?;

    if let Some(errors) = response.errors.filter(|e| !e.is_empty()) {
        let messages: Vec<_> = errors.into_iter().map(|e| e.message).collect();
        return Err(eyre!("subgraph error: {}", messages.join("; ")));
    }

    match response.data.and_then(|mut d| d.remove(entity)) {
        Some(Value::Array(items)) => Ok(items),
        Some(other) => Err(eyre!("subgraph returned non-list for {}: {}", entity, other)),
        None => Err(eyre!("subgraph response has no {}", entity)),
    }
}

pub struct HttpSubgraphClient {
    http_client: Client,
    page_size: usize,
}

impl HttpSubgraphClient {
    pub fn new(timeout: Duration) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| eyre!("failed to create HTTP client: {}", e))?;

        Ok(Self {
            http_client,
            page_size: MAX_PAGE_SIZE,
        })
    }

    async fn fetch_page(&self, query: &EntityQuery, first: usize, skip: usize) -> Result<Vec<Value>> {
        let body = self
            .http_client
            .post(&query.api)
            .json(&json!({ "query": query.to_graphql(first, skip) }))
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        parse_page(&body, &query.entity)
    }
}

#[async_trait]
impl SubgraphClient for HttpSubgraphClient {
    async fn query_entities(&self, query: &EntityQuery) -> Result<Vec<Value>> {
        let entities = paginate(query.max, self.page_size, |first, skip| {
            self.fetch_page(query, first, skip)
        })
        .await?;

        debug!("📈 {} {} entities from {}", entities.len(), query.entity, query.api);
        Ok(entities)
    }
}

// ============================================
// FIELD HELPERS
// ============================================

/// Subgraphs send BigDecimal/BigInt as strings and small ints as numbers
pub fn number_field(entity: &Value, field: &str) -> Result<f64> {
    let value = entity
        .get(field)
        .ok_or_else(|| eyre!("entity is missing {}", field))?;

    let number = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };

    number
        .filter(|n| n.is_finite())
        .ok_or_else(|| eyre!("{} is not a number: {}", field, value))
}

pub fn int_field(entity: &Value, field: &str) -> Result<i64> {
    let value = entity
        .get(field)
        .ok_or_else(|| eyre!("entity is missing {}", field))?;

    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
    .ok_or_else(|| eyre!("{} is not an integer: {}", field, value))
}

pub fn string_field<'a>(entity: &'a Value, field: &str) -> Result<&'a str> {
    entity
        .get(field)
        .and_then(Value::as_str)
        .ok_or_else(|| eyre!("{} is not a string", field))
}

// ============================================
// TEST SUPPORT
// ============================================

#[cfg(test)]
pub mod fake {
    use super::*;
    use std::collections::HashMap;

    /// Canned entities per entity name; the query is recorded
    #[derive(Default)]
    pub struct FakeSubgraph {
        pub entities: HashMap<String, Vec<Value>>,
        pub queries: std::sync::Mutex<Vec<EntityQuery>>,
    }

    impl FakeSubgraph {
        pub fn with(mut self, entity: &str, items: Vec<Value>) -> Self {
            self.entities.insert(entity.to_string(), items);
            self
        }
    }

    #[async_trait]
    impl SubgraphClient for FakeSubgraph {
        async fn query_entities(&self, query: &EntityQuery) -> Result<Vec<Value>> {
            self.queries.lock().unwrap().push(query.clone());
            let items = self
                .entities
                .get(&query.entity)
                .ok_or_else(|| eyre!("subgraph unavailable"))?;
            Ok(items.iter().take(query.max).cloned().collect())
        }
    }
}
