//! Query parameters and paged query results.

use serde::Deserialize;
use serde_json::Value;

/// Parameters of a resource query.
///
/// Several predicates are sent as separate `where` parameters, which the API
/// combines with `and`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryParams {
    pub predicates: Vec<String>,
    pub expand: Vec<String>,
    pub sort: Vec<String>,
    pub limit: Option<u32>,
    pub with_total: Option<bool>,
}

impl QueryParams {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_predicate(mut self, predicate: impl Into<String>) -> Self {
        self.predicates.push(predicate.into());
        self
    }

    #[must_use]
    pub fn with_expand(mut self, expansion: impl Into<String>) -> Self {
        self.expand.push(expansion.into());
        self
    }

    #[must_use]
    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Query for the page that follows the resource with id `last_id`.
    ///
    /// Pages are ordered by id and cursored with `id > "last"` instead of an
    /// offset, so deep pagination stays cheap.
    #[must_use]
    pub fn page_after(&self, page_size: u32, last_id: Option<&str>) -> Self {
        let mut query = self.clone();
        query.limit = Some(self.limit.unwrap_or(page_size));
        query.sort = vec!["id asc".to_string()];
        query.with_total = Some(false);
        if let Some(id) = last_id {
            query.predicates.push(format!("id > {}", quote(id)));
        }
        query
    }

    pub fn to_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = Vec::new();
        for predicate in &self.predicates {
            pairs.push(("where".to_string(), predicate.clone()));
        }
        for expansion in &self.expand {
            pairs.push(("expand".to_string(), expansion.clone()));
        }
        for sort in &self.sort {
            pairs.push(("sort".to_string(), sort.clone()));
        }
        if let Some(limit) = self.limit {
            pairs.push(("limit".to_string(), limit.to_string()));
        }
        if let Some(with_total) = self.with_total {
            pairs.push(("withTotal".to_string(), with_total.to_string()));
        }
        pairs
    }
}

/// One page of query results.
#[derive(Debug, Clone, Deserialize)]
pub struct PagedQueryResult {
    #[serde(default)]
    pub limit: Option<u32>,
    #[serde(default)]
    pub count: u64,
    #[serde(default)]
    pub total: Option<u64>,
    #[serde(default)]
    pub results: Vec<Value>,
}

impl PagedQueryResult {
    /// Id of the last resource of the page, the cursor for the next one.
    pub fn last_id(&self) -> Option<&str> {
        self.results.last().and_then(|r| r.get("id")).and_then(Value::as_str)
    }
}

/// Quotes a string for use inside a query predicate.
pub fn quote(value: &str) -> String {
    format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
}

/// `field in ("a", "b")`
pub fn in_predicate<S: AsRef<str>>(field: &str, values: &[S]) -> String {
    let quoted: Vec<String> = values.iter().map(|v| quote(v.as_ref())).collect();
    format!("{} in ({})", field, quoted.join(", "))
}
