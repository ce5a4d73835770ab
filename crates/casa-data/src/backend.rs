//! The backend query interface.
//!
//! Requests mirror the PostgREST shape used by the hosted backend: a table,
//! one operation, column filters, optional ordering and an inclusive row
//! range. Responses carry `data`, `error` and an optional exact `count`.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::BackendError;

/// Operation to run against a table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum Operation {
    /// Read rows, projecting `columns` (`*` or a comma list).
    Select { columns: String },
    /// Insert one object or an array of objects.
    Insert(Value),
    /// Merge the given fields into every matching row.
    Update(Value),
    /// Delete every matching row.
    Delete,
}

impl Operation {
    /// Lowercase operation name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Select { .. } => "select",
            Self::Insert(_) => "insert",
            Self::Update(_) => "update",
            Self::Delete => "delete",
        }
    }

    /// Whether the operation changes data.
    pub fn is_write(&self) -> bool {
        !matches!(self, Self::Select { .. })
    }
}

/// Row filter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum Filter {
    Eq { column: String, value: Value },
    In { column: String, values: Vec<Value> },
    Gte { column: String, value: Value },
    Lte { column: String, value: Value },
    /// Case-insensitive pattern, `%` matches any run of characters.
    Ilike { column: String, pattern: String },
}

impl Filter {
    /// Column the filter applies to.
    pub fn column(&self) -> &str {
        match self {
            Self::Eq { column, .. }
            | Self::In { column, .. }
            | Self::Gte { column, .. }
            | Self::Lte { column, .. }
            | Self::Ilike { column, .. } => column,
        }
    }
}

/// Sort order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderBy {
    pub column: String,
    pub ascending: bool,
}

/// A single backend request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryRequest {
    pub table: String,
    pub operation: Operation,
    #[serde(default)]
    pub filters: Vec<Filter>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<OrderBy>,
    /// Inclusive `(from, to)` row range.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub range: Option<(usize, usize)>,
    /// Ask for the exact count of matching rows.
    #[serde(default)]
    pub count: bool,
}

impl QueryRequest {
    fn new(table: impl Into<String>, operation: Operation) -> Self {
        Self {
            table: table.into(),
            operation,
            filters: Vec::new(),
            order: None,
            range: None,
            count: false,
        }
    }

    /// `select <columns> from <table>`.
    pub fn select(table: impl Into<String>, columns: impl Into<String>) -> Self {
        Self::new(
            table,
            Operation::Select {
                columns: columns.into(),
            },
        )
    }

    /// Insert `rows` (an object or an array of objects).
    pub fn insert(table: impl Into<String>, rows: Value) -> Self {
        Self::new(table, Operation::Insert(rows))
    }

    /// Update matching rows with the fields of `patch`.
    pub fn update(table: impl Into<String>, patch: Value) -> Self {
        Self::new(table, Operation::Update(patch))
    }

    /// Delete matching rows.
    pub fn delete(table: impl Into<String>) -> Self {
        Self::new(table, Operation::Delete)
    }

    /// `column = value`.
    pub fn eq(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters.push(Filter::Eq {
            column: column.into(),
            value: value.into(),
        });
        self
    }

    /// `column IN (values)`.
    pub fn is_in<V: Into<Value>>(mut self, column: impl Into<String>, values: impl IntoIterator<Item = V>) -> Self {
        self.filters.push(Filter::In {
            column: column.into(),
            values: values.into_iter().map(Into::into).collect(),
        });
        self
    }

    /// `column >= value`.
    pub fn gte(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters.push(Filter::Gte {
            column: column.into(),
            value: value.into(),
        });
        self
    }

    /// `column <= value`.
    pub fn lte(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters.push(Filter::Lte {
            column: column.into(),
            value: value.into(),
        });
        self
    }

    /// `column ILIKE pattern`.
    pub fn ilike(mut self, column: impl Into<String>, pattern: impl Into<String>) -> Self {
        self.filters.push(Filter::Ilike {
            column: column.into(),
            pattern: pattern.into(),
        });
        self
    }

    /// Sort by `column`.
    pub fn order(mut self, column: impl Into<String>, ascending: bool) -> Self {
        self.order = Some(OrderBy {
            column: column.into(),
            ascending,
        });
        self
    }

    /// Limit to rows `from..=to` (zero-based).
    pub fn range(mut self, from: usize, to: usize) -> Self {
        self.range = Some((from, to));
        self
    }

    /// Request the exact match count.
    pub fn with_count(mut self) -> Self {
        self.count = true;
        self
    }

    /// `table.operation`, used in logs and metrics.
    pub fn describe(&self) -> String {
        format!("{}.{}", self.table, self.operation.name())
    }
}

/// Backend response envelope.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryResponse {
    #[serde(default)]
    pub data: Option<Value>,
    #[serde(default)]
    pub error: Option<BackendError>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<u64>,
}

impl QueryResponse {
    /// Successful response.
    pub fn ok(data: Value) -> Self {
        Self {
            data: Some(data),
            error: None,
            count: None,
        }
    }

    /// Failed response.
    pub fn err(error: BackendError) -> Self {
        Self {
            data: None,
            error: Some(error),
            count: None,
        }
    }

    /// Attach a row count.
    pub fn with_count(mut self, count: u64) -> Self {
        self.count = Some(count);
        self
    }

    /// Split into data or error. Missing data is `null`.
    pub fn into_result(self) -> Result<Value, BackendError> {
        match self.error {
            Some(error) => Err(error),
            None => Ok(self.data.unwrap_or(Value::Null)),
        }
    }
}

/// The hosted backend, as seen by the storefront.
///
/// Implementations report failures in-band through `QueryResponse::error`;
/// classification and retries happen above this trait.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Run one request.
    async fn query(&self, request: QueryRequest) -> QueryResponse;

    /// Cheap liveness probe.
    async fn health_check(&self) -> Result<(), BackendError>;

    /// Re-establish the session or connection.
    async fn refresh_session(&self) -> Result<(), BackendError>;
}

#[async_trait]
impl<B: Backend + ?Sized> Backend for Arc<B> {
    async fn query(&self, request: QueryRequest) -> QueryResponse {
        (**self).query(request).await
    }

    async fn health_check(&self) -> Result<(), BackendError> {
        (**self).health_check().await
    }

    async fn refresh_session(&self) -> Result<(), BackendError> {
        (**self).refresh_session().await
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_request_builder() {
        let request = QueryRequest::select("products", "*")
            .eq("category", "chairs")
            .gte("price", 100)
            .order("created_at", false)
            .range(0, 19)
            .with_count();

        assert_eq!(request.describe(), "products.select");
        assert_eq!(request.filters.len(), 2);
        assert_eq!(request.filters[0].column(), "category");
        assert_eq!(request.range, Some((0, 19)));
        assert!(request.count);
        assert!(!request.operation.is_write());
    }

    #[test]
    fn test_in_filter_collects_values() {
        let request = QueryRequest::select("order_items", "*").is_in("order_id", [1, 2, 3]);
        assert_eq!(
            request.filters[0],
            Filter::In {
                column: "order_id".to_string(),
                values: vec![json!(1), json!(2), json!(3)],
            }
        );
    }

    #[test]
    fn test_response_into_result() {
        let ok = QueryResponse::ok(json!([{ "id": 1 }])).with_count(1);
        assert_eq!(ok.count, Some(1));
        assert_eq!(ok.into_result().unwrap(), json!([{ "id": 1 }]));

        let err = QueryResponse::err(BackendError::new("boom"));
        assert_eq!(err.into_result().unwrap_err().message, "boom");

        assert_eq!(QueryResponse::default().into_result().unwrap(), Value::Null);
    }

    #[test]
    fn test_response_deserializes_backend_shape() {
        let response: QueryResponse = serde_json::from_value(json!({
            "data": null,
            "error": { "message": "JWT expired", "code": "PGRST301" }
        }))
        .unwrap();

        assert!(response.data.is_none());
        assert_eq!(response.error.unwrap().code.as_deref(), Some("PGRST301"));
    }
}
