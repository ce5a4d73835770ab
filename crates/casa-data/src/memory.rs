//! In-memory backend for development and tests.

use std::cmp::Ordering;
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::debug;

use crate::backend::{Backend, Filter, Operation, QueryRequest, QueryResponse};
use crate::error::BackendError;

/// PostgREST code for a select that embeds an unknown relationship.
pub const RELATIONSHIP_NOT_FOUND: &str = "PGRST200";

/// Postgres `undefined_table`.
pub const UNDEFINED_TABLE: &str = "42P01";

#[derive(Debug, Default)]
struct State {
    tables: HashMap<String, Vec<Value>>,
    faults: HashMap<String, VecDeque<BackendError>>,
    latency: HashMap<String, Duration>,
    calls: HashMap<String, usize>,
    health_faults: VecDeque<BackendError>,
    health_latency: Duration,
    health_checks: usize,
    refreshes: usize,
}

/// Backend holding each table as a list of JSON objects.
///
/// Supports the filter and ordering subset used by the storefront. Embedded
/// relation selects (`*, order_items(*)`) are rejected with
/// `RELATIONSHIP_NOT_FOUND`, like a backend whose schema has no foreign key
/// between the tables.
///
/// Faults can be queued per table; each queued error answers one query.
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    state: Mutex<State>,
}

impl InMemoryBackend {
    /// Create an empty backend.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Builder: seed a table.
    pub fn with_table(self, table: &str, rows: Vec<Value>) -> Self {
        self.lock().tables.insert(table.to_string(), rows);
        self
    }

    /// Create an empty table if it does not exist.
    pub fn create_table(&self, table: &str) {
        self.lock().tables.entry(table.to_string()).or_default();
    }

    /// Snapshot of a table's rows.
    pub fn rows(&self, table: &str) -> Vec<Value> {
        self.lock().tables.get(table).cloned().unwrap_or_default()
    }

    /// Answer the next query on `table` with `error`.
    pub fn fail_next(&self, table: &str, error: BackendError) {
        self.fail_next_n(table, 1, error);
    }

    /// Answer the next `n` queries on `table` with `error`.
    pub fn fail_next_n(&self, table: &str, n: usize, error: BackendError) {
        let mut state = self.lock();
        let queue = state.faults.entry(table.to_string()).or_default();
        queue.extend(std::iter::repeat(error).take(n));
    }

    /// Delay every query on `table`.
    pub fn set_latency(&self, table: &str, latency: Duration) {
        self.lock().latency.insert(table.to_string(), latency);
    }

    /// Fail the next `n` health checks.
    pub fn fail_health_checks(&self, n: usize) {
        let error = BackendError::new("fetch failed");
        self.lock()
            .health_faults
            .extend(std::iter::repeat(error).take(n));
    }

    /// Delay every health check.
    pub fn set_health_latency(&self, latency: Duration) {
        self.lock().health_latency = latency;
    }

    /// Queries issued against `table`, including failed ones.
    pub fn query_count(&self, table: &str) -> usize {
        self.lock().calls.get(table).copied().unwrap_or(0)
    }

    /// Health checks issued.
    pub fn health_check_count(&self) -> usize {
        self.lock().health_checks
    }

    /// Session refreshes issued.
    pub fn refresh_count(&self) -> usize {
        self.lock().refreshes
    }

    fn execute(&self, request: &QueryRequest) -> QueryResponse {
        let mut state = self.lock();
        let Some(rows) = state.tables.get_mut(&request.table) else {
            return QueryResponse::err(
                BackendError::new(format!("relation \"public.{}\" does not exist", request.table))
                    .with_code(UNDEFINED_TABLE)
                    .with_status(404),
            );
        };

        match &request.operation {
            Operation::Select { columns } => select(rows, request, columns),
            Operation::Insert(value) => insert(rows, value),
            Operation::Update(patch) => update(rows, &request.filters, patch),
            Operation::Delete => delete(rows, &request.filters),
        }
    }
}

#[async_trait]
impl Backend for InMemoryBackend {
    async fn query(&self, request: QueryRequest) -> QueryResponse {
        let (fault, latency) = {
            let mut state = self.lock();
            *state.calls.entry(request.table.clone()).or_insert(0) += 1;
            let fault = state
                .faults
                .get_mut(&request.table)
                .and_then(VecDeque::pop_front);
            let latency = state.latency.get(&request.table).copied();
            (fault, latency)
        };

        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        if let Some(error) = fault {
            debug!(table = %request.table, error = %error, "injected fault");
            return QueryResponse::err(error);
        }

        self.execute(&request)
    }

    async fn health_check(&self) -> Result<(), BackendError> {
        let (fault, latency) = {
            let mut state = self.lock();
            state.health_checks += 1;
            (state.health_faults.pop_front(), state.health_latency)
        };

        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        match fault {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    async fn refresh_session(&self) -> Result<(), BackendError> {
        self.lock().refreshes += 1;
        Ok(())
    }
}

fn select(rows: &[Value], request: &QueryRequest, columns: &str) -> QueryResponse {
    if let Some(relation) = embedded_relation(columns) {
        return QueryResponse::err(
            BackendError::new(format!(
                "Could not find a relationship between '{}' and '{}' in the schema cache",
                request.table, relation
            ))
            .with_code(RELATIONSHIP_NOT_FOUND)
            .with_status(400),
        );
    }

    let mut matched: Vec<&Value> = rows
        .iter()
        .filter(|row| matches_all(row, &request.filters))
        .collect();

    if let Some(order) = &request.order {
        matched.sort_by(|a, b| {
            let ordering = compare(&a[order.column.as_str()], &b[order.column.as_str()]);
            if order.ascending {
                ordering
            } else {
                ordering.reverse()
            }
        });
    }

    let total = matched.len() as u64;

    let page: Vec<Value> = match request.range {
        Some((from, to)) => matched
            .into_iter()
            .skip(from)
            .take(to.saturating_sub(from) + 1)
            .map(|row| project(row, columns))
            .collect(),
        None => matched.into_iter().map(|row| project(row, columns)).collect(),
    };

    let response = QueryResponse::ok(Value::Array(page));
    if request.count {
        response.with_count(total)
    } else {
        response
    }
}

/// The relation named in `a, rel(*)`, if the column list embeds one.
fn embedded_relation(columns: &str) -> Option<&str> {
    let open = columns.find('(')?;
    let name = columns[..open].rsplit(',').next().unwrap_or_default().trim();
    Some(name)
}

fn project(row: &Value, columns: &str) -> Value {
    let columns = columns.trim();
    if columns == "*" {
        return row.clone();
    }
    let Value::Object(fields) = row else {
        return row.clone();
    };

    let projected: Map<String, Value> = columns
        .split(',')
        .map(str::trim)
        .filter_map(|column| fields.get(column).map(|v| (column.to_string(), v.clone())))
        .collect();
    Value::Object(projected)
}

fn insert(rows: &mut Vec<Value>, value: &Value) -> QueryResponse {
    let new_rows = match value {
        Value::Array(items) => items.clone(),
        other => vec![other.clone()],
    };

    let mut next_id = rows
        .iter()
        .filter_map(|row| row["id"].as_u64())
        .max()
        .unwrap_or(0)
        + 1;

    let mut inserted = Vec::with_capacity(new_rows.len());
    for mut row in new_rows {
        let Value::Object(fields) = &mut row else {
            return QueryResponse::err(
                BackendError::new("insert payload must be an object").with_code("22P02"),
            );
        };
        if !fields.contains_key("id") {
            fields.insert("id".to_string(), Value::from(next_id));
            next_id += 1;
        }
        inserted.push(row);
    }

    rows.extend(inserted.iter().cloned());
    QueryResponse::ok(Value::Array(inserted))
}

fn update(rows: &mut [Value], filters: &[Filter], patch: &Value) -> QueryResponse {
    let Value::Object(patch) = patch else {
        return QueryResponse::err(BackendError::new("update payload must be an object").with_code("22P02"));
    };

    let mut updated = Vec::new();
    for row in rows.iter_mut().filter(|row| matches_all(row, filters)) {
        if let Value::Object(fields) = &mut *row {
            for (k, v) in patch {
                fields.insert(k.clone(), v.clone());
            }
        }
        updated.push(row.clone());
    }
    QueryResponse::ok(Value::Array(updated))
}

fn delete(rows: &mut Vec<Value>, filters: &[Filter]) -> QueryResponse {
    let (removed, kept): (Vec<Value>, Vec<Value>) = rows
        .drain(..)
        .partition(|row| matches_all(row, filters));
    *rows = kept;
    QueryResponse::ok(Value::Array(removed))
}

fn matches_all(row: &Value, filters: &[Filter]) -> bool {
    filters.iter().all(|filter| matches(row, filter))
}

fn matches(row: &Value, filter: &Filter) -> bool {
    let Some(field) = row.get(filter.column()) else {
        return false;
    };
    match filter {
        Filter::Eq { value, .. } => values_equal(field, value),
        Filter::In { values, .. } => values.iter().any(|v| values_equal(field, v)),
        Filter::Gte { value, .. } => !field.is_null() && compare(field, value) != Ordering::Less,
        Filter::Lte { value, .. } => !field.is_null() && compare(field, value) != Ordering::Greater,
        Filter::Ilike { pattern, .. } => field
            .as_str()
            .is_some_and(|text| ilike(text, pattern)),
    }
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x == y,
        _ => a == b,
    }
}

fn compare(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x
            .as_f64()
            .zip(y.as_f64())
            .and_then(|(x, y)| x.partial_cmp(&y))
            .unwrap_or(Ordering::Equal),
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        // Nulls sort last.
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Null, _) => Ordering::Greater,
        (_, Value::Null) => Ordering::Less,
        _ => Ordering::Equal,
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum LikeToken {
    AnyRun,
    AnyChar,
    Literal(char),
}

fn like_tokens(pattern: &str) -> Vec<LikeToken> {
    let mut tokens = Vec::new();
    let mut chars = pattern.chars();
    while let Some(c) = chars.next() {
        tokens.push(match c {
            '%' => LikeToken::AnyRun,
            '_' => LikeToken::AnyChar,
            '\\' => LikeToken::Literal(chars.next().unwrap_or('\\')),
            c => LikeToken::Literal(c),
        });
    }
    tokens
}

/// Case-insensitive `ILIKE`: `%` matches any run, `_` one character, and
/// `\` makes the next character literal.
fn ilike(text: &str, pattern: &str) -> bool {
    let text: Vec<char> = text.to_lowercase().chars().collect();
    let tokens = like_tokens(&pattern.to_lowercase());

    let (mut t, mut p) = (0, 0);
    // Last `%` seen and the text position it currently absorbs up to.
    let mut resume: Option<(usize, usize)> = None;
    while t < text.len() {
        match tokens.get(p) {
            Some(LikeToken::AnyRun) => {
                resume = Some((p, t));
                p += 1;
                continue;
            }
            Some(LikeToken::AnyChar) => {
                t += 1;
                p += 1;
                continue;
            }
            Some(LikeToken::Literal(c)) if *c == text[t] => {
                t += 1;
                p += 1;
                continue;
            }
            _ => {}
        }
        match resume {
            Some((star, absorbed)) => {
                p = star + 1;
                t = absorbed + 1;
                resume = Some((star, absorbed + 1));
            }
            None => return false,
        }
    }
    tokens[p..].iter().all(|token| *token == LikeToken::AnyRun)
}
