//! Template execution against a record store

use std::sync::Arc;

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use serde_json::Value;
use tracing::debug;

use crate::error::{Error, Result};

use super::params::{ParamValue, ParameterSet};
use super::templates::{ParamType, QueryTemplate};

/// A value bound to a named placeholder
#[derive(Debug, Clone, PartialEq)]
pub enum SqlParam {
    Text(String),
    Integer(i64),
    Null,
}

/// One result row: column name → JSON scalar, in select order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultRow {
    columns: Vec<(String, Value)>,
}

impl ResultRow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, column: impl Into<String>, value: Value) {
        self.columns.push((column.into(), value));
    }

    pub fn with(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.push(column, value.into());
        self
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.columns
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, v)| v)
    }

    pub fn f64(&self, column: &str) -> Option<f64> {
        self.get(column).and_then(Value::as_f64)
    }

    pub fn i64(&self, column: &str) -> Option<i64> {
        self.get(column).and_then(|v| v.as_i64().or_else(|| v.as_f64().map(|f| f as i64)))
    }

    pub fn str(&self, column: &str) -> Option<&str> {
        self.get(column).and_then(Value::as_str)
    }

    pub fn columns(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.columns.iter().map(|(n, v)| (n.as_str(), v))
    }
}

impl Serialize for ResultRow {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.columns.len()))?;
        for (name, value) in &self.columns {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

/// Read-only access to expense records through pre-vetted templates
///
/// The SQL is always a `'static` template body; callers can only vary the
/// bound values.
pub trait RecordStore: Send + Sync {
    fn run_template(&self, sql: &'static str, params: &[(&str, SqlParam)]) -> Result<Vec<ResultRow>>;
}

/// Rows returned for one template run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryResult {
    pub template_id: &'static str,
    pub rows: Vec<ResultRow>,
    pub row_count: usize,
}

/// Binds a validated parameter set into its template and runs it
#[derive(Clone)]
pub struct QueryExecutor {
    store: Arc<dyn RecordStore>,
}

impl QueryExecutor {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    pub fn execute(&self, template: &'static QueryTemplate, params: &ParameterSet) -> Result<QueryResult> {
        let bindings = bind(template, params)?;
        let named: Vec<(&str, SqlParam)> = bindings
            .iter()
            .map(|(name, value)| (name.as_str(), value.clone()))
            .collect();

        debug!(template = template.id, params = %params.summary(), "Executing query template");

        let rows = self
            .store
            .run_template(template.sql, &named)
            .map_err(|e| match e {
                Error::Execution(_) => e,
                other => Error::Execution(other.to_string()),
            })?;

        Ok(QueryResult {
            template_id: template.id,
            row_count: rows.len(),
            rows,
        })
    }
}

/// Placeholder bindings for a template, `:today` included
fn bind(template: &QueryTemplate, params: &ParameterSet) -> Result<Vec<(String, SqlParam)>> {
    if params.intent != template.intent {
        return Err(Error::Execution(format!(
            "parameters for intent '{}' do not fit template {}",
            params.intent, template.id
        )));
    }

    let mut bindings = Vec::with_capacity(template.params.len() + 1);
    for spec in template.params {
        let value = match (params.get(spec.name), spec.kind) {
            (Some(ParamValue::Category(c)), ParamType::Category) => {
                SqlParam::Text(c.as_str().to_string())
            }
            (Some(ParamValue::Integer(n)), ParamType::Days | ParamType::Limit) => {
                SqlParam::Integer(n)
            }
            (Some(other), _) => {
                return Err(Error::Execution(format!(
                    "parameter '{}' has the wrong type ({})",
                    spec.name, other
                )))
            }
            (None, _) if spec.required || spec.default.is_some() => {
                return Err(Error::Execution(format!(
                    "parameter '{}' missing for template {}",
                    spec.name, template.id
                )))
            }
            (None, _) => SqlParam::Null,
        };
        bindings.push((format!(":{}", spec.name), value));
    }
    bindings.push((
        ":today".to_string(),
        SqlParam::Text(params.reference_date.format("%Y-%m-%d").to_string()),
    ));
    Ok(bindings)
}
