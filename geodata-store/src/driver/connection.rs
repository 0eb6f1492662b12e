//! Opaque backend connection contract.
//!
//! The actual PostgreSQL/Oracle client crates stay outside this crate;
//! hosts adapt whatever handle their connection pool hands out. The
//! handle is shared with the pool, so its lifetime is the pool's, not
//! the store's.

use serde_json::{Map, Value};
use thiserror::Error;

/// A single result row: column name to value, in select order.
pub type Row = Map<String, Value>;

/// Opaque failure reported by a backend connection.
///
/// Adapters flatten their native error types into a message; the store
/// layer never inspects backend specifics.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct ConnectionError {
    message: String,
}

impl ConnectionError {
    /// Wrap a backend failure.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// The connection handle a driver owns.
///
/// Implementations execute raw SQL synchronously on the calling thread;
/// there is no cancellation or timeout model beyond what the backend
/// already provides.
pub trait Connection {
    /// Run a query and collect all result rows.
    fn fetch_rows(&self, sql: &str) -> Result<Vec<Row>, ConnectionError>;

    /// Run a query and return the first column of the first row, if any.
    fn fetch_scalar(&self, sql: &str) -> Result<Option<Value>, ConnectionError>;

    /// Run a statement and return the number of affected rows.
    fn execute(&self, sql: &str) -> Result<u64, ConnectionError>;

    /// Quote a text literal for inline use in SQL.
    fn quote(&self, text: &str) -> String {
        format!("'{}'", text.replace('\'', "''"))
    }
}

/// Render a JSON value as an inline SQL literal.
pub(crate) fn sql_literal(connection: &dyn Connection, value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Bool(true) => "TRUE".to_string(),
        Value::Bool(false) => "FALSE".to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => connection.quote(s),
        other => connection.quote(&other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::MockConnection;
    use rstest::rstest;
    use serde_json::json;

    #[rstest]
    #[case(json!(null), "NULL")]
    #[case(json!(true), "TRUE")]
    #[case(json!(42), "42")]
    #[case(json!(1.5), "1.5")]
    #[case(json!("it's"), "'it''s'")]
    #[case(json!(["a"]), "'[\"a\"]'")]
    fn renders_sql_literals(#[case] value: Value, #[case] expected: &str) {
        let connection = MockConnection::new();
        assert_eq!(sql_literal(&connection, &value), expected);
    }
}
