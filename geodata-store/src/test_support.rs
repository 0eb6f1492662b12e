//! Scripted connection double for driver and store tests.
//!
//! Responses are queued ahead of the call under test and consumed in
//! order; every statement the code under test issues is recorded so
//! assertions can check the exact SQL. Enabled for this crate's own
//! tests and, behind the `test-support` feature, for downstream test
//! suites.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use serde_json::Value;

use crate::driver::{Connection, ConnectionError, Row};

#[derive(Debug)]
enum MockResponse {
    Rows(Vec<Row>),
    Scalar(Option<Value>),
    Affected(u64),
    Failure(String),
}

#[derive(Debug, Default)]
struct State {
    responses: RefCell<VecDeque<MockResponse>>,
    executed: RefCell<Vec<String>>,
}

/// An in-memory [`Connection`] that replays queued responses.
///
/// Clones share state, so a test can keep one handle for scripting and
/// assertions while the driver owns another.
#[derive(Debug, Clone, Default)]
pub struct MockConnection {
    state: Rc<State>,
}

impl MockConnection {
    /// A connection with an empty script.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a row set for the next `fetch_rows`.
    pub fn push_rows(&self, rows: Vec<Row>) {
        self.push(MockResponse::Rows(rows));
    }

    /// Queue a scalar for the next `fetch_scalar`.
    pub fn push_scalar(&self, value: Option<Value>) {
        self.push(MockResponse::Scalar(value));
    }

    /// Queue an affected-row count for the next `execute`.
    pub fn push_affected(&self, affected: u64) {
        self.push(MockResponse::Affected(affected));
    }

    /// Queue a backend failure for the next call of any kind.
    pub fn push_failure(&self, message: &str) {
        self.push(MockResponse::Failure(message.to_string()));
    }

    /// Every statement issued so far, in order.
    pub fn executed(&self) -> Vec<String> {
        self.state.executed.borrow().clone()
    }

    fn push(&self, response: MockResponse) {
        self.state.responses.borrow_mut().push_back(response);
    }

    fn next(&self, sql: &str, expected: &'static str) -> Result<MockResponse, ConnectionError> {
        self.state.executed.borrow_mut().push(sql.to_string());
        let response = self
            .state
            .responses
            .borrow_mut()
            .pop_front()
            .ok_or_else(|| {
                ConnectionError::new(format!("no scripted response for {expected}: {sql}"))
            })?;
        if let MockResponse::Failure(message) = response {
            return Err(ConnectionError::new(message));
        }
        Ok(response)
    }
}

impl Connection for MockConnection {
    fn fetch_rows(&self, sql: &str) -> Result<Vec<Row>, ConnectionError> {
        match self.next(sql, "fetch_rows")? {
            MockResponse::Rows(rows) => Ok(rows),
            other => Err(mismatch("fetch_rows", &other, sql)),
        }
    }

    fn fetch_scalar(&self, sql: &str) -> Result<Option<Value>, ConnectionError> {
        match self.next(sql, "fetch_scalar")? {
            MockResponse::Scalar(value) => Ok(value),
            other => Err(mismatch("fetch_scalar", &other, sql)),
        }
    }

    fn execute(&self, sql: &str) -> Result<u64, ConnectionError> {
        match self.next(sql, "execute")? {
            MockResponse::Affected(affected) => Ok(affected),
            other => Err(mismatch("execute", &other, sql)),
        }
    }
}

fn mismatch(called: &str, got: &MockResponse, sql: &str) -> ConnectionError {
    ConnectionError::new(format!(
        "scripted response {got:?} does not match {called} call: {sql}"
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    #[rstest]
    fn replays_responses_in_order() {
        let connection = MockConnection::new();
        connection.push_scalar(Some(json!(1)));
        connection.push_affected(2);
        assert_eq!(connection.fetch_scalar("SELECT 1").unwrap(), Some(json!(1)));
        assert_eq!(connection.execute("DELETE FROM t").unwrap(), 2);
        assert_eq!(connection.executed(), vec!["SELECT 1", "DELETE FROM t"]);
    }

    #[rstest]
    fn exhausted_script_is_an_error() {
        let connection = MockConnection::new();
        assert!(connection.fetch_rows("SELECT *").is_err());
    }

    #[rstest]
    fn scripted_failures_surface_as_errors() {
        let connection = MockConnection::new();
        connection.push_failure("connection reset");
        let error = connection.execute("DELETE FROM t").unwrap_err();
        assert!(error.to_string().contains("connection reset"));
    }
}
