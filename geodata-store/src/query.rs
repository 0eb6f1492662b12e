//! Minimal select-statement builder.
//!
//! Drivers seed a builder with the allowed columns and table; stores
//! accumulate AND-joined predicates and a row cap on top, then execute
//! through the driver's connection.

use crate::driver::{Connection, ConnectionError, Row};

/// A `SELECT ... FROM <table> t` statement under construction.
#[derive(Debug, Clone)]
pub struct SelectBuilder {
    columns: Vec<String>,
    table: String,
    conditions: Vec<String>,
    max_results: Option<usize>,
    limit_clause: fn(usize) -> String,
}

impl SelectBuilder {
    pub(crate) fn new(
        table: impl Into<String>,
        columns: Vec<String>,
        limit_clause: fn(usize) -> String,
    ) -> Self {
        Self {
            columns,
            table: table.into(),
            conditions: Vec::new(),
            max_results: None,
            limit_clause,
        }
    }

    /// AND another predicate into the statement. No predicates at all means
    /// no `WHERE` clause.
    pub fn where_and(&mut self, condition: impl Into<String>) -> &mut Self {
        self.conditions.push(condition.into());
        self
    }

    /// Cap the number of returned rows using the platform's limit clause.
    pub fn max_results(&mut self, max_results: usize) -> &mut Self {
        self.max_results = Some(max_results);
        self
    }

    /// Render the statement.
    pub fn sql(&self) -> String {
        let columns = if self.columns.is_empty() {
            "*".to_string()
        } else {
            self.columns.join(", ")
        };
        let mut sql = format!("SELECT {columns} FROM {} t", self.table);
        if !self.conditions.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&self.conditions.join(" AND "));
        }
        if let Some(max) = self.max_results {
            sql.push(' ');
            sql.push_str(&(self.limit_clause)(max));
        }
        sql
    }

    /// Execute against a connection and collect the rows.
    pub fn fetch(&self, connection: &dyn Connection) -> Result<Vec<Row>, ConnectionError> {
        let sql = self.sql();
        log::debug!("select: {sql}");
        connection.fetch_rows(&sql)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn limit(max: usize) -> String {
        format!("LIMIT {max}")
    }

    #[rstest]
    fn renders_bare_select_without_where() {
        let builder = SelectBuilder::new("rivers", vec!["id".into(), "name".into()], limit);
        assert_eq!(builder.sql(), "SELECT id, name FROM rivers t");
    }

    #[rstest]
    fn joins_predicates_with_and() {
        let mut builder = SelectBuilder::new("rivers", vec!["id".into()], limit);
        builder
            .where_and("status = 'active'")
            .where_and("region = 'EU'")
            .max_results(5);
        assert_eq!(
            builder.sql(),
            "SELECT id FROM rivers t WHERE status = 'active' AND region = 'EU' LIMIT 5"
        );
    }

    #[rstest]
    fn falls_back_to_star_without_columns() {
        let builder = SelectBuilder::new("rivers", Vec::new(), limit);
        assert_eq!(builder.sql(), "SELECT * FROM rivers t");
    }
}
