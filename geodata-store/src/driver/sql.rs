//! The relational-SQL driver, parameterised by platform dialect.

use std::collections::HashMap;
use std::fmt;

use serde::Deserialize;
use serde_json::Value;

use crate::driver::platform::{platform_syntax, spatial_syntax, PlatformSyntax, SpatialSyntax};
use crate::driver::{sql_literal, Connection, Driver, Geographic, Mappable, Row};
use crate::error::StoreError;
use crate::query::SelectBuilder;

/// One lookup-table join the [`Mappable`] capability can resolve through.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct ThroughMapping {
    /// Intermediate table.
    pub table: String,
    /// Column matched against the source id.
    pub source_column: String,
    /// Column whose value is returned.
    pub target_column: String,
}

/// Driver for relational platforms with a dialect-table entry.
///
/// One instance serves one table over one connection. The spatial
/// capability is present exactly when the platform has a row in the
/// spatial dispatch table; the lookup-join capability is present when at
/// least one [`ThroughMapping`] is configured.
pub struct SqlDriver {
    connection: Box<dyn Connection>,
    platform: &'static PlatformSyntax,
    spatial: Option<&'static SpatialSyntax>,
    table: String,
    unique_id: String,
    mappings: HashMap<String, ThroughMapping>,
}

impl fmt::Debug for SqlDriver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqlDriver")
            .field("platform", &self.platform.name)
            .field("table", &self.table)
            .field("unique_id", &self.unique_id)
            .finish_non_exhaustive()
    }
}

impl SqlDriver {
    /// Build a driver for the named platform.
    ///
    /// An unrecognised platform name is a configuration error, surfaced at
    /// startup rather than as malformed SQL later.
    pub fn new(
        connection: Box<dyn Connection>,
        platform_name: &str,
        table: impl Into<String>,
        unique_id: impl Into<String>,
    ) -> Result<Self, StoreError> {
        let platform = platform_syntax(platform_name)
            .ok_or_else(|| StoreError::UnknownPlatform(platform_name.to_string()))?;
        Ok(Self {
            connection,
            platform,
            spatial: spatial_syntax(platform_name),
            table: table.into(),
            unique_id: unique_id.into(),
            mappings: HashMap::new(),
        })
    }

    /// Attach lookup-table mappings, enabling the [`Mappable`] capability.
    #[must_use]
    pub fn with_mappings(mut self, mappings: HashMap<String, ThroughMapping>) -> Self {
        self.mappings = mappings;
        self
    }

    fn spatial(&self) -> Result<&'static SpatialSyntax, StoreError> {
        self.spatial.ok_or(StoreError::UnsupportedCapability {
            capability: "spatial SQL",
        })
    }

    fn fetch_scalar(&self, sql: &str, operation: &'static str) -> Result<Option<Value>, StoreError> {
        log::debug!("{operation}: {sql}");
        self.connection
            .fetch_scalar(sql)
            .map_err(StoreError::persistence(operation))
    }
}

impl Driver for SqlDriver {
    fn connection(&self) -> &dyn Connection {
        self.connection.as_ref()
    }

    fn platform_name(&self) -> &str {
        self.platform.name
    }

    fn table_name(&self) -> &str {
        &self.table
    }

    fn unique_id(&self) -> &str {
        &self.unique_id
    }

    fn table_fields(&self) -> Result<Vec<String>, StoreError> {
        let sql = (self.platform.columns_query)(&self.table);
        let rows = self
            .connection
            .fetch_rows(&sql)
            .map_err(StoreError::persistence("introspect columns"))?;
        Ok(rows
            .iter()
            .filter_map(|row| row.values().next())
            .filter_map(Value::as_str)
            .map(str::to_lowercase)
            .collect())
    }

    fn select_builder(&self, columns: &[String], extra: &[String]) -> SelectBuilder {
        let mut selected: Vec<String> = columns.to_vec();
        selected.extend(extra.iter().cloned());
        SelectBuilder::new(&self.table, selected, self.platform.limit_clause)
    }

    fn last_insert_id(&self) -> Result<i64, StoreError> {
        let sql = (self.platform.last_insert_id_query)(&self.table, &self.unique_id);
        let value = self.fetch_scalar(&sql, "fetch last insert id")?;
        value.as_ref().and_then(value_to_id).ok_or_else(|| {
            StoreError::Persistence {
                operation: "fetch last insert id",
                source: crate::driver::ConnectionError::new("backend returned no identity"),
            }
        })
    }

    fn insert_row(&self, data: &Row) -> Result<(), StoreError> {
        let columns: Vec<&str> = data.keys().map(String::as_str).collect();
        let values: Vec<String> = data
            .values()
            .map(|v| sql_literal(self.connection.as_ref(), v))
            .collect();
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            self.table,
            columns.join(", "),
            values.join(", ")
        );
        log::debug!("insert: {sql}");
        self.connection
            .execute(&sql)
            .map(|_| ())
            .map_err(StoreError::persistence("insert row"))
    }

    fn update_row(&self, data: &Row, id: i64) -> Result<u64, StoreError> {
        let assignments: Vec<String> = data
            .iter()
            .map(|(column, value)| {
                format!("{column} = {}", sql_literal(self.connection.as_ref(), value))
            })
            .collect();
        let sql = format!(
            "UPDATE {} SET {} WHERE {} = {id}",
            self.table,
            assignments.join(", "),
            self.unique_id
        );
        log::debug!("update: {sql}");
        self.connection
            .execute(&sql)
            .map_err(StoreError::persistence("update row"))
    }

    fn delete_row(&self, id: i64) -> Result<u64, StoreError> {
        let sql = format!("DELETE FROM {} WHERE {} = {id}", self.table, self.unique_id);
        log::debug!("delete: {sql}");
        self.connection
            .execute(&sql)
            .map_err(StoreError::persistence("delete row"))
    }

    fn table_sequence_name(&self) -> Result<Option<String>, StoreError> {
        let Some(query) = self.platform.sequence_name_query else {
            return Ok(None);
        };
        let sql = query(&self.table, &self.unique_id);
        let value = self.fetch_scalar(&sql, "resolve sequence name")?;
        Ok(value
            .as_ref()
            .and_then(Value::as_str)
            .and_then(sequence_from_default))
    }

    fn repair_sequence(&self) -> Result<Option<i64>, StoreError> {
        let Some(query) = self.platform.repair_sequence_query else {
            return Ok(None);
        };
        let Some(sequence) = self.table_sequence_name()? else {
            return Ok(None);
        };
        let sql = query(&sequence, &self.table, &self.unique_id);
        let value = self.fetch_scalar(&sql, "repair sequence")?;
        Ok(value.as_ref().and_then(value_to_id))
    }

    fn as_geographic(&self) -> Option<&dyn Geographic> {
        self.spatial.map(|_| self as &dyn Geographic)
    }

    fn as_mappable(&self) -> Option<&dyn Mappable> {
        if self.mappings.is_empty() {
            None
        } else {
            Some(self)
        }
    }
}

impl Geographic for SqlDriver {
    fn transform_ewkt(&self, ewkt: &str, target_srid: i32) -> Result<String, StoreError> {
        let syntax = self.spatial()?;
        let sql = (syntax.transform_query)(&self.connection.quote(ewkt), target_srid);
        let value = self.fetch_scalar(&sql, "transform geometry")?;
        value
            .as_ref()
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| StoreError::Persistence {
                operation: "transform geometry",
                source: crate::driver::ConnectionError::new("backend returned no geometry"),
            })
    }

    fn table_srid(&self, table: &str, geom_column: &str) -> Result<Option<i32>, StoreError> {
        let syntax = self.spatial()?;
        let sql = (syntax.srid_query)(table, geom_column);
        let value = self.fetch_scalar(&sql, "resolve SRID")?;
        Ok(value
            .as_ref()
            .and_then(value_to_id)
            .and_then(|srid| i32::try_from(srid).ok()))
    }

    fn table_geom_type(&self, table: &str, schema: &str) -> Result<Option<String>, StoreError> {
        let syntax = self.spatial()?;
        let Some(query) = syntax.geom_type_query else {
            return Ok(None);
        };
        let value = self.fetch_scalar(&query(table, schema), "resolve geometry type")?;
        Ok(value.as_ref().and_then(Value::as_str).map(str::to_string))
    }

    fn add_geometry_column(
        &self,
        table: &str,
        geometry_type: &str,
        srid: i32,
        column: &str,
        schema: &str,
        dimensions: u8,
    ) -> Result<bool, StoreError> {
        let syntax = self.spatial()?;
        let Some(ddl) = syntax.add_geometry_column else {
            log::warn!(
                "platform {} cannot add geometry columns; skipping",
                self.platform.name
            );
            return Ok(false);
        };
        let sql = ddl(table, geometry_type, srid, column, schema, dimensions);
        log::debug!("add geometry column: {sql}");
        self.connection
            .execute(&sql)
            .map(|_| true)
            .map_err(StoreError::persistence("add geometry column"))
    }
}

impl Mappable for SqlDriver {
    fn through_mapping(&self, mapping: &str, id: i64) -> Result<Option<Value>, StoreError> {
        let Some(through) = self.mappings.get(mapping) else {
            return Err(StoreError::InvalidInput(format!(
                "no mapping named {mapping:?} is configured"
            )));
        };
        let sql = format!(
            "SELECT {} FROM {} WHERE {} = {id}",
            through.target_column, through.table, through.source_column
        );
        self.fetch_scalar(&sql, "resolve through mapping")
    }
}

// A sequence-backed identity default reads
// `nextval('rivers_id_seq'::regclass)`; the name is the quoted segment.
fn sequence_from_default(default: &str) -> Option<String> {
    default.split('\'').nth(1).map(str::to_string)
}

fn value_to_id(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::MockConnection;
    use rstest::rstest;
    use serde_json::json;

    fn driver(platform: &str) -> (MockConnection, SqlDriver) {
        let connection = MockConnection::new();
        let driver = SqlDriver::new(Box::new(connection.clone()), platform, "rivers", "id")
            .expect("known platform");
        (connection, driver)
    }

    #[rstest]
    fn rejects_unknown_platform() {
        let connection = MockConnection::new();
        let result = SqlDriver::new(Box::new(connection), "sqlite", "rivers", "id");
        assert!(matches!(result, Err(StoreError::UnknownPlatform(_))));
    }

    #[rstest]
    fn insert_renders_columns_and_literals() {
        let (connection, driver) = driver("postgresql");
        connection.push_affected(1);
        let mut row = Row::new();
        row.insert("name".into(), json!("Elbe"));
        row.insert("length_km".into(), json!(1094));
        driver.insert_row(&row).unwrap();
        assert_eq!(
            connection.executed(),
            vec!["INSERT INTO rivers (name, length_km) VALUES ('Elbe', 1094)"]
        );
    }

    #[rstest]
    fn update_targets_the_identity() {
        let (connection, driver) = driver("postgresql");
        connection.push_affected(1);
        let mut row = Row::new();
        row.insert("name".into(), json!("Elbe"));
        assert_eq!(driver.update_row(&row, 7).unwrap(), 1);
        assert_eq!(
            connection.executed(),
            vec!["UPDATE rivers SET name = 'Elbe' WHERE id = 7"]
        );
    }

    #[rstest]
    fn last_insert_id_uses_the_platform_query() {
        let (connection, driver) = driver("postgresql");
        connection.push_scalar(Some(json!(12)));
        assert_eq!(driver.last_insert_id().unwrap(), 12);
        assert_eq!(connection.executed(), vec!["SELECT LASTVAL()"]);
    }

    #[rstest]
    fn oracle_last_insert_id_queries_the_sequence() {
        let (connection, driver) = driver("oracle");
        connection.push_scalar(Some(json!("3")));
        assert_eq!(driver.last_insert_id().unwrap(), 3);
        assert_eq!(connection.executed(), vec!["SELECT RIVERS_SEQ.CURRVAL FROM DUAL"]);
    }

    #[rstest]
    fn table_fields_lowercases_oracle_columns() {
        let (connection, driver) = driver("oracle");
        connection.push_rows(vec![
            json!({"COLUMN_NAME": "ID"}).as_object().unwrap().clone(),
            json!({"COLUMN_NAME": "NAME"}).as_object().unwrap().clone(),
        ]);
        assert_eq!(driver.table_fields().unwrap(), vec!["id", "name"]);
    }

    #[rstest]
    fn sequence_name_is_parsed_from_the_column_default() {
        let (connection, driver) = driver("postgresql");
        connection.push_scalar(Some(json!("nextval('rivers_id_seq'::regclass)")));
        assert_eq!(
            driver.table_sequence_name().unwrap().as_deref(),
            Some("rivers_id_seq")
        );
        assert_eq!(
            connection.executed(),
            vec![
                "SELECT column_default FROM information_schema.columns \
                 WHERE table_name = 'rivers' AND column_name = 'id'"
            ]
        );
    }

    #[rstest]
    fn repair_sequence_resets_to_the_highest_identity() {
        let (connection, driver) = driver("postgresql");
        connection.push_scalar(Some(json!("nextval('rivers_id_seq'::regclass)")));
        connection.push_scalar(Some(json!(41)));
        assert_eq!(driver.repair_sequence().unwrap(), Some(41));
        assert_eq!(
            connection.executed()[1],
            "SELECT setval('rivers_id_seq', (SELECT MAX(id) FROM rivers))"
        );
    }

    #[rstest]
    fn oracle_has_no_repairable_sequence() {
        let (connection, driver) = driver("oracle");
        assert_eq!(driver.repair_sequence().unwrap(), None);
        assert!(connection.executed().is_empty());
    }

    #[rstest]
    fn known_platforms_expose_the_geographic_capability() {
        let (_connection, driver) = driver("postgresql");
        assert!(driver.as_geographic().is_some());
    }

    #[rstest]
    fn transform_ewkt_round_trips_through_the_backend() {
        let (connection, driver) = driver("postgresql");
        connection.push_scalar(Some(json!("POINT(370000 5700000)")));
        let wkt = driver
            .transform_ewkt("SRID=4326;POINT(1 2)", 25832)
            .unwrap();
        assert_eq!(wkt, "POINT(370000 5700000)");
        assert_eq!(
            connection.executed(),
            vec!["SELECT ST_ASTEXT(ST_TRANSFORM(ST_GEOMFROMEWKT('SRID=4326;POINT(1 2)'),25832))"]
        );
    }

    #[rstest]
    fn oracle_geometry_ddl_degrades_to_false() {
        let (connection, driver) = driver("oracle");
        let added = driver
            .add_geometry_column("rivers", "POINT", 4326, "geom", "public", 2)
            .unwrap();
        assert!(!added);
        assert!(connection.executed().is_empty());
    }

    #[rstest]
    fn mappable_capability_requires_configured_mappings() {
        let (_connection, driver) = driver("postgresql");
        assert!(driver.as_mappable().is_none());

        let connection = MockConnection::new();
        let driver = SqlDriver::new(Box::new(connection.clone()), "postgresql", "rivers", "id")
            .unwrap()
            .with_mappings(HashMap::from([(
                "basin".to_string(),
                ThroughMapping {
                    table: "river_basins".into(),
                    source_column: "river_id".into(),
                    target_column: "basin_id".into(),
                },
            )]));
        assert!(driver.as_mappable().is_some());

        connection.push_scalar(Some(json!(9)));
        let value = driver.through_mapping("basin", 7).unwrap();
        assert_eq!(value, Some(json!(9)));
        assert_eq!(
            connection.executed(),
            vec!["SELECT basin_id FROM river_basins WHERE river_id = 7"]
        );
    }
}
