//! Store configuration.
//!
//! Configuration is an explicit, enumerated struct per store kind;
//! unknown keys are rejected at deserialisation time rather than silently
//! ignored. Lifecycle hook bodies are deliberately not configuration:
//! hooks are registered as callbacks on the store (see
//! [`super::events::HookRegistry`]).

use std::collections::HashMap;

use serde::Deserialize;

use crate::driver::ThroughMapping;

fn default_connection() -> String {
    "default".to_string()
}

fn default_unique_id() -> String {
    "id".to_string()
}

fn default_geom_field() -> String {
    "geom".to_string()
}

/// Configuration for a plain [`super::DataStore`].
///
/// # Examples
/// ```
/// use geodata_store::DataStoreConfig;
///
/// let config: DataStoreConfig = serde_json::from_value(serde_json::json!({
///     "table": "rivers",
///     "sqlFilter": "status = 'active'",
/// })).unwrap();
/// assert_eq!(config.unique_id, "id");
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct DataStoreConfig {
    /// Target table.
    pub table: String,
    /// Backend selector name, resolved by the host's connection registry.
    #[serde(default = "default_connection")]
    pub connection: String,
    /// Explicit column allow-list; empty means "all driver-reported columns".
    #[serde(default)]
    pub fields: Vec<String>,
    /// Identity column name.
    #[serde(default = "default_unique_id")]
    pub unique_id: String,
    /// Permanent predicate ANDed into every search.
    #[serde(default)]
    pub sql_filter: Option<String>,
    /// Lookup-table joins resolvable through the Mappable capability.
    #[serde(default)]
    pub mappings: HashMap<String, ThroughMapping>,
}

impl DataStoreConfig {
    /// Minimal configuration for the given table.
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            connection: default_connection(),
            fields: Vec::new(),
            unique_id: default_unique_id(),
            sql_filter: None,
            mappings: HashMap::new(),
        }
    }

    /// Replace the column allow-list.
    #[must_use]
    pub fn with_fields(mut self, fields: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.fields = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Set the identity column.
    #[must_use]
    pub fn with_unique_id(mut self, unique_id: impl Into<String>) -> Self {
        self.unique_id = unique_id.into();
        self
    }

    /// Set the permanent search filter.
    #[must_use]
    pub fn with_sql_filter(mut self, sql_filter: impl Into<String>) -> Self {
        self.sql_filter = Some(sql_filter.into());
        self
    }
}

/// Configuration for a [`super::FeatureStore`].
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct FeatureStoreConfig {
    /// Target table.
    pub table: String,
    /// Backend selector name, resolved by the host's connection registry.
    #[serde(default = "default_connection")]
    pub connection: String,
    /// Explicit column allow-list; empty means "all driver-reported columns
    /// except the geometry column".
    #[serde(default)]
    pub fields: Vec<String>,
    /// Identity column name.
    #[serde(default = "default_unique_id")]
    pub unique_id: String,
    /// Permanent predicate ANDed into every search.
    #[serde(default)]
    pub sql_filter: Option<String>,
    /// Lookup-table joins resolvable through the Mappable capability.
    #[serde(default)]
    pub mappings: HashMap<String, ThroughMapping>,
    /// Geometry column name.
    #[serde(default = "default_geom_field")]
    pub geom_field: String,
    /// Coordinate reference system; `None` resolves lazily from the table's
    /// spatial metadata.
    #[serde(default)]
    pub srid: Option<i32>,
}

impl FeatureStoreConfig {
    /// Minimal configuration for the given table.
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            connection: default_connection(),
            fields: Vec::new(),
            unique_id: default_unique_id(),
            sql_filter: None,
            mappings: HashMap::new(),
            geom_field: default_geom_field(),
            srid: None,
        }
    }

    /// Replace the column allow-list.
    #[must_use]
    pub fn with_fields(mut self, fields: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.fields = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Set the geometry column.
    #[must_use]
    pub fn with_geom_field(mut self, geom_field: impl Into<String>) -> Self {
        self.geom_field = geom_field.into();
        self
    }

    /// Pin the coordinate reference system, skipping metadata lookup.
    #[must_use]
    pub fn with_srid(mut self, srid: i32) -> Self {
        self.srid = Some(srid);
        self
    }

    /// Set the permanent search filter.
    #[must_use]
    pub fn with_sql_filter(mut self, sql_filter: impl Into<String>) -> Self {
        self.sql_filter = Some(sql_filter.into());
        self
    }

    pub(crate) fn as_data_config(&self) -> DataStoreConfig {
        DataStoreConfig {
            table: self.table.clone(),
            connection: self.connection.clone(),
            fields: self.fields.clone(),
            unique_id: self.unique_id.clone(),
            sql_filter: self.sql_filter.clone(),
            mappings: self.mappings.clone(),
        }
    }
}
