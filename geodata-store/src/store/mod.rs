//! Store orchestration: criteria in, records out.
//!
//! A store owns one driver, translates search/save/remove requests into
//! driver calls, runs the cancellable lifecycle hooks around writes, and
//! converts result rows back into records. Stores are synchronous and not
//! thread-safe; concurrent callers use independent instances over a shared
//! connection pool.

use std::cell::OnceCell;
use std::fmt;

use geodata_core::Record;
use serde_json::Value;

use crate::driver::{Connection, Driver, Row, SqlDriver};
use crate::error::StoreError;

pub mod config;
pub mod criteria;
pub mod events;
mod feature;

pub use config::{DataStoreConfig, FeatureStoreConfig};
pub use criteria::{ReturnType, SearchCriteria, DEFAULT_MAX_RESULTS};
pub use events::{HookContext, HookRegistry, StoreEvent};
pub use feature::{to_feature_collection, FeatureStore, SearchResult};

/// What `save` hands back: persistence failures are data, not faults.
#[derive(Debug)]
pub enum SaveOutcome<T> {
    /// The entity was persisted (or the write was vetoed by a hook). The
    /// re-fetched row is `None` when no identity exists to fetch by, or when
    /// the row vanished between insert and re-fetch; that window is an
    /// accepted race, not a handled failure mode.
    Saved(Option<T>),
    /// The lifecycle failed; the caller gets the error together with the
    /// in-flight entity and the original input.
    Failed(SaveFailure<T>),
}

/// The failure half of a [`SaveOutcome`].
#[derive(Debug)]
pub struct SaveFailure<T> {
    /// What went wrong.
    pub error: StoreError,
    /// The entity that was being processed.
    pub entity: T,
    /// The caller's original input.
    pub input: Value,
}

/// CRUD and search over one relational table without geometry concerns.
pub struct DataStore {
    driver: Box<dyn Driver>,
    fields: Vec<String>,
    sql_filter: Option<String>,
    hooks: HookRegistry,
    introspected_fields: OnceCell<Vec<String>>,
}

impl fmt::Debug for DataStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataStore")
            .field("table", &self.driver.table_name())
            .field("platform", &self.driver.platform_name())
            .field("fields", &self.fields)
            .finish_non_exhaustive()
    }
}

impl DataStore {
    /// Open a store over a [`SqlDriver`] for the configured platform.
    pub fn open(
        connection: Box<dyn Connection>,
        platform_name: &str,
        config: &DataStoreConfig,
    ) -> Result<Self, StoreError> {
        let driver = SqlDriver::new(connection, platform_name, &config.table, &config.unique_id)?
            .with_mappings(config.mappings.clone());
        Ok(Self::with_driver(Box::new(driver), config))
    }

    /// Wrap an existing driver.
    pub fn with_driver(driver: Box<dyn Driver>, config: &DataStoreConfig) -> Self {
        Self {
            driver,
            fields: config.fields.clone(),
            sql_filter: config.sql_filter.clone(),
            hooks: HookRegistry::default(),
            introspected_fields: OnceCell::new(),
        }
    }

    /// The owned driver.
    pub fn driver(&self) -> &dyn Driver {
        self.driver.as_ref()
    }

    /// Identity column name.
    pub fn unique_id(&self) -> &str {
        self.driver.unique_id()
    }

    /// Target table.
    pub fn table_name(&self) -> &str {
        self.driver.table_name()
    }

    /// Register a lifecycle hook.
    pub fn on(&mut self, event: StoreEvent, hook: impl Fn(&mut HookContext<'_>) + 'static) {
        self.hooks.on(event, hook);
    }

    pub(crate) fn hooks(&self) -> &HookRegistry {
        &self.hooks
    }

    pub(crate) fn sql_filter(&self) -> Option<&str> {
        self.sql_filter.as_deref()
    }

    /// The effective column allow-list: the configured one, or the
    /// driver-introspected columns when none is configured (resolved once
    /// per store instance).
    pub fn resolved_fields(&self) -> Result<&[String], StoreError> {
        if !self.fields.is_empty() {
            return Ok(&self.fields);
        }
        if let Some(fields) = self.introspected_fields.get() {
            return Ok(fields);
        }
        let fields = self.driver.table_fields()?;
        Ok(self.introspected_fields.get_or_init(|| fields))
    }

    /// Columns selected by reads: the allow-list plus the identity column.
    pub(crate) fn select_columns(&self) -> Result<Vec<String>, StoreError> {
        let fields = self.resolved_fields()?;
        let unique_id = self.driver.unique_id();
        let mut columns = Vec::with_capacity(fields.len() + 1);
        if !fields.iter().any(|field| field == unique_id) {
            columns.push(unique_id.to_string());
        }
        columns.extend(fields.iter().cloned());
        Ok(columns)
    }

    /// Wrap caller input into a record bound to this store's identity
    /// column.
    pub fn create(&self, raw: &Value) -> Result<Record, StoreError> {
        Record::from_value(raw, self.driver.unique_id(), false).map_err(Into::into)
    }

    /// Search records. The permanent `sql_filter` is ANDed with whatever the
    /// caller supplies; no predicates at all means no `WHERE` clause.
    ///
    /// Geometry criteria (`intersect_geometry`, `source`/`distance`,
    /// `srid`, `return_type`) only make sense on a [`FeatureStore`] and are
    /// rejected here rather than silently ignored.
    pub fn search(&self, criteria: &SearchCriteria) -> Result<Vec<Record>, StoreError> {
        if criteria.intersect_geometry.is_some()
            || criteria.source.is_some()
            || criteria.distance.is_some()
            || criteria.srid.is_some()
            || criteria.return_type.is_some()
        {
            return Err(StoreError::InvalidInput(
                "geometry criteria require a feature store".to_string(),
            ));
        }
        let columns = self.select_columns()?;
        let mut builder = self.driver.select_builder(&columns, &[]);
        if let Some(filter) = &self.sql_filter {
            builder.where_and(filter.clone());
        }
        if let Some(predicate) = &criteria.where_clause {
            builder.where_and(predicate.clone());
        }
        builder.max_results(criteria.max_results.unwrap_or(DEFAULT_MAX_RESULTS));
        let rows = builder
            .fetch(self.driver.connection())
            .map_err(StoreError::persistence("search"))?;
        self.prepare_results(rows)
    }

    /// Fetch a single record by identity.
    pub fn get_by_id(&self, id: i64) -> Result<Option<Record>, StoreError> {
        let columns = self.select_columns()?;
        let mut builder = self.driver.select_builder(&columns, &[]);
        builder.where_and(format!("{} = {id}", self.driver.unique_id()));
        let rows = builder
            .fetch(self.driver.connection())
            .map_err(StoreError::persistence("get by id"))?;
        Ok(self.prepare_results(rows)?.into_iter().next())
    }

    /// Persist caller input, dispatching to insert or update.
    ///
    /// Lifecycle and persistence failures are caught and returned inside
    /// the [`SaveOutcome`]; only malformed input errors out directly. On
    /// success the persisted row is re-fetched by identity so callers see
    /// server-computed defaults. Insert, identity retrieval, and the
    /// re-fetch are three separate statements without a transaction.
    pub fn save(&self, data: &Value, auto_update: bool) -> Result<SaveOutcome<Record>, StoreError> {
        let record = self.create(data)?;
        match self.save_record(record.clone(), auto_update) {
            Ok(saved) => Ok(SaveOutcome::Saved(saved)),
            Err(error) => Ok(SaveOutcome::Failed(SaveFailure {
                error,
                entity: record,
                input: data.clone(),
            })),
        }
    }

    fn save_record(&self, record: Record, auto_update: bool) -> Result<Option<Record>, StoreError> {
        let mut snapshot = record.to_map();
        let allowed = self.hooks.dispatch(StoreEvent::BeforeSave, &mut snapshot, &record);
        let record = if allowed {
            if !auto_update || !record.has_id() {
                self.insert_record(record)?
            } else {
                self.update_record(record)?
            }
        } else {
            record
        };
        self.hooks.dispatch(StoreEvent::AfterSave, &mut snapshot, &record);
        match record.id() {
            Some(id) => self.get_by_id(id),
            None => Ok(None),
        }
    }

    /// Insert caller input as a new row and assign the generated identity.
    pub fn insert(&self, data: &Value) -> Result<Record, StoreError> {
        let record = self.create(data)?;
        self.insert_record(record)
    }

    fn insert_record(&self, mut record: Record) -> Result<Record, StoreError> {
        let mut payload = self.write_payload(&record, true)?;
        let allowed = self.hooks.dispatch(StoreEvent::BeforeInsert, &mut payload, &record);
        let mut new_id = None;
        if allowed {
            self.driver.insert_row(&payload)?;
            new_id = Some(self.driver.last_insert_id()?);
        }
        record.set_id(new_id);
        self.hooks.dispatch(StoreEvent::AfterInsert, &mut payload, &record);
        Ok(record)
    }

    /// Update the row matching the input's identity.
    pub fn update(&self, data: &Value) -> Result<Record, StoreError> {
        let record = self.create(data)?;
        self.update_record(record)
    }

    fn update_record(&self, record: Record) -> Result<Record, StoreError> {
        let id = record
            .id()
            .ok_or_else(|| StoreError::InvalidInput("update requires an identity".to_string()))?;
        let mut payload = self.write_payload(&record, false)?;
        let allowed = self.hooks.dispatch(StoreEvent::BeforeUpdate, &mut payload, &record);
        if payload.is_empty() {
            return Err(StoreError::InvalidInput(
                "no criteria: update payload is empty after field filtering".to_string(),
            ));
        }
        if allowed {
            self.driver.update_row(&payload, id)?;
        }
        self.hooks.dispatch(StoreEvent::AfterUpdate, &mut payload, &record);
        Ok(record)
    }

    /// Delete the row with the given identity. Reports whether a row was
    /// actually removed.
    pub fn remove(&self, id: i64) -> Result<bool, StoreError> {
        Ok(self.driver.delete_row(id)? > 0)
    }

    /// Name of the sequence backing the identity column, if the platform
    /// records one.
    pub fn sequence_name(&self) -> Result<Option<String>, StoreError> {
        self.driver.table_sequence_name()
    }

    /// Reset the identity sequence to the table's highest identity.
    /// Platforms without a repairable sequence answer `None`.
    pub fn repair_sequence(&self) -> Result<Option<i64>, StoreError> {
        self.driver.repair_sequence()
    }

    /// Resolve a value through a configured lookup table.
    pub fn through_mapping(&self, mapping: &str, id: i64) -> Result<Option<Value>, StoreError> {
        let mappable = self
            .driver
            .as_mappable()
            .ok_or(StoreError::UnsupportedCapability {
                capability: "lookup-table joins",
            })?;
        mappable.through_mapping(mapping, id)
    }

    fn write_payload(&self, record: &Record, include_unique_id: bool) -> Result<Row, StoreError> {
        let fields = self.resolved_fields()?;
        let unique_id = self.driver.unique_id();
        let mut payload = record.to_map();
        payload.retain(|column, _| {
            fields.iter().any(|field| field == column)
                || (include_unique_id && column == unique_id)
        });
        if !include_unique_id {
            payload.remove(unique_id);
        }
        Ok(payload)
    }

    /// Convert result rows into records, lower-casing column names on
    /// platforms that report them upper-cased.
    pub(crate) fn prepare_results(&self, rows: Vec<Row>) -> Result<Vec<Record>, StoreError> {
        rows.into_iter()
            .map(|row| {
                let row = self.normalise_row(row);
                self.create(&Value::Object(row))
            })
            .collect()
    }

    pub(crate) fn normalise_row(&self, row: Row) -> Row {
        if !uppercase_platform(self.driver.as_ref()) {
            return row;
        }
        row.into_iter()
            .map(|(column, value)| (column.to_lowercase(), value))
            .collect()
    }
}

fn uppercase_platform(driver: &dyn Driver) -> bool {
    crate::driver::platform::platform_syntax(driver.platform_name())
        .is_some_and(|platform| platform.uppercase_columns)
}
