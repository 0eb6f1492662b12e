//! Geometry-aware store over a spatial table.

use std::cell::OnceCell;
use std::fmt;

use geodata_core::geometry::{round_coordinates, DEFAULT_PRECISION};
use geodata_core::Feature;
use serde_json::{json, Value};

use crate::driver::platform::{spatial_syntax, SpatialSyntax};
use crate::driver::{Connection, Driver, Geographic, Row, SqlDriver};
use crate::error::StoreError;
use crate::query::SelectBuilder;
use crate::store::{
    DataStore, DataStoreConfig, FeatureStoreConfig, HookContext, SaveFailure, SaveOutcome,
    SearchCriteria, StoreEvent, DEFAULT_MAX_RESULTS,
};

/// What a feature search hands back, shaped by the criteria's return type.
#[derive(Debug)]
pub enum SearchResult {
    /// The matching features in row order.
    Features(Vec<Feature>),
    /// The same result set serialised as one GeoJSON `FeatureCollection`.
    FeatureCollection(Value),
}

/// CRUD and spatial search over one geometry-bearing table.
///
/// Wraps a [`DataStore`] and adds the geometry column handling: reads
/// reproject the column to WKT in the requested reference system, writes
/// run every geometry through the backend's coordinate transform into the
/// table's system. The table SRID is resolved from spatial metadata once
/// per store instance unless the configuration pins it.
pub struct FeatureStore {
    store: DataStore,
    geom_field: String,
    configured_srid: Option<i32>,
    resolved_srid: OnceCell<Option<i32>>,
}

impl fmt::Debug for FeatureStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FeatureStore")
            .field("store", &self.store)
            .field("geom_field", &self.geom_field)
            .field("configured_srid", &self.configured_srid)
            .finish_non_exhaustive()
    }
}

impl FeatureStore {
    /// Open a store over a [`SqlDriver`] for the configured platform.
    pub fn open(
        connection: Box<dyn Connection>,
        platform_name: &str,
        config: &FeatureStoreConfig,
    ) -> Result<Self, StoreError> {
        let data_config = config.as_data_config();
        let driver = SqlDriver::new(connection, platform_name, &config.table, &config.unique_id)?
            .with_mappings(config.mappings.clone());
        Ok(Self::assemble(Box::new(driver), &data_config, config))
    }

    /// Wrap an existing driver.
    pub fn with_driver(driver: Box<dyn Driver>, config: &FeatureStoreConfig) -> Self {
        Self::assemble(driver, &config.as_data_config(), config)
    }

    fn assemble(
        driver: Box<dyn Driver>,
        data_config: &DataStoreConfig,
        config: &FeatureStoreConfig,
    ) -> Self {
        Self {
            store: DataStore::with_driver(driver, data_config),
            geom_field: config.geom_field.clone(),
            configured_srid: config.srid,
            resolved_srid: OnceCell::new(),
        }
    }

    /// The wrapped attribute store.
    pub fn store(&self) -> &DataStore {
        &self.store
    }

    /// The owned driver.
    pub fn driver(&self) -> &dyn Driver {
        self.store.driver()
    }

    /// Name of the geometry column.
    pub fn geom_field(&self) -> &str {
        &self.geom_field
    }

    /// Register a lifecycle hook.
    pub fn on(&mut self, event: StoreEvent, hook: impl Fn(&mut HookContext<'_>) + 'static) {
        self.store.on(event, hook);
    }

    /// The table's coordinate reference system.
    ///
    /// The configured SRID wins; otherwise the spatial metadata is queried
    /// once and the answer cached for the store's lifetime. Drivers without
    /// the spatial capability resolve to `None`.
    pub fn srid(&self) -> Result<Option<i32>, StoreError> {
        if let Some(srid) = self.configured_srid {
            return Ok(Some(srid));
        }
        if let Some(srid) = self.resolved_srid.get() {
            return Ok(*srid);
        }
        let srid = match self.driver().as_geographic() {
            Some(geographic) => {
                geographic.table_srid(self.store.table_name(), &self.geom_field)?
            }
            None => None,
        };
        Ok(*self.resolved_srid.get_or_init(|| srid))
    }

    /// Wrap caller input into a feature bound to this store's identity and
    /// geometry columns.
    pub fn create(&self, raw: &Value) -> Result<Feature, StoreError> {
        Feature::from_value(raw, self.store.unique_id(), &self.geom_field, self.srid()?)
            .map_err(Into::into)
    }

    /// Search features.
    ///
    /// Geometry predicates (`intersect_geometry`, proximity) and the
    /// caller's raw predicate are ANDed together with the permanent
    /// `sql_filter`. Returned geometries are reprojected to the criteria's
    /// SRID, defaulting to the table's own.
    pub fn search(&self, criteria: &SearchCriteria) -> Result<SearchResult, StoreError> {
        let table_srid = self.srid()?;
        let target_srid = criteria.srid.or(table_srid);
        let mut builder = self.select_builder(target_srid)?;

        if let Some(filter) = self.store.sql_filter() {
            builder.where_and(filter.to_string());
        }
        if let Some(predicate) = &criteria.where_clause {
            builder.where_and(predicate.clone());
        }
        if let Some(geometry) = &criteria.intersect_geometry {
            let syntax = self.spatial_sql()?;
            let table_srid = table_srid.ok_or_else(|| {
                StoreError::InvalidInput("table has no SRID to intersect against".to_string())
            })?;
            let rounded = round_coordinates(geometry, DEFAULT_PRECISION);
            let source_srid = criteria.srid.unwrap_or(table_srid);
            builder.where_and((syntax.intersects)(
                &rounded,
                &self.geom_field,
                source_srid,
                table_srid,
            ));
        }
        if let (Some(source), Some(distance)) = (&criteria.source, criteria.distance) {
            let syntax = self.spatial_sql()?;
            let quoted = self.driver().connection().quote(source);
            builder.where_and((syntax.within_distance)(&self.geom_field, &quoted, distance));
        }
        builder.max_results(criteria.max_results.unwrap_or(DEFAULT_MAX_RESULTS));

        let rows = builder
            .fetch(self.driver().connection())
            .map_err(StoreError::persistence("search"))?;
        let features = self.prepare_features(rows, target_srid)?;

        match criteria.return_type {
            Some(super::ReturnType::FeatureCollection) => {
                Ok(SearchResult::FeatureCollection(to_feature_collection(&features)?))
            }
            None => Ok(SearchResult::Features(features)),
        }
    }

    /// Fetch a single feature by identity, reprojected to `srid` (or the
    /// table's own system).
    pub fn get_by_id(&self, id: i64, srid: Option<i32>) -> Result<Option<Feature>, StoreError> {
        let target_srid = match srid {
            Some(srid) => Some(srid),
            None => self.srid()?,
        };
        let mut builder = self.select_builder(target_srid)?;
        builder.where_and(format!("{} = {id}", self.store.unique_id()));
        let rows = builder
            .fetch(self.driver().connection())
            .map_err(StoreError::persistence("get by id"))?;
        Ok(self
            .prepare_features(rows, target_srid)?
            .into_iter()
            .next())
    }

    /// Persist caller input, dispatching to insert or update.
    ///
    /// Mirrors [`DataStore::save`]: lifecycle and persistence failures come
    /// back inside the outcome, and success re-fetches the stored row.
    pub fn save(
        &self,
        data: &Value,
        auto_update: bool,
    ) -> Result<SaveOutcome<Feature>, StoreError> {
        let feature = self.create(data)?;
        match self.save_feature(feature.clone(), auto_update) {
            Ok(saved) => Ok(SaveOutcome::Saved(saved)),
            Err(error) => Ok(SaveOutcome::Failed(SaveFailure {
                error,
                entity: feature,
                input: data.clone(),
            })),
        }
    }

    fn save_feature(
        &self,
        feature: Feature,
        auto_update: bool,
    ) -> Result<Option<Feature>, StoreError> {
        let mut snapshot = feature.to_map();
        let allowed =
            self.store
                .hooks()
                .dispatch(StoreEvent::BeforeSave, &mut snapshot, feature.record());
        let feature = if allowed {
            if !auto_update || !feature.has_id() {
                self.insert_feature(feature)?
            } else {
                self.update_feature(feature)?
            }
        } else {
            feature
        };
        self.store
            .hooks()
            .dispatch(StoreEvent::AfterSave, &mut snapshot, feature.record());
        match feature.id() {
            // Re-fetch in the feature's own reference system, so callers
            // get their geometry back the way they submitted it.
            Some(id) => self.get_by_id(id, feature.srid()),
            None => Ok(None),
        }
    }

    /// Insert caller input as a new feature and assign the generated
    /// identity.
    pub fn insert(&self, data: &Value) -> Result<Feature, StoreError> {
        let feature = self.create(data)?;
        self.insert_feature(feature)
    }

    fn insert_feature(&self, mut feature: Feature) -> Result<Feature, StoreError> {
        let mut payload = self.write_payload(&feature, true)?;
        let allowed =
            self.store
                .hooks()
                .dispatch(StoreEvent::BeforeInsert, &mut payload, feature.record());
        let mut new_id = None;
        if allowed {
            self.driver().insert_row(&payload)?;
            new_id = Some(self.driver().last_insert_id()?);
        }
        feature.set_id(new_id);
        self.store
            .hooks()
            .dispatch(StoreEvent::AfterInsert, &mut payload, feature.record());
        Ok(feature)
    }

    /// Update the feature matching the input's identity.
    pub fn update(&self, data: &Value) -> Result<Feature, StoreError> {
        let feature = self.create(data)?;
        self.update_feature(feature)
    }

    fn update_feature(&self, feature: Feature) -> Result<Feature, StoreError> {
        let id = feature
            .id()
            .ok_or_else(|| StoreError::InvalidInput("update requires an identity".to_string()))?;
        let mut payload = self.write_payload(&feature, false)?;
        let allowed =
            self.store
                .hooks()
                .dispatch(StoreEvent::BeforeUpdate, &mut payload, feature.record());
        if payload.is_empty() {
            return Err(StoreError::InvalidInput(
                "no criteria: update payload is empty after field filtering".to_string(),
            ));
        }
        if allowed {
            self.driver().update_row(&payload, id)?;
        }
        self.store
            .hooks()
            .dispatch(StoreEvent::AfterUpdate, &mut payload, feature.record());
        Ok(feature)
    }

    /// Delete the feature with the given identity. Reports whether a row
    /// was actually removed.
    pub fn remove(&self, id: i64) -> Result<bool, StoreError> {
        self.store.remove(id)
    }

    /// Resolve a value through a configured lookup table.
    pub fn through_mapping(&self, mapping: &str, id: i64) -> Result<Option<Value>, StoreError> {
        self.store.through_mapping(mapping, id)
    }

    /// Reset the identity sequence to the table's highest identity.
    pub fn repair_sequence(&self) -> Result<Option<i64>, StoreError> {
        self.store.repair_sequence()
    }

    /// Reproject an EWKT literal through the backend.
    pub fn transform_ewkt(&self, ewkt: &str, target_srid: i32) -> Result<String, StoreError> {
        self.geographic()?.transform_ewkt(ewkt, target_srid)
    }

    /// Geometry type recorded for this table, if the platform can report
    /// it.
    pub fn geom_type(&self, schema: &str) -> Result<Option<String>, StoreError> {
        self.geographic()?
            .table_geom_type(self.store.table_name(), schema)
    }

    /// Add this store's geometry column to the table. Degrades to
    /// `Ok(false)` on drivers without the spatial capability.
    pub fn add_geometry_column(
        &self,
        geometry_type: &str,
        srid: i32,
        schema: &str,
        dimensions: u8,
    ) -> Result<bool, StoreError> {
        let Some(geographic) = self.driver().as_geographic() else {
            return Ok(false);
        };
        geographic.add_geometry_column(
            self.store.table_name(),
            geometry_type,
            srid,
            &self.geom_field,
            schema,
            dimensions,
        )
    }

    fn geographic(&self) -> Result<&dyn Geographic, StoreError> {
        self.driver()
            .as_geographic()
            .ok_or(StoreError::UnsupportedCapability {
                capability: "spatial SQL",
            })
    }

    fn spatial_sql(&self) -> Result<&'static SpatialSyntax, StoreError> {
        spatial_syntax(self.driver().platform_name()).ok_or(StoreError::UnsupportedCapability {
            capability: "spatial SQL",
        })
    }

    /// A builder selecting the attribute columns plus the geometry column
    /// read as WKT. Without a spatial dialect or a resolvable SRID the raw
    /// column is selected instead.
    fn select_builder(&self, target_srid: Option<i32>) -> Result<SelectBuilder, StoreError> {
        let mut columns = self.store.select_columns()?;
        columns.retain(|column| column != &self.geom_field);
        let geometry_expression = match (
            spatial_syntax(self.driver().platform_name()),
            target_srid,
        ) {
            (Some(syntax), Some(srid)) => (syntax.geometry_attribute)(&self.geom_field, srid),
            _ => self.geom_field.clone(),
        };
        Ok(self
            .driver()
            .select_builder(&columns, &[geometry_expression]))
    }

    fn prepare_features(
        &self,
        rows: Vec<Row>,
        srid: Option<i32>,
    ) -> Result<Vec<Feature>, StoreError> {
        rows.into_iter()
            .map(|row| {
                let row = self.store.normalise_row(row);
                Feature::from_value(
                    &Value::Object(row),
                    self.store.unique_id(),
                    &self.geom_field,
                    srid,
                )
                .map_err(Into::into)
            })
            .collect()
    }

    /// The write-ready row for a feature: allow-listed attributes plus the
    /// geometry transformed into the table's reference system.
    ///
    /// Every geometry goes through the backend transform, even when source
    /// and target systems already agree; the round trip also validates the
    /// WKT before it reaches an insert or update statement.
    fn write_payload(&self, feature: &Feature, include_unique_id: bool) -> Result<Row, StoreError> {
        let fields = self.store.resolved_fields()?;
        let unique_id = self.store.unique_id();
        let mut payload = feature.to_map();
        payload.retain(|column, _| {
            column == &self.geom_field
                || fields.iter().any(|field| field == column)
                || (include_unique_id && column == unique_id)
        });
        if !include_unique_id {
            payload.remove(unique_id);
        }

        if let Some(wkt) = feature.geometry() {
            let table_srid = self.srid()?.ok_or_else(|| {
                StoreError::InvalidInput(
                    "table has no SRID to store geometries in".to_string(),
                )
            })?;
            let source_srid = feature.srid().unwrap_or(table_srid);
            let ewkt = format!("SRID={source_srid};{wkt}");
            let stored = self.geographic()?.transform_ewkt(&ewkt, table_srid)?;
            payload.insert(self.geom_field.clone(), Value::String(stored));
        }
        Ok(payload)
    }
}

/// Serialise features as one GeoJSON `FeatureCollection`. Each member
/// carries its SRID alongside the standard keys.
pub fn to_feature_collection(features: &[Feature]) -> Result<Value, StoreError> {
    let members = features
        .iter()
        .map(|feature| feature.to_geo_json(true))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(json!({
        "type": "FeatureCollection",
        "features": members,
    }))
}
