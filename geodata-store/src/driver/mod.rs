//! Backend abstraction: the driver contract and its capability seams.
//!
//! A [`Driver`] owns one [`Connection`] and hides the platform's SQL
//! dialect behind the dispatch tables in [`platform`]. Optional abilities
//! are modelled as independent capability traits ([`Geographic`],
//! [`Mappable`], [`Treeable`]); collaborators discover them through the
//! `as_*` accessors and never downcast to concrete driver types.

use geodata_core::Record;
use serde_json::Value;

use crate::error::StoreError;
use crate::query::SelectBuilder;

mod connection;
pub mod platform;
mod sql;

pub use connection::{Connection, ConnectionError, Row};
pub(crate) use connection::sql_literal;
pub use sql::{SqlDriver, ThroughMapping};

/// The data-access contract every backend driver satisfies.
pub trait Driver {
    /// The owned connection handle.
    fn connection(&self) -> &dyn Connection;

    /// Platform name used to key the dialect tables.
    fn platform_name(&self) -> &str;

    /// Target table.
    fn table_name(&self) -> &str;

    /// Identity column name.
    fn unique_id(&self) -> &str;

    /// Column names introspected from the table schema, used as the default
    /// allow-list when the store configures none.
    fn table_fields(&self) -> Result<Vec<String>, StoreError>;

    /// A builder pre-seeded with `SELECT <columns + extra expressions>
    /// FROM <table> t`.
    fn select_builder(&self, columns: &[String], extra: &[String]) -> SelectBuilder;

    /// Identity generated by the most recent insert on this connection.
    fn last_insert_id(&self) -> Result<i64, StoreError>;

    /// Insert one row.
    fn insert_row(&self, data: &Row) -> Result<(), StoreError>;

    /// Update the row with the given identity; returns affected rows.
    fn update_row(&self, data: &Row, id: i64) -> Result<u64, StoreError>;

    /// Delete the row with the given identity; returns affected rows.
    fn delete_row(&self, id: i64) -> Result<u64, StoreError>;

    /// Name of the sequence backing the identity column, where the
    /// platform records one as the column default.
    fn table_sequence_name(&self) -> Result<Option<String>, StoreError> {
        Ok(None)
    }

    /// Reset the identity sequence to the table's highest identity, so the
    /// next insert does not collide with manually loaded rows. Returns the
    /// value the sequence was set to, or `None` where the platform has no
    /// repairable sequence.
    fn repair_sequence(&self) -> Result<Option<i64>, StoreError> {
        Ok(None)
    }

    /// Spatial capability, if this driver has one.
    fn as_geographic(&self) -> Option<&dyn Geographic> {
        None
    }

    /// Lookup-table capability, if this driver has one.
    fn as_mappable(&self) -> Option<&dyn Mappable> {
        None
    }

    /// Parent/child traversal capability, if this driver has one.
    fn as_treeable(&self) -> Option<&dyn Treeable> {
        None
    }
}

/// Spatial operations a geometry-capable driver provides.
pub trait Geographic {
    /// Reproject an EWKT literal to `target_srid` using the platform's
    /// native transform, returning plain WKT.
    ///
    /// Unlike the DDL operations this never degrades silently: skipping a
    /// coordinate transform would corrupt data semantics.
    fn transform_ewkt(&self, ewkt: &str, target_srid: i32) -> Result<String, StoreError>;

    /// SRID recorded in the table's spatial metadata, if any.
    fn table_srid(&self, table: &str, geom_column: &str) -> Result<Option<i32>, StoreError>;

    /// Geometry type recorded in the table's spatial metadata, if any.
    fn table_geom_type(&self, table: &str, schema: &str) -> Result<Option<String>, StoreError>;

    /// Add a spatial column. Returns `Ok(false)` where the platform row
    /// carries no DDL builder; callers treat that as "not applicable".
    fn add_geometry_column(
        &self,
        table: &str,
        geometry_type: &str,
        srid: i32,
        column: &str,
        schema: &str,
        dimensions: u8,
    ) -> Result<bool, StoreError>;
}

/// Value resolution through a configured intermediate lookup table.
pub trait Mappable {
    /// Resolve `id` through the named mapping.
    fn through_mapping(&self, mapping: &str, id: i64) -> Result<Option<Value>, StoreError>;
}

/// Parent/child traversal over self-referencing tables.
///
/// Interface only; no driver implements it yet.
pub trait Treeable {
    /// The parent of the given record, if any.
    fn parent_of(&self, record: &Record) -> Result<Option<Record>, StoreError>;

    /// The records below `parent_id` (the whole forest for `None`).
    fn tree(&self, parent_id: Option<i64>, recursive: bool) -> Result<Vec<Record>, StoreError>;
}
