//! Table-driven SQL dialect dispatch.
//!
//! Platform differences are captured in two static tables keyed by
//! platform name: [`PlatformSyntax`] for the general dialect (row limits,
//! identity retrieval, column introspection) and [`SpatialSyntax`] for
//! the spatial function family. Adding a platform means adding a table
//! row; call sites never branch on concrete driver types. A platform
//! without a [`SpatialSyntax`] row simply has no spatial capability.

/// Canonical PostgreSQL platform name.
pub const POSTGRESQL: &str = "postgresql";
/// Canonical Oracle platform name.
pub const ORACLE: &str = "oracle";

/// General SQL dialect hooks for one platform.
pub struct PlatformSyntax {
    /// Platform name this row covers.
    pub name: &'static str,
    /// Whether the platform reports result columns upper-cased.
    pub uppercase_columns: bool,
    /// Row-limit clause appended to a select.
    pub limit_clause: fn(max_results: usize) -> String,
    /// Query returning the identity generated by the last insert.
    pub last_insert_id_query: fn(table: &str, id_column: &str) -> String,
    /// Query listing the table's columns in schema order.
    pub columns_query: fn(table: &str) -> String,
    /// Query reading the identity column's default expression, from which
    /// the backing sequence name is extracted; absent where identities are
    /// not sequence-backed through a column default.
    pub sequence_name_query: Option<fn(table: &str, id_column: &str) -> String>,
    /// Query resetting the identity sequence to the table's highest
    /// identity.
    pub repair_sequence_query: Option<fn(sequence: &str, table: &str, id_column: &str) -> String>,
}

/// Spatial SQL fragment builders for one platform.
///
/// All `quoted_*` parameters are already-quoted SQL string literals; the
/// caller quotes through its connection before dispatching here.
pub struct SpatialSyntax {
    /// Platform name this row covers.
    pub name: &'static str,
    /// Intersects predicate between a WKT literal and a geometry column.
    pub intersects: fn(geometry: &str, column: &str, srid: i32, target_srid: i32) -> String,
    /// Select expression reading a geometry column as reprojected WKT.
    pub geometry_attribute: fn(column: &str, target_srid: i32) -> String,
    /// Proximity predicate between a geometry column and a source literal.
    pub within_distance: fn(column: &str, quoted_source: &str, distance: f64) -> String,
    /// Query reprojecting an EWKT literal, returning plain WKT.
    pub transform_query: fn(quoted_ewkt: &str, target_srid: i32) -> String,
    /// Query resolving the SRID of a table's geometry column.
    pub srid_query: fn(table: &str, column: &str) -> String,
    /// Query resolving the geometry type of a table's geometry column.
    pub geom_type_query: Option<fn(table: &str, schema: &str) -> String>,
    /// DDL adding a geometry column; absent where the platform (or our
    /// support for it) cannot express the statement.
    pub add_geometry_column:
        Option<fn(table: &str, geometry_type: &str, srid: i32, column: &str, schema: &str, dimensions: u8) -> String>,
}

static PLATFORMS: &[PlatformSyntax] = &[
    PlatformSyntax {
        name: POSTGRESQL,
        uppercase_columns: false,
        limit_clause: pg_limit,
        last_insert_id_query: pg_last_insert_id,
        columns_query: pg_columns,
        sequence_name_query: Some(pg_sequence_name),
        repair_sequence_query: Some(pg_repair_sequence),
    },
    PlatformSyntax {
        name: ORACLE,
        uppercase_columns: true,
        limit_clause: oracle_limit,
        last_insert_id_query: oracle_last_insert_id,
        columns_query: oracle_columns,
        sequence_name_query: None,
        repair_sequence_query: None,
    },
];

static SPATIAL: &[SpatialSyntax] = &[
    SpatialSyntax {
        name: POSTGRESQL,
        intersects: pg_intersects,
        geometry_attribute: pg_geometry_attribute,
        within_distance: pg_within_distance,
        transform_query: pg_transform,
        srid_query: pg_srid,
        geom_type_query: Some(pg_geom_type),
        add_geometry_column: Some(pg_add_geometry_column),
    },
    SpatialSyntax {
        name: ORACLE,
        intersects: oracle_intersects,
        geometry_attribute: oracle_geometry_attribute,
        within_distance: oracle_within_distance,
        transform_query: oracle_transform,
        srid_query: oracle_srid,
        geom_type_query: None,
        add_geometry_column: None,
    },
];

/// Look up the general dialect row for a platform name.
pub fn platform_syntax(name: &str) -> Option<&'static PlatformSyntax> {
    PLATFORMS.iter().find(|p| p.name == name)
}

/// Look up the spatial dialect row for a platform name.
///
/// `None` means "no spatial capability": callers fall back to the raw
/// column or refuse the request, never emit malformed SQL.
pub fn spatial_syntax(name: &str) -> Option<&'static SpatialSyntax> {
    SPATIAL.iter().find(|p| p.name == name)
}

fn pg_limit(max_results: usize) -> String {
    format!("LIMIT {max_results}")
}

fn oracle_limit(max_results: usize) -> String {
    format!("FETCH FIRST {max_results} ROWS ONLY")
}

fn pg_last_insert_id(_table: &str, _id_column: &str) -> String {
    "SELECT LASTVAL()".to_string()
}

// Doctrine's sequence naming convention; tables managed outside it need a
// matching sequence.
fn oracle_last_insert_id(table: &str, _id_column: &str) -> String {
    format!("SELECT {}_SEQ.CURRVAL FROM DUAL", table.to_uppercase())
}

fn pg_columns(table: &str) -> String {
    format!(
        "SELECT column_name FROM information_schema.columns \
         WHERE table_name = '{table}' ORDER BY ordinal_position"
    )
}

fn oracle_columns(table: &str) -> String {
    format!(
        "SELECT COLUMN_NAME FROM ALL_TAB_COLUMNS \
         WHERE TABLE_NAME = '{}' ORDER BY COLUMN_ID",
        table.to_uppercase()
    )
}

fn pg_sequence_name(table: &str, id_column: &str) -> String {
    format!(
        "SELECT column_default FROM information_schema.columns \
         WHERE table_name = '{table}' AND column_name = '{id_column}'"
    )
}

fn pg_repair_sequence(sequence: &str, table: &str, id_column: &str) -> String {
    format!("SELECT setval('{sequence}', (SELECT MAX({id_column}) FROM {table}))")
}

fn pg_intersects(geometry: &str, column: &str, srid: i32, target_srid: i32) -> String {
    format!(
        "ST_INTERSECTS(ST_TRANSFORM(ST_GEOMFROMTEXT('{geometry}',{srid}),{target_srid}),{column})"
    )
}

fn oracle_intersects(geometry: &str, column: &str, srid: i32, target_srid: i32) -> String {
    format!(
        "SDO_RELATE({column}, SDO_GEOMETRY(SDO_CS.TRANSFORM('{geometry}',{srid}),{target_srid}), \
         'mask=ANYINTERACT querytype=WINDOW') = 'TRUE'"
    )
}

fn pg_geometry_attribute(column: &str, target_srid: i32) -> String {
    format!("ST_ASTEXT(ST_TRANSFORM({column}, {target_srid})) AS {column}")
}

fn oracle_geometry_attribute(column: &str, target_srid: i32) -> String {
    format!("SDO_UTIL.TO_WKTGEOMETRY(SDO_CS.TRANSFORM({column}, {target_srid})) AS {column}")
}

fn pg_within_distance(column: &str, quoted_source: &str, distance: f64) -> String {
    format!("ST_DWithin(t.{column},{quoted_source},{distance})")
}

fn oracle_within_distance(column: &str, quoted_source: &str, distance: f64) -> String {
    format!("SDO_WITHIN_DISTANCE(t.{column}, {quoted_source}, 'distance={distance}') = 'TRUE'")
}

fn pg_transform(quoted_ewkt: &str, target_srid: i32) -> String {
    format!("SELECT ST_ASTEXT(ST_TRANSFORM(ST_GEOMFROMEWKT({quoted_ewkt}),{target_srid}))")
}

fn oracle_transform(quoted_ewkt: &str, target_srid: i32) -> String {
    format!(
        "SELECT SDO_UTIL.TO_WKTGEOMETRY(SDO_CS.TRANSFORM(\
         SDO_UTIL.FROM_WKTGEOMETRY({quoted_ewkt}),{target_srid})) FROM DUAL"
    )
}

fn pg_srid(table: &str, column: &str) -> String {
    format!("SELECT Find_SRID(current_schema()::text, '{table}', '{column}')")
}

fn oracle_srid(table: &str, column: &str) -> String {
    format!("SELECT t.{column}.SDO_SRID FROM {table} t")
}

fn pg_geom_type(table: &str, schema: &str) -> String {
    format!(
        "SELECT \"type\" FROM geometry_columns \
         WHERE f_table_schema = '{schema}' AND f_table_name = '{table}'"
    )
}

fn pg_add_geometry_column(
    table: &str,
    geometry_type: &str,
    srid: i32,
    column: &str,
    schema: &str,
    dimensions: u8,
) -> String {
    format!(
        "SELECT AddGeometryColumn('{schema}','{table}','{column}',{srid},'{geometry_type}',{dimensions})"
    )
}
