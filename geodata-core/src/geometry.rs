//! WKT/EWKT text utilities.
//!
//! The store layer keeps geometries as Well-Known Text throughout; the
//! helpers here sniff the geometry type, split EWKT literals into their
//! SRID and plain-WKT halves, cap coordinate precision for SQL predicates,
//! and re-express WKT as GeoJSON geometry objects for the wire format.

use std::str::FromStr;
use std::sync::OnceLock;

use geo_types::{Geometry, LineString, Polygon};
use regex::Regex;
use serde_json::{json, Value};
use thiserror::Error;

/// Default fractional-digit budget for [`round_coordinates`].
pub const DEFAULT_PRECISION: usize = 2;

/// Upper bound on the precision [`round_coordinates`] accepts; larger
/// requests are clamped here. Beyond this many fractional digits there is
/// nothing left to cut in an f64 coordinate.
pub const MAX_PRECISION: usize = 17;

/// Errors raised while interpreting geometry text.
#[derive(Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum GeometryError {
    /// The text carries no coordinate list, so no type can be detected.
    #[error("geometry text has no coordinate list: {0:?}")]
    Malformed(String),
    /// The WKT body could not be parsed into a geometry.
    #[error("failed to parse WKT: {0}")]
    WktParse(String),
}

/// Detect the geometry type named by a WKT or EWKT literal.
///
/// A leading `SRID=<n>;` prefix is skipped; the returned slice is the
/// trimmed text before the first opening parenthesis.
///
/// # Examples
/// ```
/// use geodata_core::geometry::wkt_type;
///
/// assert_eq!(wkt_type("SRID=4326;POINT(1 2)").unwrap(), "POINT");
/// assert_eq!(wkt_type("POLYGON((0 0,1 1,1 0,0 0))").unwrap(), "POLYGON");
/// ```
pub fn wkt_type(wkt: &str) -> Result<&str, GeometryError> {
    let body = strip_srid_prefix(wkt).1;
    let open = body
        .find('(')
        .ok_or_else(|| GeometryError::Malformed(wkt.to_string()))?;
    Ok(body[..open].trim())
}

/// Split an EWKT literal into its SRID and the plain WKT body.
///
/// Plain WKT passes through unchanged with `None`. A `SRID=` prefix whose
/// number does not parse is treated as plain WKT rather than rejected; the
/// database will complain about it soon enough.
pub fn split_ewkt(text: &str) -> (Option<i32>, &str) {
    let (prefix, body) = strip_srid_prefix(text);
    let srid = prefix
        .and_then(|p| p.strip_prefix("SRID="))
        .and_then(|n| n.trim().parse::<i32>().ok());
    match srid {
        Some(srid) => (Some(srid), body),
        None => (None, text),
    }
}

/// Cap every decimal number in `text` to at most `precision` fractional
/// digits.
///
/// Excess digits are cut, not rounded; the historical name is kept. The
/// rewrite is format preserving and idempotent at fixed precision: numbers
/// already within budget pass through untouched.
///
/// # Examples
/// ```
/// use geodata_core::geometry::round_coordinates;
///
/// assert_eq!(round_coordinates("POINT(1.23456 7.89123)", 2), "POINT(1.23 7.89)");
/// ```
pub fn round_coordinates(text: &str, precision: usize) -> String {
    static DEFAULT_RE: OnceLock<Regex> = OnceLock::new();
    let precision = precision.min(MAX_PRECISION);
    let compiled;
    let re = if precision == DEFAULT_PRECISION {
        DEFAULT_RE.get_or_init(|| precision_regex(DEFAULT_PRECISION))
    } else {
        compiled = precision_regex(precision);
        &compiled
    };
    re.replace_all(text, "$1.$2").into_owned()
}

fn precision_regex(precision: usize) -> Regex {
    let pattern = format!(r"(\d+)\.(\d{{{precision}}})\d+");
    Regex::new(&pattern).expect("clamped digit count always forms a valid regex")
}

/// Re-express a plain-WKT literal as a GeoJSON geometry object.
///
/// # Examples
/// ```
/// use geodata_core::geometry::wkt_to_geojson;
///
/// let geojson = wkt_to_geojson("POINT(1 2)").unwrap();
/// assert_eq!(geojson["type"], "Point");
/// assert_eq!(geojson["coordinates"], serde_json::json!([1.0, 2.0]));
/// ```
pub fn wkt_to_geojson(wkt: &str) -> Result<Value, GeometryError> {
    let parsed = wkt::Wkt::<f64>::from_str(wkt)
        .map_err(|e| GeometryError::WktParse(format!("{e:?}")))?;
    let geometry: Geometry<f64> = parsed
        .try_into()
        .map_err(|e| GeometryError::WktParse(format!("{e:?}")))?;
    Ok(geometry_value(&geometry))
}

fn strip_srid_prefix(text: &str) -> (Option<&str>, &str) {
    if !text.starts_with("SRID") {
        return (None, text);
    }
    match text.find(';') {
        Some(i) => (Some(&text[..i]), &text[i + 1..]),
        None => (None, text),
    }
}

fn coord_value(c: geo_types::Coord<f64>) -> Value {
    json!([c.x, c.y])
}

fn line_coords(line: &LineString<f64>) -> Value {
    Value::Array(line.coords().map(|c| coord_value(*c)).collect())
}

fn polygon_coords(polygon: &Polygon<f64>) -> Value {
    let mut rings = vec![line_coords(polygon.exterior())];
    rings.extend(polygon.interiors().iter().map(line_coords));
    Value::Array(rings)
}

fn geometry_value(geometry: &Geometry<f64>) -> Value {
    match geometry {
        Geometry::Point(p) => json!({"type": "Point", "coordinates": coord_value(p.0)}),
        Geometry::Line(l) => json!({
            "type": "LineString",
            "coordinates": [coord_value(l.start), coord_value(l.end)],
        }),
        Geometry::LineString(l) => {
            json!({"type": "LineString", "coordinates": line_coords(l)})
        }
        Geometry::Polygon(p) => json!({"type": "Polygon", "coordinates": polygon_coords(p)}),
        Geometry::Rect(r) => {
            json!({"type": "Polygon", "coordinates": polygon_coords(&r.to_polygon())})
        }
        Geometry::Triangle(t) => {
            json!({"type": "Polygon", "coordinates": polygon_coords(&t.to_polygon())})
        }
        Geometry::MultiPoint(points) => json!({
            "type": "MultiPoint",
            "coordinates": points.iter().map(|p| coord_value(p.0)).collect::<Vec<_>>(),
        }),
        Geometry::MultiLineString(lines) => json!({
            "type": "MultiLineString",
            "coordinates": lines.iter().map(line_coords).collect::<Vec<_>>(),
        }),
        Geometry::MultiPolygon(polygons) => json!({
            "type": "MultiPolygon",
            "coordinates": polygons.iter().map(polygon_coords).collect::<Vec<_>>(),
        }),
        Geometry::GeometryCollection(geometries) => json!({
            "type": "GeometryCollection",
            "geometries": geometries.iter().map(geometry_value).collect::<Vec<_>>(),
        }),
    }
}
