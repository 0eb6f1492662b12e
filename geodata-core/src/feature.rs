//! Geometry-bearing specialisation of [`Record`].

use serde_json::{json, Map, Value};

use crate::geometry::{split_ewkt, wkt_to_geojson, GeometryError};
use crate::record::{Record, RecordError};

/// A record with a geometry column and a coordinate reference system.
///
/// The geometry is always held as plain WKT; its SRID is tracked out of
/// band. EWKT is accepted at the construction boundary and split
/// immediately, so no `SRID=...;` prefix ever survives inside a `Feature`.
/// A `None` SRID means "use the owning store's default".
///
/// # Examples
/// ```
/// use serde_json::json;
/// use geodata_core::Feature;
///
/// let raw = json!({"name": "pond", "geom": "SRID=4326;POINT(1 2)"});
/// let feature = Feature::from_value(&raw, "id", "geom", None).unwrap();
/// assert_eq!(feature.geometry(), Some("POINT(1 2)"));
/// assert_eq!(feature.srid(), Some(4326));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    record: Record,
    geometry: Option<String>,
    srid: Option<i32>,
    geom_field: String,
}

impl Feature {
    /// Build a feature from caller-supplied JSON.
    ///
    /// Two shapes are understood: a flat attribute map carrying the WKT (or
    /// EWKT) under `geom_field`, and a GeoJSON-style `{geometry, properties}`
    /// envelope whose geometry is a WKT string. Bare numbers become
    /// identity-only features, as for [`Record::from_value`].
    pub fn from_value(
        raw: &Value,
        unique_id_field: &str,
        geom_field: &str,
        default_srid: Option<i32>,
    ) -> Result<Self, RecordError> {
        if let Value::Object(map) = raw {
            if map.contains_key("geometry") && map.contains_key("properties") {
                return Self::from_envelope(map, unique_id_field, geom_field, default_srid);
            }
        }

        let record = Record::from_value(raw, unique_id_field, false)?;
        Ok(Self::from_record(record, geom_field, default_srid))
    }

    /// Wrap an existing record, pulling the geometry out of its attributes.
    pub fn from_record(mut record: Record, geom_field: &str, default_srid: Option<i32>) -> Self {
        let geometry_text = record
            .attributes()
            .get(geom_field)
            .and_then(Value::as_str)
            .map(str::to_string);
        if geometry_text.is_some() {
            record.remove_attribute(geom_field);
        }

        let mut feature = Self {
            record,
            geometry: None,
            srid: default_srid,
            geom_field: geom_field.to_string(),
        };
        if let Some(text) = geometry_text {
            feature.set_geometry(&text);
        }
        feature
    }

    fn from_envelope(
        map: &Map<String, Value>,
        unique_id_field: &str,
        geom_field: &str,
        default_srid: Option<i32>,
    ) -> Result<Self, RecordError> {
        let geometry = match map.get("geometry") {
            Some(Value::String(text)) => Some(text.clone()),
            Some(Value::Null) | None => None,
            Some(_) => {
                return Err(RecordError::UnsupportedPayload {
                    kind: "non-textual geometry",
                })
            }
        };

        let mut properties = match map.get("properties") {
            Some(Value::Object(properties)) => properties.clone(),
            _ => Map::new(),
        };
        if let Some(id) = map.get("id") {
            properties.insert(unique_id_field.to_string(), id.clone());
        }

        let record = Record::from_value(&Value::Object(properties), unique_id_field, false)?;
        let mut feature = Self::from_record(record, geom_field, default_srid);
        if let Some(text) = geometry {
            feature.set_geometry(&text);
        }
        Ok(feature)
    }

    /// The wrapped record.
    pub fn record(&self) -> &Record {
        &self.record
    }

    /// Name of the geometry column.
    pub fn geom_field(&self) -> &str {
        &self.geom_field
    }

    /// The plain-WKT geometry, if any.
    pub fn geometry(&self) -> Option<&str> {
        self.geometry.as_deref()
    }

    /// Replace the geometry. EWKT input is split; an embedded SRID takes
    /// precedence over the current one.
    pub fn set_geometry(&mut self, text: &str) {
        let (srid, wkt) = split_ewkt(text);
        self.geometry = Some(wkt.to_string());
        if srid.is_some() {
            self.srid = srid;
        }
    }

    /// The coordinate reference system, `None` meaning the store default.
    pub fn srid(&self) -> Option<i32> {
        self.srid
    }

    /// Override the coordinate reference system.
    pub fn set_srid(&mut self, srid: impl Into<Option<i32>>) {
        self.srid = srid.into();
    }

    /// Whether the record has been assigned an identity.
    pub fn has_id(&self) -> bool {
        self.record.has_id()
    }

    /// The assigned identity, if any.
    pub fn id(&self) -> Option<i64> {
        self.record.id()
    }

    /// Assign (or clear) the identity.
    pub fn set_id(&mut self, id: impl Into<Option<i64>>) {
        self.record.set_id(id);
    }

    /// Non-geometry attributes, identity excluded.
    pub fn attributes(&self) -> &Map<String, Value> {
        self.record.attributes()
    }

    /// Look up a single attribute.
    pub fn attribute(&self, name: &str) -> Option<&Value> {
        self.record.attribute(name)
    }

    /// Set a single attribute; writes under the geometry column go through
    /// [`Feature::set_geometry`] instead.
    pub fn set_attribute(&mut self, name: impl Into<String>, value: Value) {
        let name = name.into();
        if name == self.geom_field {
            if let Value::String(text) = &value {
                self.set_geometry(text);
                return;
            }
        }
        self.record.set_attribute(name, value);
    }

    /// Emit attributes with identity and plain-WKT geometry injected under
    /// their configured column names. Used by the store write path.
    pub fn to_map(&self) -> Map<String, Value> {
        let mut map = self.record.to_map();
        if let Some(wkt) = &self.geometry {
            map.insert(self.geom_field.clone(), Value::String(wkt.clone()));
        }
        map
    }

    /// Serialise as a GeoJSON `Feature` object.
    ///
    /// The geometry is re-expressed as a structured GeoJSON geometry, never
    /// WKT; non-geometry attributes nest under `properties` with the
    /// identity injected when present. With `with_srid`, the tracked SRID is
    /// exposed alongside the standard members.
    pub fn to_geo_json(&self, with_srid: bool) -> Result<Value, GeometryError> {
        let geometry = match &self.geometry {
            Some(wkt) => wkt_to_geojson(wkt)?,
            None => Value::Null,
        };
        let mut feature = json!({
            "type": "Feature",
            "geometry": geometry,
            "properties": Value::Object(self.record.to_map()),
        });
        if with_srid {
            feature["srid"] = match self.srid {
                Some(srid) => json!(srid),
                None => Value::Null,
            };
        }
        Ok(feature)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    fn lake(geom: &str) -> Feature {
        Feature::from_value(
            &json!({"id": 4, "name": "lake", "geom": geom}),
            "id",
            "geom",
            None,
        )
        .unwrap()
    }

    #[rstest]
    fn splits_ewkt_on_construction() {
        let feature = lake("SRID=25832;POINT(370000 5700000)");
        assert_eq!(feature.geometry(), Some("POINT(370000 5700000)"));
        assert_eq!(feature.srid(), Some(25832));
        assert!(feature.attributes().get("geom").is_none());
    }

    #[rstest]
    fn plain_wkt_keeps_default_srid() {
        let feature = Feature::from_value(
            &json!({"geom": "POINT(1 2)"}),
            "id",
            "geom",
            Some(4326),
        )
        .unwrap();
        assert_eq!(feature.srid(), Some(4326));
        assert_eq!(feature.geometry(), Some("POINT(1 2)"));
    }

    #[rstest]
    fn to_map_reinjects_geometry_and_identity() {
        let feature = lake("POINT(1 2)");
        let map = feature.to_map();
        assert_eq!(map["id"], 4);
        assert_eq!(map["geom"], "POINT(1 2)");
        assert_eq!(map["name"], "lake");
    }

    #[rstest]
    fn accepts_geojson_style_envelope() {
        let raw = json!({
            "id": 7,
            "geometry": "SRID=4326;POINT(8 50)",
            "properties": {"name": "tower"},
        });
        let feature = Feature::from_value(&raw, "id", "geom", None).unwrap();
        assert_eq!(feature.id(), Some(7));
        assert_eq!(feature.geometry(), Some("POINT(8 50)"));
        assert_eq!(feature.srid(), Some(4326));
        assert_eq!(feature.attribute("name"), Some(&json!("tower")));
    }

    #[rstest]
    fn rejects_structured_envelope_geometry() {
        let raw = json!({
            "geometry": {"type": "Point", "coordinates": [1, 2]},
            "properties": {},
        });
        assert!(matches!(
            Feature::from_value(&raw, "id", "geom", None),
            Err(RecordError::UnsupportedPayload { .. })
        ));
    }

    #[rstest]
    fn serialises_to_geojson() {
        let feature = lake("POINT(1 2)");
        let geojson = feature.to_geo_json(true).unwrap();
        assert_eq!(geojson["type"], "Feature");
        assert_eq!(geojson["geometry"]["type"], "Point");
        assert_eq!(geojson["properties"]["name"], "lake");
        assert_eq!(geojson["properties"]["id"], 4);
        assert_eq!(geojson["srid"], Value::Null);
    }

    #[rstest]
    fn geometryless_feature_serialises_null_geometry() {
        let feature = Feature::from_value(&json!({"name": "x"}), "id", "geom", None).unwrap();
        assert_eq!(feature.to_geo_json(false).unwrap()["geometry"], Value::Null);
    }
}
