//! Caller-facing search criteria.

use serde::Deserialize;

/// Default row cap applied when the caller sets none.
pub const DEFAULT_MAX_RESULTS: usize = 5000;

/// Alternative output shapes for a feature search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum ReturnType {
    /// Serialise the result set as one GeoJSON `FeatureCollection`.
    FeatureCollection,
}

/// The platform-neutral search request.
///
/// All present predicates are joined with `AND`; the store's permanent
/// `sql_filter` is always ANDed in on top, regardless of what the caller
/// supplies.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct SearchCriteria {
    /// Row cap; defaults to [`DEFAULT_MAX_RESULTS`].
    #[serde(default)]
    pub max_results: Option<usize>,
    /// WKT geometry whose (precision-capped) intersection filters the
    /// result set.
    #[serde(default)]
    pub intersect_geometry: Option<String>,
    /// Switches the output shape; `None` returns plain features.
    #[serde(default)]
    pub return_type: Option<ReturnType>,
    /// Read-projection target; defaults to the store's resolved SRID.
    #[serde(default)]
    pub srid: Option<i32>,
    /// Raw caller-supplied predicate, ANDed in.
    #[serde(default, rename = "where")]
    pub where_clause: Option<String>,
    /// Proximity filter source geometry; paired with `distance`.
    #[serde(default)]
    pub source: Option<String>,
    /// Proximity filter distance; paired with `source`.
    #[serde(default)]
    pub distance: Option<f64>,
}

impl SearchCriteria {
    /// Criteria matching everything, capped at the default row limit.
    pub fn new() -> Self {
        Self::default()
    }

    /// Cap the number of returned rows.
    #[must_use]
    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = Some(max_results);
        self
    }

    /// Filter to rows intersecting the given WKT geometry.
    #[must_use]
    pub fn with_intersect_geometry(mut self, wkt: impl Into<String>) -> Self {
        self.intersect_geometry = Some(wkt.into());
        self
    }

    /// AND a raw predicate into the search.
    #[must_use]
    pub fn with_where(mut self, predicate: impl Into<String>) -> Self {
        self.where_clause = Some(predicate.into());
        self
    }

    /// Reproject returned geometries to the given SRID.
    #[must_use]
    pub fn with_srid(mut self, srid: i32) -> Self {
        self.srid = Some(srid);
        self
    }

    /// Request GeoJSON `FeatureCollection` output.
    #[must_use]
    pub fn with_return_type(mut self, return_type: ReturnType) -> Self {
        self.return_type = Some(return_type);
        self
    }

    /// Filter to rows within `distance` of the source geometry.
    #[must_use]
    pub fn with_proximity(mut self, source: impl Into<String>, distance: f64) -> Self {
        self.source = Some(source.into());
        self.distance = Some(distance);
        self
    }
}
