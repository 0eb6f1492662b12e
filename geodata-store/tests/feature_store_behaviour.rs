//! End-to-end behaviour of [`FeatureStore`] over a scripted connection.

use rstest::rstest;
use serde_json::json;

use geodata_store::test_support::MockConnection;
use geodata_store::{
    FeatureStore, FeatureStoreConfig, ReturnType, SaveOutcome, SearchCriteria, SearchResult,
    StoreError, StoreEvent,
};

fn lakes_store(connection: &MockConnection, platform: &str) -> FeatureStore {
    let config = FeatureStoreConfig::new("lakes")
        .with_fields(["name"])
        .with_srid(25832);
    FeatureStore::open(Box::new(connection.clone()), platform, &config)
        .expect("known platform")
}

#[rstest]
fn search_reads_the_geometry_column_as_reprojected_wkt() {
    let connection = MockConnection::new();
    let store = lakes_store(&connection, "postgresql");
    connection.push_rows(vec![json!({
        "id": 1,
        "name": "pond",
        "geom": "POINT(370000 5700000)",
    })
    .as_object()
    .unwrap()
    .clone()]);

    let result = store.search(&SearchCriteria::new()).unwrap();

    let SearchResult::Features(features) = result else {
        panic!("expected plain features");
    };
    assert_eq!(features.len(), 1);
    assert_eq!(features[0].geometry(), Some("POINT(370000 5700000)"));
    assert_eq!(features[0].srid(), Some(25832));
    assert_eq!(
        connection.executed(),
        vec![
            "SELECT id, name, ST_ASTEXT(ST_TRANSFORM(geom, 25832)) AS geom \
             FROM lakes t LIMIT 5000",
        ]
    );
}

#[rstest]
fn the_criteria_srid_reprojects_the_read_path() {
    let connection = MockConnection::new();
    let store = lakes_store(&connection, "postgresql");
    connection.push_rows(Vec::new());

    store
        .search(&SearchCriteria::new().with_srid(4326))
        .unwrap();

    assert_eq!(
        connection.executed(),
        vec![
            "SELECT id, name, ST_ASTEXT(ST_TRANSFORM(geom, 4326)) AS geom \
             FROM lakes t LIMIT 5000",
        ]
    );
}

#[rstest]
fn intersect_criteria_become_a_capped_precision_predicate() {
    let connection = MockConnection::new();
    let store = lakes_store(&connection, "postgresql");
    connection.push_rows(Vec::new());

    let criteria = SearchCriteria::new()
        .with_intersect_geometry("POLYGON((0 0,10.123456 0,10.123456 10.987654,0 0))")
        .with_max_results(100);
    store.search(&criteria).unwrap();

    assert_eq!(
        connection.executed(),
        vec![
            "SELECT id, name, ST_ASTEXT(ST_TRANSFORM(geom, 25832)) AS geom FROM lakes t \
             WHERE ST_INTERSECTS(ST_TRANSFORM(ST_GEOMFROMTEXT(\
             'POLYGON((0 0,10.12 0,10.12 10.98,0 0))',25832),25832),geom) LIMIT 100",
        ]
    );
}

#[rstest]
fn proximity_criteria_become_a_distance_predicate() {
    let connection = MockConnection::new();
    let store = lakes_store(&connection, "postgresql");
    connection.push_rows(Vec::new());

    let criteria = SearchCriteria::new().with_proximity("POINT(0 0)", 25.0);
    store.search(&criteria).unwrap();

    assert_eq!(
        connection.executed(),
        vec![
            "SELECT id, name, ST_ASTEXT(ST_TRANSFORM(geom, 25832)) AS geom FROM lakes t \
             WHERE ST_DWithin(t.geom,'POINT(0 0)',25) LIMIT 5000",
        ]
    );
}

#[rstest]
fn feature_collection_output_serialises_geometry_as_geojson() {
    let connection = MockConnection::new();
    let store = lakes_store(&connection, "postgresql");
    connection.push_rows(vec![json!({
        "id": 1,
        "name": "pond",
        "geom": "POINT(1 2)",
    })
    .as_object()
    .unwrap()
    .clone()]);

    let criteria = SearchCriteria::new().with_return_type(ReturnType::FeatureCollection);
    let result = store.search(&criteria).unwrap();

    let SearchResult::FeatureCollection(collection) = result else {
        panic!("expected a feature collection");
    };
    assert_eq!(collection["type"], "FeatureCollection");
    assert_eq!(collection["features"][0]["type"], "Feature");
    assert_eq!(collection["features"][0]["geometry"]["type"], "Point");
    assert_eq!(collection["features"][0]["properties"]["name"], "pond");
    assert_eq!(collection["features"][0]["properties"]["id"], 1);
    assert_eq!(collection["features"][0]["srid"], 25832);
}

#[rstest]
fn save_transforms_the_geometry_into_the_table_system() {
    let connection = MockConnection::new();
    let store = lakes_store(&connection, "postgresql");
    connection.push_scalar(Some(json!("POINT(370000 5700000)")));
    connection.push_affected(1);
    connection.push_scalar(Some(json!(9)));
    connection.push_rows(vec![json!({
        "id": 9,
        "name": "pond",
        "geom": "POINT(1 2)",
    })
    .as_object()
    .unwrap()
    .clone()]);

    let outcome = store
        .save(&json!({"name": "pond", "geom": "SRID=4326;POINT(1 2)"}), true)
        .unwrap();

    let SaveOutcome::Saved(Some(feature)) = outcome else {
        panic!("expected a re-fetched feature");
    };
    assert_eq!(feature.id(), Some(9));
    assert_eq!(feature.geometry(), Some("POINT(1 2)"));
    assert_eq!(feature.srid(), Some(4326));
    assert_eq!(
        connection.executed(),
        vec![
            "SELECT ST_ASTEXT(ST_TRANSFORM(ST_GEOMFROMEWKT('SRID=4326;POINT(1 2)'),25832))",
            "INSERT INTO lakes (name, geom) VALUES ('pond', 'POINT(370000 5700000)')",
            "SELECT LASTVAL()",
            "SELECT id, name, ST_ASTEXT(ST_TRANSFORM(geom, 4326)) AS geom \
             FROM lakes t WHERE id = 9",
        ]
    );
}

#[rstest]
fn save_refetches_in_the_submitted_reference_system() {
    let connection = MockConnection::new();
    let store = lakes_store(&connection, "postgresql");
    connection.push_scalar(Some(json!("POINT(370000 5700000)")));
    connection.push_affected(1);
    connection.push_rows(Vec::new());

    store
        .save(&json!({"id": 4, "geom": "SRID=4326;POINT(1 2)"}), true)
        .unwrap();

    assert_eq!(
        connection.executed().last().map(String::as_str),
        Some(
            "SELECT id, name, ST_ASTEXT(ST_TRANSFORM(geom, 4326)) AS geom \
             FROM lakes t WHERE id = 4"
        )
    );
}

#[rstest]
fn geometry_without_a_srid_is_transformed_from_the_table_system() {
    let connection = MockConnection::new();
    let store = lakes_store(&connection, "postgresql");
    connection.push_scalar(Some(json!("POINT(1 2)")));
    connection.push_affected(1);
    connection.push_scalar(Some(json!(3)));
    connection.push_rows(Vec::new());

    store.save(&json!({"name": "pond", "geom": "POINT(1 2)"}), true).unwrap();

    assert_eq!(
        connection.executed()[0],
        "SELECT ST_ASTEXT(ST_TRANSFORM(ST_GEOMFROMEWKT('SRID=25832;POINT(1 2)'),25832))"
    );
}

#[rstest]
fn the_table_srid_is_resolved_once_from_spatial_metadata() {
    let connection = MockConnection::new();
    let config = FeatureStoreConfig::new("lakes").with_fields(["name"]);
    let store = FeatureStore::open(Box::new(connection.clone()), "postgresql", &config).unwrap();
    connection.push_scalar(Some(json!(31468)));

    assert_eq!(store.srid().unwrap(), Some(31468));
    assert_eq!(store.srid().unwrap(), Some(31468));
    assert_eq!(
        connection.executed(),
        vec!["SELECT Find_SRID(current_schema()::text, 'lakes', 'geom')"]
    );
}

#[rstest]
fn writing_a_geometry_without_any_table_srid_is_rejected() {
    let connection = MockConnection::new();
    let config = FeatureStoreConfig::new("lakes").with_fields(["name"]);
    let store = FeatureStore::open(Box::new(connection.clone()), "postgresql", &config).unwrap();
    connection.push_scalar(None);

    let error = store
        .insert(&json!({"name": "pond", "geom": "POINT(1 2)"}))
        .unwrap_err();

    assert!(matches!(error, StoreError::InvalidInput(_)));
}

#[rstest]
fn update_with_nothing_to_write_is_rejected_before_any_sql() {
    let connection = MockConnection::new();
    let store = lakes_store(&connection, "postgresql");

    let error = store
        .update(&json!({"id": 3, "uncharted": true}))
        .unwrap_err();

    assert!(matches!(error, StoreError::InvalidInput(_)));
    assert!(connection.executed().is_empty());
}

#[rstest]
fn a_before_update_veto_skips_the_write() {
    let connection = MockConnection::new();
    let mut store = lakes_store(&connection, "postgresql");
    store.on(StoreEvent::BeforeUpdate, |ctx| ctx.cancel());

    let feature = store.update(&json!({"id": 3, "name": "pond"})).unwrap();

    assert_eq!(feature.id(), Some(3));
    assert!(connection.executed().is_empty());
}

#[rstest]
fn oracle_search_uses_its_dialect_and_lowercases_columns() {
    let connection = MockConnection::new();
    let store = lakes_store(&connection, "oracle");
    connection.push_rows(vec![json!({
        "ID": 2,
        "NAME": "See",
        "GEOM": "POINT(1 2)",
    })
    .as_object()
    .unwrap()
    .clone()]);

    let SearchResult::Features(features) = store.search(&SearchCriteria::new()).unwrap() else {
        panic!("expected plain features");
    };
    assert_eq!(features[0].id(), Some(2));
    assert_eq!(features[0].geometry(), Some("POINT(1 2)"));
    assert_eq!(
        connection.executed(),
        vec![
            "SELECT id, name, SDO_UTIL.TO_WKTGEOMETRY(SDO_CS.TRANSFORM(geom, 25832)) AS geom \
             FROM lakes t FETCH FIRST 5000 ROWS ONLY",
        ]
    );
}

#[rstest]
fn transform_ewkt_delegates_to_the_backend() {
    let connection = MockConnection::new();
    let store = lakes_store(&connection, "postgresql");
    connection.push_scalar(Some(json!("POINT(8 50)")));

    let wkt = store.transform_ewkt("SRID=25832;POINT(370000 5700000)", 4326).unwrap();

    assert_eq!(wkt, "POINT(8 50)");
}

#[rstest]
fn add_geometry_column_issues_the_platform_ddl() {
    let connection = MockConnection::new();
    let store = lakes_store(&connection, "postgresql");
    connection.push_affected(1);

    assert!(store.add_geometry_column("POINT", 25832, "public", 2).unwrap());
    assert_eq!(
        connection.executed(),
        vec!["SELECT AddGeometryColumn('public','lakes','geom',25832,'POINT',2)"]
    );
}

#[rstest]
fn add_geometry_column_degrades_on_oracle() {
    let connection = MockConnection::new();
    let store = lakes_store(&connection, "oracle");

    assert!(!store.add_geometry_column("POINT", 25832, "public", 2).unwrap());
    assert!(connection.executed().is_empty());
}
