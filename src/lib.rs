//! Facade crate for the geodata access layer.
//!
//! Re-exports the record model and geometry utilities from
//! [`geodata_core`] and the driver/store machinery from
//! [`geodata_store`], so hosts can depend on a single crate.

#![forbid(unsafe_code)]

pub use geodata_core::{
    geometry, Feature, GeometryError, Record, RecordError, DEFAULT_PRECISION,
};
pub use geodata_store::{
    to_feature_collection, Connection, ConnectionError, DataStore, DataStoreConfig, Driver,
    FeatureStore, FeatureStoreConfig, Geographic, HookContext, HookRegistry, Mappable, ReturnType,
    Row, SaveFailure, SaveOutcome, SearchCriteria, SearchResult, SelectBuilder, SqlDriver,
    StoreError, StoreEvent, ThroughMapping, Treeable, DEFAULT_MAX_RESULTS,
};
