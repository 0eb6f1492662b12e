//! Backend-agnostic data access over relational tables.
//!
//! The crate splits into three layers. [`driver`] abstracts the backend:
//! an opaque [`Connection`] handle, the [`Driver`] contract, and the
//! table-driven SQL dialect dispatch that keeps PostgreSQL and Oracle
//! differences out of the call sites. [`query`] renders select
//! statements. [`store`] orchestrates: [`DataStore`] for plain CRUD and
//! search, [`FeatureStore`] for geometry-bearing tables with reprojection
//! on both the read and write paths.
//!
//! Real database client crates stay outside: hosts implement
//! [`Connection`] over whatever handle their pool provides and pass it
//! in. The `test-support` feature exposes a scripted mock connection for
//! downstream test suites.

#![forbid(unsafe_code)]

mod driver;
mod error;
pub mod query;
mod store;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use driver::{
    platform, Connection, ConnectionError, Driver, Geographic, Mappable, Row, SqlDriver,
    ThroughMapping, Treeable,
};
pub use error::StoreError;
pub use query::SelectBuilder;
pub use store::{
    to_feature_collection, DataStore, DataStoreConfig, FeatureStore, FeatureStoreConfig,
    HookContext, HookRegistry, ReturnType, SaveFailure, SaveOutcome, SearchCriteria, SearchResult,
    StoreEvent, DEFAULT_MAX_RESULTS,
};
