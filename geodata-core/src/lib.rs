//! Domain types for the geodata access layer.
//!
//! This crate holds the backend-independent pieces: the generic
//! [`Record`] row container, its geometry-bearing [`Feature`]
//! specialisation, and the WKT/EWKT text utilities in [`geometry`].
//! Everything SQL-shaped lives in `geodata-store`.

#![forbid(unsafe_code)]

pub mod geometry;
mod feature;
mod record;

pub use feature::Feature;
pub use geometry::{GeometryError, DEFAULT_PRECISION};
pub use record::{Record, RecordError};
