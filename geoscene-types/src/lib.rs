//! Geometry and feature model shared by the geoscene crates.
//!
//! Every format reader produces [`Feature`]s carrying one [`Geometry`] built from [`Coord`]s in
//! `[longitude, latitude, altitude?]` order. Nothing in this crate reprojects coordinates: the
//! values are kept in whatever reference frame the source document used.

pub mod coord;
pub mod error;
pub mod feature;
pub mod geometry;

#[cfg(feature = "geojson")]
pub mod geojson;

pub use coord::Coord;
pub use feature::{Feature, PropertyMap};
pub use geometry::{Geometry, GeometryType, Ring};
