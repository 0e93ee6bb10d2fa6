//! See [`Geometry`].

use crate::coord::Coord;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Closed sequence of positions bounding a polygon or a hole in it.
pub type Ring = Vec<Coord>;

/// Minimal number of positions in a closed ring (a triangle plus the closing vertex).
pub const MIN_RING_LEN: usize = 4;

/// Canonical geometry of a feature.
///
/// Serializes into the GeoJSON geometry shape `{"type": ..., "coordinates": ...}`. For polygons
/// the first ring is the exterior one and the rest are holes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "coordinates")]
pub enum Geometry {
    /// Single position.
    Point(Coord),
    /// Set of positions.
    MultiPoint(Vec<Coord>),
    /// Open or closed line.
    LineString(Vec<Coord>),
    /// Set of lines.
    MultiLineString(Vec<Vec<Coord>>),
    /// Exterior ring followed by interior rings.
    Polygon(Vec<Ring>),
    /// Set of polygons.
    MultiPolygon(Vec<Vec<Ring>>),
}

/// Kind of a [`Geometry`] without its coordinates.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum GeometryType {
    /// See [`Geometry::Point`].
    Point,
    /// See [`Geometry::MultiPoint`].
    MultiPoint,
    /// See [`Geometry::LineString`].
    LineString,
    /// See [`Geometry::MultiLineString`].
    MultiLineString,
    /// See [`Geometry::Polygon`].
    Polygon,
    /// See [`Geometry::MultiPolygon`].
    MultiPolygon,
}

impl GeometryType {
    /// GeoJSON name of the geometry type.
    pub fn name(&self) -> &'static str {
        match self {
            GeometryType::Point => "Point",
            GeometryType::MultiPoint => "MultiPoint",
            GeometryType::LineString => "LineString",
            GeometryType::MultiLineString => "MultiLineString",
            GeometryType::Polygon => "Polygon",
            GeometryType::MultiPolygon => "MultiPolygon",
        }
    }

    /// Looks up a geometry type by name, ignoring ASCII case.
    pub fn from_name(name: &str) -> Option<Self> {
        [
            GeometryType::Point,
            GeometryType::MultiPoint,
            GeometryType::LineString,
            GeometryType::MultiLineString,
            GeometryType::Polygon,
            GeometryType::MultiPolygon,
        ]
        .into_iter()
        .find(|t| t.name().eq_ignore_ascii_case(name))
    }
}

impl Display for GeometryType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl Geometry {
    /// Type of the geometry.
    pub fn geometry_type(&self) -> GeometryType {
        match self {
            Geometry::Point(_) => GeometryType::Point,
            Geometry::MultiPoint(_) => GeometryType::MultiPoint,
            Geometry::LineString(_) => GeometryType::LineString,
            Geometry::MultiLineString(_) => GeometryType::MultiLineString,
            Geometry::Polygon(_) => GeometryType::Polygon,
            Geometry::MultiPolygon(_) => GeometryType::MultiPolygon,
        }
    }

    /// Iterates over every position of the geometry in storage order.
    pub fn coords(&self) -> Box<dyn Iterator<Item = &Coord> + '_> {
        match self {
            Geometry::Point(c) => Box::new(std::iter::once(c)),
            Geometry::MultiPoint(v) | Geometry::LineString(v) => Box::new(v.iter()),
            Geometry::MultiLineString(v) | Geometry::Polygon(v) => Box::new(v.iter().flatten()),
            Geometry::MultiPolygon(v) => Box::new(v.iter().flatten().flatten()),
        }
    }

    /// Iterates over all polygon rings. Empty for non-areal geometries.
    pub fn rings(&self) -> Box<dyn Iterator<Item = &Ring> + '_> {
        match self {
            Geometry::Polygon(rings) => Box::new(rings.iter()),
            Geometry::MultiPolygon(polygons) => Box::new(polygons.iter().flatten()),
            _ => Box::new(std::iter::empty()),
        }
    }

    /// Returns true if every polygon ring has at least [`MIN_RING_LEN`] positions and ends with
    /// its first position. Always true for non-areal geometries.
    pub fn rings_closed(&self) -> bool {
        self.rings().all(|ring| is_ring_closed(ring))
    }

    /// Appends the closing vertex to every polygon ring that lacks it.
    pub fn close_rings(&mut self) {
        match self {
            Geometry::Polygon(rings) => rings.iter_mut().for_each(close_ring),
            Geometry::MultiPolygon(polygons) => polygons
                .iter_mut()
                .flatten()
                .for_each(close_ring),
            _ => {}
        }
    }
}

/// Returns true if the ring has enough positions and its last position repeats the first one.
pub fn is_ring_closed(ring: &[Coord]) -> bool {
    ring.len() >= MIN_RING_LEN && ring.first() == ring.last()
}

/// Appends a copy of the first position to the ring if the ring is not already closed.
pub fn close_ring(ring: &mut Ring) {
    if let (Some(first), Some(last)) = (ring.first(), ring.last()) {
        if first != last || ring.len() == 1 {
            let first = *first;
            ring.push(first);
        }
    }
}

impl From<Coord> for Geometry {
    fn from(value: Coord) -> Self {
        Self::Point(value)
    }
}
