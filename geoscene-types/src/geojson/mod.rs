//! Conversions between the geoscene model and the [`geojson`] crate types.
//!
//! Reading closes polygon rings that lack the closing vertex, so every polygon coming out of
//! [`Geometry::try_from`] satisfies [`Geometry::rings_closed`]. Rings that are still shorter than
//! [`MIN_RING_LEN`] after closing are rejected.

use crate::coord::Coord;
use crate::error::TypesError;
use crate::feature::Feature;
use crate::geometry::{close_ring, Geometry, Ring, MIN_RING_LEN};
use geojson::{LineStringType, PolygonType, Position, Value};

impl TryFrom<&geojson::Geometry> for Geometry {
    type Error = TypesError;

    fn try_from(value: &geojson::Geometry) -> Result<Self, Self::Error> {
        Geometry::try_from(&value.value)
    }
}

impl TryFrom<&Value> for Geometry {
    type Error = TypesError;

    fn try_from(value: &Value) -> Result<Self, Self::Error> {
        Ok(match value {
            Value::Point(p) => Geometry::Point(convert_position(p)?),
            Value::MultiPoint(points) => Geometry::MultiPoint(convert_positions(points)?),
            Value::LineString(line) => Geometry::LineString(convert_positions(line)?),
            Value::MultiLineString(lines) => Geometry::MultiLineString(
                lines
                    .iter()
                    .map(|l| convert_positions(l))
                    .collect::<Result<_, _>>()?,
            ),
            Value::Polygon(polygon) => Geometry::Polygon(convert_polygon(polygon)?),
            Value::MultiPolygon(mp) => Geometry::MultiPolygon(
                mp.iter().map(convert_polygon).collect::<Result<_, _>>()?,
            ),
            Value::GeometryCollection(_) => {
                return Err(TypesError::Conversion(
                    "geometry collections are not supported".into(),
                ))
            }
        })
    }
}

fn convert_position(position: &Position) -> Result<Coord, TypesError> {
    Coord::from_slice(position)
}

fn convert_positions(positions: &LineStringType) -> Result<Vec<Coord>, TypesError> {
    positions.iter().map(convert_position).collect()
}

fn convert_polygon(polygon: &PolygonType) -> Result<Vec<Ring>, TypesError> {
    if polygon.is_empty() {
        return Err(TypesError::Conversion("polygon without rings".into()));
    }

    polygon
        .iter()
        .map(|ring| {
            let mut ring = convert_positions(ring)?;
            close_ring(&mut ring);
            if ring.len() < MIN_RING_LEN {
                return Err(TypesError::Conversion(format!(
                    "polygon ring has only {} positions",
                    ring.len()
                )));
            }
            Ok(ring)
        })
        .collect()
}

impl From<&Geometry> for geojson::Geometry {
    fn from(value: &Geometry) -> Self {
        let positions =
            |coords: &Vec<Coord>| -> Vec<Position> { coords.iter().map(Coord::to_vec).collect() };
        let value = match value {
            Geometry::Point(c) => Value::Point(c.to_vec()),
            Geometry::MultiPoint(v) => Value::MultiPoint(positions(v)),
            Geometry::LineString(v) => Value::LineString(positions(v)),
            Geometry::MultiLineString(v) => Value::MultiLineString(v.iter().map(positions).collect()),
            Geometry::Polygon(v) => Value::Polygon(v.iter().map(positions).collect()),
            Geometry::MultiPolygon(v) => Value::MultiPolygon(
                v.iter()
                    .map(|polygon| polygon.iter().map(positions).collect())
                    .collect(),
            ),
        };

        geojson::Geometry::new(value)
    }
}

impl From<&Feature> for geojson::Feature {
    fn from(value: &Feature) -> Self {
        geojson::Feature {
            bbox: None,
            geometry: Some((&value.geometry).into()),
            id: Some(geojson::feature::Id::String(value.id.clone())),
            properties: Some(value.properties.clone()),
            foreign_members: None,
        }
    }
}
