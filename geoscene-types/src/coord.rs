//! See [`Coord`].

use crate::error::TypesError;
use serde::{Deserialize, Serialize};

/// A position in `(longitude, latitude, altitude?)` order.
///
/// Altitude is only present when the source document carries it; it is never inferred. The
/// serialized form is the GeoJSON position array `[lng, lat]` or `[lng, lat, alt]`.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<f64>", into = "Vec<f64>")]
pub struct Coord {
    /// Longitude (x).
    pub lng: f64,
    /// Latitude (y).
    pub lat: f64,
    /// Optional altitude (z).
    pub alt: Option<f64>,
}

impl Coord {
    /// Creates a 2d position.
    pub const fn new(lng: f64, lat: f64) -> Self {
        Self {
            lng,
            lat,
            alt: None,
        }
    }

    /// Creates a position with altitude.
    pub const fn with_alt(lng: f64, lat: f64, alt: f64) -> Self {
        Self {
            lng,
            lat,
            alt: Some(alt),
        }
    }

    /// Builds a position from a slice of ordinates in `lng, lat, alt?` order.
    ///
    /// Ordinates past the third are ignored. Fails if fewer than two values are given or any of
    /// the used values is not finite.
    pub fn from_slice(values: &[f64]) -> Result<Self, TypesError> {
        let (lng, lat, alt) = match values {
            [lng, lat] => (*lng, *lat, None),
            [lng, lat, alt, ..] => (*lng, *lat, Some(*alt)),
            _ => {
                return Err(TypesError::Conversion(format!(
                    "position needs at least 2 ordinates, got {}",
                    values.len()
                )))
            }
        };

        if !lng.is_finite() || !lat.is_finite() || alt.is_some_and(|v| !v.is_finite()) {
            return Err(TypesError::Conversion(format!(
                "position has non-finite ordinates: {values:?}"
            )));
        }

        Ok(Self { lng, lat, alt })
    }

    /// Returns the ordinates as a vector in `lng, lat, alt?` order.
    pub fn to_vec(&self) -> Vec<f64> {
        match self.alt {
            Some(alt) => vec![self.lng, self.lat, alt],
            None => vec![self.lng, self.lat],
        }
    }
}

impl TryFrom<Vec<f64>> for Coord {
    type Error = TypesError;

    fn try_from(value: Vec<f64>) -> Result<Self, Self::Error> {
        Self::from_slice(&value)
    }
}

impl From<Coord> for Vec<f64> {
    fn from(value: Coord) -> Self {
        value.to_vec()
    }
}

impl From<(f64, f64)> for Coord {
    fn from((lng, lat): (f64, f64)) -> Self {
        Self::new(lng, lat)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn altitude_is_kept_only_when_present() {
        let c = Coord::from_slice(&[10.0, 20.0]).unwrap();
        assert_eq!(c.alt, None);
        assert_eq!(c.to_vec(), vec![10.0, 20.0]);

        let c = Coord::from_slice(&[10.0, 20.0, 5.0, 99.0]).unwrap();
        assert_eq!(c, Coord::with_alt(10.0, 20.0, 5.0));
    }

    #[test]
    fn short_or_non_finite_positions_are_rejected() {
        assert_matches!(Coord::from_slice(&[1.0]), Err(TypesError::Conversion(_)));
        assert_matches!(
            Coord::from_slice(&[f64::NAN, 1.0]),
            Err(TypesError::Conversion(_))
        );
    }

    #[test]
    fn serializes_as_position_array() {
        let json = serde_json::to_string(&Coord::with_alt(139.5, 35.25, 12.0)).unwrap();
        assert_eq!(json, "[139.5,35.25,12.0]");

        let parsed: Coord = serde_json::from_str("[1.5,2.5]").unwrap();
        assert_eq!(parsed, Coord::new(1.5, 2.5));
    }
}
