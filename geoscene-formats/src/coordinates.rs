//! Parsing of coordinate strings found in XML formats.

use crate::error::FormatError;
use geoscene_types::Coord;
use regex::Regex;

/// Parses all numbers of a whitespace and/or comma separated list.
pub(crate) fn parse_numbers(text: &str) -> Result<Vec<f64>, FormatError> {
    text.split(|c: char| c.is_whitespace() || c == ',')
        .filter(|token| !token.is_empty())
        .map(|token| {
            token
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .ok_or_else(|| FormatError::InvalidCoordinates(format!("`{token}` is not a number")))
        })
        .collect()
}

/// Parses a list of positions in `lon,lat[,alt]` order.
///
/// Two layouts are accepted: comma separated tuples divided by whitespace
/// (`"lon,lat lon,lat"`, as in GML2 `coordinates` and KML) and a flat whitespace separated list
/// grouped by `dimension` (`"lon lat lon lat"`, as in GML3 `posList`).
pub(crate) fn parse_positions(text: &str, dimension: usize) -> Result<Vec<Coord>, FormatError> {
    lazy_static::lazy_static! {
        static ref SPACED_COMMA: Regex = Regex::new(r"\s*,\s*").expect("valid regex");
    }

    let text = text.trim();
    if text.is_empty() {
        return Err(FormatError::InvalidCoordinates("empty coordinate list".into()));
    }

    if text.contains(',') {
        let normalized = SPACED_COMMA.replace_all(text, ",");
        return normalized
            .split_whitespace()
            .map(|tuple| {
                let values = parse_numbers(tuple)?;
                Ok(Coord::from_slice(&values)?)
            })
            .collect();
    }

    let values = parse_numbers(text)?;
    let dimension = dimension.clamp(2, 3);
    if values.len() % dimension != 0 {
        return Err(FormatError::InvalidCoordinates(format!(
            "{} values cannot be split into positions of dimension {dimension}",
            values.len()
        )));
    }

    values
        .chunks(dimension)
        .map(|chunk| Ok(Coord::from_slice(chunk)?))
        .collect()
}

/// Parses a list of `lat lon` pairs (GeoRSS Simple order) into `lon, lat` positions.
pub(crate) fn parse_lat_lon_pairs(text: &str) -> Result<Vec<Coord>, FormatError> {
    let values = parse_numbers(text)?;
    if values.is_empty() || values.len() % 2 != 0 {
        return Err(FormatError::InvalidCoordinates(format!(
            "expected lat/lon pairs, got {} values",
            values.len()
        )));
    }

    Ok(values
        .chunks(2)
        .map(|pair| Coord::new(pair[1], pair[0]))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn comma_tuples() {
        let coords = parse_positions("139.0,35.0 140.0,36.0,12", 2).unwrap();
        assert_eq!(
            coords,
            vec![Coord::new(139.0, 35.0), Coord::with_alt(140.0, 36.0, 12.0)]
        );
    }

    #[test]
    fn spaces_around_commas_are_tolerated() {
        let coords = parse_positions("1, 2\n 3 ,4", 2).unwrap();
        assert_eq!(coords, vec![Coord::new(1.0, 2.0), Coord::new(3.0, 4.0)]);
    }

    #[test]
    fn flat_list_grouped_by_dimension() {
        let coords = parse_positions("1 2 3 4 5 6", 3).unwrap();
        assert_eq!(
            coords,
            vec![Coord::with_alt(1.0, 2.0, 3.0), Coord::with_alt(4.0, 5.0, 6.0)]
        );
        assert_matches!(
            parse_positions("1 2 3", 2),
            Err(FormatError::InvalidCoordinates(_))
        );
    }

    #[test]
    fn garbage_is_rejected() {
        assert_matches!(
            parse_positions("a,b", 2),
            Err(FormatError::InvalidCoordinates(_))
        );
        assert_matches!(parse_positions("  ", 2), Err(FormatError::InvalidCoordinates(_)));
        assert_matches!(parse_positions("1", 2), Err(FormatError::InvalidCoordinates(_)));
    }

    #[test]
    fn lat_lon_pairs_are_swapped() {
        let coords = parse_lat_lon_pairs("35 139 36 140").unwrap();
        assert_eq!(coords, vec![Coord::new(139.0, 35.0), Coord::new(140.0, 36.0)]);
        assert_matches!(
            parse_lat_lon_pairs("35 139 36"),
            Err(FormatError::InvalidCoordinates(_))
        );
    }
}
