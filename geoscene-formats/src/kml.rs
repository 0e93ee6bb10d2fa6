//! KML placemark reader.

use crate::coordinates::parse_positions;
use crate::document::{DocumentBuilder, Entry};
use crate::error::FormatError;
use crate::xml::{strip_namespace_prefixes, XmlElement};
use crate::{Format, FormatReader, ParseOptions, ParsedDocument};
use geoscene_types::geometry::{close_ring, MIN_RING_LEN};
use geoscene_types::{Coord, Geometry, PropertyMap, Ring};
use serde_json::Value;

const GEOMETRY_ELEMENTS: [&str; 5] = ["Point", "LineString", "LinearRing", "Polygon", "MultiGeometry"];

/// Reads every `Placemark` of a KML document, at any folder depth.
pub struct KmlReader;

impl FormatReader for KmlReader {
    fn read(&self, document: &str, options: &ParseOptions) -> Result<ParsedDocument, FormatError> {
        let root = XmlElement::parse(&strip_namespace_prefixes(document.to_string()))?;
        if root.name != "kml" {
            return Err(FormatError::UnsupportedFormat(format!(
                "expected `kml` root, found `{}`",
                root.name
            )));
        }

        let mut builder = DocumentBuilder::new(Format::Kml, options);
        let placemarks = root
            .descendants()
            .into_iter()
            .filter(|e| e.name == "Placemark");
        for (index, placemark) in placemarks.enumerate() {
            let id = placemark.attribute("id").map(str::to_string);
            builder.push(index, id, read_placemark(placemark))?;
        }

        Ok(builder.finish())
    }
}

fn read_placemark(placemark: &XmlElement) -> Result<Entry, FormatError> {
    let geometry_element = placemark
        .children
        .iter()
        .find(|c| GEOMETRY_ELEMENTS.contains(&c.name.as_str()))
        .ok_or_else(|| FormatError::MissingGeometryField("Placemark has no geometry".into()))?;

    Ok(Entry {
        id: placemark.attribute("id").map(str::to_string),
        properties: read_properties(placemark),
        geometry: read_geometry(geometry_element)?,
    })
}

fn read_properties(placemark: &XmlElement) -> PropertyMap {
    let mut properties = PropertyMap::new();
    for child in &placemark.children {
        if child.is_leaf() && !GEOMETRY_ELEMENTS.contains(&child.name.as_str()) {
            properties.insert(child.name.clone(), Value::String(child.text().to_string()));
        }
    }

    if let Some(extended) = placemark.child("ExtendedData") {
        for data in extended.children_named("Data") {
            if let Some(name) = data.attribute("name") {
                let value = data.child_text("value").unwrap_or_default();
                properties.insert(name.to_string(), Value::String(value.to_string()));
            }
        }

        for simple in extended
            .descendants()
            .into_iter()
            .filter(|e| e.name == "SimpleData")
        {
            if let Some(name) = simple.attribute("name") {
                properties.insert(name.to_string(), Value::String(simple.text().to_string()));
            }
        }
    }

    properties
}

fn coordinates(element: &XmlElement) -> Result<Vec<Coord>, FormatError> {
    let text = element.child_text("coordinates").ok_or_else(|| {
        FormatError::MissingGeometryField(format!("`{}` has no coordinates", element.name))
    })?;
    parse_positions(text, 3)
}

fn ring(boundary: &XmlElement) -> Result<Ring, FormatError> {
    let linear_ring = boundary.child("LinearRing").ok_or_else(|| {
        FormatError::MissingGeometryField(format!("`{}` has no LinearRing", boundary.name))
    })?;
    let mut ring = coordinates(linear_ring)?;
    close_ring(&mut ring);
    if ring.len() < MIN_RING_LEN {
        return Err(FormatError::InvalidCoordinates(format!(
            "ring has only {} positions",
            ring.len()
        )));
    }

    Ok(ring)
}

fn read_geometry(element: &XmlElement) -> Result<Geometry, FormatError> {
    match element.name.as_str() {
        "Point" => {
            let mut coords = coordinates(element)?;
            if coords.len() != 1 {
                return Err(FormatError::InvalidCoordinates(format!(
                    "Point must have one position, got {}",
                    coords.len()
                )));
            }
            Ok(Geometry::Point(coords.remove(0)))
        }
        "LineString" | "LinearRing" => Ok(Geometry::LineString(coordinates(element)?)),
        "Polygon" => {
            let outer = element.child("outerBoundaryIs").ok_or_else(|| {
                FormatError::MissingGeometryField("Polygon has no outerBoundaryIs".into())
            })?;
            let mut rings = vec![ring(outer)?];
            for inner in element.children_named("innerBoundaryIs") {
                rings.push(ring(inner)?);
            }
            Ok(Geometry::Polygon(rings))
        }
        "MultiGeometry" => read_multi_geometry(element),
        other => Err(FormatError::MissingGeometryField(format!(
            "unsupported KML geometry `{other}`"
        ))),
    }
}

fn read_multi_geometry(element: &XmlElement) -> Result<Geometry, FormatError> {
    let members = element
        .children
        .iter()
        .filter(|c| GEOMETRY_ELEMENTS.contains(&c.name.as_str()))
        .map(read_geometry)
        .collect::<Result<Vec<_>, _>>()?;

    let mut points = vec![];
    let mut lines = vec![];
    let mut polygons = vec![];
    for member in &members {
        match member {
            Geometry::Point(p) => points.push(*p),
            Geometry::LineString(l) => lines.push(l.clone()),
            Geometry::Polygon(p) => polygons.push(p.clone()),
            _ => {}
        }
    }

    let count = members.len();
    if count == 0 {
        return Err(FormatError::MissingGeometryField("empty MultiGeometry".into()));
    }

    Ok(if points.len() == count {
        Geometry::MultiPoint(points)
    } else if lines.len() == count {
        Geometry::MultiLineString(lines)
    } else if polygons.len() == count {
        Geometry::MultiPolygon(polygons)
    } else {
        log::warn!("MultiGeometry with mixed members, only the first one is used");
        members.into_iter().next().ok_or_else(|| {
            FormatError::MissingGeometryField("empty MultiGeometry".into())
        })?
    })
}
