//! GML feature collection reader.

use crate::coordinates::parse_positions;
use crate::document::{DocumentBuilder, Entry};
use crate::error::FormatError;
use crate::xml::{strip_namespace_prefixes, XmlElement};
use crate::{Format, FormatReader, ParseOptions, ParsedDocument};
use geoscene_types::geometry::close_ring;
use geoscene_types::{Coord, Geometry, PropertyMap, Ring};
use serde_json::Value;

/// Reads `FeatureCollection` documents with `featureMember` / `featureMembers` entries.
pub struct GmlReader;

impl FormatReader for GmlReader {
    fn read(&self, document: &str, options: &ParseOptions) -> Result<ParsedDocument, FormatError> {
        let root = XmlElement::parse(&strip_namespace_prefixes(document.to_string()))?;
        if root.name != "FeatureCollection" {
            return Err(FormatError::UnsupportedFormat(format!(
                "expected GML FeatureCollection, found `{}`",
                root.name
            )));
        }

        let members = root
            .children
            .iter()
            .filter(|c| c.name == "featureMember" || c.name == "featureMembers")
            .flat_map(|member| member.children.iter());

        let mut builder = DocumentBuilder::new(Format::Gml, options);
        for (index, member) in members.enumerate() {
            builder.push(index, member_id(member), read_member(member))?;
        }

        Ok(builder.finish())
    }
}

fn member_id(member: &XmlElement) -> Option<String> {
    member
        .attribute("fid")
        .or_else(|| member.attribute("id"))
        .map(str::to_string)
}

fn read_member(member: &XmlElement) -> Result<Entry, FormatError> {
    let mut properties = PropertyMap::new();
    let mut geometry = None;

    for child in &member.children {
        if child.name == "boundedBy" {
            continue;
        }

        if let Some(shape) = Shape::find_in(child) {
            if geometry.is_none() {
                geometry = Some(Geometry::try_from(shape)?);
            }
            continue;
        }

        if child.is_leaf() {
            properties.insert(child.name.clone(), Value::String(child.text().to_string()));
        }
    }

    let geometry = geometry.ok_or_else(|| {
        FormatError::MissingGeometryField(format!("feature member `{}` has no geometry", member.name))
    })?;

    Ok(Entry {
        id: member_id(member),
        properties,
        geometry,
    })
}

/// GML geometry element recognized by the reader.
#[derive(Debug, Copy, Clone)]
pub(crate) enum Shape<'a> {
    Point(&'a XmlElement),
    MultiPoint(&'a XmlElement),
    LineString(&'a XmlElement),
    MultiLineString(&'a XmlElement),
    Polygon(&'a XmlElement),
    MultiPolygon(&'a XmlElement),
}

impl<'a> Shape<'a> {
    /// Classifies the element itself.
    pub fn classify(element: &'a XmlElement) -> Option<Self> {
        Some(match element.name.as_str() {
            "Point" => Shape::Point(element),
            "MultiPoint" => Shape::MultiPoint(element),
            "LineString" | "LinearRing" => Shape::LineString(element),
            "MultiLineString" | "MultiCurve" => Shape::MultiLineString(element),
            "Polygon" => Shape::Polygon(element),
            "MultiPolygon" | "MultiSurface" => Shape::MultiPolygon(element),
            _ => return None,
        })
    }

    /// The element itself if it is a shape, otherwise its first shape descendant.
    pub fn find_in(element: &'a XmlElement) -> Option<Self> {
        Self::classify(element).or_else(|| {
            element
                .descendants()
                .into_iter()
                .find_map(|e| Self::classify(e))
        })
    }
}

impl TryFrom<Shape<'_>> for Geometry {
    type Error = FormatError;

    fn try_from(shape: Shape<'_>) -> Result<Self, Self::Error> {
        Ok(match shape {
            Shape::Point(e) => Geometry::Point(read_point(e)?),
            Shape::MultiPoint(e) => Geometry::MultiPoint(
                members(e, "Point")?
                    .into_iter()
                    .map(read_point)
                    .collect::<Result<_, _>>()?,
            ),
            Shape::LineString(e) => Geometry::LineString(read_positions(e)?),
            Shape::MultiLineString(e) => Geometry::MultiLineString(
                members(e, "LineString")?
                    .into_iter()
                    .map(read_positions)
                    .collect::<Result<_, _>>()?,
            ),
            Shape::Polygon(e) => Geometry::Polygon(read_polygon(e)?),
            Shape::MultiPolygon(e) => Geometry::MultiPolygon(
                members(e, "Polygon")?
                    .into_iter()
                    .map(read_polygon)
                    .collect::<Result<_, _>>()?,
            ),
        })
    }
}

fn members<'a>(element: &'a XmlElement, name: &str) -> Result<Vec<&'a XmlElement>, FormatError> {
    let found: Vec<_> = element
        .descendants()
        .into_iter()
        .filter(|e| e.name == name)
        .collect();
    if found.is_empty() {
        return Err(FormatError::MissingGeometryField(format!(
            "`{}` has no `{name}` members",
            element.name
        )));
    }

    Ok(found)
}

fn dimension(element: &XmlElement) -> usize {
    element
        .attribute("srsDimension")
        .or_else(|| element.attribute("dimension"))
        .and_then(|v| v.parse().ok())
        .unwrap_or(2)
}

fn read_point(point: &XmlElement) -> Result<Coord, FormatError> {
    let source = point
        .child("coordinates")
        .or_else(|| point.child("pos"))
        .ok_or_else(|| {
            FormatError::MissingGeometryField("Point has neither `coordinates` nor `pos`".into())
        })?;

    let mut positions = parse_positions(source.text(), dimension(source))?;
    match positions.len() {
        1 => Ok(positions.remove(0)),
        n => Err(FormatError::InvalidCoordinates(format!(
            "Point must have exactly one position, got {n}"
        ))),
    }
}

fn read_positions(line: &XmlElement) -> Result<Vec<Coord>, FormatError> {
    if let Some(coordinates) = line.child("coordinates") {
        return parse_positions(coordinates.text(), 2);
    }

    if let Some(pos_list) = line.child("posList") {
        let dim = pos_list
            .attribute("srsDimension")
            .map(|_| dimension(pos_list))
            .unwrap_or_else(|| dimension(line));
        return parse_positions(pos_list.text(), dim);
    }

    let points: Vec<_> = line
        .children
        .iter()
        .filter(|c| c.name == "pos" || c.name == "pointProperty" || c.name == "Point")
        .collect();
    if points.is_empty() {
        return Err(FormatError::MissingGeometryField(format!(
            "`{}` has no `coordinates`, `posList` or `pos`",
            line.name
        )));
    }

    points
        .into_iter()
        .map(|p| match p.name.as_str() {
            "pos" => {
                let mut coords = parse_positions(p.text(), dimension(p))?;
                coords.pop().ok_or_else(|| {
                    FormatError::InvalidCoordinates("empty `pos` element".into())
                })
            }
            "Point" => read_point(p),
            _ => p
                .child("Point")
                .ok_or_else(|| FormatError::MissingGeometryField("empty pointProperty".into()))
                .and_then(read_point),
        })
        .collect()
}

fn read_ring(boundary: &XmlElement) -> Result<Ring, FormatError> {
    let ring_element = boundary
        .child("LinearRing")
        .or_else(|| boundary.find(|e| e.name == "LinearRing"))
        .ok_or_else(|| {
            FormatError::MissingGeometryField(format!("`{}` has no LinearRing", boundary.name))
        })?;

    let mut ring = read_positions(ring_element)?;
    close_ring(&mut ring);
    if ring.len() < geoscene_types::geometry::MIN_RING_LEN {
        return Err(FormatError::InvalidCoordinates(format!(
            "ring has only {} positions",
            ring.len()
        )));
    }

    Ok(ring)
}

fn read_polygon(polygon: &XmlElement) -> Result<Vec<Ring>, FormatError> {
    let exterior = polygon
        .child("exterior")
        .or_else(|| polygon.child("outerBoundaryIs"))
        .ok_or_else(|| FormatError::MissingGeometryField("Polygon has no exterior ring".into()))?;

    let mut rings = vec![read_ring(exterior)?];
    for interior in polygon
        .children
        .iter()
        .filter(|c| c.name == "interior" || c.name == "innerBoundaryIs")
    {
        rings.push(read_ring(interior)?);
    }

    Ok(rings)
}
