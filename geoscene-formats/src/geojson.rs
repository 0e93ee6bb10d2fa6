//! GeoJSON reader.

use crate::document::{DocumentBuilder, Entry};
use crate::error::FormatError;
use crate::{Format, FormatReader, ParseOptions, ParsedDocument};
use geoscene_types::{Geometry, GeometryType};
use serde_json::Value;

/// Reads `FeatureCollection`, single `Feature` and bare geometry documents.
///
/// Type names are matched case-insensitively and rewritten to their canonical spelling before the
/// features are decoded, so `{"type": "point"}` is read as a `Point`.
pub struct GeoJsonReader;

impl FormatReader for GeoJsonReader {
    fn read(&self, document: &str, options: &ParseOptions) -> Result<ParsedDocument, FormatError> {
        let root: Value =
            serde_json::from_str(document).map_err(|e| FormatError::Json(e.to_string()))?;

        let entries = match type_name(&root).as_deref() {
            Some("FeatureCollection") => match root.get("features") {
                Some(Value::Array(features)) => features.clone(),
                _ => {
                    return Err(FormatError::UnsupportedFormat(
                        "FeatureCollection without a features array".into(),
                    ))
                }
            },
            Some("Feature") => vec![root],
            Some(name) if is_geometry_type(name) => vec![serde_json::json!({
                "type": "Feature",
                "properties": {},
                "geometry": root,
            })],
            _ => {
                return Err(FormatError::UnsupportedFormat(
                    "document is not a GeoJSON object".into(),
                ))
            }
        };

        let mut builder = DocumentBuilder::new(Format::GeoJson, options);
        for (index, entry) in entries.into_iter().enumerate() {
            let id_hint = entry.get("id").and_then(id_to_string);
            builder.push(index, id_hint, read_feature(entry))?;
        }

        Ok(builder.finish())
    }
}

fn type_name(value: &Value) -> Option<String> {
    let name = value.get("type")?.as_str()?;
    Some(canonical_type_name(name).unwrap_or(name).to_string())
}

fn canonical_type_name(name: &str) -> Option<&'static str> {
    if name.eq_ignore_ascii_case("FeatureCollection") {
        return Some("FeatureCollection");
    }
    if name.eq_ignore_ascii_case("Feature") {
        return Some("Feature");
    }
    if name.eq_ignore_ascii_case("GeometryCollection") {
        return Some("GeometryCollection");
    }

    GeometryType::from_name(name).map(|t| t.name())
}

fn is_geometry_type(name: &str) -> bool {
    name == "GeometryCollection" || GeometryType::from_name(name).is_some()
}

/// Rewrites every `type` member of the object tree into its canonical spelling.
fn canonicalize(value: &mut Value) {
    match value {
        Value::Object(object) => {
            if let Some(Value::String(name)) = object.get_mut("type") {
                if let Some(canonical) = canonical_type_name(name) {
                    *name = canonical.to_string();
                }
            }

            for (key, member) in object.iter_mut() {
                if key == "geometry" || key == "geometries" {
                    canonicalize(member);
                }
            }
        }
        Value::Array(items) => items.iter_mut().for_each(canonicalize),
        _ => {}
    }
}

fn id_to_string(id: &Value) -> Option<String> {
    match id {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn read_feature(mut value: Value) -> Result<Entry, FormatError> {
    canonicalize(&mut value);
    let feature = geojson::Feature::from_json_value(value)
        .map_err(|e| FormatError::InvalidEntry(e.to_string()))?;

    let geometry = feature
        .geometry
        .as_ref()
        .ok_or_else(|| FormatError::MissingGeometryField("feature geometry is null".into()))?;

    Ok(Entry {
        id: feature.id.as_ref().map(|id| match id {
            geojson::feature::Id::String(s) => s.clone(),
            geojson::feature::Id::Number(n) => n.to_string(),
        }),
        geometry: Geometry::try_from(geometry)?,
        properties: feature.properties.unwrap_or_default(),
    })
}
