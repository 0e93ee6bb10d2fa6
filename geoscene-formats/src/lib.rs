//! Readers converting geospatial documents into [`Feature`]s.
//!
//! Every reader takes already fetched text and returns a [`ParsedDocument`]: the features that
//! could be read plus a list of per-entry diagnostics. A broken entry never aborts the document
//! unless [`ParseOptions::skip_recoverable_errors`] is turned off; a document whose root is not
//! recognized fails with [`FormatError::UnsupportedFormat`].

use geoscene_types::Feature;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

mod coordinates;
mod document;
pub mod error;
mod geojson;
mod georss;
mod gml;
mod kml;
pub mod xml;

pub use document::{EntryDiagnostic, ParsedDocument};
pub use error::FormatError;
pub use self::geojson::GeoJsonReader;
pub use georss::GeoRssReader;
pub use gml::GmlReader;
pub use kml::KmlReader;

/// Format of a source document.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    #[default]
    Auto,
    GeoJson,
    Gml,
    GeoRss,
    Kml,
}

impl Format {
    /// Guesses the format from the document text. JSON documents are taken for GeoJSON, XML ones
    /// are recognized by their root element.
    pub fn detect(document: &str) -> Option<Format> {
        let trimmed = document.trim_start_matches('\u{feff}').trim_start();
        if trimmed.starts_with('{') {
            return Some(Format::GeoJson);
        }

        if !trimmed.starts_with('<') {
            return None;
        }

        let stripped = xml::strip_namespace_prefixes(trimmed.to_string());
        match xml::root_name(&stripped)?.as_str() {
            "FeatureCollection" => Some(Format::Gml),
            "rss" | "feed" => Some(Format::GeoRss),
            "kml" => Some(Format::Kml),
            _ => None,
        }
    }

    fn reader(&self) -> Option<&'static dyn FormatReader> {
        match self {
            Format::Auto => None,
            Format::GeoJson => Some(&GeoJsonReader),
            Format::Gml => Some(&GmlReader),
            Format::GeoRss => Some(&GeoRssReader),
            Format::Kml => Some(&KmlReader),
        }
    }
}

impl Display for Format {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Format::Auto => "auto",
            Format::GeoJson => "geojson",
            Format::Gml => "gml",
            Format::GeoRss => "georss",
            Format::Kml => "kml",
        };
        f.write_str(name)
    }
}

/// Options shared by all readers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ParseOptions {
    /// Properties whose string values are JSON documents and are to be decoded.
    pub json_properties: Vec<String>,
    /// If false, the first broken entry fails the whole document.
    pub skip_recoverable_errors: bool,
    /// Prefix for ids synthesized for entries without one. Defaults to `"<format>-"`.
    pub id_prefix: Option<String>,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            json_properties: vec![],
            skip_recoverable_errors: true,
            id_prefix: None,
        }
    }
}

/// Reader of a single document format.
pub trait FormatReader {
    /// Reads the document into features.
    fn read(&self, document: &str, options: &ParseOptions) -> Result<ParsedDocument, FormatError>;
}

/// Reads a document of the given format. With [`Format::Auto`] the format is detected first.
pub fn parse(
    document: &str,
    format: Format,
    options: &ParseOptions,
) -> Result<ParsedDocument, FormatError> {
    let format = match format {
        Format::Auto => Format::detect(document).ok_or_else(|| {
            FormatError::UnsupportedFormat("cannot detect document format".into())
        })?,
        other => other,
    };

    let reader = format
        .reader()
        .ok_or_else(|| FormatError::UnsupportedFormat(format.to_string()))?;
    let parsed = reader.read(document, options)?;

    log::debug!(
        "Read {} {format} features with {} diagnostics",
        parsed.features.len(),
        parsed.diagnostics.len()
    );

    Ok(parsed)
}

/// Same as [`parse`] for raw bytes. The bytes must be UTF-8.
pub fn parse_bytes(
    document: &[u8],
    format: Format,
    options: &ParseOptions,
) -> Result<ParsedDocument, FormatError> {
    let text = std::str::from_utf8(document).map_err(|_| FormatError::Encoding)?;
    parse(text, format, options)
}

/// Convenience wrapper returning only the features.
pub fn parse_features(
    document: &str,
    format: Format,
    options: &ParseOptions,
) -> Result<Vec<Feature>, FormatError> {
    parse(document, format, options).map(|parsed| parsed.features)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn detects_formats() {
        assert_eq!(Format::detect("  {\"type\": \"Point\"}"), Some(Format::GeoJson));
        assert_eq!(
            Format::detect("<?xml version=\"1.0\"?><wfs:FeatureCollection/>"),
            Some(Format::Gml)
        );
        assert_eq!(Format::detect("<rss version=\"2.0\"/>"), Some(Format::GeoRss));
        assert_eq!(
            Format::detect("<feed xmlns=\"http://www.w3.org/2005/Atom\"></feed>"),
            Some(Format::GeoRss)
        );
        assert_eq!(Format::detect("<!-- c --><kml></kml>"), Some(Format::Kml));
        assert_eq!(Format::detect("<html></html>"), None);
        assert_eq!(Format::detect("lat,lng"), None);
    }

    #[test]
    fn unknown_document_fails_fast() {
        assert_matches!(
            parse("<html/>", Format::Auto, &ParseOptions::default()),
            Err(FormatError::UnsupportedFormat(_))
        );
        assert_matches!(
            parse_bytes(&[0xff, 0xfe], Format::GeoJson, &ParseOptions::default()),
            Err(FormatError::Encoding)
        );
    }

    #[test]
    fn format_names_round_trip_through_serde() {
        let format: Format = serde_json::from_str("\"georss\"").unwrap();
        assert_eq!(format, Format::GeoRss);
        assert_eq!(serde_json::to_string(&Format::GeoJson).unwrap(), "\"geojson\"");
    }
}
