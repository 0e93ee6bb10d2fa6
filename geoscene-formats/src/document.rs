use crate::error::FormatError;
use crate::{Format, ParseOptions};
use ahash::{HashSet, HashSetExt};
use geoscene_types::{Feature, Geometry, PropertyMap};

/// Result of reading a document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedDocument {
    /// Successfully read features in document order.
    pub features: Vec<Feature>,
    /// Problems with entries that were skipped or partially read.
    pub diagnostics: Vec<EntryDiagnostic>,
}

/// A problem with a single entry of a document.
#[derive(Debug, Clone, PartialEq)]
pub struct EntryDiagnostic {
    /// Position of the entry in the document.
    pub index: usize,
    /// Id of the entry, if the document had one.
    pub id: Option<String>,
    /// What went wrong.
    pub error: FormatError,
}

/// Raw entry content produced by a reader before id assignment.
pub(crate) struct Entry {
    pub id: Option<String>,
    pub properties: PropertyMap,
    pub geometry: Geometry,
}

/// Collects entries of one document, assigning ids and handling recoverable errors.
pub(crate) struct DocumentBuilder<'a> {
    options: &'a ParseOptions,
    id_prefix: String,
    seen_ids: HashSet<String>,
    document: ParsedDocument,
}

impl<'a> DocumentBuilder<'a> {
    pub fn new(format: Format, options: &'a ParseOptions) -> Self {
        Self {
            options,
            id_prefix: options
                .id_prefix
                .clone()
                .unwrap_or_else(|| format!("{format}-")),
            seen_ids: HashSet::new(),
            document: ParsedDocument::default(),
        }
    }

    /// Adds the result of reading the entry at `index`. `id_hint` is used for diagnostics when the
    /// entry could not be read.
    pub fn push(
        &mut self,
        index: usize,
        id_hint: Option<String>,
        entry: Result<Entry, FormatError>,
    ) -> Result<(), FormatError> {
        match entry {
            Ok(entry) => {
                self.push_feature(index, entry);
                Ok(())
            }
            Err(error) if error.is_entry_scoped() && self.options.skip_recoverable_errors => {
                log::warn!("Skipping entry {index} ({id_hint:?}): {error}");
                self.document.diagnostics.push(EntryDiagnostic {
                    index,
                    id: id_hint,
                    error,
                });
                Ok(())
            }
            Err(error) => Err(error),
        }
    }

    fn push_feature(&mut self, index: usize, entry: Entry) {
        let Entry {
            id,
            properties,
            mut geometry,
        } = entry;

        let id = id
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| format!("{}{index}", self.id_prefix));
        if !self.seen_ids.insert(id.clone()) {
            log::warn!("Duplicate feature id {id} in document");
        }

        geometry.close_rings();
        let mut feature = Feature {
            id,
            properties,
            geometry,
        };

        for name in feature.parse_json_properties(&self.options.json_properties) {
            self.document.diagnostics.push(EntryDiagnostic {
                index,
                id: Some(feature.id.clone()),
                error: FormatError::InvalidEntry(format!(
                    "property `{name}` is not a valid JSON document"
                )),
            });
        }

        self.document.features.push(feature);
    }

    pub fn finish(self) -> ParsedDocument {
        self.document
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use geoscene_types::Coord;
    use serde_json::json;

    fn entry(id: Option<&str>) -> Entry {
        Entry {
            id: id.map(str::to_string),
            properties: PropertyMap::new(),
            geometry: Geometry::Point(Coord::new(1.0, 2.0)),
        }
    }

    #[test]
    fn missing_ids_are_synthesized_from_position() {
        let options = ParseOptions::default();
        let mut builder = DocumentBuilder::new(Format::Gml, &options);
        builder.push(0, None, Ok(entry(Some("a")))).unwrap();
        builder.push(1, None, Ok(entry(None))).unwrap();
        builder.push(2, None, Ok(entry(Some("")))).unwrap();

        let ids: Vec<_> = builder.finish().features.into_iter().map(|f| f.id).collect();
        assert_eq!(ids, vec!["a", "gml-1", "gml-2"]);
    }

    #[test]
    fn duplicate_ids_are_kept() {
        let options = ParseOptions::default();
        let mut builder = DocumentBuilder::new(Format::Kml, &options);
        builder.push(0, None, Ok(entry(Some("a")))).unwrap();
        builder.push(1, None, Ok(entry(Some("a")))).unwrap();
        builder.push(2, None, Ok(entry(Some("b")))).unwrap();

        let document = builder.finish();
        let ids: Vec<_> = document.features.iter().map(|f| f.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "a", "b"]);
        assert!(document.diagnostics.is_empty());
    }

    #[test]
    fn entry_errors_are_fatal_when_not_skipping() {
        let options = ParseOptions {
            skip_recoverable_errors: false,
            ..Default::default()
        };
        let mut builder = DocumentBuilder::new(Format::Kml, &options);
        let result = builder.push(
            0,
            None,
            Err(FormatError::MissingGeometryField("Point".into())),
        );
        assert_matches!(result, Err(FormatError::MissingGeometryField(_)));
    }

    #[test]
    fn undecodable_json_property_is_reported() {
        let options = ParseOptions {
            json_properties: vec!["attrs".into()],
            ..Default::default()
        };
        let mut builder = DocumentBuilder::new(Format::GeoJson, &options);
        let mut good = entry(Some("good"));
        good.properties.insert("attrs".into(), json!("{\"a\":1}"));
        let mut bad = entry(Some("bad"));
        bad.properties.insert("attrs".into(), json!("{oops"));
        builder.push(0, None, Ok(good)).unwrap();
        builder.push(1, None, Ok(bad)).unwrap();

        let document = builder.finish();
        assert_eq!(document.features.len(), 2);
        assert_eq!(document.features[0].property("attrs"), Some(&json!({"a": 1})));
        assert_eq!(document.diagnostics.len(), 1);
        assert_eq!(document.diagnostics[0].id.as_deref(), Some("bad"));
    }
}
