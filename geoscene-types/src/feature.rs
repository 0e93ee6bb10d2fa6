//! See [`Feature`].

use crate::geometry::Geometry;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Ordered map of feature properties. Keys keep the order they had in the source document.
pub type PropertyMap = serde_json::Map<String, Value>;

/// A single geometry with its properties, extracted from a source document.
///
/// The `id` is assigned by the format reader: the document's own id if it has one, a synthesized
/// one otherwise. Ids are expected to be unique within one parsed document, but this type does not
/// enforce it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    /// Feature id.
    pub id: String,
    /// Feature properties.
    #[serde(default)]
    pub properties: PropertyMap,
    /// Feature geometry.
    pub geometry: Geometry,
}

impl Feature {
    /// Creates a feature without properties.
    pub fn new(id: impl Into<String>, geometry: impl Into<Geometry>) -> Self {
        Self {
            id: id.into(),
            properties: PropertyMap::new(),
            geometry: geometry.into(),
        }
    }

    /// Adds a property to the feature, replacing an existing one with the same key.
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Returns the value of a property.
    pub fn property(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }

    /// Decodes the named properties whose values are JSON encoded strings.
    ///
    /// Only the listed keys are touched. A listed property that is not a string is left as is; a
    /// string that fails to decode is left as is and its key is returned.
    pub fn parse_json_properties<S: AsRef<str>>(&mut self, names: &[S]) -> Vec<String> {
        let mut failed = vec![];
        for name in names {
            let name = name.as_ref();
            let Some(Value::String(raw)) = self.properties.get(name) else {
                continue;
            };

            match serde_json::from_str::<Value>(raw) {
                Ok(decoded) => {
                    self.properties.insert(name.to_string(), decoded);
                }
                Err(_) => failed.push(name.to_string()),
            }
        }

        failed
    }

    /// Shallowly merges `overrides` over the properties of the feature.
    pub fn merge_properties(&mut self, overrides: &PropertyMap) {
        for (key, value) in overrides {
            self.properties.insert(key.clone(), value.clone());
        }
    }
}
