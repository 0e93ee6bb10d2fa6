//! Layer definitions and their runtime overrides.

use crate::expression::{Defines, Expression};
use geoscene_formats::Format;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Appearance properties of one category (`marker`, `polyline`, ...), by property name.
pub type Appearance = BTreeMap<String, AppearanceValue>;

/// Appearance categories of a layer, by category name.
pub type Appearances = BTreeMap<String, Appearance>;

/// Kind of a layer.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayerType {
    /// Layer holding features.
    #[default]
    Simple,
    /// Layer grouping child layers.
    Group,
}

/// Value of an appearance property: either a literal or an expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AppearanceValue {
    /// `{"expression": ...}`
    Expression {
        /// Expression to evaluate.
        expression: Expression,
    },
    /// Any other JSON value, used verbatim.
    Literal(serde_json::Value),
}

impl AppearanceValue {
    /// Creates an expression value.
    pub fn expression(expression: impl Into<Expression>) -> Self {
        Self::Expression {
            expression: expression.into(),
        }
    }

    /// Creates a condition list value from `(condition, value)` pairs.
    pub fn conditions<C: Into<String>, V: Into<String>>(
        conditions: impl IntoIterator<Item = (C, V)>,
    ) -> Self {
        Self::Expression {
            expression: Expression::Conditions {
                conditions: conditions
                    .into_iter()
                    .map(|(c, v)| (c.into(), v.into()))
                    .collect(),
            },
        }
    }
}

impl From<serde_json::Value> for AppearanceValue {
    fn from(value: serde_json::Value) -> Self {
        Self::Literal(value)
    }
}

/// Where the features of a layer come from.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataSource {
    /// Document format.
    #[serde(rename = "type", default)]
    pub format: Format,
    /// Location of the document. Fetching is done by the host.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Inline document.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    /// Properties whose values are JSON encoded strings. They are decoded when the appearance
    /// of a feature is resolved.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub json_properties: Vec<String>,
}

impl DataSource {
    /// Creates a data source with an inline document.
    pub fn inline(format: Format, document: impl Into<String>) -> Self {
        Self {
            format,
            value: Some(document.into()),
            ..Default::default()
        }
    }
}

/// Styling and grouping definition of a layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Layer {
    /// Layer id, unique within a store.
    pub id: String,
    /// Layer kind.
    #[serde(rename = "type", default)]
    pub layer_type: LayerType,
    /// Display title.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Whether the layer is shown.
    #[serde(default = "default_visible")]
    pub visible: bool,
    /// Source of the features.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<DataSource>,
    /// Appearance properties by category.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub appearances: Appearances,
    /// Named expressions available to the appearance expressions.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub defines: Defines,
    /// Arbitrary host data.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<serde_json::Value>,
    /// Child layers of a group.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Layer>,
}

fn default_visible() -> bool {
    true
}

impl Layer {
    /// Creates a visible simple layer without data and appearances.
    pub fn simple(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            layer_type: LayerType::Simple,
            title: None,
            visible: true,
            data: None,
            appearances: Appearances::new(),
            defines: Defines::new(),
            properties: None,
            children: vec![],
        }
    }

    /// Creates a group layer.
    pub fn group(id: impl Into<String>, children: Vec<Layer>) -> Self {
        Self {
            layer_type: LayerType::Group,
            children,
            ..Self::simple(id)
        }
    }

    /// Sets the data source.
    pub fn with_data(mut self, data: DataSource) -> Self {
        self.data = Some(data);
        self
    }

    /// Sets an appearance property.
    pub fn with_appearance(
        mut self,
        category: impl Into<String>,
        property: impl Into<String>,
        value: impl Into<AppearanceValue>,
    ) -> Self {
        self.appearances
            .entry(category.into())
            .or_default()
            .insert(property.into(), value.into());
        self
    }

    /// Adds a define.
    pub fn with_define(mut self, name: impl Into<String>, expression: impl Into<String>) -> Self {
        self.defines.insert(name.into(), expression.into());
        self
    }

    /// Returns the appearance property, if set.
    pub fn appearance(&self, category: &str, property: &str) -> Option<&AppearanceValue> {
        self.appearances.get(category)?.get(property)
    }

    /// Ids of the layer and all its descendants, depth first.
    pub fn ids(&self) -> Vec<&str> {
        let mut ids = vec![self.id.as_str()];
        for child in &self.children {
            ids.extend(child.ids());
        }
        ids
    }
}

/// Partial layer merged over a base layer at runtime.
///
/// Top level fields replace the base ones when set. Appearances are merged property by property,
/// so overriding `marker.pointColor` keeps the other `marker` properties of the base layer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LayerOverride {
    /// Replaces the title.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Replaces the visibility flag.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visible: Option<bool>,
    /// Replaces the data source.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<DataSource>,
    /// Appearance properties to set.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub appearances: Appearances,
    /// Replaces the defines.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub defines: Option<Defines>,
    /// Replaces the host data.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub properties: Option<serde_json::Value>,
}

impl LayerOverride {
    /// Sets an appearance property.
    pub fn with_appearance(
        mut self,
        category: impl Into<String>,
        property: impl Into<String>,
        value: impl Into<AppearanceValue>,
    ) -> Self {
        self.appearances
            .entry(category.into())
            .or_default()
            .insert(property.into(), value.into());
        self
    }

    /// Merges a later override into this one. Fields set in `other` win.
    pub fn merge(&mut self, other: LayerOverride) {
        if other.title.is_some() {
            self.title = other.title;
        }
        if other.visible.is_some() {
            self.visible = other.visible;
        }
        if other.data.is_some() {
            self.data = other.data;
        }
        if other.defines.is_some() {
            self.defines = other.defines;
        }
        if other.properties.is_some() {
            self.properties = other.properties;
        }
        merge_appearances(&mut self.appearances, other.appearances);
    }

    /// Returns the base layer with the override applied. Children of the base layer are kept.
    pub fn apply(&self, base: &Layer) -> Layer {
        let mut layer = base.clone();
        if let Some(title) = &self.title {
            layer.title = Some(title.clone());
        }
        if let Some(visible) = self.visible {
            layer.visible = visible;
        }
        if let Some(data) = &self.data {
            layer.data = Some(data.clone());
        }
        if let Some(defines) = &self.defines {
            layer.defines = defines.clone();
        }
        if let Some(properties) = &self.properties {
            layer.properties = Some(properties.clone());
        }
        merge_appearances(&mut layer.appearances, self.appearances.clone());

        layer
    }
}

fn merge_appearances(target: &mut Appearances, source: Appearances) {
    for (category, properties) in source {
        target.entry(category).or_default().extend(properties);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn layer_deserialization() {
        let layer: Layer = serde_json::from_value(json!({
            "id": "quakes",
            "type": "simple",
            "data": {"type": "georss", "url": "https://example.com/feed", "jsonProperties": ["tags"]},
            "appearances": {
                "marker": {
                    "pointColor": "#FF0000",
                    "pointSize": {"expression": {"conditions": [["${mag} > 5", "10"], ["true", "4"]]}},
                    "label": {"expression": "${title}"}
                }
            },
            "defines": {"mag": "Number(${magnitude})"}
        }))
        .unwrap();

        assert_eq!(layer.layer_type, LayerType::Simple);
        assert!(layer.visible);
        assert_eq!(layer.data.as_ref().map(|d| d.format), Some(Format::GeoRss));
        assert_eq!(
            layer.data.as_ref().map(|d| d.json_properties.clone()),
            Some(vec!["tags".to_string()])
        );
        assert_eq!(
            layer.appearance("marker", "pointColor"),
            Some(&AppearanceValue::Literal(json!("#FF0000")))
        );
        assert_eq!(
            layer.appearance("marker", "pointSize"),
            Some(&AppearanceValue::conditions([("${mag} > 5", "10"), ("true", "4")]))
        );
        assert_eq!(
            layer.appearance("marker", "label"),
            Some(&AppearanceValue::expression("${title}"))
        );
    }

    #[test]
    fn group_children() {
        let group: Layer = serde_json::from_value(json!({
            "id": "g",
            "type": "group",
            "children": [{"id": "a"}, {"id": "b", "type": "group", "children": [{"id": "c"}]}]
        }))
        .unwrap();

        assert_eq!(group.layer_type, LayerType::Group);
        assert_eq!(group.ids(), vec!["g", "a", "b", "c"]);
        assert_eq!(group.children[0].layer_type, LayerType::Simple);
    }

    #[test]
    fn override_keeps_sibling_properties() {
        let base = Layer::simple("l")
            .with_appearance("marker", "pointColor", json!("#FF0000"))
            .with_appearance("marker", "pointSize", json!(4))
            .with_appearance("polygon", "fill", json!(true));

        let patch = LayerOverride::default().with_appearance("marker", "pointColor", json!("#00FF00"));
        let merged = patch.apply(&base);

        assert_eq!(
            merged.appearance("marker", "pointColor"),
            Some(&AppearanceValue::Literal(json!("#00FF00")))
        );
        assert_eq!(
            merged.appearance("marker", "pointSize"),
            Some(&AppearanceValue::Literal(json!(4)))
        );
        assert_eq!(
            merged.appearance("polygon", "fill"),
            Some(&AppearanceValue::Literal(json!(true)))
        );
        assert_eq!(
            base.appearance("marker", "pointColor"),
            Some(&AppearanceValue::Literal(json!("#FF0000")))
        );
    }

    #[test]
    fn overrides_accumulate() {
        let mut first = LayerOverride {
            title: Some("first".into()),
            ..Default::default()
        }
        .with_appearance("marker", "pointColor", json!("#00FF00"));

        first.merge(
            LayerOverride {
                visible: Some(false),
                ..Default::default()
            }
            .with_appearance("marker", "pointSize", json!(8)),
        );

        assert_eq!(first.title.as_deref(), Some("first"));
        assert_eq!(first.visible, Some(false));
        assert_eq!(first.appearances["marker"].len(), 2);

        let patch: LayerOverride = serde_json::from_value(json!({
            "defines": {"x": "1"},
            "appearances": {"marker": {"pointSize": {"expression": "${x} + 1"}}}
        }))
        .unwrap();
        let merged = patch.apply(&Layer::simple("l").with_define("y", "2"));
        assert_eq!(merged.defines.len(), 1);
        assert_eq!(merged.defines["x"], "1");
    }
}
