//! Resolution of layer appearances into plain values.

use crate::error::ExpressionError;
use crate::expression::{format_number, EvalContext, Value};
use crate::layer::{AppearanceValue, Layer};
use geoscene_types::{Feature, Geometry, PropertyMap};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::BTreeMap;

/// Resolved appearance properties by category and property name. Never contains expressions.
///
/// Properties evaluating to `undefined`, `NaN` or an infinite number are omitted, as JSON has no
/// representation for them.
pub type ResolvedAppearances = BTreeMap<String, PropertyMap>;

/// A feature with its appearance fully resolved, as handed to the renderer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComputedFeature {
    /// Feature id.
    pub id: String,
    /// Feature properties, with the layer's JSON encoded properties decoded.
    pub properties: PropertyMap,
    /// Feature geometry.
    pub geometry: Geometry,
    /// Resolved appearance.
    pub appearances: ResolvedAppearances,
}

impl ComputedFeature {
    /// Returns a resolved appearance property.
    pub fn appearance(&self, category: &str, property: &str) -> Option<&serde_json::Value> {
        self.appearances.get(category)?.get(property)
    }
}

/// A property that failed to resolve and was omitted.
#[derive(Debug, Clone, PartialEq)]
pub struct AppearanceDiagnostic {
    /// Layer the property belongs to.
    pub layer_id: String,
    /// Feature the property was resolved for, if any.
    pub feature_id: Option<String>,
    /// Appearance category.
    pub category: String,
    /// Property name.
    pub property: String,
    /// Evaluation error.
    pub error: ExpressionError,
}

/// Result of resolving the appearance of a layer or a feature.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AppearanceResolution {
    /// Resolved properties. Properties resolving to `undefined` or failing are absent.
    pub appearances: ResolvedAppearances,
    /// Properties that failed to resolve.
    pub diagnostics: Vec<AppearanceDiagnostic>,
}

/// Resolves the appearance of a layer without a feature. Expressions referencing feature data
/// resolve to `undefined` and are omitted.
pub fn resolve_layer_appearance(layer: &Layer) -> AppearanceResolution {
    resolve(layer, None)
}

/// Resolves the appearance of a feature of the layer.
///
/// Properties listed in the layer's data source `jsonProperties` are decoded before evaluation.
pub fn resolve_feature_appearance(layer: &Layer, feature: &Feature) -> AppearanceResolution {
    let feature = decode_json_properties(layer, feature);
    resolve(layer, Some(&*feature))
}

/// Builds the [`ComputedFeature`] of a feature of the layer.
pub fn compute_feature(
    layer: &Layer,
    feature: &Feature,
) -> (ComputedFeature, Vec<AppearanceDiagnostic>) {
    let feature = decode_json_properties(layer, feature);
    let AppearanceResolution {
        appearances,
        diagnostics,
    } = resolve(layer, Some(&*feature));

    let feature = feature.into_owned();
    (
        ComputedFeature {
            id: feature.id,
            properties: feature.properties,
            geometry: feature.geometry,
            appearances,
        },
        diagnostics,
    )
}

fn decode_json_properties<'a>(layer: &Layer, feature: &'a Feature) -> Cow<'a, Feature> {
    let names = match &layer.data {
        Some(data) if !data.json_properties.is_empty() => &data.json_properties,
        _ => return Cow::Borrowed(feature),
    };

    let mut decoded = feature.clone();
    for name in decoded.parse_json_properties(names.as_slice()) {
        log::warn!(
            "Property `{name}` of feature `{}` in layer `{}` is not valid JSON",
            feature.id,
            layer.id
        );
    }

    Cow::Owned(decoded)
}

fn resolve(layer: &Layer, feature: Option<&Feature>) -> AppearanceResolution {
    let mut context = EvalContext::new().with_defines(&layer.defines);
    context.feature = feature;

    let mut resolution = AppearanceResolution::default();
    for (category, properties) in &layer.appearances {
        let resolved = resolution
            .appearances
            .entry(category.clone())
            .or_default();

        for (property, value) in properties {
            let expression = match value {
                AppearanceValue::Literal(literal) => {
                    resolved.insert(property.clone(), literal.clone());
                    continue;
                }
                AppearanceValue::Expression { expression } => expression,
            };

            match expression.evaluate(&context) {
                Ok(Value::Number(n)) if !n.is_finite() => {
                    log::debug!(
                        "`{category}.{property}` of layer `{}` evaluated to {}, omitted",
                        layer.id,
                        format_number(n)
                    );
                }
                Ok(value) => {
                    if let Some(json) = value.to_json() {
                        resolved.insert(property.clone(), json);
                    }
                }
                Err(error) => {
                    log::warn!(
                        "Failed to resolve `{category}.{property}` of layer `{}`{}: {error}",
                        layer.id,
                        feature
                            .map(|f| format!(" for feature `{}`", f.id))
                            .unwrap_or_default()
                    );
                    resolution.diagnostics.push(AppearanceDiagnostic {
                        layer_id: layer.id.clone(),
                        feature_id: feature.map(|f| f.id.clone()),
                        category: category.clone(),
                        property: property.clone(),
                        error,
                    });
                }
            }
        }
    }

    resolution
}
