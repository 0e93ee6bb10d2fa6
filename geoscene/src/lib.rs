//! Geoscene is the styling core of a layered map scene. It keeps a tree of layers, reads their
//! features from GeoJSON, GML, GeoRSS and KML documents and computes the appearance of every
//! feature from expressions declared on the layer.
//!
//! # Main components
//!
//! * [`Layer`] is a serializable layer definition: its data source, its appearance properties
//!   grouped by category, and named defines reusable from expressions.
//! * [`expression`] evaluates appearance expressions such as `${population} > 1000 ? 'red' : 'blue'`
//!   against a feature.
//! * [`LayerStore`] holds the layer tree together with runtime overrides and memoizes the computed
//!   features. Use [`SharedLayerStore`] to read from several threads.
//!
//! ```no_run
//! use geoscene::{AppearanceValue, Layer, LayerStore};
//! use geoscene_formats::Format;
//! use geoscene::DataSource;
//!
//! let layer = Layer::simple("cities")
//!     .with_data(DataSource::inline(Format::GeoJson, r#"{"type": "Point", "coordinates": [1, 2]}"#))
//!     .with_appearance("marker", "pointColor", AppearanceValue::expression("color('red')"));
//!
//! let mut store = LayerStore::new();
//! store.add_layer(layer, None).unwrap();
//! store.load_inline_data("cities").unwrap();
//! for feature in store.computed_features("cities").unwrap().features {
//!     println!("{:?}", feature.appearance("marker", "pointColor"));
//! }
//! ```

pub mod appearance;
mod color;
pub mod error;
pub mod expression;
pub mod layer;
pub mod store;

pub use appearance::{
    compute_feature, resolve_feature_appearance, resolve_layer_appearance, AppearanceDiagnostic,
    AppearanceResolution, ComputedFeature,
};
pub use color::Color;
pub use error::{ExpressionError, StoreError};
pub use expression::{evaluate, EvalContext, Expression, Value};
pub use layer::{AppearanceValue, DataSource, Layer, LayerOverride, LayerType};
pub use store::{ComputedLayer, LayerStore, SharedLayerStore};

pub use geoscene_formats;
pub use geoscene_types;
