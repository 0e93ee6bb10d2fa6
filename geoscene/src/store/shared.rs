use super::{ComputedLayer, LayerStore};
use crate::appearance::ComputedFeature;
use crate::error::StoreError;
use crate::layer::{Layer, LayerOverride};
use geoscene_types::{Feature, PropertyMap};
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::sync::Arc;

/// Handle to a [`LayerStore`] shared between the editor and plugins.
///
/// Reads take a shared lock and can run concurrently; overrides take the exclusive lock, so
/// writes are serialized. Overrides made through the handle are merged exactly as
/// [`LayerStore::override_layer`] merges them.
#[derive(Debug, Clone, Default)]
pub struct SharedLayerStore(Arc<RwLock<LayerStore>>);

impl SharedLayerStore {
    /// Wraps the store.
    pub fn new(store: LayerStore) -> Self {
        Self(Arc::new(RwLock::new(store)))
    }

    /// Locks the store for reading.
    pub fn read(&self) -> RwLockReadGuard<'_, LayerStore> {
        self.0.read()
    }

    /// Locks the store for writing.
    pub fn write(&self) -> RwLockWriteGuard<'_, LayerStore> {
        self.0.write()
    }

    /// See [`LayerStore::find_by_id`].
    pub fn find_by_id(&self, id: &str) -> Option<Arc<Layer>> {
        self.read().find_by_id(id)
    }

    /// See [`LayerStore::find`].
    pub fn find(&self, predicate: impl Fn(&Layer) -> bool) -> Option<Arc<Layer>> {
        self.read().find(predicate)
    }

    /// See [`LayerStore::feature`].
    pub fn feature(&self, layer_id: &str, feature_id: &str) -> Result<Option<Feature>, StoreError> {
        self.read().feature(layer_id, feature_id)
    }

    /// See [`LayerStore::computed_feature`].
    pub fn computed_feature(
        &self,
        layer_id: &str,
        feature_id: &str,
    ) -> Result<Option<Arc<ComputedFeature>>, StoreError> {
        self.read().computed_feature(layer_id, feature_id)
    }

    /// See [`LayerStore::computed_features`].
    pub fn computed_features(&self, id: &str) -> Result<ComputedLayer, StoreError> {
        self.read().computed_features(id)
    }

    /// See [`LayerStore::override_layer`].
    pub fn override_layer(&self, id: &str, patch: LayerOverride) -> Result<(), StoreError> {
        self.write().override_layer(id, patch)
    }

    /// See [`LayerStore::override_feature`].
    pub fn override_feature(
        &self,
        layer_id: &str,
        feature_id: &str,
        properties: PropertyMap,
    ) -> Result<(), StoreError> {
        self.write()
            .override_feature(layer_id, feature_id, properties)
    }

    /// See [`LayerStore::show`].
    pub fn show(&self, ids: &[&str]) -> Result<(), StoreError> {
        self.write().show(ids)
    }

    /// See [`LayerStore::hide`].
    pub fn hide(&self, ids: &[&str]) -> Result<(), StoreError> {
        self.write().hide(ids)
    }
}
