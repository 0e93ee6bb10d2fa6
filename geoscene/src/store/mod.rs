//! See [`LayerStore`].

use crate::appearance::{
    compute_feature, resolve_layer_appearance, AppearanceDiagnostic, AppearanceResolution,
    ComputedFeature,
};
use crate::error::StoreError;
use crate::layer::{Layer, LayerOverride};
use ahash::{HashMap, HashMapExt, HashSet, HashSetExt};
use geoscene_formats::{EntryDiagnostic, ParseOptions};
use geoscene_types::{Feature, PropertyMap};
use quick_cache::sync::Cache;
use std::sync::Arc;

mod shared;
pub use shared::SharedLayerStore;

/// Memo key: layer id, feature id and the layer revision the feature was computed at.
type CacheKey = (String, String, u64);

#[derive(Clone)]
struct CachedFeature {
    feature: Arc<ComputedFeature>,
    diagnostics: Arc<[AppearanceDiagnostic]>,
}

struct LayerEntry {
    /// Layer as it was added, without children.
    base: Layer,
    /// `base` with the layer override applied.
    merged: Arc<Layer>,
    parent: Option<String>,
    children: Vec<String>,
    hidden: bool,
    revision: u64,
    features: Arc<Vec<Feature>>,
    duplicate_ids: HashSet<String>,
}

impl LayerEntry {
    fn cache_key(&self, feature_id: &str) -> CacheKey {
        (self.base.id.clone(), feature_id.to_string(), self.revision)
    }
}

/// Computed features of one layer.
#[derive(Debug, Clone)]
pub struct ComputedLayer {
    /// Layer id.
    pub layer_id: String,
    /// Revision of the layer the features were computed at.
    pub revision: u64,
    /// Features in the order they were set.
    pub features: Vec<Arc<ComputedFeature>>,
    /// Properties that failed to resolve.
    pub diagnostics: Vec<AppearanceDiagnostic>,
}

/// Tree of layers with their features, runtime overrides and memoized computed features.
///
/// Layers are stored flat by id. Overrides are kept apart from the layer definitions and merged
/// over them, so the definitions are never modified. Every change affecting the appearance of a
/// layer (replacing it, overriding it or one of its features, setting its features) gives the
/// layer a new revision. Computed features are memoized per layer id, feature id and revision,
/// so a stale computation is never returned.
///
/// All modifications take `&mut self`. Reading, including computing features, takes `&self` and
/// can be done from several threads at once, see [`SharedLayerStore`].
pub struct LayerStore {
    layers: HashMap<String, LayerEntry>,
    roots: Vec<String>,
    layer_overrides: HashMap<String, LayerOverride>,
    feature_overrides: HashMap<String, HashMap<String, PropertyMap>>,
    cache: Cache<CacheKey, CachedFeature>,
    last_revision: u64,
}

impl std::fmt::Debug for LayerStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LayerStore")
            .field("layers", &self.ids())
            .field("layer_overrides", &self.layer_overrides.len())
            .field("cached_features", &self.cache.len())
            .finish()
    }
}

impl Default for LayerStore {
    fn default() -> Self {
        Self::new()
    }
}

impl LayerStore {
    /// Number of computed features memoized by default.
    pub const DEFAULT_CACHE_CAPACITY: usize = 10_000;

    /// Creates an empty store.
    pub fn new() -> Self {
        Self::with_cache_capacity(Self::DEFAULT_CACHE_CAPACITY)
    }

    /// Creates an empty store memoizing up to `capacity` computed features.
    pub fn with_cache_capacity(capacity: usize) -> Self {
        Self {
            layers: HashMap::new(),
            roots: vec![],
            layer_overrides: HashMap::new(),
            feature_overrides: HashMap::new(),
            cache: Cache::new(capacity.max(1)),
            last_revision: 0,
        }
    }

    /// Wraps the store into a handle that can be shared between threads.
    pub fn into_shared(self) -> SharedLayerStore {
        SharedLayerStore::new(self)
    }

    /// Adds the layer with all its children. Without `parent` the layer is added at the top level.
    pub fn add_layer(&mut self, layer: Layer, parent: Option<&str>) -> Result<(), StoreError> {
        self.check_ids(&layer, &HashSet::new())?;
        if let Some(parent) = parent {
            if !self.layers.contains_key(parent) {
                return Err(StoreError::LayerNotFound(parent.to_string()));
            }
        }

        let id = layer.id.clone();
        self.insert_tree(layer, parent.map(str::to_string));
        match parent.and_then(|p| self.layers.get_mut(p)) {
            Some(parent) => parent.children.push(id),
            None => self.roots.push(id),
        }

        Ok(())
    }

    /// Replaces the layer with the given one, keeping its place in the tree.
    ///
    /// Layers of the old subtree that are still present in the new one keep their overrides and
    /// hidden state, and their features if the data source did not change. Overrides of layers
    /// that are gone are dropped.
    pub fn replace_layer(&mut self, layer: Layer) -> Result<(), StoreError> {
        let parent = self
            .layers
            .get(&layer.id)
            .ok_or_else(|| StoreError::LayerNotFound(layer.id.clone()))?
            .parent
            .clone();

        let old_ids: HashSet<String> = self.subtree_ids(&layer.id).into_iter().collect();
        self.check_ids(&layer, &old_ids)?;

        let old_entries: HashMap<String, LayerEntry> = self
            .take_subtree(&layer.id)
            .into_iter()
            .map(|entry| (entry.base.id.clone(), entry))
            .collect();

        self.insert_tree(layer, parent);

        for (id, old) in old_entries {
            match self.layers.get_mut(&id) {
                Some(entry) => {
                    entry.hidden = old.hidden;
                    if entry.base.data == old.base.data {
                        entry.features = old.features;
                        entry.duplicate_ids = old.duplicate_ids;
                    }
                }
                None => self.drop_overrides(&id),
            }
        }

        Ok(())
    }

    /// Removes the layer with all its children and returns it. Overrides and computed features
    /// of the removed layers are dropped.
    pub fn remove_layer(&mut self, id: &str) -> Result<Layer, StoreError> {
        let tree = self
            .layer_tree(id)
            .ok_or_else(|| StoreError::LayerNotFound(id.to_string()))?;

        let parent = self.layers.get(id).and_then(|entry| entry.parent.clone());
        match parent.and_then(|p| self.layers.get_mut(&p)) {
            Some(parent) => parent.children.retain(|child| child != id),
            None => self.roots.retain(|root| root != id),
        }

        for entry in self.take_subtree(id) {
            self.drop_overrides(&entry.base.id);
        }

        Ok(tree)
    }

    /// Returns the layer with its override applied. Children are not included, see
    /// [`LayerStore::children`].
    pub fn find_by_id(&self, id: &str) -> Option<Arc<Layer>> {
        self.layers.get(id).map(|entry| entry.merged.clone())
    }

    /// Returns the first layer in tree order matching the predicate. The predicate gets layers
    /// with their overrides applied.
    pub fn find(&self, predicate: impl Fn(&Layer) -> bool) -> Option<Arc<Layer>> {
        self.walk()
            .into_iter()
            .find(|entry| predicate(&entry.merged))
            .map(|entry| entry.merged.clone())
    }

    /// Returns all layers in tree order matching the predicate.
    pub fn find_all(&self, predicate: impl Fn(&Layer) -> bool) -> Vec<Arc<Layer>> {
        self.walk()
            .into_iter()
            .filter(|entry| predicate(&entry.merged))
            .map(|entry| entry.merged.clone())
            .collect()
    }

    /// Returns the layer definition as it was added, with its children. Overrides are not
    /// applied.
    pub fn layer_tree(&self, id: &str) -> Option<Layer> {
        let entry = self.layers.get(id)?;
        let mut layer = entry.base.clone();
        layer.children = entry
            .children
            .iter()
            .filter_map(|child| self.layer_tree(child))
            .collect();
        Some(layer)
    }

    /// Ids of all layers in tree order.
    pub fn ids(&self) -> Vec<&str> {
        self.walk()
            .into_iter()
            .map(|entry| entry.base.id.as_str())
            .collect()
    }

    /// Id of the parent layer.
    pub fn parent(&self, id: &str) -> Option<&str> {
        self.layers.get(id)?.parent.as_deref()
    }

    /// Ids of the child layers.
    pub fn children(&self, id: &str) -> Option<&[String]> {
        self.layers.get(id).map(|entry| entry.children.as_slice())
    }

    /// Number of layers in the store.
    pub fn len(&self) -> usize {
        self.layers.len()
    }

    /// Returns true if the store has no layers.
    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Current revision of the layer.
    pub fn revision(&self, id: &str) -> Option<u64> {
        self.layers.get(id).map(|entry| entry.revision)
    }

    /// Merges the override over the ones already set for the layer.
    pub fn override_layer(&mut self, id: &str, patch: LayerOverride) -> Result<(), StoreError> {
        self.ensure_exists(id)?;
        self.layer_overrides
            .entry(id.to_string())
            .or_default()
            .merge(patch);
        self.touch(id);
        Ok(())
    }

    /// Removes all overrides of the layer.
    pub fn clear_override(&mut self, id: &str) -> Result<(), StoreError> {
        self.ensure_exists(id)?;
        if self.layer_overrides.remove(id).is_some() {
            self.touch(id);
        }
        Ok(())
    }

    /// Current override of the layer.
    pub fn layer_override(&self, id: &str) -> Option<&LayerOverride> {
        self.layer_overrides.get(id)
    }

    /// Merges `properties` over the properties of the feature when its appearance is computed.
    pub fn override_feature(
        &mut self,
        layer_id: &str,
        feature_id: &str,
        properties: PropertyMap,
    ) -> Result<(), StoreError> {
        self.ensure_exists(layer_id)?;
        let current = self
            .feature_overrides
            .entry(layer_id.to_string())
            .or_default()
            .entry(feature_id.to_string())
            .or_default();
        for (key, value) in properties {
            current.insert(key, value);
        }
        self.touch(layer_id);
        Ok(())
    }

    /// Removes the property override of the feature.
    pub fn clear_feature_override(
        &mut self,
        layer_id: &str,
        feature_id: &str,
    ) -> Result<(), StoreError> {
        self.ensure_exists(layer_id)?;
        let removed = self
            .feature_overrides
            .get_mut(layer_id)
            .and_then(|overrides| overrides.remove(feature_id));
        if removed.is_some() {
            self.touch(layer_id);
        }
        Ok(())
    }

    /// Shows the layers hidden with [`LayerStore::hide`].
    pub fn show(&mut self, ids: &[&str]) -> Result<(), StoreError> {
        self.set_hidden(ids, false)
    }

    /// Hides the layers and all their descendants. The layers keep their place in the tree.
    pub fn hide(&mut self, ids: &[&str]) -> Result<(), StoreError> {
        self.set_hidden(ids, true)
    }

    /// Returns true if the layer and all its ancestors are neither hidden nor have their
    /// `visible` flag turned off.
    pub fn is_visible(&self, id: &str) -> bool {
        let mut current = self.layers.get(id);
        while let Some(entry) = current {
            if entry.hidden || !entry.merged.visible {
                return false;
            }
            current = entry.parent.as_ref().and_then(|p| self.layers.get(p));
        }

        self.layers.contains_key(id)
    }

    /// Sets the features of the layer, replacing the previous ones.
    pub fn set_features(&mut self, id: &str, features: Vec<Feature>) -> Result<(), StoreError> {
        self.ensure_exists(id)?;

        let mut seen = HashSet::new();
        let mut duplicate_ids = HashSet::new();
        for feature in &features {
            if !seen.insert(feature.id.as_str()) {
                duplicate_ids.insert(feature.id.clone());
            }
        }
        if !duplicate_ids.is_empty() {
            log::warn!(
                "Layer `{id}` has {} feature ids used more than once",
                duplicate_ids.len()
            );
        }

        self.touch(id);
        if let Some(entry) = self.layers.get_mut(id) {
            entry.features = Arc::new(features);
            entry.duplicate_ids = duplicate_ids;
        }

        Ok(())
    }

    /// Reads the document with the format of the layer's data source and sets the features.
    /// Returns the diagnostics of the entries that could not be read.
    pub fn load_document(
        &mut self,
        id: &str,
        document: &str,
    ) -> Result<Vec<EntryDiagnostic>, StoreError> {
        let layer = self
            .find_by_id(id)
            .ok_or_else(|| StoreError::LayerNotFound(id.to_string()))?;
        let data = layer
            .data
            .as_ref()
            .ok_or_else(|| StoreError::NoDataSource(id.to_string()))?;

        let parsed = geoscene_formats::parse(document, data.format, &ParseOptions::default())?;
        if !parsed.diagnostics.is_empty() {
            log::warn!(
                "{} entries of the layer `{id}` document were skipped",
                parsed.diagnostics.len()
            );
        }

        self.set_features(id, parsed.features)?;
        Ok(parsed.diagnostics)
    }

    /// Same as [`LayerStore::load_document`] for the inline document of the data source.
    pub fn load_inline_data(&mut self, id: &str) -> Result<Vec<EntryDiagnostic>, StoreError> {
        let layer = self
            .find_by_id(id)
            .ok_or_else(|| StoreError::LayerNotFound(id.to_string()))?;
        let document = layer
            .data
            .as_ref()
            .and_then(|data| data.value.as_deref())
            .ok_or_else(|| StoreError::NoDataSource(id.to_string()))?;

        self.load_document(id, document)
    }

    /// Features of the layer as they were set, without overrides.
    pub fn features(&self, id: &str) -> Option<Arc<Vec<Feature>>> {
        self.layers.get(id).map(|entry| entry.features.clone())
    }

    /// Returns the feature with its property override applied.
    pub fn feature(
        &self,
        layer_id: &str,
        feature_id: &str,
    ) -> Result<Option<Feature>, StoreError> {
        let entry = self.entry(layer_id)?;
        let Some(feature) = unique_feature(entry, feature_id)? else {
            return Ok(None);
        };

        let mut feature = feature.clone();
        if let Some(properties) = self.feature_override(layer_id, feature_id) {
            feature.merge_properties(properties);
        }
        Ok(Some(feature))
    }

    /// Computes the features of the layer.
    pub fn computed_features(&self, id: &str) -> Result<ComputedLayer, StoreError> {
        let entry = self.entry(id)?;

        let mut features = Vec::with_capacity(entry.features.len());
        let mut diagnostics = vec![];
        for feature in entry.features.iter() {
            let computed = self.computed(entry, feature);
            features.push(computed.feature);
            diagnostics.extend(computed.diagnostics.iter().cloned());
        }

        Ok(ComputedLayer {
            layer_id: id.to_string(),
            revision: entry.revision,
            features,
            diagnostics,
        })
    }

    /// Computes a single feature of the layer. Fails if several features share the id.
    pub fn computed_feature(
        &self,
        layer_id: &str,
        feature_id: &str,
    ) -> Result<Option<Arc<ComputedFeature>>, StoreError> {
        let entry = self.entry(layer_id)?;
        Ok(unique_feature(entry, feature_id)?.map(|feature| self.computed(entry, feature).feature))
    }

    /// Resolves the appearance of the layer without a feature.
    pub fn layer_appearance(&self, id: &str) -> Result<AppearanceResolution, StoreError> {
        Ok(resolve_layer_appearance(&self.entry(id)?.merged))
    }

    /// Computed features of every visible layer that has features, in tree order.
    pub fn visible_computed_features(&self) -> Vec<ComputedLayer> {
        self.walk()
            .into_iter()
            .filter(|entry| !entry.features.is_empty() && self.is_visible(&entry.base.id))
            .filter_map(|entry| self.computed_features(&entry.base.id).ok())
            .collect()
    }

    fn entry(&self, id: &str) -> Result<&LayerEntry, StoreError> {
        self.layers
            .get(id)
            .ok_or_else(|| StoreError::LayerNotFound(id.to_string()))
    }

    fn ensure_exists(&self, id: &str) -> Result<(), StoreError> {
        self.entry(id).map(|_| ())
    }

    fn feature_override(&self, layer_id: &str, feature_id: &str) -> Option<&PropertyMap> {
        self.feature_overrides.get(layer_id)?.get(feature_id)
    }

    fn computed(&self, entry: &LayerEntry, feature: &Feature) -> CachedFeature {
        let cacheable = !entry.duplicate_ids.contains(&feature.id);
        let key = entry.cache_key(&feature.id);
        if cacheable {
            if let Some(cached) = self.cache.get(&key) {
                return cached;
            }
        }

        log::trace!("Computing feature `{}` of layer `{}`", feature.id, entry.base.id);
        let (computed, diagnostics) = match self.feature_override(&entry.base.id, &feature.id) {
            Some(properties) => {
                let mut feature = feature.clone();
                feature.merge_properties(properties);
                compute_feature(&entry.merged, &feature)
            }
            None => compute_feature(&entry.merged, feature),
        };

        let cached = CachedFeature {
            feature: Arc::new(computed),
            diagnostics: diagnostics.into(),
        };
        if cacheable {
            self.cache.insert(key, cached.clone());
        }

        cached
    }

    fn next_revision(&mut self) -> u64 {
        self.last_revision += 1;
        self.last_revision
    }

    /// Drops the memoized features of the layer and gives it a new revision.
    fn touch(&mut self, id: &str) {
        let revision = self.next_revision();
        let Some(entry) = self.layers.get_mut(id) else {
            return;
        };

        evict(&self.cache, entry);
        entry.revision = revision;
        entry.merged = merge(self.layer_overrides.get(id), &entry.base);
        log::debug!("Layer `{id}` is now at revision {revision}");
    }

    fn set_hidden(&mut self, ids: &[&str], hidden: bool) -> Result<(), StoreError> {
        for id in ids {
            self.ensure_exists(id)?;
        }
        for id in ids {
            if let Some(entry) = self.layers.get_mut(*id) {
                entry.hidden = hidden;
            }
        }
        Ok(())
    }

    /// Checks that the ids of the layer tree are unique and not used in the store, except for
    /// the ids in `replaced`.
    fn check_ids(&self, layer: &Layer, replaced: &HashSet<String>) -> Result<(), StoreError> {
        let mut seen = HashSet::new();
        for id in layer.ids() {
            let taken = self.layers.contains_key(id) && !replaced.contains(id);
            if taken || !seen.insert(id) {
                return Err(StoreError::DuplicateLayer(id.to_string()));
            }
        }
        Ok(())
    }

    fn insert_tree(&mut self, mut layer: Layer, parent: Option<String>) {
        let children = std::mem::take(&mut layer.children);
        let id = layer.id.clone();
        let revision = self.next_revision();

        self.layers.insert(
            id.clone(),
            LayerEntry {
                merged: merge(self.layer_overrides.get(&id), &layer),
                base: layer,
                parent,
                children: children.iter().map(|child| child.id.clone()).collect(),
                hidden: false,
                revision,
                features: Arc::default(),
                duplicate_ids: HashSet::new(),
            },
        );

        for child in children {
            self.insert_tree(child, Some(id.clone()));
        }
    }

    fn subtree_ids(&self, id: &str) -> Vec<String> {
        let mut ids = vec![id.to_string()];
        if let Some(entry) = self.layers.get(id) {
            for child in &entry.children {
                ids.extend(self.subtree_ids(child));
            }
        }
        ids
    }

    /// Removes the entries of the subtree and their memoized features. The parent's list of
    /// children is left as is.
    fn take_subtree(&mut self, id: &str) -> Vec<LayerEntry> {
        let mut removed = vec![];
        for id in self.subtree_ids(id) {
            if let Some(entry) = self.layers.remove(&id) {
                evict(&self.cache, &entry);
                removed.push(entry);
            }
        }
        removed
    }

    fn drop_overrides(&mut self, id: &str) {
        self.layer_overrides.remove(id);
        self.feature_overrides.remove(id);
    }

    /// Entries in tree order: parents before children, siblings in insertion order.
    fn walk(&self) -> Vec<&LayerEntry> {
        fn visit<'a>(store: &'a LayerStore, id: &str, out: &mut Vec<&'a LayerEntry>) {
            if let Some(entry) = store.layers.get(id) {
                out.push(entry);
                for child in &entry.children {
                    visit(store, child, out);
                }
            }
        }

        let mut entries = Vec::with_capacity(self.layers.len());
        for root in &self.roots {
            visit(self, root, &mut entries);
        }
        entries
    }
}

fn merge(patch: Option<&LayerOverride>, base: &Layer) -> Arc<Layer> {
    Arc::new(match patch {
        Some(patch) => patch.apply(base),
        None => base.clone(),
    })
}

fn evict(cache: &Cache<CacheKey, CachedFeature>, entry: &LayerEntry) {
    for feature in entry.features.iter() {
        cache.remove(&entry.cache_key(&feature.id));
    }
}

fn unique_feature<'a>(
    entry: &'a LayerEntry,
    feature_id: &str,
) -> Result<Option<&'a Feature>, StoreError> {
    let mut matches = entry.features.iter().filter(|f| f.id == feature_id);
    let first = matches.next();
    if first.is_some() && matches.next().is_some() {
        return Err(StoreError::AmbiguousFeature {
            layer: entry.base.id.clone(),
            feature: feature_id.to_string(),
        });
    }
    Ok(first)
}

#[cfg(test)]
mod tests;
