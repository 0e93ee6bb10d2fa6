use super::*;
use crate::layer::{AppearanceValue, DataSource};
use assert_matches::assert_matches;
use geoscene_formats::Format;
use geoscene_types::Coord;
use serde_json::json;

fn points_layer(id: &str) -> Layer {
    Layer::simple(id)
        .with_appearance("marker", "pointColor", json!("#FF0000"))
        .with_appearance("marker", "pointSize", AppearanceValue::expression("${size}"))
}

fn point(id: &str, size: f64) -> Feature {
    Feature::new(id, Coord::new(1.0, 2.0)).with_property("size", size)
}

fn store() -> LayerStore {
    let mut store = LayerStore::new();
    store
        .add_layer(
            Layer::group("root", vec![points_layer("a"), Layer::group("g", vec![points_layer("b")])]),
            None,
        )
        .unwrap();
    store.add_layer(points_layer("c"), None).unwrap();
    store
        .set_features("a", vec![point("p1", 3.0), point("p2", 5.0)])
        .unwrap();
    store.set_features("b", vec![point("p3", 7.0)]).unwrap();
    store
}

#[test]
fn tree_structure() {
    let store = store();
    assert_eq!(store.ids(), vec!["root", "a", "g", "b", "c"]);
    assert_eq!(store.len(), 5);
    assert_eq!(store.parent("b"), Some("g"));
    assert_eq!(store.parent("root"), None);
    assert_eq!(
        store.children("root"),
        Some(["a".to_string(), "g".to_string()].as_slice())
    );
    assert_eq!(store.layer_tree("root").unwrap().ids(), vec!["root", "a", "g", "b"]);
}

#[test]
fn duplicate_and_missing_ids_are_rejected() {
    let mut store = store();
    assert_matches!(
        store.add_layer(Layer::simple("b"), None),
        Err(StoreError::DuplicateLayer(id)) if id == "b"
    );
    assert_matches!(
        store.add_layer(Layer::group("x", vec![Layer::simple("y"), Layer::simple("y")]), None),
        Err(StoreError::DuplicateLayer(id)) if id == "y"
    );
    assert_matches!(
        store.add_layer(Layer::simple("z"), Some("nope")),
        Err(StoreError::LayerNotFound(_))
    );
    assert_eq!(store.len(), 5);
}

#[test]
fn find_sees_overrides() {
    let mut store = store();
    store
        .override_layer(
            "c",
            LayerOverride {
                title: Some("Cities".into()),
                ..Default::default()
            },
        )
        .unwrap();

    let found = store
        .find(|layer| layer.title.as_deref() == Some("Cities"))
        .unwrap();
    assert_eq!(found.id, "c");
    assert_eq!(store.find_by_id("c").unwrap().title.as_deref(), Some("Cities"));
    assert_eq!(store.layer_tree("c").unwrap().title, None);

    let simple = store.find_all(|layer| layer.layer_type == crate::layer::LayerType::Simple);
    let ids: Vec<_> = simple.iter().map(|l| l.id.as_str()).collect();
    assert_eq!(ids, vec!["a", "b", "c"]);
}

#[test]
fn override_keeps_sibling_properties_after_recompute() {
    let mut store = store();
    let before = store.computed_feature("a", "p1").unwrap().unwrap();
    assert_eq!(before.appearance("marker", "pointColor"), Some(&json!("#FF0000")));

    let revision = store.revision("a").unwrap();
    store
        .override_layer(
            "a",
            LayerOverride::default().with_appearance("marker", "pointColor", json!("#00FF00")),
        )
        .unwrap();
    assert!(store.revision("a").unwrap() > revision);

    let after = store.computed_feature("a", "p1").unwrap().unwrap();
    assert_eq!(after.appearance("marker", "pointColor"), Some(&json!("#00FF00")));
    assert_eq!(after.appearance("marker", "pointSize"), Some(&json!(3)));

    store.clear_override("a").unwrap();
    let cleared = store.computed_feature("a", "p1").unwrap().unwrap();
    assert_eq!(cleared.appearance("marker", "pointColor"), Some(&json!("#FF0000")));
}

#[test]
fn computed_features_are_memoized_per_revision() {
    let mut store = store();
    let first = store.computed_feature("a", "p1").unwrap().unwrap();
    let second = store.computed_feature("a", "p1").unwrap().unwrap();
    assert!(Arc::ptr_eq(&first, &second));

    store
        .override_feature("a", "p1", PropertyMap::from_iter([("size".to_string(), json!(9))]))
        .unwrap();
    let third = store.computed_feature("a", "p1").unwrap().unwrap();
    assert!(!Arc::ptr_eq(&first, &third));
    assert_eq!(third.appearance("marker", "pointSize"), Some(&json!(9)));
    assert_eq!(store.features("a").unwrap()[0].properties["size"], json!(3.0));
    assert_eq!(
        store.feature("a", "p1").unwrap().unwrap().properties["size"],
        json!(9)
    );

    store.clear_feature_override("a", "p1").unwrap();
    let fourth = store.computed_feature("a", "p1").unwrap().unwrap();
    assert_eq!(fourth.appearance("marker", "pointSize"), Some(&json!(3)));
}

#[test]
fn other_layers_keep_their_revision() {
    let mut store = store();
    let revision = store.revision("b").unwrap();
    store
        .override_layer("a", LayerOverride::default().with_appearance("marker", "x", json!(1)))
        .unwrap();
    assert_eq!(store.revision("b"), Some(revision));
}

#[test]
fn duplicate_feature_ids_are_ambiguous() {
    let mut store = store();
    store
        .set_features("c", vec![point("dup", 1.0), point("dup", 2.0), point("one", 3.0)])
        .unwrap();

    assert_matches!(
        store.computed_feature("c", "dup"),
        Err(StoreError::AmbiguousFeature { feature, .. }) if feature == "dup"
    );
    assert!(store.computed_feature("c", "one").unwrap().is_some());
    assert!(store.computed_feature("c", "none").unwrap().is_none());

    let computed = store.computed_features("c").unwrap();
    let sizes: Vec<_> = computed
        .features
        .iter()
        .map(|f| f.appearance("marker", "pointSize").cloned())
        .collect();
    assert_eq!(sizes, vec![Some(json!(1)), Some(json!(2)), Some(json!(3))]);
}

#[test]
fn visibility_follows_ancestors() {
    let mut store = store();
    assert!(store.is_visible("b"));

    store.hide(&["g"]).unwrap();
    assert!(!store.is_visible("g"));
    assert!(!store.is_visible("b"));
    assert!(store.is_visible("a"));

    let visible: Vec<_> = store
        .visible_computed_features()
        .into_iter()
        .map(|layer| layer.layer_id)
        .collect();
    assert_eq!(visible, vec!["a"]);

    store.show(&["g"]).unwrap();
    store
        .override_layer(
            "root",
            LayerOverride {
                visible: Some(false),
                ..Default::default()
            },
        )
        .unwrap();
    assert!(!store.is_visible("b"));
    assert!(store.is_visible("c"));
    assert!(!store.is_visible("unknown"));

    assert_matches!(
        store.hide(&["a", "unknown"]),
        Err(StoreError::LayerNotFound(_))
    );
    assert!(store.is_visible("c"));
}

#[test]
fn removing_a_layer_cascades() {
    let mut store = store();
    store
        .override_layer("b", LayerOverride::default().with_appearance("marker", "x", json!(1)))
        .unwrap();
    store
        .override_feature("b", "p3", PropertyMap::from_iter([("size".to_string(), json!(1))]))
        .unwrap();
    store.computed_features("b").unwrap();

    let removed = store.remove_layer("g").unwrap();
    assert_eq!(removed.ids(), vec!["g", "b"]);
    assert_eq!(store.ids(), vec!["root", "a", "c"]);
    assert!(store.layer_override("b").is_none());
    assert!(store.feature_override("b", "p3").is_none());
    assert_matches!(store.computed_features("b"), Err(StoreError::LayerNotFound(_)));

    store.add_layer(points_layer("b"), Some("root")).unwrap();
    assert!(store.layer_override("b").is_none());
    assert!(store.features("b").unwrap().is_empty());
}

#[test]
fn replacing_keeps_state_of_remaining_layers() {
    let mut store = store();
    store.hide(&["b"]).unwrap();
    store
        .override_layer("b", LayerOverride::default().with_appearance("marker", "pointColor", json!("#0000FF")))
        .unwrap();

    let replacement = Layer::group(
        "g",
        vec![
            points_layer("b").with_appearance("marker", "pointSize", json!(11)),
            points_layer("d"),
        ],
    );
    store.replace_layer(replacement).unwrap();

    assert_eq!(store.ids(), vec!["root", "a", "g", "b", "d", "c"]);
    assert!(!store.is_visible("b"));
    assert_eq!(store.features("b").unwrap().len(), 1);

    store.show(&["b"]).unwrap();
    let computed = store.computed_feature("b", "p3").unwrap().unwrap();
    assert_eq!(computed.appearance("marker", "pointColor"), Some(&json!("#0000FF")));
    assert_eq!(computed.appearance("marker", "pointSize"), Some(&json!(11)));

    store.replace_layer(Layer::group("g", vec![])).unwrap();
    assert!(store.layer_override("b").is_none());
    assert_eq!(store.ids(), vec!["root", "a", "g", "c"]);

    assert_matches!(
        store.replace_layer(Layer::group("g", vec![Layer::simple("a")])),
        Err(StoreError::DuplicateLayer(id)) if id == "a"
    );
}

#[test]
fn documents_are_read_with_the_layer_format() {
    let mut store = LayerStore::new();
    let document = r#"{"type": "FeatureCollection", "features": [
        {"type": "Feature", "id": "x", "properties": {"size": 2}, "geometry": {"type": "Point", "coordinates": [1, 2]}},
        {"type": "Feature", "id": "y", "properties": {}, "geometry": null}
    ]}"#;
    store
        .add_layer(
            points_layer("json").with_data(DataSource::inline(Format::GeoJson, document)),
            None,
        )
        .unwrap();
    store.add_layer(points_layer("empty"), None).unwrap();

    let diagnostics = store.load_inline_data("json").unwrap();
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(diagnostics[0].id.as_deref(), Some("y"));
    assert_eq!(store.features("json").unwrap().len(), 1);

    assert_matches!(
        store.load_document("empty", document),
        Err(StoreError::NoDataSource(_))
    );
    assert_matches!(
        store.load_document("json", "<html/>"),
        Err(StoreError::Format(_))
    );
    assert_eq!(store.features("json").unwrap().len(), 1);
}

#[test]
fn layer_appearance_uses_the_merged_layer() {
    let mut store = store();
    store
        .override_layer(
            "c",
            LayerOverride::default().with_appearance("marker", "pointColor", json!("#123456")),
        )
        .unwrap();

    let resolution = store.layer_appearance("c").unwrap();
    assert_eq!(resolution.appearances["marker"]["pointColor"], json!("#123456"));
    assert!(!resolution.appearances["marker"].contains_key("pointSize"));
}

#[test]
fn small_cache_still_returns_fresh_results() {
    let mut store = LayerStore::with_cache_capacity(1);
    store.add_layer(points_layer("a"), None).unwrap();
    store
        .set_features("a", (0..20).map(|i| point(&format!("p{i}"), i as f64)).collect())
        .unwrap();

    let computed = store.computed_features("a").unwrap();
    assert_eq!(computed.features.len(), 20);
    assert_eq!(computed.features[19].appearance("marker", "pointSize"), Some(&json!(19)));
}

#[test]
fn shared_store_reads_from_many_threads() {
    let shared = store().into_shared();

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let shared = shared.clone();
            std::thread::spawn(move || {
                (0..50)
                    .map(|_| {
                        shared
                            .computed_feature("a", "p2")
                            .unwrap()
                            .unwrap()
                            .appearance("marker", "pointSize")
                            .cloned()
                    })
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    for reader in readers {
        for size in reader.join().unwrap() {
            assert_eq!(size, Some(json!(5)));
        }
    }

    shared
        .override_feature("a", "p2", PropertyMap::from_iter([("size".to_string(), json!(6))]))
        .unwrap();
    let computed = shared.computed_feature("a", "p2").unwrap().unwrap();
    assert_eq!(computed.appearance("marker", "pointSize"), Some(&json!(6)));
    assert_eq!(shared.feature("a", "p2").unwrap().unwrap().properties["size"], json!(6));

    shared.hide(&["a"]).unwrap();
    assert!(!shared.read().is_visible("a"));
    shared.show(&["a"]).unwrap();
    assert!(shared.find_by_id("a").is_some());
}
