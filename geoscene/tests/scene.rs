use assert_matches::assert_matches;
use geoscene::{
    evaluate, AppearanceValue, EvalContext, ExpressionError, Layer, LayerOverride, LayerStore,
    StoreError, Value,
};
use geoscene_formats::{Format, FormatError, ParseOptions};
use geoscene_types::{Coord, Feature, Geometry};
use serde_json::json;

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

const POINTS: &str = r#"{"type": "FeatureCollection", "features": [
    {"type": "Feature", "id": "a", "properties": {"id": "2432432", "name": "Alpha", "meta": "{\"tags\": [\"x\", \"y\"]}"},
     "geometry": {"type": "Point", "coordinates": [139.7, 35.6]}},
    {"type": "Feature", "id": "b", "properties": {"id": "17", "name": "Beta", "meta": "{\"tags\": []}"},
     "geometry": {"type": "Point", "coordinates": [-0.12, 51.5]}}
]}"#;

const QUAKES: &str = r#"<?xml version="1.0"?>
<rss version="2.0" xmlns:georss="http://www.georss.org/georss">
  <channel>
    <item><guid>ok</guid><title>Area</title><georss:box>35.0 139.0 36.0 140.0</georss:box></item>
    <item><guid>bad</guid><title>Broken</title><georss:point>1 2 3</georss:point></item>
  </channel>
</rss>"#;

fn points_layer() -> Layer {
    serde_json::from_value(json!({
        "id": "points",
        "type": "simple",
        "data": {"type": "geojson", "value": POINTS, "jsonProperties": ["meta"]},
        "appearances": {
            "marker": {
                "pointColor": "#FF0000",
                "pointSize": {"expression": {"conditions": [
                    ["${id} === '2432432'", "2"],
                    ["true", "1"]
                ]}},
                "label": {"expression": "'${name}: ${$.meta.tags[0]}'"}
            }
        }
    }))
    .expect("layer definition is valid")
}

fn loaded_store() -> LayerStore {
    let mut store = LayerStore::new();
    store.add_layer(points_layer(), None).unwrap();
    assert!(store.load_inline_data("points").unwrap().is_empty());
    store
}

#[test]
fn quoted_and_bare_references_compare_equal() {
    init_logger();
    let feature = Feature::new("f", Coord::new(0.0, 0.0))
        .with_property("a", "same")
        .with_property("b", "same")
        .with_property("n", 5);
    let context = EvalContext::new().with_feature(&feature);

    assert_eq!(evaluate("${a} === '${b}'", &context).unwrap(), Value::Bool(true));
    assert_eq!(evaluate("${n} === '${n}'", &context).unwrap(), Value::Bool(false));
    assert_eq!(evaluate("${n} == '${n}'", &context).unwrap(), Value::Bool(true));
}

#[test]
fn color_functions_agree() {
    init_logger();
    let context = EvalContext::new();
    let named = evaluate("color('red')", &context).unwrap();
    let rgba = evaluate("rgba(255, 0, 0, 1)", &context).unwrap();

    assert_eq!(named, rgba);
    assert_eq!(named.to_json(), Some(json!("#FF0000")));
}

#[test]
fn conditions_select_point_size() {
    init_logger();
    let store = loaded_store();
    let computed = store.computed_features("points").unwrap();
    assert!(computed.diagnostics.is_empty());

    let sizes: Vec<_> = computed
        .features
        .iter()
        .map(|f| f.appearance("marker", "pointSize").cloned())
        .collect();
    assert_eq!(sizes, vec![Some(json!(2)), Some(json!(1))]);

    let labels: Vec<_> = computed
        .features
        .iter()
        .map(|f| f.appearance("marker", "label").cloned())
        .collect();
    assert_eq!(labels, vec![Some(json!("Alpha: x")), Some(json!("Beta: "))]);
}

#[test]
fn color_override_keeps_point_size() {
    init_logger();
    let mut store = loaded_store();
    store
        .override_layer(
            "points",
            LayerOverride::default().with_appearance("marker", "pointColor", json!("#00FF00")),
        )
        .unwrap();

    let alpha = store.computed_feature("points", "a").unwrap().unwrap();
    assert_eq!(alpha.appearance("marker", "pointColor"), Some(&json!("#00FF00")));
    assert_eq!(alpha.appearance("marker", "pointSize"), Some(&json!(2)));
    assert_eq!(
        store.layer_tree("points").unwrap().appearance("marker", "pointColor"),
        Some(&AppearanceValue::Literal(json!("#FF0000")))
    );
}

#[test]
fn georss_box_and_malformed_item() {
    init_logger();
    let mut store = LayerStore::new();
    let layer: Layer = serde_json::from_value(json!({
        "id": "quakes",
        "data": {"type": "georss", "value": QUAKES},
        "appearances": {"polygon": {"fillColor": {"expression": "color('blue')"}}}
    }))
    .unwrap();
    store.add_layer(layer, None).unwrap();

    let diagnostics = store.load_inline_data("quakes").unwrap();
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(diagnostics[0].id.as_deref(), Some("bad"));
    assert_matches!(diagnostics[0].error, FormatError::InvalidCoordinates(_));

    let computed = store.computed_features("quakes").unwrap();
    assert_eq!(computed.features.len(), 1);
    let area = &computed.features[0];
    assert_eq!(area.id, "ok");
    assert_eq!(
        area.geometry,
        Geometry::Polygon(vec![vec![
            Coord::new(139.0, 35.0),
            Coord::new(140.0, 36.0),
            Coord::new(35.0, 139.0),
            Coord::new(139.0, 35.0),
        ]])
    );
    assert_eq!(area.appearance("polygon", "fillColor"), Some(&json!("#0000FF")));
}

#[test]
fn cyclic_defines_are_reported_per_property() {
    init_logger();
    let mut store = LayerStore::new();
    let layer = Layer::simple("cycle")
        .with_define("first", "${second} + 1")
        .with_define("second", "${first} * 2")
        .with_appearance("marker", "pointSize", AppearanceValue::expression("${first}"))
        .with_appearance("marker", "pointColor", json!("#000000"));
    store.add_layer(layer, None).unwrap();
    store
        .set_features("cycle", vec![Feature::new("f", Coord::new(0.0, 0.0))])
        .unwrap();

    let computed = store.computed_features("cycle").unwrap();
    assert_eq!(computed.diagnostics.len(), 1);
    assert_eq!(computed.diagnostics[0].property, "pointSize");
    assert_matches!(
        &computed.diagnostics[0].error,
        ExpressionError::CyclicDefine(chain) if chain == "first -> second -> first"
    );
    assert_eq!(
        computed.features[0].appearance("marker", "pointColor"),
        Some(&json!("#000000"))
    );
    assert_eq!(computed.features[0].appearance("marker", "pointSize"), None);
}

#[test]
fn geojson_export_keeps_coordinate_order_and_closes_rings() {
    init_logger();
    let mut store = LayerStore::new();
    let layer: Layer = serde_json::from_value(json!({
        "id": "blocks",
        "data": {"type": "geojson"}
    }))
    .unwrap();
    store.add_layer(layer, None).unwrap();
    store
        .load_document(
            "blocks",
            r#"{"type": "Feature", "id": 1, "properties": {},
                "geometry": {"type": "Polygon", "coordinates": [[[10, 50, 3], [11, 50, 3], [11, 51, 3]]]}}"#,
        )
        .unwrap();

    let block = store.computed_feature("blocks", "1").unwrap().unwrap();
    assert!(block.geometry.rings_closed());

    let exported = geojson::Geometry::from(&block.geometry);
    assert_eq!(
        exported.value,
        geojson::Value::Polygon(vec![vec![
            vec![10.0, 50.0, 3.0],
            vec![11.0, 50.0, 3.0],
            vec![11.0, 51.0, 3.0],
            vec![10.0, 50.0, 3.0],
        ]])
    );
}

#[test]
fn unknown_layers_and_documents_fail() {
    init_logger();
    let mut store = loaded_store();
    assert_matches!(store.computed_features("nope"), Err(StoreError::LayerNotFound(_)));
    assert_matches!(
        store.load_document("points", "not a document"),
        Err(StoreError::Format(FormatError::Json(_)))
    );
    assert_eq!(store.features("points").unwrap().len(), 2);
}

fn exported_geometries(document: &str, format: Format) -> Vec<geojson::Value> {
    let parsed = geoscene_formats::parse(document, format, &ParseOptions::default())
        .expect("document is readable");
    assert!(parsed.diagnostics.is_empty());

    parsed
        .features
        .iter()
        .map(|feature| {
            assert!(feature.geometry.rings_closed());
            let exported = geojson::Geometry::from(&feature.geometry);
            let reimported = Geometry::try_from(&exported).expect("exported geometry is valid");
            assert_eq!(reimported, feature.geometry);
            exported.value
        })
        .collect()
}

fn expected_block(alt: Option<f64>) -> geojson::Value {
    let position = |lng: f64, lat: f64| {
        let mut position = vec![lng, lat];
        position.extend(alt);
        position
    };
    geojson::Value::Polygon(vec![vec![
        position(10.0, 50.0),
        position(11.0, 50.0),
        position(11.0, 51.0),
        position(10.0, 50.0),
    ]])
}

#[test]
fn xml_adapters_export_lng_lat_with_closed_rings() {
    init_logger();
    let station = geojson::Value::Point(vec![139.7, 35.6]);

    let gml = exported_geometries(
        r#"<wfs:FeatureCollection xmlns:wfs="http://www.opengis.net/wfs" xmlns:gml="http://www.opengis.net/gml">
            <gml:featureMember><app:station fid="s"><app:geom>
                <gml:Point><gml:coordinates>139.7,35.6</gml:coordinates></gml:Point>
            </app:geom></app:station></gml:featureMember>
            <gml:featureMember><app:block fid="b"><app:geom><gml:Polygon><gml:outerBoundaryIs><gml:LinearRing>
                <gml:coordinates>10,50 11,50 11,51</gml:coordinates>
            </gml:LinearRing></gml:outerBoundaryIs></gml:Polygon></app:geom></app:block></gml:featureMember>
        </wfs:FeatureCollection>"#,
        Format::Gml,
    );
    assert_eq!(gml, vec![station.clone(), expected_block(None)]);

    let kml = exported_geometries(
        r#"<kml xmlns="http://www.opengis.net/kml/2.2"><Document>
            <Placemark id="s"><Point><coordinates>139.7,35.6</coordinates></Point></Placemark>
            <Placemark id="b"><Polygon><outerBoundaryIs><LinearRing>
                <coordinates>10,50,3 11,50,3 11,51,3</coordinates>
            </LinearRing></outerBoundaryIs></Polygon></Placemark>
        </Document></kml>"#,
        Format::Kml,
    );
    assert_eq!(kml, vec![station.clone(), expected_block(Some(3.0))]);

    let georss = exported_geometries(
        r#"<rss version="2.0" xmlns:georss="http://www.georss.org/georss"><channel>
            <item><guid>s</guid><georss:point>35.6 139.7</georss:point></item>
            <item><guid>b</guid><georss:polygon>50 10 50 11 51 11</georss:polygon></item>
        </channel></rss>"#,
        Format::GeoRss,
    );
    assert_eq!(georss, vec![station, expected_block(None)]);
}
