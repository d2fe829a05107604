//! Polyline class exercised through its JS-facing API. Run with `wasm-pack test --node`.
#![cfg(target_arch = "wasm32")]

use gpx_polyline_wasm::Polyline;
use wasm_bindgen::JsValue;
use wasm_bindgen_test::*;

fn positions(coords: &[[f64; 3]]) -> JsValue {
    let coords: Vec<Vec<f64>> = coords.iter().map(|c| c.to_vec()).collect();
    serde_wasm_bindgen::to_value(&coords).unwrap()
}

fn square() -> Polyline {
    Polyline::new(positions(&[
        [139.0, 35.0, 10.0],
        [139.0, 35.001, 12.0],
        [139.001, 35.001, 15.0],
        [139.001, 35.0, 11.0],
        [139.0, 35.0, 10.0],
    ]))
    .unwrap()
}

#[wasm_bindgen_test]
fn test_construct_and_trim() {
    let mut line = square();
    assert_eq!(line.vertex_count(), 5);
    assert_eq!(line.segment_count(), 4);

    assert_eq!(line.trim_to(Some(1), Some(3)), 2);
    assert_eq!(line.vertex_count(), 3);
    assert_eq!(line.segment_count(), 2);
    assert!(line.length() > 0.0);
}

#[wasm_bindgen_test]
fn test_out_of_range_positions_are_ignored() {
    let mut line = square();
    assert_eq!(line.trim_before(42), 0);
    assert_eq!(line.remove_at(vec![42, 2]), 1);
    assert_eq!(line.vertex_count(), 4);
    assert!(line.copy_range(42, None).is_none());
    assert_eq!(line.replace_between(Some(0), Some(42), positions(&[])).unwrap(), 0);
}

#[wasm_bindgen_test]
fn test_replace_and_copy() {
    let mut line = square();
    let added = line
        .replace_between(Some(1), Some(3), positions(&[[139.002, 35.002, 20.0]]))
        .unwrap();
    assert_eq!(added, 2);
    assert_eq!(line.vertex_count(), 5);

    let copy = line.copy_range(1, Some(3)).unwrap();
    assert_eq!(copy.vertex_count(), 3);
    assert_eq!(copy.segment_count(), 2);
}

#[wasm_bindgen_test]
fn test_bad_position_rejected() {
    let bad = serde_wasm_bindgen::to_value(&vec![vec![139.0]]).unwrap();
    assert!(Polyline::new(bad).is_err());
}

#[wasm_bindgen_test]
fn test_geojson_output() {
    let line = square();
    let feature: serde_json::Value =
        serde_wasm_bindgen::from_value(line.to_geojson(JsValue::UNDEFINED).unwrap()).unwrap();
    assert_eq!(feature["geometry"]["type"], "LineString");
    assert_eq!(feature["geometry"]["coordinates"][2][2], 15.0);

    let bounds: serde_json::Value =
        serde_wasm_bindgen::from_value(line.bounding_box().unwrap()).unwrap();
    assert_eq!(bounds["minLat"], 35.0);
    assert_eq!(bounds["maxLng"], 139.001);
}
