pub mod chain;
pub mod converter;
pub mod elevation;
pub mod error;
pub mod gpx_types;
mod mutation;
pub mod options;
pub mod parser;
pub mod propagation;
pub mod segment;
pub mod vertex;

use serde::Serialize;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::JsFuture;

pub use crate::chain::{DualChain, SegmentId, VertexId};
pub use crate::elevation::{BoundingBox, ElevationSamples, ElevationSource};
pub use crate::error::PolylineError;
pub use crate::segment::{Direction, Segment};
pub use crate::vertex::{PathProperties, Vertex};

use crate::options::ConvertOptions;

/// Convert GPX string to a GeoJSON FeatureCollection of polylines with derived
/// properties, returned as a JS object.
#[wasm_bindgen(js_name = gpxToPolylineGeoJson)]
pub fn gpx_to_polyline_geojson(gpx_string: &str, options: JsValue) -> Result<JsValue, JsValue> {
    console_error_panic_hook::set_once();

    let opts = parse_options(options)?;
    let gpx_data = parser::parse_gpx(gpx_string)?;
    let fc = converter::to_feature_collection(&gpx_data, &opts);
    to_js(&fc)
}

/// Convert GPX string to GeoJSON, returned as a JSON string.
#[wasm_bindgen(js_name = gpxToPolylineGeoJsonString)]
pub fn gpx_to_polyline_geojson_string(gpx_string: &str, options: JsValue) -> Result<String, JsValue> {
    console_error_panic_hook::set_once();

    let opts = parse_options(options)?;
    let gpx_data = parser::parse_gpx(gpx_string)?;
    let fc = converter::to_feature_collection(&gpx_data, &opts);
    serde_json::to_string(&fc).map_err(|e| PolylineError::from(e).into())
}

/// Call a JS `fetcher(bounds) => Promise<{[coordinateKey]: elevation}>` and
/// return the samples. No polyline is touched while the promise is pending;
/// pass the result to `Polyline.addElevations`.
#[wasm_bindgen(js_name = fetchElevations)]
pub async fn fetch_elevations(fetcher: js_sys::Function, bounds: JsValue) -> Result<JsValue, JsValue> {
    let bounds: BoundingBox = serde_wasm_bindgen::from_value(bounds).map_err(PolylineError::from)?;
    let source = JsElevationSource { fetcher };
    let samples = elevation::fetch_elevations(&source, bounds).await?;
    to_js(&samples)
}

/// Elevation source backed by a JS function returning a promise.
struct JsElevationSource {
    fetcher: js_sys::Function,
}

impl ElevationSource for JsElevationSource {
    async fn fetch(&self, bounds: BoundingBox) -> Result<ElevationSamples, PolylineError> {
        let arg = bounds
            .serialize(&serde_wasm_bindgen::Serializer::json_compatible())
            .map_err(PolylineError::from)?;
        let promise = self
            .fetcher
            .call1(&JsValue::NULL, &arg)
            .map_err(js_failure)?;
        let response = JsFuture::from(js_sys::Promise::from(promise))
            .await
            .map_err(js_failure)?;
        Ok(serde_wasm_bindgen::from_value(response)?)
    }
}

fn js_failure(e: JsValue) -> PolylineError {
    PolylineError::Elevation(e.as_string().unwrap_or_else(|| format!("{e:?}")))
}

/// An editable polyline. Vertices are addressed by their current zero-based
/// position; an out-of-range position behaves like a vertex that is not there.
#[wasm_bindgen]
pub struct Polyline {
    chain: DualChain,
}

#[wasm_bindgen]
impl Polyline {
    /// Build from GeoJSON positions `[[lng, lat, alt?], ...]`.
    #[wasm_bindgen(constructor)]
    pub fn new(positions: JsValue) -> Result<Polyline, JsValue> {
        console_error_panic_hook::set_once();
        let chain = chain_from_positions(positions)?;
        Ok(Self { chain })
    }

    #[wasm_bindgen(js_name = vertexCount)]
    pub fn vertex_count(&self) -> usize {
        self.chain.vertex_count()
    }

    #[wasm_bindgen(js_name = segmentCount)]
    pub fn segment_count(&self) -> usize {
        self.chain.segment_count()
    }

    pub fn length(&self) -> f64 {
        self.chain.length()
    }

    #[wasm_bindgen(js_name = trimBefore)]
    pub fn trim_before(&mut self, index: u32) -> usize {
        self.id_at(index).map_or(0, |id| self.chain.trim_before(id))
    }

    #[wasm_bindgen(js_name = trimAfter)]
    pub fn trim_after(&mut self, index: u32) -> usize {
        self.id_at(index).map_or(0, |id| self.chain.trim_after(id))
    }

    #[wasm_bindgen(js_name = trimTo)]
    pub fn trim_to(&mut self, start: Option<u32>, end: Option<u32>) -> usize {
        let start = start.and_then(|i| self.id_at(i));
        let end = end.and_then(|i| self.id_at(i));
        self.chain.trim_to(start, end)
    }

    #[wasm_bindgen(js_name = removeAt)]
    pub fn remove_at(&mut self, indices: Vec<u32>) -> usize {
        let ids: Vec<VertexId> = indices.into_iter().filter_map(|i| self.id_at(i)).collect();
        self.chain.remove_at_any(&ids)
    }

    #[wasm_bindgen(js_name = replaceBetween)]
    pub fn replace_between(
        &mut self,
        start: Option<u32>,
        end: Option<u32>,
        positions: JsValue,
    ) -> Result<usize, JsValue> {
        let vertices = vertices_from_positions(positions)?;
        let start_id = start.and_then(|i| self.id_at(i));
        let end_id = end.and_then(|i| self.id_at(i));
        if start_id.is_none() != start.is_none() || end_id.is_none() != end.is_none() {
            return Ok(0);
        }
        Ok(self.chain.replace_between(start_id, end_id, vertices))
    }

    #[wasm_bindgen(js_name = copyRange)]
    pub fn copy_range(&self, start: u32, end: Option<u32>) -> Option<Polyline> {
        let start = self.id_at(start)?;
        let end = end.and_then(|i| self.id_at(i));
        let chain = self.chain.copy_range_by_points(start, end)?;
        Some(Polyline { chain })
    }

    /// Merge `{[coordinateKey]: elevation}` samples and re-derive heights.
    /// Returns the number of vertices matched.
    #[wasm_bindgen(js_name = addElevations)]
    pub fn add_elevations(&mut self, samples: JsValue) -> Result<usize, JsValue> {
        let samples: ElevationSamples =
            serde_wasm_bindgen::from_value(samples).map_err(PolylineError::from)?;
        Ok(self.chain.apply_elevations(&samples))
    }

    /// `{minLat, maxLat, minLng, maxLng}`, or `null` when empty.
    #[wasm_bindgen(js_name = boundingBox)]
    pub fn bounding_box(&self) -> Result<JsValue, JsValue> {
        to_js(&self.chain.bounding_box())
    }

    #[wasm_bindgen(js_name = toGeoJson)]
    pub fn to_geojson(&self, options: JsValue) -> Result<JsValue, JsValue> {
        let opts = parse_options(options)?;
        to_js(&converter::chain_to_feature(&self.chain, &opts))
    }
}

impl Polyline {
    fn id_at(&self, index: u32) -> Option<VertexId> {
        self.chain.vertex_id_at(index as usize)
    }
}

fn vertices_from_positions(positions: JsValue) -> Result<Vec<Vertex>, PolylineError> {
    let positions: Vec<Vec<f64>> = serde_wasm_bindgen::from_value(positions)?;
    positions.iter().map(|p| Vertex::from_position(p)).collect()
}

fn chain_from_positions(positions: JsValue) -> Result<DualChain, PolylineError> {
    Ok(DualChain::from_vertices(vertices_from_positions(positions)?))
}

fn to_js<T: Serialize + ?Sized>(value: &T) -> Result<JsValue, JsValue> {
    value
        .serialize(&serde_wasm_bindgen::Serializer::json_compatible())
        .map_err(|e| PolylineError::from(e).into())
}

fn parse_options(options: JsValue) -> Result<ConvertOptions, JsValue> {
    if options.is_undefined() || options.is_null() {
        Ok(ConvertOptions::default())
    } else {
        serde_wasm_bindgen::from_value(options).map_err(|e| PolylineError::from(e).into())
    }
}
