//! Overlaying externally sampled terrain elevations onto a chain.
//!
//! Samples are matched to vertices by exact coordinate key only. Once both
//! ends of a segment carry an elevation, its height is taken from them in
//! preference to the measured altitudes.

use std::collections::HashMap;
use std::future::Future;

use geo::{BoundingRect, Coord, LineString};
use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::chain::{DualChain, VertexKey};
use crate::error::PolylineError;
use crate::vertex::Vertex;

/// Elevation in metres keyed by [`coordinate_key`].
pub type ElevationSamples = HashMap<String, f64>;

/// Exact key for a coordinate, written the way `JSON.stringify({lat, lng})`
/// writes it.
pub fn coordinate_key(lat: f64, lng: f64) -> String {
    format!("{{\"lat\":{},\"lng\":{}}}", js_number(lat), js_number(lng))
}

/// A number as `JSON.stringify` prints it: ECMAScript number-to-string, with
/// `-0` printed as `0` and non-finite values as `null`.
fn js_number(value: f64) -> String {
    if !value.is_finite() {
        return "null".to_string();
    }
    let value = if value == 0.0 { 0.0 } else { value };
    ryu_js::Buffer::new().format(value).to_string()
}

/// Minimal rectangle enclosing a set of vertices, in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoundingBox {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lng: f64,
    pub max_lng: f64,
}

impl BoundingBox {
    /// `None` when there are no vertices.
    pub fn enclosing<'a, I>(vertices: I) -> Option<Self>
    where
        I: IntoIterator<Item = &'a Vertex>,
    {
        let line: LineString<f64> = vertices
            .into_iter()
            .map(|v| Coord { x: v.lng, y: v.lat })
            .collect();
        let rect = line.bounding_rect()?;
        Some(Self {
            min_lat: rect.min().y,
            max_lat: rect.max().y,
            min_lng: rect.min().x,
            max_lng: rect.max().x,
        })
    }

    pub fn contains(&self, lat: f64, lng: f64) -> bool {
        (self.min_lat..=self.max_lat).contains(&lat) && (self.min_lng..=self.max_lng).contains(&lng)
    }
}

/// A provider of elevation samples for an area, usually a remote service.
pub trait ElevationSource {
    fn fetch(
        &self,
        bounds: BoundingBox,
    ) -> impl Future<Output = Result<ElevationSamples, PolylineError>>;
}

/// Fetch samples without touching any chain, so a caller guarding the chain
/// with a lock can await this outside the lock and apply the result after.
pub async fn fetch_elevations<S: ElevationSource>(
    source: &S,
    bounds: BoundingBox,
) -> Result<ElevationSamples, PolylineError> {
    source.fetch(bounds).await
}

impl DualChain {
    pub fn bounding_box(&self) -> Option<BoundingBox> {
        BoundingBox::enclosing(self.vertices())
    }

    /// Set `elevation` on every vertex whose coordinates have a sample.
    /// Returns the number of vertices updated.
    pub fn add_elevations(&mut self, samples: &ElevationSamples) -> usize {
        if samples.is_empty() {
            return 0;
        }
        let mut matched = 0;
        for node in self.vertices.values_mut() {
            let key = coordinate_key(node.value.lat, node.value.lng);
            if let Some(&elevation) = samples.get(&key) {
                node.value.elevation = Some(elevation);
                matched += 1;
            }
        }
        matched
    }

    /// Re-derive segment heights from elevations wherever both ends carry one,
    /// overwriting altitude-based heights, and refresh the affected vertices.
    /// Returns the number of segments updated.
    pub fn add_elevation_properties(&mut self) -> usize {
        let mut updated = 0;
        let mut touched: Vec<VertexKey> = Vec::new();
        for node in self.segments.values_mut() {
            let from = &self.vertices[node.from].value;
            let to = &self.vertices[node.to].value;
            if node.value.apply_elevation(from, to) {
                updated += 1;
                touched.push(node.from);
                touched.push(node.to);
            }
        }
        touched.sort_unstable();
        touched.dedup();
        for key in touched {
            self.refresh_path(key);
        }
        updated
    }

    /// Merge a sample map: [`add_elevations`](Self::add_elevations) followed by
    /// [`add_elevation_properties`](Self::add_elevation_properties).
    /// An empty map changes nothing. Returns the number of vertices matched.
    pub fn apply_elevations(&mut self, samples: &ElevationSamples) -> usize {
        let matched = self.add_elevations(samples);
        if matched > 0 {
            let segments = self.add_elevation_properties();
            info!("applied {matched} elevation samples, {segments} segment heights updated");
        }
        matched
    }

    /// Fetch samples for this chain's bounding box and merge them.
    ///
    /// The chain is not modified until the response is in hand; a failed or
    /// empty response leaves it exactly as it was. This borrows the chain
    /// mutably across the await, so a caller guarding the chain with a lock
    /// should instead take [`bounding_box`](Self::bounding_box), release the
    /// lock, await [`fetch_elevations`], and then lock again for
    /// [`apply_elevations`](Self::apply_elevations).
    pub async fn add_elevations_from_api<S: ElevationSource>(
        &mut self,
        source: &S,
    ) -> Result<usize, PolylineError> {
        let Some(bounds) = self.bounding_box() else {
            return Ok(0);
        };
        let samples = match fetch_elevations(source, bounds).await {
            Ok(samples) => samples,
            Err(err) => {
                warn!("elevation fetch failed, chain left unchanged: {err}");
                return Err(err);
            }
        };
        Ok(self.apply_elevations(&samples))
    }
}
