//! Vertex path properties, derived from the incoming and outgoing segment.
//!
//! Segment properties come from [`Segment::between`]; this module covers the
//! second pass that turns neighbouring segments into per-vertex values.

use crate::chain::{DualChain, VertexKey};
use crate::segment::{rotation, Segment};
use crate::vertex::PathProperties;

impl DualChain {
    /// Rebuild every segment and recompute every vertex.
    pub fn update_properties(&mut self) {
        self.rebuild_segments();
    }

    /// Recompute path properties of every vertex from the current segments.
    pub fn update_path_properties(&mut self) {
        let keys: Vec<VertexKey> = self.vertex_keys().collect();
        for key in keys {
            self.refresh_path(key);
        }
    }

    pub(crate) fn refresh_path(&mut self, key: VertexKey) {
        let Some(node) = self.vertices.get(key) else {
            return;
        };
        let prev = node.prev_segment.map(|s| &self.segments[s].value);
        let next = node.next_segment.map(|s| &self.segments[s].value);
        let path = path_properties(prev, next);
        self.vertices[key].value.path = path;
    }
}

/// Path properties of a vertex between `prev` (ending at it) and `next`
/// (starting at it).
pub fn path_properties(prev: Option<&Segment>, next: Option<&Segment>) -> PathProperties {
    let rotation = match (prev.and_then(|s| s.angle), next.and_then(|s| s.angle)) {
        (Some(a), Some(b)) => Some(rotation(a, b)),
        _ => None,
    };

    let speed = mean(prev.and_then(|s| s.speed), next.and_then(|s| s.speed));

    let rotation_rate = match (rotation, prev.and_then(|s| s.duration), next.and_then(|s| s.duration)) {
        (Some(r), Some(d1), Some(d2)) if d1 + d2 > 0.0 => Some(r / (d1 + d2)),
        _ => None,
    };

    let (ascent_rate, descent_rate) = climb_rates(
        prev.and_then(|s| s.height_rate),
        next.and_then(|s| s.height_rate),
    );

    PathProperties {
        rotation,
        speed,
        rotation_rate,
        ascent_rate,
        descent_rate,
    }
}

fn mean(a: Option<f64>, b: Option<f64>) -> Option<f64> {
    match (a, b) {
        (Some(a), Some(b)) => Some((a + b) / 2.0),
        (Some(v), None) | (None, Some(v)) => Some(v),
        (None, None) => None,
    }
}

/// Split neighbouring height rates into (ascent, descent) magnitudes.
///
/// At a peak or a trough each side keeps its own rate. Elsewhere the mean
/// rate goes entirely to one side and the other is zero.
fn climb_rates(prev: Option<f64>, next: Option<f64>) -> (Option<f64>, Option<f64>) {
    if let (Some(a), Some(b)) = (prev, next) {
        if a * b < 0.0 {
            return (Some(a.max(b)), Some(-a.min(b)));
        }
    }

    match mean(prev, next) {
        Some(rate) if rate > 0.0 => (Some(rate), Some(0.0)),
        Some(rate) if rate < 0.0 => (Some(0.0), Some(-rate)),
        Some(_) => (Some(0.0), Some(0.0)),
        None => (None, None),
    }
}
