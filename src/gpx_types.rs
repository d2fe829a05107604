use crate::vertex::Vertex;

/// Polyline sources read from a GPX document. Waypoints are not polylines
/// and are not kept.
#[derive(Debug, Default)]
pub struct GpxData {
    pub routes: Vec<GpxRoute>,
    pub tracks: Vec<GpxTrack>,
}

/// Descriptive fields shared by <rte> and <trk>.
#[derive(Debug, Clone, Default)]
pub struct GpxMeta {
    pub name: Option<String>,
    pub desc: Option<String>,
    pub kind: Option<String>,
}

/// A GPX route (<rte>).
#[derive(Debug, Default)]
pub struct GpxRoute {
    pub meta: GpxMeta,
    pub points: Vec<Vertex>,
}

/// A GPX track (<trk>). Empty <trkseg> elements are dropped while parsing.
#[derive(Debug, Default)]
pub struct GpxTrack {
    pub meta: GpxMeta,
    pub segments: Vec<Vec<Vertex>>,
}

impl GpxTrack {
    /// All points of all segments, in document order.
    pub fn joined_points(&self) -> Vec<Vertex> {
        self.segments.iter().flatten().cloned().collect()
    }
}
