use chrono::{DateTime, Utc};

use crate::error::PolylineError;

/// A recorded point of a route or track.
///
/// `alt` is the altitude reported by the recording device; `elevation` is an
/// externally sampled terrain height. Both stay `None` when unknown, since
/// `0.0` is a perfectly valid height.
#[derive(Debug, Clone, PartialEq)]
pub struct Vertex {
    pub lat: f64,
    pub lng: f64,
    pub alt: Option<f64>,
    pub elevation: Option<f64>,
    pub time: Option<DateTime<Utc>>,
    pub path: PathProperties,
}

impl Vertex {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self {
            lat,
            lng,
            alt: None,
            elevation: None,
            time: None,
            path: PathProperties::default(),
        }
    }

    pub fn with_alt(mut self, alt: f64) -> Self {
        self.alt = Some(alt);
        self
    }

    pub fn with_elevation(mut self, elevation: f64) -> Self {
        self.elevation = Some(elevation);
        self
    }

    pub fn with_time(mut self, time: DateTime<Utc>) -> Self {
        self.time = Some(time);
        self
    }

    /// Best known height: sampled elevation first, measured altitude as fallback.
    pub fn height(&self) -> Option<f64> {
        self.elevation.or(self.alt)
    }

    /// Read a GeoJSON position, `[lng, lat]` or `[lng, lat, alt]`.
    pub fn from_position(position: &[f64]) -> Result<Self, PolylineError> {
        match *position {
            [lng, lat] => Ok(Self::new(lat, lng)),
            [lng, lat, alt] => Ok(Self::new(lat, lng).with_alt(alt)),
            _ => Err(PolylineError::InvalidPosition {
                len: position.len(),
            }),
        }
    }

    /// Build `[lng, lat]` or `[lng, lat, height]` coordinate array.
    pub fn to_position(&self, include_height: bool) -> Vec<f64> {
        match (include_height, self.height()) {
            (true, Some(height)) => vec![self.lng, self.lat, height],
            _ => vec![self.lng, self.lat],
        }
    }

    /// Same latitude and longitude bits, nothing else compared.
    pub fn same_location(&self, other: &Vertex) -> bool {
        self.lat == other.lat && self.lng == other.lng
    }
}

/// Properties of a vertex derived from its incoming and outgoing segments.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PathProperties {
    /// Signed turn in radians, `(-π, π]`. `None` at chain ends.
    pub rotation: Option<f64>,
    /// Metres per second.
    pub speed: Option<f64>,
    /// Radians per second.
    pub rotation_rate: Option<f64>,
    /// Metres per second, non-negative.
    pub ascent_rate: Option<f64>,
    /// Metres per second, non-negative.
    pub descent_rate: Option<f64>,
}
