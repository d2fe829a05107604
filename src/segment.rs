use std::f64::consts::{FRAC_PI_2, PI};

use geo::{Distance, Haversine, Point};
use serde::Serialize;

use crate::vertex::Vertex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LatDirection {
    #[serde(rename = "N")]
    North,
    #[serde(rename = "S")]
    South,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LngDirection {
    #[serde(rename = "E")]
    East,
    #[serde(rename = "W")]
    West,
}

/// Cardinal components of travel along a segment. An axis without change is `None`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Direction {
    pub lat: Option<LatDirection>,
    pub lng: Option<LngDirection>,
}

impl Direction {
    pub fn between(from: &Vertex, to: &Vertex) -> Self {
        let d_lat = to.lat - from.lat;
        let d_lng = to.lng - from.lng;

        let lat = if d_lat > 0.0 {
            Some(LatDirection::North)
        } else if d_lat < 0.0 {
            Some(LatDirection::South)
        } else {
            None
        };
        let lng = if d_lng > 0.0 {
            Some(LngDirection::East)
        } else if d_lng < 0.0 {
            Some(LngDirection::West)
        } else {
            None
        };

        Self { lat, lng }
    }
}

/// Derived properties of the directed span between two consecutive vertices.
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    /// Metres.
    pub length: f64,
    /// Bearing in radians. `None` between coincident points.
    pub angle: Option<f64>,
    pub direction: Direction,
    /// Metres, `to - from`. Elevation-based when both ends have elevations,
    /// otherwise altitude-based, otherwise `None`.
    pub height: Option<f64>,
    /// Seconds between the endpoint timestamps.
    pub duration: Option<f64>,
    /// Metres per second.
    pub speed: Option<f64>,
    /// Metres per second of height change, signed.
    pub height_rate: Option<f64>,
}

impl Segment {
    pub fn between(from: &Vertex, to: &Vertex) -> Self {
        let length = distance(from, to);
        let duration = match (from.time, to.time) {
            (Some(t1), Some(t2)) => Some((t2 - t1).num_milliseconds() as f64 / 1000.0),
            _ => None,
        };
        let speed = duration.filter(|d| *d > 0.0).map(|d| length / d);

        let mut segment = Self {
            length,
            angle: bearing(from, to),
            direction: Direction::between(from, to),
            height: altitude_height(from, to),
            duration,
            speed,
            height_rate: None,
        };
        segment.apply_elevation(from, to);
        segment.update_height_rate();
        segment
    }

    /// Overwrite `height` from endpoint elevations. Returns false and leaves the
    /// segment untouched unless both endpoints carry one.
    pub(crate) fn apply_elevation(&mut self, from: &Vertex, to: &Vertex) -> bool {
        match (from.elevation, to.elevation) {
            (Some(e1), Some(e2)) => {
                self.height = Some(e2 - e1);
                self.update_height_rate();
                true
            }
            _ => false,
        }
    }

    fn update_height_rate(&mut self) {
        self.height_rate = match (self.height, self.duration) {
            (Some(h), Some(d)) if d > 0.0 => Some(h / d),
            _ => None,
        };
    }
}

fn altitude_height(from: &Vertex, to: &Vertex) -> Option<f64> {
    match (from.alt, to.alt) {
        (Some(a1), Some(a2)) => Some(a2 - a1),
        _ => None,
    }
}

fn point(lat: f64, lng: f64) -> Point<f64> {
    Point::new(lng, lat)
}

/// Surface distance in metres.
pub fn distance(from: &Vertex, to: &Vertex) -> f64 {
    Haversine.distance(point(from.lat, from.lng), point(to.lat, to.lng))
}

/// Bearing of `to` seen from `from`, in radians.
///
/// The general case is `atan2(north, east)` over signed surface distances.
/// Without any east-west component the result is `π/2` going north, `3π/2`
/// going south and `None` for coincident points. The `3π/2` lies outside the
/// `atan2` range; consumers depend on it as-is.
pub fn bearing(from: &Vertex, to: &Vertex) -> Option<f64> {
    let origin = point(from.lat, from.lng);
    let north = Haversine
        .distance(origin, point(to.lat, from.lng))
        .copysign(to.lat - from.lat);
    let east = Haversine
        .distance(origin, point(from.lat, to.lng))
        .copysign(to.lng - from.lng);

    if east == 0.0 {
        if north > 0.0 {
            Some(FRAC_PI_2)
        } else if north < 0.0 {
            Some(3.0 * FRAC_PI_2)
        } else {
            None
        }
    } else {
        Some(north.atan2(east))
    }
}

/// Shortest signed turn from `prev` to `next`, in `(-π, π]`.
pub fn rotation(prev: f64, next: f64) -> f64 {
    let delta = next - prev;
    let wrapped = delta.sin().atan2(delta.cos());
    if wrapped <= -PI { wrapped + 2.0 * PI } else { wrapped }
}
