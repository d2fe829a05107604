use geojson::{Feature, FeatureCollection, Geometry, Value};
use log::info;
use serde_json::{Map, Number, Value as JsonValue};

use crate::chain::DualChain;
use crate::gpx_types::*;
use crate::options::{ConvertOptions, GpxElementType};
use crate::vertex::PathProperties;

/// A polyline built from GPX, ready to be edited or written out.
#[derive(Debug, Clone)]
pub struct GpxPolyline {
    pub gpx_type: GpxElementType,
    pub meta: GpxMeta,
    pub chain: DualChain,
}

/// Build one chain per route and one per track segment (or per track when
/// joining), honouring the type filter.
pub fn to_polylines(data: &GpxData, opts: &ConvertOptions) -> Vec<GpxPolyline> {
    let mut polylines = Vec::new();

    if opts.should_include(GpxElementType::Route) {
        for rte in data.routes.iter().filter(|r| !r.points.is_empty()) {
            polylines.push(GpxPolyline {
                gpx_type: GpxElementType::Route,
                meta: rte.meta.clone(),
                chain: DualChain::from_vertices(rte.points.iter().cloned()),
            });
        }
    }

    if opts.should_include(GpxElementType::Track) {
        for trk in data.tracks.iter().filter(|t| !t.segments.is_empty()) {
            if opts.join_track_segments {
                polylines.push(GpxPolyline {
                    gpx_type: GpxElementType::Track,
                    meta: trk.meta.clone(),
                    chain: DualChain::from_vertices(trk.joined_points()),
                });
            } else {
                for seg in &trk.segments {
                    polylines.push(GpxPolyline {
                        gpx_type: GpxElementType::Track,
                        meta: trk.meta.clone(),
                        chain: DualChain::from_vertices(seg.iter().cloned()),
                    });
                }
            }
        }
    }

    info!(
        "built {} polylines from {} routes and {} tracks",
        polylines.len(),
        data.routes.len(),
        data.tracks.len()
    );
    polylines
}

/// Convert parsed GPX data to a GeoJSON FeatureCollection of polylines.
pub fn to_feature_collection(data: &GpxData, opts: &ConvertOptions) -> FeatureCollection {
    let features = to_polylines(data, opts)
        .iter()
        .filter_map(|p| polyline_to_feature(p, opts))
        .collect();

    FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    }
}

pub fn polyline_to_feature(polyline: &GpxPolyline, opts: &ConvertOptions) -> Option<Feature> {
    let mut feature = chain_to_feature(&polyline.chain, opts)?;
    if let Some(props) = feature.properties.as_mut() {
        let gpx_type = match polyline.gpx_type {
            GpxElementType::Route => "route",
            GpxElementType::Track => "track",
        };
        props.insert("gpxType".to_string(), JsonValue::String(gpx_type.to_string()));
        insert_optional(props, "name", &polyline.meta.name);
        insert_optional(props, "desc", &polyline.meta.desc);
        insert_optional(props, "type", &polyline.meta.kind);
    }
    Some(feature)
}

/// Write a chain as a LineString feature (a Point for a single vertex).
/// Returns `None` for an empty chain.
pub fn chain_to_feature(chain: &DualChain, opts: &ConvertOptions) -> Option<Feature> {
    let coords: Vec<Vec<f64>> = chain
        .vertices()
        .map(|v| v.to_position(opts.include_elevation))
        .collect();

    let geometry = match coords.len() {
        0 => return None,
        1 => Geometry::new(Value::Point(coords[0].clone())),
        _ => Geometry::new(Value::LineString(coords)),
    };

    let mut props = Map::new();
    props.insert("length".to_string(), number(chain.length()));

    let mut coord_props = Map::new();
    if opts.include_time {
        let times: Vec<JsonValue> = chain
            .vertices()
            .map(|v| match v.time {
                Some(t) => JsonValue::String(t.to_rfc3339()),
                None => JsonValue::Null,
            })
            .collect();
        // Only include if at least one time is present
        if times.iter().any(|t| !t.is_null()) {
            coord_props.insert("times".to_string(), JsonValue::Array(times));
        }
    }
    if opts.include_path_properties {
        let columns: [(&str, fn(&PathProperties) -> Option<f64>); 5] = [
            ("rotations", |p: &PathProperties| p.rotation),
            ("rotationRates", |p: &PathProperties| p.rotation_rate),
            ("speeds", |p: &PathProperties| p.speed),
            ("ascentRates", |p: &PathProperties| p.ascent_rate),
            ("descentRates", |p: &PathProperties| p.descent_rate),
        ];
        for (key, column) in columns {
            let values: Vec<JsonValue> = chain
                .vertices()
                .map(|v| optional_number(column(&v.path)))
                .collect();
            if values.iter().any(|v| !v.is_null()) {
                coord_props.insert(key.to_string(), JsonValue::Array(values));
            }
        }
    }
    if !coord_props.is_empty() {
        props.insert(
            "coordinateProperties".to_string(),
            JsonValue::Object(coord_props),
        );
    }

    if opts.include_segments {
        let segments: Vec<JsonValue> = chain
            .segments()
            .map(|s| {
                let mut seg = Map::new();
                seg.insert("length".to_string(), number(s.length));
                seg.insert("angle".to_string(), optional_number(s.angle));
                seg.insert(
                    "direction".to_string(),
                    serde_json::to_value(s.direction).unwrap_or(JsonValue::Null),
                );
                seg.insert("height".to_string(), optional_number(s.height));
                seg.insert("speed".to_string(), optional_number(s.speed));
                JsonValue::Object(seg)
            })
            .collect();
        props.insert("segments".to_string(), JsonValue::Array(segments));
    }

    Some(Feature {
        bbox: None,
        geometry: Some(geometry),
        id: None,
        properties: Some(props),
        foreign_members: None,
    })
}

fn number(value: f64) -> JsonValue {
    Number::from_f64(value).map_or(JsonValue::Null, JsonValue::Number)
}

fn optional_number(value: Option<f64>) -> JsonValue {
    value.map_or(JsonValue::Null, number)
}

fn insert_optional(props: &mut Map<String, JsonValue>, key: &str, value: &Option<String>) {
    if let Some(v) = value {
        props.insert(key.to_string(), JsonValue::String(v.clone()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_gpx;
    use crate::vertex::Vertex;

    const RUN: &str = r#"<?xml version="1.0"?>
<gpx version="1.1">
  <trk>
    <name>Run</name>
    <type>running</type>
    <trkseg>
      <trkpt lat="35.0" lon="139.0"><ele>10</ele><time>2025-01-01T00:00:00Z</time></trkpt>
      <trkpt lat="35.001" lon="139.001"><ele>12</ele><time>2025-01-01T00:01:00Z</time></trkpt>
      <trkpt lat="35.002" lon="139.001"><ele>11</ele><time>2025-01-01T00:02:00Z</time></trkpt>
    </trkseg>
  </trk>
</gpx>"#;

    #[test]
    fn test_track_feature() {
        let data = parse_gpx(RUN).unwrap();
        let fc = to_feature_collection(&data, &ConvertOptions::default());

        assert_eq!(fc.features.len(), 1);
        let f = &fc.features[0];
        let props = f.properties.as_ref().unwrap();
        assert_eq!(props["gpxType"], "track");
        assert_eq!(props["name"], "Run");
        assert_eq!(props["type"], "running");
        assert!(props["length"].as_f64().unwrap() > 0.0);

        match &f.geometry.as_ref().unwrap().value {
            Value::LineString(coords) => {
                assert_eq!(coords.len(), 3);
                assert_eq!(coords[0], vec![139.0, 35.0, 10.0]);
            }
            _ => panic!("Expected LineString"),
        }

        let coord_props = props["coordinateProperties"].as_object().unwrap();
        let times = coord_props["times"].as_array().unwrap();
        assert_eq!(times[0], "2025-01-01T00:00:00+00:00");
        let rotations = coord_props["rotations"].as_array().unwrap();
        assert!(rotations[0].is_null());
        assert!(rotations[1].is_f64());
        assert!(rotations[2].is_null());
        assert_eq!(coord_props["speeds"].as_array().unwrap().len(), 3);
        assert!(!props.contains_key("segments"));
    }

    #[test]
    fn test_segments_listed_on_request() {
        let data = parse_gpx(RUN).unwrap();
        let opts = ConvertOptions {
            include_segments: true,
            include_path_properties: false,
            include_time: false,
            ..Default::default()
        };
        let fc = to_feature_collection(&data, &opts);
        let props = fc.features[0].properties.as_ref().unwrap();
        assert!(!props.contains_key("coordinateProperties"));

        let segments = props["segments"].as_array().unwrap();
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0]["height"], 2.0);
        assert_eq!(segments[0]["direction"]["lat"], "N");
        assert_eq!(segments[0]["direction"]["lng"], "E");
        assert!(segments[1]["direction"]["lng"].is_null());
    }

    #[test]
    fn test_multi_segment_join() {
        let xml = r#"<?xml version="1.0"?>
<gpx version="1.1">
  <trk>
    <trkseg>
      <trkpt lat="35.0" lon="139.0"/>
      <trkpt lat="35.001" lon="139.001"/>
    </trkseg>
    <trkseg>
      <trkpt lat="36.0" lon="140.0"/>
      <trkpt lat="36.001" lon="140.001"/>
    </trkseg>
  </trk>
</gpx>"#;
        let data = parse_gpx(xml).unwrap();
        assert_eq!(to_polylines(&data, &ConvertOptions::default()).len(), 2);

        let opts = ConvertOptions {
            join_track_segments: true,
            ..Default::default()
        };
        let polylines = to_polylines(&data, &opts);
        assert_eq!(polylines.len(), 1);
        assert_eq!(polylines[0].chain.vertex_count(), 4);
        assert_eq!(polylines[0].chain.segment_count(), 3);
    }

    #[test]
    fn test_single_point_route_is_point() {
        let xml = r#"<?xml version="1.0"?>
<gpx version="1.1">
  <rte><rtept lat="35.0" lon="139.0"/></rte>
</gpx>"#;
        let data = parse_gpx(xml).unwrap();
        let fc = to_feature_collection(&data, &ConvertOptions::default());
        assert_eq!(fc.features.len(), 1);
        match &fc.features[0].geometry.as_ref().unwrap().value {
            Value::Point(coords) => assert_eq!(coords, &vec![139.0, 35.0]),
            _ => panic!("Expected Point geometry for single-point route"),
        }
    }

    #[test]
    fn test_elevation_preferred_in_coordinates() {
        let mut chain = DualChain::from_vertices(vec![
            Vertex::new(35.0, 139.0).with_alt(10.0),
        ]);
        let head = chain.first_vertex_id().unwrap();
        chain.replace_between(
            Some(head),
            None,
            vec![Vertex::new(35.001, 139.0).with_alt(20.0).with_elevation(25.0)],
        );
        let f = chain_to_feature(&chain, &ConvertOptions::default()).unwrap();
        match &f.geometry.unwrap().value {
            Value::LineString(coords) => {
                assert_eq!(coords[0][2], 10.0);
                assert_eq!(coords[1][2], 25.0);
            }
            _ => panic!("Expected LineString"),
        }
    }

    #[test]
    fn test_empty_chain_has_no_feature() {
        assert!(chain_to_feature(&DualChain::new(), &ConvertOptions::default()).is_none());
    }

    #[test]
    fn test_type_filter() {
        let xml = r#"<?xml version="1.0"?>
<gpx version="1.1">
  <rte><rtept lat="35.0" lon="139.0"/><rtept lat="36.0" lon="140.0"/></rte>
  <trk><trkseg><trkpt lat="35.0" lon="139.0"/><trkpt lat="36.0" lon="140.0"/></trkseg></trk>
</gpx>"#;
        let data = parse_gpx(xml).unwrap();
        let opts = ConvertOptions {
            types: Some(vec![GpxElementType::Route]),
            ..Default::default()
        };
        let fc = to_feature_collection(&data, &opts);

        assert_eq!(fc.features.len(), 1);
        let props = fc.features[0].properties.as_ref().unwrap();
        assert_eq!(props["gpxType"], "route");
    }
}
