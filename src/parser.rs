use chrono::{DateTime, Utc};
use log::warn;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::error::PolylineError;
use crate::gpx_types::*;
use crate::vertex::Vertex;

type Result<T> = std::result::Result<T, PolylineError>;

/// Parse the routes and tracks of a GPX XML string.
pub fn parse_gpx(xml: &str) -> Result<GpxData> {
    let mut reader = Reader::from_str(xml);
    let mut data = GpxData::default();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"rte" => data.routes.push(parse_route(&mut reader)?),
                b"trk" => data.tracks.push(parse_track(&mut reader)?),
                b"wpt" => {
                    reader
                        .read_to_end(e.name())
                        .map_err(PolylineError::XmlParse)?;
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(PolylineError::XmlParse(e)),
            _ => {}
        }
    }

    Ok(data)
}

/// Parse an RFC 3339 timestamp such as `2025-01-01T06:00:00Z`.
pub fn parse_time(text: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(text.trim())
        .map(|t| t.with_timezone(&Utc))
        .map_err(|_| PolylineError::InvalidTime {
            value: text.to_string(),
        })
}

fn parse_coordinate(element: &'static str, attribute: &'static str, raw: &[u8]) -> Result<f64> {
    let val = std::str::from_utf8(raw).unwrap_or_default();
    val.trim()
        .parse::<f64>()
        .map_err(|_| PolylineError::InvalidAttribute {
            element,
            attribute,
            value: val.to_string(),
        })
}

/// Parse lat/lon attributes from a point element's start tag.
fn parse_lat_lon(e: &BytesStart<'_>) -> Result<(f64, f64)> {
    let mut lat: Option<f64> = None;
    let mut lon: Option<f64> = None;

    for attr_result in e.attributes() {
        let attr = attr_result.map_err(|e| PolylineError::XmlParse(e.into()))?;
        match attr.key.local_name().as_ref() {
            b"lat" => lat = Some(parse_coordinate("point", "lat", &attr.value)?),
            b"lon" => lon = Some(parse_coordinate("point", "lon", &attr.value)?),
            _ => {}
        }
    }

    match (lat, lon) {
        (Some(lat), Some(lon)) => Ok((lat, lon)),
        (None, _) => Err(PolylineError::MissingAttribute {
            element: "point",
            attribute: "lat",
        }),
        (_, None) => Err(PolylineError::MissingAttribute {
            element: "point",
            attribute: "lon",
        }),
    }
}

/// Parse a point element (rtept, trkpt) and its children into a vertex.
/// Called after receiving Event::Start for the point element.
fn parse_point<'a>(
    start: &BytesStart<'a>,
    reader: &mut Reader<&'a [u8]>,
) -> Result<Option<Vertex>> {
    let Ok((lat, lon)) = parse_lat_lon(start) else {
        reader
            .read_to_end(start.name())
            .map_err(PolylineError::XmlParse)?;
        return Ok(None);
    };

    let mut vertex = Vertex::new(lat, lon);
    let end_name = start.name().0.to_vec();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"ele" => {
                    let text = read_text_owned(reader, &e)?;
                    vertex.alt = text.trim().parse::<f64>().ok();
                }
                b"time" => {
                    let text = read_text_owned(reader, &e)?;
                    match parse_time(&text) {
                        Ok(time) => vertex.time = Some(time),
                        Err(err) => warn!("skipping point time at ({lat}, {lon}): {err}"),
                    }
                }
                // extensions, GPX 1.0 speed/course and descriptive children
                _ => {
                    reader
                        .read_to_end(e.name())
                        .map_err(PolylineError::XmlParse)?;
                }
            },
            Ok(Event::End(e)) if e.name().0 == end_name.as_slice() => break,
            Ok(Event::Eof) => break,
            Err(e) => return Err(PolylineError::XmlParse(e)),
            _ => {}
        }
    }

    Ok(Some(vertex))
}

/// Handle a child of <rte>/<trk> that carries descriptive text.
/// Returns false if the element is not one of them.
fn read_meta<'a>(
    meta: &mut GpxMeta,
    e: &BytesStart<'a>,
    reader: &mut Reader<&'a [u8]>,
) -> Result<bool> {
    match e.local_name().as_ref() {
        b"name" => meta.name = Some(read_text_owned(reader, e)?),
        b"desc" => meta.desc = Some(read_text_owned(reader, e)?),
        b"type" => meta.kind = Some(read_text_owned(reader, e)?),
        _ => return Ok(false),
    }
    Ok(true)
}

/// Parse a <rte> element.
fn parse_route<'a>(reader: &mut Reader<&'a [u8]>) -> Result<GpxRoute> {
    let mut route = GpxRoute::default();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                if read_meta(&mut route.meta, &e, reader)? {
                    continue;
                }
                if e.local_name().as_ref() == b"rtept" {
                    if let Some(pt) = parse_point(&e, reader)? {
                        route.points.push(pt);
                    }
                } else {
                    reader
                        .read_to_end(e.name())
                        .map_err(PolylineError::XmlParse)?;
                }
            }
            Ok(Event::Empty(e)) if e.local_name().as_ref() == b"rtept" => {
                if let Ok((lat, lon)) = parse_lat_lon(&e) {
                    route.points.push(Vertex::new(lat, lon));
                }
            }
            Ok(Event::End(e)) if e.local_name().as_ref() == b"rte" => break,
            Ok(Event::Eof) => break,
            Err(e) => return Err(PolylineError::XmlParse(e)),
            _ => {}
        }
    }

    Ok(route)
}

/// Parse a <trk> element.
fn parse_track<'a>(reader: &mut Reader<&'a [u8]>) -> Result<GpxTrack> {
    let mut track = GpxTrack::default();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                if read_meta(&mut track.meta, &e, reader)? {
                    continue;
                }
                if e.local_name().as_ref() == b"trkseg" {
                    let points = parse_track_segment(reader)?;
                    if !points.is_empty() {
                        track.segments.push(points);
                    }
                } else {
                    reader
                        .read_to_end(e.name())
                        .map_err(PolylineError::XmlParse)?;
                }
            }
            Ok(Event::End(e)) if e.local_name().as_ref() == b"trk" => break,
            Ok(Event::Eof) => break,
            Err(e) => return Err(PolylineError::XmlParse(e)),
            _ => {}
        }
    }

    Ok(track)
}

/// Parse the points of a <trkseg> element.
fn parse_track_segment<'a>(reader: &mut Reader<&'a [u8]>) -> Result<Vec<Vertex>> {
    let mut points = Vec::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                if e.local_name().as_ref() == b"trkpt" {
                    if let Some(pt) = parse_point(&e, reader)? {
                        points.push(pt);
                    }
                } else {
                    reader
                        .read_to_end(e.name())
                        .map_err(PolylineError::XmlParse)?;
                }
            }
            Ok(Event::Empty(e)) if e.local_name().as_ref() == b"trkpt" => {
                if let Ok((lat, lon)) = parse_lat_lon(&e) {
                    points.push(Vertex::new(lat, lon));
                }
            }
            Ok(Event::End(e)) if e.local_name().as_ref() == b"trkseg" => break,
            Ok(Event::Eof) => break,
            Err(e) => return Err(PolylineError::XmlParse(e)),
            _ => {}
        }
    }

    Ok(points)
}

fn predefined_entity(name: &str) -> Option<char> {
    match name {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        _ => None,
    }
}

/// Read text content of an element as an owned String, including CDATA
/// sections and entity references.
fn read_text_owned<'a>(reader: &mut Reader<&'a [u8]>, start: &BytesStart<'_>) -> Result<String> {
    let end_name = start.name().0.to_vec();
    let mut text = String::new();

    loop {
        match reader.read_event() {
            Ok(Event::Text(e)) => text.push_str(std::str::from_utf8(e.as_ref()).unwrap_or_default()),
            Ok(Event::CData(e)) => text.push_str(std::str::from_utf8(e.as_ref()).unwrap_or_default()),
            Ok(Event::GeneralRef(e)) => {
                if let Ok(Some(ch)) = e.resolve_char_ref() {
                    text.push(ch);
                } else if let Some(ch) =
                    predefined_entity(std::str::from_utf8(e.as_ref()).unwrap_or_default())
                {
                    text.push(ch);
                }
            }
            Ok(Event::End(e)) if e.name().0 == end_name.as_slice() => break,
            Ok(Event::Eof) => break,
            Err(e) => return Err(PolylineError::XmlParse(e)),
            _ => {}
        }
    }

    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_simple_route() {
        let xml = r#"<?xml version="1.0"?>
<gpx version="1.1">
  <rte>
    <name>Test Route</name>
    <type>cycling</type>
    <rtept lat="35.0" lon="139.0"/>
    <rtept lat="36.0" lon="140.0"/>
    <rtept lat="37.0" lon="141.0"/>
  </rte>
</gpx>"#;
        let data = parse_gpx(xml).unwrap();
        assert_eq!(data.routes.len(), 1);
        let route = &data.routes[0];
        assert_eq!(route.meta.name.as_deref(), Some("Test Route"));
        assert_eq!(route.meta.kind.as_deref(), Some("cycling"));
        assert_eq!(route.points.len(), 3);
        assert_eq!(route.points[1].lat, 36.0);
        assert_eq!(route.points[1].lng, 140.0);
    }

    #[test]
    fn test_track_point_children() {
        let xml = r#"<?xml version="1.0"?>
<gpx version="1.1">
  <trk>
    <trkseg>
      <trkpt lat="35.0" lon="139.0">
        <ele>12.5</ele>
        <time>2025-01-01T06:00:00Z</time>
        <name>Start</name>
      </trkpt>
      <trkpt lat="35.001" lon="139.0"/>
    </trkseg>
  </trk>
</gpx>"#;
        let data = parse_gpx(xml).unwrap();
        let points = &data.tracks[0].segments[0];
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].alt, Some(12.5));
        assert_eq!(
            points[0].time,
            Some(Utc.with_ymd_and_hms(2025, 1, 1, 6, 0, 0).unwrap())
        );
        assert_eq!(points[1].alt, None);
        assert_eq!(points[1].elevation, None);
    }

    #[test]
    fn test_invalid_time_is_dropped() {
        let xml = r#"<?xml version="1.0"?>
<gpx version="1.1">
  <trk><trkseg>
    <trkpt lat="35.0" lon="139.0"><time>yesterday</time></trkpt>
  </trkseg></trk>
</gpx>"#;
        let data = parse_gpx(xml).unwrap();
        assert_eq!(data.tracks[0].segments[0][0].time, None);
    }

    #[test]
    fn test_parse_time_offset() {
        let t = parse_time("2025-01-01T09:00:00+09:00").unwrap();
        assert_eq!(t, Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap());
        assert!(matches!(
            parse_time("nope"),
            Err(PolylineError::InvalidTime { .. })
        ));
    }

    #[test]
    fn test_waypoints_ignored() {
        let xml = r#"<?xml version="1.0"?>
<gpx version="1.1">
  <wpt lat="35.6762" lon="139.6503"><name>Tokyo</name></wpt>
  <wpt lat="35.0" lon="139.0"/>
</gpx>"#;
        let data = parse_gpx(xml).unwrap();
        assert!(data.routes.is_empty());
        assert!(data.tracks.is_empty());
    }

    #[test]
    fn test_empty_segments_dropped() {
        let xml = r#"<?xml version="1.0"?>
<gpx version="1.1">
  <trk>
    <trkseg></trkseg>
    <trkseg>
      <trkpt lat="35.0" lon="139.0"/>
    </trkseg>
  </trk>
</gpx>"#;
        let data = parse_gpx(xml).unwrap();
        assert_eq!(data.tracks[0].segments.len(), 1);
        assert_eq!(data.tracks[0].segments[0].len(), 1);
    }

    #[test]
    fn test_extensions_skipped() {
        let xml = r#"<?xml version="1.0"?>
<gpx version="1.1">
  <trk>
    <trkseg>
      <trkpt lat="35.0" lon="139.0">
        <extensions>
          <gpxtpx:TrackPointExtension xmlns:gpxtpx="http://www.garmin.com/xmlschemas/TrackPointExtension/v1">
            <gpxtpx:hr>150</gpxtpx:hr>
          </gpxtpx:TrackPointExtension>
        </extensions>
      </trkpt>
    </trkseg>
  </trk>
</gpx>"#;
        let data = parse_gpx(xml).unwrap();
        assert_eq!(data.tracks[0].segments[0].len(), 1);
    }

    #[test]
    fn test_missing_lat_lon_skipped() {
        let xml = r#"<?xml version="1.0"?>
<gpx xmlns="http://www.topografix.com/GPX/1/1" version="1.1">
  <rte>
    <rtept lat="35.0" lon="139.0"><name>Good</name></rtept>
    <rtept><name>Bad - no coords</name></rtept>
    <rtept lat="abc" lon="140.0"/>
    <rtept lat="36.0" lon="140.0"/>
  </rte>
</gpx>"#;
        let data = parse_gpx(xml).unwrap();
        assert_eq!(data.routes[0].points.len(), 2);
        assert_eq!(data.routes[0].points[1].lat, 36.0);
    }

    #[test]
    fn test_cdata_and_entities_in_name() {
        let xml = r#"<?xml version="1.0"?>
<gpx version="1.1">
  <trk>
    <name><![CDATA[Hill & Dale]]></name>
    <desc>Up &amp; down &#60;fast&#62;</desc>
    <trkseg><trkpt lat="35.0" lon="139.0"/></trkseg>
  </trk>
</gpx>"#;
        let data = parse_gpx(xml).unwrap();
        assert_eq!(data.tracks[0].meta.name.as_deref(), Some("Hill & Dale"));
        assert_eq!(data.tracks[0].meta.desc.as_deref(), Some("Up & down <fast>"));
    }

    #[test]
    fn test_gpx10_elements_ignored() {
        let xml = r#"<?xml version="1.0"?>
<gpx xmlns="http://www.topografix.com/GPX/1/0" version="1.0">
  <trk>
    <trkseg>
      <trkpt lat="35.0" lon="139.0">
        <speed>5.5</speed>
        <course>180.0</course>
      </trkpt>
      <trkpt lat="35.001" lon="139.001"/>
    </trkseg>
  </trk>
</gpx>"#;
        let data = parse_gpx(xml).unwrap();
        assert_eq!(data.tracks[0].segments[0].len(), 2);
    }
}
