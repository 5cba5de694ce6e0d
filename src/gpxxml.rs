use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use std::fs;
use std::io::Write;
use std::path::Path;
use time::OffsetDateTime;
use time::format_description::well_known::Iso8601;
use tracing::debug;

use crate::error::GpxError;
use crate::model::{Activity, ExtensionNode, Segment, Track, TrackPoint, Waypoint};

/// Reads a whole file, reporting a missing path before any I/O is attempted.
pub fn read_input(path: &Path) -> Result<Vec<u8>, GpxError> {
    if !path.exists() {
        return Err(GpxError::NotFound(path.to_path_buf()));
    }
    fs::read(path).map_err(|e| GpxError::io(path, e))
}

pub fn load_activity(path: &Path) -> Result<Activity, GpxError> {
    let input = read_input(path)?;
    let activity = parse_activity(&input)?;
    debug!(
        path = %path.display(),
        tracks = activity.track_count(),
        waypoints = activity.waypoint_count(),
        "loaded GPX document"
    );
    Ok(activity)
}

fn xml_error<R>(reader: &Reader<R>, source: quick_xml::Error) -> GpxError {
    GpxError::Xml {
        position: reader.buffer_position(),
        source,
    }
}

fn local_name(e: &BytesStart) -> Vec<u8> {
    e.local_name().as_ref().to_vec()
}

fn parse_time(text: &str) -> Option<OffsetDateTime> {
    OffsetDateTime::parse(text.trim(), &Iso8601::DEFAULT).ok()
}

fn non_empty(text: &str) -> Option<String> {
    let trimmed = text.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn read_attributes(e: &BytesStart) -> Result<Vec<(String, String)>, quick_xml::Error> {
    let mut attributes = Vec::new();
    for attr in e.attributes() {
        let attr = attr?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr.unescape_value()?.into_owned();
        attributes.push((key, value));
    }
    Ok(attributes)
}

fn read_coordinates(e: &BytesStart, element: &'static str) -> Result<(f64, f64), GpxError> {
    let attributes = read_attributes(e).map_err(GpxError::Attribute)?;
    let coordinate = |attribute: &'static str| -> Result<f64, GpxError> {
        let value = attributes
            .iter()
            .find(|(k, _)| k == attribute)
            .map(|(_, v)| v.as_str())
            .unwrap_or_default();
        value
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .ok_or_else(|| GpxError::InvalidCoordinate {
                element,
                attribute,
                value: value.to_string(),
            })
    };
    Ok((coordinate("lat")?, coordinate("lon")?))
}

fn start_node(e: &BytesStart) -> Result<ExtensionNode, quick_xml::Error> {
    Ok(ExtensionNode {
        tag: String::from_utf8_lossy(e.name().as_ref()).into_owned(),
        attributes: read_attributes(e)?,
        ..ExtensionNode::default()
    })
}

fn append_text(node: &mut ExtensionNode, text: &str) {
    let slot = match node.children.last_mut() {
        Some(child) => &mut child.tail,
        None => &mut node.text,
    };
    slot.get_or_insert_with(String::new).push_str(text);
}

/// Consumes events up to the end tag matching `start`, building the element
/// tree. Comments and processing instructions inside the payload are dropped.
pub fn read_node(reader: &mut Reader<&[u8]>, start: &BytesStart) -> Result<ExtensionNode, GpxError> {
    let mut node = start_node(start).map_err(|e| xml_error(reader, e))?;
    let mut buf = Vec::new();

    loop {
        let event = match reader.read_event_into(&mut buf) {
            Err(e) => return Err(xml_error(reader, e)),
            Ok(Event::Eof) => return Err(GpxError::UnexpectedEof(node.tag)),
            Ok(event) => event.into_owned(),
        };

        match event {
            Event::Start(ref e) => {
                let child = read_node(reader, e)?;
                node.children.push(child);
            }
            Event::Empty(ref e) => {
                let child = start_node(e).map_err(|err| xml_error(reader, err))?;
                node.children.push(child);
            }
            Event::Text(ref e) => {
                let text = e.unescape().map_err(|err| xml_error(reader, err))?;
                append_text(&mut node, &text);
            }
            Event::CData(ref e) => {
                append_text(&mut node, &String::from_utf8_lossy(e));
            }
            Event::End(_) => return Ok(node),
            _ => {}
        }

        buf.clear();
    }
}

/// Writes an element tree produced by [`read_node`]. The node's own tail is
/// left to the caller.
pub fn write_node<W: Write>(writer: &mut Writer<W>, node: &ExtensionNode) -> Result<(), GpxError> {
    let mut start = BytesStart::new(node.tag.as_str());
    for (key, value) in &node.attributes {
        start.push_attribute((key.as_str(), value.as_str()));
    }

    if node.text.is_none() && node.children.is_empty() {
        return writer.write_event(Event::Empty(start)).map_err(GpxError::Write);
    }

    writer.write_event(Event::Start(start)).map_err(GpxError::Write)?;
    if let Some(text) = &node.text {
        writer
            .write_event(Event::Text(BytesText::new(text)))
            .map_err(GpxError::Write)?;
    }
    for child in &node.children {
        write_node(writer, child)?;
        if let Some(tail) = &child.tail {
            writer
                .write_event(Event::Text(BytesText::new(tail)))
                .map_err(GpxError::Write)?;
        }
    }
    writer
        .write_event(Event::End(BytesEnd::new(node.tag.as_str())))
        .map_err(GpxError::Write)
}

/// Partially built objects while streaming through a document.
#[derive(Default)]
struct ParseState {
    activity: Activity,
    track: Option<Track>,
    segment: Option<Segment>,
    point: Option<TrackPoint>,
    waypoint: Option<Waypoint>,
    text: String,
}

impl ParseState {
    fn finish_point(&mut self) {
        if let (Some(point), Some(segment)) = (self.point.take(), self.segment.as_mut()) {
            segment.points.push(point);
        }
    }

    fn finish_segment(&mut self) {
        if let (Some(segment), Some(track)) = (self.segment.take(), self.track.as_mut()) {
            track.segments.push(segment);
        }
    }

    fn finish_track(&mut self) {
        if let Some(track) = self.track.take() {
            self.activity.tracks.push(track);
        }
    }

    fn finish_waypoint(&mut self) {
        if let Some(waypoint) = self.waypoint.take() {
            self.activity.waypoints.push(waypoint);
        }
    }

    fn open(&mut self, name: &[u8], parent: Option<&[u8]>, e: &BytesStart) -> Result<(), GpxError> {
        match (name, parent) {
            (b"trk", Some(b"gpx")) => self.track = Some(Track::default()),
            (b"trkseg", Some(b"trk")) => self.segment = Some(Segment::default()),
            (b"trkpt", Some(b"trkseg")) => {
                let (lat, lon) = read_coordinates(e, "trkpt")?;
                self.point = Some(TrackPoint::new(lat, lon));
            }
            (b"wpt", Some(b"gpx")) => {
                let (lat, lon) = read_coordinates(e, "wpt")?;
                self.waypoint = Some(Waypoint {
                    lat,
                    lon,
                    name: None,
                });
            }
            _ => {}
        }
        Ok(())
    }

    fn close(&mut self, name: &[u8], parent: Option<&[u8]>) {
        let text = std::mem::take(&mut self.text);
        match (name, parent) {
            (b"trkpt", _) => self.finish_point(),
            (b"trkseg", _) => self.finish_segment(),
            (b"trk", _) => self.finish_track(),
            (b"wpt", _) => self.finish_waypoint(),
            (b"ele", Some(b"trkpt")) => {
                if let Some(point) = self.point.as_mut() {
                    point.elevation = text.trim().parse().ok();
                }
            }
            (b"time", Some(b"trkpt")) => {
                if let Some(point) = self.point.as_mut() {
                    point.time = parse_time(&text);
                }
            }
            (b"name", Some(b"trk")) => {
                if let Some(track) = self.track.as_mut() {
                    track.name = non_empty(&text);
                }
            }
            (b"type", Some(b"trk")) => {
                if let Some(track) = self.track.as_mut() {
                    track.kind = non_empty(&text);
                }
            }
            (b"name", Some(b"wpt")) => {
                if let Some(waypoint) = self.waypoint.as_mut() {
                    waypoint.name = non_empty(&text);
                }
            }
            _ => {}
        }
    }
}

/// Parses a GPX document into tracks, segments, points and waypoints.
///
/// Structural elements are matched on their local name so prefixed documents
/// (`<gpx:trkpt>`) parse the same as unprefixed ones.
pub fn parse_activity(input: &[u8]) -> Result<Activity, GpxError> {
    let mut reader = Reader::from_reader(input);
    let mut buf = Vec::new();
    let mut stack: Vec<Vec<u8>> = Vec::new();
    let mut seen_root = false;
    let mut state = ParseState::default();

    loop {
        let event = match reader.read_event_into(&mut buf) {
            Err(e) => return Err(xml_error(&reader, e)),
            Ok(Event::Eof) => break,
            Ok(event) => event.into_owned(),
        };

        match event {
            Event::Start(ref e) | Event::Empty(ref e) => {
                let is_empty = matches!(event, Event::Empty(_));
                let name = local_name(e);
                if stack.is_empty() {
                    if seen_root || name != b"gpx" {
                        return Err(GpxError::NotGpx);
                    }
                    seen_root = true;
                }
                let parent = stack.last().map(Vec::as_slice);

                if name == b"extensions" && !is_empty {
                    match parent {
                        Some(b"trkpt") => {
                            let node = read_node(&mut reader, e)?;
                            if let Some(point) = state.point.as_mut() {
                                point.extensions = node.children;
                            }
                        }
                        Some(b"gpx") => {
                            let node = read_node(&mut reader, e)?;
                            state.activity.extensions = node.children;
                        }
                        _ => stack.push(name),
                    }
                } else {
                    state.open(&name, parent, e)?;
                    state.text.clear();
                    if is_empty {
                        state.close(&name, parent);
                    } else {
                        stack.push(name);
                    }
                }
            }

            Event::End(_) => {
                if let Some(name) = stack.pop() {
                    state.close(&name, stack.last().map(Vec::as_slice));
                }
            }

            Event::Text(ref e) => {
                let text = e.unescape().map_err(|err| xml_error(&reader, err))?;
                state.text.push_str(&text);
            }

            Event::CData(ref e) => {
                state.text.push_str(&String::from_utf8_lossy(e));
            }

            _ => {}
        }

        buf.clear();
    }

    if let Some(open) = stack.last() {
        return Err(GpxError::UnexpectedEof(String::from_utf8_lossy(open).into_owned()));
    }
    if !seen_root {
        return Err(GpxError::NotGpx);
    }

    Ok(state.activity)
}

/// Streams `input` to `output` unchanged except for each trackpoint's
/// `<extensions>` element, whose children are replaced by `transform`'s result.
///
/// An `<extensions>` element left without children is omitted entirely.
pub fn rewrite_point_extensions<W, F>(input: &[u8], output: W, mut transform: F) -> Result<(), GpxError>
where
    W: Write,
    F: FnMut(Vec<ExtensionNode>) -> Vec<ExtensionNode>,
{
    let mut reader = Reader::from_reader(input);
    let mut writer = Writer::new(output);
    let mut buf = Vec::new();
    let mut stack: Vec<Vec<u8>> = Vec::new();
    let mut seen_root = false;
    let mut rewritten = 0usize;

    loop {
        let event = match reader.read_event_into(&mut buf) {
            Err(e) => return Err(xml_error(&reader, e)),
            Ok(Event::Eof) => break,
            Ok(event) => event.into_owned(),
        };

        match event {
            Event::Start(e) => {
                let name = local_name(&e);
                if stack.is_empty() {
                    if seen_root || name != b"gpx" {
                        return Err(GpxError::NotGpx);
                    }
                    seen_root = true;
                }

                if name == b"extensions" && stack.last().is_some_and(|p| p == b"trkpt") {
                    let mut node = read_node(&mut reader, &e)?;
                    let had_payload = node.has_children();
                    node.children = transform(std::mem::take(&mut node.children));
                    rewritten += 1;
                    if !had_payload || node.has_children() {
                        write_node(&mut writer, &node)?;
                    }
                } else {
                    stack.push(name);
                    writer.write_event(Event::Start(e)).map_err(GpxError::Write)?;
                }
            }

            Event::Empty(e) => {
                if stack.is_empty() {
                    if seen_root || local_name(&e) != b"gpx" {
                        return Err(GpxError::NotGpx);
                    }
                    seen_root = true;
                }
                writer.write_event(Event::Empty(e)).map_err(GpxError::Write)?;
            }

            Event::End(e) => {
                stack.pop();
                writer.write_event(Event::End(e)).map_err(GpxError::Write)?;
            }

            event => {
                writer.write_event(event).map_err(GpxError::Write)?;
            }
        }

        buf.clear();
    }

    if let Some(open) = stack.last() {
        return Err(GpxError::UnexpectedEof(String::from_utf8_lossy(open).into_owned()));
    }
    if !seen_root {
        return Err(GpxError::NotGpx);
    }

    debug!(rewritten, "rewrote trackpoint extensions");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    const SAMPLE_GPX: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<gpx version="1.1" creator="test" xmlns:ns3="http://www.garmin.com/xmlschemas/TrackPointExtension/v1">
  <wpt lat="37.0" lon="-122.0"><name>Trailhead</name></wpt>
  <trk>
    <name>Test Track</name>
    <type>cycling</type>
    <trkseg>
      <trkpt lat="37.7749" lon="-122.4194">
        <ele>100</ele>
        <time>2023-01-01T10:00:00Z</time>
        <extensions>
          <ns3:TrackPointExtension>
            <ns3:hr>150</ns3:hr>
            <ns3:cad>80</ns3:cad>
          </ns3:TrackPointExtension>
        </extensions>
      </trkpt>
      <trkpt lat="37.7750" lon="-122.4195">
        <ele>not-a-number</ele>
        <time>2023-01-01T10:00:02Z</time>
      </trkpt>
      <trkpt lat="37.7751" lon="-122.4196"/>
    </trkseg>
  </trk>
  <extensions><sport>Running</sport></extensions>
</gpx>"#;

    const GARMIN_GPX: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<gpx version="1.1" creator="test">
  <trk>
    <name>Test Track</name>
    <trkseg>
      <trkpt lat="37.7749" lon="-122.4194">
        <ele>100</ele>
        <time>2023-01-01T10:00:00Z</time>
        <extensions>
          <ns3:TrackPointExtension xmlns:ns3="http://www.garmin.com/xmlschemas/TrackPointExtension/v1">
            <ns3:hr>150</ns3:hr>
          </ns3:TrackPointExtension>
        </extensions>
      </trkpt>
      <trkpt lat="37.7750" lon="-122.4195">
        <ele>101</ele>
        <time>2023-01-01T10:00:02Z</time>
        <extensions>
          <ns3:TrackPointExtension xmlns:ns3="http://www.garmin.com/xmlschemas/TrackPointExtension/v1">
            <ns3:hr>155</ns3:hr>
          </ns3:TrackPointExtension>
        </extensions>
      </trkpt>
      <trkpt lat="37.7751" lon="-122.4196">
        <ele>102</ele>
        <time>2023-01-01T10:00:10Z</time>
      </trkpt>
    </trkseg>
  </trk>
</gpx>"#;

    #[test]
    fn test_parse_activity_structure() {
        let activity = parse_activity(SAMPLE_GPX.as_bytes()).unwrap();
        assert_eq!(activity.track_count(), 1);
        assert_eq!(activity.waypoint_count(), 1);
        assert_eq!(activity.waypoints[0].name.as_deref(), Some("Trailhead"));

        let track = &activity.tracks[0];
        assert_eq!(track.name.as_deref(), Some("Test Track"));
        assert_eq!(track.kind.as_deref(), Some("cycling"));
        assert_eq!(track.segments.len(), 1);

        let points = &track.segments[0].points;
        assert_eq!(points.len(), 3);
        assert_eq!(points[0].lat, 37.7749);
        assert_eq!(points[0].elevation, Some(100.0));
        assert_eq!(points[0].time, Some(datetime!(2023-01-01 10:00:00 UTC)));
        assert_eq!(points[1].elevation, None);
        assert!(points[2].time.is_none());

        assert_eq!(activity.extensions.len(), 1);
        assert_eq!(activity.extensions[0].trimmed_text(), Some("Running"));
    }

    #[test]
    fn test_parse_captures_extension_tree() {
        let activity = parse_activity(SAMPLE_GPX.as_bytes()).unwrap();
        let extensions = &activity.tracks[0].segments[0].points[0].extensions;
        assert_eq!(extensions.len(), 1);

        let container = &extensions[0];
        assert_eq!(container.tag, "ns3:TrackPointExtension");
        let children: Vec<_> = container.children.iter().map(|c| c.local_name()).collect();
        assert_eq!(children, vec!["hr", "cad"]);
        assert_eq!(container.children[0].trimmed_text(), Some("150"));
    }

    #[test]
    fn test_parse_rejects_non_gpx_root() {
        let result = parse_activity(b"<kml><Document/></kml>");
        assert!(matches!(result, Err(GpxError::NotGpx)));
    }

    #[test]
    fn test_parse_rejects_empty_input() {
        assert!(matches!(parse_activity(b""), Err(GpxError::NotGpx)));
    }

    #[test]
    fn test_parse_rejects_truncated_document() {
        let result = parse_activity(b"<gpx><trk><trkseg>");
        assert!(matches!(result, Err(GpxError::UnexpectedEof(_))));
    }

    #[test]
    fn test_parse_rejects_mismatched_tags() {
        let result = parse_activity(b"<gpx><trk></trkseg></gpx>");
        assert!(matches!(result, Err(GpxError::Xml { .. })));
    }

    #[test]
    fn test_parse_rejects_missing_latitude() {
        let result = parse_activity(br#"<gpx><trk><trkseg><trkpt lon="1.0"/></trkseg></trk></gpx>"#);
        match result {
            Err(GpxError::InvalidCoordinate { attribute, .. }) => assert_eq!(attribute, "lat"),
            other => panic!("Expected InvalidCoordinate, got {other:?}"),
        }
    }

    #[test]
    fn test_rewrite_identity_preserves_document() {
        let mut output = Vec::new();
        rewrite_point_extensions(SAMPLE_GPX.as_bytes(), &mut output, |nodes| nodes).unwrap();

        let original = parse_activity(SAMPLE_GPX.as_bytes()).unwrap();
        let rewritten = parse_activity(&output).unwrap();
        assert_eq!(original, rewritten);

        let text = String::from_utf8(output).unwrap();
        assert!(text.contains("<ns3:hr>150</ns3:hr>"));
        assert!(text.contains("<sport>Running</sport>"));
    }

    #[test]
    fn test_rewrite_drops_emptied_extensions_element() {
        let mut output = Vec::new();
        rewrite_point_extensions(SAMPLE_GPX.as_bytes(), &mut output, |_| Vec::new()).unwrap();

        let text = String::from_utf8(output).unwrap();
        assert!(!text.contains("<ns3:TrackPointExtension"));
        assert!(!text.contains("<ns3:hr>"));
        assert_eq!(text.matches("<extensions>").count(), 1);
        // Document-level extensions are untouched.
        assert!(text.contains("<extensions><sport>Running</sport></extensions>"));
    }

    #[test]
    fn test_rewrite_output_validates_with_gpx_crate() {
        use gpx::{Gpx, read};

        let mut output = Vec::new();
        rewrite_point_extensions(GARMIN_GPX.as_bytes(), &mut output, |nodes| nodes).unwrap();

        let gpx_result: Result<Gpx, _> = read(output.as_slice());
        assert!(gpx_result.is_ok());
        let gpx = gpx_result.unwrap();
        assert_eq!(gpx.tracks.len(), 1);
        assert_eq!(gpx.tracks[0].segments[0].points.len(), 3);
    }

    #[test]
    fn test_rewrite_rejects_malformed_input() {
        let mut output = Vec::new();
        let result = rewrite_point_extensions(b"<gpx><trk>", &mut output, |nodes| nodes);
        assert!(result.is_err());
    }

    #[test]
    fn test_read_input_reports_missing_file() {
        let result = read_input(Path::new("definitely/not/here.gpx"));
        assert!(matches!(result, Err(GpxError::NotFound(_))));
    }
}
