//! GPX to Garmin Training Center (TCX v2) conversion.
//!
//! Every track becomes an `<Activity>` and every non-empty segment a `<Lap>`.

use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use std::io::Write;
use std::path::Path;
use time::macros::format_description;
use time::{OffsetDateTime, UtcOffset};
use tracing::info;

use crate::config::Thresholds;
use crate::error::GpxError;
use crate::gpxxml::load_activity;
use crate::heart_rate::point_heart_rate;
use crate::model::{Activity, Segment, Track};
use crate::stats::max_speed;

const TCX_NS: &str = "http://www.garmin.com/xmlschemas/TrainingCenterDatabase/v2";
const ACTIVITY_EXT_NS: &str = "http://www.garmin.com/xmlschemas/ActivityExtension/v2";
const XSI_NS: &str = "http://www.w3.org/2001/XMLSchema-instance";
const CREATOR_NAME: &str = "GPX Tools";

/// TCX `Sport` attribute for a free-text GPX activity label.
pub fn sport_for(kind: Option<&str>) -> &'static str {
    let Some(kind) = kind.map(str::to_lowercase) else {
        return "Biking";
    };
    if kind.contains("run") {
        "Running"
    } else if kind.contains("bike") || kind.contains("cycl") {
        "Biking"
    } else if ["walk", "hik", "swim"].iter().any(|k| kind.contains(k)) {
        "Other"
    } else {
        "Biking"
    }
}

/// UTC with microsecond precision, e.g. `2023-01-01T10:00:00.000000Z`.
pub fn format_tcx_time(time: OffsetDateTime) -> String {
    let format = format_description!(
        "[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:6]Z"
    );
    let utc = time.to_offset(UtcOffset::UTC);
    utc.format(format)
        .unwrap_or_else(|_| utc.unix_timestamp().to_string())
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LapSummary {
    pub start_time: Option<OffsetDateTime>,
    pub total_time: f64,
    pub distance: f64,
    pub max_speed: Option<f64>,
    pub calories: u64,
    pub avg_heart_rate: Option<f64>,
    pub max_heart_rate: Option<f64>,
}

pub fn lap_summary(segment: &Segment, t: &Thresholds) -> LapSummary {
    let total_time = segment
        .time_bounds()
        .map(|(start, end)| (end - start).as_seconds_f64())
        .unwrap_or(0.0);
    let rates: Vec<f64> = segment
        .points
        .iter()
        .filter_map(|p| point_heart_rate(p, t))
        .collect();

    LapSummary {
        start_time: segment.points.first().and_then(|p| p.time),
        total_time,
        distance: segment.length_2d(),
        max_speed: max_speed(segment, t),
        calories: if total_time > 0.0 { (total_time * 0.1) as u64 } else { 0 },
        avg_heart_rate: (!rates.is_empty()).then(|| rates.iter().sum::<f64>() / rates.len() as f64),
        max_heart_rate: rates.iter().copied().reduce(f64::max),
    }
}

struct TcxWriter<W: Write> {
    writer: Writer<W>,
}

impl<W: Write> TcxWriter<W> {
    fn event(&mut self, event: Event<'_>) -> Result<(), GpxError> {
        self.writer.write_event(event).map_err(GpxError::Write)
    }

    fn open(&mut self, name: &str, attributes: &[(&str, &str)]) -> Result<(), GpxError> {
        let mut start = BytesStart::new(name);
        for &attribute in attributes {
            start.push_attribute(attribute);
        }
        self.event(Event::Start(start))
    }

    fn close(&mut self, name: &str) -> Result<(), GpxError> {
        self.event(Event::End(BytesEnd::new(name)))
    }

    fn text(&mut self, name: &str, text: &str) -> Result<(), GpxError> {
        self.open(name, &[])?;
        self.event(Event::Text(BytesText::new(text)))?;
        self.close(name)
    }

    /// `<name><Value>bpm</Value></name>`, truncated to whole beats.
    fn bpm(&mut self, name: &str, bpm: f64) -> Result<(), GpxError> {
        self.open(name, &[])?;
        self.text("Value", &(bpm as u32).to_string())?;
        self.close(name)
    }

    fn lap(&mut self, segment: &Segment, t: &Thresholds) -> Result<(), GpxError> {
        let summary = lap_summary(segment, t);
        let start = summary.start_time.map(format_tcx_time);
        match &start {
            Some(start) => self.open("Lap", &[("StartTime", start.as_str())])?,
            None => self.open("Lap", &[])?,
        }

        if summary.total_time > 0.0 {
            self.text("TotalTimeSeconds", &summary.total_time.to_string())?;
        }
        if summary.distance > 0.0 {
            self.text("DistanceMeters", &summary.distance.to_string())?;
        }
        if let Some(speed) = summary.max_speed.filter(|s| *s > 0.0) {
            self.text("MaximumSpeed", &speed.to_string())?;
        }
        self.text("Calories", &summary.calories.to_string())?;
        if let Some(bpm) = summary.avg_heart_rate {
            self.bpm("AverageHeartRateBpm", bpm)?;
        }
        if let Some(bpm) = summary.max_heart_rate {
            self.bpm("MaximumHeartRateBpm", bpm)?;
        }
        self.text("Intensity", "Active")?;
        self.text("TriggerMethod", "Manual")?;

        self.open("Track", &[])?;
        for point in &segment.points {
            self.open("Trackpoint", &[])?;
            if let Some(time) = point.time {
                self.text("Time", &format_tcx_time(time))?;
            }
            self.open("Position", &[])?;
            self.text("LatitudeDegrees", &point.lat.to_string())?;
            self.text("LongitudeDegrees", &point.lon.to_string())?;
            self.close("Position")?;
            if let Some(elevation) = point.elevation {
                self.text("AltitudeMeters", &elevation.to_string())?;
            }
            if let Some(bpm) = point_heart_rate(point, t) {
                self.bpm("HeartRateBpm", bpm)?;
            }
            self.close("Trackpoint")?;
        }
        self.close("Track")?;
        self.close("Lap")
    }

    fn activity(&mut self, track: &Track, t: &Thresholds) -> Result<(), GpxError> {
        self.open("Activity", &[("Sport", sport_for(track.kind.as_deref()))])?;

        let id = track
            .segments
            .iter()
            .find_map(|s| s.points.first().and_then(|p| p.time));
        if let Some(id) = id {
            self.text("Id", &format_tcx_time(id))?;
        }

        for segment in track.segments.iter().filter(|s| !s.points.is_empty()) {
            self.lap(segment, t)?;
        }

        self.open("Creator", &[("xsi:type", "Device_t")])?;
        self.text("Name", CREATOR_NAME)?;
        self.close("Creator")?;
        self.close("Activity")
    }
}

/// Writes `activity` as an indented TCX document.
pub fn write_tcx<W: Write>(activity: &Activity, output: W, t: &Thresholds) -> Result<(), GpxError> {
    let mut tcx = TcxWriter {
        writer: Writer::new_with_indent(output, b' ', 2),
    };
    tcx.event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))?;
    tcx.open(
        "TrainingCenterDatabase",
        &[("xmlns", TCX_NS), ("xmlns:ns3", ACTIVITY_EXT_NS), ("xmlns:xsi", XSI_NS)],
    )?;
    tcx.open("Activities", &[])?;
    for track in &activity.tracks {
        tcx.activity(track, t)?;
    }
    tcx.close("Activities")?;
    tcx.close("TrainingCenterDatabase")
}

pub fn convert_file(input: &Path, output: &Path, t: &Thresholds) -> Result<(), GpxError> {
    let activity = load_activity(input)?;
    let mut tcx = Vec::new();
    write_tcx(&activity, &mut tcx, t)?;
    std::fs::write(output, &tcx).map_err(|e| GpxError::io(output, e))?;
    info!(
        input = %input.display(),
        output = %output.display(),
        activities = activity.track_count(),
        "converted GPX to TCX"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpxxml::parse_activity;
    use time::macros::datetime;

    const RIDE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<gpx version="1.1" creator="test" xmlns:ns3="http://www.garmin.com/xmlschemas/TrackPointExtension/v1">
  <trk>
    <type>running</type>
    <trkseg>
      <trkpt lat="37.7749" lon="-122.4194">
        <ele>10.5</ele>
        <time>2023-01-01T10:00:00Z</time>
        <extensions><ns3:TrackPointExtension><ns3:hr>150</ns3:hr></ns3:TrackPointExtension></extensions>
      </trkpt>
      <trkpt lat="37.7753" lon="-122.4194">
        <ele>11.0</ele>
        <time>2023-01-01T10:00:10Z</time>
        <extensions><ns3:TrackPointExtension><ns3:hr>161</ns3:hr></ns3:TrackPointExtension></extensions>
      </trkpt>
    </trkseg>
    <trkseg></trkseg>
  </trk>
  <trk>
    <trkseg>
      <trkpt lat="1.0" lon="2.0"></trkpt>
    </trkseg>
  </trk>
</gpx>"#;

    fn convert(gpx: &str) -> String {
        let activity = parse_activity(gpx.as_bytes()).unwrap();
        let mut out = Vec::new();
        write_tcx(&activity, &mut out, &Thresholds::default()).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_sport_mapping() {
        assert_eq!(sport_for(Some("Trail Running")), "Running");
        assert_eq!(sport_for(Some("road_biking")), "Biking");
        assert_eq!(sport_for(Some("cycling")), "Biking");
        assert_eq!(sport_for(Some("hiking")), "Other");
        assert_eq!(sport_for(Some("walk")), "Other");
        assert_eq!(sport_for(Some("open water swim")), "Other");
        assert_eq!(sport_for(Some("kayak")), "Biking");
        assert_eq!(sport_for(None), "Biking");
    }

    #[test]
    fn test_format_tcx_time_is_utc_with_microseconds() {
        assert_eq!(
            format_tcx_time(datetime!(2023-01-01 10:00:00.25 UTC)),
            "2023-01-01T10:00:00.250000Z"
        );
        assert_eq!(
            format_tcx_time(datetime!(2023-01-01 02:00:00 -08:00)),
            "2023-01-01T10:00:00.000000Z"
        );
    }

    #[test]
    fn test_lap_summary() {
        let activity = parse_activity(RIDE.as_bytes()).unwrap();
        let summary = lap_summary(&activity.tracks[0].segments[0], &Thresholds::default());
        assert_eq!(summary.total_time, 10.0);
        assert_eq!(summary.calories, 1);
        assert!((summary.distance - 44.5).abs() < 0.5);
        assert!((summary.max_speed.unwrap() - summary.distance / 10.0).abs() < 1e-9);
        assert_eq!(summary.avg_heart_rate, Some(155.5));
        assert_eq!(summary.max_heart_rate, Some(161.0));
    }

    #[test]
    fn test_write_tcx_document() {
        let tcx = convert(RIDE);
        assert!(tcx.starts_with(r#"<?xml version="1.0" encoding="utf-8"?>"#));
        assert!(tcx.contains(r#"<TrainingCenterDatabase xmlns="http://www.garmin.com/xmlschemas/TrainingCenterDatabase/v2""#));
        assert!(tcx.contains(r#"<Activity Sport="Running">"#));
        assert!(tcx.contains(r#"<Activity Sport="Biking">"#));
        assert!(tcx.contains("<Id>2023-01-01T10:00:00.000000Z</Id>"));
        assert!(tcx.contains(r#"<Lap StartTime="2023-01-01T10:00:00.000000Z">"#));
        assert!(tcx.contains("<TotalTimeSeconds>10</TotalTimeSeconds>"));
        assert!(tcx.contains("<Calories>1</Calories>"));
        assert!(tcx.contains("<Intensity>Active</Intensity>"));
        assert!(tcx.contains("<TriggerMethod>Manual</TriggerMethod>"));
        assert!(tcx.contains("<LatitudeDegrees>37.7753</LatitudeDegrees>"));
        assert!(tcx.contains("<AltitudeMeters>10.5</AltitudeMeters>"));
        assert!(tcx.contains(r#"<Creator xsi:type="Device_t">"#));
        assert!(tcx.contains("<Name>GPX Tools</Name>"));

        // Empty segments produce no lap; the untimed track gets a lap without StartTime.
        assert_eq!(tcx.matches("<Lap").count(), 2);
        assert_eq!(tcx.matches("<Calories>0</Calories>").count(), 1);
        assert_eq!(tcx.matches("<Value>").count(), 4);
        assert!(tcx.contains("<Value>155</Value>"));
        assert!(tcx.contains("<Value>161</Value>"));
    }

    #[test]
    fn test_convert_file_reports_missing_input() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("out.tcx");
        let result = convert_file(Path::new("nope.gpx"), &output, &Thresholds::default());
        assert!(matches!(result, Err(GpxError::NotFound(_))));
        assert!(!output.exists());
    }
}
