use std::fmt;
use time::OffsetDateTime;

use crate::geo::{distance_2d, seconds_between};

/// One element of an extension payload: qualified tag, attributes in document
/// order, leading text, ordered children and the text trailing the element
/// inside its parent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtensionNode {
    pub tag: String,
    pub attributes: Vec<(String, String)>,
    pub text: Option<String>,
    pub children: Vec<ExtensionNode>,
    pub tail: Option<String>,
}

impl ExtensionNode {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            ..Self::default()
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push((key.into(), value.into()));
        self
    }

    pub fn with_child(mut self, child: ExtensionNode) -> Self {
        self.children.push(child);
        self
    }

    /// Tag name without namespace prefix (`ns3:hr`) or Clark notation (`{uri}hr`).
    pub fn local_name(&self) -> &str {
        let tag = self.tag.rsplit('}').next().unwrap_or(&self.tag);
        tag.rsplit(':').next().unwrap_or(tag)
    }

    /// Own text with surrounding whitespace removed, if any remains.
    pub fn trimmed_text(&self) -> Option<&str> {
        self.text.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }

    pub fn has_children(&self) -> bool {
        !self.children.is_empty()
    }

    /// Start tag with attributes followed by the node's own text. Children
    /// are left out.
    pub fn own_markup(&self) -> String {
        let mut markup = format!("<{}", self.tag);
        for (key, value) in &self.attributes {
            markup.push_str(&format!(" {key}=\"{value}\""));
        }
        markup.push('>');
        markup.push_str(self.text.as_deref().unwrap_or_default());
        markup
    }
}

impl fmt::Display for ExtensionNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}", self.tag)?;
        for (key, value) in &self.attributes {
            write!(f, " {key}=\"{value}\"")?;
        }
        if self.text.is_none() && self.children.is_empty() {
            return write!(f, "/>");
        }
        write!(f, ">{}", self.text.as_deref().unwrap_or_default())?;
        for child in &self.children {
            write!(f, "{child}{}", child.tail.as_deref().unwrap_or_default())?;
        }
        write!(f, "</{}>", self.tag)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrackPoint {
    pub lat: f64,
    pub lon: f64,
    pub elevation: Option<f64>,
    pub time: Option<OffsetDateTime>,
    /// Children of the point's `<extensions>` element.
    pub extensions: Vec<ExtensionNode>,
}

impl TrackPoint {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self {
            lat,
            lon,
            elevation: None,
            time: None,
            extensions: Vec::new(),
        }
    }

    pub fn with_time(mut self, time: OffsetDateTime) -> Self {
        self.time = Some(time);
        self
    }

    pub fn with_elevation(mut self, elevation: f64) -> Self {
        self.elevation = Some(elevation);
        self
    }

    pub fn with_extension(mut self, extension: ExtensionNode) -> Self {
        self.extensions.push(extension);
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Segment {
    pub points: Vec<TrackPoint>,
}

impl Segment {
    pub fn new(points: Vec<TrackPoint>) -> Self {
        Self { points }
    }

    /// Points carrying a timestamp, in recorded order.
    pub fn timed_points(&self) -> Vec<&TrackPoint> {
        self.points.iter().filter(|p| p.time.is_some()).collect()
    }

    /// Sum of planar distances between consecutive points, in meters.
    pub fn length_2d(&self) -> f64 {
        self.points
            .windows(2)
            .map(|pair| distance_2d(&pair[0], &pair[1]))
            .sum()
    }

    /// Timestamps of the first and last timed points.
    pub fn time_bounds(&self) -> Option<(OffsetDateTime, OffsetDateTime)> {
        let start = self.points.iter().find_map(|p| p.time)?;
        let end = self.points.iter().rev().find_map(|p| p.time)?;
        Some((start, end))
    }

    /// `(min, max)` elevation over points that report one.
    pub fn elevation_extremes(&self) -> Option<(f64, f64)> {
        self.points
            .iter()
            .filter_map(|p| p.elevation)
            .fold(None, |acc, e| match acc {
                None => Some((e, e)),
                Some((lo, hi)) => Some((lo.min(e), hi.max(e))),
            })
    }

    /// Cumulative `(uphill, downhill)` in meters.
    ///
    /// Interior elevations are smoothed with a 0.3/0.4/0.3 kernel over their
    /// neighbours before summing deltas.
    pub fn uphill_downhill(&self) -> Option<(f64, f64)> {
        let elevations: Vec<f64> = self.points.iter().filter_map(|p| p.elevation).collect();
        if elevations.is_empty() {
            return None;
        }

        let last = elevations.len() - 1;
        let smoothed: Vec<f64> = (0..elevations.len())
            .map(|n| {
                if n > 0 && n < last {
                    elevations[n - 1] * 0.3 + elevations[n] * 0.4 + elevations[n + 1] * 0.3
                } else {
                    elevations[n]
                }
            })
            .collect();

        let (mut uphill, mut downhill) = (0.0, 0.0);
        for pair in smoothed.windows(2) {
            let delta = pair[1] - pair[0];
            if delta > 0.0 {
                uphill += delta;
            } else {
                downhill -= delta;
            }
        }
        Some((uphill, downhill))
    }

    /// Seconds spent moving faster than `stopped_speed_kmh`, or `None` when no
    /// consecutive pair of points is timestamped.
    pub fn moving_time(&self, stopped_speed_kmh: f64) -> Option<f64> {
        let mut moving = None;
        for pair in self.points.windows(2) {
            let Some(seconds) = seconds_between(&pair[0], &pair[1]) else {
                continue;
            };
            let total = moving.get_or_insert(0.0);
            if seconds <= 0.0 {
                continue;
            }
            let speed_kmh = (distance_2d(&pair[0], &pair[1]) / 1000.0) / (seconds / 3600.0);
            if speed_kmh > stopped_speed_kmh {
                *total += seconds;
            }
        }
        moving
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Track {
    pub name: Option<String>,
    /// Free-text activity label from `<type>`, e.g. "cycling".
    pub kind: Option<String>,
    pub segments: Vec<Segment>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Waypoint {
    pub lat: f64,
    pub lon: f64,
    pub name: Option<String>,
}

/// A fully parsed GPX document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Activity {
    pub tracks: Vec<Track>,
    pub waypoints: Vec<Waypoint>,
    /// Children of the document-level `<extensions>` element.
    pub extensions: Vec<ExtensionNode>,
}

impl Activity {
    pub fn track_count(&self) -> usize {
        self.tracks.len()
    }

    pub fn waypoint_count(&self) -> usize {
        self.waypoints.len()
    }

    pub fn segments(&self) -> impl Iterator<Item = &Segment> {
        self.tracks.iter().flat_map(|t| t.segments.iter())
    }

    pub fn points(&self) -> impl Iterator<Item = &TrackPoint> {
        self.segments().flat_map(|s| s.points.iter())
    }
}
