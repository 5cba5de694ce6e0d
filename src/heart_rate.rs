//! Heart-rate extraction from trackpoint extension payloads, and the
//! strip/replace rewrites of those payloads.
//!
//! Device exports disagree on where heart rate lives. Garmin nests it in a
//! `TrackPointExtension` container, some tools emit a bare `<hr>` element,
//! and a few produce shapes only recognisable from their serialized text.
//! Each shape is an [`HrShape`] and extraction tries them in priority order.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use regex::Regex;
use std::io::Write;
use std::path::Path;
use std::sync::LazyLock;
use tracing::{debug, info};

use crate::config::Thresholds;
use crate::error::GpxError;
use crate::gpxxml::{read_input, rewrite_point_extensions};
use crate::model::{Activity, ExtensionNode, TrackPoint};

/// Numbers embedded in a serialized payload, e.g. `142` or `142.5`.
static NUMBER: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"\d+\.?\d*").ok());

/// Payload shapes that may carry a heart-rate value, highest priority first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HrShape {
    /// An element whose children include an hr/heartrate/bpm field.
    Container,
    /// The payload element is itself the heart-rate field, holding the value
    /// as its own text or in a child.
    DirectField,
    /// Last resort: an indicator in the payload's own tag, attributes or
    /// text, followed by the first plausible number there.
    Unstructured,
}

impl HrShape {
    pub const CHAIN: [HrShape; 3] = [HrShape::Container, HrShape::DirectField, HrShape::Unstructured];

    pub fn extract(self, node: &ExtensionNode, t: &Thresholds) -> Option<f64> {
        match self {
            HrShape::Container => node
                .children
                .iter()
                .filter(|child| is_hr_tag(child, t))
                .find_map(|child| field_value(child, t)),
            HrShape::DirectField if is_hr_tag(node, t) => field_value(node, t)
                .or_else(|| node.children.iter().find_map(|child| field_value(child, t))),
            HrShape::DirectField => None,
            HrShape::Unstructured => {
                let rendered = node.own_markup().to_lowercase();
                if !t.mentions_heart_rate(&rendered) {
                    return None;
                }
                NUMBER
                    .as_ref()?
                    .find_iter(&rendered)
                    .filter_map(|m| m.as_str().parse::<f64>().ok())
                    .find(|bpm| t.is_valid_heart_rate(*bpm))
            }
        }
    }
}

pub fn is_hr_tag(node: &ExtensionNode, t: &Thresholds) -> bool {
    t.mentions_heart_rate(&node.local_name().to_lowercase())
}

fn field_value(node: &ExtensionNode, t: &Thresholds) -> Option<f64> {
    node.trimmed_text()
        .and_then(|text| text.parse::<f64>().ok())
        .filter(|bpm| t.is_valid_heart_rate(*bpm))
}

/// First plausible heart rate in one extension payload.
pub fn extract_heart_rate(node: &ExtensionNode, t: &Thresholds) -> Option<f64> {
    HrShape::CHAIN.iter().find_map(|shape| shape.extract(node, t))
}

/// A point contributes at most one sample: the first payload that yields one.
pub fn point_heart_rate(point: &TrackPoint, t: &Thresholds) -> Option<f64> {
    point.extensions.iter().find_map(|ext| extract_heart_rate(ext, t))
}

/// Every per-point heart rate across all tracks and segments, in order.
pub fn heart_rates(activity: &Activity, t: &Thresholds) -> Vec<f64> {
    activity.points().filter_map(|p| point_heart_rate(p, t)).collect()
}

/// Removes heart-rate fields from a point's payloads, matching on tags only.
///
/// A payload whose own tag is a heart-rate field is dropped with whatever it
/// contains. Other containers lose their matching children and are dropped
/// once nothing but whitespace remains.
pub fn strip_extensions(extensions: Vec<ExtensionNode>, t: &Thresholds) -> Vec<ExtensionNode> {
    extensions
        .into_iter()
        .filter_map(|mut ext| {
            if is_hr_tag(&ext, t) {
                return None;
            }
            if !ext.has_children() {
                return Some(ext);
            }
            ext.children.retain(|child| !is_hr_tag(child, t));
            (ext.has_children() || ext.trimmed_text().is_some()).then_some(ext)
        })
        .collect()
}

/// Seeded source of replacement heart-rate values. One generator per
/// rewrite; the same seed reproduces the same output.
#[derive(Debug, Clone)]
pub struct HrGenerator {
    rng: ChaCha8Rng,
    avg_hr: i64,
    variation: i64,
    min: i64,
    max: i64,
}

impl HrGenerator {
    pub fn new(avg_hr: u32, variation: u32, t: &Thresholds) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(t.random_seed),
            avg_hr: i64::from(avg_hr),
            variation: i64::from(variation),
            min: i64::from(t.min_heart_rate),
            max: i64::from(t.max_heart_rate),
        }
    }

    pub fn next_bpm(&mut self) -> i64 {
        let jitter = self.rng.gen_range(-self.variation..=self.variation);
        (self.avg_hr + jitter).max(self.min).min(self.max)
    }
}

fn replaced(field: ExtensionNode, generator: &mut HrGenerator) -> ExtensionNode {
    ExtensionNode {
        text: Some(generator.next_bpm().to_string()),
        children: Vec::new(),
        ..field
    }
}

/// Rewrites the text of every heart-rate field with a generated value. Tags,
/// attributes and surrounding whitespace are kept; nothing is added to
/// payloads that had no heart-rate field. A heart-rate tagged payload with
/// children becomes a plain field.
pub fn replace_extensions(
    extensions: Vec<ExtensionNode>,
    generator: &mut HrGenerator,
    t: &Thresholds,
) -> Vec<ExtensionNode> {
    extensions
        .into_iter()
        .map(|mut ext| {
            if is_hr_tag(&ext, t) {
                return replaced(ext, generator);
            }
            ext.children = std::mem::take(&mut ext.children)
                .into_iter()
                .map(|child| {
                    if is_hr_tag(&child, t) {
                        replaced(child, generator)
                    } else {
                        child
                    }
                })
                .collect();
            ext
        })
        .collect()
}

pub fn strip_heart_rate<W: Write>(input: &[u8], output: W, t: &Thresholds) -> Result<(), GpxError> {
    rewrite_point_extensions(input, output, |extensions| strip_extensions(extensions, t))
}

pub fn replace_heart_rate<W: Write>(
    input: &[u8],
    output: W,
    generator: &mut HrGenerator,
    t: &Thresholds,
) -> Result<(), GpxError> {
    rewrite_point_extensions(input, output, |extensions| {
        replace_extensions(extensions, generator, t)
    })
}

/// Called only once the whole rewritten document exists in memory.
fn write_output(path: &Path, bytes: &[u8]) -> Result<(), GpxError> {
    std::fs::write(path, bytes).map_err(|e| GpxError::io(path, e))
}

pub fn strip_heart_rate_file(input: &Path, output: &Path, t: &Thresholds) -> Result<(), GpxError> {
    let source = read_input(input)?;
    let mut rewritten = Vec::with_capacity(source.len());
    strip_heart_rate(&source, &mut rewritten, t)?;
    write_output(output, &rewritten)?;
    info!(input = %input.display(), output = %output.display(), "stripped heart rate data");
    Ok(())
}

pub fn replace_heart_rate_file(
    input: &Path,
    output: &Path,
    avg_hr: u32,
    variation: u32,
    t: &Thresholds,
) -> Result<(), GpxError> {
    let source = read_input(input)?;
    let mut generator = HrGenerator::new(avg_hr, variation, t);
    let mut rewritten = Vec::with_capacity(source.len());
    replace_heart_rate(&source, &mut rewritten, &mut generator, t)?;
    write_output(output, &rewritten)?;
    debug!(avg_hr, variation, seed = t.random_seed, "replacement parameters");
    info!(input = %input.display(), output = %output.display(), "replaced heart rate data");
    Ok(())
}
