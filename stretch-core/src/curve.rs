//! Stretch curve construction.
//!
//! Accumulates per-note partial measurements, maps them to cents deviation
//! of the measured fundamental from nominal pitch, rejects statistical
//! outliers with a Tukey fence, and fits a smoothing spline over the
//! surviving scatter.

use std::fmt;

use log::warn;
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::StretchError;
use crate::notes;
use crate::partials::PartialSet;
use crate::spline::SmoothingSpline;

/// Fewest distinct frequencies a cubic smoothing spline can be fit over.
pub const MIN_CURVE_POINTS: usize = 4;

/// Samples in the dense evaluation grid of a fitted curve.
pub const CURVE_SAMPLES: usize = 500;

/// Note name to measured partials, in capture order.
///
/// Entries are only ever added by a successful capture or a bulk load, so
/// there are no partial or placeholder entries. Serializes as a JSON object
/// of note name to array-of-6, the persisted curve format.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PartialsMapping {
    entries: Vec<(String, PartialSet)>,
}

impl PartialsMapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a measurement, replacing in place when the note was already
    /// captured (a re-recorded note keeps its original slot).
    pub fn insert(&mut self, note: impl Into<String>, partials: PartialSet) {
        let note = note.into();
        if let Some(entry) = self.entries.iter_mut().find(|entry| entry.0 == note) {
            entry.1 = partials;
        } else {
            self.entries.push((note, partials));
        }
    }

    pub fn get(&self, note: &str) -> Option<&PartialSet> {
        self.entries
            .iter()
            .find(|(name, _)| name == note)
            .map(|(_, partials)| partials)
    }

    pub fn contains(&self, note: &str) -> bool {
        self.get(note).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in capture order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &PartialSet)> {
        self.entries
            .iter()
            .map(|(name, partials)| (name.as_str(), partials))
    }
}

impl Serialize for PartialsMapping {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (note, partials) in &self.entries {
            map.serialize_entry(note, partials)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for PartialsMapping {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct MappingVisitor;

        impl<'de> Visitor<'de> for MappingVisitor {
            type Value = PartialsMapping;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of note names to arrays of 6 partial frequencies")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut mapping = PartialsMapping::new();
                while let Some((note, partials)) = access.next_entry::<String, PartialSet>()? {
                    mapping.insert(note, partials);
                }
                Ok(mapping)
            }
        }

        deserializer.deserialize_map(MappingVisitor)
    }
}

/// One point of the deviation scatter: nominal frequency against the cents
/// deviation of the measured fundamental. Recomputed on demand, never
/// persisted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeviationPoint {
    pub frequency_hz: f32,
    pub cents: f32,
}

/// A fitted stretch curve: the outlier-filtered scatter it was fit from and
/// the smoothed curve sampled on a dense grid for display.
#[derive(Debug, Clone)]
pub struct StretchCurveFit {
    pub points: Vec<DeviationPoint>,
    pub curve: Vec<DeviationPoint>,
}

/// Owns the partials mapping during the analysis phase and turns it into a
/// fitted curve. Created at analysis start, populated by the worker, handed
/// off whole.
#[derive(Debug, Clone, Default)]
pub struct StretchCurveBuilder {
    mapping: PartialsMapping,
}

impl StretchCurveBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_measurement(&mut self, note: impl Into<String>, partials: PartialSet) {
        self.mapping.insert(note, partials);
    }

    pub fn mapping(&self) -> &PartialsMapping {
        &self.mapping
    }

    pub fn into_mapping(self) -> PartialsMapping {
        self.mapping
    }

    /// Deviation scatter -> outlier removal -> spline fit.
    pub fn fit(&self, smoothing: f32) -> Result<StretchCurveFit, StretchError> {
        let points = deviation_points(&self.mapping);
        let filtered = remove_outliers(&points);
        fit_curve(&filtered, smoothing)
    }
}

/// Maps every entry to a deviation point keyed by the note's nominal
/// frequency. Names outside the reference table are skipped with a warning.
pub fn deviation_points(mapping: &PartialsMapping) -> Vec<DeviationPoint> {
    mapping
        .iter()
        .filter_map(|(note, partials)| {
            let Some(nominal) = notes::nominal_frequency(note) else {
                warn!("ignoring measurement for unknown note {note:?}");
                return None;
            };
            Some(DeviationPoint {
                frequency_hz: nominal,
                cents: notes::cents_deviation(partials.fundamental(), nominal),
            })
        })
        .collect()
}

/// Keeps the points whose deviation lies inside the Tukey fence
/// `[Q1 - 1.5*IQR, Q3 + 1.5*IQR]`. Very small sets behave however the
/// quartile math says they do; they are not special-cased.
pub fn remove_outliers(points: &[DeviationPoint]) -> Vec<DeviationPoint> {
    if points.is_empty() {
        return Vec::new();
    }

    let mut cents: Vec<f32> = points.iter().map(|p| p.cents).collect();
    cents.sort_by(f32::total_cmp);

    let q1 = percentile(&cents, 25.0);
    let q3 = percentile(&cents, 75.0);
    let iqr = q3 - q1;
    let lower = q1 - 1.5 * iqr;
    let upper = q3 + 1.5 * iqr;

    points
        .iter()
        .copied()
        .filter(|p| p.cents >= lower && p.cents <= upper)
        .collect()
}

/// Linear-interpolation percentile over an ascending slice.
fn percentile(sorted: &[f32], pct: f32) -> f32 {
    let rank = pct / 100.0 * (sorted.len() - 1) as f32;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (rank - lo as f32)
}

/// Fits the smoothing spline over the scatter and samples it on a uniform
/// grid spanning the measured frequency range.
pub fn fit_curve(
    points: &[DeviationPoint],
    smoothing: f32,
) -> Result<StretchCurveFit, StretchError> {
    let mut sorted: Vec<DeviationPoint> = points.to_vec();
    sorted.sort_by(|a, b| a.frequency_hz.total_cmp(&b.frequency_hz));

    // collapse duplicate frequencies by averaging; reference notes never
    // collide, but a hand-edited file could
    let mut xs: Vec<f64> = Vec::with_capacity(sorted.len());
    let mut ys: Vec<f64> = Vec::with_capacity(sorted.len());
    let mut counts: Vec<f64> = Vec::with_capacity(sorted.len());
    for p in &sorted {
        let x = f64::from(p.frequency_hz);
        let y = f64::from(p.cents);
        if xs.last() == Some(&x) {
            let i = ys.len() - 1;
            counts[i] += 1.0;
            ys[i] += (y - ys[i]) / counts[i];
        } else {
            xs.push(x);
            ys.push(y);
            counts.push(1.0);
        }
    }

    if xs.len() < MIN_CURVE_POINTS {
        return Err(StretchError::InsufficientCurveData { points: xs.len() });
    }

    let spline = SmoothingSpline::fit(&xs, &ys, f64::from(smoothing));

    let lo = xs[0];
    let hi = xs[xs.len() - 1];
    let step = (hi - lo) / (CURVE_SAMPLES - 1) as f64;
    let curve = (0..CURVE_SAMPLES)
        .map(|i| {
            let x = lo + step * i as f64;
            DeviationPoint {
                frequency_hz: x as f32,
                cents: spline.evaluate(x) as f32,
            }
        })
        .collect();

    Ok(StretchCurveFit {
        points: sorted,
        curve,
    })
}
