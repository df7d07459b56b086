//! Harmonic partial extraction.
//!
//! Given a captured note and its expected fundamental, finds the measured
//! frequency of the first six harmonics. Detection is nearest-bin on the
//! FFT frequency axis: for each harmonic index the bin closest to
//! `fundamental * n` is taken and its *bin* frequency recorded, which is
//! what exposes inharmonicity. There is deliberately no peak interpolation
//! or amplitude weighting; the downstream cents math is calibrated to the
//! raw `sample_rate / len` grid.

use serde::{Deserialize, Serialize};

use crate::fft;

/// Harmonics measured per note, fundamental included.
pub const PARTIALS_PER_NOTE: usize = 6;

/// The measured frequencies of one note's first six harmonics, in
/// harmonic-index order. Immutable once produced.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PartialSet([f32; PARTIALS_PER_NOTE]);

impl PartialSet {
    pub fn new(frequencies: [f32; PARTIALS_PER_NOTE]) -> Self {
        Self(frequencies)
    }

    /// The measured fundamental (first partial).
    pub fn fundamental(&self) -> f32 {
        self.0[0]
    }

    pub fn frequencies(&self) -> &[f32; PARTIALS_PER_NOTE] {
        &self.0
    }
}

/// Everything one FFT pass yields for a captured note: the partials for the
/// curve and the magnitude spectrum for display.
#[derive(Debug, Clone)]
pub struct NoteAnalysis {
    pub partials: PartialSet,
    pub spectrum: Vec<f32>,
}

/// Runs the spectral analysis of one captured note.
pub fn analyze_note(signal: &[f32], fundamental_hz: f32, sample_rate: u32) -> NoteAnalysis {
    let spectrum = fft::spectrum_to_magnitudes(&fft::perform_fft(signal));
    let bin_hz = fft::bin_width_hz(sample_rate, signal.len());

    let mut measured = [0.0f32; PARTIALS_PER_NOTE];
    for (i, slot) in measured.iter_mut().enumerate() {
        let expected = fundamental_hz * (i + 1) as f32;
        let bin = nearest_bin(expected, bin_hz, spectrum.len());
        *slot = bin as f32 * bin_hz;
    }

    NoteAnalysis {
        partials: PartialSet(measured),
        spectrum,
    }
}

/// The partials alone, for callers that do not need the spectrum.
pub fn extract_partials(signal: &[f32], fundamental_hz: f32, sample_rate: u32) -> PartialSet {
    analyze_note(signal, fundamental_hz, sample_rate).partials
}

/// Index of the bin whose center is closest to `expected_hz`, clamped to
/// the real half of the spectrum.
fn nearest_bin(expected_hz: f32, bin_hz: f32, bins: usize) -> usize {
    ((expected_hz / bin_hz).round() as usize).min(bins.saturating_sub(1))
}
