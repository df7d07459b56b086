//! Spectral front end: windowing, forward FFT, magnitude spectrum.
//!
//! Works on whole note captures rather than fixed frames, so every function
//! takes the signal length as it comes. The default capture length
//! (3 s at 44100 Hz = 132300 samples) factors as 2^2 * 3^3 * 5^2 * 7^2 and
//! transforms quickly.

use rustfft::{FftPlanner, num_complex::Complex};

/// Centers the signal around zero so the 0 Hz bin does not dominate the
/// displayed spectrum.
fn remove_dc_offset(signal: &mut [f32]) {
    if signal.is_empty() {
        return;
    }
    let mean = signal.iter().sum::<f32>() / signal.len() as f32;
    if mean.abs() > 1e-6 {
        for sample in signal.iter_mut() {
            *sample -= mean;
        }
    }
}

/// Applies a Hann window in place to reduce spectral leakage.
fn apply_hann_window(buffer: &mut [f32]) {
    let n = buffer.len();
    if n < 2 {
        return;
    }
    let step = std::f32::consts::TAU / (n - 1) as f32;
    for (i, sample) in buffer.iter_mut().enumerate() {
        *sample *= 0.5 * (1.0 - (step * i as f32).cos());
    }
}

/// Forward FFT of a signal: DC removal, Hann window, transform.
pub fn perform_fft(signal: &[f32]) -> Vec<Complex<f32>> {
    if signal.is_empty() {
        return Vec::new();
    }

    let mut processed = signal.to_vec();
    remove_dc_offset(&mut processed);
    apply_hann_window(&mut processed);

    let mut planner = FftPlanner::new();
    let fft = planner.plan_fft_forward(processed.len());

    let mut buffer: Vec<Complex<f32>> = processed
        .into_iter()
        .map(|re| Complex { re, im: 0.0 })
        .collect();

    fft.process(&mut buffer);
    buffer
}

/// Magnitudes of the real half of the spectrum (bins 0..=n/2).
pub fn spectrum_to_magnitudes(spectrum: &[Complex<f32>]) -> Vec<f32> {
    spectrum
        .iter()
        .take(spectrum.len() / 2 + 1)
        .map(|c| c.norm())
        .collect()
}

/// Frequency spacing between adjacent bins: `sample_rate / len`.
/// About 0.33 Hz for a 3 s capture at 44100 Hz.
pub fn bin_width_hz(sample_rate: u32, len: usize) -> f32 {
    sample_rate as f32 / len as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sine_peak_lands_in_the_right_bin() {
        let sample_rate = 8192;
        let freq = 512.0;
        let signal: Vec<f32> = (0..sample_rate)
            .map(|i| (std::f32::consts::TAU * freq * i as f32 / sample_rate as f32).sin())
            .collect();

        let magnitudes = spectrum_to_magnitudes(&perform_fft(&signal));
        let peak = magnitudes
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i)
            .unwrap();

        // one bin per Hz with this length
        assert_eq!(peak, freq as usize);
    }

    #[test]
    fn half_spectrum_has_nyquist_bin() {
        let spectrum = perform_fft(&vec![0.5f32; 1024]);
        assert_eq!(spectrum_to_magnitudes(&spectrum).len(), 513);
    }

    #[test]
    fn bin_width_matches_rate_over_length() {
        assert!((bin_width_hz(44100, 132300) - 0.333_33).abs() < 1e-4);
    }
}
