//! Per-note inharmonicity coefficient.
//!
//! Young's stiff-string model gives `f_n = n * f0 * sqrt(1 + B * n^2)`.
//! Regressing `y = (f_n / n)^2` against `x = n^2` over the measured
//! partials yields slope `B * f0^2` and intercept `f0^2`, so
//! `B = slope / intercept`. The coefficient is reported alongside each
//! captured note; it does not feed the curve fit.

use linreg::linear_regression;

use crate::partials::PartialSet;

/// Inharmonicity constant `B` of one note's measured partials, or `None`
/// when the regression degenerates (too few usable partials or a vanishing
/// intercept).
pub fn coefficient(partials: &PartialSet) -> Option<f32> {
    let (xs, ys): (Vec<f64>, Vec<f64>) = partials
        .frequencies()
        .iter()
        .enumerate()
        .filter(|&(_, &f)| f > 0.0)
        .map(|(i, &f)| {
            let n = (i + 1) as f64;
            let f = f64::from(f);
            (n * n, (f / n) * (f / n))
        })
        .unzip();

    if xs.len() < 3 {
        return None;
    }

    let (slope, intercept) = linear_regression::<_, _, f64>(&xs, &ys).ok()?;
    if intercept.abs() <= 1e-6 {
        return None;
    }
    Some((slope / intercept) as f32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::partials::{PARTIALS_PER_NOTE, PartialSet};

    fn stiff_string(f0: f32, b: f32) -> PartialSet {
        let mut freqs = [0.0f32; PARTIALS_PER_NOTE];
        for (i, slot) in freqs.iter_mut().enumerate() {
            let n = (i + 1) as f32;
            *slot = n * f0 * (1.0 + b * n * n).sqrt();
        }
        PartialSet::new(freqs)
    }

    #[test]
    fn recovers_the_model_coefficient() {
        let b = coefficient(&stiff_string(100.0, 5e-4)).unwrap();
        assert!((b - 5e-4).abs() < 1e-6, "got {b}");
    }

    #[test]
    fn perfect_harmonics_give_zero() {
        let b = coefficient(&stiff_string(220.0, 0.0)).unwrap();
        assert!(b.abs() < 1e-6, "got {b}");
    }

    #[test]
    fn too_few_usable_partials_is_none() {
        let set = PartialSet::new([220.0, 440.0, 0.0, 0.0, 0.0, 0.0]);
        assert_eq!(coefficient(&set), None);
    }
}
