//! Error kinds surfaced by the core.
//!
//! Every failure is reported to the caller; nothing is swallowed. The two
//! recoverable kinds (`CaptureTooQuiet`, `InsufficientCurveData`) are
//! resolved by repeating the triggering action with better input, the rest
//! carry their underlying cause for display.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StretchError {
    /// The captured signal did not pass the amplitude gate. Recoverable:
    /// prompt for the same note again, played louder.
    #[error("capture too quiet (rms {rms:.6} below threshold {threshold:.6})")]
    CaptureTooQuiet { rms: f32, threshold: f32 },

    /// Fewer distinct frequencies than a cubic smoothing spline needs.
    /// The raw deviation scatter is still usable.
    #[error("not enough data to fit a stretch curve ({points} distinct points, need {min})", min = crate::curve::MIN_CURVE_POINTS)]
    InsufficientCurveData { points: usize },

    /// Reading, writing or parsing a stretch curve file failed. Analysis and
    /// tuning state are unaffected.
    #[error("stretch curve file error at {}: {cause:#}", .path.display())]
    Storage { path: PathBuf, cause: anyhow::Error },

    /// The capture device is unavailable or broke mid-capture. Fatal; there
    /// is no internal retry.
    #[error("audio capture device failed: {0:#}")]
    Device(anyhow::Error),
}
