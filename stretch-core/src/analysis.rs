//! The analysis phase worker.
//!
//! Capture and extraction run sequentially on a dedicated thread so the
//! presentation side stays responsive through the multi-second blocking
//! captures. The worker is the sole owner of the partials mapping while it
//! is being built; progress flows back through an explicit event channel,
//! never through shared state. At most one capture is in flight, and a
//! fixed delay separates notes so the player can release and prepare.

use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender, unbounded};
use log::{debug, info, warn};

use crate::AnalysisConfig;
use crate::audio;
use crate::curve::{PartialsMapping, StretchCurveBuilder, StretchCurveFit};
use crate::error::StretchError;
use crate::inharmonicity;
use crate::notes::{Note, REFERENCE_NOTES};
use crate::partials::{self, NoteAnalysis, PartialSet};

/// Progress messages from the worker to the presentation layer.
#[derive(Debug)]
pub enum AnalysisEvent {
    /// The player should strike this note now; the capture is about to
    /// block.
    NotePrompted { note: &'static str },
    /// A note was captured and analyzed.
    NoteCaptured {
        note: &'static str,
        partials: PartialSet,
        /// Inharmonicity constant of the measured partials, when derivable.
        coefficient: Option<f32>,
        /// Magnitude spectrum of the capture, for display.
        spectrum: Vec<f32>,
    },
    /// The capture missed the amplitude gate; the same note will be
    /// prompted again after the inter-note delay.
    NoteTooQuiet { note: &'static str, rms: f32 },
    /// All notes are in. The fit may still have failed with
    /// [`StretchError::InsufficientCurveData`]; the mapping and its raw
    /// scatter remain usable either way.
    Completed {
        mapping: PartialsMapping,
        fit: Result<StretchCurveFit, StretchError>,
    },
    /// Unrecoverable failure, analysis stopped.
    Failed { error: StretchError },
}

/// Starts the analysis phase on its own worker thread and returns the
/// event stream to drive a front end from.
pub fn spawn_analysis(config: AnalysisConfig) -> (JoinHandle<()>, Receiver<AnalysisEvent>) {
    let (sender, receiver) = unbounded();
    let handle = thread::spawn(move || run_analysis(&config, &sender));
    (handle, receiver)
}

/// The worker loop: every reference note in sampling order, one blocking
/// capture at a time, re-prompting quiet captures until they pass the gate.
pub fn run_analysis(config: &AnalysisConfig, events: &Sender<AnalysisEvent>) {
    info!(
        "starting stretch analysis over {} reference notes",
        REFERENCE_NOTES.len()
    );
    let mut builder = StretchCurveBuilder::new();

    for note in &REFERENCE_NOTES {
        loop {
            if events
                .send(AnalysisEvent::NotePrompted { note: note.name })
                .is_err()
            {
                info!("presentation side disconnected, stopping analysis");
                return;
            }

            match measure_note(note, config) {
                Ok(analysis) => {
                    let coefficient = inharmonicity::coefficient(&analysis.partials);
                    debug!(
                        "captured {}: partials {:?}, B {:?}",
                        note.name,
                        analysis.partials.frequencies(),
                        coefficient
                    );
                    builder.add_measurement(note.name, analysis.partials);
                    let _ = events.send(AnalysisEvent::NoteCaptured {
                        note: note.name,
                        partials: analysis.partials,
                        coefficient,
                        spectrum: analysis.spectrum,
                    });
                    thread::sleep(config.note_delay);
                    break;
                }
                Err(StretchError::CaptureTooQuiet { rms, .. }) => {
                    warn!("{} too quiet (rms {rms:.6}), prompting again", note.name);
                    let _ = events.send(AnalysisEvent::NoteTooQuiet {
                        note: note.name,
                        rms,
                    });
                    thread::sleep(config.note_delay);
                }
                Err(error) => {
                    let _ = events.send(AnalysisEvent::Failed { error });
                    return;
                }
            }
        }
    }

    let fit = builder.fit(config.smoothing);
    if let Err(err) = &fit {
        warn!("curve fit unavailable: {err}");
    }
    let _ = events.send(AnalysisEvent::Completed {
        mapping: builder.into_mapping(),
        fit,
    });
}

/// One blocking capture of `note`, gated and analyzed.
pub fn measure_note(note: &Note, config: &AnalysisConfig) -> Result<NoteAnalysis, StretchError> {
    let signal = audio::record_note(config.sample_rate, config.capture_secs)?;
    analyze_capture(&signal, note.frequency, config)
}

/// The capture-free half of [`measure_note`]: amplitude gate, then partial
/// extraction.
pub fn analyze_capture(
    signal: &[f32],
    nominal_hz: f32,
    config: &AnalysisConfig,
) -> Result<NoteAnalysis, StretchError> {
    let rms = audio::rms(signal);
    if rms < config.amplitude_threshold {
        return Err(StretchError::CaptureTooQuiet {
            rms,
            threshold: config.amplitude_threshold,
        });
    }
    Ok(partials::analyze_note(signal, nominal_hz, config.sample_rate))
}
