// tests/pipeline.rs
//
// Drives the whole analysis-to-tuning pipeline from outside the crate,
// with synthesized captures instead of a microphone: extract partials for
// every reference note, fit the stretch curve, persist it, reload it, and
// walk the tuning traversal.

use stretch_core::analysis::analyze_capture;
use stretch_core::curve::CURVE_SAMPLES;
use stretch_core::notes::REFERENCE_NOTES;
use stretch_core::tuning::{TuningStep, TuningTraversal};
use stretch_core::{AnalysisConfig, StretchCurveBuilder, store};

const SAMPLE_RATE: u32 = 44100;

/// One second of a stiff-string-like note: six partials, each slightly
/// sharper than the exact harmonic.
fn synth_note(fundamental: f32) -> Vec<f32> {
    (0..SAMPLE_RATE)
        .map(|i| {
            let t = i as f32 / SAMPLE_RATE as f32;
            (1u32..=6)
                .map(|n| {
                    let f = fundamental * n as f32 * (1.0 + 3e-4 * (n * n) as f32);
                    0.2 * (std::f32::consts::TAU * f * t).sin() / n as f32
                })
                .sum()
        })
        .collect()
}

#[test]
fn analysis_fit_store_and_traversal_work_end_to_end() {
    let config = AnalysisConfig {
        sample_rate: SAMPLE_RATE,
        ..AnalysisConfig::default()
    };

    // 1. analysis phase: every reference note, synthesized instead of recorded
    let mut builder = StretchCurveBuilder::new();
    for note in &REFERENCE_NOTES {
        let signal = synth_note(note.frequency);
        let analysis = analyze_capture(&signal, note.frequency, &config)
            .unwrap_or_else(|e| panic!("analysis of {} failed: {e}", note.name));
        builder.add_measurement(note.name, analysis.partials);
    }
    assert_eq!(builder.mapping().len(), 24);

    // 2. curve fit over the deviation scatter
    let fit = builder.fit(config.smoothing).expect("curve fit failed");
    assert_eq!(fit.curve.len(), CURVE_SAMPLES);
    assert!(fit.points.len() >= 4);
    for p in &fit.curve {
        assert!(
            p.frequency_hz >= 65.0 && p.frequency_hz <= 3520.5,
            "curve sample outside the measured range: {} Hz",
            p.frequency_hz
        );
    }

    // 3. persist and reload through the store
    let mapping = builder.into_mapping();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(store::curve_file_name("PipelinePiano"));
    store::save(&mapping, &path).expect("save failed");
    let loaded = store::load(&path).expect("load failed");

    assert_eq!(loaded.len(), mapping.len());
    for (note, partials) in mapping.iter() {
        assert_eq!(loaded.get(note), Some(partials), "mismatch for {note}");
    }

    // 4. tuning phase: middle-out traversal over the reloaded curve
    let mut traversal = TuningTraversal::load(&loaded);
    assert_eq!(traversal.len(), 24);
    match traversal.current() {
        TuningStep::Note(step) => assert_eq!(step.note, "C4"),
        TuningStep::Complete => panic!("traversal should start on a note"),
    }

    let mut visited = vec![];
    loop {
        match traversal.current() {
            TuningStep::Note(step) => {
                visited.push(step.note);
                traversal.advance();
            }
            TuningStep::Complete => break,
        }
    }
    assert_eq!(visited.len(), 24);
    let mut unique = visited.clone();
    unique.sort();
    unique.dedup();
    assert_eq!(unique.len(), 24, "traversal visited a note twice");
}

#[test]
fn measured_partials_stay_within_bin_resolution_of_the_harmonics() {
    let config = AnalysisConfig {
        sample_rate: SAMPLE_RATE,
        ..AnalysisConfig::default()
    };
    let signal = synth_note(261.63);
    let analysis = analyze_capture(&signal, 261.63, &config).unwrap();

    let bin_hz = SAMPLE_RATE as f32 / signal.len() as f32;
    for (i, &measured) in analysis.partials.frequencies().iter().enumerate() {
        let expected = 261.63 * (i + 1) as f32;
        assert!(
            (measured - expected).abs() <= bin_hz / 2.0 + 1e-3,
            "partial {} measured {measured} Hz against expected {expected} Hz",
            i + 1
        );
    }
}
