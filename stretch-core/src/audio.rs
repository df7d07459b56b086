//! Fixed-length audio capture.
//!
//! Records one note at a time through CPAL: the default input device is
//! opened in mono f32, the stream callback feeds a channel, and
//! [`record_note`] blocks until the requested number of samples has
//! accumulated. There is no cancellation of an in-flight capture; a stuck
//! device blocks the worker thread.

use anyhow::{Context, Result, anyhow};
use cpal::SupportedStreamConfigRange;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossbeam_channel::unbounded;
use log::{error, info};

use crate::error::StretchError;

/// Records a single mono signal of `capture_secs * sample_rate` samples.
///
/// Blocks for the full capture duration. Any device failure is fatal for
/// this capture and surfaces as [`StretchError::Device`]; whether to retry
/// is the caller's decision.
pub fn record_note(sample_rate: u32, capture_secs: f32) -> Result<Vec<f32>, StretchError> {
    capture_blocking(sample_rate, capture_secs).map_err(StretchError::Device)
}

fn capture_blocking(target_rate: u32, capture_secs: f32) -> Result<Vec<f32>> {
    let host = cpal::default_host();
    let device = host
        .default_input_device()
        .ok_or_else(|| anyhow!("no audio input device available"))?;

    info!(
        "recording from input device: {}",
        device.name().unwrap_or_else(|_| "<unnamed>".into())
    );

    let configs = device.supported_input_configs()?.collect::<Vec<_>>();
    let supported = pick_input_config(configs, target_rate)
        .ok_or_else(|| anyhow!("no mono f32 input format available"))?;

    if target_rate < supported.min_sample_rate().0 || target_rate > supported.max_sample_rate().0 {
        return Err(anyhow!("input device cannot record at {target_rate} Hz"));
    }
    let config: cpal::StreamConfig = supported
        .with_sample_rate(cpal::SampleRate(target_rate))
        .into();

    let wanted = (capture_secs * target_rate as f32).round() as usize;
    let (sender, receiver) = unbounded::<Vec<f32>>();

    let stream = device.build_input_stream(
        &config,
        move |data: &[f32], _: &cpal::InputCallbackInfo| {
            let _ = sender.send(data.to_vec());
        },
        |err| error!("audio stream error: {err}"),
        None,
    )?;
    stream.play()?;

    let mut signal = Vec::with_capacity(wanted);
    while signal.len() < wanted {
        let chunk = receiver
            .recv()
            .context("audio stream closed before the capture finished")?;
        signal.extend_from_slice(&chunk);
    }
    drop(stream);
    signal.truncate(wanted);
    Ok(signal)
}

/// Picks the mono f32 input configuration closest to the target rate.
fn pick_input_config(
    configs: Vec<SupportedStreamConfigRange>,
    target_rate: u32,
) -> Option<SupportedStreamConfigRange> {
    configs
        .into_iter()
        .filter(|c| c.channels() == 1 && c.sample_format() == cpal::SampleFormat::F32)
        .min_by_key(|c| {
            let below = (c.min_sample_rate().0 as i64 - target_rate as i64).abs();
            let above = (c.max_sample_rate().0 as i64 - target_rate as i64).abs();
            below.min(above)
        })
}

/// Root-mean-square amplitude of a signal.
pub fn rms(signal: &[f32]) -> f32 {
    if signal.is_empty() {
        return 0.0;
    }
    (signal.iter().map(|&s| s * s).sum::<f32>() / signal.len() as f32).sqrt()
}

/// Amplitude gate: silence and too-quiet playing fail this check.
pub fn is_loud_enough(signal: &[f32], threshold: f32) -> bool {
    rms(signal) >= threshold
}
