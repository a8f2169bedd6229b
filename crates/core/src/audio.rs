//! PCM audio beds and the layer mixer.
//!
//! Every layer is decoded to WAV by ffmpeg first (see [`crate::media`]), so all
//! tracks handled here share one sample rate and channel layout.

use std::path::Path;

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};

use crate::error::{ReelError, Result};

/// Interleaved PCM samples in the range -1.0..=1.0.
#[derive(Debug, Clone, PartialEq)]
pub struct PcmTrack {
    sample_rate: u32,
    channels: u16,
    samples: Vec<f32>,
}

impl PcmTrack {
    pub fn new(sample_rate: u32, channels: u16, samples: Vec<f32>) -> Self {
        Self {
            sample_rate,
            channels: channels.max(1),
            samples,
        }
    }

    pub fn silence(sample_rate: u32, channels: u16, seconds: f64) -> Self {
        let mut track = Self::new(sample_rate, channels, Vec::new());
        track.samples = vec![0.0; track.frames_for(seconds) * usize::from(track.channels)];
        track
    }

    pub fn read_wav(path: &Path) -> Result<Self> {
        let mut reader = WavReader::open(path)?;
        let spec = reader.spec();
        let samples = match (spec.sample_format, spec.bits_per_sample) {
            (SampleFormat::Float, _) => reader
                .samples::<f32>()
                .collect::<std::result::Result<Vec<_>, _>>()?,
            (SampleFormat::Int, bits) => {
                let scale = (1i64 << (bits - 1)) as f32;
                reader
                    .samples::<i32>()
                    .map(|s| s.map(|v| v as f32 / scale))
                    .collect::<std::result::Result<Vec<_>, _>>()?
            }
        };
        Ok(Self::new(spec.sample_rate, spec.channels, samples))
    }

    /// Write as 16-bit PCM.
    pub fn write_wav(&self, path: &Path) -> Result<()> {
        let spec = WavSpec {
            channels: self.channels,
            sample_rate: self.sample_rate,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let mut writer = WavWriter::create(path, spec)?;
        for sample in &self.samples {
            writer.write_sample((sample.clamp(-1.0, 1.0) * f32::from(i16::MAX)) as i16)?;
        }
        writer.finalize()?;
        Ok(())
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn frames(&self) -> usize {
        self.samples.len() / usize::from(self.channels)
    }

    pub fn duration(&self) -> f64 {
        self.frames() as f64 / f64::from(self.sample_rate)
    }

    fn frames_for(&self, seconds: f64) -> usize {
        (seconds.max(0.0) * f64::from(self.sample_rate)).round() as usize
    }

    /// Exactly `seconds` long: tiled by whole copies when short, trimmed when long.
    pub fn fitted(&self, seconds: f64) -> PcmTrack {
        let wanted = self.frames_for(seconds) * usize::from(self.channels);
        if self.samples.is_empty() {
            return Self::silence(self.sample_rate, self.channels, seconds);
        }
        let samples = self.samples.iter().copied().cycle().take(wanted).collect();
        Self::new(self.sample_rate, self.channels, samples)
    }

    /// Exactly `seconds` long: padded with trailing silence when short, trimmed when long.
    pub fn padded(&self, seconds: f64) -> PcmTrack {
        let wanted = self.frames_for(seconds) * usize::from(self.channels);
        let mut samples = self.samples.clone();
        samples.resize(wanted, 0.0);
        Self::new(self.sample_rate, self.channels, samples)
    }

    pub fn with_gain(mut self, gain: f32) -> PcmTrack {
        for sample in &mut self.samples {
            *sample *= gain;
        }
        self
    }

    fn same_format(&self, other: &PcmTrack) -> bool {
        self.sample_rate == other.sample_rate && self.channels == other.channels
    }

    /// Join tracks end to end.
    pub fn concat(parts: &[PcmTrack]) -> Result<PcmTrack> {
        let Some(first) = parts.first() else {
            return Err(ReelError::InvalidInput {
                reason: "no audio parts to join".to_string(),
            });
        };
        let mut samples = Vec::with_capacity(parts.iter().map(|p| p.samples.len()).sum());
        for part in parts {
            if !first.same_format(part) {
                return Err(mismatch(first, part));
            }
            samples.extend_from_slice(&part.samples);
        }
        Ok(Self::new(first.sample_rate, first.channels, samples))
    }
}

fn mismatch(expected: &PcmTrack, got: &PcmTrack) -> ReelError {
    ReelError::InvalidInput {
        reason: format!(
            "audio format mismatch: {} Hz/{} ch vs {} Hz/{} ch",
            expected.sample_rate, expected.channels, got.sample_rate, got.channels
        ),
    }
}

/// One input to the mixer with its own linear gain.
#[derive(Debug, Clone)]
pub struct AudioLayer {
    pub name: &'static str,
    pub track: PcmTrack,
    pub gain: f32,
}

/// Fit every layer to `seconds`, apply its gain, and sum.
///
/// Returns `None` when there are no layers; what the video carries then is up
/// to the caller.
pub fn mix_layers(layers: &[AudioLayer], seconds: f64) -> Result<Option<PcmTrack>> {
    let Some(first) = layers.first() else {
        return Ok(None);
    };

    let mut mixed = PcmTrack::silence(first.track.sample_rate, first.track.channels, seconds);
    for layer in layers {
        if !mixed.same_format(&layer.track) {
            return Err(mismatch(&mixed, &layer.track));
        }
        let fitted = layer.track.fitted(seconds).with_gain(layer.gain);
        for (out, sample) in mixed.samples.iter_mut().zip(&fitted.samples) {
            *out += sample;
        }
    }
    for sample in &mut mixed.samples {
        *sample = sample.clamp(-1.0, 1.0);
    }

    Ok(Some(mixed))
}
