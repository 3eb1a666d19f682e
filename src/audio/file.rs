use anyhow::{Context, Result};
use hound::WavReader;
use std::path::Path;
use tracing::info;

use super::sampler::{full_scale, AnalogSampler, SampleValue};

/// A mono or multichannel 16-bit WAV file loaded into memory
pub struct AudioFile {
    pub path: String,
    pub duration_seconds: f64,
    pub sample_rate: u32,
    pub channels: u16,
    pub samples: Vec<i16>,
}

impl AudioFile {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!("Opening audio file: {}", path.display());

        let reader = WavReader::open(path)
            .context("Failed to open WAV file")?;

        let spec = reader.spec();
        if spec.sample_format != hound::SampleFormat::Int || spec.bits_per_sample != 16 {
            anyhow::bail!(
                "Expected 16-bit integer PCM, got {}-bit {:?}",
                spec.bits_per_sample,
                spec.sample_format
            );
        }

        let samples: Vec<i16> = reader
            .into_samples::<i16>()
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to read audio samples")?;

        let duration_seconds = samples.len() as f64 /
            (spec.sample_rate as f64 * spec.channels as f64);

        info!(
            "Audio file loaded: {:.1}s, {}Hz, {} channels, {} samples",
            duration_seconds,
            spec.sample_rate,
            spec.channels,
            samples.len()
        );

        Ok(Self {
            path: path.display().to_string(),
            duration_seconds,
            sample_rate: spec.sample_rate,
            channels: spec.channels,
            samples,
        })
    }

    /// Largest absolute sample value
    pub fn peak(&self) -> u16 {
        self.samples
            .iter()
            .map(|s| s.unsigned_abs())
            .max()
            .unwrap_or(0)
    }
}

/// Replays a WAV file as if it were an ADC channel
///
/// Signed 16-bit samples are shifted down to the converter resolution and
/// re-centred on mid-scale. Only the first channel is used. Loops forever.
pub struct WavSampler {
    samples: Vec<i16>,
    position: usize,
    resolution_bits: u8,
    max_value: SampleValue,
}

impl WavSampler {
    pub fn open(path: impl AsRef<Path>, resolution_bits: u8) -> Result<Self> {
        let file = AudioFile::open(path)?;
        if file.samples.is_empty() {
            anyhow::bail!("WAV file {} has no samples", file.path);
        }

        let samples = file
            .samples
            .iter()
            .step_by(file.channels.max(1) as usize)
            .copied()
            .collect();

        Ok(Self::from_samples(samples, resolution_bits))
    }

    pub fn from_samples(samples: Vec<i16>, resolution_bits: u8) -> Self {
        let resolution_bits = resolution_bits.clamp(1, 16);
        Self {
            samples,
            position: 0,
            resolution_bits,
            max_value: full_scale(resolution_bits),
        }
    }

    fn to_adc(&self, sample: i16) -> SampleValue {
        let shifted = (sample as i32) >> (16 - self.resolution_bits as u32);
        let midpoint = (self.max_value as i32 + 1) / 2;
        (shifted + midpoint).clamp(0, self.max_value as i32) as SampleValue
    }
}

impl AnalogSampler for WavSampler {
    fn read(&mut self) -> SampleValue {
        let Some(&sample) = self.samples.get(self.position) else {
            return self.to_adc(0);
        };
        self.position = (self.position + 1) % self.samples.len();
        self.to_adc(sample)
    }

    fn max_value(&self) -> SampleValue {
        self.max_value
    }

    fn name(&self) -> &str {
        "wav"
    }
}
