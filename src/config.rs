use anyhow::Result;
use serde::Deserialize;
use std::path::PathBuf;

use crate::audio::{full_scale, CaptureSettings, MAX_SAMPLE_RATE};
use crate::event::PipelineConfig;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub device: DeviceConfig,
    pub sampler: SamplerConfig,
    pub capture: CaptureConfig,
    pub storage: StorageConfig,
    pub nats: NatsConfig,
    pub http: HttpConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeviceConfig {
    /// Generated when not set
    pub id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SamplerSource {
    /// Linux IIO ADC channel
    Iio,
    /// WAV file replay
    Wav,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SamplerConfig {
    pub source: SamplerSource,
    pub iio_path: String,
    pub wav_path: Option<String>,
    pub resolution_bits: u8,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CaptureConfig {
    pub sample_rate: u32,
    pub duration_secs: u32,
    pub threshold: u16,
    pub gain: i32,
    pub calibration_samples: u32,
    pub calibration_delay_us: u64,
    pub cooldown_ms: u64,
    pub idle_poll_us: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub recordings_path: String,
    pub max_recordings: Option<usize>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NatsConfig {
    pub enabled: bool,
    pub url: String,
    pub subject_prefix: String,
    pub attach_pcm: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    pub bind: String,
    pub port: u16,
}

impl Config {
    /// Defaults, then `path` (any format the `config` crate reads, optional),
    /// then `ACOUSTIC__SECTION__KEY` environment variables
    pub fn load(path: &str) -> Result<Self> {
        let settings = Self::defaults()?
            .add_source(config::File::with_name(path).required(false))
            .add_source(
                config::Environment::with_prefix("ACOUSTIC")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let cfg: Self = settings.try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Built-in defaults only
    pub fn from_defaults() -> Result<Self> {
        let cfg: Self = Self::defaults()?.build()?.try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn defaults() -> Result<config::builder::ConfigBuilder<config::builder::DefaultState>> {
        Ok(config::Config::builder()
            .set_default("sampler.source", "iio")?
            .set_default("sampler.iio_path", "/sys/bus/iio/devices/iio:device0/in_voltage0_raw")?
            .set_default("sampler.resolution_bits", 12i64)?
            .set_default("capture.sample_rate", 8000i64)?
            .set_default("capture.duration_secs", 3i64)?
            .set_default("capture.threshold", 500i64)?
            .set_default("capture.gain", 8i64)?
            .set_default("capture.calibration_samples", 1024i64)?
            .set_default("capture.calibration_delay_us", 100i64)?
            .set_default("capture.cooldown_ms", 2000i64)?
            .set_default("capture.idle_poll_us", 200i64)?
            .set_default("storage.recordings_path", "~/.acoustic-trigger/recordings")?
            .set_default("nats.enabled", false)?
            .set_default("nats.url", "nats://localhost:4222")?
            .set_default("nats.subject_prefix", "acoustic")?
            .set_default("nats.attach_pcm", false)?
            .set_default("http.bind", "0.0.0.0")?
            .set_default("http.port", 8080i64)?)
    }

    pub fn validate(&self) -> Result<()> {
        let c = &self.capture;

        if c.sample_rate == 0 || c.sample_rate > MAX_SAMPLE_RATE {
            anyhow::bail!(
                "capture.sample_rate must be 1..={} Hz, got {}",
                MAX_SAMPLE_RATE,
                c.sample_rate
            );
        }
        if c.duration_secs == 0 {
            anyhow::bail!("capture.duration_secs must be greater than zero");
        }
        if c.calibration_samples == 0 {
            anyhow::bail!("capture.calibration_samples must be greater than zero");
        }
        if !(1..=16).contains(&self.sampler.resolution_bits) {
            anyhow::bail!(
                "sampler.resolution_bits must be 1..=16, got {}",
                self.sampler.resolution_bits
            );
        }

        let max = full_scale(self.sampler.resolution_bits);
        if c.threshold >= max {
            anyhow::bail!(
                "capture.threshold {} can never be exceeded by a {}-bit converter",
                c.threshold,
                self.sampler.resolution_bits
            );
        }

        if self.storage.max_recordings == Some(0) {
            anyhow::bail!("storage.max_recordings must be at least 1 when set");
        }

        if self.sampler.source == SamplerSource::Wav && self.sampler.wav_path.is_none() {
            anyhow::bail!("sampler.wav_path is required when sampler.source = \"wav\"");
        }

        Ok(())
    }

    /// Configured device ID, or a generated one
    pub fn device_id(&self) -> String {
        self.device.id.clone().unwrap_or_else(|| {
            let id = uuid::Uuid::new_v4().simple().to_string();
            format!("sensor-{}", &id[..8])
        })
    }

    /// Recordings directory with `~` expanded
    pub fn recordings_dir(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.storage.recordings_path).as_ref())
    }

    pub fn pipeline(&self) -> PipelineConfig {
        let c = &self.capture;
        PipelineConfig {
            capture: CaptureSettings {
                sample_rate: c.sample_rate,
                duration_secs: c.duration_secs,
                gain: c.gain,
            },
            threshold: c.threshold,
            calibration_samples: c.calibration_samples,
            calibration_delay_us: c.calibration_delay_us,
            cooldown_ms: c.cooldown_ms,
            idle_poll_us: c.idle_poll_us,
            attach_samples: self.nats.enabled && self.nats.attach_pcm,
        }
    }
}
