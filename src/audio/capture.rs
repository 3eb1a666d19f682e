use std::hint::spin_loop;

use super::calibrator::DcOffset;
use super::sampler::AnalogSampler;
use super::trigger::Amplitude;
use crate::clock::Clock;
use crate::error::CaptureError;

/// Highest rate with a whole-microsecond period
pub const MAX_SAMPLE_RATE: u32 = 1_000_000;

/// Fixed capture parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureSettings {
    /// Samples per second
    pub sample_rate: u32,
    /// Capture length in seconds
    pub duration_secs: u32,
    /// Multiplier applied to offset-corrected readings
    pub gain: i32,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            sample_rate: 8000,
            duration_secs: 3,
            gain: 8,
        }
    }
}

impl CaptureSettings {
    /// Total samples in one capture
    pub fn sample_count(&self) -> u64 {
        self.sample_rate as u64 * self.duration_secs as u64
    }

    /// Sampling period in whole microseconds, rounded to nearest
    pub fn period_us(&self) -> u64 {
        let rate = self.sample_rate.max(1) as u64;
        (1_000_000 + rate / 2) / rate
    }
}

/// A completed capture
///
/// Never mutated after the engine returns it.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureBuffer {
    /// Scaled signed samples in time order
    pub samples: Vec<i16>,
    pub sample_rate: u32,
    /// Amplitude of the reading that started the capture
    pub trigger_amplitude: Amplitude,
    /// Monotonic time of the first sample deadline
    pub started_at_us: u64,
    /// Monotonic time from start until after the last sample
    pub elapsed_us: u64,
    /// Worst observed delay between a deadline and its reading
    pub max_lag_us: u64,
}

impl CaptureBuffer {
    pub fn duration_secs(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate.max(1) as f64
    }

    /// Largest absolute scaled sample
    pub fn peak(&self) -> u16 {
        self.samples
            .iter()
            .map(|s| s.unsigned_abs())
            .max()
            .unwrap_or(0)
    }
}

/// Fixed-rate, fixed-length sampler
///
/// Spins on the monotonic clock between samples. Each deadline is the
/// previous deadline plus one period, so lateness on one sample does not
/// push back the ones after it.
#[derive(Debug, Clone)]
pub struct CaptureEngine {
    settings: CaptureSettings,
}

impl CaptureEngine {
    pub fn new(settings: CaptureSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &CaptureSettings {
        &self.settings
    }

    /// Scale one reading: `(raw - offset) * gain`, wrapped into `i16`
    pub fn scale(&self, raw: u16, offset: DcOffset) -> i16 {
        let centred = raw as i32 - offset as i32;
        centred.wrapping_mul(self.settings.gain) as i16
    }

    /// Run one full capture
    ///
    /// Blocks the calling thread for the whole capture duration. Returns
    /// `CaptureError::Allocation` without touching the sampler if the buffer
    /// cannot be reserved.
    pub fn capture(
        &self,
        sampler: &mut dyn AnalogSampler,
        clock: &dyn Clock,
        offset: DcOffset,
        trigger_amplitude: Amplitude,
    ) -> Result<CaptureBuffer, CaptureError> {
        let count = self.settings.sample_count();
        let count = usize::try_from(count).map_err(|_| CaptureError::Allocation {
            samples: usize::MAX,
        })?;

        let mut samples: Vec<i16> = Vec::new();
        samples
            .try_reserve_exact(count)
            .map_err(|_| CaptureError::Allocation { samples: count })?;

        let period = self.settings.period_us();
        let started_at_us = clock.micros();
        let mut deadline = started_at_us;
        let mut max_lag_us = 0;

        for _ in 0..count {
            let mut now = clock.micros();
            while now < deadline {
                spin_loop();
                now = clock.micros();
            }

            let raw = sampler.read();
            samples.push(self.scale(raw, offset));

            max_lag_us = max_lag_us.max(now - deadline);
            deadline += period;
        }

        let elapsed_us = clock.micros().saturating_sub(started_at_us);

        Ok(CaptureBuffer {
            samples,
            sample_rate: self.settings.sample_rate,
            trigger_amplitude,
            started_at_us,
            elapsed_us,
            max_lag_us,
        })
    }
}
