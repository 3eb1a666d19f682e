use tracing::info;

use super::sampler::AnalogSampler;
use crate::clock::Clock;

/// Estimated silence-level reading
pub type DcOffset = u16;

/// Measures the resting DC offset of the input
///
/// Assumes the room is silent while it runs. Noise during calibration skews
/// the offset and is not detected here.
#[derive(Debug, Clone)]
pub struct Calibrator {
    samples: u32,
    delay_us: u64,
}

impl Calibrator {
    pub fn new(samples: u32, delay_us: u64) -> Self {
        Self {
            samples: samples.max(1),
            delay_us,
        }
    }

    /// Average `samples` consecutive readings and round to the nearest integer
    pub fn calibrate(&self, sampler: &mut dyn AnalogSampler, clock: &dyn Clock) -> DcOffset {
        let n = self.samples as u64;
        let mut sum: u64 = 0;

        for _ in 0..n {
            sum += sampler.read() as u64;
            clock.delay_us(self.delay_us);
        }

        let offset = ((sum + n / 2) / n) as DcOffset;

        info!(
            "Calibrated DC offset {} from {} samples ({})",
            offset,
            n,
            sampler.name()
        );

        offset
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::ScriptedSampler;
    use crate::clock::ManualClock;

    #[test]
    fn test_calibrate_constant_input() {
        let mut sampler = ScriptedSampler::constant(2048);
        let clock = ManualClock::new(0);

        let offset = Calibrator::new(1024, 100).calibrate(&mut sampler, &clock);

        assert_eq!(offset, 2048);
        assert_eq!(sampler.reads(), 1024);
        assert_eq!(clock.peek(), 1024 * 100);
    }

    #[test]
    fn test_calibrate_rounds_mean() {
        let clock = ManualClock::new(0);

        // mean 2048.5 rounds up
        let mut sampler = ScriptedSampler::new(vec![2048, 2049], 0);
        assert_eq!(Calibrator::new(2, 0).calibrate(&mut sampler, &clock), 2049);

        // mean 2048.25 rounds down
        let mut sampler = ScriptedSampler::new(vec![2048, 2048, 2048, 2049], 0);
        assert_eq!(Calibrator::new(4, 0).calibrate(&mut sampler, &clock), 2048);
    }

    #[test]
    fn test_calibrate_is_repeatable() {
        let input: Vec<u16> = (0..1024).map(|i| 2040 + (i % 17) as u16).collect();
        let calibrator = Calibrator::new(1024, 10);
        let clock = ManualClock::new(1);

        let first = calibrator.calibrate(&mut ScriptedSampler::new(input.clone(), 0), &clock);
        let second = calibrator.calibrate(&mut ScriptedSampler::new(input, 0), &clock);

        assert_eq!(first, second);
    }

    #[test]
    fn test_zero_sample_count_still_reads_once() {
        let mut sampler = ScriptedSampler::constant(1000);
        let offset = Calibrator::new(0, 0).calibrate(&mut sampler, &ManualClock::new(0));
        assert_eq!(offset, 1000);
    }
}
