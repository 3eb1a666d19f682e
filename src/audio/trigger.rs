use super::calibrator::DcOffset;
use super::sampler::AnalogSampler;

/// Deviation of a reading from the DC offset
pub type Amplitude = u16;

/// Compares live readings against the calibrated offset
#[derive(Debug, Clone, Copy)]
pub struct TriggerDetector {
    threshold: Amplitude,
}

impl TriggerDetector {
    pub fn new(threshold: Amplitude) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> Amplitude {
        self.threshold
    }

    /// Take one reading; return its amplitude if it strictly exceeds the threshold
    pub fn poll(&self, sampler: &mut dyn AnalogSampler, offset: DcOffset) -> Option<Amplitude> {
        self.evaluate(sampler.read(), offset)
    }

    /// Threshold test for a single reading
    pub fn evaluate(&self, sample: u16, offset: DcOffset) -> Option<Amplitude> {
        let amplitude = sample.abs_diff(offset);
        (amplitude > self.threshold).then_some(amplitude)
    }
}
