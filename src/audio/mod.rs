pub mod calibrator;
pub mod capture;
pub mod file;
pub mod sampler;
pub mod trigger;

pub use calibrator::{Calibrator, DcOffset};
pub use capture::{CaptureBuffer, CaptureEngine, CaptureSettings, MAX_SAMPLE_RATE};
pub use file::{AudioFile, WavSampler};
pub use sampler::{full_scale, AnalogSampler, IioSampler, SampleValue, ScriptedSampler};
pub use trigger::{Amplitude, TriggerDetector};
