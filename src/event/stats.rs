use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::state::PipelineState;
use crate::audio::{Amplitude, CaptureBuffer, DcOffset};

/// Summary of one captured event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    /// Storage handle, if the capture was stored
    pub file: Option<String>,

    /// Amplitude that triggered the capture
    pub amplitude: Amplitude,

    /// When the trigger fired
    pub timestamp: DateTime<Utc>,

    pub samples: usize,

    /// Largest absolute scaled sample
    pub peak: u16,

    /// Worst sample lateness during the capture
    pub max_lag_us: u64,
}

impl EventRecord {
    pub fn from_buffer(buffer: &CaptureBuffer, timestamp: DateTime<Utc>) -> Self {
        Self {
            file: None,
            amplitude: buffer.trigger_amplitude,
            timestamp,
            samples: buffer.samples.len(),
            peak: buffer.peak(),
            max_lag_us: buffer.max_lag_us,
        }
    }
}

/// Point-in-time view of the pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventStats {
    pub device_id: String,

    pub state: PipelineState,

    /// Calibrated silence level, once known
    pub dc_offset: Option<DcOffset>,

    pub events_captured: usize,

    pub capture_failures: usize,

    pub store_failures: usize,

    pub notify_failures: usize,

    pub last_event: Option<EventRecord>,
}

/// What the notification collaborator is told about a stored event
#[derive(Debug, Clone)]
pub struct EventNotice {
    /// Storage handle (file name)
    pub handle: String,
    pub trigger_amplitude: Amplitude,
    pub device_id: String,
    pub timestamp: DateTime<Utc>,
    pub sample_rate: u32,
    pub sample_count: usize,
    /// Captured samples, when notifications carry audio
    pub samples: Option<Vec<i16>>,
}

impl EventNotice {
    pub fn duration_secs(&self) -> f64 {
        self.sample_count as f64 / self.sample_rate.max(1) as f64
    }
}
