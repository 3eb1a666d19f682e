use serde::{Deserialize, Serialize};

/// Sound event announcement published to NATS
#[derive(Debug, Serialize, Deserialize)]
pub struct EventMessage {
    pub device_id: String,
    pub file: String,  // Storage handle of the recording
    pub amplitude: u16,
    pub timestamp: String,  // RFC3339 timestamp
    pub sample_rate: u32,
    pub duration_secs: f64,
    pub samples: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pcm: Option<String>,  // Base64-encoded little-endian i16 PCM
}

/// Device status published on startup
#[derive(Debug, Serialize, Deserialize)]
pub struct StatusMessage {
    pub device_id: String,
    pub status: String,
    pub dc_offset: Option<u16>,
    pub threshold: u16,
    pub timestamp: String,
}
