use crate::audio::CaptureSettings;
use crate::event::PipelineShared;
use crate::storage::WavStore;
use std::sync::Arc;

/// Shared application state for HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Pipeline state and counters (read-only here)
    pub shared: Arc<PipelineShared>,

    /// Recordings on disk
    pub store: Arc<WavStore>,

    /// Fixed capture parameters, reported by /status
    pub capture: CaptureSettings,

    pub threshold: u16,
}

impl AppState {
    pub fn new(
        shared: Arc<PipelineShared>,
        store: Arc<WavStore>,
        capture: CaptureSettings,
        threshold: u16,
    ) -> Self {
        Self {
            shared,
            store,
            capture,
            threshold,
        }
    }
}
