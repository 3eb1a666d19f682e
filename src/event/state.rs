use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU32, AtomicU8, AtomicUsize, Ordering};
use std::sync::Mutex;

use super::stats::{EventRecord, EventStats};
use crate::audio::DcOffset;
use crate::error::CaptureError;

/// Pipeline lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum PipelineState {
    Idle = 0,
    Calibrating = 1,
    Armed = 2,
    Capturing = 3,
    Cooldown = 4,
}

impl PipelineState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Calibrating,
            2 => Self::Armed,
            3 => Self::Capturing,
            4 => Self::Cooldown,
            _ => Self::Idle,
        }
    }
}

const NO_OFFSET: u32 = u32::MAX;

/// State shared between the pipeline thread and readers (HTTP, dispatcher)
///
/// Only `EventPipeline` changes the state token and the offset. Every state
/// change is a compare-and-set against the expected current state.
#[derive(Debug)]
pub struct PipelineShared {
    device_id: String,
    state: AtomicU8,
    dc_offset: AtomicU32,
    events_captured: AtomicUsize,
    capture_failures: AtomicUsize,
    store_failures: AtomicUsize,
    notify_failures: AtomicUsize,
    last_event: Mutex<Option<EventRecord>>,
}

impl PipelineShared {
    pub fn new(device_id: impl Into<String>) -> Self {
        Self {
            device_id: device_id.into(),
            state: AtomicU8::new(PipelineState::Idle as u8),
            dc_offset: AtomicU32::new(NO_OFFSET),
            events_captured: AtomicUsize::new(0),
            capture_failures: AtomicUsize::new(0),
            store_failures: AtomicUsize::new(0),
            notify_failures: AtomicUsize::new(0),
            last_event: Mutex::new(None),
        }
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    pub fn state(&self) -> PipelineState {
        PipelineState::from_u8(self.state.load(Ordering::SeqCst))
    }

    /// Move `from` → `to` atomically; false if the current state is not `from`
    pub fn transition(&self, from: PipelineState, to: PipelineState) -> bool {
        self.state
            .compare_exchange(from as u8, to as u8, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    /// Unconditional move, for transitions the pipeline already owns
    pub(crate) fn set_state(&self, to: PipelineState) {
        self.state.store(to as u8, Ordering::SeqCst);
    }

    /// Armed → Capturing; the only way into Capturing
    pub fn try_begin_capture(&self) -> Result<(), CaptureError> {
        if self.transition(PipelineState::Armed, PipelineState::Capturing) {
            Ok(())
        } else {
            Err(CaptureError::Busy)
        }
    }

    /// `None` until calibration has finished
    pub fn dc_offset(&self) -> Option<DcOffset> {
        match self.dc_offset.load(Ordering::SeqCst) {
            NO_OFFSET => None,
            v => Some(v as DcOffset),
        }
    }

    pub(crate) fn set_dc_offset(&self, offset: DcOffset) {
        self.dc_offset.store(offset as u32, Ordering::SeqCst);
    }

    pub(crate) fn record_event(&self, record: EventRecord) {
        self.events_captured.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut last) = self.last_event.lock() {
            *last = Some(record);
        }
    }

    pub(crate) fn record_capture_failure(&self) {
        self.capture_failures.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn record_store_failure(&self) {
        self.store_failures.fetch_add(1, Ordering::SeqCst);
    }

    pub fn record_notify_failure(&self) {
        self.notify_failures.fetch_add(1, Ordering::SeqCst);
    }

    /// Snapshot for status reporting
    pub fn stats(&self) -> EventStats {
        EventStats {
            device_id: self.device_id.clone(),
            state: self.state(),
            dc_offset: self.dc_offset(),
            events_captured: self.events_captured.load(Ordering::SeqCst),
            capture_failures: self.capture_failures.load(Ordering::SeqCst),
            store_failures: self.store_failures.load(Ordering::SeqCst),
            notify_failures: self.notify_failures.load(Ordering::SeqCst),
            last_event: self.last_event.lock().ok().and_then(|last| last.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_starts_idle_and_uncalibrated() {
        let shared = PipelineShared::new("dev");
        assert_eq!(shared.state(), PipelineState::Idle);
        assert_eq!(shared.dc_offset(), None);
    }

    #[test]
    fn test_transition_requires_expected_state() {
        let shared = PipelineShared::new("dev");
        assert!(!shared.transition(PipelineState::Armed, PipelineState::Capturing));
        assert!(shared.transition(PipelineState::Idle, PipelineState::Calibrating));
        assert_eq!(shared.state(), PipelineState::Calibrating);
    }

    #[test]
    fn test_only_one_concurrent_capture_begins() {
        let shared = Arc::new(PipelineShared::new("dev"));
        shared.transition(PipelineState::Idle, PipelineState::Armed);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let shared = Arc::clone(&shared);
                std::thread::spawn(move || shared.try_begin_capture().is_ok())
            })
            .collect();

        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count();

        assert_eq!(winners, 1);
        assert_eq!(shared.state(), PipelineState::Capturing);
        assert!(matches!(shared.try_begin_capture(), Err(CaptureError::Busy)));
    }

    #[test]
    fn test_offset_round_trip() {
        let shared = PipelineShared::new("dev");
        shared.set_dc_offset(2048);
        assert_eq!(shared.dc_offset(), Some(2048));
        assert_eq!(shared.stats().dc_offset, Some(2048));
    }
}
