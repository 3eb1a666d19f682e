use anyhow::Result;
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use super::state::{PipelineShared, PipelineState};
use super::stats::{EventNotice, EventRecord};
use crate::audio::{
    AnalogSampler, Amplitude, CaptureBuffer, CaptureEngine, CaptureSettings, Calibrator, DcOffset,
    TriggerDetector,
};
use crate::clock::Clock;
use crate::storage::EventStore;

/// Detection and timing parameters for the pipeline
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub capture: CaptureSettings,
    /// Minimum deviation from the DC offset that counts as a trigger
    pub threshold: Amplitude,
    pub calibration_samples: u32,
    pub calibration_delay_us: u64,
    /// Post-capture interval with no trigger evaluation
    pub cooldown_ms: u64,
    /// Pause between polls while Armed
    pub idle_poll_us: u64,
    /// Include samples in notices
    pub attach_samples: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            capture: CaptureSettings::default(),
            threshold: 500,
            calibration_samples: 1024,
            calibration_delay_us: 100,
            cooldown_ms: 2000,
            idle_poll_us: 200,
            attach_samples: false,
        }
    }
}

/// Result of one `step()`
#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome {
    /// Not calibrated yet, nothing to do
    Idle,
    /// Armed, reading below threshold
    Quiet,
    /// Trigger fired, capture completed and was handed off
    Captured(EventRecord),
    /// Trigger fired but no buffer could be captured
    CaptureFailed,
    /// Trigger fired while a capture was already in progress
    Ignored,
    /// Still inside the post-capture cooldown
    CoolingDown,
    /// Cooldown just ended
    Rearmed,
}

/// Raises a stop flag when dropped
///
/// Hold one for as long as a `run()` loop should live; any early return
/// from the owner then stops the loop too.
pub struct ShutdownGuard {
    flag: Arc<AtomicBool>,
}

impl ShutdownGuard {
    pub fn new(flag: Arc<AtomicBool>) -> Self {
        Self { flag }
    }

    pub fn flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.flag)
    }
}

impl Drop for ShutdownGuard {
    fn drop(&mut self) {
        self.flag.store(true, Ordering::SeqCst);
    }
}

/// The detector's state machine
///
/// Idle → Calibrating → Armed → Capturing → Cooldown → Armed → ...
/// The sampler is consulted for triggers only while Armed.
pub struct EventPipeline<S: AnalogSampler> {
    config: PipelineConfig,
    sampler: S,
    clock: Box<dyn Clock>,
    store: Box<dyn EventStore>,
    notices: Option<mpsc::UnboundedSender<EventNotice>>,
    calibrator: Calibrator,
    detector: TriggerDetector,
    engine: CaptureEngine,
    shared: Arc<PipelineShared>,
    cooldown_until_us: u64,
}

impl<S: AnalogSampler> EventPipeline<S> {
    pub fn new(
        config: PipelineConfig,
        sampler: S,
        clock: Box<dyn Clock>,
        store: Box<dyn EventStore>,
        shared: Arc<PipelineShared>,
    ) -> Self {
        let calibrator = Calibrator::new(config.calibration_samples, config.calibration_delay_us);
        let detector = TriggerDetector::new(config.threshold);
        let engine = CaptureEngine::new(config.capture);

        Self {
            config,
            sampler,
            clock,
            store,
            notices: None,
            calibrator,
            detector,
            engine,
            shared,
            cooldown_until_us: 0,
        }
    }

    /// Send a notice for every stored event to `tx`
    pub fn with_notifications(mut self, tx: mpsc::UnboundedSender<EventNotice>) -> Self {
        self.notices = Some(tx);
        self
    }

    pub fn shared(&self) -> &Arc<PipelineShared> {
        &self.shared
    }

    pub fn state(&self) -> PipelineState {
        self.shared.state()
    }

    pub fn sampler_mut(&mut self) -> &mut S {
        &mut self.sampler
    }

    /// Idle → Calibrating → Armed
    pub fn start(&mut self) -> Result<DcOffset> {
        if !self.shared.transition(PipelineState::Idle, PipelineState::Calibrating) {
            anyhow::bail!("Pipeline already started (state {:?})", self.shared.state());
        }

        info!("Calibrating: keep the environment silent");

        let offset = self.calibrator.calibrate(&mut self.sampler, self.clock.as_ref());
        self.shared.set_dc_offset(offset);
        self.shared.set_state(PipelineState::Armed);

        info!(
            "Armed (offset {}, threshold {}, {} Hz x {}s)",
            offset,
            self.detector.threshold(),
            self.config.capture.sample_rate,
            self.config.capture.duration_secs
        );

        Ok(offset)
    }

    /// Re-measure the DC offset; only allowed while Armed
    pub fn recalibrate(&mut self) -> Result<DcOffset> {
        if !self.shared.transition(PipelineState::Armed, PipelineState::Calibrating) {
            anyhow::bail!("Can only recalibrate while armed (state {:?})", self.shared.state());
        }

        let offset = self.calibrator.calibrate(&mut self.sampler, self.clock.as_ref());
        self.shared.set_dc_offset(offset);
        self.shared.set_state(PipelineState::Armed);

        Ok(offset)
    }

    /// One iteration of the main loop
    pub fn step(&mut self) -> StepOutcome {
        match self.shared.state() {
            PipelineState::Idle | PipelineState::Calibrating | PipelineState::Capturing => {
                StepOutcome::Idle
            }
            PipelineState::Cooldown => {
                if self.clock.micros() >= self.cooldown_until_us {
                    self.shared.set_state(PipelineState::Armed);
                    debug!("Cooldown over, armed");
                    StepOutcome::Rearmed
                } else {
                    StepOutcome::CoolingDown
                }
            }
            PipelineState::Armed => {
                let Some(offset) = self.shared.dc_offset() else {
                    return StepOutcome::Idle;
                };
                match self.detector.poll(&mut self.sampler, offset) {
                    Some(amplitude) => self.on_trigger(offset, amplitude),
                    None => StepOutcome::Quiet,
                }
            }
        }
    }

    /// Calibrate if needed, then step until `shutdown` is set
    pub fn run(&mut self, shutdown: &AtomicBool) -> Result<()> {
        if self.shared.state() == PipelineState::Idle {
            self.start()?;
        }

        while !shutdown.load(Ordering::SeqCst) {
            match self.step() {
                StepOutcome::Quiet | StepOutcome::Idle => {
                    self.clock.delay_us(self.config.idle_poll_us)
                }
                StepOutcome::CoolingDown => {
                    self.clock.delay_us(self.config.idle_poll_us.max(1_000))
                }
                _ => {}
            }
        }

        info!("Event pipeline stopped");

        Ok(())
    }

    fn on_trigger(&mut self, offset: DcOffset, amplitude: Amplitude) -> StepOutcome {
        if let Err(e) = self.shared.try_begin_capture() {
            warn!("Trigger ignored: {}", e);
            return StepOutcome::Ignored;
        }

        let timestamp = self.clock.now_utc();

        // Nothing else may run on this thread until capture returns
        let result = self
            .engine
            .capture(&mut self.sampler, self.clock.as_ref(), offset, amplitude);

        let outcome = match result {
            Ok(buffer) => {
                info!(
                    "Captured {} samples (trigger amplitude {}, {:.3}s, max lag {}us)",
                    buffer.samples.len(),
                    amplitude,
                    buffer.elapsed_us as f64 / 1_000_000.0,
                    buffer.max_lag_us
                );
                StepOutcome::Captured(self.hand_off(buffer, timestamp))
            }
            Err(e) => {
                error!("Capture failed: {}", e);
                self.shared.record_capture_failure();
                StepOutcome::CaptureFailed
            }
        };

        let cooldown_us = self.config.cooldown_ms.saturating_mul(1_000);
        self.cooldown_until_us = self.clock.micros().saturating_add(cooldown_us);
        self.shared.set_state(PipelineState::Cooldown);

        outcome
    }

    /// Store the buffer, queue a notice, release the buffer
    fn hand_off(&mut self, buffer: CaptureBuffer, timestamp: DateTime<Utc>) -> EventRecord {
        let mut record = EventRecord::from_buffer(&buffer, timestamp);

        match self.store.store(&buffer, timestamp) {
            Ok(handle) => {
                info!("Stored event as {}", handle);
                record.file = Some(handle.clone());

                if let Some(tx) = &self.notices {
                    let notice = EventNotice {
                        handle,
                        trigger_amplitude: buffer.trigger_amplitude,
                        device_id: self.shared.device_id().to_string(),
                        timestamp,
                        sample_rate: buffer.sample_rate,
                        sample_count: buffer.samples.len(),
                        samples: self.config.attach_samples.then_some(buffer.samples),
                    };
                    if tx.send(notice).is_err() {
                        warn!("Notification channel closed, event not announced");
                    }
                }
            }
            Err(e) => {
                error!("Failed to store event: {:#}", e);
                self.shared.record_store_failure();
            }
        }

        self.shared.record_event(record.clone());
        record
    }
}
