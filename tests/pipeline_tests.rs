// End-to-end tests for the event pipeline
//
// A scripted analog input drives calibration, triggering and capture; the
// real WAV store persists the result and the notice channel carries the
// announcement.

use acoustic_trigger::audio::{CaptureSettings, ScriptedSampler};
use acoustic_trigger::clock::ManualClock;
use acoustic_trigger::event::{
    EventPipeline, PipelineConfig, PipelineShared, PipelineState, StepOutcome,
};
use acoustic_trigger::storage::WavStore;
use anyhow::Result;
use std::sync::Arc;
use tempfile::TempDir;
use tokio::sync::mpsc;

fn reference_config() -> PipelineConfig {
    PipelineConfig {
        capture: CaptureSettings {
            sample_rate: 8000,
            duration_secs: 3,
            gain: 8,
        },
        threshold: 500,
        calibration_samples: 1024,
        calibration_delay_us: 100,
        cooldown_ms: 2000,
        idle_poll_us: 0,
        attach_samples: false,
    }
}

#[test]
fn test_reference_scenario_end_to_end() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let store = WavStore::new(temp_dir.path(), "sensor-1")?;
    let clock = ManualClock::new(1);
    let shared = Arc::new(PipelineShared::new("sensor-1"));
    let (tx, mut rx) = mpsc::unbounded_channel();

    let mut pipeline = EventPipeline::new(
        reference_config(),
        ScriptedSampler::constant(2048),
        Box::new(clock.clone()),
        Box::new(store.clone()),
        Arc::clone(&shared),
    )
    .with_notifications(tx);

    assert_eq!(pipeline.start()?, 2048);

    // Below threshold: 2400 - 2048 = 352
    pipeline.sampler_mut().push(&[2400]);
    assert_eq!(pipeline.step(), StepOutcome::Quiet);
    assert_eq!(shared.state(), PipelineState::Armed);

    // Above threshold: 2600 - 2048 = 552, followed by the captured waveform
    let waveform: Vec<u16> = (0..24000).map(|i| 1024 + (i % 2048) as u16).collect();
    pipeline.sampler_mut().push(&[2600]);
    pipeline.sampler_mut().push(&waveform);

    let StepOutcome::Captured(record) = pipeline.step() else {
        panic!("expected a capture");
    };
    assert_eq!(record.amplitude, 552);
    assert_eq!(record.samples, 24000);

    let notice = rx.try_recv()?;
    assert_eq!(notice.trigger_amplitude, 552);
    assert_eq!(notice.device_id, "sensor-1");
    assert_eq!(Some(notice.handle.clone()), record.file);

    let stored = store.load(&notice.handle)?;
    assert_eq!(stored.len(), 24000);
    for (raw, scaled) in waveform.iter().zip(&stored) {
        assert_eq!(*scaled as i32, (*raw as i32 - 2048) * 8);
    }

    assert_eq!(shared.state(), PipelineState::Cooldown);
    assert_eq!(shared.stats().events_captured, 1);

    Ok(())
}

#[test]
fn test_repeated_loud_events_respect_cooldown() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let store = WavStore::new(temp_dir.path(), "sensor-1")?;
    let clock = ManualClock::new(1);
    let shared = Arc::new(PipelineShared::new("sensor-1"));

    let mut config = reference_config();
    config.capture.duration_secs = 1;

    let mut pipeline = EventPipeline::new(
        config,
        ScriptedSampler::constant(2048),
        Box::new(clock.clone()),
        Box::new(store.clone()),
        Arc::clone(&shared),
    );
    pipeline.start()?;

    // Continuous loud input from here on
    pipeline.sampler_mut().push(&[4000; 40_000]);

    assert!(matches!(pipeline.step(), StepOutcome::Captured(_)));

    // 1.5s of cooldown steps: nothing new may start
    clock.advance(1_500_000);
    assert_eq!(pipeline.step(), StepOutcome::CoolingDown);
    assert_eq!(shared.stats().events_captured, 1);

    clock.advance(500_000);
    assert_eq!(pipeline.step(), StepOutcome::Rearmed);
    assert!(matches!(pipeline.step(), StepOutcome::Captured(_)));
    assert_eq!(shared.stats().events_captured, 2);

    assert_eq!(store.list()?.len(), 2);

    Ok(())
}
