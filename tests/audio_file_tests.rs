// Integration tests for stored event recordings
//
// These tests verify that captures written by the WAV store read back
// exactly through AudioFile.

use acoustic_trigger::audio::{AudioFile, CaptureBuffer};
use acoustic_trigger::storage::{EventStore, WavStore};
use anyhow::Result;
use chrono::{TimeZone, Utc};
use tempfile::TempDir;

fn capture(samples: Vec<i16>, sample_rate: u32) -> CaptureBuffer {
    CaptureBuffer {
        samples,
        sample_rate,
        trigger_amplitude: 552,
        started_at_us: 0,
        elapsed_us: 3_000_000,
        max_lag_us: 2,
    }
}

#[test]
fn test_audio_file_open_stored_event() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let mut store = WavStore::new(temp_dir.path(), "sensor-1")?;
    let timestamp = Utc.with_ymd_and_hms(2025, 10, 27, 14, 30, 0).unwrap();

    let name = store.store(&capture(vec![0; 24000], 8000), timestamp)?;
    let audio = AudioFile::open(temp_dir.path().join(&name))?;

    assert_eq!(audio.sample_rate, 8000);
    assert_eq!(audio.channels, 1);
    assert_eq!(audio.samples.len(), 24000);
    assert!((audio.duration_seconds - 3.0).abs() < f64::EPSILON);
    assert!(audio.path.contains("sensor-1_20251027-143000.wav"));

    Ok(())
}

#[test]
fn test_stored_samples_round_trip_exactly() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let mut store = WavStore::new(temp_dir.path(), "sensor-1")?;

    // Full 12-bit swing at gain 8
    let samples: Vec<i16> = (0..24000)
        .map(|i| (((i % 4096) - 2048) * 8) as i16)
        .collect();

    let name = store.store(&capture(samples.clone(), 8000), Utc::now())?;
    let loaded = store.load(&name)?;

    assert_eq!(loaded.len(), samples.len());
    assert_eq!(loaded, samples);

    Ok(())
}

#[test]
fn test_audio_file_peak() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let mut store = WavStore::new(temp_dir.path(), "sensor-1")?;

    let name = store.store(&capture(vec![10, -300, 299, i16::MIN], 8000), Utc::now())?;
    let audio = AudioFile::open(temp_dir.path().join(&name))?;

    assert_eq!(audio.peak(), 32768);

    Ok(())
}

#[test]
fn test_audio_file_nonexistent() {
    let result = AudioFile::open("/nonexistent/path/to/audio.wav");

    assert!(result.is_err(), "Opening nonexistent file should fail");
}

#[test]
fn test_audio_file_rejects_float_wav() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let path = temp_dir.path().join("float.wav");
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: 8000,
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    };
    let mut writer = hound::WavWriter::create(&path, spec)?;
    writer.write_sample(0.5f32)?;
    writer.finalize()?;

    assert!(AudioFile::open(&path).is_err());

    Ok(())
}
