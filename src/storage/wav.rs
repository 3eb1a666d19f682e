use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::audio::{AudioFile, CaptureBuffer};

/// Storage collaborator: persists a finished capture and returns a handle
pub trait EventStore: Send {
    /// Persist `buffer`; the returned handle identifies it for notification
    fn store(&mut self, buffer: &CaptureBuffer, timestamp: DateTime<Utc>) -> Result<String>;
}

/// One stored recording
#[derive(Debug, Clone, Serialize)]
pub struct RecordingEntry {
    pub name: String,
    pub size_bytes: u64,
    pub modified: DateTime<Utc>,
}

/// Writes each capture to its own mono 16-bit WAV file
#[derive(Debug, Clone)]
pub struct WavStore {
    dir: PathBuf,
    device_id: String,
    max_recordings: Option<usize>,
}

impl WavStore {
    pub fn new(dir: impl Into<PathBuf>, device_id: impl Into<String>) -> Result<Self> {
        let dir = dir.into();

        // Create output directory if it doesn't exist
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create recordings directory {:?}", dir))?;

        info!("Recordings directory: {}", dir.display());

        Ok(Self {
            dir,
            device_id: device_id.into(),
            max_recordings: None,
        })
    }

    /// Keep at most `max` recordings, deleting the oldest after each store
    pub fn with_max_recordings(mut self, max: Option<usize>) -> Self {
        self.max_recordings = max;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Resolve a recording name to a path inside the store
    pub fn path_for(&self, name: &str) -> Result<PathBuf> {
        validate_name(name)?;
        Ok(self.dir.join(name))
    }

    /// Read a stored recording's samples back
    pub fn load(&self, name: &str) -> Result<Vec<i16>> {
        let path = self.path_for(name)?;
        let file = AudioFile::open(&path)?;
        Ok(file.samples)
    }

    /// All recordings, newest first
    pub fn list(&self) -> Result<Vec<RecordingEntry>> {
        let mut entries = Vec::new();

        for entry in fs::read_dir(&self.dir).context("Failed to read recordings directory")? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if !name.ends_with(".wav") {
                continue;
            }

            let meta = entry.metadata()?;
            if !meta.is_file() {
                continue;
            }

            let modified = meta
                .modified()
                .map(DateTime::<Utc>::from)
                .unwrap_or_default();

            entries.push(RecordingEntry {
                name,
                size_bytes: meta.len(),
                modified,
            });
        }

        entries.sort_by(|a, b| b.modified.cmp(&a.modified).then_with(|| b.name.cmp(&a.name)));

        Ok(entries)
    }

    pub fn remove(&self, name: &str) -> Result<()> {
        let path = self.path_for(name)?;
        fs::remove_file(&path).with_context(|| format!("Failed to remove {:?}", path))?;
        info!("Removed recording {}", name);
        Ok(())
    }

    fn unique_name(&self, timestamp: DateTime<Utc>) -> String {
        let stem = format!("{}_{}", self.device_id, timestamp.format("%Y%m%d-%H%M%S"));
        let mut name = format!("{}.wav", stem);
        let mut n = 1;
        while self.dir.join(&name).exists() {
            name = format!("{}-{}.wav", stem, n);
            n += 1;
        }
        name
    }

    /// Delete the oldest recordings beyond the limit; `keep` is never removed
    fn prune(&self, keep: &str) -> Result<()> {
        let Some(max) = self.max_recordings else {
            return Ok(());
        };

        let entries = self.list()?;
        let others = entries.iter().filter(|entry| entry.name != keep);
        for old in others.skip(max.saturating_sub(1)) {
            if let Err(e) = self.remove(&old.name) {
                warn!("Failed to prune {}: {}", old.name, e);
            }
        }

        Ok(())
    }
}

impl EventStore for WavStore {
    fn store(&mut self, buffer: &CaptureBuffer, timestamp: DateTime<Utc>) -> Result<String> {
        let name = self.unique_name(timestamp);
        let path = self.dir.join(&name);

        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: buffer.sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };

        let file = File::create(&path)
            .with_context(|| format!("Failed to create WAV file: {:?}", path))?;
        let mut writer = hound::WavWriter::new(BufWriter::new(file), spec)
            .with_context(|| format!("Failed to create WAV file: {:?}", path))?;

        for &sample in &buffer.samples {
            writer.write_sample(sample)
                .context("Failed to write sample to WAV")?;
        }

        writer.finalize().context("Failed to finalize WAV file")?;

        debug!("Recording saved to {}", path.display());

        if let Err(e) = self.prune(&name) {
            warn!("Failed to prune old recordings: {}", e);
        }

        Ok(name)
    }
}

fn validate_name(name: &str) -> Result<()> {
    if name.is_empty()
        || name.contains('/')
        || name.contains('\\')
        || name.contains("..")
        || name.starts_with('.')
    {
        anyhow::bail!("Invalid recording name: {:?}", name);
    }
    Ok(())
}
