use anyhow::{Context, Result};
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// One analog-to-digital conversion result
pub type SampleValue = u16;

/// Single analog input channel
///
/// `read()` never blocks on anything but the conversion itself and never
/// fails: a peripheral that cannot be read is rejected when the sampler is
/// constructed.
pub trait AnalogSampler: Send {
    /// Read one instantaneous value, in `0..=max_value()`
    fn read(&mut self) -> SampleValue;

    /// Full-scale reading for the converter's resolution
    fn max_value(&self) -> SampleValue;

    /// Sampler name for logging
    fn name(&self) -> &str;
}

impl<T: AnalogSampler + ?Sized> AnalogSampler for Box<T> {
    fn read(&mut self) -> SampleValue {
        (**self).read()
    }

    fn max_value(&self) -> SampleValue {
        (**self).max_value()
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// Full-scale value for a converter resolution in bits
pub fn full_scale(resolution_bits: u8) -> SampleValue {
    match resolution_bits {
        0 => 0,
        16..=u8::MAX => u16::MAX,
        bits => (1u16 << bits) - 1,
    }
}

/// Replays a fixed list of readings, then repeats `fallback` forever
#[derive(Debug, Clone)]
pub struct ScriptedSampler {
    script: Vec<SampleValue>,
    position: usize,
    fallback: SampleValue,
    max_value: SampleValue,
    reads: usize,
}

impl ScriptedSampler {
    pub fn new(script: Vec<SampleValue>, fallback: SampleValue) -> Self {
        Self {
            script,
            position: 0,
            fallback,
            max_value: full_scale(12),
            reads: 0,
        }
    }

    /// A sampler that always reads `value`
    pub fn constant(value: SampleValue) -> Self {
        Self::new(Vec::new(), value)
    }

    pub fn with_resolution(mut self, resolution_bits: u8) -> Self {
        self.max_value = full_scale(resolution_bits);
        self
    }

    /// Queue more readings after whatever is still pending
    pub fn push(&mut self, values: &[SampleValue]) {
        self.script.extend_from_slice(values);
    }

    /// Total number of `read()` calls so far
    pub fn reads(&self) -> usize {
        self.reads
    }
}

impl AnalogSampler for ScriptedSampler {
    fn read(&mut self) -> SampleValue {
        self.reads += 1;
        let value = match self.script.get(self.position) {
            Some(&v) => {
                self.position += 1;
                v
            }
            None => self.fallback,
        };
        value.min(self.max_value)
    }

    fn max_value(&self) -> SampleValue {
        self.max_value
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// Linux Industrial I/O ADC channel (`/sys/bus/iio/devices/iio:deviceN/in_voltageM_raw`)
pub struct IioSampler {
    path: PathBuf,
    file: File,
    buf: [u8; 16],
    last: SampleValue,
    max_value: SampleValue,
    read_error_logged: bool,
}

impl IioSampler {
    /// Open the channel and take one reading to prove it works
    pub fn open(path: impl AsRef<Path>, resolution_bits: u8) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        info!("Opening IIO channel: {}", path.display());

        let file = File::open(&path)
            .with_context(|| format!("Failed to open ADC channel {:?}", path))?;

        let mut sampler = Self {
            path,
            file,
            buf: [0; 16],
            last: 0,
            max_value: full_scale(resolution_bits),
            read_error_logged: false,
        };

        let first = sampler
            .read_raw()
            .with_context(|| format!("ADC channel {:?} returned no reading", sampler.path))?;
        sampler.last = first;

        info!("IIO channel ready (first reading {})", first);

        Ok(sampler)
    }

    fn read_raw(&mut self) -> Result<SampleValue> {
        self.file.seek(SeekFrom::Start(0))?;
        let n = self.file.read(&mut self.buf)?;
        let text = std::str::from_utf8(&self.buf[..n])?;
        let value: u32 = text.trim().parse().context("Malformed ADC reading")?;
        Ok(value.min(self.max_value as u32) as SampleValue)
    }
}

impl AnalogSampler for IioSampler {
    fn read(&mut self) -> SampleValue {
        match self.read_raw() {
            Ok(value) => {
                self.last = value;
                value
            }
            Err(e) => {
                if !self.read_error_logged {
                    warn!("ADC read failed on {:?}, repeating last value: {}", self.path, e);
                    self.read_error_logged = true;
                }
                self.last
            }
        }
    }

    fn max_value(&self) -> SampleValue {
        self.max_value
    }

    fn name(&self) -> &str {
        "iio"
    }
}
