// In-memory audio primitives
//
// - AudioClip: mono f32 PCM with millisecond-based slicing, loudness and
//   overlay operations, plus WAV I/O through hound
// - silence: silence detection and splitting

pub mod silence;

use std::io::Cursor;
use std::path::Path;

use crate::error::{DubError, Result};

/// Mono PCM audio, samples in [-1.0, 1.0]
#[derive(Debug, Clone, PartialEq)]
pub struct AudioClip {
    samples: Vec<f32>,
    sample_rate: u32,
}

impl AudioClip {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self { samples, sample_rate }
    }

    pub fn silent(duration_ms: u64, sample_rate: u32) -> Self {
        let len = ms_to_samples(duration_ms, sample_rate);
        Self::new(vec![0.0; len], sample_rate)
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }

    pub fn duration_ms(&self) -> u64 {
        (self.duration_secs() * 1000.0).round() as u64
    }

    /// Copy of the `[start_ms, end_ms)` range, clamped to the clip
    pub fn slice_ms(&self, start_ms: u64, end_ms: u64) -> Self {
        let start = ms_to_samples(start_ms, self.sample_rate).min(self.samples.len());
        let end = ms_to_samples(end_ms, self.sample_rate).clamp(start, self.samples.len());
        Self::new(self.samples[start..end].to_vec(), self.sample_rate)
    }

    /// Concatenate clips that share this clip's sample rate
    pub fn concat(parts: &[&AudioClip], sample_rate: u32) -> Self {
        let samples = parts
            .iter()
            .flat_map(|p| p.samples.iter().copied())
            .collect();
        Self::new(samples, sample_rate)
    }

    /// Surround with equal silence on both ends
    pub fn padded(&self, padding_ms: u64) -> Self {
        let pad = AudioClip::silent(padding_ms, self.sample_rate);
        AudioClip::concat(&[&pad, self, &pad], self.sample_rate)
    }

    pub fn rms(&self) -> f64 {
        rms(&self.samples)
    }

    /// Loudness relative to full scale; `-inf` for silence
    pub fn dbfs(&self) -> f64 {
        amplitude_to_db(self.rms())
    }

    pub fn peak_dbfs(&self) -> f64 {
        let peak = self
            .samples
            .iter()
            .fold(0.0f32, |acc, s| acc.max(s.abs()));
        amplitude_to_db(peak as f64)
    }

    pub fn apply_gain(&self, gain_db: f64) -> Self {
        let factor = db_to_amplitude(gain_db) as f32;
        let samples = self
            .samples
            .iter()
            .map(|s| (s * factor).clamp(-1.0, 1.0))
            .collect();
        Self::new(samples, self.sample_rate)
    }

    /// Scale so the peak sits `headroom_db` below full scale. Silence is returned as-is.
    pub fn normalize_peak(&self, headroom_db: f64) -> Self {
        let peak = self.peak_dbfs();
        if !peak.is_finite() {
            return self.clone();
        }
        self.apply_gain(-headroom_db - peak)
    }

    /// Scale so the RMS loudness equals `target_dbfs`. Silence is returned as-is.
    pub fn normalize_loudness(&self, target_dbfs: f64) -> Self {
        let current = self.dbfs();
        if !current.is_finite() {
            return self.clone();
        }
        self.apply_gain(target_dbfs - current)
    }

    /// Mix `other` into this clip starting at `position_ms`. The result keeps
    /// this clip's length; anything past its end is dropped.
    pub fn overlay(&mut self, other: &AudioClip, position_ms: u64) {
        let other = if other.sample_rate == self.sample_rate {
            std::borrow::Cow::Borrowed(other)
        } else {
            std::borrow::Cow::Owned(other.resample(self.sample_rate))
        };

        let offset = ms_to_samples(position_ms, self.sample_rate);
        if offset >= self.samples.len() {
            return;
        }
        for (dst, src) in self.samples[offset..].iter_mut().zip(other.samples.iter()) {
            *dst = (*dst + *src).clamp(-1.0, 1.0);
        }
    }

    /// Play back `speed_factor` times faster by resampling, shortening the clip
    /// by the same factor. Pitch shifts along with tempo.
    pub fn change_speed(&self, speed_factor: f64) -> Self {
        if speed_factor <= 0.0 || !speed_factor.is_finite() {
            return self.clone();
        }
        let target_len = (self.samples.len() as f64 / speed_factor).round() as usize;
        Self::new(interpolate(&self.samples, target_len), self.sample_rate)
    }

    /// Convert to another sample rate keeping duration
    pub fn resample(&self, sample_rate: u32) -> Self {
        if sample_rate == self.sample_rate || self.sample_rate == 0 {
            return Self::new(self.samples.clone(), sample_rate);
        }
        let ratio = sample_rate as f64 / self.sample_rate as f64;
        let target_len = (self.samples.len() as f64 * ratio).round() as usize;
        Self::new(interpolate(&self.samples, target_len), sample_rate)
    }

    /// Read a WAV file, down-mixing to mono
    pub fn read_wav<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let reader = hound::WavReader::open(path).map_err(|e| match e {
            hound::Error::IoError(io) if io.kind() == std::io::ErrorKind::NotFound => {
                DubError::FileNotFound(path.display().to_string())
            }
            other => DubError::Wav(other),
        })?;
        Self::from_reader(reader)
    }

    /// Decode an in-memory WAV byte stream
    pub fn decode_wav(bytes: &[u8]) -> Result<Self> {
        let reader = hound::WavReader::new(Cursor::new(bytes))?;
        Self::from_reader(reader)
    }

    fn from_reader<R: std::io::Read>(reader: hound::WavReader<R>) -> Result<Self> {
        let spec = reader.spec();
        let channels = spec.channels.max(1) as usize;

        let samples: Vec<f32> = match spec.sample_format {
            hound::SampleFormat::Int => {
                let max_val = (1i64 << (spec.bits_per_sample - 1)) as f32;
                reader
                    .into_samples::<i32>()
                    .map(|s| s.map(|v| v as f32 / max_val))
                    .collect::<std::result::Result<_, _>>()?
            }
            hound::SampleFormat::Float => reader
                .into_samples::<f32>()
                .collect::<std::result::Result<_, _>>()?,
        };

        let mono = if channels > 1 {
            samples
                .chunks(channels)
                .map(|frame| frame.iter().sum::<f32>() / channels as f32)
                .collect()
        } else {
            samples
        };

        Ok(Self::new(mono, spec.sample_rate))
    }

    /// Write as single-channel 16-bit PCM
    pub fn write_wav<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: self.sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path.as_ref(), spec)?;
        for &sample in &self.samples {
            let value = (sample.clamp(-1.0, 1.0) * i16::MAX as f32).round() as i16;
            writer.write_sample(value)?;
        }
        writer.finalize()?;
        Ok(())
    }

    /// Encode as an in-memory 16-bit PCM WAV byte stream
    pub fn encode_wav(&self) -> Result<Vec<u8>> {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: self.sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec)?;
            for &sample in &self.samples {
                let value = (sample.clamp(-1.0, 1.0) * i16::MAX as f32).round() as i16;
                writer.write_sample(value)?;
            }
            writer.finalize()?;
        }
        Ok(cursor.into_inner())
    }
}

pub fn ms_to_samples(ms: u64, sample_rate: u32) -> usize {
    (ms as u128 * sample_rate as u128 / 1000) as usize
}

pub fn rms(samples: &[f32]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum: f64 = samples.iter().map(|&s| (s as f64) * (s as f64)).sum();
    (sum / samples.len() as f64).sqrt()
}

pub fn amplitude_to_db(amplitude: f64) -> f64 {
    if amplitude <= 0.0 {
        return f64::NEG_INFINITY;
    }
    20.0 * amplitude.log10()
}

pub fn db_to_amplitude(db: f64) -> f64 {
    10f64.powf(db / 20.0)
}

/// Linear interpolation of `input` onto `target_len` evenly spaced points
fn interpolate(input: &[f32], target_len: usize) -> Vec<f32> {
    if input.is_empty() || target_len == 0 {
        return Vec::new();
    }
    if input.len() == 1 {
        return vec![input[0]; target_len];
    }
    let step = input.len() as f64 / target_len as f64;
    (0..target_len)
        .map(|i| {
            let pos = i as f64 * step;
            let idx = pos.floor() as usize;
            let frac = (pos - idx as f64) as f32;
            let a = input[idx.min(input.len() - 1)];
            let b = input[(idx + 1).min(input.len() - 1)];
            a + (b - a) * frac
        })
        .collect()
}

#[cfg(test)]
pub(crate) fn tone(duration_ms: u64, sample_rate: u32, frequency: f64, amplitude: f32) -> AudioClip {
    let len = ms_to_samples(duration_ms, sample_rate);
    let samples = (0..len)
        .map(|i| {
            let t = i as f64 / sample_rate as f64;
            amplitude * (2.0 * std::f64::consts::PI * frequency * t).sin() as f32
        })
        .collect();
    AudioClip::new(samples, sample_rate)
}
