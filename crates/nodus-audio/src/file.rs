//! Audio file loading.
//!
//! Files are decoded entirely on the control thread at node construction;
//! the render thread only ever sees a finished sample buffer. Samples are
//! normalized to f32 and stored interleaved stereo regardless of the
//! source layout (mono is duplicated to both channels).

use std::path::Path;

use nodus_core::{ChannelCount, Sample, SampleRate};

use crate::nodes::ConstructionError;

/// A fully decoded audio file, interleaved stereo
#[derive(Debug)]
pub struct SampleBuffer {
    /// Interleaved stereo samples (L, R, L, R, ...)
    pub samples: Vec<Sample>,
    /// Sample rate of the source file
    pub sample_rate: SampleRate,
    /// Channel count of the source file, before stereo conversion
    pub source_channels: ChannelCount,
}

impl SampleBuffer {
    /// Number of stereo frames
    #[must_use]
    pub fn frames(&self) -> usize {
        self.samples.len() / 2
    }
}

/// Load a WAV file and normalize it to interleaved stereo f32.
///
/// Supports 16/24/32-bit integer and 32-bit float encodings. Files with
/// more than two channels are refused; there is no downmix.
pub fn load_wav(path: &Path) -> Result<SampleBuffer, ConstructionError> {
    let unreadable = |source: hound::Error| ConstructionError::UnreadableSource {
        path: path.to_path_buf(),
        source,
    };

    let reader = hound::WavReader::open(path).map_err(unreadable)?;
    let spec = reader.spec();

    let channels = spec.channels as ChannelCount;
    if channels == 0 || channels > 2 {
        return Err(ConstructionError::UnsupportedLayout(channels));
    }

    let raw: Vec<Sample> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .into_samples::<f32>()
            .collect::<Result<_, _>>()
            .map_err(unreadable)?,
        hound::SampleFormat::Int => {
            let scale = (1_i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<Result<_, _>>()
                .map_err(unreadable)?
        }
    };

    let samples = if channels == 1 {
        let mut interleaved = Vec::with_capacity(raw.len() * 2);
        for sample in raw {
            interleaved.push(sample);
            interleaved.push(sample);
        }
        interleaved
    } else {
        raw
    };

    tracing::debug!(
        "Loaded {} ({} frames, {} Hz, {} source channels)",
        path.display(),
        samples.len() / 2,
        spec.sample_rate,
        channels
    );

    Ok(SampleBuffer {
        samples,
        sample_rate: spec.sample_rate,
        source_channels: channels,
    })
}
