use std::path::Path;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum WavError {
    #[error("failed to write wav file: {0}")]
    Write(#[source] hound::Error),
    #[error("failed to read wav file: {0}")]
    Read(#[source] hound::Error),
}

fn spec(sample_rate: u32) -> hound::WavSpec {
    hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    }
}

/// Write mono 16-bit PCM samples to a WAV file.
pub fn write_wav(path: &Path, samples: &[i16], sample_rate: u32) -> Result<(), WavError> {
    let mut writer = hound::WavWriter::create(path, spec(sample_rate)).map_err(WavError::Write)?;
    for &sample in samples {
        writer.write_sample(sample).map_err(WavError::Write)?;
    }
    writer.finalize().map_err(WavError::Write)
}

/// Read a mono 16-bit WAV file back into samples and its sample rate.
pub fn read_wav(path: &Path) -> Result<(Vec<i16>, u32), WavError> {
    let mut reader = hound::WavReader::open(path).map_err(WavError::Read)?;
    let sample_rate = reader.spec().sample_rate;
    let samples: Result<Vec<i16>, hound::Error> = reader.samples::<i16>().collect();
    Ok((samples.map_err(WavError::Read)?, sample_rate))
}

/// Duration in seconds implied by a sample count and rate.
pub fn duration_s(sample_count: usize, sample_rate: u32) -> f64 {
    if sample_rate == 0 {
        return 0.0;
    }
    sample_count as f64 / sample_rate as f64
}
