use anyhow::{Context, Result};
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use crate::audio::AudioConfig;

/// Write captured PCM chunks, in order, to a 16-bit WAV file.
///
/// Returns the number of samples (across all channels) written.
pub fn write_wav(path: &Path, chunks: &[Vec<u8>], config: &AudioConfig) -> Result<usize> {
    let spec = hound::WavSpec {
        channels: config.channels,
        sample_rate: config.sample_rate,
        bits_per_sample: config.sample_format.bits_per_sample(),
        sample_format: hound::SampleFormat::Int,
    };

    let mut writer: hound::WavWriter<BufWriter<File>> = hound::WavWriter::create(path, spec)
        .with_context(|| format!("Failed to create WAV file: {:?}", path))?;

    let mut written = 0;
    for chunk in chunks {
        // A trailing odd byte cannot form a sample
        for bytes in chunk.chunks_exact(2) {
            writer
                .write_sample(i16::from_le_bytes([bytes[0], bytes[1]]))
                .context("Failed to write sample to WAV")?;
            written += 1;
        }
    }

    writer.finalize().context("Failed to finalize WAV file")?;
    Ok(written)
}
