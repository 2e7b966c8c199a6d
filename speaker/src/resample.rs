//! Sample rate conversion to the fixed analysis rate.
//!
//! Uses rubato's FFT resampler, a pure Rust implementation without FFI
//! dependencies. Input is whole-buffer mono f32; the tail chunk is
//! zero-padded and the output truncated to the exact converted length.

use rubato::{FftFixedInOut, Resampler};

use crate::error::ExtractionError;

/// The fixed analysis rate every waveform is converted to before framing.
pub const ANALYSIS_RATE: u32 = 16_000;

/// Frames per processing block fed to rubato.
const CHUNK_SIZE: usize = 1024;

/// Converts a mono waveform from `src_rate` to the 16 kHz analysis rate.
///
/// Returns the input unchanged (copied) when it is already at the analysis
/// rate. The output length is `len * 16000 / src_rate`, rounded down.
pub fn to_analysis_rate(samples: &[f32], src_rate: u32) -> Result<Vec<f32>, ExtractionError> {
    if src_rate == 0 {
        return Err(ExtractionError::InvalidSampleRate(src_rate));
    }
    if src_rate == ANALYSIS_RATE || samples.is_empty() {
        return Ok(samples.to_vec());
    }

    let mut resampler =
        FftFixedInOut::<f32>::new(src_rate as usize, ANALYSIS_RATE as usize, CHUNK_SIZE, 1)
            .map_err(|e| ExtractionError::Resample(e.to_string()))?;

    let expected =
        ((samples.len() as u64 * ANALYSIS_RATE as u64) / src_rate as u64) as usize;
    let mut out = Vec::with_capacity(expected + CHUNK_SIZE);
    let mut input = vec![Vec::new()];

    let mut pos = 0;
    while pos < samples.len() {
        let need = resampler.input_frames_next();
        let end = (pos + need).min(samples.len());
        input[0].clear();
        input[0].extend_from_slice(&samples[pos..end]);
        input[0].resize(need, 0.0); // zero-pad the tail chunk
        let chunks = resampler
            .process(&input, None)
            .map_err(|e| ExtractionError::Resample(e.to_string()))?;
        out.extend_from_slice(&chunks[0]);
        pos = end;
    }

    out.truncate(expected);
    Ok(out)
}
