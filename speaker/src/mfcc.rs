use std::f64::consts::PI;

use crate::error::ExtractionError;
use crate::resample::{to_analysis_rate, ANALYSIS_RATE};
use crate::FeatureMatrix;

/// Configures MFCC feature extraction.
///
/// Defaults produce the 39-dimensional features used for speaker profiles:
/// 13 cepstral coefficients per 25ms frame (10ms shift) over a 26-channel
/// mel filterbank, plus first- and second-order deltas. Frame sizes are in
/// samples at the fixed 16 kHz analysis rate.
///
/// Changing any of these invalidates every stored profile: the feature
/// dimensionality and scale are baked into the trained model.
#[derive(Debug, Clone)]
pub struct MfccConfig {
    /// Cepstral coefficients kept per frame (default: 13).
    pub num_ceps: usize,
    /// Number of mel filterbank channels (default: 26).
    pub num_mels: usize,
    /// Frame length in samples (default: 400 = 25ms @ 16kHz).
    pub frame_length: usize,
    /// Frame shift in samples (default: 160 = 10ms @ 16kHz).
    pub frame_shift: usize,
    /// Pre-emphasis coefficient (default: 0.97).
    pub pre_emphasis: f64,
    /// Floor for mel energies before the log (default: 1e-10).
    pub energy_floor: f64,
    /// Low cutoff frequency for mel bins (default: 20 Hz).
    pub low_freq: f64,
    /// High cutoff frequency, negative = offset from Nyquist (default: -400).
    pub high_freq: f64,
    /// Remove DC offset per frame (default: true).
    pub remove_dc: bool,
    /// Regression half-window for delta features (default: 2 frames).
    pub delta_window: usize,
}

impl Default for MfccConfig {
    fn default() -> Self {
        Self {
            num_ceps: 13,
            num_mels: 26,
            frame_length: 400, // 25ms @ 16kHz
            frame_shift: 160,  // 10ms @ 16kHz
            pre_emphasis: 0.97,
            energy_floor: 1e-10,
            low_freq: 20.0,
            high_freq: -400.0, // Nyquist - 400 = 7600 Hz
            remove_dc: true,
            delta_window: 2,
        }
    }
}

impl MfccConfig {
    /// Dimensionality of the produced feature rows: cepstra + deltas +
    /// delta-deltas.
    pub fn dimension(&self) -> usize {
        3 * self.num_ceps
    }
}

/// Extracts MFCC features from a mono waveform.
///
/// Input: f32 samples in [-1, 1] at `sample_rate` Hz. Anything other than
/// the 16 kHz analysis rate is resampled first. Output: one row of
/// `cfg.dimension()` values per analysis frame, in temporal order.
///
/// Pure function of the input signal; no side effects.
pub fn extract(
    samples: &[f32],
    sample_rate: u32,
    cfg: &MfccConfig,
) -> Result<FeatureMatrix, ExtractionError> {
    assert!(
        cfg.frame_length > 0 && cfg.frame_shift > 0,
        "mfcc: frame sizes must be positive"
    );
    assert!(
        cfg.num_ceps > 0 && cfg.num_mels >= cfg.num_ceps,
        "mfcc: need at least as many mel channels as cepstra"
    );

    if sample_rate == 0 {
        return Err(ExtractionError::InvalidSampleRate(sample_rate));
    }
    if samples.is_empty() {
        return Err(ExtractionError::EmptySignal);
    }
    if let Some(i) = samples.iter().position(|s| !s.is_finite()) {
        return Err(ExtractionError::NonFinite(i));
    }

    let samples = if sample_rate == ANALYSIS_RATE {
        samples.to_vec()
    } else {
        to_analysis_rate(samples, sample_rate)?
    };

    let n_samples = samples.len();
    if n_samples < cfg.frame_length {
        return Err(ExtractionError::TooShort {
            min_samples: cfg.frame_length,
            got_samples: n_samples,
        });
    }

    let cepstra = compute_cepstra(&samples, cfg);

    // Append delta and delta-delta coefficients.
    let window = cfg.delta_window.max(1);
    let d1 = deltas(&cepstra, window);
    let d2 = deltas(&d1, window);

    let mut features = Vec::with_capacity(cepstra.len());
    for ((c, v), a) in cepstra.into_iter().zip(d1).zip(d2) {
        let mut row = Vec::with_capacity(3 * c.len());
        row.extend_from_slice(&c);
        row.extend_from_slice(&v);
        row.extend_from_slice(&a);
        features.push(row);
    }
    Ok(features)
}

/// Computes the base cepstral coefficients, one row per frame.
/// The input must be at the analysis rate and at least one frame long.
fn compute_cepstra(samples: &[f32], cfg: &MfccConfig) -> Vec<Vec<f32>> {
    let n_samples = samples.len();
    let num_frames = (n_samples - cfg.frame_length) / cfg.frame_shift + 1;

    // FFT size: next power of 2 >= frame_length.
    let fft_size = next_pow2(cfg.frame_length);
    let half_fft = fft_size / 2 + 1;

    let window = povey_window(cfg.frame_length);

    // Resolve high frequency.
    let high_freq = if cfg.high_freq <= 0.0 {
        ANALYSIS_RATE as f64 / 2.0 + cfg.high_freq
    } else {
        cfg.high_freq
    };

    let filterbank = mel_filterbank(cfg.num_mels, fft_size, cfg.low_freq, high_freq);
    let dct = dct_matrix(cfg.num_ceps, cfg.num_mels);

    let mut result = Vec::with_capacity(num_frames);
    let mut fft_buf = vec![(0.0f64, 0.0f64); fft_size];
    let mut frame_buf = vec![0.0f64; cfg.frame_length];

    for f in 0..num_frames {
        let offset = f * cfg.frame_shift;
        for (i, v) in frame_buf.iter_mut().enumerate() {
            *v = samples[offset + i] as f64;
        }

        // Remove DC offset.
        if cfg.remove_dc {
            let mean: f64 = frame_buf.iter().sum::<f64>() / cfg.frame_length as f64;
            for v in &mut frame_buf {
                *v -= mean;
            }
        }

        // Pre-emphasis (applied per frame after DC removal).
        if cfg.pre_emphasis > 0.0 {
            for i in (1..cfg.frame_length).rev() {
                frame_buf[i] -= cfg.pre_emphasis * frame_buf[i - 1];
            }
            frame_buf[0] *= 1.0 - cfg.pre_emphasis;
        }

        // Apply window and zero-pad to FFT size.
        for v in &mut fft_buf {
            *v = (0.0, 0.0);
        }
        for i in 0..cfg.frame_length {
            fft_buf[i] = (frame_buf[i] * window[i], 0.0);
        }

        fft(&mut fft_buf);

        // Power spectrum: |X[k]|^2.
        let mut power_spec = vec![0.0f64; half_fft];
        for k in 0..half_fft {
            let (re, im) = fft_buf[k];
            power_spec[k] = re * re + im * im;
        }

        // Log mel energies.
        let mut log_mel = vec![0.0f64; cfg.num_mels];
        for m in 0..cfg.num_mels {
            let mut energy: f64 = 0.0;
            for (k, &w) in filterbank[m].iter().enumerate() {
                energy += w * power_spec[k];
            }
            if energy < cfg.energy_floor {
                energy = cfg.energy_floor;
            }
            log_mel[m] = energy.ln();
        }

        // DCT-II to cepstra.
        let mut ceps = vec![0.0f32; cfg.num_ceps];
        for k in 0..cfg.num_ceps {
            let mut acc: f64 = 0.0;
            for m in 0..cfg.num_mels {
                acc += dct[k][m] * log_mel[m];
            }
            ceps[k] = acc as f32;
        }
        result.push(ceps);
    }
    result
}

/// Regression deltas over a +/-`window` frame neighborhood, edges
/// replicated. Output has the same shape as the input.
fn deltas(feats: &[Vec<f32>], window: usize) -> Vec<Vec<f32>> {
    let t_max = feats.len();
    if t_max == 0 {
        return Vec::new();
    }
    let dim = feats[0].len();
    let denom: f64 = 2.0 * (1..=window).map(|n| (n * n) as f64).sum::<f64>();

    let mut out = vec![vec![0.0f32; dim]; t_max];
    for t in 0..t_max {
        for d in 0..dim {
            let mut acc: f64 = 0.0;
            for n in 1..=window {
                let fwd = feats[(t + n).min(t_max - 1)][d] as f64;
                let back = feats[t.saturating_sub(n)][d] as f64;
                acc += n as f64 * (fwd - back);
            }
            out[t][d] = (acc / denom) as f32;
        }
    }
    out
}

/// Orthonormal DCT-II matrix, `num_ceps` x `num_mels`.
fn dct_matrix(num_ceps: usize, num_mels: usize) -> Vec<Vec<f64>> {
    let mut dct = vec![vec![0.0f64; num_mels]; num_ceps];
    let m = num_mels as f64;
    for k in 0..num_ceps {
        let scale = if k == 0 {
            (1.0 / m).sqrt()
        } else {
            (2.0 / m).sqrt()
        };
        for j in 0..num_mels {
            dct[k][j] = scale * (PI * k as f64 * (j as f64 + 0.5) / m).cos();
        }
    }
    dct
}

fn next_pow2(n: usize) -> usize {
    let mut p = 1;
    while p < n {
        p <<= 1;
    }
    p
}

fn hamming_window(n: usize) -> Vec<f64> {
    (0..n)
        .map(|i| 0.54 - 0.46 * (2.0 * PI * i as f64 / (n - 1) as f64).cos())
        .collect()
}

/// Povey window (hamming^0.85) used by Kaldi.
fn povey_window(n: usize) -> Vec<f64> {
    hamming_window(n).into_iter().map(|w| w.powf(0.85)).collect()
}

fn hz_to_mel(hz: f64) -> f64 {
    2595.0 * (1.0 + hz / 700.0).log10()
}

fn mel_to_hz(mel: f64) -> f64 {
    700.0 * (10.0_f64.powf(mel / 2595.0) - 1.0)
}

/// Computes triangular mel filterbank weights at the analysis rate.
/// Returns `[num_mels][half_fft]` weights.
fn mel_filterbank(num_mels: usize, fft_size: usize, low_freq: f64, high_freq: f64) -> Vec<Vec<f64>> {
    let half_fft = fft_size / 2 + 1;
    let mel_low = hz_to_mel(low_freq);
    let mel_high = hz_to_mel(high_freq);

    // Equally spaced mel points.
    let mel_points: Vec<f64> = (0..num_mels + 2)
        .map(|i| mel_low + i as f64 * (mel_high - mel_low) / (num_mels + 1) as f64)
        .collect();

    // Convert back to Hz and then to FFT bin indices.
    let bin_indices: Vec<usize> = mel_points
        .iter()
        .map(|&m| {
            let hz = mel_to_hz(m);
            let bin = (hz * fft_size as f64 / ANALYSIS_RATE as f64).floor() as isize;
            bin.max(0).min(half_fft as isize - 1) as usize
        })
        .collect();

    // Build triangular filters.
    let mut fb = Vec::with_capacity(num_mels);
    for m in 0..num_mels {
        let mut filter = vec![0.0f64; half_fft];
        let left = bin_indices[m];
        let center = bin_indices[m + 1];
        let right = bin_indices[m + 2];

        // Rising slope.
        if center > left {
            for k in left..=center {
                filter[k] = (k - left) as f64 / (center - left) as f64;
            }
        }
        // Falling slope.
        if right > center {
            for k in center..=right {
                filter[k] = (right - k) as f64 / (right - center) as f64;
            }
        }
        fb.push(filter);
    }
    fb
}

/// In-place Cooley-Tukey FFT.
/// Input length must be a power of 2.
/// Uses (real, imag) tuples instead of a complex number type.
fn fft(x: &mut [(f64, f64)]) {
    let n = x.len();
    if n <= 1 {
        return;
    }

    // Bit-reversal permutation.
    let mut j = 0usize;
    for i in 1..n {
        let mut bit = n >> 1;
        while j & bit != 0 {
            j ^= bit;
            bit >>= 1;
        }
        j ^= bit;
        if i < j {
            x.swap(i, j);
        }
    }

    // Butterfly operations.
    let mut size = 2;
    while size <= n {
        let half = size / 2;
        let angle = -2.0 * PI / size as f64;
        let wn = (angle.cos(), angle.sin());
        let mut start = 0;
        while start < n {
            let mut w = (1.0, 0.0);
            for k in 0..half {
                let u = x[start + k];
                let t_re = w.0 * x[start + k + half].0 - w.1 * x[start + k + half].1;
                let t_im = w.0 * x[start + k + half].1 + w.1 * x[start + k + half].0;
                x[start + k] = (u.0 + t_re, u.1 + t_im);
                x[start + k + half] = (u.0 - t_re, u.1 - t_im);
                let new_w_re = w.0 * wn.0 - w.1 * wn.1;
                let new_w_im = w.0 * wn.1 + w.1 * wn.0;
                w = (new_w_re, new_w_im);
            }
            start += size;
        }
        size <<= 1;
    }
}
