//! Overlap-add merging of independently processed chunks
//!
//! Neighbouring chunks can drift by a few milliseconds after generative
//! processing, so each chunk is realigned against its predecessor before the
//! cross-fade.

use rustfft::num_complex::Complex;
use rustfft::FftPlanner;

/// Mel bands of the alignment spectrogram
const N_MELS: usize = 80;

/// Estimate the lag (in samples) of `current` relative to `previous`.
///
/// Both inputs cover the same overlap region. The lag is the argmax of the
/// band-averaged circular cross-correlation of their log-mel spectrograms,
/// at 5 ms resolution. A positive value means `current` runs late by that
/// many samples and must be placed earlier.
pub fn compute_offset(previous: &[f32], current: &[f32], sample_rate: u32) -> isize {
    let hop = (sample_rate / 200).max(1) as usize;
    let win = hop * 4;
    let n_fft = win.next_power_of_two();

    let filterbank = mel_filterbank(N_MELS, n_fft, sample_rate);
    let spec_prev = log_mel_spectrogram(previous, &filterbank, n_fft, win, hop);
    let spec_cur = log_mel_spectrogram(current, &filterbank, n_fft, win, hop);

    let frames = spec_prev.len().min(spec_cur.len());
    if frames == 0 {
        return 0;
    }

    let mut planner = FftPlanner::<f32>::new();
    let forward = planner.plan_fft_forward(frames);
    let inverse = planner.plan_fft_inverse(frames);

    let mut corr = vec![0.0f32; frames];
    for band in 0..N_MELS {
        let mut a: Vec<Complex<f32>> = (0..frames)
            .map(|t| Complex::new(spec_prev[t][band], 0.0))
            .collect();
        let mut b: Vec<Complex<f32>> = (0..frames)
            .map(|t| Complex::new(spec_cur[t][band], 0.0))
            .collect();
        forward.process(&mut a);
        forward.process(&mut b);
        for (x, y) in a.iter_mut().zip(&b) {
            *x *= y.conj();
        }
        inverse.process(&mut a);
        for (c, v) in corr.iter_mut().zip(&a) {
            *c += v.norm() / (frames * N_MELS) as f32;
        }
    }

    let mut argmax = 0usize;
    for (i, &c) in corr.iter().enumerate() {
        if c > corr[argmax] {
            argmax = i;
        }
    }

    let mut lag = argmax as isize;
    if argmax > frames / 2 {
        lag -= frames as isize;
    }
    -lag * hop as isize
}

fn hz_to_mel(freq: f32) -> f32 {
    2595.0 * (1.0 + freq / 700.0).log10()
}

fn mel_to_hz(mel: f32) -> f32 {
    700.0 * (10.0f32.powf(mel / 2595.0) - 1.0)
}

/// HTK-scale triangular filters from 0 Hz to Nyquist, unnormalised; `[band][bin]`
fn mel_filterbank(n_mels: usize, n_fft: usize, sample_rate: u32) -> Vec<Vec<f32>> {
    let n_freqs = n_fft / 2 + 1;
    let fft_freqs = linspace(0.0, sample_rate as f32 / 2.0, n_freqs);
    let edges: Vec<f32> = linspace(0.0, hz_to_mel(sample_rate as f32 / 2.0), n_mels + 2)
        .into_iter()
        .map(mel_to_hz)
        .collect();

    (0..n_mels)
        .map(|m| {
            let (lower, center, upper) = (edges[m], edges[m + 1], edges[m + 2]);
            fft_freqs
                .iter()
                .map(|&f| {
                    let up = (f - lower) / (center - lower);
                    let down = (upper - f) / (upper - center);
                    up.min(down).max(0.0)
                })
                .collect()
        })
        .collect()
}

/// Mirror `pad` samples onto each side, edge sample excluded
fn pad_reflect(signal: &[f32], pad: usize) -> Vec<f32> {
    let n = signal.len();
    if n < 2 {
        return vec![signal.first().copied().unwrap_or(0.0); n + 2 * pad];
    }
    let period = 2 * (n - 1) as isize;
    (0..n + 2 * pad)
        .map(|i| {
            let k = (i as isize - pad as isize).rem_euclid(period) as usize;
            signal[if k < n { k } else { period as usize - k }]
        })
        .collect()
}

/// Centred Hann-window STFT power through `filterbank`, `log1p`-compressed;
/// `[frame][band]`
fn log_mel_spectrogram(
    signal: &[f32],
    filterbank: &[Vec<f32>],
    n_fft: usize,
    win: usize,
    hop: usize,
) -> Vec<Vec<f32>> {
    if signal.is_empty() {
        return Vec::new();
    }

    let window: Vec<f32> = (0..win)
        .map(|i| {
            let phase = 2.0 * std::f32::consts::PI * i as f32 / win as f32;
            0.5 - 0.5 * phase.cos()
        })
        .collect();
    let window_offset = (n_fft - win) / 2;

    let padded = pad_reflect(signal, n_fft / 2);
    let frames = 1 + signal.len() / hop;
    let mut planner = FftPlanner::<f32>::new();
    let fft = planner.plan_fft_forward(n_fft);

    let mut spec = Vec::with_capacity(frames);
    let mut buf = vec![Complex::new(0.0f32, 0.0); n_fft];
    for frame in 0..frames {
        let start = frame * hop;
        for (i, slot) in buf.iter_mut().enumerate() {
            let w = i
                .checked_sub(window_offset)
                .and_then(|j| window.get(j))
                .copied()
                .unwrap_or(0.0);
            *slot = Complex::new(padded[start + i] * w, 0.0);
        }
        fft.process(&mut buf);

        let power: Vec<f32> = buf[..n_fft / 2 + 1].iter().map(|c| c.norm_sqr()).collect();
        spec.push(
            filterbank
                .iter()
                .map(|weights| {
                    let energy: f32 = weights.iter().zip(&power).map(|(w, p)| w * p).sum();
                    energy.ln_1p()
                })
                .collect(),
        );
    }
    spec
}

/// `n` evenly spaced values from `start` to `end` inclusive
fn linspace(start: f32, end: f32, n: usize) -> Vec<f32> {
    match n {
        0 => Vec::new(),
        1 => vec![start],
        _ => (0..n)
            .map(|i| start + (end - start) * i as f32 / (n - 1) as f32)
            .collect(),
    }
}

/// Cross-fade `chunks` (taken every `hop_length` samples, `chunk_length` long)
/// back into one signal of `length` samples.
pub fn merge_chunks(
    chunks: &[Vec<f32>],
    chunk_length: usize,
    hop_length: usize,
    sample_rate: u32,
    length: usize,
) -> Vec<f32> {
    if chunks.is_empty() {
        return vec![0.0; length];
    }

    let signal_length = (chunks.len() - 1) * hop_length + chunk_length;
    let overlap_length = chunk_length.saturating_sub(hop_length);
    let mut signal = vec![0.0f32; signal_length];

    let mut fadein = linspace(0.0, 1.0, overlap_length);
    fadein.extend(std::iter::repeat(1.0).take(hop_length));
    let mut fadeout = vec![1.0; hop_length];
    fadeout.extend(linspace(1.0, 0.0, overlap_length));

    let last = chunks.len() - 1;
    for (i, chunk) in chunks.iter().enumerate() {
        let mut chunk = chunk.clone();
        chunk.resize(chunk_length.max(chunk.len()), 0.0);

        let mut start = (i * hop_length) as isize;
        if i > 0 && overlap_length > 0 {
            let prev = &chunks[i - 1];
            let pre_region = &prev[prev.len().saturating_sub(overlap_length)..];
            let cur_region = &chunk[..overlap_length];
            start -= compute_offset(pre_region, cur_region, sample_rate);
        }

        for (j, &sample) in chunk.iter().take(chunk_length).enumerate() {
            let gain = if i == 0 {
                fadeout[j]
            } else if i == last {
                fadein[j]
            } else {
                fadein[j] * fadeout[j]
            };
            let pos = start + j as isize;
            if pos >= 0 && (pos as usize) < signal_length {
                signal[pos as usize] += sample * gain;
            }
        }
    }

    signal.truncate(length);
    signal.resize(length, 0.0);
    signal
}
