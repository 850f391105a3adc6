//! Band-limited sample rate conversion
//!
//! Kaiser-windowed sinc interpolation evaluated directly at every output
//! position. Slow compared to a polyphase implementation but exact for any
//! rate ratio, which is all a once-per-file conversion needs.

use std::f64::consts::PI;

/// Zero crossings of the sinc kernel on each side, at the lower rate
pub const LOWPASS_FILTER_WIDTH: usize = 64;
/// Cutoff as a fraction of the lower Nyquist frequency
pub const ROLLOFF: f64 = 0.947_593_716_739_959_6;
/// Kaiser window shape
pub const KAISER_BETA: f64 = 14.769_656_459_379_492;

/// Resample `samples` from `from_rate` to `to_rate`.
///
/// Output length is `ceil(len * to_rate / from_rate)`.
pub fn resample(samples: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    if from_rate == to_rate || samples.is_empty() || from_rate == 0 || to_rate == 0 {
        return samples.to_vec();
    }

    let ratio = to_rate as f64 / from_rate as f64;
    let out_len = ((samples.len() as u64 * to_rate as u64 + from_rate as u64 - 1)
        / from_rate as u64) as usize;

    // Cutoff in cycles per input sample
    let cutoff = 0.5 * ROLLOFF * ratio.min(1.0);
    // Kernel half-width in input samples
    let half_width = LOWPASS_FILTER_WIDTH as f64 / (2.0 * cutoff);
    let i0_beta = bessel_i0(KAISER_BETA);

    let mut out = Vec::with_capacity(out_len);
    for n in 0..out_len {
        let t = n as f64 / ratio;
        let first = (t - half_width).ceil().max(0.0) as usize;
        let last = ((t + half_width).floor() as usize).min(samples.len() - 1);

        let mut acc = 0.0f64;
        for (k, &x) in samples.iter().enumerate().take(last + 1).skip(first) {
            let d = t - k as f64;
            let window = kaiser(d / half_width, i0_beta);
            acc += x as f64 * 2.0 * cutoff * sinc(2.0 * cutoff * d) * window;
        }
        out.push(acc as f32);
    }
    out
}

fn sinc(x: f64) -> f64 {
    if x.abs() < 1e-12 {
        1.0
    } else {
        (PI * x).sin() / (PI * x)
    }
}

/// Kaiser window at normalised position `x` in [-1, 1]
fn kaiser(x: f64, i0_beta: f64) -> f64 {
    if x.abs() > 1.0 {
        return 0.0;
    }
    bessel_i0(KAISER_BETA * (1.0 - x * x).sqrt()) / i0_beta
}

/// Zeroth-order modified Bessel function of the first kind
fn bessel_i0(x: f64) -> f64 {
    let half = x / 2.0;
    let mut term = 1.0;
    let mut sum = 1.0;
    for k in 1..64 {
        term *= (half / k as f64) * (half / k as f64);
        sum += term;
        if term < sum * 1e-16 {
            break;
        }
    }
    sum
}
