//! Inference Routine Tests
//!
//! Chunked inference against a loaded mock model.

mod common;

use approx::assert_relative_eq;
use candle_core::Device;

use common::mock_run_dir;
use speech_enhance::audio::{generate_test_tone, Waveform};
use speech_enhance::inference::{ChunkedInference, InferenceRoutine};
use speech_enhance::neural::{
    checkpoint, EnhanceConfig, HParams, MockSpeechModel, SpeechModel,
};

fn loaded_model(denoiser_gain: f32, enhancer_gain: f32, wav_rate: u32) -> MockSpeechModel {
    let run = mock_run_dir(denoiser_gain, enhancer_gain);
    let hparams = HParams {
        wav_rate,
        ..HParams::default()
    };
    let mut model = MockSpeechModel::new(hparams).unwrap();
    model
        .load_state_dict(checkpoint::load_state_dict(run.path()).unwrap())
        .unwrap();
    model.eval();
    model
}

#[test]
fn test_multi_chunk_gain_is_applied_everywhere() {
    let model = loaded_model(0.5, 1.0, 8_000);
    let routine = ChunkedInference::new(0.1, 0.02).unwrap();
    let tone = generate_test_tone(330.0, 0.4, 8_000).unwrap();

    let out = routine
        .run(model.denoiser(), &tone, &Device::Cpu, None)
        .unwrap();

    let input = tone.rows_f32().unwrap();
    let output = out.rows_f32().unwrap();
    assert_eq!(output[0].len(), input[0].len());
    for (y, x) in output[0].iter().zip(&input[0]) {
        assert_relative_eq!(*y, 0.5 * x, epsilon = 1e-4);
    }
}

#[test]
fn test_input_is_resampled_to_model_rate() {
    let model = loaded_model(1.0, 1.0, 16_000);
    let routine = ChunkedInference::default();
    let tone = generate_test_tone(200.0, 0.25, 8_000).unwrap();

    let out = routine
        .run(model.denoiser(), &tone, &Device::Cpu, None)
        .unwrap();

    assert_eq!(out.sample_rate(), 16_000);
    assert_eq!(out.num_samples(), 4_000);
}

#[test]
fn test_enhancer_receives_call_config() {
    let model = loaded_model(1.0, 3.0, 8_000);
    let routine = ChunkedInference::default();
    let wav = Waveform::from_samples(vec![0.25; 400], 8_000).unwrap();

    let config = EnhanceConfig {
        lambd: 1.0,
        ..EnhanceConfig::default()
    };
    let out = routine
        .run(model.enhancer(), &wav, &Device::Cpu, Some(&config))
        .unwrap();

    assert_relative_eq!(out.rows_f32().unwrap()[0][10], 0.75, epsilon = 1e-5);
}

#[test]
fn test_silence_stays_silent() {
    let model = loaded_model(2.0, 2.0, 8_000);
    let routine = ChunkedInference::default();
    let wav = Waveform::from_samples(vec![0.0; 800], 8_000).unwrap();

    let out = routine
        .run(model.denoiser(), &wav, &Device::Cpu, None)
        .unwrap();
    assert!(out.rows_f32().unwrap()[0].iter().all(|v| *v == 0.0));
}
