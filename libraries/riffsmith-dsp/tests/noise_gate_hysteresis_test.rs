//! Noise gate hysteresis
//!
//! A 500 Hz tone whose level steps 3 dB above and below the threshold every
//! 100 ms. With 10 dB of hysteresis the gate opens once and stays open; with
//! none it follows every step.

use riffsmith_core::NoiseGateParams;
use riffsmith_dsp::effects::{EffectUnit, NoiseGate};
use riffsmith_dsp::{AudioBuffer, ProcessSpec};
use std::f32::consts::PI;

const SAMPLE_RATE: f32 = 48_000.0;
const BLOCK: usize = 480;
const THRESHOLD_DB: f32 = -20.0;

/// One second of a 500 Hz sine alternating between threshold -3 dB and +3 dB
fn stepped_tone() -> Vec<f32> {
    let segment = (SAMPLE_RATE * 0.1) as usize;
    let quiet = 10.0f32.powf((THRESHOLD_DB - 3.0) / 20.0);
    let loud = 10.0f32.powf((THRESHOLD_DB + 3.0) / 20.0);
    (0..SAMPLE_RATE as usize)
        .map(|i| {
            let amplitude = if (i / segment) % 2 == 0 { quiet } else { loud };
            amplitude * (2.0 * PI * 500.0 * i as f32 / SAMPLE_RATE).sin()
        })
        .collect()
}

fn transitions_with_hysteresis(hysteresis_db: f32) -> u32 {
    let mut gate = NoiseGate::new();
    gate.prepare(&ProcessSpec::new(SAMPLE_RATE, BLOCK, 2).unwrap());
    gate.apply_parameters(&NoiseGateParams {
        threshold_db: THRESHOLD_DB,
        hysteresis_db,
        hold_ms: 0.0,
        attack_ms: 1.0,
        release_ms: 20.0,
        ..NoiseGateParams::default()
    });

    let signal = stepped_tone();
    for chunk in signal.chunks(BLOCK) {
        let mut buffer = AudioBuffer::from_channels(&[chunk, chunk]).unwrap();
        gate.process_block(&mut buffer);
    }
    gate.parameters().meter.transitions()
}

#[test]
fn hysteresis_band_suppresses_chatter() {
    let transitions = transitions_with_hysteresis(10.0);
    assert!(
        transitions <= 1,
        "{transitions} transitions inside the hysteresis band"
    );
}

#[test]
fn no_hysteresis_follows_every_step() {
    let transitions = transitions_with_hysteresis(0.0);
    assert!(transitions >= 5, "only {transitions} transitions");
}
