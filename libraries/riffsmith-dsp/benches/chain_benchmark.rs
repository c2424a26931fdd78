//! Performance benchmarks for the guitar chain
//!
//! Run with: cargo bench -p riffsmith-dsp --features test-utils --bench chain_benchmark

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use riffsmith_core::{
    AmpModel, AmpParams, CabinetIr, CabinetParams, DriveParams, EffectBlock, NoiseGateParams,
    PresetData, ReverbAlgorithm, ReverbParams,
};
use riffsmith_dsp::test_utils::sine;
use riffsmith_dsp::{DspChain, ToneProcessor};

const SAMPLE_RATE: f32 = 48_000.0;

fn high_gain_preset() -> PresetData {
    PresetData::new("Bench High Gain")
        .with_block(EffectBlock::NoiseGate(NoiseGateParams::default()))
        .with_block(EffectBlock::Drive(DriveParams::default()))
        .with_block(EffectBlock::Amp(AmpParams {
            model: AmpModel::HiGain,
            ..AmpParams::default()
        }))
        .with_block(EffectBlock::Cab(CabinetParams {
            ir: CabinetIr::FourByTwelveClosed,
            ..CabinetParams::default()
        }))
        .with_block(EffectBlock::Reverb(ReverbParams {
            algorithm: ReverbAlgorithm::Shimmer,
            ..ReverbParams::default()
        }))
}

fn bench_block_sizes(c: &mut Criterion) {
    let mut group = c.benchmark_group("chain_block_size");

    for block_size in [64usize, 128, 256, 512] {
        group.throughput(Throughput::Elements(block_size as u64));
        group.bench_with_input(
            BenchmarkId::new("high_gain", block_size),
            &block_size,
            |b, &block_size| {
                let mut chain = DspChain::new();
                chain.prepare_to_play(SAMPLE_RATE, block_size, 2).unwrap();
                chain.handle().apply_preset(&high_gain_preset());
                let input = sine(220.0, SAMPLE_RATE, 2, block_size, 0.5);

                b.iter(|| {
                    let mut buffer = input.clone();
                    chain.process_block(black_box(&mut buffer));
                    black_box(buffer)
                });
            },
        );
    }

    group.finish();
}

fn bench_cabinet_ir_length(c: &mut Criterion) {
    let mut group = c.benchmark_group("cabinet_ir_length");
    let block_size = 256;
    group.throughput(Throughput::Elements(block_size as u64));

    for ir_length_ms in [10.0f32, 100.0, 500.0] {
        group.bench_with_input(
            BenchmarkId::new("convolution", ir_length_ms),
            &ir_length_ms,
            |b, &ir_length_ms| {
                let mut chain = DspChain::new();
                chain.prepare_to_play(SAMPLE_RATE, block_size, 2).unwrap();
                chain.handle().apply_preset(&PresetData::new("Cab only").with_block(
                    EffectBlock::Cab(CabinetParams {
                        ir_length_ms,
                        ..CabinetParams::default()
                    }),
                ));
                let input = sine(220.0, SAMPLE_RATE, 2, block_size, 0.5);

                b.iter(|| {
                    let mut buffer = input.clone();
                    chain.process_block(black_box(&mut buffer));
                    black_box(buffer)
                });
            },
        );
    }

    group.finish();
}

fn bench_smoothed_processor(c: &mut Criterion) {
    let block_size = 256;
    let mut processor = ToneProcessor::new().unwrap();
    processor.prepare_to_play(SAMPLE_RATE, block_size, 2).unwrap();
    let handle = processor.handle();
    let input = sine(220.0, SAMPLE_RATE, 2, block_size, 0.5);
    let presets = [
        PresetData::new("Heavy Metal"),
        PresetData::new("Ambient Clean"),
    ];
    let mut next = 0usize;

    c.bench_function("tone_processor_preset_glide", |b| {
        b.iter(|| {
            handle.apply_preset(&presets[next % presets.len()]).unwrap();
            next += 1;
            let mut buffer = input.clone();
            processor.process_block(black_box(&mut buffer));
            black_box(buffer)
        });
    });
}

criterion_group!(
    benches,
    bench_block_sizes,
    bench_cabinet_ir_length,
    bench_smoothed_processor
);
criterion_main!(benches);
