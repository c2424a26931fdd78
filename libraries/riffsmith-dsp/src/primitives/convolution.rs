//! Uniformly partitioned overlap-save convolution
//!
//! Impulse responses are split into partitions of `block` samples whose
//! spectra are computed once. The input is buffered into blocks; every full
//! block is transformed once, pushed into a frequency-domain delay line and
//! multiplied against all active partitions. Latency is one block.
//!
//! Several impulse responses can be loaded at once and switched between
//! without allocating, which lets a cabinet swap its IR on the audio thread.

use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};
use std::sync::Arc;

/// Default partition size in samples
pub const DEFAULT_BLOCK: usize = 128;

/// Per-channel streaming state
struct ChannelState {
    /// Previous and current input block, `2 * block` samples
    window: Vec<f32>,
    /// Spectra of past input windows, newest at `fdl_pos`
    fdl: Vec<Vec<Complex<f32>>>,
    fdl_pos: usize,
    /// Output of the last completed block
    output: Vec<f32>,
    fill: usize,
}

impl ChannelState {
    fn new(block: usize, partitions: usize) -> Self {
        Self {
            window: vec![0.0; block * 2],
            fdl: vec![vec![Complex::new(0.0, 0.0); block * 2]; partitions.max(1)],
            fdl_pos: 0,
            output: vec![0.0; block],
            fill: 0,
        }
    }

    fn clear(&mut self) {
        self.window.fill(0.0);
        for spectrum in &mut self.fdl {
            spectrum.fill(Complex::new(0.0, 0.0));
        }
        self.fdl_pos = 0;
        self.output.fill(0.0);
        self.fill = 0;
    }
}

/// Multi-IR partitioned convolver
pub struct PartitionedConvolver {
    block: usize,
    forward: Arc<dyn Fft<f32>>,
    inverse: Arc<dyn Fft<f32>>,

    /// `[ir][partition][bin]`
    spectra: Vec<Vec<Vec<Complex<f32>>>>,
    channels: Vec<ChannelState>,

    active_ir: usize,
    active_partitions: usize,

    // Pre-allocated scratch (avoids allocation in process_sample)
    work: Vec<Complex<f32>>,
    accum: Vec<Complex<f32>>,
    fft_scratch: Vec<Complex<f32>>,
}

impl PartitionedConvolver {
    /// Plan transforms and pre-compute partition spectra
    ///
    /// Allocates; call from `prepare`, never from the audio thread.
    pub fn new(block: usize, impulse_responses: &[Vec<f32>], num_channels: usize) -> Self {
        let block = block.max(1);
        let fft_size = block * 2;

        let mut planner = FftPlanner::new();
        let forward = planner.plan_fft_forward(fft_size);
        let inverse = planner.plan_fft_inverse(fft_size);
        let scratch_len = forward
            .get_inplace_scratch_len()
            .max(inverse.get_inplace_scratch_len());
        let mut fft_scratch = vec![Complex::new(0.0, 0.0); scratch_len];

        let spectra: Vec<Vec<Vec<Complex<f32>>>> = impulse_responses
            .iter()
            .map(|ir| {
                ir.chunks(block)
                    .map(|segment| {
                        let mut spectrum = vec![Complex::new(0.0, 0.0); fft_size];
                        for (bin, &sample) in spectrum.iter_mut().zip(segment) {
                            *bin = Complex::new(sample, 0.0);
                        }
                        forward.process_with_scratch(&mut spectrum, &mut fft_scratch);
                        spectrum
                    })
                    .collect()
            })
            .collect();

        let max_partitions = spectra.iter().map(Vec::len).max().unwrap_or(0);
        let channels = (0..num_channels.max(1))
            .map(|_| ChannelState::new(block, max_partitions))
            .collect();

        let mut convolver = Self {
            block,
            forward,
            inverse,
            spectra,
            channels,
            active_ir: 0,
            active_partitions: 0,
            work: vec![Complex::new(0.0, 0.0); fft_size],
            accum: vec![Complex::new(0.0, 0.0); fft_size],
            fft_scratch,
        };
        convolver.select(0, usize::MAX);
        convolver
    }

    /// Block size (and latency) in samples
    pub fn latency(&self) -> usize {
        self.block
    }

    pub fn num_impulse_responses(&self) -> usize {
        self.spectra.len()
    }

    /// Switch IR and truncate it to at most `max_samples` (rounded up to a
    /// whole partition)
    pub fn select(&mut self, ir: usize, max_samples: usize) {
        let Some(partitions) = self.spectra.get(ir).map(Vec::len) else {
            self.active_partitions = 0;
            return;
        };
        self.active_ir = ir;
        self.active_partitions = if partitions == 0 {
            0
        } else {
            max_samples.div_ceil(self.block).clamp(1, partitions)
        };
    }

    /// Push one input sample, get one output sample (delayed by one block)
    #[inline]
    pub fn process_sample(&mut self, channel: usize, input: f32) -> f32 {
        let block = self.block;
        let Some(state) = self.channels.get_mut(channel) else {
            return 0.0;
        };

        state.window[block + state.fill] = input;
        let output = state.output[state.fill];
        state.fill += 1;

        if state.fill == block {
            state.fill = 0;
            self.run_block(channel);
        }
        output
    }

    /// Convolve the completed input block of one channel
    fn run_block(&mut self, channel: usize) {
        let block = self.block;
        let Self {
            forward,
            inverse,
            spectra,
            channels,
            active_ir,
            active_partitions,
            work,
            accum,
            fft_scratch,
            ..
        } = self;
        let Some(state) = channels.get_mut(channel) else {
            return;
        };

        for (bin, &sample) in work.iter_mut().zip(state.window.iter()) {
            *bin = Complex::new(sample, 0.0);
        }
        forward.process_with_scratch(work, fft_scratch);
        state.fdl[state.fdl_pos].copy_from_slice(work);

        accum.fill(Complex::new(0.0, 0.0));
        let depth = state.fdl.len();
        if let Some(partitions) = spectra.get(*active_ir) {
            for (p, h) in partitions.iter().take(*active_partitions).enumerate() {
                let x = &state.fdl[(state.fdl_pos + depth - p) % depth];
                for ((acc, xk), hk) in accum.iter_mut().zip(x.iter()).zip(h.iter()) {
                    *acc += xk * hk;
                }
            }
        }

        inverse.process_with_scratch(accum, fft_scratch);
        let scale = 1.0 / (block * 2) as f32;
        for (out, bin) in state.output.iter_mut().zip(&accum[block..]) {
            *out = bin.re * scale;
        }

        state.window.copy_within(block.., 0);
        state.fdl_pos = (state.fdl_pos + 1) % depth;
    }

    /// Clear all history
    pub fn reset(&mut self) {
        for state in &mut self.channels {
            state.clear();
        }
    }
}
