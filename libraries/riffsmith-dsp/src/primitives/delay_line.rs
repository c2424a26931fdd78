//! Circular delay line with integer and fractional taps

/// Ring buffer of past samples
///
/// Capacity is fixed at `resize` (prepare time); `push`/`read` never allocate.
#[derive(Debug, Clone, Default)]
pub struct DelayLine {
    buffer: Vec<f32>,
    write: usize,
}

impl DelayLine {
    pub fn new(capacity: usize) -> Self {
        let mut line = Self::default();
        line.resize(capacity);
        line
    }

    /// Reallocate for a new capacity; clears contents
    pub fn resize(&mut self, capacity: usize) {
        self.buffer = vec![0.0; capacity.max(1)];
        self.write = 0;
    }

    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }

    /// Zero contents without reallocating
    pub fn clear(&mut self) {
        self.buffer.fill(0.0);
        self.write = 0;
    }

    /// Append the newest sample
    #[inline]
    pub fn push(&mut self, sample: f32) {
        if self.buffer.is_empty() {
            return;
        }
        self.buffer[self.write] = sample;
        self.write += 1;
        if self.write == self.buffer.len() {
            self.write = 0;
        }
    }

    /// Sample pushed `delay` pushes ago (1 = newest), clamped to capacity
    #[inline]
    pub fn read(&self, delay: usize) -> f32 {
        let len = self.buffer.len();
        if len == 0 {
            return 0.0;
        }
        let delay = delay.clamp(1, len);
        let index = (self.write + len - delay) % len;
        self.buffer[index]
    }

    /// Linearly interpolated read for fractional delays
    #[inline]
    pub fn read_fractional(&self, delay: f32) -> f32 {
        let max = self.buffer.len().saturating_sub(1).max(1) as f32;
        let delay = delay.clamp(1.0, max);
        let whole = delay.floor();
        let frac = delay - whole;
        let a = self.read(whole as usize);
        let b = self.read(whole as usize + 1);
        a + (b - a) * frac
    }
}

/// Schroeder all-pass built on a delay line
#[derive(Debug, Clone, Default)]
pub struct AllPassDelay {
    line: DelayLine,
    delay: usize,
}

impl AllPassDelay {
    pub fn new(delay: usize) -> Self {
        Self {
            line: DelayLine::new(delay.max(1)),
            delay: delay.max(1),
        }
    }

    #[inline]
    pub fn process(&mut self, input: f32, gain: f32) -> f32 {
        let delayed = self.line.read(self.delay);
        let feed = input + delayed * gain;
        self.line.push(feed);
        delayed - feed * gain
    }

    pub fn clear(&mut self) {
        self.line.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_returns_delayed_sample() {
        let mut line = DelayLine::new(8);
        for i in 1..=5 {
            line.push(i as f32);
        }
        assert_eq!(line.read(1), 5.0);
        assert_eq!(line.read(3), 3.0);
    }

    #[test]
    fn read_wraps_around() {
        let mut line = DelayLine::new(4);
        for i in 1..=10 {
            line.push(i as f32);
        }
        assert_eq!(line.read(1), 10.0);
        assert_eq!(line.read(4), 7.0);
        assert_eq!(line.read(100), 7.0, "delay clamps to capacity");
    }

    #[test]
    fn fractional_read_interpolates() {
        let mut line = DelayLine::new(8);
        line.push(0.0);
        line.push(1.0);
        assert!((line.read_fractional(1.5) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn clear_zeroes_contents() {
        let mut line = DelayLine::new(4);
        line.push(1.0);
        line.clear();
        assert_eq!(line.read(1), 0.0);
        assert_eq!(line.capacity(), 4);
    }

    #[test]
    fn all_pass_preserves_energy() {
        let mut ap = AllPassDelay::new(37);
        let mut energy_in = 0.0;
        let mut energy_out = 0.0;
        for i in 0..20_000 {
            let x = if i == 0 { 1.0 } else { 0.0 };
            energy_in += x * x;
            let y = ap.process(x, 0.5);
            energy_out += y * y;
        }
        assert!((energy_in - energy_out).abs() < 1e-3);
    }
}
