/// Fixed-capacity circular store holding the most recent mono samples for
/// spectral analysis. Capacity is 2x the FFT size; the write index advances
/// monotonically mod capacity.
///
/// The buffer starts zeroed, so `copy_latest` on a freshly started stream
/// analyzes a zero-padded history rather than garbage.
pub struct SampleRing {
    buf: Vec<f32>,
    write_pos: usize,
}

impl SampleRing {
    pub fn new(capacity: usize) -> Self {
        Self {
            buf: vec![0.0; capacity.max(1)],
            write_pos: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    pub fn push(&mut self, samples: &[f32]) {
        for &sample in samples {
            self.buf[self.write_pos] = sample;
            self.write_pos = (self.write_pos + 1) % self.buf.len();
        }
    }

    /// Copy the most recent `out.len()` samples in chronological order.
    /// `out` must not exceed the ring capacity.
    pub fn copy_latest(&self, out: &mut [f32]) {
        let capacity = self.buf.len();
        let n = out.len();
        debug_assert!(n <= capacity);
        let start = (self.write_pos + capacity - n) % capacity;
        for (i, slot) in out.iter_mut().enumerate() {
            *slot = self.buf[(start + i) % capacity];
        }
    }
}
