use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Sample rate remote audio is decoded at.
pub const PLAYOUT_SAMPLE_RATE: u32 = 48_000;
pub const PLAYOUT_CHANNELS: u32 = 1;

/// Bounded buffer of decoded remote PCM.
///
/// Engine tasks push, the host audio output pulls. When the consumer falls
/// behind the oldest samples are discarded.
pub struct PlayoutBuffer {
    samples: Mutex<VecDeque<i16>>,
    capacity: usize,
}

impl PlayoutBuffer {
    /// Two seconds at the playout rate.
    pub fn new() -> Self {
        Self::with_capacity((PLAYOUT_SAMPLE_RATE * PLAYOUT_CHANNELS * 2) as usize)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            samples: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    pub fn push(&self, samples: &[i16]) {
        let mut buf = self.lock();
        buf.extend(samples.iter().copied());
        let overflow = buf.len().saturating_sub(self.capacity);
        if overflow > 0 {
            buf.drain(..overflow);
        }
    }

    /// Fill `out`, padding with silence. Returns how many real samples were
    /// written.
    pub fn pull(&self, out: &mut [i16]) -> usize {
        let mut buf = self.lock();
        let available = buf.len().min(out.len());
        for (slot, sample) in out.iter_mut().zip(buf.drain(..available)) {
            *slot = sample;
        }
        out[available..].fill(0);
        available
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<i16>> {
        self.samples.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for PlayoutBuffer {
    fn default() -> Self {
        Self::new()
    }
}
