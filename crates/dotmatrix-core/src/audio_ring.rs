use std::sync::{Mutex, MutexGuard, PoisonError};

/// Bounded ring of interleaved stereo f32 samples.
///
/// The emulation thread is the only writer; the host audio callback is the
/// only reader. Both sides serialize on one mutex and the critical sections
/// are bounded and allocation-free. The ring is lossy when full: new sample
/// pairs are dropped, and a starved reader simply gets fewer samples than it
/// asked for.
pub struct AudioRing {
    state: Mutex<RingState>,
}

struct RingState {
    samples: Box<[f32]>,
    count: usize,
    start: usize,
    end: usize,
}

impl AudioRing {
    fn lock(&self) -> MutexGuard<'_, RingState> {
        // A panicked audio callback must not wedge the emulation thread.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// `capacity` is in individual samples (two per stereo frame) and is
    /// rounded up to an even count so frames never straddle the drop check.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(2) + (capacity & 1);
        Self {
            state: Mutex::new(RingState {
                samples: vec![0.0; capacity].into_boxed_slice(),
                count: 0,
                start: 0,
                end: 0,
            }),
        }
    }

    /// Append one stereo frame. Returns false if the ring was full and the
    /// frame was dropped.
    pub fn write_stereo(&self, left: f32, right: f32) -> bool {
        let mut state = self.lock();
        if state.count + 2 > state.samples.len() {
            return false;
        }
        let end = state.end;
        state.samples[end] = left;
        state.end = (end + 1) % state.samples.len();
        let end = state.end;
        state.samples[end] = right;
        state.end = (end + 1) % state.samples.len();
        state.count += 2;
        true
    }

    /// Copy up to `out.len()` samples into `out`, oldest first. Returns the
    /// number of samples written; the rest of `out` is left untouched.
    pub fn read(&self, out: &mut [f32]) -> usize {
        let mut state = self.lock();
        let take = state.count.min(out.len());
        for slot in out.iter_mut().take(take) {
            *slot = state.samples[state.start];
            state.start = (state.start + 1) % state.samples.len();
        }
        state.count -= take;
        take
    }

    /// Copy samples as little-endian f32 bytes. `out.len()` should be a
    /// multiple of 4; a ragged tail is ignored. Returns bytes written.
    pub fn read_bytes(&self, out: &mut [u8]) -> usize {
        let mut state = self.lock();
        let want = out.len() / 4;
        let take = state.count.min(want);
        for i in 0..take {
            let bytes = state.samples[state.start].to_le_bytes();
            out[i * 4..i * 4 + 4].copy_from_slice(&bytes);
            state.start = (state.start + 1) % state.samples.len();
        }
        state.count -= take;
        take * 4
    }

    /// Number of buffered samples.
    pub fn len(&self) -> usize {
        self.lock().count
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.lock().samples.len()
    }

    /// Discard all buffered samples.
    pub fn clear(&self) {
        let mut state = self.lock();
        state.count = 0;
        state.start = 0;
        state.end = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drops_newest_when_full() {
        let ring = AudioRing::new(4);
        assert!(ring.write_stereo(1.0, 2.0));
        assert!(ring.write_stereo(3.0, 4.0));
        assert!(!ring.write_stereo(5.0, 6.0));

        let mut out = [0.0f32; 8];
        assert_eq!(ring.read(&mut out), 4);
        assert_eq!(&out[..4], &[1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn read_returns_only_whats_buffered() {
        let ring = AudioRing::new(64);
        ring.write_stereo(0.5, -0.5);
        let mut out = [0.0f32; 16];
        assert_eq!(ring.read(&mut out), 2);
        assert_eq!(ring.read(&mut out), 0);
    }

    #[test]
    fn byte_reads_are_little_endian() {
        let ring = AudioRing::new(8);
        ring.write_stereo(1.0, 0.0);
        let mut out = [0u8; 8];
        assert_eq!(ring.read_bytes(&mut out), 8);
        assert_eq!(&out[..4], &1.0f32.to_le_bytes());
        assert_eq!(&out[4..], &0.0f32.to_le_bytes());
    }

    #[test]
    fn wraps_around() {
        let ring = AudioRing::new(6);
        ring.write_stereo(1.0, 2.0);
        let mut out = [0.0f32; 2];
        ring.read(&mut out);
        ring.write_stereo(3.0, 4.0);
        ring.write_stereo(5.0, 6.0);
        let mut out = [0.0f32; 4];
        assert_eq!(ring.read(&mut out), 4);
        assert_eq!(out, [3.0, 4.0, 5.0, 6.0]);
    }
}
