//! Deterministic RNG for pinning protocol nonces in tests.

use std::collections::VecDeque;

use rand::RngCore;

/// RNG that replays a scripted sequence of values.
///
/// Values are consumed per `next_u64` call (`next_u32` truncates one
/// value); once the script runs out, a counter keeps the RNG usable for
/// draws the test does not care about.
pub struct ScriptedRng {
    script: VecDeque<u64>,
    fallback: u64,
}

impl ScriptedRng {
    /// Replay `values`, then fall back to a counter.
    #[must_use]
    pub fn new(values: &[u64]) -> Self {
        Self { script: values.iter().copied().collect(), fallback: 0x1000 }
    }
}

impl RngCore for ScriptedRng {
    fn next_u32(&mut self) -> u32 {
        self.next_u64() as u32
    }

    fn next_u64(&mut self) -> u64 {
        self.script.pop_front().unwrap_or_else(|| {
            self.fallback = self.fallback.wrapping_add(1);
            self.fallback
        })
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        for chunk in dest.chunks_mut(8) {
            let bytes = self.next_u64().to_le_bytes();
            chunk.copy_from_slice(&bytes[..chunk.len()]);
        }
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
        self.fill_bytes(dest);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replays_script_then_counts() {
        let mut rng = ScriptedRng::new(&[7, 8]);
        assert_eq!(rng.next_u64(), 7);
        assert_eq!(rng.next_u32(), 8);
        let a = rng.next_u64();
        let b = rng.next_u64();
        assert_eq!(b, a + 1);
    }
}
