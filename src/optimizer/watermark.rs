use std::sync::atomic::{AtomicU64, Ordering};

/// The acceptance cutoff: workers compare a candidate's objective against
/// this without touching the result-collection mutex. Monotonically
/// non-increasing, backed by the `f64`-as-bits compare-and-swap idiom used
/// throughout `stats::Statistics`.
pub struct AtomicCutoff {
    bits: AtomicU64,
}

impl AtomicCutoff {
    pub fn new() -> Self {
        Self {
            bits: AtomicU64::new(f64::INFINITY.to_bits()),
        }
    }

    pub fn load(&self) -> f64 {
        f64::from_bits(self.bits.load(Ordering::Acquire))
    }

    /// Lowers the cutoff to `value` if it's an improvement; a no-op
    /// otherwise.
    pub fn tighten(&self, value: f64) {
        let mut current = self.bits.load(Ordering::Acquire);
        while value < f64::from_bits(current) {
            match self
                .bits
                .compare_exchange_weak(current, value.to_bits(), Ordering::AcqRel, Ordering::Acquire)
            {
                Ok(_) => break,
                Err(observed) => current = observed,
            }
        }
    }
}

impl Default for AtomicCutoff {
    fn default() -> Self {
        Self::new()
    }
}
