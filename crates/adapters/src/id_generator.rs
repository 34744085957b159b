//! Monotone block ID allocator (C1).
//!
//! A single process-wide counter, refilled in reservation windows seeded
//! from a monotone clock so that a crash-restart never hands out an id an
//! earlier process instance already used. `next_block` is synchronous and
//! holds its mutex for the duration of one increment — no I/O, no await.

use segmentdb_shared::{ErrorCode, ErrorEnvelope, Result};
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

/// Construction parameters for an [`IdGenerator`].
#[derive(Debug, Clone, Copy)]
pub struct IdGeneratorOptions {
    /// How many ids are pre-reserved per clock refill.
    pub reservation_window: u64,
}

impl Default for IdGeneratorOptions {
    fn default() -> Self {
        Self { reservation_window: 1_000_000 }
    }
}

struct IdGeneratorState {
    next: u64,
    window_end: u64,
}

/// Process-wide monotone 64-bit id allocator, block-granular.
///
/// No two successful [`IdGenerator::next_block`] calls ever return
/// overlapping ranges, even under concurrent access — the whole allocation
/// happens under one mutex. Exhaustion of the `u64` space is reported as a
/// typed error rather than silently wrapping around.
pub struct IdGenerator {
    state: Mutex<IdGeneratorState>,
    reservation_window: u64,
}

impl IdGenerator {
    /// Builds a generator seeded from the current monotone clock.
    #[must_use]
    pub fn new(options: IdGeneratorOptions) -> Self {
        let seed = monotone_seed();
        Self {
            state: Mutex::new(IdGeneratorState { next: seed, window_end: seed }),
            reservation_window: options.reservation_window.max(1),
        }
    }

    /// Allocates `n` strictly increasing ids, refilling the reservation
    /// window from the clock when it runs dry.
    ///
    /// # Errors
    /// Returns an error if the id space would be exhausted by this
    /// allocation rather than silently wrapping.
    pub fn next_block(&self, n: u64) -> Result<Vec<i64>> {
        if n == 0 {
            return Ok(Vec::new());
        }

        let mut state = self.lock_state();
        if state.next.checked_add(n).is_none_or(|end| end > state.window_end) {
            self.refill(&mut state, n)?;
        }

        let start = state.next;
        state.next = state.next.checked_add(n).ok_or_else(id_space_exhausted)?;
        tracing::debug!(start, n, "allocated id block");

        (start..state.next)
            .map(|id| i64::try_from(id).map_err(|_| id_space_exhausted()))
            .collect()
    }

    fn refill(&self, state: &mut IdGeneratorState, n: u64) -> Result<()> {
        let seed = monotone_seed().max(state.next);
        let window = self.reservation_window.max(n);
        let window_end = seed.checked_add(window).ok_or_else(id_space_exhausted)?;

        tracing::debug!(seed, window_end, "refilling id reservation window");
        state.next = seed;
        state.window_end = window_end;

        if state.next.checked_add(n).is_none_or(|end| end > state.window_end) {
            tracing::warn!(n, "id generator exhausted even after refill");
            return Err(id_space_exhausted());
        }
        Ok(())
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, IdGeneratorState> {
        self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

fn monotone_seed() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|duration| duration.as_nanos() as u64).unwrap_or(0)
}

fn id_space_exhausted() -> ErrorEnvelope {
    ErrorEnvelope::expected(ErrorCode::capacity_exceeded(), "id generator reservation window exhausted")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn blocks_are_contiguous_and_increasing() {
        let generator = IdGenerator::new(IdGeneratorOptions::default());
        let first = generator.next_block(5).expect("block");
        let second = generator.next_block(3).expect("block");
        assert_eq!(first.len(), 5);
        assert_eq!(second.len(), 3);
        assert!(first.iter().max() < second.iter().min());
    }

    #[test]
    fn zero_length_block_is_empty() {
        let generator = IdGenerator::new(IdGeneratorOptions::default());
        assert!(generator.next_block(0).expect("block").is_empty());
    }

    #[test]
    fn refill_crosses_window_boundary_without_overlap() {
        let generator = IdGenerator::new(IdGeneratorOptions { reservation_window: 4 });
        let a = generator.next_block(3).expect("block");
        let b = generator.next_block(3).expect("block");
        let union: HashSet<_> = a.iter().chain(b.iter()).collect();
        assert_eq!(union.len(), a.len() + b.len());
    }

    #[test]
    fn concurrent_callers_never_overlap() {
        let generator = Arc::new(IdGenerator::new(IdGeneratorOptions::default()));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let generator = Arc::clone(&generator);
                thread::spawn(move || generator.next_block(50).expect("block"))
            })
            .collect();

        let mut all = Vec::new();
        for handle in handles {
            all.extend(handle.join().expect("thread"));
        }
        let unique: HashSet<_> = all.iter().collect();
        assert_eq!(unique.len(), all.len());
    }
}
