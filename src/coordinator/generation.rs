//! Reset-necessity state machine.
//!
//! # State Transitions
//! ```text
//! mark_error()      : error_generation += 1
//! reset_initiated() : acknowledged_generation := error_generation
//! reset_completed() : no change
//! necessary         : error_generation != acknowledged_generation
//! ```
//!
//! An error that arrives between `reset_initiated()` and `reset_completed()`
//! stays visible until the next `reset_initiated()`.

/// Error and acknowledged generation counters.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ResetGenerations {
    error_generation: u64,
    acknowledged_generation: u64,
}

impl ResetGenerations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark_error(&mut self) {
        self.error_generation = self.error_generation.wrapping_add(1);
    }

    pub fn is_reset_necessary(&self) -> bool {
        self.error_generation != self.acknowledged_generation
    }

    /// A reset covering every error seen so far is about to run.
    pub fn reset_initiated(&mut self) {
        self.acknowledged_generation = self.error_generation;
    }

    /// Bookkeeping only; necessity is decided by the generations alone.
    pub fn reset_completed(&mut self) {}

    pub fn error_generation(&self) -> u64 {
        self.error_generation
    }

    pub fn acknowledged_generation(&self) -> u64 {
        self.acknowledged_generation
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_concrete_sequence() {
        let mut g = ResetGenerations::new();
        assert!(!g.is_reset_necessary());
        g.mark_error();
        assert!(g.is_reset_necessary());
        g.reset_initiated();
        assert!(!g.is_reset_necessary());
        g.mark_error();
        assert!(g.is_reset_necessary());
        g.reset_completed();
        assert!(g.is_reset_necessary());
        g.reset_initiated();
        assert!(!g.is_reset_necessary());
        g.reset_completed();
        assert!(!g.is_reset_necessary());
    }

    #[test]
    fn test_matches_reference_model_for_all_short_sequences() {
        // 0 = mark, 1 = initiated, 2 = completed; every sequence up to length 6.
        for len in 0..=6u32 {
            for code in 0..3u32.pow(len) {
                let mut g = ResetGenerations::new();
                let mut error_since_initiated = false;
                let mut c = code;
                for _ in 0..len {
                    match c % 3 {
                        0 => {
                            g.mark_error();
                            error_since_initiated = true;
                        }
                        1 => {
                            g.reset_initiated();
                            error_since_initiated = false;
                        }
                        _ => g.reset_completed(),
                    }
                    c /= 3;
                    assert_eq!(g.is_reset_necessary(), error_since_initiated);
                }
            }
        }
    }
}
