//! Shared guardrails for token budgets.

/// Smallest accepted global token ceiling. Keeps `max_len / 4` positive.
pub const MIN_TOKEN_BUDGET: usize = 64;
pub const MAX_TOKEN_BUDGET: usize = 1_000_000;

/// Each expansion round may spend at most this fraction of the ceiling.
pub const ROUND_BUDGET_DIVISOR: usize = 4;

pub fn clamp_budget(value: usize, minimum: usize, maximum: usize) -> usize {
    value.max(minimum).min(maximum)
}

pub fn round_budget(max_len: usize) -> i64 {
    (max_len / ROUND_BUDGET_DIVISOR) as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_budget() {
        assert_eq!(clamp_budget(10, 64, 100), 64);
        assert_eq!(clamp_budget(500, 64, 100), 100);
        assert_eq!(clamp_budget(80, 64, 100), 80);
    }

    #[test]
    fn test_round_budget_is_quarter() {
        assert_eq!(round_budget(1000), 250);
        assert_eq!(round_budget(16384), 4096);
        assert_eq!(round_budget(1001), 250);
    }
}
