//! Pure jitter and backoff functions. No clocks, no I/O — every periodic or
//! retrying component in this crate composes these instead of rolling its
//! own randomized delay.

use rand::Rng;

/// Uniform value in `[base*(1-factor), base*(1+factor)]`. `factor` is
/// clamped to `[0, 1]`; `factor == 0.0` returns `base` exactly.
pub fn jitter(base_ms: u64, factor: f64) -> u64 {
    let factor = factor.clamp(0.0, 1.0);
    if factor == 0.0 {
        return base_ms;
    }
    let base = base_ms as f64;
    let low = base * (1.0 - factor);
    let high = base * (1.0 + factor);
    if low >= high {
        return base_ms;
    }
    rand::thread_rng().gen_range(low..=high).round() as u64
}

/// Uniform value in `[0, max_ms]`.
pub fn full_jitter(max_ms: u64) -> u64 {
    if max_ms == 0 {
        return 0;
    }
    rand::thread_rng().gen_range(0..=max_ms)
}

/// Uniform value in `[base_ms, min(max_ms, previous_ms*3)]`. `previous_ms`
/// absent is treated as `base_ms`. Always within `[base_ms, max_ms]`.
pub fn decorrelated_jitter(base_ms: u64, max_ms: u64, previous_ms: Option<u64>) -> u64 {
    let previous = previous_ms.unwrap_or(base_ms);
    let ceiling = max_ms.min(previous.saturating_mul(3)).max(base_ms);
    if base_ms >= ceiling {
        return base_ms.min(max_ms);
    }
    rand::thread_rng().gen_range(base_ms..=ceiling)
}

/// `min(base_ms * 2^attempt, max_ms)`, then jittered by `factor` (default
/// call sites pass `0.2`).
pub fn exp_backoff(attempt: u32, base_ms: u64, max_ms: u64, factor: f64) -> u64 {
    let exp = base_ms.saturating_mul(1u64.checked_shl(attempt).unwrap_or(u64::MAX).max(1));
    let capped = exp.min(max_ms);
    jitter(capped, factor)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jitter_zero_factor_is_exact() {
        for _ in 0..20 {
            assert_eq!(jitter(1000, 0.0), 1000);
        }
    }

    #[test]
    fn jitter_stays_in_bounds() {
        for _ in 0..500 {
            let v = jitter(1000, 0.3) as f64;
            assert!(v >= 700.0 && v <= 1300.0, "jitter out of bounds: {v}");
        }
    }

    #[test]
    fn jitter_clamps_factor_above_one() {
        for _ in 0..200 {
            let v = jitter(1000, 5.0);
            assert!(v <= 2000 && v == v);
        }
    }

    #[test]
    fn full_jitter_bounds() {
        for _ in 0..500 {
            let v = full_jitter(250);
            assert!(v <= 250);
        }
        assert_eq!(full_jitter(0), 0);
    }

    #[test]
    fn decorrelated_jitter_bounds_and_floor() {
        for _ in 0..500 {
            let v = decorrelated_jitter(100, 1000, Some(200));
            assert!(v >= 100 && v <= 600, "out of bounds: {v}");
        }
    }

    #[test]
    fn decorrelated_jitter_defaults_previous_to_base() {
        for _ in 0..200 {
            let v = decorrelated_jitter(100, 1000, None);
            assert!(v >= 100 && v <= 300);
        }
    }

    #[test]
    fn decorrelated_jitter_never_exceeds_max() {
        for _ in 0..200 {
            let v = decorrelated_jitter(100, 500, Some(10_000));
            assert!(v <= 500);
        }
    }

    #[test]
    fn exp_backoff_grows_then_caps() {
        let b0 = exp_backoff(0, 100, 1000, 0.0);
        let b1 = exp_backoff(1, 100, 1000, 0.0);
        let b2 = exp_backoff(2, 100, 1000, 0.0);
        let b5 = exp_backoff(5, 100, 1000, 0.0);
        assert_eq!(b0, 100);
        assert_eq!(b1, 200);
        assert_eq!(b2, 400);
        assert_eq!(b5, 1000);
    }

    #[test]
    fn exp_backoff_law_holds_until_cap() {
        let factor = 0.2;
        let base = 100;
        let max = 100_000;
        for attempt in 0..5 {
            let lo_bound =
                exp_backoff(attempt, base, max, 0.0) as f64 * (1.0 - factor) / (1.0 + factor);
            let next = exp_backoff(attempt + 1, base, max, factor);
            assert!(
                next as f64 >= lo_bound - 1.0,
                "attempt {attempt}: next={next} lo_bound={lo_bound}"
            );
        }
    }
}
