//! Unbiased pass@k estimator
//!
//! For one problem with `n` recorded test attempts of which `c` succeeded,
//! pass@k is the probability that at least one of `k` attempts drawn without
//! replacement succeeds:
//!
//! ```text
//! pass@k = 1 - C(n - c, k) / C(n, k)
//! ```
//!
//! `C(a, b)` is taken as 0 when `a < 0`, `b < 0` or `b > a`, so a problem with
//! fewer than `k` failures scores 1.0.

/// Estimate pass@k from attempt counts.
///
/// Returns 0.0 when there is no signal (`n == 0`, `c == 0`) or when `k`
/// exceeds the sample size.
pub fn unbiased_pass_at_k(n: u64, c: u64, k: u32) -> f64 {
    let k = u64::from(k);
    if n == 0 || c == 0 || k > n {
        return 0.0;
    }

    // c > n is malformed input; C(n - c, k) is then 0 like any negative top.
    let failures = match n.checked_sub(c) {
        Some(f) if f >= k => f,
        _ => return 1.0,
    };

    // C(f, k) / C(n, k) = prod_{i<k} (f - i) / (n - i), never materialized
    // as a full binomial so large n cannot overflow.
    let ratio = (0..k).fold(1.0_f64, |acc, i| {
        acc * (failures - i) as f64 / (n - i) as f64
    });

    (1.0 - ratio).clamp(0.0, 1.0)
}
