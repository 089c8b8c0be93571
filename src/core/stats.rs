//! Statistics helpers shared by the matrix and the flat list engines.
//!
//! Everything here is a pure function. Both engines derive ipm and interval
//! values only through these helpers so the two views round identically.

use lazy_static::lazy_static;
use regex::Regex;

use crate::core::types::AlphaLevel;

lazy_static! {
    static ref NON_NEGATIVE_INT: Regex = Regex::new(r"^(0|[1-9][0-9]*)$").unwrap();
}

/// Wilson score interval of the proportion `successes / total`
///
/// Returns `(low, high)` on the proportion scale; callers rescale to raw
/// counts or per-million units. The bounds always bracket the proportion;
/// a zero `total` yields `(0.0, 0.0)`.
pub fn wilson_conf_interval(successes: u64, total: u64, alpha: AlphaLevel) -> (f64, f64) {
    if total == 0 {
        return (0.0, 0.0);
    }
    let n = total as f64;
    let p = (successes as f64 / n).min(1.0);
    let z = alpha.z_score();
    let z2 = z * z;
    let denom = 1.0 + z2 / n;
    let centre = (p + z2 / (2.0 * n)) / denom;
    let half = z * (p * (1.0 - p) / n + z2 / (4.0 * n * n)).sqrt() / denom;
    // cancellation can leave the bounds a few ulps on the wrong side of p
    ((centre - half).clamp(0.0, p), (centre + half).clamp(p, 1.0))
}

/// Round to two decimal places
pub fn round_float(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// Instances per million, rounded to two decimal places
pub fn calc_ipm(abs_freq: u64, total_size: u64) -> f64 {
    if total_size == 0 {
        return 0.0;
    }
    (abs_freq as f64 / total_size as f64 * 1e6 * 100.0).round() / 100.0
}

/// Accepts non-negative integers without leading zeros
pub fn validate_min_abs_freq_attr(v: &str) -> bool {
    NON_NEGATIVE_INT.is_match(v)
}

pub fn validate_percentile(v: &str) -> bool {
    if !validate_min_abs_freq_attr(v) {
        return false;
    }
    match v.parse::<f64>() {
        Ok(p) => p > 0.0 && p <= 100.0,
        Err(_) => false,
    }
}

/// Structural attributes use the dotted `struct.attr` notation
pub fn is_struct_attr(name: &str) -> bool {
    name.contains('.')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wilson_known_values() {
        // 10 of 100 at alpha 0.05
        let (low, high) = wilson_conf_interval(10, 100, AlphaLevel::Level5);
        assert!((low - 0.05523).abs() < 1e-4, "low = {low}");
        assert!((high - 0.17437).abs() < 1e-4, "high = {high}");
    }

    #[test]
    fn test_wilson_extremes() {
        let (low, high) = wilson_conf_interval(0, 50, AlphaLevel::Level5);
        assert_eq!(low, 0.0);
        assert!(high > 0.0 && high < 1.0);

        let (low, high) = wilson_conf_interval(50, 50, AlphaLevel::Level5);
        assert!(low > 0.0 && low < 1.0);
        assert_eq!(high, 1.0);

        assert_eq!(wilson_conf_interval(0, 0, AlphaLevel::Level5), (0.0, 0.0));
    }

    #[test]
    fn test_wilson_zero_successes_exact_at_every_alpha() {
        for alpha in AlphaLevel::ALL {
            for total in [1, 3, 7, 50, 1000, 123_457] {
                let (low, high) = wilson_conf_interval(0, total, alpha);
                assert_eq!(low, 0.0, "total {total} alpha {alpha}");
                assert!(high > 0.0);
                let (low, high) = wilson_conf_interval(total, total, alpha);
                assert_eq!(high, 1.0, "total {total} alpha {alpha}");
                assert!(low < 1.0);
            }
        }
    }

    #[test]
    fn test_wilson_widens_with_smaller_alpha() {
        let narrow = wilson_conf_interval(30, 400, AlphaLevel::Level10);
        let wide = wilson_conf_interval(30, 400, AlphaLevel::Level01);
        assert!(wide.0 < narrow.0);
        assert!(wide.1 > narrow.1);
    }

    #[test]
    fn test_round_float_and_ipm() {
        assert_eq!(round_float(1.23456), 1.23);
        assert_eq!(round_float(2.005001), 2.01);
        assert_eq!(calc_ipm(10, 100), 100000.0);
        assert_eq!(calc_ipm(1, 3_000_000), 0.33);
        assert_eq!(calc_ipm(5, 0), 0.0);
    }

    #[test]
    fn test_validate_min_abs_freq_attr() {
        assert!(validate_min_abs_freq_attr("0"));
        assert!(validate_min_abs_freq_attr("15"));
        assert!(!validate_min_abs_freq_attr("015"));
        assert!(!validate_min_abs_freq_attr("-1"));
        assert!(!validate_min_abs_freq_attr("1.5"));
        assert!(!validate_min_abs_freq_attr(""));
        assert!(!validate_min_abs_freq_attr(" 3"));
    }

    #[test]
    fn test_validate_percentile() {
        assert!(validate_percentile("1"));
        assert!(validate_percentile("100"));
        assert!(!validate_percentile("0"));
        assert!(!validate_percentile("101"));
        assert!(!validate_percentile("50.5"));
    }

    #[test]
    fn test_is_struct_attr() {
        assert!(is_struct_attr("doc.author"));
        assert!(!is_struct_attr("lemma"));
    }
}
