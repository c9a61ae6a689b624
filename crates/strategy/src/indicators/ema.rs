/// Exponential moving average over the whole input, smoothing factor `2 / (period + 1)`.
///
/// Adjust-free recursive form seeded with the first sample: `ema[0] = x[0]`.
/// Leading `NaN` inputs stay `NaN` and the recursion starts at the first finite sample.
pub fn ema(values: &[f64], period: usize) -> Vec<f64> {
    if period == 0 {
        return vec![f64::NAN; values.len()];
    }
    smooth(values, 2.0 / (period as f64 + 1.0))
}

/// Wilder smoothing: the same recursion with `alpha = 1 / period`.
pub fn wilder(values: &[f64], period: usize) -> Vec<f64> {
    if period == 0 {
        return vec![f64::NAN; values.len()];
    }
    smooth(values, 1.0 / period as f64)
}

/// `out[i] = out[i-1] + alpha * (x[i] - out[i-1])`, seeded at the first finite sample.
pub(crate) fn smooth(values: &[f64], alpha: f64) -> Vec<f64> {
    let mut out = Vec::with_capacity(values.len());
    let mut prev: Option<f64> = None;
    for &x in values {
        let next = match prev {
            None if x.is_finite() => Some(x),
            None => None,
            Some(p) if x.is_finite() => Some(p + alpha * (x - p)),
            Some(p) => Some(p),
        };
        out.push(next.unwrap_or(f64::NAN));
        prev = next;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ema_first_value_equals_first_sample() {
        let out = ema(&[42.0, 43.0, 44.0], 21);
        assert_eq!(out[0], 42.0);
    }

    #[test]
    fn ema_of_constant_series_is_constant() {
        let out = ema(&vec![7.5; 200], 50);
        assert_eq!(out[0], 7.5);
        for v in out {
            assert!((v - 7.5).abs() < 1e-12, "got {v}");
        }
    }

    #[test]
    fn ema_follows_recursive_form() {
        // alpha = 2 / (3 + 1) = 0.5
        let out = ema(&[10.0, 20.0, 20.0], 3);
        assert_eq!(out, vec![10.0, 15.0, 17.5]);
    }

    #[test]
    fn ema_shorter_period_tracks_rising_input_more_closely() {
        let prices: Vec<f64> = (0..120).map(|i| 100.0 + i as f64).collect();
        let fast = ema(&prices, 21);
        let slow = ema(&prices, 50);
        let slowest = ema(&prices, 100);
        for i in 1..prices.len() {
            assert!(fast[i] > slow[i] && slow[i] > slowest[i], "index {i}");
        }
    }

    #[test]
    fn leading_nan_is_skipped() {
        let out = wilder(&[f64::NAN, 4.0, 8.0], 2);
        assert!(out[0].is_nan());
        assert_eq!(out[1], 4.0);
        assert_eq!(out[2], 6.0);
    }

    #[test]
    fn input_is_not_mutated() {
        let prices = vec![1.0, 2.0, 3.0];
        let _ = ema(&prices, 2);
        assert_eq!(prices, vec![1.0, 2.0, 3.0]);
    }
}
