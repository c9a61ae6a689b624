use super::ema::smooth;

/// RSI (Relative Strength Index) series.
///
/// Gains and losses are smoothed with an EMA of `com = period - 1`
/// (i.e. `alpha = 1 / period`), seeded at the first delta.
/// Index 0 is `NaN` since no delta exists yet.
///
/// A zero average loss saturates at 100 instead of producing `NaN`,
/// including on perfectly flat input.
pub fn rsi(closes: &[f64], period: usize) -> Vec<f64> {
    if closes.is_empty() {
        return Vec::new();
    }
    if period == 0 {
        return vec![f64::NAN; closes.len()];
    }

    let mut gains = Vec::with_capacity(closes.len());
    let mut losses = Vec::with_capacity(closes.len());
    gains.push(f64::NAN);
    losses.push(f64::NAN);
    for w in closes.windows(2) {
        let change = w[1] - w[0];
        gains.push(change.max(0.0));
        losses.push((-change).max(0.0));
    }

    let com = (period - 1) as f64;
    let alpha = 1.0 / (1.0 + com);
    let avg_gain = smooth(&gains, alpha);
    let avg_loss = smooth(&losses, alpha);

    avg_gain
        .iter()
        .zip(&avg_loss)
        .map(|(&gain, &loss)| {
            if gain.is_nan() || loss.is_nan() {
                f64::NAN
            } else if loss == 0.0 {
                100.0
            } else {
                100.0 - 100.0 / (1.0 + gain / loss)
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rsi_first_value_is_undefined() {
        let out = rsi(&[100.0, 101.0, 102.0], 14);
        assert!(out[0].is_nan());
        assert!(out[1].is_finite());
    }

    #[test]
    fn rsi_all_gains_returns_100() {
        // Strictly increasing prices → RSI = 100
        let prices: Vec<f64> = (0..40).map(|i| 10.0 + i as f64).collect();
        let out = rsi(&prices, 14);
        for v in &out[1..] {
            assert!((v - 100.0).abs() < 1e-9, "Expected ~100, got {v}");
        }
    }

    #[test]
    fn rsi_all_losses_returns_0() {
        // Strictly decreasing prices → RSI = 0
        let prices: Vec<f64> = (0..40).map(|i| 100.0 - i as f64).collect();
        let out = rsi(&prices, 14);
        for v in &out[1..] {
            assert!(v.abs() < 1e-9, "Expected ~0, got {v}");
        }
    }

    #[test]
    fn flat_prices_saturate_instead_of_nan() {
        let out = rsi(&vec![50.0; 20], 14);
        assert!(out[1..].iter().all(|&v| v == 100.0));
    }

    #[test]
    fn rsi_known_value() {
        // period 2 → alpha 0.5
        // deltas: +2, -2 → avg_gain: 2, 1; avg_loss: 0, 1
        let out = rsi(&[10.0, 12.0, 10.0], 2);
        assert_eq!(out[1], 100.0);
        assert!((out[2] - 50.0).abs() < 1e-12, "got {}", out[2]);
    }

    #[test]
    fn rsi_stays_in_range_on_mixed_input() {
        let prices = vec![
            44.34, 44.09, 44.15, 43.61, 44.33, 44.83, 45.10, 45.15, 43.61, 44.33, 44.83, 45.10,
            45.15, 44.34, 44.09,
        ];
        let out = rsi(&prices, 14);
        assert_eq!(out.len(), prices.len());
        for v in &out[1..] {
            assert!((0.0..=100.0).contains(v), "RSI out of range: {v}");
        }
    }
}
