use super::sma;

/// Bollinger band width, `(upper - lower) / middle`.
///
/// Middle is the SMA over `length`, the bands sit `mult` population standard
/// deviations (ddof = 0) either side. Lower width means a tighter squeeze.
/// Undefined before `length` samples and where the middle band is zero.
pub fn bb_width(closes: &[f64], length: usize, mult: f64) -> Vec<f64> {
    let middle = sma(closes, length);
    middle
        .iter()
        .enumerate()
        .map(|(i, &mid)| {
            if mid.is_nan() || mid == 0.0 {
                return f64::NAN;
            }
            let window = &closes[i + 1 - length..=i];
            let variance = window.iter().map(|x| (x - mid).powi(2)).sum::<f64>() / length as f64;
            let std = variance.sqrt();
            let upper = mid + mult * std;
            let lower = mid - mult * std;
            (upper - lower) / mid
        })
        .collect()
}
