use super::sma;

/// Relative volume: current volume over the SMA of the trailing `period`
/// volumes, current bar included. Undefined until `period` samples exist,
/// and where the trailing average is zero.
pub fn rvol(volumes: &[f64], period: usize) -> Vec<f64> {
    sma(volumes, period)
        .iter()
        .zip(volumes)
        .map(|(&avg, &vol)| if avg > 0.0 { vol / avg } else { f64::NAN })
        .collect()
}
