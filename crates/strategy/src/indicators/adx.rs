use super::ema::wilder;

/// ADX / DMI output columns, each the length of the input.
#[derive(Debug, Clone, PartialEq)]
pub struct AdxSeries {
    pub adx: Vec<f64>,
    pub plus_di: Vec<f64>,
    pub minus_di: Vec<f64>,
}

/// ADX (Average Directional Index) with Wilder smoothing (`alpha = 1 / period`).
///
/// Algorithm:
/// 1. +DM = up-move when it is positive and not smaller than the down-move, else 0 (mirrored for -DM)
/// 2. True range = max(high - low, |high - prev_close|, |low - prev_close|)
/// 3. Wilder-smooth +DM, -DM and TR
/// 4. ±DI = 100 * smoothed(±DM) / smoothed(TR)
/// 5. DX = 100 * |+DI - -DI| / (+DI + -DI)
/// 6. ADX = Wilder-smoothed DX
///
/// Index 0 is `NaN` (no previous bar). Zero denominators yield 0 rather than `NaN`.
pub fn adx(high: &[f64], low: &[f64], close: &[f64], period: usize) -> AdxSeries {
    let n = high.len().min(low.len()).min(close.len());
    if n == 0 || period == 0 {
        return AdxSeries {
            adx: vec![f64::NAN; n],
            plus_di: vec![f64::NAN; n],
            minus_di: vec![f64::NAN; n],
        };
    }

    let mut plus_dm = vec![f64::NAN; n];
    let mut minus_dm = vec![f64::NAN; n];
    let mut tr = vec![f64::NAN; n];
    for i in 1..n {
        let up = high[i] - high[i - 1];
        let down = low[i - 1] - low[i];
        // An equal up and down move counts toward both sides.
        plus_dm[i] = if up > 0.0 && up >= down { up } else { 0.0 };
        minus_dm[i] = if down > 0.0 && down >= up { down } else { 0.0 };

        let prev_close = close[i - 1];
        tr[i] = (high[i] - low[i])
            .max((high[i] - prev_close).abs())
            .max((low[i] - prev_close).abs());
    }

    let smoothed_plus = wilder(&plus_dm, period);
    let smoothed_minus = wilder(&minus_dm, period);
    let smoothed_tr = wilder(&tr, period);

    let mut plus_di = vec![f64::NAN; n];
    let mut minus_di = vec![f64::NAN; n];
    let mut dx = vec![f64::NAN; n];
    for i in 1..n {
        let (p, m) = if smoothed_tr[i] > 0.0 {
            (
                100.0 * smoothed_plus[i] / smoothed_tr[i],
                100.0 * smoothed_minus[i] / smoothed_tr[i],
            )
        } else {
            (0.0, 0.0)
        };
        plus_di[i] = p;
        minus_di[i] = m;
        let sum = p + m;
        dx[i] = if sum > 0.0 { 100.0 * (p - m).abs() / sum } else { 0.0 };
    }

    AdxSeries {
        adx: wilder(&dx, period),
        plus_di,
        minus_di,
    }
}
