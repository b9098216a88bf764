//! Numeric series primitives
//!
//! A [`Series`] is aligned with the bars it was derived from: index `i` always
//! refers to bar `i`. Missing values are `None` and propagate through every
//! primitive; no window ever looks ahead of its own index.

pub type Series = Vec<Option<f64>>;

/// Keep finite values only
#[inline]
pub fn finite(value: f64) -> Option<f64> {
    value.is_finite().then_some(value)
}

/// Apply `agg` to each trailing window of `window` values.
///
/// The output is missing while fewer than `window` values are available or
/// when any value inside the window is missing.
pub fn rolling<F>(values: &[Option<f64>], window: usize, agg: F) -> Series
where
    F: Fn(&[f64]) -> Option<f64>,
{
    let mut out = vec![None; values.len()];
    if window == 0 {
        return out;
    }
    let mut buf = Vec::with_capacity(window);
    for i in (window - 1)..values.len() {
        buf.clear();
        buf.extend(values[i + 1 - window..=i].iter().map_while(|v| *v));
        if buf.len() == window {
            out[i] = agg(&buf).and_then(finite);
        }
    }
    out
}

pub fn rolling_sum(values: &[Option<f64>], window: usize) -> Series {
    rolling(values, window, |w| Some(w.iter().sum()))
}

pub fn rolling_mean(values: &[Option<f64>], window: usize) -> Series {
    rolling(values, window, |w| Some(w.iter().sum::<f64>() / w.len() as f64))
}

/// Sample standard deviation (n - 1 denominator); undefined for a window of 1
pub fn rolling_std(values: &[Option<f64>], window: usize) -> Series {
    rolling(values, window, |w| {
        if w.len() < 2 {
            return None;
        }
        let n = w.len() as f64;
        let mean = w.iter().sum::<f64>() / n;
        let var = w.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n - 1.0);
        Some(var.sqrt())
    })
}

pub fn rolling_min(values: &[Option<f64>], window: usize) -> Series {
    rolling(values, window, |w| w.iter().copied().reduce(f64::min))
}

pub fn rolling_max(values: &[Option<f64>], window: usize) -> Series {
    rolling(values, window, |w| w.iter().copied().reduce(f64::max))
}

/// Linearly weighted mean, weights 1..=window with the newest value heaviest
pub fn rolling_weighted_mean(values: &[Option<f64>], window: usize) -> Series {
    rolling(values, window, |w| {
        let (num, den) = w
            .iter()
            .enumerate()
            .fold((0.0, 0.0), |(num, den), (i, x)| {
                let weight = (i + 1) as f64;
                (num + weight * x, den + weight)
            });
        Some(num / den)
    })
}

/// Exponentially weighted mean with smoothing `2 / (span + 1)`.
///
/// Weights are normalized over the history seen so far, so the first
/// present value is the mean of itself and early outputs are not pulled
/// toward the seed. A missing input yields a missing output; it still ages
/// the earlier observations by one step.
pub fn ewm(values: &[Option<f64>], span: usize) -> Series {
    let mut out = vec![None; values.len()];
    if span == 0 {
        return out;
    }
    let decay = 1.0 - 2.0 / (span as f64 + 1.0);
    let mut mean: Option<f64> = None;
    // sum of the weights currently in play
    let mut weight = 0.0;
    for (i, value) in values.iter().enumerate() {
        let Some(x) = value else {
            if mean.is_some() {
                weight *= decay;
            }
            continue;
        };
        weight = 1.0 + decay * weight;
        let next = match mean {
            None => *x,
            // increment form keeps a constant input exactly constant
            Some(prev) => prev + (x - prev) / weight,
        };
        mean = Some(next);
        out[i] = finite(next);
    }
    out
}

/// Lag a series by `periods` bars
pub fn shift(values: &[Option<f64>], periods: usize) -> Series {
    (0..values.len())
        .map(|i| i.checked_sub(periods).and_then(|j| values[j]))
        .collect()
}

/// Difference against the value `periods` bars earlier
pub fn diff(values: &[Option<f64>], periods: usize) -> Series {
    zip_with(values, &shift(values, periods), |a, b| a - b)
}

/// Running sum; missing positions stay missing but do not reset the total
pub fn cumsum(values: &[Option<f64>]) -> Series {
    let mut total = 0.0;
    values
        .iter()
        .map(|v| {
            v.map(|x| {
                total += x;
                total
            })
        })
        .collect()
}

/// Element-wise combination of two aligned series
pub fn zip_with<F>(a: &[Option<f64>], b: &[Option<f64>], f: F) -> Series
where
    F: Fn(f64, f64) -> f64,
{
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| match (x, y) {
            (Some(x), Some(y)) => finite(f(*x, *y)),
            _ => None,
        })
        .collect()
}

pub fn map<F>(a: &[Option<f64>], f: F) -> Series
where
    F: Fn(f64) -> f64,
{
    a.iter().map(|x| x.and_then(|x| finite(f(x)))).collect()
}

/// Last value of a series, if present
pub fn last(values: &[Option<f64>]) -> Option<f64> {
    values.last().copied().flatten()
}

/// Value `back` bars before the end (`back = 0` is the last value)
pub fn from_end(values: &[Option<f64>], back: usize) -> Option<f64> {
    values
        .len()
        .checked_sub(back + 1)
        .and_then(|i| values[i])
}

/// Least-squares slope and intercept of `ys` against 0, 1, 2, ...
pub fn linear_fit(ys: &[f64]) -> Option<(f64, f64)> {
    if ys.len() < 2 {
        return None;
    }
    let n = ys.len() as f64;
    let mean_x = (n - 1.0) / 2.0;
    let mean_y = ys.iter().sum::<f64>() / n;
    let (mut sxy, mut sxx) = (0.0, 0.0);
    for (i, y) in ys.iter().enumerate() {
        let dx = i as f64 - mean_x;
        sxy += dx * (y - mean_y);
        sxx += dx * dx;
    }
    let slope = sxy / sxx;
    Some((slope, mean_y - slope * mean_x))
}
