//! Window statistics
//!
//! Small numerical kernels over a window of samples. Every function returns
//! `None` instead of a non-finite number: too few samples, zero variance and
//! overflow all come back as "undefined".

/// Relative tolerance under which a standard deviation counts as zero.
///
/// A constant series rarely yields an exact 0.0 after the mean is
/// subtracted, so dispersion is compared against the magnitude of the data.
const DEGENERATE_TOLERANCE: f64 = 1e-12;

/// Least-squares line `y = intercept + slope * x`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Regression {
    pub slope: f64,
    pub intercept: f64,
}

pub fn mean(xs: &[f64]) -> Option<f64> {
    if xs.is_empty() {
        return None;
    }
    finite(xs.iter().sum::<f64>() / xs.len() as f64)
}

/// Sample standard deviation (n − 1 denominator); `None` if degenerate
pub fn sample_std(xs: &[f64]) -> Option<f64> {
    if xs.len() < 2 {
        return None;
    }
    let m = mean(xs)?;
    let ss: f64 = xs.iter().map(|x| (x - m).powi(2)).sum();
    let sd = finite((ss / (xs.len() - 1) as f64).sqrt())?;
    (!is_degenerate(sd, xs)).then_some(sd)
}

/// Z-score of the last sample against the whole window (which includes it)
pub fn z_score(window: &[f64]) -> Option<f64> {
    let last = *window.last()?;
    let m = mean(window)?;
    let sd = sample_std(window)?;
    finite((last - m) / sd)
}

/// Ordinary least squares of `ys` on `xs` with intercept
///
/// `None` when fewer than two points, lengths differ, or `xs` is constant.
pub fn ols(xs: &[f64], ys: &[f64]) -> Option<Regression> {
    if xs.len() != ys.len() || xs.len() < 2 {
        return None;
    }
    let mx = mean(xs)?;
    let my = mean(ys)?;

    let mut sxx = 0.0;
    let mut sxy = 0.0;
    for (x, y) in xs.iter().zip(ys) {
        let dx = x - mx;
        sxx += dx * dx;
        sxy += dx * (y - my);
    }

    let sd_x = (sxx / (xs.len() - 1) as f64).sqrt();
    if !sd_x.is_finite() || is_degenerate(sd_x, xs) {
        return None;
    }

    let slope = finite(sxy / sxx)?;
    let intercept = finite(my - slope * mx)?;
    Some(Regression { slope, intercept })
}

/// Pearson correlation; `None` when either side has zero variance
pub fn pearson(xs: &[f64], ys: &[f64]) -> Option<f64> {
    if xs.len() != ys.len() || xs.len() < 2 {
        return None;
    }
    let sd_x = sample_std(xs)?;
    let sd_y = sample_std(ys)?;
    let mx = mean(xs)?;
    let my = mean(ys)?;

    let cov: f64 = xs
        .iter()
        .zip(ys)
        .map(|(x, y)| (x - mx) * (y - my))
        .sum::<f64>()
        / (xs.len() - 1) as f64;

    finite((cov / (sd_x * sd_y)).clamp(-1.0, 1.0))
}

fn finite(v: f64) -> Option<f64> {
    v.is_finite().then_some(v)
}

fn is_degenerate(sd: f64, xs: &[f64]) -> bool {
    let scale = xs.iter().fold(0.0_f64, |acc, x| acc.max(x.abs())).max(1.0);
    sd <= DEGENERATE_TOLERANCE * scale
}
