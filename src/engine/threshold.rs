//! Acceptance thresholds derived from the first hop of content scores.

/// Quantile of an ascending slice with linear interpolation between the
/// closest ranks.
pub fn quantile(sorted: &[f64], q: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let q = q.clamp(0.0, 1.0);
    let position = q * (sorted.len() - 1) as f64;
    let lower = position.floor() as usize;
    let upper = position.ceil() as usize;
    let weight = position - lower as f64;
    Some(sorted[lower] + (sorted[upper] - sorted[lower]) * weight)
}

fn sorted_finite(scores: &[f64]) -> Vec<f64> {
    let mut sorted: Vec<f64> = scores.iter().copied().filter(|s| s.is_finite()).collect();
    sorted.sort_by(|a, b| a.total_cmp(b));
    sorted
}

/// Lower boxplot fence: Q25 − 1.5 × IQR.
pub fn outlier_fence(scores: &[f64]) -> Option<f64> {
    let sorted = sorted_finite(scores);
    let q25 = quantile(&sorted, 0.25)?;
    let q75 = quantile(&sorted, 0.75)?;
    Some(q25 - 1.5 * (q75 - q25))
}

/// Smallest score.
pub fn minimum(scores: &[f64]) -> Option<f64> {
    sorted_finite(scores).first().copied()
}
