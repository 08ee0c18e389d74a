/// Descriptive statistics shared by the growth analyzer, the Monte Carlo
/// model and the consensus aggregator.
///
/// All helpers are total: empty or degenerate input yields `0.0` or `None`
/// rather than NaN, so callers never have to filter NaN back out.

/// Compute the mean of a data slice.
pub fn mean(data: &[f64]) -> f64 {
    if data.is_empty() {
        return 0.0;
    }
    data.iter().sum::<f64>() / data.len() as f64
}

/// Compute population standard deviation (divides by N).
pub fn population_std_dev(data: &[f64]) -> f64 {
    if data.is_empty() {
        return 0.0;
    }
    let m = mean(data);
    let variance = data.iter().map(|x| (x - m).powi(2)).sum::<f64>() / data.len() as f64;
    variance.sqrt()
}

/// Population standard deviation divided by the absolute mean.
/// Returns `None` when the mean is too close to zero to be meaningful.
pub fn coefficient_of_variation(data: &[f64]) -> Option<f64> {
    if data.is_empty() {
        return None;
    }
    let m = mean(data);
    if m.abs() < f64::EPSILON {
        return None;
    }
    Some(population_std_dev(data) / m.abs())
}

/// Percentile (0-100 scale) of data already sorted ascending, with linear
/// interpolation between closest ranks. Callers that need several
/// percentiles of one sample sort once and use this.
pub fn percentile_sorted(sorted: &[f64], pct: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let rank = (pct.clamp(0.0, 100.0) / 100.0) * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    if lower == upper {
        return sorted[lower];
    }
    let weight = rank - lower as f64;
    sorted[lower] * (1.0 - weight) + sorted[upper] * weight
}

/// Smallest and largest value, ignoring nothing (input is assumed finite).
pub fn min_max(data: &[f64]) -> Option<(f64, f64)> {
    let first = *data.first()?;
    Some(
        data.iter()
            .fold((first, first), |(lo, hi), &x| (lo.min(x), hi.max(x))),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_mean_and_std() {
        let data = vec![2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert_relative_eq!(mean(&data), 5.0);
        assert_relative_eq!(population_std_dev(&data), 2.0);
        assert_eq!(mean(&[]), 0.0);
        assert_eq!(population_std_dev(&[]), 0.0);
    }

    #[test]
    fn test_coefficient_of_variation() {
        assert_relative_eq!(coefficient_of_variation(&[10.0, 10.0, 10.0]).unwrap(), 0.0);
        let cv = coefficient_of_variation(&[90.0, 110.0]).unwrap();
        assert_relative_eq!(cv, 0.1, epsilon = 1e-12);
        assert!(coefficient_of_variation(&[-1.0, 1.0]).is_none());
        assert!(coefficient_of_variation(&[]).is_none());
    }

    #[test]
    fn test_percentile_interpolates() {
        let data = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        assert_relative_eq!(percentile_sorted(&data, 50.0), 3.0);
        assert_relative_eq!(percentile_sorted(&data, 0.0), 1.0);
        assert_relative_eq!(percentile_sorted(&data, 100.0), 5.0);
        assert_relative_eq!(percentile_sorted(&data, 10.0), 1.4, epsilon = 1e-12);
        assert_eq!(percentile_sorted(&[], 50.0), 0.0);
    }

    #[test]
    fn test_min_max() {
        assert_eq!(min_max(&[3.0, -1.0, 8.0]), Some((-1.0, 8.0)));
        assert_eq!(min_max(&[]), None);
    }
}
