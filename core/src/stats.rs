//! Small descriptive-statistics helpers for the harness reducers.
//!
//! Conventions:
//!   - `std_dev` is the sample standard deviation (n − 1); `pop_std_dev`
//!     divides by n.
//!   - `quantile` interpolates linearly between order statistics.
//!   - `rank_descending` gives rank 1 to the largest value and averages
//!     ranks across ties.

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample standard deviation. Zero for fewer than two values.
pub fn std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    let ss: f64 = values.iter().map(|v| (v - m).powi(2)).sum();
    (ss / (values.len() - 1) as f64).sqrt()
}

/// Population standard deviation.
pub fn pop_std_dev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let m = mean(values);
    let ss: f64 = values.iter().map(|v| (v - m).powi(2)).sum();
    (ss / values.len() as f64).sqrt()
}

/// Linear-interpolated quantile, `q` in [0, 1].
pub fn quantile(values: &[f64], q: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let pos = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
}

/// Coefficient of variation with a floor on the denominator.
pub fn coefficient_of_variation(values: &[f64], mean_floor: f64) -> f64 {
    std_dev(values) / mean(values).max(mean_floor)
}

/// Ranks with 1 = largest; tied values share the average of their ranks.
pub fn rank_descending(values: &[f64]) -> Vec<f64> {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| values[b].total_cmp(&values[a]));

    let mut ranks = vec![0.0; values.len()];
    let mut i = 0;
    while i < order.len() {
        let mut j = i;
        while j + 1 < order.len() && values[order[j + 1]] == values[order[i]] {
            j += 1;
        }
        // Positions i..=j share ranks (i+1)..=(j+1).
        let avg = (i + j + 2) as f64 / 2.0;
        for &idx in &order[i..=j] {
            ranks[idx] = avg;
        }
        i = j + 1;
    }
    ranks
}

/// Most frequent value; the smallest one wins among equally frequent values.
pub fn mode(values: &[f64]) -> Option<f64> {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mut best: Option<(f64, usize)> = None;
    let mut i = 0;
    while i < sorted.len() {
        let mut j = i;
        while j < sorted.len() && sorted[j] == sorted[i] {
            j += 1;
        }
        let count = j - i;
        if best.map_or(true, |(_, c)| count > c) {
            best = Some((sorted[i], count));
        }
        i = j;
    }
    best.map(|(v, _)| v)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_and_population_std() {
        let v = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert!((pop_std_dev(&v) - 2.0).abs() < 1e-12);
        assert!((std_dev(&v) - 2.138_089_935_299_395).abs() < 1e-9);
        assert_eq!(std_dev(&[3.0]), 0.0);
    }

    #[test]
    fn quantile_interpolates() {
        let v = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert_eq!(quantile(&v, 0.0), 1.0);
        assert_eq!(quantile(&v, 0.5), 3.0);
        assert_eq!(quantile(&v, 1.0), 5.0);
        assert!((quantile(&v, 0.05) - 1.2).abs() < 1e-12);
        assert!((quantile(&v, 0.95) - 4.8).abs() < 1e-12);
    }

    #[test]
    fn ranks_average_ties() {
        let r = rank_descending(&[10.0, 30.0, 20.0, 30.0]);
        assert_eq!(r, vec![4.0, 1.5, 3.0, 1.5]);
    }

    #[test]
    fn mode_prefers_smallest_on_tie() {
        assert_eq!(mode(&[3.0, 1.0, 3.0, 1.0, 2.0]), Some(1.0));
        assert_eq!(mode(&[2.0, 2.0, 5.0]), Some(2.0));
        assert_eq!(mode(&[]), None);
    }

    #[test]
    fn cv_uses_floor() {
        assert_eq!(coefficient_of_variation(&[0.0, 0.0], 1.0), 0.0);
        let cv = coefficient_of_variation(&[9.0, 11.0], 1.0);
        assert!((cv - 2f64.sqrt() / 10.0).abs() < 1e-12);
    }
}
