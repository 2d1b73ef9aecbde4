//! Weighted order statistics over simulated scenario rows.

/// Weighted quantile in the inverted-CDF style: rows are sorted by value
/// ascending and the result is the smallest value whose cumulative weight
/// reaches `q` times the total weight. A cumulative weight exactly equal to
/// the target counts as reached.
///
/// Returns `None` for empty input or mismatched slice lengths.
pub fn weighted_quantile(values: &[f64], weights: &[f64], q: f64) -> Option<f64> {
    if values.is_empty() || values.len() != weights.len() {
        return None;
    }

    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| values[a].total_cmp(&values[b]));

    let total: f64 = weights.iter().sum();
    let target = q * total;
    let mut cumulative = 0.0;
    for &i in &order {
        cumulative += weights[i];
        if cumulative >= target {
            return Some(values[i]);
        }
    }
    // Accumulated rounding can leave the final cumulative weight a hair
    // below the target; the largest value is the answer then.
    order.last().map(|&i| values[i])
}
