// ============================================================
// Layer 5: Clustering Evaluation
// ============================================================
// Scores DCC assignments against the ground-truth labels that
// came with the dataset.
//
//   ARI  - Adjusted Rand Index, in [-1, 1]; 0 is chance level,
//          1 is a perfect match
//   NMI  - Normalized Mutual Information, in [0, 1]
//          NMI(U, V) = 2 * I(U; V) / (H(U) + H(V))
//
// Both only compare partitions, so cluster ids need not match
// class ids.
//
// Reference: Hubert & Arabie (1985), Strehl & Ghosh (2002)

use std::collections::HashMap;

/// Adjusted Rand Index between predicted and true partitions.
pub fn ari(pred: &[usize], truth: &[usize]) -> f64 {
    if pred.len() != truth.len() || pred.len() < 2 {
        return 0.0;
    }
    let joint = contingency(pred, truth);

    let mut row_sums: HashMap<usize, usize> = HashMap::new();
    let mut col_sums: HashMap<usize, usize> = HashMap::new();
    for (&(p, t), &count) in &joint {
        *row_sums.entry(p).or_insert(0) += count;
        *col_sums.entry(t).or_insert(0) += count;
    }

    let sum_comb_ij: f64 = joint.values().map(|&c| comb2(c)).sum();
    let sum_comb_a:  f64 = row_sums.values().map(|&a| comb2(a)).sum();
    let sum_comb_b:  f64 = col_sums.values().map(|&b| comb2(b)).sum();
    let comb_n = comb2(pred.len());

    // ARI = (index - expected) / (max - expected)
    let expected  = sum_comb_a * sum_comb_b / comb_n;
    let max_index = (sum_comb_a + sum_comb_b) / 2.0;
    let denom = max_index - expected;
    if denom.abs() < 1e-10 {
        // Both partitions trivial (all one cluster or all singletons)
        return 1.0;
    }
    (sum_comb_ij - expected) / denom
}

/// Normalized Mutual Information between predicted and true partitions.
pub fn nmi(pred: &[usize], truth: &[usize]) -> f64 {
    if pred.len() != truth.len() || pred.is_empty() {
        return 0.0;
    }
    let n = pred.len() as f64;
    let joint = contingency(pred, truth);
    let p_pred = counts(pred);
    let p_truth = counts(truth);

    let h_pred = entropy(&p_pred, n);
    let h_truth = entropy(&p_truth, n);

    let mut mi = 0.0;
    for (&(p, t), &count) in &joint {
        let p_joint = count as f64 / n;
        let p_p = p_pred[&p] as f64 / n;
        let p_t = p_truth[&t] as f64 / n;
        mi += p_joint * (p_joint / (p_p * p_t)).ln();
    }

    let denom = h_pred + h_truth;
    if denom > 0.0 { (2.0 * mi / denom).clamp(0.0, 1.0) } else { 1.0 }
}

/// Cluster sizes, largest first, as (cluster id, size).
pub fn cluster_sizes(assignments: &[usize]) -> Vec<(usize, usize)> {
    let mut sizes: Vec<(usize, usize)> = counts(assignments).into_iter().collect();
    sizes.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
    sizes
}

fn contingency(pred: &[usize], truth: &[usize]) -> HashMap<(usize, usize), usize> {
    let mut table = HashMap::new();
    for (&p, &t) in pred.iter().zip(truth) {
        *table.entry((p, t)).or_insert(0) += 1;
    }
    table
}

fn counts(labels: &[usize]) -> HashMap<usize, usize> {
    let mut map = HashMap::new();
    for &l in labels {
        *map.entry(l).or_insert(0) += 1;
    }
    map
}

fn entropy(counts: &HashMap<usize, usize>, n: f64) -> f64 {
    counts
        .values()
        .map(|&c| {
            let p = c as f64 / n;
            -p * p.ln()
        })
        .sum()
}

fn comb2(n: usize) -> f64 {
    if n < 2 { 0.0 } else { (n * (n - 1) / 2) as f64 }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_perfect_match_up_to_relabelling() {
        let pred  = [2, 2, 0, 0, 1, 1];
        let truth = [0, 0, 1, 1, 2, 2];
        assert!((ari(&pred, &truth) - 1.0).abs() < 1e-9);
        assert!((nmi(&pred, &truth) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_crossed_partition_scores_low() {
        let pred  = [0, 1, 0, 1];
        let truth = [0, 0, 1, 1];
        assert!(ari(&pred, &truth) < 0.0);
        assert!(nmi(&pred, &truth) < 1e-9);
    }

    #[test]
    fn test_single_cluster_against_classes() {
        let pred  = [0, 0, 0, 0];
        let truth = [0, 0, 1, 1];
        assert!(ari(&pred, &truth).abs() < 1e-9);
        assert!(nmi(&pred, &truth).abs() < 1e-9);
    }

    #[test]
    fn test_mismatched_lengths_score_zero() {
        assert_eq!(ari(&[0, 1], &[0]), 0.0);
        assert_eq!(nmi(&[], &[]), 0.0);
    }

    #[test]
    fn test_cluster_sizes_sorted_largest_first() {
        assert_eq!(cluster_sizes(&[1, 0, 1, 2, 1, 0]), vec![(1, 3), (0, 2), (2, 1)]);
    }
}
