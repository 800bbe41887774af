//! Outlier scoring: an isolation forest of randomized partitioning trees.
//! Scores are in (0, 1]; the anomaly threshold is fixed at fit time as the
//! (1 − contamination) quantile of training scores.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Node {
    Leaf {
        size: usize,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: Box<Node>,
        right: Box<Node>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IsolationForest {
    trees: Vec<Node>,
    sample_size: usize,
    pub threshold: f64,
}

pub fn fit(
    rows: &[Vec<f64>],
    trees: usize,
    sample_size: usize,
    contamination: f64,
    seed: u64,
) -> IsolationForest {
    let n = rows.len();
    if n == 0 {
        return IsolationForest {
            trees: Vec::new(),
            sample_size: 0,
            threshold: 1.0,
        };
    }
    let psi = sample_size.min(n).max(1);
    let depth_limit = (psi as f64).log2().ceil().max(1.0) as usize;

    let mut fitted = Vec::with_capacity(trees);
    for t in 0..trees {
        let mut rng = StdRng::seed_from_u64(seed.wrapping_add(t as u64));
        let sample: Vec<&Vec<f64>> = rand::seq::index::sample(&mut rng, n, psi)
            .iter()
            .map(|i| &rows[i])
            .collect();
        fitted.push(build_tree(&sample, 0, depth_limit, &mut rng));
    }

    let mut forest = IsolationForest {
        trees: fitted,
        sample_size: psi,
        threshold: 1.0,
    };

    let mut scores: Vec<f64> = rows.iter().map(|r| forest.score(r)).collect();
    scores.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let quantile = (1.0 - contamination.clamp(0.0, 1.0)) * n as f64;
    let idx = (quantile.ceil() as usize).saturating_sub(1).min(n.saturating_sub(1));
    forest.threshold = scores.get(idx).copied().unwrap_or(1.0);
    forest
}

fn build_tree(rows: &[&Vec<f64>], depth: usize, limit: usize, rng: &mut StdRng) -> Node {
    if rows.len() <= 1 || depth >= limit {
        return Node::Leaf { size: rows.len() };
    }

    let dim = rows[0].len();
    // Features with any spread in this partition.
    let splittable: Vec<usize> = (0..dim)
        .filter(|&f| {
            let (lo, hi) = min_max(rows, f);
            hi > lo
        })
        .collect();
    if splittable.is_empty() {
        return Node::Leaf { size: rows.len() };
    }

    let feature = splittable[rng.gen_range(0..splittable.len())];
    let (lo, hi) = min_max(rows, feature);
    let threshold = rng.gen_range(lo..hi);

    let (left, right): (Vec<&Vec<f64>>, Vec<&Vec<f64>>) =
        rows.iter().partition(|r| r[feature] < threshold);

    Node::Split {
        feature,
        threshold,
        left: Box::new(build_tree(&left, depth + 1, limit, rng)),
        right: Box::new(build_tree(&right, depth + 1, limit, rng)),
    }
}

fn min_max(rows: &[&Vec<f64>], feature: usize) -> (f64, f64) {
    let mut lo = f64::INFINITY;
    let mut hi = f64::NEG_INFINITY;
    for r in rows {
        let v = r[feature];
        if v < lo {
            lo = v;
        }
        if v > hi {
            hi = v;
        }
    }
    (lo, hi)
}

/// Average unsuccessful-search path length in a binary search tree of `n`
/// points; normalizes path lengths across subsample sizes.
fn average_path_length(n: usize) -> f64 {
    match n {
        0 | 1 => 0.0,
        2 => 1.0,
        _ => {
            let n = n as f64;
            2.0 * ((n - 1.0).ln() + EULER_GAMMA) - 2.0 * (n - 1.0) / n
        }
    }
}

fn path_length(node: &Node, row: &[f64], depth: f64) -> f64 {
    match node {
        Node::Leaf { size } => depth + average_path_length(*size),
        Node::Split {
            feature,
            threshold,
            left,
            right,
        } => {
            if row[*feature] < *threshold {
                path_length(left, row, depth + 1.0)
            } else {
                path_length(right, row, depth + 1.0)
            }
        }
    }
}

impl IsolationForest {
    /// Anomaly score in (0, 1]; higher is more isolated.
    pub fn score(&self, row: &[f64]) -> f64 {
        if self.trees.is_empty() {
            return 0.0;
        }
        let mean_path: f64 = self
            .trees
            .iter()
            .map(|t| path_length(t, row, 0.0))
            .sum::<f64>()
            / self.trees.len() as f64;
        let norm = average_path_length(self.sample_size).max(f64::MIN_POSITIVE);
        2f64.powf(-mean_path / norm)
    }

    /// Decision function against the threshold fixed at fit time. Ties score
    /// exactly at the threshold as normal.
    pub fn is_anomaly(&self, row: &[f64]) -> bool {
        self.score(row) > self.threshold
    }
}
