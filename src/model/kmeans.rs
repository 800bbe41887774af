//! Partition clustering: seeded k-means++ with random restarts, keeping the
//! best-inertia solution. Fitting is deterministic for a fixed seed.

use super::TrainBudget;
use crate::error::{ProcessorError, Result};
use ndarray::Array2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KMeansModel {
    pub centroids: Vec<Vec<f64>>,
    pub inertia: f64,
}

/// Fitted model plus the final training-row assignments.
#[derive(Debug, Clone)]
pub struct KMeansFit {
    pub model: KMeansModel,
    pub assignments: Vec<usize>,
}

impl KMeansModel {
    /// Index of the nearest fitted centroid.
    pub fn nearest(&self, row: &[f64]) -> usize {
        nearest_centroid(&self.centroids, row).0
    }
}

pub fn fit(
    data: &Array2<f64>,
    k: usize,
    restarts: usize,
    max_iterations: usize,
    seed: u64,
    budget: &TrainBudget,
) -> Result<KMeansFit> {
    let n = data.nrows();
    if k == 0 {
        return Err(ProcessorError::DegenerateBatch(
            "cluster count must be positive".to_string(),
        ));
    }
    if n < k {
        return Err(ProcessorError::DegenerateBatch(format!(
            "{n} rows cannot form {k} clusters"
        )));
    }

    let rows: Vec<&[f64]> = data.rows().into_iter().map(|r| r.to_slice().unwrap()).collect();
    let mut best: Option<KMeansFit> = None;

    for restart in 0..restarts.max(1) {
        budget.check()?;
        let mut rng = StdRng::seed_from_u64(seed.wrapping_add(restart as u64));
        let mut centroids = plus_plus_init(&rows, k, &mut rng);
        let mut assignments = vec![usize::MAX; n];

        for _ in 0..max_iterations {
            let next: Vec<usize> = rows
                .iter()
                .map(|row| nearest_centroid(&centroids, row).0)
                .collect();
            if next == assignments {
                break;
            }
            assignments = next;
            recompute_centroids(&rows, &assignments, &mut centroids);
        }

        // One closing assignment pass keeps labels consistent with the final
        // centroids even when the iteration cap was hit mid-update.
        let assignments: Vec<usize> = rows
            .iter()
            .map(|row| nearest_centroid(&centroids, row).0)
            .collect();
        let inertia: f64 = rows
            .iter()
            .zip(assignments.iter())
            .map(|(row, &a)| squared_distance(&centroids[a], row))
            .sum();

        let candidate = KMeansFit {
            model: KMeansModel { centroids, inertia },
            assignments,
        };
        let better = best
            .as_ref()
            .map(|b| candidate.model.inertia < b.model.inertia)
            .unwrap_or(true);
        if better {
            best = Some(candidate);
        }
    }

    Ok(best.expect("at least one restart runs"))
}

/// k-means++ seeding: first centroid uniform, the rest weighted by squared
/// distance to the nearest already-chosen centroid.
fn plus_plus_init(rows: &[&[f64]], k: usize, rng: &mut StdRng) -> Vec<Vec<f64>> {
    let mut centroids: Vec<Vec<f64>> = Vec::with_capacity(k);
    centroids.push(rows[rng.gen_range(0..rows.len())].to_vec());

    while centroids.len() < k {
        let weights: Vec<f64> = rows
            .iter()
            .map(|row| nearest_centroid(&centroids, row).1)
            .collect();
        let total: f64 = weights.iter().sum();
        let chosen = if total > 0.0 {
            let mut target = rng.gen_range(0.0..total);
            let mut idx = rows.len() - 1;
            for (i, w) in weights.iter().enumerate() {
                if target < *w {
                    idx = i;
                    break;
                }
                target -= w;
            }
            idx
        } else {
            // All remaining points coincide with a centroid.
            rng.gen_range(0..rows.len())
        };
        centroids.push(rows[chosen].to_vec());
    }
    centroids
}

fn recompute_centroids(rows: &[&[f64]], assignments: &[usize], centroids: &mut [Vec<f64>]) {
    let dim = centroids[0].len();
    let mut sums = vec![vec![0.0; dim]; centroids.len()];
    let mut counts = vec![0usize; centroids.len()];
    for (row, &a) in rows.iter().zip(assignments.iter()) {
        counts[a] += 1;
        for (s, v) in sums[a].iter_mut().zip(row.iter()) {
            *s += v;
        }
    }
    for (c, centroid) in centroids.iter_mut().enumerate() {
        if counts[c] == 0 {
            // Re-seed an emptied cluster at the point farthest from it.
            if let Some((idx, _)) = rows
                .iter()
                .enumerate()
                .map(|(i, row)| (i, squared_distance(centroid, row)))
                .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
            {
                *centroid = rows[idx].to_vec();
            }
            continue;
        }
        for (dst, s) in centroid.iter_mut().zip(sums[c].iter()) {
            *dst = s / counts[c] as f64;
        }
    }
}

fn nearest_centroid(centroids: &[Vec<f64>], row: &[f64]) -> (usize, f64) {
    let mut best = (0usize, f64::INFINITY);
    for (i, c) in centroids.iter().enumerate() {
        let d = squared_distance(c, row);
        if d < best.1 {
            best = (i, d);
        }
    }
    best
}

pub(crate) fn squared_distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y) * (x - y)).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::arr2;

    fn budget() -> TrainBudget {
        TrainBudget::new(60)
    }

    #[test]
    fn separates_two_obvious_groups() {
        let data = arr2(&[
            [0.0, 0.0],
            [0.1, 0.0],
            [0.0, 0.1],
            [10.0, 10.0],
            [10.1, 10.0],
            [10.0, 10.1],
        ]);
        let fit = fit(&data, 2, 5, 100, 42, &budget()).unwrap();
        assert_eq!(fit.assignments[0], fit.assignments[1]);
        assert_eq!(fit.assignments[0], fit.assignments[2]);
        assert_eq!(fit.assignments[3], fit.assignments[4]);
        assert_ne!(fit.assignments[0], fit.assignments[3]);
    }

    #[test]
    fn assignments_agree_with_nearest() {
        let data = arr2(&[
            [0.0, 0.0],
            [0.2, 0.1],
            [5.0, 5.0],
            [5.1, 4.9],
            [9.0, 0.0],
            [9.2, 0.1],
        ]);
        let fit = fit(&data, 3, 8, 100, 7, &budget()).unwrap();
        for (i, row) in data.rows().into_iter().enumerate() {
            assert_eq!(fit.model.nearest(row.to_slice().unwrap()), fit.assignments[i]);
        }
    }

    #[test]
    fn deterministic_for_fixed_seed() {
        let data = arr2(&[
            [0.0, 1.0],
            [0.5, 1.2],
            [4.0, 4.0],
            [4.2, 3.9],
            [8.0, 0.2],
            [8.1, 0.4],
        ]);
        let a = fit(&data, 3, 10, 100, 123, &budget()).unwrap();
        let b = fit(&data, 3, 10, 100, 123, &budget()).unwrap();
        assert_eq!(a.assignments, b.assignments);
        assert_eq!(a.model.centroids, b.model.centroids);
    }

    #[test]
    fn too_few_rows_is_degenerate() {
        let data = arr2(&[[0.0, 0.0], [1.0, 1.0]]);
        assert!(matches!(
            fit(&data, 3, 2, 10, 1, &budget()),
            Err(ProcessorError::DegenerateBatch(_))
        ));
    }
}
