//! Density clustering. Points in no sufficiently dense neighborhood receive
//! the noise sentinel. The fitted model retains core points so one incoming
//! record can be labeled without re-fitting (see DESIGN.md).

use super::kmeans::squared_distance;
use serde::{Deserialize, Serialize};

/// Label for points outside every dense neighborhood.
pub const NOISE: i64 = -1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DbscanModel {
    pub eps: f64,
    pub min_samples: usize,
    /// Core points retained from training, in standardized feature space.
    pub core_points: Vec<Vec<f64>>,
    /// Cluster label of each retained core point.
    pub core_labels: Vec<i64>,
}

#[derive(Debug, Clone)]
pub struct DbscanFit {
    pub model: DbscanModel,
    pub labels: Vec<i64>,
}

pub fn fit(rows: &[Vec<f64>], eps: f64, min_samples: usize) -> DbscanFit {
    let n = rows.len();
    let eps2 = eps * eps;

    let neighborhoods: Vec<Vec<usize>> = (0..n)
        .map(|i| {
            (0..n)
                .filter(|&j| squared_distance(&rows[i], &rows[j]) <= eps2)
                .collect()
        })
        .collect();
    let is_core: Vec<bool> = neighborhoods.iter().map(|nb| nb.len() >= min_samples).collect();

    let mut labels = vec![NOISE; n];
    let mut visited = vec![false; n];
    let mut next_label: i64 = 0;

    for start in 0..n {
        if visited[start] || !is_core[start] {
            continue;
        }
        // Expand one cluster from this core point.
        let mut frontier = vec![start];
        visited[start] = true;
        while let Some(point) = frontier.pop() {
            labels[point] = next_label;
            if !is_core[point] {
                continue;
            }
            for &nb in &neighborhoods[point] {
                if !visited[nb] {
                    visited[nb] = true;
                    frontier.push(nb);
                } else if labels[nb] == NOISE {
                    // Border point already visited as noise joins the cluster.
                    labels[nb] = next_label;
                }
            }
        }
        next_label += 1;
    }

    let mut core_points = Vec::new();
    let mut core_labels = Vec::new();
    for i in 0..n {
        if is_core[i] {
            core_points.push(rows[i].clone());
            core_labels.push(labels[i]);
        }
    }

    DbscanFit {
        model: DbscanModel {
            eps,
            min_samples,
            core_points,
            core_labels,
        },
        labels,
    }
}

impl DbscanModel {
    /// Label one standardized row: the cluster of the nearest training core
    /// point within eps, else [`NOISE`].
    pub fn label(&self, row: &[f64]) -> i64 {
        let eps2 = self.eps * self.eps;
        let mut best: Option<(f64, i64)> = None;
        for (point, &label) in self.core_points.iter().zip(self.core_labels.iter()) {
            let d = squared_distance(point, row);
            if d <= eps2 && best.map(|(bd, _)| d < bd).unwrap_or(true) {
                best = Some((d, label));
            }
        }
        best.map(|(_, label)| label).unwrap_or(NOISE)
    }
}
