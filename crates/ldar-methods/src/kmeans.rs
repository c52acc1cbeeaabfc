//! Deterministic K-means for agent-to-cluster assignment.
//!
//! Crews under route planning each own a geographic cluster of sites.
//! Lloyd's algorithm with k-means++ seeding over (lat, lon) is sufficient
//! here; a fixed RNG seed keeps assignments identical across runs.

use rand::rngs::StdRng;
use rand::Rng;

/// Cluster `points` into `k` groups, returning one label per point.
pub fn kmeans_labels(points: &[(f64, f64)], k: usize, rng: &mut StdRng) -> Vec<usize> {
    if k <= 1 || points.len() <= k {
        // Degenerate cases: one cluster, or one point per cluster
        return points
            .iter()
            .enumerate()
            .map(|(i, _)| if k <= 1 { 0 } else { i % k })
            .collect();
    }

    let mut centroids = plus_plus_init(points, k, rng);
    let mut labels = vec![0usize; points.len()];
    const MAX_ITERS: usize = 100;

    for _ in 0..MAX_ITERS {
        let mut changed = false;
        for (i, p) in points.iter().enumerate() {
            let nearest = nearest_centroid(p, &centroids);
            if labels[i] != nearest {
                labels[i] = nearest;
                changed = true;
            }
        }
        if !changed {
            break;
        }
        // Recompute centroids; an emptied cluster keeps its old centroid
        let mut sums = vec![(0.0, 0.0, 0usize); k];
        for (i, p) in points.iter().enumerate() {
            let s = &mut sums[labels[i]];
            s.0 += p.0;
            s.1 += p.1;
            s.2 += 1;
        }
        for (c, s) in centroids.iter_mut().zip(&sums) {
            if s.2 > 0 {
                *c = (s.0 / s.2 as f64, s.1 / s.2 as f64);
            }
        }
    }
    labels
}

fn plus_plus_init(points: &[(f64, f64)], k: usize, rng: &mut StdRng) -> Vec<(f64, f64)> {
    let mut centroids = Vec::with_capacity(k);
    centroids.push(points[rng.gen_range(0..points.len())]);
    while centroids.len() < k {
        let dists: Vec<f64> = points
            .iter()
            .map(|p| {
                centroids
                    .iter()
                    .map(|c| sq_dist(p, c))
                    .fold(f64::INFINITY, f64::min)
            })
            .collect();
        let total: f64 = dists.iter().sum();
        if total <= 0.0 {
            // All points coincide with centroids; fill with repeats
            centroids.push(points[rng.gen_range(0..points.len())]);
            continue;
        }
        let mut target = rng.gen::<f64>() * total;
        let mut chosen = points.len() - 1;
        for (i, d) in dists.iter().enumerate() {
            target -= d;
            if target <= 0.0 {
                chosen = i;
                break;
            }
        }
        centroids.push(points[chosen]);
    }
    centroids
}

fn nearest_centroid(p: &(f64, f64), centroids: &[(f64, f64)]) -> usize {
    let mut best = 0;
    let mut best_d = f64::INFINITY;
    for (i, c) in centroids.iter().enumerate() {
        let d = sq_dist(p, c);
        if d < best_d {
            best_d = d;
            best = i;
        }
    }
    best
}

fn sq_dist(a: &(f64, f64), b: &(f64, f64)) -> f64 {
    (a.0 - b.0).powi(2) + (a.1 - b.1).powi(2)
}
