//! Embedding clustering for thematic grouping. Chooses k automatically by
//! maximizing silhouette score across k-means fits, with optional L2
//! normalization and a PCA projection when the dimensionality is high.

use ndarray::{Array2, Axis};
use rand::{Rng, SeedableRng, rngs::StdRng};
use thiserror::Error;

const PCA_DIM: usize = 50;
const KMEANS_MAX_ITER: usize = 100;
const KMEANS_N_INIT: usize = 10;
const RANDOM_STATE: u64 = 42;

#[derive(Debug, Error)]
pub enum ClusterError {
    #[error("need at least 2 samples to cluster")]
    TooFewSamples,

    #[error("vectors must all have the same dimensionality")]
    RaggedInput,
}

/// The outcome of an automatic clustering run.
#[derive(Debug)]
pub struct Clustering {
    /// One label per input vector, each in `[0, k)`.
    pub labels: Vec<usize>,
    pub k: usize,
}

/// Cluster embeddings with k chosen in `[k_min, min(k_max, n)]` by
/// silhouette score. Any k whose smallest cluster has fewer than 2 members
/// is skipped; when no k yields a valid silhouette the `k_min` fit is used.
pub fn cluster_auto(
    vectors: &[Vec<f32>],
    k_min: usize,
    k_max: usize,
    normalize: bool,
) -> Result<Clustering, ClusterError> {
    let n_samples = vectors.len();

    if n_samples < 2 {
        return Err(ClusterError::TooFewSamples);
    }

    let n_features = vectors[0].len();

    if vectors.iter().any(|v| v.len() != n_features) {
        return Err(ClusterError::RaggedInput);
    }

    let mut data = Array2::<f64>::zeros((n_samples, n_features));

    for (i, vector) in vectors.iter().enumerate() {
        for (j, &value) in vector.iter().enumerate() {
            data[[i, j]] = f64::from(value);
        }
    }

    if normalize {
        // L2-normalize rows so Euclidean distance tracks cosine.
        for mut row in data.axis_iter_mut(Axis(0)) {
            let norm = row.dot(&row).sqrt();
            if norm > 0.0 {
                row.mapv_inplace(|v| v / norm);
            }
        }
    }

    if n_features > PCA_DIM {
        data = pca_project(&data, PCA_DIM.min(n_samples.saturating_sub(1).max(1)));
    }

    let mut rng = StdRng::seed_from_u64(RANDOM_STATE);

    let upper_k = k_max.min(n_samples);
    let mut best: Option<(f64, usize, Vec<usize>)> = None;

    for k in k_min..=upper_k {
        let labels = kmeans_best_of(&data, k, &mut rng);

        let mut counts = vec![0usize; k];
        for &label in &labels {
            counts[label] += 1;
        }

        // Silhouette needs at least 2 clusters and no singleton clusters.
        let populated = counts.iter().filter(|&&c| c > 0).count();
        if populated <= 1 || counts.iter().any(|&c| c > 0 && c < 2) {
            continue;
        }

        let score = silhouette_score(&data, &labels, k);

        if best.as_ref().is_none_or(|(best_score, _, _)| score > *best_score) {
            best = Some((score, k, labels));
        }
    }

    if let Some((score, k, labels)) = best {
        log::debug!("Clustered {n_samples} vectors into k={k} groups (silhouette {score:.3})");

        return Ok(Clustering { labels, k });
    }

    // No k produced a valid silhouette; fall back to the smallest requested.
    let fallback_k = k_min.min(n_samples).max(1);
    let labels = kmeans_best_of(&data, fallback_k, &mut rng);

    log::debug!("Silhouette selection failed, falling back to k={fallback_k}");

    Ok(Clustering {
        labels,
        k: fallback_k,
    })
}

/// Run several k-means fits with k-means++ seeding and keep the lowest
/// inertia labeling.
fn kmeans_best_of(data: &Array2<f64>, k: usize, rng: &mut StdRng) -> Vec<usize> {
    let mut best_labels = Vec::new();
    let mut best_inertia = f64::INFINITY;

    for _ in 0..KMEANS_N_INIT {
        let (labels, inertia) = kmeans(data, k, rng);

        if inertia < best_inertia {
            best_inertia = inertia;
            best_labels = labels;
        }
    }

    best_labels
}

fn kmeans(data: &Array2<f64>, k: usize, rng: &mut StdRng) -> (Vec<usize>, f64) {
    let n = data.nrows();
    let d = data.ncols();

    let mut centroids = kmeans_plus_plus_init(data, k, rng);
    let mut labels = vec![0usize; n];

    for _ in 0..KMEANS_MAX_ITER {
        let mut changed = false;

        for i in 0..n {
            let point = data.row(i);
            let mut best_label = 0;
            let mut best_distance = f64::INFINITY;

            for (label, centroid) in centroids.axis_iter(Axis(0)).enumerate() {
                let distance = squared_distance(&point, &centroid);

                if distance < best_distance {
                    best_distance = distance;
                    best_label = label;
                }
            }

            if labels[i] != best_label {
                labels[i] = best_label;
                changed = true;
            }
        }

        let mut sums = Array2::<f64>::zeros((k, d));
        let mut counts = vec![0usize; k];

        for i in 0..n {
            let mut sum = sums.row_mut(labels[i]);
            sum += &data.row(i);
            counts[labels[i]] += 1;
        }

        for label in 0..k {
            if counts[label] == 0 {
                // Re-seed an empty cluster from a random point.
                let i = rng.random_range(0..n);
                centroids.row_mut(label).assign(&data.row(i));
            } else {
                let count = counts[label] as f64;
                centroids
                    .row_mut(label)
                    .assign(&(&sums.row(label) / count));
            }
        }

        if !changed {
            break;
        }
    }

    let inertia = (0..n)
        .map(|i| squared_distance(&data.row(i), &centroids.row(labels[i])))
        .sum();

    (labels, inertia)
}

fn kmeans_plus_plus_init(data: &Array2<f64>, k: usize, rng: &mut StdRng) -> Array2<f64> {
    let n = data.nrows();
    let d = data.ncols();

    let mut centroids = Array2::<f64>::zeros((k, d));

    let first = rng.random_range(0..n);
    centroids.row_mut(0).assign(&data.row(first));

    let mut distances: Vec<f64> = (0..n)
        .map(|i| squared_distance(&data.row(i), &centroids.row(0)))
        .collect();

    for c in 1..k {
        let total: f64 = distances.iter().sum();

        let chosen = if total > 0.0 {
            let mut target = rng.random::<f64>() * total;
            let mut chosen = n - 1;

            for (i, &distance) in distances.iter().enumerate() {
                target -= distance;
                if target <= 0.0 {
                    chosen = i;
                    break;
                }
            }

            chosen
        } else {
            rng.random_range(0..n)
        };

        centroids.row_mut(c).assign(&data.row(chosen));

        for i in 0..n {
            let distance = squared_distance(&data.row(i), &centroids.row(c));
            if distance < distances[i] {
                distances[i] = distance;
            }
        }
    }

    centroids
}

fn squared_distance(a: &ndarray::ArrayView1<'_, f64>, b: &ndarray::ArrayView1<'_, f64>) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y) * (x - y)).sum()
}

/// Mean silhouette coefficient over all samples.
fn silhouette_score(data: &Array2<f64>, labels: &[usize], k: usize) -> f64 {
    let n = data.nrows();

    let mut counts = vec![0usize; k];
    for &label in labels {
        counts[label] += 1;
    }

    let mut total = 0.0;

    for i in 0..n {
        // Mean distance to every cluster.
        let mut sums = vec![0.0f64; k];

        for j in 0..n {
            if i == j {
                continue;
            }

            let distance = squared_distance(&data.row(i), &data.row(j)).sqrt();
            sums[labels[j]] += distance;
        }

        let own = labels[i];
        let a = if counts[own] > 1 {
            sums[own] / (counts[own] - 1) as f64
        } else {
            0.0
        };

        let b = (0..k)
            .filter(|&label| label != own && counts[label] > 0)
            .map(|label| sums[label] / counts[label] as f64)
            .fold(f64::INFINITY, f64::min);

        if b.is_finite() {
            let denom = a.max(b);
            if denom > 0.0 {
                total += (b - a) / denom;
            }
        }
    }

    total / n as f64
}

/// Project the (centered) data onto its top principal components using
/// subspace iteration; exact eigendecomposition is not needed for a k-means
/// preprocessing step.
fn pca_project(data: &Array2<f64>, dim: usize) -> Array2<f64> {
    let n = data.nrows();
    let d = data.ncols();
    let dim = dim.min(d).min(n);

    let mean = match data.mean_axis(Axis(0)) {
        Some(mean) => mean,
        None => return data.clone(),
    };
    let centered = data - &mean.insert_axis(Axis(0));

    let mut rng = StdRng::seed_from_u64(RANDOM_STATE);
    let mut basis = Array2::<f64>::zeros((d, dim));
    for value in basis.iter_mut() {
        *value = rng.random::<f64>() - 0.5;
    }

    orthonormalize(&mut basis);

    for _ in 0..10 {
        // One power step against the covariance: X^T (X Q), up to scaling.
        let projected = centered.dot(&basis);
        basis = centered.t().dot(&projected);
        orthonormalize(&mut basis);
    }

    centered.dot(&basis)
}

/// In-place modified Gram-Schmidt over the columns.
fn orthonormalize(basis: &mut Array2<f64>) {
    let cols = basis.ncols();

    for j in 0..cols {
        for prior in 0..j {
            let projection = basis.column(j).dot(&basis.column(prior));
            let prior_col = basis.column(prior).to_owned();
            let mut col = basis.column_mut(j);
            col.scaled_add(-projection, &prior_col);
        }

        let norm = basis.column(j).dot(&basis.column(j)).sqrt();
        if norm > f64::EPSILON {
            basis.column_mut(j).mapv_inplace(|v| v / norm);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blob(center: &[f32], count: usize, spread: f32) -> Vec<Vec<f32>> {
        (0..count)
            .map(|i| {
                center
                    .iter()
                    .enumerate()
                    .map(|(j, &c)| c + spread * ((i + j) % 3) as f32 * 0.01)
                    .collect()
            })
            .collect()
    }

    #[test]
    fn separates_two_obvious_blobs() {
        let mut vectors = blob(&[0.0, 0.0, 0.0], 10, 1.0);
        vectors.extend(blob(&[10.0, 10.0, 10.0], 10, 1.0));

        let clustering = cluster_auto(&vectors, 2, 8, false).unwrap();

        assert_eq!(clustering.k, 2);
        assert_eq!(clustering.labels.len(), 20);

        // All members of each blob share a label, and the blobs differ.
        let first = clustering.labels[0];
        assert!(clustering.labels[..10].iter().all(|&l| l == first));
        assert!(clustering.labels[10..].iter().all(|&l| l != first));
    }

    #[test]
    fn labels_stay_in_range() {
        let mut vectors = blob(&[0.0, 0.0], 6, 1.0);
        vectors.extend(blob(&[5.0, 5.0], 6, 1.0));
        vectors.extend(blob(&[-5.0, 5.0], 6, 1.0));

        let clustering = cluster_auto(&vectors, 2, 20, false).unwrap();

        assert!(clustering.k <= vectors.len());
        assert!(clustering.labels.iter().all(|&l| l < clustering.k));
    }

    #[test]
    fn high_dimensional_input_goes_through_pca() {
        let mut vectors = blob(&vec![0.0; 128], 8, 1.0);
        vectors.extend(blob(&vec![4.0; 128], 8, 1.0));

        let clustering = cluster_auto(&vectors, 2, 5, true).unwrap();

        assert_eq!(clustering.labels.len(), 16);
        assert!(clustering.k >= 2);
    }

    #[test]
    fn identical_points_fall_back_to_k_min() {
        let vectors = vec![vec![1.0f32, 2.0]; 5];

        let clustering = cluster_auto(&vectors, 2, 4, false).unwrap();

        // Every k gets skipped (singleton or empty clusters aside, all
        // distances are zero), so the k_min fallback applies.
        assert_eq!(clustering.k, 2);
        assert_eq!(clustering.labels.len(), 5);
    }

    #[test]
    fn a_single_sample_is_an_error() {
        let err = cluster_auto(&[vec![1.0, 2.0]], 2, 8, false).unwrap_err();
        assert!(matches!(err, ClusterError::TooFewSamples));
    }
}
