//! Deterministic k-means used to seed the color mixtures.
//!
//! Seeds are picked by farthest-point (maximin) traversal starting from the
//! sample closest to the mean, then refined with Lloyd iterations. Clusters
//! that end up empty are dropped, so fewer than `k` clusters come back when
//! the samples do not support `k`.

use crate::grabcut::linalg::{squared_distance, Color};
use crate::utils::{fold_indexed, map_indexed};

/// Result of clustering: centroids and a cluster index per sample.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Clustering {
    pub centroids: Vec<Color>,
    pub labels: Vec<usize>,
}

impl Clustering {
    #[inline]
    pub fn cluster_count(&self) -> usize {
        self.centroids.len()
    }
}

pub(crate) fn kmeans(samples: &[Color], k: usize, iterations: usize) -> Clustering {
    if samples.is_empty() || k == 0 {
        return Clustering {
            centroids: Vec::new(),
            labels: Vec::new(),
        };
    }

    let mut centroids = seed_centroids(samples, k);
    let mut labels = nearest_labels(samples, &centroids);

    for _ in 0..iterations {
        let cluster_count = centroids.len();
        let sums = fold_indexed(
            samples.len(),
            || vec![([0.0; 3], 0usize); cluster_count],
            |mut acc, i| {
                let (sum, count) = &mut acc[labels[i]];
                let sample = &samples[i];
                sum[0] += sample[0];
                sum[1] += sample[1];
                sum[2] += sample[2];
                *count += 1;
                acc
            },
            |mut left, right| {
                for ((sum, count), (other_sum, other_count)) in left.iter_mut().zip(right) {
                    sum[0] += other_sum[0];
                    sum[1] += other_sum[1];
                    sum[2] += other_sum[2];
                    *count += other_count;
                }
                left
            },
        );

        for (centroid, (sum, count)) in centroids.iter_mut().zip(sums.iter()) {
            // An empty cluster keeps its centroid and is dropped at the end if still empty
            if *count > 0 {
                let n = *count as f64;
                *centroid = [sum[0] / n, sum[1] / n, sum[2] / n];
            }
        }

        let next = nearest_labels(samples, &centroids);
        let stable = next == labels;
        labels = next;
        if stable {
            break;
        }
    }

    compact(centroids, labels)
}

fn seed_centroids(samples: &[Color], k: usize) -> Vec<Color> {
    let n = samples.len();
    let sum = fold_indexed(
        n,
        || [0.0; 3],
        |mut acc, i| {
            acc[0] += samples[i][0];
            acc[1] += samples[i][1];
            acc[2] += samples[i][2];
            acc
        },
        |a, b| [a[0] + b[0], a[1] + b[1], a[2] + b[2]],
    );
    let mean = [sum[0] / n as f64, sum[1] / n as f64, sum[2] / n as f64];

    let first = argmin_by_distance(samples, &mean);
    let mut centroids = Vec::with_capacity(k);
    centroids.push(samples[first]);

    let mut nearest = map_indexed(n, |i| squared_distance(&samples[i], &samples[first]));
    while centroids.len() < k {
        let (index, distance) = nearest
            .iter()
            .enumerate()
            .fold((0, f64::NEG_INFINITY), |best, (i, &d)| {
                if d > best.1 {
                    (i, d)
                } else {
                    best
                }
            });
        // Every remaining sample coincides with a seed
        if distance <= 0.0 {
            break;
        }
        let seed = samples[index];
        centroids.push(seed);
        nearest = map_indexed(n, |i| nearest[i].min(squared_distance(&samples[i], &seed)));
    }

    centroids
}

fn argmin_by_distance(samples: &[Color], target: &Color) -> usize {
    samples
        .iter()
        .enumerate()
        .fold((0, f64::INFINITY), |best, (i, s)| {
            let d = squared_distance(s, target);
            if d < best.1 {
                (i, d)
            } else {
                best
            }
        })
        .0
}

fn nearest_labels(samples: &[Color], centroids: &[Color]) -> Vec<usize> {
    map_indexed(samples.len(), |i| argmin_by_distance(centroids, &samples[i]))
}

fn compact(centroids: Vec<Color>, labels: Vec<usize>) -> Clustering {
    let mut counts = vec![0usize; centroids.len()];
    labels.iter().for_each(|&l| counts[l] += 1);

    let mut remap = vec![usize::MAX; centroids.len()];
    let mut kept = Vec::with_capacity(centroids.len());
    for (old, centroid) in centroids.into_iter().enumerate() {
        if counts[old] > 0 {
            remap[old] = kept.len();
            kept.push(centroid);
        }
    }

    Clustering {
        centroids: kept,
        labels: labels.into_iter().map(|l| remap[l]).collect(),
    }
}
