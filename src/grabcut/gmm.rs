//! Full-covariance Gaussian mixture over 3-channel color.
//!
//! The mixture is fitted by hard EM: every sample belongs to exactly one
//! component, and re-estimation recomputes weight, mean and covariance of
//! each component from its members alone. Parameters are never updated in
//! place; [`GaussianMixture::reestimate`] returns a new mixture.

use crate::grabcut::kmeans::kmeans;
use crate::grabcut::linalg::{difference, Color, Matrix3};
use crate::utils::{fold_indexed, map_indexed};

/// Floor applied to weights and determinants before taking a logarithm.
pub const LOG_EPSILON: f64 = 1e-15;

const DIMENSIONS: usize = 3;

/// Determinants at or below this value are treated as singular.
const SINGULAR_DETERMINANT: f64 = f64::EPSILON;

/// Upper bound on how many times the diagonal fix is grown by 10x.
const MAX_REGULARIZATION_STEPS: usize = 24;

/// Settings shared by initialization and re-estimation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MixtureSettings {
    /// Diagonal epsilon added to degenerate covariances
    pub regularization: f64,
    /// Lloyd iterations used by the initial clustering
    pub kmeans_iterations: usize,
}

impl Default for MixtureSettings {
    fn default() -> Self {
        Self {
            regularization: 0.01,
            kmeans_iterations: 10,
        }
    }
}

/// One multivariate normal component with its cached inverse and determinant.
#[derive(Debug, Clone, PartialEq)]
pub struct Gaussian {
    mean: Color,
    covariance: Matrix3,
    inverse: Matrix3,
    determinant: f64,
}

impl Gaussian {
    /// Builds a component from sample statistics.
    ///
    /// The covariance is regularized with `regularization * I` when fewer
    /// than `DIMENSIONS + 1` samples back it or when it is singular; the fix
    /// grows until the matrix is safely invertible.
    pub fn new(mean: Color, covariance: Matrix3, sample_count: usize, regularization: f64) -> Self {
        let base = if covariance.is_finite() {
            covariance
        } else {
            Matrix3::ZERO
        };

        let needs_fix =
            sample_count < DIMENSIONS + 1 || !(base.determinant() > SINGULAR_DETERMINANT);
        let mut fix = if needs_fix { regularization } else { 0.0 };

        for _ in 0..MAX_REGULARIZATION_STEPS {
            let candidate = base.add_diagonal(fix);
            let determinant = candidate.determinant();
            if determinant > SINGULAR_DETERMINANT {
                if let Some(inverse) = candidate.inverse() {
                    return Self {
                        mean,
                        covariance: candidate,
                        inverse,
                        determinant,
                    };
                }
            }
            fix = if fix > 0.0 { fix * 10.0 } else { regularization };
        }

        log::warn!("covariance could not be regularized, falling back to an isotropic component");
        let covariance = Matrix3::IDENTITY.scale(fix);
        let determinant = covariance.determinant();
        Self {
            mean,
            inverse: Matrix3::IDENTITY.scale(1.0 / fix),
            covariance,
            determinant,
        }
    }

    #[inline]
    pub const fn mean(&self) -> &Color {
        &self.mean
    }

    #[inline]
    pub const fn covariance(&self) -> &Matrix3 {
        &self.covariance
    }

    #[inline]
    pub const fn inverse(&self) -> &Matrix3 {
        &self.inverse
    }

    #[inline]
    pub const fn determinant(&self) -> f64 {
        self.determinant
    }

    /// Squared Mahalanobis distance `(x-μ)ᵀΣ⁻¹(x-μ)`.
    #[inline]
    pub fn mahalanobis(&self, color: &Color) -> f64 {
        self.inverse.quadratic_form(&difference(color, &self.mean))
    }
}

/// Weighted mixture of [`Gaussian`] components for one class.
///
/// A mixture fitted from no samples is *empty*: it has no components and
/// every cost query returns `None`.
#[derive(Debug, Clone, PartialEq)]
pub struct GaussianMixture {
    weights: Vec<f64>,
    components: Vec<Gaussian>,
    /// `-ln(max(w, ε)) + 0.5 ln(max(det, ε))` per component
    offsets: Vec<f64>,
    requested: usize,
    sample_count: usize,
    settings: MixtureSettings,
}

impl GaussianMixture {
    /// Clusters `samples` into at most `components` groups and fits one Gaussian per group.
    ///
    /// Returns the mixture together with the component index of every sample.
    /// Fewer components are produced when there are fewer distinct samples
    /// than requested; an empty sample set produces an empty mixture.
    pub fn initialize(
        samples: &[Color],
        components: usize,
        settings: MixtureSettings,
    ) -> (Self, Vec<usize>) {
        let clustering = kmeans(samples, components, settings.kmeans_iterations);
        let cluster_count = clustering.cluster_count();
        if cluster_count < components && !samples.is_empty() {
            log::debug!(
                "fitting {} of {} requested components from {} samples",
                cluster_count,
                components,
                samples.len()
            );
        }

        let stats = component_statistics(samples, &clustering.labels, cluster_count);
        let total = samples.len();
        let (weights, gaussians) = stats
            .into_iter()
            .map(|(count, mean, covariance)| {
                (
                    count as f64 / total as f64,
                    Gaussian::new(mean, covariance, count, settings.regularization),
                )
            })
            .unzip();

        let mixture = Self::from_parts(weights, gaussians, components, total, settings);
        (mixture, clustering.labels)
    }

    fn from_parts(
        weights: Vec<f64>,
        components: Vec<Gaussian>,
        requested: usize,
        sample_count: usize,
        settings: MixtureSettings,
    ) -> Self {
        let offsets = weights
            .iter()
            .zip(components.iter())
            .map(|(&w, g)| -w.max(LOG_EPSILON).ln() + 0.5 * g.determinant.max(LOG_EPSILON).ln())
            .collect();
        Self {
            weights,
            components,
            offsets,
            requested,
            sample_count,
            settings,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.components.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    #[inline]
    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    #[inline]
    pub fn components(&self) -> &[Gaussian] {
        &self.components
    }

    /// Number of samples the current parameters were estimated from.
    #[inline]
    pub const fn sample_count(&self) -> usize {
        self.sample_count
    }

    /// Unary cost of `color` under `component`:
    /// `-ln(w) + 0.5 ln(det Σ) + 0.5 (x-μ)ᵀΣ⁻¹(x-μ)`, with `w` and `det Σ`
    /// floored to [`LOG_EPSILON`].
    ///
    /// `component` must be below [`Self::len`].
    #[inline]
    pub fn log_cost(&self, component: usize, color: &Color) -> f64 {
        0.5f64.mul_add(
            self.components[component].mahalanobis(color),
            self.offsets[component],
        )
    }

    /// Lowest-cost component for `color` and its cost, `None` for an empty mixture.
    pub fn best_component(&self, color: &Color) -> Option<(usize, f64)> {
        (0..self.components.len())
            .map(|k| (k, self.log_cost(k, color)))
            .fold(None, |best, (k, cost)| match best {
                Some((_, best_cost)) if best_cost <= cost => best,
                _ => Some((k, cost)),
            })
    }

    /// Most likely component of every sample, `None` for an empty mixture.
    pub fn assign_components(&self, samples: &[Color]) -> Option<Vec<usize>> {
        if self.is_empty() {
            return None;
        }
        Some(map_indexed(samples.len(), |i| {
            self.best_component(&samples[i]).map_or(0, |(k, _)| k)
        }))
    }

    /// Refits every component from the samples assigned to it.
    ///
    /// `assignment[i]` is the component of `samples[i]`. Components without
    /// samples keep their mean and covariance with weight zero; an empty
    /// `samples` slice keeps the whole mixture. An empty mixture given
    /// samples is initialized from them instead.
    pub fn reestimate(&self, samples: &[Color], assignment: &[usize]) -> Self {
        debug_assert_eq!(samples.len(), assignment.len());
        if samples.is_empty() {
            return self.clone();
        }
        if self.is_empty() {
            return Self::initialize(samples, self.requested, self.settings).0;
        }

        let stats = component_statistics(samples, assignment, self.components.len());
        let total = samples.len();
        let (weights, gaussians) = stats
            .into_iter()
            .zip(self.components.iter())
            .map(|((count, mean, covariance), previous)| {
                if count == 0 {
                    (0.0, previous.clone())
                } else {
                    (
                        count as f64 / total as f64,
                        Gaussian::new(mean, covariance, count, self.settings.regularization),
                    )
                }
            })
            .unzip();

        Self::from_parts(weights, gaussians, self.requested, total, self.settings)
    }

    /// A mixture that has seen no samples.
    pub fn empty(components: usize, settings: MixtureSettings) -> Self {
        Self::from_parts(Vec::new(), Vec::new(), components, 0, settings)
    }
}

/// Per-component `(count, mean, population covariance)`.
///
/// Two parallel passes: sums and counts first, then scatter around the
/// component means, so large channel offsets do not cancel catastrophically.
fn component_statistics(
    samples: &[Color],
    labels: &[usize],
    count: usize,
) -> Vec<(usize, Color, Matrix3)> {
    let sums = fold_indexed(
        samples.len(),
        || vec![(0usize, [0.0; 3]); count],
        |mut acc, i| {
            let (n, sum) = &mut acc[labels[i]];
            *n += 1;
            sum[0] += samples[i][0];
            sum[1] += samples[i][1];
            sum[2] += samples[i][2];
            acc
        },
        |mut left, right| {
            for ((n, sum), (other_n, other_sum)) in left.iter_mut().zip(right) {
                *n += other_n;
                sum[0] += other_sum[0];
                sum[1] += other_sum[1];
                sum[2] += other_sum[2];
            }
            left
        },
    );

    let means: Vec<Color> = sums
        .iter()
        .map(|&(n, sum)| {
            if n == 0 {
                [0.0; 3]
            } else {
                let n = n as f64;
                [sum[0] / n, sum[1] / n, sum[2] / n]
            }
        })
        .collect();

    let scatters = fold_indexed(
        samples.len(),
        || vec![Matrix3::ZERO; count],
        |mut acc, i| {
            let l = labels[i];
            acc[l] = acc[l].add(&Matrix3::outer(&difference(&samples[i], &means[l])));
            acc
        },
        |mut left, right| {
            for (scatter, other) in left.iter_mut().zip(right) {
                *scatter = scatter.add(&other);
            }
            left
        },
    );

    sums.into_iter()
        .zip(means)
        .zip(scatters)
        .map(|(((n, _), mean), scatter)| {
            let covariance = if n == 0 {
                Matrix3::ZERO
            } else {
                scatter.scale(1.0 / n as f64)
            };
            (n, mean, covariance)
        })
        .collect()
}
