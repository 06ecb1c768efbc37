use crate::error::GrabCutError;
use crate::utils::{validate_in_range, validate_non_zero, validate_positive};

/// Pixel neighborhood used for the pairwise smoothness term.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Neighborhood {
    /// Horizontal and vertical neighbors
    Four,
    /// Horizontal, vertical and diagonal neighbors
    #[default]
    Eight,
}

/// How diagonal neighbor weights relate to axis-aligned ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DiagonalScaling {
    /// Diagonal pairs weigh the same as axis-aligned pairs
    #[default]
    None,
    /// Diagonal weights are divided by their Euclidean distance `√2`
    InverseDistance,
}

/// Tunables of a GrabCut run.
///
/// `Default` reproduces the standard formulation: five components per
/// class, an 8-neighborhood, `gamma = 50`, stop when fewer than 2% of the
/// pixels change, at most ten iterations.
#[derive(Debug, Clone, PartialEq)]
pub struct GrabCutConfig {
    /// Mixture components per class (K)
    pub components: usize,
    pub neighborhood: Neighborhood,
    /// Weight of the pairwise term against the unary term
    pub gamma: f64,
    /// Changed-pixel fraction below which the loop stops
    pub convergence_threshold: f64,
    pub max_iterations: usize,
    /// Saturating unary cost used for hard constraints
    pub hard_constraint_weight: f64,
    /// Diagonal epsilon added to degenerate covariances
    pub covariance_regularization: f64,
    /// Lloyd iterations for the initial clustering
    pub kmeans_iterations: usize,
    pub diagonal_scaling: DiagonalScaling,
    /// Stop and keep the previous matte when an iteration raises the total energy
    pub reject_energy_increase: bool,
    /// Keep the matte produced by every iteration
    pub record_history: bool,
}

impl Default for GrabCutConfig {
    fn default() -> Self {
        Self {
            components: 5,
            neighborhood: Neighborhood::Eight,
            gamma: 50.0,
            convergence_threshold: 0.02,
            max_iterations: 10,
            hard_constraint_weight: 1e9,
            covariance_regularization: 0.01,
            kmeans_iterations: 10,
            diagonal_scaling: DiagonalScaling::None,
            reject_energy_increase: false,
            record_history: false,
        }
    }
}

impl GrabCutConfig {
    pub fn with_components(mut self, components: usize) -> Self {
        self.components = components;
        self
    }

    pub fn with_neighborhood(mut self, neighborhood: Neighborhood) -> Self {
        self.neighborhood = neighborhood;
        self
    }

    pub fn with_gamma(mut self, gamma: f64) -> Self {
        self.gamma = gamma;
        self
    }

    pub fn with_convergence_threshold(mut self, threshold: f64) -> Self {
        self.convergence_threshold = threshold;
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_hard_constraint_weight(mut self, weight: f64) -> Self {
        self.hard_constraint_weight = weight;
        self
    }

    pub fn with_covariance_regularization(mut self, epsilon: f64) -> Self {
        self.covariance_regularization = epsilon;
        self
    }

    pub fn with_kmeans_iterations(mut self, iterations: usize) -> Self {
        self.kmeans_iterations = iterations;
        self
    }

    pub fn with_diagonal_scaling(mut self, scaling: DiagonalScaling) -> Self {
        self.diagonal_scaling = scaling;
        self
    }

    pub fn with_energy_rejection(mut self, enabled: bool) -> Self {
        self.reject_energy_increase = enabled;
        self
    }

    pub fn with_history(mut self, enabled: bool) -> Self {
        self.record_history = enabled;
        self
    }

    /// Checks every tunable.
    ///
    /// # Errors
    ///
    /// * `GrabCutError::InvalidParameter` - When a count is zero, a weight is not
    ///   positive, or the threshold falls outside `[0, 1]`
    pub fn validate(&self) -> Result<(), GrabCutError> {
        validate_non_zero(self.components, "components")
            .and_then(|()| validate_non_zero(self.max_iterations, "max_iterations"))
            .and_then(|()| validate_non_zero(self.kmeans_iterations, "kmeans_iterations"))
            .and_then(|()| validate_positive(self.gamma, "gamma"))
            .and_then(|()| validate_positive(self.hard_constraint_weight, "hard_constraint_weight"))
            .and_then(|()| {
                validate_positive(self.covariance_regularization, "covariance_regularization")
            })
            .and_then(|()| {
                validate_in_range(self.convergence_threshold, 0.0, 1.0, "convergence_threshold")
            })
            .map_err(GrabCutError::InvalidParameter)
    }
}
