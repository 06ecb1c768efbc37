//! Unary and pairwise terms of the segmentation energy.
//!
//! `E(α) = Σ_p D_{α(p)}(p) + γ Σ_{(p,q): α(p) ≠ α(q)} w(p,q)`, where `D_fg`
//! and `D_bg` are mixture log-costs and `w` the contrast weights.

use crate::grabcut::color_image::ColorImage;
use crate::grabcut::config::GrabCutConfig;
use crate::grabcut::gmm::GaussianMixture;
use crate::grabcut::matte::{AlphaMatte, BoundingBox, Label};
use crate::grabcut::smoothness::PairwiseWeights;
use crate::utils::map_indexed;

/// Per-pixel cost of either label.
///
/// Costs are clamped to the hard constraint weight; pixels outside the
/// bounding box cost `0` as background and the hard weight as foreground.
#[derive(Debug, Clone, PartialEq)]
pub struct UnaryCosts {
    foreground: Vec<f64>,
    background: Vec<f64>,
}

impl UnaryCosts {
    /// Wraps precomputed costs, both slices indexed by pixel.
    pub fn from_costs(foreground: Vec<f64>, background: Vec<f64>) -> Self {
        debug_assert_eq!(foreground.len(), background.len());
        Self {
            foreground,
            background,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.foreground.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.foreground.is_empty()
    }

    #[inline]
    pub fn cost(&self, p: usize, label: Label) -> f64 {
        match label {
            Label::Foreground => self.foreground[p],
            Label::Background => self.background[p],
        }
    }

    /// Terminal capacities `(source, sink)` of pixel `p`.
    ///
    /// The source side is foreground, so cutting the source edge labels the
    /// pixel background and costs `D_bg`; both costs are shifted by their
    /// minimum, which leaves the optimal cut unchanged.
    #[inline]
    pub fn capacities(&self, p: usize) -> (f64, f64) {
        let (fg, bg) = (self.foreground[p], self.background[p]);
        let shift = fg.min(bg);
        (bg - shift, fg - shift)
    }

    /// Sum of the cost of every pixel at its label.
    pub fn total(&self, labels: &[Label]) -> f64 {
        labels
            .iter()
            .enumerate()
            .map(|(p, &label)| self.cost(p, label))
            .sum()
    }
}

/// Turns color models and contrast weights into energy terms.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnergyModel {
    gamma: f64,
    hard_constraint_weight: f64,
}

impl EnergyModel {
    pub const fn new(gamma: f64, hard_constraint_weight: f64) -> Self {
        Self {
            gamma,
            hard_constraint_weight,
        }
    }

    pub const fn from_config(config: &GrabCutConfig) -> Self {
        Self::new(config.gamma, config.hard_constraint_weight)
    }

    #[inline]
    pub const fn gamma(&self) -> f64 {
        self.gamma
    }

    #[inline]
    pub const fn hard_constraint_weight(&self) -> f64 {
        self.hard_constraint_weight
    }

    /// Cost of a color under `model`: the lowest component log-cost, clamped
    /// to the hard weight. An empty model costs the hard weight.
    #[inline]
    fn class_cost(&self, model: &GaussianMixture, color: &[f64; 3]) -> f64 {
        let hard = self.hard_constraint_weight;
        model
            .best_component(color)
            .map_or(hard, |(_, cost)| cost.min(hard).max(-hard))
    }

    /// Unary costs for every pixel.
    pub fn unary_costs(
        &self,
        image: &ColorImage,
        bbox: &BoundingBox,
        foreground: &GaussianMixture,
        background: &GaussianMixture,
    ) -> UnaryCosts {
        let width = image.width() as usize;
        let pixels = image.pixels();
        let costs = map_indexed(image.len(), |p| {
            let (x, y) = ((p % width) as u32, (p / width) as u32);
            if !bbox.contains(x, y) {
                return (self.hard_constraint_weight, 0.0);
            }
            (
                self.class_cost(foreground, &pixels[p]),
                self.class_cost(background, &pixels[p]),
            )
        });
        let (foreground, background) = costs.into_iter().unzip();
        UnaryCosts::from_costs(foreground, background)
    }

    /// Capacity of the edge between a neighbor pair.
    #[inline]
    pub fn pairwise_capacity(&self, weight: f64) -> f64 {
        self.gamma * weight
    }

    /// Total energy of `matte`.
    pub fn total_energy(
        &self,
        unary: &UnaryCosts,
        pairwise: &PairwiseWeights,
        matte: &AlphaMatte,
    ) -> f64 {
        let labels = matte.labels();
        self.pairwise_capacity(pairwise.disagreement(labels)) + unary.total(labels)
    }
}
