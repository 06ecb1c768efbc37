//! Iterative refinement loop.
//!
//! A [`GrabCutSession`] walks the stages
//! `Init → (AssignComponents → ReestimateGmm → BuildEnergy → MinCut →
//! UpdateAlpha → CheckConvergence)* → Terminated`. The matte and both
//! mixtures are owned by the session and replaced wholesale at each stage.

use image::{DynamicImage, Pixel, Primitive, Rgb};
use imageproc::definitions::Image;

use crate::error::{GrabCutError, GraphError};
use crate::grabcut::color_image::ColorImage;
use crate::grabcut::config::GrabCutConfig;
use crate::grabcut::energy::{EnergyModel, UnaryCosts};
use crate::grabcut::gmm::{GaussianMixture, MixtureSettings};
use crate::grabcut::graph::{EdmondsKarpSolver, FlowNetwork, MinCut, MinCutSolver, Terminal};
use crate::grabcut::linalg::Color;
use crate::grabcut::matte::{
    AlphaMatte, BoundingBox, ComponentAssignment, ComponentMap, Label,
};
use crate::grabcut::smoothness::{compute_beta, compute_weights, PairwiseWeights};
use crate::utils::map_indexed;

/// Relative slack before an energy rise counts as an increase.
const ENERGY_TOLERANCE: f64 = 1e-9;

/// Observable stage of a session: the stage that runs on the next [`GrabCutSession::advance`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Init,
    AssignComponents,
    ReestimateGmm,
    BuildEnergy,
    MinCut,
    UpdateAlpha,
    CheckConvergence,
    Terminated,
}

/// Why a session stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TerminationReason {
    /// Fewer pixels than the threshold changed in the last iteration
    Converged,
    /// The iteration cap was reached
    MaxIterations,
    /// The last iteration raised the total energy and was discarded
    EnergyIncreased,
}

/// Diagnostics of one committed iteration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IterationReport {
    /// 1-based iteration number
    pub iteration: usize,
    pub changed_pixels: usize,
    /// `changed_pixels / pixel count`
    pub changed_fraction: f64,
    /// Total energy of the new matte under this iteration's models
    pub energy: f64,
    /// Max-flow value reported by the solver
    pub flow: f64,
    pub foreground_pixels: usize,
}

/// Final result of a run.
#[derive(Debug, Clone, PartialEq)]
pub struct Segmentation {
    pub matte: AlphaMatte,
    /// Component assignment of the last iteration
    pub components: Option<ComponentMap>,
    pub reports: Vec<IterationReport>,
    pub termination: TerminationReason,
    /// Initial box matte followed by the matte of every committed iteration,
    /// empty unless history was requested
    pub history: Vec<AlphaMatte>,
    /// Component assignment of every committed iteration, empty unless
    /// history was requested
    pub component_history: Vec<ComponentMap>,
}

impl Segmentation {
    /// Number of committed iterations.
    #[inline]
    pub fn iterations(&self) -> usize {
        self.reports.len()
    }
}

enum Step {
    Init,
    AssignComponents,
    ReestimateGmm,
    BuildEnergy,
    MinCut {
        network: FlowNetwork,
        unary: UnaryCosts,
    },
    UpdateAlpha {
        cut: MinCut,
        unary: UnaryCosts,
    },
    CheckConvergence {
        previous: AlphaMatte,
        report: IterationReport,
    },
    Terminated(TerminationReason),
    Failed,
}

impl Step {
    const fn stage(&self) -> Stage {
        match self {
            Self::Init => Stage::Init,
            Self::AssignComponents => Stage::AssignComponents,
            Self::ReestimateGmm => Stage::ReestimateGmm,
            Self::BuildEnergy => Stage::BuildEnergy,
            Self::MinCut { .. } => Stage::MinCut,
            Self::UpdateAlpha { .. } => Stage::UpdateAlpha,
            Self::CheckConvergence { .. } => Stage::CheckConvergence,
            Self::Terminated(_) | Self::Failed => Stage::Terminated,
        }
    }
}

/// Step-wise GrabCut state machine over one image and bounding box.
///
/// # Examples
///
/// ```no_run
/// use imageops_grabcut::{BoundingBox, ColorImage, GrabCutConfig, GrabCutSession, Stage};
///
/// # fn example(colors: ColorImage) -> Result<(), Box<dyn std::error::Error>> {
/// let mut session =
///     GrabCutSession::new(colors, BoundingBox::new(10, 10, 90, 70), GrabCutConfig::default())?;
/// while let Some(report) = session.iterate()? {
///     println!("iteration {}: {:.3} changed", report.iteration, report.changed_fraction);
/// }
/// assert_eq!(session.stage(), Stage::Terminated);
/// # Ok(())
/// # }
/// ```
pub struct GrabCutSession<M = EdmondsKarpSolver> {
    image: ColorImage,
    bbox: BoundingBox,
    config: GrabCutConfig,
    energy: EnergyModel,
    solver: M,
    matte: AlphaMatte,
    foreground: GaussianMixture,
    background: GaussianMixture,
    pairwise: Option<PairwiseWeights>,
    components: Option<ComponentMap>,
    iteration: usize,
    reference_energy: Option<f64>,
    reports: Vec<IterationReport>,
    history: Vec<AlphaMatte>,
    component_history: Vec<ComponentMap>,
    /// Models the current matte was committed under, kept while energy rejection is on
    committed_models: Option<(GaussianMixture, GaussianMixture)>,
    step: Step,
}

impl GrabCutSession {
    /// Session using the built-in Edmonds-Karp solver.
    ///
    /// # Errors
    ///
    /// * `GrabCutError::InvalidParameter` - When `config` fails validation
    /// * `GrabCutError::InvalidBoundingBox` - When `bbox` is empty or exceeds the image
    pub fn new(
        image: ColorImage,
        bbox: BoundingBox,
        config: GrabCutConfig,
    ) -> Result<Self, GrabCutError> {
        Self::with_solver(image, bbox, config, EdmondsKarpSolver::default())
    }
}

impl<M: MinCutSolver> GrabCutSession<M> {
    /// Session cutting every iteration with `solver`.
    ///
    /// # Errors
    ///
    /// * `GrabCutError::InvalidParameter` - When `config` fails validation
    /// * `GrabCutError::InvalidBoundingBox` - When `bbox` is empty or exceeds the image
    pub fn with_solver(
        image: ColorImage,
        bbox: BoundingBox,
        config: GrabCutConfig,
        solver: M,
    ) -> Result<Self, GrabCutError> {
        config.validate()?;
        let (width, height) = image.dimensions();
        bbox.validate(width, height)?;

        let settings = MixtureSettings {
            regularization: config.covariance_regularization,
            kmeans_iterations: config.kmeans_iterations,
        };
        Ok(Self {
            matte: AlphaMatte::from_bounding_box(width, height, &bbox),
            foreground: GaussianMixture::empty(config.components, settings),
            background: GaussianMixture::empty(config.components, settings),
            energy: EnergyModel::from_config(&config),
            image,
            bbox,
            config,
            solver,
            pairwise: None,
            components: None,
            iteration: 0,
            reference_energy: None,
            reports: Vec::new(),
            history: Vec::new(),
            component_history: Vec::new(),
            committed_models: None,
            step: Step::Init,
        })
    }

    #[inline]
    pub const fn stage(&self) -> Stage {
        self.step.stage()
    }

    /// Iterations started so far.
    #[inline]
    pub const fn iteration(&self) -> usize {
        self.iteration
    }

    #[inline]
    pub const fn matte(&self) -> &AlphaMatte {
        &self.matte
    }

    #[inline]
    pub const fn components(&self) -> Option<&ComponentMap> {
        self.components.as_ref()
    }

    #[inline]
    pub const fn foreground_model(&self) -> &GaussianMixture {
        &self.foreground
    }

    #[inline]
    pub const fn background_model(&self) -> &GaussianMixture {
        &self.background
    }

    #[inline]
    pub const fn pairwise_weights(&self) -> Option<&PairwiseWeights> {
        self.pairwise.as_ref()
    }

    #[inline]
    pub fn reports(&self) -> &[IterationReport] {
        &self.reports
    }

    /// Initial matte and the matte of every committed iteration.
    #[inline]
    pub fn history(&self) -> &[AlphaMatte] {
        &self.history
    }

    #[inline]
    pub fn component_history(&self) -> &[ComponentMap] {
        &self.component_history
    }

    #[inline]
    pub const fn bounding_box(&self) -> &BoundingBox {
        &self.bbox
    }

    #[inline]
    pub const fn config(&self) -> &GrabCutConfig {
        &self.config
    }

    pub fn termination(&self) -> Option<TerminationReason> {
        match self.step {
            Step::Terminated(reason) => Some(reason),
            _ => None,
        }
    }

    /// Runs the current stage and returns the stage that follows it.
    ///
    /// Advancing a terminated session is a no-op.
    ///
    /// # Errors
    ///
    /// * `GrabCutError::Graph` - When the network is malformed or the solver fails
    /// * `GrabCutError::SessionFailed` - When an earlier stage already failed
    pub fn advance(&mut self) -> Result<Stage, GrabCutError> {
        let step = std::mem::replace(&mut self.step, Step::Failed);
        let next = match step {
            Step::Failed => return Err(GrabCutError::SessionFailed),
            Step::Terminated(reason) => Step::Terminated(reason),
            Step::Init => self.initialize(),
            Step::AssignComponents => self.assign_components(),
            Step::ReestimateGmm => self.reestimate(),
            Step::BuildEnergy => self.build_energy()?,
            Step::MinCut { network, unary } => self.min_cut(&network, unary)?,
            Step::UpdateAlpha { cut, unary } => self.update_alpha(&cut, &unary)?,
            Step::CheckConvergence { previous, report } => {
                self.check_convergence(previous, report)
            }
        };
        self.step = next;
        let stage = self.stage();
        log::trace!("grabcut stage -> {stage:?}");
        Ok(stage)
    }

    /// Runs stages until the next iteration is committed.
    ///
    /// Returns `None` once the session has terminated without committing a
    /// further iteration.
    ///
    /// # Errors
    ///
    /// See [`Self::advance`].
    pub fn iterate(&mut self) -> Result<Option<IterationReport>, GrabCutError> {
        let committed = self.reports.len();
        loop {
            let stage = self.advance()?;
            if self.reports.len() > committed {
                return Ok(self.reports.last().copied());
            }
            if stage == Stage::Terminated {
                return Ok(None);
            }
        }
    }

    /// Runs to termination.
    ///
    /// # Errors
    ///
    /// See [`Self::advance`].
    pub fn run(mut self) -> Result<Segmentation, GrabCutError> {
        let termination = loop {
            if let Step::Terminated(reason) = self.step {
                break reason;
            }
            self.advance()?;
        };
        Ok(Segmentation {
            matte: self.matte,
            components: self.components,
            reports: self.reports,
            termination,
            history: self.history,
            component_history: self.component_history,
        })
    }

    fn pairwise(&self) -> Result<&PairwiseWeights, GrabCutError> {
        self.pairwise.as_ref().ok_or(GrabCutError::SessionFailed)
    }

    fn initialize(&mut self) -> Step {
        let (width, height) = self.image.dimensions();
        let labels = self.matte.labels();
        let (inside, outside): (Vec<_>, Vec<_>) = self
            .image
            .pixels()
            .iter()
            .zip(labels)
            .partition(|(_, label)| label.is_foreground());
        let inside: Vec<Color> = inside.into_iter().map(|(&color, _)| color).collect();
        let outside: Vec<Color> = outside.into_iter().map(|(&color, _)| color).collect();

        let settings = MixtureSettings {
            regularization: self.config.covariance_regularization,
            kmeans_iterations: self.config.kmeans_iterations,
        };
        let (foreground, foreground_labels) =
            GaussianMixture::initialize(&inside, self.config.components, settings);
        let (background, background_labels) =
            GaussianMixture::initialize(&outside, self.config.components, settings);
        if self.bbox.covers(width, height) {
            log::warn!("bounding box covers the whole image, background model starts empty");
        }

        let mut foreground_labels = foreground_labels.into_iter();
        let mut background_labels = background_labels.into_iter();
        let assignments = labels
            .iter()
            .map(|&class| {
                let component = match class {
                    Label::Foreground => foreground_labels.next(),
                    Label::Background => background_labels.next(),
                };
                ComponentAssignment { class, component }
            })
            .collect();

        let beta = compute_beta(&self.image);
        let pairwise = compute_weights(
            &self.image,
            self.config.neighborhood,
            beta,
            self.config.diagonal_scaling,
        );
        log::debug!(
            "initialized {}x{}: {} foreground / {} background pixels, {} + {} components, beta = {beta:.6e}",
            width,
            height,
            inside.len(),
            outside.len(),
            foreground.len(),
            background.len()
        );

        self.components = Some(ComponentMap::new(width, height, assignments));
        self.foreground = foreground;
        self.background = background;
        self.pairwise = Some(pairwise);
        if self.config.record_history {
            self.history.push(self.matte.clone());
        }
        Step::AssignComponents
    }

    fn assign_components(&mut self) -> Step {
        self.iteration += 1;
        let (width, height) = self.image.dimensions();
        let pixels = self.image.pixels();
        let labels = self.matte.labels();
        let (foreground, background) = (&self.foreground, &self.background);

        let assignments = map_indexed(pixels.len(), |p| {
            let class = labels[p];
            let model = match class {
                Label::Foreground => foreground,
                Label::Background => background,
            };
            ComponentAssignment {
                class,
                component: model.best_component(&pixels[p]).map(|(k, _)| k),
            }
        });

        self.components = Some(ComponentMap::new(width, height, assignments));
        Step::ReestimateGmm
    }

    fn reestimate(&mut self) -> Step {
        let Some(components) = self.components.as_ref() else {
            return Step::AssignComponents;
        };
        let pixels = self.image.pixels();
        let fit = |model: &GaussianMixture, class: Label| {
            let (samples, assignment): (Vec<Color>, Vec<usize>) = components
                .class_assignments(class)
                .map(|(p, component)| (pixels[p], component.unwrap_or(0)))
                .unzip();
            if samples.is_empty() {
                log::warn!("{class:?} class has no pixels, keeping its previous model");
            }
            model.reestimate(&samples, &assignment)
        };

        let foreground = fit(&self.foreground, Label::Foreground);
        let background = fit(&self.background, Label::Background);
        let previous = (
            std::mem::replace(&mut self.foreground, foreground),
            std::mem::replace(&mut self.background, background),
        );
        if self.config.reject_energy_increase {
            self.committed_models = Some(previous);
        }
        Step::BuildEnergy
    }

    fn build_energy(&mut self) -> Result<Step, GrabCutError> {
        let unary = self.energy.unary_costs(
            &self.image,
            &self.bbox,
            &self.foreground,
            &self.background,
        );
        let pairwise = self.pairwise()?;
        let network = FlowNetwork::build(&unary, pairwise, &self.energy)?;
        if self.reference_energy.is_none() {
            let initial = self.energy.total_energy(&unary, pairwise, &self.matte);
            self.reference_energy = Some(initial);
        }
        Ok(Step::MinCut { network, unary })
    }

    fn min_cut(&mut self, network: &FlowNetwork, unary: UnaryCosts) -> Result<Step, GrabCutError> {
        let cut = self.solver.solve(network)?;
        if cut.sides.len() != network.node_count() {
            return Err(GraphError::PartitionSizeMismatch {
                expected: network.node_count(),
                actual: cut.sides.len(),
            }
            .into());
        }
        Ok(Step::UpdateAlpha { cut, unary })
    }

    fn update_alpha(&mut self, cut: &MinCut, unary: &UnaryCosts) -> Result<Step, GrabCutError> {
        let (width, height) = self.image.dimensions();
        let row = width as usize;
        let bbox = self.bbox;

        let mut forced = 0usize;
        let labels = cut
            .sides
            .iter()
            .enumerate()
            .map(|(p, &side)| {
                let (x, y) = ((p % row) as u32, (p / row) as u32);
                if bbox.contains(x, y) {
                    side.label()
                } else {
                    if side == Terminal::Source {
                        forced += 1;
                    }
                    Label::Background
                }
            })
            .collect();
        if forced > 0 {
            log::warn!("solver put {forced} pixels outside the bounding box in the foreground, forcing background");
        }

        let matte = AlphaMatte::from_labels(width, height, labels)?;
        let changed_pixels = matte.changed_from(&self.matte);
        let energy = self.energy.total_energy(unary, self.pairwise()?, &matte);
        let report = IterationReport {
            iteration: self.iteration,
            changed_pixels,
            changed_fraction: changed_pixels as f64 / self.image.len() as f64,
            energy,
            flow: cut.flow,
            foreground_pixels: matte.count(Label::Foreground),
        };

        let previous = std::mem::replace(&mut self.matte, matte);
        Ok(Step::CheckConvergence { previous, report })
    }

    fn check_convergence(&mut self, previous: AlphaMatte, report: IterationReport) -> Step {
        if self.config.reject_energy_increase {
            if let Some(reference) = self.reference_energy {
                if report.energy > reference + ENERGY_TOLERANCE * reference.abs().max(1.0) {
                    log::info!(
                        "iteration {} raised energy from {reference:.6e} to {:.6e}, keeping previous matte",
                        report.iteration,
                        report.energy
                    );
                    self.matte = previous;
                    if let Some((foreground, background)) = self.committed_models.take() {
                        self.foreground = foreground;
                        self.background = background;
                    }
                    return Step::Terminated(TerminationReason::EnergyIncreased);
                }
            }
        }

        log::debug!(
            "iteration {}: {} pixels changed ({:.4}), energy {:.6e}, flow {:.6e}, {} foreground",
            report.iteration,
            report.changed_pixels,
            report.changed_fraction,
            report.energy,
            report.flow,
            report.foreground_pixels
        );
        self.reference_energy = Some(report.energy);
        self.reports.push(report);
        if self.config.record_history {
            self.history.push(self.matte.clone());
            if let Some(components) = &self.components {
                self.component_history.push(components.clone());
            }
        }

        let reason = if report.changed_fraction < self.config.convergence_threshold {
            Some(TerminationReason::Converged)
        } else if self.iteration >= self.config.max_iterations {
            Some(TerminationReason::MaxIterations)
        } else {
            None
        };

        match reason {
            Some(reason) => {
                log::info!(
                    "GrabCut stopped after {} iterations: {reason:?}",
                    self.iteration
                );
                Step::Terminated(reason)
            }
            None => Step::AssignComponents,
        }
    }
}

/// GrabCut segmentation seeded by a bounding box.
pub trait GrabCut {
    /// Segments the image with the built-in solver.
    ///
    /// # Arguments
    ///
    /// * `bbox` - Inclusive rectangle around the object; pixels outside stay background
    /// * `config` - Tunables of the run
    ///
    /// # Returns
    ///
    /// The final matte with per-iteration diagnostics
    ///
    /// # Errors
    ///
    /// * `GrabCutError::UnsupportedChannelCount` - When the image is not 3-channel RGB
    /// * `GrabCutError::InvalidBoundingBox` - When `bbox` is empty or exceeds the image
    /// * `GrabCutError::InvalidParameter` - When `config` fails validation
    /// * `GrabCutError::Graph` - When a min-cut fails
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use imageops_grabcut::{BoundingBox, GrabCut, GrabCutConfig, Image, Label};
    /// use image::Rgb;
    ///
    /// # fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// let image: Image<Rgb<u8>> = Image::new(64, 48);
    /// let result = image.grab_cut(BoundingBox::new(8, 8, 55, 39), &GrabCutConfig::default())?;
    /// println!("{} foreground pixels", result.matte.count(Label::Foreground));
    /// # Ok(())
    /// # }
    /// ```
    fn grab_cut(
        &self,
        bbox: BoundingBox,
        config: &GrabCutConfig,
    ) -> Result<Segmentation, GrabCutError> {
        self.grab_cut_with_solver(bbox, config, EdmondsKarpSolver::default())
    }

    /// Segments the image, cutting every iteration with `solver`.
    ///
    /// # Errors
    ///
    /// See [`GrabCut::grab_cut`].
    fn grab_cut_with_solver<M: MinCutSolver>(
        &self,
        bbox: BoundingBox,
        config: &GrabCutConfig,
        solver: M,
    ) -> Result<Segmentation, GrabCutError>;
}

impl<S> GrabCut for Image<Rgb<S>>
where
    Rgb<S>: Pixel<Subpixel = S>,
    S: Primitive,
    f64: From<S>,
{
    fn grab_cut_with_solver<M: MinCutSolver>(
        &self,
        bbox: BoundingBox,
        config: &GrabCutConfig,
        solver: M,
    ) -> Result<Segmentation, GrabCutError> {
        let colors = ColorImage::from_rgb(self)?;
        GrabCutSession::with_solver(colors, bbox, config.clone(), solver)?.run()
    }
}

impl GrabCut for DynamicImage {
    fn grab_cut_with_solver<M: MinCutSolver>(
        &self,
        bbox: BoundingBox,
        config: &GrabCutConfig,
        solver: M,
    ) -> Result<Segmentation, GrabCutError> {
        let colors = ColorImage::from_dynamic(self)?;
        GrabCutSession::with_solver(colors, bbox, config.clone(), solver)?.run()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::create_box_image;

    /// Returns a fixed sequence of partitions, repeating the last one.
    struct ScriptedSolver {
        partitions: Vec<Vec<Terminal>>,
        calls: usize,
    }

    impl MinCutSolver for ScriptedSolver {
        fn solve(&mut self, _network: &FlowNetwork) -> Result<MinCut, GraphError> {
            let index = self.calls.min(self.partitions.len() - 1);
            self.calls += 1;
            Ok(MinCut {
                flow: 0.0,
                sides: self.partitions[index].clone(),
            })
        }
    }

    struct FailingSolver;

    impl MinCutSolver for FailingSolver {
        fn solve(&mut self, _network: &FlowNetwork) -> Result<MinCut, GraphError> {
            Err(GraphError::SolverFailed("engine unavailable".to_string()))
        }
    }

    fn box_colors() -> ColorImage {
        ColorImage::from_rgb(&create_box_image(4, 4, BoundingBox::new(1, 1, 2, 2))).unwrap()
    }

    #[test]
    fn stages_follow_the_loop_order() {
        let config = GrabCutConfig::default().with_components(1).with_max_iterations(1);
        let mut session =
            GrabCutSession::new(box_colors(), BoundingBox::new(1, 1, 2, 2), config).unwrap();

        assert_eq!(session.stage(), Stage::Init);
        let expected = [
            Stage::AssignComponents,
            Stage::ReestimateGmm,
            Stage::BuildEnergy,
            Stage::MinCut,
            Stage::UpdateAlpha,
            Stage::CheckConvergence,
            Stage::Terminated,
        ];
        for stage in expected {
            assert_eq!(session.advance().unwrap(), stage);
        }
        assert!(session.termination().is_some());
        // Terminated sessions stay put
        assert_eq!(session.advance().unwrap(), Stage::Terminated);
    }

    #[test]
    fn init_fits_both_models_and_pairwise_weights() {
        let config = GrabCutConfig::default().with_components(1);
        let mut session =
            GrabCutSession::new(box_colors(), BoundingBox::new(1, 1, 2, 2), config).unwrap();
        assert!(session.foreground_model().is_empty());
        session.advance().unwrap();

        assert_eq!(session.foreground_model().len(), 1);
        assert_eq!(session.background_model().len(), 1);
        assert_eq!(session.foreground_model().sample_count(), 4);
        assert_eq!(session.background_model().sample_count(), 12);
        assert!(session.pairwise_weights().is_some());
        let components = session.components().unwrap();
        assert!(components
            .assignments()
            .iter()
            .all(|a| a.component == Some(0)));
    }

    /// Solver labeling the first `count` pixels background, one prefix per call.
    fn prefix_solver(n: usize, prefixes: &[usize]) -> ScriptedSolver {
        let partitions = prefixes
            .iter()
            .map(|&background| {
                (0..n)
                    .map(|p| if p < background { Terminal::Sink } else { Terminal::Source })
                    .collect()
            })
            .collect();
        ScriptedSolver {
            partitions,
            calls: 0,
        }
    }

    fn patterned_colors(width: u32, height: u32) -> ColorImage {
        let n = (width * height) as usize;
        ColorImage::from_colors(
            width,
            height,
            (0..n).map(|p| [(p % 7) as f64 * 30.0, (p % 5) as f64 * 40.0, 90.0]).collect(),
        )
        .unwrap()
    }

    #[test]
    fn scripted_change_fractions_stop_at_first_below_threshold() {
        // 20x10 image with a full box; background prefixes give change
        // fractions 0.5, 0.3, 0.1 and 0.015
        let (width, height) = (20u32, 10u32);
        let mut solver = prefix_solver(200, &[100, 160, 180, 183, 200]);
        let colors = patterned_colors(width, height);
        let config = GrabCutConfig::default().with_max_iterations(10);
        let session = GrabCutSession::with_solver(
            colors,
            BoundingBox::full(width, height),
            config,
            &mut solver,
        )
        .unwrap();
        let result = session.run().unwrap();

        let fractions: Vec<f64> = result.reports.iter().map(|r| r.changed_fraction).collect();
        assert_eq!(result.iterations(), 4);
        assert_eq!(result.termination, TerminationReason::Converged);
        for (actual, expected) in fractions.iter().zip([0.5, 0.3, 0.1, 0.015]) {
            assert!((actual - expected).abs() < 1e-12);
        }
        assert_eq!(solver.calls, 4);
        assert_eq!(result.matte.count(Label::Background), 183);
    }

    #[test]
    fn change_fraction_at_threshold_keeps_iterating() {
        // Fractions 0.5, exactly 0.02, then 0.005
        let (width, height) = (20u32, 10u32);
        let mut solver = prefix_solver(200, &[100, 104, 105]);
        let config = GrabCutConfig::default().with_convergence_threshold(0.02);
        let result = GrabCutSession::with_solver(
            patterned_colors(width, height),
            BoundingBox::full(width, height),
            config,
            &mut solver,
        )
        .unwrap()
        .run()
        .unwrap();

        assert_eq!(result.reports[1].changed_fraction, 0.02);
        assert_eq!(result.iterations(), 3);
        assert_eq!(solver.calls, 3);
        assert_eq!(result.termination, TerminationReason::Converged);
    }

    #[test]
    fn solver_disagreement_outside_box_is_overridden() {
        let n = 16;
        let mut solver = ScriptedSolver {
            partitions: vec![vec![Terminal::Source; n]],
            calls: 0,
        };
        let bbox = BoundingBox::new(1, 1, 2, 2);
        let config = GrabCutConfig::default().with_components(1).with_max_iterations(2);
        let result = GrabCutSession::with_solver(box_colors(), bbox, config, &mut solver)
            .unwrap()
            .run()
            .unwrap();

        let matte = &result.matte;
        for y in 0..4 {
            for x in 0..4 {
                let expected = if bbox.contains(x, y) {
                    Label::Foreground
                } else {
                    Label::Background
                };
                assert_eq!(matte.get(x, y), expected);
            }
        }
    }

    #[test]
    fn solver_failure_aborts_and_poisons_session() {
        let config = GrabCutConfig::default().with_components(1);
        let mut session = GrabCutSession::with_solver(
            box_colors(),
            BoundingBox::new(1, 1, 2, 2),
            config,
            FailingSolver,
        )
        .unwrap();

        let error = session.iterate().unwrap_err();
        assert!(matches!(
            error,
            GrabCutError::Graph(GraphError::SolverFailed(_))
        ));
        assert_eq!(session.advance(), Err(GrabCutError::SessionFailed));
    }

    #[test]
    fn short_partition_is_rejected() {
        let mut solver = ScriptedSolver {
            partitions: vec![vec![Terminal::Sink; 3]],
            calls: 0,
        };
        let config = GrabCutConfig::default().with_components(1);
        let result = GrabCutSession::with_solver(
            box_colors(),
            BoundingBox::new(1, 1, 2, 2),
            config,
            &mut solver,
        )
        .unwrap()
        .run();
        assert_eq!(
            result,
            Err(GrabCutError::Graph(GraphError::PartitionSizeMismatch {
                expected: 16,
                actual: 3
            }))
        );
    }

    #[test]
    fn energy_increase_keeps_previous_matte() {
        // The first cut labels everything background, which is far costlier
        // than the bright box under its own foreground model
        let mut solver = ScriptedSolver {
            partitions: vec![vec![Terminal::Sink; 16]],
            calls: 0,
        };
        let bbox = BoundingBox::new(1, 1, 2, 2);
        let config = GrabCutConfig::default()
            .with_components(1)
            .with_energy_rejection(true);
        let result = GrabCutSession::with_solver(box_colors(), bbox, config, &mut solver)
            .unwrap()
            .run()
            .unwrap();

        assert_eq!(result.termination, TerminationReason::EnergyIncreased);
        assert!(result.reports.is_empty());
        assert_eq!(result.matte, AlphaMatte::from_bounding_box(4, 4, &bbox));
    }

    #[test]
    fn energy_increase_restores_committed_models() {
        // The box holds a dark ring around the bright object: cutting the
        // ring away lowers the energy, labeling everything background after
        // the models tighten raises it
        let object = BoundingBox::new(2, 2, 3, 3);
        let bbox = BoundingBox::new(1, 1, 4, 4);
        let colors = ColorImage::from_rgb(&create_box_image(6, 6, object)).unwrap();
        let object_cut = (0..36u32)
            .map(|p| {
                if object.contains(p % 6, p / 6) {
                    Terminal::Source
                } else {
                    Terminal::Sink
                }
            })
            .collect();
        let mut solver = ScriptedSolver {
            partitions: vec![object_cut, vec![Terminal::Sink; 36]],
            calls: 0,
        };
        let config = GrabCutConfig::default()
            .with_components(1)
            .with_energy_rejection(true);
        let mut session = GrabCutSession::with_solver(colors, bbox, config, &mut solver).unwrap();

        let first = session.iterate().unwrap().unwrap();
        assert_eq!(first.foreground_pixels, 4);
        let foreground = session.foreground_model().clone();
        let background = session.background_model().clone();
        let matte = session.matte().clone();

        assert_eq!(session.iterate().unwrap(), None);
        assert_eq!(session.termination(), Some(TerminationReason::EnergyIncreased));
        assert_eq!(session.matte(), &matte);
        assert_eq!(session.foreground_model(), &foreground);
        assert_eq!(session.background_model(), &background);
        drop(session);
        assert_eq!(solver.calls, 2);
    }

    #[test]
    fn history_starts_with_box_and_records_every_iteration() {
        let bbox = BoundingBox::new(1, 1, 2, 2);
        let config = GrabCutConfig::default()
            .with_components(1)
            .with_history(true);
        let result = create_box_image(4, 4, bbox).grab_cut(bbox, &config).unwrap();
        assert_eq!(result.history.len(), result.iterations() + 1);
        assert_eq!(result.history[0], AlphaMatte::from_bounding_box(4, 4, &bbox));
        assert_eq!(result.history.last(), Some(&result.matte));
        assert_eq!(result.component_history.len(), result.iterations());
        assert_eq!(result.component_history.last(), result.components.as_ref());
    }

    #[test]
    fn history_is_empty_unless_requested() {
        let bbox = BoundingBox::new(1, 1, 2, 2);
        let config = GrabCutConfig::default().with_components(1);
        let result = create_box_image(4, 4, bbox).grab_cut(bbox, &config).unwrap();
        assert!(result.history.is_empty());
        assert!(result.component_history.is_empty());
    }

    #[test]
    fn invalid_inputs_are_rejected_before_init() {
        let colors = box_colors();
        assert!(matches!(
            GrabCutSession::new(colors.clone(), BoundingBox::new(0, 0, 4, 4), GrabCutConfig::default()),
            Err(GrabCutError::InvalidBoundingBox { .. })
        ));
        assert!(matches!(
            GrabCutSession::new(
                colors,
                BoundingBox::new(0, 0, 1, 1),
                GrabCutConfig::default().with_gamma(-1.0)
            ),
            Err(GrabCutError::InvalidParameter(_))
        ));
    }
}
