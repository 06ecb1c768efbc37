mod error;
mod grabcut;
mod utils;

#[cfg(test)]
mod test_utils;

use image::{ImageBuffer, Pixel};

pub use error::{GrabCutError, GraphError};
pub use grabcut::color_image::ColorImage;
pub use grabcut::config::{DiagonalScaling, GrabCutConfig, Neighborhood};
pub use grabcut::energy::{EnergyModel, UnaryCosts};
pub use grabcut::gmm::{Gaussian, GaussianMixture, MixtureSettings, LOG_EPSILON};
pub use grabcut::graph::{
    EdmondsKarpSolver, FlowNetwork, MinCut, MinCutSolver, NeighborEdge, Terminal, TerminalEdge,
    CAPACITY_SCALE,
};
pub use grabcut::linalg::{Color, Matrix3};
pub use grabcut::matte::{AlphaMatte, BoundingBox, ComponentAssignment, ComponentMap, Label};
pub use grabcut::refine::{
    GrabCut, GrabCutSession, IterationReport, Segmentation, Stage, TerminationReason,
};
pub use grabcut::smoothness::{compute_beta, compute_weights, PairwiseEdge, PairwiseWeights};
pub use grabcut::visualize::{ApplyMatte, BACKGROUND_PALETTE, FOREGROUND_PALETTE, UNASSIGNED_COLOR};

pub type Image<P> = ImageBuffer<P, Vec<<P as Pixel>::Subpixel>>;
