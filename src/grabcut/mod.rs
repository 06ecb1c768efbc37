pub mod color_image;
pub mod config;
pub mod energy;
pub mod gmm;
pub mod graph;
pub(crate) mod kmeans;
pub mod linalg;
pub mod matte;
pub mod refine;
pub mod smoothness;
pub mod visualize;
