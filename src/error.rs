use thiserror::Error;

/// Error type for GrabCut segmentation
///
/// This error type covers every failure that can stop a segmentation run,
/// from rejected input through to a failed graph cut.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GrabCutError {
    /// The source image does not carry exactly three color channels
    ///
    /// Only RGB input can be modeled by the color mixtures; the check runs
    /// before any model is initialized.
    #[error("Unsupported channel count {channels}: GrabCut requires exactly 3 color channels")]
    UnsupportedChannelCount {
        /// Channel count of the rejected image
        channels: u8,
    },

    /// The source image has no pixels
    #[error("Image dimensions must be non-zero, got {width}x{height}")]
    EmptyImage { width: u32, height: u32 },

    /// The bounding box is inverted or reaches outside the image
    ///
    /// A box that selects no pixel leaves the foreground class without
    /// samples, so it is rejected before initialization.
    #[error("Bounding box ({xmin}, {ymin})-({xmax}, {ymax}) is invalid for a {width}x{height} image")]
    InvalidBoundingBox {
        xmin: u32,
        ymin: u32,
        xmax: u32,
        ymax: u32,
        width: u32,
        height: u32,
    },

    /// Two inputs that must share dimensions do not
    #[error("Dimension mismatch: expected {expected:?}, actual {actual:?}")]
    DimensionMismatch {
        /// Expected dimensions (width, height)
        expected: (u32, u32),
        /// Actual dimensions (width, height)
        actual: (u32, u32),
    },

    /// A flat buffer does not hold one entry per pixel
    #[error("Length mismatch: expected {expected} entries, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },

    /// Invalid parameter provided to the operation
    ///
    /// This error is returned when a configuration value is invalid
    /// or outside the acceptable range for the operation.
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Building or cutting the flow network failed
    ///
    /// A failed cut cannot be skipped: the iteration has no labeling to
    /// commit, so the whole run aborts.
    #[error(transparent)]
    Graph(#[from] GraphError),

    /// A session was advanced again after one of its stages failed
    #[error("Segmentation session cannot continue after a failed stage")]
    SessionFailed,
}

/// Error type for flow network construction and min-cut solving
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GraphError {
    /// A terminal capacity is negative or not finite
    #[error("Terminal capacity {value} of node {node} must be finite and non-negative")]
    InvalidTerminalCapacity { node: usize, value: f64 },

    /// A neighbor edge capacity is negative or not finite
    #[error("Edge capacity {value} between nodes {from} and {to} must be finite and non-negative")]
    InvalidEdgeCapacity { from: usize, to: usize, value: f64 },

    /// An edge references a node outside the network
    #[error("Edge ({from}, {to}) references a node outside a network of {node_count} nodes")]
    NodeOutOfRange {
        from: usize,
        to: usize,
        node_count: usize,
    },

    /// The solver returned a partition that does not cover every node
    #[error("Solver returned {actual} node labels for a network of {expected} nodes")]
    PartitionSizeMismatch { expected: usize, actual: usize },

    /// The min-cut engine itself reported a failure
    #[error("Min-cut solver failed: {0}")]
    SolverFailed(String),
}
