//! Contrast-sensitive pairwise weights.
//!
//! Weights depend only on the image and `beta`, never on the matte, so they
//! are computed once per run.

use itertools::iproduct;

use crate::grabcut::color_image::ColorImage;
use crate::grabcut::config::{DiagonalScaling, Neighborhood};
use crate::grabcut::matte::Label;
use crate::utils::{fold_indexed, map_indexed};

/// Forward neighbor direction. Every unordered pair is reached from its
/// lower row-major index by exactly one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum Direction {
    Right,
    Down,
    DownRight,
    DownLeft,
}

impl Direction {
    const AXIAL: [Self; 2] = [Self::Right, Self::Down];
    const ALL: [Self; 4] = [Self::Right, Self::Down, Self::DownRight, Self::DownLeft];

    pub const fn for_neighborhood(neighborhood: Neighborhood) -> &'static [Self] {
        match neighborhood {
            Neighborhood::Four => &Self::AXIAL,
            Neighborhood::Eight => &Self::ALL,
        }
    }

    #[inline]
    pub const fn offset(self) -> (i64, i64) {
        match self {
            Self::Right => (1, 0),
            Self::Down => (0, 1),
            Self::DownRight => (1, 1),
            Self::DownLeft => (-1, 1),
        }
    }

    #[inline]
    pub const fn is_diagonal(self) -> bool {
        matches!(self, Self::DownRight | Self::DownLeft)
    }

    /// Linear index of the neighbor of `p` in this direction, if inside the image.
    #[inline]
    fn neighbor(self, p: usize, width: u32, height: u32) -> Option<usize> {
        let width = width as i64;
        let x = (p as i64) % width;
        let y = (p as i64) / width;
        let (dx, dy) = self.offset();
        let (nx, ny) = (x + dx, y + dy);
        if nx < 0 || nx >= width || ny >= height as i64 {
            return None;
        }
        Some((ny * width + nx) as usize)
    }

    /// Direction leading from `p` to `q` when `p < q` are neighbors.
    fn between(p: usize, q: usize, width: u32) -> Option<Self> {
        let width = width as i64;
        let (px, py) = ((p as i64) % width, (p as i64) / width);
        let (qx, qy) = ((q as i64) % width, (q as i64) / width);
        match (qx - px, qy - py) {
            (1, 0) => Some(Self::Right),
            (0, 1) => Some(Self::Down),
            (1, 1) => Some(Self::DownRight),
            (-1, 1) => Some(Self::DownLeft),
            _ => None,
        }
    }
}

/// One unordered neighbor pair with `p < q`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PairwiseEdge {
    pub p: usize,
    pub q: usize,
    pub weight: f64,
}

/// Symmetric pairwise weight map, each unordered pair stored once.
///
/// Storage is one plane per forward [`Direction`], indexed by the lower
/// endpoint; entries without a neighbor inside the image are unused.
#[derive(Debug, Clone, PartialEq)]
pub struct PairwiseWeights {
    width: u32,
    height: u32,
    neighborhood: Neighborhood,
    beta: f64,
    planes: Vec<Vec<f64>>,
}

impl PairwiseWeights {
    #[inline]
    pub const fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    #[inline]
    pub const fn neighborhood(&self) -> Neighborhood {
        self.neighborhood
    }

    #[inline]
    pub const fn beta(&self) -> f64 {
        self.beta
    }

    fn directions(&self) -> &'static [Direction] {
        Direction::for_neighborhood(self.neighborhood)
    }

    /// Weight of the pair `{p, q}`, `None` when they are not neighbors.
    ///
    /// Argument order does not matter.
    pub fn weight(&self, p: usize, q: usize) -> Option<f64> {
        let (lo, hi) = (p.min(q), p.max(q));
        let direction = Direction::between(lo, hi, self.width)?;
        self.directions()
            .iter()
            .position(|&d| d == direction)
            .map(|plane| self.planes[plane][lo])
    }

    /// Every unordered neighbor pair exactly once, with `p < q`.
    pub fn edges(&self) -> impl Iterator<Item = PairwiseEdge> + '_ {
        let (width, height) = (self.width, self.height);
        let len = width as usize * height as usize;
        iproduct!(self.directions().iter().enumerate(), 0..len).filter_map(
            move |((plane, &direction), p)| {
                direction.neighbor(p, width, height).map(|q| PairwiseEdge {
                    p,
                    q,
                    weight: self.planes[plane][p],
                })
            },
        )
    }

    /// Number of unordered neighbor pairs.
    pub fn edge_count(&self) -> usize {
        self.edges().count()
    }

    /// Sum of weights over pairs whose endpoints carry different labels.
    pub fn disagreement(&self, labels: &[Label]) -> f64 {
        self.edges()
            .filter(|edge| labels[edge.p] != labels[edge.q])
            .map(|edge| edge.weight)
            .sum()
    }
}

/// Contrast scale `beta = 1 / (2 · mean ||c(p) - c(q)||²)` over horizontal and
/// vertical neighbor pairs.
///
/// Returns `0.0` for a constant image or one without neighbor pairs, which
/// makes every weight `1`.
pub fn compute_beta(image: &ColorImage) -> f64 {
    let (width, height) = image.dimensions();
    let (sum, pairs) = fold_indexed(
        image.len(),
        || (0.0, 0usize),
        |(mut sum, mut pairs), p| {
            for direction in Direction::AXIAL {
                if let Some(q) = direction.neighbor(p, width, height) {
                    sum += image.distance_between(p, q);
                    pairs += 1;
                }
            }
            (sum, pairs)
        },
        |a, b| (a.0 + b.0, a.1 + b.1),
    );

    if pairs == 0 || !(sum > 0.0) || !sum.is_finite() {
        log::debug!("contrast accumulator is zero, using beta = 0");
        return 0.0;
    }
    let mean = sum / pairs as f64;
    1.0 / (2.0 * mean)
}

/// Weights `exp(-beta · ||c(p) - c(q)||²)` for every neighbor pair.
pub fn compute_weights(
    image: &ColorImage,
    neighborhood: Neighborhood,
    beta: f64,
    diagonal_scaling: DiagonalScaling,
) -> PairwiseWeights {
    let (width, height) = image.dimensions();
    let planes = Direction::for_neighborhood(neighborhood)
        .iter()
        .map(|&direction| {
            let factor = match diagonal_scaling {
                DiagonalScaling::InverseDistance if direction.is_diagonal() => {
                    std::f64::consts::FRAC_1_SQRT_2
                }
                _ => 1.0,
            };
            map_indexed(image.len(), |p| {
                direction
                    .neighbor(p, width, height)
                    .map_or(0.0, |q| factor * (-beta * image.distance_between(p, q)).exp())
            })
        })
        .collect();

    PairwiseWeights {
        width,
        height,
        neighborhood,
        beta,
        planes,
    }
}
