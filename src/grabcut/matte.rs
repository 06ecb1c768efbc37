use crate::error::GrabCutError;

/// Binary segmentation label of a pixel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Label {
    Background,
    Foreground,
}

impl Label {
    #[inline]
    pub const fn is_foreground(self) -> bool {
        matches!(self, Self::Foreground)
    }
}

/// Inclusive axis-aligned rectangle in pixel coordinates.
///
/// Pixels with `xmin <= x <= xmax` and `ymin <= y <= ymax` start as
/// foreground; every other pixel is held at background for the whole run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BoundingBox {
    pub xmin: u32,
    pub ymin: u32,
    pub xmax: u32,
    pub ymax: u32,
}

impl BoundingBox {
    pub const fn new(xmin: u32, ymin: u32, xmax: u32, ymax: u32) -> Self {
        Self {
            xmin,
            ymin,
            xmax,
            ymax,
        }
    }

    /// Box covering every pixel of a `width` x `height` image.
    pub const fn full(width: u32, height: u32) -> Self {
        Self::new(0, 0, width.saturating_sub(1), height.saturating_sub(1))
    }

    #[inline]
    pub const fn contains(&self, x: u32, y: u32) -> bool {
        x >= self.xmin && x <= self.xmax && y >= self.ymin && y <= self.ymax
    }

    /// Number of pixels inside the box, zero for an inverted box.
    pub const fn area(&self) -> u64 {
        if self.xmax < self.xmin || self.ymax < self.ymin {
            return 0;
        }
        (self.xmax - self.xmin + 1) as u64 * (self.ymax - self.ymin + 1) as u64
    }

    /// Checks that the box selects at least one pixel and lies inside the image.
    ///
    /// # Errors
    ///
    /// * `GrabCutError::InvalidBoundingBox` - When the box is inverted or exceeds the image
    pub fn validate(&self, width: u32, height: u32) -> Result<(), GrabCutError> {
        if self.area() == 0 || self.xmax >= width || self.ymax >= height {
            return Err(GrabCutError::InvalidBoundingBox {
                xmin: self.xmin,
                ymin: self.ymin,
                xmax: self.xmax,
                ymax: self.ymax,
                width,
                height,
            });
        }
        Ok(())
    }

    /// Whether the box covers the whole image, leaving no background seed.
    pub const fn covers(&self, width: u32, height: u32) -> bool {
        self.xmin == 0
            && self.ymin == 0
            && self.xmax.saturating_add(1) >= width
            && self.ymax.saturating_add(1) >= height
    }
}

/// Per-pixel foreground/background labeling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlphaMatte {
    width: u32,
    height: u32,
    labels: Vec<Label>,
}

impl AlphaMatte {
    /// Foreground inside `bbox`, background elsewhere.
    pub fn from_bounding_box(width: u32, height: u32, bbox: &BoundingBox) -> Self {
        let labels = (0..height)
            .flat_map(|y| (0..width).map(move |x| (x, y)))
            .map(|(x, y)| {
                if bbox.contains(x, y) {
                    Label::Foreground
                } else {
                    Label::Background
                }
            })
            .collect();
        Self {
            width,
            height,
            labels,
        }
    }

    /// Wraps row-major labels.
    ///
    /// # Errors
    ///
    /// * `GrabCutError::LengthMismatch` - When `labels.len() != width * height`
    pub fn from_labels(width: u32, height: u32, labels: Vec<Label>) -> Result<Self, GrabCutError> {
        let expected = width as usize * height as usize;
        if labels.len() != expected {
            return Err(GrabCutError::LengthMismatch {
                expected,
                actual: labels.len(),
            });
        }
        Ok(Self {
            width,
            height,
            labels,
        })
    }

    #[inline]
    pub const fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    #[inline]
    pub fn labels(&self) -> &[Label] {
        &self.labels
    }

    #[inline]
    pub fn get(&self, x: u32, y: u32) -> Label {
        self.labels[y as usize * self.width as usize + x as usize]
    }

    pub fn count(&self, label: Label) -> usize {
        self.labels.iter().filter(|&&l| l == label).count()
    }

    /// Number of pixels whose label differs from `other`.
    ///
    /// Both mattes must share dimensions.
    pub fn changed_from(&self, other: &Self) -> usize {
        debug_assert_eq!(self.dimensions(), other.dimensions());
        self.labels
            .iter()
            .zip(other.labels.iter())
            .filter(|(a, b)| a != b)
            .count()
    }
}

/// Mixture component chosen for one pixel, tagged with the class it belongs to.
///
/// `component` indexes into the mixture of `class` only; it is `None` while
/// that class has no fitted model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComponentAssignment {
    pub class: Label,
    pub component: Option<usize>,
}

/// Per-pixel component assignment for the current labeling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentMap {
    width: u32,
    height: u32,
    assignments: Vec<ComponentAssignment>,
}

impl ComponentMap {
    pub(crate) fn new(width: u32, height: u32, assignments: Vec<ComponentAssignment>) -> Self {
        debug_assert_eq!(assignments.len(), width as usize * height as usize);
        Self {
            width,
            height,
            assignments,
        }
    }

    #[inline]
    pub const fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    #[inline]
    pub fn assignments(&self) -> &[ComponentAssignment] {
        &self.assignments
    }

    #[inline]
    pub fn get(&self, x: u32, y: u32) -> ComponentAssignment {
        self.assignments[y as usize * self.width as usize + x as usize]
    }

    /// Linear indices and component ids of the pixels assigned under `class`.
    pub fn class_assignments(&self, class: Label) -> impl Iterator<Item = (usize, Option<usize>)> + '_ {
        self.assignments
            .iter()
            .enumerate()
            .filter(move |(_, a)| a.class == class)
            .map(|(i, a)| (i, a.component))
    }
}
