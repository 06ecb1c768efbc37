//! Property-based tests for imageops-grabcut
//!
//! These tests use proptest to verify invariants that must hold for every
//! image, bounding box and labeling the segmentation can see.

use image::Rgb;
use imageops_grabcut::{
    compute_beta, compute_weights, BoundingBox, ColorImage, DiagonalScaling, EdmondsKarpSolver,
    FlowNetwork, GaussianMixture, GrabCut, GrabCutConfig, Image, Label, MinCutSolver,
    MixtureSettings, NeighborEdge, Neighborhood, Terminal, TerminalEdge,
};
use proptest::prelude::*;

/// Strategy for generating small but valid image dimensions
fn image_dimensions() -> impl Strategy<Value = (u32, u32)> {
    (1u32..=8, 1u32..=8)
}

/// Strategy for generating RGB pixel values
fn rgb_pixel() -> impl Strategy<Value = Rgb<u8>> {
    (any::<u8>(), any::<u8>(), any::<u8>()).prop_map(|(r, g, b)| Rgb([r, g, b]))
}

/// Strategy for an image together with a bounding box inside it
fn image_and_box() -> impl Strategy<Value = (Image<Rgb<u8>>, BoundingBox)> {
    image_dimensions().prop_flat_map(|(width, height)| {
        let pixels = prop::collection::vec(rgb_pixel(), (width * height) as usize);
        let corners = (0..width, 0..width, 0..height, 0..height);
        (pixels, corners).prop_map(move |(pixels, (x0, x1, y0, y1))| {
            let image = Image::from_fn(width, height, |x, y| pixels[(y * width + x) as usize]);
            let bbox = BoundingBox::new(x0.min(x1), y0.min(y1), x0.max(x1), y0.max(y1));
            (image, bbox)
        })
    })
}

fn neighborhood() -> impl Strategy<Value = Neighborhood> {
    prop_oneof![Just(Neighborhood::Four), Just(Neighborhood::Eight)]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn outside_box_is_background_after_every_iteration(
        (image, bbox) in image_and_box(),
        neighborhood in neighborhood(),
        components in 1usize..=3,
    ) {
        let config = GrabCutConfig::default()
            .with_components(components)
            .with_neighborhood(neighborhood)
            .with_max_iterations(3)
            .with_history(true);
        let result = image.grab_cut(bbox, &config).unwrap();
        let (width, height) = image.dimensions();

        prop_assert_eq!(result.history.len(), result.iterations() + 1);
        prop_assert_eq!(result.component_history.len(), result.iterations());
        for matte in result.history.iter().chain(std::iter::once(&result.matte)) {
            prop_assert_eq!(matte.labels().len(), (width * height) as usize);
            for y in 0..height {
                for x in 0..width {
                    if !bbox.contains(x, y) {
                        prop_assert_eq!(matte.get(x, y), Label::Background);
                    }
                }
            }
        }
    }

    #[test]
    fn reports_are_consistent(
        (image, bbox) in image_and_box(),
    ) {
        let config = GrabCutConfig::default().with_components(2).with_max_iterations(4);
        let result = image.grab_cut(bbox, &config).unwrap();
        let pixel_count = (image.width() * image.height()) as f64;

        prop_assert!(result.iterations() >= 1);
        prop_assert!(result.iterations() <= 4);
        for report in &result.reports {
            prop_assert!(report.energy.is_finite());
            prop_assert!((report.changed_fraction - report.changed_pixels as f64 / pixel_count).abs() < 1e-12);
            prop_assert!(report.foreground_pixels as u64 <= bbox.area());
        }
        if let Some(last) = result.reports.last() {
            prop_assert_eq!(last.foreground_pixels, result.matte.count(Label::Foreground));
        }
    }

    #[test]
    fn mixture_weights_sum_to_one(
        samples in prop::collection::vec((0.0f64..255.0, 0.0f64..255.0, 0.0f64..255.0), 1..60),
        components in 1usize..=5,
        seed in any::<u64>(),
    ) {
        let samples: Vec<[f64; 3]> = samples.into_iter().map(|(r, g, b)| [r, g, b]).collect();
        let (mixture, labels) = GaussianMixture::initialize(&samples, components, MixtureSettings::default());
        prop_assert!(mixture.len() >= 1 && mixture.len() <= components);
        let total: f64 = mixture.weights().iter().sum();
        prop_assert!((total - 1.0).abs() < 1e-9);
        prop_assert!(labels.iter().all(|&l| l < mixture.len()));

        // Arbitrary reassignment, possibly leaving components empty
        let assignment: Vec<usize> = (0..samples.len())
            .map(|i| ((seed as usize).wrapping_add(i * 31) >> 3) % mixture.len())
            .collect();
        let refit = mixture.reestimate(&samples, &assignment);
        let total: f64 = refit.weights().iter().sum();
        prop_assert!((total - 1.0).abs() < 1e-9);
        for sample in &samples {
            let (_, cost) = refit.best_component(sample).unwrap();
            prop_assert!(cost.is_finite());
        }
    }

    #[test]
    fn pairwise_weights_are_symmetric_and_unique(
        (width, height) in image_dimensions(),
        neighborhood in neighborhood(),
        values in prop::collection::vec(any::<u8>(), 64),
    ) {
        let pixels = (0..(width * height) as usize)
            .map(|p| {
                let v = values[p % values.len()] as f64;
                [v, 255.0 - v, (v * 3.0) % 256.0]
            })
            .collect();
        let image = ColorImage::from_colors(width, height, pixels).unwrap();
        let beta = compute_beta(&image);
        prop_assert!(beta.is_finite() && beta >= 0.0);

        let weights = compute_weights(&image, neighborhood, beta, DiagonalScaling::None);
        let (w, h) = (width as usize, height as usize);
        let axial = (w - 1) * h + w * (h - 1);
        let expected = match neighborhood {
            Neighborhood::Four => axial,
            Neighborhood::Eight => axial + 2 * (w - 1) * (h - 1),
        };
        prop_assert_eq!(weights.edge_count(), expected);

        for edge in weights.edges() {
            prop_assert!(edge.p < edge.q);
            prop_assert!(edge.weight > 0.0 && edge.weight <= 1.0);
            prop_assert_eq!(weights.weight(edge.q, edge.p), Some(edge.weight));
        }
    }

    #[test]
    fn solver_flow_equals_cut_value(
        capacities in prop::collection::vec((0u32..50, 0u32..50), 2..12),
        links in prop::collection::vec((0usize..12, 0usize..12, 0u32..20), 0..20),
    ) {
        let n = capacities.len();
        let terminals = capacities
            .iter()
            .map(|&(source, sink)| TerminalEdge { source: source as f64, sink: sink as f64 })
            .collect();
        let edges = links
            .into_iter()
            .filter(|&(a, b, _)| a < n && b < n)
            .map(|(from, to, capacity)| NeighborEdge { from, to, capacity: capacity as f64 })
            .collect();
        let network = FlowNetwork::from_parts(terminals, edges).unwrap();
        let cut = EdmondsKarpSolver::default().solve(&network).unwrap();

        prop_assert_eq!(cut.sides.len(), n);
        prop_assert!((network.cut_value(&cut.sides) - cut.flow).abs() < 1e-6);
    }

    #[test]
    fn solver_finds_minimum_cut(
        capacities in prop::collection::vec((0u32..40, 0u32..40), 1..9),
        links in prop::collection::vec((0usize..9, 0usize..9, 0u32..25), 0..16),
    ) {
        let n = capacities.len();
        let terminals = capacities
            .iter()
            .map(|&(source, sink)| TerminalEdge { source: source as f64, sink: sink as f64 })
            .collect();
        let edges = links
            .into_iter()
            .filter(|&(a, b, _)| a < n && b < n)
            .map(|(from, to, capacity)| NeighborEdge { from, to, capacity: capacity as f64 })
            .collect();
        let network = FlowNetwork::from_parts(terminals, edges).unwrap();
        let cut = EdmondsKarpSolver::default().solve(&network).unwrap();

        // Exhaustive search over every partition
        let best = (0u32..1 << n)
            .map(|mask| {
                let sides: Vec<Terminal> = (0..n)
                    .map(|p| if (mask >> p) & 1 == 1 { Terminal::Source } else { Terminal::Sink })
                    .collect();
                network.cut_value(&sides)
            })
            .fold(f64::INFINITY, f64::min);
        prop_assert!((cut.flow - best).abs() < 1e-6);
        prop_assert!((network.cut_value(&cut.sides) - best).abs() < 1e-6);
    }
}
