//! Seeded synthetic star catalogs for the demo window.

use glam::Vec2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use starmark::{CatalogKey, CatalogStyle, ColorOverride, PointRecord, Shape};
use std::sync::Arc;

struct Band {
    key: CatalogKey,
    style: CatalogStyle,
    shape: Shape,
    /// Marker radius range in image pixels.
    radius: (f32, f32),
    /// Selection weight within the field.
    weight: f32,
    /// Color-code each point individually (by synthetic magnitude).
    color_coded: bool,
}

/// Generate `count` records across a handful of catalogs with distinct
/// styles. One catalog is color-coded per point, so the overlay's
/// per-vertex color path gets exercised out of the box.
pub fn generate(count: usize, image_size: f32, seed: u64) -> Vec<PointRecord> {
    let bands = [
        Band {
            key: Arc::from("bright-stars"),
            style: CatalogStyle {
                stroke: [120, 220, 255, 255],
                fill: [120, 220, 255, 60],
                border_px: 1.5,
                opacity: 1.0,
            },
            shape: Shape::Circle,
            radius: (4.0, 9.0),
            weight: 0.1,
            color_coded: false,
        },
        Band {
            key: Arc::from("galaxies"),
            style: CatalogStyle {
                stroke: [255, 170, 60, 255],
                fill: [255, 170, 60, 40],
                border_px: 2.0,
                opacity: 0.9,
            },
            shape: Shape::Hexagon,
            radius: (6.0, 14.0),
            weight: 0.2,
            color_coded: false,
        },
        Band {
            key: Arc::from("survey-sources"),
            style: CatalogStyle {
                stroke: [200, 200, 200, 255],
                fill: [200, 200, 200, 50],
                border_px: 1.0,
                opacity: 0.8,
            },
            shape: Shape::Square,
            radius: (2.0, 5.0),
            weight: 0.7,
            color_coded: true,
        },
    ];
    let total_weight: f32 = bands.iter().map(|b| b.weight).sum();

    let mut rng = StdRng::seed_from_u64(seed);
    let mut records = Vec::with_capacity(count);

    for _ in 0..count {
        let mut roll = rng.gen_range(0.0..total_weight);
        let band = bands
            .iter()
            .find(|b| {
                roll -= b.weight;
                roll < 0.0
            })
            .unwrap_or(&bands[0]);

        let pos = Vec2::new(
            rng.gen_range(0.0..image_size),
            rng.gen_range(0.0..image_size),
        );
        let radius = rng.gen_range(band.radius.0..band.radius.1);
        let mut record = PointRecord::new(&band.key, band.style, pos, radius);
        record.shape = band.shape;
        if band.color_coded {
            record.color = Some(magnitude_color(rng.gen_range(0.0f32..1.0)));
        }
        records.push(record);
    }
    records
}

/// Blue→red ramp over a synthetic magnitude in [0,1].
fn magnitude_color(t: f32) -> ColorOverride {
    let r = (255.0 * t) as u8;
    let b = (255.0 * (1.0 - t)) as u8;
    ColorOverride {
        stroke: [r, 60, b, 255],
        fill: [r, 60, b, 70],
    }
}
