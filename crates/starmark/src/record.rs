//! Catalog point records and per-catalog marker styling.

use glam::Vec2;
use std::sync::Arc;

/// Catalog keys are interned strings shared by every record of a catalog.
pub type CatalogKey = Arc<str>;

/// Marker outline shape. The discriminant is uploaded verbatim as the
/// per-point shape byte, so the values must stay in sync with
/// `shape_dist` in `shaders/markers.wgsl`.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Shape {
    #[default]
    Circle = 0,
    Square = 1,
    /// Flat-top hexagon with vertices (±1, 0) and (±0.5, ±√3/2).
    Hexagon = 2,
}

impl Shape {
    /// Distance metric in the marker's local [-1,1]² frame. The boundary
    /// sits exactly at 1.0; fragments beyond it are discarded. This is the
    /// CPU mirror of the WGSL `shape_dist` and must match it bit-for-bit
    /// in structure (same expressions, same constants).
    pub fn distance(self, x: f32, y: f32) -> f32 {
        let (ax, ay) = (x.abs(), y.abs());
        match self {
            Shape::Circle => (x * x + y * y).sqrt(),
            Shape::Square => ax.max(ay),
            // max(|x|, |y|/(√3/2), |x| + |y|/√3)
            Shape::Hexagon => ax.max(ay * HEX_INV_APOTHEM).max(ax + ay * HEX_INV_SQRT3),
        }
    }
}

/// 2/√3: reciprocal of the flat-top hexagon apothem.
pub(crate) const HEX_INV_APOTHEM: f32 = 1.154_700_5;
/// 1/√3.
pub(crate) const HEX_INV_SQRT3: f32 = 0.577_350_26;

/// Per-point stroke/fill override used by color-coded catalogs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColorOverride {
    pub stroke: [u8; 4],
    pub fill: [u8; 4],
}

/// Per-catalog marker style.
///
/// Border width is stored on the GPU as a byte in 0.25 px steps, so the
/// representable range is 0–63.75 px; `border_byte` performs that
/// quantization. Opacity is a plain unorm byte.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CatalogStyle {
    pub stroke: [u8; 4],
    pub fill: [u8; 4],
    /// Border (stroke ring) width in on-screen pixels.
    pub border_px: f32,
    /// Whole-catalog opacity multiplier, 0..=1.
    pub opacity: f32,
}

impl Default for CatalogStyle {
    fn default() -> Self {
        Self {
            stroke: [255, 160, 0, 255],
            fill: [255, 160, 0, 64],
            border_px: 1.5,
            opacity: 1.0,
        }
    }
}

impl CatalogStyle {
    /// Border width quantized to 0.25 px steps, saturating at 63.75 px.
    pub fn border_byte(&self) -> u8 {
        (self.border_px * 4.0).round().clamp(0.0, 255.0) as u8
    }

    pub fn opacity_byte(&self) -> u8 {
        (self.opacity * 255.0).round().clamp(0.0, 255.0) as u8
    }
}

/// One catalog point, already resolved to image-pixel coordinates by the
/// catalog loader. Records of the same catalog share a `CatalogKey` (cheap
/// `Arc` clone) and normally carry identical styles; when duplicates of a
/// key disagree, the first record seen for that key wins.
#[derive(Debug, Clone)]
pub struct PointRecord {
    /// Position in image pixels.
    pub pos: Vec2,
    /// Marker radius in image pixels.
    pub radius: f32,
    pub visible: bool,
    pub catalog: CatalogKey,
    pub style: CatalogStyle,
    pub shape: Shape,
    /// Set on color-coded catalogs; `None` falls back to the catalog style.
    pub color: Option<ColorOverride>,
}

impl PointRecord {
    pub fn new(catalog: &CatalogKey, style: CatalogStyle, pos: Vec2, radius: f32) -> Self {
        Self {
            pos,
            radius,
            visible: true,
            catalog: catalog.clone(),
            style,
            shape: Shape::Circle,
            color: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f32 = 1e-6;

    #[test]
    fn circle_boundary_and_monotonicity() {
        assert!((Shape::Circle.distance(1.0, 0.0) - 1.0).abs() < EPS);
        assert!((Shape::Circle.distance(0.0, -1.0) - 1.0).abs() < EPS);
        let d = std::f32::consts::FRAC_1_SQRT_2;
        assert!((Shape::Circle.distance(d, d) - 1.0).abs() < EPS);
        assert_monotone_outward(Shape::Circle);
    }

    #[test]
    fn square_boundary_and_monotonicity() {
        // Corner and edge midpoints all sit on the unit boundary.
        assert!((Shape::Square.distance(1.0, 1.0) - 1.0).abs() < EPS);
        assert!((Shape::Square.distance(-1.0, 0.3) - 1.0).abs() < EPS);
        assert!((Shape::Square.distance(0.0, 1.0) - 1.0).abs() < EPS);
        assert_monotone_outward(Shape::Square);
    }

    #[test]
    fn hexagon_vertices_on_boundary() {
        let h = 3f32.sqrt() / 2.0;
        let vertices = [
            (1.0, 0.0),
            (-1.0, 0.0),
            (0.5, h),
            (0.5, -h),
            (-0.5, h),
            (-0.5, -h),
        ];
        for (x, y) in vertices {
            let d = Shape::Hexagon.distance(x, y);
            assert!((d - 1.0).abs() < 1e-5, "vertex ({x},{y}) gave {d}");
        }
        // Flat top: the edge between (-0.5, h) and (0.5, h) is at distance 1.
        assert!((Shape::Hexagon.distance(0.0, h) - 1.0).abs() < 1e-5);
        assert_monotone_outward(Shape::Hexagon);
    }

    /// Walk several rays from the origin and require the metric to strictly
    /// increase with the ray parameter.
    fn assert_monotone_outward(shape: Shape) {
        for k in 0..16 {
            let theta = k as f32 * std::f32::consts::TAU / 16.0;
            let (dx, dy) = (theta.cos(), theta.sin());
            let mut prev = 0.0f32;
            for step in 1..=20 {
                let t = step as f32 * 0.1;
                let d = shape.distance(t * dx, t * dy);
                assert!(
                    d > prev,
                    "{shape:?} not increasing along theta={theta} at t={t}: {d} <= {prev}"
                );
                prev = d;
            }
        }
    }

    #[test]
    fn border_quantization() {
        let mut style = CatalogStyle::default();
        style.border_px = 1.5;
        assert_eq!(style.border_byte(), 6);
        style.border_px = 0.13; // rounds to one 0.25 px step
        assert_eq!(style.border_byte(), 1);
        style.border_px = 100.0; // saturates at 63.75 px
        assert_eq!(style.border_byte(), 255);
        style.border_px = 0.0;
        assert_eq!(style.border_byte(), 0);
    }

    #[test]
    fn opacity_quantization() {
        let mut style = CatalogStyle::default();
        style.opacity = 1.0;
        assert_eq!(style.opacity_byte(), 255);
        style.opacity = 0.5;
        assert_eq!(style.opacity_byte(), 128);
        style.opacity = -1.0;
        assert_eq!(style.opacity_byte(), 0);
    }
}
