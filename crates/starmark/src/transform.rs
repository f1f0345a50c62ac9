//! Per-frame estimation of the image→clip transform from the viewer handle.

use crate::viewer::{image_to_element, Viewer};
use glam::{DMat3, DVec2, DVec3, Mat3};
use std::cell::Cell;

/// Largest image-axis step used for the finite-difference probe. Probing
/// across the full extent of a huge image would burn f64 precision on the
/// subtraction; a bounded step keeps the quotient well conditioned.
const MAX_PROBE_STEP: f64 = 2048.0;

/// The transform state a single draw consumes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewTransform {
    /// Column-major affine map from homogeneous image pixels to clip space.
    pub clip_from_image: Mat3,
    /// Device pixels per image pixel, used for on-screen marker sizing.
    pub px_per_image: f32,
}

impl ViewTransform {
    pub const IDENTITY: ViewTransform = ViewTransform {
        clip_from_image: Mat3::IDENTITY,
        px_per_image: 1.0,
    };
}

/// Derives a [`ViewTransform`] by sampling the viewer at three reference
/// points and solving the affine map by finite differences.
///
/// The viewer conversion is opaque, but over a single frame it is affine
/// for any pan/zoom viewer, so origin + one step per axis pin it down
/// exactly. Solving happens in f64 and is narrowed to f32 only at the end.
#[derive(Debug, Default)]
pub struct TransformEstimator {
    /// Set while the last estimate was degenerate, so the fallback is
    /// logged once per streak instead of once per frame.
    warned: Cell<bool>,
}

impl TransformEstimator {
    pub fn new() -> Self {
        Self::default()
    }

    /// `buffer_size` is the drawing buffer in device pixels; the ratio of
    /// buffer width to element width is the device pixel ratio.
    pub fn estimate(&self, viewer: &dyn Viewer, buffer_size: (u32, u32)) -> ViewTransform {
        let elem = viewer.element_size();
        let image = viewer.image_size();

        let step = DVec2::new(
            image.x.clamp(1.0, MAX_PROBE_STEP),
            image.y.clamp(1.0, MAX_PROBE_STEP),
        );

        // Probe origin plus one step along each image axis.
        let origin = image_to_element(viewer, DVec2::ZERO);
        let px = image_to_element(viewer, DVec2::new(step.x, 0.0));
        let py = image_to_element(viewer, DVec2::new(0.0, step.y));

        // Linear part and translation of the image→element map.
        let col_x = (px - origin) / step.x;
        let col_y = (py - origin) / step.y;

        let elem_from_image = DMat3::from_cols(
            DVec3::new(col_x.x, col_x.y, 0.0),
            DVec3::new(col_y.x, col_y.y, 0.0),
            DVec3::new(origin.x, origin.y, 1.0),
        );

        // Element px → clip: x' = 2x/W - 1, y' = 1 - 2y/H.
        let clip_from_elem = DMat3::from_cols(
            DVec3::new(2.0 / elem.x, 0.0, 0.0),
            DVec3::new(0.0, -2.0 / elem.y, 0.0),
            DVec3::new(-1.0, 1.0, 1.0),
        );

        let clip_from_image = clip_from_elem * elem_from_image;

        let dpr = buffer_size.0 as f64 / elem.x;
        let scale = col_x.length() * dpr;

        if !Self::usable(&clip_from_image, scale) {
            if !self.warned.replace(true) {
                log::warn!(
                    "degenerate viewer transform (scale {scale}); \
                     falling back to identity"
                );
            }
            return ViewTransform::IDENTITY;
        }
        self.warned.set(false);

        ViewTransform {
            clip_from_image: clip_from_image.as_mat3(),
            px_per_image: scale as f32,
        }
    }

    fn usable(m: &DMat3, scale: f64) -> bool {
        scale.is_finite() && scale > 0.0 && m.to_cols_array().iter().all(|v| v.is_finite())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Synthetic viewer built from an explicit image→element affine map,
    /// split across the two trait conversions the way a tiled viewer
    /// splits them (normalize by image width, then scale out).
    struct AffineViewer {
        elem_from_image: DMat3,
        element: DVec2,
        image: DVec2,
    }

    impl AffineViewer {
        fn new(elem_from_image: DMat3, element: DVec2, image: DVec2) -> Self {
            Self {
                elem_from_image,
                element,
                image,
            }
        }
    }

    impl Viewer for AffineViewer {
        fn image_to_viewport(&self, p: DVec2) -> DVec2 {
            p / self.image.x
        }

        fn viewport_to_element(&self, p: DVec2) -> DVec2 {
            let q = self.elem_from_image * DVec3::new(p.x * self.image.x, p.y * self.image.x, 1.0);
            DVec2::new(q.x, q.y)
        }

        fn element_size(&self) -> DVec2 {
            self.element
        }

        fn image_size(&self) -> DVec2 {
            self.image
        }
    }

    fn scale_translate(sx: f64, sy: f64, tx: f64, ty: f64) -> DMat3 {
        DMat3::from_cols(
            DVec3::new(sx, 0.0, 0.0),
            DVec3::new(0.0, sy, 0.0),
            DVec3::new(tx, ty, 1.0),
        )
    }

    #[test]
    fn round_trip_recovers_image_points() {
        let mappings = [
            scale_translate(1.0, 1.0, 0.0, 0.0),
            scale_translate(0.5, 0.5, 120.0, -40.0),
            scale_translate(3.0, -3.0, -500.0, 3000.0), // y-flip
            // Rotation + anisotropic zoom, the worst a viewer can be.
            DMat3::from_cols(
                DVec3::new(0.8, 0.6, 0.0),
                DVec3::new(-1.2, 1.6, 0.0),
                DVec3::new(77.0, -13.0, 1.0),
            ),
        ];

        let estimator = TransformEstimator::new();
        for mapping in mappings {
            let viewer = AffineViewer::new(
                mapping,
                DVec2::new(1280.0, 800.0),
                DVec2::new(4096.0, 4096.0),
            );
            let t = estimator.estimate(&viewer, (1280, 800));
            let m = DMat3::from_cols_array(&t.clip_from_image.to_cols_array().map(f64::from));
            let inv = m.inverse();

            for p in [
                DVec2::new(0.0, 0.0),
                DVec2::new(17.5, 2000.0),
                DVec2::new(4095.0, 1.0),
            ] {
                let clip = m * DVec3::new(p.x, p.y, 1.0);
                // Independently expected clip position from the raw mapping.
                let e = mapping * DVec3::new(p.x, p.y, 1.0);
                let expect = DVec2::new(2.0 * e.x / 1280.0 - 1.0, 1.0 - 2.0 * e.y / 800.0);
                assert!((clip.x - expect.x).abs() < 1e-4, "{clip} vs {expect}");
                assert!((clip.y - expect.y).abs() < 1e-4, "{clip} vs {expect}");

                let back = inv * clip;
                assert!((back.x - p.x).abs() < 1e-2, "{back} vs {p}");
                assert!((back.y - p.y).abs() < 1e-2, "{back} vs {p}");
            }
        }
    }

    #[test]
    fn scale_tracks_zoom_and_device_pixel_ratio() {
        let viewer = AffineViewer::new(
            scale_translate(2.0, 2.0, 0.0, 0.0),
            DVec2::new(1000.0, 1000.0),
            DVec2::new(2048.0, 2048.0),
        );
        let estimator = TransformEstimator::new();
        // Buffer twice the element size: dpr 2, so 2 (zoom) * 2 (dpr) = 4.
        let t = estimator.estimate(&viewer, (2000, 2000));
        assert!((t.px_per_image - 4.0).abs() < 1e-5, "{}", t.px_per_image);
    }

    #[test]
    fn degenerate_mapping_falls_back_to_identity() {
        let viewer = AffineViewer::new(
            scale_translate(0.0, 0.0, 0.0, 0.0),
            DVec2::new(800.0, 600.0),
            DVec2::new(1024.0, 1024.0),
        );
        let estimator = TransformEstimator::new();
        let t = estimator.estimate(&viewer, (800, 600));
        assert_eq!(t, ViewTransform::IDENTITY);

        // NaN output must not escape either.
        let viewer = AffineViewer::new(
            scale_translate(f64::NAN, 1.0, 0.0, 0.0),
            DVec2::new(800.0, 600.0),
            DVec2::new(1024.0, 1024.0),
        );
        assert_eq!(estimator.estimate(&viewer, (800, 600)), ViewTransform::IDENTITY);
    }
}
