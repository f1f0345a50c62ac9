//! The opaque handle to the host's pan/zoom image viewer.

use glam::DVec2;

/// Coordinate bridge to the image viewer the overlay tracks.
///
/// The viewer is treated as a black box: the overlay only ever asks it to
/// convert coordinates and report its current geometry, and it does so
/// immediately before every draw, so there is no cross-frame staleness.
/// Conversions go through the viewer's own intermediate space
/// (image pixels → viewport → element) because that is the API tiled
/// viewers actually expose; the overlay never assumes the composition is
/// anything more specific than affine-at-the-current-instant.
pub trait Viewer {
    /// Image-pixel coordinates → the viewer's intermediate viewport space.
    fn image_to_viewport(&self, p: DVec2) -> DVec2;

    /// Intermediate viewport space → host element coordinates
    /// (logical pixels, origin at the element's top-left).
    fn viewport_to_element(&self, p: DVec2) -> DVec2;

    /// Logical size of the on-screen element hosting the viewer.
    fn element_size(&self) -> DVec2;

    /// Size of the displayed image in image pixels.
    fn image_size(&self) -> DVec2;
}

/// Full image → element conversion, the only composition the overlay uses.
pub(crate) fn image_to_element(viewer: &dyn Viewer, p: DVec2) -> DVec2 {
    viewer.viewport_to_element(viewer.image_to_viewport(p))
}
