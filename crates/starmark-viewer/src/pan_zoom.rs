//! A synthetic pan/zoom viewer standing in for a tiled image viewer.
//!
//! Coordinates follow the usual tiled-viewer convention: image pixels are
//! normalized by the image width into an intermediate viewport space,
//! which pan/zoom state then maps to element pixels.

use glam::DVec2;
use starmark::Viewer;

pub struct PanZoomViewer {
    image_size: DVec2,
    element_size: DVec2,
    /// Element pixels per image pixel.
    zoom: f64,
    /// Element position of the image origin.
    offset: DVec2,
}

impl PanZoomViewer {
    /// Start with the image fitted and centered in the element.
    pub fn new(image_size: DVec2, element_size: DVec2) -> Self {
        let zoom = (element_size.x / image_size.x).min(element_size.y / image_size.y);
        let offset = (element_size - image_size * zoom) / 2.0;
        Self {
            image_size,
            element_size,
            zoom,
            offset,
        }
    }

    pub fn set_element_size(&mut self, size: DVec2) {
        self.element_size = size;
    }

    pub fn pan(&mut self, delta: DVec2) {
        self.offset += delta;
    }

    /// Scale about an element-space anchor so the image point under the
    /// cursor stays put.
    pub fn zoom_about(&mut self, anchor: DVec2, factor: f64) {
        let new_zoom = (self.zoom * factor).clamp(1e-3, 1e3);
        let applied = new_zoom / self.zoom;
        self.offset = anchor - (anchor - self.offset) * applied;
        self.zoom = new_zoom;
    }

    pub fn zoom(&self) -> f64 {
        self.zoom
    }
}

impl Viewer for PanZoomViewer {
    fn image_to_viewport(&self, p: DVec2) -> DVec2 {
        p / self.image_size.x
    }

    fn viewport_to_element(&self, p: DVec2) -> DVec2 {
        p * self.image_size.x * self.zoom + self.offset
    }

    fn element_size(&self) -> DVec2 {
        self.element_size
    }

    fn image_size(&self) -> DVec2 {
        self.image_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_fitted_and_centered() {
        let viewer = PanZoomViewer::new(DVec2::new(4096.0, 4096.0), DVec2::new(1280.0, 720.0));
        // Height limits the fit; image center lands on element center.
        let center = viewer.viewport_to_element(viewer.image_to_viewport(DVec2::new(2048.0, 2048.0)));
        assert!((center.x - 640.0).abs() < 1e-9);
        assert!((center.y - 360.0).abs() < 1e-9);
    }

    #[test]
    fn zoom_keeps_the_anchor_fixed() {
        let mut viewer = PanZoomViewer::new(DVec2::new(1000.0, 1000.0), DVec2::new(800.0, 800.0));
        let anchor = DVec2::new(200.0, 300.0);
        let image_pt = DVec2::new(250.0, 375.0);
        let before = viewer.viewport_to_element(viewer.image_to_viewport(image_pt));

        viewer.zoom_about(anchor, 2.5);
        let after = viewer.viewport_to_element(viewer.image_to_viewport(image_pt));

        // The anchored point moves away from the anchor by the factor, the
        // anchor itself stays put.
        let scaled = anchor + (before - anchor) * 2.5;
        assert!((after - scaled).length() < 1e-9);
    }
}
