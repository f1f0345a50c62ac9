//! GPU catalog-marker overlay for pan/zoom image viewers.
//!
//! Draws very large sets of styled point markers (circles, squares,
//! hexagons with per-catalog stroke/fill/border/opacity) in sync with a
//! host viewer's continuously changing transform, resolves pointer clicks
//! to point indices through an id-encoded offscreen render, and exports
//! lossless RGBA pixels of the overlay.
//!
//! The host keeps ownership of the GPU device, queue and surface; the
//! overlay is handed references per call, so several instances can share
//! one device across a multi-pane layout.

pub mod error;
pub mod geometry;
pub mod record;
pub mod renderer;
pub mod schedule;
pub mod style;
pub mod transform;
pub mod viewer;

pub use error::OverlayError;
pub use record::{CatalogKey, CatalogStyle, ColorOverride, PointRecord, Shape};
pub use renderer::{Capabilities, CatalogOverlay, ColorSource, MarkerPath, RgbaFrame};
pub use transform::{TransformEstimator, ViewTransform};
pub use viewer::Viewer;
