use thiserror::Error;

/// Failures the overlay can surface to the host.
///
/// Construction failures are fatal by design: the shaders are fixed, so a
/// compile or validation error means a broken environment, and the backend
/// diagnostic is passed through verbatim. Runtime-tolerable conditions
/// (degenerate transforms, stale visibility masks) never reach this type.
#[derive(Debug, Error)]
pub enum OverlayError {
    #[error("overlay construction failed: {0}")]
    Construction(String),

    #[error("pixel readback failed: {0}")]
    Readback(String),
}
