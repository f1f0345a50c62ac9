//! Packing of per-catalog styles into lookup-table texels.

use crate::geometry::MAX_CATALOGS;
use crate::record::CatalogStyle;
use std::hash::{Hash, Hasher};

/// Bytes of each texel array folded into the change signature. The three
/// tables are 1 KiB each, so in practice the whole content is covered; the
/// bound exists so the signature stays cheap if the tables ever grow.
const SIGNATURE_PREFIX: usize = 1024;

/// Texel content for the three 256×1 RGBA8 style tables, indexed by
/// catalog id: stroke color, fill color, and packed params
/// (`r` = border width in 0.25 px steps, `g` = opacity byte).
#[derive(Debug, Clone, PartialEq)]
pub struct StyleTexels {
    pub stroke: Vec<u8>,
    pub fill: Vec<u8>,
    pub params: Vec<u8>,
    signature: u64,
}

impl StyleTexels {
    /// Cheap content hash; the GPU side skips the texture upload when the
    /// signature matches the previous one.
    pub fn signature(&self) -> u64 {
        self.signature
    }
}

/// Pack the catalog table (first-seen order, index = catalog id) into the
/// three texel arrays. Unused slots stay zero, which draws nothing visible
/// even if a stale id slips through.
pub fn pack_styles(styles: &[CatalogStyle]) -> StyleTexels {
    let mut stroke = vec![0u8; MAX_CATALOGS * 4];
    let mut fill = vec![0u8; MAX_CATALOGS * 4];
    let mut params = vec![0u8; MAX_CATALOGS * 4];

    for (id, style) in styles.iter().take(MAX_CATALOGS).enumerate() {
        stroke[id * 4..id * 4 + 4].copy_from_slice(&style.stroke);
        fill[id * 4..id * 4 + 4].copy_from_slice(&style.fill);
        params[id * 4] = style.border_byte();
        params[id * 4 + 1] = style.opacity_byte();
    }

    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    stroke[..stroke.len().min(SIGNATURE_PREFIX)].hash(&mut hasher);
    fill[..fill.len().min(SIGNATURE_PREFIX)].hash(&mut hasher);
    params[..params.len().min(SIGNATURE_PREFIX)].hash(&mut hasher);

    StyleTexels {
        stroke,
        fill,
        params,
        signature: hasher.finish(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn style(stroke: [u8; 4], fill: [u8; 4], border_px: f32, opacity: f32) -> CatalogStyle {
        CatalogStyle {
            stroke,
            fill,
            border_px,
            opacity,
        }
    }

    #[test]
    fn texel_layout_by_catalog_id() {
        let styles = vec![
            style([1, 2, 3, 4], [5, 6, 7, 8], 2.0, 1.0),
            style([9, 10, 11, 12], [13, 14, 15, 16], 0.25, 0.5),
        ];
        let texels = pack_styles(&styles);

        assert_eq!(&texels.stroke[0..4], &[1, 2, 3, 4]);
        assert_eq!(&texels.fill[4..8], &[13, 14, 15, 16]);
        assert_eq!(texels.params[0], 8); // 2.0 px -> 8 quarter-px steps
        assert_eq!(texels.params[1], 255);
        assert_eq!(texels.params[4], 1);
        assert_eq!(texels.params[5], 128);
        // Unused slots are zeroed.
        assert_eq!(&texels.stroke[8..12], &[0; 4]);
        assert_eq!(texels.stroke.len(), MAX_CATALOGS * 4);
    }

    #[test]
    fn signature_is_stable_and_content_sensitive() {
        let styles = vec![style([1, 2, 3, 4], [5, 6, 7, 8], 1.0, 1.0)];
        let a = pack_styles(&styles);
        let b = pack_styles(&styles);
        assert_eq!(a.signature(), b.signature());

        let mut changed = styles.clone();
        changed[0].opacity = 0.25;
        assert_ne!(a.signature(), pack_styles(&changed).signature());
    }
}
