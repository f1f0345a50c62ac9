//! CPU-side assembly of the per-point attribute streams.
//!
//! Everything here is plain memory: the GPU upload lives in the renderer so
//! the stream layout, the catalog table, and the visibility handling stay
//! unit-testable without a device.

use crate::record::{CatalogKey, CatalogStyle, PointRecord};
use bytemuck::{Pod, Zeroable};
use std::collections::HashMap;

/// Catalog ids travel as one byte, both in the meta stream and as the
/// style-table texel index.
pub const MAX_CATALOGS: usize = 256;

/// Pick ids are RGB-encoded as `index + 1` in 24 bits; indices past this
/// draw fine but cannot be resolved by picking.
pub const MAX_PICKABLE_POINTS: u32 = (1 << 24) - 1;

/// Per-point color overrides are rare; instead of scanning millions of
/// records to decide whether the color stream is needed, only a bounded
/// prefix is consulted. Loaders that color-code a catalog set the hint on
/// its leading records.
pub const COLOR_HINT_PREFIX: usize = 2048;

/// Visibility byte for a shown point; anything below 128 hides it.
pub const VISIBLE: u8 = 255;
pub const HIDDEN: u8 = 0;

/// Interleaved static attributes: position, radius, pick id. The id is an
/// f32 attribute, exact for every index the 24-bit pick encoding covers.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct MarkerVertex {
    pub pos: [f32; 2],
    pub radius: f32,
    pub id: f32,
}

/// Optional per-point colors, present only for color-coded data.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct MarkerColor {
    pub stroke: [u8; 4],
    pub fill: [u8; 4],
}

/// The assembled streams for one catalog load, rebuilt wholesale by
/// `set_data`; only the visibility bytes inside `meta` may be rewritten in
/// place afterwards.
#[derive(Debug, Default)]
pub struct MarkerData {
    pub vertices: Vec<MarkerVertex>,
    /// `[visibility, catalog id, shape, 0]` per point.
    pub meta: Vec<[u8; 4]>,
    pub colors: Option<Vec<MarkerColor>>,
    /// Catalog keys in first-seen order; the index is the catalog id.
    pub keys: Vec<CatalogKey>,
    /// Style of the record that first introduced each key.
    pub styles: Vec<CatalogStyle>,
    /// Largest radius in the data (not just the visible subset), in image
    /// pixels; input to rendering-path selection.
    pub max_radius: f32,
}

impl MarkerData {
    pub fn len(&self) -> u32 {
        self.vertices.len() as u32
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    pub fn build(records: &[PointRecord]) -> Self {
        let mut data = MarkerData {
            vertices: Vec::with_capacity(records.len()),
            meta: Vec::with_capacity(records.len()),
            ..Default::default()
        };

        let wants_colors = records
            .iter()
            .take(COLOR_HINT_PREFIX)
            .any(|r| r.color.is_some());
        if wants_colors {
            data.colors = Some(Vec::with_capacity(records.len()));
        }

        let mut ids: HashMap<CatalogKey, u8> = HashMap::new();
        let mut catalogs_clamped = false;

        if records.len() as u64 > MAX_PICKABLE_POINTS as u64 {
            log::warn!(
                "{} points exceed the {} pick-id limit; indices past it render \
                 but cannot be picked",
                records.len(),
                MAX_PICKABLE_POINTS
            );
        }

        for (index, record) in records.iter().enumerate() {
            let catalog_id = match ids.get(record.catalog.as_ref()) {
                Some(&id) => id,
                None if data.keys.len() < MAX_CATALOGS => {
                    let id = data.keys.len() as u8;
                    ids.insert(record.catalog.clone(), id);
                    data.keys.push(record.catalog.clone());
                    data.styles.push(record.style);
                    id
                }
                None => {
                    if !catalogs_clamped {
                        log::warn!(
                            "more than {MAX_CATALOGS} catalogs; extra catalogs share \
                             the style of id {}",
                            MAX_CATALOGS - 1
                        );
                        catalogs_clamped = true;
                    }
                    (MAX_CATALOGS - 1) as u8
                }
            };

            data.vertices.push(MarkerVertex {
                pos: record.pos.to_array(),
                radius: record.radius,
                id: index as f32,
            });
            data.meta.push([
                if record.visible { VISIBLE } else { HIDDEN },
                catalog_id,
                record.shape as u8,
                0,
            ]);
            if let Some(colors) = data.colors.as_mut() {
                colors.push(match record.color {
                    Some(c) => MarkerColor {
                        stroke: c.stroke,
                        fill: c.fill,
                    },
                    // Uncoded points in a color-coded load keep their
                    // catalog's colors.
                    None => MarkerColor {
                        stroke: record.style.stroke,
                        fill: record.style.fill,
                    },
                });
            }
            data.max_radius = data.max_radius.max(record.radius);
        }

        data
    }

    /// Replace the visibility bytes in place. A length mismatch is a stale
    /// update from an async filter and is dropped, not treated as an error.
    /// Returns whether the mask was applied (the caller re-uploads only
    /// then).
    pub fn set_visibility_mask(&mut self, mask: &[u8]) -> bool {
        if mask.len() != self.meta.len() {
            log::debug!(
                "visibility mask length {} does not match point count {}; ignored",
                mask.len(),
                self.meta.len()
            );
            return false;
        }
        for (meta, &m) in self.meta.iter_mut().zip(mask) {
            meta[0] = m;
        }
        true
    }
}
