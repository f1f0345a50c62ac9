//! End-to-end overlay checks against a real adapter. Each test skips with
//! a note when the environment offers no GPU.

use glam::{DVec2, Vec2};
use starmark::{Capabilities, CatalogOverlay, CatalogStyle, PointRecord, Viewer};
use std::sync::Arc;

const W: u32 = 1000;
const H: u32 = 1000;

/// Y-flipping viewer: image (0,0) → element (0,H), image (1000,1000) →
/// element (W,0), the usual sky-coordinate orientation.
struct FlippedViewer;

impl Viewer for FlippedViewer {
    fn image_to_viewport(&self, p: DVec2) -> DVec2 {
        p / 1000.0
    }

    fn viewport_to_element(&self, p: DVec2) -> DVec2 {
        DVec2::new(p.x * W as f64, H as f64 - p.y * H as f64)
    }

    fn element_size(&self) -> DVec2 {
        DVec2::new(W as f64, H as f64)
    }

    fn image_size(&self) -> DVec2 {
        DVec2::new(1000.0, 1000.0)
    }
}

fn gpu() -> Option<(wgpu::Device, wgpu::Queue)> {
    let _ = env_logger::builder().is_test(true).try_init();
    let instance = wgpu::Instance::new(wgpu::InstanceDescriptor::default());
    let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
        power_preference: wgpu::PowerPreference::HighPerformance,
        compatible_surface: None,
        force_fallback_adapter: false,
    }))?;
    pollster::block_on(adapter.request_device(
        &wgpu::DeviceDescriptor {
            label: Some("starmark test device"),
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::downlevel_defaults(),
        },
        None,
    ))
    .ok()
}

macro_rules! require_gpu {
    () => {
        match gpu() {
            Some(pair) => pair,
            None => {
                eprintln!("skipping: no GPU adapter available");
                return;
            }
        }
    };
}

fn test_records() -> Vec<PointRecord> {
    let catalog: starmark::CatalogKey = Arc::from("test-catalog");
    let style = CatalogStyle {
        stroke: [255, 0, 0, 255],
        fill: [0, 255, 0, 255],
        border_px: 0.0,
        opacity: 1.0,
    };
    [(10.0, 10.0), (500.0, 500.0), (990.0, 990.0)]
        .iter()
        .map(|&(x, y)| PointRecord::new(&catalog, style, Vec2::new(x, y), 5.0))
        .collect()
}

fn make_overlay(device: &wgpu::Device) -> CatalogOverlay {
    CatalogOverlay::new(
        device,
        wgpu::TextureFormat::Rgba8Unorm,
        W,
        H,
        Capabilities::from_backend(),
    )
    .expect("overlay construction")
}

#[test]
fn pick_resolves_markers_under_a_flipped_transform() {
    let (device, queue) = require_gpu!();
    let mut overlay = make_overlay(&device);
    overlay.set_data(&device, &queue, &test_records());

    // Image (10,10) lands at element (10, H-10); dead-center hit.
    let hit = overlay
        .pick(&device, &queue, &FlippedViewer, 10.0, (H - 10) as f64)
        .expect("pick");
    assert_eq!(hit, Some(0));

    // Image (990,990) lands near the top of the element.
    let hit = overlay
        .pick(&device, &queue, &FlippedViewer, 990.0, 10.0)
        .expect("pick");
    assert_eq!(hit, Some(2));

    // Far from all three markers.
    let miss = overlay
        .pick(&device, &queue, &FlippedViewer, 700.0, 700.0)
        .expect("pick");
    assert_eq!(miss, None);

    // Outside the element entirely.
    let miss = overlay
        .pick(&device, &queue, &FlippedViewer, -5.0, 50.0)
        .expect("pick");
    assert_eq!(miss, None);
}

#[test]
fn pick_with_no_data_returns_none() {
    let (device, queue) = require_gpu!();
    let mut overlay = make_overlay(&device);
    let hit = overlay
        .pick(&device, &queue, &FlippedViewer, 500.0, 500.0)
        .expect("pick");
    assert_eq!(hit, None);
}

#[test]
fn hidden_points_are_not_pickable() {
    let (device, queue) = require_gpu!();
    let mut overlay = make_overlay(&device);
    overlay.set_data(&device, &queue, &test_records());

    overlay.set_visibility_mask(&queue, &[0, 255, 255]);
    let hit = overlay
        .pick(&device, &queue, &FlippedViewer, 10.0, (H - 10) as f64)
        .expect("pick");
    assert_eq!(hit, None);

    // A stale mask length changes nothing.
    overlay.set_visibility_mask(&queue, &[255, 255]);
    // Restoring visibility makes the marker pickable again.
    overlay.set_visibility_mask(&queue, &[255, 255, 255]);
    let hit = overlay
        .pick(&device, &queue, &FlippedViewer, 10.0, (H - 10) as f64)
        .expect("pick");
    assert_eq!(hit, Some(0));
}

#[test]
fn export_is_deterministic_and_places_markers() {
    let (device, queue) = require_gpu!();
    let mut overlay = make_overlay(&device);
    overlay.set_data(&device, &queue, &test_records());

    let a = overlay
        .render_to_rgba(&device, &queue, &FlippedViewer)
        .expect("export");
    let b = overlay
        .render_to_rgba(&device, &queue, &FlippedViewer)
        .expect("export");

    assert_eq!(a.width, W);
    assert_eq!(a.height, H);
    assert_eq!(a.pixels.len(), (W * H * 4) as usize);
    // No hidden per-frame accumulation: bytes are identical.
    assert_eq!(a.pixels, b.pixels);

    let texel = |x: u32, y: u32| {
        let i = ((y * W + x) * 4) as usize;
        [
            a.pixels[i],
            a.pixels[i + 1],
            a.pixels[i + 2],
            a.pixels[i + 3],
        ]
    };

    // Marker 0 fill at element (10, H-10); rows are returned top-down.
    assert_eq!(texel(10, H - 10), [0, 255, 0, 255]);
    // Empty sky stays fully transparent.
    assert_eq!(texel(700, 700), [0, 0, 0, 0]);
}
