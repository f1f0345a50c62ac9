use crate::field;
use crate::pan_zoom::PanZoomViewer;
use crate::Args;
use anyhow::{anyhow, Result};
use glam::DVec2;
use starmark::schedule::{Debounce, Throttle};
use starmark::{Capabilities, CatalogOverlay, PointRecord};
use std::sync::Arc;
use std::time::{Duration, Instant};
use winit::{
    dpi::PhysicalSize,
    event::{ElementState, MouseButton, MouseScrollDelta, WindowEvent},
    keyboard::{KeyCode, PhysicalKey},
    window::Window,
};

/// A release this close to the press still counts as a click.
const CLICK_SLOP_PX: f64 = 4.0;

pub struct App {
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    pub size: PhysicalSize<u32>,

    overlay: CatalogOverlay,
    viewer: PanZoomViewer,
    records: Vec<PointRecord>,

    pan_throttle: Throttle,
    zoom_debounce: Debounce,

    cursor: DVec2,
    dragging: bool,
    drag_travel: f64,
    filtered: bool,
}

impl App {
    pub async fn new(window: Arc<Window>, args: &Args) -> Result<Self> {
        let size = window.inner_size();
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor::default());
        let surface = instance.create_surface(window.clone())?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .ok_or_else(|| anyhow!("Failed to find a suitable GPU adapter."))?;

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("Device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::default(),
                },
                None,
            )
            .await?;

        let caps = surface.get_capabilities(&adapter);
        let surface_format = caps
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .unwrap_or(caps.formats[0]);

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::Fifo,
            alpha_mode: caps.alpha_modes[0],
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        let mut overlay = CatalogOverlay::new(
            &device,
            surface_format,
            config.width,
            config.height,
            Capabilities::from_backend(),
        )?;

        let records = field::generate(args.points, args.image_size, args.seed);
        overlay.set_data(&device, &queue, &records);
        log::info!(
            "field ready: {} points over a {}px image (seed {})",
            records.len(),
            args.image_size,
            args.seed
        );

        let viewer = PanZoomViewer::new(
            DVec2::new(args.image_size as f64, args.image_size as f64),
            DVec2::new(config.width as f64, config.height as f64),
        );

        Ok(Self {
            surface,
            device,
            queue,
            config,
            size,
            overlay,
            viewer,
            records,
            pan_throttle: Throttle::new(Duration::from_millis(16)),
            zoom_debounce: Debounce::new(Duration::from_millis(60)),
            cursor: DVec2::ZERO,
            dragging: false,
            drag_travel: 0.0,
            filtered: false,
        })
    }

    pub fn resize(&mut self, new_size: PhysicalSize<u32>) {
        if new_size.width > 0 && new_size.height > 0 {
            self.size = new_size;
            self.config.width = new_size.width;
            self.config.height = new_size.height;
            self.surface.configure(&self.device, &self.config);
            self.overlay.resize(new_size.width, new_size.height);
            self.viewer
                .set_element_size(DVec2::new(new_size.width as f64, new_size.height as f64));
        }
    }

    /// Forward viewer input. Redraws are paced: pans through a throttle,
    /// zooms through a debounce polled from `tick`.
    pub fn handle_event(&mut self, window: &Window, event: &WindowEvent) {
        match event {
            WindowEvent::Resized(physical_size) => {
                self.resize(*physical_size);
                window.request_redraw();
            }
            WindowEvent::CursorMoved { position, .. } => {
                let pos = DVec2::new(position.x, position.y);
                if self.dragging {
                    let delta = pos - self.cursor;
                    self.drag_travel += delta.length();
                    self.viewer.pan(delta);
                    if self.pan_throttle.ready(Instant::now()) {
                        window.request_redraw();
                    }
                }
                self.cursor = pos;
            }
            WindowEvent::MouseInput {
                button: MouseButton::Left,
                state,
                ..
            } => match state {
                ElementState::Pressed => {
                    self.dragging = true;
                    self.drag_travel = 0.0;
                }
                ElementState::Released => {
                    self.dragging = false;
                    if self.drag_travel < CLICK_SLOP_PX {
                        self.pick_at(self.cursor);
                    } else {
                        // Settle on the final pan position.
                        window.request_redraw();
                    }
                }
            },
            WindowEvent::MouseWheel { delta, .. } => {
                let scroll = match delta {
                    MouseScrollDelta::LineDelta(_, y) => *y as f64,
                    MouseScrollDelta::PixelDelta(pos) => pos.y / 120.0,
                };
                self.viewer.zoom_about(self.cursor, 1.1f64.powf(scroll));
                self.zoom_debounce.trigger(Instant::now());
            }
            WindowEvent::KeyboardInput { event, .. } if event.state == ElementState::Pressed => {
                match event.physical_key {
                    PhysicalKey::Code(KeyCode::KeyS) => self.export(),
                    PhysicalKey::Code(KeyCode::KeyF) => {
                        self.toggle_filter();
                        window.request_redraw();
                    }
                    _ => {}
                }
            }
            _ => {}
        }
    }

    /// Poll the zoom debounce; returns the wakeup instant while a burst is
    /// still settling.
    pub fn tick(&mut self, window: &Window) -> Option<Instant> {
        if self.zoom_debounce.fire(Instant::now()) {
            log::debug!("zoom settled at {:.3} px/image-px", self.viewer.zoom());
            window.request_redraw();
        }
        self.zoom_debounce.deadline()
    }

    pub fn render(&mut self) -> Result<(), wgpu::SurfaceError> {
        let frame = self.surface.get_current_texture()?;
        let view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Frame Encoder"),
            });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Sky Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        // Dark sky standing in for the image layer below.
                        load: wgpu::LoadOp::Clear(wgpu::Color {
                            r: 0.008,
                            g: 0.011,
                            b: 0.030,
                            a: 1.0,
                        }),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            self.overlay.draw(&self.queue, &self.viewer, &mut pass);
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        frame.present();
        Ok(())
    }

    fn pick_at(&mut self, pos: DVec2) {
        match self
            .overlay
            .pick(&self.device, &self.queue, &self.viewer, pos.x, pos.y)
        {
            Ok(Some(index)) => match self.records.get(index as usize) {
                Some(record) => log::info!(
                    "picked #{index}: catalog '{}' at image ({:.1}, {:.1}), radius {:.1}px",
                    record.catalog,
                    record.pos.x,
                    record.pos.y,
                    record.radius
                ),
                None => log::warn!("picked #{index} outside the loaded records"),
            },
            Ok(None) => log::debug!("click at ({:.0}, {:.0}) hit empty sky", pos.x, pos.y),
            Err(e) => log::error!("pick failed: {e}"),
        }
    }

    fn export(&mut self) {
        let frame = match self
            .overlay
            .render_to_rgba(&self.device, &self.queue, &self.viewer)
        {
            Ok(frame) => frame,
            Err(e) => {
                log::error!("overlay export failed: {e}");
                return;
            }
        };
        let (width, height) = (frame.width, frame.height);
        match image::RgbaImage::from_raw(width, height, frame.pixels) {
            Some(img) => match img.save("starmark-overlay.png") {
                Ok(()) => log::info!("wrote starmark-overlay.png ({width}x{height})"),
                Err(e) => log::error!("PNG write failed: {e}"),
            },
            None => log::error!("export returned a malformed {width}x{height} frame"),
        }
    }

    /// Live filtering demo: hide the faint end of the field through the
    /// in-place visibility mask.
    fn toggle_filter(&mut self) {
        self.filtered = !self.filtered;
        let mask: Vec<u8> = if self.filtered {
            self.records
                .iter()
                .map(|r| if r.radius >= 4.0 { 255 } else { 0 })
                .collect()
        } else {
            vec![255; self.records.len()]
        };
        self.overlay.set_visibility_mask(&self.queue, &mask);
        log::info!(
            "visibility filter {}",
            if self.filtered {
                "on (radius >= 4px)"
            } else {
                "off"
            }
        );
    }
}
