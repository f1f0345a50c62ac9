//! The overlay renderer: owns every GPU resource of the overlay and
//! exposes the draw / pick / export operations.

mod pipelines;
mod targets;

pub use pipelines::{select_path, Capabilities, ColorSource, MarkerPath};

use crate::error::OverlayError;
use crate::geometry::MarkerData;
use crate::record::PointRecord;
use crate::style::{pack_styles, StyleTexels};
use crate::transform::{TransformEstimator, ViewTransform};
use crate::viewer::Viewer;
use bytemuck::{Pod, Zeroable};
use pipelines::{GpuGeometry, MarkerPipelines, PassKind};
use targets::{align256, decode_pick_texel, read_frame, read_texel, CachedTarget};
use wgpu::util::DeviceExt;

/// Pick ids ride plain unorm bytes, so the target must be a non-sRGB
/// RGBA8 format for the encoding to survive untouched.
const PICK_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

/// Frame uniform; must match `Globals` in `shaders/markers.wgsl`
/// (mat3 columns ride in vec4 slots per std140).
#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
struct Globals {
    matrix: [[f32; 4]; 3],
    scale_px: f32,
    color_mode: u32,
    _pad: [f32; 2],
}

// Compile-time safety check: buffer size must match the WGSL-side struct.
const _: [(); 64] = [(); std::mem::size_of::<Globals>()];

/// Tightly packed RGBA pixels, rows top-down.
#[derive(Debug, Clone)]
pub struct RgbaFrame {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

/// The three 256×1 style tables plus their bind group. Uploads are skipped
/// when the packed content signature is unchanged.
struct StyleLut {
    stroke: wgpu::Texture,
    fill: wgpu::Texture,
    params: wgpu::Texture,
    bind_group: wgpu::BindGroup,
    signature: Option<u64>,
}

impl StyleLut {
    fn new(device: &wgpu::Device, layout: &wgpu::BindGroupLayout) -> Self {
        let make = |label| {
            device.create_texture(&wgpu::TextureDescriptor {
                label: Some(label),
                size: wgpu::Extent3d {
                    width: crate::geometry::MAX_CATALOGS as u32,
                    height: 1,
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: wgpu::TextureFormat::Rgba8Unorm,
                usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
                view_formats: &[],
            })
        };
        let stroke = make("Style Stroke Table");
        let fill = make("Style Fill Table");
        let params = make("Style Params Table");

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Style Tables Bind Group"),
            layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(
                        &stroke.create_view(&wgpu::TextureViewDescriptor::default()),
                    ),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(
                        &fill.create_view(&wgpu::TextureViewDescriptor::default()),
                    ),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::TextureView(
                        &params.create_view(&wgpu::TextureViewDescriptor::default()),
                    ),
                },
            ],
        });

        Self {
            stroke,
            fill,
            params,
            bind_group,
            signature: None,
        }
    }

    fn upload(&mut self, queue: &wgpu::Queue, texels: &StyleTexels) {
        if self.signature == Some(texels.signature()) {
            return;
        }
        let write = |texture: &wgpu::Texture, bytes: &[u8]| {
            queue.write_texture(
                wgpu::ImageCopyTexture {
                    texture,
                    mip_level: 0,
                    origin: wgpu::Origin3d::ZERO,
                    aspect: wgpu::TextureAspect::All,
                },
                bytes,
                wgpu::ImageDataLayout {
                    offset: 0,
                    bytes_per_row: Some(bytes.len() as u32),
                    rows_per_image: Some(1),
                },
                wgpu::Extent3d {
                    width: (bytes.len() / 4) as u32,
                    height: 1,
                    depth_or_array_layers: 1,
                },
            );
        };
        write(&self.stroke, &texels.stroke);
        write(&self.fill, &texels.fill);
        write(&self.params, &texels.params);
        self.signature = Some(texels.signature());
    }
}

/// GPU-synced catalog marker overlay for one pan/zoom image viewer.
///
/// The host owns device, queue and the presented surface; the overlay owns
/// everything else (vertex streams, style tables, pick and export
/// targets). `draw` renders into a host-provided render pass whose color
/// target uses the `target_format` given at construction and which carries
/// no depth attachment; `pick` and `render_to_rgba` run self-contained
/// offscreen passes.
pub struct CatalogOverlay {
    pipelines: MarkerPipelines,
    caps: Capabilities,
    estimator: TransformEstimator,

    globals: wgpu::Buffer,
    globals_bind: wgpu::BindGroup,
    lut: StyleLut,
    quad_vb: wgpu::Buffer,

    data: MarkerData,
    geometry: Option<GpuGeometry>,

    target_format: wgpu::TextureFormat,
    buffer_size: (u32, u32),

    pick_target: CachedTarget,
    pick_buf: wgpu::Buffer,
    export_target: CachedTarget,
    export_buf: wgpu::Buffer,
    export_buf_size: u64,
}

impl CatalogOverlay {
    /// Build the overlay's pipelines and static resources.
    ///
    /// The shaders are fixed, so any compile or validation failure here
    /// means a broken environment; it is captured through an error scope
    /// and returned with the backend diagnostic verbatim.
    pub fn new(
        device: &wgpu::Device,
        target_format: wgpu::TextureFormat,
        width: u32,
        height: u32,
        caps: Capabilities,
    ) -> Result<Self, OverlayError> {
        device.push_error_scope(wgpu::ErrorFilter::Validation);

        let pipelines = MarkerPipelines::new(device, target_format, PICK_FORMAT);

        let globals = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Marker Globals"),
            size: std::mem::size_of::<Globals>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let globals_bind = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Marker Globals Bind Group"),
            layout: &pipelines.globals_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: globals.as_entire_binding(),
            }],
        });

        let lut = StyleLut::new(device, &pipelines.lut_layout);

        let quad_corners: [[f32; 2]; 6] = [
            [-1.0, -1.0],
            [1.0, -1.0],
            [1.0, 1.0],
            [-1.0, -1.0],
            [1.0, 1.0],
            [-1.0, 1.0],
        ];
        let quad_vb = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Marker Quad VB"),
            contents: bytemuck::cast_slice(&quad_corners),
            usage: wgpu::BufferUsages::VERTEX,
        });

        let pick_buf = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Marker Pick Readback"),
            size: 256,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });
        // Small to start with; grows to the frame size on first export.
        let export_buf = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Marker Export Readback"),
            size: 256,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        if let Some(error) = pollster::block_on(device.pop_error_scope()) {
            return Err(OverlayError::Construction(error.to_string()));
        }

        Ok(Self {
            pipelines,
            caps,
            estimator: TransformEstimator::new(),
            globals,
            globals_bind,
            lut,
            quad_vb,
            data: MarkerData::default(),
            geometry: None,
            target_format,
            buffer_size: (width.max(1), height.max(1)),
            pick_target: CachedTarget::new("Marker Pick Target", PICK_FORMAT),
            pick_buf,
            export_target: CachedTarget::new("Marker Export Target", target_format),
            export_buf,
            export_buf_size: 256,
        })
    }

    /// Report the current drawing-buffer size in device pixels. Offscreen
    /// targets follow lazily on the next pick/export.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.buffer_size = (width.max(1), height.max(1));
    }

    pub fn point_count(&self) -> u32 {
        self.data.len()
    }

    /// Replace the whole data set: vertex streams, catalog table and style
    /// tables are rebuilt wholesale.
    pub fn set_data(&mut self, device: &wgpu::Device, queue: &wgpu::Queue, records: &[PointRecord]) {
        self.data = MarkerData::build(records);
        self.lut.upload(queue, &pack_styles(&self.data.styles));

        self.geometry = if self.data.is_empty() {
            None
        } else {
            Some(GpuGeometry {
                core: device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("Marker Core VB"),
                    contents: bytemuck::cast_slice(&self.data.vertices),
                    usage: wgpu::BufferUsages::VERTEX,
                }),
                meta: device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("Marker Meta VB"),
                    contents: bytemuck::cast_slice(&self.data.meta),
                    usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
                }),
                colors: self.data.colors.as_ref().map(|colors| {
                    device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                        label: Some("Marker Color VB"),
                        contents: bytemuck::cast_slice(colors),
                        usage: wgpu::BufferUsages::VERTEX,
                    })
                }),
                count: self.data.len(),
                max_radius: self.data.max_radius,
            })
        };
        log::debug!(
            "catalog load: {} points, {} catalogs, per-point colors: {}",
            self.data.len(),
            self.data.keys.len(),
            self.data.colors.is_some()
        );
    }

    /// Swap the visibility bytes in place for live filtering. A mask whose
    /// length does not match the loaded point count is a stale async
    /// update and is dropped silently.
    pub fn set_visibility_mask(&mut self, queue: &wgpu::Queue, mask: &[u8]) {
        if self.data.set_visibility_mask(mask) {
            if let Some(geometry) = &self.geometry {
                queue.write_buffer(&geometry.meta, 0, bytemuck::cast_slice(&self.data.meta));
            }
        }
    }

    /// Render every point with one draw call into the host's render pass.
    ///
    /// The transform is re-estimated from the viewer immediately before
    /// drawing and the rendering path re-selected, so the draw is a cheap
    /// idempotent full redraw of the current viewer state.
    pub fn draw<'p>(
        &'p self,
        queue: &wgpu::Queue,
        viewer: &dyn Viewer,
        pass: &mut wgpu::RenderPass<'p>,
    ) {
        let Some(geometry) = &self.geometry else {
            return;
        };
        let transform = self.estimator.estimate(viewer, self.buffer_size);
        let source = geometry.color_source();
        self.write_globals(queue, &transform, source);

        let path = select_path(geometry.max_radius, transform.px_per_image, self.caps);
        pass.set_bind_group(0, &self.globals_bind, &[]);
        pass.set_bind_group(1, &self.lut.bind_group, &[]);
        self.pipelines
            .issue(pass, path, PassKind::Draw(source), geometry, &self.quad_vb);
    }

    /// Resolve an element-space pointer position to a point index.
    ///
    /// Renders the id-encoded point set offscreen (blending disabled) and
    /// decodes the single texel under the pointer; the element position is
    /// mapped to drawing-buffer pixels through the buffer/element size
    /// ratio, which absorbs any host scaling. Synchronous GPU round-trip,
    /// intended for interaction-rate use.
    pub fn pick(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        viewer: &dyn Viewer,
        x: f64,
        y: f64,
    ) -> Result<Option<u32>, OverlayError> {
        let Some(geometry) = &self.geometry else {
            // Nothing loaded: resolve without touching the GPU.
            return Ok(None);
        };

        let (bw, bh) = self.buffer_size;
        let elem = viewer.element_size();
        let bx = x * bw as f64 / elem.x;
        let by = y * bh as f64 / elem.y;
        if !bx.is_finite() || !by.is_finite() || bx < 0.0 || by < 0.0 {
            return Ok(None);
        }
        let (bx, by) = (bx as u32, by as u32);
        if bx >= bw || by >= bh {
            return Ok(None);
        }

        self.pick_target.ensure(device, self.buffer_size);

        let transform = self.estimator.estimate(viewer, self.buffer_size);
        self.write_globals(queue, &transform, ColorSource::Atlas);
        let path = select_path(geometry.max_radius, transform.px_per_image, self.caps);

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Marker Pick Encoder"),
        });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Marker Pick Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: self.pick_target.view(),
                    resolve_target: None,
                    ops: wgpu::Operations {
                        // All-zero clear: decodes to "no hit".
                        load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            pass.set_bind_group(0, &self.globals_bind, &[]);
            self.pipelines
                .issue(&mut pass, path, PassKind::Pick, geometry, &self.quad_vb);
        }

        let texel = read_texel(
            device,
            queue,
            encoder,
            self.pick_target.texture(),
            (bx, by),
            &self.pick_buf,
        )?;
        Ok(decode_pick_texel(texel))
    }

    /// Render the overlay into a dedicated offscreen target and read the
    /// whole frame back, tightly packed RGBA with rows top-down. Exists
    /// because the presented framebuffer's contents are not guaranteed
    /// retained after presentation.
    pub fn render_to_rgba(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        viewer: &dyn Viewer,
    ) -> Result<RgbaFrame, OverlayError> {
        let (width, height) = self.buffer_size;
        self.export_target.ensure(device, self.buffer_size);

        let needed = align256(width * 4) as u64 * height as u64;
        if needed > self.export_buf_size {
            self.export_buf = device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("Marker Export Readback"),
                size: needed,
                usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
                mapped_at_creation: false,
            });
            self.export_buf_size = needed;
        }

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Marker Export Encoder"),
        });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Marker Export Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: self.export_target.view(),
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            if let Some(geometry) = &self.geometry {
                let transform = self.estimator.estimate(viewer, self.buffer_size);
                let source = geometry.color_source();
                self.write_globals(queue, &transform, source);
                let path = select_path(geometry.max_radius, transform.px_per_image, self.caps);
                pass.set_bind_group(0, &self.globals_bind, &[]);
                pass.set_bind_group(1, &self.lut.bind_group, &[]);
                self.pipelines
                    .issue(&mut pass, path, PassKind::Draw(source), geometry, &self.quad_vb);
            }
        }

        let pixels = read_frame(
            device,
            queue,
            encoder,
            self.export_target.texture(),
            self.buffer_size,
            &self.export_buf,
            is_bgra(self.target_format),
        )?;
        Ok(RgbaFrame {
            width,
            height,
            pixels,
        })
    }

    fn write_globals(&self, queue: &wgpu::Queue, transform: &ViewTransform, source: ColorSource) {
        let m = transform.clip_from_image;
        let col = |i| {
            let c = m.col(i);
            [c.x, c.y, c.z, 0.0]
        };
        let globals = Globals {
            matrix: [col(0), col(1), col(2)],
            scale_px: transform.px_per_image,
            color_mode: matches!(source, ColorSource::PerPoint) as u32,
            _pad: [0.0; 2],
        };
        queue.write_buffer(&self.globals, 0, bytemuck::bytes_of(&globals));
    }
}

fn is_bgra(format: wgpu::TextureFormat) -> bool {
    matches!(
        format,
        wgpu::TextureFormat::Bgra8Unorm | wgpu::TextureFormat::Bgra8UnormSrgb
    )
}
