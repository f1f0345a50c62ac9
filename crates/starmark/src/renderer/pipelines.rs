//! Marker pipelines: the two rendering paths, their pick variants, and the
//! per-draw path selection.

use crate::geometry::{MarkerColor, MarkerVertex};

/// Backend capabilities, resolved once at construction; every later branch
/// reads this instead of re-probing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Capabilities {
    /// Whether instanced draws are available at all.
    pub instancing: bool,
    /// Usable on-screen diameter cap for point primitives, in device
    /// pixels, net of any safety margin the probe applies.
    pub max_point_diameter: f32,
}

impl Capabilities {
    /// WebGPU guarantees instancing, and point primitives raster at a
    /// fixed one-device-pixel diameter (WGSL has no point-size state), so
    /// the point path only wins while markers are sub-pixel.
    pub const fn from_backend() -> Self {
        Self {
            instancing: true,
            max_point_diameter: 1.0,
        }
    }
}

impl Default for Capabilities {
    fn default() -> Self {
        Self::from_backend()
    }
}

/// The rendering strategy for one draw. Selection is re-evaluated on every
/// draw and every pick, since zoom changes the on-screen size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerPath {
    /// One vertex per point. Cheap, but diameters clamp at the backend
    /// cap, so it is only chosen when every marker fits under it (or when
    /// instancing is unavailable, the documented degraded mode).
    PointSprites,
    /// Six vertices per point with corner offsets applied in image space,
    /// so marker size keeps tracking zoom.
    InstancedQuads,
}

/// Where fragments take their colors from for a whole draw; the two are
/// never mixed within one draw call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorSource {
    /// Style-table lookup by catalog id.
    Atlas,
    /// Interpolated per-vertex stroke/fill.
    PerPoint,
}

/// What a pass renders: styled fragments or id-encoded pick fragments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PassKind {
    Draw(ColorSource),
    Pick,
}

/// Choose the path for the current frame from the largest radius in the
/// data and the current device-pixels-per-image-pixel scale.
pub fn select_path(max_radius: f32, px_per_image: f32, caps: Capabilities) -> MarkerPath {
    if !caps.instancing {
        return MarkerPath::PointSprites;
    }
    let diameter = 2.0 * max_radius * px_per_image;
    if diameter <= caps.max_point_diameter {
        MarkerPath::PointSprites
    } else {
        MarkerPath::InstancedQuads
    }
}

/// Uploaded vertex streams for one catalog load.
pub(crate) struct GpuGeometry {
    pub core: wgpu::Buffer,
    pub meta: wgpu::Buffer,
    pub colors: Option<wgpu::Buffer>,
    pub count: u32,
    pub max_radius: f32,
}

impl GpuGeometry {
    pub fn color_source(&self) -> ColorSource {
        if self.colors.is_some() {
            ColorSource::PerPoint
        } else {
            ColorSource::Atlas
        }
    }
}

// Vertex attribute tables. Shader locations are shared between the two
// paths; only the buffer slots and step modes differ.

const QUAD_CORNER_ATTRS: [wgpu::VertexAttribute; 1] = [wgpu::VertexAttribute {
    shader_location: 0,
    offset: 0,
    format: wgpu::VertexFormat::Float32x2,
}];

const CORE_ATTRS: [wgpu::VertexAttribute; 3] = [
    // Position (image px)
    wgpu::VertexAttribute {
        shader_location: 1,
        offset: 0,
        format: wgpu::VertexFormat::Float32x2,
    },
    // Radius (image px)
    wgpu::VertexAttribute {
        shader_location: 2,
        offset: 8,
        format: wgpu::VertexFormat::Float32,
    },
    // Pick id
    wgpu::VertexAttribute {
        shader_location: 3,
        offset: 12,
        format: wgpu::VertexFormat::Float32,
    },
];

// [visibility, catalog id, shape, 0]
const META_ATTRS: [wgpu::VertexAttribute; 1] = [wgpu::VertexAttribute {
    shader_location: 4,
    offset: 0,
    format: wgpu::VertexFormat::Uint8x4,
}];

const COLOR_ATTRS: [wgpu::VertexAttribute; 2] = [
    wgpu::VertexAttribute {
        shader_location: 5,
        offset: 0,
        format: wgpu::VertexFormat::Unorm8x4,
    },
    wgpu::VertexAttribute {
        shader_location: 6,
        offset: 4,
        format: wgpu::VertexFormat::Unorm8x4,
    },
];

fn corner_layout() -> wgpu::VertexBufferLayout<'static> {
    wgpu::VertexBufferLayout {
        array_stride: std::mem::size_of::<[f32; 2]>() as u64,
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes: &QUAD_CORNER_ATTRS,
    }
}

fn core_layout(step_mode: wgpu::VertexStepMode) -> wgpu::VertexBufferLayout<'static> {
    wgpu::VertexBufferLayout {
        array_stride: std::mem::size_of::<MarkerVertex>() as u64,
        step_mode,
        attributes: &CORE_ATTRS,
    }
}

fn meta_layout(step_mode: wgpu::VertexStepMode) -> wgpu::VertexBufferLayout<'static> {
    wgpu::VertexBufferLayout {
        array_stride: 4,
        step_mode,
        attributes: &META_ATTRS,
    }
}

fn color_layout(step_mode: wgpu::VertexStepMode) -> wgpu::VertexBufferLayout<'static> {
    wgpu::VertexBufferLayout {
        array_stride: std::mem::size_of::<MarkerColor>() as u64,
        step_mode,
        attributes: &COLOR_ATTRS,
    }
}

/// The six concrete pipelines: {quad, point} × {atlas draw, per-point
/// draw} plus {quad, point} pick. Both paths share one bind/issue routine.
pub(crate) struct MarkerPipelines {
    draw_quad_atlas: wgpu::RenderPipeline,
    draw_quad_color: wgpu::RenderPipeline,
    draw_point_atlas: wgpu::RenderPipeline,
    draw_point_color: wgpu::RenderPipeline,
    pick_quad: wgpu::RenderPipeline,
    pick_point: wgpu::RenderPipeline,
    pub globals_layout: wgpu::BindGroupLayout,
    pub lut_layout: wgpu::BindGroupLayout,
}

impl MarkerPipelines {
    pub fn new(
        device: &wgpu::Device,
        target_format: wgpu::TextureFormat,
        pick_format: wgpu::TextureFormat,
    ) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("shaders/markers.wgsl"),
            source: wgpu::ShaderSource::Wgsl(include_str!("../../shaders/markers.wgsl").into()),
        });

        let globals_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Marker Globals BGL"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });

        let lut_entry = |binding| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Texture {
                multisampled: false,
                view_dimension: wgpu::TextureViewDimension::D2,
                sample_type: wgpu::TextureSampleType::Float { filterable: true },
            },
            count: None,
        };
        let lut_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Marker Style Tables BGL"),
            entries: &[lut_entry(0), lut_entry(1), lut_entry(2)],
        });

        let draw_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Marker Draw PipelineLayout"),
            bind_group_layouts: &[&globals_layout, &lut_layout],
            push_constant_ranges: &[],
        });
        // Picking never touches the style tables.
        let pick_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Marker Pick PipelineLayout"),
            bind_group_layouts: &[&globals_layout],
            push_constant_ranges: &[],
        });

        let instance = wgpu::VertexStepMode::Instance;
        let vertex = wgpu::VertexStepMode::Vertex;
        let quads = wgpu::PrimitiveTopology::TriangleList;
        let points = wgpu::PrimitiveTopology::PointList;
        let blend = Some(wgpu::BlendState::ALPHA_BLENDING);

        Self {
            draw_quad_atlas: build_pipeline(
                device,
                &shader,
                &draw_layout,
                "Marker Quad Pipeline",
                ("vs_quad", "fs_draw"),
                &[corner_layout(), core_layout(instance), meta_layout(instance)],
                quads,
                target_format,
                blend,
            ),
            draw_quad_color: build_pipeline(
                device,
                &shader,
                &draw_layout,
                "Marker Quad Pipeline (per-point colors)",
                ("vs_quad_color", "fs_draw"),
                &[
                    corner_layout(),
                    core_layout(instance),
                    meta_layout(instance),
                    color_layout(instance),
                ],
                quads,
                target_format,
                blend,
            ),
            draw_point_atlas: build_pipeline(
                device,
                &shader,
                &draw_layout,
                "Marker Point Pipeline",
                ("vs_point", "fs_draw"),
                &[core_layout(vertex), meta_layout(vertex)],
                points,
                target_format,
                blend,
            ),
            draw_point_color: build_pipeline(
                device,
                &shader,
                &draw_layout,
                "Marker Point Pipeline (per-point colors)",
                ("vs_point_color", "fs_draw"),
                &[core_layout(vertex), meta_layout(vertex), color_layout(vertex)],
                points,
                target_format,
                blend,
            ),
            // Blending would corrupt the id encoding, so pick blends nothing.
            pick_quad: build_pipeline(
                device,
                &shader,
                &pick_layout,
                "Marker Pick Pipeline (quads)",
                ("vs_quad", "fs_pick"),
                &[corner_layout(), core_layout(instance), meta_layout(instance)],
                quads,
                pick_format,
                None,
            ),
            pick_point: build_pipeline(
                device,
                &shader,
                &pick_layout,
                "Marker Pick Pipeline (points)",
                ("vs_point", "fs_pick"),
                &[core_layout(vertex), meta_layout(vertex)],
                points,
                pick_format,
                None,
            ),
            globals_layout,
            lut_layout,
        }
    }

    /// Bind the vertex streams for `path` and issue a single draw call
    /// covering every point. Bind groups are set by the caller.
    pub fn issue<'p>(
        &'p self,
        pass: &mut wgpu::RenderPass<'p>,
        path: MarkerPath,
        kind: PassKind,
        geometry: &'p GpuGeometry,
        quad_vb: &'p wgpu::Buffer,
    ) {
        let colored = matches!(kind, PassKind::Draw(ColorSource::PerPoint));
        let pipeline = match (path, kind) {
            (MarkerPath::InstancedQuads, PassKind::Draw(ColorSource::Atlas)) => {
                &self.draw_quad_atlas
            }
            (MarkerPath::InstancedQuads, PassKind::Draw(ColorSource::PerPoint)) => {
                &self.draw_quad_color
            }
            (MarkerPath::InstancedQuads, PassKind::Pick) => &self.pick_quad,
            (MarkerPath::PointSprites, PassKind::Draw(ColorSource::Atlas)) => {
                &self.draw_point_atlas
            }
            (MarkerPath::PointSprites, PassKind::Draw(ColorSource::PerPoint)) => {
                &self.draw_point_color
            }
            (MarkerPath::PointSprites, PassKind::Pick) => &self.pick_point,
        };
        pass.set_pipeline(pipeline);

        match path {
            MarkerPath::InstancedQuads => {
                pass.set_vertex_buffer(0, quad_vb.slice(..));
                pass.set_vertex_buffer(1, geometry.core.slice(..));
                pass.set_vertex_buffer(2, geometry.meta.slice(..));
                if colored {
                    if let Some(colors) = &geometry.colors {
                        pass.set_vertex_buffer(3, colors.slice(..));
                    }
                }
                pass.draw(0..6, 0..geometry.count);
            }
            MarkerPath::PointSprites => {
                pass.set_vertex_buffer(0, geometry.core.slice(..));
                pass.set_vertex_buffer(1, geometry.meta.slice(..));
                if colored {
                    if let Some(colors) = &geometry.colors {
                        pass.set_vertex_buffer(2, colors.slice(..));
                    }
                }
                pass.draw(0..geometry.count, 0..1);
            }
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn build_pipeline(
    device: &wgpu::Device,
    shader: &wgpu::ShaderModule,
    layout: &wgpu::PipelineLayout,
    label: &str,
    (vs, fs): (&str, &str),
    buffers: &[wgpu::VertexBufferLayout],
    topology: wgpu::PrimitiveTopology,
    format: wgpu::TextureFormat,
    blend: Option<wgpu::BlendState>,
) -> wgpu::RenderPipeline {
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(label),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module: shader,
            entry_point: vs,
            buffers,
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        },
        primitive: wgpu::PrimitiveState {
            topology,
            ..Default::default()
        },
        depth_stencil: None,
        fragment: Some(wgpu::FragmentState {
            module: shader,
            entry_point: fs,
            targets: &[Some(wgpu::ColorTargetState {
                format,
                blend,
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        }),
        multisample: wgpu::MultisampleState::default(),
        multiview: None,
    })
}
