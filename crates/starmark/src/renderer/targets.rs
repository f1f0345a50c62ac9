//! Offscreen render targets and synchronous pixel readback.
//!
//! Pick and export each own one color target sized to the drawing buffer.
//! Targets are only reallocated when that size actually changes; readback
//! buffers persist across calls (the export buffer grows on demand).

use crate::error::OverlayError;

/// A color target that tracks the drawing-buffer size.
pub(crate) struct CachedTarget {
    label: &'static str,
    format: wgpu::TextureFormat,
    texture: Option<wgpu::Texture>,
    view: Option<wgpu::TextureView>,
    size: (u32, u32),
}

impl CachedTarget {
    pub fn new(label: &'static str, format: wgpu::TextureFormat) -> Self {
        Self {
            label,
            format,
            texture: None,
            view: None,
            size: (0, 0),
        }
    }

    /// (Re)allocate only when the requested size differs from the cached
    /// texture's.
    pub fn ensure(&mut self, device: &wgpu::Device, size: (u32, u32)) {
        if self.texture.is_some() && self.size == size {
            return;
        }
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(self.label),
            size: wgpu::Extent3d {
                width: size.0.max(1),
                height: size.1.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: self.format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        self.view = Some(texture.create_view(&wgpu::TextureViewDescriptor::default()));
        self.texture = Some(texture);
        self.size = size;
    }

    /// Valid after `ensure`.
    pub fn view(&self) -> &wgpu::TextureView {
        self.view.as_ref().expect("ensure() before view()")
    }

    pub fn texture(&self) -> &wgpu::Texture {
        self.texture.as_ref().expect("ensure() before texture()")
    }
}

/// Buffer rows must be 256-byte aligned for texture→buffer copies.
pub(crate) fn align256(n: u32) -> u32 {
    n.div_ceil(256) * 256
}

/// Block until the slice is mapped; wgpu only delivers the result through
/// a callback, so it is routed back over a channel while we poll.
fn map_blocking(device: &wgpu::Device, slice: wgpu::BufferSlice) -> Result<(), OverlayError> {
    let (tx, rx) = std::sync::mpsc::channel();
    slice.map_async(wgpu::MapMode::Read, move |res| {
        let _ = tx.send(res);
    });
    device.poll(wgpu::Maintain::Wait);
    rx.recv()
        .map_err(|_| OverlayError::Readback("map callback dropped".into()))?
        .map_err(|e| OverlayError::Readback(e.to_string()))
}

/// Copy the single texel at `(x, y)` into `buf` and read it back.
pub(crate) fn read_texel(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    mut encoder: wgpu::CommandEncoder,
    texture: &wgpu::Texture,
    (x, y): (u32, u32),
    buf: &wgpu::Buffer,
) -> Result<[u8; 4], OverlayError> {
    encoder.copy_texture_to_buffer(
        wgpu::ImageCopyTexture {
            texture,
            mip_level: 0,
            origin: wgpu::Origin3d { x, y, z: 0 },
            aspect: wgpu::TextureAspect::All,
        },
        wgpu::ImageCopyBuffer {
            buffer: buf,
            layout: wgpu::ImageDataLayout {
                offset: 0,
                // Single-row copy: no row padding involved.
                bytes_per_row: None,
                rows_per_image: None,
            },
        },
        wgpu::Extent3d {
            width: 1,
            height: 1,
            depth_or_array_layers: 1,
        },
    );
    queue.submit(std::iter::once(encoder.finish()));

    let slice = buf.slice(..);
    map_blocking(device, slice)?;
    let texel = {
        let data = slice.get_mapped_range();
        [data[0], data[1], data[2], data[3]]
    };
    buf.unmap();
    Ok(texel)
}

/// Full-frame readback: copy with 256-byte-aligned rows, then unpad into
/// tightly packed RGBA. Rows come back top-down on this backend, which is
/// already the order consumers expect. `swizzle_bgra` flips the byte order
/// of B8G8R8A8-family targets back to RGBA.
pub(crate) fn read_frame(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    mut encoder: wgpu::CommandEncoder,
    texture: &wgpu::Texture,
    (width, height): (u32, u32),
    buf: &wgpu::Buffer,
    swizzle_bgra: bool,
) -> Result<Vec<u8>, OverlayError> {
    let row_bytes = width * 4;
    let padded = align256(row_bytes);

    encoder.copy_texture_to_buffer(
        wgpu::ImageCopyTexture {
            texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        wgpu::ImageCopyBuffer {
            buffer: buf,
            layout: wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(padded),
                rows_per_image: Some(height),
            },
        },
        wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
    );
    queue.submit(std::iter::once(encoder.finish()));

    let slice = buf.slice(..(padded as u64 * height as u64));
    map_blocking(device, slice)?;

    let mut out = vec![0u8; (row_bytes * height) as usize];
    {
        let data = slice.get_mapped_range();
        let (src_stride, dst_stride) = (padded as usize, row_bytes as usize);
        for y in 0..height as usize {
            let src = &data[y * src_stride..y * src_stride + dst_stride];
            out[y * dst_stride..(y + 1) * dst_stride].copy_from_slice(src);
        }
    }
    buf.unmap();

    if swizzle_bgra {
        for px in out.chunks_exact_mut(4) {
            px.swap(0, 2);
        }
    }
    Ok(out)
}

/// Decode one pick texel: the pass writes `index + 1` across RGB, so a raw
/// zero is the cleared background.
pub(crate) fn decode_pick_texel(texel: [u8; 4]) -> Option<u32> {
    let raw = texel[0] as u32 | (texel[1] as u32) << 8 | (texel[2] as u32) << 16;
    raw.checked_sub(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pick_texel_decoding() {
        assert_eq!(decode_pick_texel([0, 0, 0, 255]), None);
        assert_eq!(decode_pick_texel([1, 0, 0, 255]), Some(0));
        assert_eq!(decode_pick_texel([255, 0, 0, 255]), Some(254));
        // Byte carries across the channels.
        assert_eq!(decode_pick_texel([0, 1, 0, 255]), Some(255));
        assert_eq!(decode_pick_texel([2, 1, 0, 255]), Some(257));
        // Top of the 24-bit range.
        assert_eq!(decode_pick_texel([255, 255, 255, 255]), Some(16_777_214));
    }

    #[test]
    fn row_alignment() {
        assert_eq!(align256(1), 256);
        assert_eq!(align256(256), 256);
        assert_eq!(align256(257), 512);
        assert_eq!(align256(4000), 4096);
    }
}
