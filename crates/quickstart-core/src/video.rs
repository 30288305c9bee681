//! Decoded video frames handed from the engine to host surfaces.

use crate::engine::RenderMode;
use crate::surfaces::SurfaceId;

/// Planar YUV 4:2:0 frame with per-plane strides.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct I420Frame {
    pub width: u32,
    pub height: u32,
    pub y: Vec<u8>,
    pub u: Vec<u8>,
    pub v: Vec<u8>,
    pub stride_y: u32,
    pub stride_u: u32,
    pub stride_v: u32,
}

impl I420Frame {
    /// Tightly packed frame (strides equal to plane widths).
    pub fn packed(width: u32, height: u32, y: Vec<u8>, u: Vec<u8>, v: Vec<u8>) -> Option<Self> {
        let chroma_w = width.div_ceil(2);
        let chroma_h = height.div_ceil(2) as usize;
        if y.len() < width as usize * height as usize
            || u.len() < chroma_w as usize * chroma_h
            || v.len() < chroma_w as usize * chroma_h
        {
            return None;
        }
        Some(Self {
            width,
            height,
            y,
            u,
            v,
            stride_y: width,
            stride_u: chroma_w,
            stride_v: chroma_w,
        })
    }

    /// Strides cover the plane widths and every plane holds all its rows.
    pub fn is_consistent(&self) -> bool {
        let chroma_w = self.width.div_ceil(2);
        let chroma_h = self.height.div_ceil(2) as usize;
        let plane_ok = |len: usize, stride: u32, w: u32, rows: usize| {
            stride >= w && (rows == 0 || len >= stride as usize * (rows - 1) + w as usize)
        };
        plane_ok(self.y.len(), self.stride_y, self.width, self.height as usize)
            && plane_ok(self.u.len(), self.stride_u, chroma_w, chroma_h)
            && plane_ok(self.v.len(), self.stride_v, chroma_w, chroma_h)
    }

    /// BT.601 full-range conversion to RGBA8888, alpha opaque. `None` for a
    /// frame that fails [`is_consistent`](Self::is_consistent).
    pub fn to_rgba(&self) -> Option<Vec<u8>> {
        if !self.is_consistent() {
            return None;
        }
        let w = self.width as usize;
        let h = self.height as usize;
        let (sy, su, sv) = (
            self.stride_y as usize,
            self.stride_u as usize,
            self.stride_v as usize,
        );
        let mut out = vec![0u8; w * h * 4];

        for row in 0..h {
            for col in 0..w {
                let y = self.y[row * sy + col] as f32;
                let u = self.u[(row / 2) * su + col / 2] as f32 - 128.0;
                let v = self.v[(row / 2) * sv + col / 2] as f32 - 128.0;

                let r = (y + 1.402 * v).clamp(0.0, 255.0) as u8;
                let g = (y - 0.344136 * u - 0.714136 * v).clamp(0.0, 255.0) as u8;
                let b = (y + 1.772 * u).clamp(0.0, 255.0) as u8;

                let idx = (row * w + col) * 4;
                out[idx] = r;
                out[idx + 1] = g;
                out[idx + 2] = b;
                out[idx + 3] = 255;
            }
        }
        Some(out)
    }
}

/// Receives decoded frames for a bound surface.
///
/// Called from engine worker threads, never from the UI thread. Scaling to
/// the surface according to `mode` is up to the implementation.
pub trait FrameRenderer: Send + Sync {
    fn render(&self, surface: SurfaceId, mode: RenderMode, frame: &I420Frame);
}
