// SPDX-License-Identifier: GPL-3.0-only

//! CPU-side NV12 frames
//!
//! Used to feed still images through the NV12 conversion stage and as a
//! reference for its output. Coefficients are full-range BT.601, matching the
//! conversion shader.

use crate::gpu::{Dimensions, ExternalFrame};
use image::RgbaImage;

/// Tightly packed NV12 frame: a full-resolution Y plane followed by an
/// interleaved UV plane at half resolution (rounded up)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Nv12Image {
    size: Dimensions,
    y: Vec<u8>,
    uv: Vec<u8>,
}

impl Nv12Image {
    /// Convert an RGBA image, averaging chroma over each 2x2 block
    pub fn from_rgba(image: &RgbaImage) -> Self {
        let size = Dimensions::new(image.width(), image.height());
        let chroma = size.chroma();
        let width = size.width as usize;
        let height = size.height as usize;

        let mut y = vec![0u8; size.pixel_count()];
        for (x_idx, y_idx, pixel) in image.enumerate_pixels() {
            let [r, g, b, _] = pixel.0;
            y[y_idx as usize * width + x_idx as usize] = luma(r, g, b);
        }

        let mut uv = vec![0u8; chroma.pixel_count() * 2];
        for cy in 0..chroma.height as usize {
            for cx in 0..chroma.width as usize {
                let (mut r, mut g, mut b, mut count) = (0f32, 0f32, 0f32, 0f32);
                for (dx, dy) in [(0, 0), (1, 0), (0, 1), (1, 1)] {
                    let (px, py) = (cx * 2 + dx, cy * 2 + dy);
                    if px < width && py < height {
                        let [pr, pg, pb, _] = image.get_pixel(px as u32, py as u32).0;
                        r += pr as f32;
                        g += pg as f32;
                        b += pb as f32;
                        count += 1.0;
                    }
                }
                let (u, v) = chroma_of(r / count, g / count, b / count);
                let offset = (cy * chroma.width as usize + cx) * 2;
                uv[offset] = u;
                uv[offset + 1] = v;
            }
        }

        Self { size, y, uv }
    }

    pub fn size(&self) -> Dimensions {
        self.size
    }

    pub fn y_plane(&self) -> &[u8] {
        &self.y
    }

    pub fn uv_plane(&self) -> &[u8] {
        &self.uv
    }

    /// Borrow the planes for upload to an external texture
    pub fn as_frame(&self) -> ExternalFrame<'_> {
        ExternalFrame::Nv12 {
            y: &self.y,
            y_stride: self.size.width,
            uv: &self.uv,
            uv_stride: self.size.chroma().width * 2,
        }
    }

    /// Convert back to RGBA on the CPU
    pub fn to_rgba(&self) -> RgbaImage {
        let chroma_width = self.size.chroma().width as usize;
        RgbaImage::from_fn(self.size.width, self.size.height, |x, y| {
            let luma = self.y[y as usize * self.size.width as usize + x as usize];
            let offset = ((y as usize / 2) * chroma_width + x as usize / 2) * 2;
            let [r, g, b] = to_rgb(luma, self.uv[offset], self.uv[offset + 1]);
            image::Rgba([r, g, b, 255])
        })
    }
}

fn luma(r: u8, g: u8, b: u8) -> u8 {
    let y = 0.299 * r as f32 + 0.587 * g as f32 + 0.114 * b as f32;
    y.round().clamp(0.0, 255.0) as u8
}

fn chroma_of(r: f32, g: f32, b: f32) -> (u8, u8) {
    let u = -0.169 * r - 0.331 * g + 0.5 * b + 128.0;
    let v = 0.5 * r - 0.419 * g - 0.081 * b + 128.0;
    (
        u.round().clamp(0.0, 255.0) as u8,
        v.round().clamp(0.0, 255.0) as u8,
    )
}

fn to_rgb(y: u8, u: u8, v: u8) -> [u8; 3] {
    let y = y as f32;
    let u = u as f32 - 128.0;
    let v = v as f32 - 128.0;

    let r = y + 1.402 * v;
    let g = y - 0.344 * u - 0.714 * v;
    let b = y + 1.772 * u;

    [
        r.round().clamp(0.0, 255.0) as u8,
        g.round().clamp(0.0, 255.0) as u8,
        b.round().clamp(0.0, 255.0) as u8,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plane_sizes_round_up() {
        let image = RgbaImage::from_pixel(5, 3, image::Rgba([10, 20, 30, 255]));
        let nv12 = Nv12Image::from_rgba(&image);
        assert_eq!(nv12.y_plane().len(), 15);
        // 3x2 chroma samples, two bytes each
        assert_eq!(nv12.uv_plane().len(), 12);
    }

    #[test]
    fn test_gray_has_neutral_chroma() {
        let image = RgbaImage::from_pixel(4, 4, image::Rgba([128, 128, 128, 255]));
        let nv12 = Nv12Image::from_rgba(&image);
        assert!(nv12.y_plane().iter().all(|&y| y == 128));
        assert!(nv12.uv_plane().iter().all(|&c| c == 128));
    }

    #[test]
    fn test_solid_color_round_trip_is_close() {
        for color in [[200, 40, 40], [30, 160, 90], [20, 60, 220]] {
            let pixel = image::Rgba([color[0], color[1], color[2], 255]);
            let image = RgbaImage::from_pixel(4, 4, pixel);
            let restored = Nv12Image::from_rgba(&image).to_rgba();
            let [r, g, b, a] = restored.get_pixel(1, 1).0;
            assert_eq!(a, 255);
            for (restored, original) in [r, g, b].into_iter().zip(color) {
                assert!(
                    (restored as i32 - original as i32).abs() <= 3,
                    "{:?} restored as {:?}",
                    color,
                    [r, g, b]
                );
            }
        }
    }

    #[test]
    fn test_frame_strides() {
        let image = RgbaImage::new(6, 4);
        let nv12 = Nv12Image::from_rgba(&image);
        match nv12.as_frame() {
            ExternalFrame::Nv12 {
                y_stride, uv_stride, ..
            } => {
                assert_eq!(y_stride, 6);
                assert_eq!(uv_stride, 6);
            }
            other => panic!("unexpected frame {:?}", other),
        }
    }
}
