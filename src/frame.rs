use image::RgbaImage;

use crate::error::{ReelforgeError, ReelforgeResult};

/// One straight-alpha RGBA8 frame. Backgrounds are opaque; transparency only
/// enters through composited overlays.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FrameRGBA {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

impl FrameRGBA {
    pub fn solid(width: u32, height: u32, rgb: [u8; 3]) -> Self {
        let mut data = vec![255u8; (width as usize) * (height as usize) * 4];
        for px in data.chunks_exact_mut(4) {
            px[0] = rgb[0];
            px[1] = rgb[1];
            px[2] = rgb[2];
        }
        Self {
            width,
            height,
            data,
        }
    }

    pub fn from_rgba_image(img: &RgbaImage) -> Self {
        Self {
            width: img.width(),
            height: img.height(),
            data: img.as_raw().clone(),
        }
    }

    pub fn validate_len(&self) -> ReelforgeResult<()> {
        let expected = self.width as usize * self.height as usize * 4;
        if self.data.len() != expected {
            return Err(ReelforgeError::validation(
                "frame data size mismatch with width*height*4",
            ));
        }
        Ok(())
    }

    /// Copy `src` pixels into this frame starting from the same origin. Sizes
    /// must match; this is the per-frame background blit.
    pub fn copy_from(&mut self, src: &FrameRGBA) -> ReelforgeResult<()> {
        if self.width != src.width || self.height != src.height {
            return Err(ReelforgeError::validation(format!(
                "frame size mismatch: got {}x{}, expected {}x{}",
                src.width, src.height, self.width, self.height
            )));
        }
        self.data.copy_from_slice(&src.data);
        Ok(())
    }

    /// Alpha-blend a straight-alpha overlay at `(x, y)`. Out-of-bounds rows
    /// and columns are clipped.
    pub fn overlay(&mut self, overlay: &RgbaImage, x: i64, y: i64) {
        let (ow, oh) = overlay.dimensions();
        for oy in 0..oh {
            let dy = y + i64::from(oy);
            if dy < 0 || dy >= i64::from(self.height) {
                continue;
            }
            for ox in 0..ow {
                let dx = x + i64::from(ox);
                if dx < 0 || dx >= i64::from(self.width) {
                    continue;
                }
                let src = overlay.get_pixel(ox, oy).0;
                let a = u16::from(src[3]);
                if a == 0 {
                    continue;
                }
                let idx = (dy as usize * self.width as usize + dx as usize) * 4;
                if a == 255 {
                    self.data[idx] = src[0];
                    self.data[idx + 1] = src[1];
                    self.data[idx + 2] = src[2];
                    continue;
                }
                let inv = 255 - a;
                for c in 0..3 {
                    let d = u16::from(self.data[idx + c]);
                    let s = u16::from(src[c]);
                    self.data[idx + c] = (mul_div255(s, a) + mul_div255(d, inv)).min(255) as u8;
                }
            }
        }
    }

    /// Scale RGB toward black by `factor` in `[0, 1]`; alpha is untouched.
    /// Used for crossfade ramps at scene boundaries.
    pub fn scale_brightness(&mut self, factor: f32) {
        let f = factor.clamp(0.0, 1.0);
        if (f - 1.0).abs() < f32::EPSILON {
            return;
        }
        for px in self.data.chunks_exact_mut(4) {
            px[0] = (f32::from(px[0]) * f).round() as u8;
            px[1] = (f32::from(px[1]) * f).round() as u8;
            px[2] = (f32::from(px[2]) * f).round() as u8;
        }
    }
}

fn mul_div255(x: u16, y: u16) -> u16 {
    (((u32::from(x) * u32::from(y)) + 127) / 255) as u16
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn solid_frame_is_opaque() {
        let f = FrameRGBA::solid(2, 2, [10, 20, 30]);
        assert_eq!(f.data.len(), 16);
        assert_eq!(&f.data[0..4], &[10, 20, 30, 255]);
        assert!(f.validate_len().is_ok());
    }

    #[test]
    fn overlay_full_alpha_replaces_pixels() {
        let mut f = FrameRGBA::solid(2, 1, [0, 0, 0]);
        let mut img = RgbaImage::new(1, 1);
        img.put_pixel(0, 0, image::Rgba([255, 0, 0, 255]));
        f.overlay(&img, 1, 0);
        assert_eq!(&f.data[0..4], &[0, 0, 0, 255]);
        assert_eq!(&f.data[4..8], &[255, 0, 0, 255]);
    }

    #[test]
    fn overlay_half_alpha_blends() {
        let mut f = FrameRGBA::solid(1, 1, [0, 0, 0]);
        let mut img = RgbaImage::new(1, 1);
        img.put_pixel(0, 0, image::Rgba([255, 0, 0, 128]));
        f.overlay(&img, 0, 0);
        assert_eq!(f.data[0], 128);
        assert_eq!(f.data[1], 0);
        assert_eq!(f.data[3], 255);
    }

    #[test]
    fn overlay_clips_out_of_bounds() {
        let mut f = FrameRGBA::solid(2, 2, [0, 0, 0]);
        let mut img = RgbaImage::new(4, 4);
        for p in img.pixels_mut() {
            *p = image::Rgba([255, 255, 255, 255]);
        }
        f.overlay(&img, -2, -2);
        // Only the overlapping quadrant changed; nothing panicked.
        assert_eq!(&f.data[0..4], &[255, 255, 255, 255]);
    }

    #[test]
    fn brightness_zero_is_black() {
        let mut f = FrameRGBA::solid(1, 1, [200, 100, 50]);
        f.scale_brightness(0.0);
        assert_eq!(&f.data[0..4], &[0, 0, 0, 255]);
    }

    #[test]
    fn brightness_half_scales_rgb() {
        let mut f = FrameRGBA::solid(1, 1, [200, 100, 50]);
        f.scale_brightness(0.5);
        assert_eq!(&f.data[0..4], &[100, 50, 25, 255]);
    }
}
