use image::{RgbaImage, imageops};

use crate::error::{ReelforgeError, ReelforgeResult};

/// Resolved scale-then-center-crop geometry for mapping a source onto a fixed
/// target frame without letterboxing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FitPlan {
    pub scale_w: u32,
    pub scale_h: u32,
    pub crop_x: u32,
    pub crop_y: u32,
}

/// Aspect ratios closer than this are treated as matching; a plain resize is
/// enough and no crop happens.
const ASPECT_EPSILON: f64 = 0.01;

pub fn plan_fit(src_w: u32, src_h: u32, dst_w: u32, dst_h: u32) -> ReelforgeResult<FitPlan> {
    if src_w == 0 || src_h == 0 || dst_w == 0 || dst_h == 0 {
        return Err(ReelforgeError::validation(
            "fit dimensions must be non-zero",
        ));
    }

    let src_aspect = f64::from(src_w) / f64::from(src_h);
    let dst_aspect = f64::from(dst_w) / f64::from(dst_h);

    if (src_aspect - dst_aspect).abs() < ASPECT_EPSILON {
        return Ok(FitPlan {
            scale_w: dst_w,
            scale_h: dst_h,
            crop_x: 0,
            crop_y: 0,
        });
    }

    if src_aspect > dst_aspect {
        // Source is wider: match height, crop horizontal excess from center.
        let scale = f64::from(dst_h) / f64::from(src_h);
        let scale_w = ((f64::from(src_w) * scale) as u32).max(dst_w);
        Ok(FitPlan {
            scale_w,
            scale_h: dst_h,
            crop_x: (scale_w - dst_w) / 2,
            crop_y: 0,
        })
    } else {
        // Source is narrower: match width, crop vertical excess from center.
        let scale = f64::from(dst_w) / f64::from(src_w);
        let scale_h = ((f64::from(src_h) * scale) as u32).max(dst_h);
        Ok(FitPlan {
            scale_w: dst_w,
            scale_h,
            crop_x: 0,
            crop_y: (scale_h - dst_h) / 2,
        })
    }
}

/// Scale and center-crop `img` onto a `dst_w` x `dst_h` canvas.
pub fn fit_rgba_image(img: &RgbaImage, dst_w: u32, dst_h: u32) -> ReelforgeResult<RgbaImage> {
    let plan = plan_fit(img.width(), img.height(), dst_w, dst_h)?;

    let resized = if img.width() == plan.scale_w && img.height() == plan.scale_h {
        img.clone()
    } else {
        imageops::resize(img, plan.scale_w, plan.scale_h, imageops::FilterType::Triangle)
    };

    if plan.crop_x == 0 && plan.crop_y == 0 && resized.width() == dst_w && resized.height() == dst_h
    {
        return Ok(resized);
    }

    Ok(imageops::crop_imm(&resized, plan.crop_x, plan.crop_y, dst_w, dst_h).to_image())
}

/// Fit a raw straight-RGBA buffer (one decoded video frame) onto the target
/// canvas.
pub fn fit_rgba_buffer(
    data: &[u8],
    src_w: u32,
    src_h: u32,
    dst_w: u32,
    dst_h: u32,
) -> ReelforgeResult<RgbaImage> {
    let img = RgbaImage::from_raw(src_w, src_h, data.to_vec()).ok_or_else(|| {
        ReelforgeError::validation("raw frame buffer does not match its dimensions")
    })?;
    fit_rgba_image(&img, dst_w, dst_h)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wider_source_matches_height_and_crops_width() {
        // 16:9 landscape onto 9:16 portrait.
        let plan = plan_fit(1920, 1080, 1080, 1920).unwrap();
        assert_eq!(plan.scale_h, 1920);
        assert!(plan.scale_w >= 1080);
        assert_eq!(plan.crop_y, 0);
        // Crop is centered.
        assert_eq!(plan.crop_x, (plan.scale_w - 1080) / 2);
    }

    #[test]
    fn narrower_source_matches_width_and_crops_height() {
        // Square onto portrait.
        let plan = plan_fit(1000, 1000, 1080, 1920).unwrap();
        assert_eq!(plan.scale_w, 1080);
        assert!(plan.scale_h >= 1920);
        assert_eq!(plan.crop_x, 0);
        assert_eq!(plan.crop_y, (plan.scale_h - 1920) / 2);
    }

    #[test]
    fn matching_aspect_only_resizes() {
        let plan = plan_fit(540, 960, 1080, 1920).unwrap();
        assert_eq!(
            plan,
            FitPlan {
                scale_w: 1080,
                scale_h: 1920,
                crop_x: 0,
                crop_y: 0
            }
        );
    }

    #[test]
    fn fit_output_has_target_dimensions() {
        let img = RgbaImage::from_pixel(64, 36, image::Rgba([9, 9, 9, 255]));
        let out = fit_rgba_image(&img, 18, 32).unwrap();
        assert_eq!(out.dimensions(), (18, 32));

        let img = RgbaImage::from_pixel(10, 100, image::Rgba([9, 9, 9, 255]));
        let out = fit_rgba_image(&img, 18, 32).unwrap();
        assert_eq!(out.dimensions(), (18, 32));
    }

    #[test]
    fn zero_dimension_is_rejected() {
        assert!(plan_fit(0, 10, 10, 10).is_err());
        assert!(plan_fit(10, 10, 0, 10).is_err());
    }

    #[test]
    fn raw_buffer_size_mismatch_is_rejected() {
        assert!(fit_rgba_buffer(&[0u8; 7], 2, 2, 4, 4).is_err());
    }
}
