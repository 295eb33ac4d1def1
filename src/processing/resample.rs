use fast_image_resize as fir;
use image::RgbaImage;

use crate::config::ResampleFilter;
use crate::error::ResampleError;
use crate::events::DisplayImage;

/// Resize `source` to exactly `target_w`x`target_h` with a convolution filter.
pub fn resize_rgba(
    source: &RgbaImage,
    target_w: u32,
    target_h: u32,
    filter: ResampleFilter,
) -> Result<RgbaImage, ResampleError> {
    if target_w == 0 || target_h == 0 {
        return Err(ResampleError::DegenerateSize {
            width: target_w,
            height: target_h,
        });
    }
    if source.width() == target_w && source.height() == target_h {
        return Ok(source.clone());
    }

    let src_view = fir::images::ImageRef::new(
        source.width(),
        source.height(),
        source.as_raw(),
        fir::PixelType::U8x4,
    )
    .map_err(|err| ResampleError::Resize(format!("invalid source buffer: {err}")))?;
    let mut dst_image = fir::images::Image::new(target_w, target_h, fir::PixelType::U8x4);
    let options =
        fir::ResizeOptions::new().resize_alg(fir::ResizeAlg::Convolution(filter.to_fir()));
    let mut resizer = fir::Resizer::new();
    resizer
        .resize(&src_view, &mut dst_image, Some(&options))
        .map_err(|err| ResampleError::Resize(err.to_string()))?;
    let buffer = dst_image.into_vec();
    RgbaImage::from_raw(target_w, target_h, buffer)
        .ok_or_else(|| ResampleError::Resize("resized buffer has the wrong length".into()))
}

/// Convert a resized RGBA8 buffer into the display surface's image type.
pub fn to_display(image: &RgbaImage) -> Result<DisplayImage, ResampleError> {
    let (width, height) = image.dimensions();
    let expected = width as usize * height as usize * 4;
    if image.as_raw().len() != expected {
        return Err(ResampleError::Conversion(format!(
            "expected {expected} bytes for {width}x{height}, found {}",
            image.as_raw().len()
        )));
    }
    Ok(DisplayImage::from_rgba_unmultiplied(
        [width as usize, height as usize],
        image.as_raw(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn resizes_to_exact_dimensions() {
        let src = RgbaImage::from_pixel(40, 20, Rgba([10, 20, 30, 255]));
        let up = resize_rgba(&src, 100, 50, ResampleFilter::Lanczos3).unwrap();
        assert_eq!(up.dimensions(), (100, 50));
        let down = resize_rgba(&src, 3, 1, ResampleFilter::CatmullRom).unwrap();
        assert_eq!(down.dimensions(), (3, 1));
        // flat colour survives a smooth filter, give or take rounding
        let px = down.get_pixel(1, 0).0;
        for (got, want) in px.iter().zip([10u8, 20, 30, 255]) {
            assert!(got.abs_diff(want) <= 1, "{px:?}");
        }
    }

    #[test]
    fn zero_target_is_rejected() {
        let src = RgbaImage::new(4, 4);
        assert!(matches!(
            resize_rgba(&src, 0, 4, ResampleFilter::Lanczos3),
            Err(ResampleError::DegenerateSize { width: 0, height: 4 })
        ));
    }

    #[test]
    fn display_image_keeps_size() {
        let src = RgbaImage::from_pixel(7, 3, Rgba([255, 0, 0, 255]));
        let shown = to_display(&src).unwrap();
        assert_eq!(shown.size, [7, 3]);
        assert_eq!(shown.pixels.len(), 21);
    }
}
