use image::imageops::{self, FilterType};
use image::{DynamicImage, GrayImage, ImageReader, Limits, Luma};
use imageproc::filter::separable_filter_equal;
use std::io::Cursor;
use thiserror::Error;

use crate::config::{PreprocessConfig, ThresholdConfig};
use crate::denoise::non_local_means;

#[derive(Debug, Error)]
pub enum UnreadableImageError {
    #[error("Failed to decode image: {0}")]
    Decode(#[from] image::ImageError),
    #[error("Image has no pixels ({width}x{height})")]
    Empty { width: u32, height: u32 },
    #[error("Image is larger than {max}x{max} pixels")]
    TooLarge { max: u32 },
}

/// Decode raw image bytes (JPEG / PNG / GIF / …), rejecting zero-area images
/// and images with a side longer than `max_dimension`.
///
/// The size limit is enforced by the decoder from the header, before any
/// pixel buffer is allocated.
pub fn load_image(data: &[u8], max_dimension: u32) -> Result<DynamicImage, UnreadableImageError> {
    let mut limits = Limits::default();
    limits.max_image_width = Some(max_dimension);
    limits.max_image_height = Some(max_dimension);

    let mut reader = ImageReader::new(Cursor::new(data))
        .with_guessed_format()
        .map_err(image::ImageError::IoError)?;
    reader.limits(limits);

    let img = reader.decode().map_err(|e| match e {
        image::ImageError::Limits(_) => UnreadableImageError::TooLarge { max: max_dimension },
        other => UnreadableImageError::Decode(other),
    })?;
    ensure_readable(&img)?;
    ensure_within(&img, max_dimension)?;
    Ok(img)
}

pub(crate) fn ensure_readable(img: &DynamicImage) -> Result<(), UnreadableImageError> {
    if img.width() == 0 || img.height() == 0 {
        return Err(UnreadableImageError::Empty { width: img.width(), height: img.height() });
    }
    Ok(())
}

pub(crate) fn ensure_within(img: &DynamicImage, max_dimension: u32) -> Result<(), UnreadableImageError> {
    if img.width() > max_dimension || img.height() > max_dimension {
        return Err(UnreadableImageError::TooLarge { max: max_dimension });
    }
    Ok(())
}

/// Grayscale → upscale → denoise → adaptive threshold.
///
/// The output has only two levels, 0 and 255.
pub fn preprocess(img: &DynamicImage, config: &PreprocessConfig) -> Result<GrayImage, UnreadableImageError> {
    ensure_readable(img)?;
    ensure_within(img, config.max_dimension)?;

    let gray = img.to_luma8();

    // Small receipt fonts need the extra pixel density.
    let gray = if config.upscale_factor > 1 {
        let factor = config.upscale_factor;
        let (width, height) = gray
            .width()
            .checked_mul(factor)
            .zip(gray.height().checked_mul(factor))
            .ok_or(UnreadableImageError::TooLarge { max: config.max_dimension })?;
        imageops::resize(&gray, width, height, FilterType::CatmullRom)
    } else {
        gray
    };

    let denoised = non_local_means(&gray, &config.denoise);
    Ok(adaptive_threshold(&denoised, &config.threshold))
}

/// Binarize against a Gaussian-weighted local mean: white where the pixel is
/// brighter than `mean - offset`, black elsewhere.
pub fn adaptive_threshold(gray: &GrayImage, params: &ThresholdConfig) -> GrayImage {
    let kernel = gaussian_kernel(params.block_size);
    let local_mean: GrayImage = separable_filter_equal(gray, kernel.as_slice());

    GrayImage::from_fn(gray.width(), gray.height(), |x, y| {
        let p = gray.get_pixel(x, y)[0] as i32;
        let mean = local_mean.get_pixel(x, y)[0] as i32;
        Luma([if p > mean - params.offset { 255 } else { 0 }])
    })
}

/// Normalized Gaussian weights for an odd window, sigma derived from the
/// window size the way OpenCV's adaptive threshold does.
fn gaussian_kernel(size: u32) -> Vec<f32> {
    let sigma = 0.3 * ((size as f32 - 1.0) * 0.5 - 1.0) + 0.8;
    let center = (size / 2) as f32;
    let weights: Vec<f32> = (0..size)
        .map(|i| {
            let d = i as f32 - center;
            (-(d * d) / (2.0 * sigma * sigma)).exp()
        })
        .collect();
    let total: f32 = weights.iter().sum();
    weights.into_iter().map(|w| w / total).collect()
}

/// Encode a processed image as PNG, for OCR engines that take encoded bytes.
pub fn encode_as_png(img: &GrayImage) -> Result<Vec<u8>, image::ImageError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DenoiseConfig;
    use image::{ImageBuffer, RgbImage};

    fn fast_config() -> PreprocessConfig {
        PreprocessConfig {
            max_dimension: 64,
            upscale_factor: 2,
            denoise: DenoiseConfig { strength: 30.0, template_window: 3, search_window: 5 },
            threshold: ThresholdConfig::default(),
        }
    }

    fn png_bytes(img: DynamicImage) -> Vec<u8> {
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png).unwrap();
        buf
    }

    #[test]
    fn output_is_upscaled_and_two_level() {
        let img: RgbImage = ImageBuffer::from_fn(20, 12, |x, y| {
            let v = if (x / 3 + y / 3) % 2 == 0 { 30 } else { 220 };
            image::Rgb([v, v, v])
        });
        let out = preprocess(&DynamicImage::ImageRgb8(img), &fast_config()).unwrap();
        assert_eq!(out.dimensions(), (40, 24));
        assert!(out.pixels().all(|p| p[0] == 0 || p[0] == 255));
        assert!(out.pixels().any(|p| p[0] == 0));
        assert!(out.pixels().any(|p| p[0] == 255));
    }

    #[test]
    fn uniform_page_turns_white() {
        // No local contrast: every pixel beats its own mean minus the offset.
        let img = DynamicImage::ImageLuma8(GrayImage::from_pixel(10, 10, Luma([90])));
        let out = preprocess(&img, &fast_config()).unwrap();
        assert!(out.pixels().all(|p| p[0] == 255));
    }

    #[test]
    fn upscale_factor_one_keeps_size() {
        let config = PreprocessConfig { upscale_factor: 1, ..fast_config() };
        let img = DynamicImage::ImageLuma8(GrayImage::from_pixel(7, 5, Luma([10])));
        assert_eq!(preprocess(&img, &config).unwrap().dimensions(), (7, 5));
    }

    #[test]
    fn zero_sized_image_is_unreadable() {
        let img = DynamicImage::ImageLuma8(GrayImage::new(0, 4));
        let err = preprocess(&img, &fast_config()).unwrap_err();
        assert!(matches!(err, UnreadableImageError::Empty { width: 0, height: 4 }));
    }

    #[test]
    fn image_over_max_dimension_is_rejected() {
        let img = DynamicImage::ImageLuma8(GrayImage::from_pixel(65, 10, Luma([90])));
        let err = preprocess(&img, &fast_config()).unwrap_err();
        assert!(matches!(err, UnreadableImageError::TooLarge { max: 64 }));
    }

    #[test]
    fn upscale_overflow_is_an_error() {
        let config = PreprocessConfig { max_dimension: u32::MAX, upscale_factor: u32::MAX, ..fast_config() };
        let img = DynamicImage::ImageLuma8(GrayImage::from_pixel(3, 3, Luma([90])));
        assert!(matches!(preprocess(&img, &config), Err(UnreadableImageError::TooLarge { .. })));
    }

    #[test]
    fn dark_stroke_on_light_paper_stays_black() {
        let img = GrayImage::from_fn(30, 30, |x, _| Luma([if (14..16).contains(&x) { 20 } else { 230 }]));
        let out = adaptive_threshold(&img, &ThresholdConfig::default());
        assert_eq!(out.get_pixel(15, 15)[0], 0);
        assert_eq!(out.get_pixel(2, 15)[0], 255);
    }

    #[test]
    fn gaussian_kernel_is_normalized_and_symmetric() {
        let k = gaussian_kernel(11);
        assert_eq!(k.len(), 11);
        assert!((k.iter().sum::<f32>() - 1.0).abs() < 1e-5);
        assert!((k[0] - k[10]).abs() < 1e-7);
        assert!(k[5] > k[4] && k[4] > k[0]);
    }

    #[test]
    fn load_image_decodes_png() {
        let bytes = png_bytes(DynamicImage::ImageLuma8(GrayImage::from_pixel(4, 3, Luma([1]))));
        let img = load_image(&bytes, 4).unwrap();
        assert_eq!((img.width(), img.height()), (4, 3));
    }

    #[test]
    fn load_image_rejects_garbage() {
        let err = load_image(b"definitely not an image", 100).unwrap_err();
        assert!(matches!(err, UnreadableImageError::Decode(_)));
    }

    #[test]
    fn load_image_rejects_oversized_png() {
        // A flat page compresses to a tiny file whatever its pixel size.
        let bytes = png_bytes(DynamicImage::ImageLuma8(GrayImage::from_pixel(2000, 10, Luma([255]))));
        assert!(bytes.len() < 4096);
        let err = load_image(&bytes, 1000).unwrap_err();
        assert!(matches!(err, UnreadableImageError::TooLarge { max: 1000 }));

        let tall = png_bytes(DynamicImage::ImageLuma8(GrayImage::from_pixel(10, 1001, Luma([255]))));
        assert!(matches!(load_image(&tall, 1000), Err(UnreadableImageError::TooLarge { max: 1000 })));
    }

    #[test]
    fn encode_as_png_has_magic() {
        let bytes = encode_as_png(&GrayImage::from_pixel(2, 2, Luma([0]))).unwrap();
        assert_eq!(&bytes[..4], b"\x89PNG");
    }
}
