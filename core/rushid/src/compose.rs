use std::path::Path;

use fast_image_resize as fr;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::{DynamicImage, ImageBuffer, ImageEncoder, Pixel, RgbImage, RgbaImage};
use serde::{Deserialize, Serialize};

use crate::error::RushIdError;
use crate::geometry::CropBox;

/// Encoded output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Baseline JPEG at the configured quality.
    #[default]
    Jpeg,
    /// Lossless PNG; required to keep an alpha channel.
    Png,
}

impl OutputFormat {
    /// `.png` destinations get PNG; everything else is written as JPEG.
    pub fn from_path(path: &Path) -> Self {
        match path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase())
            .as_deref()
        {
            Some("png") => OutputFormat::Png,
            _ => OutputFormat::Jpeg,
        }
    }

    /// Conventional file extension, without the dot.
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Jpeg => "jpg",
            OutputFormat::Png => "png",
        }
    }
}

/// Decode input bytes into a `DynamicImage`.
pub(crate) fn decode_image(input: &[u8]) -> Result<DynamicImage, RushIdError> {
    let image =
        image::load_from_memory(input).map_err(|e| RushIdError::InputReadError(e.to_string()))?;
    if image.width() == 0 || image.height() == 0 {
        return Err(RushIdError::ZeroDimensions);
    }
    Ok(image)
}

/// Flatten alpha channel by compositing onto a white background.
pub(crate) fn flatten_alpha(image: &DynamicImage) -> RgbImage {
    let rgba: RgbaImage = image.to_rgba8();
    let (width, height) = (rgba.width(), rgba.height());
    let mut rgb = RgbImage::new(width, height);

    for (x, y, pixel) in rgba.enumerate_pixels() {
        let [r, g, b, a] = pixel.0;
        let alpha = a as f32 / 255.0;
        let inv_alpha = 1.0 - alpha;
        let over_white = |c: u8| (c as f32 * alpha + 255.0 * inv_alpha).round() as u8;
        rgb.put_pixel(x, y, image::Rgb([over_white(r), over_white(g), over_white(b)]));
    }

    rgb
}

/// Resize with a box filter, which averages every covered source pixel when
/// downsizing. Same-size input is returned pixel-identical.
pub(crate) fn resize_area<P>(
    image: &ImageBuffer<P, Vec<u8>>,
    width: u32,
    height: u32,
) -> Result<ImageBuffer<P, Vec<u8>>, RushIdError>
where
    P: Pixel<Subpixel = u8>,
{
    let pixel_type = match P::CHANNEL_COUNT {
        3 => fr::PixelType::U8x3,
        4 => fr::PixelType::U8x4,
        n => return Err(RushIdError::ResizeError(format!("unsupported {n}-channel image"))),
    };

    let src = fr::images::ImageRef::new(image.width(), image.height(), image.as_raw(), pixel_type)
        .map_err(|e| RushIdError::ResizeError(e.to_string()))?;
    let mut dst = fr::images::Image::new(width, height, pixel_type);
    let options =
        fr::ResizeOptions::new().resize_alg(fr::ResizeAlg::Convolution(fr::FilterType::Box));
    let mut resizer = fr::Resizer::new();
    resizer
        .resize(&src, &mut dst, Some(&options))
        .map_err(|e| RushIdError::ResizeError(e.to_string()))?;

    ImageBuffer::from_raw(width, height, dst.buffer().to_vec()).ok_or_else(|| {
        RushIdError::ResizeError(format!("resized buffer does not match {width}x{height}"))
    })
}

/// Crop, composite and resize to a `size × size` image.
///
/// With `preserve_alpha` and a source that has alpha the result is RGBA;
/// otherwise alpha is composited over white and the result is RGB.
pub(crate) fn render(
    image: &DynamicImage,
    crop: &CropBox,
    size: u32,
    preserve_alpha: bool,
) -> Result<DynamicImage, RushIdError> {
    let (x, y, width, height) = crop.region();
    let cropped = image.crop_imm(x, y, width, height);
    let has_alpha = cropped.color().has_alpha();
    log::debug!(
        "cropped {}x{} (alpha: {has_alpha}), resizing to {size}x{size}",
        cropped.width(),
        cropped.height()
    );

    if has_alpha && preserve_alpha {
        let rgba = cropped.to_rgba8();
        return Ok(DynamicImage::ImageRgba8(resize_area(&rgba, size, size)?));
    }

    let rgb = if has_alpha {
        flatten_alpha(&cropped)
    } else {
        cropped.to_rgb8()
    };
    Ok(DynamicImage::ImageRgb8(resize_area(&rgb, size, size)?))
}

/// Encode an image to the specified format at the given quality (0.0–1.0, JPEG only).
pub(crate) fn encode_image(
    image: &DynamicImage,
    format: OutputFormat,
    quality: f32,
) -> Result<Vec<u8>, RushIdError> {
    let mut buffer = Vec::new();
    let color_type = image.color().into();

    match format {
        OutputFormat::Jpeg => {
            let quality_percent = (quality * 100.0).round().clamp(1.0, 100.0) as u8;
            let encoder = JpegEncoder::new_with_quality(&mut buffer, quality_percent);
            encoder
                .write_image(image.as_bytes(), image.width(), image.height(), color_type)
                .map_err(|e| RushIdError::EncodeError(e.to_string()))?;
        }
        OutputFormat::Png => {
            let encoder = PngEncoder::new(&mut buffer);
            encoder
                .write_image(image.as_bytes(), image.width(), image.height(), color_type)
                .map_err(|e| RushIdError::EncodeError(e.to_string()))?;
        }
    }

    Ok(buffer)
}
