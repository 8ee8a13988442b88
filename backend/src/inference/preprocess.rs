use std::io::Cursor;

use image::imageops::FilterType;
use image::ImageReader;
use ndarray::Array4;

/// Side length of the square input the models were trained on.
pub const INPUT_SIZE: u32 = 128;
pub const CHANNELS: usize = 3;

#[derive(Debug, thiserror::Error)]
pub enum PreprocessError {
    #[error("failed to read image: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to decode image: {0}")]
    Decode(#[from] image::ImageError),
    #[error("unexpected tensor shape: {0}")]
    Shape(#[from] ndarray::ShapeError),
}

/// Decodes an uploaded image into a `(1, 128, 128, 3)` tensor scaled to `[0, 1]`.
///
/// The image is stretched to the input size without preserving its aspect
/// ratio, matching how the training set was fed to the models.
pub fn preprocess(image: &[u8]) -> Result<Array4<f32>, PreprocessError> {
    let decoded = ImageReader::new(Cursor::new(image))
        .with_guessed_format()?
        .decode()?;

    let rgb = decoded.to_rgb8();
    let resized = image::imageops::resize(&rgb, INPUT_SIZE, INPUT_SIZE, FilterType::Triangle);

    let side = INPUT_SIZE as usize;
    let pixels: Vec<f32> = resized
        .into_raw()
        .into_iter()
        .map(|value| f32::from(value) / 255.0)
        .collect();

    Ok(Array4::from_shape_vec((1, side, side, CHANNELS), pixels)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, GrayImage, ImageFormat, Luma, Rgb, RgbImage, Rgba, RgbaImage};

    fn encode(image: DynamicImage, format: ImageFormat) -> Vec<u8> {
        let mut buffer = Cursor::new(Vec::new());
        image.write_to(&mut buffer, format).unwrap();
        buffer.into_inner()
    }

    fn assert_valid_tensor(tensor: &Array4<f32>) {
        assert_eq!(tensor.shape(), &[1usize, 128, 128, 3]);
        assert!(tensor.iter().all(|v| (0.0..=1.0).contains(v)));
    }

    #[test]
    fn rgb_png_of_any_size_is_stretched() {
        let image = RgbImage::from_fn(300, 41, |x, y| Rgb([(x % 256) as u8, (y * 6) as u8, 90]));
        let bytes = encode(DynamicImage::ImageRgb8(image), ImageFormat::Png);

        let tensor = preprocess(&bytes).unwrap();
        assert_valid_tensor(&tensor);
    }

    #[test]
    fn grayscale_is_replicated_across_channels() {
        let image = GrayImage::from_pixel(64, 200, Luma([51]));
        let bytes = encode(DynamicImage::ImageLuma8(image), ImageFormat::Png);

        let tensor = preprocess(&bytes).unwrap();
        assert_valid_tensor(&tensor);
        for channel in 0..3 {
            assert!((tensor[[0, 10, 20, channel]] - 0.2).abs() < 1e-6);
        }
    }

    #[test]
    fn alpha_channel_is_dropped() {
        let image = RgbaImage::from_pixel(16, 16, Rgba([255, 0, 0, 10]));
        let bytes = encode(DynamicImage::ImageRgba8(image), ImageFormat::Png);

        let tensor = preprocess(&bytes).unwrap();
        assert_valid_tensor(&tensor);
        assert_eq!(tensor[[0, 64, 64, 0]], 1.0);
        assert_eq!(tensor[[0, 64, 64, 1]], 0.0);
        assert_eq!(tensor[[0, 64, 64, 2]], 0.0);
    }

    #[test]
    fn jpeg_is_accepted() {
        let image = RgbImage::from_pixel(500, 375, Rgb([200, 200, 200]));
        let bytes = encode(DynamicImage::ImageRgb8(image), ImageFormat::Jpeg);

        let tensor = preprocess(&bytes).unwrap();
        assert_valid_tensor(&tensor);
    }

    #[test]
    fn white_image_maps_to_one() {
        let image = RgbImage::from_pixel(128, 128, Rgb([255, 255, 255]));
        let bytes = encode(DynamicImage::ImageRgb8(image), ImageFormat::Png);

        let tensor = preprocess(&bytes).unwrap();
        assert!(tensor.iter().all(|v| *v == 1.0));
    }

    #[test]
    fn garbage_bytes_fail_to_decode() {
        let err = preprocess(b"definitely not an image").unwrap_err();
        assert!(matches!(err, PreprocessError::Decode(_)));

        assert!(preprocess(&[]).is_err());
    }

    #[test]
    fn same_bytes_give_same_tensor() {
        let image = RgbImage::from_fn(77, 33, |x, y| Rgb([x as u8, y as u8, (x ^ y) as u8]));
        let bytes = encode(DynamicImage::ImageRgb8(image), ImageFormat::Png);

        assert_eq!(preprocess(&bytes).unwrap(), preprocess(&bytes).unwrap());
    }
}
