//! Image decode, resize, model preprocessing and JPEG encode

use crate::autograd::Tensor;
use crate::nn::FeatureMap;
use crate::trace::{TraceStep, TRACER};
use image::codecs::jpeg::JpegEncoder;
use image::{Rgb, RgbImage};
use ndarray::Array3;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

/// JPEG quality used for adversarial examples
pub const JPEG_QUALITY: u8 = 95;

/// Per-channel BGR means subtracted in caffe-style preprocessing
pub const CAFFE_BGR_MEAN: [f32; 3] = [103.939, 116.779, 123.68];

/// Image errors
#[derive(Debug, thiserror::Error)]
pub enum ImageError {
    #[error("Failed to decode {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to encode {path}: {source}")]
    Encode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
}

/// How raw `[0, 255]` pixels are mapped to network input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreprocessMode {
    /// Scale to `[-1, 1]` (MobileNetV2)
    Tf,
    /// RGB → BGR and subtract the ImageNet channel means (ResNet50)
    Caffe,
}

/// Decode an image file to RGB8
pub fn load_rgb(path: &Path) -> Result<RgbImage, ImageError> {
    let decoded = image::open(path)
        .map_err(|source| ImageError::Decode { path: path.to_path_buf(), source })?;
    Ok(decoded.to_rgb8())
}

/// Bilinear resize to `height x width`, returning HWC floats in `[0, 255]`.
///
/// Uses half-pixel centers and no antialiasing, which is what
/// `tf.image.resize(..., method="bilinear")` does.
pub fn resize_bilinear(image: &RgbImage, height: usize, width: usize) -> Array3<f32> {
    let (in_w, in_h) = (image.width() as usize, image.height() as usize);
    let ys = interpolation_axis(in_h, height);
    let xs = interpolation_axis(in_w, width);

    let pixel = |x: usize, y: usize, c: usize| f32::from(image.get_pixel(x as u32, y as u32)[c]);

    Array3::from_shape_fn((height, width, 3), |(oy, ox, c)| {
        let (y0, y1, fy) = ys[oy];
        let (x0, x1, fx) = xs[ox];
        let top = pixel(x0, y0, c) + (pixel(x1, y0, c) - pixel(x0, y0, c)) * fx;
        let bottom = pixel(x0, y1, c) + (pixel(x1, y1, c) - pixel(x0, y1, c)) * fx;
        top + (bottom - top) * fy
    })
}

/// Source indices and blend weight for every output position on one axis
fn interpolation_axis(in_size: usize, out_size: usize) -> Vec<(usize, usize, f32)> {
    let scale = in_size as f32 / out_size as f32;
    let last = in_size.saturating_sub(1) as f32;
    (0..out_size)
        .map(|o| {
            let src = (o as f32 + 0.5) * scale - 0.5;
            let floor = src.floor();
            let lower = floor.max(0.0);
            let upper = src.ceil().min(last);
            (lower as usize, upper as usize, src - floor)
        })
        .collect()
}

/// Convert HWC `[0, 255]` floats to a CHW network input
pub fn preprocess(pixels: &Array3<f32>, mode: PreprocessMode) -> FeatureMap {
    let (height, width, channels) = pixels.dim();
    assert_eq!(channels, 3, "expected RGB input");

    TRACER.start(TraceStep::Preprocess);
    let mut chw = Vec::with_capacity(3 * height * width);
    for c in 0..3 {
        let plane = pixels.index_axis(ndarray::Axis(2), match mode {
            PreprocessMode::Tf => c,
            PreprocessMode::Caffe => 2 - c,
        });
        match mode {
            PreprocessMode::Tf => chw.extend(plane.iter().map(|v| v / 127.5 - 1.0)),
            PreprocessMode::Caffe => chw.extend(plane.iter().map(|v| v - CAFFE_BGR_MEAN[c])),
        }
    }
    TRACER.end(TraceStep::Preprocess, format!("{height}x{width} {mode:?}"));

    FeatureMap::new(Tensor::from_vec(chw, false), 3, height, width)
}

/// Decode, resize and preprocess in one step
pub fn load_input(path: &Path, size: usize, mode: PreprocessMode) -> Result<FeatureMap, ImageError> {
    let image = load_rgb(path)?;
    Ok(preprocess(&resize_bilinear(&image, size, size), mode))
}

/// Map a `[-1, 1]` CHW image back to RGB8
pub fn to_rgb8(image: &FeatureMap) -> RgbImage {
    assert_eq!(image.channels, 3, "expected RGB feature map");
    let plane = image.height * image.width;
    let data = image.tensor.as_slice();
    let to_byte = |v: f32| ((v * 0.5 + 0.5) * 255.0).round().clamp(0.0, 255.0) as u8;

    RgbImage::from_fn(image.width as u32, image.height as u32, |x, y| {
        let i = y as usize * image.width + x as usize;
        Rgb([to_byte(data[i]), to_byte(data[plane + i]), to_byte(data[2 * plane + i])])
    })
}

/// Write an RGB image as JPEG, creating parent directories as needed
pub fn save_jpeg(path: &Path, image: &RgbImage) -> Result<(), ImageError> {
    let write_err = |source| ImageError::Write { path: path.to_path_buf(), source };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(write_err)?;
    }
    let file = File::create(path).map_err(write_err)?;

    TRACER.span(TraceStep::Encode, path.display().to_string(), || {
        let mut writer = BufWriter::new(file);
        JpegEncoder::new_with_quality(&mut writer, JPEG_QUALITY)
            .encode_image(image)
            .map_err(|source| ImageError::Encode { path: path.to_path_buf(), source })
    })
}
