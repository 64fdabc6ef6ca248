//! 基于颜色直方图和缩略图的图片特征

use std::io::Cursor;

use anyhow::{Result, ensure};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::{self, FilterType};
use image::{DynamicImage, ImageReader, RgbImage, Rgba, RgbaImage};

use crate::ingest::{Extraction, FeatureExtractor};

/// 画布边长
pub const CANVAS_SIZE: u32 = 224;
/// 每个颜色通道的量化级数
const LEVELS: u32 = 4;
/// 灰度缩略图边长
const THUMBNAIL_SIZE: u32 = 8;
/// 特征向量维数
pub const DIMENSION: usize = (LEVELS * LEVELS * LEVELS + THUMBNAIL_SIZE * THUMBNAIL_SIZE) as usize;

/// 参考特征提取器
///
/// 图片按比例缩放后居中放入白色画布，重新编码为 JPEG 作为存储数据。
/// 特征向量由两部分组成：
/// - 64 维 RGB 联合直方图，每个通道量化为 4 级，归一化后和为 1
/// - 8x8 灰度缩略图，取值范围为 [0, 1]
#[derive(Debug, Clone)]
pub struct ImageExtractor {
    quality: u8,
}

impl Default for ImageExtractor {
    fn default() -> Self {
        Self { quality: 85 }
    }
}

impl ImageExtractor {
    pub fn new(quality: u8) -> Self {
        Self { quality: quality.clamp(1, 100) }
    }

    /// 将图片缩放到画布内，透明区域填充白色
    fn fit_canvas(image: &DynamicImage) -> RgbImage {
        let fitted = image.resize(CANVAS_SIZE, CANVAS_SIZE, FilterType::Triangle).to_rgba8();
        let mut canvas = RgbaImage::from_pixel(CANVAS_SIZE, CANVAS_SIZE, Rgba([255, 255, 255, 255]));
        let x = (CANVAS_SIZE - fitted.width()) / 2;
        let y = (CANVAS_SIZE - fitted.height()) / 2;
        imageops::overlay(&mut canvas, &fitted, x.into(), y.into());
        DynamicImage::ImageRgba8(canvas).to_rgb8()
    }

    fn features(canvas: &RgbImage) -> Vec<f32> {
        let mut vector = vec![0f32; DIMENSION];

        let shift = 8 - LEVELS.trailing_zeros();
        for pixel in canvas.pixels() {
            let [r, g, b] = pixel.0.map(|c| (c >> shift) as usize);
            let bin = (r * LEVELS as usize + g) * LEVELS as usize + b;
            vector[bin] += 1.;
        }
        let total = (canvas.width() * canvas.height()) as f32;
        let histogram_len = (LEVELS * LEVELS * LEVELS) as usize;
        vector[..histogram_len].iter_mut().for_each(|v| *v /= total);

        let gray = imageops::grayscale(canvas);
        let thumbnail = imageops::resize(&gray, THUMBNAIL_SIZE, THUMBNAIL_SIZE, FilterType::Triangle);
        for (v, pixel) in vector[histogram_len..].iter_mut().zip(thumbnail.pixels()) {
            *v = pixel.0[0] as f32 / 255.;
        }

        vector
    }
}

impl FeatureExtractor for ImageExtractor {
    fn extract(&self, bytes: &[u8]) -> Result<Extraction> {
        let image = ImageReader::new(Cursor::new(bytes)).with_guessed_format()?.decode()?;
        let (width, height) = (image.width(), image.height());
        ensure!(width > 0 && height > 0, "图片尺寸为 0");

        let canvas = Self::fit_canvas(&image);
        let vector = Self::features(&canvas);

        let mut image_data = vec![];
        canvas.write_with_encoder(JpegEncoder::new_with_quality(&mut image_data, self.quality))?;

        Ok(Extraction { width, height, vector, image_data })
    }
}
