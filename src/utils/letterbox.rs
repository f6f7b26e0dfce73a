// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

/// Letterbox 预处理
///
/// 等比缩放 + 灰色填充 (114), 输出 NCHW 平面 f32 张量,
/// 并记录将检测框还原到原图所需的 scale 与 padding。
use image::{imageops::FilterType, DynamicImage, GenericImageView, Rgb, RgbImage};
use ndarray::{Array, Array4};
use rayon::prelude::*;

use crate::error::{Result, YoloError};

/// Letterbox 填充色 (YOLO 约定)
pub const LETTERBOX_FILL: u8 = 114;

/// ImageNet 均值/方差
pub const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
pub const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];

/// 张量通道顺序
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChannelOrder {
    #[default]
    Rgb,
    Bgr,
}

impl ChannelOrder {
    /// 张量第 c 个通道对应的像素分量下标
    fn source_index(&self, c: usize) -> usize {
        match self {
            ChannelOrder::Rgb => c,
            ChannelOrder::Bgr => 2 - c,
        }
    }
}

/// 像素归一化方式
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Normalization {
    /// v / 255
    #[default]
    UnitRange,
    /// (v / 255 - mean) / std, 按张量通道顺序给出
    MeanStd { mean: [f32; 3], std: [f32; 3] },
}

impl Normalization {
    pub fn imagenet() -> Self {
        Normalization::MeanStd {
            mean: IMAGENET_MEAN,
            std: IMAGENET_STD,
        }
    }

    #[inline]
    fn apply(&self, channel: usize, value: u8) -> f32 {
        let v = value as f32 / 255.0;
        match self {
            Normalization::UnitRange => v,
            Normalization::MeanStd { mean, std } => (v - mean[channel]) / std[channel],
        }
    }
}

/// 预处理结果
#[derive(Debug, Clone)]
pub struct PreprocessResult {
    /// [1, 3, H, W]
    pub tensor: Array4<f32>,
    /// 原图 → 模型输入的缩放系数
    pub scale: f32,
    pub pad_left: f32,
    pub pad_top: f32,
    /// 原图尺寸 (w, h)
    pub original_size: (u32, u32),
    /// 缩放后 (未填充) 的尺寸 (w, h)
    pub resized_size: (u32, u32),
}

impl PreprocessResult {
    /// 模型输入坐标 → 原图坐标 (letterbox 逆变换)
    pub fn unletterbox(&self, x: f32, y: f32) -> (f32, f32) {
        ((x - self.pad_left) / self.scale, (y - self.pad_top) / self.scale)
    }
}

/// 等比缩放系数与缩放后尺寸, 尺寸至少为 1 且不超过目标
pub fn scale_wh(w0: u32, h0: u32, w1: u32, h1: u32) -> (f32, u32, u32) {
    let r = (w1 as f32 / w0 as f32).min(h1 as f32 / h0 as f32);
    let w = ((w0 as f32 * r).round() as u32).clamp(1, w1);
    let h = ((h0 as f32 * r).round() as u32).clamp(1, h1);
    (r, w, h)
}

fn ensure_sizes(image: &DynamicImage, width: u32, height: u32) -> Result<(u32, u32)> {
    if width == 0 || height == 0 {
        return Err(YoloError::Preprocess(format!(
            "model input size must be non-zero, got {width}x{height}"
        )));
    }
    let (w0, h0) = image.dimensions();
    if w0 == 0 || h0 == 0 {
        return Err(YoloError::Preprocess(format!(
            "image size must be non-zero, got {w0}x{h0}"
        )));
    }
    Ok((w0, h0))
}

/// 检测模型预处理: letterbox 到 (width, height), 归一化到 [0, 1]
pub fn letterbox(
    image: &DynamicImage,
    width: u32,
    height: u32,
    order: ChannelOrder,
) -> Result<PreprocessResult> {
    let (w0, h0) = ensure_sizes(image, width, height)?;
    let (scale, w_new, h_new) = scale_wh(w0, h0, width, height);

    let resized = if (w_new, h_new) == (w0, h0) {
        image.to_rgb8()
    } else {
        image
            .resize_exact(w_new, h_new, FilterType::Triangle)
            .to_rgb8()
    };

    let pad_left = (width - w_new) / 2;
    let pad_top = (height - h_new) / 2;
    let mut canvas = RgbImage::from_pixel(width, height, Rgb([LETTERBOX_FILL; 3]));
    image::imageops::replace(&mut canvas, &resized, pad_left as i64, pad_top as i64);

    let tensor = to_planar(&canvas, order, Normalization::UnitRange)?;

    Ok(PreprocessResult {
        tensor,
        scale,
        pad_left: pad_left as f32,
        pad_top: pad_top as f32,
        original_size: (w0, h0),
        resized_size: (w_new, h_new),
    })
}

/// 分类模型预处理: 直接拉伸到 (width, height), 按 `norm` 归一化
pub fn stretch(
    image: &DynamicImage,
    width: u32,
    height: u32,
    order: ChannelOrder,
    norm: Normalization,
) -> Result<PreprocessResult> {
    let (w0, h0) = ensure_sizes(image, width, height)?;
    let resized = image
        .resize_exact(width, height, FilterType::Triangle)
        .to_rgb8();
    let tensor = to_planar(&resized, order, norm)?;

    Ok(PreprocessResult {
        tensor,
        scale: (width as f32 / w0 as f32).min(height as f32 / h0 as f32),
        pad_left: 0.,
        pad_top: 0.,
        original_size: (w0, h0),
        resized_size: (width, height),
    })
}

/// HWC u8 → [1, 3, H, W] f32, 按行并行
fn to_planar(img: &RgbImage, order: ChannelOrder, norm: Normalization) -> Result<Array4<f32>> {
    let (w, h) = (img.width() as usize, img.height() as usize);
    let plane = w * h;
    let mut data = vec![0f32; 3 * plane];
    let src = img.as_raw();

    let (c0, rest) = data.split_at_mut(plane);
    let (c1, c2) = rest.split_at_mut(plane);
    c0.par_chunks_mut(w)
        .zip(c1.par_chunks_mut(w))
        .zip(c2.par_chunks_mut(w))
        .enumerate()
        .for_each(|(y, ((r0, r1), r2))| {
            let row = &src[y * w * 3..(y + 1) * w * 3];
            for (x, px) in row.chunks_exact(3).enumerate() {
                r0[x] = norm.apply(0, px[order.source_index(0)]);
                r1[x] = norm.apply(1, px[order.source_index(1)]);
                r2[x] = norm.apply(2, px[order.source_index(2)]);
            }
        });

    Array::from_shape_vec((1, 3, h, w), data).map_err(|e| YoloError::Preprocess(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::ImageBuffer;
    use ndarray::s;

    fn solid(w: u32, h: u32, px: [u8; 3]) -> DynamicImage {
        DynamicImage::ImageRgb8(ImageBuffer::from_pixel(w, h, Rgb(px)))
    }

    #[test]
    fn letterbox_preserves_aspect_ratio() {
        for (w0, h0) in [(1280, 720), (300, 900), (640, 640), (17, 5)] {
            let out = letterbox(&solid(w0, h0, [0, 0, 0]), 640, 640, ChannelOrder::Rgb).unwrap();
            let (w, h) = out.resized_size;
            assert!(w <= 640 && h <= 640);
            let ratio0 = w0 as f32 / h0 as f32;
            let ratio1 = w as f32 / h as f32;
            // 取整误差不超过一个像素
            assert!((ratio0 - ratio1).abs() <= ratio0 / h.min(w) as f32 + 1e-3);
        }
    }

    #[test]
    fn letterbox_pads_with_gray_and_centers() {
        let out = letterbox(&solid(200, 100, [255, 0, 0]), 100, 100, ChannelOrder::Rgb).unwrap();
        assert_eq!(out.tensor.shape(), &[1, 3, 100, 100]);
        assert_eq!(out.scale, 0.5);
        assert_eq!(out.resized_size, (100, 50));
        assert_eq!((out.pad_left, out.pad_top), (0., 25.));

        let gray = LETTERBOX_FILL as f32 / 255.0;
        // 顶部填充区
        assert_eq!(out.tensor[[0, 0, 0, 50]], gray);
        assert_eq!(out.tensor[[0, 2, 99, 50]], gray);
        // 图像区
        assert_eq!(out.tensor[[0, 0, 50, 50]], 1.0);
        assert_eq!(out.tensor[[0, 1, 50, 50]], 0.0);
    }

    #[test]
    fn letterbox_is_deterministic() {
        let mut img = RgbImage::new(37, 23);
        for (x, y, p) in img.enumerate_pixels_mut() {
            *p = Rgb([(x * 7) as u8, (y * 11) as u8, (x + y) as u8]);
        }
        let img = DynamicImage::ImageRgb8(img);
        let a = letterbox(&img, 64, 48, ChannelOrder::Rgb).unwrap();
        let b = letterbox(&img, 64, 48, ChannelOrder::Rgb).unwrap();
        assert_eq!(a.tensor, b.tensor);
        assert_eq!((a.scale, a.pad_left, a.pad_top), (b.scale, b.pad_left, b.pad_top));
    }

    #[test]
    fn values_are_unit_range() {
        let out = letterbox(&solid(10, 30, [12, 200, 255]), 32, 32, ChannelOrder::Rgb).unwrap();
        assert!(out.tensor.iter().all(|v| (0.0..=1.0).contains(v)));
    }

    #[test]
    fn bgr_order_swaps_planes() {
        let img = solid(4, 4, [255, 0, 10]);
        let rgb = letterbox(&img, 4, 4, ChannelOrder::Rgb).unwrap();
        let bgr = letterbox(&img, 4, 4, ChannelOrder::Bgr).unwrap();
        assert_eq!(
            rgb.tensor.slice(s![0, 0, .., ..]),
            bgr.tensor.slice(s![0, 2, .., ..])
        );
        assert_eq!(bgr.tensor[[0, 0, 0, 0]], 10.0 / 255.0);
    }

    #[test]
    fn unletterbox_inverts_transform() {
        let out = letterbox(&solid(200, 100, [0, 0, 0]), 100, 100, ChannelOrder::Rgb).unwrap();
        // 原图 (100, 50) → 输入 (50, 50)
        assert_eq!(out.unletterbox(50., 50.), (100., 50.));
    }

    #[test]
    fn stretch_applies_mean_std() {
        let out = stretch(
            &solid(8, 3, [255, 255, 255]),
            4,
            4,
            ChannelOrder::Rgb,
            Normalization::imagenet(),
        )
        .unwrap();
        assert_eq!(out.tensor.shape(), &[1, 3, 4, 4]);
        let expected = (1.0 - IMAGENET_MEAN[0]) / IMAGENET_STD[0];
        assert!((out.tensor[[0, 0, 1, 1]] - expected).abs() < 1e-6);
    }

    #[test]
    fn zero_sized_inputs_are_rejected() {
        let img = solid(4, 4, [0, 0, 0]);
        assert!(matches!(
            letterbox(&img, 0, 4, ChannelOrder::Rgb),
            Err(YoloError::Preprocess(_))
        ));
        let empty = DynamicImage::ImageRgb8(RgbImage::new(0, 0));
        assert!(letterbox(&empty, 4, 4, ChannelOrder::Rgb).is_err());
    }
}
