// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

/// 检测结果绘制 (Annotation renderer)
///
/// 每个检测框: 2 像素边框 (按类别取色), 标签底色块, 以及 `名称: 置信度` 文本 (需提供字体)
use std::path::Path;

use ab_glyph::{FontArc, PxScale};
use anyhow::{Context, Result};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut, text_size};
use imageproc::rect::Rect;

use crate::Detection;

/// 类别调色板
pub const BRIGHT_COLORS: [(u8, u8, u8); 12] = [
    (255, 0, 0),     // 红色
    (0, 255, 0),     // 绿色
    (0, 0, 255),     // 蓝色
    (255, 255, 0),   // 黄色
    (255, 0, 255),   // 品红
    (0, 255, 255),   // 青色
    (255, 128, 0),   // 橙色
    (255, 0, 128),   // 粉红
    (128, 255, 0),   // 黄绿
    (0, 128, 255),   // 天蓝
    (255, 255, 255), // 白色
    (128, 0, 255),   // 紫色
];

const LABEL_FONT_SIZE: f32 = 16.0;
const LABEL_HEIGHT: u32 = 20;
const LABEL_PADDING: i32 = 2;

pub fn class_color(class_id: usize) -> Rgb<u8> {
    let (r, g, b) = BRIGHT_COLORS[class_id % BRIGHT_COLORS.len()];
    Rgb([r, g, b])
}

pub fn load_font<P: AsRef<Path>>(path: P) -> Result<FontArc> {
    let path = path.as_ref();
    let data =
        std::fs::read(path).with_context(|| format!("failed to read font {}", path.display()))?;
    FontArc::try_from_vec(data).with_context(|| format!("invalid font file {}", path.display()))
}

/// 在图像上就地绘制检测结果
pub fn draw_on(image: &mut RgbImage, detections: &[Detection], font: Option<&FontArc>) {
    let (w, h) = (image.width() as i32, image.height() as i32);
    let scale = PxScale::from(LABEL_FONT_SIZE);

    for d in detections {
        let color = class_color(d.class_id());
        let x = d.x().round() as i32;
        let y = d.y().round() as i32;
        let width = d.width().round() as u32;
        let height = d.height().round() as u32;
        if width == 0 || height == 0 {
            continue;
        }

        draw_hollow_rect_mut(image, Rect::at(x, y).of_size(width, height), color);
        if width > 2 && height > 2 {
            draw_hollow_rect_mut(image, Rect::at(x + 1, y + 1).of_size(width - 2, height - 2), color);
        }

        let label = format!("{}: {:.2}", d.class_name(), d.confidence());
        let text_width = match font {
            Some(font) => text_size(scale, font, &label).0 + 2 * LABEL_PADDING as u32,
            None => (label.len() as u32) * 8,
        };
        // 标签放在框上方, 空间不足时放进框内
        let label_y = if y >= LABEL_HEIGHT as i32 { y - LABEL_HEIGHT as i32 } else { y };
        let label_w = text_width.min((w - x).max(0) as u32);
        let label_h = LABEL_HEIGHT.min((h - label_y).max(0) as u32);
        if label_w == 0 || label_h == 0 {
            continue;
        }
        draw_filled_rect_mut(image, Rect::at(x, label_y).of_size(label_w, label_h), color);

        if let Some(font) = font {
            draw_text_mut(
                image,
                Rgb([0, 0, 0]),
                x + LABEL_PADDING,
                label_y + LABEL_PADDING,
                scale,
                font,
                &label,
            );
        }
    }
}

/// 读取原图, 绘制检测结果并保存到 `output_path`, 自动创建输出目录
pub fn draw_detections<P: AsRef<Path>, Q: AsRef<Path>>(
    image_path: P,
    detections: &[Detection],
    output_path: Q,
    font: Option<&FontArc>,
) -> Result<()> {
    let (image_path, output_path) = (image_path.as_ref(), output_path.as_ref());
    let mut image = image::open(image_path)
        .with_context(|| format!("failed to open {}", image_path.display()))?
        .to_rgb8();

    draw_on(&mut image, detections, font);

    if let Some(dir) = output_path.parent() {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create {}", dir.display()))?;
    }
    image
        .save(output_path)
        .with_context(|| format!("failed to save {}", output_path.display()))?;
    Ok(())
}
