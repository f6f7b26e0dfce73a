// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

/// 图片输入 (Image input)
///
/// - 单个文件: 直接返回
/// - 目录: 只扫描第一层, 按扩展名过滤, 按文件名排序
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};

/// 支持的图片扩展名 (不区分大小写)
pub const IMAGE_EXTENSIONS: [&str; 7] = ["bmp", "jpg", "jpeg", "png", "tif", "tiff", "gif"];

pub fn is_image_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| IMAGE_EXTENSIONS.iter().any(|x| x.eq_ignore_ascii_case(e)))
}

/// 收集待处理的图片路径
pub fn collect_images<P: AsRef<Path>>(source: P) -> Result<Vec<PathBuf>> {
    let source = source.as_ref();
    if source.is_file() {
        return Ok(vec![source.to_path_buf()]);
    }
    if !source.is_dir() {
        bail!("source not found: {}", source.display());
    }

    let mut ys = Vec::new();
    for entry in std::fs::read_dir(source)
        .with_context(|| format!("failed to read directory {}", source.display()))?
    {
        let path = entry?.path();
        if path.is_file() && is_image_file(&path) {
            ys.push(path);
        }
    }
    ys.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(ys)
}
