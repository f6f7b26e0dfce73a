// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

/// 检测结果 (Detection results)
///
/// - Bbox:      轴对齐边界框与 IoU
/// - Detection: 原图空间中的单个检测
pub mod types;

pub use types::{Bbox, Detection};
