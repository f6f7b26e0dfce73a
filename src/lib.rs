// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
pub mod config; // 命令行与处理器配置
pub mod detection; // 检测结果数据结构
pub mod error; // 错误类型
pub mod input; // 图片输入扫描
pub mod labels; // 类别映射
pub mod models; // 模型识别与输出解码
pub mod ort_backend; // 推理引擎
pub mod processor; // 处理器门面
pub mod renderer; // 检测结果绘制
pub mod utils; // 预处理工具

pub use crate::config::Args;
pub use crate::detection::{Bbox, Detection};
pub use crate::error::{Result, YoloError};
pub use crate::labels::ClassMapping;
pub use crate::models::{BoxRescale, ModelInfo, ModelKind};
pub use crate::ort_backend::{InferenceEngine, OrtBackend, OrtConfig, OrtEP};
pub use crate::processor::{ProcessorConfig, ProcessorState, UniversalYoloProcessor};

/// 贪心、类别无关的 NMS
///
/// 按置信度降序稳定排序 (同分保持输入顺序), 依次保留与已保留框 IoU 都不超过阈值的框。
pub fn non_max_suppression(xs: &mut Vec<Detection>, iou_threshold: f32) {
    xs.sort_by(|b1, b2| b2.confidence().total_cmp(&b1.confidence()));

    let mut current_index = 0;
    for index in 0..xs.len() {
        let mut drop = false;
        for prev_index in 0..current_index {
            let iou = xs[prev_index].iou(&xs[index]);
            if iou > iou_threshold {
                drop = true;
                break;
            }
        }
        if !drop {
            xs.swap(current_index, index);
            current_index += 1;
        }
    }
    xs.truncate(current_index);
}

pub fn gen_time_string(delimiter: &str) -> String {
    let t_now = chrono::Local::now();
    let fmt = format!(
        "%Y{}%m{}%d{}%H{}%M{}%S{}%f",
        delimiter, delimiter, delimiter, delimiter, delimiter, delimiter
    );
    t_now.format(&fmt).to_string()
}
