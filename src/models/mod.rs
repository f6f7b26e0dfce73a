// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

/// 模型识别与输出解码
///
/// # 架构说明
///
/// ## 模型识别 (Introspection)
/// - 加载时根据引擎报告的输入/输出形状判断模型类型, 只执行一次
/// - `[batch, C]`    → 分类模型
/// - `[batch, F, P]` → 检测模型, F = 4 (cx, cy, w, h) + 类别数
/// - 其它            → 未知, 处理时返回 `UnsupportedModel`
///
/// ## 解码 (Decoding)
/// - 检测: 逐预测取最高类别分数, 置信度过滤, 还原到原图坐标
/// - 分类: 必要时 softmax, 取 arg-max, 生成覆盖整图的检测框
///
/// 文件: `yolo.rs`
use std::fmt;

use tracing::warn;

pub mod yolo;

pub use yolo::{decode_classification, decode_detections, softmax, BoxRescale, DecodeParams};

/// 边界框坐标通道数 (cx, cy, w, h)
pub const CXYWH_OFFSET: usize = 4;

/// 模型类型, 携带解码所需参数
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelKind {
    Classification {
        num_classes: usize,
    },
    Detection {
        num_classes: usize,
        /// 动态维度时为 None, 以运行时张量为准
        num_predictions: Option<usize>,
    },
    Unknown {
        output_shape: Vec<i64>,
    },
}

impl ModelKind {
    pub fn name(&self) -> &'static str {
        match self {
            ModelKind::Classification { .. } => "Classification",
            ModelKind::Detection { .. } => "Detection",
            ModelKind::Unknown { .. } => "Unknown",
        }
    }

    pub fn is_supported(&self) -> bool {
        !matches!(self, ModelKind::Unknown { .. })
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// 模型信息, 构建后不可变
#[derive(Debug, Clone, PartialEq)]
pub struct ModelInfo {
    kind: ModelKind,
    input_width: u32,
    input_height: u32,
    num_classes: usize,
    description: String,
}

/// 维度是否为确定的正数
fn fixed(d: i64) -> Option<usize> {
    (d > 0).then_some(d as usize)
}

impl ModelInfo {
    /// 从引擎报告的张量形状识别模型
    ///
    /// # Arguments
    /// * `input_shape` - `[batch, channels, height, width]`
    /// * `output_shape` - 第一个输出的形状
    /// * `num_labels` - 类别文件中的类别数 (未知模型 / 动态类别维度时使用)
    /// * `default_input_size` - 输入宽高为动态维度时使用的 (w, h)
    pub fn introspect(
        input_shape: &[i64],
        output_shape: &[i64],
        num_labels: usize,
        default_input_size: (u32, u32),
    ) -> Self {
        let dims = (input_shape.len() >= 4).then(|| (fixed(input_shape[3]), fixed(input_shape[2])));
        let (w, h) = dims.unwrap_or((None, None));
        if w.is_none() || h.is_none() {
            warn!(
                "input shape {:?} has no fixed size, falling back to {}x{}",
                input_shape, default_input_size.0, default_input_size.1
            );
        }
        let input_width = w.map_or(default_input_size.0, |w| w as u32);
        let input_height = h.map_or(default_input_size.1, |h| h as u32);

        let (kind, num_classes, description) = match output_shape {
            [_, c] => {
                let num_classes = fixed(*c).unwrap_or_else(|| {
                    warn!("dynamic class dimension, using {} labels", num_labels);
                    num_labels
                });
                (
                    ModelKind::Classification { num_classes },
                    num_classes,
                    format!("YOLO classification model, outputs {num_classes} classes"),
                )
            }
            [_, f, p] if fixed(*f).is_some_and(|f| f > CXYWH_OFFSET) => {
                let num_classes = *f as usize - CXYWH_OFFSET;
                let num_predictions = fixed(*p);
                let predictions = num_predictions
                    .map_or_else(|| "dynamic".to_string(), |p| p.to_string());
                (
                    ModelKind::Detection {
                        num_classes,
                        num_predictions,
                    },
                    num_classes,
                    format!(
                        "YOLO detection model, outputs {predictions} predictions, {num_classes} classes"
                    ),
                )
            }
            _ => (
                ModelKind::Unknown {
                    output_shape: output_shape.to_vec(),
                },
                num_labels,
                format!("unknown model type, output shape: {:?}", output_shape),
            ),
        };

        Self {
            kind,
            input_width,
            input_height,
            num_classes,
            description,
        }
    }

    pub fn kind(&self) -> &ModelKind {
        &self.kind
    }

    pub fn input_width(&self) -> u32 {
        self.input_width
    }

    pub fn input_height(&self) -> u32 {
        self.input_height
    }

    pub fn num_classes(&self) -> usize {
        self.num_classes
    }

    pub fn description(&self) -> &str {
        &self.description
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEFAULT: (u32, u32) = (640, 640);

    #[test]
    fn rank_two_output_is_classification() {
        let info = ModelInfo::introspect(&[1, 3, 224, 224], &[1, 5], 3, DEFAULT);
        assert_eq!(info.kind(), &ModelKind::Classification { num_classes: 5 });
        assert_eq!(info.num_classes(), 5);
        assert_eq!((info.input_width(), info.input_height()), (224, 224));
    }

    #[test]
    fn rank_three_output_is_detection() {
        let info = ModelInfo::introspect(&[1, 3, 480, 640], &[1, 84, 8400], 0, DEFAULT);
        assert_eq!(
            info.kind(),
            &ModelKind::Detection {
                num_classes: 80,
                num_predictions: Some(8400)
            }
        );
        assert_eq!((info.input_width(), info.input_height()), (640, 480));
        assert!(info.description().contains("8400"));
        assert!(info.description().contains("80 classes"));
    }

    #[test]
    fn other_ranks_are_unknown_and_use_label_count() {
        let info = ModelInfo::introspect(&[1, 3, 640, 640], &[1, 2, 3, 4], 7, DEFAULT);
        assert!(!info.kind().is_supported());
        assert_eq!(info.num_classes(), 7);
        assert!(info.description().contains("[1, 2, 3, 4]"));
    }

    #[test]
    fn detection_without_class_channels_is_unknown() {
        let info = ModelInfo::introspect(&[1, 3, 640, 640], &[1, 4, 100], 2, DEFAULT);
        assert_eq!(info.kind().name(), "Unknown");
        let info = ModelInfo::introspect(&[1, 3, 640, 640], &[1, -1, 100], 2, DEFAULT);
        assert_eq!(info.kind().name(), "Unknown");
    }

    #[test]
    fn dynamic_dimensions_fall_back() {
        let info = ModelInfo::introspect(&[-1, 3, -1, -1], &[-1, -1], 12, (320, 256));
        assert_eq!((info.input_width(), info.input_height()), (320, 256));
        assert_eq!(info.kind(), &ModelKind::Classification { num_classes: 12 });

        let info = ModelInfo::introspect(&[1, 3, 640, 640], &[1, 6, -1], 0, DEFAULT);
        assert_eq!(
            info.kind(),
            &ModelKind::Detection {
                num_classes: 2,
                num_predictions: None
            }
        );
    }
}
