// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 错误类型 (Error taxonomy)

use std::path::PathBuf;

/// 处理器错误
#[derive(thiserror::Error, Debug)]
pub enum YoloError {
    /// 模型文件缺失或损坏, 推理引擎构建失败
    #[error("failed to load model: {0}")]
    ModelLoad(String),

    /// 类别文件缺失或格式错误
    #[error("failed to load class labels from {path}: {reason}")]
    LabelSource { path: PathBuf, reason: String },

    /// 模型输出形状无法识别
    #[error("unsupported model: {0}")]
    UnsupportedModel(String),

    /// 图片无法打开或解码
    #[error("failed to decode image {path}")]
    ImageDecode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    /// 处理器已释放
    #[error("processor has already been disposed")]
    UseAfterDispose,

    /// 推理引擎调用失败
    #[error("inference failed: {0}")]
    Inference(String),

    /// 输出张量形状与模型信息不一致
    #[error("invalid output shape: expected {expected}, got {got:?}")]
    InvalidOutputShape { expected: String, got: Vec<usize> },

    /// 预处理失败 (零尺寸图片或模型输入)
    #[error("preprocess failed: {0}")]
    Preprocess(String),
}

impl YoloError {
    /// 单张图片级别的错误, 批处理时可跳过继续
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            YoloError::ImageDecode { .. }
                | YoloError::Inference(_)
                | YoloError::InvalidOutputShape { .. }
                | YoloError::Preprocess(_)
        )
    }
}

pub type Result<T, E = YoloError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn per_image_errors_are_recoverable() {
        assert!(YoloError::Inference("boom".into()).is_recoverable());
        assert!(YoloError::Preprocess("empty".into()).is_recoverable());
        assert!(YoloError::InvalidOutputShape {
            expected: "[1, 6, N]".into(),
            got: vec![1, 5],
        }
        .is_recoverable());
    }

    #[test]
    fn construction_and_lifecycle_errors_are_fatal() {
        assert!(!YoloError::ModelLoad("missing".into()).is_recoverable());
        assert!(!YoloError::UnsupportedModel("[1]".into()).is_recoverable());
        assert!(!YoloError::UseAfterDispose.is_recoverable());
        assert!(!YoloError::LabelSource {
            path: "classes.yaml".into(),
            reason: "not found".into(),
        }
        .is_recoverable());
    }
}
