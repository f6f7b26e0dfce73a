// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//
// 通用 YOLO 处理器
// 包含: 模型加载、类型识别、预处理、推理、后处理、生命周期管理

use std::path::{Path, PathBuf};
use std::time::Instant;

use image::DynamicImage;
use tracing::{debug, info};

use crate::error::{Result, YoloError};
use crate::labels::ClassMapping;
use crate::models::{
    decode_classification, decode_detections, BoxRescale, DecodeParams, ModelInfo, ModelKind,
};
use crate::ort_backend::{InferenceEngine, OrtBackend, OrtConfig, OrtEP};
use crate::utils::{letterbox, stretch, ChannelOrder, Normalization};
use crate::{non_max_suppression, Detection};

/// 处理器配置
#[derive(Debug, Clone)]
pub struct ProcessorConfig {
    /// ONNX 模型路径
    pub model: PathBuf,
    /// 类别文件路径 (YAML / JSON)
    pub labels: PathBuf,
    pub device: OrtEP,
    /// 置信度阈值
    pub conf: f32,
    /// NMS IoU 阈值
    pub iou: f32,
    pub rescale: BoxRescale,
    pub channel_order: ChannelOrder,
    /// 分类模型输入归一化
    pub classify_normalization: Normalization,
    /// 模型输入为动态尺寸时使用的 (w, h)
    pub default_input_size: (u32, u32),
    pub intra_threads: Option<usize>,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            model: PathBuf::from("model.onnx"),
            labels: PathBuf::from("classes.yaml"),
            device: OrtEP::CPU,
            conf: 0.5,
            iou: 0.45,
            rescale: BoxRescale::Letterbox,
            channel_order: ChannelOrder::Rgb,
            classify_normalization: Normalization::imagenet(),
            default_input_size: (640, 640),
            intra_threads: None,
        }
    }
}

/// 处理器生命周期
///
/// 构造是原子的: 失败时不会得到处理器对象, 因此 `Uninitialized` 对外不可见。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessorState {
    Uninitialized,
    Ready,
    Disposed,
}

/// 根据模型输出形状自动选择检测或分类流程的处理器
pub struct UniversalYoloProcessor {
    engine: Option<Box<dyn InferenceEngine>>,
    labels: ClassMapping,
    info: ModelInfo,
    config: ProcessorConfig,
    state: ProcessorState,
}

impl UniversalYoloProcessor {
    /// 加载 ONNX 模型与类别文件, 识别模型类型
    pub fn new(config: ProcessorConfig) -> Result<Self> {
        let engine = OrtBackend::build(OrtConfig {
            f: config.model.clone(),
            ep: config.device,
            intra_threads: config.intra_threads,
        })?;
        let labels = ClassMapping::load(&config.labels)?;
        Ok(Self::with_engine(Box::new(engine), labels, config))
    }

    /// 使用已构建的推理引擎
    pub fn with_engine(
        engine: Box<dyn InferenceEngine>,
        labels: ClassMapping,
        config: ProcessorConfig,
    ) -> Self {
        let info = ModelInfo::introspect(
            engine.input_shape(),
            engine.output_shape(),
            labels.len(),
            config.default_input_size,
        );
        let labeled = (0..info.num_classes())
            .filter(|&id| labels.get(id).is_some())
            .count();

        info!(
            "\nSummary:\n\
            > Model: {}\n\
            > Type: {}\n\
            > EP: {}\n\
            > Input: {}x{}\n\
            > nc: {} (labeled: {}), conf: {}, iou: {}, rescale: {:?}\n\
            > {}",
            config.model.display(),
            info.kind(),
            config.device,
            info.input_width(),
            info.input_height(),
            info.num_classes(),
            labeled,
            config.conf,
            config.iou,
            config.rescale,
            info.description(),
        );
        if !info.kind().is_supported() {
            tracing::warn!("{}, processing will fail", info.description());
        }

        Self {
            engine: Some(engine),
            labels,
            info,
            config,
            state: ProcessorState::Ready,
        }
    }

    /// 处理单张图片文件
    pub fn process<P: AsRef<Path>>(&mut self, path: P) -> Result<Vec<Detection>> {
        self.ensure_runnable()?;
        let path = path.as_ref();
        let image = image::open(path).map_err(|source| YoloError::ImageDecode {
            path: path.to_path_buf(),
            source,
        })?;
        self.run(&image)
    }

    /// 处理已解码的图片
    pub fn process_image(&mut self, image: &DynamicImage) -> Result<Vec<Detection>> {
        self.ensure_runnable()?;
        self.run(image)
    }

    /// 释放推理引擎, 只能调用一次
    pub fn dispose(&mut self) -> Result<()> {
        if self.state == ProcessorState::Disposed {
            return Err(YoloError::UseAfterDispose);
        }
        self.engine = None;
        self.state = ProcessorState::Disposed;
        debug!("processor disposed");
        Ok(())
    }

    fn ensure_runnable(&self) -> Result<()> {
        if self.state != ProcessorState::Ready {
            return Err(YoloError::UseAfterDispose);
        }
        if let ModelKind::Unknown { output_shape } = self.info.kind() {
            return Err(YoloError::UnsupportedModel(format!(
                "cannot decode output shape {:?}",
                output_shape
            )));
        }
        Ok(())
    }

    fn run(&mut self, image: &DynamicImage) -> Result<Vec<Detection>> {
        let engine = self.engine.as_mut().ok_or(YoloError::UseAfterDispose)?;
        let (width, height) = (self.info.input_width(), self.info.input_height());

        match self.info.kind() {
            ModelKind::Detection { num_classes, .. } => {
                let t_pre = Instant::now();
                let mut pre = letterbox(image, width, height, self.config.channel_order)?;
                debug!("[Preprocess]: {:?}", t_pre.elapsed());

                let t_run = Instant::now();
                let ys = engine.run(std::mem::take(&mut pre.tensor))?;
                debug!("[Inference]: {:?}", t_run.elapsed());

                let t_post = Instant::now();
                let params = DecodeParams {
                    conf: self.config.conf,
                    rescale: self.config.rescale,
                    input_size: (width, height),
                };
                let mut ys = decode_detections(&ys, *num_classes, &pre, &params, &self.labels)?;
                let candidates = ys.len();
                non_max_suppression(&mut ys, self.config.iou);
                debug!(
                    "[Postprocess]: {:?}, {} candidates -> {} detections",
                    t_post.elapsed(),
                    candidates,
                    ys.len()
                );
                Ok(ys)
            }
            ModelKind::Classification { .. } => {
                let t_pre = Instant::now();
                let pre = stretch(
                    image,
                    width,
                    height,
                    self.config.channel_order,
                    self.config.classify_normalization,
                )?;
                debug!("[Preprocess]: {:?}", t_pre.elapsed());

                let t_run = Instant::now();
                let ys = engine.run(pre.tensor)?;
                debug!("[Inference]: {:?}", t_run.elapsed());

                let t_post = Instant::now();
                let y = decode_classification(&ys, pre.original_size, &self.labels)?;
                debug!("[Postprocess]: {:?}", t_post.elapsed());
                Ok(vec![y])
            }
            ModelKind::Unknown { output_shape } => Err(YoloError::UnsupportedModel(format!(
                "cannot decode output shape {:?}",
                output_shape
            ))),
        }
    }

    pub fn model_info(&self) -> &ModelInfo {
        &self.info
    }

    pub fn class_mapping(&self) -> &ClassMapping {
        &self.labels
    }

    pub fn state(&self) -> ProcessorState {
        self.state
    }

    pub fn config(&self) -> &ProcessorConfig {
        &self.config
    }
}

impl Drop for UniversalYoloProcessor {
    fn drop(&mut self) {
        if self.engine.take().is_some() {
            debug!("processor dropped, engine released");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_matches_cli_defaults() {
        let config = ProcessorConfig::default();
        assert_eq!(config.conf, 0.5);
        assert_eq!(config.iou, 0.45);
        assert_eq!(config.rescale, BoxRescale::Letterbox);
        assert_eq!(config.default_input_size, (640, 640));
        assert_eq!(config.classify_normalization, Normalization::imagenet());
    }

    #[test]
    fn missing_model_fails_construction() {
        let config = ProcessorConfig {
            model: PathBuf::from("/definitely/not/here/model.onnx"),
            ..Default::default()
        };
        assert!(matches!(
            UniversalYoloProcessor::new(config),
            Err(YoloError::ModelLoad(_))
        ));
    }
}
