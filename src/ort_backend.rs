// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 推理引擎边界 (Engine boundary)
//!
//! 处理器只依赖 [`InferenceEngine`]: 一个 `[1, 3, H, W]` 输入, 一个输出张量。
//! [`OrtBackend`] 是基于 ONNX Runtime 的实现。

use std::path::PathBuf;

use ndarray::{Array4, ArrayD, IxDyn};
use ort::execution_providers::{
    CPUExecutionProvider, CUDAExecutionProvider, TensorRTExecutionProvider,
};
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Tensor;

use crate::error::{Result, YoloError};

/// 推理引擎接口
pub trait InferenceEngine: Send {
    /// 第一个输入的形状, 动态维度为 -1
    fn input_shape(&self) -> &[i64];

    /// 第一个输出的形状, 动态维度为 -1
    fn output_shape(&self) -> &[i64];

    /// 同步执行一次前向推理
    fn run(&mut self, xs: Array4<f32>) -> Result<ArrayD<f32>>;
}

/// Execution Provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OrtEP {
    #[default]
    CPU,
    CUDA(i32),
    Trt(i32),
}

impl std::fmt::Display for OrtEP {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrtEP::CPU => write!(f, "cpu"),
            OrtEP::CUDA(id) => write!(f, "cuda:{id}"),
            OrtEP::Trt(id) => write!(f, "tensorrt:{id}"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct OrtConfig {
    pub f: PathBuf,
    pub ep: OrtEP,
    pub intra_threads: Option<usize>,
}

/// ONNX Runtime 后端
pub struct OrtBackend {
    session: Session,
    ep: OrtEP,
    input_name: String,
    output_name: String,
    input_shape: Vec<i64>,
    output_shape: Vec<i64>,
}

impl OrtBackend {
    pub fn build(config: OrtConfig) -> Result<Self> {
        if !config.f.exists() {
            return Err(YoloError::ModelLoad(format!(
                "model file not found: {}",
                config.f.display()
            )));
        }
        let provider = match config.ep {
            OrtEP::CPU => CPUExecutionProvider::default().build(),
            OrtEP::CUDA(id) => CUDAExecutionProvider::default().with_device_id(id).build(),
            OrtEP::Trt(id) => TensorRTExecutionProvider::default()
                .with_device_id(id)
                .build(),
        };

        let mut builder = Session::builder()
            .map_err(load_err)?
            .with_execution_providers([provider])
            .map_err(load_err)?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(load_err)?;
        if let Some(n) = config.intra_threads {
            builder = builder.with_intra_threads(n).map_err(load_err)?;
        }
        let session = builder.commit_from_file(&config.f).map_err(load_err)?;

        let input = session
            .inputs
            .first()
            .ok_or_else(|| YoloError::ModelLoad("model has no inputs".into()))?;
        let output = session
            .outputs
            .first()
            .ok_or_else(|| YoloError::ModelLoad("model has no outputs".into()))?;
        if session.inputs.len() > 1 || session.outputs.len() > 1 {
            tracing::warn!(
                "model has {} inputs / {} outputs, only the first of each is used",
                session.inputs.len(),
                session.outputs.len()
            );
        }

        let input_shape = input
            .input_type
            .tensor_shape()
            .map(|s| s.to_vec())
            .ok_or_else(|| YoloError::ModelLoad("model input is not a tensor".into()))?;
        let output_shape = output
            .output_type
            .tensor_shape()
            .map(|s| s.to_vec())
            .ok_or_else(|| YoloError::ModelLoad("model output is not a tensor".into()))?;
        let input_name = input.name.clone();
        let output_name = output.name.clone();

        tracing::debug!(
            "ort session ready: {}{:?} -> {}{:?} on {}",
            input_name,
            input_shape,
            output_name,
            output_shape,
            config.ep
        );

        Ok(Self {
            session,
            ep: config.ep,
            input_name,
            output_name,
            input_shape,
            output_shape,
        })
    }

    pub fn ep(&self) -> OrtEP {
        self.ep
    }

    pub fn input_name(&self) -> &str {
        &self.input_name
    }

    pub fn output_name(&self) -> &str {
        &self.output_name
    }
}

fn load_err<E: std::fmt::Display>(e: E) -> YoloError {
    YoloError::ModelLoad(e.to_string())
}

fn infer_err<E: std::fmt::Display>(e: E) -> YoloError {
    YoloError::Inference(e.to_string())
}

impl InferenceEngine for OrtBackend {
    fn input_shape(&self) -> &[i64] {
        &self.input_shape
    }

    fn output_shape(&self) -> &[i64] {
        &self.output_shape
    }

    fn run(&mut self, xs: Array4<f32>) -> Result<ArrayD<f32>> {
        let (n, c, h, w) = xs.dim();
        let shape = [n, c, h, w];
        let (data, _) = xs.as_standard_layout().into_owned().into_raw_vec_and_offset();
        let input = Tensor::from_array((shape, data.into_boxed_slice())).map_err(infer_err)?;

        let outputs = self
            .session
            .run(ort::inputs![self.input_name.as_str() => input])
            .map_err(infer_err)?;
        let (dims, data) = outputs[self.output_name.as_str()]
            .try_extract_tensor::<f32>()
            .map_err(infer_err)?;
        let dims: Vec<usize> = dims.iter().map(|&d| d.max(0) as usize).collect();

        ArrayD::from_shape_vec(IxDyn(&dims), data.to_vec())
            .map_err(|e| YoloError::Inference(format!("bad output tensor: {e}")))
    }
}
