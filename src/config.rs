// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 命令行参数 (Command line arguments)

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::models::BoxRescale;
use crate::ort_backend::OrtEP;
use crate::processor::ProcessorConfig;
use crate::utils::ChannelOrder;

/// 检测框还原方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RescaleMode {
    /// 精确的 letterbox 逆变换
    Letterbox,
    /// 按宽高比例直接拉伸
    Stretch,
}

impl From<RescaleMode> for BoxRescale {
    fn from(mode: RescaleMode) -> Self {
        match mode {
            RescaleMode::Letterbox => BoxRescale::Letterbox,
            RescaleMode::Stretch => BoxRescale::Stretch,
        }
    }
}

#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "通用 YOLO 推理 (检测 / 分类自适应)", long_about = None)]
pub struct Args {
    /// ONNX 模型路径
    #[arg(short, long)]
    pub model: PathBuf,

    /// 类别文件 (YAML / JSON)
    #[arg(short, long)]
    pub labels: PathBuf,

    /// 图片文件或目录
    #[arg(short, long)]
    pub source: PathBuf,

    /// 结果输出目录, 默认 runs/<时间戳>
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// 使用 CUDA
    #[arg(long)]
    pub cuda: bool,

    /// 使用 TensorRT
    #[arg(long)]
    pub trt: bool,

    /// GPU 设备号
    #[arg(long, default_value_t = 0)]
    pub device_id: i32,

    /// 置信度阈值
    #[arg(long, default_value_t = 0.5)]
    pub conf: f32,

    /// NMS IoU 阈值
    #[arg(long, default_value_t = 0.45)]
    pub iou: f32,

    /// 检测框还原方式
    #[arg(long, value_enum, default_value_t = RescaleMode::Letterbox)]
    pub rescale: RescaleMode,

    /// 模型输入为 BGR 通道顺序
    #[arg(long)]
    pub bgr: bool,

    /// 标签字体 (TTF/OTF), 不提供时只画框
    #[arg(long)]
    pub font: Option<PathBuf>,

    /// 不保存标注图片
    #[arg(long)]
    pub no_draw: bool,

    /// 输出 detections.json
    #[arg(long)]
    pub json: bool,

    /// 打印各阶段耗时等调试信息
    #[arg(short, long)]
    pub verbose: bool,
}

impl Args {
    pub fn ep(&self) -> OrtEP {
        if self.trt {
            OrtEP::Trt(self.device_id)
        } else if self.cuda {
            OrtEP::CUDA(self.device_id)
        } else {
            OrtEP::CPU
        }
    }

    pub fn output_dir(&self) -> PathBuf {
        self.output
            .clone()
            .unwrap_or_else(|| PathBuf::from("runs").join(crate::gen_time_string("-")))
    }
}

impl From<&Args> for ProcessorConfig {
    fn from(args: &Args) -> Self {
        Self {
            model: args.model.clone(),
            labels: args.labels.clone(),
            device: args.ep(),
            conf: args.conf,
            iou: args.iou,
            rescale: args.rescale.into(),
            channel_order: if args.bgr {
                ChannelOrder::Bgr
            } else {
                ChannelOrder::Rgb
            },
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(extra: &[&str]) -> Args {
        let mut argv = vec!["universal-yolo", "-m", "m.onnx", "-l", "c.yaml", "-s", "imgs"];
        argv.extend_from_slice(extra);
        Args::try_parse_from(argv).unwrap()
    }

    #[test]
    fn defaults() {
        let args = parse(&[]);
        let config = ProcessorConfig::from(&args);
        assert_eq!(config.model, PathBuf::from("m.onnx"));
        assert_eq!(config.device, OrtEP::CPU);
        assert_eq!(config.conf, 0.5);
        assert_eq!(config.iou, 0.45);
        assert_eq!(config.rescale, BoxRescale::Letterbox);
        assert_eq!(config.channel_order, ChannelOrder::Rgb);
        assert!(args.output_dir().starts_with("runs"));
    }

    #[test]
    fn trt_wins_over_cuda() {
        let args = parse(&["--cuda", "--trt", "--device-id", "1"]);
        assert_eq!(args.ep(), OrtEP::Trt(1));
        let args = parse(&["--cuda"]);
        assert_eq!(args.ep(), OrtEP::CUDA(0));
    }

    #[test]
    fn overrides_reach_processor_config() {
        let args = parse(&[
            "--conf", "0.25", "--iou", "0.7", "--rescale", "stretch", "--bgr", "-o", "out",
        ]);
        let config = ProcessorConfig::from(&args);
        assert_eq!(config.conf, 0.25);
        assert_eq!(config.iou, 0.7);
        assert_eq!(config.rescale, BoxRescale::Stretch);
        assert_eq!(config.channel_order, ChannelOrder::Bgr);
        assert_eq!(args.output_dir(), PathBuf::from("out"));
    }

    #[test]
    fn source_is_required() {
        assert!(Args::try_parse_from(["universal-yolo", "-m", "m.onnx", "-l", "c.yaml"]).is_err());
    }
}
