// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

/// 工具模块
/// Utility modules
pub mod letterbox;

pub use letterbox::{
    letterbox, scale_wh, stretch, ChannelOrder, Normalization, PreprocessResult, IMAGENET_MEAN,
    IMAGENET_STD, LETTERBOX_FILL,
};
