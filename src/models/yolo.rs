// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//
// YOLO 输出解码
// 包含: 检测解码、分类解码 (softmax)

use ndarray::{ArrayD, Axis, Ix2, Ix3};

use super::CXYWH_OFFSET;
use crate::error::{Result, YoloError};
use crate::labels::ClassMapping;
use crate::utils::PreprocessResult;
use crate::{Bbox, Detection};

/// 模型输入坐标 → 原图坐标的换算方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BoxRescale {
    /// 精确的 letterbox 逆变换: (v - pad) / scale
    #[default]
    Letterbox,
    /// 按 原图尺寸 / 输入尺寸 直接拉伸 (忽略 padding, 兼容旧行为)
    Stretch,
}

/// 解码参数
#[derive(Debug, Clone, Copy)]
pub struct DecodeParams {
    pub conf: f32,
    pub rescale: BoxRescale,
    /// 模型输入尺寸 (w, h)
    pub input_size: (u32, u32),
}

/// 分数和与 1 的差小于该值时视为已归一化的概率
const PROBABILITY_TOLERANCE: f32 = 0.01;

fn shape_err(expected: String, output: &ArrayD<f32>) -> YoloError {
    YoloError::InvalidOutputShape {
        expected,
        got: output.shape().to_vec(),
    }
}

/// 检测输出 `[1, 4 + nc, P]` → 原图空间中的候选框 (按预测下标顺序, 未做 NMS)
pub fn decode_detections(
    output: &ArrayD<f32>,
    num_classes: usize,
    pre: &PreprocessResult,
    params: &DecodeParams,
    labels: &ClassMapping,
) -> Result<Vec<Detection>> {
    let expected = || format!("[1, {}, N]", CXYWH_OFFSET + num_classes);
    let preds = output
        .view()
        .into_dimensionality::<Ix3>()
        .map_err(|_| shape_err(expected(), output))?;
    let (batch, features, _) = preds.dim();
    if batch == 0 || features != CXYWH_OFFSET + num_classes || num_classes == 0 {
        return Err(shape_err(expected(), output));
    }
    let preds = preds.index_axis(Axis(0), 0);

    let (w0, h0) = (pre.original_size.0 as f32, pre.original_size.1 as f32);
    let (ratio_x, ratio_y) = (
        w0 / params.input_size.0 as f32,
        h0 / params.input_size.1 as f32,
    );

    let mut ys = Vec::new();
    for pred in preds.axis_iter(Axis(1)) {
        let clss = pred.slice(ndarray::s![CXYWH_OFFSET..]);
        let (id, &confidence) = match clss
            .iter()
            .enumerate()
            .reduce(|max, x| if x.1 > max.1 { x } else { max })
        {
            Some(best) => best,
            None => continue,
        };

        if confidence < params.conf {
            continue;
        }

        let bbox = Bbox::from_cxcywh(pred[0], pred[1], pred[2], pred[3]);
        let bbox = match params.rescale {
            BoxRescale::Letterbox => {
                let (x, y) = pre.unletterbox(bbox.xmin(), bbox.ymin());
                Bbox::new_from_xywh(x, y, bbox.width() / pre.scale, bbox.height() / pre.scale)
            }
            BoxRescale::Stretch => Bbox::new_from_xywh(
                bbox.xmin() * ratio_x,
                bbox.ymin() * ratio_y,
                bbox.width() * ratio_x,
                bbox.height() * ratio_y,
            ),
        };

        ys.push(Detection::new(
            bbox.clamp_to(w0, h0),
            confidence,
            id,
            labels.name(id),
        ));
    }

    Ok(ys)
}

/// 数值稳定的 softmax
pub fn softmax(scores: &[f32]) -> Vec<f32> {
    let max = scores.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = scores.iter().map(|s| (s - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

/// 分类输出 `[1, nc]` → 覆盖整张原图的单个检测
pub fn decode_classification(
    output: &ArrayD<f32>,
    original_size: (u32, u32),
    labels: &ClassMapping,
) -> Result<Detection> {
    let expected = || "[1, C]".to_string();
    let logits = output
        .view()
        .into_dimensionality::<Ix2>()
        .map_err(|_| shape_err(expected(), output))?;
    if logits.nrows() == 0 || logits.ncols() == 0 {
        return Err(shape_err(expected(), output));
    }
    let scores = logits.row(0).to_vec();

    let sum: f32 = scores.iter().sum();
    let probs = if (sum - 1.0).abs() < PROBABILITY_TOLERANCE {
        scores
    } else {
        softmax(&scores)
    };

    let (id, &confidence) = probs
        .iter()
        .enumerate()
        .reduce(|max, x| if x.1 > max.1 { x } else { max })
        .ok_or_else(|| shape_err(expected(), output))?;

    let (w0, h0) = original_size;
    Ok(Detection::new(
        Bbox::new_from_xywh(0., 0., w0 as f32, h0 as f32),
        confidence,
        id,
        labels.name(id),
    ))
}
