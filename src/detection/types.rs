// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

/// 检测结果数据结构
/// Data structures for detections
use serde::Serialize;

/// 轴对齐边界框 (左上角原点, 像素坐标)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Bbox {
    #[serde(rename = "x")]
    xmin: f32,
    #[serde(rename = "y")]
    ymin: f32,
    width: f32,
    height: f32,
}

impl Bbox {
    pub fn new_from_xywh(xmin: f32, ymin: f32, width: f32, height: f32) -> Self {
        Self {
            xmin,
            ymin,
            width,
            height,
        }
    }

    /// 中心点格式 (cx, cy, w, h) → 左上角格式
    pub fn from_cxcywh(cx: f32, cy: f32, width: f32, height: f32) -> Self {
        Self::new_from_xywh(cx - width / 2., cy - height / 2., width, height)
    }

    pub fn width(&self) -> f32 {
        self.width
    }

    pub fn height(&self) -> f32 {
        self.height
    }

    pub fn xmin(&self) -> f32 {
        self.xmin
    }

    pub fn ymin(&self) -> f32 {
        self.ymin
    }

    pub fn xmax(&self) -> f32 {
        self.xmin + self.width
    }

    pub fn ymax(&self) -> f32 {
        self.ymin + self.height
    }

    pub fn area(&self) -> f32 {
        self.width * self.height
    }

    /// 交集面积, 不相交时为 0
    pub fn intersection_area(&self, another: &Bbox) -> f32 {
        let l = self.xmin.max(another.xmin);
        let r = self.xmax().min(another.xmax());
        let t = self.ymin.max(another.ymin);
        let b = self.ymax().min(another.ymax());
        if r <= l || b <= t {
            return 0.;
        }
        (r - l) * (b - t)
    }

    pub fn union(&self, another: &Bbox) -> f32 {
        self.area() + another.area() - self.intersection_area(another)
    }

    /// Intersection over Union, 取值 [0, 1]
    pub fn iou(&self, another: &Bbox) -> f32 {
        let inter = self.intersection_area(another);
        if inter <= 0. {
            return 0.;
        }
        let union = self.union(another);
        if union <= 0. {
            return 0.;
        }
        inter / union
    }

    /// 裁剪到图像范围内: x ∈ [0, w-1], y ∈ [0, h-1], 宽高不越界
    pub fn clamp_to(&self, image_width: f32, image_height: f32) -> Self {
        let xmin = self.xmin.max(0.).min((image_width - 1.).max(0.));
        let ymin = self.ymin.max(0.).min((image_height - 1.).max(0.));
        let width = self.width.min(image_width - xmin).max(0.);
        let height = self.height.min(image_height - ymin).max(0.);
        Self::new_from_xywh(xmin, ymin, width, height)
    }
}

/// 单个检测结果, 坐标位于原图像素空间
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Detection {
    #[serde(flatten)]
    bbox: Bbox,
    confidence: f32,
    class_id: usize,
    class_name: String,
}

impl Detection {
    pub fn new(bbox: Bbox, confidence: f32, class_id: usize, class_name: impl Into<String>) -> Self {
        Self {
            bbox,
            confidence,
            class_id,
            class_name: class_name.into(),
        }
    }

    pub fn bbox(&self) -> &Bbox {
        &self.bbox
    }

    pub fn x(&self) -> f32 {
        self.bbox.xmin()
    }

    pub fn y(&self) -> f32 {
        self.bbox.ymin()
    }

    pub fn width(&self) -> f32 {
        self.bbox.width()
    }

    pub fn height(&self) -> f32 {
        self.bbox.height()
    }

    pub fn confidence(&self) -> f32 {
        self.confidence
    }

    pub fn class_id(&self) -> usize {
        self.class_id
    }

    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    pub fn iou(&self, another: &Detection) -> f32 {
        self.bbox.iou(&another.bbox)
    }
}

impl std::fmt::Display for Detection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} ({}) {:.2} @ [{:.1}, {:.1}, {:.1}, {:.1}]",
            self.class_name,
            self.class_id,
            self.confidence,
            self.x(),
            self.y(),
            self.width(),
            self.height()
        )
    }
}
