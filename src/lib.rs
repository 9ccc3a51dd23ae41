#![allow(clippy::type_complexity)]
// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
pub mod assets; // 标注字体 + 模型下载
pub mod config; // 配置参数 (CLI + JSON)
pub mod detection; // 检测 + ROI过滤
pub mod input; // 视频输入系统
pub mod mapper; // ROI交互标注
pub mod models; // 模型接口与具体实现
pub mod overlay; // 图像标注绘制
pub mod renderer; // macroquad 显示辅助
pub mod roi; // ROI多边形数据模型

pub mod ort_backend;

pub use crate::config::{DetectArgs, DetectConfig, MapperArgs};
pub use crate::models::{Model, YOLOv8};
pub use crate::ort_backend::{OrtBackend, OrtConfig, OrtEP};
pub use crate::roi::{Point, Region, RoiError, RoiSession};

pub fn non_max_suppression(xs: &mut Vec<Bbox>, iou_threshold: f32) {
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

/// 会话时间戳 (本地时间), 例如 `20250718_171827`
pub fn gen_time_string(delimiter: &str) -> String {
    let fmt = format!("%Y%m%d{}%H%M%S", delimiter);
    chrono::Local::now().format(&fmt).to_string()
}

/// COCO 80类名称 (模型元数据缺失时使用)
pub const COCO_NAMES: [&str; 80] = [
    "person",
    "bicycle",
    "car",
    "motorcycle",
    "airplane",
    "bus",
    "train",
    "truck",
    "boat",
    "traffic light",
    "fire hydrant",
    "stop sign",
    "parking meter",
    "bench",
    "bird",
    "cat",
    "dog",
    "horse",
    "sheep",
    "cow",
    "elephant",
    "bear",
    "zebra",
    "giraffe",
    "backpack",
    "umbrella",
    "handbag",
    "tie",
    "suitcase",
    "frisbee",
    "skis",
    "snowboard",
    "sports ball",
    "kite",
    "baseball bat",
    "baseball glove",
    "skateboard",
    "surfboard",
    "tennis racket",
    "bottle",
    "wine glass",
    "cup",
    "fork",
    "knife",
    "spoon",
    "bowl",
    "banana",
    "apple",
    "sandwich",
    "orange",
    "broccoli",
    "carrot",
    "hot dog",
    "pizza",
    "donut",
    "cake",
    "chair",
    "couch",
    "potted plant",
    "bed",
    "dining table",
    "toilet",
    "tv",
    "laptop",
    "mouse",
    "remote",
    "keyboard",
    "cell phone",
    "microwave",
    "oven",
    "toaster",
    "sink",
    "refrigerator",
    "book",
    "clock",
    "vase",
    "scissors",
    "teddy bear",
    "hair drier",
    "toothbrush",
];

/// 调色板 (ROI多边形 / 检测框颜色)
pub const BRIGHT_COLORS: [(u8, u8, u8); 12] = [
    (0, 0, 255),     // 蓝色
    (255, 0, 0),     // 红色
    (0, 255, 0),     // 绿色
    (255, 255, 0),   // 黄色
    (255, 0, 255),   // 品红
    (0, 255, 255),   // 青色
    (255, 128, 0),   // 橙色
    (255, 0, 128),   // 粉红
    (128, 255, 0),   // 黄绿
    (0, 128, 255),   // 天蓝
    (255, 255, 255), // 白色
    (128, 0, 255),   // 紫色
];

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Bbox {
    // a bounding box around an object
    xmin: f32,
    ymin: f32,
    width: f32,
    height: f32,
    id: usize,
    confidence: f32,
}

impl Bbox {
    pub fn new(xmin: f32, ymin: f32, width: f32, height: f32, id: usize, confidence: f32) -> Self {
        Self {
            xmin,
            ymin,
            width,
            height,
            id,
            confidence,
        }
    }

    pub fn from_xyxy(x1: f32, y1: f32, x2: f32, y2: f32, id: usize, confidence: f32) -> Self {
        Self::new(x1, y1, x2 - x1, y2 - y1, id, confidence)
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

    /// 检测框中心点 (整数截断, 与 `int((x1 + x2) / 2)` 一致)
    pub fn center(&self) -> Point {
        Point::new(
            ((self.xmin + self.xmax()) / 2.) as i32,
            ((self.ymin + self.ymax()) / 2.) as i32,
        )
    }

    pub fn is_finite(&self) -> bool {
        self.xmin.is_finite()
            && self.ymin.is_finite()
            && self.width.is_finite()
            && self.height.is_finite()
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn confidence(&self) -> f32 {
        self.confidence
    }

    pub fn area(&self) -> f32 {
        self.width * self.height
    }

    pub fn intersection_area(&self, another: &Bbox) -> f32 {
        let l = self.xmin.max(another.xmin);
        let r = (self.xmin + self.width).min(another.xmin + another.width);
        let t = self.ymin.max(another.ymin);
        let b = (self.ymin + self.height).min(another.ymin + another.height);
        (r - l + 1.).max(0.) * (b - t + 1.).max(0.)
    }

    pub fn union(&self, another: &Bbox) -> f32 {
        self.area() + another.area() - self.intersection_area(another)
    }

    pub fn iou(&self, another: &Bbox) -> f32 {
        self.intersection_area(another) / self.union(another)
    }
}
