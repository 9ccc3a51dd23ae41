/// 模型统一接口与实现
///
/// ## Model Trait
/// 统一的模型接口，定义标准流程: preprocess → run → postprocess
///
/// ```text
/// RGBA帧 → preprocess → NCHW张量
///          ↓
///     推理引擎 run
///          ↓
///     原始输出 → postprocess → 检测框 (原始帧坐标)
/// ```
///
/// 检测循环只依赖该 trait, 测试中可以用桩模型替代 ONNX 模型.
use anyhow::Result;
use image::RgbaImage;
use ndarray::{Array, IxDyn};

use crate::Bbox;

pub trait Model {
    /// 预处理: 帧 → NCHW 张量
    fn preprocess(&mut self, frame: &RgbaImage) -> Result<Array<f32, IxDyn>>;

    /// 推理: 执行模型前向传播, 返回原始输出
    fn run(&mut self, xs: Array<f32, IxDyn>, profile: bool) -> Result<Vec<Array<f32, IxDyn>>>;

    /// 后处理: 原始输出 → 检测框 (已做置信度过滤 + NMS, 坐标还原到原始帧)
    fn postprocess(&self, ys: Vec<Array<f32, IxDyn>>, frame_size: (u32, u32)) -> Result<Vec<Bbox>>;

    /// 完整的推理流程: preprocess → run → postprocess
    fn forward(&mut self, frame: &RgbaImage) -> Result<Vec<Bbox>> {
        let xs = self.preprocess(frame)?;
        let ys = self.run(xs, false)?;
        self.postprocess(ys, frame.dimensions())
    }

    /// 打印模型信息
    fn summary(&self);

    /// 类别名称表
    fn names(&self) -> &[String];
}

pub mod yolov8; // YOLOv8 完整模型 + 实现 Model trait

pub use yolov8::{YOLOv8, YOLOv8Config};
