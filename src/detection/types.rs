/// 检测系统数据结构定义
/// Data structures for the ROI detection pipeline
use image::RgbaImage;

use super::filter::{AcceptedDetection, FrameStats};

/// 已解码帧 (解码线程 → 推理线程)
#[derive(Clone)]
pub struct DecodedFrame {
    pub image: RgbaImage,
}

/// 推理结果 (推理线程 → 渲染线程)
#[derive(Clone)]
pub struct RenderData {
    pub frame_number: u64, // 从1开始
    pub total_frames: u64, // 0 表示未知
    pub image: RgbaImage,
    pub detections: Vec<AcceptedDetection>,
    pub stats: FrameStats,
    pub inference_ms: f64,
}

impl RenderData {
    /// `Frame: n/total`
    pub fn frame_label(&self) -> String {
        if self.total_frames > 0 {
            format!("Frame: {}/{}", self.frame_number, self.total_frames)
        } else {
            format!("Frame: {}", self.frame_number)
        }
    }
}
