//! 检测器 (Detector)
//! 职责: 接收DecodedFrame → YOLO检测 → 类别/ROI过滤 → 发送RenderData

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Instant;

use anyhow::{Context, Result};
use crossbeam_channel::{Receiver, Sender};

use super::filter::DetectionFilter;
use super::types::{DecodedFrame, RenderData};
use crate::models::Model;

pub struct Detector<M: Model> {
    model: M,
    filter: DetectionFilter,
    total_frames: u64,
    frame_count: u64,
    failed_frames: u64,
}

impl<M: Model> Detector<M> {
    pub fn new(model: M, filter: DetectionFilter, total_frames: u64) -> Self {
        Self {
            model,
            filter,
            total_frames,
            frame_count: 0,
            failed_frames: 0,
        }
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    pub fn failed_frames(&self) -> u64 {
        self.failed_frames
    }

    /// 处理一帧; 推理失败时记录日志并返回 None (跳过该帧)
    pub fn process_frame(&mut self, frame: DecodedFrame) -> Option<RenderData> {
        self.frame_count += 1;
        let frame_number = self.frame_count;

        let t = Instant::now();
        let bboxes = match self.model.forward(&frame.image) {
            Ok(bboxes) => bboxes,
            Err(e) => {
                self.failed_frames += 1;
                log::warn!("⚠️ 帧 {} 推理失败, 已跳过: {:#}", frame_number, e);
                return None;
            }
        };
        let inference_ms = t.elapsed().as_secs_f64() * 1000.0;

        let (detections, stats) = self
            .filter
            .filter_frame(frame_number, &bboxes, self.model.names());

        Some(RenderData {
            frame_number,
            total_frames: self.total_frames,
            image: frame.image,
            detections,
            stats,
            inference_ms,
        })
    }

    /// 工作循环: 解码端断开 (视频结束) / 渲染端断开 / 停止标志 → 退出
    pub fn run(&mut self, rx: Receiver<DecodedFrame>, tx: Sender<RenderData>, stop: &AtomicBool) {
        log::info!("🔍 检测模块启动");
        for frame in rx.iter() {
            if stop.load(Ordering::Relaxed) {
                break;
            }
            if let Some(data) = self.process_frame(frame) {
                if tx.send(data).is_err() {
                    break;
                }
            }
        }
        log::info!(
            "🔍 检测模块退出: 处理 {} 帧, 失败 {} 帧",
            self.frame_count,
            self.failed_frames
        );
    }
}

/// 启动推理线程
pub fn spawn_detector<M: Model + Send + 'static>(
    mut detector: Detector<M>,
    rx: Receiver<DecodedFrame>,
    tx: Sender<RenderData>,
    stop: Arc<AtomicBool>,
) -> Result<JoinHandle<()>> {
    std::thread::Builder::new()
        .name("inference".into())
        .spawn(move || detector.run(rx, tx, &stop))
        .context("无法启动推理线程")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roi::{Point, Region};
    use crate::Bbox;
    use anyhow::anyhow;
    use image::RgbaImage;
    use ndarray::{Array, IxDyn};

    /// 桩模型: 每帧返回固定检测框, 指定帧号推理失败
    struct StubModel {
        calls: u64,
        fail_on: u64,
        names: Vec<String>,
    }

    impl StubModel {
        fn new(fail_on: u64) -> Self {
            Self {
                calls: 0,
                fail_on,
                names: crate::COCO_NAMES.iter().map(|s| s.to_string()).collect(),
            }
        }
    }

    impl Model for StubModel {
        fn preprocess(&mut self, _frame: &RgbaImage) -> Result<Array<f32, IxDyn>> {
            self.calls += 1;
            if self.calls == self.fail_on {
                return Err(anyhow!("stub failure"));
            }
            Ok(Array::zeros(IxDyn(&[1])))
        }

        fn run(&mut self, xs: Array<f32, IxDyn>, _profile: bool) -> Result<Vec<Array<f32, IxDyn>>> {
            Ok(vec![xs])
        }

        fn postprocess(&self, _ys: Vec<Array<f32, IxDyn>>, _size: (u32, u32)) -> Result<Vec<Bbox>> {
            Ok(vec![
                Bbox::from_xyxy(10.0, 10.0, 30.0, 30.0, 2, 0.9),
                Bbox::from_xyxy(10.0, 10.0, 30.0, 30.0, 0, 0.9),
                Bbox::from_xyxy(300.0, 300.0, 330.0, 330.0, 2, 0.9),
            ])
        }

        fn summary(&self) {}

        fn names(&self) -> &[String] {
            &self.names
        }
    }

    fn detector(fail_on: u64) -> Detector<StubModel> {
        let road = Region::new(
            "road1",
            vec![Point::new(0, 0), Point::new(100, 0), Point::new(100, 100), Point::new(0, 100)],
        )
        .unwrap();
        Detector::new(StubModel::new(fail_on), DetectionFilter::new(&[2, 7], vec![road]), 3)
    }

    fn frame() -> DecodedFrame {
        DecodedFrame {
            image: RgbaImage::new(8, 8),
        }
    }

    #[test]
    fn test_process_frame_filters() {
        let mut det = detector(0);
        let data = det.process_frame(frame()).unwrap();
        assert_eq!(data.frame_number, 1);
        assert_eq!(data.detections.len(), 1);
        assert_eq!(data.detections[0].caption(), "car 0.90");
        assert_eq!(data.stats.class_rejected, 1);
        assert_eq!(data.stats.region_rejected, 1);
        assert_eq!(data.frame_label(), "Frame: 1/3");
    }

    #[test]
    fn test_inference_failure_skips_frame() {
        let (frame_tx, frame_rx) = crossbeam_channel::bounded(4);
        let (render_tx, render_rx) = crossbeam_channel::bounded(4);
        for _ in 0..3 {
            frame_tx.send(frame()).unwrap();
        }
        drop(frame_tx);

        let mut det = detector(2);
        det.run(frame_rx, render_tx, &AtomicBool::new(false));

        let numbers: Vec<u64> = render_rx.iter().map(|d| d.frame_number).collect();
        assert_eq!(numbers, vec![1, 3]);
        assert_eq!(det.frame_count(), 3);
        assert_eq!(det.failed_frames(), 1);
    }

    #[test]
    fn test_stop_flag_ends_loop() {
        let (frame_tx, frame_rx) = crossbeam_channel::bounded(4);
        let (render_tx, render_rx) = crossbeam_channel::bounded(4);
        frame_tx.send(frame()).unwrap();
        drop(frame_tx);

        let mut det = detector(0);
        det.run(frame_rx, render_tx, &AtomicBool::new(true));
        assert_eq!(render_rx.iter().count(), 0);
    }
}
