//! ROI过滤检测: 渲染线程 (macroquad 主线程) / 无窗口模式
//!
//! 三线程架构:
//! - 解码线程: 视频文件 → DecodedFrame
//! - 推理线程: YOLO检测 + 类别/ROI过滤 → RenderData
//! - 渲染线程: 显示 (或 --headless 时只输出日志)

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use ab_glyph::FontArc;
use anyhow::{Context, Result};
use crossbeam_channel::{Receiver, TryRecvError};
use image::DynamicImage;
use macroquad::prelude::*;

use super::types::RenderData;
use crate::overlay::{self, RegionStyle};
use crate::renderer::{self, FrameTexture, FrameView};
use crate::roi::Region;

/// 保存标注后的帧 (`--save-frames`)
pub struct FrameSaver {
    dir: PathBuf,
    regions: Vec<Region>,
    font: Option<FontArc>,
}

impl FrameSaver {
    pub fn new(dir: PathBuf, regions: Vec<Region>, font: Option<FontArc>) -> Result<Self> {
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("无法创建输出目录: {}", dir.display()))?;
        Ok(Self { dir, regions, font })
    }

    pub fn save(&self, data: &RenderData) -> Result<PathBuf> {
        let mut img = DynamicImage::ImageRgba8(data.image.clone()).to_rgb8();
        overlay::draw_regions(
            &mut img,
            &self.regions,
            RegionStyle::outline(),
            self.font.as_ref(),
            overlay::palette_color,
        );
        overlay::draw_detections(&mut img, &data.detections, self.font.as_ref());
        overlay::draw_frame_counter(&mut img, self.font.as_ref(), &data.frame_label());

        let path = self.dir.join(format!("frame_{:06}.jpg", data.frame_number));
        img.save(&path)
            .with_context(|| format!("保存帧失败: {}", path.display()))?;
        Ok(path)
    }
}

/// 每帧的公共处理: 日志 + 可选保存
fn on_frame(data: &RenderData, saver: Option<&FrameSaver>, verbose: bool) {
    if verbose && !data.detections.is_empty() {
        let items: Vec<String> = data
            .detections
            .iter()
            .map(|d| format!("{} @ {}", d.caption(), d.matched_regions.join("+")))
            .collect();
        log::info!("🎯 {}: {}", data.frame_label(), items.join(", "));
    }
    if let Some(saver) = saver {
        if let Err(e) = saver.save(data) {
            log::warn!("⚠️ {:#}", e);
        }
    }
}

/// 停止工作线程并等待退出
pub fn shutdown(stop: &AtomicBool, rx: Receiver<RenderData>, workers: Vec<JoinHandle<()>>) {
    stop.store(true, Ordering::Relaxed);
    drop(rx);
    for worker in workers {
        if worker.join().is_err() {
            log::error!("❌ 工作线程异常退出");
        }
    }
    log::info!("🧹 Resources cleaned up");
}

/// 无窗口模式: 逐帧输出保留的检测结果
pub fn run_headless(
    rx: Receiver<RenderData>,
    stop: Arc<AtomicBool>,
    saver: Option<FrameSaver>,
    workers: Vec<JoinHandle<()>>,
) {
    let mut frames = 0u64;
    loop {
        if stop.load(Ordering::Relaxed) {
            log::info!("🛑 收到停止信号");
            break;
        }
        match rx.recv_timeout(std::time::Duration::from_millis(200)) {
            Ok(data) => {
                frames += 1;
                on_frame(&data, saver.as_ref(), true);
            }
            Err(crossbeam_channel::RecvTimeoutError::Timeout) => continue,
            Err(crossbeam_channel::RecvTimeoutError::Disconnected) => {
                log::info!("🏁 End of video");
                break;
            }
        }
    }
    log::info!("📊 共处理 {} 帧", frames);
    shutdown(&stop, rx, workers);
}

/// 窗口模式渲染器
pub struct DetectApp {
    rx: Receiver<RenderData>,
    stop: Arc<AtomicBool>,
    saver: Option<FrameSaver>,
    workers: Vec<JoinHandle<()>>,
    regions: Vec<Region>,
    texture: FrameTexture,
    last: Option<RenderData>,
}

impl DetectApp {
    pub fn new(
        rx: Receiver<RenderData>,
        stop: Arc<AtomicBool>,
        regions: Vec<Region>,
        saver: Option<FrameSaver>,
        workers: Vec<JoinHandle<()>>,
    ) -> Self {
        Self {
            rx,
            stop,
            saver,
            workers,
            regions,
            texture: FrameTexture::default(),
            last: None,
        }
    }

    /// 取出全部待处理结果, 只显示最新一帧; 返回 false 表示视频结束
    fn update(&mut self) -> bool {
        loop {
            match self.rx.try_recv() {
                Ok(data) => {
                    on_frame(&data, self.saver.as_ref(), false);
                    self.last = Some(data);
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    log::info!("🏁 End of video");
                    return false;
                }
            }
        }
        if let Some(data) = &self.last {
            self.texture.update(&data.image);
        }
        true
    }

    fn draw(&self) {
        clear_background(BLACK);
        let Some(data) = &self.last else {
            draw_text("Waiting for frames...", 20.0, 40.0, 28.0, WHITE);
            return;
        };

        let view = FrameView::fit(
            data.image.width(),
            data.image.height(),
            screen_width(),
            screen_height(),
        );
        self.texture.draw(&view);
        renderer::draw_regions(&view, &self.regions);
        renderer::draw_detections(&view, &data.detections);
        renderer::draw_hud(&[
            data.frame_label(),
            format!(
                "Objects: {} | Inference: {:.1} ms",
                data.detections.len(),
                data.inference_ms
            ),
            "Press 'q' to quit".to_string(),
        ]);
    }

    pub async fn run(mut self) {
        prevent_quit();
        loop {
            if is_quit_requested() || is_key_pressed(KeyCode::Q) {
                break;
            }
            if self.stop.load(Ordering::Relaxed) {
                log::info!("🛑 收到停止信号");
                break;
            }
            if !self.update() {
                break;
            }
            self.draw();
            next_frame().await;
        }
        shutdown(&self.stop, self.rx, self.workers);
    }
}
