/// ROI区域过滤检测 - 三线程架构 (解码 → 推理/过滤 → 渲染)
/// 只显示类别在白名单中且检测框中心点落在任一ROI区域内的目标
///
/// 运行: cargo run --bin roi-detect --release -- intersectionRoad1.mp4 --rois roi_polygons.json
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use crossbeam_channel::bounded;
use yolov8_roi::assets::{ensure_model, load_font};
use yolov8_roi::detection::{
    run_headless, spawn_detector, DetectApp, DetectionFilter, Detector, FrameSaver,
};
use yolov8_roi::input::VideoSource;
use yolov8_roi::models::YOLOv8Config;
use yolov8_roi::renderer::window_conf;
use yolov8_roi::roi::FrameSize;
use yolov8_roi::{DetectArgs, DetectConfig, Model, OrtEP, RoiSession, YOLOv8};

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

/// 解码/推理通道容量
const QUEUE_SIZE: usize = 4;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(e) = run() {
        log::error!("❌ {:#}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let args = DetectArgs::parse();
    let config = DetectConfig::resolve(&args);
    config.print_summary();

    // ROI区域
    let session = RoiSession::load(&args.rois)?;
    let regions = session.regions().to_vec();
    log::info!("📐 已加载 {} 个ROI区域 ({})", regions.len(), args.rois.display());
    for region in &regions {
        log::info!("  {}: {}", region.name(), region.points_string());
    }
    if regions.is_empty() {
        log::warn!("⚠️ ROI文件中没有区域, 所有检测结果都会被过滤");
    }

    // 视频
    let source = VideoSource::open(&args.video)?;
    let info = source.info();
    let video_size = FrameSize {
        width: info.width,
        height: info.height,
    };
    if session.frame_size != video_size {
        log::warn!(
            "⚠️ ROI标注尺寸 {}x{} 与视频尺寸 {}x{} 不一致",
            session.frame_size.width,
            session.frame_size.height,
            info.width,
            info.height
        );
    }

    // 模型
    ensure_model(&args.model, args.model_url.as_deref())?;
    let model = YOLOv8::new(YOLOv8Config {
        model: args.model.clone(),
        ep: OrtEP::from_flags(args.cuda, args.trt, args.device_id),
        conf: config.conf_threshold,
        iou: config.iou_threshold,
        profile: args.profile,
    })?;
    model.summary();

    let saver = match &args.save_frames {
        Some(dir) => Some(FrameSaver::new(
            dir.clone(),
            regions.clone(),
            load_font(args.font.as_deref()),
        )?),
        None => None,
    };

    let stop = Arc::new(AtomicBool::new(false));
    let flag = stop.clone();
    ctrlc::set_handler(move || flag.store(true, Ordering::Relaxed))
        .context("无法注册 Ctrl+C 处理器")?;

    // 解码线程 → 推理线程 → 渲染线程
    let (frame_tx, frame_rx) = bounded(QUEUE_SIZE);
    let (render_tx, render_rx) = bounded(QUEUE_SIZE);
    let decoder = source.spawn_decoder(frame_tx, stop.clone())?;
    let detector = Detector::new(
        model,
        DetectionFilter::new(&config.allowed_class_ids, regions.clone()),
        info.total_frames,
    );
    let inference = spawn_detector(detector, frame_rx, render_tx, stop.clone())?;
    let workers = vec![decoder, inference];

    if args.headless {
        log::info!("🖥️ 无窗口模式, 按 Ctrl+C 退出");
        run_headless(render_rx, stop, saver, workers);
    } else {
        let conf = window_conf("YOLOv8 ROI Detection", info.width, info.height);
        let app = DetectApp::new(render_rx, stop, regions, saver, workers);
        macroquad::Window::from_config(conf, app.run());
    }
    Ok(())
}
