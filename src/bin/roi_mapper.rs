/// ROI多边形标注工具
/// 在视频第一帧上绘制命名多边形, 保存为图片/JSON/代码片段/摘要
///
/// 运行: cargo run --bin roi-mapper -- intersectionRoad1.mp4 -o roi_mapping_results
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use yolov8_roi::assets::load_font;
use yolov8_roi::input::VideoSource;
use yolov8_roi::mapper::MapperApp;
use yolov8_roi::renderer::window_conf;
use yolov8_roi::MapperArgs;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(e) = run() {
        log::error!("❌ {:#}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let args = MapperArgs::parse();

    let source = VideoSource::open(&args.video)?;
    let frame = source.read_first_frame()?;
    let font = load_font(args.font.as_deref());

    let quit = Arc::new(AtomicBool::new(false));
    let flag = quit.clone();
    ctrlc::set_handler(move || flag.store(true, Ordering::Relaxed))
        .context("无法注册 Ctrl+C 处理器")?;

    MapperApp::print_instructions();
    let conf = window_conf("ROI Polygon Mapper", frame.width(), frame.height());
    let app = MapperApp::new(args.video, frame, args.output, font, quit);
    macroquad::Window::from_config(conf, app.run());
    Ok(())
}
