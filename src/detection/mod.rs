/// 检测系统 (Detection System)
///
/// 独立工作线程,负责检测与ROI过滤
/// - Detector: 目标检测 + 过滤 (推理线程)
/// - Filter:   类别白名单 + 检测框中心点ROI判定
/// - App:      渲染线程 / 无窗口模式
pub mod app;
pub mod detector;
pub mod filter;
pub mod types;

pub use app::{run_headless, DetectApp, FrameSaver};
pub use detector::{spawn_detector, Detector};
pub use filter::{AcceptedDetection, DetectionError, DetectionFilter, FrameStats};
pub use types::{DecodedFrame, RenderData};
