//! 配置参数: 命令行 (clap) + 检测配置文件 (JSON)

use std::fs;
use std::path::{Path, PathBuf};

use clap::Parser;
use serde::{Deserialize, Serialize};

/// ROI多边形标注工具参数
#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "ROI多边形标注工具 - 在视频首帧上绘制区域", long_about = None)]
pub struct MapperArgs {
    /// 视频文件路径
    #[arg(default_value = "intersectionRoad1.mp4")]
    pub video: PathBuf,

    /// 输出根目录 (每次会话创建 <视频名>_<时间戳> 子目录)
    #[arg(short, long, default_value = "roi_mapping_results")]
    pub output: PathBuf,

    /// 标注字体 (TTF), 缺省时使用缓存/下载的 Arial.ttf
    #[arg(long)]
    pub font: Option<PathBuf>,
}

/// ROI区域过滤检测参数
#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "YOLOv8 目标检测 + ROI区域与类别过滤", long_about = None)]
pub struct DetectArgs {
    /// 视频文件路径
    #[arg(default_value = "intersectionRoad1.mp4")]
    pub video: PathBuf,

    /// ROI文件 (roi-mapper 生成的 roi_polygons.json)
    #[arg(short, long)]
    pub rois: PathBuf,

    /// ONNX 模型路径
    #[arg(short, long, default_value = "models/yolov8n.onnx")]
    pub model: PathBuf,

    /// 模型文件不存在时的下载地址
    #[arg(long)]
    pub model_url: Option<String>,

    /// 检测配置文件 (JSON), 不存在时创建默认配置
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// 保留的类别ID (逗号分隔), 覆盖配置文件
    #[arg(long, value_delimiter = ',')]
    pub classes: Option<Vec<usize>>,

    /// 置信度阈值, 覆盖配置文件
    #[arg(long)]
    pub conf: Option<f32>,

    /// NMS IOU阈值, 覆盖配置文件
    #[arg(long)]
    pub iou: Option<f32>,

    /// 使用 CUDA
    #[arg(long)]
    pub cuda: bool,

    /// 使用 TensorRT
    #[arg(long)]
    pub trt: bool,

    /// GPU 设备ID
    #[arg(long, default_value_t = 0)]
    pub device_id: i32,

    /// 无窗口模式 (只输出日志)
    #[arg(long)]
    pub headless: bool,

    /// 保存标注后的帧到该目录
    #[arg(long)]
    pub save_frames: Option<PathBuf>,

    /// 标注字体 (TTF), 仅 --save-frames 使用
    #[arg(long)]
    pub font: Option<PathBuf>,

    /// 打印推理耗时
    #[arg(long)]
    pub profile: bool,
}

/// 检测过滤参数配置
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectConfig {
    // COCO 类别ID (1=bicycle, 2=car, 3=motorcycle, 5=bus, 7=truck, 9=traffic light)
    pub allowed_class_ids: Vec<usize>,
    pub conf_threshold: f32, // 检测置信度阈值
    pub iou_threshold: f32,  // NMS IOU阈值
}

impl Default for DetectConfig {
    fn default() -> Self {
        Self {
            allowed_class_ids: vec![1, 2, 3, 5, 7, 9],
            conf_threshold: 0.25,
            iou_threshold: 0.45,
        }
    }
}

impl DetectConfig {
    /// 从JSON文件加载配置
    pub fn load(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(json) => match serde_json::from_str(&json) {
                Ok(config) => {
                    log::info!("✅ 配置已从 {} 加载", path.display());
                    config
                }
                Err(e) => {
                    log::warn!("⚠️ 配置文件解析失败: {}, 使用默认值", e);
                    Self::default()
                }
            },
            Err(_) => {
                log::info!("📝 配置文件不存在,创建默认配置...");
                let config = Self::default();
                config.save(path);
                config
            }
        }
    }

    /// 保存配置到JSON文件
    pub fn save(&self, path: &Path) {
        match serde_json::to_string_pretty(self) {
            Ok(json) => {
                if let Err(e) = fs::write(path, json) {
                    log::error!("❌ 保存配置失败: {}", e);
                } else {
                    log::info!("💾 配置已保存到 {}", path.display());
                }
            }
            Err(e) => log::error!("❌ 序列化配置失败: {}", e),
        }
    }

    /// 配置文件 + 命令行覆盖
    pub fn resolve(args: &DetectArgs) -> Self {
        let mut config = match &args.config {
            Some(path) => Self::load(path),
            None => Self::default(),
        };
        if let Some(classes) = &args.classes {
            config.allowed_class_ids = classes.clone();
        }
        if let Some(conf) = args.conf {
            config.conf_threshold = conf;
        }
        if let Some(iou) = args.iou {
            config.iou_threshold = iou;
        }
        config
    }

    /// 打印当前配置
    pub fn print_summary(&self) {
        log::info!("🎛️ 当前检测配置:");
        log::info!("  保留类别: {:?}", self.allowed_class_ids);
        log::info!("  置信度阈值: {:.2}", self.conf_threshold);
        log::info!("  IOU阈值: {:.2}", self.iou_threshold);
    }
}
