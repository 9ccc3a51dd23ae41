/// ROI多边形数据模型 (Region of Interest)
/// Polygon ROI data model
///
/// - Region:     命名多边形 (至少3个点, 顶点顺序即边的顺序, 末点隐式连回首点)
/// - RoiSession: 一次标注会话 (时间戳 + 视频 + 帧尺寸 + 多边形列表), JSON持久化
/// - geometry:   点在多边形内判定
/// - persist:    保存标注结果 (图片/JSON/代码片段/摘要, 整组原子写入)
pub mod codegen;
pub mod geometry;
pub mod persist;

use std::collections::HashSet;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

pub use geometry::point_in_polygon;

/// 多边形最少顶点数
pub const MIN_POLYGON_POINTS: usize = 3;

/// ROI 相关错误
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum RoiError {
    #[error("polygon '{name}' needs at least 3 points, got {count}")]
    TooFewPoints { name: String, count: usize },

    #[error("polygon name must not be empty")]
    EmptyName,

    #[error("polygon name '{0}' is already used in this session")]
    DuplicateName(String),

    #[error("no polygons to save")]
    NoPolygons,
}

/// 像素坐标点, JSON 中序列化为 `[x, y]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "(i32, i32)", into = "(i32, i32)")]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

impl From<(i32, i32)> for Point {
    fn from((x, y): (i32, i32)) -> Self {
        Self { x, y }
    }
}

impl From<Point> for (i32, i32) {
    fn from(p: Point) -> Self {
        (p.x, p.y)
    }
}

impl std::fmt::Display for Point {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// 命名多边形区域
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawRegion")]
pub struct Region {
    name: String,
    points: Vec<Point>,
}

#[derive(Deserialize)]
struct RawRegion {
    name: String,
    points: Vec<Point>,
}

impl TryFrom<RawRegion> for Region {
    type Error = RoiError;

    fn try_from(raw: RawRegion) -> Result<Self, Self::Error> {
        Region::new(raw.name, raw.points)
    }
}

impl Region {
    pub fn new(name: impl Into<String>, points: Vec<Point>) -> Result<Self, RoiError> {
        let name = name.into().trim().to_string();
        if name.is_empty() {
            return Err(RoiError::EmptyName);
        }
        if points.len() < MIN_POLYGON_POINTS {
            return Err(RoiError::TooFewPoints {
                name,
                count: points.len(),
            });
        }
        Ok(Self { name, points })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    /// 点是否在区域内部或边界上
    pub fn contains(&self, p: Point) -> bool {
        point_in_polygon(p, &self.points)
    }

    /// 标签锚点 (第一个顶点)
    pub fn label_anchor(&self) -> Point {
        self.points[0]
    }

    /// 顶点列表的文本形式, 例如 `[(1, 2), (3, 4), (5, 6)]`
    pub fn points_string(&self) -> String {
        let items: Vec<String> = self.points.iter().map(|p| p.to_string()).collect();
        format!("[{}]", items.join(", "))
    }
}

/// 任一区域包含该点 (逻辑或)
pub fn any_region_contains(regions: &[Region], p: Point) -> bool {
    regions.iter().any(|r| r.contains(p))
}

/// 视频帧尺寸
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameSize {
    pub width: u32,
    pub height: u32,
}

/// 标注会话文档 (`roi_polygons.json`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoiSession {
    pub timestamp: String,
    pub video_file: String,
    pub frame_size: FrameSize,
    pub polygons: Vec<Region>,
}

impl RoiSession {
    pub fn new(
        timestamp: impl Into<String>,
        video_file: impl Into<String>,
        frame_size: FrameSize,
        polygons: Vec<Region>,
    ) -> Result<Self, RoiError> {
        let session = Self {
            timestamp: timestamp.into(),
            video_file: video_file.into(),
            frame_size,
            polygons,
        };
        session.validate()?;
        Ok(session)
    }

    /// 检查区域名称唯一
    pub fn validate(&self) -> Result<(), RoiError> {
        let mut seen = HashSet::new();
        for region in &self.polygons {
            if !seen.insert(region.name()) {
                return Err(RoiError::DuplicateName(region.name().to_string()));
            }
        }
        Ok(())
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let session: RoiSession =
            serde_json::from_str(json).context("ROI文件解析失败 (roi_polygons.json 格式错误)")?;
        session.validate()?;
        Ok(session)
    }

    /// 从 `roi_polygons.json` 加载
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("无法读取ROI文件: {}", path.display()))?;
        Self::from_json(&json).with_context(|| format!("ROI文件无效: {}", path.display()))
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn regions(&self) -> &[Region] {
        &self.polygons
    }
}
