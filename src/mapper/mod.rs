/// ROI交互标注 (ROI polygon mapper)
///
/// - MapperState: 标注状态机 (不依赖窗口, 可单元测试)
/// - MapperApp:   macroquad 窗口 + egui 命名对话框
pub mod app;

pub use app::MapperApp;

use crate::roi::{FrameSize, Point, Region, RoiError, RoiSession, MIN_POLYGON_POINTS};

#[derive(Debug, Default)]
pub struct MapperState {
    current: Vec<Point>,
    regions: Vec<Region>,
    naming: bool,
    /// 命名对话框的输入内容
    pub name_input: String,
}

impl MapperState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> &[Point] {
        &self.current
    }

    pub fn regions(&self) -> &[Region] {
        &self.regions
    }

    pub fn is_naming(&self) -> bool {
        self.naming
    }

    /// 左键: 添加顶点 (命名时忽略)
    pub fn add_point(&mut self, p: Point) -> bool {
        if self.naming {
            return false;
        }
        self.current.push(p);
        log::info!("➕ Added point: {}", p);
        true
    }

    /// 右键: 结束当前多边形, 打开命名对话框
    pub fn begin_finish(&mut self) -> Result<(), RoiError> {
        if self.naming {
            return Ok(());
        }
        if self.current.len() < MIN_POLYGON_POINTS {
            log::warn!("⚠️ Need at least 3 points for a polygon!");
            return Err(RoiError::TooFewPoints {
                name: self.default_name(),
                count: self.current.len(),
            });
        }
        self.naming = true;
        self.name_input.clear();
        Ok(())
    }

    /// 默认名称 `ROI_<n>`, 与已有名称冲突时递增
    pub fn default_name(&self) -> String {
        let mut n = self.regions.len() + 1;
        loop {
            let name = format!("ROI_{}", n);
            if !self.has_name(&name) {
                return name;
            }
            n += 1;
        }
    }

    fn has_name(&self, name: &str) -> bool {
        self.regions.iter().any(|r| r.name() == name)
    }

    /// 确认名称并保存当前多边形; 名称重复时保持对话框打开
    pub fn commit_name(&mut self, input: &str) -> Result<&Region, RoiError> {
        let name = match input.trim() {
            "" => self.default_name(),
            name => name.to_string(),
        };
        if self.has_name(&name) {
            log::warn!("⚠️ 名称 '{}' 已存在, 请换一个", name);
            return Err(RoiError::DuplicateName(name));
        }

        let region = Region::new(name, self.current.clone())?;
        log::info!(
            "✅ Polygon '{}' completed with {} points",
            region.name(),
            region.points().len()
        );
        log::info!("   Points: {}", region.points_string());

        self.current.clear();
        self.naming = false;
        self.name_input.clear();
        self.regions.push(region);
        Ok(&self.regions[self.regions.len() - 1])
    }

    /// 取消命名, 保留当前顶点
    pub fn cancel_naming(&mut self) {
        self.naming = false;
        self.name_input.clear();
    }

    /// 'c': 清除当前多边形
    pub fn clear_current(&mut self) {
        self.current.clear();
        self.cancel_naming();
        log::info!("🧹 Current polygon cleared");
    }

    /// 'r': 清除全部
    pub fn reset_all(&mut self) {
        self.current.clear();
        self.regions.clear();
        self.cancel_naming();
        log::info!("🧹 All polygons reset");
    }

    pub fn should_autosave(&self) -> bool {
        !self.regions.is_empty()
    }

    pub fn to_session(
        &self,
        timestamp: &str,
        video_file: &str,
        frame_size: FrameSize,
    ) -> Result<RoiSession, RoiError> {
        if self.regions.is_empty() {
            return Err(RoiError::NoPolygons);
        }
        RoiSession::new(timestamp, video_file, frame_size, self.regions.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_points(n: i32) -> MapperState {
        let mut s = MapperState::new();
        for i in 0..n {
            s.add_point(Point::new(i * 10, (i % 2) * 10));
        }
        s
    }

    #[test]
    fn test_finish_needs_three_points() {
        let mut s = with_points(2);
        assert!(matches!(
            s.begin_finish(),
            Err(RoiError::TooFewPoints { count: 2, .. })
        ));
        assert!(!s.is_naming());
        assert_eq!(s.current().len(), 2);
    }

    #[test]
    fn test_default_names() {
        let mut s = with_points(3);
        s.begin_finish().unwrap();
        assert_eq!(s.commit_name("   ").unwrap().name(), "ROI_1");

        for p in with_points(3).current() {
            s.add_point(*p);
        }
        s.begin_finish().unwrap();
        assert_eq!(s.commit_name("").unwrap().name(), "ROI_2");
        assert!(s.current().is_empty());
    }

    #[test]
    fn test_default_name_skips_taken() {
        let mut s = with_points(3);
        s.begin_finish().unwrap();
        s.commit_name("ROI_2").unwrap();
        // 下一个默认名称 ROI_2 已被占用
        assert_eq!(s.default_name(), "ROI_3");
    }

    #[test]
    fn test_duplicate_name_keeps_prompt_open() {
        let mut s = with_points(3);
        s.begin_finish().unwrap();
        s.commit_name(" road1 ").unwrap();

        for p in with_points(4).current() {
            s.add_point(*p);
        }
        s.begin_finish().unwrap();
        assert_eq!(
            s.commit_name("road1").unwrap_err(),
            RoiError::DuplicateName("road1".to_string())
        );
        assert!(s.is_naming());
        assert_eq!(s.current().len(), 4);
        assert_eq!(s.commit_name("road2").unwrap().name(), "road2");
        assert_eq!(s.regions().len(), 2);
    }

    #[test]
    fn test_points_ignored_while_naming() {
        let mut s = with_points(3);
        s.begin_finish().unwrap();
        assert!(!s.add_point(Point::new(1, 1)));
        s.cancel_naming();
        assert!(s.add_point(Point::new(1, 1)));
        assert_eq!(s.current().len(), 4);
    }

    #[test]
    fn test_clear_and_reset() {
        let mut s = with_points(3);
        s.begin_finish().unwrap();
        s.commit_name("a").unwrap();
        s.add_point(Point::new(5, 5));

        s.clear_current();
        assert!(s.current().is_empty());
        assert!(s.should_autosave());

        s.reset_all();
        assert!(s.regions().is_empty());
        assert!(!s.should_autosave());
    }

    #[test]
    fn test_to_session() {
        let size = FrameSize {
            width: 640,
            height: 360,
        };
        let mut s = MapperState::new();
        assert_eq!(
            s.to_session("t", "v.mp4", size).unwrap_err(),
            RoiError::NoPolygons
        );

        for p in with_points(3).current() {
            s.add_point(*p);
        }
        s.begin_finish().unwrap();
        s.commit_name("road1").unwrap();
        let session = s.to_session("20250718_171827", "v.mp4", size).unwrap();
        assert_eq!(session.polygons.len(), 1);
        assert_eq!(session.frame_size, size);
    }
}
