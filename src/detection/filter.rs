//! 检测结果过滤: 类别白名单 → 检测框中心点 → ROI区域 (任一区域包含即保留)

use std::collections::HashSet;

use crate::roi::{Point, Region};
use crate::Bbox;

/// 单个检测结果处理失败
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum DetectionError {
    #[error("non-finite box coordinates for class {class_id}: ({x1}, {y1}, {x2}, {y2})")]
    NonFinite {
        class_id: usize,
        x1: f32,
        y1: f32,
        x2: f32,
        y2: f32,
    },
}

/// 通过过滤的检测结果
#[derive(Debug, Clone, PartialEq)]
pub struct AcceptedDetection {
    pub bbox: Bbox,
    pub label: String,
    pub center: Point,
    pub matched_regions: Vec<String>,
}

impl AcceptedDetection {
    /// 显示文本, 例如 `car 0.87`
    pub fn caption(&self) -> String {
        format!("{} {:.2}", self.label, self.bbox.confidence())
    }
}

/// 单帧过滤统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub raw: usize,
    pub class_rejected: usize,
    pub region_rejected: usize,
    pub errors: usize,
    pub accepted: usize,
}

pub struct DetectionFilter {
    allowed_class_ids: HashSet<usize>,
    regions: Vec<Region>,
}

impl DetectionFilter {
    pub fn new(allowed_class_ids: &[usize], regions: Vec<Region>) -> Self {
        Self {
            allowed_class_ids: allowed_class_ids.iter().copied().collect(),
            regions,
        }
    }

    pub fn is_class_allowed(&self, class_id: usize) -> bool {
        self.allowed_class_ids.contains(&class_id)
    }

    /// 处理单个检测结果; `Ok(None)` 表示被过滤掉
    pub fn process_detection(
        &self,
        bbox: &Bbox,
        label: &str,
    ) -> Result<Option<AcceptedDetection>, DetectionError> {
        if !self.is_class_allowed(bbox.id()) {
            return Ok(None);
        }
        if !bbox.is_finite() {
            return Err(DetectionError::NonFinite {
                class_id: bbox.id(),
                x1: bbox.xmin(),
                y1: bbox.ymin(),
                x2: bbox.xmax(),
                y2: bbox.ymax(),
            });
        }

        let center = bbox.center();
        let matched_regions: Vec<String> = self
            .regions
            .iter()
            .filter(|r| r.contains(center))
            .map(|r| r.name().to_string())
            .collect();
        if matched_regions.is_empty() {
            return Ok(None);
        }

        Ok(Some(AcceptedDetection {
            bbox: bbox.clone(),
            label: label.to_string(),
            center,
            matched_regions,
        }))
    }

    /// 过滤一帧的全部检测结果; 单个结果失败时记录日志并跳过
    pub fn filter_frame(
        &self,
        frame_number: u64,
        bboxes: &[Bbox],
        names: &[String],
    ) -> (Vec<AcceptedDetection>, FrameStats) {
        let mut stats = FrameStats {
            raw: bboxes.len(),
            ..Default::default()
        };
        let mut accepted = Vec::new();

        for bbox in bboxes {
            let label = names.get(bbox.id()).map(String::as_str).unwrap_or("Unknown");
            match self.process_detection(bbox, label) {
                Ok(Some(det)) => accepted.push(det),
                Ok(None) if !self.is_class_allowed(bbox.id()) => stats.class_rejected += 1,
                Ok(None) => stats.region_rejected += 1,
                Err(e) => {
                    stats.errors += 1;
                    log::warn!("⚠️ 帧 {}: 检测结果处理失败, 已跳过: {}", frame_number, e);
                }
            }
        }

        stats.accepted = accepted.len();
        log::debug!(
            "帧 {}: 原始 {} | 类别过滤 {} | 区域过滤 {} | 错误 {} | 保留 {}",
            frame_number,
            stats.raw,
            stats.class_rejected,
            stats.region_rejected,
            stats.errors,
            stats.accepted
        );
        (accepted, stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(name: &str, x: i32, y: i32, size: i32) -> Region {
        Region::new(
            name,
            vec![
                Point::new(x, y),
                Point::new(x + size, y),
                Point::new(x + size, y + size),
                Point::new(x, y + size),
            ],
        )
        .unwrap()
    }

    fn names() -> Vec<String> {
        crate::COCO_NAMES.iter().map(|s| s.to_string()).collect()
    }

    fn filter() -> DetectionFilter {
        DetectionFilter::new(
            &[1, 2, 3, 5, 7, 9],
            vec![square("road1", 0, 0, 100), square("road2", 200, 0, 100)],
        )
    }

    #[test]
    fn test_class_not_allowed_is_rejected() {
        // person (0) 在区域内, 但不在白名单中
        let bbox = Bbox::from_xyxy(10.0, 10.0, 20.0, 20.0, 0, 0.9);
        assert_eq!(filter().process_detection(&bbox, "person"), Ok(None));
    }

    #[test]
    fn test_center_outside_regions_is_rejected() {
        // 框与区域相交, 但中心点 (150, 50) 不在任何区域内
        let bbox = Bbox::from_xyxy(90.0, 40.0, 210.0, 60.0, 2, 0.9);
        assert_eq!(filter().process_detection(&bbox, "car"), Ok(None));
    }

    #[test]
    fn test_any_region_accepts() {
        let bbox = Bbox::from_xyxy(240.0, 40.0, 260.0, 60.0, 7, 0.456);
        let det = filter().process_detection(&bbox, "truck").unwrap().unwrap();
        assert_eq!(det.center, Point::new(250, 50));
        assert_eq!(det.matched_regions, vec!["road2".to_string()]);
        assert_eq!(det.caption(), "truck 0.46");
    }

    #[test]
    fn test_center_on_region_edge_is_accepted() {
        let bbox = Bbox::from_xyxy(90.0, 40.0, 110.0, 60.0, 2, 0.5);
        assert!(filter().process_detection(&bbox, "car").unwrap().is_some());
    }

    #[test]
    fn test_overlapping_regions_all_reported() {
        let f = DetectionFilter::new(&[2], vec![square("a", 0, 0, 100), square("b", 50, 50, 100)]);
        let bbox = Bbox::from_xyxy(70.0, 70.0, 80.0, 80.0, 2, 0.9);
        let det = f.process_detection(&bbox, "car").unwrap().unwrap();
        assert_eq!(det.matched_regions, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_non_finite_is_error() {
        let bbox = Bbox::from_xyxy(f32::NAN, 10.0, 20.0, 20.0, 2, 0.9);
        assert!(matches!(
            filter().process_detection(&bbox, "car"),
            Err(DetectionError::NonFinite { class_id: 2, .. })
        ));
    }

    #[test]
    fn test_filter_frame_skips_bad_detection() {
        let bboxes = vec![
            Bbox::from_xyxy(10.0, 10.0, 20.0, 20.0, 2, 0.9),
            Bbox::from_xyxy(f32::INFINITY, 10.0, 20.0, 20.0, 2, 0.9),
            Bbox::from_xyxy(10.0, 10.0, 20.0, 20.0, 0, 0.9),
            Bbox::from_xyxy(500.0, 500.0, 520.0, 520.0, 3, 0.9),
            Bbox::from_xyxy(210.0, 10.0, 220.0, 20.0, 5, 0.8),
        ];
        let (accepted, stats) = filter().filter_frame(7, &bboxes, &names());
        assert_eq!(accepted.len(), 2);
        assert_eq!(accepted[0].label, "car");
        assert_eq!(accepted[1].label, "bus");
        assert_eq!(
            stats,
            FrameStats {
                raw: 5,
                class_rejected: 1,
                region_rejected: 1,
                errors: 1,
                accepted: 2,
            }
        );
    }

    #[test]
    fn test_no_regions_rejects_everything() {
        let f = DetectionFilter::new(&[2], vec![]);
        let bbox = Bbox::from_xyxy(10.0, 10.0, 20.0, 20.0, 2, 0.9);
        assert_eq!(f.process_detection(&bbox, "car"), Ok(None));
    }
}
