//! 生成可直接复用的 Rust 代码片段 (`roi_code_for_main.rs`) 和文本摘要
//!
//! 代码片段内嵌多边形常量 + `is_inside_polygon` 判定函数 (与 geometry.rs 同一算法).

use std::collections::HashSet;
use std::fmt::Write as _;

use once_cell::sync::Lazy;
use regex::Regex;

use super::{Region, RoiSession};

static NON_IDENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^A-Za-z0-9_]+").unwrap());

/// 判定函数源码, 写入生成的代码片段
const HELPER_SOURCE: &str = r#"/// Returns true if (x, y) lies inside the polygon or on its boundary.
pub fn is_inside_polygon(x: i32, y: i32, polygon: &[(i32, i32)]) -> bool {
    let (px, py) = (x as i128, y as i128);
    let n = polygon.len();
    let mut inside = false;
    for i in 0..n {
        let (ax, ay) = (polygon[i].0 as i128, polygon[i].1 as i128);
        let (bx, by) = (polygon[(i + 1) % n].0 as i128, polygon[(i + 1) % n].1 as i128);
        let cross = (bx - ax) * (py - ay) - (by - ay) * (px - ax);
        if cross == 0
            && px >= ax.min(bx)
            && px <= ax.max(bx)
            && py >= ay.min(by)
            && py <= ay.max(by)
        {
            return true;
        }
        if (ay > py) != (by > py) {
            let lhs = (px - ax) * (by - ay);
            let rhs = (py - ay) * (bx - ax);
            if (by > ay && lhs < rhs) || (by < ay && lhs > rhs) {
                inside = !inside;
            }
        }
    }
    inside
}
"#;

/// 区域名 → Rust 常量名 (大写, 非法字符替换为 `_`)
pub fn const_ident(name: &str) -> String {
    let ident = NON_IDENT
        .replace_all(name.trim(), "_")
        .trim_matches('_')
        .to_uppercase();
    if ident.is_empty() {
        "ROI".to_string()
    } else if ident.starts_with(|c: char| c.is_ascii_digit()) {
        format!("ROI_{}", ident)
    } else {
        ident
    }
}

/// 为每个区域分配唯一常量名 (`<NAME>_POINTS`)
pub fn point_const_names(regions: &[Region]) -> Vec<String> {
    let mut used = HashSet::new();
    regions
        .iter()
        .map(|region| {
            let base = const_ident(region.name());
            let mut candidate = format!("{}_POINTS", base);
            let mut suffix = 2;
            while !used.insert(candidate.clone()) {
                candidate = format!("{}_{}_POINTS", base, suffix);
                suffix += 1;
            }
            candidate
        })
        .collect()
}

/// 生成 `roi_code_for_main.rs`
pub fn generate_code(session: &RoiSession, generated_on: &str) -> String {
    let regions = session.regions();
    let names = point_const_names(regions);
    let mut out = String::new();

    let _ = writeln!(out, "// ROI Polygon Code for YOLOv8 Traffic Detection");
    let _ = writeln!(out, "// Generated on: {}", generated_on);
    let _ = writeln!(out, "// Video: {}", session.video_file);
    let _ = writeln!(
        out,
        "// Frame size: {}x{}",
        session.frame_size.width, session.frame_size.height
    );
    out.push('\n');

    for (region, const_name) in regions.iter().zip(&names) {
        let _ = writeln!(out, "// {} polygon points", region.name());
        let _ = writeln!(
            out,
            "pub const {}: &[(i32, i32)] = &{};",
            const_name,
            region.points_string()
        );
        out.push('\n');
    }

    out.push_str(HELPER_SOURCE);
    out.push('\n');

    let _ = writeln!(out, "// Usage in detection loop:");
    let _ = writeln!(out, "// Get center point of detected object");
    let _ = writeln!(out, "// let center_x = ((x1 + x2) / 2.0) as i32;");
    let _ = writeln!(out, "// let center_y = ((y1 + y2) / 2.0) as i32;");
    for (region, const_name) in regions.iter().zip(&names) {
        out.push('\n');
        let _ = writeln!(out, "// Check if object is inside {}", region.name());
        let _ = writeln!(
            out,
            "// if is_inside_polygon(center_x, center_y, {}) {{",
            const_name
        );
        let _ = writeln!(out, "//     println!(\"Object detected in {}\");", region.name());
        let _ = writeln!(out, "// }}");
    }

    out
}

/// 生成 `roi_summary.txt`
pub fn generate_summary(session: &RoiSession, generated_on: &str) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "ROI POLYGON MAPPING SUMMARY");
    let _ = writeln!(out, "{}", "=".repeat(40));
    out.push('\n');
    let _ = writeln!(out, "Date/Time: {}", generated_on);
    let _ = writeln!(out, "Video File: {}", session.video_file);
    let _ = writeln!(
        out,
        "Frame Size: {}x{}",
        session.frame_size.width, session.frame_size.height
    );
    let _ = writeln!(out, "Total Polygons: {}", session.polygons.len());
    out.push('\n');

    for (i, region) in session.regions().iter().enumerate() {
        let _ = writeln!(out, "POLYGON {}: {}", i + 1, region.name());
        let _ = writeln!(
            out,
            "Points ({}): {}",
            region.points().len(),
            region.points_string()
        );
        out.push('\n');
    }

    let _ = writeln!(out, "INSTRUCTIONS:");
    let _ = writeln!(out, "{}", "-".repeat(20));
    let _ = writeln!(
        out,
        "1. Run roi-detect with --rois pointing at 'roi_polygons.json'"
    );
    let _ = writeln!(
        out,
        "2. Or copy the polygon constants from 'roi_code_for_main.rs'"
    );
    let _ = writeln!(
        out,
        "3. Use is_inside_polygon() with the box center to check detections"
    );
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roi::{FrameSize, Point};

    fn region(name: &str) -> Region {
        Region::new(
            name,
            vec![Point::new(1, 2), Point::new(30, 4), Point::new(5, 60)],
        )
        .unwrap()
    }

    fn session(regions: Vec<Region>) -> RoiSession {
        RoiSession::new(
            "20250718_171827",
            "straightroad.mp4",
            FrameSize {
                width: 640,
                height: 360,
            },
            regions,
        )
        .unwrap()
    }

    #[test]
    fn test_const_ident() {
        assert_eq!(const_ident("road1"), "ROAD1");
        assert_eq!(const_ident("Left lane #2"), "LEFT_LANE_2");
        assert_eq!(const_ident("1st"), "ROI_1ST");
        assert_eq!(const_ident("---"), "ROI");
    }

    #[test]
    fn test_colliding_idents_get_suffix() {
        let names = point_const_names(&[region("road 1"), region("road_1"), region("road-1")]);
        assert_eq!(
            names,
            vec!["ROAD_1_POINTS", "ROAD_1_2_POINTS", "ROAD_1_3_POINTS"]
        );
    }

    #[test]
    fn test_generate_code() {
        let code = generate_code(&session(vec![region("road1")]), "2025-07-18 17:21:20");
        assert!(code.starts_with("// ROI Polygon Code for YOLOv8 Traffic Detection\n"));
        assert!(code.contains("// Video: straightroad.mp4"));
        assert!(code.contains("// Frame size: 640x360"));
        assert!(code.contains("pub const ROAD1_POINTS: &[(i32, i32)] = &[(1, 2), (30, 4), (5, 60)];"));
        assert!(code.contains("pub fn is_inside_polygon(x: i32, y: i32, polygon: &[(i32, i32)]) -> bool"));
        assert!(code.contains("// if is_inside_polygon(center_x, center_y, ROAD1_POINTS) {"));
        // 判定函数用 i128 计算叉积, 极端坐标不溢出
        assert!(code.contains("(x as i128, y as i128)"));
        assert!(!code.contains("i64"));
    }

    #[test]
    fn test_generate_summary() {
        let summary = generate_summary(
            &session(vec![region("road1"), region("road2")]),
            "2025-07-18 17:21:20",
        );
        assert!(summary.contains("Total Polygons: 2"));
        assert!(summary.contains("POLYGON 2: road2"));
        assert!(summary.contains("Points (3): [(1, 2), (30, 4), (5, 60)]"));
    }
}
