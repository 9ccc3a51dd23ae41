//! 保存标注结果
//!
//! 所有文件先写入隐藏的暂存目录, 全部成功后再整体重命名到目标目录.
//! 任一步失败时删除暂存目录, 上一次保存的结果保持不变.

use std::fs;
use std::path::{Path, PathBuf};

use ab_glyph::FontArc;
use anyhow::{Context, Result};
use image::RgbImage;

use super::codegen::{generate_code, generate_summary};
use super::{RoiError, RoiSession};
use crate::overlay::{draw_regions, palette_color, RegionStyle};

pub const ANNOTATED_IMAGE: &str = "roi_regions_annotated.jpg";
pub const ORIGINAL_IMAGE: &str = "original_frame.jpg";
pub const POLYGONS_JSON: &str = "roi_polygons.json";
pub const CODE_SNIPPET: &str = "roi_code_for_main.rs";
pub const SUMMARY_TXT: &str = "roi_summary.txt";

/// 一次保存写出的全部文件名
pub const ARTIFACTS: [&str; 5] = [
    ANNOTATED_IMAGE,
    ORIGINAL_IMAGE,
    POLYGONS_JSON,
    CODE_SNIPPET,
    SUMMARY_TXT,
];

/// 会话输出目录名: `<视频名(无扩展名)>_<时间戳>`
pub fn session_folder_name(video: &Path, timestamp: &str) -> String {
    let stem = video
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "video".to_string());
    format!("{}_{}", stem, timestamp)
}

/// 保存结果, 返回最终目录
pub fn save_session(
    output_root: &Path,
    folder_name: &str,
    session: &RoiSession,
    frame: &RgbImage,
    font: Option<&FontArc>,
) -> Result<PathBuf> {
    if session.polygons.is_empty() {
        return Err(RoiError::NoPolygons.into());
    }
    session.validate()?;

    fs::create_dir_all(output_root)
        .with_context(|| format!("无法创建输出目录: {}", output_root.display()))?;

    let target = output_root.join(folder_name);
    let staging = output_root.join(format!(".{}.staging", folder_name));
    let backup = output_root.join(format!(".{}.old", folder_name));
    if staging.exists() {
        fs::remove_dir_all(&staging)
            .with_context(|| format!("无法清理暂存目录: {}", staging.display()))?;
    }

    let generated_on = chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
    let code = generate_code(session, &generated_on);

    let result = write_artifacts(&staging, session, frame, font, &code, &generated_on)
        .and_then(|_| replace_dir(&staging, &target, &backup));
    if let Err(e) = result {
        let _ = fs::remove_dir_all(&staging);
        return Err(e);
    }

    log::info!("💾 已保存 {} 个多边形到 {}", session.polygons.len(), target.display());
    for name in ARTIFACTS {
        log::info!("  - {}", name);
    }
    log::info!("📋 生成的代码片段:\n{}", code);
    Ok(target)
}

fn write_artifacts(
    dir: &Path,
    session: &RoiSession,
    frame: &RgbImage,
    font: Option<&FontArc>,
    code: &str,
    generated_on: &str,
) -> Result<()> {
    fs::create_dir_all(dir).with_context(|| format!("无法创建目录: {}", dir.display()))?;

    let mut annotated = frame.clone();
    draw_regions(
        &mut annotated,
        session.regions(),
        RegionStyle::annotated(),
        font,
        palette_color,
    );
    annotated
        .save(dir.join(ANNOTATED_IMAGE))
        .context("写入标注图失败")?;
    frame.save(dir.join(ORIGINAL_IMAGE)).context("写入原始帧失败")?;

    fs::write(dir.join(POLYGONS_JSON), session.to_json_pretty()?).context("写入JSON失败")?;
    fs::write(dir.join(CODE_SNIPPET), code).context("写入代码片段失败")?;
    fs::write(dir.join(SUMMARY_TXT), generate_summary(session, generated_on))
        .context("写入摘要失败")?;
    Ok(())
}

/// 用暂存目录替换目标目录
fn replace_dir(staging: &Path, target: &Path, backup: &Path) -> Result<()> {
    if target.exists() {
        if backup.exists() {
            fs::remove_dir_all(backup)?;
        }
        fs::rename(target, backup)
            .with_context(|| format!("无法移动旧结果: {}", target.display()))?;
        if let Err(e) = fs::rename(staging, target) {
            let _ = fs::rename(backup, target);
            return Err(e).with_context(|| format!("无法写入结果目录: {}", target.display()));
        }
        if let Err(e) = fs::remove_dir_all(backup) {
            log::warn!("⚠️ 无法删除旧结果 {}: {}", backup.display(), e);
        }
    } else {
        fs::rename(staging, target)
            .with_context(|| format!("无法写入结果目录: {}", target.display()))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roi::{FrameSize, Point, Region};

    fn session(names: &[&str]) -> RoiSession {
        let polygons = names
            .iter()
            .map(|n| {
                Region::new(
                    *n,
                    vec![Point::new(2, 2), Point::new(30, 2), Point::new(16, 20)],
                )
                .unwrap()
            })
            .collect();
        RoiSession::new(
            "20250718_171827",
            "road.mp4",
            FrameSize {
                width: 32,
                height: 24,
            },
            polygons,
        )
        .unwrap()
    }

    #[test]
    fn test_folder_name() {
        assert_eq!(
            session_folder_name(Path::new("videos/road.mp4"), "20250718_171827"),
            "road_20250718_171827"
        );
    }

    #[test]
    fn test_save_writes_all_files() {
        let root = tempfile::tempdir().unwrap();
        let frame = RgbImage::new(32, 24);
        let dir = save_session(root.path(), "road_1", &session(&["road1"]), &frame, None).unwrap();

        for name in ARTIFACTS {
            assert!(dir.join(name).is_file(), "missing {}", name);
        }
        let back = RoiSession::load(dir.join(POLYGONS_JSON)).unwrap();
        assert_eq!(back.polygons[0].name(), "road1");
        // 没有残留暂存目录
        assert_eq!(fs::read_dir(root.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_save_refuses_empty_session() {
        let root = tempfile::tempdir().unwrap();
        let empty = RoiSession::new(
            "t",
            "road.mp4",
            FrameSize {
                width: 4,
                height: 4,
            },
            vec![],
        )
        .unwrap();
        let err = save_session(root.path(), "road_t", &empty, &RgbImage::new(4, 4), None).unwrap_err();
        assert_eq!(err.downcast_ref::<RoiError>(), Some(&RoiError::NoPolygons));
        assert!(!root.path().join("road_t").exists());
    }

    #[test]
    fn test_save_overwrites_same_folder() {
        let root = tempfile::tempdir().unwrap();
        let frame = RgbImage::new(32, 24);
        save_session(root.path(), "road_1", &session(&["road1"]), &frame, None).unwrap();
        let dir = save_session(root.path(), "road_1", &session(&["road1", "road2"]), &frame, None)
            .unwrap();
        let back = RoiSession::load(dir.join(POLYGONS_JSON)).unwrap();
        assert_eq!(back.polygons.len(), 2);
        assert_eq!(fs::read_dir(root.path()).unwrap().count(), 1);
    }
}
