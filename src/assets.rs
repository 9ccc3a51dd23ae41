//! 资源文件: 标注字体 + 模型下载
//!
//! 字体查找顺序: `--font` 指定路径 → 用户配置目录缓存 → 从 Ultralytics 资源地址下载.

use std::io::Read;
use std::path::{Path, PathBuf};

use ab_glyph::FontArc;
use anyhow::{anyhow, Context, Result};

pub const FONT_URL: &str = "https://ultralytics.com/assets/Arial.ttf";
const FONT_FILE: &str = "Arial.ttf";
const CACHE_DIR: &str = "yolov8-roi";

/// HTTP 下载到内存
pub fn fetch_bytes(url: &str) -> Result<Vec<u8>> {
    let response = ureq::get(url)
        .call()
        .with_context(|| format!("下载失败: {}", url))?;
    let mut bytes = Vec::new();
    response
        .into_reader()
        .read_to_end(&mut bytes)
        .with_context(|| format!("读取响应失败: {}", url))?;
    if bytes.is_empty() {
        return Err(anyhow!("下载内容为空: {}", url));
    }
    Ok(bytes)
}

/// 下载文件到指定路径 (先写临时文件再重命名)
pub fn download_to(url: &str, dest: &Path) -> Result<()> {
    let bytes = fetch_bytes(url)?;
    if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("无法创建目录: {}", parent.display()))?;
    }
    let tmp = dest.with_extension("download");
    std::fs::write(&tmp, &bytes).with_context(|| format!("写入失败: {}", tmp.display()))?;
    std::fs::rename(&tmp, dest).with_context(|| format!("重命名失败: {}", dest.display()))?;
    log::info!("⬇️ 已下载 {} → {}", url, dest.display());
    Ok(())
}

fn cached_font_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(CACHE_DIR).join(FONT_FILE))
}

fn font_from_file(path: &Path) -> Result<FontArc> {
    let bytes =
        std::fs::read(path).with_context(|| format!("无法读取字体文件: {}", path.display()))?;
    FontArc::try_from_vec(bytes).map_err(|e| anyhow!("字体文件无效 {}: {}", path.display(), e))
}

/// 加载标注字体; 失败时返回 None (只画几何图形, 不画文字)
pub fn load_font(explicit: Option<&Path>) -> Option<FontArc> {
    if let Some(path) = explicit {
        match font_from_file(path) {
            Ok(font) => return Some(font),
            Err(e) => log::warn!("⚠️ {:#}", e),
        }
    }

    let cached = cached_font_path()?;
    if !cached.exists() {
        if let Err(e) = download_to(FONT_URL, &cached) {
            log::warn!("⚠️ 字体下载失败, 标注图将不包含文字: {:#}", e);
            return None;
        }
    }

    match font_from_file(&cached) {
        Ok(font) => Some(font),
        Err(e) => {
            log::warn!("⚠️ {:#}", e);
            None
        }
    }
}

/// 模型文件不存在时按 `--model-url` 下载; 没有下载地址则报错
pub fn ensure_model(path: &Path, url: Option<&str>) -> Result<()> {
    if path.is_file() {
        return Ok(());
    }
    match url {
        Some(url) => {
            log::info!("⬇️ 模型文件不存在, 开始下载: {}", url);
            download_to(url, path)
        }
        None => Err(anyhow!(
            "模型文件不存在: {} (可用 --model-url 指定下载地址)",
            path.display()
        )),
    }
}
