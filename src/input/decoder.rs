/// 视频文件解码器
/// Video file decoder (FFmpeg software decoding)
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use crossbeam_channel::{bounded, Sender};
use ez_ffmpeg::core::context::null_output::create_null_output;
use ez_ffmpeg::filter::frame_pipeline_builder::FramePipelineBuilder;
use ez_ffmpeg::stream_info::{find_video_stream_info, StreamInfo};
use ez_ffmpeg::{AVMediaType, FfmpegContext, Input};
use image::RgbaImage;

use super::decode_filter::DecodeFilter;
use crate::detection::types::DecodedFrame;

/// 视频流信息
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VideoInfo {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    /// 容器中记录的总帧数, 未知时为 0
    pub total_frames: u64,
}

/// 已打开的视频文件
#[derive(Debug, Clone)]
pub struct VideoSource {
    path: PathBuf,
    info: VideoInfo,
}

impl VideoSource {
    /// 打开视频文件并读取流信息
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if !path.is_file() {
            return Err(anyhow!("Could not open video file: {} (not found)", path.display()));
        }
        std::fs::File::open(&path)
            .with_context(|| format!("Could not open video file: {}", path.display()))?;

        let url = path_str(&path)?;
        let info = match find_video_stream_info(url) {
            Ok(Some(StreamInfo::Video {
                width,
                height,
                fps,
                nb_frames,
                ..
            })) => VideoInfo {
                width: width as u32,
                height: height as u32,
                fps: fps as f64,
                total_frames: nb_frames.max(0) as u64,
            },
            Ok(_) => {
                return Err(anyhow!(
                    "Could not open video file: {} (no video stream)",
                    path.display()
                ))
            }
            Err(e) => {
                return Err(anyhow!(
                    "Could not open video file: {} ({})",
                    path.display(),
                    e
                ))
            }
        };

        log::info!(
            "🎬 Video loaded: {}x{}, {:.0} FPS, {} frames",
            info.width,
            info.height,
            info.fps,
            info.total_frames
        );
        Ok(Self { path, info })
    }

    pub fn info(&self) -> VideoInfo {
        self.info
    }

    /// 启动解码线程; 解码结束 (或停止) 后发送端被释放, 接收端据此判断视频结束
    pub fn spawn_decoder(
        &self,
        tx: Sender<DecodedFrame>,
        stop: Arc<AtomicBool>,
    ) -> Result<JoinHandle<()>> {
        let url = path_str(&self.path)?.to_string();
        let filter = DecodeFilter::new(tx, stop.clone());
        let handle = std::thread::Builder::new()
            .name("decode".into())
            .spawn(move || {
                log::info!("🎬 解码线程启动: {}", url);
                match decode(&url, filter) {
                    Ok(()) => log::info!("✅ 解码线程正常退出"),
                    Err(e) if stop.load(Ordering::Relaxed) => {
                        log::debug!("解码已停止: {:#}", e)
                    }
                    Err(e) => log::warn!("⚠️ 解码结束: {:#}", e),
                }
            })
            .context("无法启动解码线程")?;
        Ok(handle)
    }

    /// 只解码第一帧
    pub fn read_first_frame(&self) -> Result<RgbaImage> {
        let url = path_str(&self.path)?;
        let (tx, rx) = bounded(1);
        let stop = Arc::new(AtomicBool::new(false));
        let filter = DecodeFilter::new(tx, stop).with_limit(1);

        // 读到一帧后过滤器返回错误以停止解码, 这里不关心结果
        if let Err(e) = decode(url, filter) {
            log::debug!("首帧解码结束: {:#}", e);
        }

        rx.recv_timeout(Duration::from_millis(100))
            .map(|frame| frame.image)
            .map_err(|_| anyhow!("Could not read first frame: {}", self.path.display()))
    }
}

fn path_str(path: &Path) -> Result<&str> {
    path.to_str()
        .ok_or_else(|| anyhow!("视频路径不是有效的UTF-8: {}", path.display()))
}

/// 运行 FFmpeg 解码管线直到视频结束或过滤器要求停止
fn decode(url: &str, filter: DecodeFilter) -> Result<()> {
    let pipe: FramePipelineBuilder = AVMediaType::AVMEDIA_TYPE_VIDEO.into();
    let pipe = pipe.filter("decode", Box::new(filter));
    let out = create_null_output().add_frame_pipeline(pipe);

    let ctx = FfmpegContext::builder()
        .input(Input::new(url))
        .filter_descs(["format=yuv420p"].into())
        .output(out)
        .build()
        .map_err(|e| anyhow!("构建失败: {}", e))?;

    let sch = ctx.start().map_err(|e| anyhow!("启动失败: {}", e))?;
    sch.wait().map_err(|e| anyhow!("{}", e))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_missing_file() {
        let err = VideoSource::open("does/not/exist.mp4").unwrap_err();
        assert!(err.to_string().contains("Could not open video file"));
    }

    #[test]
    fn test_open_non_video_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.mp4");
        std::fs::write(&path, b"plain text").unwrap();
        assert!(VideoSource::open(&path).is_err());
    }
}
