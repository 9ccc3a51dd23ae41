/// FFmpeg解码过滤器模块
/// FFmpeg decode filter module
///
/// 视频文件 → RGBA帧, 通过有界通道阻塞发送 (背压, 文件输入不丢帧)
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crossbeam_channel::Sender;
use ez_ffmpeg::filter::frame_filter::FrameFilter;
use ez_ffmpeg::filter::frame_filter_context::FrameFilterContext;
use ez_ffmpeg::{AVMediaType, Frame};
use image::RgbaImage;

use crate::detection::types::DecodedFrame;

/// 停止解码时返回给 FFmpeg 的错误信息
pub const STOPPED: &str = "decode stopped";
pub const LIMIT_REACHED: &str = "frame limit reached";
pub const RECEIVER_CLOSED: &str = "receiver closed";

#[derive(Clone)]
pub struct DecodeFilter {
    tx: Sender<DecodedFrame>,
    stop: Arc<AtomicBool>,
    limit: Option<u64>,
    sent: u64,
    dropped: u64,
}

impl DecodeFilter {
    pub fn new(tx: Sender<DecodedFrame>, stop: Arc<AtomicBool>) -> Self {
        Self {
            tx,
            stop,
            limit: None,
            sent: 0,
            dropped: 0,
        }
    }

    /// 发送 n 帧后停止解码
    pub fn with_limit(mut self, n: u64) -> Self {
        self.limit = Some(n);
        self
    }
}

impl FrameFilter for DecodeFilter {
    fn media_type(&self) -> AVMediaType {
        AVMediaType::AVMEDIA_TYPE_VIDEO
    }

    fn init(&mut self, _ctx: &FrameFilterContext) -> Result<(), String> {
        log::debug!("✅ 解码线程启动");
        Ok(())
    }

    fn filter_frame(
        &mut self,
        frame: Frame,
        _ctx: &FrameFilterContext,
    ) -> Result<Option<Frame>, String> {
        if self.stop.load(Ordering::Relaxed) {
            return Err(STOPPED.to_string());
        }
        if self.limit.is_some_and(|n| self.sent >= n) {
            return Err(LIMIT_REACHED.to_string());
        }

        let image = match unsafe { frame_to_rgba(&frame) } {
            Some(image) => image,
            None => {
                self.dropped += 1;
                if self.dropped <= 10 {
                    log::warn!("⚠️ 丢弃帧 #{}: 空帧/损坏帧", self.sent + self.dropped);
                }
                return Ok(None);
            }
        };

        if self.tx.send(DecodedFrame { image }).is_err() {
            return Err(RECEIVER_CLOSED.to_string());
        }
        self.sent += 1;

        if self.limit.is_some_and(|n| self.sent >= n) {
            return Err(LIMIT_REACHED.to_string());
        }
        Ok(Some(frame))
    }

    fn uninit(&mut self, _ctx: &FrameFilterContext) {
        log::debug!(
            "✅ 解码线程退出: 发送 {} 帧, 丢弃 {} 帧",
            self.sent,
            self.dropped
        );
    }
}

/// YUV420P 帧 → RGBA 图像; 非法帧返回 None
///
/// # Safety
/// `frame` 必须是 FFmpeg 解码得到的 YUV420P 视频帧.
unsafe fn frame_to_rgba(frame: &Frame) -> Option<RgbaImage> {
    if frame.as_ptr().is_null() || frame.is_empty() || frame.is_corrupt() {
        return None;
    }
    let av = &*frame.as_ptr();
    if av.width <= 0 || av.height <= 0 {
        return None;
    }
    let (w, h) = (av.width as usize, av.height as usize);
    if av.linesize[0] <= 0 || av.linesize[1] <= 0 || av.linesize[2] <= 0 {
        return None;
    }
    let y_stride = av.linesize[0] as usize;
    let u_stride = av.linesize[1] as usize;
    let v_stride = av.linesize[2] as usize;
    let (cw, ch) = ((w + 1) / 2, (h + 1) / 2);
    if y_stride < w || u_stride < cw || v_stride < cw {
        return None;
    }
    if av.data[0].is_null() || av.data[1].is_null() || av.data[2].is_null() {
        return None;
    }

    let planes = YuvPlanes {
        y: std::slice::from_raw_parts(av.data[0], y_stride * (h - 1) + w),
        u: std::slice::from_raw_parts(av.data[1], u_stride * (ch - 1) + cw),
        v: std::slice::from_raw_parts(av.data[2], v_stride * (ch - 1) + cw),
        y_stride,
        u_stride,
        v_stride,
    };
    let mut buffer = vec![255u8; w * h * 4];
    yuv420p_to_rgba(&planes, &mut buffer, w, h);
    RgbaImage::from_raw(w as u32, h as u32, buffer)
}

pub struct YuvPlanes<'a> {
    pub y: &'a [u8],
    pub u: &'a [u8],
    pub v: &'a [u8],
    pub y_stride: usize,
    pub u_stride: usize,
    pub v_stride: usize,
}

/// BT.601 YUV420P → RGBA (定点系数 x128)
pub fn yuv420p_to_rgba(planes: &YuvPlanes, buffer: &mut [u8], width: usize, height: usize) {
    let mut out_idx = 0;
    for y in 0..height {
        let y_row = y * planes.y_stride;
        let u_row = (y >> 1) * planes.u_stride;
        let v_row = (y >> 1) * planes.v_stride;

        for x in 0..width {
            let y_val = planes.y[y_row + x] as i32;
            let u_val = planes.u[u_row + (x >> 1)] as i32 - 128;
            let v_val = planes.v[v_row + (x >> 1)] as i32 - 128;

            buffer[out_idx] = (y_val + ((v_val * 179) >> 7)).clamp(0, 255) as u8;
            buffer[out_idx + 1] =
                (y_val - ((u_val * 44) >> 7) - ((v_val * 91) >> 7)).clamp(0, 255) as u8;
            buffer[out_idx + 2] = (y_val + ((u_val * 227) >> 7)).clamp(0, 255) as u8;
            out_idx += 4;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gray_and_red() {
        // 2x2 帧: 中性色度 → 灰度
        let y = [128u8, 128, 128, 128];
        let planes = YuvPlanes {
            y: &y,
            u: &[128],
            v: &[128],
            y_stride: 2,
            u_stride: 1,
            v_stride: 1,
        };
        let mut buf = vec![255u8; 16];
        yuv420p_to_rgba(&planes, &mut buf, 2, 2);
        assert_eq!(&buf[0..4], &[128, 128, 128, 255]);

        // 偏红色度
        let planes = YuvPlanes {
            y: &[76, 76, 76, 76],
            u: &[85],
            v: &[255],
            ..planes
        };
        yuv420p_to_rgba(&planes, &mut buf, 2, 2);
        assert!(buf[0] > 240 && buf[1] < 20 && buf[2] < 20);
    }

    #[test]
    fn test_stride_padding_ignored() {
        // 宽2, 步长4 (每行末尾2字节填充)
        let y = [10u8, 20, 0, 0, 30, 40];
        let planes = YuvPlanes {
            y: &y,
            u: &[128],
            v: &[128],
            y_stride: 4,
            u_stride: 1,
            v_stride: 1,
        };
        let mut buf = vec![255u8; 16];
        yuv420p_to_rgba(&planes, &mut buf, 2, 2);
        assert_eq!(buf[0], 10);
        assert_eq!(buf[4], 20);
        assert_eq!(buf[8], 30);
        assert_eq!(buf[12], 40);
    }
}
