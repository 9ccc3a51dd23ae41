/// 渲染辅助 (macroquad)
///
/// - FrameView:    帧坐标 ↔ 屏幕坐标 (等比缩放居中)
/// - FrameTexture: RGBA帧纹理, 只在分辨率变化时重建
/// - 屏幕绘制:     ROI多边形 / 检测框 / HUD文字
use image::RgbaImage;
use macroquad::prelude::*;

use crate::detection::AcceptedDetection;
use crate::roi::{Point, Region};

pub const HUD_FONT_SIZE: f32 = 22.0;

/// 窗口配置
pub fn window_conf(title: &str, width: u32, height: u32) -> Conf {
    Conf {
        window_title: title.to_string(),
        window_width: width.clamp(320, 1600) as i32,
        window_height: height.clamp(240, 900) as i32,
        window_resizable: true,
        ..Default::default()
    }
}

pub fn palette(index: usize) -> Color {
    let (r, g, b) = crate::BRIGHT_COLORS[index % crate::BRIGHT_COLORS.len()];
    Color::from_rgba(r, g, b, 255)
}

/// 帧在窗口中的显示位置
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameView {
    pub scale: f32,
    pub offset_x: f32,
    pub offset_y: f32,
    pub frame_width: u32,
    pub frame_height: u32,
}

impl FrameView {
    /// 等比缩放并居中
    pub fn fit(frame_width: u32, frame_height: u32, screen_w: f32, screen_h: f32) -> Self {
        let (fw, fh) = (frame_width.max(1) as f32, frame_height.max(1) as f32);
        let scale = (screen_w / fw).min(screen_h / fh).max(f32::EPSILON);
        Self {
            scale,
            offset_x: (screen_w - fw * scale) / 2.0,
            offset_y: (screen_h - fh * scale) / 2.0,
            frame_width,
            frame_height,
        }
    }

    pub fn dest_size(&self) -> Vec2 {
        vec2(
            self.frame_width as f32 * self.scale,
            self.frame_height as f32 * self.scale,
        )
    }

    pub fn to_screen(&self, x: f32, y: f32) -> Vec2 {
        vec2(x * self.scale + self.offset_x, y * self.scale + self.offset_y)
    }

    pub fn point_to_screen(&self, p: Point) -> Vec2 {
        self.to_screen(p.x as f32, p.y as f32)
    }

    /// 屏幕坐标 → 帧像素坐标; 在帧显示区域之外返回 None
    pub fn to_frame(&self, sx: f32, sy: f32) -> Option<Point> {
        let fx = (sx - self.offset_x) / self.scale;
        let fy = (sy - self.offset_y) / self.scale;
        if !(fx >= 0.0 && fy >= 0.0)
            || fx > self.frame_width as f32
            || fy > self.frame_height as f32
        {
            return None;
        }
        let max_x = self.frame_width.saturating_sub(1) as i32;
        let max_y = self.frame_height.saturating_sub(1) as i32;
        Some(Point::new(
            (fx as i32).clamp(0, max_x),
            (fy as i32).clamp(0, max_y),
        ))
    }
}

/// 帧纹理
#[derive(Default)]
pub struct FrameTexture {
    texture: Option<Texture2D>,
}

impl FrameTexture {
    pub fn update(&mut self, image: &RgbaImage) {
        let (w, h) = (image.width() as u16, image.height() as u16);
        match &self.texture {
            Some(tex) if tex.width() == w as f32 && tex.height() == h as f32 => {
                tex.update(&Image {
                    bytes: image.as_raw().clone(),
                    width: w,
                    height: h,
                });
            }
            _ => {
                let tex = Texture2D::from_rgba8(w, h, image.as_raw());
                tex.set_filter(FilterMode::Linear);
                self.texture = Some(tex);
            }
        }
    }

    pub fn draw(&self, view: &FrameView) {
        if let Some(tex) = &self.texture {
            draw_texture_ex(
                tex,
                view.offset_x,
                view.offset_y,
                WHITE,
                DrawTextureParams {
                    dest_size: Some(view.dest_size()),
                    ..Default::default()
                },
            );
        }
    }
}

/// 折线 (closed 为 true 时连回首点)
pub fn draw_polyline(view: &FrameView, points: &[Point], closed: bool, thickness: f32, color: Color) {
    for pair in points.windows(2) {
        let (a, b) = (view.point_to_screen(pair[0]), view.point_to_screen(pair[1]));
        draw_line(a.x, a.y, b.x, b.y, thickness, color);
    }
    if closed && points.len() > 2 {
        let (a, b) = (
            view.point_to_screen(points[points.len() - 1]),
            view.point_to_screen(points[0]),
        );
        draw_line(a.x, a.y, b.x, b.y, thickness, color);
    }
}

/// ROI多边形边框 + 名称
pub fn draw_regions(view: &FrameView, regions: &[Region]) {
    for (i, region) in regions.iter().enumerate() {
        let color = palette(i);
        draw_polyline(view, region.points(), true, 2.0, color);
        let anchor = view.point_to_screen(region.label_anchor());
        draw_text(region.name(), anchor.x, anchor.y - 6.0, HUD_FONT_SIZE, color);
    }
}

/// 检测框 + `label conf`
pub fn draw_detections(view: &FrameView, detections: &[AcceptedDetection]) {
    for det in detections {
        let p1 = view.to_screen(det.bbox.xmin(), det.bbox.ymin());
        let p2 = view.to_screen(det.bbox.xmax(), det.bbox.ymax());
        draw_rectangle_lines(p1.x, p1.y, p2.x - p1.x, p2.y - p1.y, 2.0, GREEN);
        draw_text(&det.caption(), p1.x, p1.y - 5.0, 20.0, GREEN);
    }
}

/// 左上角多行文字 (带半透明底)
pub fn draw_hud(lines: &[String]) {
    if lines.is_empty() {
        return;
    }
    let line_h = HUD_FONT_SIZE + 4.0;
    let width = lines
        .iter()
        .map(|l| measure_text(l, None, HUD_FONT_SIZE as u16, 1.0).width)
        .fold(0.0, f32::max);
    draw_rectangle(
        4.0,
        4.0,
        width + 12.0,
        line_h * lines.len() as f32 + 8.0,
        Color::new(0.0, 0.0, 0.0, 0.55),
    );
    for (i, line) in lines.iter().enumerate() {
        draw_text(line, 10.0, 8.0 + line_h * (i as f32 + 1.0) - 6.0, HUD_FONT_SIZE, WHITE);
    }
}
