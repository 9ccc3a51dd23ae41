//! 图像标注绘制 (保存到磁盘的标注图)
//!
//! 屏幕显示使用 macroquad 图元 (见 renderer.rs), 这里只负责 `RgbImage` 上的绘制.

use ab_glyph::{FontArc, PxScale};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_line_segment_mut, draw_text_mut};

use crate::detection::filter::AcceptedDetection;
use crate::roi::{point_in_polygon, Point, Region};

pub const GREEN: Rgb<u8> = Rgb([0, 255, 0]);
pub const WHITE: Rgb<u8> = Rgb([255, 255, 255]);

/// 多边形绘制样式
#[derive(Debug, Clone, Copy)]
pub struct RegionStyle {
    pub fill_alpha: f32,
    pub thickness: i32,
    pub text_scale: f32,
}

impl RegionStyle {
    /// 保存标注图使用的样式 (半透明填充 + 3像素边框 + 大号标签)
    pub fn annotated() -> Self {
        Self {
            fill_alpha: 0.3,
            thickness: 3,
            text_scale: 32.0,
        }
    }

    /// 检测画面中的ROI样式 (只画边框)
    pub fn outline() -> Self {
        Self {
            fill_alpha: 0.0,
            thickness: 2,
            text_scale: 20.0,
        }
    }
}

pub fn palette_color(index: usize) -> Rgb<u8> {
    let (r, g, b) = crate::BRIGHT_COLORS[index % crate::BRIGHT_COLORS.len()];
    Rgb([r, g, b])
}

/// 线段裁剪到图像范围 (外扩1像素), 完全在外时返回 None
fn clip_segment(a: (f64, f64), b: (f64, f64), w: f64, h: f64) -> Option<((f32, f32), (f32, f32))> {
    let (dx, dy) = (b.0 - a.0, b.1 - a.1);
    let p = [-dx, dx, -dy, dy];
    let q = [a.0 + 1.0, w - a.0, a.1 + 1.0, h - a.1];
    let (mut t0, mut t1) = (0.0f64, 1.0f64);
    for (p, q) in p.into_iter().zip(q) {
        if p == 0.0 {
            if q < 0.0 {
                return None;
            }
        } else {
            let r = q / p;
            if p < 0.0 {
                t0 = t0.max(r);
            } else {
                t1 = t1.min(r);
            }
        }
        if t0 > t1 {
            return None;
        }
    }
    Some((
        ((a.0 + t0 * dx) as f32, (a.1 + t0 * dy) as f32),
        ((a.0 + t1 * dx) as f32, (a.1 + t1 * dy) as f32),
    ))
}

/// 粗线 (在正方形邻域内平移绘制)
pub fn draw_thick_line(img: &mut RgbImage, a: Point, b: Point, thickness: i32, color: Rgb<u8>) {
    let half = thickness.max(1) / 2;
    let lo = -half;
    let hi = thickness.max(1) - half - 1;
    let (w, h) = (img.width() as f64, img.height() as f64);
    for dx in lo..=hi {
        for dy in lo..=hi {
            let start = (a.x.saturating_add(dx) as f64, a.y.saturating_add(dy) as f64);
            let end = (b.x.saturating_add(dx) as f64, b.y.saturating_add(dy) as f64);
            if let Some((start, end)) = clip_segment(start, end, w, h) {
                draw_line_segment_mut(img, start, end, color);
            }
        }
    }
}

/// 闭合多边形边框
pub fn draw_polygon_outline(img: &mut RgbImage, points: &[Point], thickness: i32, color: Rgb<u8>) {
    let n = points.len();
    for i in 0..n {
        draw_thick_line(img, points[i], points[(i + 1) % n], thickness, color);
    }
}

/// 半透明填充多边形 (逐像素判定, 与ROI过滤使用同一判定, 边界计为内部)
pub fn fill_polygon_blend(img: &mut RgbImage, points: &[Point], color: Rgb<u8>, alpha: f32) {
    if points.len() < 3 || alpha <= 0.0 || img.width() == 0 || img.height() == 0 {
        return;
    }
    let max_x = img.width().min(i32::MAX as u32) as i32 - 1;
    let max_y = img.height().min(i32::MAX as u32) as i32 - 1;
    let x0 = points.iter().map(|p| p.x).min().unwrap_or(0).clamp(0, max_x);
    let x1 = points.iter().map(|p| p.x).max().unwrap_or(0).clamp(0, max_x);
    let y0 = points.iter().map(|p| p.y).min().unwrap_or(0).clamp(0, max_y);
    let y1 = points.iter().map(|p| p.y).max().unwrap_or(0).clamp(0, max_y);

    let alpha = alpha.clamp(0.0, 1.0);
    for y in y0..=y1 {
        for x in x0..=x1 {
            if !point_in_polygon(Point::new(x, y), points) {
                continue;
            }
            let dst = img.get_pixel_mut(x as u32, y as u32);
            for c in 0..3 {
                let v = dst.0[c] as f32 * (1.0 - alpha) + color.0[c] as f32 * alpha;
                dst.0[c] = v.round().clamp(0.0, 255.0) as u8;
            }
        }
    }
}

pub fn draw_label(
    img: &mut RgbImage,
    font: Option<&FontArc>,
    text: &str,
    x: i32,
    y: i32,
    scale: f32,
    color: Rgb<u8>,
) {
    let Some(font) = font else {
        return;
    };
    // 远离图像的锚点 (未裁剪的ROI顶点) 不画
    let (w, h) = (img.width() as i64, img.height() as i64);
    let margin = scale as i64 * (text.chars().count() as i64 + 1);
    if (x as i64) < -margin || (x as i64) > w || (y as i64) < -margin || (y as i64) > h {
        return;
    }
    draw_text_mut(img, color, x, y, PxScale::from(scale), font, text);
}

/// 绘制全部区域 (填充 + 边框 + 首点处标签)
pub fn draw_regions(
    img: &mut RgbImage,
    regions: &[Region],
    style: RegionStyle,
    font: Option<&FontArc>,
    color_of: impl Fn(usize) -> Rgb<u8>,
) {
    for (i, region) in regions.iter().enumerate() {
        let color = color_of(i);
        fill_polygon_blend(img, region.points(), color, style.fill_alpha);
        draw_polygon_outline(img, region.points(), style.thickness, color);
        let anchor = region.label_anchor();
        draw_label(
            img,
            font,
            region.name(),
            anchor.x,
            anchor.y.saturating_sub(style.text_scale as i32),
            style.text_scale,
            color,
        );
    }
}

/// 检测框 + `label conf` 文本
pub fn draw_detections(img: &mut RgbImage, detections: &[AcceptedDetection], font: Option<&FontArc>) {
    for det in detections {
        let (x1, y1) = (det.bbox.xmin() as i32, det.bbox.ymin() as i32);
        let (x2, y2) = (det.bbox.xmax() as i32, det.bbox.ymax() as i32);
        let corners = [
            Point::new(x1, y1),
            Point::new(x2, y1),
            Point::new(x2, y2),
            Point::new(x1, y2),
        ];
        draw_polygon_outline(img, &corners, 2, GREEN);
        draw_label(img, font, &det.caption(), x1, y1 - 22, 20.0, GREEN);
    }
}

/// 左上角帧计数
pub fn draw_frame_counter(img: &mut RgbImage, font: Option<&FontArc>, text: &str) {
    draw_label(img, font, text, 10, 10, 24.0, WHITE);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clip_segment() {
        let (start, end) = clip_segment((-100.0, 5.0), (100.0, 5.0), 20.0, 20.0).unwrap();
        assert!((start.0 + 1.0).abs() < 1e-3 && start.1 == 5.0);
        assert!((end.0 - 20.0).abs() < 1e-3 && end.1 == 5.0);
        assert!(clip_segment((-100.0, -50.0), (100.0, -50.0), 20.0, 20.0).is_none());
    }

    #[test]
    fn test_extreme_points_do_not_overflow() {
        let (lo, hi) = (i32::MIN, i32::MAX);
        let everything = vec![
            Point::new(lo, lo),
            Point::new(hi, lo),
            Point::new(hi, hi),
            Point::new(lo, hi),
        ];
        let mut img = RgbImage::new(16, 16);
        fill_polygon_blend(&mut img, &everything, Rgb([0, 200, 0]), 0.5);
        draw_polygon_outline(&mut img, &everything, 3, GREEN);
        assert_eq!(img.get_pixel(8, 8), &Rgb([0, 100, 0]));

        // 穿过图像的长对角线
        let mut img = RgbImage::new(16, 16);
        draw_thick_line(&mut img, Point::new(lo, lo), Point::new(hi, hi), 1, GREEN);
        assert_eq!(img.get_pixel(8, 8), &GREEN);
    }

    #[test]
    fn test_fill_blend_only_touches_inside() {
        let mut img = RgbImage::from_pixel(20, 20, Rgb([0, 0, 0]));
        let square = vec![
            Point::new(5, 5),
            Point::new(15, 5),
            Point::new(15, 15),
            Point::new(5, 15),
        ];
        fill_polygon_blend(&mut img, &square, Rgb([0, 200, 0]), 0.5);
        assert_eq!(img.get_pixel(10, 10), &Rgb([0, 100, 0]));
        assert_eq!(img.get_pixel(1, 1), &Rgb([0, 0, 0]));
    }

    #[test]
    fn test_outline_draws_closing_edge() {
        let mut img = RgbImage::new(20, 20);
        let tri = vec![Point::new(2, 2), Point::new(17, 2), Point::new(2, 17)];
        draw_polygon_outline(&mut img, &tri, 1, GREEN);
        // 闭合边 (2,17) → (2,2)
        assert_eq!(img.get_pixel(2, 10), &GREEN);
        assert_eq!(img.get_pixel(10, 10), &Rgb([0, 0, 0]));
    }
}
