// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//
// YOLOv8 检测模型
// 包含: 模型加载、letterbox预处理、推理、输出解码

use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use fast_image_resize as fr;
use image::RgbaImage;
use ndarray::{s, Array, Axis, IxDyn};

use crate::{non_max_suppression, Bbox, OrtBackend, OrtConfig, OrtEP, COCO_NAMES};

const CXYWH_OFFSET: usize = 4;
const PAD_VALUE: f32 = 144.0 / 255.0;

/// YOLOv8 构建参数
#[derive(Debug, Clone)]
pub struct YOLOv8Config {
    pub model: PathBuf,
    pub ep: OrtEP,
    pub conf: f32,
    pub iou: f32,
    pub profile: bool,
}

pub struct YOLOv8 {
    engine: OrtBackend,
    height: u32,
    width: u32,
    conf: f32,
    iou: f32,
    names: Vec<String>,
    profile: bool,
}

impl YOLOv8 {
    pub fn new(config: YOLOv8Config) -> Result<Self> {
        let engine = OrtBackend::build(OrtConfig {
            f: config.model,
            ep: config.ep,
        })?;
        let (height, width) = (engine.height(), engine.width());

        let names = engine.names().unwrap_or_else(|| {
            log::warn!("⚠️ 模型元数据缺少类别名称, 使用 COCO 默认类别");
            COCO_NAMES.iter().map(|s| s.to_string()).collect()
        });

        Ok(Self {
            engine,
            height,
            width,
            conf: config.conf,
            iou: config.iou,
            names,
            profile: config.profile,
        })
    }

}

/// 缩放比例与缩放后尺寸
fn scale_wh(w0: f32, h0: f32, w1: f32, h1: f32) -> (f32, f32, f32) {
    let r = (w1 / w0).min(h1 / h0);
    (r, (w0 * r).round(), (h0 * r).round())
}

/// letterbox: 等比缩放到左上角, 其余区域填充 144/255, 输出 [1, 3, H, W]
pub fn letterbox(frame: &RgbaImage, width: u32, height: u32) -> Result<Array<f32, IxDyn>> {
    let (w0, h0) = frame.dimensions();
    if w0 == 0 || h0 == 0 {
        return Err(anyhow!("空帧: {}x{}", w0, h0));
    }
    let (_, w_new, h_new) = scale_wh(w0 as f32, h0 as f32, width as f32, height as f32);
    let (w_new, h_new) = ((w_new as u32).clamp(1, width), (h_new as u32).clamp(1, height));

    let src = fr::images::ImageRef::new(w0, h0, frame.as_raw(), fr::PixelType::U8x4)
        .context("创建缩放源图失败")?;
    let mut dst = fr::images::Image::new(w_new, h_new, fr::PixelType::U8x4);
    let options =
        fr::ResizeOptions::new().resize_alg(fr::ResizeAlg::Convolution(fr::FilterType::Bilinear));
    fr::Resizer::new()
        .resize(&src, &mut dst, Some(&options))
        .context("letterbox 缩放失败")?;

    let mut ys = Array::from_elem((1, 3, height as usize, width as usize), PAD_VALUE).into_dyn();
    let raw = dst.buffer();
    let (w_new, h_new) = (w_new as usize, h_new as usize);
    for y in 0..h_new {
        for x in 0..w_new {
            let i = (y * w_new + x) * 4;
            ys[[0, 0, y, x]] = raw[i] as f32 / 255.0;
            ys[[0, 1, y, x]] = raw[i + 1] as f32 / 255.0;
            ys[[0, 2, y, x]] = raw[i + 2] as f32 / 255.0;
        }
    }
    Ok(ys)
}

/// 解码 `[1, 4 + nc, N]` 输出: 置信度过滤 → NMS → 还原到原始帧并裁剪
pub fn decode_output(
    preds: &Array<f32, IxDyn>,
    input_size: (u32, u32),
    frame_size: (u32, u32),
    conf: f32,
    iou: f32,
) -> Result<Vec<Bbox>> {
    if preds.ndim() != 3 || preds.shape()[1] <= CXYWH_OFFSET {
        return Err(anyhow!("无法识别的输出形状: {:?}", preds.shape()));
    }
    let (width_original, height_original) = (frame_size.0 as f32, frame_size.1 as f32);
    let ratio = (input_size.0 as f32 / width_original).min(input_size.1 as f32 / height_original);

    let anchors = preds.index_axis(Axis(0), 0);
    let mut data: Vec<Bbox> = Vec::new();
    for pred in anchors.axis_iter(Axis(1)) {
        let bbox = pred.slice(s![0..CXYWH_OFFSET]);
        let clss = pred.slice(s![CXYWH_OFFSET..]);

        let Some((id, &confidence)) = clss
            .iter()
            .enumerate()
            .reduce(|max, x| if x.1 > max.1 { x } else { max })
        else {
            continue;
        };
        if !(confidence >= conf) {
            continue;
        }

        let cx = bbox[0] / ratio;
        let cy = bbox[1] / ratio;
        let w = bbox[2] / ratio;
        let h = bbox[3] / ratio;
        // clamp 保留 NaN, 由过滤阶段报告
        let x1 = (cx - w / 2.).clamp(0.0, width_original);
        let y1 = (cy - h / 2.).clamp(0.0, height_original);
        let x2 = (cx + w / 2.).clamp(0.0, width_original);
        let y2 = (cy + h / 2.).clamp(0.0, height_original);
        data.push(Bbox::from_xyxy(x1, y1, x2, y2, id, confidence));
    }

    non_max_suppression(&mut data, iou);
    Ok(data)
}

impl super::Model for YOLOv8 {
    fn preprocess(&mut self, frame: &RgbaImage) -> Result<Array<f32, IxDyn>> {
        letterbox(frame, self.width, self.height)
    }

    fn run(&mut self, xs: Array<f32, IxDyn>, profile: bool) -> Result<Vec<Array<f32, IxDyn>>> {
        self.engine.run(xs, profile)
    }

    fn postprocess(&self, ys: Vec<Array<f32, IxDyn>>, frame_size: (u32, u32)) -> Result<Vec<Bbox>> {
        let preds = ys.first().ok_or_else(|| anyhow!("模型没有输出"))?;
        decode_output(
            preds,
            (self.width, self.height),
            frame_size,
            self.conf,
            self.iou,
        )
    }

    fn forward(&mut self, frame: &RgbaImage) -> Result<Vec<Bbox>> {
        let t_pre = std::time::Instant::now();
        let xs = self.preprocess(frame)?;
        if self.profile {
            log::info!("[Model Preprocess]: {:?}", t_pre.elapsed());
        }

        let ys = self.run(xs, self.profile)?;

        let t_post = std::time::Instant::now();
        let ys = self.postprocess(ys, frame.dimensions())?;
        if self.profile {
            log::info!("[Model Postprocess]: {:?}", t_post.elapsed());
        }
        Ok(ys)
    }

    fn summary(&self) {
        log::info!(
            "🧠 模型: EP {:?}{}, 输入 {}x{} ({}), 类别数 {}, conf {}, iou {}",
            self.engine.ep(),
            if let OrtEP::CPU = self.engine.ep() {
                ""
            } else {
                " (May still fall back to CPU)"
            },
            self.width,
            self.height,
            if self.engine.is_height_dynamic() || self.engine.is_width_dynamic() {
                "Dynamic"
            } else {
                "Const"
            },
            self.names.len(),
            self.conf,
            self.iou,
        );
    }

    fn names(&self) -> &[String] {
        &self.names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 构造 [1, 4 + nc, N] 输出, 每个候选为 (cx, cy, w, h, class, score)
    fn fake_output(nc: usize, cands: &[(f32, f32, f32, f32, usize, f32)]) -> Array<f32, IxDyn> {
        let mut out = Array::zeros((1, 4 + nc, cands.len())).into_dyn();
        for (j, &(cx, cy, w, h, class, score)) in cands.iter().enumerate() {
            out[[0, 0, j]] = cx;
            out[[0, 1, j]] = cy;
            out[[0, 2, j]] = w;
            out[[0, 3, j]] = h;
            out[[0, 4 + class, j]] = score;
        }
        out
    }

    #[test]
    fn test_decode_rescales_to_frame() {
        // 1280x720 → 640 输入, ratio = 0.5
        let out = fake_output(80, &[(100.0, 50.0, 40.0, 20.0, 2, 0.9)]);
        let boxes = decode_output(&out, (640, 640), (1280, 720), 0.25, 0.45).unwrap();
        assert_eq!(boxes.len(), 1);
        let b = &boxes[0];
        assert_eq!(b.id(), 2);
        assert_eq!((b.xmin(), b.ymin(), b.xmax(), b.ymax()), (160.0, 80.0, 240.0, 120.0));
    }

    #[test]
    fn test_decode_threshold_and_nms() {
        let out = fake_output(
            3,
            &[
                (100.0, 100.0, 50.0, 50.0, 0, 0.8),
                (102.0, 101.0, 50.0, 50.0, 0, 0.6),
                (400.0, 400.0, 30.0, 30.0, 1, 0.1),
                (300.0, 300.0, 30.0, 30.0, 2, 0.5),
            ],
        );
        let boxes = decode_output(&out, (640, 640), (640, 640), 0.25, 0.45).unwrap();
        assert_eq!(boxes.len(), 2);
        assert_eq!(boxes[0].confidence(), 0.8);
        assert_eq!(boxes[1].id(), 2);
    }

    #[test]
    fn test_decode_clamps_to_frame() {
        let out = fake_output(1, &[(5.0, 630.0, 40.0, 40.0, 0, 0.9)]);
        let boxes = decode_output(&out, (640, 640), (640, 640), 0.25, 0.45).unwrap();
        assert_eq!(boxes[0].xmin(), 0.0);
        assert_eq!(boxes[0].ymax(), 640.0);
    }

    #[test]
    fn test_decode_rejects_bad_shape() {
        let out = Array::zeros((1, 4)).into_dyn();
        assert!(decode_output(&out, (640, 640), (640, 640), 0.25, 0.45).is_err());
    }

    #[test]
    fn test_letterbox_pads_bottom() {
        let frame = RgbaImage::from_pixel(64, 32, image::Rgba([255, 0, 0, 255]));
        let xs = letterbox(&frame, 64, 64).unwrap();
        assert_eq!(xs.shape(), &[1, 3, 64, 64]);
        assert!((xs[[0, 0, 10, 10]] - 1.0).abs() < 1e-3);
        assert!((xs[[0, 1, 10, 10]]).abs() < 1e-3);
        assert!((xs[[0, 0, 50, 10]] - PAD_VALUE).abs() < 1e-6);
    }
}
