// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//
// ONNX Runtime 推理引擎封装

use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use ndarray::{Array, IxDyn};
use once_cell::sync::Lazy;
use ort::execution_providers::{
    CPUExecutionProvider, CUDAExecutionProvider, ExecutionProviderDispatch,
    TensorRTExecutionProvider,
};
use ort::session::Session;
use ort::value::Tensor;
use regex::Regex;

/// 动态尺寸模型使用的默认输入边长
pub const DEFAULT_INPUT_SIZE: u32 = 640;

static NAME_ENTRY: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d+):\s*'([^']*)'").unwrap());

/// 执行设备
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrtEP {
    CPU,
    CUDA(i32),
    Trt(i32),
}

impl OrtEP {
    pub fn from_flags(cuda: bool, trt: bool, device_id: i32) -> Self {
        if trt {
            OrtEP::Trt(device_id)
        } else if cuda {
            OrtEP::CUDA(device_id)
        } else {
            OrtEP::CPU
        }
    }

    fn providers(&self) -> Vec<ExecutionProviderDispatch> {
        match *self {
            OrtEP::CPU => vec![CPUExecutionProvider::default().build()],
            OrtEP::CUDA(id) => vec![
                CUDAExecutionProvider::default().with_device_id(id).build(),
                CPUExecutionProvider::default().build(),
            ],
            OrtEP::Trt(id) => vec![
                TensorRTExecutionProvider::default()
                    .with_device_id(id)
                    .build(),
                CUDAExecutionProvider::default().with_device_id(id).build(),
                CPUExecutionProvider::default().build(),
            ],
        }
    }
}

#[derive(Debug, Clone)]
pub struct OrtConfig {
    pub f: PathBuf,
    pub ep: OrtEP,
}

/// ONNX 会话 + 输入尺寸 + 类别名称
pub struct OrtBackend {
    session: Session,
    ep: OrtEP,
    input_name: String,
    height: u32,
    width: u32,
    height_dynamic: bool,
    width_dynamic: bool,
    names: Option<Vec<String>>,
}

impl OrtBackend {
    pub fn build(config: OrtConfig) -> Result<Self> {
        let session = Session::builder()
            .context("创建 ORT SessionBuilder 失败")?
            .with_execution_providers(config.ep.providers())
            .context("注册执行设备失败")?
            .commit_from_file(&config.f)
            .with_context(|| format!("加载模型失败: {}", config.f.display()))?;

        let input = session
            .inputs
            .first()
            .ok_or_else(|| anyhow!("模型没有输入: {}", config.f.display()))?;
        let input_name = input.name.clone();

        // NCHW, 动态维度为 -1
        let dims: Vec<i64> = input
            .input_type
            .tensor_shape()
            .map(|shape| shape.iter().copied().collect())
            .unwrap_or_default();
        let (height, height_dynamic) = fixed_dim(dims.get(2).copied());
        let (width, width_dynamic) = fixed_dim(dims.get(3).copied());

        let names = session
            .metadata()
            .ok()
            .and_then(|meta| meta.custom("names").ok().flatten())
            .map(|raw| parse_names(&raw))
            .filter(|names| !names.is_empty());

        Ok(Self {
            session,
            ep: config.ep,
            input_name,
            height,
            width,
            height_dynamic,
            width_dynamic,
            names,
        })
    }

    /// 单输入推理, 返回全部输出
    pub fn run(&mut self, xs: Array<f32, IxDyn>, profile: bool) -> Result<Vec<Array<f32, IxDyn>>> {
        let t = std::time::Instant::now();
        let input = Tensor::from_array(xs).context("创建输入张量失败")?;
        let outputs = self
            .session
            .run(ort::inputs![self.input_name.as_str() => input])
            .context("推理失败")?;
        if profile {
            log::info!("[ORT Inference]: {:?}", t.elapsed());
        }

        let mut ys = Vec::with_capacity(outputs.len());
        for (name, value) in outputs.iter() {
            let (shape, data) = value
                .try_extract_tensor::<f32>()
                .with_context(|| format!("读取输出 {} 失败", name))?;
            let dims: Vec<usize> = shape.iter().map(|&d| d.max(0) as usize).collect();
            ys.push(Array::from_shape_vec(IxDyn(&dims), data.to_vec())?);
        }
        Ok(ys)
    }

    pub fn ep(&self) -> OrtEP {
        self.ep
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn is_height_dynamic(&self) -> bool {
        self.height_dynamic
    }

    pub fn is_width_dynamic(&self) -> bool {
        self.width_dynamic
    }

    /// 模型元数据中的类别名称 (没有时为 None)
    pub fn names(&self) -> Option<Vec<String>> {
        self.names.clone()
    }
}

fn fixed_dim(dim: Option<i64>) -> (u32, bool) {
    match dim {
        Some(d) if d > 0 => (d as u32, false),
        _ => (DEFAULT_INPUT_SIZE, true),
    }
}

/// 解析 Ultralytics 导出的 `names` 元数据: `{0: 'person', 1: 'bicycle', ...}`
pub fn parse_names(raw: &str) -> Vec<String> {
    let entries: BTreeMap<usize, String> = NAME_ENTRY
        .captures_iter(raw)
        .filter_map(|cap| Some((cap[1].parse().ok()?, cap[2].to_string())))
        .collect();
    let len = entries.keys().next_back().map_or(0, |&k| k + 1);
    let mut names = vec!["Unknown".to_string(); len];
    for (id, name) in entries {
        names[id] = name;
    }
    names
}
