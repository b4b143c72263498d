// 该文件是 Shouyu （手语） 项目的一部分。
// src/model/onnx.rs - ONNX 模型加载与推理
//
// 本文件根据 Apache 许可证第 2.0 版（以下简称“许可证”）授权使用；
// 除非遵守该许可证条款，否则您不得使用本文件。
// 您可通过以下网址获取许可证副本：
// http://www.apache.org/licenses/LICENSE-2.0
// 除非适用法律要求或书面同意，根据本许可协议分发的软件均按“原样”提供，
// 不附带任何形式的明示或暗示的保证或条件。
// 有关许可权限与限制的具体条款，请参阅本许可协议。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, Wareless Group

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info};
use tract_onnx::prelude::*;

type OnnxPlan = SimplePlan<TypedFact, Box<dyn TypedOp>, TypedModel>;

#[derive(Error, Debug)]
pub enum OnnxModelError {
  #[error("模型文件不存在: {0}")]
  NotFound(PathBuf),
  #[error("模型加载错误: {path}: {reason}")]
  Load { path: PathBuf, reason: String },
  #[error("模型输入形状不匹配: 期望 {expected:?}, 实际 {actual:?}")]
  InputShape {
    expected: Vec<usize>,
    actual: Vec<usize>,
  },
  #[error("模型推理错误: {0}")]
  Run(String),
  #[error("模型输出缺失: {0}")]
  MissingOutput(String),
}

/// 展平后的模型输出
#[derive(Debug, Clone, PartialEq)]
pub struct RawOutput {
  pub shape: Vec<usize>,
  pub data: Vec<f32>,
}

/// 固定输入形状的 ONNX 模型
///
/// 输入形状在加载时写入模型，tract 会据此完成形状推导与优化。
pub struct OnnxModel {
  name: String,
  input_shape: Vec<usize>,
  plan: OnnxPlan,
}

impl std::fmt::Debug for OnnxModel {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("OnnxModel")
      .field("name", &self.name)
      .field("input_shape", &self.input_shape)
      .finish()
  }
}

impl OnnxModel {
  pub fn load(path: impl AsRef<Path>, input_shape: &[usize]) -> Result<Self, OnnxModelError> {
    let path = path.as_ref();
    if !path.is_file() {
      return Err(OnnxModelError::NotFound(path.to_path_buf()));
    }

    info!("加载模型文件: {}", path.display());
    let load_error = |e: TractError| OnnxModelError::Load {
      path: path.to_path_buf(),
      reason: format!("{e:#}"),
    };

    let plan = tract_onnx::onnx()
      .model_for_path(path)
      .map_err(load_error)?
      .with_input_fact(0, f32::fact(input_shape.to_vec()).into())
      .map_err(load_error)?
      .into_optimized()
      .map_err(load_error)?
      .into_runnable()
      .map_err(load_error)?;

    let name = path
      .file_stem()
      .map(|s| s.to_string_lossy().into_owned())
      .unwrap_or_else(|| path.display().to_string());
    debug!("模型 {} 输入形状: {:?}", name, input_shape);

    Ok(Self {
      name,
      input_shape: input_shape.to_vec(),
      plan,
    })
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn input_shape(&self) -> &[usize] {
    &self.input_shape
  }

  /// 执行一次推理，返回所有输出（按模型声明顺序）
  pub fn run(&self, input: Tensor) -> Result<Vec<RawOutput>, OnnxModelError> {
    if input.shape() != self.input_shape.as_slice() {
      return Err(OnnxModelError::InputShape {
        expected: self.input_shape.clone(),
        actual: input.shape().to_vec(),
      });
    }

    let outputs = self
      .plan
      .run(tvec!(input.into()))
      .map_err(|e| OnnxModelError::Run(format!("{e:#}")))?;

    outputs
      .iter()
      .map(|value| {
        let view = value
          .to_array_view::<f32>()
          .map_err(|e| OnnxModelError::Run(format!("{e:#}")))?;
        Ok(RawOutput {
          shape: view.shape().to_vec(),
          data: view.iter().copied().collect(),
        })
      })
      .collect()
  }
}

/// 按元素数量查找输出；转换后的模型输出顺序并不固定
pub(crate) fn find_output(outputs: &[RawOutput], len: usize) -> Option<&RawOutput> {
  outputs.iter().find(|output| output.data.len() == len)
}
