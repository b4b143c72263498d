// 该文件是 Shouyu （手语） 项目的一部分。
// src/model/hand_landmark.rs - 手部关键点模型
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

use std::{path::PathBuf, str::FromStr};

use image::RgbImage;
use tracing::trace;

use crate::{
  frame::{TensorLayout, image_to_tensor},
  landmark::{FEATURE_LEN, LANDMARK_COUNT},
  model::{Model, OnnxModel, OnnxModelError, onnx::find_output, sigmoid},
};

pub const LANDMARK_INPUT_SIZE: u32 = 224;
const PRESENCE_THRESH: f32 = 0.5;

/// 关键点网络的原始输出，坐标为裁剪图像素坐标
#[derive(Debug, Clone, PartialEq)]
pub struct RawHandLandmarks {
  pub points: [[f32; 3]; LANDMARK_COUNT],
  pub presence: f32,
}

impl RawHandLandmarks {
  fn from_outputs(landmarks: &[f32], presence: f32) -> Self {
    let mut points = [[0.0; 3]; LANDMARK_COUNT];
    for (point, chunk) in points.iter_mut().zip(landmarks.chunks_exact(3)) {
      point.copy_from_slice(chunk);
    }
    Self { points, presence }
  }
}

/// 存在分数的含义由导出方式决定
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PresenceOutput {
  /// 已经过 sigmoid 的概率
  #[default]
  Probability,
  /// 未激活的 logit
  Logit,
}

impl FromStr for PresenceOutput {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.to_ascii_lowercase().as_str() {
      "probability" => Ok(PresenceOutput::Probability),
      "logit" => Ok(PresenceOutput::Logit),
      other => Err(format!("未知的存在分数类型: {other}")),
    }
  }
}

impl PresenceOutput {
  fn probability(self, raw: f32) -> f32 {
    match self {
      PresenceOutput::Probability => raw,
      PresenceOutput::Logit => sigmoid(raw),
    }
  }
}

pub struct HandLandmarker {
  model: OnnxModel,
  layout: TensorLayout,
  presence_output: PresenceOutput,
  presence_threshold: f32,
}

pub struct HandLandmarkerBuilder {
  model_path: PathBuf,
  layout: TensorLayout,
  presence_output: PresenceOutput,
  presence_threshold: f32,
}

impl HandLandmarkerBuilder {
  pub fn new(model_path: impl Into<PathBuf>) -> Self {
    Self {
      model_path: model_path.into(),
      layout: TensorLayout::default(),
      presence_output: PresenceOutput::default(),
      presence_threshold: PRESENCE_THRESH,
    }
  }

  pub fn layout(mut self, layout: TensorLayout) -> Self {
    self.layout = layout;
    self
  }

  pub fn presence_output(mut self, presence_output: PresenceOutput) -> Self {
    self.presence_output = presence_output;
    self
  }

  pub fn presence_threshold(mut self, threshold: f32) -> Self {
    self.presence_threshold = threshold;
    self
  }

  pub fn build(self) -> Result<HandLandmarker, OnnxModelError> {
    let size = LANDMARK_INPUT_SIZE as usize;
    let model = OnnxModel::load(&self.model_path, &self.layout.shape(size, size))?;
    Ok(HandLandmarker {
      model,
      layout: self.layout,
      presence_output: self.presence_output,
      presence_threshold: self.presence_threshold,
    })
  }
}

impl Model for HandLandmarker {
  /// 已旋转裁剪好的 224×224 手部图像
  type Input = RgbImage;
  type Output = Option<RawHandLandmarks>;
  type Error = OnnxModelError;

  fn infer(&self, crop: &Self::Input) -> Result<Self::Output, Self::Error> {
    let outputs = self.model.run(image_to_tensor(crop, self.layout))?;

    let landmarks = find_output(&outputs, FEATURE_LEN)
      .ok_or_else(|| OnnxModelError::MissingOutput("手部关键点 [1, 63]".to_string()))?;
    let presence = find_output(&outputs, 1)
      .ok_or_else(|| OnnxModelError::MissingOutput("手部存在概率 [1, 1]".to_string()))?;

    let presence = self.presence_output.probability(presence.data[0]);
    trace!("手部存在概率: {:.3}", presence);
    if presence < self.presence_threshold {
      return Ok(None);
    }

    Ok(Some(RawHandLandmarks::from_outputs(&landmarks.data, presence)))
  }
}
