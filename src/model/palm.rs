// 该文件是 Shouyu （手语） 项目的一部分。
// src/model/palm.rs - 手掌检测模型
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

//! # 手掌检测
//!
//! 单阶段 SSD 手掌检测网络（192×192 输入）。输出两个张量：
//!
//! - 回归张量 `[1, 2016, 18]`：框中心偏移、宽高以及 7 个手掌关键点
//! - 分类张量 `[1, 2016, 1]`：每个锚点的置信度 logit
//!
//! 只保留得分最高的一只手：与其重叠的候选框按置信度加权平均，
//! 其余候选全部丢弃。

use std::path::PathBuf;

use image::{RgbImage, imageops};
use tracing::debug;

use crate::{
  frame::{TensorLayout, image_to_tensor},
  model::{Model, OnnxModel, OnnxModelError, onnx::find_output, sigmoid},
};

pub const PALM_INPUT_SIZE: u32 = 192;
/// （特征图边长, 每个单元的锚点数）
const PALM_ANCHOR_LAYERS: [(usize, usize); 2] = [(24, 2), (12, 6)];
const PALM_BOX_PARAMS: usize = 18;
pub const PALM_KEYPOINTS: usize = 7;
const PALM_SCORE_CLIP: f32 = 100.0;
const PALM_SCORE_THRESH: f32 = 0.5;
const PALM_IOU_THRESH: f32 = 0.3;

/// 手掌检测结果，坐标为原图像素坐标
#[derive(Debug, Clone, PartialEq)]
pub struct PalmDetection {
  pub score: f32,
  pub center: [f32; 2],
  pub size: [f32; 2],
  /// 0: 手腕, 1: 食指根, 2: 中指根, 3: 无名指根, 4: 小指根, 5/6: 拇指
  pub keypoints: [[f32; 2]; PALM_KEYPOINTS],
}

impl PalmDetection {
  fn iou(&self, other: &PalmDetection) -> f32 {
    let (a_min, a_max) = self.corners();
    let (b_min, b_max) = other.corners();

    let w = (a_max[0].min(b_max[0]) - a_min[0].max(b_min[0])).max(0.0);
    let h = (a_max[1].min(b_max[1]) - a_min[1].max(b_min[1])).max(0.0);
    let intersection = w * h;
    let union = self.size[0] * self.size[1] + other.size[0] * other.size[1] - intersection;

    if union <= 0.0 { 0.0 } else { intersection / union }
  }

  fn corners(&self) -> ([f32; 2], [f32; 2]) {
    let half_w = self.size[0] / 2.0;
    let half_h = self.size[1] / 2.0;
    (
      [self.center[0] - half_w, self.center[1] - half_h],
      [self.center[0] + half_w, self.center[1] + half_h],
    )
  }

  fn map_points(mut self, f: impl Fn([f32; 2]) -> [f32; 2], scale: f32) -> Self {
    self.center = f(self.center);
    self.size = [self.size[0] * scale, self.size[1] * scale];
    for kp in self.keypoints.iter_mut() {
      *kp = f(*kp);
    }
    self
  }
}

/// 等比缩放并居中填充到正方形输入
#[derive(Debug, Clone, Copy, PartialEq)]
struct Letterbox {
  scale: f32,
  pad_x: f32,
  pad_y: f32,
}

impl Letterbox {
  fn new(width: u32, height: u32, target: u32) -> Self {
    let scale = target as f32 / width.max(height) as f32;
    Self {
      scale,
      pad_x: (target as f32 - width as f32 * scale) / 2.0,
      pad_y: (target as f32 - height as f32 * scale) / 2.0,
    }
  }

  fn apply(&self, image: &RgbImage, target: u32) -> RgbImage {
    let width = ((image.width() as f32 * self.scale).round() as u32).clamp(1, target);
    let height = ((image.height() as f32 * self.scale).round() as u32).clamp(1, target);
    let resized = imageops::resize(image, width, height, imageops::FilterType::Triangle);

    let mut canvas = RgbImage::new(target, target);
    imageops::overlay(
      &mut canvas,
      &resized,
      self.pad_x.round() as i64,
      self.pad_y.round() as i64,
    );
    canvas
  }

  /// 输入张量坐标 -> 原图坐标
  fn unproject(&self, point: [f32; 2]) -> [f32; 2] {
    [
      (point[0] - self.pad_x) / self.scale,
      (point[1] - self.pad_y) / self.scale,
    ]
  }
}

fn generate_anchors() -> Vec<[f32; 2]> {
  let mut anchors = Vec::new();
  for (size, per_cell) in PALM_ANCHOR_LAYERS {
    for y in 0..size {
      for x in 0..size {
        let center = [
          (x as f32 + 0.5) / size as f32,
          (y as f32 + 0.5) / size as f32,
        ];
        anchors.extend(std::iter::repeat_n(center, per_cell));
      }
    }
  }
  anchors
}

/// 从原始输出解码候选框，坐标为输入张量像素坐标
fn decode_candidates(
  anchors: &[[f32; 2]],
  regressors: &[f32],
  scores: &[f32],
  threshold: f32,
) -> Vec<PalmDetection> {
  let input = PALM_INPUT_SIZE as f32;
  let mut candidates = Vec::new();

  for (index, anchor) in anchors.iter().enumerate() {
    let score = sigmoid(scores[index].clamp(-PALM_SCORE_CLIP, PALM_SCORE_CLIP));
    if score < threshold {
      continue;
    }

    let raw = &regressors[index * PALM_BOX_PARAMS..(index + 1) * PALM_BOX_PARAMS];
    let origin = [anchor[0] * input, anchor[1] * input];

    let mut keypoints = [[0.0; 2]; PALM_KEYPOINTS];
    for (k, kp) in keypoints.iter_mut().enumerate() {
      *kp = [raw[4 + 2 * k] + origin[0], raw[5 + 2 * k] + origin[1]];
    }

    candidates.push(PalmDetection {
      score,
      center: [raw[0] + origin[0], raw[1] + origin[1]],
      size: [raw[2], raw[3]],
      keypoints,
    });
  }

  candidates
}

/// 取得分最高的检测，并将与之重叠的候选按置信度加权平均
fn merge_best(mut candidates: Vec<PalmDetection>, iou_threshold: f32) -> Option<PalmDetection> {
  candidates.sort_by(|a, b| b.score.total_cmp(&a.score));
  let seed = candidates.first()?.clone();

  let mut merged = PalmDetection {
    score: seed.score,
    center: [0.0; 2],
    size: [0.0; 2],
    keypoints: [[0.0; 2]; PALM_KEYPOINTS],
  };
  let mut divisor = 0.0;

  for candidate in candidates.iter().filter(|c| seed.iou(c) >= iou_threshold) {
    let factor = candidate.score;
    divisor += factor;
    for i in 0..2 {
      merged.center[i] += candidate.center[i] * factor;
      merged.size[i] += candidate.size[i] * factor;
    }
    for (acc, kp) in merged.keypoints.iter_mut().zip(candidate.keypoints.iter()) {
      acc[0] += kp[0] * factor;
      acc[1] += kp[1] * factor;
    }
  }

  // 种子与自身的 IoU 为 1，因此 divisor 至少等于种子的置信度
  for i in 0..2 {
    merged.center[i] /= divisor;
    merged.size[i] /= divisor;
  }
  for kp in merged.keypoints.iter_mut() {
    kp[0] /= divisor;
    kp[1] /= divisor;
  }

  Some(merged)
}

pub struct PalmDetector {
  model: OnnxModel,
  layout: TensorLayout,
  anchors: Vec<[f32; 2]>,
  score_threshold: f32,
  iou_threshold: f32,
}

pub struct PalmDetectorBuilder {
  model_path: PathBuf,
  layout: TensorLayout,
  score_threshold: f32,
  iou_threshold: f32,
}

impl PalmDetectorBuilder {
  pub fn new(model_path: impl Into<PathBuf>) -> Self {
    Self {
      model_path: model_path.into(),
      layout: TensorLayout::default(),
      score_threshold: PALM_SCORE_THRESH,
      iou_threshold: PALM_IOU_THRESH,
    }
  }

  pub fn layout(mut self, layout: TensorLayout) -> Self {
    self.layout = layout;
    self
  }

  pub fn score_threshold(mut self, threshold: f32) -> Self {
    self.score_threshold = threshold;
    self
  }

  pub fn build(self) -> Result<PalmDetector, OnnxModelError> {
    let size = PALM_INPUT_SIZE as usize;
    let model = OnnxModel::load(&self.model_path, &self.layout.shape(size, size))?;
    let anchors = generate_anchors();
    debug!("手掌检测锚点数量: {}", anchors.len());

    Ok(PalmDetector {
      model,
      layout: self.layout,
      anchors,
      score_threshold: self.score_threshold,
      iou_threshold: self.iou_threshold,
    })
  }
}

impl Model for PalmDetector {
  type Input = RgbImage;
  type Output = Option<PalmDetection>;
  type Error = OnnxModelError;

  fn infer(&self, image: &Self::Input) -> Result<Self::Output, Self::Error> {
    let letterbox = Letterbox::new(image.width(), image.height(), PALM_INPUT_SIZE);
    let input = letterbox.apply(image, PALM_INPUT_SIZE);
    let outputs = self.model.run(image_to_tensor(&input, self.layout))?;

    let num_anchors = self.anchors.len();
    let regressors = find_output(&outputs, num_anchors * PALM_BOX_PARAMS)
      .ok_or_else(|| OnnxModelError::MissingOutput(format!("手掌回归 [1, {num_anchors}, 18]")))?;
    let scores = find_output(&outputs, num_anchors)
      .ok_or_else(|| OnnxModelError::MissingOutput(format!("手掌分类 [1, {num_anchors}, 1]")))?;

    let candidates = decode_candidates(
      &self.anchors,
      &regressors.data,
      &scores.data,
      self.score_threshold,
    );
    debug!("手掌候选数量: {}", candidates.len());

    Ok(
      merge_best(candidates, self.iou_threshold)
        .map(|palm| palm.map_points(|p| letterbox.unproject(p), 1.0 / letterbox.scale)),
    )
  }
}
