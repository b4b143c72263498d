// 该文件是 Shouyu （手语） 项目的一部分。
// src/model/classifier.rs - 手势分类模型
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

use std::path::Path;

use tracing::info;
use tract_onnx::prelude::{Tensor, tract_ndarray};

use crate::{
  landmark::{FEATURE_LEN, FeatureVector},
  model::{Model, OnnxModel, OnnxModelError},
};

const DISTRIBUTION_TOLERANCE: f32 = 1e-3;

/// 各类别的概率分布
#[derive(Debug, Clone, PartialEq)]
pub struct Probabilities(Vec<f32>);

impl Probabilities {
  /// 模型输出若已是概率分布则原样保留，否则做 softmax
  pub fn from_scores(scores: Vec<f32>) -> Self {
    let in_range = scores.iter().all(|p| (0.0..=1.0).contains(p));
    let sum: f32 = scores.iter().sum();
    if in_range && (sum - 1.0).abs() <= DISTRIBUTION_TOLERANCE {
      return Self(scores);
    }

    let max = scores.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exp: Vec<f32> = scores.iter().map(|s| (s - max).exp()).collect();
    let total: f32 = exp.iter().sum();
    Self(exp.into_iter().map(|e| e / total).collect())
  }

  pub fn as_slice(&self) -> &[f32] {
    &self.0
  }

  /// 最大概率的下标与取值；并列时取下标最小者
  pub fn argmax(&self) -> Option<(usize, f32)> {
    self
      .0
      .iter()
      .copied()
      .enumerate()
      .fold(None, |best, (i, p)| match best {
        Some((_, bp)) if bp >= p => best,
        _ => Some((i, p)),
      })
  }
}

/// 特征向量 -> 类别概率
pub trait Classifier:
  Model<Input = FeatureVector, Output = Probabilities, Error = OnnxModelError>
{
  /// 输出的类别数量
  fn num_classes(&self) -> usize;
}

/// 前馈手势分类网络，输入 `[1, 63]`，输出 `[1, N]`
#[derive(Debug)]
pub struct SignClassifier {
  model: OnnxModel,
  num_classes: usize,
}

impl SignClassifier {
  pub fn load(path: impl AsRef<Path>) -> Result<Self, OnnxModelError> {
    let model = OnnxModel::load(path, &[1, FEATURE_LEN])?;

    // 用零向量探测输出宽度
    let probe = model.run(feature_tensor(&FeatureVector::zeros()))?;
    let num_classes = probe
      .first()
      .map(|output| output.data.len())
      .ok_or_else(|| OnnxModelError::MissingOutput("分类输出 [1, N]".to_string()))?;
    info!("分类模型 {} 类别数量: {}", model.name(), num_classes);

    Ok(Self { model, num_classes })
  }
}

impl Classifier for SignClassifier {
  fn num_classes(&self) -> usize {
    self.num_classes
  }
}

fn feature_tensor(features: &FeatureVector) -> Tensor {
  tract_ndarray::Array2::from_shape_fn((1, FEATURE_LEN), |(_, i)| features.as_slice()[i]).into()
}

impl Model for SignClassifier {
  type Input = FeatureVector;
  type Output = Probabilities;
  type Error = OnnxModelError;

  fn infer(&self, features: &Self::Input) -> Result<Self::Output, Self::Error> {
    let outputs = self.model.run(feature_tensor(features))?;
    let scores = outputs
      .into_iter()
      .next()
      .ok_or_else(|| OnnxModelError::MissingOutput("分类输出 [1, N]".to_string()))?;
    Ok(Probabilities::from_scores(scores.data))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn distributions_are_kept_as_is() {
    let probs = Probabilities::from_scores(vec![0.1, 0.7, 0.2]);
    assert_eq!(probs.as_slice(), &[0.1, 0.7, 0.2]);
    assert_eq!(probs.argmax(), Some((1, 0.7)));
  }

  #[test]
  fn logits_are_softmaxed() {
    let probs = Probabilities::from_scores(vec![2.0, 1.0, -3.0]);
    let sum: f32 = probs.as_slice().iter().sum();
    assert!((sum - 1.0).abs() < 1e-5);
    assert!(probs.as_slice().iter().all(|p| (0.0..=1.0).contains(p)));

    let (index, confidence) = probs.argmax().unwrap();
    assert_eq!(index, 0);
    assert!(confidence > 0.5);
  }

  #[test]
  fn argmax_prefers_first_on_ties() {
    let probs = Probabilities::from_scores(vec![0.5, 0.5]);
    assert_eq!(probs.argmax(), Some((0, 0.5)));
    assert_eq!(Probabilities(Vec::new()).argmax(), None);
  }

  #[test]
  fn feature_tensor_has_classifier_shape() {
    let tensor = feature_tensor(&FeatureVector::zeros());
    assert_eq!(tensor.shape(), &[1, FEATURE_LEN]);
  }
}
