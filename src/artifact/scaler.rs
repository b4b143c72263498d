// 该文件是 Shouyu （手语） 项目的一部分。
// src/artifact/scaler.rs - 特征缩放器
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

use serde::Deserialize;

use crate::{
  artifact::ArtifactError,
  landmark::{FEATURE_LEN, FeatureVector},
};

/// 训练时拟合的逐特征变换
///
/// ```json
/// {"kind": "standard", "mean": [...], "scale": [...]}
/// {"kind": "min_max", "min": [...], "scale": [...]}
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Scaler {
  /// `(x - mean) / scale`
  Standard { mean: Vec<f32>, scale: Vec<f32> },
  /// `x * scale + min`
  MinMax { min: Vec<f32>, scale: Vec<f32> },
}

impl Scaler {
  pub fn validate(&self) -> Result<(), ArtifactError> {
    let (offset, scale) = match self {
      Scaler::Standard { mean, scale } => (mean, scale),
      Scaler::MinMax { min, scale } => (min, scale),
    };

    for len in [offset.len(), scale.len()] {
      if len != FEATURE_LEN {
        return Err(ArtifactError::ScalerLength {
          expected: FEATURE_LEN,
          actual: len,
        });
      }
    }

    let bad = offset.iter().chain(scale.iter()).position(|v| !v.is_finite());
    if let Some(index) = bad {
      return Err(ArtifactError::InvalidScaler(index % FEATURE_LEN));
    }
    if let Scaler::Standard { scale, .. } = self {
      if let Some(index) = scale.iter().position(|s| *s == 0.0) {
        return Err(ArtifactError::InvalidScaler(index));
      }
    }

    Ok(())
  }

  pub fn transform(&self, features: &FeatureVector) -> FeatureVector {
    let mut out = [0.0; FEATURE_LEN];
    for (i, value) in out.iter_mut().enumerate() {
      let x = features.0[i];
      *value = match self {
        Scaler::Standard { mean, scale } => (x - mean[i]) / scale[i],
        Scaler::MinMax { min, scale } => x * scale[i] + min[i],
      };
    }
    FeatureVector(out)
  }
}
