// 该文件是 Shouyu （手语） 项目的一部分。
// src/artifact.rs - 模型工件加载与校验
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

//! # 模型工件
//!
//! 分类模型、标签编码器与特征缩放器来自同一次训练，必须成套加载：
//!
//! | 文件 | 内容 |
//! |---|---|
//! | `sign_model_3dtilt.onnx` | 分类网络，输入 `[1, 63]` |
//! | `label_encoder.json` | 类别名称列表 |
//! | `scaler.json` | 特征缩放参数 |
//!
//! 任何一个文件缺失或彼此不匹配，加载即失败。

use std::{
  fs,
  path::{Path, PathBuf},
};

use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::info;

use crate::model::{Classifier, OnnxModelError, SignClassifier};

mod labels;
mod scaler;

pub use self::labels::LabelEncoder;
pub use self::scaler::Scaler;

pub const CLASSIFIER_FILE: &str = "sign_model_3dtilt.onnx";
pub const LABEL_ENCODER_FILE: &str = "label_encoder.json";
pub const SCALER_FILE: &str = "scaler.json";

#[derive(Error, Debug)]
pub enum ArtifactError {
  #[error("工件文件读取失败: {path}: {source}")]
  Io {
    path: PathBuf,
    source: std::io::Error,
  },
  #[error("工件文件解析失败: {path}: {source}")]
  Json {
    path: PathBuf,
    source: serde_json::Error,
  },
  #[error(transparent)]
  Model(#[from] OnnxModelError),
  #[error("缩放器长度不匹配: 期望 {expected}, 实际 {actual}")]
  ScalerLength { expected: usize, actual: usize },
  #[error("缩放器第 {0} 个参数无效")]
  InvalidScaler(usize),
  #[error("标签列表为空")]
  EmptyVocabulary,
  #[error("分类输出宽度 {classes} 与标签数量 {labels} 不一致")]
  VocabularyMismatch { classes: usize, labels: usize },
}

pub(crate) fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, ArtifactError> {
  let text = fs::read_to_string(path).map_err(|source| ArtifactError::Io {
    path: path.to_path_buf(),
    source,
  })?;
  serde_json::from_str(&text).map_err(|source| ArtifactError::Json {
    path: path.to_path_buf(),
    source,
  })
}

/// 一套相互匹配的分类工件
#[derive(Debug)]
pub struct ModelArtifacts<C> {
  pub classifier: C,
  pub scaler: Scaler,
  pub labels: LabelEncoder,
}

impl ModelArtifacts<SignClassifier> {
  pub fn load(dir: impl AsRef<Path>) -> Result<Self, ArtifactError> {
    let dir = dir.as_ref();
    info!("加载模型工件目录: {}", dir.display());

    let labels: LabelEncoder = read_json(&dir.join(LABEL_ENCODER_FILE))?;
    let scaler: Scaler = read_json(&dir.join(SCALER_FILE))?;
    let classifier = SignClassifier::load(dir.join(CLASSIFIER_FILE))?;

    Self::new(classifier, scaler, labels)
  }
}

impl<C: Classifier> ModelArtifacts<C> {
  pub fn new(classifier: C, scaler: Scaler, labels: LabelEncoder) -> Result<Self, ArtifactError> {
    scaler.validate()?;
    if labels.is_empty() {
      return Err(ArtifactError::EmptyVocabulary);
    }
    if classifier.num_classes() != labels.len() {
      return Err(ArtifactError::VocabularyMismatch {
        classes: classifier.num_classes(),
        labels: labels.len(),
      });
    }

    info!("手势类别: {:?}", labels.classes());
    Ok(Self {
      classifier,
      scaler,
      labels,
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{
    landmark::{FEATURE_LEN, FeatureVector},
    model::{Model, Probabilities},
  };

  #[derive(Debug)]
  struct FixedClassifier(usize);

  impl Model for FixedClassifier {
    type Input = FeatureVector;
    type Output = Probabilities;
    type Error = OnnxModelError;

    fn infer(&self, _: &FeatureVector) -> Result<Probabilities, OnnxModelError> {
      Ok(Probabilities::from_scores(vec![0.0; self.0]))
    }
  }

  impl Classifier for FixedClassifier {
    fn num_classes(&self) -> usize {
      self.0
    }
  }

  fn identity_scaler() -> Scaler {
    Scaler::Standard {
      mean: vec![0.0; FEATURE_LEN],
      scale: vec![1.0; FEATURE_LEN],
    }
  }

  fn labels(names: &[&str]) -> LabelEncoder {
    LabelEncoder::new(names.iter().map(|s| s.to_string()).collect()).unwrap()
  }

  #[test]
  fn matching_artifacts_are_accepted() {
    let artifacts = ModelArtifacts::new(FixedClassifier(2), identity_scaler(), labels(&["A", "B"]));
    assert!(artifacts.is_ok());
  }

  #[test]
  fn vocabulary_mismatch_is_rejected() {
    let err = ModelArtifacts::new(FixedClassifier(3), identity_scaler(), labels(&["A", "B"]))
      .unwrap_err();
    assert!(matches!(
      err,
      ArtifactError::VocabularyMismatch { classes: 3, labels: 2 }
    ));
  }

  #[test]
  fn missing_directory_fails_fast() {
    let dir = tempfile::tempdir().unwrap();
    let err = ModelArtifacts::load(dir.path()).unwrap_err();
    assert!(matches!(err, ArtifactError::Io { .. }));
  }

  #[test]
  fn missing_classifier_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join(LABEL_ENCODER_FILE), r#"{"classes": ["A"]}"#).unwrap();
    let scaler = serde_json::json!({
      "kind": "standard",
      "mean": vec![0.0; FEATURE_LEN],
      "scale": vec![1.0; FEATURE_LEN],
    });
    fs::write(dir.path().join(SCALER_FILE), scaler.to_string()).unwrap();

    let err = ModelArtifacts::load(dir.path()).unwrap_err();
    assert!(matches!(err, ArtifactError::Model(OnnxModelError::NotFound(_))));
  }

  #[test]
  fn malformed_json_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join(LABEL_ENCODER_FILE), "{").unwrap();
    let err = ModelArtifacts::load(dir.path()).unwrap_err();
    assert!(matches!(err, ArtifactError::Json { .. }));
  }
}
