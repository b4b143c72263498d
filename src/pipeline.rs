// 该文件是 Shouyu （手语） 项目的一部分。
// src/pipeline.rs - 手势识别流水线
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

//! 关键点提取 -> 特征缩放 -> 分类 -> 标签解码

use std::path::Path;

use image::RgbImage;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::{
  artifact::{ArtifactError, ModelArtifacts},
  config::NO_HAND_TEXT,
  frame::{Frame, FrameError, TensorLayout},
  landmark::{LandmarkSet, MediaPipeHandExtractor},
  model::{Classifier, Model, OnnxModelError, PresenceOutput, SignClassifier},
};

/// 单次预测结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
  pub sign: String,
  /// 最大类别概率，取值 [0, 1]
  pub confidence: f32,
}

impl Prediction {
  /// `A (92.3%)`
  pub fn display_text(&self) -> String {
    format!("{} ({:.1}%)", self.sign, self.confidence * 100.0)
  }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Recognition {
  NoHand,
  Sign(Prediction),
}

impl Recognition {
  pub fn display_text(&self) -> String {
    match self {
      Recognition::NoHand => NO_HAND_TEXT.to_string(),
      Recognition::Sign(prediction) => prediction.display_text(),
    }
  }
}

#[derive(Error, Debug)]
pub enum PipelineError {
  #[error(transparent)]
  Frame(#[from] FrameError),
  #[error(transparent)]
  Model(#[from] OnnxModelError),
  #[error("分类输出为空")]
  EmptyOutput,
  #[error("类别下标 {0} 超出标签范围")]
  UnknownClass(usize),
  #[error("{0}包含非有限值")]
  NonFinite(&'static str),
}

/// 构建后不可变的识别上下文，可在请求之间共享
pub struct SignPipeline<E, C> {
  extractor: E,
  artifacts: ModelArtifacts<C>,
}

pub type HandSignPipeline = SignPipeline<MediaPipeHandExtractor, SignClassifier>;

impl HandSignPipeline {
  pub fn load(
    model_dir: impl AsRef<Path>,
    detector_dir: impl AsRef<Path>,
    layout: TensorLayout,
    presence: PresenceOutput,
  ) -> Result<Self, ArtifactError> {
    let artifacts = ModelArtifacts::load(model_dir)?;
    let extractor = MediaPipeHandExtractor::load(detector_dir, layout, presence)?;
    Ok(Self::new(extractor, artifacts))
  }
}

impl<E, C> SignPipeline<E, C>
where
  E: Model<Input = RgbImage, Output = Option<LandmarkSet>, Error = OnnxModelError>,
  C: Classifier,
{
  pub fn new(extractor: E, artifacts: ModelArtifacts<C>) -> Self {
    Self {
      extractor,
      artifacts,
    }
  }

  pub fn labels(&self) -> &[String] {
    self.artifacts.labels.classes()
  }
}

impl<E, C> Model for SignPipeline<E, C>
where
  E: Model<Input = RgbImage, Output = Option<LandmarkSet>, Error = OnnxModelError>,
  C: Classifier,
{
  type Input = RgbImage;
  type Output = Recognition;
  type Error = PipelineError;

  fn infer(&self, image: &Self::Input) -> Result<Self::Output, Self::Error> {
    let Some(landmarks) = self.extractor.infer(image)? else {
      return Ok(Recognition::NoHand);
    };

    let raw = landmarks.to_feature_vector();
    if !raw.is_finite() {
      return Err(PipelineError::NonFinite("手部关键点"));
    }

    let features = self.artifacts.scaler.transform(&raw);
    let probabilities = self.artifacts.classifier.infer(&features)?;
    let (index, confidence) = probabilities.argmax().ok_or(PipelineError::EmptyOutput)?;
    if !confidence.is_finite() {
      return Err(PipelineError::NonFinite("分类置信度"));
    }
    let sign = self
      .artifacts
      .labels
      .decode(index)
      .ok_or(PipelineError::UnknownClass(index))?;

    debug!("识别结果: {} ({:.3})", sign, confidence);
    Ok(Recognition::Sign(Prediction {
      sign: sign.to_string(),
      confidence: confidence.clamp(0.0, 1.0),
    }))
  }
}

/// 在本地对每一帧做识别，输出叠加文字
pub struct FrameRecognizer<M>(pub M);

impl<M> Model for FrameRecognizer<M>
where
  M: Model<Input = RgbImage, Output = Recognition, Error = PipelineError>,
{
  type Input = Frame;
  type Output = String;
  type Error = PipelineError;

  fn infer(&self, frame: &Frame) -> Result<String, PipelineError> {
    Ok(self.0.infer(&frame.image)?.display_text())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{
    artifact::{LabelEncoder, Scaler},
    frame::{decode_frame, encode_jpeg},
    landmark::{FEATURE_LEN, FeatureVector, LANDMARK_COUNT, Landmark},
    model::Probabilities,
  };

  /// `None` 表示没有手，否则所有关键点都位于 (x, 0.5, 0)
  struct FakeExtractor(Option<f32>);

  impl Model for FakeExtractor {
    type Input = RgbImage;
    type Output = Option<LandmarkSet>;
    type Error = OnnxModelError;

    fn infer(&self, _: &RgbImage) -> Result<Self::Output, Self::Error> {
      Ok(self.0.map(|x| LandmarkSet {
        points: [Landmark { x, y: 0.5, z: 0.0 }; LANDMARK_COUNT],
      }))
    }
  }

  /// 输出与第一个特征相关的 logit，便于检查缩放是否生效
  struct LogitClassifier;

  impl Model for LogitClassifier {
    type Input = FeatureVector;
    type Output = Probabilities;
    type Error = OnnxModelError;

    fn infer(&self, features: &FeatureVector) -> Result<Probabilities, OnnxModelError> {
      let x = features.as_slice()[0];
      Ok(Probabilities::from_scores(vec![x, -x, 0.0]))
    }
  }

  impl Classifier for LogitClassifier {
    fn num_classes(&self) -> usize {
      3
    }
  }

  /// 输出固定分数，不看输入
  struct ConstantClassifier(Vec<f32>);

  impl Model for ConstantClassifier {
    type Input = FeatureVector;
    type Output = Probabilities;
    type Error = OnnxModelError;

    fn infer(&self, _: &FeatureVector) -> Result<Probabilities, OnnxModelError> {
      Ok(Probabilities::from_scores(self.0.clone()))
    }
  }

  impl Classifier for ConstantClassifier {
    fn num_classes(&self) -> usize {
      self.0.len()
    }
  }

  fn assemble<E, C>(extractor: E, classifier: C) -> SignPipeline<E, C>
  where
    E: Model<Input = RgbImage, Output = Option<LandmarkSet>, Error = OnnxModelError>,
    C: Classifier,
  {
    let scaler = Scaler::Standard {
      mean: vec![0.0; FEATURE_LEN],
      scale: vec![0.1; FEATURE_LEN],
    };
    let labels = LabelEncoder::new(vec!["A".into(), "B".into(), "C".into()]).unwrap();
    let artifacts = ModelArtifacts::new(classifier, scaler, labels).unwrap();
    SignPipeline::new(extractor, artifacts)
  }

  fn pipeline(hand: bool) -> SignPipeline<FakeExtractor, LogitClassifier> {
    assemble(FakeExtractor(hand.then_some(0.5)), LogitClassifier)
  }

  #[test]
  fn no_hand_is_a_valid_outcome() {
    let result = pipeline(false).infer(&RgbImage::new(32, 32)).unwrap();
    assert_eq!(result, Recognition::NoHand);
  }

  #[test]
  fn prediction_uses_scaled_features() {
    let Recognition::Sign(prediction) = pipeline(true).infer(&RgbImage::new(32, 32)).unwrap() else {
      panic!("expected a sign");
    };
    // 0.5 / 0.1 = 5.0，softmax([5, -5, 0]) 的最大值约为 0.993
    assert_eq!(prediction.sign, "A");
    assert!(prediction.confidence > 0.99 && prediction.confidence <= 1.0);
  }

  #[test]
  fn repeated_inference_is_identical() {
    let pipeline = pipeline(true);
    let bytes = encode_jpeg(&RgbImage::new(32, 32), 90).unwrap();
    let image = decode_frame(&bytes).unwrap();
    let first = pipeline.infer(&image).unwrap();
    let second = pipeline.infer(&image).unwrap();
    assert_eq!(first, second);
    let Recognition::Sign(prediction) = first else {
      panic!("expected a sign");
    };
    assert!(pipeline.labels().contains(&prediction.sign));
  }

  #[test]
  fn non_finite_landmarks_are_rejected() {
    let pipeline = assemble(FakeExtractor(Some(f32::NAN)), LogitClassifier);
    let err = pipeline.infer(&RgbImage::new(32, 32)).unwrap_err();
    assert!(matches!(err, PipelineError::NonFinite(_)));
  }

  #[test]
  fn non_finite_confidence_is_rejected() {
    let classifier = ConstantClassifier(vec![0.2, f32::NAN, 0.1]);
    let pipeline = assemble(FakeExtractor(Some(0.5)), classifier);
    let err = pipeline.infer(&RgbImage::new(32, 32)).unwrap_err();
    assert!(matches!(err, PipelineError::NonFinite(_)));
  }

  #[test]
  fn frame_recognizer_renders_display_text() {
    let frame = Frame::new(RgbImage::new(8, 8), 0, 0);
    assert_eq!(FrameRecognizer(pipeline(false)).infer(&frame).unwrap(), "No hand detected");
    assert!(FrameRecognizer(pipeline(true)).infer(&frame).unwrap().starts_with("A (99."));
  }

  #[test]
  fn prediction_serializes_as_sign_and_confidence() {
    let json = serde_json::to_value(Prediction {
      sign: "A".into(),
      confidence: 0.5,
    })
    .unwrap();
    assert_eq!(json, serde_json::json!({"sign": "A", "confidence": 0.5}));
  }
}
