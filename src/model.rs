// 该文件是 Shouyu （手语） 项目的一部分。
// src/model.rs - 模型
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

/// 推理模型的统一接口
///
/// 模型在构建后不可变，`infer` 只需要共享引用，因此可以在多个请求之间共享。
pub trait Model {
  type Input;
  type Output;
  type Error;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error>;
}

mod classifier;
mod hand_landmark;
mod onnx;
mod palm;

pub use self::classifier::{Classifier, Probabilities, SignClassifier};
pub use self::hand_landmark::{
  HandLandmarker, HandLandmarkerBuilder, PresenceOutput, RawHandLandmarks,
};
pub use self::onnx::{OnnxModel, OnnxModelError, RawOutput};
pub use self::palm::{PalmDetection, PalmDetector, PalmDetectorBuilder};

pub(crate) fn sigmoid(x: f32) -> f32 {
  1.0 / (1.0 + (-x).exp())
}
