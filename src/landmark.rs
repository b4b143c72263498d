// 该文件是 Shouyu （手语） 项目的一部分。
// src/landmark.rs - 手部关键点提取
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

//! # 手部关键点提取
//!
//! 两阶段流程：先用手掌检测器定位手掌，再根据手腕与中指根部的连线
//! 求出旋转后的手部区域（ROI），将其裁剪为 224×224 后送入关键点网络，
//! 最后把关键点投影回原图的归一化坐标。
//!
//! 输出的 21 个关键点按 `x0, y0, z0, x1, y1, z1, ...` 展平为 63 维特征向量。

use std::{f32::consts::PI, path::Path};

use image::{Rgb, RgbImage};
use imageproc::geometric_transformations::{Interpolation, Projection, warp_into};
use tracing::debug;

use crate::{
  frame::TensorLayout,
  model::{
    HandLandmarker, HandLandmarkerBuilder, Model, OnnxModelError, PalmDetection, PalmDetector,
    PalmDetectorBuilder, PresenceOutput, RawHandLandmarks,
  },
};

/// 每只手的关键点数量
pub const LANDMARK_COUNT: usize = 21;
/// 展平后的特征长度
pub const FEATURE_LEN: usize = LANDMARK_COUNT * 3;

pub const PALM_MODEL_FILE: &str = "palm_detection_lite.onnx";
pub const LANDMARK_MODEL_FILE: &str = "hand_landmark_lite.onnx";

const CROP_SIZE: u32 = 224;
const ROI_SCALE: f32 = 2.6;
const ROI_SHIFT_Y: f32 = -0.5;
const WRIST: usize = 0;
const MIDDLE_MCP: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Landmark {
  pub x: f32,
  pub y: f32,
  pub z: f32,
}

/// 单只手的 21 个关键点，x/y 相对原图归一化，z 与 x 同尺度
#[derive(Debug, Clone, PartialEq)]
pub struct LandmarkSet {
  pub points: [Landmark; LANDMARK_COUNT],
}

impl LandmarkSet {
  pub fn to_feature_vector(&self) -> FeatureVector {
    let mut values = [0.0; FEATURE_LEN];
    for (chunk, point) in values.chunks_exact_mut(3).zip(self.points.iter()) {
      chunk[0] = point.x;
      chunk[1] = point.y;
      chunk[2] = point.z;
    }
    FeatureVector(values)
  }
}

/// 63 维特征向量
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureVector(pub [f32; FEATURE_LEN]);

impl FeatureVector {
  pub fn zeros() -> Self {
    Self([0.0; FEATURE_LEN])
  }

  pub fn as_slice(&self) -> &[f32] {
    &self.0
  }

  pub fn is_finite(&self) -> bool {
    self.0.iter().all(|v| v.is_finite())
  }
}

fn normalize_radians(angle: f32) -> f32 {
  angle - 2.0 * PI * ((angle + PI) / (2.0 * PI)).floor()
}

/// 旋转的手部区域，像素坐标
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HandRoi {
  pub center: [f32; 2],
  pub size: [f32; 2],
  /// 弧度，顺时针为正（图像坐标系 y 轴向下）
  pub rotation: f32,
}

impl HandRoi {
  pub fn from_palm(palm: &PalmDetection) -> Self {
    let wrist = palm.keypoints[WRIST];
    let mcp = palm.keypoints[MIDDLE_MCP];
    let rotation =
      normalize_radians(PI / 2.0 - (-(mcp[1] - wrist[1])).atan2(mcp[0] - wrist[0]));

    let [width, height] = palm.size;
    let (sin, cos) = rotation.sin_cos();
    let center = [
      palm.center[0] - height * ROI_SHIFT_Y * sin,
      palm.center[1] + height * ROI_SHIFT_Y * cos,
    ];

    let side = width.max(height) * ROI_SCALE;
    Self {
      center,
      size: [side, side],
      rotation,
    }
  }

  /// 图像坐标 -> 裁剪图坐标
  fn projection(&self) -> Option<Projection> {
    if self.size[0] <= 0.0 || self.size[1] <= 0.0 {
      return None;
    }
    let half = CROP_SIZE as f32 / 2.0;
    Some(
      Projection::translate(-self.center[0], -self.center[1])
        .and_then(Projection::rotate(-self.rotation))
        .and_then(Projection::scale(
          CROP_SIZE as f32 / self.size[0],
          CROP_SIZE as f32 / self.size[1],
        ))
        .and_then(Projection::translate(half, half)),
    )
  }

  /// 将 ROI 裁剪为关键点网络的输入，越界部分填黑
  pub fn crop(&self, image: &RgbImage) -> Option<RgbImage> {
    let projection = self.projection()?;
    let mut crop = RgbImage::new(CROP_SIZE, CROP_SIZE);
    warp_into(
      image,
      &projection,
      Interpolation::Bilinear,
      Rgb([0, 0, 0]),
      &mut crop,
    );
    Some(crop)
  }

  /// 将裁剪图中的关键点投影回原图归一化坐标
  pub fn project(&self, raw: &RawHandLandmarks, image_width: u32, image_height: u32) -> LandmarkSet {
    let crop = CROP_SIZE as f32;
    let (sin, cos) = self.rotation.sin_cos();
    let [width, height] = self.size;
    let image_width = image_width as f32;
    let image_height = image_height as f32;

    let mut points = [Landmark::default(); LANDMARK_COUNT];
    for (point, [x, y, z]) in points.iter_mut().zip(raw.points.iter().copied()) {
      let dx = (x / crop - 0.5) * width;
      let dy = (y / crop - 0.5) * height;
      *point = Landmark {
        x: (self.center[0] + cos * dx - sin * dy) / image_width,
        y: (self.center[1] + sin * dx + cos * dy) / image_height,
        z: z / crop * width / image_width,
      };
    }
    LandmarkSet { points }
  }
}

/// 手掌检测 + 关键点回归
pub struct LandmarkExtractor<P, L> {
  palm: P,
  landmarker: L,
}

pub type MediaPipeHandExtractor = LandmarkExtractor<PalmDetector, HandLandmarker>;

impl MediaPipeHandExtractor {
  /// 从目录加载 `palm_detection_lite.onnx` 与 `hand_landmark_lite.onnx`
  pub fn load(
    dir: impl AsRef<Path>,
    layout: TensorLayout,
    presence: PresenceOutput,
  ) -> Result<Self, OnnxModelError> {
    let dir = dir.as_ref();
    let palm = PalmDetectorBuilder::new(dir.join(PALM_MODEL_FILE))
      .layout(layout)
      .build()?;
    let landmarker = HandLandmarkerBuilder::new(dir.join(LANDMARK_MODEL_FILE))
      .layout(layout)
      .presence_output(presence)
      .build()?;
    Ok(Self::new(palm, landmarker))
  }
}

impl<P, L> LandmarkExtractor<P, L>
where
  P: Model<Input = RgbImage, Output = Option<PalmDetection>, Error = OnnxModelError>,
  L: Model<Input = RgbImage, Output = Option<RawHandLandmarks>, Error = OnnxModelError>,
{
  pub fn new(palm: P, landmarker: L) -> Self {
    Self { palm, landmarker }
  }
}

impl<P, L> Model for LandmarkExtractor<P, L>
where
  P: Model<Input = RgbImage, Output = Option<PalmDetection>, Error = OnnxModelError>,
  L: Model<Input = RgbImage, Output = Option<RawHandLandmarks>, Error = OnnxModelError>,
{
  type Input = RgbImage;
  type Output = Option<LandmarkSet>;
  type Error = OnnxModelError;

  fn infer(&self, image: &Self::Input) -> Result<Self::Output, Self::Error> {
    let Some(palm) = self.palm.infer(image)? else {
      debug!("未检测到手掌");
      return Ok(None);
    };

    let roi = HandRoi::from_palm(&palm);
    debug!(
      "手掌置信度 {:.3}, ROI 中心 ({:.1}, {:.1}), 边长 {:.1}, 旋转 {:.3}",
      palm.score, roi.center[0], roi.center[1], roi.size[0], roi.rotation
    );
    let Some(crop) = roi.crop(image) else {
      return Ok(None);
    };

    Ok(
      self
        .landmarker
        .infer(&crop)?
        .map(|raw| roi.project(&raw, image.width(), image.height())),
    )
  }
}

#[cfg(test)]
mod tests {
  use std::sync::atomic::{AtomicUsize, Ordering};

  use super::*;
  use crate::model::PalmDetection;

  fn upright_palm(center: [f32; 2], size: f32) -> PalmDetection {
    let mut keypoints = [center; 7];
    keypoints[WRIST] = [center[0], center[1] + size / 2.0];
    keypoints[MIDDLE_MCP] = [center[0], center[1] - size / 2.0];
    PalmDetection {
      score: 0.9,
      center,
      size: [size, size],
      keypoints,
    }
  }

  struct FakePalm(Option<PalmDetection>);

  impl Model for FakePalm {
    type Input = RgbImage;
    type Output = Option<PalmDetection>;
    type Error = OnnxModelError;

    fn infer(&self, _: &RgbImage) -> Result<Self::Output, Self::Error> {
      Ok(self.0.clone())
    }
  }

  struct CentredLandmarks {
    calls: AtomicUsize,
  }

  impl Model for CentredLandmarks {
    type Input = RgbImage;
    type Output = Option<RawHandLandmarks>;
    type Error = OnnxModelError;

    fn infer(&self, crop: &RgbImage) -> Result<Self::Output, Self::Error> {
      assert_eq!(crop.dimensions(), (CROP_SIZE, CROP_SIZE));
      self.calls.fetch_add(1, Ordering::SeqCst);
      Ok(Some(RawHandLandmarks {
        points: [[112.0, 112.0, 0.0]; LANDMARK_COUNT],
        presence: 0.99,
      }))
    }
  }

  fn centred() -> CentredLandmarks {
    CentredLandmarks {
      calls: AtomicUsize::new(0),
    }
  }

  #[test]
  fn feature_vector_is_xyz_interleaved() {
    let mut points = [Landmark::default(); LANDMARK_COUNT];
    for (i, p) in points.iter_mut().enumerate() {
      *p = Landmark {
        x: i as f32,
        y: i as f32 + 0.25,
        z: i as f32 + 0.5,
      };
    }
    let features = LandmarkSet { points }.to_feature_vector();
    assert_eq!(&features.as_slice()[..6], &[0.0, 0.25, 0.5, 1.0, 1.25, 1.5]);
    assert_eq!(features.as_slice()[62], 20.5);
  }

  #[test]
  fn radians_are_normalized() {
    assert!((normalize_radians(3.0 * PI / 2.0) + PI / 2.0).abs() < 1e-5);
    assert!((normalize_radians(0.25) - 0.25).abs() < 1e-6);
  }

  #[test]
  fn upright_hand_has_no_rotation() {
    let roi = HandRoi::from_palm(&upright_palm([100.0, 100.0], 40.0));
    assert!(roi.rotation.abs() < 1e-5);
    assert!((roi.center[0] - 100.0).abs() < 1e-4);
    assert!((roi.center[1] - 80.0).abs() < 1e-4);
    assert!((roi.size[0] - 104.0).abs() < 1e-4);
  }

  #[test]
  fn sideways_hand_is_rotated() {
    let mut palm = upright_palm([100.0, 100.0], 40.0);
    // 手指朝右
    palm.keypoints[WRIST] = [80.0, 100.0];
    palm.keypoints[MIDDLE_MCP] = [120.0, 100.0];
    let roi = HandRoi::from_palm(&palm);
    assert!((roi.rotation - PI / 2.0).abs() < 1e-5);
    assert!((roi.center[0] - 120.0).abs() < 1e-3);
    assert!((roi.center[1] - 100.0).abs() < 1e-3);
  }

  #[test]
  fn crop_samples_around_roi_centre() {
    let image = RgbImage::from_fn(200, 200, |x, y| {
      if (90..110).contains(&x) && (90..110).contains(&y) {
        Rgb([255, 0, 0])
      } else {
        Rgb([0, 0, 0])
      }
    });
    let roi = HandRoi {
      center: [100.0, 100.0],
      size: [56.0, 56.0],
      rotation: 0.0,
    };
    let crop = roi.crop(&image).unwrap();
    assert_eq!(crop.get_pixel(112, 112), &Rgb([255, 0, 0]));
    assert_eq!(crop.get_pixel(2, 2), &Rgb([0, 0, 0]));
  }

  #[test]
  fn projection_undoes_the_crop() {
    let roi = HandRoi {
      center: [320.0, 240.0],
      size: [100.0, 100.0],
      rotation: PI / 2.0,
    };
    let mut raw = RawHandLandmarks {
      points: [[112.0, 112.0, 22.4]; LANDMARK_COUNT],
      presence: 1.0,
    };
    raw.points[1] = [168.0, 112.0, 0.0];

    let set = roi.project(&raw, 640, 480);
    assert!((set.points[0].x - 0.5).abs() < 1e-5);
    assert!((set.points[0].y - 0.5).abs() < 1e-5);
    assert!((set.points[0].z - 10.0 / 640.0).abs() < 1e-5);
    // 裁剪图中向右 = 原图中向下
    assert!((set.points[1].x - 0.5).abs() < 1e-4);
    assert!((set.points[1].y - 265.0 / 480.0).abs() < 1e-4);
  }

  #[test]
  fn extractor_returns_63_finite_values() {
    let palm = FakePalm(Some(upright_palm([100.0, 100.0], 40.0)));
    let extractor = LandmarkExtractor::new(palm, centred());
    let features = extractor
      .infer(&RgbImage::new(200, 200))
      .unwrap()
      .unwrap()
      .to_feature_vector();
    assert_eq!(features.as_slice().len(), FEATURE_LEN);
    assert!(features.is_finite());
    assert!((features.as_slice()[0] - 0.5).abs() < 1e-4);
    assert!((features.as_slice()[1] - 0.4).abs() < 1e-4);
  }

  #[test]
  fn extractor_skips_landmarks_without_palm() {
    let extractor = LandmarkExtractor::new(FakePalm(None), centred());
    assert!(extractor.infer(&RgbImage::new(64, 64)).unwrap().is_none());
    assert_eq!(extractor.landmarker.calls.load(Ordering::SeqCst), 0);
  }
}
