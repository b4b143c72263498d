// 该文件是 Shouyu （手语） 项目的一部分。
// src/frame.rs - 帧定义与编解码
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

use std::str::FromStr;

use image::{RgbImage, codecs::jpeg::JpegEncoder};
use thiserror::Error;
use tract_onnx::prelude::{IntoTensor, Tensor, tract_ndarray};

const RGB_CHANNELS: usize = 3;

#[derive(Error, Debug)]
pub enum FrameError {
  #[error("图像数据为空")]
  Empty,
  #[error("图像编解码错误: {0}")]
  Codec(#[from] image::ImageError),
  #[error("图像尺寸无效: {width}x{height}")]
  InvalidSize { width: u32, height: u32 },
  #[error("未知的张量布局: {0}")]
  UnknownLayout(String),
}

/// 帧数据
#[derive(Debug, Clone)]
pub struct Frame {
  /// RGB 图像数据
  pub image: RgbImage,
  /// 帧索引
  pub index: u64,
  /// 相对于采集开始的时间戳（毫秒）
  pub timestamp_ms: u64,
}

impl Frame {
  pub fn new(image: RgbImage, index: u64, timestamp_ms: u64) -> Self {
    Self {
      image,
      index,
      timestamp_ms,
    }
  }

  pub fn width(&self) -> u32 {
    self.image.width()
  }

  pub fn height(&self) -> u32 {
    self.image.height()
  }
}

/// 将上传的图像字节解码为 RGB 帧
///
/// 与直接使用解码结果不同，这里显式校验解码是否成功，
/// 损坏或非图像数据会返回错误而不是一张空图。
pub fn decode_frame(bytes: &[u8]) -> Result<RgbImage, FrameError> {
  if bytes.is_empty() {
    return Err(FrameError::Empty);
  }

  let image = image::load_from_memory(bytes)?.to_rgb8();
  if image.width() == 0 || image.height() == 0 {
    return Err(FrameError::InvalidSize {
      width: image.width(),
      height: image.height(),
    });
  }

  Ok(image)
}

/// 将帧编码为 JPEG 字节
pub fn encode_jpeg(image: &RgbImage, quality: u8) -> Result<Vec<u8>, FrameError> {
  let mut buffer = Vec::new();
  JpegEncoder::new_with_quality(&mut buffer, quality.clamp(1, 100)).encode_image(image)?;
  Ok(buffer)
}

/// 模型输入张量的内存布局
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TensorLayout {
  #[default]
  Nchw,
  Nhwc,
}

impl FromStr for TensorLayout {
  type Err = FrameError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.to_ascii_lowercase().as_str() {
      "nchw" => Ok(TensorLayout::Nchw),
      "nhwc" => Ok(TensorLayout::Nhwc),
      other => Err(FrameError::UnknownLayout(other.to_string())),
    }
  }
}

impl TensorLayout {
  /// 给定宽高时的输入形状
  pub fn shape(&self, width: usize, height: usize) -> [usize; 4] {
    match self {
      TensorLayout::Nchw => [1, RGB_CHANNELS, height, width],
      TensorLayout::Nhwc => [1, height, width, RGB_CHANNELS],
    }
  }
}

/// 将 RGB 图像转换为取值范围 [0, 1] 的 f32 张量
pub fn image_to_tensor(image: &RgbImage, layout: TensorLayout) -> Tensor {
  let width = image.width() as usize;
  let height = image.height() as usize;

  match layout {
    TensorLayout::Nchw => {
      tract_ndarray::Array4::from_shape_fn((1, RGB_CHANNELS, height, width), |(_, c, y, x)| {
        image.get_pixel(x as u32, y as u32)[c] as f32 / 255.0
      })
      .into_tensor()
    }
    TensorLayout::Nhwc => {
      tract_ndarray::Array4::from_shape_fn((1, height, width, RGB_CHANNELS), |(_, y, x, c)| {
        image.get_pixel(x as u32, y as u32)[c] as f32 / 255.0
      })
      .into_tensor()
    }
  }
}
