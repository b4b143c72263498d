// 该文件是 Shouyu （手语） 项目的一部分。
// src/input/v4l_input.rs - V4L 摄像头输入
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

use std::pin::Pin;

use image::RgbImage;
use thiserror::Error;
use tracing::{error, info};
use url::Url;
use v4l::{
  Device, FourCC,
  buffer::Type,
  io::{mmap::Stream, traits::CaptureStream},
  video::Capture,
};

use crate::{FromUrl, FromUrlWithScheme, frame::decode_frame, query_or};

#[derive(Error, Debug)]
pub enum V4lInputError {
  #[error("URI scheme 不匹配")]
  SchemeMismatch,
  #[error("V4L 设备错误: {path}: {source}")]
  Device {
    path: String,
    source: std::io::Error,
  },
  #[error("帧捕获失败: {0}")]
  Capture(std::io::Error),
  #[error("不支持的像素格式: {0}")]
  UnsupportedPixelFormat(String),
  #[error("帧数据损坏: {0}")]
  CorruptFrame(String),
}

const V4L_SCHEME: &str = "v4l";
const DEFAULT_DEVICE: &str = "/dev/video0";
const DEFAULT_WIDTH: u32 = 640;
const DEFAULT_HEIGHT: u32 = 480;
const BUFFER_COUNT: u32 = 4;

const MJPG: [u8; 4] = *b"MJPG";
const YUYV: [u8; 4] = *b"YUYV";
const RGB3: [u8; 4] = *b"RGB3";

/// V4L2 摄像头
///
/// 捕获流借用设备句柄，设备放在堆上固定地址；字段按声明顺序释放，
/// 因此 `stream` 必须声明在 `device` 之前。
pub struct V4lInput {
  stream: Stream<'static>,
  #[allow(dead_code)]
  device: Pin<Box<Device>>,
  width: u32,
  height: u32,
  fourcc: [u8; 4],
}

impl FromUrl for V4lInput {
  type Error = V4lInputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != V4L_SCHEME {
      error!(
        "URI scheme 不匹配: 期望 '{}', 实际 '{}'",
        V4L_SCHEME,
        url.scheme()
      );
      return Err(V4lInputError::SchemeMismatch);
    }

    // v4l:///dev/video0
    let path = if url.path().is_empty() || url.path() == "/" {
      DEFAULT_DEVICE.to_string()
    } else {
      url.path().to_string()
    };
    let device_error = |source| V4lInputError::Device {
      path: path.clone(),
      source,
    };

    let device = Box::pin(Device::with_path(&path).map_err(device_error)?);

    let mut format = device.format().map_err(device_error)?;
    format.width = query_or(url, "width", DEFAULT_WIDTH);
    format.height = query_or(url, "height", DEFAULT_HEIGHT);
    format.fourcc = FourCC::new(&MJPG);
    let format = device.set_format(&format).map_err(device_error)?;

    let fourcc = format.fourcc.repr;
    if ![MJPG, YUYV, RGB3].contains(&fourcc) {
      return Err(V4lInputError::UnsupportedPixelFormat(format.fourcc.to_string()));
    }
    info!(
      "打开摄像头 {}: {}x{} {}",
      path, format.width, format.height, format.fourcc
    );

    let device_ref: &Device = &device;
    // SAFETY: 设备固定在堆上且不会移动，stream 先于 device 释放
    let device_static: &'static Device = unsafe { std::mem::transmute(device_ref) };
    let stream =
      Stream::with_buffers(device_static, Type::VideoCapture, BUFFER_COUNT).map_err(device_error)?;

    Ok(V4lInput {
      stream,
      device,
      width: format.width,
      height: format.height,
      fourcc,
    })
  }
}

impl FromUrlWithScheme for V4lInput {
  const SCHEME: &'static str = V4L_SCHEME;
}

impl V4lInput {
  pub(crate) fn next_image(&mut self) -> Option<Result<RgbImage, V4lInputError>> {
    let (buffer, meta) = match self.stream.next() {
      Ok(captured) => captured,
      Err(e) => return Some(Err(V4lInputError::Capture(e))),
    };

    // 部分驱动不填写 bytesused
    let used = match meta.bytesused as usize {
      0 => buffer.len(),
      n => n.min(buffer.len()),
    };
    Some(decode_buffer(&buffer[..used], self.fourcc, self.width, self.height))
  }
}

fn decode_buffer(
  data: &[u8],
  fourcc: [u8; 4],
  width: u32,
  height: u32,
) -> Result<RgbImage, V4lInputError> {
  let corrupt = || {
    V4lInputError::CorruptFrame(format!(
      "{} 字节无法构成 {}x{} 图像",
      data.len(),
      width,
      height
    ))
  };

  match fourcc {
    MJPG => decode_frame(data).map_err(|e| V4lInputError::CorruptFrame(e.to_string())),
    YUYV => {
      let needed = (width * height * 2) as usize;
      if data.len() < needed {
        return Err(corrupt());
      }
      RgbImage::from_raw(width, height, yuyv_to_rgb(&data[..needed])).ok_or_else(corrupt)
    }
    RGB3 => {
      let needed = (width * height * 3) as usize;
      if data.len() < needed {
        return Err(corrupt());
      }
      RgbImage::from_raw(width, height, data[..needed].to_vec()).ok_or_else(corrupt)
    }
    other => Err(V4lInputError::UnsupportedPixelFormat(
      String::from_utf8_lossy(&other).into_owned(),
    )),
  }
}

/// YUYV 4:2:2 -> RGB，两个像素共享一组 U/V
fn yuyv_to_rgb(yuyv: &[u8]) -> Vec<u8> {
  let mut rgb = Vec::with_capacity(yuyv.len() / 2 * 3);

  for chunk in yuyv.chunks_exact(4) {
    let u = chunk[1] as f32 - 128.0;
    let v = chunk[3] as f32 - 128.0;

    for y in [chunk[0] as f32, chunk[2] as f32] {
      let r = (y + 1.402 * v).clamp(0.0, 255.0) as u8;
      let g = (y - 0.344 * u - 0.714 * v).clamp(0.0, 255.0) as u8;
      let b = (y + 1.772 * u).clamp(0.0, 255.0) as u8;
      rgb.extend_from_slice(&[r, g, b]);
    }
  }

  rgb
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn neutral_chroma_gives_grey() {
    let rgb = yuyv_to_rgb(&[100, 128, 200, 128]);
    assert_eq!(rgb, vec![100, 100, 100, 200, 200, 200]);
  }

  #[test]
  fn strong_v_is_red() {
    let rgb = yuyv_to_rgb(&[128, 128, 128, 255]);
    assert_eq!(rgb[0], 255);
    assert!(rgb[1] < 128);
  }

  #[test]
  fn short_yuyv_buffer_is_corrupt() {
    let err = decode_buffer(&[0; 10], YUYV, 4, 4).unwrap_err();
    assert!(matches!(err, V4lInputError::CorruptFrame(_)));
  }

  #[test]
  fn rgb3_is_copied() {
    let data: Vec<u8> = (0..12).collect();
    let image = decode_buffer(&data, RGB3, 2, 2).unwrap();
    assert_eq!(image.get_pixel(1, 1).0, [9, 10, 11]);
  }

  #[test]
  fn mjpg_is_decoded() {
    let jpeg = crate::frame::encode_jpeg(&RgbImage::new(16, 8), 90).unwrap();
    let image = decode_buffer(&jpeg, MJPG, 16, 8).unwrap();
    assert_eq!(image.dimensions(), (16, 8));
  }
}
