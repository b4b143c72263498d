// 该文件是 Shouyu （手语） 项目的一部分。
// src/input.rs - 视频/图像输入
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

//! 按 URL scheme 选择帧来源：
//!
//! - `v4l:///dev/video0?width=640&height=480`
//! - `gst://camera/dev/video0?width=640&height=480`、`gst://file/path/to/video.mp4`
//! - `image:///path/to/image.jpg?repeat=1`

use std::time::Instant;

use image::RgbImage;
use thiserror::Error;

use crate::{FromUrl, frame::Frame};

#[cfg(feature = "read_image_file")]
mod read_image_file;
#[cfg(feature = "read_image_file")]
pub use self::read_image_file::{ImageFileInput, ImageFileInputError};

#[cfg(feature = "v4l_input")]
mod v4l_input;
#[cfg(feature = "v4l_input")]
pub use self::v4l_input::{V4lInput, V4lInputError};

#[cfg(feature = "gstreamer_input")]
mod gstreamer_input;
#[cfg(feature = "gstreamer_input")]
pub use self::gstreamer_input::{
  GStreamerInput, GStreamerInputError, GStreamerInputPipelineBuilder,
};

#[derive(Error, Debug)]
pub enum InputError {
  #[cfg(feature = "read_image_file")]
  #[error("图像文件输入错误: {0}")]
  ImageFile(#[from] ImageFileInputError),
  #[cfg(feature = "v4l_input")]
  #[error("V4L 输入错误: {0}")]
  V4l(#[from] V4lInputError),
  #[cfg(feature = "gstreamer_input")]
  #[error("GStreamer 输入错误: {0}")]
  GStreamer(#[from] GStreamerInputError),
  #[error("不支持的输入 scheme: {0}")]
  SchemeMismatch(String),
}

pub enum InputWrapper {
  #[cfg(feature = "v4l_input")]
  V4l(V4lInput),
  #[cfg(feature = "gstreamer_input")]
  GStreamer(GStreamerInput),
  #[cfg(feature = "read_image_file")]
  ImageFile(ImageFileInput),
}

impl FromUrl for InputWrapper {
  type Error = InputError;

  fn from_url(url: &url::Url) -> Result<Self, Self::Error> {
    #[cfg(feature = "v4l_input")]
    {
      use crate::FromUrlWithScheme;

      if url.scheme() == V4lInput::SCHEME {
        return Ok(InputWrapper::V4l(V4lInput::from_url(url)?));
      }
    }
    #[cfg(feature = "gstreamer_input")]
    {
      use crate::FromUrlWithScheme;

      if url.scheme() == GStreamerInputPipelineBuilder::SCHEME {
        let input = GStreamerInputPipelineBuilder::from_url(url)?.build()?;
        return Ok(InputWrapper::GStreamer(input));
      }
    }
    #[cfg(feature = "read_image_file")]
    {
      use crate::FromUrlWithScheme;

      if url.scheme() == ImageFileInput::SCHEME {
        return Ok(InputWrapper::ImageFile(ImageFileInput::from_url(url)?));
      }
    }
    Err(InputError::SchemeMismatch(url.scheme().to_string()))
  }
}

impl InputWrapper {
  /// 读取下一张图像；`None` 表示输入结束
  fn next_image(&mut self) -> Option<Result<RgbImage, InputError>> {
    match self {
      #[cfg(feature = "v4l_input")]
      InputWrapper::V4l(input) => input.next_image().map(|r| r.map_err(InputError::from)),
      #[cfg(feature = "gstreamer_input")]
      InputWrapper::GStreamer(input) => input.next_image().map(|r| r.map_err(InputError::from)),
      #[cfg(feature = "read_image_file")]
      InputWrapper::ImageFile(input) => input.next_image().map(|r| r.map_err(InputError::from)),
      #[allow(unreachable_patterns)]
      _ => None,
    }
  }

  pub fn into_frames(self) -> InputFrames {
    InputFrames {
      inner: self,
      started: Instant::now(),
      index: 0,
    }
  }
}

/// 为每张图像附加帧索引与时间戳
pub struct InputFrames {
  inner: InputWrapper,
  started: Instant,
  index: u64,
}

impl Iterator for InputFrames {
  type Item = Result<Frame, InputError>;

  fn next(&mut self) -> Option<Self::Item> {
    let image = match self.inner.next_image()? {
      Ok(image) => image,
      Err(e) => return Some(Err(e)),
    };
    let frame = Frame::new(image, self.index, self.started.elapsed().as_millis() as u64);
    self.index += 1;
    Some(Ok(frame))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn unknown_scheme_is_rejected() {
    let url = url::Url::parse("rtmp://example.com/live").unwrap();
    assert!(matches!(
      InputWrapper::from_url(&url),
      Err(InputError::SchemeMismatch(scheme)) if scheme == "rtmp"
    ));
  }

  #[cfg(feature = "read_image_file")]
  #[test]
  fn image_input_yields_indexed_frames() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("still.png");
    RgbImage::new(8, 6).save(&path).unwrap();

    let url = url::Url::parse(&format!("image://{}?repeat=3", path.display())).unwrap();
    let frames: Vec<Frame> = InputWrapper::from_url(&url)
      .unwrap()
      .into_frames()
      .collect::<Result<_, _>>()
      .unwrap();

    assert_eq!(frames.len(), 3);
    assert_eq!(frames[2].index, 2);
    assert_eq!(frames[0].image.dimensions(), (8, 6));
  }
}
