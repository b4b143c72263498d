// 该文件是 Shouyu （手语） 项目的一部分。
// src/input/read_image_file.rs - 图像文件输入
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

use image::{ImageReader, RgbImage};
use thiserror::Error;
use tracing::{error, info};
use url::Url;

use crate::{FromUrl, FromUrlWithScheme, query_or};

#[derive(Error, Debug)]
pub enum ImageFileInputError {
  #[error("URI scheme 不匹配")]
  SchemeMismatch,
  #[error("I/O 错误: {0}")]
  Io(#[from] std::io::Error),
  #[error("图像加载错误: {0}")]
  ImageLoad(#[from] image::ImageError),
}

const READ_IMAGE_FILE_SCHEME: &str = "image";

/// 静态图像输入，将同一张图像重复输出 `repeat` 次
pub struct ImageFileInput {
  image: RgbImage,
  remaining: usize,
}

impl FromUrl for ImageFileInput {
  type Error = ImageFileInputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != READ_IMAGE_FILE_SCHEME {
      error!(
        "URI scheme 不匹配: 期望 '{}', 实际 '{}'",
        READ_IMAGE_FILE_SCHEME,
        url.scheme()
      );
      return Err(ImageFileInputError::SchemeMismatch);
    }

    let path = url.path();
    let image = ImageReader::open(path)?.with_guessed_format()?.decode()?.to_rgb8();
    let remaining = query_or(url, "repeat", 1usize);
    info!(
      "读取图像 {} ({}x{}), 重复 {} 次",
      path,
      image.width(),
      image.height(),
      remaining
    );

    Ok(ImageFileInput { image, remaining })
  }
}

impl FromUrlWithScheme for ImageFileInput {
  const SCHEME: &'static str = READ_IMAGE_FILE_SCHEME;
}

impl ImageFileInput {
  pub(crate) fn next_image(&mut self) -> Option<Result<RgbImage, ImageFileInputError>> {
    if self.remaining == 0 {
      return None;
    }
    self.remaining -= 1;
    Some(Ok(self.image.clone()))
  }
}
