// 该文件是 Shouyu （手语） 项目的一部分。
// src/output/draw.rs - 识别结果文字叠加
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

use std::path::{Path, PathBuf};

use ab_glyph::{FontArc, PxScale};
use image::{Rgb, RgbImage};
use imageproc::{
  drawing::{draw_filled_rect_mut, draw_text_mut, text_size},
  rect::Rect,
};
use thiserror::Error;
use tracing::debug;

use crate::config::DEFAULT_FONT;

// 文本渲染常量
const TEXT_FONT_SIZE: f32 = 32.0;
const TEXT_ORIGIN: (i32, i32) = (10, 10);
const TEXT_PADDING: i32 = 6;
const TEXT_COLOR: [u8; 3] = [0, 255, 0]; // 绿色
const BACKGROUND_COLOR: [u8; 3] = [32, 32, 32];

#[derive(Error, Debug)]
pub enum DrawError {
  #[error("无法读取字体文件 {path}: {source}")]
  FontIo {
    path: PathBuf,
    source: std::io::Error,
  },
  #[error("无效的字体文件: {0}")]
  InvalidFont(PathBuf),
}

/// 在画面左上角绘制一行文字
pub struct Draw {
  font: FontArc,
  scale: PxScale,
  text_color: Rgb<u8>,
  background: Rgb<u8>,
}

impl Draw {
  pub fn load(path: impl AsRef<Path>) -> Result<Self, DrawError> {
    let path = path.as_ref();
    let data = std::fs::read(path).map_err(|source| DrawError::FontIo {
      path: path.to_path_buf(),
      source,
    })?;
    let font =
      FontArc::try_from_vec(data).map_err(|_| DrawError::InvalidFont(path.to_path_buf()))?;
    debug!("加载字体: {}", path.display());

    Ok(Self {
      font,
      scale: PxScale::from(TEXT_FONT_SIZE),
      text_color: Rgb(TEXT_COLOR),
      background: Rgb(BACKGROUND_COLOR),
    })
  }

  /// 读取 `?font=` 与 `?size=` 查询参数
  pub fn from_url(url: &url::Url) -> Result<Self, DrawError> {
    let font = url
      .query_pairs()
      .find(|(k, _)| k == "font")
      .map(|(_, v)| v.into_owned())
      .unwrap_or_else(|| DEFAULT_FONT.to_string());
    let size = crate::query_or(url, "size", TEXT_FONT_SIZE);

    let mut draw = Self::load(font)?;
    draw.scale = PxScale::from(size);
    Ok(draw)
  }

  pub fn draw_text_on_image(&self, image: &mut RgbImage, text: &str) {
    if text.is_empty() {
      return;
    }

    let (text_width, text_height) = text_size(self.scale, &self.font, text);
    if let Some(rect) = background_rect(text_width, text_height, image.width(), image.height()) {
      draw_filled_rect_mut(image, rect, self.background);
    }

    draw_text_mut(
      image,
      self.text_color,
      TEXT_ORIGIN.0,
      TEXT_ORIGIN.1,
      self.scale,
      &self.font,
      text,
    );
  }

  pub fn draw_text(&self, image: &RgbImage, text: &str) -> RgbImage {
    let mut image = image.clone();
    self.draw_text_on_image(&mut image, text);
    image
  }
}

/// 文字背景框，裁剪到图像范围内；完全不可见时返回 `None`
fn background_rect(text_width: u32, text_height: u32, width: u32, height: u32) -> Option<Rect> {
  let x = TEXT_ORIGIN.0 - TEXT_PADDING;
  let y = TEXT_ORIGIN.1 - TEXT_PADDING;
  let right = (TEXT_ORIGIN.0 + text_width as i32 + TEXT_PADDING).min(width as i32);
  let bottom = (TEXT_ORIGIN.1 + text_height as i32 + TEXT_PADDING).min(height as i32);

  let x = x.max(0);
  let y = y.max(0);
  if right <= x || bottom <= y {
    return None;
  }
  Some(Rect::at(x, y).of_size((right - x) as u32, (bottom - y) as u32))
}
