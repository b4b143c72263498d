// 该文件是 Shouyu （手语） 项目的一部分。
// src/output/directory_record.rs - 目录记录输出
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

//! `folder:///records?record&font=...`
//!
//! 按 `年/月/日` 建立子目录，每帧保存一张叠加了文字的图像；
//! 带 `record` 参数时额外写入同名 `.txt`，内容为当时的显示文字。

use std::{
  path::{Path, PathBuf},
  sync::atomic::{AtomicU32, Ordering},
};

use chrono::{DateTime, Datelike, Local};
use thiserror::Error;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::Frame,
  output::{
    Render,
    draw::{Draw, DrawError},
  },
};

#[derive(Error, Debug)]
pub enum DirectoryRecordOutputError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("图像错误: {0}")]
  Image(#[from] image::ImageError),
  #[error("I/O 错误: {0}")]
  Io(#[from] std::io::Error),
  #[error(transparent)]
  Draw(#[from] DrawError),
}

pub struct DirectoryRecordOutput {
  directory: PathBuf,
  draw: Draw,
  frame_counter: AtomicU32,
  record_text: bool,
}

impl FromUrlWithScheme for DirectoryRecordOutput {
  const SCHEME: &'static str = "folder";
}

impl FromUrl for DirectoryRecordOutput {
  type Error = DirectoryRecordOutputError;

  fn from_url(uri: &url::Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      return Err(DirectoryRecordOutputError::SchemeMismatch);
    }

    Ok(DirectoryRecordOutput {
      directory: PathBuf::from(uri.path()),
      draw: Draw::from_url(uri)?,
      frame_counter: AtomicU32::new(0),
      record_text: uri.query_pairs().any(|(k, _)| k == "record"),
    })
  }
}

fn frame_path(root: &Path, now: &DateTime<Local>, id: u32) -> PathBuf {
  root
    .join(now.year().to_string())
    .join(format!("{:02}", now.month()))
    .join(format!("{:02}", now.day()))
    .join(format!("{}-{:04X}.jpg", now.format("%H-%M-%S"), id))
}

impl DirectoryRecordOutput {
  fn next_path(&self) -> Result<PathBuf, DirectoryRecordOutputError> {
    let id = self.frame_counter.fetch_add(1, Ordering::Relaxed) + 1;
    let path = frame_path(&self.directory, &Local::now(), id);
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)?;
    }
    Ok(path)
  }
}

impl Render<Frame, String> for DirectoryRecordOutput {
  type Error = DirectoryRecordOutputError;

  fn render_result(&self, frame: &Frame, text: &String) -> Result<(), Self::Error> {
    let path = self.next_path()?;
    self.draw.draw_text(&frame.image, text).save(&path)?;
    if self.record_text {
      std::fs::write(path.with_extension("txt"), text)?;
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use chrono::TimeZone;

  use super::*;

  #[test]
  fn frames_are_filed_by_date() {
    let now = Local.with_ymd_and_hms(2026, 3, 7, 9, 5, 1).unwrap();
    let path = frame_path(Path::new("/records"), &now, 26);
    assert_eq!(path, PathBuf::from("/records/2026/03/07/09-05-01-001A.jpg"));
  }
}
