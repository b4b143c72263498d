// 该文件是 Shouyu （手语） 项目的一部分。
// src/input/gstreamer_input.rs - GStreamer 输入
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

//! # GStreamer 视频输入
//!
//! - `gst://camera/dev/video0?width=640&height=480&fps=30&format=YUY2&rotate=0`
//! - `gst://file/path/to/video.mp4?rotate=90`
//!
//! 管道末端统一转换为 RGB 并送入 appsink。
//!
//! 需要系统安装 GStreamer 开发库（`libgstreamer1.0-dev`、
//! `libgstreamer-plugins-base1.0-dev`）。

use std::collections::HashMap;

use gstreamer::{self as gst, prelude::*};
use gstreamer_app as gst_app;
use gstreamer_video as gst_video;
use image::RgbImage;
use thiserror::Error;
use tracing::{info, warn};
use url::Url;

use crate::{FromUrl, FromUrlWithScheme};

#[derive(Error, Debug)]
pub enum GStreamerInputError {
  #[error("URI scheme 不匹配")]
  SchemeMismatch,
  #[error("未知的输入类型: {0}")]
  UnknownSource(String),
  #[error("GStreamer 错误: {0}")]
  GStreamer(#[from] gst::glib::Error),
  #[error("GStreamer 操作失败: {0}")]
  GStreamerBool(#[from] gst::glib::BoolError),
  #[error("状态切换失败: {0}")]
  StateChange(#[from] gst::StateChangeError),
  #[error("找不到 appsink 元素")]
  AppSinkNotFound,
  #[error("管道错误: {0}")]
  Pipeline(String),
  #[error("无法从 caps 获取视频信息")]
  VideoInfo,
  #[error("不支持的视频格式: {0:?}")]
  UnsupportedFormat(gst_video::VideoFormat),
  #[error("缓冲区大小不匹配: 期望 {expected} 字节, 实际 {actual} 字节")]
  BufferSizeMismatch { expected: usize, actual: usize },
}

const GSTREAMER_INPUT_SCHEME: &str = "gst";
const DEFAULT_WIDTH: u32 = 640;
const DEFAULT_HEIGHT: u32 = 480;
const DEFAULT_FPS: u32 = 30;
const DEFAULT_CAMERA_FORMAT: &str = "YUY2";

#[derive(Debug, Clone, PartialEq)]
pub enum GStreamerInputBuilderItem {
  FileSource(String),
  CameraSource {
    camera: String,
    io_mode: Option<u32>,
    format: String,
    width: u32,
    height: u32,
    fps: u32,
  },
  VideoFlip { method: u32 },
  TargetFormat { format: String },
}

impl GStreamerInputBuilderItem {
  fn to_pipeline(&self) -> String {
    match self {
      GStreamerInputBuilderItem::FileSource(path) => {
        format!("filesrc location={} ! decodebin", path)
      }
      GStreamerInputBuilderItem::CameraSource {
        camera,
        io_mode,
        format,
        width,
        height,
        fps,
      } => {
        let io_mode = io_mode
          .map(|mode| format!(" io-mode={}", mode))
          .unwrap_or_default();
        format!(
          "v4l2src device={}{} ! video/x-raw,format={},width={},height={},framerate={}/1",
          camera, io_mode, format, width, height, fps
        )
      }
      GStreamerInputBuilderItem::VideoFlip { method } => {
        format!("videoflip method={}", method)
      }
      GStreamerInputBuilderItem::TargetFormat { format } => {
        format!("videoconvert ! video/x-raw,format={}", format)
      }
    }
  }
}

/// GStreamer 输入管道构建器
#[derive(Debug, Clone, PartialEq)]
pub struct GStreamerInputPipelineBuilder {
  items: Vec<GStreamerInputBuilderItem>,
}

impl GStreamerInputPipelineBuilder {
  pub fn camera(path: &str, query: &HashMap<String, String>) -> Self {
    let parse = |key: &str, default: u32| {
      query
        .get(key)
        .and_then(|v| v.parse::<u32>().ok())
        .unwrap_or(default)
    };

    let mut items = vec![GStreamerInputBuilderItem::CameraSource {
      camera: path.to_string(),
      io_mode: query.get("io-mode").and_then(|v| v.parse::<u32>().ok()),
      format: query
        .get("format")
        .cloned()
        .unwrap_or_else(|| DEFAULT_CAMERA_FORMAT.to_string()),
      width: parse("width", DEFAULT_WIDTH),
      height: parse("height", DEFAULT_HEIGHT),
      fps: parse("fps", DEFAULT_FPS),
    }];
    items.extend(Self::video_flip(query.get("rotate").map(String::as_str)));
    Self { items }
  }

  pub fn file(path: &str, query: &HashMap<String, String>) -> Self {
    let mut items = vec![GStreamerInputBuilderItem::FileSource(path.to_string())];
    items.extend(Self::video_flip(query.get("rotate").map(String::as_str)));
    Self { items }
  }

  fn video_flip(rotate: Option<&str>) -> Option<GStreamerInputBuilderItem> {
    let method = match rotate? {
      "90" => 1,
      "180" => 2,
      "270" => 3,
      "mirror" => 4,
      _ => return None,
    };
    Some(GStreamerInputBuilderItem::VideoFlip { method })
  }

  pub fn description(&self) -> String {
    let basic = self
      .items
      .iter()
      .map(GStreamerInputBuilderItem::to_pipeline)
      .collect::<Vec<String>>()
      .join(" ! ");
    format!("{} ! appsink max-buffers=2 drop=true name=sink", basic)
  }

  pub fn build(self) -> Result<GStreamerInput, GStreamerInputError> {
    gst::init()?;

    let description = self.description();
    info!("GStreamer 输入管道: {}", description);

    let pipeline = gst::parse::launch(&description)?
      .downcast::<gst::Pipeline>()
      .map_err(|_| GStreamerInputError::Pipeline("无法创建管道".to_string()))?;
    let appsink = pipeline
      .by_name("sink")
      .ok_or(GStreamerInputError::AppSinkNotFound)?
      .downcast::<gst_app::AppSink>()
      .map_err(|_| GStreamerInputError::AppSinkNotFound)?;

    pipeline.set_state(gst::State::Playing)?;
    Ok(GStreamerInput { pipeline, appsink })
  }
}

impl FromUrl for GStreamerInputPipelineBuilder {
  type Error = GStreamerInputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != GSTREAMER_INPUT_SCHEME {
      return Err(GStreamerInputError::SchemeMismatch);
    }

    let query: HashMap<String, String> = url
      .query_pairs()
      .map(|(k, v)| (String::from(k), String::from(v)))
      .collect();

    let mut builder = match url.host_str() {
      Some("camera") => Self::camera(url.path(), &query),
      Some("file") => Self::file(url.path(), &query),
      other => {
        return Err(GStreamerInputError::UnknownSource(
          other.unwrap_or_default().to_string(),
        ));
      }
    };
    builder.items.push(GStreamerInputBuilderItem::TargetFormat {
      format: "RGB".to_string(),
    });

    Ok(builder)
  }
}

impl FromUrlWithScheme for GStreamerInputPipelineBuilder {
  const SCHEME: &'static str = GSTREAMER_INPUT_SCHEME;
}

pub struct GStreamerInput {
  pipeline: gst::Pipeline,
  appsink: gst_app::AppSink,
}

impl Drop for GStreamerInput {
  fn drop(&mut self) {
    if let Err(e) = self.pipeline.set_state(gst::State::Null) {
      warn!("停止 GStreamer 管道失败: {}", e);
    }
  }
}

impl GStreamerInput {
  pub(crate) fn next_image(&mut self) -> Option<Result<RgbImage, GStreamerInputError>> {
    match self.appsink.pull_sample() {
      Ok(sample) => Some(sample_to_image(&sample)),
      Err(_) if self.appsink.is_eos() => {
        info!("GStreamer 输入结束");
        None
      }
      Err(e) => Some(Err(GStreamerInputError::Pipeline(e.to_string()))),
    }
  }
}

fn sample_to_image(sample: &gst::Sample) -> Result<RgbImage, GStreamerInputError> {
  let buffer = sample
    .buffer()
    .ok_or_else(|| GStreamerInputError::Pipeline("样本中没有缓冲区".to_string()))?;
  let caps = sample
    .caps()
    .ok_or_else(|| GStreamerInputError::Pipeline("样本中没有 caps".to_string()))?;
  let info = gst_video::VideoInfo::from_caps(caps).map_err(|_| GStreamerInputError::VideoInfo)?;

  let map = buffer
    .map_readable()
    .map_err(|e| GStreamerInputError::Pipeline(format!("无法映射缓冲区: {}", e)))?;

  let swap = match info.format() {
    gst_video::VideoFormat::Rgb => false,
    gst_video::VideoFormat::Bgr => true,
    other => return Err(GStreamerInputError::UnsupportedFormat(other)),
  };
  let stride = info.stride()[0] as usize;
  packed_rgb_to_image(map.as_slice(), info.width(), info.height(), stride, swap)
}

/// 按行拷贝（行尾可能有对齐填充），必要时交换 B/R
fn packed_rgb_to_image(
  data: &[u8],
  width: u32,
  height: u32,
  stride: usize,
  swap_bgr: bool,
) -> Result<RgbImage, GStreamerInputError> {
  let row = width as usize * 3;
  let expected = stride * (height as usize).saturating_sub(1) + row;
  if stride < row || data.len() < expected {
    return Err(GStreamerInputError::BufferSizeMismatch {
      expected,
      actual: data.len(),
    });
  }

  let mut pixels = Vec::with_capacity(row * height as usize);
  for y in 0..height as usize {
    let line = &data[y * stride..y * stride + row];
    if swap_bgr {
      for bgr in line.chunks_exact(3) {
        pixels.extend_from_slice(&[bgr[2], bgr[1], bgr[0]]);
      }
    } else {
      pixels.extend_from_slice(line);
    }
  }

  RgbImage::from_raw(width, height, pixels).ok_or(GStreamerInputError::BufferSizeMismatch {
    expected,
    actual: data.len(),
  })
}
