// 该文件是 Shouyu （手语） 项目的一部分。
// src/output/gstreamer_display.rs - GStreamer 窗口显示
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

//! # 窗口显示
//!
//! `display://window?sink=autovideosink&font=...`
//!
//! 管道为 `appsrc ! videoconvert ! <sink>`，caps 在第一帧到达时按帧尺寸设置。
//! 在窗口中按下 `q`（或 `Escape`）、关闭窗口都会使 [`Render::wants_quit`] 返回 `true`。

use std::sync::{
  Arc, Mutex,
  atomic::{AtomicBool, Ordering},
};

use gstreamer::{self as gst, prelude::*};
use gstreamer_app as gst_app;
use gstreamer_video as gst_video;
use thiserror::Error;
use tracing::{error, info, warn};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::Frame,
  output::{
    Render,
    draw::{Draw, DrawError},
  },
};

#[derive(Error, Debug)]
pub enum GStreamerDisplayOutputError {
  #[error("URI scheme 不匹配")]
  SchemeMismatch,
  #[error("GStreamer 错误: {0}")]
  GStreamer(#[from] gst::glib::Error),
  #[error("GStreamer 操作失败: {0}")]
  GStreamerBool(#[from] gst::glib::BoolError),
  #[error("状态切换失败: {0}")]
  StateChange(#[from] gst::StateChangeError),
  #[error("找不到 appsrc 元素")]
  AppSrcNotFound,
  #[error("管道错误: {0}")]
  Pipeline(String),
  #[error(transparent)]
  Draw(#[from] DrawError),
}

const DISPLAY_SCHEME: &str = "display";
const DEFAULT_SINK: &str = "autovideosink";
const QUIT_KEYS: [&str; 2] = ["q", "Escape"];

fn display_description(sink: &str) -> String {
  format!(
    "appsrc name=src is-live=true format=time ! videoconvert ! {} sync=false",
    sink
  )
}

pub struct GStreamerDisplayOutput {
  pipeline: gst::Pipeline,
  appsrc: gst_app::AppSrc,
  draw: Draw,
  frame_size: Mutex<Option<(u32, u32)>>,
  quit: Arc<AtomicBool>,
}

impl FromUrlWithScheme for GStreamerDisplayOutput {
  const SCHEME: &'static str = DISPLAY_SCHEME;
}

impl FromUrl for GStreamerDisplayOutput {
  type Error = GStreamerDisplayOutputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != DISPLAY_SCHEME {
      error!(
        "URI scheme 不匹配: 期望 '{}', 实际 '{}'",
        DISPLAY_SCHEME,
        url.scheme()
      );
      return Err(GStreamerDisplayOutputError::SchemeMismatch);
    }

    let draw = Draw::from_url(url)?;
    gst::init()?;

    let sink = url
      .query_pairs()
      .find(|(k, _)| k == "sink")
      .map(|(_, v)| v.into_owned())
      .unwrap_or_else(|| DEFAULT_SINK.to_string());
    let description = display_description(&sink);
    info!("GStreamer 显示管道: {}", description);

    let pipeline = gst::parse::launch(&description)?
      .downcast::<gst::Pipeline>()
      .map_err(|_| GStreamerDisplayOutputError::Pipeline("无法创建管道".to_string()))?;
    let appsrc = pipeline
      .by_name("src")
      .ok_or(GStreamerDisplayOutputError::AppSrcNotFound)?
      .downcast::<gst_app::AppSrc>()
      .map_err(|_| GStreamerDisplayOutputError::AppSrcNotFound)?;

    // 窗口中的按键以导航事件的形式逆流到达 appsrc
    let quit = Arc::new(AtomicBool::new(false));
    let pad = appsrc
      .static_pad("src")
      .ok_or_else(|| GStreamerDisplayOutputError::Pipeline("appsrc 没有 src pad".to_string()))?;
    let flag = quit.clone();
    pad.add_probe(gst::PadProbeType::EVENT_UPSTREAM, move |_, info| {
      if let Some(gst::PadProbeData::Event(ref event)) = info.data
        && let Ok(gst_video::NavigationEvent::KeyPress { key, .. }) =
          gst_video::NavigationEvent::parse(event)
        && QUIT_KEYS.contains(&key.as_str())
      {
        info!("显示窗口收到退出按键: {}", key);
        flag.store(true, Ordering::SeqCst);
      }
      gst::PadProbeReturn::Ok
    });

    pipeline.set_state(gst::State::Playing)?;

    Ok(GStreamerDisplayOutput {
      pipeline,
      appsrc,
      draw,
      frame_size: Mutex::new(None),
      quit,
    })
  }
}

impl GStreamerDisplayOutput {
  fn ensure_caps(&self, width: u32, height: u32) -> Result<(), GStreamerDisplayOutputError> {
    let mut size = self
      .frame_size
      .lock()
      .map_err(|e| GStreamerDisplayOutputError::Pipeline(e.to_string()))?;
    if *size == Some((width, height)) {
      return Ok(());
    }

    let caps = gst::Caps::builder("video/x-raw")
      .field("format", "RGB")
      .field("width", width as i32)
      .field("height", height as i32)
      .field("framerate", gst::Fraction::new(0, 1))
      .build();
    self.appsrc.set_caps(Some(&caps));
    info!("显示尺寸: {}x{}", width, height);
    *size = Some((width, height));
    Ok(())
  }

  /// 窗口被关闭或管道出错时，总线上会出现 Error/EOS 消息
  fn poll_bus(&self) {
    let Some(bus) = self.pipeline.bus() else {
      return;
    };
    while let Some(message) = bus.pop_filtered(&[gst::MessageType::Error, gst::MessageType::Eos])
    {
      match message.view() {
        gst::MessageView::Error(err) => {
          warn!("显示管道结束: {}", err.error());
        }
        _ => info!("显示管道收到 EOS"),
      }
      self.quit.store(true, Ordering::SeqCst);
    }
  }
}

impl Drop for GStreamerDisplayOutput {
  fn drop(&mut self) {
    let _ = self.appsrc.end_of_stream();
    if let Err(e) = self.pipeline.set_state(gst::State::Null) {
      warn!("停止 GStreamer 显示管道失败: {}", e);
    }
  }
}

impl Render<Frame, String> for GStreamerDisplayOutput {
  type Error = GStreamerDisplayOutputError;

  fn render_result(&self, frame: &Frame, text: &String) -> Result<(), Self::Error> {
    self.ensure_caps(frame.width(), frame.height())?;

    let image = self.draw.draw_text(&frame.image, text);
    let mut buffer = gst::Buffer::from_mut_slice(image.into_raw());
    buffer
      .make_mut()
      .set_pts(gst::ClockTime::from_mseconds(frame.timestamp_ms));

    self
      .appsrc
      .push_buffer(buffer)
      .map_err(|e| GStreamerDisplayOutputError::Pipeline(format!("推送缓冲区失败: {:?}", e)))?;
    Ok(())
  }

  fn wants_quit(&self) -> bool {
    self.poll_bus();
    self.quit.load(Ordering::SeqCst)
  }
}
