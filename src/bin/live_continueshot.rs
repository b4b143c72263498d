// 该文件是 Shouyu （手语） 项目的一部分。
// src/bin/live_continueshot.rs - 摄像头实时识别客户端
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

use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tracing::info;
use url::Url;

use shouyu::{
  FromUrl,
  client::{PredictClient, RemotePredictor},
  config::{
    DEFAULT_CAMERA, DEFAULT_DISPLAY, DEFAULT_JPEG_QUALITY, DEFAULT_PREDICT_URL,
    DEFAULT_THROTTLE_MS,
  },
  input::InputWrapper,
  output::OutputWrapper,
  task::{LiveTask, Task, install_interrupt},
};

/// 实时识别客户端参数
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 预测服务地址
  #[arg(long, default_value = DEFAULT_PREDICT_URL)]
  pub url: Url,
  /// 摄像头来源
  #[arg(long, value_name = "SOURCE", default_value = DEFAULT_CAMERA)]
  pub camera: Url,
  /// 显示输出
  #[arg(long, value_name = "OUTPUT", default_value = DEFAULT_DISPLAY)]
  pub display: Url,
  /// 两次请求的最小间隔（毫秒）
  #[arg(long, default_value_t = DEFAULT_THROTTLE_MS)]
  pub throttle_ms: u64,
  /// 请求超时（毫秒），不指定则不限制
  #[arg(long)]
  pub timeout_ms: Option<u64>,
  #[arg(long, default_value_t = DEFAULT_JPEG_QUALITY)]
  pub jpeg_quality: u8,
  #[arg(long, value_name = "FRAME_NUMBER")]
  pub frame_number: Option<usize>,
}

fn main() -> Result<()> {
  shouyu::init_tracing();

  let args = Args::parse();
  info!("预测服务: {}", args.url);
  info!("输入来源: {}", args.camera);
  info!("显示输出: {}", args.display);

  let stop = install_interrupt()?;

  let input = InputWrapper::from_url(&args.camera)?;
  let client = PredictClient::new(args.url, args.timeout_ms.map(Duration::from_millis))?;
  let model = RemotePredictor::new(client).with_jpeg_quality(args.jpeg_quality);
  let output = OutputWrapper::from_url(&args.display)?;

  LiveTask::default()
    .with_throttle(Duration::from_millis(args.throttle_ms))
    .with_frame_number(args.frame_number)
    .with_stop(stop)
    .run_task(input.into_frames(), model, output)?;

  Ok(())
}
