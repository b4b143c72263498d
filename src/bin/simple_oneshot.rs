// 该文件是 Shouyu （手语） 项目的一部分。
// src/bin/simple_oneshot.rs - 拍摄一帧并请求识别
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

use std::{path::PathBuf, time::Duration};

use anyhow::Result;
use clap::Parser;
use tracing::info;
use url::Url;

use shouyu::{
  FromUrl,
  client::{ConsoleReport, PredictClient, RemotePredictor},
  config::{DEFAULT_CAMERA, DEFAULT_PREDICT_URL},
  input::InputWrapper,
  task::{OneShotTask, Task},
};

/// 单次识别参数
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 预测服务地址
  #[arg(long, default_value = DEFAULT_PREDICT_URL)]
  pub url: Url,
  /// 输入来源
  #[arg(long, value_name = "SOURCE", default_value = DEFAULT_CAMERA)]
  pub camera: Url,
  /// 保存发送的帧
  #[arg(long, value_name = "PATH")]
  pub save: Option<PathBuf>,
  /// 请求超时（毫秒）
  #[arg(long)]
  pub timeout_ms: Option<u64>,
}

fn main() -> Result<()> {
  shouyu::init_tracing();

  let args = Args::parse();
  info!("预测服务: {}", args.url);
  info!("输入来源: {}", args.camera);

  let input = InputWrapper::from_url(&args.camera)?;
  let client = PredictClient::new(args.url, args.timeout_ms.map(Duration::from_millis))?;
  let output = ConsoleReport::default().with_save(args.save);

  OneShotTask.run_task(input.into_frames(), RemotePredictor::new(client), output)?;

  Ok(())
}
