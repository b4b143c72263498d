// 该文件是 Shouyu （手语） 项目的一部分。
// src/bin/local_continueshot.rs - 本地连续识别
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

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing::info;
use url::Url;

use shouyu::{
  FromUrl,
  config::{DEFAULT_DETECTOR_DIR, DEFAULT_MODEL_DIR},
  frame::TensorLayout,
  input::InputWrapper,
  model::PresenceOutput,
  output::OutputWrapper,
  pipeline::{FrameRecognizer, HandSignPipeline},
  task::{ContinuousTask, Task, install_interrupt},
};

/// 不经过服务端，直接在本地识别每一帧
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 输入来源
  #[arg(long, value_name = "SOURCE")]
  pub input: Url,
  /// 输出路径
  #[arg(long, value_name = "OUTPUT")]
  pub output: Url,
  #[arg(long, value_name = "DIR", default_value = DEFAULT_MODEL_DIR)]
  pub model_dir: PathBuf,
  #[arg(long, value_name = "DIR", default_value = DEFAULT_DETECTOR_DIR)]
  pub detector_dir: PathBuf,
  #[arg(long, default_value = "nchw")]
  pub layout: TensorLayout,
  /// 关键点网络存在分数的类型（probability 或 logit）
  #[arg(long, default_value = "probability")]
  pub presence: PresenceOutput,
  #[arg(long, value_name = "FRAME_NUMBER")]
  pub frame_number: Option<usize>,
}

fn main() -> Result<()> {
  shouyu::init_tracing();

  let args = Args::parse();
  info!("输入来源: {}", args.input);
  info!("输出路径: {}", args.output);

  let stop = install_interrupt()?;

  let input = InputWrapper::from_url(&args.input)?;
  let pipeline = HandSignPipeline::load(
    &args.model_dir,
    &args.detector_dir,
    args.layout,
    args.presence,
  )?;
  let output = OutputWrapper::from_url(&args.output)?;

  ContinuousTask::default()
    .with_frame_number(args.frame_number)
    .with_stop(stop)
    .run_task(input.into_frames(), FrameRecognizer(pipeline), output)?;

  Ok(())
}
