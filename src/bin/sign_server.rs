// 该文件是 Shouyu （手语） 项目的一部分。
// src/bin/sign_server.rs - 手语识别 HTTP 服务
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

use std::{net::SocketAddr, path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use shouyu::{
  config::{
    DEFAULT_BODY_LIMIT, DEFAULT_DETECTOR_DIR, DEFAULT_HOST, DEFAULT_MAX_CONCURRENT_INFERENCE,
    DEFAULT_MODEL_DIR, DEFAULT_PORT,
  },
  frame::TensorLayout,
  model::PresenceOutput,
  pipeline::HandSignPipeline,
  server::{ServerConfig, SharedModel, create_router},
};

/// 手语识别服务参数
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  #[arg(long, default_value = DEFAULT_HOST)]
  pub host: String,
  #[arg(long, default_value_t = DEFAULT_PORT)]
  pub port: u16,
  /// 分类模型、标签编码器与缩放器所在目录
  #[arg(long, value_name = "DIR", default_value = DEFAULT_MODEL_DIR)]
  pub model_dir: PathBuf,
  /// 手掌检测与关键点模型所在目录
  #[arg(long, value_name = "DIR", default_value = DEFAULT_DETECTOR_DIR)]
  pub detector_dir: PathBuf,
  /// 检测模型的输入布局（nchw 或 nhwc）
  #[arg(long, default_value = "nchw")]
  pub layout: TensorLayout,
  /// 关键点网络存在分数的类型（probability 或 logit）
  #[arg(long, default_value = "probability")]
  pub presence: PresenceOutput,
  #[arg(long, default_value_t = DEFAULT_MAX_CONCURRENT_INFERENCE)]
  pub max_concurrent: usize,
  /// 上传图像大小上限（字节）
  #[arg(long, default_value_t = DEFAULT_BODY_LIMIT)]
  pub body_limit: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
  shouyu::init_tracing();

  let args = Args::parse();
  info!("模型目录: {}", args.model_dir.display());
  info!("检测模型目录: {}", args.detector_dir.display());

  let pipeline = HandSignPipeline::load(
    &args.model_dir,
    &args.detector_dir,
    args.layout,
    args.presence,
  )
  .context("加载模型失败")?;
  info!("已加载 {} 个手势类别", pipeline.labels().len());
  let model: SharedModel = Arc::new(pipeline);

  let config = ServerConfig {
    body_limit: args.body_limit,
    max_concurrent_inference: args.max_concurrent,
  };
  let app = create_router(model, config);

  let addr: SocketAddr = format!("{}:{}", args.host, args.port)
    .parse()
    .context("监听地址无效")?;
  let listener = tokio::net::TcpListener::bind(addr).await?;
  info!("服务已启动: http://{}", addr);

  axum::serve(listener, app)
    .with_graceful_shutdown(shutdown_signal())
    .await?;

  info!("服务已停止");
  Ok(())
}

async fn shutdown_signal() {
  if tokio::signal::ctrl_c().await.is_ok() {
    info!("收到中断信号，正在关闭服务...");
  }
}
