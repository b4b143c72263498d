// 该文件是 Shouyu （手语） 项目的一部分。
// src/server.rs - 预测服务
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

//! # 预测服务
//!
//! - `POST /predict`：multipart 表单，`frame` 字段为编码后的图像
//! - `GET /health`：存活检查
//!
//! 识别流水线在启动时构建一次，通过 `Arc` 在请求之间共享；推理在阻塞线程池中执行，
//! 并由信号量限制同时进行的推理数量。

use std::sync::Arc;

use axum::{
  Json, Router,
  extract::{DefaultBodyLimit, Multipart, State, multipart::MultipartRejection},
  http::StatusCode,
  response::{IntoResponse, Response},
  routing::{get, post},
};
use image::RgbImage;
use serde::Serialize;
use serde_json::json;
use thiserror::Error;
use tokio::sync::Semaphore;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info};

use crate::{
  config::{DEFAULT_BODY_LIMIT, DEFAULT_MAX_CONCURRENT_INFERENCE, FRAME_FIELD},
  frame::decode_frame,
  model::Model,
  pipeline::{PipelineError, Prediction, Recognition},
};

/// 服务所用的识别模型
pub type SharedModel =
  Arc<dyn Model<Input = RgbImage, Output = Recognition, Error = PipelineError> + Send + Sync>;

#[derive(Error, Debug)]
pub enum ApiError {
  #[error("No frame provided")]
  NoFrame,
  #[error("Invalid image data")]
  InvalidImage(String),
  #[error("No hand detected")]
  NoHand,
  #[error("Inference failed")]
  Inference(String),
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let status = match &self {
      ApiError::NoFrame => {
        debug!("请求缺少 {} 字段", FRAME_FIELD);
        StatusCode::BAD_REQUEST
      }
      ApiError::InvalidImage(reason) => {
        debug!("图像解码失败: {}", reason);
        StatusCode::BAD_REQUEST
      }
      ApiError::NoHand => {
        debug!("未检测到手");
        StatusCode::BAD_REQUEST
      }
      ApiError::Inference(reason) => {
        error!("推理失败: {}", reason);
        StatusCode::INTERNAL_SERVER_ERROR
      }
    };

    (status, Json(json!({ "error": self.to_string() }))).into_response()
  }
}

impl From<PipelineError> for ApiError {
  fn from(err: PipelineError) -> Self {
    match err {
      PipelineError::Frame(e) => ApiError::InvalidImage(e.to_string()),
      other => ApiError::Inference(other.to_string()),
    }
  }
}

#[derive(Debug, Clone, Copy)]
pub struct ServerConfig {
  pub body_limit: usize,
  pub max_concurrent_inference: usize,
}

impl Default for ServerConfig {
  fn default() -> Self {
    Self {
      body_limit: DEFAULT_BODY_LIMIT,
      max_concurrent_inference: DEFAULT_MAX_CONCURRENT_INFERENCE,
    }
  }
}

#[derive(Clone)]
pub struct AppState {
  model: SharedModel,
  permits: Arc<Semaphore>,
}

impl AppState {
  pub fn new(model: SharedModel, max_concurrent_inference: usize) -> Self {
    Self {
      model,
      permits: Arc::new(Semaphore::new(max_concurrent_inference.max(1))),
    }
  }
}

pub fn create_router(model: SharedModel, config: ServerConfig) -> Router {
  info!(
    "推理并发上限: {}, 上传大小上限: {} 字节",
    config.max_concurrent_inference, config.body_limit
  );
  let state = AppState::new(model, config.max_concurrent_inference);

  Router::new()
    .route("/predict", post(predict))
    .route("/health", get(health))
    .layer(DefaultBodyLimit::max(config.body_limit))
    .layer(TraceLayer::new_for_http())
    .with_state(state)
}

/// 读取 `frame` 字段，忽略其他字段
async fn read_frame(multipart: Result<Multipart, MultipartRejection>) -> Result<Vec<u8>, ApiError> {
  let mut multipart = multipart.map_err(|e| {
    debug!("非 multipart 请求: {}", e);
    ApiError::NoFrame
  })?;

  loop {
    let field = multipart.next_field().await.map_err(|e| {
      debug!("multipart 解析失败: {}", e);
      ApiError::NoFrame
    })?;
    let Some(field) = field else {
      return Err(ApiError::NoFrame);
    };
    if field.name() == Some(FRAME_FIELD) {
      let bytes = field.bytes().await.map_err(|e| {
        debug!("读取 {} 字段失败: {}", FRAME_FIELD, e);
        ApiError::NoFrame
      })?;
      return Ok(bytes.to_vec());
    }
  }
}

async fn predict(
  State(state): State<AppState>,
  multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<Prediction>, ApiError> {
  let bytes = read_frame(multipart).await?;
  debug!("收到图像 {} 字节", bytes.len());

  let permit = state
    .permits
    .clone()
    .acquire_owned()
    .await
    .map_err(|e| ApiError::Inference(e.to_string()))?;
  let model = state.model.clone();

  let recognition = tokio::task::spawn_blocking(move || {
    let _permit = permit;
    let image = decode_frame(&bytes).map_err(PipelineError::from)?;
    model.infer(&image)
  })
  .await
  .map_err(|e| ApiError::Inference(e.to_string()))??;

  match recognition {
    Recognition::Sign(prediction) => {
      info!("预测: {} ({:.3})", prediction.sign, prediction.confidence);
      Ok(Json(prediction))
    }
    Recognition::NoHand => Err(ApiError::NoHand),
  }
}

#[derive(Serialize)]
struct HealthResponse {
  status: &'static str,
  version: &'static str,
}

async fn health() -> Json<HealthResponse> {
  Json(HealthResponse {
    status: "ok",
    version: env!("CARGO_PKG_VERSION"),
  })
}
