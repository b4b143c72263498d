// 该文件是 Shouyu （手语） 项目的一部分。
// tests/predict_service.rs - 服务端与客户端联调
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

use std::{net::SocketAddr, sync::Arc, thread, time::Duration};

use image::{Rgb, RgbImage};
use shouyu::{
  client::{Predict, PredictClient, PredictOutcome, RemotePredictor},
  frame::{Frame, encode_jpeg},
  model::Model,
  pipeline::{PipelineError, Prediction, Recognition},
  server::{ServerConfig, SharedModel, create_router},
};

/// 亮图返回 "B"，暗图视为没有手
struct BrightnessModel;

impl Model for BrightnessModel {
  type Input = RgbImage;
  type Output = Recognition;
  type Error = PipelineError;

  fn infer(&self, image: &RgbImage) -> Result<Recognition, PipelineError> {
    let Rgb([r, _, _]) = *image.get_pixel(0, 0);
    if r > 128 {
      Ok(Recognition::Sign(Prediction {
        sign: "B".to_string(),
        confidence: 0.75,
      }))
    } else {
      Ok(Recognition::NoHand)
    }
  }
}

fn spawn_server() -> SocketAddr {
  let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
  listener.set_nonblocking(true).unwrap();
  let addr = listener.local_addr().unwrap();

  thread::spawn(move || {
    let runtime = tokio::runtime::Builder::new_multi_thread()
      .enable_all()
      .build()
      .unwrap();
    runtime.block_on(async move {
      let listener = tokio::net::TcpListener::from_std(listener).unwrap();
      let model: SharedModel = Arc::new(BrightnessModel);
      axum::serve(listener, create_router(model, ServerConfig::default()))
        .await
        .unwrap();
    });
  });

  addr
}

fn client(addr: SocketAddr) -> PredictClient {
  let url = url::Url::parse(&format!("http://{addr}/predict")).unwrap();
  PredictClient::new(url, Some(Duration::from_secs(10))).unwrap()
}

fn filled(value: u8) -> RgbImage {
  RgbImage::from_pixel(64, 48, Rgb([value, value, value]))
}

#[test]
fn recognised_sign_reaches_the_client() {
  let addr = spawn_server();
  let model = RemotePredictor::new(client(addr));

  let outcome = model.infer(&Frame::new(filled(255), 0, 0)).unwrap();
  match &outcome {
    PredictOutcome::Sign(prediction) => {
      assert_eq!(prediction.sign, "B");
      assert!((prediction.confidence - 0.75).abs() < 1e-6);
    }
    other => panic!("unexpected outcome: {other:?}"),
  }
  assert_eq!(outcome.display_text(), "B (75.0%)");
  assert_eq!(outcome.report_line(), "Prediction: B, Confidence: 0.75");
}

#[test]
fn missing_hand_is_a_bad_request() {
  let addr = spawn_server();
  let jpeg = encode_jpeg(&filled(0), 90).unwrap();

  let outcome = client(addr).predict(jpeg);
  match &outcome {
    PredictOutcome::Rejected { status, body } => {
      assert_eq!(*status, 400);
      let body: serde_json::Value = serde_json::from_str(body).unwrap();
      assert_eq!(body["error"], "No hand detected");
    }
    other => panic!("unexpected outcome: {other:?}"),
  }
  assert_eq!(outcome.display_text(), "No hand detected");
}

#[test]
fn corrupt_upload_is_a_bad_request() {
  let addr = spawn_server();
  let outcome = client(addr).predict(b"not a jpeg".to_vec());
  assert!(matches!(outcome, PredictOutcome::Rejected { status: 400, .. }));
}

#[test]
fn health_endpoint_reports_ok() {
  let addr = spawn_server();
  let body: serde_json::Value = reqwest::blocking::get(format!("http://{addr}/health"))
    .unwrap()
    .json()
    .unwrap();
  assert_eq!(body["status"], "ok");
}
