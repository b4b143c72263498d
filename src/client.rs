// 该文件是 Shouyu （手语） 项目的一部分。
// src/client.rs - 预测服务客户端
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

use reqwest::blocking::{Client, multipart};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::{
  config::{API_ERROR_TEXT, DEFAULT_JPEG_QUALITY, FRAME_FIELD, NO_HAND_TEXT},
  frame::{Frame, FrameError, encode_jpeg},
  model::Model,
  output::Render,
  pipeline::Prediction,
};

const UPLOAD_FILE_NAME: &str = "frame.jpg";
const UPLOAD_MIME: &str = "image/jpeg";

#[derive(Error, Debug)]
pub enum ClientError {
  #[error("HTTP 客户端创建失败: {0}")]
  Build(#[from] reqwest::Error),
}

/// 一次预测请求的结果
#[derive(Debug, Clone, PartialEq)]
pub enum PredictOutcome {
  Sign(Prediction),
  /// 服务端返回了非 200 状态
  Rejected { status: u16, body: String },
  /// 连接失败、超时等
  Transport(String),
  /// 200 但响应体不是合法的预测结果
  Malformed(String),
}

impl PredictOutcome {
  /// 叠加在画面上的文字
  pub fn display_text(&self) -> String {
    match self {
      PredictOutcome::Sign(prediction) => prediction.display_text(),
      PredictOutcome::Rejected { .. } => NO_HAND_TEXT.to_string(),
      PredictOutcome::Transport(_) | PredictOutcome::Malformed(_) => API_ERROR_TEXT.to_string(),
    }
  }

  /// 单次请求模式下打印的结果
  pub fn report_line(&self) -> String {
    match self {
      PredictOutcome::Sign(prediction) => format!(
        "Prediction: {}, Confidence: {:.2}",
        prediction.sign, prediction.confidence
      ),
      PredictOutcome::Rejected { status, body } => format!("Error: {}, {}", status, body),
      PredictOutcome::Transport(reason) => format!("Error: {}", reason),
      PredictOutcome::Malformed(body) => format!("Error: 200, {}", body),
    }
  }
}

/// 将一帧 JPEG 发送给预测服务
pub trait Predict {
  fn predict(&self, jpeg: Vec<u8>) -> PredictOutcome;
}

pub struct PredictClient {
  url: url::Url,
  http: Client,
}

impl PredictClient {
  /// `timeout` 为 `None` 时不限制请求时长
  pub fn new(url: url::Url, timeout: Option<Duration>) -> Result<Self, ClientError> {
    let http = Client::builder().timeout(timeout).build()?;
    Ok(Self { url, http })
  }

  pub fn url(&self) -> &url::Url {
    &self.url
  }
}

impl Predict for PredictClient {
  fn predict(&self, jpeg: Vec<u8>) -> PredictOutcome {
    let part = match multipart::Part::bytes(jpeg)
      .file_name(UPLOAD_FILE_NAME)
      .mime_str(UPLOAD_MIME)
    {
      Ok(part) => part,
      Err(e) => return PredictOutcome::Transport(e.to_string()),
    };
    let form = multipart::Form::new().part(FRAME_FIELD, part);

    let response = match self.http.post(self.url.clone()).multipart(form).send() {
      Ok(response) => response,
      Err(e) => {
        warn!("预测请求失败: {}", e);
        return PredictOutcome::Transport(e.to_string());
      }
    };

    let status = response.status();
    let body = match response.text() {
      Ok(body) => body,
      Err(e) => {
        warn!("读取响应失败: {}", e);
        return PredictOutcome::Transport(e.to_string());
      }
    };
    debug!("预测响应 {}: {}", status, body);

    if !status.is_success() {
      return PredictOutcome::Rejected {
        status: status.as_u16(),
        body,
      };
    }

    match serde_json::from_str::<Prediction>(&body) {
      Ok(prediction) => PredictOutcome::Sign(prediction),
      Err(e) => {
        warn!("响应格式错误: {}", e);
        PredictOutcome::Malformed(body)
      }
    }
  }
}

/// 将帧编码为 JPEG 后交给远端预测
pub struct RemotePredictor<P> {
  predictor: P,
  jpeg_quality: u8,
}

impl<P: Predict> RemotePredictor<P> {
  pub fn new(predictor: P) -> Self {
    Self {
      predictor,
      jpeg_quality: DEFAULT_JPEG_QUALITY,
    }
  }

  pub fn with_jpeg_quality(mut self, quality: u8) -> Self {
    self.jpeg_quality = quality;
    self
  }
}

impl<P: Predict> Model for RemotePredictor<P> {
  type Input = Frame;
  type Output = PredictOutcome;
  type Error = FrameError;

  fn infer(&self, frame: &Frame) -> Result<PredictOutcome, FrameError> {
    let jpeg = encode_jpeg(&frame.image, self.jpeg_quality)?;
    Ok(self.predictor.predict(jpeg))
  }
}

/// 打印单次请求的结果，可选地保存发送的帧
#[derive(Debug, Default)]
pub struct ConsoleReport {
  save: Option<PathBuf>,
}

impl ConsoleReport {
  pub fn with_save(mut self, save: Option<PathBuf>) -> Self {
    self.save = save;
    self
  }
}

impl Render<Frame, PredictOutcome> for ConsoleReport {
  type Error = image::ImageError;

  fn render_result(&self, frame: &Frame, outcome: &PredictOutcome) -> Result<(), Self::Error> {
    if let Some(path) = &self.save {
      frame.image.save(path)?;
      info!("已保存帧: {}", path.display());
    }
    println!("{}", outcome.report_line());
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use std::{cell::RefCell, net::TcpListener};

  use image::RgbImage;

  use super::*;

  #[test]
  fn display_text_formats_each_outcome() {
    let sign = PredictOutcome::Sign(Prediction {
      sign: "A".into(),
      confidence: 0.9234,
    });
    assert_eq!(sign.display_text(), "A (92.3%)");

    let rejected = PredictOutcome::Rejected {
      status: 400,
      body: r#"{"error": "No hand detected"}"#.into(),
    };
    assert_eq!(rejected.display_text(), "No hand detected");

    assert_eq!(PredictOutcome::Transport("refused".into()).display_text(), "API Error");
    assert_eq!(PredictOutcome::Malformed("<html>".into()).display_text(), "API Error");
  }

  #[test]
  fn report_lines_match_console_format() {
    let sign = PredictOutcome::Sign(Prediction {
      sign: "B".into(),
      confidence: 0.876,
    });
    assert_eq!(sign.report_line(), "Prediction: B, Confidence: 0.88");

    let rejected = PredictOutcome::Rejected {
      status: 400,
      body: "{\"error\":\"No hand detected\"}".into(),
    };
    assert_eq!(rejected.report_line(), "Error: 400, {\"error\":\"No hand detected\"}");
  }

  struct CapturePredict(RefCell<Vec<Vec<u8>>>);

  impl Predict for CapturePredict {
    fn predict(&self, jpeg: Vec<u8>) -> PredictOutcome {
      self.0.borrow_mut().push(jpeg);
      PredictOutcome::Transport("offline".into())
    }
  }

  #[test]
  fn remote_predictor_sends_jpeg() {
    let predictor = RemotePredictor::new(CapturePredict(RefCell::new(Vec::new())));
    let frame = Frame::new(RgbImage::new(16, 16), 0, 0);
    let outcome = predictor.infer(&frame).unwrap();
    assert_eq!(outcome.display_text(), "API Error");

    let sent = predictor.predictor.0.borrow();
    assert_eq!(sent.len(), 1);
    assert_eq!(&sent[0][..2], &[0xff, 0xd8]);
  }

  #[test]
  fn console_report_saves_frame() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("frame.jpg");
    let report = ConsoleReport::default().with_save(Some(path.clone()));
    let frame = Frame::new(RgbImage::new(8, 8), 0, 0);
    report
      .render_result(&frame, &PredictOutcome::Transport("offline".into()))
      .unwrap();
    assert!(path.is_file());
  }

  #[test]
  fn unreachable_server_is_a_transport_error() {
    let port = {
      let listener = TcpListener::bind("127.0.0.1:0").unwrap();
      listener.local_addr().unwrap().port()
    };
    let url = url::Url::parse(&format!("http://127.0.0.1:{port}/predict")).unwrap();
    let client = PredictClient::new(url, Some(Duration::from_secs(5))).unwrap();

    let outcome = client.predict(vec![0xff, 0xd8, 0xff]);
    assert!(matches!(outcome, PredictOutcome::Transport(_)));
    assert_eq!(outcome.display_text(), "API Error");
  }
}
