// 该文件是 Shouyu （手语） 项目的一部分。
// src/task.rs - 任务循环
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

use std::{
  sync::mpsc::{Receiver, channel},
  thread,
  time::{Duration, Instant},
};

use tracing::{debug, info, warn};

use crate::{
  client::PredictOutcome,
  config::{WAITING_TEXT, default_throttle},
  model::Model,
  output::Render,
};

/// 强制退出前等待资源释放的时间
const FORCE_EXIT_AFTER: Duration = Duration::from_secs(30);

pub trait Task<I, M, O>: Sized {
  type Error;
  fn run_task(self, input: I, model: M, output: O) -> Result<(), Self::Error>;
}

/// 安装 Ctrl-C 处理函数，返回的通道在收到信号时可读
pub fn install_interrupt() -> Result<Receiver<()>, ctrlc::Error> {
  let (tx, rx) = channel();
  ctrlc::set_handler(move || {
    info!("收到中断信号，准备退出...");
    let _ = tx.send(());
    thread::spawn(|| {
      thread::sleep(FORCE_EXIT_AFTER);
      warn!("强制退出程序");
      std::process::exit(1);
    });
  })?;
  Ok(rx)
}

fn interrupted(stop: &Option<Receiver<()>>) -> bool {
  stop.as_ref().is_some_and(|rx| rx.try_recv().is_ok())
}

/// 取一帧，推理一次，渲染一次
pub struct OneShotTask;

impl<F, D, IE, ME, RE, I, M, O> Task<I, M, O> for OneShotTask
where
  IE: std::error::Error + Sync + Send + 'static,
  ME: std::error::Error + Sync + Send + 'static,
  RE: std::error::Error + Sync + Send + 'static,
  I: Iterator<Item = Result<F, IE>>,
  M: Model<Input = F, Output = D, Error = ME>,
  O: Render<F, D, Error = RE>,
{
  type Error = anyhow::Error;

  fn run_task(self, mut input: I, model: M, output: O) -> Result<(), Self::Error> {
    info!("开始任务...");
    let frame = input.next().ok_or_else(|| anyhow::anyhow!("没有输入帧"))??;
    info!("输入帧获取成功，开始推理...");
    let now = Instant::now();
    let result = model.infer(&frame)?;
    info!("推理完成，耗时: {:.2?}", now.elapsed());
    output.render_result(&frame, &result)?;
    info!("渲染完成，耗时: {:.2?}", now.elapsed());

    Ok(())
  }
}

/// 每帧都推理并渲染
#[derive(Default, Debug)]
pub struct ContinuousTask {
  frame_number: Option<usize>,
  stop: Option<Receiver<()>>,
}

impl ContinuousTask {
  pub fn with_frame_number(mut self, frame_number: Option<usize>) -> Self {
    self.frame_number = frame_number;
    self
  }

  pub fn with_stop(mut self, stop: Receiver<()>) -> Self {
    self.stop = Some(stop);
    self
  }
}

impl<F, D, IE, ME, RE, I, M, O> Task<I, M, O> for ContinuousTask
where
  IE: std::error::Error + Sync + Send + 'static,
  ME: std::error::Error + Sync + Send + 'static,
  RE: std::error::Error + Sync + Send + 'static,
  I: Iterator<Item = Result<F, IE>>,
  M: Model<Input = F, Output = D, Error = ME>,
  O: Render<F, D, Error = RE>,
{
  type Error = anyhow::Error;

  fn run_task(self, input: I, model: M, output: O) -> Result<(), Self::Error> {
    info!("开始任务...");

    let mut frame_index = 0;
    let mut now = Instant::now();
    for frame in input {
      let frame = frame?;
      frame_index += 1;
      debug!("处理第 {} 帧图像", frame_index);
      let result = model.infer(&frame)?;
      let elapsed_a = now.elapsed();
      output.render_result(&frame, &result)?;
      let elapsed_b = now.elapsed();
      now = Instant::now();
      info!("推理完成，耗时: {:.2?} / {:.2?}", elapsed_a, elapsed_b);

      if self.frame_number.is_some_and(|n| frame_index >= n) {
        info!("达到指定帧数 {}, 退出任务循环", frame_index);
        break;
      }
      if output.wants_quit() {
        info!("输出端请求退出");
        break;
      }
      if interrupted(&self.stop) {
        warn!("中断信号接收，退出任务循环");
        break;
      }
    }

    info!("任务完成，退出");
    Ok(())
  }
}

/// 请求节流：距上次尝试超过间隔时才允许下一次请求，第一次总是允许
#[derive(Debug, Clone)]
pub struct Throttle {
  interval: Duration,
  last: Option<Instant>,
}

impl Throttle {
  pub fn new(interval: Duration) -> Self {
    Self {
      interval,
      last: None,
    }
  }

  /// 允许时立即以 `now` 重置计时
  pub fn poll(&mut self, now: Instant) -> bool {
    let ready = self
      .last
      .is_none_or(|last| now.saturating_duration_since(last) >= self.interval);
    if ready {
      self.last = Some(now);
    }
    ready
  }
}

/// 实时客户端：每帧都渲染，按节流间隔发送预测请求
///
/// 请求在循环内同步执行，期间到达的帧被丢弃。
#[derive(Debug)]
pub struct LiveTask {
  throttle: Duration,
  frame_number: Option<usize>,
  stop: Option<Receiver<()>>,
}

impl Default for LiveTask {
  fn default() -> Self {
    Self {
      throttle: default_throttle(),
      frame_number: None,
      stop: None,
    }
  }
}

impl LiveTask {
  pub fn with_throttle(mut self, throttle: Duration) -> Self {
    self.throttle = throttle;
    self
  }

  pub fn with_frame_number(mut self, frame_number: Option<usize>) -> Self {
    self.frame_number = frame_number;
    self
  }

  pub fn with_stop(mut self, stop: Receiver<()>) -> Self {
    self.stop = Some(stop);
    self
  }
}

impl<F, IE, ME, RE, I, M, O> Task<I, M, O> for LiveTask
where
  IE: std::error::Error + Sync + Send + 'static,
  ME: std::error::Error + Sync + Send + 'static,
  RE: std::error::Error + Sync + Send + 'static,
  I: Iterator<Item = Result<F, IE>>,
  M: Model<Input = F, Output = PredictOutcome, Error = ME>,
  O: Render<F, String, Error = RE>,
{
  type Error = anyhow::Error;

  fn run_task(self, input: I, model: M, output: O) -> Result<(), Self::Error> {
    info!("开始实时识别，请求间隔 {:.2?}", self.throttle);

    let mut throttle = Throttle::new(self.throttle);
    let mut text = WAITING_TEXT.to_string();
    let mut frame_index = 0;

    for frame in input {
      let frame = frame?;
      frame_index += 1;

      if throttle.poll(Instant::now()) {
        let now = Instant::now();
        let outcome = model.infer(&frame)?;
        text = outcome.display_text();
        info!("第 {} 帧: {} ({:.2?})", frame_index, text, now.elapsed());
      }

      output.render_result(&frame, &text)?;

      if self.frame_number.is_some_and(|n| frame_index >= n) {
        info!("达到指定帧数 {}, 退出任务循环", frame_index);
        break;
      }
      if output.wants_quit() {
        info!("显示窗口请求退出");
        break;
      }
      if interrupted(&self.stop) {
        warn!("中断信号接收，退出任务循环");
        break;
      }
    }

    info!("任务完成，共处理 {} 帧", frame_index);
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use std::{
    cell::{Cell, RefCell},
    rc::Rc,
  };

  use image::RgbImage;
  use thiserror::Error;

  use super::*;
  use crate::{
    client::{Predict, RemotePredictor},
    frame::Frame,
    pipeline::Prediction,
  };

  #[derive(Error, Debug)]
  #[error("camera unplugged")]
  struct CameraError;

  #[derive(Error, Debug)]
  #[error("render failed")]
  struct RenderError;

  fn frames(n: u64) -> impl Iterator<Item = Result<Frame, CameraError>> {
    (0..n).map(|i| Ok(Frame::new(RgbImage::new(8, 8), i, i * 33)))
  }

  struct ScriptedPredict {
    outcome: PredictOutcome,
    calls: Rc<Cell<usize>>,
  }

  impl Predict for ScriptedPredict {
    fn predict(&self, _: Vec<u8>) -> PredictOutcome {
      self.calls.set(self.calls.get() + 1);
      self.outcome.clone()
    }
  }

  fn scripted(outcome: PredictOutcome) -> (RemotePredictor<ScriptedPredict>, Rc<Cell<usize>>) {
    let calls = Rc::new(Cell::new(0));
    let predictor = RemotePredictor::new(ScriptedPredict {
      outcome,
      calls: calls.clone(),
    });
    (predictor, calls)
  }

  #[derive(Default, Clone)]
  struct Screen {
    texts: Rc<RefCell<Vec<String>>>,
    quit_after: Option<usize>,
  }

  impl Render<Frame, String> for Screen {
    type Error = RenderError;

    fn render_result(&self, _: &Frame, text: &String) -> Result<(), RenderError> {
      self.texts.borrow_mut().push(text.clone());
      Ok(())
    }

    fn wants_quit(&self) -> bool {
      self
        .quit_after
        .is_some_and(|n| self.texts.borrow().len() >= n)
    }
  }

  #[test]
  fn throttle_allows_first_request_then_waits() {
    let start = Instant::now();
    let mut throttle = Throttle::new(Duration::from_millis(1500));
    assert!(throttle.poll(start));
    assert!(!throttle.poll(start + Duration::from_millis(1499)));
    assert!(throttle.poll(start + Duration::from_millis(1500)));
    assert!(!throttle.poll(start + Duration::from_millis(2000)));
    assert!(throttle.poll(start + Duration::from_millis(3000)));
  }

  #[test]
  fn network_failure_shows_api_error_and_keeps_looping() {
    let (model, calls) = scripted(PredictOutcome::Transport("connection refused".into()));
    let screen = Screen::default();

    LiveTask::default()
      .with_throttle(Duration::ZERO)
      .run_task(frames(5), model, screen.clone())
      .unwrap();

    assert_eq!(calls.get(), 5);
    assert_eq!(*screen.texts.borrow(), vec!["API Error".to_string(); 5]);
  }

  #[test]
  fn rejected_request_shows_no_hand_and_respects_throttle() {
    let (model, calls) = scripted(PredictOutcome::Rejected {
      status: 400,
      body: r#"{"error": "No hand detected"}"#.into(),
    });
    let screen = Screen::default();

    LiveTask::default()
      .with_throttle(Duration::from_secs(3600))
      .run_task(frames(4), model, screen.clone())
      .unwrap();

    assert_eq!(calls.get(), 1);
    assert_eq!(screen.texts.borrow().len(), 4);
    assert!(screen.texts.borrow().iter().all(|t| t == "No hand detected"));
  }

  #[test]
  fn prediction_is_kept_between_requests() {
    let (model, _) = scripted(PredictOutcome::Sign(Prediction {
      sign: "A".into(),
      confidence: 0.5,
    }));
    let screen = Screen::default();

    LiveTask::default()
      .run_task(frames(3), model, screen.clone())
      .unwrap();

    assert_eq!(*screen.texts.borrow(), vec!["A (50.0%)".to_string(); 3]);
  }

  #[test]
  fn camera_failure_ends_the_task() {
    let (model, _) = scripted(PredictOutcome::Transport("unused".into()));
    let input = frames(1).chain(std::iter::once(Err(CameraError)));

    let result = LiveTask::default().run_task(input, model, Screen::default());
    assert!(result.is_err());
  }

  #[test]
  fn quit_request_stops_the_loop() {
    let (model, _) = scripted(PredictOutcome::Transport("offline".into()));
    let screen = Screen {
      quit_after: Some(2),
      ..Screen::default()
    };

    LiveTask::default()
      .run_task(frames(10), model, screen.clone())
      .unwrap();
    assert_eq!(screen.texts.borrow().len(), 2);
  }

  #[test]
  fn interrupt_and_frame_limit_stop_the_loop() {
    let (tx, rx) = channel();
    tx.send(()).unwrap();
    let (model, _) = scripted(PredictOutcome::Transport("offline".into()));
    let screen = Screen::default();
    LiveTask::default()
      .with_stop(rx)
      .run_task(frames(10), model, screen.clone())
      .unwrap();
    assert_eq!(screen.texts.borrow().len(), 1);

    let (model, _) = scripted(PredictOutcome::Transport("offline".into()));
    let screen = Screen::default();
    LiveTask::default()
      .with_frame_number(Some(3))
      .run_task(frames(10), model, screen.clone())
      .unwrap();
    assert_eq!(screen.texts.borrow().len(), 3);
  }

  struct Echo;

  impl Model for Echo {
    type Input = Frame;
    type Output = String;
    type Error = RenderError;

    fn infer(&self, frame: &Frame) -> Result<String, RenderError> {
      Ok(format!("frame {}", frame.index))
    }
  }

  #[test]
  fn continuous_task_renders_every_result() {
    let screen = Screen::default();
    ContinuousTask::default()
      .run_task(frames(3), Echo, screen.clone())
      .unwrap();
    assert_eq!(
      *screen.texts.borrow(),
      vec!["frame 0", "frame 1", "frame 2"]
    );
  }

  #[test]
  fn one_shot_task_uses_first_frame_only() {
    let screen = Screen::default();
    OneShotTask.run_task(frames(3), Echo, screen.clone()).unwrap();
    assert_eq!(*screen.texts.borrow(), vec!["frame 0"]);

    let empty = std::iter::empty::<Result<Frame, CameraError>>();
    assert!(OneShotTask.run_task(empty, Echo, Screen::default()).is_err());
  }
}
