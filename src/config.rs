// 该文件是 Shouyu （手语） 项目的一部分。
// src/config.rs - 默认配置常量
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

//! 各个可执行程序共享的默认值。
//!
//! 所有值都可以通过命令行参数覆盖，这里仅给出默认取值。

use std::time::Duration;

/// 服务监听地址
pub const DEFAULT_HOST: &str = "0.0.0.0";
/// 服务监听端口
pub const DEFAULT_PORT: u16 = 5000;
/// 分类模型、标签编码器与特征缩放器所在目录
pub const DEFAULT_MODEL_DIR: &str = "TiltedModel";
/// 手掌检测与手部关键点模型所在目录
pub const DEFAULT_DETECTOR_DIR: &str = "HandModel";
/// 客户端默认请求地址
pub const DEFAULT_PREDICT_URL: &str = "http://127.0.0.1:5000/predict";
/// 默认摄像头
pub const DEFAULT_CAMERA: &str = "v4l:///dev/video0";
/// 默认显示窗口
pub const DEFAULT_DISPLAY: &str = "display://window";
/// 叠加文字所用字体
pub const DEFAULT_FONT: &str = "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf";
/// 两次预测请求之间的最小间隔（毫秒）
pub const DEFAULT_THROTTLE_MS: u64 = 1500;
/// 客户端上传帧的 JPEG 质量
pub const DEFAULT_JPEG_QUALITY: u8 = 90;
/// 上传图像大小上限
pub const DEFAULT_BODY_LIMIT: usize = 16 * 1024 * 1024;
/// 同时进行的推理数量，1 表示全局串行
pub const DEFAULT_MAX_CONCURRENT_INFERENCE: usize = 1;

/// 上传表单中图像字段的名称
pub const FRAME_FIELD: &str = "frame";

/// 尚未得到预测结果时显示的文字
pub const WAITING_TEXT: &str = "Waiting for prediction...";
/// 未检测到手（或服务端拒绝）时显示的文字
pub const NO_HAND_TEXT: &str = "No hand detected";
/// 无法得到服务端结果时显示的文字
pub const API_ERROR_TEXT: &str = "API Error";

pub fn default_throttle() -> Duration {
  Duration::from_millis(DEFAULT_THROTTLE_MS)
}
