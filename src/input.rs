// 该文件是 Tingche （停车） 项目的一部分。
// src/input.rs - 检测帧与确认消息输入
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

use std::io::{BufRead, ErrorKind, Lines};

use serde_json::Value;
use thiserror::Error;
use tracing::warn;

use crate::{FromUrl, FromUrlWithScheme, detection::Detection};

mod replay_file;
mod stdin_input;

pub use self::replay_file::{ReplayFileInput, ReplayFileInputError};
pub use self::stdin_input::StdinInput;

/// 输入流中的一条事件
#[derive(Debug, Clone, PartialEq)]
pub enum InputEvent {
  /// 一帧检测结果，`t` 为可选的记录时间（秒）
  Frame {
    detections: Vec<Detection>,
    t: Option<f64>,
  },
  /// 执行端确认，保留原始字符串，由使用方解析
  Ack(String),
}

#[derive(Error, Debug)]
pub enum LineParseError {
  #[error("JSON 解析错误: {0}")]
  Json(#[from] serde_json::Error),
  #[error("无法识别的事件: {0}")]
  Unrecognized(String),
}

/// 解析一行事件
///
/// 支持的格式：
/// - `{"frame": [<检测>...], "t": 1.25}`，`t` 可省略
/// - `{"ack": "turn_complete"}`
/// - `"turn_complete"`
///
/// 空行返回 `Ok(None)`。
pub fn parse_event(line: &str) -> Result<Option<InputEvent>, LineParseError> {
  let line = line.trim();
  if line.is_empty() {
    return Ok(None);
  }

  let value: Value = serde_json::from_str(line)?;
  match value {
    Value::String(ack) => Ok(Some(InputEvent::Ack(ack))),
    Value::Object(mut map) => {
      if let Some(frame) = map.remove("frame") {
        let detections: Vec<Detection> = serde_json::from_value(frame)?;
        let t = map.get("t").and_then(Value::as_f64);
        return Ok(Some(InputEvent::Frame { detections, t }));
      }
      match map.remove("ack") {
        Some(Value::String(ack)) => Ok(Some(InputEvent::Ack(ack))),
        _ => Err(LineParseError::Unrecognized(line.to_string())),
      }
    }
    _ => Err(LineParseError::Unrecognized(line.to_string())),
  }
}

/// 把按行读取的文本转换为事件流，无法解析的行记录警告后跳过
pub struct EventLines<R> {
  lines: Lines<R>,
  line_number: usize,
}

impl<R: BufRead> EventLines<R> {
  pub fn new(reader: R) -> Self {
    Self {
      lines: reader.lines(),
      line_number: 0,
    }
  }
}

impl<R: BufRead> Iterator for EventLines<R> {
  type Item = InputEvent;

  fn next(&mut self) -> Option<Self::Item> {
    loop {
      let line = self.lines.next()?;
      self.line_number += 1;
      let line = match line {
        Ok(line) => line,
        // 该行已被读走，跳过即可
        Err(err) if err.kind() == ErrorKind::InvalidData => {
          warn!("跳过第 {} 行: {}", self.line_number, err);
          continue;
        }
        Err(err) => {
          warn!("读取输入失败: {}", err);
          return None;
        }
      };

      match parse_event(&line) {
        Ok(Some(event)) => return Some(event),
        Ok(None) => continue,
        Err(err) => warn!("跳过第 {} 行: {}", self.line_number, err),
      }
    }
  }
}

#[derive(Error, Debug)]
pub enum InputError {
  #[error("回放文件输入错误: {0}")]
  ReplayFileInputError(#[from] ReplayFileInputError),
  #[error("URI 方案不匹配")]
  SchemeMismatch,
}

pub enum InputWrapper {
  ReplayFile(ReplayFileInput),
  Stdin(StdinInput),
}

impl FromUrl for InputWrapper {
  type Error = InputError;

  fn from_url(url: &url::Url) -> Result<Self, Self::Error> {
    match url.scheme() {
      ReplayFileInput::SCHEME => Ok(InputWrapper::ReplayFile(ReplayFileInput::from_url(url)?)),
      StdinInput::SCHEME => Ok(InputWrapper::Stdin(StdinInput::default())),
      _ => Err(InputError::SchemeMismatch),
    }
  }
}

impl Iterator for InputWrapper {
  type Item = InputEvent;

  fn next(&mut self) -> Option<Self::Item> {
    match self {
      InputWrapper::ReplayFile(input) => input.next(),
      InputWrapper::Stdin(input) => input.next(),
    }
  }
}
