// 该文件是 Tingche （停车） 项目的一部分。
// src/command.rs - 导航指令
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

use std::{fmt, str::FromStr, sync::mpsc};

use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::warn;

/// 发送给执行端的指令词表，执行端自行决定如何驱动电机与舵机
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CommandKind {
  /// 摄像头右转 45°
  #[serde(rename = "PAN_CAMERA_RIGHT")]
  PanCameraRight,
  /// 摄像头回中
  #[serde(rename = "PAN_CAMERA_CENTER")]
  PanCameraCenter,
  #[serde(rename = "STOP")]
  Stop,
  /// 原地右转 90°
  #[serde(rename = "TURN_RIGHT_90")]
  TurnRight90,
  /// 向左微调，带幅度
  #[serde(rename = "ALIGN_LEFT")]
  AlignLeft,
  /// 向右微调，带幅度
  #[serde(rename = "ALIGN_RIGHT")]
  AlignRight,
  /// 直行驶入车位
  #[serde(rename = "ENTER_SLOT")]
  EnterSlot,
  /// 原地旋转 180°
  #[serde(rename = "ROTATE_180")]
  Rotate180,
  /// 交还给车道跟随
  #[serde(rename = "RESUME_LANE_TRACKING")]
  ResumeLaneTracking,
  /// 确认检测到减速带（仅任务层使用）
  #[serde(rename = "BUMPER_DETECTED")]
  BumperDetected,
}

impl CommandKind {
  pub const ALL: [CommandKind; 10] = [
    CommandKind::PanCameraRight,
    CommandKind::PanCameraCenter,
    CommandKind::Stop,
    CommandKind::TurnRight90,
    CommandKind::AlignLeft,
    CommandKind::AlignRight,
    CommandKind::EnterSlot,
    CommandKind::Rotate180,
    CommandKind::ResumeLaneTracking,
    CommandKind::BumperDetected,
  ];

  pub fn as_str(&self) -> &'static str {
    match self {
      CommandKind::PanCameraRight => "PAN_CAMERA_RIGHT",
      CommandKind::PanCameraCenter => "PAN_CAMERA_CENTER",
      CommandKind::Stop => "STOP",
      CommandKind::TurnRight90 => "TURN_RIGHT_90",
      CommandKind::AlignLeft => "ALIGN_LEFT",
      CommandKind::AlignRight => "ALIGN_RIGHT",
      CommandKind::EnterSlot => "ENTER_SLOT",
      CommandKind::Rotate180 => "ROTATE_180",
      CommandKind::ResumeLaneTracking => "RESUME_LANE_TRACKING",
      CommandKind::BumperDetected => "BUMPER_DETECTED",
    }
  }

  /// 只有微调指令携带幅度
  pub fn takes_magnitude(&self) -> bool {
    matches!(self, CommandKind::AlignLeft | CommandKind::AlignRight)
  }
}

impl fmt::Display for CommandKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

#[derive(Error, Debug, PartialEq, Eq)]
#[error("未知指令: {0}")]
pub struct UnknownCommand(pub String);

impl FromStr for CommandKind {
  type Err = UnknownCommand;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    CommandKind::ALL
      .into_iter()
      .find(|kind| kind.as_str() == s)
      .ok_or_else(|| UnknownCommand(s.to_string()))
  }
}

/// 一条导航指令
///
/// 序列化形如 `{"command": "ALIGN_LEFT", "magnitude": 0.1234, "metadata": {"error_px": -42.5}}`，
/// 幅度为 0 时省略，元数据为空时省略。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NavCommand {
  pub command: CommandKind,
  #[serde(
    default,
    skip_serializing_if = "is_zero",
    serialize_with = "serialize_magnitude"
  )]
  pub magnitude: f32,
  #[serde(default, skip_serializing_if = "Map::is_empty")]
  pub metadata: Map<String, Value>,
}

fn is_zero(value: &f32) -> bool {
  *value == 0.0
}

fn serialize_magnitude<S: Serializer>(value: &f32, serializer: S) -> Result<S::Ok, S::Error> {
  serializer.serialize_f64(round_to(*value as f64, 4))
}

pub(crate) fn round_to(value: f64, digits: i32) -> f64 {
  let scale = 10f64.powi(digits);
  (value * scale).round() / scale
}

impl NavCommand {
  pub fn new(command: CommandKind) -> Self {
    Self {
      command,
      magnitude: 0.0,
      metadata: Map::new(),
    }
  }

  pub fn with_magnitude(mut self, magnitude: f32) -> Self {
    self.magnitude = magnitude;
    self
  }

  pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
    self.metadata.insert(key.into(), value.into());
    self
  }

  pub fn to_json(&self) -> Value {
    // 结构体字段都可序列化，不会失败
    serde_json::to_value(self).unwrap_or(Value::Null)
  }
}

impl From<CommandKind> for NavCommand {
  fn from(command: CommandKind) -> Self {
    NavCommand::new(command)
  }
}

/// 指令出口，由状态机在处理过程中同步调用
///
/// 实现方只负责接收，排队与网络发送由接收方决定；
/// 实现方不能回调状态机。
pub trait CommandSink {
  fn send(&mut self, command: NavCommand);
}

impl<F: FnMut(NavCommand)> CommandSink for F {
  fn send(&mut self, command: NavCommand) {
    self(command)
  }
}

impl CommandSink for Vec<NavCommand> {
  fn send(&mut self, command: NavCommand) {
    self.push(command);
  }
}

impl CommandSink for mpsc::Sender<NavCommand> {
  fn send(&mut self, command: NavCommand) {
    if let Err(e) = mpsc::Sender::send(self, command) {
      warn!("指令接收端已关闭, 丢弃指令: {}", e.0.command);
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn plain_command_has_only_name() {
    let cmd = NavCommand::new(CommandKind::TurnRight90);
    assert_eq!(cmd.to_json(), json!({"command": "TURN_RIGHT_90"}));
  }

  #[test]
  fn magnitude_is_rounded_to_four_places() {
    let cmd = NavCommand::new(CommandKind::AlignLeft)
      .with_magnitude(0.123_456)
      .with_metadata("error_px", -42.5);
    assert_eq!(
      cmd.to_json(),
      json!({"command": "ALIGN_LEFT", "magnitude": 0.1235, "metadata": {"error_px": -42.5}})
    );
  }

  #[test]
  fn parses_wire_form() {
    let cmd: NavCommand = serde_json::from_str(r#"{"command":"ROTATE_180"}"#).unwrap();
    assert_eq!(cmd.command, CommandKind::Rotate180);
    assert_eq!(cmd.magnitude, 0.0);
    assert!(cmd.metadata.is_empty());
  }

  #[test]
  fn kind_from_str_matches_as_str() {
    for kind in CommandKind::ALL {
      assert_eq!(kind.as_str().parse::<CommandKind>(), Ok(kind));
      let wire = serde_json::to_value(kind).unwrap();
      assert_eq!(wire, json!(kind.as_str()));
    }
    assert!("TURN_LEFT_90".parse::<CommandKind>().is_err());
  }

  #[test]
  fn sinks_receive_commands() {
    let mut recorded = Vec::new();
    CommandSink::send(&mut recorded, NavCommand::new(CommandKind::Stop));
    assert_eq!(recorded.len(), 1);

    let mut count = 0;
    let mut counter = |_cmd: NavCommand| count += 1;
    counter.send(NavCommand::new(CommandKind::Stop));
    counter.send(NavCommand::new(CommandKind::EnterSlot));
    assert_eq!(count, 2);

    let (mut tx, rx) = mpsc::channel();
    CommandSink::send(&mut tx, NavCommand::new(CommandKind::EnterSlot));
    assert_eq!(rx.recv().unwrap().command, CommandKind::EnterSlot);
  }
}
