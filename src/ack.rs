// 该文件是 Tingche （停车） 项目的一部分。
// src/ack.rs - 执行端确认消息
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

use std::{fmt, str::FromStr};

use serde_json::Value;
use thiserror::Error;

/// 执行端完成某条指令后回报的确认
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AckKind {
  /// 已停车
  Stop,
  /// 右转 90° 完成
  TurnComplete,
  /// 驶入车位完成
  EnterComplete,
  /// 旋转 180° 完成
  RotateComplete,
  /// 已到达泊车区域（仅任务层使用）
  ParkingZoneReached,
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum AckParseError {
  #[error("未知确认类型: {0}")]
  Unknown(String),
  #[error("确认消息格式错误: {0}")]
  Malformed(String),
}

impl AckKind {
  pub fn as_str(&self) -> &'static str {
    match self {
      AckKind::Stop => "stop",
      AckKind::TurnComplete => "turn_complete",
      AckKind::EnterComplete => "enter_complete",
      AckKind::RotateComplete => "rotate_complete",
      AckKind::ParkingZoneReached => "parking_zone_reached",
    }
  }

  /// 解析线上消息：裸字符串，或 `{"ack": "<kind>"}`
  pub fn from_json(value: &Value) -> Result<Self, AckParseError> {
    match value {
      Value::String(s) => s.parse(),
      Value::Object(map) => match map.get("ack") {
        Some(Value::String(s)) => s.parse(),
        _ => Err(AckParseError::Malformed(value.to_string())),
      },
      _ => Err(AckParseError::Malformed(value.to_string())),
    }
  }
}

impl FromStr for AckKind {
  type Err = AckParseError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.trim() {
      "stop" => Ok(AckKind::Stop),
      "turn_complete" => Ok(AckKind::TurnComplete),
      "enter_complete" => Ok(AckKind::EnterComplete),
      "rotate_complete" => Ok(AckKind::RotateComplete),
      "parking_zone_reached" => Ok(AckKind::ParkingZoneReached),
      other => Err(AckParseError::Unknown(other.to_string())),
    }
  }
}

impl fmt::Display for AckKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn parses_vocabulary() {
    assert_eq!("stop".parse(), Ok(AckKind::Stop));
    assert_eq!("turn_complete".parse(), Ok(AckKind::TurnComplete));
    assert_eq!("enter_complete".parse(), Ok(AckKind::EnterComplete));
    assert_eq!("rotate_complete".parse(), Ok(AckKind::RotateComplete));
    assert_eq!(
      "parking_zone_reached".parse::<AckKind>(),
      Ok(AckKind::ParkingZoneReached)
    );
    assert!(matches!("STOP".parse::<AckKind>(), Err(AckParseError::Unknown(_))));
  }

  #[test]
  fn parses_json_forms() {
    assert_eq!(AckKind::from_json(&json!("stop")), Ok(AckKind::Stop));
    assert_eq!(
      AckKind::from_json(&json!({"ack": "rotate_complete"})),
      Ok(AckKind::RotateComplete)
    );
    assert!(matches!(
      AckKind::from_json(&json!({"kind": "stop"})),
      Err(AckParseError::Malformed(_))
    ));
    assert!(matches!(
      AckKind::from_json(&json!(3)),
      Err(AckParseError::Malformed(_))
    ));
  }
}
