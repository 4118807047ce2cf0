// 该文件是 Tingche （停车） 项目的一部分。
// src/message.rs - 对外发布的消息
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

use serde::Serialize;
use serde_json::{Value, json};

use crate::{command::NavCommand, command::round_to, detection::Detection};

pub const TOPIC_STATE: &str = "anc/state";
pub const TOPIC_NAV_COMMAND: &str = "anc/nav_command";
pub const TOPIC_DETECTIONS: &str = "anc/detections";

/// 发往执行端的一条消息
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
  State { state: String, timestamp: f64 },
  NavCommand(NavCommand),
  Detections(DetectionSummary),
}

impl Outbound {
  pub fn topic(&self) -> &'static str {
    match self {
      Outbound::State { .. } => TOPIC_STATE,
      Outbound::NavCommand(_) => TOPIC_NAV_COMMAND,
      Outbound::Detections(_) => TOPIC_DETECTIONS,
    }
  }

  pub fn payload(&self) -> Value {
    match self {
      Outbound::State { state, timestamp } => json!({ "state": state, "timestamp": timestamp }),
      Outbound::NavCommand(command) => command.to_json(),
      Outbound::Detections(summary) => serde_json::to_value(summary).unwrap_or(Value::Null),
    }
  }

  /// 带主题的一行 JSON，用于标准输出和文件记录
  pub fn to_line(&self) -> String {
    json!({ "topic": self.topic(), "payload": self.payload() }).to_string()
  }
}

/// 每帧检测结果摘要
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetectionSummary {
  pub frame_id: u64,
  pub timestamp: f64,
  pub state: String,
  pub count: usize,
  pub objects: Vec<ObjectSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ObjectSummary {
  #[serde(rename = "class")]
  pub class_name: String,
  pub conf: f64,
  pub cx: f64,
  pub cy: f64,
  pub w: f64,
  pub h: f64,
  pub area_pct: f64,
}

impl DetectionSummary {
  pub fn new(frame_id: u64, timestamp: f64, state: &str, detections: &[Detection], frame_area: f32) -> Self {
    let objects = detections
      .iter()
      .map(|det| ObjectSummary {
        class_name: det.class_name.clone(),
        conf: round_to(det.confidence as f64, 3),
        cx: round_to(det.center_x() as f64, 1),
        cy: round_to(det.center_y() as f64, 1),
        w: round_to(det.width() as f64, 1),
        h: round_to(det.height() as f64, 1),
        area_pct: round_to((det.area() / frame_area) as f64, 4),
      })
      .collect();

    Self {
      frame_id,
      timestamp,
      state: state.to_string(),
      count: detections.len(),
      objects,
    }
  }
}

/// 当前墙钟时间（秒），仅用于消息时间戳
pub fn wall_timestamp() -> f64 {
  let now = chrono::Utc::now();
  now.timestamp_millis() as f64 / 1000.0
}
