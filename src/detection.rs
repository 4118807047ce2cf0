// 该文件是 Tingche （停车） 项目的一部分。
// src/detection.rs - 单帧检测结果定义
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

use serde::{Deserialize, Serialize};
use tracing::debug;

/// 检测目标的语义类别
///
/// 类别名称本身由配置决定（见 [`crate::config::ClassNames`]），
/// 这里只描述决策层关心的几种角色。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectKind {
  /// 候选车位
  ParkingSlot,
  /// 车位指示牌（P 牌），挂在车位上方
  DirectionSign,
  /// 禁停标志（如残障专用）
  RestrictedSign,
  /// 锥桶
  ObstructionCone,
  /// 减速带
  Bumper,
}

/// 单帧中的一个检测目标，坐标为帧像素坐标 `[x1, y1, x2, y2]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
  pub class_name: String,
  pub confidence: f32,
  pub x1: f32,
  pub y1: f32,
  pub x2: f32,
  pub y2: f32,
}

impl Detection {
  pub fn new(class_name: impl Into<String>, confidence: f32, bbox: [f32; 4]) -> Self {
    let [x1, y1, x2, y2] = bbox;
    Self {
      class_name: class_name.into(),
      confidence,
      x1,
      y1,
      x2,
      y2,
    }
  }

  pub fn center_x(&self) -> f32 {
    (self.x1 + self.x2) / 2.0
  }

  pub fn center_y(&self) -> f32 {
    (self.y1 + self.y2) / 2.0
  }

  pub fn width(&self) -> f32 {
    self.x2 - self.x1
  }

  pub fn height(&self) -> f32 {
    self.y2 - self.y1
  }

  pub fn area(&self) -> f32 {
    self.width() * self.height()
  }

  /// 底边中点，作为目标与地面接触位置的近似
  pub fn foot_point(&self) -> (f32, f32) {
    (self.center_x(), self.y2)
  }

  /// 边界上的点也视为在框内
  pub fn contains_point(&self, px: f32, py: f32) -> bool {
    self.x1 <= px && px <= self.x2 && self.y1 <= py && py <= self.y2
  }

  fn is_well_formed(&self) -> bool {
    [self.x1, self.y1, self.x2, self.y2, self.confidence]
      .iter()
      .all(|v| v.is_finite())
      && self.x1 <= self.x2
      && self.y1 <= self.y2
  }
}

/// 检测器适配层：按置信度下限过滤，并丢弃坐标非法的目标
///
/// 决策层不会再次检查置信度，因此所有检测都应先经过这里。
pub fn ingest<I>(records: I, min_confidence: f32) -> Vec<Detection>
where
  I: IntoIterator<Item = Detection>,
{
  records
    .into_iter()
    .filter(|det| {
      if !det.is_well_formed() {
        debug!("丢弃非法检测框: {:?}", det);
        return false;
      }
      det.confidence >= min_confidence
    })
    .collect()
}

#[cfg(test)]
mod tests {
  use super::*;
  use approx::assert_relative_eq;

  #[test]
  fn derived_geometry() {
    let det = Detection::new("parking_slot", 0.9, [100.0, 200.0, 300.0, 260.0]);
    assert_relative_eq!(det.center_x(), 200.0);
    assert_relative_eq!(det.center_y(), 230.0);
    assert_relative_eq!(det.width(), 200.0);
    assert_relative_eq!(det.height(), 60.0);
    assert_relative_eq!(det.area(), 12000.0);
    assert_eq!(det.foot_point(), (200.0, 260.0));
  }

  #[test]
  fn contains_point_is_inclusive() {
    let det = Detection::new("parking_slot", 0.9, [0.0, 0.0, 10.0, 10.0]);
    assert!(det.contains_point(10.0, 10.0));
    assert!(det.contains_point(5.0, 0.0));
    assert!(!det.contains_point(10.1, 5.0));
  }

  #[test]
  fn ingest_filters_confidence_and_bad_boxes() {
    let records = vec![
      Detection::new("cone", 0.49, [0.0, 0.0, 1.0, 1.0]),
      Detection::new("cone", 0.50, [0.0, 0.0, 1.0, 1.0]),
      Detection::new("cone", 0.90, [5.0, 0.0, 1.0, 1.0]),
      Detection::new("cone", 0.90, [0.0, f32::NAN, 1.0, 1.0]),
      Detection::new("bumper", 0.95, [1.0, 1.0, 2.0, 2.0]),
    ];
    let kept = ingest(records, 0.5);
    assert_eq!(kept.len(), 2);
    assert_eq!(kept[0].class_name, "cone");
    assert_eq!(kept[1].class_name, "bumper");
  }

  #[test]
  fn ingest_empty() {
    assert!(ingest(Vec::new(), 0.5).is_empty());
  }
}
