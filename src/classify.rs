// 该文件是 Tingche （停车） 项目的一部分。
// src/classify.rs - 车位有效性判定
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

use std::collections::BTreeMap;

use tracing::trace;

use crate::{config::ParkingConfig, detection::Detection, detection::ObjectKind};

/// 单个车位的判定结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotVerdict {
  Valid,
  Invalid,
  Unknown,
}

impl SlotVerdict {
  pub fn as_str(&self) -> &'static str {
    match self {
      SlotVerdict::Valid => "VALID",
      SlotVerdict::Invalid => "INVALID",
      SlotVerdict::Unknown => "UNKNOWN",
    }
  }
}

/// 一帧内所有车位的判定，键为车位在该帧检测序列中的下标
pub type VerdictMap = BTreeMap<usize, SlotVerdict>;

fn distance(a: (f32, f32), b: (f32, f32)) -> f32 {
  (a.0 - b.0).hypot(a.1 - b.1)
}

/// 对一帧中的全部车位做判定
///
/// 每个标志物（锥桶、禁停牌、P 牌）只归属于离它最近的车位，
/// 距离取标志物底边中点到车位中心的欧氏距离；距离相同时取输入顺序靠前的车位。
/// 之后每个车位只看归属于自己的标志物：
///
/// - 锥桶或禁停牌的底边中点落在车位框内 → [`SlotVerdict::Invalid`]
/// - 否则若有 P 牌水平中心在车位横向范围内，且底边位于
///   `[y1 - sign_proximity_px, y2]` 之间 → [`SlotVerdict::Valid`]
/// - 否则 → [`SlotVerdict::Unknown`]
///
/// 没有车位时返回空表。
pub fn classify_all_slots(detections: &[Detection], config: &ParkingConfig) -> VerdictMap {
  let classes = &config.classes;

  let slots: Vec<(usize, &Detection)> = detections
    .iter()
    .enumerate()
    .filter(|(_, det)| classes.is(&det.class_name, ObjectKind::ParkingSlot))
    .collect();

  if slots.is_empty() {
    return VerdictMap::new();
  }

  // 下标与 slots 对齐
  let mut assigned: Vec<Vec<(ObjectKind, &Detection)>> = vec![Vec::new(); slots.len()];

  for det in detections {
    let kind = match classes.kind_of(&det.class_name) {
      Some(
        kind @ (ObjectKind::ObstructionCone | ObjectKind::RestrictedSign | ObjectKind::DirectionSign),
      ) => kind,
      _ => continue,
    };

    let foot = det.foot_point();
    let mut best = 0;
    let mut best_dist = f32::INFINITY;
    for (i, (_, slot)) in slots.iter().enumerate() {
      let dist = distance(foot, (slot.center_x(), slot.center_y()));
      if dist < best_dist {
        best = i;
        best_dist = dist;
      }
    }
    assigned[best].push((kind, det));
  }

  let mut verdicts = VerdictMap::new();
  for ((index, slot), markers) in slots.iter().zip(assigned.iter()) {
    let verdict = judge_slot(slot, markers, config);
    trace!("车位 #{} 判定为 {}", index, verdict.as_str());
    verdicts.insert(*index, verdict);
  }
  verdicts
}

fn judge_slot(slot: &Detection, markers: &[(ObjectKind, &Detection)], config: &ParkingConfig) -> SlotVerdict {
  let mut has_sign = false;

  for (kind, marker) in markers {
    match kind {
      ObjectKind::ObstructionCone | ObjectKind::RestrictedSign => {
        let (fx, fy) = marker.foot_point();
        if slot.contains_point(fx, fy) {
          return SlotVerdict::Invalid;
        }
      }
      ObjectKind::DirectionSign => {
        let cx = marker.center_x();
        let in_x = slot.x1 <= cx && cx <= slot.x2;
        let in_y = slot.y1 - config.sign_proximity_px <= marker.y2 && marker.y2 <= slot.y2;
        has_sign |= in_x && in_y;
      }
      ObjectKind::ParkingSlot | ObjectKind::Bumper => {}
    }
  }

  if has_sign {
    SlotVerdict::Valid
  } else {
    SlotVerdict::Unknown
  }
}

/// 单车位判定，内部仍走整帧的最近归属逻辑
///
/// `index` 不是车位时返回 [`SlotVerdict::Unknown`]。
pub fn classify_slot(index: usize, detections: &[Detection], config: &ParkingConfig) -> SlotVerdict {
  classify_all_slots(detections, config)
    .get(&index)
    .copied()
    .unwrap_or(SlotVerdict::Unknown)
}

/// 面积达到阈值且判定为有效的车位，按输入顺序
pub fn valid_slots<'a>(
  detections: &'a [Detection],
  config: &'a ParkingConfig,
) -> impl Iterator<Item = &'a Detection> + 'a {
  let verdicts = classify_all_slots(detections, config);
  verdicts.into_iter().filter_map(move |(index, verdict)| {
    let slot = &detections[index];
    let fraction = config.area_fraction(slot.area());
    if fraction < config.slot_area_threshold {
      trace!("车位 #{} 面积过小: {:.2}%", index, fraction * 100.0);
      return None;
    }
    match verdict {
      SlotVerdict::Valid => Some(slot),
      SlotVerdict::Invalid => {
        trace!("跳过无效车位 #{}: 面积 {:.2}%", index, fraction * 100.0);
        None
      }
      SlotVerdict::Unknown => None,
    }
  })
}
