// 该文件是 Tingche （停车） 项目的一部分。
// src/debounce.rs - 逐帧信号去抖
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

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebounceStatus {
  /// 已检测到，但连续帧数不足
  Tracking,
  /// 连续检测帧数达到阈值
  ConfirmedFound,
  /// 曾经确认过，本帧丢失但连续丢失帧数不足
  Uncertain,
  /// 曾经确认过，连续丢失帧数达到阈值
  ConfirmedLost,
  /// 从未确认过，本帧也没有检测到
  NotFound,
}

/// 迟滞滤波：把逐帧的布尔观测变成稳定的出现/消失事件
///
/// `was_confirmed` 只会被 [`DebounceTracker::reset`] 清除，
/// 目标身份变化时（例如重新开始一次泊车）必须由持有者显式调用。
#[derive(Debug, Clone)]
pub struct DebounceTracker {
  found_thresh: u32,
  lost_thresh: u32,
  consecutive_found: u32,
  consecutive_lost: u32,
  was_confirmed: bool,
}

impl DebounceTracker {
  pub fn new(found_thresh: u32, lost_thresh: u32) -> Self {
    Self {
      found_thresh,
      lost_thresh,
      consecutive_found: 0,
      consecutive_lost: 0,
      was_confirmed: false,
    }
  }

  pub fn update(&mut self, detected: bool) -> DebounceStatus {
    if detected {
      self.consecutive_found = self.consecutive_found.saturating_add(1);
      self.consecutive_lost = 0;
      if self.consecutive_found >= self.found_thresh {
        self.was_confirmed = true;
        return DebounceStatus::ConfirmedFound;
      }
      DebounceStatus::Tracking
    } else {
      self.consecutive_lost = self.consecutive_lost.saturating_add(1);
      self.consecutive_found = 0;
      if self.was_confirmed && self.consecutive_lost >= self.lost_thresh {
        DebounceStatus::ConfirmedLost
      } else if self.was_confirmed {
        DebounceStatus::Uncertain
      } else {
        DebounceStatus::NotFound
      }
    }
  }

  pub fn reset(&mut self) {
    self.consecutive_found = 0;
    self.consecutive_lost = 0;
    self.was_confirmed = false;
  }

  pub fn is_confirmed(&self) -> bool {
    self.was_confirmed
  }

  pub fn consecutive_found(&self) -> u32 {
    self.consecutive_found
  }

  pub fn consecutive_lost(&self) -> u32 {
    self.consecutive_lost
  }
}
