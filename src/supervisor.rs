// 该文件是 Tingche （停车） 项目的一部分。
// src/supervisor.rs - 任务层：车道跟随、泊车与结束
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

use std::fmt;

use tracing::{debug, error, info};

use crate::{
  ack::AckKind,
  classify::{SlotVerdict, classify_all_slots},
  command::{CommandKind, NavCommand, round_to},
  config::TingcheConfig,
  debounce::{DebounceStatus, DebounceTracker},
  detection::{Detection, ObjectKind},
  machine::{Clock, MonotonicClock, ParkingState, ParkingStateMachine},
  message::{DetectionSummary, Outbound, wall_timestamp},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MissionState {
  Init,
  /// 车道跟随由下位机完成，这里只观察减速带
  LaneFollowing,
  /// 到达泊车区域，下一帧创建新的泊车状态机
  ApproachParking,
  /// 逐帧交给泊车状态机
  Parking,
  Finished,
  Error,
}

impl MissionState {
  pub fn as_str(&self) -> &'static str {
    match self {
      MissionState::Init => "INIT",
      MissionState::LaneFollowing => "LANE_FOLLOWING",
      MissionState::ApproachParking => "APPROACH_PARKING",
      MissionState::Parking => "PARKING",
      MissionState::Finished => "FINISHED",
      MissionState::Error => "ERROR",
    }
  }

  pub fn is_terminal(&self) -> bool {
    matches!(self, MissionState::Finished | MissionState::Error)
  }
}

impl fmt::Display for MissionState {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// 任务层状态机
///
/// 每次泊车尝试都会新建一个 [`ParkingStateMachine`]，其指令先写入缓冲，
/// 调用结束后连同状态、检测摘要一起放入发件箱，由调用方通过
/// [`drain`](Self::drain) 取走并发布。
pub struct Supervisor<C = MonotonicClock> {
  config: TingcheConfig,
  state: MissionState,
  clock: C,
  parking: Option<ParkingStateMachine<Vec<NavCommand>, C>>,
  bumper_tracker: DebounceTracker,
  parked_frames: u32,
  frame_id: u64,
  outbox: Vec<Outbound>,
}

impl Supervisor<MonotonicClock> {
  pub fn new(config: TingcheConfig) -> Self {
    Self::with_clock(config, MonotonicClock)
  }
}

impl<C: Clock + Clone> Supervisor<C> {
  pub fn with_clock(config: TingcheConfig, clock: C) -> Self {
    let bumper_tracker = DebounceTracker::new(
      config.supervisor.bumper_found_frames,
      config.supervisor.bumper_lost_frames,
    );
    Self {
      config,
      state: MissionState::Init,
      clock,
      parking: None,
      bumper_tracker,
      parked_frames: 0,
      frame_id: 0,
      outbox: Vec::new(),
    }
  }

  pub fn start(&mut self) {
    if self.state == MissionState::Init {
      self.set_state(MissionState::LaneFollowing);
    }
  }

  pub fn state(&self) -> MissionState {
    self.state
  }

  pub fn config(&self) -> &TingcheConfig {
    &self.config
  }

  pub fn parking_state(&self) -> Option<ParkingState> {
    self.parking.as_ref().map(|machine| machine.state())
  }

  pub fn frame_id(&self) -> u64 {
    self.frame_id
  }

  /// 取走待发布的消息
  pub fn drain(&mut self) -> Vec<Outbound> {
    std::mem::take(&mut self.outbox)
  }

  pub fn process_frame(&mut self, detections: &[Detection]) -> MissionState {
    self.frame_id += 1;
    let frame_area = self.config.parking.frame_area();
    self.outbox.push(Outbound::Detections(DetectionSummary::new(
      self.frame_id,
      wall_timestamp(),
      self.state.as_str(),
      detections,
      frame_area,
    )));

    match self.state {
      MissionState::LaneFollowing => self.handle_lane_following(detections),
      MissionState::ApproachParking => self.handle_approach(),
      MissionState::Parking => self.handle_parking(detections),
      MissionState::Init | MissionState::Finished | MissionState::Error => {}
    }

    self.state
  }

  pub fn on_ack(&mut self, ack: AckKind) {
    if !self.config.supervisor.enable_ack {
      debug!("确认处理已关闭, 忽略 {}", ack);
      return;
    }
    info!("收到执行端确认: {}", ack);

    if ack == AckKind::ParkingZoneReached && self.state == MissionState::LaneFollowing {
      info!("已到达泊车区域, 开始接近");
      self.set_state(MissionState::ApproachParking);
    }

    if self.state == MissionState::Parking {
      if let Some(machine) = self.parking.as_mut() {
        machine.on_ack(ack);
      }
      self.flush_parking();
    }
  }

  fn handle_lane_following(&mut self, detections: &[Detection]) {
    let parking = &self.config.parking;
    let threshold = self.config.supervisor.bumper_area_threshold;
    let bumper = detections.iter().find(|det| {
      parking.classes.is(&det.class_name, ObjectKind::Bumper)
        && parking.area_fraction(det.area()) >= threshold
    });

    let status = self.bumper_tracker.update(bumper.is_some());
    if let (DebounceStatus::ConfirmedFound, Some(b)) = (status, bumper) {
      if self.bumper_tracker.consecutive_found() == self.config.supervisor.bumper_found_frames {
        let area_pct = parking.area_fraction(b.area());
        info!("确认检测到减速带 (面积 {:.4})", area_pct);
        let command = NavCommand::new(CommandKind::BumperDetected)
          .with_metadata("center_x", round_to(b.center_x() as f64, 1))
          .with_metadata("center_y", round_to(b.center_y() as f64, 1))
          .with_metadata("area_pct", round_to(area_pct as f64, 4));
        self.outbox.push(Outbound::NavCommand(command));
      }
    }

    if let Some(min_area) = self.config.supervisor.auto_approach_area {
      let verdicts = classify_all_slots(detections, parking);
      let large_valid = verdicts.iter().any(|(index, verdict)| {
        *verdict == SlotVerdict::Valid && parking.area_fraction(detections[*index].area()) >= min_area
      });
      if large_valid {
        info!("有效车位面积超过 {:.0}%, 自动开始泊车", min_area * 100.0);
        self.set_state(MissionState::ApproachParking);
      }
    }
  }

  fn handle_approach(&mut self) {
    info!("初始化泊车状态机");
    self.parking = Some(ParkingStateMachine::with_clock(
      self.config.parking.clone(),
      Vec::new(),
      self.clock.clone(),
    ));
    self.parked_frames = 0;
    self.set_state(MissionState::Parking);
  }

  fn handle_parking(&mut self, detections: &[Detection]) {
    let Some(machine) = self.parking.as_mut() else {
      error!("PARKING 状态下没有泊车状态机");
      self.set_state(MissionState::Error);
      return;
    };

    if machine.process_frame(detections) == ParkingState::Parked {
      self.parked_frames += 1;
      if self.parked_frames >= self.config.supervisor.exit_delay_frames {
        info!("已泊入 {} 帧, 开始驶出", self.parked_frames);
        machine.trigger_exit();
      }
    }
    self.flush_parking();
  }

  /// 把泊车状态机产生的指令移入发件箱，并处理终止状态
  fn flush_parking(&mut self) {
    let Some(machine) = self.parking.as_mut() else {
      return;
    };
    self
      .outbox
      .extend(machine.sink_mut().drain(..).map(Outbound::NavCommand));

    match machine.state() {
      ParkingState::Complete => {
        info!("泊车完成");
        self.set_state(MissionState::Finished);
      }
      ParkingState::Failed => {
        error!("泊车失败");
        self.set_state(MissionState::Error);
      }
      _ => {}
    }
  }

  fn set_state(&mut self, next: MissionState) {
    info!("任务状态: {} → {}", self.state, next);
    self.state = next;
    self.outbox.push(Outbound::State {
      state: next.as_str().to_string(),
      timestamp: wall_timestamp(),
    });
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::machine::ManualClock;

  fn supervisor(config: TingcheConfig) -> Supervisor<ManualClock> {
    let mut sup = Supervisor::with_clock(config, ManualClock::default());
    sup.start();
    sup.drain();
    sup
  }

  fn nav_commands(messages: &[Outbound]) -> Vec<NavCommand> {
    messages
      .iter()
      .filter_map(|msg| match msg {
        Outbound::NavCommand(cmd) => Some(cmd.clone()),
        _ => None,
      })
      .collect()
  }

  fn states(messages: &[Outbound]) -> Vec<String> {
    messages
      .iter()
      .filter_map(|msg| match msg {
        Outbound::State { state, .. } => Some(state.clone()),
        _ => None,
      })
      .collect()
  }

  #[test]
  fn start_publishes_lane_following() {
    let mut sup = Supervisor::with_clock(TingcheConfig::default(), ManualClock::default());
    assert_eq!(sup.state(), MissionState::Init);
    sup.start();
    assert_eq!(sup.state(), MissionState::LaneFollowing);
    assert_eq!(states(&sup.drain()), vec!["LANE_FOLLOWING"]);
  }

  #[test]
  fn every_frame_publishes_summary() {
    let mut sup = supervisor(TingcheConfig::default());
    sup.process_frame(&[]);
    let out = sup.drain();
    assert_eq!(out.len(), 1);
    match &out[0] {
      Outbound::Detections(summary) => {
        assert_eq!(summary.frame_id, 1);
        assert_eq!(summary.state, "LANE_FOLLOWING");
        assert_eq!(summary.count, 0);
      }
      other => panic!("unexpected message: {:?}", other),
    }
  }

  #[test]
  fn bumper_is_reported_once_per_streak() {
    let mut sup = supervisor(TingcheConfig::default());
    // 200x200 占 640x640 的 9.8%
    let bumper = vec![Detection::new("bumper", 0.9, [220.0, 400.0, 420.0, 600.0])];
    let mut sent = Vec::new();
    for _ in 0..6 {
      sup.process_frame(&bumper);
      sent.extend(nav_commands(&sup.drain()));
    }
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].command, CommandKind::BumperDetected);
    assert_eq!(sent[0].metadata["center_x"], serde_json::json!(320.0));
    assert_eq!(sent[0].metadata["area_pct"], serde_json::json!(0.0977));
  }

  #[test]
  fn small_bumper_is_ignored() {
    let mut sup = supervisor(TingcheConfig::default());
    let bumper = vec![Detection::new("bumper", 0.9, [0.0, 0.0, 50.0, 50.0])];
    for _ in 0..6 {
      sup.process_frame(&bumper);
    }
    assert!(nav_commands(&sup.drain()).is_empty());
  }

  #[test]
  fn zone_ack_starts_parking_on_next_frame() {
    let mut sup = supervisor(TingcheConfig::default());
    sup.on_ack(AckKind::ParkingZoneReached);
    assert_eq!(sup.state(), MissionState::ApproachParking);
    assert!(sup.parking_state().is_none());
    sup.process_frame(&[]);
    assert_eq!(sup.state(), MissionState::Parking);
    assert_eq!(sup.parking_state(), Some(ParkingState::Scan));
    assert_eq!(
      states(&sup.drain()),
      vec!["APPROACH_PARKING", "PARKING"]
    );
  }

  #[test]
  fn acks_ignored_when_disabled() {
    let mut config = TingcheConfig::default();
    config.supervisor.enable_ack = false;
    let mut sup = supervisor(config);
    sup.on_ack(AckKind::ParkingZoneReached);
    assert_eq!(sup.state(), MissionState::LaneFollowing);
  }

  #[test]
  fn auto_approach_on_large_valid_slot() {
    let mut config = TingcheConfig::default();
    config.supervisor.auto_approach_area = Some(0.1);
    let mut sup = supervisor(config);
    let frame = vec![
      Detection::new("parking_slot", 0.9, [100.0, 300.0, 400.0, 600.0]),
      Detection::new("parking_signboard", 0.9, [230.0, 200.0, 270.0, 280.0]),
    ];
    sup.process_frame(&frame);
    assert_eq!(sup.state(), MissionState::ApproachParking);
  }
}
