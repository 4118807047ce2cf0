// 该文件是 Tingche （停车） 项目的一部分。
// src/machine.rs - 泊车状态机
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
  cell::Cell,
  fmt,
  rc::Rc,
  time::{Duration, Instant},
};

use serde::Serialize;
use tracing::{Span, debug, error, info, info_span, warn};

use crate::{
  ack::AckKind,
  classify::valid_slots,
  command::{CommandKind, CommandSink, NavCommand, round_to},
  config::ParkingConfig,
  control::AlignmentController,
  debounce::{DebounceStatus, DebounceTracker},
  detection::{Detection, ObjectKind},
};

/// 单调时钟，仅在对准阶段用于计算控制器的时间步长
pub trait Clock {
  fn now(&self) -> Instant;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MonotonicClock;

impl Clock for MonotonicClock {
  fn now(&self) -> Instant {
    Instant::now()
  }
}

/// 手动推进的时钟，用于按记录时间戳回放
///
/// 克隆出的句柄共享同一时间，回放循环推进后状态机立即可见。
#[derive(Debug, Clone)]
pub struct ManualClock {
  origin: Instant,
  offset: Rc<Cell<Duration>>,
}

impl Default for ManualClock {
  fn default() -> Self {
    Self {
      origin: Instant::now(),
      offset: Rc::new(Cell::new(Duration::ZERO)),
    }
  }
}

impl ManualClock {
  pub fn advance(&self, by: Duration) {
    self.offset.set(self.offset.get() + by);
  }

  /// 只能向前设置，早于当前值的时间被忽略
  pub fn set(&self, at: Duration) {
    if at > self.offset.get() {
      self.offset.set(at);
    }
  }
}

impl Clock for ManualClock {
  fn now(&self) -> Instant {
    self.origin + self.offset.get()
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ParkingState {
  /// 摄像头右转，车辆沿车道前进，寻找有效车位
  Scan,
  /// 有效车位移出视野，继续滑行若干帧
  Coasting,
  WaitStopAck,
  WaitTurnAck,
  /// 车头朝向车位，闭环横向对准
  Align,
  WaitEnterAck,
  Parked,
  WaitRotateAck,
  Complete,
  Failed,
}

impl ParkingState {
  pub fn as_str(&self) -> &'static str {
    match self {
      ParkingState::Scan => "SCAN",
      ParkingState::Coasting => "COASTING",
      ParkingState::WaitStopAck => "WAIT_STOP_ACK",
      ParkingState::WaitTurnAck => "WAIT_TURN_ACK",
      ParkingState::Align => "ALIGN",
      ParkingState::WaitEnterAck => "WAIT_ENTER_ACK",
      ParkingState::Parked => "PARKED",
      ParkingState::WaitRotateAck => "WAIT_ROTATE_ACK",
      ParkingState::Complete => "COMPLETE",
      ParkingState::Failed => "FAILED",
    }
  }

  pub fn is_terminal(&self) -> bool {
    matches!(self, ParkingState::Complete | ParkingState::Failed)
  }
}

impl fmt::Display for ParkingState {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// 纯视觉泊车状态机
///
/// 每帧调用 [`process_frame`](Self::process_frame)，执行端完成指令后调用
/// [`on_ack`](Self::on_ack)，停稳后由持有者调用 [`trigger_exit`](Self::trigger_exit)。
/// 三个入口必须在同一个串行循环中调用。
///
/// 状态流转：
///
/// ```text
/// SCAN → COASTING → WAIT_STOP_ACK → WAIT_TURN_ACK → ALIGN
///      → WAIT_ENTER_ACK → PARKED → WAIT_ROTATE_ACK → COMPLETE
/// ```
///
/// 对准阶段超出尝试次数且看不到目标时进入 `FAILED`。
pub struct ParkingStateMachine<S, C = MonotonicClock> {
  config: ParkingConfig,
  state: ParkingState,
  sink: S,
  clock: C,
  slot_tracker: DebounceTracker,
  controller: AlignmentController,
  coast_frames: u32,
  align_attempts: u32,
  last_align_tick: Option<Instant>,
  last_valid_slot: Option<Detection>,
  span: Span,
}

impl<S: CommandSink> ParkingStateMachine<S, MonotonicClock> {
  pub fn new(config: ParkingConfig, sink: S) -> Self {
    Self::with_clock(config, sink, MonotonicClock)
  }
}

impl<S: CommandSink, C: Clock> ParkingStateMachine<S, C> {
  pub fn with_clock(config: ParkingConfig, sink: S, clock: C) -> Self {
    let slot_tracker = DebounceTracker::new(config.debounce.found_frames, config.debounce.lost_frames);
    let controller = AlignmentController::from_config(&config.alignment);
    let span = info_span!("parking");
    span.in_scope(|| info!("泊车状态机已创建, 状态: {}", ParkingState::Scan));

    Self {
      config,
      state: ParkingState::Scan,
      sink,
      clock,
      slot_tracker,
      controller,
      coast_frames: 0,
      align_attempts: 0,
      last_align_tick: None,
      last_valid_slot: None,
      span,
    }
  }

  /// 处理一帧检测结果，返回处理后的状态
  ///
  /// 检测结果应已按置信度过滤。
  pub fn process_frame(&mut self, detections: &[Detection]) -> ParkingState {
    let span = self.span.clone();
    let _enter = span.enter();

    match self.state {
      ParkingState::Scan => self.handle_scan(detections),
      ParkingState::Coasting => self.handle_coasting(detections),
      ParkingState::Align => self.handle_align(detections),
      // 等待确认的状态只由 on_ack 推进
      ParkingState::WaitStopAck
      | ParkingState::WaitTurnAck
      | ParkingState::WaitEnterAck
      | ParkingState::Parked
      | ParkingState::WaitRotateAck
      | ParkingState::Complete
      | ParkingState::Failed => {}
    }

    self.state
  }

  /// 执行端确认；与当前等待的确认不匹配时不做任何事
  pub fn on_ack(&mut self, ack: AckKind) {
    let span = self.span.clone();
    let _enter = span.enter();

    match (self.state, ack) {
      (ParkingState::WaitStopAck, AckKind::Stop) => {
        info!("确认: 已停车, 发送右转 90°");
        self.emit(NavCommand::new(CommandKind::PanCameraCenter));
        self.emit(NavCommand::new(CommandKind::TurnRight90));
        self.transition(ParkingState::WaitTurnAck);
      }
      (ParkingState::WaitTurnAck, AckKind::TurnComplete) => {
        info!("确认: 转向完成, 开始对准");
        self.controller.reset();
        self.align_attempts = 0;
        self.last_align_tick = None;
        self.transition(ParkingState::Align);
      }
      (ParkingState::WaitEnterAck, AckKind::EnterComplete) => {
        info!("确认: 已驶入车位");
        self.emit(NavCommand::new(CommandKind::Stop));
        self.transition(ParkingState::Parked);
      }
      (ParkingState::WaitRotateAck, AckKind::RotateComplete) => {
        info!("确认: 旋转完成, 泊车流程结束");
        self.emit(NavCommand::new(CommandKind::ResumeLaneTracking));
        self.transition(ParkingState::Complete);
      }
      (state, ack) => {
        debug!("忽略确认 {} (当前状态 {})", ack, state);
      }
    }
  }

  /// 解析字符串形式的确认，无法识别时忽略
  pub fn on_ack_str(&mut self, ack: &str) {
    match ack.parse::<AckKind>() {
      Ok(ack) => self.on_ack(ack),
      Err(e) => {
        let _enter = self.span.enter();
        debug!("忽略确认: {}", e);
      }
    }
  }

  /// 开始驶出；只在 PARKED 状态有效
  pub fn trigger_exit(&mut self) {
    let span = self.span.clone();
    let _enter = span.enter();

    if self.state == ParkingState::Parked {
      info!("开始驶出, 旋转 180°");
      self.emit(NavCommand::new(CommandKind::Rotate180));
      self.transition(ParkingState::WaitRotateAck);
    } else {
      debug!("忽略驶出请求 (当前状态 {})", self.state);
    }
  }

  pub fn state(&self) -> ParkingState {
    self.state
  }

  pub fn config(&self) -> &ParkingConfig {
    &self.config
  }

  pub fn align_attempts(&self) -> u32 {
    self.align_attempts
  }

  pub fn coast_frames(&self) -> u32 {
    self.coast_frames
  }

  /// 最近一次看到的有效车位，仅用于诊断
  pub fn last_valid_slot(&self) -> Option<&Detection> {
    self.last_valid_slot.as_ref()
  }

  pub fn slot_tracker(&self) -> &DebounceTracker {
    &self.slot_tracker
  }

  pub fn sink(&self) -> &S {
    &self.sink
  }

  pub fn sink_mut(&mut self) -> &mut S {
    &mut self.sink
  }

  pub fn into_sink(self) -> S {
    self.sink
  }

  fn handle_scan(&mut self, detections: &[Detection]) {
    let found = valid_slots(detections, &self.config).next().cloned();
    if let Some(slot) = &found {
      debug!(
        "有效车位: 中心=({:.0},{:.0}) 面积={:.2}%",
        slot.center_x(),
        slot.center_y(),
        self.config.area_fraction(slot.area()) * 100.0
      );
    }

    let detected = found.is_some();
    if detected {
      self.last_valid_slot = found;
    }

    match self.slot_tracker.update(detected) {
      DebounceStatus::ConfirmedFound
        if self.slot_tracker.consecutive_found() == self.config.debounce.found_frames =>
      {
        info!("有效车位已确认");
      }
      DebounceStatus::ConfirmedLost => {
        info!("有效车位移出视野, 开始滑行计数");
        self.coast_frames = 0;
        self.transition(ParkingState::Coasting);
      }
      _ => {}
    }
  }

  fn handle_coasting(&mut self, detections: &[Detection]) {
    if valid_slots(detections, &self.config).next().is_some() {
      info!("滑行中重新检测到有效车位, 回到 SCAN");
      self.slot_tracker.reset();
      self.transition(ParkingState::Scan);
      return;
    }

    self.coast_frames += 1;
    if self.coast_frames >= self.config.debounce.coast_frames {
      info!("滑行结束 ({} 帧), 发送 STOP", self.coast_frames);
      self.emit(NavCommand::new(CommandKind::Stop));
      self.transition(ParkingState::WaitStopAck);
    }
  }

  fn handle_align(&mut self, detections: &[Detection]) {
    let now = self.clock.now();
    let dt = match self.last_align_tick {
      Some(last) => now.duration_since(last).as_secs_f32(),
      None => self.config.alignment.default_dt_secs,
    };
    self.last_align_tick = Some(now);

    let max_attempts = self.config.alignment.max_attempts;
    self.align_attempts += 1;

    let Some(target) = self.select_target(detections) else {
      warn!("对准: 看不到目标 (第 {} 次)", self.align_attempts);
      if self.align_attempts >= max_attempts {
        error!("对准失败: 超过最大次数仍未看到目标");
        self.emit(NavCommand::new(CommandKind::Stop));
        self.transition(ParkingState::Failed);
      }
      return;
    };

    let error_px = target.center_x() - self.config.frame_center_x();

    if error_px.abs() <= self.config.alignment.tolerance_px {
      info!("已对准, 误差 {:.1}px, 驶入车位", error_px);
      self.enter_slot();
      return;
    }

    let correction = self.controller.compute(error_px, dt);
    let kind = if correction > 0.0 {
      CommandKind::AlignRight
    } else {
      CommandKind::AlignLeft
    };
    self.emit(
      NavCommand::new(kind)
        .with_magnitude(correction.abs().min(1.0))
        .with_metadata("error_px", round_to(error_px as f64, 1)),
    );

    if self.align_attempts >= max_attempts {
      warn!("对准次数已达上限, 直接驶入车位");
      self.enter_slot();
    }
  }

  /// 优先选面积最大的车位，没有车位时退而选面积最大的 P 牌
  fn select_target<'a>(&self, detections: &'a [Detection]) -> Option<&'a Detection> {
    let largest = |kind: ObjectKind| {
      detections
        .iter()
        .filter(|det| self.config.classes.is(&det.class_name, kind))
        .reduce(|best, det| if det.area() > best.area() { det } else { best })
    };
    largest(ObjectKind::ParkingSlot).or_else(|| largest(ObjectKind::DirectionSign))
  }

  fn enter_slot(&mut self) {
    self.emit(NavCommand::new(CommandKind::Stop));
    self.controller.reset();
    self.emit(NavCommand::new(CommandKind::EnterSlot));
    self.transition(ParkingState::WaitEnterAck);
  }

  fn transition(&mut self, next: ParkingState) {
    info!("泊车状态: {} → {}", self.state, next);
    self.state = next;
  }

  fn emit(&mut self, command: NavCommand) {
    info!("  >> NAV: {}", command.to_json());
    self.sink.send(command);
  }
}
