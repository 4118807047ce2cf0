// 该文件是 Tingche （停车） 项目的一部分。
// src/task.rs - 事件循环：输入、任务层与输出
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
  sync::mpsc::{self, Receiver, Sender},
  thread,
  time::{Duration, Instant},
};
use tracing::{debug, info, warn};

use crate::{
  ack::AckKind,
  detection::ingest,
  input::InputEvent,
  machine::{Clock, ManualClock},
  output::Publish,
  supervisor::Supervisor,
};

pub trait Task<I, S, O>: Sized {
  type Error;
  fn run_task(self, input: I, supervisor: S, output: O) -> Result<(), Self::Error>;
}

/// 逐事件驱动任务层，直到输入结束、任务终止、达到帧数或收到中断
///
/// 确认消息先进入队列，每处理一帧前统一取出，队列只有这一个消费者；
/// 其他线程可以通过 [`ack_sender`](Self::ack_sender) 投递确认。
pub struct ContinuousTask {
  frame_number: Option<usize>,
  replay_clock: Option<ManualClock>,
  handle_signals: bool,
  ack_tx: Sender<AckKind>,
  ack_rx: Receiver<AckKind>,
}

impl Default for ContinuousTask {
  fn default() -> Self {
    let (ack_tx, ack_rx) = mpsc::channel();
    Self {
      frame_number: None,
      replay_clock: None,
      handle_signals: false,
      ack_tx,
      ack_rx,
    }
  }
}

impl ContinuousTask {
  pub fn with_frame_number(mut self, frame_number: Option<usize>) -> Self {
    self.frame_number = frame_number;
    self
  }

  /// 帧记录带有时间 `t` 时，用它推进该时钟
  pub fn with_replay_clock(mut self, clock: ManualClock) -> Self {
    self.replay_clock = Some(clock);
    self
  }

  /// 安装 Ctrl-C 处理，每个进程只能安装一次
  pub fn with_signal_handler(mut self, enable: bool) -> Self {
    self.handle_signals = enable;
    self
  }

  pub fn ack_sender(&self) -> Sender<AckKind> {
    self.ack_tx.clone()
  }

  fn install_signal_handler(&self) -> anyhow::Result<Receiver<()>> {
    let (tx, rx) = mpsc::channel();
    if self.handle_signals {
      ctrlc::set_handler(move || {
        info!("收到中断信号，准备退出...");
        let _ = tx.send(());
        thread::spawn(|| {
          thread::sleep(Duration::from_secs(30));
          warn!("强制退出程序");
          std::process::exit(1);
        });
      })?;
    }
    Ok(rx)
  }

  fn deliver_acks<C, O>(&self, supervisor: &mut Supervisor<C>, output: &mut O) -> anyhow::Result<()>
  where
    C: Clock + Clone,
    O: Publish,
    O::Error: std::error::Error + Send + Sync + 'static,
  {
    while let Ok(ack) = self.ack_rx.try_recv() {
      supervisor.on_ack(ack);
    }
    flush(supervisor, output)
  }
}

fn flush<C, O>(supervisor: &mut Supervisor<C>, output: &mut O) -> anyhow::Result<()>
where
  C: Clock + Clone,
  O: Publish,
  O::Error: std::error::Error + Send + Sync + 'static,
{
  for message in supervisor.drain() {
    output.publish(&message)?;
  }
  Ok(())
}

impl<I, C, O> Task<I, Supervisor<C>, O> for ContinuousTask
where
  I: Iterator<Item = InputEvent>,
  C: Clock + Clone,
  O: Publish,
  O::Error: std::error::Error + Send + Sync + 'static,
{
  type Error = anyhow::Error;

  fn run_task(self, input: I, mut supervisor: Supervisor<C>, mut output: O) -> Result<(), Self::Error> {
    info!("开始任务...");
    let stop_rx = self.install_signal_handler()?;
    let min_confidence = supervisor.config().parking.min_confidence;

    supervisor.start();
    flush(&mut supervisor, &mut output)?;

    let mut frame_index = 0usize;
    for event in input {
      match event {
        InputEvent::Ack(raw) => match raw.parse::<AckKind>() {
          Ok(ack) => {
            let _ = self.ack_tx.send(ack);
          }
          Err(err) => warn!("忽略确认: {}", err),
        },
        InputEvent::Frame { detections, t } => {
          self.deliver_acks(&mut supervisor, &mut output)?;

          if let (Some(clock), Some(t)) = (&self.replay_clock, t) {
            if t.is_finite() && t >= 0.0 {
              clock.set(Duration::from_secs_f64(t));
            }
          }

          frame_index += 1;
          let now = Instant::now();
          let detections = ingest(detections, min_confidence);
          let state = supervisor.process_frame(&detections);
          flush(&mut supervisor, &mut output)?;
          debug!(
            "第 {} 帧处理完成 ({} 个目标, {}), 耗时: {:.2?}",
            frame_index,
            detections.len(),
            state,
            now.elapsed()
          );

          if state.is_terminal() {
            info!("任务进入 {} 状态, 退出任务循环", state);
            break;
          }
          if self.frame_number.map(|n| frame_index >= n).unwrap_or(false) {
            info!("达到指定帧数 {}, 退出任务循环", frame_index);
            break;
          }
        }
      }

      if stop_rx.try_recv().is_ok() {
        warn!("中断信号接收，退出任务循环");
        break;
      }
    }

    if !supervisor.state().is_terminal() {
      self.deliver_acks(&mut supervisor, &mut output)?;
    }

    info!("任务完成，共处理 {} 帧", frame_index);
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{
    config::TingcheConfig, detection::Detection, message::Outbound, supervisor::MissionState,
  };

  fn nav(messages: &[Outbound]) -> Vec<String> {
    messages
      .iter()
      .filter_map(|m| match m {
        Outbound::NavCommand(cmd) => Some(cmd.command.as_str().to_string()),
        _ => None,
      })
      .collect()
  }

  #[test]
  fn frame_limit_stops_loop() {
    let events = (0..10).map(|_| InputEvent::Frame {
      detections: vec![],
      t: None,
    });
    let mut out: Vec<Outbound> = Vec::new();
    let sup = Supervisor::with_clock(TingcheConfig::default(), ManualClock::default());
    ContinuousTask::default()
      .with_frame_number(Some(3))
      .run_task(events, sup, &mut out)
      .unwrap();

    let summaries = out
      .iter()
      .filter(|m| matches!(m, Outbound::Detections(_)))
      .count();
    assert_eq!(summaries, 3);
  }

  #[test]
  fn low_confidence_detections_are_dropped() {
    let events = vec![InputEvent::Frame {
      detections: vec![
        Detection::new("cone", 0.2, [0.0, 0.0, 10.0, 10.0]),
        Detection::new("cone", 0.9, [0.0, 0.0, 10.0, 10.0]),
      ],
      t: None,
    }];
    let mut out: Vec<Outbound> = Vec::new();
    let sup = Supervisor::with_clock(TingcheConfig::default(), ManualClock::default());
    ContinuousTask::default()
      .run_task(events.into_iter(), sup, &mut out)
      .unwrap();

    let count = out.iter().find_map(|m| match m {
      Outbound::Detections(s) => Some(s.count),
      _ => None,
    });
    assert_eq!(count, Some(1));
  }

  #[test]
  fn queued_ack_reaches_supervisor_before_next_frame() {
    let events = vec![
      InputEvent::Ack("parking_zone_reached".to_string()),
      InputEvent::Ack("bogus".to_string()),
      InputEvent::Frame {
        detections: vec![],
        t: None,
      },
      InputEvent::Frame {
        detections: vec![],
        t: None,
      },
    ];
    let mut out: Vec<Outbound> = Vec::new();
    let sup = Supervisor::with_clock(TingcheConfig::default(), ManualClock::default());
    ContinuousTask::default()
      .run_task(events.into_iter(), sup, &mut out)
      .unwrap();

    let states: Vec<_> = out
      .iter()
      .filter_map(|m| match m {
        Outbound::State { state, .. } => Some(state.as_str()),
        _ => None,
      })
      .collect();
    assert_eq!(
      states,
      vec![
        MissionState::LaneFollowing.as_str(),
        MissionState::ApproachParking.as_str(),
        MissionState::Parking.as_str(),
      ]
    );
    assert!(nav(&out).is_empty());
  }
}
