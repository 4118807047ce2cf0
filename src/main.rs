// 该文件是 Tingche （停车） 项目的一部分。
// src/main.rs - 项目主程序
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

mod args;

use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use tingche::{
  FromUrl, FromUrlWithScheme, Supervisor, TingcheConfig,
  input::{InputWrapper, ReplayFileInput},
  machine::ManualClock,
  output::OutputWrapper,
  task::{ContinuousTask, Task},
};

fn main() -> Result<()> {
  // 标准输出留给消息
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
    .with_writer(std::io::stderr)
    .init();

  let args = args::Args::parse();

  let mut config = match &args.config {
    Some(path) => {
      info!("配置文件: {}", path.display());
      TingcheConfig::load(path)?
    }
    None => TingcheConfig::default(),
  };
  args.apply(&mut config);
  config.validate()?;

  info!("输入来源: {}", args.input);
  info!("输出路径: {}", args.output);

  let input = InputWrapper::from_url(&args.input)?;
  let output = OutputWrapper::from_url(&args.output)?;
  let task = ContinuousTask::default()
    .with_frame_number(args.frame_number)
    .with_signal_handler(true);

  // 回放时按记录时间推进时钟，结果可复现
  if args.input.scheme() == ReplayFileInput::SCHEME {
    let clock = ManualClock::default();
    let supervisor = Supervisor::with_clock(config, clock.clone());
    task
      .with_replay_clock(clock)
      .run_task(input, supervisor, output)?;
  } else {
    task.run_task(input, Supervisor::new(config), output)?;
  }

  Ok(())
}
