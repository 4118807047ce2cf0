// 该文件是 Tingche （停车） 项目的一部分。
// src/input/replay_file.rs - 回放文件输入
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::{
  fs::File,
  io::BufReader,
};

use thiserror::Error;
use tracing::{error, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  input::{EventLines, InputEvent},
};

#[derive(Error, Debug)]
pub enum ReplayFileInputError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
}

/// 按行回放记录文件，每行一个事件
pub struct ReplayFileInput {
  events: EventLines<BufReader<File>>,
}

impl FromUrlWithScheme for ReplayFileInput {
  const SCHEME: &'static str = "replay";
}

impl FromUrl for ReplayFileInput {
  type Error = ReplayFileInputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      error!(
        "URI 方案不匹配: 期望 '{}', 实际 '{}'",
        Self::SCHEME,
        url.scheme()
      );
      return Err(ReplayFileInputError::SchemeMismatch);
    }

    let path = url.path();
    info!("打开回放文件: {}", path);
    let file = File::open(path)?;

    Ok(ReplayFileInput {
      events: EventLines::new(BufReader::new(file)),
    })
  }
}

impl Iterator for ReplayFileInput {
  type Item = InputEvent;

  fn next(&mut self) -> Option<Self::Item> {
    self.events.next()
  }
}
