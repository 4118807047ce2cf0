// 该文件是 Tingche （停车） 项目的一部分。
// src/input/stdin_input.rs - 标准输入
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::io::StdinLock;

use crate::{
  FromUrlWithScheme,
  input::{EventLines, InputEvent},
};

/// 从标准输入逐行读取事件，格式与回放文件相同
pub struct StdinInput {
  events: EventLines<StdinLock<'static>>,
}

impl Default for StdinInput {
  fn default() -> Self {
    Self {
      events: EventLines::new(std::io::stdin().lock()),
    }
  }
}

impl FromUrlWithScheme for StdinInput {
  const SCHEME: &'static str = "stdin";
}

impl crate::FromUrl for StdinInput {
  type Error = std::convert::Infallible;

  fn from_url(_url: &url::Url) -> Result<Self, Self::Error> {
    Ok(Self::default())
  }
}

impl Iterator for StdinInput {
  type Item = InputEvent;

  fn next(&mut self) -> Option<Self::Item> {
    self.events.next()
  }
}
