// 该文件是 Tingche （停车） 项目的一部分。
// src/output/stdout_output.rs - 标准输出
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::io::Write;

use crate::{FromUrlWithScheme, message::Outbound, output::Publish};

/// 每条消息一行 JSON 写到标准输出，日志走标准错误
#[derive(Debug, Default)]
pub struct StdoutOutput;

impl FromUrlWithScheme for StdoutOutput {
  const SCHEME: &'static str = "stdout";
}

impl crate::FromUrl for StdoutOutput {
  type Error = std::convert::Infallible;

  fn from_url(_url: &url::Url) -> Result<Self, Self::Error> {
    Ok(StdoutOutput)
  }
}

impl Publish for StdoutOutput {
  type Error = std::io::Error;

  fn publish(&mut self, message: &Outbound) -> Result<(), Self::Error> {
    let mut out = std::io::stdout().lock();
    writeln!(out, "{}", message.to_line())?;
    out.flush()
  }
}
