// 该文件是 Tingche （停车） 项目的一部分。
// src/output/jsonl_file.rs - JSON Lines 文件输出
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::{
  fs::{File, OpenOptions},
  io::{LineWriter, Write},
  path::Path,
};

use thiserror::Error;
use tracing::info;
use url::Url;

use crate::{FromUrl, FromUrlWithScheme, message::Outbound, output::Publish};

#[derive(Error, Debug)]
pub enum JsonlFileOutputError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
}

/// 追加写入单个文件；`?truncate` 时先清空
pub struct JsonlFileOutput {
  writer: LineWriter<File>,
}

impl FromUrlWithScheme for JsonlFileOutput {
  const SCHEME: &'static str = "jsonl";
}

impl FromUrl for JsonlFileOutput {
  type Error = JsonlFileOutputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(JsonlFileOutputError::SchemeMismatch);
    }
    let truncate = url.query_pairs().any(|(k, _)| k == "truncate");
    Self::open(Path::new(url.path()), truncate)
  }
}

impl JsonlFileOutput {
  pub fn open(path: &Path, truncate: bool) -> Result<Self, JsonlFileOutputError> {
    if let Some(parent) = path.parent() {
      if !parent.as_os_str().is_empty() && !parent.exists() {
        std::fs::create_dir_all(parent)?;
      }
    }

    let mut options = OpenOptions::new();
    options.create(true);
    if truncate {
      options.write(true).truncate(true);
    } else {
      options.append(true);
    }
    let file = options.open(path)?;
    info!("消息记录到文件: {}", path.display());

    Ok(Self {
      writer: LineWriter::new(file),
    })
  }
}

impl Publish for JsonlFileOutput {
  type Error = JsonlFileOutputError;

  fn publish(&mut self, message: &Outbound) -> Result<(), Self::Error> {
    writeln!(self.writer, "{}", message.to_line())?;
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::command::{CommandKind, NavCommand};

  #[test]
  fn appends_one_line_per_message() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("logs").join("run.jsonl");
    let url = Url::parse(&format!("jsonl://{}", path.display())).unwrap();

    {
      let mut output = JsonlFileOutput::from_url(&url).unwrap();
      output
        .publish(&Outbound::NavCommand(NavCommand::new(CommandKind::Stop)))
        .unwrap();
    }
    {
      let mut output = JsonlFileOutput::from_url(&url).unwrap();
      output
        .publish(&Outbound::NavCommand(NavCommand::new(CommandKind::Rotate180)))
        .unwrap();
    }

    let text = std::fs::read_to_string(&path).unwrap();
    let lines: Vec<_> = text.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].contains("\"STOP\""));
    assert!(lines[1].contains("\"ROTATE_180\""));
  }

  #[test]
  fn truncate_query_clears_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("run.jsonl");
    std::fs::write(&path, "old\n").unwrap();
    let url = Url::parse(&format!("jsonl://{}?truncate", path.display())).unwrap();

    let mut output = JsonlFileOutput::from_url(&url).unwrap();
    output
      .publish(&Outbound::NavCommand(NavCommand::new(CommandKind::Stop)))
      .unwrap();
    drop(output);

    let text = std::fs::read_to_string(&path).unwrap();
    assert_eq!(text.lines().count(), 1);
    assert!(!text.contains("old"));
  }
}
