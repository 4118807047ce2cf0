// 该文件是 Tingche （停车） 项目的一部分。
// src/output/directory_record.rs - 目录记录输出
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use chrono::{DateTime, Datelike, Utc};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::{
  FromUrl, FromUrlWithScheme,
  message::Outbound,
  output::{JsonlFileOutput, JsonlFileOutputError, Publish},
};

#[derive(Error, Debug)]
pub enum DirectoryRecordOutputError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("记录文件错误: {0}")]
  FileError(#[from] JsonlFileOutputError),
}

/// 按日期分目录记录一次运行的全部消息
///
/// 文件位于 `<dir>/YYYY/MM/DD/HH-MM-SS-<run>.jsonl`，`<run>` 为进程号。
/// `?topic=anc/nav_command` 可重复给出，只记录指定主题。
pub struct DirectoryRecordOutput {
  path: PathBuf,
  file: JsonlFileOutput,
  topics: Vec<String>,
}

impl FromUrlWithScheme for DirectoryRecordOutput {
  const SCHEME: &'static str = "folder";
}

impl FromUrl for DirectoryRecordOutput {
  type Error = DirectoryRecordOutputError;

  fn from_url(uri: &url::Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      return Err(DirectoryRecordOutputError::SchemeMismatch);
    }

    let topics = uri
      .query_pairs()
      .filter(|(k, _)| k == "topic")
      .map(|(_, v)| v.into_owned())
      .collect();

    let path = record_path(Path::new(uri.path()), Utc::now(), std::process::id());
    let file = JsonlFileOutput::open(&path, false)?;

    Ok(DirectoryRecordOutput { path, file, topics })
  }
}

fn record_path(directory: &Path, now: DateTime<Utc>, run: u32) -> PathBuf {
  directory
    .join(now.year().to_string())
    .join(format!("{:02}", now.month()))
    .join(format!("{:02}", now.day()))
    .join(format!("{}-{:04X}.jsonl", now.format("%H-%M-%S"), run))
}

impl DirectoryRecordOutput {
  pub fn path(&self) -> &Path {
    &self.path
  }

  fn wants(&self, message: &Outbound) -> bool {
    self.topics.is_empty() || self.topics.iter().any(|t| t == message.topic())
  }
}

impl Publish for DirectoryRecordOutput {
  type Error = DirectoryRecordOutputError;

  fn publish(&mut self, message: &Outbound) -> Result<(), Self::Error> {
    if self.wants(message) {
      self.file.publish(message)?;
    }
    Ok(())
  }
}
