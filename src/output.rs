// 该文件是 Tingche （停车） 项目的一部分。
// src/output.rs - 输出定义
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use crate::{FromUrl, FromUrlWithScheme, message::Outbound};
use thiserror::Error;
use url::Url;

pub trait Publish: Sized {
  type Error;
  fn publish(&mut self, message: &Outbound) -> Result<(), Self::Error>;
}

mod jsonl_file;
mod stdout_output;
pub use self::jsonl_file::{JsonlFileOutput, JsonlFileOutputError};
pub use self::stdout_output::StdoutOutput;

#[cfg(feature = "directory_record")]
mod directory_record;
#[cfg(feature = "directory_record")]
pub use self::directory_record::{DirectoryRecordOutput, DirectoryRecordOutputError};

#[derive(Error, Debug)]
pub enum OutputError {
  #[error("标准输出错误: {0}")]
  StdoutError(#[from] std::io::Error),
  #[error("JSONL 文件输出错误: {0}")]
  JsonlFileOutputError(#[from] JsonlFileOutputError),
  #[cfg(feature = "directory_record")]
  #[error("目录记录输出错误: {0}")]
  DirectoryRecordOutputError(#[from] DirectoryRecordOutputError),
  #[error("URI 方案不匹配")]
  SchemeMismatch,
}

pub enum OutputWrapper {
  Stdout(StdoutOutput),
  JsonlFile(JsonlFileOutput),
  #[cfg(feature = "directory_record")]
  DirectoryRecord(DirectoryRecordOutput),
}

impl FromUrl for OutputWrapper {
  type Error = OutputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    match url.scheme() {
      StdoutOutput::SCHEME => Ok(OutputWrapper::Stdout(StdoutOutput::default())),
      JsonlFileOutput::SCHEME => {
        let output = JsonlFileOutput::from_url(url)?;
        Ok(OutputWrapper::JsonlFile(output))
      }
      #[cfg(feature = "directory_record")]
      DirectoryRecordOutput::SCHEME => {
        let output = DirectoryRecordOutput::from_url(url)?;
        Ok(OutputWrapper::DirectoryRecord(output))
      }
      _ => Err(OutputError::SchemeMismatch),
    }
  }
}

impl Publish for OutputWrapper {
  type Error = OutputError;

  fn publish(&mut self, message: &Outbound) -> Result<(), Self::Error> {
    match self {
      OutputWrapper::Stdout(output) => output.publish(message).map_err(OutputError::from),
      OutputWrapper::JsonlFile(output) => output.publish(message).map_err(OutputError::from),
      #[cfg(feature = "directory_record")]
      OutputWrapper::DirectoryRecord(output) => output.publish(message).map_err(OutputError::from),
    }
  }
}

impl<P: Publish> Publish for &mut P {
  type Error = P::Error;

  fn publish(&mut self, message: &Outbound) -> Result<(), Self::Error> {
    (**self).publish(message)
  }
}

/// 测试和嵌入场景下直接收集消息
impl Publish for Vec<Outbound> {
  type Error = std::convert::Infallible;

  fn publish(&mut self, message: &Outbound) -> Result<(), Self::Error> {
    self.push(message.clone());
    Ok(())
  }
}
