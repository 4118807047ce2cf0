// 该文件是 Tingche （停车） 项目的一部分。
// src/args.rs - 项目参数配置
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::path::PathBuf;

use clap::Parser;
use url::Url;

use tingche::TingcheConfig;

/// Tingche 泊车决策层
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// TOML 配置文件，缺省时使用内置默认值
  #[arg(long, env = "TINGCHE_CONFIG", value_name = "FILE")]
  pub config: Option<PathBuf>,

  /// 事件来源
  /// 支持格式:
  /// - 回放文件: replay:///path/to/run.jsonl
  /// - 标准输入: stdin:
  #[arg(long, env = "TINGCHE_INPUT", default_value = "stdin:", value_name = "SOURCE")]
  pub input: Url,

  /// 消息输出
  /// 支持格式:
  /// - 标准输出: stdout:
  /// - 单个文件: jsonl:///path/to/out.jsonl
  /// - 按日期记录: folder:///path/to/records
  #[arg(long, env = "TINGCHE_OUTPUT", default_value = "stdout:", value_name = "OUTPUT")]
  pub output: Url,

  /// 最大处理帧数，缺省不限制
  #[arg(long, value_name = "FRAME_NUMBER")]
  pub frame_number: Option<usize>,

  /// 置信度阈值 (0.0 - 1.0)
  #[arg(long, env = "TINGCHE_MIN_CONFIDENCE", value_name = "THRESHOLD")]
  pub min_confidence: Option<f32>,

  /// 车位最小面积占比 (0.0 - 1.0)
  #[arg(long, env = "TINGCHE_SLOT_AREA_THRESHOLD", value_name = "FRACTION")]
  pub slot_area_threshold: Option<f32>,

  /// 对准容差（像素）
  #[arg(long, env = "TINGCHE_TOLERANCE_PX", value_name = "PIXELS")]
  pub tolerance_px: Option<f32>,

  /// 对准最大次数
  #[arg(long, env = "TINGCHE_MAX_ATTEMPTS", value_name = "COUNT")]
  pub max_attempts: Option<u32>,

  /// 有效车位面积超过该占比时自动开始泊车
  #[arg(long, env = "TINGCHE_AUTO_APPROACH_AREA", value_name = "FRACTION")]
  pub auto_approach_area: Option<f32>,

  /// 忽略执行端确认
  #[arg(long, env = "TINGCHE_NO_ACK")]
  pub no_ack: bool,
}

impl Args {
  /// 命令行参数覆盖配置文件
  pub fn apply(&self, config: &mut TingcheConfig) {
    if let Some(v) = self.min_confidence {
      config.parking.min_confidence = v;
    }
    if let Some(v) = self.slot_area_threshold {
      config.parking.slot_area_threshold = v;
    }
    if let Some(v) = self.tolerance_px {
      config.parking.alignment.tolerance_px = v;
    }
    if let Some(v) = self.max_attempts {
      config.parking.alignment.max_attempts = v;
    }
    if self.auto_approach_area.is_some() {
      config.supervisor.auto_approach_area = self.auto_approach_area;
    }
    if self.no_ack {
      config.supervisor.enable_ack = false;
    }
  }
}
