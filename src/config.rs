// 该文件是 Tingche （停车） 项目的一部分。
// src/config.rs - 配置加载
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

use std::path::Path;

use serde::Deserialize;
use thiserror::Error;
use tracing::info;

use crate::detection::ObjectKind;

#[derive(Error, Debug)]
pub enum ConfigError {
  #[error("读取配置文件失败: {0}")]
  IoError(#[from] std::io::Error),
  #[error("配置文件解析错误: {0}")]
  ParseError(#[from] toml::de::Error),
  #[error("配置项无效: {0}")]
  Invalid(String),
}

/// 完整配置，对应 TOML 文件中的 `[parking]` 与 `[supervisor]` 两节
#[derive(Clone, Debug, Default, Deserialize)]
pub struct TingcheConfig {
  #[serde(default)]
  pub parking: ParkingConfig,
  #[serde(default)]
  pub supervisor: SupervisorConfig,
}

impl TingcheConfig {
  pub fn load(path: &Path) -> Result<Self, ConfigError> {
    info!("加载配置文件: {}", path.display());
    let content = std::fs::read_to_string(path)?;
    Self::from_toml(&content)
  }

  pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
    let config: TingcheConfig = toml::from_str(content)?;
    config.validate()?;
    Ok(config)
  }

  pub fn validate(&self) -> Result<(), ConfigError> {
    self.parking.validate()?;
    self.supervisor.validate()
  }
}

/// 泊车状态机的全部可调参数，一次加载后只读
#[derive(Clone, Debug, Deserialize)]
pub struct ParkingConfig {
  /// 检测置信度下限
  #[serde(default = "default_min_confidence")]
  pub min_confidence: f32,
  #[serde(default)]
  pub classes: ClassNames,
  /// 车位最小面积（占整帧面积的比例）
  #[serde(default = "default_slot_area_threshold")]
  pub slot_area_threshold: f32,
  /// P 牌底边允许高出车位上沿的像素数
  #[serde(default = "default_sign_proximity_px")]
  pub sign_proximity_px: f32,
  #[serde(default)]
  pub debounce: DebounceConfig,
  #[serde(default)]
  pub alignment: AlignmentConfig,
  #[serde(default)]
  pub frame: FrameConfig,
}

/// 模型类别名称，必须与检测模型的标签一致
#[derive(Clone, Debug, Deserialize)]
pub struct ClassNames {
  #[serde(default = "default_class_parking_slot")]
  pub parking_slot: String,
  #[serde(default = "default_class_direction_sign")]
  pub direction_sign: String,
  #[serde(default = "default_class_restricted_sign")]
  pub restricted_sign: String,
  #[serde(default = "default_class_obstruction_cone")]
  pub obstruction_cone: String,
  #[serde(default = "default_class_bumper")]
  pub bumper: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct DebounceConfig {
  /// 连续检测到多少帧视为确认出现
  #[serde(default = "default_found_frames")]
  pub found_frames: u32,
  /// 确认后连续丢失多少帧视为确认消失
  #[serde(default = "default_lost_frames")]
  pub lost_frames: u32,
  /// 车位消失后继续滑行的帧数
  #[serde(default = "default_coast_frames")]
  pub coast_frames: u32,
}

#[derive(Clone, Debug, Deserialize)]
pub struct AlignmentConfig {
  #[serde(default = "default_kp")]
  pub kp: f32,
  #[serde(default = "default_ki")]
  pub ki: f32,
  /// 积分项限幅（抗饱和）
  #[serde(default = "default_max_integral")]
  pub max_integral: f32,
  /// 输出限幅，归一化幅度
  #[serde(default = "default_max_output")]
  pub max_output: f32,
  /// 距画面中心的容许像素误差
  #[serde(default = "default_tolerance_px")]
  pub tolerance_px: f32,
  /// 对准阶段最多处理的帧数
  #[serde(default = "default_max_attempts")]
  pub max_attempts: u32,
  /// 进入对准后第一帧使用的时间步长（秒）
  #[serde(default = "default_dt_secs")]
  pub default_dt_secs: f32,
}

#[derive(Clone, Debug, Deserialize)]
pub struct FrameConfig {
  #[serde(default = "default_frame_width")]
  pub width: u32,
  #[serde(default = "default_frame_height")]
  pub height: u32,
}

/// 任务层（车道跟随 / 泊车 / 结束）的参数
#[derive(Clone, Debug, Deserialize)]
pub struct SupervisorConfig {
  /// 减速带最小面积（占整帧面积的比例）
  #[serde(default = "default_bumper_area_threshold")]
  pub bumper_area_threshold: f32,
  #[serde(default = "default_bumper_found_frames")]
  pub bumper_found_frames: u32,
  #[serde(default = "default_bumper_lost_frames")]
  pub bumper_lost_frames: u32,
  /// 是否处理来自执行端的确认消息
  #[serde(default = "default_enable_ack")]
  pub enable_ack: bool,
  /// 泊入后等待多少帧再驶出
  #[serde(default = "default_exit_delay_frames")]
  pub exit_delay_frames: u32,
  /// 有效车位面积超过该比例时直接开始泊车，不等待 parking_zone_reached
  #[serde(default)]
  pub auto_approach_area: Option<f32>,
}

impl ClassNames {
  pub fn kind_of(&self, class_name: &str) -> Option<ObjectKind> {
    if class_name == self.parking_slot {
      Some(ObjectKind::ParkingSlot)
    } else if class_name == self.direction_sign {
      Some(ObjectKind::DirectionSign)
    } else if class_name == self.restricted_sign {
      Some(ObjectKind::RestrictedSign)
    } else if class_name == self.obstruction_cone {
      Some(ObjectKind::ObstructionCone)
    } else if class_name == self.bumper {
      Some(ObjectKind::Bumper)
    } else {
      None
    }
  }

  pub fn is(&self, class_name: &str, kind: ObjectKind) -> bool {
    self.kind_of(class_name) == Some(kind)
  }
}

impl ParkingConfig {
  pub fn frame_area(&self) -> f32 {
    self.frame.width as f32 * self.frame.height as f32
  }

  pub fn frame_center_x(&self) -> f32 {
    (self.frame.width / 2) as f32
  }

  /// 检测框面积占整帧的比例
  pub fn area_fraction(&self, area: f32) -> f32 {
    area / self.frame_area()
  }

  pub fn validate(&self) -> Result<(), ConfigError> {
    if !(0.0..=1.0).contains(&self.min_confidence) {
      return Err(ConfigError::Invalid(format!(
        "min_confidence 必须在 [0, 1] 内, 实际为 {}",
        self.min_confidence
      )));
    }
    if self.frame.width == 0 || self.frame.height == 0 {
      return Err(ConfigError::Invalid("帧尺寸不能为 0".to_string()));
    }
    if self.debounce.found_frames == 0 || self.debounce.lost_frames == 0 {
      return Err(ConfigError::Invalid("去抖帧数必须大于 0".to_string()));
    }
    if self.alignment.max_attempts == 0 {
      return Err(ConfigError::Invalid("max_attempts 必须大于 0".to_string()));
    }
    // 输出即 ALIGN 指令的归一化幅度
    let output_ok = self.alignment.max_output > 0.0 && self.alignment.max_output <= 1.0;
    if !output_ok || self.alignment.max_integral < 0.0 {
      return Err(ConfigError::Invalid(format!(
        "限幅参数无效: max_output={}, max_integral={}",
        self.alignment.max_output, self.alignment.max_integral
      )));
    }
    if self.alignment.default_dt_secs <= 0.0 {
      return Err(ConfigError::Invalid("default_dt_secs 必须大于 0".to_string()));
    }
    Ok(())
  }
}

impl SupervisorConfig {
  pub fn validate(&self) -> Result<(), ConfigError> {
    if self.bumper_found_frames == 0 || self.bumper_lost_frames == 0 {
      return Err(ConfigError::Invalid("减速带去抖帧数必须大于 0".to_string()));
    }
    if let Some(area) = self.auto_approach_area {
      if !(0.0..=1.0).contains(&area) {
        return Err(ConfigError::Invalid(format!(
          "auto_approach_area 必须在 [0, 1] 内, 实际为 {}",
          area
        )));
      }
    }
    Ok(())
  }
}

impl Default for ParkingConfig {
  fn default() -> Self {
    Self {
      min_confidence: default_min_confidence(),
      classes: ClassNames::default(),
      slot_area_threshold: default_slot_area_threshold(),
      sign_proximity_px: default_sign_proximity_px(),
      debounce: DebounceConfig::default(),
      alignment: AlignmentConfig::default(),
      frame: FrameConfig::default(),
    }
  }
}

impl Default for ClassNames {
  fn default() -> Self {
    Self {
      parking_slot: default_class_parking_slot(),
      direction_sign: default_class_direction_sign(),
      restricted_sign: default_class_restricted_sign(),
      obstruction_cone: default_class_obstruction_cone(),
      bumper: default_class_bumper(),
    }
  }
}

impl Default for DebounceConfig {
  fn default() -> Self {
    Self {
      found_frames: default_found_frames(),
      lost_frames: default_lost_frames(),
      coast_frames: default_coast_frames(),
    }
  }
}

impl Default for AlignmentConfig {
  fn default() -> Self {
    Self {
      kp: default_kp(),
      ki: default_ki(),
      max_integral: default_max_integral(),
      max_output: default_max_output(),
      tolerance_px: default_tolerance_px(),
      max_attempts: default_max_attempts(),
      default_dt_secs: default_dt_secs(),
    }
  }
}

impl Default for FrameConfig {
  fn default() -> Self {
    Self {
      width: default_frame_width(),
      height: default_frame_height(),
    }
  }
}

impl Default for SupervisorConfig {
  fn default() -> Self {
    Self {
      bumper_area_threshold: default_bumper_area_threshold(),
      bumper_found_frames: default_bumper_found_frames(),
      bumper_lost_frames: default_bumper_lost_frames(),
      enable_ack: default_enable_ack(),
      exit_delay_frames: default_exit_delay_frames(),
      auto_approach_area: None,
    }
  }
}

// 默认值
fn default_min_confidence() -> f32 {
  0.5
}
fn default_slot_area_threshold() -> f32 {
  0.02
}
fn default_sign_proximity_px() -> f32 {
  50.0
}
fn default_class_parking_slot() -> String {
  "parking_slot".to_string()
}
fn default_class_direction_sign() -> String {
  "parking_signboard".to_string()
}
fn default_class_restricted_sign() -> String {
  "disabled person signboard".to_string()
}
fn default_class_obstruction_cone() -> String {
  "cone".to_string()
}
fn default_class_bumper() -> String {
  "bumper".to_string()
}
fn default_found_frames() -> u32 {
  3
}
fn default_lost_frames() -> u32 {
  5
}
fn default_coast_frames() -> u32 {
  15
} // 30fps 下约 0.5 秒
fn default_kp() -> f32 {
  0.006
}
fn default_ki() -> f32 {
  0.0008
}
fn default_max_integral() -> f32 {
  200.0
}
fn default_max_output() -> f32 {
  1.0
}
fn default_tolerance_px() -> f32 {
  20.0
}
fn default_max_attempts() -> u32 {
  60
}
fn default_dt_secs() -> f32 {
  0.033
}
fn default_frame_width() -> u32 {
  640
}
fn default_frame_height() -> u32 {
  640
}
fn default_bumper_area_threshold() -> f32 {
  0.08
}
fn default_bumper_found_frames() -> u32 {
  3
}
fn default_bumper_lost_frames() -> u32 {
  3
}
fn default_enable_ack() -> bool {
  true
}
fn default_exit_delay_frames() -> u32 {
  30
}
