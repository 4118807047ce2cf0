// 该文件是 Tingche （停车） 项目的一部分。
// src/control.rs - 横向对准 PI 控制器
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

use crate::config::AlignmentConfig;

/// 带积分限幅的 PI 控制器，输出归一化修正量而不是电机速度
///
/// 误差为正（目标在参考点右侧）时输出为正，对应向右微调。
#[derive(Debug, Clone)]
pub struct AlignmentController {
  kp: f32,
  ki: f32,
  max_integral: f32,
  max_output: f32,
  integral: f32,
}

impl AlignmentController {
  pub fn new(kp: f32, ki: f32, max_integral: f32, max_output: f32) -> Self {
    Self {
      kp,
      ki,
      max_integral,
      max_output,
      integral: 0.0,
    }
  }

  pub fn from_config(config: &AlignmentConfig) -> Self {
    Self::new(config.kp, config.ki, config.max_integral, config.max_output)
  }

  pub fn compute(&mut self, error: f32, dt: f32) -> f32 {
    self.integral = (self.integral + error * dt).clamp(-self.max_integral, self.max_integral);
    let output = self.kp * error + self.ki * self.integral;
    output.clamp(-self.max_output, self.max_output)
  }

  pub fn reset(&mut self) {
    self.integral = 0.0;
  }

  pub fn integral(&self) -> f32 {
    self.integral
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use approx::assert_relative_eq;

  fn controller() -> AlignmentController {
    AlignmentController::from_config(&AlignmentConfig::default())
  }

  #[test]
  fn zero_error_after_reset_gives_zero() {
    let mut pi = controller();
    pi.compute(100.0, 0.5);
    pi.reset();
    for dt in [0.0, 0.001, 0.033, 1.0, 100.0] {
      assert_eq!(pi.compute(0.0, dt), 0.0);
    }
    assert_eq!(pi.integral(), 0.0);
  }

  #[test]
  fn proportional_and_integral_terms() {
    let mut pi = AlignmentController::new(0.01, 0.1, 100.0, 1.0);
    // integral = 10 * 0.5 = 5, out = 0.1 + 0.5
    assert_relative_eq!(pi.compute(10.0, 0.5), 0.6, epsilon = 1e-6);
    assert_relative_eq!(pi.integral(), 5.0);
    // 积分项在误差为 0 时保留
    assert_relative_eq!(pi.compute(0.0, 0.5), 0.5, epsilon = 1e-6);
  }

  #[test]
  fn integral_is_clamped() {
    let mut pi = AlignmentController::new(0.0, 1.0, 2.0, 10.0);
    for _ in 0..100 {
      pi.compute(50.0, 1.0);
    }
    assert_relative_eq!(pi.integral(), 2.0);
    for _ in 0..100 {
      pi.compute(-50.0, 1.0);
    }
    assert_relative_eq!(pi.integral(), -2.0);
  }

  #[test]
  fn output_never_exceeds_limit() {
    let mut pi = controller();
    let errors = [320.0, -320.0, 5000.0, -1.0, 0.0, 250.0, -4000.0, 21.0];
    for (i, error) in errors.iter().cycle().take(400).enumerate() {
      let dt = 0.01 + (i % 7) as f32 * 0.2;
      let out = pi.compute(*error, dt);
      assert!(out.abs() <= 1.0, "输出越界: {}", out);
    }
  }

  #[test]
  fn sign_follows_error() {
    let mut pi = controller();
    assert!(pi.compute(100.0, 0.033) > 0.0);
    pi.reset();
    assert!(pi.compute(-100.0, 0.033) < 0.0);
  }
}
