// 该文件是 Kuangxuan （框选） 项目的一部分。
// src/config.rs - 阈值与会话配置
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

use clap::ValueEnum;
use thiserror::Error;

use crate::model::SuppressionScope;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
  #[error("参数无效: {name} = {value}，取值必须在 [0, 1] 之间")]
  InvalidParameter { name: &'static str, value: f32 },
}

fn check_unit(name: &'static str, value: f32) -> Result<f32, ConfigError> {
  if value.is_nan() || !(0.0..=1.0).contains(&value) {
    return Err(ConfigError::InvalidParameter { name, value });
  }
  Ok(value)
}

/// 解码与抑制阶段使用的三个阈值
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
  confidence: f32,
  score: f32,
  overlap: f32,
}

impl Thresholds {
  /// 创建阈值组合，任意一项不在 [0, 1] 内都会被拒绝
  pub fn new(confidence: f32, score: f32, overlap: f32) -> Result<Self, ConfigError> {
    Ok(Self {
      confidence: check_unit("confidence", confidence)?,
      score: check_unit("score", score)?,
      overlap: check_unit("overlap", overlap)?,
    })
  }

  /// 解码阶段的置信度阈值（严格大于才保留）
  pub fn confidence(&self) -> f32 {
    self.confidence
  }

  /// 抑制阶段的分数阈值（大于等于才参与）
  pub fn score(&self) -> f32 {
    self.score
  }

  /// 抑制阶段的 IoU 阈值（严格大于才被抑制）
  pub fn overlap(&self) -> f32 {
    self.overlap
  }

  pub fn with_confidence(self, confidence: f32) -> Result<Self, ConfigError> {
    Self::new(confidence, self.score, self.overlap)
  }

  pub fn with_score(self, score: f32) -> Result<Self, ConfigError> {
    Self::new(self.confidence, score, self.overlap)
  }

  pub fn with_overlap(self, overlap: f32) -> Result<Self, ConfigError> {
    Self::new(self.confidence, self.score, overlap)
  }
}

/// 运行模式：单张图片或连续视频
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Mode {
  Image,
  Video,
}

impl Mode {
  /// 模式对应的默认阈值
  ///
  /// 静态图片光照稳定，解码门槛高、重叠容忍度宽；
  /// 视频逐帧置信度偏低，解码门槛低、抑制更激进。
  pub fn thresholds(self) -> Thresholds {
    match self {
      Mode::Image => Thresholds {
        confidence: 0.5,
        score: 0.4,
        overlap: 0.6,
      },
      Mode::Video => Thresholds {
        confidence: 0.2,
        score: 0.8,
        overlap: 0.3,
      },
    }
  }

  /// 模式对应的默认配色索引方式
  pub fn color_indexing(self) -> ColorIndexing {
    match self {
      Mode::Image => ColorIndexing::ByDetection,
      Mode::Video => ColorIndexing::ByClass,
    }
  }
}

/// 配色表的索引方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ColorIndexing {
  /// 按检测结果在本帧中的序号取色
  ByDetection,
  /// 按类别编号取色，跨帧稳定
  ByClass,
}

/// 获取帧失败时的处理策略
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AcquisitionPolicy {
  /// 允许连续跳过的失败帧数，超过即终止
  pub max_consecutive_failures: u32,
}

impl Default for AcquisitionPolicy {
  fn default() -> Self {
    Self {
      max_consecutive_failures: 5,
    }
  }
}

/// 一次处理会话的全部配置
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
  pub mode: Mode,
  pub thresholds: Thresholds,
  pub num_classes: usize,
  pub scope: SuppressionScope,
  pub acquisition: AcquisitionPolicy,
  pub max_frames: Option<u64>,
}

impl SessionConfig {
  pub fn for_mode(mode: Mode, num_classes: usize) -> Self {
    Self {
      mode,
      thresholds: mode.thresholds(),
      num_classes,
      scope: SuppressionScope::default(),
      acquisition: AcquisitionPolicy::default(),
      max_frames: None,
    }
  }

  pub fn with_thresholds(mut self, thresholds: Thresholds) -> Self {
    self.thresholds = thresholds;
    self
  }

  pub fn with_scope(mut self, scope: SuppressionScope) -> Self {
    self.scope = scope;
    self
  }

  pub fn with_acquisition(mut self, acquisition: AcquisitionPolicy) -> Self {
    self.acquisition = acquisition;
    self
  }

  pub fn with_max_frames(mut self, max_frames: Option<u64>) -> Self {
    self.max_frames = max_frames;
    self
  }
}
