// 该文件是 Kuangxuan （框选） 项目的一部分。
// src/args.rs - 项目参数配置
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

use std::path::PathBuf;

use clap::Parser;
use url::Url;

use kuangxuan::{
  config::{AcquisitionPolicy, ColorIndexing, ConfigError, Mode, SessionConfig},
  model::SuppressionScope,
  output::color::DEFAULT_COLOR_SEED,
};

/// Kuangxuan 项目参数配置
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 运行模式：单张图片或连续视频
  #[arg(long, value_enum, default_value = "image")]
  pub mode: Mode,

  /// 模型输出来源，例如 replay:///path/to/rows.json
  #[arg(long, value_name = "MODEL")]
  pub model: Url,

  /// 输入来源
  /// 支持格式:
  /// - 图片: image:///path/to/a.jpg
  /// - 图片目录: folder:///path/to/frames
  /// - 摄像头: v4l://0（需要 v4l_input 特性）
  #[arg(long, value_name = "SOURCE")]
  pub input: Url,

  /// 输出路径
  /// 支持格式:
  /// - 图片: image:///path/to/out.png
  /// - 目录: folder:///path/to/dir?record&always
  /// - 丢弃: null:
  #[arg(long, value_name = "OUTPUT", default_value = "null:")]
  pub output: Url,

  /// 类别名称文件，每行一个；缺省使用 COCO 80 类
  #[arg(long, value_name = "FILE")]
  pub labels: Option<PathBuf>,

  /// 解码置信度阈值 (0.0 - 1.0)，缺省取模式预设
  #[arg(long, value_name = "THRESHOLD")]
  pub confidence: Option<f32>,

  /// NMS 分数阈值 (0.0 - 1.0)，缺省取模式预设
  #[arg(long, value_name = "THRESHOLD")]
  pub score: Option<f32>,

  /// NMS IOU 阈值 (0.0 - 1.0)，缺省取模式预设
  #[arg(long, value_name = "THRESHOLD")]
  pub overlap: Option<f32>,

  /// NMS 比较范围
  #[arg(long, value_enum, default_value = "class-agnostic")]
  pub nms_scope: SuppressionScope,

  /// 配色索引方式，缺省取模式预设
  #[arg(long, value_enum)]
  pub color_by: Option<ColorIndexing>,

  /// 配色种子
  #[arg(long, default_value_t = DEFAULT_COLOR_SEED)]
  pub seed: u64,

  /// 标签字体文件 (TTF/OTF)，缺省时只画框
  #[arg(long, value_name = "FILE")]
  pub font: Option<PathBuf>,

  /// 最大处理帧数（仅对视频有效）
  #[arg(long, value_name = "COUNT")]
  pub max_frames: Option<u64>,

  /// 允许连续获取失败的帧数
  #[arg(long, default_value = "5", value_name = "COUNT")]
  pub max_failures: u32,

  /// 图片模式下不等待确认
  #[arg(long)]
  pub no_wait: bool,
}

impl Args {
  pub fn session_config(&self, num_classes: usize) -> Result<SessionConfig, ConfigError> {
    let mut thresholds = self.mode.thresholds();
    if let Some(confidence) = self.confidence {
      thresholds = thresholds.with_confidence(confidence)?;
    }
    if let Some(score) = self.score {
      thresholds = thresholds.with_score(score)?;
    }
    if let Some(overlap) = self.overlap {
      thresholds = thresholds.with_overlap(overlap)?;
    }

    Ok(
      SessionConfig::for_mode(self.mode, num_classes)
        .with_thresholds(thresholds)
        .with_scope(self.nms_scope)
        .with_acquisition(AcquisitionPolicy {
          max_consecutive_failures: self.max_failures,
        })
        .with_max_frames(self.max_frames),
    )
  }

  pub fn color_indexing(&self) -> ColorIndexing {
    self.color_by.unwrap_or(self.mode.color_indexing())
  }
}
