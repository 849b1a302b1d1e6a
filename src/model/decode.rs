// 该文件是 Kuangxuan （框选） 项目的一部分。
// src/model/decode.rs - 候选行解码
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

use thiserror::Error;
use tracing::debug;

use crate::model::{DetectResult, Detection, RawRow};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
  #[error("第 {row} 行分数向量长度不匹配: 期望 {expected}, 实际 {actual}")]
  ShapeMismatch {
    row: usize,
    expected: usize,
    actual: usize,
  },
}

/// 将一帧的原始候选行解码为像素坐标检测框
///
/// 最高类别分数不大于 `confidence_threshold` 的行被丢弃；其余行按输入顺序输出，
/// 不做去重。像素换算一律向零截断，框可以越出画面。
/// 任何一行的分数向量长度与 `num_classes` 不一致都会立即失败。
pub fn decode(
  rows: &[RawRow],
  width: u32,
  height: u32,
  confidence_threshold: f32,
  num_classes: usize,
) -> Result<DetectResult, DecodeError> {
  let (frame_w, frame_h) = (width as f64, height as f64);
  let mut items = Vec::new();

  for (row_idx, row) in rows.iter().enumerate() {
    if num_classes == 0 || row.scores.len() != num_classes {
      return Err(DecodeError::ShapeMismatch {
        row: row_idx,
        expected: num_classes,
        actual: row.scores.len(),
      });
    }

    let Some((class_id, confidence)) = row.best_class() else {
      continue;
    };
    if confidence <= confidence_threshold {
      continue;
    }

    let center_x = (row.cx as f64 * frame_w) as i32;
    let center_y = (row.cy as f64 * frame_h) as i32;
    let box_w = (row.w as f64 * frame_w) as i32;
    let box_h = (row.h as f64 * frame_h) as i32;

    // 半宽保留小数，减完再截断
    let x = (center_x as f64 - box_w as f64 / 2.0) as i32;
    let y = (center_y as f64 - box_h as f64 / 2.0) as i32;

    items.push(Detection {
      class_id,
      confidence: confidence.clamp(0.0, 1.0),
      x,
      y,
      w: box_w,
      h: box_h,
    });
  }

  debug!("解码 {} 行候选, 保留 {} 个检测框", rows.len(), items.len());
  Ok(DetectResult::from(items))
}
