// 该文件是 Kuangxuan （框选） 项目的一部分。
// src/model.rs - 模型与检测结果定义
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

use serde::{Deserialize, Serialize};

use crate::frame::Frame;

mod decode;
mod labels;
mod nms;
mod replay;

pub use self::decode::{DecodeError, decode};
pub use self::labels::{COCO_CLASSES, ClassList, LabelError};
pub use self::nms::{RetainedIndexSet, SuppressionScope, iou, suppress, suppress_with_scope};
pub use self::replay::{ReplayDetector, ReplayError};

/// 推理能力：输入一帧，输出该帧的原始候选行
pub trait Detector {
  type Error: std::error::Error + Send + Sync + 'static;

  fn infer(&mut self, frame: &Frame) -> Result<Vec<RawRow>, Self::Error>;
}

impl<T: Detector + ?Sized> Detector for Box<T> {
  type Error = T::Error;

  fn infer(&mut self, frame: &Frame) -> Result<Vec<RawRow>, Self::Error> {
    (**self).infer(frame)
  }
}

/// 网络输出的一行候选
///
/// 几何量均为相对网络输入分辨率归一化到 [0, 1] 的中心点与宽高。
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RawRow {
  pub cx: f32,
  pub cy: f32,
  pub w: f32,
  pub h: f32,
  pub scores: Vec<f32>,
}

impl RawRow {
  pub fn new(cx: f32, cy: f32, w: f32, h: f32, scores: Vec<f32>) -> Self {
    Self {
      cx,
      cy,
      w,
      h,
      scores,
    }
  }

  /// 分数最高的类别及其分数，并列时取编号最小者，NaN 不参与比较
  pub fn best_class(&self) -> Option<(usize, f32)> {
    let mut best: Option<(usize, f32)> = None;
    for (class_id, &score) in self.scores.iter().enumerate() {
      if score.is_nan() {
        continue;
      }
      match best {
        Some((_, best_score)) if score <= best_score => {}
        _ => best = Some((class_id, score)),
      }
    }
    best
  }
}

/// 像素坐标下的一个检测框，(x, y) 为左上角
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Detection {
  pub class_id: usize,
  pub confidence: f32,
  pub x: i32,
  pub y: i32,
  pub w: i32,
  pub h: i32,
}

impl Detection {
  pub fn area(&self) -> i64 {
    if self.w <= 0 || self.h <= 0 {
      return 0;
    }
    self.w as i64 * self.h as i64
  }
}

/// 一帧的检测结果，顺序即解码顺序
///
/// 经 `select` 得到的结果记录每个检测框在解码结果中的下标，
/// 按检测配色时用的是这个下标而不是保留后的位置。
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DetectResult {
  pub items: Vec<Detection>,
  #[serde(skip)]
  indices: Vec<usize>,
}

impl DetectResult {
  pub fn len(&self) -> usize {
    self.items.len()
  }

  pub fn is_empty(&self) -> bool {
    self.items.is_empty()
  }

  pub fn iter(&self) -> std::slice::Iter<'_, Detection> {
    self.items.iter()
  }

  pub fn get(&self, index: usize) -> Option<&Detection> {
    self.items.get(index)
  }

  /// 第 `position` 个检测框在解码结果中的下标
  pub fn decode_index(&self, position: usize) -> usize {
    self.indices.get(position).copied().unwrap_or(position)
  }

  /// 依次给出 (解码下标, 检测框)
  pub fn indexed(&self) -> impl Iterator<Item = (usize, &Detection)> + '_ {
    self
      .items
      .iter()
      .enumerate()
      .map(|(position, detection)| (self.decode_index(position), detection))
  }

  /// 按保留下标过滤，保持原有顺序
  pub fn select(&self, retained: &RetainedIndexSet) -> DetectResult {
    let (indices, items) = retained
      .iter()
      .filter_map(|index| {
        self
          .items
          .get(index)
          .map(|detection| (self.decode_index(index), *detection))
      })
      .unzip();
    DetectResult { items, indices }
  }
}

impl From<Vec<Detection>> for DetectResult {
  fn from(items: Vec<Detection>) -> Self {
    DetectResult {
      items,
      indices: Vec::new(),
    }
  }
}

impl FromIterator<Detection> for DetectResult {
  fn from_iter<I: IntoIterator<Item = Detection>>(iter: I) -> Self {
    DetectResult::from(iter.into_iter().collect::<Vec<_>>())
  }
}

impl<'a> IntoIterator for &'a DetectResult {
  type Item = &'a Detection;
  type IntoIter = std::slice::Iter<'a, Detection>;

  fn into_iter(self) -> Self::IntoIter {
    self.items.iter()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn best_class_prefers_lowest_index_on_tie() {
    let row = RawRow::new(0.5, 0.5, 0.1, 0.1, vec![0.2, 0.7, 0.7]);
    assert_eq!(row.best_class(), Some((1, 0.7)));
  }

  #[test]
  fn best_class_skips_nan() {
    let row = RawRow::new(0.5, 0.5, 0.1, 0.1, vec![f32::NAN, 0.3]);
    assert_eq!(row.best_class(), Some((1, 0.3)));
    let row = RawRow::new(0.5, 0.5, 0.1, 0.1, vec![f32::NAN]);
    assert_eq!(row.best_class(), None);
  }

  #[test]
  fn select_keeps_decode_order() {
    let det = |class_id| Detection {
      class_id,
      confidence: 0.9,
      x: 0,
      y: 0,
      w: 1,
      h: 1,
    };
    let set: DetectResult = (0..4).map(det).collect();
    let retained = RetainedIndexSet::from_indices([3, 1]);
    let picked: Vec<usize> = set.select(&retained).iter().map(|d| d.class_id).collect();
    assert_eq!(picked, vec![1, 3]);
  }

  #[test]
  fn select_remembers_decode_index() {
    let det = |class_id| Detection {
      class_id,
      confidence: 0.9,
      x: 0,
      y: 0,
      w: 1,
      h: 1,
    };
    let set: DetectResult = (0..5).map(det).collect();
    assert_eq!(set.decode_index(3), 3);

    let kept = set.select(&RetainedIndexSet::from_indices([0, 2, 4]));
    let indexed: Vec<(usize, usize)> = kept.indexed().map(|(i, d)| (i, d.class_id)).collect();
    assert_eq!(indexed, vec![(0, 0), (2, 2), (4, 4)]);

    // 再次筛选仍指向最初的解码下标
    let again = kept.select(&RetainedIndexSet::from_indices([1, 2]));
    assert_eq!(again.decode_index(0), 2);
    assert_eq!(again.decode_index(1), 4);
  }
}
