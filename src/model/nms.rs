// 该文件是 Kuangxuan （框选） 项目的一部分。
// src/model/nms.rs - 非极大值抑制
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
use tracing::debug;

use crate::model::{DetectResult, Detection};

/// 抑制后保留的下标集合，升序且无重复
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetainedIndexSet {
  indices: Vec<usize>,
}

impl RetainedIndexSet {
  pub fn from_indices<I: IntoIterator<Item = usize>>(indices: I) -> Self {
    let mut indices: Vec<usize> = indices.into_iter().collect();
    indices.sort_unstable();
    indices.dedup();
    Self { indices }
  }

  pub fn contains(&self, index: usize) -> bool {
    self.indices.binary_search(&index).is_ok()
  }

  pub fn len(&self) -> usize {
    self.indices.len()
  }

  pub fn is_empty(&self) -> bool {
    self.indices.is_empty()
  }

  pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
    self.indices.iter().copied()
  }

  pub fn as_slice(&self) -> &[usize] {
    &self.indices
  }
}

/// 抑制时比较哪些检测框之间的重叠
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum SuppressionScope {
  /// 不区分类别，高分框可以抑制任何类别的重叠框
  #[default]
  ClassAgnostic,
  /// 只在同一类别内比较
  PerClass,
}

/// 两个像素框的交并比，宽或高不为正的框与任何框的 IoU 都为 0
pub fn iou(a: &Detection, b: &Detection) -> f32 {
  if a.w <= 0 || a.h <= 0 || b.w <= 0 || b.h <= 0 {
    return 0.0;
  }

  let x1 = (a.x as i64).max(b.x as i64);
  let y1 = (a.y as i64).max(b.y as i64);
  let x2 = (a.x as i64 + a.w as i64).min(b.x as i64 + b.w as i64);
  let y2 = (a.y as i64 + a.h as i64).min(b.y as i64 + b.h as i64);

  let intersection = (x2 - x1).max(0) * (y2 - y1).max(0);
  let union = a.area() + b.area() - intersection;
  if union <= 0 {
    return 0.0;
  }

  (intersection as f64 / union as f64) as f32
}

/// 不区分类别的贪心非极大值抑制
pub fn suppress(
  detections: &DetectResult,
  score_threshold: f32,
  overlap_threshold: f32,
) -> RetainedIndexSet {
  suppress_with_scope(
    detections,
    score_threshold,
    overlap_threshold,
    SuppressionScope::ClassAgnostic,
  )
}

/// 贪心非极大值抑制
///
/// 置信度低于 `score_threshold` 的框不参与；其余按置信度降序（同分按下标升序）
/// 依次选取，与已选框 IoU 大于 `overlap_threshold` 的框被移除。
pub fn suppress_with_scope(
  detections: &DetectResult,
  score_threshold: f32,
  overlap_threshold: f32,
  scope: SuppressionScope,
) -> RetainedIndexSet {
  let items = &detections.items;

  let mut order: Vec<usize> = (0..items.len())
    .filter(|&i| items[i].confidence >= score_threshold)
    .collect();
  order.sort_by(|&a, &b| {
    items[b]
      .confidence
      .total_cmp(&items[a].confidence)
      .then(a.cmp(&b))
  });

  let mut suppressed = vec![false; order.len()];
  let mut kept = Vec::new();

  for i in 0..order.len() {
    if suppressed[i] {
      continue;
    }
    let best = &items[order[i]];
    kept.push(order[i]);

    for j in (i + 1)..order.len() {
      if suppressed[j] {
        continue;
      }
      let other = &items[order[j]];
      if scope == SuppressionScope::PerClass && other.class_id != best.class_id {
        continue;
      }
      if iou(best, other) > overlap_threshold {
        suppressed[j] = true;
      }
    }
  }

  debug!(
    "非极大值抑制: 输入 {}, 参与 {}, 保留 {}",
    items.len(),
    order.len(),
    kept.len()
  );
  RetainedIndexSet::from_indices(kept)
}

#[cfg(test)]
mod tests {
  use super::*;

  fn det(class_id: usize, confidence: f32, x: i32, y: i32, w: i32, h: i32) -> Detection {
    Detection {
      class_id,
      confidence,
      x,
      y,
      w,
      h,
    }
  }

  #[test]
  fn iou_of_identical_boxes_is_one() {
    let a = det(0, 0.9, 10, 10, 20, 20);
    assert_eq!(iou(&a, &a), 1.0);
  }

  #[test]
  fn iou_of_disjoint_boxes_is_zero() {
    let a = det(0, 0.9, 0, 0, 10, 10);
    let b = det(0, 0.9, 10, 0, 10, 10);
    assert_eq!(iou(&a, &b), 0.0);
  }

  #[test]
  fn iou_partial_overlap() {
    let a = det(0, 0.9, 0, 0, 10, 10);
    let b = det(0, 0.9, 5, 0, 10, 10);
    // 50 / 150
    assert!((iou(&a, &b) - 1.0 / 3.0).abs() < 1e-6);
  }

  #[test]
  fn degenerate_boxes_never_overlap() {
    let a = det(0, 0.9, 0, 0, 0, 10);
    let b = det(0, 0.9, 0, 0, 10, 10);
    let c = det(0, 0.9, 0, 0, 10, -5);
    assert_eq!(iou(&a, &b), 0.0);
    assert_eq!(iou(&b, &c), 0.0);
    assert_eq!(iou(&a, &a), 0.0);
  }

  #[test]
  fn keeps_higher_confidence_of_overlapping_pair() {
    // IoU = 9000 / 10000 = 0.9
    let set = DetectResult::from(vec![det(0, 0.6, 0, 0, 100, 90), det(0, 0.9, 0, 0, 100, 100)]);
    let kept = suppress(&set, 0.4, 0.6);
    assert_eq!(kept.as_slice(), &[1]);
  }

  #[test]
  fn score_gate_is_inclusive() {
    let set = DetectResult::from(vec![det(0, 0.4, 0, 0, 10, 10), det(0, 0.39, 50, 50, 10, 10)]);
    assert_eq!(suppress(&set, 0.4, 0.5).as_slice(), &[0]);
  }

  #[test]
  fn overlap_equal_to_threshold_is_kept() {
    let set = DetectResult::from(vec![det(0, 0.9, 0, 0, 10, 10), det(0, 0.8, 5, 0, 10, 10)]);
    let overlap = iou(&set.items[0], &set.items[1]);
    assert_eq!(suppress(&set, 0.0, overlap).len(), 2);
  }

  #[test]
  fn ties_prefer_lower_index() {
    let set = DetectResult::from(vec![det(0, 0.7, 0, 0, 10, 10), det(1, 0.7, 0, 0, 10, 10)]);
    assert_eq!(suppress(&set, 0.0, 0.5).as_slice(), &[0]);
  }

  #[test]
  fn class_agnostic_suppresses_across_classes() {
    let set = DetectResult::from(vec![det(0, 0.9, 0, 0, 10, 10), det(1, 0.8, 0, 0, 10, 10)]);
    assert_eq!(suppress(&set, 0.0, 0.5).as_slice(), &[0]);
    let per_class = suppress_with_scope(&set, 0.0, 0.5, SuppressionScope::PerClass);
    assert_eq!(per_class.as_slice(), &[0, 1]);
  }

  #[test]
  fn chain_is_resolved_greedily() {
    // a 与 b 重叠，b 与 c 重叠，a 与 c 不重叠：b 被 a 抑制后 c 保留
    let set = DetectResult::from(vec![
      det(0, 0.9, 0, 0, 10, 10),
      det(0, 0.8, 4, 0, 10, 10),
      det(0, 0.7, 8, 0, 10, 10),
    ]);
    assert_eq!(suppress(&set, 0.0, 0.3).as_slice(), &[0, 2]);
  }

  #[test]
  fn empty_set_retains_nothing() {
    assert!(suppress(&DetectResult::default(), 0.5, 0.5).is_empty());
  }

  #[test]
  fn retained_index_set_is_sorted_and_unique() {
    let set = RetainedIndexSet::from_indices([5, 1, 5, 3]);
    assert_eq!(set.as_slice(), &[1, 3, 5]);
    assert!(set.contains(3));
    assert!(!set.contains(2));
  }
}
