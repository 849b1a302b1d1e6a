// 该文件是 Kuangxuan （框选） 项目的一部分。
// src/model/replay.rs - 回放检测器
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

use std::{convert::Infallible, path::Path};

use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::Frame,
  model::{Detector, RawRow},
  url_path,
};

#[derive(Error, Debug)]
pub enum ReplayError {
  #[error("URI 方案不匹配: 期望 '{expected}', 实际 '{actual}'")]
  SchemeMismatch {
    expected: &'static str,
    actual: String,
  },
  #[error("I/O 错误: {0}")]
  Io(#[from] std::io::Error),
  #[error("JSON 解析错误: {0}")]
  Json(#[from] serde_json::Error),
  #[error("候选行至少需要 4 个几何数值, 实际 {0}")]
  ShortRow(usize),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RowRepr {
  Object(RawRow),
  Flat(Vec<f32>),
}

fn into_row(repr: RowRepr) -> Result<RawRow, ReplayError> {
  match repr {
    RowRepr::Object(row) => Ok(row),
    RowRepr::Flat(values) => match values.as_slice() {
      [cx, cy, w, h, scores @ ..] => Ok(RawRow::new(*cx, *cy, *w, *h, scores.to_vec())),
      _ => Err(ReplayError::ShortRow(values.len())),
    },
  }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ReplayFile {
  Frames(Vec<Vec<RowRepr>>),
  Single(Vec<RowRepr>),
}

/// 从 JSON 文件回放网络输出的检测器
///
/// 文件内容可以是一组候选行（每帧复用），也可以是逐帧的候选行列表，
/// 第 n 帧使用第 `n % 帧数` 组。候选行写作 `{"cx":..,"cy":..,"w":..,"h":..,"scores":[..]}`
/// 或扁平数组 `[cx, cy, w, h, s1, .., sK]`。
#[derive(Debug, Clone)]
pub struct ReplayDetector {
  frames: Vec<Vec<RawRow>>,
}

impl ReplayDetector {
  pub fn from_frames(frames: Vec<Vec<RawRow>>) -> Self {
    let frames = if frames.is_empty() {
      vec![Vec::new()]
    } else {
      frames
    };
    Self { frames }
  }

  pub fn from_json_str(json: &str) -> Result<Self, ReplayError> {
    let convert = |rows: Vec<RowRepr>| {
      rows
        .into_iter()
        .map(into_row)
        .collect::<Result<Vec<_>, _>>()
    };

    let frames = match serde_json::from_str::<ReplayFile>(json)? {
      ReplayFile::Frames(frames) => frames
        .into_iter()
        .map(convert)
        .collect::<Result<Vec<_>, _>>()?,
      ReplayFile::Single(rows) => vec![convert(rows)?],
    };

    Ok(Self::from_frames(frames))
  }

  pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ReplayError> {
    let path = path.as_ref();
    info!("加载回放文件: {}", path.display());
    let detector = Self::from_json_str(&std::fs::read_to_string(path)?)?;
    debug!("回放文件包含 {} 帧", detector.frame_count());
    Ok(detector)
  }

  pub fn frame_count(&self) -> usize {
    self.frames.len()
  }
}

impl FromUrlWithScheme for ReplayDetector {
  const SCHEME: &'static str = "replay";
}

impl FromUrl for ReplayDetector {
  type Error = ReplayError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(ReplayError::SchemeMismatch {
        expected: Self::SCHEME,
        actual: url.scheme().to_string(),
      });
    }
    Self::from_path(url_path(url))
  }
}

impl Detector for ReplayDetector {
  type Error = Infallible;

  fn infer(&mut self, frame: &Frame) -> Result<Vec<RawRow>, Self::Error> {
    let slot = (frame.index % self.frames.len() as u64) as usize;
    Ok(self.frames[slot].clone())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use image::RgbImage;

  fn frame(index: u64) -> Frame {
    Frame::new(RgbImage::new(4, 4), index, 0)
  }

  #[test]
  fn single_list_is_reused_for_every_frame() {
    let mut detector = ReplayDetector::from_json_str("[[0.5, 0.5, 0.2, 0.2, 0.9, 0.1]]").unwrap();
    assert_eq!(detector.frame_count(), 1);
    for index in 0..3 {
      let rows = detector.infer(&frame(index)).unwrap();
      assert_eq!(rows, vec![RawRow::new(0.5, 0.5, 0.2, 0.2, vec![0.9, 0.1])]);
    }
  }

  #[test]
  fn per_frame_lists_cycle() {
    let json = r#"[
      [{"cx": 0.1, "cy": 0.1, "w": 0.1, "h": 0.1, "scores": [0.8]}],
      []
    ]"#;
    let mut detector = ReplayDetector::from_json_str(json).unwrap();
    assert_eq!(detector.frame_count(), 2);
    assert_eq!(detector.infer(&frame(0)).unwrap().len(), 1);
    assert!(detector.infer(&frame(1)).unwrap().is_empty());
    assert_eq!(detector.infer(&frame(2)).unwrap().len(), 1);
  }

  #[test]
  fn object_rows_in_single_list() {
    let json = r#"[{"cx": 0.1, "cy": 0.2, "w": 0.3, "h": 0.4, "scores": [0.5, 0.6]}]"#;
    let mut detector = ReplayDetector::from_json_str(json).unwrap();
    let rows = detector.infer(&frame(0)).unwrap();
    assert_eq!(rows[0].scores, vec![0.5, 0.6]);
  }

  #[test]
  fn empty_file_yields_no_rows() {
    let mut detector = ReplayDetector::from_json_str("[]").unwrap();
    assert!(detector.infer(&frame(7)).unwrap().is_empty());
  }

  #[test]
  fn short_rows_are_rejected() {
    assert!(matches!(
      ReplayDetector::from_json_str("[[0.5, 0.5, 0.2]]"),
      Err(ReplayError::ShortRow(3))
    ));
  }

  #[test]
  fn wrong_scheme_is_rejected() {
    let url = Url::parse("image:///tmp/rows.json").unwrap();
    assert!(matches!(
      ReplayDetector::from_url(&url),
      Err(ReplayError::SchemeMismatch { .. })
    ));
  }
}
