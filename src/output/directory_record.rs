// 该文件是 Kuangxuan （框选） 项目的一部分。
// src/output/directory_record.rs - 目录记录输出
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

use std::path::{Path, PathBuf};

use chrono::{Datelike, Local};
use serde::Serialize;
use thiserror::Error;
use tracing::debug;
use url::Url;

use crate::{
  frame::Frame,
  model::{DetectResult, Detection},
  output::{Overlay, Render, draw::Draw},
  url_path,
};

#[derive(Error, Debug)]
pub enum DirectoryRecordOutputError {
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
  #[error("图像错误: {0}")]
  ImageError(#[from] image::ImageError),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("JSON 错误: {0}")]
  JsonError(#[from] serde_json::Error),
}

#[derive(Serialize)]
struct RecordItem<'a> {
  class_name: &'a str,
  #[serde(flatten)]
  detection: &'a Detection,
}

#[derive(Serialize)]
struct FrameRecord<'a> {
  frame: u64,
  timestamp_ms: u64,
  fps: Option<f32>,
  detections: Vec<RecordItem<'a>>,
}

/// 把每帧标注结果按日期存入目录
///
/// 路径为 `<目录>/YYYY/MM/DD/HH-MM-SS-XXXX.png`。查询参数 `record` 时在图片旁
/// 写一份同名 JSON 记录；默认只保存有检测结果的帧，`always` 时每帧都保存。
pub struct DirectoryRecordOutput {
  directory: PathBuf,
  draw: Draw,
  frame_counter: u16,
  always: bool,
  record: bool,
}

impl DirectoryRecordOutput {
  pub const SCHEME: &'static str = "folder";

  pub fn new(directory: impl Into<PathBuf>, draw: Draw) -> Self {
    Self {
      directory: directory.into(),
      draw,
      frame_counter: 0,
      always: false,
      record: false,
    }
  }

  pub fn always(mut self, always: bool) -> Self {
    self.always = always;
    self
  }

  pub fn record(mut self, record: bool) -> Self {
    self.record = record;
    self
  }

  pub fn from_url(uri: &Url, draw: Draw) -> Result<Self, DirectoryRecordOutputError> {
    if uri.scheme() != Self::SCHEME {
      return Err(DirectoryRecordOutputError::SchemeMismatch(
        uri.scheme().to_string(),
      ));
    }

    let always = uri.query_pairs().any(|(k, _)| k == "always");
    let record = uri.query_pairs().any(|(k, _)| k == "record");

    Ok(
      Self::new(url_path(uri), draw)
        .always(always)
        .record(record),
    )
  }

  pub fn directory(&self) -> &Path {
    &self.directory
  }

  fn frame_id(&mut self) -> u16 {
    self.frame_counter = self.frame_counter.wrapping_add(1);
    self.frame_counter
  }

  fn frame_path(&mut self) -> Result<PathBuf, DirectoryRecordOutputError> {
    let now = Local::now();
    let directory = self
      .directory
      .join(now.year().to_string())
      .join(format!("{:02}", now.month()))
      .join(format!("{:02}", now.day()));
    std::fs::create_dir_all(&directory)?;

    Ok(directory.join(format!(
      "{}-{:04X}.png",
      now.format("%H-%M-%S"),
      self.frame_id()
    )))
  }

  fn write_record(
    &self,
    path: &Path,
    frame: &Frame,
    result: &DetectResult,
    overlay: &Overlay,
  ) -> Result<(), DirectoryRecordOutputError> {
    let classes = self.draw.classes();
    let record = FrameRecord {
      frame: frame.index,
      timestamp_ms: frame.timestamp_ms,
      fps: overlay.fps,
      detections: result
        .iter()
        .map(|detection| RecordItem {
          class_name: classes.name(detection.class_id).unwrap_or("unknown"),
          detection,
        })
        .collect(),
    };
    let file = std::fs::File::create(path.with_extension("json"))?;
    serde_json::to_writer_pretty(file, &record)?;
    Ok(())
  }
}

impl Render<Frame, DetectResult> for DirectoryRecordOutput {
  type Error = DirectoryRecordOutputError;

  fn render_result(
    &mut self,
    frame: &Frame,
    result: &DetectResult,
    overlay: &Overlay,
  ) -> Result<(), Self::Error> {
    if !self.always && result.is_empty() {
      return Ok(());
    }

    let path = self.frame_path()?;
    self.draw.draw_detection(frame, result, overlay).save(&path)?;
    if self.record {
      self.write_record(&path, frame, result, overlay)?;
    }
    debug!("第 {} 帧保存到 {}", frame.index, path.display());
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{config::ColorIndexing, model::ClassList, output::ColorTable};
  use image::RgbImage;

  fn collect_files(dir: &Path, out: &mut Vec<PathBuf>) {
    for entry in std::fs::read_dir(dir).unwrap() {
      let path = entry.unwrap().path();
      if path.is_dir() {
        collect_files(&path, out);
      } else {
        out.push(path);
      }
    }
  }

  fn output(dir: &Path, query: &str) -> DirectoryRecordOutput {
    let draw = Draw::new(ClassList::coco(), ColorTable::new(80, 0), ColorIndexing::ByClass);
    let url = Url::parse(&format!("folder://{}{}", dir.display(), query)).unwrap();
    DirectoryRecordOutput::from_url(&url, draw).unwrap()
  }

  #[test]
  fn saves_frames_with_records() {
    let dir = std::env::temp_dir().join(format!("kuangxuan-record-{}", std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    let mut out = output(&dir, "?record");
    assert_eq!(out.directory(), dir.as_path());

    let frame = Frame::new(RgbImage::new(8, 8), 3, 40);
    let result = DetectResult::from(vec![Detection {
      class_id: 0,
      confidence: 0.75,
      x: 1,
      y: 1,
      w: 4,
      h: 4,
    }]);
    out
      .render_result(&frame, &result, &Overlay { fps: Some(10.0) })
      .unwrap();
    // 默认不保存空帧
    out
      .render_result(&frame, &DetectResult::default(), &Overlay::default())
      .unwrap();

    let mut files = Vec::new();
    collect_files(&dir, &mut files);
    files.sort();
    assert_eq!(files.len(), 2);
    let json = files
      .iter()
      .find(|p| p.extension().is_some_and(|e| e == "json"))
      .unwrap();
    let value: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(json).unwrap()).unwrap();
    assert_eq!(value["frame"], 3);
    assert_eq!(value["detections"][0]["class_name"], "person");
    assert_eq!(value["detections"][0]["w"], 4);

    std::fs::remove_dir_all(&dir).unwrap();
  }

  #[test]
  fn always_saves_empty_frames() {
    let dir = std::env::temp_dir().join(format!("kuangxuan-always-{}", std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    let mut out = output(&dir, "?always");

    let frame = Frame::new(RgbImage::new(8, 8), 0, 0);
    out
      .render_result(&frame, &DetectResult::default(), &Overlay::default())
      .unwrap();

    let mut files = Vec::new();
    collect_files(&dir, &mut files);
    assert_eq!(files.len(), 1);
    assert!(files[0].extension().is_some_and(|e| e == "png"));

    std::fs::remove_dir_all(&dir).unwrap();
  }
}
