// 该文件是 Kuangxuan （框选） 项目的一部分。
// src/model/labels.rs - 类别名称列表
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

use std::{path::Path, str::FromStr};

use thiserror::Error;
use tracing::info;

/// COCO 数据集类别名称
pub const COCO_CLASSES: [&str; 80] = [
  "person",
  "bicycle",
  "car",
  "motorcycle",
  "airplane",
  "bus",
  "train",
  "truck",
  "boat",
  "traffic light",
  "fire hydrant",
  "stop sign",
  "parking meter",
  "bench",
  "bird",
  "cat",
  "dog",
  "horse",
  "sheep",
  "cow",
  "elephant",
  "bear",
  "zebra",
  "giraffe",
  "backpack",
  "umbrella",
  "handbag",
  "tie",
  "suitcase",
  "frisbee",
  "skis",
  "snowboard",
  "sports ball",
  "kite",
  "baseball bat",
  "baseball glove",
  "skateboard",
  "surfboard",
  "tennis racket",
  "bottle",
  "wine glass",
  "cup",
  "fork",
  "knife",
  "spoon",
  "bowl",
  "banana",
  "apple",
  "sandwich",
  "orange",
  "broccoli",
  "carrot",
  "hot dog",
  "pizza",
  "donut",
  "cake",
  "chair",
  "couch",
  "potted plant",
  "bed",
  "dining table",
  "toilet",
  "tv",
  "laptop",
  "mouse",
  "remote",
  "keyboard",
  "cell phone",
  "microwave",
  "oven",
  "toaster",
  "sink",
  "refrigerator",
  "book",
  "clock",
  "vase",
  "scissors",
  "teddy bear",
  "hair drier",
  "toothbrush",
];

#[derive(Error, Debug)]
pub enum LabelError {
  #[error("读取类别文件失败: {0}")]
  Io(#[from] std::io::Error),
  #[error("类别文件第 {0} 行为空")]
  BlankLine(usize),
  #[error("类别列表为空")]
  Empty,
}

/// 有序的类别名称表，行号即类别编号
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassList {
  names: Vec<String>,
}

impl ClassList {
  pub fn new(names: Vec<String>) -> Result<Self, LabelError> {
    if names.is_empty() {
      return Err(LabelError::Empty);
    }
    Ok(Self { names })
  }

  pub fn coco() -> Self {
    Self {
      names: COCO_CLASSES.iter().map(|name| name.to_string()).collect(),
    }
  }

  pub fn from_file(path: impl AsRef<Path>) -> Result<Self, LabelError> {
    let path = path.as_ref();
    let list: ClassList = std::fs::read_to_string(path)?.parse()?;
    info!("从 {} 加载 {} 个类别", path.display(), list.len());
    Ok(list)
  }

  pub fn len(&self) -> usize {
    self.names.len()
  }

  pub fn is_empty(&self) -> bool {
    self.names.is_empty()
  }

  pub fn name(&self, class_id: usize) -> Option<&str> {
    self.names.get(class_id).map(String::as_str)
  }

  /// 用于显示的名称，越界时退化为编号
  pub fn label(&self, class_id: usize) -> String {
    match self.name(class_id) {
      Some(name) => name.to_string(),
      None => format!("class {}", class_id),
    }
  }

  pub fn iter(&self) -> impl Iterator<Item = &str> {
    self.names.iter().map(String::as_str)
  }
}

impl FromStr for ClassList {
  type Err = LabelError;

  /// 每行一个名称；文件末尾的空行忽略，中间的空行会让后续编号错位，视为错误
  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let lines: Vec<&str> = s.lines().map(str::trim).collect();
    let end = lines
      .iter()
      .rposition(|line| !line.is_empty())
      .map_or(0, |last| last + 1);

    let mut names = Vec::with_capacity(end);
    for (line_no, line) in lines[..end].iter().enumerate() {
      if line.is_empty() {
        return Err(LabelError::BlankLine(line_no + 1));
      }
      names.push(line.to_string());
    }

    ClassList::new(names)
  }
}
