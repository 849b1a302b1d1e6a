// 该文件是 Kuangxuan （框选） 项目的一部分。
// src/output/save_image_file.rs - 保存图像文件
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

use thiserror::Error;
use tracing::{info, warn};
use url::Url;

use crate::{
  frame::Frame,
  model::DetectResult,
  output::{Overlay, Render, draw::Draw},
  url_path,
};

#[derive(Error, Debug)]
pub enum SaveImageFileError {
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("图像错误: {0}")]
  ImageError(#[from] image::ImageError),
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
}

/// 把标注后的画面写入同一个图像文件，视频模式下保留最新一帧
pub struct SaveImageFileOutput {
  path: PathBuf,
  draw: Draw,
  written: u64,
}

impl SaveImageFileOutput {
  pub const SCHEME: &'static str = "image";

  pub fn new(path: impl Into<PathBuf>, draw: Draw) -> Self {
    Self {
      path: path.into(),
      draw,
      written: 0,
    }
  }

  pub fn from_url(uri: &Url, draw: Draw) -> Result<Self, SaveImageFileError> {
    if uri.scheme() != Self::SCHEME {
      return Err(SaveImageFileError::SchemeMismatch(format!(
        "期望保存方式 '{}', 实际保存方式 '{}'",
        Self::SCHEME,
        uri.scheme()
      )));
    }

    Ok(Self::new(url_path(uri), draw))
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  fn save_image(&mut self, image: image::RgbImage) -> Result<(), SaveImageFileError> {
    if let Some(parent) = self.path.parent()
      && !parent.as_os_str().is_empty()
    {
      std::fs::create_dir_all(parent)?;
    }

    image.save(&self.path)?;
    self.written += 1;
    Ok(())
  }
}

impl Render<Frame, DetectResult> for SaveImageFileOutput {
  type Error = SaveImageFileError;

  fn render_result(
    &mut self,
    frame: &Frame,
    result: &DetectResult,
    overlay: &Overlay,
  ) -> Result<(), Self::Error> {
    let image = self.draw.draw_detection(frame, result, overlay);
    self.save_image(image)
  }

  fn finish(&mut self) -> Result<(), Self::Error> {
    if self.written == 0 {
      warn!("没有任何帧写入 {}", self.path.display());
    } else {
      info!("保存图像到文件: {} (共写入 {} 次)", self.path.display(), self.written);
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{
    config::ColorIndexing,
    model::{ClassList, Detection},
    output::ColorTable,
  };
  use image::{Rgb, RgbImage};

  #[test]
  fn writes_annotated_frame() {
    let dir = std::env::temp_dir().join(format!("kuangxuan-save-{}", std::process::id()));
    let path = dir.join("nested").join("out.png");
    let draw = Draw::new(ClassList::coco(), ColorTable::new(80, 0), ColorIndexing::ByClass);
    let mut output = SaveImageFileOutput::new(&path, draw.clone());

    let frame = Frame::new(RgbImage::new(16, 16), 0, 0);
    let detection = Detection {
      class_id: 1,
      confidence: 0.9,
      x: 2,
      y: 2,
      w: 8,
      h: 8,
    };
    let result = DetectResult::from(vec![detection]);
    output
      .render_result(&frame, &result, &Overlay::default())
      .unwrap();
    output.finish().unwrap();

    let saved = image::open(&path).unwrap().to_rgb8();
    assert_eq!(*saved.get_pixel(2, 2), draw.color_for(0, &detection));
    assert_eq!(*saved.get_pixel(6, 6), Rgb([0, 0, 0]));

    std::fs::remove_dir_all(&dir).unwrap();
  }

  #[test]
  fn rejects_other_schemes() {
    let draw = Draw::new(ClassList::coco(), ColorTable::new(80, 0), ColorIndexing::ByClass);
    let url = Url::parse("folder:///tmp/out").unwrap();
    assert!(matches!(
      SaveImageFileOutput::from_url(&url, draw),
      Err(SaveImageFileError::SchemeMismatch(_))
    ));
  }
}
