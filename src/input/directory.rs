// 该文件是 Kuangxuan （框选） 项目的一部分。
// src/input/directory.rs - 图片目录输入
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

use std::{
  path::{Path, PathBuf},
  time::Instant,
};

use image::ImageReader;
use tracing::{debug, error, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::Frame,
  input::{AcquisitionError, FrameSource, IMAGE_EXTENSIONS},
  url_path,
};

/// 按文件名顺序逐张读取目录中的图片，每张作为一帧
pub struct DirectoryInput {
  entries: Vec<PathBuf>,
  cursor: usize,
  opened_at: Instant,
}

impl FromUrlWithScheme for DirectoryInput {
  const SCHEME: &'static str = "folder";
}

impl FromUrl for DirectoryInput {
  type Error = AcquisitionError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      error!(
        "URI scheme mismatch: expected '{}', found '{}'",
        Self::SCHEME,
        url.scheme()
      );
      return Err(AcquisitionError::SchemeMismatch(url.scheme().to_string()));
    }

    Self::open(url_path(url))
  }
}

fn is_image_file(path: &Path) -> bool {
  path.is_file()
    && path
      .extension()
      .and_then(|ext| ext.to_str())
      .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
      .unwrap_or(false)
}

impl DirectoryInput {
  pub fn open(directory: impl AsRef<Path>) -> Result<Self, AcquisitionError> {
    let directory = directory.as_ref();
    let mut entries = Vec::new();
    for entry in std::fs::read_dir(directory)? {
      let path = entry?.path();
      if is_image_file(&path) {
        entries.push(path);
      }
    }
    entries.sort();

    info!("打开图片目录 {}: {} 张图片", directory.display(), entries.len());
    Ok(DirectoryInput {
      entries,
      cursor: 0,
      opened_at: Instant::now(),
    })
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }
}

impl FrameSource for DirectoryInput {
  fn acquire(&mut self) -> Result<Option<Frame>, AcquisitionError> {
    let Some(path) = self.entries.get(self.cursor) else {
      return Ok(None);
    };
    let index = self.cursor as u64;
    // 先推进游标，读取失败时下一次获取直接跳到下一张
    self.cursor += 1;

    debug!("读取第 {} 帧: {}", index, path.display());
    let image = ImageReader::open(path)?.with_guessed_format()?.decode()?.to_rgb8();
    let timestamp_ms = self.opened_at.elapsed().as_millis() as u64;
    Ok(Some(Frame::new(image, index, timestamp_ms)))
  }

  fn release(&mut self) {
    self.cursor = self.entries.len();
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use image::RgbImage;

  fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!(
      "kuangxuan-dir-{}-{}",
      name,
      std::process::id()
    ));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    dir
  }

  #[test]
  fn reads_images_in_name_order_and_skips_others() {
    let dir = scratch_dir("order");
    RgbImage::new(4, 2).save(dir.join("b.png")).unwrap();
    RgbImage::new(2, 4).save(dir.join("a.png")).unwrap();
    std::fs::write(dir.join("notes.txt"), "skip me").unwrap();

    let mut input = DirectoryInput::open(&dir).unwrap();
    assert_eq!(input.len(), 2);
    let first = input.acquire().unwrap().unwrap();
    assert_eq!((first.index, first.width(), first.height()), (0, 2, 4));
    let second = input.acquire().unwrap().unwrap();
    assert_eq!((second.index, second.width()), (1, 4));
    assert!(input.acquire().unwrap().is_none());

    std::fs::remove_dir_all(&dir).unwrap();
  }

  #[test]
  fn unreadable_image_fails_only_that_frame() {
    let dir = scratch_dir("broken");
    std::fs::write(dir.join("a.png"), b"not an image").unwrap();
    RgbImage::new(3, 3).save(dir.join("b.png")).unwrap();

    let mut input = DirectoryInput::open(&dir).unwrap();
    assert!(input.acquire().is_err());
    let frame = input.acquire().unwrap().unwrap();
    assert_eq!(frame.index, 1);

    std::fs::remove_dir_all(&dir).unwrap();
  }
}
