// 该文件是 Kuangxuan （框选） 项目的一部分。
// src/input/read_image_file.rs - 图像文件输入
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

use image::{ImageReader, RgbImage};
use tracing::{error, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::Frame,
  input::{AcquisitionError, FrameSource},
  url_path,
};

/// 单张图片输入，只产出一帧
pub struct ImageFileInput {
  path: PathBuf,
  image: Option<RgbImage>,
}

impl FromUrlWithScheme for ImageFileInput {
  const SCHEME: &'static str = "image";
}

impl FromUrl for ImageFileInput {
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

impl ImageFileInput {
  pub fn open(path: impl Into<PathBuf>) -> Result<Self, AcquisitionError> {
    let path = path.into();
    let image = ImageReader::open(&path)?.decode()?.to_rgb8();
    info!(
      "打开图片 {}: {}x{}",
      path.display(),
      image.width(),
      image.height()
    );

    Ok(ImageFileInput {
      path,
      image: Some(image),
    })
  }

  pub fn from_image(image: RgbImage) -> Self {
    ImageFileInput {
      path: PathBuf::new(),
      image: Some(image),
    }
  }
}

impl FrameSource for ImageFileInput {
  fn acquire(&mut self) -> Result<Option<Frame>, AcquisitionError> {
    Ok(self.image.take().map(|image| Frame::new(image, 0, 0)))
  }

  fn release(&mut self) {
    if self.image.take().is_some() {
      info!("释放未使用的图片: {}", self.path.display());
    }
  }
}
