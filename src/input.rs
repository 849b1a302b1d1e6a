// 该文件是 Kuangxuan （框选） 项目的一部分。
// src/input.rs - 视频/图像输入
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
use url::Url;

use crate::{FromUrl, FromUrlWithScheme, frame::Frame};

mod directory;
mod read_image_file;
#[cfg(feature = "v4l_input")]
mod v4l_input;

pub use self::directory::DirectoryInput;
pub use self::read_image_file::ImageFileInput;
#[cfg(feature = "v4l_input")]
pub use self::v4l_input::V4lInput;

/// 支持的图像文件扩展名
pub const IMAGE_EXTENSIONS: [&str; 6] = ["jpg", "jpeg", "png", "bmp", "gif", "webp"];

#[derive(Error, Debug)]
pub enum AcquisitionError {
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
  #[error("I/O 错误: {0}")]
  Io(#[from] std::io::Error),
  #[error("图像解码错误: {0}")]
  Image(#[from] image::ImageError),
  #[error("采集设备错误: {0}")]
  Device(String),
}

/// 帧来源
///
/// `acquire` 返回 `Ok(None)` 表示来源已耗尽；返回错误表示本帧读取失败，
/// 调用方可以跳过后继续获取。`release` 只会在会话结束时被调用一次。
pub trait FrameSource {
  fn acquire(&mut self) -> Result<Option<Frame>, AcquisitionError>;

  fn release(&mut self) {}
}

impl<T: FrameSource + ?Sized> FrameSource for Box<T> {
  fn acquire(&mut self) -> Result<Option<Frame>, AcquisitionError> {
    (**self).acquire()
  }

  fn release(&mut self) {
    (**self).release()
  }
}

pub enum InputWrapper {
  ImageFile(ImageFileInput),
  Directory(DirectoryInput),
  #[cfg(feature = "v4l_input")]
  V4l(V4lInput),
}

impl FromUrl for InputWrapper {
  type Error = AcquisitionError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    match url.scheme() {
      ImageFileInput::SCHEME => Ok(InputWrapper::ImageFile(ImageFileInput::from_url(url)?)),
      DirectoryInput::SCHEME => Ok(InputWrapper::Directory(DirectoryInput::from_url(url)?)),
      #[cfg(feature = "v4l_input")]
      V4lInput::SCHEME => Ok(InputWrapper::V4l(V4lInput::from_url(url)?)),
      other => Err(AcquisitionError::SchemeMismatch(format!(
        "不支持的输入方案 '{}'",
        other
      ))),
    }
  }
}

impl FrameSource for InputWrapper {
  fn acquire(&mut self) -> Result<Option<Frame>, AcquisitionError> {
    match self {
      InputWrapper::ImageFile(input) => input.acquire(),
      InputWrapper::Directory(input) => input.acquire(),
      #[cfg(feature = "v4l_input")]
      InputWrapper::V4l(input) => input.acquire(),
    }
  }

  fn release(&mut self) {
    match self {
      InputWrapper::ImageFile(input) => input.release(),
      InputWrapper::Directory(input) => input.release(),
      #[cfg(feature = "v4l_input")]
      InputWrapper::V4l(input) => input.release(),
    }
  }
}
