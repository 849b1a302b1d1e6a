// 该文件是 Kuangxuan （框选） 项目的一部分。
// src/output.rs - 输出定义
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
use url::Url;

use crate::{frame::Frame, model::DetectResult};

pub mod color;
pub mod draw;
mod save_image_file;
mod signal;

#[cfg(feature = "directory_record")]
mod directory_record;

pub use self::color::ColorTable;
pub use self::draw::{Draw, DrawError};
pub use self::save_image_file::{SaveImageFileError, SaveImageFileOutput};
pub use self::signal::{CtrlcSignal, NoAck, StopSignal};

#[cfg(feature = "directory_record")]
pub use self::directory_record::{DirectoryRecordOutput, DirectoryRecordOutputError};

/// 叠加在画面上的会话信息
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Overlay {
  /// 当前帧率，仅视频模式显示
  pub fps: Option<f32>,
}

/// 标注器：把一帧的保留检测结果画到画面上并输出
pub trait Render<Frame, Output> {
  type Error: std::error::Error + Send + Sync + 'static;

  fn render_result(
    &mut self,
    frame: &Frame,
    result: &Output,
    overlay: &Overlay,
  ) -> Result<(), Self::Error>;

  /// 会话结束时调用一次
  fn finish(&mut self) -> Result<(), Self::Error> {
    Ok(())
  }
}

impl<F, D, T: Render<F, D> + ?Sized> Render<F, D> for Box<T> {
  type Error = T::Error;

  fn render_result(&mut self, frame: &F, result: &D, overlay: &Overlay) -> Result<(), Self::Error> {
    (**self).render_result(frame, result, overlay)
  }

  fn finish(&mut self) -> Result<(), Self::Error> {
    (**self).finish()
  }
}

#[derive(Error, Debug)]
pub enum OutputError {
  #[error("保存图像文件错误: {0}")]
  SaveImageFileError(#[from] SaveImageFileError),
  #[cfg(feature = "directory_record")]
  #[error("目录记录输出错误: {0}")]
  DirectoryRecordOutputError(#[from] DirectoryRecordOutputError),
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
}

/// 只统计帧数、不产生任何输出
#[derive(Debug, Default)]
pub struct NullOutput {
  frames: u64,
}

impl NullOutput {
  pub const SCHEME: &'static str = "null";

  pub fn frames(&self) -> u64 {
    self.frames
  }
}

impl Render<Frame, DetectResult> for NullOutput {
  type Error = std::convert::Infallible;

  fn render_result(
    &mut self,
    frame: &Frame,
    result: &DetectResult,
    _overlay: &Overlay,
  ) -> Result<(), Self::Error> {
    self.frames += 1;
    debug!("丢弃第 {} 帧输出 ({} 个检测框)", frame.index, result.len());
    Ok(())
  }
}

pub enum OutputWrapper {
  SaveImageFile(SaveImageFileOutput),
  #[cfg(feature = "directory_record")]
  DirectoryRecord(DirectoryRecordOutput),
  Null(NullOutput),
}

impl OutputWrapper {
  /// 根据 URL 方案创建输出，`draw` 为共享的绘制配置
  pub fn create(url: &Url, draw: Draw) -> Result<Self, OutputError> {
    match url.scheme() {
      SaveImageFileOutput::SCHEME => Ok(OutputWrapper::SaveImageFile(
        SaveImageFileOutput::from_url(url, draw)?,
      )),
      #[cfg(feature = "directory_record")]
      DirectoryRecordOutput::SCHEME => Ok(OutputWrapper::DirectoryRecord(
        DirectoryRecordOutput::from_url(url, draw)?,
      )),
      NullOutput::SCHEME => Ok(OutputWrapper::Null(NullOutput::default())),
      other => Err(OutputError::SchemeMismatch(format!(
        "不支持的输出方案 '{}'",
        other
      ))),
    }
  }
}

impl Render<Frame, DetectResult> for OutputWrapper {
  type Error = OutputError;

  fn render_result(
    &mut self,
    frame: &Frame,
    result: &DetectResult,
    overlay: &Overlay,
  ) -> Result<(), Self::Error> {
    match self {
      OutputWrapper::SaveImageFile(output) => output
        .render_result(frame, result, overlay)
        .map_err(OutputError::from),
      #[cfg(feature = "directory_record")]
      OutputWrapper::DirectoryRecord(output) => output
        .render_result(frame, result, overlay)
        .map_err(OutputError::from),
      OutputWrapper::Null(output) => match output.render_result(frame, result, overlay) {
        Ok(()) => Ok(()),
        Err(never) => match never {},
      },
    }
  }

  fn finish(&mut self) -> Result<(), Self::Error> {
    match self {
      OutputWrapper::SaveImageFile(output) => output.finish().map_err(OutputError::from),
      #[cfg(feature = "directory_record")]
      OutputWrapper::DirectoryRecord(output) => output.finish().map_err(OutputError::from),
      OutputWrapper::Null(_) => Ok(()),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{config::ColorIndexing, model::ClassList};

  fn draw() -> Draw {
    Draw::new(ClassList::coco(), ColorTable::new(80, 1), ColorIndexing::ByClass)
  }

  #[test]
  fn null_scheme_creates_null_output() {
    let url = Url::parse("null:").unwrap();
    assert!(matches!(
      OutputWrapper::create(&url, draw()),
      Ok(OutputWrapper::Null(_))
    ));
  }

  #[test]
  fn unknown_scheme_is_rejected() {
    let url = Url::parse("rtsp://localhost/out").unwrap();
    assert!(matches!(
      OutputWrapper::create(&url, draw()),
      Err(OutputError::SchemeMismatch(_))
    ));
  }
}
