// 该文件是 Kuangxuan （框选） 项目的一部分。
// src/input/v4l_input.rs - V4L 摄像头输入
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

use std::time::Instant;

use image::{ImageFormat, Rgb, RgbImage};
use tracing::{error, info, warn};
use url::Url;
use v4l::{
  Device, FourCC, buffer::Type, io::mmap::Stream, io::traits::CaptureStream, video::Capture,
};

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::Frame,
  input::{AcquisitionError, FrameSource},
};

const V4L_BUFFER_COUNT: u32 = 4;

fn device_error(err: impl std::fmt::Display) -> AcquisitionError {
  AcquisitionError::Device(err.to_string())
}

/// 按设备编号打开的摄像头，支持 MJPG 与 YUYV 输出
///
/// 采集流与设备句柄在 `release` 中依次关闭，之后 `acquire` 返回 `Ok(None)`。
pub struct V4lInput {
  stream: Option<Stream<'static>>,
  device: Option<Device>,
  fourcc: FourCC,
  width: u32,
  height: u32,
  next_index: u64,
  opened_at: Instant,
}

impl FromUrlWithScheme for V4lInput {
  const SCHEME: &'static str = "v4l";
}

impl FromUrl for V4lInput {
  type Error = AcquisitionError;

  /// 格式: `v4l://0` 或 `v4l:0`，缺省为 0 号设备
  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      error!(
        "URI scheme mismatch: expected '{}', found '{}'",
        Self::SCHEME,
        url.scheme()
      );
      return Err(AcquisitionError::SchemeMismatch(url.scheme().to_string()));
    }

    let raw = url
      .host_str()
      .filter(|host| !host.is_empty())
      .unwrap_or_else(|| url.path().trim_start_matches('/'));
    let index = if raw.is_empty() {
      0
    } else {
      raw
        .parse::<usize>()
        .map_err(|_| device_error(format!("无效的设备编号: {}", raw)))?
    };

    Self::open(index)
  }
}

impl V4lInput {
  pub fn open(index: usize) -> Result<Self, AcquisitionError> {
    let device = Device::new(index).map_err(device_error)?;
    let format = device.format().map_err(device_error)?;

    // 流持有设备句柄的共享引用，不借用 `device`
    let stream = Stream::with_buffers(&device, Type::VideoCapture, V4L_BUFFER_COUNT)
      .map_err(device_error)?;

    info!(
      "打开摄像头 {}: {}x{} [{}]",
      index, format.width, format.height, format.fourcc
    );

    Ok(V4lInput {
      stream: Some(stream),
      device: Some(device),
      fourcc: format.fourcc,
      width: format.width,
      height: format.height,
      next_index: 0,
      opened_at: Instant::now(),
    })
  }

  fn decode(&self, data: &[u8]) -> Result<RgbImage, AcquisitionError> {
    match self.fourcc.str().map_err(device_error)? {
      "MJPG" => Ok(image::load_from_memory_with_format(data, ImageFormat::Jpeg)?.to_rgb8()),
      "YUYV" => Ok(yuyv_to_rgb(data, self.width, self.height)),
      other => Err(device_error(format!("不支持的像素格式: {}", other))),
    }
  }
}

impl FrameSource for V4lInput {
  fn acquire(&mut self) -> Result<Option<Frame>, AcquisitionError> {
    let Some(stream) = self.stream.as_mut() else {
      return Ok(None);
    };
    let (data, _meta) = stream.next().map_err(device_error)?;
    let data = data.to_vec();

    let image = self.decode(&data)?;
    let index = self.next_index;
    self.next_index += 1;
    let timestamp_ms = self.opened_at.elapsed().as_millis() as u64;
    Ok(Some(Frame::new(image, index, timestamp_ms)))
  }

  fn release(&mut self) {
    if self.stream.take().is_some() {
      warn!("关闭摄像头采集流");
    }
    if self.device.take().is_some() {
      info!("关闭摄像头设备");
    }
  }
}

/// YUYV (4:2:2) 转 RGB，BT.601
fn yuyv_to_rgb(yuyv: &[u8], width: u32, height: u32) -> RgbImage {
  let mut out = RgbImage::new(width, height);
  if width == 0 {
    return out;
  }
  let convert = |y: f32, u: f32, v: f32| {
    Rgb([
      (y + 1.402 * v).clamp(0.0, 255.0) as u8,
      (y - 0.344136 * u - 0.714136 * v).clamp(0.0, 255.0) as u8,
      (y + 1.772 * u).clamp(0.0, 255.0) as u8,
    ])
  };

  for (i, chunk) in yuyv.chunks_exact(4).enumerate() {
    let u = chunk[1] as f32 - 128.0;
    let v = chunk[3] as f32 - 128.0;
    let pixel = i as u32 * 2;
    let (x, y) = (pixel % width, pixel / width);
    if y >= height {
      break;
    }
    out.put_pixel(x, y, convert(chunk[0] as f32, u, v));
    if x + 1 < width {
      out.put_pixel(x + 1, y, convert(chunk[2] as f32, u, v));
    }
  }
  out
}

#[cfg(test)]
mod tests {
  use super::*;

  fn closed_input() -> V4lInput {
    V4lInput {
      stream: None,
      device: None,
      fourcc: FourCC::new(b"YUYV"),
      width: 2,
      height: 1,
      next_index: 0,
      opened_at: Instant::now(),
    }
  }

  #[test]
  fn released_input_yields_no_frames() {
    let mut input = closed_input();
    input.release();
    input.release();
    assert!(input.stream.is_none());
    assert!(input.device.is_none());
    assert!(input.acquire().unwrap().is_none());
  }

  #[test]
  fn missing_device_is_reported() {
    let url = Url::parse("v4l://4095").unwrap();
    assert!(matches!(V4lInput::from_url(&url), Err(AcquisitionError::Device(_))));
  }

  #[test]
  fn yuyv_gray_converts_to_gray() {
    let image = yuyv_to_rgb(&[128, 128, 128, 128], 2, 1);
    assert_eq!(*image.get_pixel(0, 0), Rgb([128, 128, 128]));
    assert_eq!(*image.get_pixel(1, 0), Rgb([128, 128, 128]));
  }
}
