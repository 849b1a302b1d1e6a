// 该文件是 Kuangxuan （框选） 项目的一部分。
// src/output/draw.rs - 目标检测结果可视化
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

use std::path::Path;

use ab_glyph::{FontArc, PxScale};
use image::{Rgb, RgbImage};
use imageproc::{
  drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut, text_size},
  rect::Rect,
};
use thiserror::Error;
use tracing::info;

use crate::{
  config::ColorIndexing,
  frame::Frame,
  model::{ClassList, DetectResult, Detection},
  output::{ColorTable, Overlay},
};

// 文本渲染常量
const LABEL_FONT_SIZE: f32 = 16.0;
const LABEL_PADDING: i32 = 2;
const BOX_THICKNESS: i32 = 2;
const TEXT_COLOR: Rgb<u8> = Rgb([255, 255, 255]);
const FPS_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
const FPS_ORIGIN: (i32, i32) = (8, 8);

#[derive(Error, Debug)]
pub enum DrawError {
  #[error("读取字体文件失败: {0}")]
  Io(#[from] std::io::Error),
  #[error("字体文件无效: {0}")]
  InvalidFont(#[from] ab_glyph::InvalidFont),
}

/// 绘制配置：类别名称、配色表与可选字体
///
/// 没有字体时只画框，不画标签与帧率。
#[derive(Clone)]
pub struct Draw {
  classes: ClassList,
  colors: ColorTable,
  indexing: ColorIndexing,
  font: Option<FontArc>,
  font_scale: PxScale,
  show_confidence: bool,
}

impl Draw {
  pub fn new(classes: ClassList, colors: ColorTable, indexing: ColorIndexing) -> Self {
    Self {
      classes,
      colors,
      indexing,
      font: None,
      font_scale: PxScale::from(LABEL_FONT_SIZE),
      show_confidence: true,
    }
  }

  pub fn load_font(path: impl AsRef<Path>) -> Result<FontArc, DrawError> {
    let path = path.as_ref();
    let font = FontArc::try_from_vec(std::fs::read(path)?)?;
    info!("加载字体: {}", path.display());
    Ok(font)
  }

  pub fn with_font(mut self, font: FontArc) -> Self {
    self.font = Some(font);
    self
  }

  pub fn with_font_size(mut self, size: f32) -> Self {
    self.font_scale = PxScale::from(size);
    self
  }

  pub fn show_confidence(mut self, show: bool) -> Self {
    self.show_confidence = show;
    self
  }

  pub fn classes(&self) -> &ClassList {
    &self.classes
  }

  /// 检测框的颜色；`index` 是它在解码结果中的下标
  pub fn color_for(&self, index: usize, detection: &Detection) -> Rgb<u8> {
    match self.indexing {
      ColorIndexing::ByDetection => self.colors.get(index),
      ColorIndexing::ByClass => self.colors.get(detection.class_id),
    }
  }

  pub fn label_for(&self, detection: &Detection) -> String {
    let name = self.classes.label(detection.class_id);
    if self.show_confidence {
      format!("{} {:.2}", name, detection.confidence)
    } else {
      name
    }
  }

  /// 复制一帧并在副本上绘制
  pub fn draw_detection(&self, frame: &Frame, result: &DetectResult, overlay: &Overlay) -> RgbImage {
    let mut image = frame.image.clone();
    self.draw_detections_on_image(&mut image, result, overlay);
    image
  }

  pub fn draw_detections_on_image(
    &self,
    image: &mut RgbImage,
    result: &DetectResult,
    overlay: &Overlay,
  ) {
    for (index, detection) in result.indexed() {
      let color = self.color_for(index, detection);
      if let Some((x, y)) = draw_box(image, detection, color) {
        self.draw_label(image, x, y, &self.label_for(detection), color);
      }
    }

    if let (Some(fps), Some(font)) = (overlay.fps, self.font.as_ref()) {
      let text = format!("FPS: {:.1}", fps);
      draw_text_mut(
        image,
        FPS_COLOR,
        FPS_ORIGIN.0,
        FPS_ORIGIN.1,
        self.font_scale,
        font,
        &text,
      );
    }
  }

  fn draw_label(&self, image: &mut RgbImage, x: i32, y: i32, label: &str, color: Rgb<u8>) {
    let Some(font) = self.font.as_ref() else {
      return;
    };

    let (text_w, text_h) = text_size(self.font_scale, font, label);
    if text_w == 0 || text_h == 0 {
      return;
    }
    let background_h = text_h as i32 + 2 * LABEL_PADDING;
    // 标签放在框的上方，贴顶时压进框内
    let label_y = (y - background_h).max(0);

    let background = Rect::at(x, label_y).of_size(
      text_w + 2 * LABEL_PADDING as u32,
      background_h as u32,
    );
    draw_filled_rect_mut(image, background, color);
    draw_text_mut(
      image,
      TEXT_COLOR,
      x + LABEL_PADDING,
      label_y + LABEL_PADDING,
      self.font_scale,
      font,
      label,
    );
  }
}

/// 画出检测框在画面内的部分，返回可见区域左上角；完全不可见时返回 None
fn draw_box(image: &mut RgbImage, detection: &Detection, color: Rgb<u8>) -> Option<(i32, i32)> {
  let (img_w, img_h) = (image.width() as i64, image.height() as i64);
  if img_w == 0 || img_h == 0 || detection.w <= 0 || detection.h <= 0 {
    return None;
  }

  let left = detection.x as i64;
  let top = detection.y as i64;
  let right = left + detection.w as i64 - 1;
  let bottom = top + detection.h as i64 - 1;
  if right < 0 || bottom < 0 || left >= img_w || top >= img_h {
    return None;
  }

  let x_min = left.max(0);
  let y_min = top.max(0);
  let x_max = right.min(img_w - 1);
  let y_max = bottom.min(img_h - 1);

  for t in 0..BOX_THICKNESS as i64 {
    let (x0, y0, x1, y1) = (x_min + t, y_min + t, x_max - t, y_max - t);
    if x0 > x1 || y0 > y1 {
      break;
    }
    let rect = Rect::at(x0 as i32, y0 as i32).of_size((x1 - x0 + 1) as u32, (y1 - y0 + 1) as u32);
    draw_hollow_rect_mut(image, rect, color);
  }

  Some((x_min as i32, y_min as i32))
}

#[cfg(test)]
mod tests {
  use super::*;

  fn det(class_id: usize, x: i32, y: i32, w: i32, h: i32) -> Detection {
    Detection {
      class_id,
      confidence: 0.87,
      x,
      y,
      w,
      h,
    }
  }

  fn draw(indexing: ColorIndexing) -> Draw {
    Draw::new(ClassList::coco(), ColorTable::new(80, 3), indexing)
  }

  #[test]
  fn draws_box_outline() {
    let draw = draw(ColorIndexing::ByClass);
    let mut image = RgbImage::new(50, 50);
    let result = DetectResult::from(vec![det(2, 10, 10, 20, 20)]);
    draw.draw_detections_on_image(&mut image, &result, &Overlay::default());

    let color = draw.color_for(0, &result.items[0]);
    assert_eq!(*image.get_pixel(10, 10), color);
    assert_eq!(*image.get_pixel(29, 29), color);
    assert_eq!(*image.get_pixel(11, 11), color);
    assert_eq!(*image.get_pixel(20, 20), Rgb([0, 0, 0]));
  }

  #[test]
  fn empty_result_leaves_image_untouched() {
    let draw = draw(ColorIndexing::ByClass);
    let mut image = RgbImage::from_pixel(8, 8, Rgb([7, 7, 7]));
    let before = image.clone();
    draw.draw_detections_on_image(&mut image, &DetectResult::default(), &Overlay::default());
    assert_eq!(image, before);
  }

  #[test]
  fn boxes_outside_frame_are_skipped() {
    let draw = draw(ColorIndexing::ByClass);
    let mut image = RgbImage::new(20, 20);
    let before = image.clone();
    let result = DetectResult::from(vec![
      det(0, -40, -40, 10, 10),
      det(0, 25, 0, 5, 5),
      det(0, 5, 5, 0, 5),
    ]);
    draw.draw_detections_on_image(&mut image, &result, &Overlay::default());
    assert_eq!(image, before);
  }

  #[test]
  fn partially_visible_box_is_clipped() {
    let draw = draw(ColorIndexing::ByClass);
    let mut image = RgbImage::new(20, 20);
    let result = DetectResult::from(vec![det(0, -5, -5, 10, 10)]);
    draw.draw_detections_on_image(&mut image, &result, &Overlay::default());
    let color = draw.color_for(0, &result.items[0]);
    assert_eq!(*image.get_pixel(0, 0), color);
    assert_eq!(*image.get_pixel(4, 4), color);
    assert_eq!(*image.get_pixel(10, 10), Rgb([0, 0, 0]));
  }

  #[test]
  fn color_indexing_selects_key() {
    let by_class = draw(ColorIndexing::ByClass);
    let by_detection = draw(ColorIndexing::ByDetection);
    let a = det(5, 0, 0, 1, 1);
    let table = ColorTable::new(80, 3);
    assert_eq!(by_class.color_for(0, &a), table.get(5));
    assert_eq!(by_class.color_for(9, &a), table.get(5));
    assert_eq!(by_detection.color_for(9, &a), table.get(9));
  }

  #[test]
  fn detection_color_follows_decode_index() {
    use crate::model::{RawRow, decode, suppress};

    let rows = vec![
      RawRow::new(0.20, 0.20, 0.10, 0.10, vec![0.9]),
      RawRow::new(0.21, 0.20, 0.10, 0.10, vec![0.8]),
      RawRow::new(0.70, 0.70, 0.10, 0.10, vec![0.7]),
    ];
    let decoded = decode(&rows, 100, 100, 0.5, 1).unwrap();
    let kept = suppress(&decoded, 0.4, 0.6);
    assert_eq!(kept.as_slice(), &[0, 2]);
    let result = decoded.select(&kept);

    let draw = draw(ColorIndexing::ByDetection);
    let table = ColorTable::new(80, 3);
    assert_ne!(table.get(1), table.get(2));

    let mut image = RgbImage::new(100, 100);
    draw.draw_detections_on_image(&mut image, &result, &Overlay::default());
    let third = result.items[1];
    let corner = image.get_pixel(third.x as u32, third.y as u32);
    assert_eq!(*corner, table.get(2));
  }

  #[test]
  fn label_includes_rounded_confidence() {
    let draw = draw(ColorIndexing::ByClass);
    assert_eq!(draw.label_for(&det(0, 0, 0, 1, 1)), "person 0.87");
    let draw = draw.show_confidence(false);
    assert_eq!(draw.label_for(&det(2, 0, 0, 1, 1)), "car");
  }
}
