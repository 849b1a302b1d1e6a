// 该文件是 Kuangxuan （框选） 项目的一部分。
// src/output/color.rs - 确定性配色表
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

use image::Rgb;

/// 默认配色种子
pub const DEFAULT_COLOR_SEED: u64 = 0x6b78_2d63_6f6c_6f72;

/// 由种子和键确定的配色表
///
/// 同一种子、同一键在任何一次运行中都得到同一颜色。表在创建时预先计算
/// `len` 个颜色，超出部分按同一规则即时计算。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColorTable {
  seed: u64,
  colors: Vec<Rgb<u8>>,
}

impl ColorTable {
  pub fn new(len: usize, seed: u64) -> Self {
    let colors = (0..len).map(|key| color_of(seed, key)).collect();
    Self { seed, colors }
  }

  pub fn seed(&self) -> u64 {
    self.seed
  }

  pub fn len(&self) -> usize {
    self.colors.len()
  }

  pub fn is_empty(&self) -> bool {
    self.colors.is_empty()
  }

  pub fn get(&self, key: usize) -> Rgb<u8> {
    self
      .colors
      .get(key)
      .copied()
      .unwrap_or_else(|| color_of(self.seed, key))
  }
}

fn splitmix64(mut z: u64) -> u64 {
  z = z.wrapping_add(0x9e37_79b9_7f4a_7c15);
  z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
  z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
  z ^ (z >> 31)
}

/// 键对应的颜色：哈希决定色相，饱和度与明度保持在醒目的区间
pub fn color_of(seed: u64, key: usize) -> Rgb<u8> {
  let hash = splitmix64(seed ^ splitmix64(key as u64));
  let hue = (hash >> 11) as f32 / (1u64 << 53) as f32 * 360.0;
  let saturation = 0.65 + (hash & 0xff) as f32 / 255.0 * 0.3;
  let value = 0.85 + ((hash >> 8) & 0xff) as f32 / 255.0 * 0.15;
  hsv_to_rgb(hue, saturation, value)
}

/// HSV 转 RGB
fn hsv_to_rgb(h: f32, s: f32, v: f32) -> Rgb<u8> {
  let c = v * s;
  let x = c * (1.0 - ((h / 60.0) % 2.0 - 1.0).abs());
  let m = v - c;

  let (r, g, b) = if h < 60.0 {
    (c, x, 0.0)
  } else if h < 120.0 {
    (x, c, 0.0)
  } else if h < 180.0 {
    (0.0, c, x)
  } else if h < 240.0 {
    (0.0, x, c)
  } else if h < 300.0 {
    (x, 0.0, c)
  } else {
    (c, 0.0, x)
  };

  Rgb([
    ((r + m) * 255.0) as u8,
    ((g + m) * 255.0) as u8,
    ((b + m) * 255.0) as u8,
  ])
}
