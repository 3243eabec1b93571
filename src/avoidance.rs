// 该文件是 Skyscout （天巡） 项目的一部分。
// src/avoidance.rs - 基于深度图的避障向量
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

use std::collections::HashMap;

use image::{GrayImage, Luma, imageops};
use imageproc::region_labelling::{Connectivity, connected_components};
use tracing::debug;

use crate::model::DepthMap;

pub const DEFAULT_DEPTH_THRESHOLD: u8 = 190;
pub const DEFAULT_MARGIN_X: f64 = 0.25;
pub const DEFAULT_MARGIN_Y: f64 = 1.0 / 3.0;

const FREE: u8 = 255;
const OBSTACLE: u8 = 0;

/// 正值表示安全通道中心位于画面中心右侧
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AvoidanceVector {
  pub offset: f64,
  pub has_safe_path: bool,
}

impl AvoidanceVector {
  pub const BLOCKED: AvoidanceVector = AvoidanceVector {
    offset: 0.0,
    has_safe_path: false,
  };
}

/// 中心裁剪区域（全帧像素坐标）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropRegion {
  pub x: u32,
  pub y: u32,
  pub width: u32,
  pub height: u32,
}

#[derive(Debug, Clone)]
pub struct Segmentation {
  pub vector: AvoidanceVector,
  pub crop: CropRegion,
  /// 最大自由区域质心（全帧坐标）
  pub centroid: Option<(f64, f64)>,
  /// 归一化到 [0,255] 的整帧深度
  pub normalized: GrayImage,
}

#[derive(Debug, Clone, Copy)]
pub struct ObstacleSegmenter {
  threshold: u8,
  margin_x: f64,
  margin_y: f64,
}

impl Default for ObstacleSegmenter {
  fn default() -> Self {
    Self::new(DEFAULT_DEPTH_THRESHOLD)
  }
}

impl ObstacleSegmenter {
  pub fn new(threshold: u8) -> Self {
    Self {
      threshold,
      margin_x: DEFAULT_MARGIN_X,
      margin_y: DEFAULT_MARGIN_Y,
    }
  }

  /// 每侧舍弃的宽高比例，取值限制在 [0, 0.5)
  pub fn with_margins(mut self, margin_x: f64, margin_y: f64) -> Self {
    self.margin_x = margin_x.clamp(0.0, 0.499);
    self.margin_y = margin_y.clamp(0.0, 0.499);
    self
  }

  pub fn threshold(&self) -> u8 {
    self.threshold
  }

  pub fn crop_region(&self, width: u32, height: u32) -> CropRegion {
    let scrap_x = (width as f64 * self.margin_x).floor() as u32;
    let scrap_y = (height as f64 * self.margin_y).floor() as u32;
    CropRegion {
      x: scrap_x,
      y: scrap_y,
      width: width.saturating_sub(2 * scrap_x),
      height: height.saturating_sub(2 * scrap_y),
    }
  }

  pub fn segment(&self, depth: &DepthMap) -> Segmentation {
    let (width, height) = depth.dimensions();
    let normalized = normalize(depth);
    let crop = self.crop_region(width, height);

    let binary: GrayImage = imageops::crop_imm(&normalized, crop.x, crop.y, crop.width, crop.height)
      .to_image();
    let binary = GrayImage::from_fn(binary.width(), binary.height(), |x, y| {
      if binary.get_pixel(x, y)[0] >= self.threshold {
        Luma([OBSTACLE])
      } else {
        Luma([FREE])
      }
    });

    let centroid = largest_region_centroid(&binary)
      .map(|(cx, cy)| (crop.x as f64 + cx, crop.y as f64 + cy));

    let vector = match centroid {
      Some((cx, _)) => AvoidanceVector {
        offset: cx - width as f64 / 2.0,
        has_safe_path: true,
      },
      None => AvoidanceVector::BLOCKED,
    };
    debug!(
      "裁剪区域 {:?}, 质心 {:?}, 避障向量 {:?}",
      crop, centroid, vector
    );

    Segmentation {
      vector,
      crop,
      centroid,
      normalized,
    }
  }
}

/// 全帧最小-最大归一化并向下取整，非有限值与无动态范围的帧映射为 0
pub fn normalize(depth: &DepthMap) -> GrayImage {
  let (min, max) = depth
    .pixels()
    .map(|p| p[0])
    .filter(|v| v.is_finite())
    .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), v| {
      (lo.min(v), hi.max(v))
    });
  let range = max - min;

  GrayImage::from_fn(depth.width(), depth.height(), |x, y| {
    let v = depth.get_pixel(x, y)[0];
    if !v.is_finite() || !(range > 0.0) {
      return Luma([0]);
    }
    Luma([(((v - min) / range) * 255.0).clamp(0.0, 255.0) as u8])
  })
}

/// 按像素面积取最大的 8 连通自由区域，返回其质心（像素中心坐标）
fn largest_region_centroid(binary: &GrayImage) -> Option<(f64, f64)> {
  if binary.width() == 0 || binary.height() == 0 {
    return None;
  }
  let labels = connected_components(binary, Connectivity::Eight, Luma([OBSTACLE]));

  // label -> (面积, Σx, Σy)
  let mut regions: HashMap<u32, (u64, f64, f64)> = HashMap::new();
  for (x, y, label) in labels.enumerate_pixels() {
    let label = label[0];
    if label == 0 {
      continue;
    }
    let entry = regions.entry(label).or_insert((0, 0.0, 0.0));
    entry.0 += 1;
    entry.1 += x as f64 + 0.5;
    entry.2 += y as f64 + 0.5;
  }

  regions
    .into_iter()
    .max_by(|(la, a), (lb, b)| a.0.cmp(&b.0).then(lb.cmp(la)))
    .map(|(_, (area, sx, sy))| (sx / area as f64, sy / area as f64))
}
