// 该文件是 Skyscout （天巡） 项目的一部分。
// src/output/draw.rs - 检测与避障结果可视化
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
use image::{Pixel, Rgb, RgbImage, RgbaImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_hollow_rect_mut, draw_text_mut};
use imageproc::rect::Rect;

use crate::{
  avoidance::Segmentation,
  model::DetectItem,
  output::{Render, StorageError},
};

const BOX_THICKNESS: u32 = 4;
const PALETTE_SIZE: u32 = 80;
const CROP_COLOR: [u8; 3] = [255, 255, 0];
const SAFE_COLOR: [u8; 3] = [0, 255, 0];
const SAFE_MARKER_RADIUS: i32 = 5;
const FONT_SIZE: f32 = 16.0;
const LABEL_OFFSET: i32 = 20;
const CAPTION_OFFSET: i32 = 10;

pub struct Draw {
  thickness: u32,
  /// 边界框颜色映射
  colors: Vec<Rgb<u8>>,
  /// 未加载字体时只绘制图形
  font: Option<FontArc>,
  font_scale: PxScale,
  watermark: Option<RgbaImage>,
}

impl Default for Draw {
  fn default() -> Self {
    // 每个类别一种颜色
    let colors = (0..PALETTE_SIZE)
      .map(|i| hsv_to_rgb((i as f32 / PALETTE_SIZE as f32) * 360.0, 0.8, 0.9))
      .collect();

    Self {
      thickness: BOX_THICKNESS,
      colors,
      font: None,
      font_scale: PxScale::from(FONT_SIZE),
      watermark: None,
    }
  }
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

/// 近似 OpenCV OCEAN 色图
fn ocean(v: u8) -> Rgb<u8> {
  let v = v as u16;
  let r = v.saturating_sub(170) * 3;
  let g = v.saturating_sub(85) * 3 / 2;
  Rgb([r.min(255) as u8, g.min(255) as u8, v as u8])
}

impl Draw {
  pub fn with_font(mut self, font: FontArc) -> Self {
    self.font = Some(font);
    self
  }

  pub fn with_font_file(self, path: impl AsRef<Path>) -> Result<Self, StorageError> {
    let font = FontArc::try_from_vec(std::fs::read(path)?)?;
    Ok(self.with_font(font))
  }

  /// 水印叠加在检测图像左上角
  pub fn with_watermark(mut self, watermark: RgbaImage) -> Self {
    self.watermark = Some(watermark);
    self
  }

  pub fn with_watermark_file(self, path: impl AsRef<Path>) -> Result<Self, StorageError> {
    let watermark = image::open(path)?.to_rgba8();
    Ok(self.with_watermark(watermark))
  }

  pub fn color_for(&self, class_id: u32) -> Rgb<u8> {
    self.colors[class_id as usize % self.colors.len()]
  }

  fn draw_label(&self, image: &mut RgbImage, x: i32, y: i32, color: Rgb<u8>, text: &str) {
    if let Some(font) = &self.font {
      draw_text_mut(image, color, x, y.max(0), self.font_scale, font, text);
    }
  }

  fn apply_watermark(&self, image: &mut RgbImage) {
    let Some(mark) = &self.watermark else {
      return;
    };
    let width = mark.width().min(image.width());
    let height = mark.height().min(image.height());
    for y in 0..height {
      for x in 0..width {
        let mut pixel = image.get_pixel(x, y).to_rgba();
        pixel.blend(mark.get_pixel(x, y));
        image.put_pixel(x, y, pixel.to_rgb());
      }
    }
  }

  // bbox 为归一化坐标 [y_min, x_min, y_max, x_max]，返回框的左上角
  fn draw_bbox(&self, image: &mut RgbImage, bbox: &[f32; 4], color: Rgb<u8>) -> Option<(i32, i32)> {
    let (w, h) = (image.width() as f32, image.height() as f32);
    if w < 1.0 || h < 1.0 {
      return None;
    }

    let x_min = ((bbox[1] * w).floor() as i32).clamp(0, w as i32 - 1);
    let y_min = ((bbox[0] * h).floor() as i32).clamp(0, h as i32 - 1);
    let x_max = ((bbox[3] * w).ceil() as i32).clamp(0, w as i32 - 1);
    let y_max = ((bbox[2] * h).ceil() as i32).clamp(0, h as i32 - 1);

    if x_min >= x_max || y_min >= y_max {
      return None;
    }

    for t in 0..self.thickness as i32 {
      let width = x_max - x_min - 2 * t;
      let height = y_max - y_min - 2 * t;
      if width <= 0 || height <= 0 {
        break;
      }
      let rect = Rect::at(x_min + t, y_min + t).of_size(width as u32, height as u32);
      draw_hollow_rect_mut(image, rect, color);
    }
    Some((x_min, y_min))
  }
}

impl Render<[DetectItem]> for Draw {
  fn render(&self, frame: &RgbImage, items: &[DetectItem]) -> RgbImage {
    let mut image = frame.clone();
    for item in items {
      let color = self.color_for(item.class_id);
      if let Some((x, y)) = self.draw_bbox(&mut image, &item.bbox, color) {
        let label = format!("{}: {:.2}", item.class_name, item.score);
        self.draw_label(&mut image, x, y - LABEL_OFFSET, color, &label);
      }
    }
    self.apply_watermark(&mut image);
    image
  }
}

impl Render<Segmentation> for Draw {
  fn render(&self, _frame: &RgbImage, seg: &Segmentation) -> RgbImage {
    let depth = &seg.normalized;
    let mut image = RgbImage::from_fn(depth.width(), depth.height(), |x, y| {
      ocean(depth.get_pixel(x, y)[0])
    });

    if seg.crop.width > 0 && seg.crop.height > 0 {
      let rect = Rect::at(seg.crop.x as i32, seg.crop.y as i32)
        .of_size(seg.crop.width, seg.crop.height);
      draw_hollow_rect_mut(&mut image, rect, Rgb(CROP_COLOR));
    }

    if let Some((cx, cy)) = seg.centroid {
      draw_filled_circle_mut(
        &mut image,
        (cx as i32, cy as i32),
        SAFE_MARKER_RADIUS,
        Rgb(SAFE_COLOR),
      );
      self.draw_label(
        &mut image,
        cx as i32,
        cy as i32 - CAPTION_OFFSET,
        Rgb(SAFE_COLOR),
        "safe",
      );
    }
    image
  }
}

#[cfg(test)]
mod tests {
  use image::{ImageBuffer, Luma, Rgba};
  use tempfile::tempdir;

  use super::*;
  use crate::avoidance::ObstacleSegmenter;

  #[test]
  fn box_edges_are_painted_with_class_color() {
    let draw = Draw::default();
    let frame = RgbImage::new(100, 100);
    let item = DetectItem {
      class_id: 3,
      class_name: "car".into(),
      score: 0.9,
      bbox: [0.2, 0.1, 0.8, 0.5],
    };
    let image = draw.render(&frame, std::slice::from_ref(&item));

    let color = draw.color_for(3);
    assert_eq!(*image.get_pixel(10, 20), color);
    assert_eq!(*image.get_pixel(30, 50), Rgb([0, 0, 0]));
  }

  #[test]
  fn degenerate_box_is_skipped() {
    let draw = Draw::default();
    let frame = RgbImage::new(10, 10);
    let item = DetectItem {
      class_id: 0,
      class_name: "x".into(),
      score: 1.0,
      bbox: [0.5, 0.5, 0.5, 0.5],
    };
    assert_eq!(draw.render(&frame, std::slice::from_ref(&item)), frame);
  }

  #[test]
  fn depth_render_marks_safe_centroid() {
    let depth: ImageBuffer<Luma<f32>, Vec<f32>> = ImageBuffer::from_pixel(64, 48, Luma([1.0]));
    let seg = ObstacleSegmenter::default().segment(&depth);
    let (cx, cy) = seg.centroid.unwrap();

    let image = Draw::default().render(&RgbImage::new(64, 48), &seg);
    assert_eq!(image.dimensions(), (64, 48));
    assert_eq!(*image.get_pixel(cx as u32, cy as u32), Rgb(SAFE_COLOR));
    assert_eq!(*image.get_pixel(seg.crop.x, seg.crop.y), Rgb(CROP_COLOR));
  }

  #[test]
  fn opaque_watermark_replaces_corner_pixels() {
    let mut mark = RgbaImage::from_pixel(4, 4, Rgba([255, 0, 0, 255]));
    mark.put_pixel(3, 3, Rgba([255, 0, 0, 0]));
    let draw = Draw::default().with_watermark(mark);
    let items: &[DetectItem] = &[];

    let image = draw.render(&RgbImage::from_pixel(20, 20, Rgb([0, 0, 255])), items);
    assert_eq!(*image.get_pixel(0, 0), Rgb([255, 0, 0]));
    assert_eq!(*image.get_pixel(3, 3), Rgb([0, 0, 255]));
    assert_eq!(*image.get_pixel(10, 10), Rgb([0, 0, 255]));
  }

  #[test]
  fn watermark_larger_than_frame_is_clipped() {
    let draw = Draw::default().with_watermark(RgbaImage::from_pixel(50, 50, Rgba([9, 9, 9, 255])));
    let items: &[DetectItem] = &[];
    let image = draw.render(&RgbImage::new(8, 6), items);
    assert_eq!(image.dimensions(), (8, 6));
    assert_eq!(*image.get_pixel(7, 5), Rgb([9, 9, 9]));
  }

  #[test]
  fn invalid_font_file_is_rejected() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("broken.ttf");
    std::fs::write(&path, b"not a font").unwrap();
    assert!(matches!(
      Draw::default().with_font_file(&path),
      Err(StorageError::FontError(_))
    ));
    assert!(matches!(
      Draw::default().with_font_file(dir.path().join("missing.ttf")),
      Err(StorageError::IoError(_))
    ));
  }
}
