// 该文件是 Skyscout （天巡） 项目的一部分。
// src/model/recorded.rs - 基于离线推理产物的模型
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
use std::path::{Path, PathBuf};

use image::{ImageBuffer, Luma, imageops::FilterType};
use thiserror::Error;
use tracing::{debug, info};

use crate::model::{DepthMap, DetectItem, DetectResult, InferenceFrame, Model, ModelCatalog};

const DETECTIONS_FILE: &str = "detections.csv";
const LABELS_FILE: &str = "labels.txt";

/// 深度引擎可接受的 MiDaS 系列模型
pub const MIDAS_MODELS: [&str; 12] = [
  "DPT_BEiT_L_512",
  "DPT_BEiT_L_384",
  "DPT_SwinV2_L_384",
  "DPT_SwinV2_B_384",
  "DPT_SwinV2_T_256",
  "DPT_Swin_L_384",
  "DPT_Next_ViT_L_384",
  "DPT_LeViT_224",
  "DPT_Large",
  "DPT_Hybrid",
  "MiDaS",
  "MiDaS_small",
];

#[derive(Error, Debug)]
pub enum RecordedModelError {
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("图像错误: {0}")]
  ImageError(#[from] image::ImageError),
  #[error("{file} 第 {line} 行格式错误: {reason}")]
  ParseError {
    file: PathBuf,
    line: usize,
    reason: String,
  },
}

/// 回放 `detections.csv` 中预先计算好的检测结果
#[derive(Debug)]
pub struct RecordedDetector {
  threshold: f32,
  frames: HashMap<u64, Vec<DetectItem>>,
}

pub struct RecordedDetectorCatalog {
  root: PathBuf,
}

impl RecordedDetectorCatalog {
  pub fn new(root: impl Into<PathBuf>) -> Self {
    Self { root: root.into() }
  }
}

fn read_labels(path: &Path) -> Result<Vec<String>, RecordedModelError> {
  if !path.exists() {
    debug!("标签文件不存在: {}", path.display());
    return Ok(Vec::new());
  }
  Ok(
    std::fs::read_to_string(path)?
      .lines()
      .map(|line| line.trim().to_string())
      .collect(),
  )
}

fn parse_detection_line(
  line: &str,
  labels: &[String],
) -> Result<(u64, DetectItem), String> {
  let fields: Vec<&str> = line.split(',').map(str::trim).collect();
  if fields.len() != 7 {
    return Err(format!("期望 7 个字段，实际 {} 个", fields.len()));
  }

  let frame_id = fields[0].parse::<u64>().map_err(|e| e.to_string())?;
  let class_id = fields[1].parse::<u32>().map_err(|e| e.to_string())?;
  let score = fields[2].parse::<f32>().map_err(|e| e.to_string())?;
  let mut bbox = [0f32; 4];
  for (slot, field) in bbox.iter_mut().zip(&fields[3..]) {
    *slot = field.parse::<f32>().map_err(|e| e.to_string())?;
  }

  let class_name = labels
    .get(class_id as usize)
    .filter(|name| !name.is_empty())
    .cloned()
    .unwrap_or_else(|| format!("class-{}", class_id));

  Ok((
    frame_id,
    DetectItem {
      class_id,
      class_name,
      score,
      bbox,
    },
  ))
}

impl ModelCatalog for RecordedDetectorCatalog {
  type Model = RecordedDetector;
  type Error = RecordedModelError;

  fn contains(&self, name: &str) -> bool {
    self.root.join(name).is_dir()
  }

  fn load(&self, name: &str, threshold: f32) -> Result<RecordedDetector, RecordedModelError> {
    let dir = self.root.join(name);
    let labels = read_labels(&dir.join(LABELS_FILE))?;
    let path = dir.join(DETECTIONS_FILE);
    info!("加载检测记录: {}", path.display());
    let content = std::fs::read_to_string(&path)?;

    let mut frames: HashMap<u64, Vec<DetectItem>> = HashMap::new();
    for (index, line) in content.lines().enumerate() {
      let line = line.trim();
      if line.is_empty() || line.starts_with('#') {
        continue;
      }
      let (frame_id, item) =
        parse_detection_line(line, &labels).map_err(|reason| RecordedModelError::ParseError {
          file: path.clone(),
          line: index + 1,
          reason,
        })?;
      frames.entry(frame_id).or_default().push(item);
    }
    debug!("共 {} 帧检测记录", frames.len());

    Ok(RecordedDetector { threshold, frames })
  }
}

impl Model for RecordedDetector {
  type Input = InferenceFrame;
  type Output = DetectResult;
  type Error = RecordedModelError;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error> {
    let items = self
      .frames
      .get(&input.frame_id)
      .map(|items| {
        items
          .iter()
          .filter(|item| item.score >= self.threshold)
          .cloned()
          .collect::<Vec<_>>()
      })
      .unwrap_or_default();

    debug!("帧 {} 检测到 {} 个物体", input.frame_id, items.len());
    Ok(DetectResult {
      items: items.into_boxed_slice(),
    })
  }
}

/// 逐帧读取 `<frame_id>.png` 深度图
#[derive(Debug)]
pub struct RecordedDepth {
  dir: PathBuf,
}

pub struct RecordedDepthCatalog {
  root: PathBuf,
  allowed: Option<Vec<String>>,
}

impl RecordedDepthCatalog {
  pub fn new(root: impl Into<PathBuf>) -> Self {
    Self {
      root: root.into(),
      allowed: None,
    }
  }

  pub fn midas(root: impl Into<PathBuf>) -> Self {
    Self::new(root).with_allowed(MIDAS_MODELS.iter().map(|s| s.to_string()).collect())
  }

  pub fn with_allowed(mut self, allowed: Vec<String>) -> Self {
    self.allowed = Some(allowed);
    self
  }
}

impl ModelCatalog for RecordedDepthCatalog {
  type Model = RecordedDepth;
  type Error = RecordedModelError;

  fn contains(&self, name: &str) -> bool {
    let allowed = self
      .allowed
      .as_ref()
      .map(|names| names.iter().any(|n| n == name))
      .unwrap_or(true);
    allowed && self.root.join(name).is_dir()
  }

  fn load(&self, name: &str, _threshold: f32) -> Result<RecordedDepth, RecordedModelError> {
    let dir = self.root.join(name);
    // 确认目录可读
    std::fs::read_dir(&dir)?;
    info!("深度模型目录: {}", dir.display());
    Ok(RecordedDepth { dir })
  }
}

impl Model for RecordedDepth {
  type Input = InferenceFrame;
  type Output = DepthMap;
  type Error = RecordedModelError;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error> {
    let path = self.dir.join(format!("{}.png", input.frame_id));
    debug!("读取深度图: {}", path.display());
    let mut depth = image::open(&path)?.to_luma16();

    // 与输入帧尺寸对齐
    let (width, height) = input.image.dimensions();
    if depth.dimensions() != (width, height) {
      depth = image::imageops::resize(&depth, width, height, FilterType::CatmullRom);
    }

    Ok(ImageBuffer::from_fn(width, height, |x, y| {
      Luma([depth.get_pixel(x, y)[0] as f32])
    }))
  }
}

#[cfg(test)]
mod tests {
  use image::RgbImage;
  use tempfile::tempdir;

  use super::*;

  fn frame(frame_id: u64, width: u32, height: u32) -> InferenceFrame {
    InferenceFrame {
      frame_id,
      image: RgbImage::new(width, height),
    }
  }

  #[test]
  fn detector_replays_frames_above_model_threshold() {
    let root = tempdir().unwrap();
    let dir = root.path().join("coco");
    std::fs::create_dir(&dir).unwrap();
    std::fs::write(dir.join(LABELS_FILE), "background\nperson\ncar\n").unwrap();
    std::fs::write(
      dir.join(DETECTIONS_FILE),
      "# frame,class,score,ymin,xmin,ymax,xmax\n\
       0,1,0.95,0.1,0.1,0.5,0.5\n\
       0,2,0.40,0.2,0.2,0.6,0.6\n\
       1,9,0.99,0.0,0.0,1.0,1.0\n",
    )
    .unwrap();

    let catalog = RecordedDetectorCatalog::new(root.path());
    assert!(catalog.contains("coco"));
    assert!(!catalog.contains("missing"));

    let model = catalog.load("coco", 0.5).unwrap();
    let result = model.infer(&frame(0, 4, 4)).unwrap();
    assert_eq!(result.items.len(), 1);
    assert_eq!(result.items[0].class_name, "person");

    let result = model.infer(&frame(1, 4, 4)).unwrap();
    assert_eq!(result.items[0].class_name, "class-9");

    assert!(model.infer(&frame(2, 4, 4)).unwrap().is_empty());
  }

  #[test]
  fn malformed_detection_line_fails_load() {
    let root = tempdir().unwrap();
    let dir = root.path().join("bad");
    std::fs::create_dir(&dir).unwrap();
    std::fs::write(dir.join(DETECTIONS_FILE), "0,1,0.9\n").unwrap();

    let err = RecordedDetectorCatalog::new(root.path())
      .load("bad", 0.5)
      .unwrap_err();
    assert!(matches!(err, RecordedModelError::ParseError { line: 1, .. }));
  }

  #[test]
  fn missing_detection_file_fails_load() {
    let root = tempdir().unwrap();
    std::fs::create_dir(root.path().join("empty")).unwrap();
    let err = RecordedDetectorCatalog::new(root.path())
      .load("empty", 0.5)
      .unwrap_err();
    assert!(matches!(err, RecordedModelError::IoError(_)));
  }

  #[test]
  fn depth_catalog_respects_allowed_names() {
    let root = tempdir().unwrap();
    std::fs::create_dir(root.path().join("DPT_Large")).unwrap();
    std::fs::create_dir(root.path().join("homebrew")).unwrap();

    let catalog = RecordedDepthCatalog::midas(root.path());
    assert!(catalog.contains("DPT_Large"));
    assert!(!catalog.contains("homebrew"));
    assert!(!catalog.contains("MiDaS_small"));
  }

  #[test]
  fn depth_is_resized_to_frame() {
    let root = tempdir().unwrap();
    let dir = root.path().join("MiDaS");
    std::fs::create_dir(&dir).unwrap();
    let depth: ImageBuffer<Luma<u16>, Vec<u16>> = ImageBuffer::from_pixel(8, 6, Luma([1000u16]));
    depth.save(dir.join("3.png")).unwrap();

    let model = RecordedDepthCatalog::new(root.path()).load("MiDaS", 0.0).unwrap();
    let map = model.infer(&frame(3, 16, 12)).unwrap();
    assert_eq!(map.dimensions(), (16, 12));
    assert!((map.get_pixel(5, 5)[0] - 1000.0).abs() < 1.0);

    assert!(model.infer(&frame(4, 16, 12)).is_err());
  }
}
