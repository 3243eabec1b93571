// 该文件是 Skyscout （天巡） 项目的一部分。
// src/output/image_store.rs - 保存接收帧与标注帧
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

use std::path::{Path, PathBuf};

use image::{ImageFormat, RgbImage};
use tracing::info;

use crate::output::StorageError;

const RECEIVED_DIR: &str = "received";
const LATEST_FILE: &str = "latest.jpg";

/// 固定目录布局的 JPEG 存储
#[derive(Debug, Clone)]
pub struct ImageStore {
  root: PathBuf,
  annotated_dir: String,
  keep_received: bool,
  keep_latest: bool,
}

impl ImageStore {
  pub fn new(root: impl Into<PathBuf>, annotated_dir: &str) -> Self {
    Self {
      root: root.into(),
      annotated_dir: annotated_dir.to_string(),
      keep_received: false,
      keep_latest: false,
    }
  }

  /// 目标检测引擎：`received/` 与 `detected/`
  pub fn for_objects(root: impl Into<PathBuf>) -> Self {
    Self::new(root, "detected").with_received(true)
  }

  /// 避障引擎：`moa/` 以及滚动更新的 `moa/latest.jpg`
  pub fn for_depth(root: impl Into<PathBuf>) -> Self {
    Self::new(root, "moa").with_latest(true)
  }

  pub fn with_received(mut self, keep: bool) -> Self {
    self.keep_received = keep;
    self
  }

  pub fn with_latest(mut self, keep: bool) -> Self {
    self.keep_latest = keep;
    self
  }

  pub fn root(&self) -> &Path {
    &self.root
  }

  /// 相对于存储根目录的路径，用于拼接对外 URL
  pub fn annotated_name(&self, filename: &str) -> String {
    format!("{}/{}", self.annotated_dir, filename)
  }

  pub fn annotated_path(&self, filename: &str) -> PathBuf {
    self.root.join(&self.annotated_dir).join(filename)
  }

  fn save(path: &Path, image: &RgbImage) -> Result<(), StorageError> {
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)?;
    }
    image.save_with_format(path, ImageFormat::Jpeg)?;
    Ok(())
  }

  pub fn store_received(&self, filename: &str, image: &RgbImage) -> Result<(), StorageError> {
    if !self.keep_received {
      return Ok(());
    }
    Self::save(&self.root.join(RECEIVED_DIR).join(filename), image)
  }

  pub fn store_annotated(&self, filename: &str, image: &RgbImage) -> Result<PathBuf, StorageError> {
    let path = self.annotated_path(filename);
    Self::save(&path, image)?;
    if self.keep_latest {
      Self::save(&self.root.join(&self.annotated_dir).join(LATEST_FILE), image)?;
    }
    info!("保存图像: {}", path.display());
    Ok(path)
  }
}
