// 该文件是 Skyscout （天巡） 项目的一部分。
// src/model.rs - 模型
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

use image::{ImageBuffer, Luma, RgbImage};

/// 推理协作方的边界：输入一帧，输出检测列表或深度图
pub trait Model {
  type Input;
  type Output;
  type Error;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error>;
}

/// 按名称加载模型的目录
pub trait ModelCatalog {
  type Model: Model;
  type Error: std::error::Error + Send + Sync + 'static;

  fn contains(&self, name: &str) -> bool;
  fn load(&self, name: &str, threshold: f32) -> Result<Self::Model, Self::Error>;
}

/// 送入模型的解码帧
#[derive(Debug, Clone)]
pub struct InferenceFrame {
  pub frame_id: u64,
  pub image: RgbImage,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DetectItem {
  pub class_id: u32,
  pub class_name: String,
  pub score: f32,
  pub bbox: [f32; 4], // [y_min, x_min, y_max, x_max]
}

impl DetectItem {
  /// 检测框中心的像素坐标
  pub fn center_pixel(&self, width: u32, height: u32) -> (f64, f64) {
    let [y_min, x_min, y_max, x_max] = self.bbox.map(f64::from);
    (
      (x_min + x_max) / 2.0 * width as f64,
      (y_min + y_max) / 2.0 * height as f64,
    )
  }
}

#[derive(Debug, Clone, Default)]
pub struct DetectResult {
  pub items: Box<[DetectItem]>,
}

impl DetectResult {
  pub fn is_empty(&self) -> bool {
    self.items.is_empty()
  }
}

/// 逐像素深度（或逆深度）图
pub type DepthMap = ImageBuffer<Luma<f32>, Vec<f32>>;

mod recorded;
mod registry;

pub use self::recorded::{
  MIDAS_MODELS, RecordedDepth, RecordedDepthCatalog, RecordedDetector, RecordedDetectorCatalog,
  RecordedModelError,
};
pub use self::registry::{ModelCommand, ModelRegistry, ModelState, SwapError};
