// 该文件是 Skyscout （天巡） 项目的一部分。
// src/pipeline.rs - 模型输出分析
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

use image::RgbImage;

use crate::{assemble::DetectionFilter, frame::SensorPose, output::LogEntry};

/// 单帧分析所需的上下文
#[derive(Debug, Clone, Copy)]
pub struct FrameContext<'a> {
  pub frame_id: u64,
  pub timestamp_ms: i64,
  pub drone_id: &'a str,
  pub pose: &'a SensorPose,
  pub image: &'a RgbImage,
}

#[derive(Debug, Default)]
pub struct Analysis {
  /// 编码后的结果载荷，没有合格记录时为空
  pub payload: Option<Vec<u8>>,
  /// URL 字段由引擎按存储配置补全
  pub log_entries: Vec<LogEntry>,
  pub annotated: Option<RgbImage>,
}

/// 将原始模型输出变为结果记录
pub trait Analyzer {
  type Raw;

  fn analyze(
    &self,
    ctx: &FrameContext<'_>,
    raw: Self::Raw,
    filter: &DetectionFilter<'_>,
    render: bool,
  ) -> Analysis;
}

mod depth;
mod object;

pub use self::depth::DepthAnalyzer;
pub use self::object::ObjectAnalyzer;
