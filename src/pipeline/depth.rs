// 该文件是 Skyscout （天巡） 项目的一部分。
// src/pipeline/depth.rs - 深度避障
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

use tracing::{error, info};

use crate::{
  assemble::{DepthRecord, DetectionFilter, encode_records},
  avoidance::ObstacleSegmenter,
  model::DepthMap,
  output::{LogEntry, Render, draw::Draw},
  pipeline::{Analysis, Analyzer, FrameContext},
};

pub struct DepthAnalyzer {
  segmenter: ObstacleSegmenter,
  draw: Draw,
}

impl DepthAnalyzer {
  pub fn new(segmenter: ObstacleSegmenter) -> Self {
    Self {
      segmenter,
      draw: Draw::default(),
    }
  }

  pub fn with_draw(mut self, draw: Draw) -> Self {
    self.draw = draw;
    self
  }
}

impl Analyzer for DepthAnalyzer {
  type Raw = DepthMap;

  /// 深度结果不参与置信度过滤，每帧恰好一条记录
  fn analyze(
    &self,
    ctx: &FrameContext<'_>,
    raw: DepthMap,
    _filter: &DetectionFilter<'_>,
    render: bool,
  ) -> Analysis {
    let segmentation = self.segmenter.segment(&raw);
    let vector = segmentation.vector;
    info!(
      "帧 {} 避障向量: {:.1} ({})",
      ctx.frame_id,
      vector.offset,
      if vector.has_safe_path { "safe" } else { "blocked" }
    );

    let record = DepthRecord {
      vector: vector.offset,
      safe: vector.has_safe_path,
    };
    let payload = match encode_records(&[record]) {
      Ok(payload) => payload,
      Err(e) => {
        error!("结果序列化失败: {}", e);
        None
      }
    };

    let log_entry = LogEntry {
      timestamp_ms: ctx.timestamp_ms,
      drone_id: ctx.drone_id.to_string(),
      latitude: ctx.pose.latitude,
      longitude: ctx.pose.longitude,
      label: if vector.has_safe_path { "safe" } else { "blocked" }.to_string(),
      value: vector.offset,
      url: None,
    };

    let annotated = render.then(|| self.draw.render(ctx.image, &segmentation));

    Analysis {
      payload,
      log_entries: vec![log_entry],
      annotated,
    }
  }
}

#[cfg(test)]
mod tests {
  use std::collections::BTreeSet;

  use image::{ImageBuffer, Luma, RgbImage};

  use super::*;
  use crate::frame::SensorPose;

  fn analyze(depth: DepthMap, render: bool) -> Analysis {
    let image = RgbImage::new(depth.width(), depth.height());
    let pose = SensorPose {
      latitude: 40.5,
      longitude: -79.5,
      ..Default::default()
    };
    let ctx = FrameContext {
      frame_id: 3,
      timestamp_ms: 7,
      drone_id: "d2",
      pose: &pose,
      image: &image,
    };
    let excluded = BTreeSet::new();
    DepthAnalyzer::new(ObstacleSegmenter::default()).analyze(
      &ctx,
      depth,
      &DetectionFilter::new(0.0, &excluded),
      render,
    )
  }

  #[test]
  fn near_wall_on_right_steers_left() {
    // 右半侧近距离障碍
    let depth: DepthMap = ImageBuffer::from_fn(120, 90, |x, _| {
      Luma([if x >= 60 { 1000.0 } else { 10.0 }])
    });
    let analysis = analyze(depth, true);

    let payload: serde_json::Value = serde_json::from_slice(&analysis.payload.unwrap()).unwrap();
    assert_eq!(payload.as_array().unwrap().len(), 1);
    assert_eq!(payload[0]["safe"], true);
    assert!(payload[0]["vector"].as_f64().unwrap() < 0.0);

    let entry = &analysis.log_entries[0];
    assert_eq!(entry.label, "safe");
    assert_eq!(entry.latitude, 40.5);
    assert_eq!(entry.longitude, -79.5);
    assert!(analysis.annotated.is_some());
  }

  #[test]
  fn blocked_frame_still_produces_one_record() {
    let depth: DepthMap = ImageBuffer::new(0, 0);
    let analysis = analyze(depth, false);

    let payload: serde_json::Value = serde_json::from_slice(&analysis.payload.unwrap()).unwrap();
    assert_eq!(payload[0]["safe"], false);
    assert_eq!(analysis.log_entries[0].label, "blocked");
    assert!(analysis.annotated.is_none());
  }
}
