// 该文件是 Skyscout （天巡） 项目的一部分。
// src/pipeline/object.rs - 目标检测与地理定位
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

use tracing::{error, info, warn};

use crate::{
  assemble::{DetectionFilter, ObjectRecord, encode_records},
  geo::GeodeticLocalizer,
  model::{DetectItem, DetectResult},
  output::{LogEntry, Render, draw::Draw},
  pipeline::{Analysis, Analyzer, FrameContext},
};

pub struct ObjectAnalyzer {
  localizer: GeodeticLocalizer,
  draw: Draw,
}

impl ObjectAnalyzer {
  pub fn new(localizer: GeodeticLocalizer) -> Self {
    Self {
      localizer,
      draw: Draw::default(),
    }
  }

  pub fn with_draw(mut self, draw: Draw) -> Self {
    self.draw = draw;
    self
  }
}

impl Analyzer for ObjectAnalyzer {
  type Raw = DetectResult;

  fn analyze(
    &self,
    ctx: &FrameContext<'_>,
    raw: DetectResult,
    filter: &DetectionFilter<'_>,
    render: bool,
  ) -> Analysis {
    let (width, height) = ctx.image.dimensions();
    let mut records = Vec::new();
    let mut log_entries = Vec::new();
    let mut kept: Vec<DetectItem> = Vec::new();

    for (index, item) in filter.apply(&raw) {
      info!("Detected : {} - Score: {:.3}", item.class_name, item.score);
      let (target_x, target_y) = item.center_pixel(width, height);

      // 单个检测定位失败不影响同帧其余检测
      let estimate = match self
        .localizer
        .estimate(ctx.pose, width, height, target_x, target_y)
      {
        Ok(estimate) => estimate,
        Err(e) => {
          warn!("跳过检测 {} ({}): {}", index, item.class_name, e);
          continue;
        }
      };
      if estimate.degraded {
        warn!("检测 {} 位于极点附近，经度估计不可靠", index);
      }

      records.push(ObjectRecord {
        index,
        class: item.class_name.clone(),
        score: item.score,
        lat: estimate.latitude,
        lon: estimate.longitude,
        bbox: item.bbox,
        degraded: estimate.degraded,
      });
      log_entries.push(LogEntry {
        timestamp_ms: ctx.timestamp_ms,
        drone_id: ctx.drone_id.to_string(),
        latitude: estimate.latitude,
        longitude: estimate.longitude,
        label: item.class_name.clone(),
        value: item.score as f64,
        url: None,
      });
      kept.push(item.clone());
    }

    let payload = match encode_records(&records) {
      Ok(payload) => payload,
      Err(e) => {
        error!("结果序列化失败: {}", e);
        None
      }
    };

    let annotated = if render && !kept.is_empty() {
      Some(self.draw.render(ctx.image, kept.as_slice()))
    } else {
      None
    };

    Analysis {
      payload,
      log_entries,
      annotated,
    }
  }
}
