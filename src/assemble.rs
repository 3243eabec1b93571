// 该文件是 Skyscout （天巡） 项目的一部分。
// src/assemble.rs - 检测过滤与结果记录
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

use std::collections::BTreeSet;
use std::num::ParseIntError;

use serde::Serialize;

use crate::model::{DetectItem, DetectResult};

/// 解析逗号分隔的类别编号列表
pub fn parse_exclusions(list: &str) -> Result<BTreeSet<u32>, ParseIntError> {
  list
    .split(',')
    .map(str::trim)
    .filter(|s| !s.is_empty())
    .map(str::parse::<u32>)
    .collect()
}

#[derive(Debug, Clone, Copy)]
pub struct DetectionFilter<'a> {
  pub threshold: f32,
  pub excluded: &'a BTreeSet<u32>,
}

impl<'a> DetectionFilter<'a> {
  pub fn new(threshold: f32, excluded: &'a BTreeSet<u32>) -> Self {
    Self {
      threshold,
      excluded,
    }
  }

  /// 置信度严格大于阈值且类别未被排除
  pub fn passes(&self, item: &DetectItem) -> bool {
    item.score > self.threshold && !self.excluded.contains(&item.class_id)
  }

  /// 保留原始序号
  pub fn apply<'r>(
    &'r self,
    result: &'r DetectResult,
  ) -> impl Iterator<Item = (usize, &'r DetectItem)> + 'r {
    result
      .items
      .iter()
      .enumerate()
      .filter(|(_, item)| self.passes(item))
  }
}

/// 目标检测记录
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ObjectRecord {
  #[serde(rename = "id")]
  pub index: usize,
  pub class: String,
  pub score: f32,
  pub lat: f64,
  pub lon: f64,
  #[serde(rename = "box")]
  pub bbox: [f32; 4],
  #[serde(skip_serializing_if = "std::ops::Not::not")]
  pub degraded: bool,
}

/// 避障记录
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DepthRecord {
  pub vector: f64,
  pub safe: bool,
}

/// 没有记录时不产生载荷
pub fn encode_records<T: Serialize>(records: &[T]) -> Result<Option<Vec<u8>>, serde_json::Error> {
  if records.is_empty() {
    return Ok(None);
  }
  serde_json::to_vec(records).map(Some)
}

#[cfg(test)]
mod tests {
  use super::*;

  fn item(class_id: u32, score: f32) -> DetectItem {
    DetectItem {
      class_id,
      class_name: format!("c{}", class_id),
      score,
      bbox: [0.0, 0.0, 1.0, 1.0],
    }
  }

  fn result(items: Vec<DetectItem>) -> DetectResult {
    DetectResult {
      items: items.into_boxed_slice(),
    }
  }

  #[test]
  fn parses_exclusion_list() {
    let set = parse_exclusions("1, 3,5,,").unwrap();
    assert_eq!(set.into_iter().collect::<Vec<_>>(), vec![1, 3, 5]);
    assert!(parse_exclusions("1,x").is_err());
    assert!(parse_exclusions("").unwrap().is_empty());
  }

  #[test]
  fn filter_keeps_strictly_above_threshold_and_not_excluded() {
    let excluded: BTreeSet<u32> = [2].into_iter().collect();
    let filter = DetectionFilter::new(0.5, &excluded);
    let detections = result(vec![item(1, 0.9), item(2, 0.99), item(3, 0.5), item(4, 0.51)]);

    let kept: Vec<_> = filter.apply(&detections).map(|(i, it)| (i, it.class_id)).collect();
    assert_eq!(kept, vec![(0, 1), (3, 4)]);
    for (_, it) in filter.apply(&detections) {
      assert!(it.score > filter.threshold && !filter.excluded.contains(&it.class_id));
    }
  }

  #[test]
  fn threshold_above_one_rejects_everything() {
    let excluded = BTreeSet::new();
    let filter = DetectionFilter::new(1.01, &excluded);
    let detections = result(vec![item(1, 1.0), item(2, 0.0), item(3, 0.999)]);
    assert_eq!(filter.apply(&detections).count(), 0);
  }

  #[test]
  fn empty_record_list_has_no_payload() {
    assert!(encode_records::<ObjectRecord>(&[]).unwrap().is_none());
  }

  #[test]
  fn object_record_uses_wire_field_names() {
    let record = ObjectRecord {
      index: 2,
      class: "person".into(),
      score: 0.5,
      lat: 40.0,
      lon: -79.0,
      bbox: [0.0, 0.25, 0.5, 1.0],
      degraded: false,
    };
    let bytes = encode_records(&[record]).unwrap().unwrap();
    let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(value[0]["id"], 2);
    assert_eq!(value[0]["class"], "person");
    assert_eq!(value[0]["box"][1], 0.25);
    assert!(value[0].get("degraded").is_none());
  }

  #[test]
  fn depth_record_serializes_vector() {
    let bytes = encode_records(&[DepthRecord {
      vector: -12.5,
      safe: true,
    }])
    .unwrap()
    .unwrap();
    assert_eq!(
      String::from_utf8(bytes).unwrap(),
      r#"[{"vector":-12.5,"safe":true}]"#
    );
  }
}
