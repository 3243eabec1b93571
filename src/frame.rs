// 该文件是 Skyscout （天巡） 项目的一部分。
// src/frame.rs - 帧与传感器位姿定义
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

use serde::Deserialize;
use thiserror::Error;

/// 载荷类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadKind {
  Image,
  Text,
}

/// 采集时刻的无人机位姿，角度单位为度，高度单位为米
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SensorPose {
  pub latitude: f64,
  pub longitude: f64,
  pub altitude: f64,
  pub yaw: f64,
  pub pitch: f64,
}

#[derive(Error, Debug)]
pub enum FrameError {
  #[error("图像帧缺少元数据")]
  MissingExtras,
  #[error("元数据解析错误: {0}")]
  MalformedExtras(#[from] serde_json::Error),
}

/// 传输层送来的原始帧
#[derive(Debug, Clone)]
pub struct RawFrame {
  pub frame_id: u64,
  pub payload_kind: PayloadKind,
  pub payload: Vec<u8>,
  /// JSON 编码的元数据
  pub extras: Option<Vec<u8>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct Location {
  latitude: f64,
  longitude: f64,
  altitude: f64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct Status {
  /// 航向角，弧度
  bearing: f64,
  /// 云台俯仰角，度
  gimbal_pitch: f64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct Extras {
  drone_id: String,
  detection_model: String,
  location: Location,
  status: Status,
}

impl From<&Extras> for SensorPose {
  fn from(extras: &Extras) -> Self {
    SensorPose {
      latitude: extras.location.latitude,
      longitude: extras.location.longitude,
      altitude: extras.location.altitude,
      yaw: extras.status.bearing.to_degrees(),
      pitch: extras.status.gimbal_pitch,
    }
  }
}

/// 解码后的帧请求，在整个帧生命周期内不可变
#[derive(Debug, Clone)]
pub struct FrameRequest {
  pub frame_id: u64,
  pub raw_payload: Vec<u8>,
  pub payload_kind: PayloadKind,
  pub requested_model: Option<String>,
  pub drone_id: String,
  pub pose: SensorPose,
}

impl FrameRequest {
  pub fn decode(raw: RawFrame) -> Result<Self, FrameError> {
    let extras = match (&raw.extras, raw.payload_kind) {
      (Some(bytes), _) => serde_json::from_slice::<Extras>(bytes)?,
      (None, PayloadKind::Text) => Extras::default(),
      (None, PayloadKind::Image) => return Err(FrameError::MissingExtras),
    };

    let requested_model = Some(extras.detection_model.trim())
      .filter(|name| !name.is_empty())
      .map(str::to_string);

    Ok(FrameRequest {
      frame_id: raw.frame_id,
      pose: SensorPose::from(&extras),
      raw_payload: raw.payload,
      payload_kind: raw.payload_kind,
      requested_model,
      drone_id: extras.drone_id,
    })
  }
}
