// 该文件是 Skyscout （天巡） 项目的一部分。
// src/geo.rs - 目标地理定位（射线与地平面求交）
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

use std::fmt;
use std::str::FromStr;

use nalgebra::{Rotation3, Vector3};
use thiserror::Error;
use tracing::debug;

use crate::frame::SensorPose;

/// WGS84 赤道半径，单位米
pub const EARTH_RADIUS: f64 = 6_378_137.0;

const PARALLEL_EPSILON: f64 = 1e-6;
const POLE_EPSILON: f64 = 1e-9;

#[derive(Error, Debug, PartialEq)]
pub enum LocalizeError {
  #[error("目标射线与地平面平行，无交点")]
  NoIntersection,
}

#[derive(Error, Debug, PartialEq, Eq)]
#[error("不支持的无人机型号: {0}")]
pub struct DroneTypeError(String);

/// 相机视场角，单位度
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldOfView {
  pub horizontal: f64,
  pub vertical: f64,
}

/// 无人机型号，决定相机视场角
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DroneType {
  #[default]
  Anafi,
  Usa,
}

impl DroneType {
  pub fn field_of_view(self) -> FieldOfView {
    match self {
      DroneType::Anafi => FieldOfView {
        horizontal: 69.0,
        vertical: 43.0,
      },
      DroneType::Usa => FieldOfView {
        horizontal: 69.0,
        vertical: 43.0,
      },
    }
  }
}

impl FromStr for DroneType {
  type Err = DroneTypeError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.trim().to_ascii_lowercase().as_str() {
      "anafi" => Ok(DroneType::Anafi),
      "usa" => Ok(DroneType::Usa),
      _ => Err(DroneTypeError(s.to_string())),
    }
  }
}

impl fmt::Display for DroneType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      DroneType::Anafi => write!(f, "anafi"),
      DroneType::Usa => write!(f, "usa"),
    }
  }
}

/// 按 Z-Y-X 内旋顺序（度）旋转向量，即 `Rz(z) · Ry(y) · Rx(x) · v`
pub fn rotate_zyx(v: &Vector3<f64>, z_deg: f64, y_deg: f64, x_deg: f64) -> Vector3<f64> {
  Rotation3::from_euler_angles(x_deg.to_radians(), y_deg.to_radians(), z_deg.to_radians()) * v
}

/// 射线与平面求交，掠射角过小视为平行
pub fn intersect_plane(
  origin: &Vector3<f64>,
  dir: &Vector3<f64>,
  plane_point: &Vector3<f64>,
  plane_normal: &Vector3<f64>,
) -> Result<Vector3<f64>, LocalizeError> {
  let denom = plane_normal.dot(dir);
  if denom.abs() < PARALLEL_EPSILON {
    return Err(LocalizeError::NoIntersection);
  }
  let t = plane_normal.dot(&(plane_point - origin)) / denom;
  Ok(origin + dir * t)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoEstimate {
  pub latitude: f64,
  pub longitude: f64,
  /// 纬度接近极点时经度增量无法计算，仅保留纬度估计
  pub degraded: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct GeodeticLocalizer {
  fov: FieldOfView,
}

impl GeodeticLocalizer {
  pub fn new(drone: DroneType) -> Self {
    Self {
      fov: drone.field_of_view(),
    }
  }

  pub fn field_of_view(&self) -> FieldOfView {
    self.fov
  }

  /// 由目标像素坐标与位姿估计目标经纬度，无隐藏状态
  pub fn estimate(
    &self,
    pose: &SensorPose,
    image_width: u32,
    image_height: u32,
    target_x: f64,
    target_y: f64,
  ) -> Result<GeoEstimate, LocalizeError> {
    debug!(
      "Pitch: {}, Yaw: {}, Elev: {}",
      pose.pitch, pose.yaw, pose.altitude
    );

    let camera_center = rotate_zyx(&Vector3::y(), pose.yaw, 0.0, pose.pitch);
    debug!(
      "相机中心方向: ({:.6}, {:.6}, {:.6})",
      camera_center.x, camera_center.y, camera_center.z
    );

    let cx = image_width as f64 / 2.0;
    let cy = image_height as f64 / 2.0;
    let yaw_offset = ((target_x - cx) / cx) * (self.fov.horizontal / 2.0);
    let pitch_offset = ((target_y - cy) / cy) * (self.fov.vertical / 2.0);

    let target_dir = rotate_zyx(
      &Vector3::y(),
      pose.yaw + yaw_offset,
      0.0,
      pose.pitch + pitch_offset,
    );
    debug!(
      "目标偏航: {:.3}, 目标俯仰: {:.3}, 方向: ({:.6}, {:.6}, {:.6})",
      yaw_offset, pitch_offset, target_dir.x, target_dir.y, target_dir.z
    );

    let hit = intersect_plane(
      &Vector3::new(0.0, 0.0, pose.altitude),
      &target_dir,
      &Vector3::zeros(),
      &Vector3::z(),
    )?;
    debug!("地平面交点: ({:.3}, {:.3}, {:.3})", hit.x, hit.y, hit.z);

    let latitude = pose.latitude + (hit.y / EARTH_RADIUS).to_degrees();
    let cos_lat = pose.latitude.to_radians().cos();
    let (longitude, degraded) = if cos_lat.abs() < POLE_EPSILON {
      (pose.longitude, true)
    } else {
      (pose.longitude + (hit.x / EARTH_RADIUS).to_degrees() / cos_lat, false)
    };
    debug!("估计坐标: ({}, {})", latitude, longitude);

    Ok(GeoEstimate {
      latitude,
      longitude,
      degraded,
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  const EPS: f64 = 1e-9;

  fn pose(yaw: f64, pitch: f64) -> SensorPose {
    SensorPose {
      latitude: 40.0,
      longitude: -79.0,
      altitude: 50.0,
      yaw,
      pitch,
    }
  }

  #[test]
  fn drone_type_parses_known_names_only() {
    assert_eq!("anafi".parse::<DroneType>(), Ok(DroneType::Anafi));
    assert_eq!("USA".parse::<DroneType>(), Ok(DroneType::Usa));
    assert!("mavic".parse::<DroneType>().is_err());
  }

  #[test]
  fn zero_rotation_keeps_north() {
    let v = rotate_zyx(&Vector3::y(), 0.0, 0.0, 0.0);
    assert!((v.y - 1.0).abs() < EPS && v.x.abs() < EPS && v.z.abs() < EPS);
  }

  #[test]
  fn pitch_down_points_below_horizon() {
    let v = rotate_zyx(&Vector3::y(), 0.0, 0.0, -90.0);
    assert!((v.z + 1.0).abs() < EPS);
    assert!(v.y.abs() < EPS);
  }

  #[test]
  fn yaw_rotates_counter_clockwise_about_up() {
    let v = rotate_zyx(&Vector3::y(), 90.0, 0.0, 0.0);
    assert!((v.x + 1.0).abs() < EPS);
    assert!(v.y.abs() < EPS);
  }

  #[test]
  fn parallel_ray_has_no_intersection() {
    let localizer = GeodeticLocalizer::new(DroneType::Anafi);
    let result = localizer.estimate(&pose(0.0, 0.0), 640, 480, 320.0, 240.0);
    assert_eq!(result, Err(LocalizeError::NoIntersection));
  }

  #[test]
  fn grazing_ray_from_f32_box_center_has_no_intersection() {
    // f32 检测框中心带来约 1e-5 像素的误差，不能据此给出地面坐标
    let localizer = GeodeticLocalizer::new(DroneType::Anafi);
    let target_y = (0.4f32 as f64 + 0.6f32 as f64) / 2.0 * 480.0;
    assert_ne!(target_y, 240.0);
    let result = localizer.estimate(&pose(0.0, 0.0), 640, 480, 320.0, target_y);
    assert_eq!(result, Err(LocalizeError::NoIntersection));
  }

  #[test]
  fn rotation_matches_closed_form() {
    let (yaw, pitch) = (30.0f64, -20.0f64);
    let v = rotate_zyx(&Vector3::y(), yaw, 0.0, pitch);
    let (yaw, pitch) = (yaw.to_radians(), pitch.to_radians());
    assert!((v.x + yaw.sin() * pitch.cos()).abs() < EPS);
    assert!((v.y - yaw.cos() * pitch.cos()).abs() < EPS);
    assert!((v.z - pitch.sin()).abs() < EPS);
  }

  #[test]
  fn straight_down_projects_to_drone_position() {
    let localizer = GeodeticLocalizer::new(DroneType::Anafi);
    let est = localizer
      .estimate(&pose(37.0, -90.0), 640, 480, 320.0, 240.0)
      .unwrap();
    assert!((est.latitude - 40.0).abs() < 1e-9);
    assert!((est.longitude + 79.0).abs() < 1e-9);
    assert!(!est.degraded);
  }

  #[test]
  fn forty_five_degree_depression_offsets_by_altitude() {
    let localizer = GeodeticLocalizer::new("anafi".parse().unwrap());
    let est = localizer
      .estimate(&pose(0.0, -45.0), 640, 480, 320.0, 240.0)
      .unwrap();

    // 45 度俯角下，地面偏移等于飞行高度（正北 50 米）
    let expected_dlat = (50.0 / EARTH_RADIUS).to_degrees();
    assert!((est.latitude - 40.0 - expected_dlat).abs() < 1e-9);
    assert!((est.longitude + 79.0).abs() < 1e-9);
    assert_ne!((est.latitude, est.longitude), (40.0, -79.0));
  }

  #[test]
  fn off_center_target_shifts_longitude() {
    let localizer = GeodeticLocalizer::new(DroneType::Anafi);
    let left = localizer
      .estimate(&pose(0.0, -45.0), 640, 480, 100.0, 240.0)
      .unwrap();
    let right = localizer
      .estimate(&pose(0.0, -45.0), 640, 480, 540.0, 240.0)
      .unwrap();
    assert!(left.longitude.is_finite() && right.longitude.is_finite());
    assert!(left.longitude != right.longitude);
  }

  #[test]
  fn estimates_are_deterministic() {
    let localizer = GeodeticLocalizer::new(DroneType::Usa);
    let p = pose(123.0, -30.0);
    let a = localizer.estimate(&p, 1280, 720, 900.0, 200.0).unwrap();
    let b = localizer.estimate(&p, 1280, 720, 900.0, 200.0).unwrap();
    assert_eq!(a, b);
  }

  #[test]
  fn pole_latitude_degrades_instead_of_panicking() {
    let localizer = GeodeticLocalizer::new(DroneType::Anafi);
    let mut p = pose(10.0, -45.0);
    p.latitude = 90.0;
    let est = localizer.estimate(&p, 640, 480, 320.0, 240.0).unwrap();
    assert!(est.degraded);
    assert!(est.latitude.is_finite() && est.longitude.is_finite());
  }
}
