// 该文件是 Skyscout （天巡） 项目的一部分。
// src/output/detection_log.rs - 只追加的检测日志
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
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::output::StorageError;

/// 检测日志中的一行
#[derive(Debug, Clone, PartialEq)]
pub struct LogEntry {
  pub timestamp_ms: i64,
  pub drone_id: String,
  pub latitude: f64,
  pub longitude: f64,
  pub label: String,
  /// 置信度或避障偏移
  pub value: f64,
  pub url: Option<String>,
}

impl fmt::Display for LogEntry {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(
      f,
      "{},{},{},{},{},{:.3},{}",
      self.timestamp_ms,
      self.drone_id,
      self.latitude,
      self.longitude,
      self.label,
      self.value,
      self.url.as_deref().unwrap_or("")
    )
  }
}

pub trait DetectionSink {
  fn append(&mut self, entry: &LogEntry) -> Result<(), StorageError>;
}

/// 每个引擎实例独占的日志文件
pub struct DetectionLog {
  path: PathBuf,
  file: File,
}

impl DetectionLog {
  pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
      if !parent.as_os_str().is_empty() {
        std::fs::create_dir_all(parent)?;
      }
    }
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    info!("检测日志: {}", path.display());

    Ok(DetectionLog {
      path: path.to_path_buf(),
      file,
    })
  }

  pub fn path(&self) -> &Path {
    &self.path
  }
}

impl DetectionSink for DetectionLog {
  fn append(&mut self, entry: &LogEntry) -> Result<(), StorageError> {
    writeln!(self.file, "{}", entry)?;
    self.file.flush()?;
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use tempfile::tempdir;

  use super::*;

  fn entry(url: Option<&str>) -> LogEntry {
    LogEntry {
      timestamp_ms: 1700000000123,
      drone_id: "anafi-01".into(),
      latitude: 40.5,
      longitude: -79.25,
      label: "person".into(),
      value: 0.91234,
      url: url.map(str::to_string),
    }
  }

  #[test]
  fn line_format_without_url_keeps_trailing_comma() {
    assert_eq!(
      entry(None).to_string(),
      "1700000000123,anafi-01,40.5,-79.25,person,0.912,"
    );
  }

  #[test]
  fn line_format_with_url() {
    assert_eq!(
      entry(Some("http://host/detected/1.jpg")).to_string(),
      "1700000000123,anafi-01,40.5,-79.25,person,0.912,http://host/detected/1.jpg"
    );
  }

  #[test]
  fn log_appends_across_reopen() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("logs/object.log");

    let mut log = DetectionLog::open(&path).unwrap();
    log.append(&entry(None)).unwrap();
    drop(log);

    let mut log = DetectionLog::open(&path).unwrap();
    log.append(&entry(Some("u"))).unwrap();

    let content = std::fs::read_to_string(&path).unwrap();
    assert_eq!(content.lines().count(), 2);
    assert!(content.lines().nth(1).unwrap().ends_with(",u"));
  }
}
