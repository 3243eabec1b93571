// 该文件是 Skyscout （天巡） 项目的一部分。
// src/input/folder.rs - 目录帧回放
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

use tracing::{error, info, warn};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::{PayloadKind, RawFrame},
  input::InputError,
};

const IMAGE_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];
const TEXT_EXTENSION: &str = "txt";

/// 按文件名顺序回放目录中的帧，图像元数据取自同名 `.json`
#[derive(Debug)]
pub struct FolderInput {
  entries: Vec<(PayloadKind, PathBuf)>,
  cursor: usize,
}

impl FromUrlWithScheme for FolderInput {
  const SCHEME: &'static str = "folder";
}

impl FromUrl for FolderInput {
  type Error = InputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      error!(
        "URI scheme mismatch: expected '{}', found '{}'",
        Self::SCHEME,
        url.scheme()
      );
      return Err(InputError::SchemeMismatch {
        expected: Self::SCHEME,
        found: url.scheme().to_string(),
      });
    }
    Self::open(url.path())
  }
}

impl FolderInput {
  pub fn open(dir: impl AsRef<Path>) -> Result<Self, InputError> {
    let mut paths = std::fs::read_dir(dir.as_ref())?
      .map(|entry| entry.map(|e| e.path()))
      .collect::<Result<Vec<_>, _>>()?;
    paths.sort();

    let entries: Vec<_> = paths
      .into_iter()
      .filter_map(|path| {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
          Some((PayloadKind::Image, path))
        } else if ext == TEXT_EXTENSION {
          Some((PayloadKind::Text, path))
        } else {
          None
        }
      })
      .collect();

    info!("目录 {} 中共 {} 帧", dir.as_ref().display(), entries.len());
    Ok(Self { entries, cursor: 0 })
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }

  fn read(frame_id: u64, kind: PayloadKind, path: &Path) -> std::io::Result<RawFrame> {
    let payload = std::fs::read(path)?;
    let extras = match kind {
      PayloadKind::Image => {
        let sidecar = path.with_extension("json");
        match std::fs::read(&sidecar) {
          Ok(bytes) => Some(bytes),
          Err(e) => {
            warn!("缺少元数据文件 {}: {}", sidecar.display(), e);
            None
          }
        }
      }
      PayloadKind::Text => None,
    };

    Ok(RawFrame {
      frame_id,
      payload_kind: kind,
      payload,
      extras,
    })
  }
}

impl Iterator for FolderInput {
  type Item = RawFrame;

  fn next(&mut self) -> Option<Self::Item> {
    while let Some((kind, path)) = self.entries.get(self.cursor) {
      let frame_id = self.cursor as u64;
      self.cursor += 1;
      match Self::read(frame_id, *kind, path) {
        Ok(frame) => return Some(frame),
        Err(e) => error!("读取 {} 失败: {}", path.display(), e),
      }
    }
    None
  }
}
