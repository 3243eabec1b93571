// 该文件是 Skyscout （天巡） 项目的一部分。
// src/input.rs - 帧输入
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

use thiserror::Error;

use crate::{FromUrl, FromUrlWithScheme, frame::RawFrame};

mod folder;

pub use self::folder::FolderInput;

#[derive(Error, Debug)]
pub enum InputError {
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("URI 方案不匹配: 期望 '{expected}', 实际 '{found}'")]
  SchemeMismatch { expected: &'static str, found: String },
}

pub enum InputWrapper {
  Folder(FolderInput),
}

impl FromUrl for InputWrapper {
  type Error = InputError;

  fn from_url(url: &url::Url) -> Result<Self, Self::Error> {
    if url.scheme() == FolderInput::SCHEME {
      return Ok(InputWrapper::Folder(FolderInput::from_url(url)?));
    }
    Err(InputError::SchemeMismatch {
      expected: FolderInput::SCHEME,
      found: url.scheme().to_string(),
    })
  }
}

impl Iterator for InputWrapper {
  type Item = RawFrame;

  fn next(&mut self) -> Option<Self::Item> {
    match self {
      InputWrapper::Folder(input) => input.next(),
    }
  }
}
