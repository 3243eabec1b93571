// 该文件是 Skyscout （天巡） 项目的一部分。
// src/result.rs - 对外返回结果
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

use crate::frame::PayloadKind;

pub const IGNORED_TEXT_PAYLOAD: &str = "Ignoring TEXT payload.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
  Success,
  WrongInputFormat,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResultPayload {
  pub payload_kind: PayloadKind,
  pub payload: Vec<u8>,
}

impl ResultPayload {
  pub fn text(payload: impl Into<Vec<u8>>) -> Self {
    Self {
      payload_kind: PayloadKind::Text,
      payload: payload.into(),
    }
  }
}

/// 每个请求恰好对应一个响应
#[derive(Debug, Clone, PartialEq)]
pub struct ResultWrapper {
  pub frame_id: u64,
  pub status: Status,
  pub producer_name: String,
  pub results: Vec<ResultPayload>,
}

impl ResultWrapper {
  pub fn success(producer_name: &str, frame_id: u64, results: Vec<ResultPayload>) -> Self {
    Self {
      frame_id,
      status: Status::Success,
      producer_name: producer_name.to_string(),
      results,
    }
  }

  pub fn ignored(producer_name: &str, frame_id: u64) -> Self {
    Self::success(
      producer_name,
      frame_id,
      vec![ResultPayload::text(IGNORED_TEXT_PAYLOAD)],
    )
  }

  pub fn wrong_input_format(producer_name: &str, frame_id: u64) -> Self {
    Self {
      frame_id,
      status: Status::WrongInputFormat,
      producer_name: producer_name.to_string(),
      results: Vec::new(),
    }
  }
}
