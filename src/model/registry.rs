// 该文件是 Skyscout （天巡） 项目的一部分。
// src/model/registry.rs - 模型注册表与热切换
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

use thiserror::Error;
use tracing::{error, info};

use crate::{assemble::DetectionFilter, model::ModelCatalog};

#[derive(Error, Debug)]
pub enum SwapError {
  #[error("模型 {0} 不存在")]
  ModelNotFound(String),
  #[error("模型 {name} 加载失败: {source}")]
  LoadFailure {
    name: String,
    #[source]
    source: Box<dyn std::error::Error + Send + Sync>,
  },
}

/// 请求元数据中的模型切换指令
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelCommand {
  Keep,
  SwapTo(String),
}

impl ModelCommand {
  /// 请求为空或与当前模型同名时保持不变
  pub fn from_request(requested: Option<&str>, active: &str) -> Self {
    match requested.map(str::trim) {
      Some(name) if !name.is_empty() && name != active => ModelCommand::SwapTo(name.to_string()),
      _ => ModelCommand::Keep,
    }
  }
}

/// 当前激活的模型及其过滤配置
#[derive(Debug)]
pub struct ModelState<M> {
  pub active_model_name: String,
  pub loaded_instance: M,
  pub confidence_threshold: f32,
  pub excluded_classes: BTreeSet<u32>,
}

impl<M> ModelState<M> {
  pub fn filter(&self) -> DetectionFilter<'_> {
    DetectionFilter::new(self.confidence_threshold, &self.excluded_classes)
  }
}

/// 独占持有 `ModelState`，只在校验通过的切换请求下修改
pub struct ModelRegistry<C: ModelCatalog> {
  catalog: C,
  state: ModelState<C::Model>,
}

impl<C: ModelCatalog> ModelRegistry<C> {
  pub fn new(
    catalog: C,
    name: &str,
    confidence_threshold: f32,
    excluded_classes: BTreeSet<u32>,
  ) -> Result<Self, SwapError> {
    let loaded_instance = Self::load(&catalog, name, confidence_threshold)?;
    info!("模型 {} 初始化完成，置信度阈值: {}", name, confidence_threshold);
    if !excluded_classes.is_empty() {
      info!("排除以下类别: {:?}", excluded_classes);
    }

    Ok(ModelRegistry {
      catalog,
      state: ModelState {
        active_model_name: name.to_string(),
        loaded_instance,
        confidence_threshold,
        excluded_classes,
      },
    })
  }

  fn load(catalog: &C, name: &str, threshold: f32) -> Result<C::Model, SwapError> {
    if !catalog.contains(name) {
      return Err(SwapError::ModelNotFound(name.to_string()));
    }
    info!("加载模型 {} ...", name);
    catalog
      .load(name, threshold)
      .map_err(|e| SwapError::LoadFailure {
        name: name.to_string(),
        source: Box::new(e),
      })
  }

  pub fn get_active(&self) -> &ModelState<C::Model> {
    &self.state
  }

  pub fn active_name(&self) -> &str {
    &self.state.active_model_name
  }

  /// 新模型完整加载成功后才替换当前引用，失败时状态保持不变
  pub fn request_swap(&mut self, name: &str) -> Result<(), SwapError> {
    let command = ModelCommand::from_request(Some(name), &self.state.active_model_name);
    self.apply(command)
  }

  pub fn apply(&mut self, command: ModelCommand) -> Result<(), SwapError> {
    let ModelCommand::SwapTo(name) = command else {
      return Ok(());
    };

    match Self::load(&self.catalog, &name, self.state.confidence_threshold) {
      Ok(instance) => {
        self.state.loaded_instance = instance;
        info!("模型已切换: {} -> {}", self.state.active_model_name, name);
        self.state.active_model_name = name;
        Ok(())
      }
      Err(e) => {
        error!(
          "{}，继续使用先前的模型 {}",
          e, self.state.active_model_name
        );
        Err(e)
      }
    }
  }
}
