// 该文件是 Skyscout （天巡） 项目的一部分。
// src/engine.rs - 帧分发与引擎状态机
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

use std::fmt::Display;

use chrono::Utc;
use tracing::{debug, error, info, warn};

use crate::{
  frame::{FrameRequest, PayloadKind, RawFrame},
  model::{
    InferenceFrame, Model, ModelCatalog, ModelCommand, ModelRegistry, RecordedDepthCatalog,
    RecordedDetectorCatalog,
  },
  output::{DetectionSink, ImageStore},
  pipeline::{Analyzer, DepthAnalyzer, FrameContext, ObjectAnalyzer},
  result::{ResultPayload, ResultWrapper},
};

mod timing;

pub use self::timing::{FrameStats, StageTimes, TimingEngine, TimingReport};

pub const OBJECT_ENGINE_NAME: &str = "openscout-object";
pub const DEPTH_ENGINE_NAME: &str = "obstacle-avoidance";

/// 单帧处理中的各个阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
  Received,
  InferenceStart,
  InferenceEnd,
  Done,
}

pub trait StageHook {
  fn mark(&mut self, stage: Stage);
}

impl StageHook for () {
  fn mark(&mut self, _stage: Stage) {}
}

/// 一个请求恰好产生一个响应，内部失败不会向外传播
pub trait Engine {
  fn name(&self) -> &str;

  fn handle_with(&mut self, request: FrameRequest, hook: &mut dyn StageHook) -> ResultWrapper;

  fn handle(&mut self, request: FrameRequest) -> ResultWrapper {
    self.handle_with(request, &mut ())
  }
}

/// 解码传输层帧后交给引擎处理
pub fn dispatch<E: Engine + ?Sized>(engine: &mut E, raw: RawFrame) -> ResultWrapper {
  let frame_id = raw.frame_id;
  match FrameRequest::decode(raw) {
    Ok(request) => engine.handle(request),
    Err(e) => {
      warn!("帧 {} 格式错误: {}", frame_id, e);
      ResultWrapper::wrong_input_format(engine.name(), frame_id)
    }
  }
}

/// 同一毫秒内的多帧依靠帧号区分
pub fn image_filename(timestamp_ms: i64, frame_id: u64) -> String {
  format!("{}-{}.jpg", timestamp_ms, frame_id)
}

pub struct ScoutEngine<C: ModelCatalog, A> {
  name: String,
  registry: ModelRegistry<C>,
  analyzer: A,
  sink: Box<dyn DetectionSink + Send>,
  store: Option<ImageStore>,
  webserver: Option<String>,
}

pub type ObjectEngine = ScoutEngine<RecordedDetectorCatalog, ObjectAnalyzer>;
pub type DepthEngine = ScoutEngine<RecordedDepthCatalog, DepthAnalyzer>;

impl<C: ModelCatalog, A> ScoutEngine<C, A> {
  pub fn new(
    name: &str,
    registry: ModelRegistry<C>,
    analyzer: A,
    sink: impl DetectionSink + Send + 'static,
  ) -> Self {
    Self {
      name: name.to_string(),
      registry,
      analyzer,
      sink: Box::new(sink),
      store: None,
      webserver: None,
    }
  }

  pub fn with_store(mut self, store: Option<ImageStore>) -> Self {
    self.store = store;
    self
  }

  pub fn with_webserver(mut self, webserver: Option<String>) -> Self {
    self.webserver = webserver.map(|s| s.trim_end_matches('/').to_string());
    self
  }

  pub fn registry(&self) -> &ModelRegistry<C> {
    &self.registry
  }

  /// 保存标注图像，返回日志中引用的地址
  fn store_annotated(&self, filename: &str, annotated: &image::RgbImage) -> Option<String> {
    let store = self.store.as_ref()?;
    match store.store_annotated(filename, annotated) {
      Ok(path) => Some(match &self.webserver {
        Some(base) => format!("{}/{}", base, store.annotated_name(filename)),
        None => path.display().to_string(),
      }),
      Err(e) => {
        warn!("标注图像保存失败: {}", e);
        None
      }
    }
  }
}

impl<C, A> Engine for ScoutEngine<C, A>
where
  C: ModelCatalog,
  C::Model: Model<Input = InferenceFrame, Output = A::Raw>,
  <C::Model as Model>::Error: Display,
  A: Analyzer,
{
  fn name(&self) -> &str {
    &self.name
  }

  fn handle_with(&mut self, request: FrameRequest, hook: &mut dyn StageHook) -> ResultWrapper {
    hook.mark(Stage::Received);
    let frame_id = request.frame_id;

    if request.payload_kind == PayloadKind::Text {
      info!("帧 {} 为 TEXT 载荷，忽略", frame_id);
      hook.mark(Stage::Done);
      return ResultWrapper::ignored(&self.name, frame_id);
    }

    let command =
      ModelCommand::from_request(request.requested_model.as_deref(), self.registry.active_name());
    if self.registry.apply(command).is_err() {
      warn!("帧 {} 使用模型 {} 继续处理", frame_id, self.registry.active_name());
    }

    let image = match image::load_from_memory(&request.raw_payload) {
      Ok(image) => image.to_rgb8(),
      Err(e) => {
        warn!("帧 {} 图像解码失败: {}", frame_id, e);
        hook.mark(Stage::Done);
        return ResultWrapper::wrong_input_format(&self.name, frame_id);
      }
    };
    debug!(
      "帧 {} 来自 {}: {}x{}, 位姿 {:?}",
      frame_id,
      request.drone_id,
      image.width(),
      image.height(),
      request.pose
    );

    let timestamp_ms = Utc::now().timestamp_millis();
    let filename = image_filename(timestamp_ms, frame_id);
    if let Some(store) = &self.store
      && let Err(e) = store.store_received(&filename, &image)
    {
      warn!("原始图像保存失败: {}", e);
    }

    let frame = InferenceFrame { frame_id, image };
    let state = self.registry.get_active();
    hook.mark(Stage::InferenceStart);
    let raw = state.loaded_instance.infer(&frame);
    hook.mark(Stage::InferenceEnd);

    let raw = match raw {
      Ok(raw) => raw,
      Err(e) => {
        error!("模型 {} 推理失败: {}", state.active_model_name, e);
        hook.mark(Stage::Done);
        return ResultWrapper::success(&self.name, frame_id, Vec::new());
      }
    };

    let ctx = FrameContext {
      frame_id,
      timestamp_ms,
      drone_id: &request.drone_id,
      pose: &request.pose,
      image: &frame.image,
    };
    let analysis = self
      .analyzer
      .analyze(&ctx, raw, &state.filter(), self.store.is_some());

    let url = analysis
      .annotated
      .as_ref()
      .and_then(|annotated| self.store_annotated(&filename, annotated));

    for mut entry in analysis.log_entries {
      entry.url = url.clone();
      if let Err(e) = self.sink.append(&entry) {
        warn!("检测日志写入失败: {}", e);
      }
    }

    let results = analysis
      .payload
      .map(|payload| {
        vec![ResultPayload {
          payload_kind: PayloadKind::Text,
          payload,
        }]
      })
      .unwrap_or_default();

    hook.mark(Stage::Done);
    ResultWrapper::success(&self.name, frame_id, results)
  }
}
