// 该文件是 Skyscout （天巡） 项目的一部分。
// src/main.rs - 项目主程序
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

mod args;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use skyscout::{
  FromUrl,
  assemble::parse_exclusions,
  avoidance::ObstacleSegmenter,
  engine::{
    DEPTH_ENGINE_NAME, Engine, OBJECT_ENGINE_NAME, ScoutEngine, TimingEngine,
  },
  geo::GeodeticLocalizer,
  input::InputWrapper,
  model::{ModelRegistry, RecordedDepthCatalog, RecordedDetectorCatalog},
  output::{DetectionLog, ImageStore, draw::Draw},
  pipeline::{DepthAnalyzer, ObjectAnalyzer},
  task::{ContinuousTask, Task},
};

use crate::args::{Args, Command, CommonArgs, DepthArgs, ObjectArgs};

const OBJECT_LOG: &str = "openscout-object-engine.log";
const DEPTH_LOG: &str = "obstacle-avoidance-engine.log";

fn load_draw(common: &CommonArgs) -> Result<Draw> {
  let mut draw = Draw::default();
  if let Some(path) = &common.font {
    draw = draw
      .with_font_file(path)
      .with_context(|| format!("无法加载字体 {}", path.display()))?;
  }
  if let Some(path) = &common.watermark {
    draw = draw
      .with_watermark_file(path)
      .with_context(|| format!("无法加载水印 {}", path.display()))?;
  }
  Ok(draw)
}

fn run<E: Engine>(common: &CommonArgs, engine: E) -> Result<()> {
  let input = InputWrapper::from_url(&common.input)?;
  let task = ContinuousTask::default()
    .with_frame_number(common.frames)
    .with_interrupt(true);

  let summary = if !common.no_timing {
    task.run_task(input, TimingEngine::new(engine))?
  } else {
    task.run_task(input, engine)?
  };
  info!(
    "共处理 {} 帧，{} 帧格式错误，{} 条结果",
    summary.frames, summary.wrong_format, summary.results
  );
  Ok(())
}

fn run_object(args: ObjectArgs) -> Result<()> {
  let common = &args.common;
  let excluded = parse_exclusions(&args.exclude).context("排除类别列表格式错误")?;
  info!("无人机型号: {}, 视场角: {:?}", args.drone, args.drone.field_of_view());

  let registry = ModelRegistry::new(
    RecordedDetectorCatalog::new(&common.model_root),
    &args.model,
    args.threshold,
    excluded,
  )?;
  let log = DetectionLog::open(common.log.clone().unwrap_or_else(|| OBJECT_LOG.into()))?;
  info!("检测日志: {}", log.path().display());
  let store = common.store.then(|| ImageStore::for_objects(&common.images));

  let engine = ScoutEngine::new(
    OBJECT_ENGINE_NAME,
    registry,
    ObjectAnalyzer::new(GeodeticLocalizer::new(args.drone)).with_draw(load_draw(common)?),
    log,
  )
  .with_store(store)
  .with_webserver(common.webserver.clone());

  run(common, engine)
}

fn run_depth(args: DepthArgs) -> Result<()> {
  let common = &args.common;
  let registry = ModelRegistry::new(
    RecordedDepthCatalog::midas(&common.model_root),
    &args.model,
    0.0,
    Default::default(),
  )?;
  let log = DetectionLog::open(common.log.clone().unwrap_or_else(|| DEPTH_LOG.into()))?;
  info!("避障日志: {}", log.path().display());
  let store = common.store.then(|| ImageStore::for_depth(&common.images));

  let segmenter = ObstacleSegmenter::new(args.threshold).with_margins(args.margin_x, args.margin_y);
  info!("深度阈值: {}", segmenter.threshold());

  let engine = ScoutEngine::new(
    DEPTH_ENGINE_NAME,
    registry,
    DepthAnalyzer::new(segmenter).with_draw(load_draw(common)?),
    log,
  )
  .with_store(store)
  .with_webserver(common.webserver.clone());

  run(common, engine)
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();
  info!("{:?}", args);

  match args.command {
    Command::Object(args) => run_object(args),
    Command::Depth(args) => run_depth(args),
  }
}
