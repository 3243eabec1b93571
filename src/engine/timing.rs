// 该文件是 Skyscout （天巡） 项目的一部分。
// src/engine/timing.rs - 引擎耗时统计
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

use std::{
  fmt,
  time::{Duration, Instant},
};

use tracing::info;

use crate::{
  engine::{Engine, Stage, StageHook},
  frame::FrameRequest,
  result::ResultWrapper,
};

const REPORT_INTERVAL: Duration = Duration::from_secs(5);

/// 单帧各阶段的时间戳
#[derive(Debug, Clone, Copy, Default)]
pub struct StageTimes {
  pub received: Option<Instant>,
  pub inference_start: Option<Instant>,
  pub inference_end: Option<Instant>,
  pub done: Option<Instant>,
}

impl StageHook for StageTimes {
  fn mark(&mut self, stage: Stage) {
    let now = Some(Instant::now());
    match stage {
      Stage::Received => self.received = now,
      Stage::InferenceStart => self.inference_start = now,
      Stage::InferenceEnd => self.inference_end = now,
      Stage::Done => self.done = now,
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimingReport {
  pub pre: Duration,
  pub infer: Duration,
  pub post: Duration,
  pub wait: Duration,
  pub fps: f64,
  pub avg_fps: f64,
}

impl fmt::Display for TimingReport {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(
      f,
      "pre {:.1} ms, infer {:.1} ms, post {:.1} ms, wait {:.1} ms, fps {:.2}, avg fps: {:.2}",
      self.pre.as_secs_f64() * 1000.0,
      self.infer.as_secs_f64() * 1000.0,
      self.post.as_secs_f64() * 1000.0,
      self.wait.as_secs_f64() * 1000.0,
      self.fps,
      self.avg_fps
    )
  }
}

/// 滚动帧率统计，报告间隔从上次输出开始计算
#[derive(Debug)]
pub struct FrameStats {
  count: u64,
  last_count: u64,
  last_time: Instant,
  last_print: Instant,
  interval: Duration,
}

impl FrameStats {
  pub fn new(start: Instant) -> Self {
    Self {
      count: 0,
      last_count: 0,
      last_time: start,
      last_print: start,
      interval: REPORT_INTERVAL,
    }
  }

  pub fn with_interval(mut self, interval: Duration) -> Self {
    self.interval = interval;
    self
  }

  pub fn count(&self) -> u64 {
    self.count
  }

  /// 记录一帧，到达报告间隔时返回统计结果
  pub fn record(&mut self, times: &StageTimes) -> Option<TimingReport> {
    let end = times.done.unwrap_or(self.last_time);
    let start = times.received.unwrap_or(end);
    // 未经推理的帧（如 TEXT）推理阶段视为零长度
    let infer_start = times.inference_start.unwrap_or(start);
    let infer_end = times.inference_end.unwrap_or(infer_start);

    self.count += 1;
    let report = if end.saturating_duration_since(self.last_print) > self.interval {
      let since_last = end.saturating_duration_since(self.last_time).as_secs_f64();
      let since_print = end.saturating_duration_since(self.last_print).as_secs_f64();
      let report = TimingReport {
        pre: infer_start.saturating_duration_since(start),
        infer: infer_end.saturating_duration_since(infer_start),
        post: end.saturating_duration_since(infer_end),
        wait: start.saturating_duration_since(self.last_time),
        fps: if since_last > 0.0 { 1.0 / since_last } else { 0.0 },
        avg_fps: (self.count - self.last_count) as f64 / since_print,
      };
      self.last_count = self.count;
      self.last_print = end;
      Some(report)
    } else {
      None
    };

    self.last_time = end;
    report
  }
}

/// 包装任意引擎，在不改变处理结果的前提下统计耗时
pub struct TimingEngine<E> {
  inner: E,
  stats: FrameStats,
}

impl<E: Engine> TimingEngine<E> {
  pub fn new(inner: E) -> Self {
    Self {
      inner,
      stats: FrameStats::new(Instant::now()),
    }
  }

  pub fn inner(&self) -> &E {
    &self.inner
  }

  pub fn stats(&self) -> &FrameStats {
    &self.stats
  }
}

struct Tee<'a> {
  times: &'a mut StageTimes,
  outer: &'a mut dyn StageHook,
}

impl StageHook for Tee<'_> {
  fn mark(&mut self, stage: Stage) {
    self.times.mark(stage);
    self.outer.mark(stage);
  }
}

impl<E: Engine> Engine for TimingEngine<E> {
  fn name(&self) -> &str {
    self.inner.name()
  }

  fn handle_with(&mut self, request: FrameRequest, hook: &mut dyn StageHook) -> ResultWrapper {
    let mut times = StageTimes::default();
    let result = self.inner.handle_with(
      request,
      &mut Tee {
        times: &mut times,
        outer: hook,
      },
    );

    if let Some(report) = self.stats.record(&times) {
      info!("[{}] {}", self.inner.name(), report);
    }
    result
  }
}
