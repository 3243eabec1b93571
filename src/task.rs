// 该文件是 Skyscout （天巡） 项目的一部分。
// src/task.rs - 帧处理任务循环
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
  sync::mpsc::{self, Receiver},
  thread,
  time::Duration,
};
use tracing::{info, warn};

use crate::{
  engine::{Engine, dispatch},
  frame::RawFrame,
  result::{ResultWrapper, Status},
};

pub trait Task<I, E>: Sized {
  type Error;
  fn run_task(self, input: I, engine: E) -> Result<TaskSummary, Self::Error>;
}

/// 任务结束时的统计
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TaskSummary {
  pub frames: usize,
  pub wrong_format: usize,
  pub results: usize,
}

impl TaskSummary {
  fn record(&mut self, result: &ResultWrapper) {
    self.frames += 1;
    match result.status {
      Status::Success => self.results += result.results.len(),
      Status::WrongInputFormat => self.wrong_format += 1,
    }
  }
}

#[derive(Default, Debug)]
pub struct ContinuousTask {
  frame_number: Option<usize>,
  handle_interrupt: bool,
}

impl ContinuousTask {
  pub fn with_frame_number(mut self, frame_number: Option<usize>) -> Self {
    self.frame_number = frame_number;
    self
  }

  /// 注册 Ctrl-C 处理，进程内只能调用一次
  pub fn with_interrupt(mut self, handle_interrupt: bool) -> Self {
    self.handle_interrupt = handle_interrupt;
    self
  }

  fn install_interrupt() -> anyhow::Result<Receiver<()>> {
    let (tx, rx) = mpsc::channel();
    ctrlc::set_handler(move || {
      info!("收到中断信号，准备退出...");
      let _ = tx.send(());
      thread::spawn(|| {
        thread::sleep(Duration::from_secs(30));
        warn!("强制退出程序");
        std::process::exit(1);
      });
    })?;
    Ok(rx)
  }
}

impl<I: Iterator<Item = RawFrame>, E: Engine> Task<I, E> for ContinuousTask {
  type Error = anyhow::Error;

  fn run_task(self, input: I, mut engine: E) -> Result<TaskSummary, Self::Error> {
    info!("开始任务 [{}]...", engine.name());
    let interrupt = if self.handle_interrupt {
      Some(Self::install_interrupt()?)
    } else {
      None
    };

    let mut summary = TaskSummary::default();
    for frame in input {
      let started = std::time::Instant::now();
      let result = dispatch(&mut engine, frame);
      summary.record(&result);

      info!(
        "帧 {} 处理完成: {:?}, {} 个结果, 耗时: {:.2?}",
        result.frame_id,
        result.status,
        result.results.len(),
        started.elapsed()
      );
      for payload in &result.results {
        info!("  {}", String::from_utf8_lossy(&payload.payload));
      }

      if self.frame_number.map(|n| summary.frames >= n).unwrap_or(false) {
        info!("达到指定帧数 {}, 退出任务循环", summary.frames);
        break;
      }
      if interrupt.as_ref().is_some_and(|rx| rx.try_recv().is_ok()) {
        warn!("中断信号接收，退出任务循环");
        break;
      }
    }

    info!("任务完成，退出: {:?}", summary);
    Ok(summary)
  }
}
