// 该文件是 Kuangxuan （框选） 项目的一部分。
// src/task.rs - 帧处理循环
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

use std::time::Instant;

use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::{
  config::{Mode, SessionConfig},
  frame::Frame,
  input::{AcquisitionError, FrameSource},
  model::{DecodeError, DetectResult, Detector, decode, suppress_with_scope},
  output::{Overlay, Render, StopSignal},
};

type BoxedError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Error, Debug)]
pub enum TaskError {
  #[error("解码失败: {0}")]
  Decode(#[from] DecodeError),
  #[error("推理失败: {0}")]
  Inference(#[source] BoxedError),
  #[error("渲染失败: {0}")]
  Render(#[source] BoxedError),
  #[error("连续 {failures} 次获取帧失败: {last}")]
  Acquisition {
    failures: u32,
    #[source]
    last: AcquisitionError,
  },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
  Running,
  Stopped,
}

/// 单次迭代的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
  /// 处理完一帧，附带保留的检测框数量
  Processed { retained: usize },
  /// 获取帧失败，本帧被跳过
  Skipped,
  /// 会话已停止，没有处理任何帧
  Stopped,
}

/// 会话结束时的统计
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunSummary {
  pub frames: u64,
  pub skipped: u64,
  pub detections: u64,
  pub fps: f32,
}

/// 一次处理会话
///
/// 持有输入源、检测器、输出与停止信号，以及唯一的跨帧状态（帧计数与起始时间）。
/// 输入源与输出在 `teardown` 中释放，且只释放一次；`Drop` 兜底调用 `teardown`。
pub struct Session<S, D, O, C>
where
  S: FrameSource,
  O: Render<Frame, DetectResult>,
{
  source: S,
  detector: D,
  output: O,
  signal: C,
  config: SessionConfig,
  state: LoopState,
  frame_count: u64,
  skipped: u64,
  detections: u64,
  consecutive_failures: u32,
  start: Instant,
  fps: f32,
  released: bool,
}

impl<S, D, O, C> Session<S, D, O, C>
where
  S: FrameSource,
  D: Detector,
  O: Render<Frame, DetectResult>,
  C: StopSignal,
{
  pub fn new(source: S, detector: D, output: O, signal: C, config: SessionConfig) -> Self {
    info!(
      "创建会话: 模式 {:?}, 阈值 {:?}, 类别数 {}",
      config.mode, config.thresholds, config.num_classes
    );
    Self {
      source,
      detector,
      output,
      signal,
      config,
      state: LoopState::Running,
      frame_count: 0,
      skipped: 0,
      detections: 0,
      consecutive_failures: 0,
      start: Instant::now(),
      fps: 0.0,
      released: false,
    }
  }

  pub fn state(&self) -> LoopState {
    self.state
  }

  pub fn frame_count(&self) -> u64 {
    self.frame_count
  }

  /// 最近一次计算的帧率
  pub fn fps(&self) -> f32 {
    self.fps
  }

  pub fn summary(&self) -> RunSummary {
    RunSummary {
      frames: self.frame_count,
      skipped: self.skipped,
      detections: self.detections,
      fps: self.fps,
    }
  }

  fn stop(&mut self, reason: &str) {
    if self.state == LoopState::Running {
      info!("会话停止: {}", reason);
      self.state = LoopState::Stopped;
    }
  }

  /// 执行一次迭代：获取、推理、解码、抑制、渲染、计数、检查停止信号
  pub fn step(&mut self) -> Result<StepOutcome, TaskError> {
    if self.state == LoopState::Stopped {
      return Ok(StepOutcome::Stopped);
    }
    if let Some(max) = self.config.max_frames
      && self.frame_count >= max
    {
      self.stop("达到最大帧数");
      return Ok(StepOutcome::Stopped);
    }

    let frame = match self.source.acquire() {
      Ok(Some(frame)) => {
        self.consecutive_failures = 0;
        frame
      }
      Ok(None) => {
        self.stop("输入源已耗尽");
        return Ok(StepOutcome::Stopped);
      }
      Err(e) => {
        self.consecutive_failures += 1;
        let limit = self.config.acquisition.max_consecutive_failures;
        if self.consecutive_failures > limit {
          error!("连续 {} 次获取帧失败，终止会话", self.consecutive_failures);
          return Err(TaskError::Acquisition {
            failures: self.consecutive_failures,
            last: e,
          });
        }
        warn!(
          "获取帧失败，跳过 ({}/{}): {}",
          self.consecutive_failures, limit, e
        );
        self.skipped += 1;
        if self.signal.poll() {
          self.stop("收到停止信号");
        }
        return Ok(StepOutcome::Skipped);
      }
    };

    let rows = self
      .detector
      .infer(&frame)
      .map_err(|e| TaskError::Inference(Box::new(e)))?;

    let thresholds = self.config.thresholds;
    let decoded = decode(
      &rows,
      frame.width(),
      frame.height(),
      thresholds.confidence(),
      self.config.num_classes,
    )?;
    let retained = suppress_with_scope(
      &decoded,
      thresholds.score(),
      thresholds.overlap(),
      self.config.scope,
    );
    let result = decoded.select(&retained);

    let overlay = Overlay {
      fps: (self.config.mode == Mode::Video).then_some(self.fps),
    };
    self
      .output
      .render_result(&frame, &result, &overlay)
      .map_err(|e| TaskError::Render(Box::new(e)))?;

    self.frame_count += 1;
    self.detections += result.len() as u64;
    let elapsed = self.start.elapsed().as_secs_f32();
    if elapsed > 0.0 {
      self.fps = self.frame_count as f32 / elapsed;
    }
    debug!(
      "第 {} 帧: {} 行候选, 解码 {}, 保留 {}, FPS {:.1}",
      frame.index,
      rows.len(),
      decoded.len(),
      result.len(),
      self.fps
    );

    if self.signal.poll() {
      self.stop("收到停止信号");
    }
    Ok(StepOutcome::Processed {
      retained: result.len(),
    })
  }

  /// 连续处理直到停止；无论成功与否都会释放资源
  pub fn run(&mut self) -> Result<RunSummary, TaskError> {
    info!("开始任务...");
    while self.state == LoopState::Running {
      if let Err(e) = self.step() {
        self.fail(&e);
        return Err(e);
      }
    }
    self.teardown()?;
    let summary = self.summary();
    info!(
      "任务完成: {} 帧, 跳过 {} 帧, {} 个检测框, FPS {:.1}",
      summary.frames, summary.skipped, summary.detections, summary.fps
    );
    Ok(summary)
  }

  /// 单帧模式：处理一帧后阻塞等待确认再释放资源
  pub fn run_once(&mut self) -> Result<RunSummary, TaskError> {
    info!("开始单帧任务...");
    loop {
      match self.step() {
        Ok(StepOutcome::Skipped) if self.state == LoopState::Running => continue,
        Ok(_) => break,
        Err(e) => {
          self.fail(&e);
          return Err(e);
        }
      }
    }
    self.signal.wait_ack();
    self.stop("单帧处理完成");
    self.teardown()?;
    Ok(self.summary())
  }

  fn fail(&mut self, e: &TaskError) {
    error!("任务失败: {}", e);
    self.stop("出现错误");
    if let Err(release_err) = self.teardown() {
      error!("释放资源时出错: {}", release_err);
    }
  }

  /// 释放输入源并结束输出，重复调用无效果
  pub fn teardown(&mut self) -> Result<(), TaskError> {
    if self.released {
      return Ok(());
    }
    self.released = true;
    self.state = LoopState::Stopped;

    debug!("释放输入源与输出");
    self.source.release();
    self
      .output
      .finish()
      .map_err(|e| TaskError::Render(Box::new(e)))
  }
}

impl<S, D, O, C> Drop for Session<S, D, O, C>
where
  S: FrameSource,
  O: Render<Frame, DetectResult>,
{
  fn drop(&mut self) {
    if self.released {
      return;
    }
    self.released = true;
    self.source.release();
    if let Err(e) = self.output.finish() {
      error!("释放资源时出错: {}", e);
    }
  }
}

pub trait Task<S, D, O, C>: Sized {
  type Error;
  fn run_task(
    self,
    input: S,
    model: D,
    output: O,
    signal: C,
    config: SessionConfig,
  ) -> Result<RunSummary, Self::Error>;
}

/// 单张图片：处理一帧后等待确认
pub struct OneShotTask;

impl<S, D, O, C> Task<S, D, O, C> for OneShotTask
where
  S: FrameSource,
  D: Detector,
  O: Render<Frame, DetectResult>,
  C: StopSignal,
{
  type Error = TaskError;

  fn run_task(
    self,
    input: S,
    model: D,
    output: O,
    signal: C,
    config: SessionConfig,
  ) -> Result<RunSummary, Self::Error> {
    Session::new(input, model, output, signal, config).run_once()
  }
}

/// 连续视频：逐帧处理直到停止信号、输入耗尽或达到指定帧数
#[derive(Default, Debug)]
pub struct ContinuousTask {
  frame_number: Option<u64>,
}

impl ContinuousTask {
  pub fn with_frame_number(mut self, frame_number: Option<u64>) -> Self {
    self.frame_number = frame_number;
    self
  }
}

impl<S, D, O, C> Task<S, D, O, C> for ContinuousTask
where
  S: FrameSource,
  D: Detector,
  O: Render<Frame, DetectResult>,
  C: StopSignal,
{
  type Error = TaskError;

  fn run_task(
    self,
    input: S,
    model: D,
    output: O,
    signal: C,
    config: SessionConfig,
  ) -> Result<RunSummary, Self::Error> {
    let config = match self.frame_number {
      Some(n) => config.with_max_frames(Some(n)),
      None => config,
    };
    Session::new(input, model, output, signal, config).run()
  }
}
