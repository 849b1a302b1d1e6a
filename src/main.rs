// 该文件是 Kuangxuan （框选） 项目的一部分。
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

use anyhow::Result;
use clap::Parser;
use tracing::info;

use kuangxuan::{
  FromUrl,
  config::Mode,
  input::InputWrapper,
  model::{ClassList, ReplayDetector},
  output::{ColorTable, CtrlcSignal, Draw, NoAck, OutputWrapper, StopSignal},
  task::{ContinuousTask, OneShotTask, Task},
};

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = args::Args::parse();

  info!("模型输出来源: {}", args.model);
  info!("输入来源: {}", args.input);
  info!("输出路径: {}", args.output);

  let classes = match &args.labels {
    Some(path) => ClassList::from_file(path)?,
    None => ClassList::coco(),
  };
  let config = args.session_config(classes.len())?;
  info!("运行模式: {:?}, 阈值: {:?}", config.mode, config.thresholds);

  let colors = ColorTable::new(classes.len(), args.seed);
  let mut draw = Draw::new(classes, colors, args.color_indexing());
  if let Some(font) = &args.font {
    draw = draw.with_font(Draw::load_font(font)?);
  }

  let input = InputWrapper::from_url(&args.input)?;
  let model = ReplayDetector::from_url(&args.model)?;
  let output = OutputWrapper::create(&args.output, draw)?;

  let summary = match args.mode {
    Mode::Image => {
      let signal: Box<dyn StopSignal> = if args.no_wait {
        Box::new(NoAck)
      } else {
        Box::new(CtrlcSignal::install_with_stdin()?)
      };
      OneShotTask.run_task(input, model, output, signal, config)?
    }
    Mode::Video => {
      let signal = CtrlcSignal::install()?;
      ContinuousTask::default()
        .with_frame_number(args.max_frames)
        .run_task(input, model, output, signal, config)?
    }
  };

  info!("处理完成!");
  info!("总帧数: {}", summary.frames);
  info!("跳过帧数: {}", summary.skipped);
  info!("总检测数: {}", summary.detections);
  info!("平均帧率: {:.1}", summary.fps);

  Ok(())
}
