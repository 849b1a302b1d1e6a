// 该文件是 Kuangxuan （框选） 项目的一部分。
// src/output/signal.rs - 取消与确认信号
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
  io::BufRead,
  sync::mpsc::{Receiver, Sender, channel},
  thread,
  time::Duration,
};

use tracing::{info, warn};

/// 交互控制：视频模式下每帧轮询一次停止信号，图片模式下阻塞等待确认
pub trait StopSignal {
  /// 非阻塞地检查是否收到停止信号
  fn poll(&mut self) -> bool;

  /// 阻塞直到用户确认
  fn wait_ack(&mut self) {}
}

impl<T: StopSignal + ?Sized> StopSignal for Box<T> {
  fn poll(&mut self) -> bool {
    (**self).poll()
  }

  fn wait_ack(&mut self) {
    (**self).wait_ack()
  }
}

/// 以 Ctrl-C 作为停止键，可选地把标准输入的回车也当作确认
///
/// 两种事件写入同一个通道，由会话在帧间轮询；图片模式下按 Ctrl-C 也会正常释放资源。
pub struct CtrlcSignal {
  rx: Receiver<()>,
  stopped: bool,
  prompt: &'static str,
}

impl CtrlcSignal {
  /// 安装进程级中断处理函数，每个进程只能安装一次
  pub fn install() -> Result<Self, ctrlc::Error> {
    let (tx, rx) = channel();
    install_handler(tx)?;
    Ok(Self::from_receiver(rx, "按 Ctrl-C 退出..."))
  }

  /// 同 `install`，另外在后台读取标准输入，读到一行（或输入结束）即确认
  pub fn install_with_stdin() -> Result<Self, ctrlc::Error> {
    let (tx, rx) = channel();
    install_handler(tx.clone())?;

    thread::spawn(move || {
      let mut line = String::new();
      if let Err(e) = std::io::stdin().lock().read_line(&mut line) {
        warn!("读取标准输入失败: {}", e);
      }
      let _ = tx.send(());
    });

    Ok(Self::from_receiver(rx, "按回车键或 Ctrl-C 退出..."))
  }

  fn from_receiver(rx: Receiver<()>, prompt: &'static str) -> Self {
    Self {
      rx,
      stopped: false,
      prompt,
    }
  }
}

fn install_handler(tx: Sender<()>) -> Result<(), ctrlc::Error> {
  ctrlc::set_handler(move || {
    info!("收到中断信号，准备退出...");
    let _ = tx.send(());
    thread::spawn(|| {
      thread::sleep(Duration::from_secs(30));
      warn!("强制退出程序");
      std::process::exit(1);
    });
  })
}

impl StopSignal for CtrlcSignal {
  fn poll(&mut self) -> bool {
    if !self.stopped && self.rx.try_recv().is_ok() {
      self.stopped = true;
    }
    self.stopped
  }

  fn wait_ack(&mut self) {
    if !self.stopped {
      info!("{}", self.prompt);
      // 发送端全部断开时同样视为确认
      let _ = self.rx.recv();
      self.stopped = true;
    }
  }
}

/// 从不停止，也不等待确认
#[derive(Debug, Default)]
pub struct NoAck;

impl StopSignal for NoAck {
  fn poll(&mut self) -> bool {
    false
  }
}
