//! 事件系统定义
//!
//! 用于编排引擎与终端 UI 之间的解耦通信

use flume::{Receiver, Sender};

use crate::core::model::BatchSummary;

/// 查询阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum Phase {
    /// 首个域名：同时校验本次运行的第一个验证码
    #[strum(to_string = "bootstrap")]
    Bootstrap,
    /// 其余域名：复用共享会话
    #[strum(to_string = "continuation")]
    Continuation,
}

/// 查询事件类型
#[derive(Debug, Clone)]
pub enum QueryEvent {
    /// 批次开始
    BatchStarted { total: usize },

    /// 开始查询某个域名
    DomainStarted {
        index: usize,
        total: usize,
        domain: String,
        phase: Phase,
    },

    /// 验证码图片已获取
    CaptchaAcquired { attempt: u32, bytes: usize },

    /// 验证码已识别
    CaptchaSolved { attempt: u32, code: String },

    /// 单次尝试失败
    AttemptFailed {
        domain: String,
        attempt: u32,
        max_attempts: u32,
        kind: &'static str,
        error: String,
    },

    /// 域名查询成功
    DomainCompleted { domain: String, blocked: bool },

    /// 域名查询最终失败
    DomainFailed { domain: String, error: String },

    /// 批次结束
    BatchFinished { summary: BatchSummary },
}

/// 事件发送器
#[derive(Clone)]
pub struct EventSender {
    tx: Sender<QueryEvent>,
}

impl EventSender {
    pub fn new(tx: Sender<QueryEvent>) -> Self {
        Self { tx }
    }

    /// 发送事件 (接收端已关闭时静默丢弃)
    pub fn emit(&self, event: QueryEvent) {
        let _ = self.tx.send(event);
    }
}

/// 事件接收器
pub struct EventReceiver {
    rx: Receiver<QueryEvent>,
}

impl EventReceiver {
    pub fn new(rx: Receiver<QueryEvent>) -> Self {
        Self { rx }
    }

    /// 非阻塞接收事件
    #[cfg(test)]
    pub fn try_recv(&self) -> Option<QueryEvent> {
        self.rx.try_recv().ok()
    }

    /// 异步接收事件
    pub async fn recv_async(&self) -> Option<QueryEvent> {
        self.rx.recv_async().await.ok()
    }
}

/// 创建事件通道
pub fn create_event_channel() -> (EventSender, EventReceiver) {
    let (tx, rx) = flume::unbounded();
    (EventSender::new(tx), EventReceiver::new(rx))
}
