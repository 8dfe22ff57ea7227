//! 终端进度渲染引擎 (Terminal UI Progress Engine)
//!
//! 基于 `indicatif` 实现非阻塞式进度条，只读消费编排引擎发出的事件。

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use parking_lot::RwLock;
use tokio::task::JoinHandle;

use crate::core::event::{EventReceiver, QueryEvent};

/// 全局 TUI 容器 (Singleton)
static MULTI: OnceLock<MultiProgress> = OnceLock::new();

/// 获取全局进度容器实例
pub fn get_multi() -> &'static MultiProgress {
    MULTI.get_or_init(MultiProgress::new)
}

/// TUI 状态容器
#[derive(Default)]
pub struct UiState {
    /// 批次进度条
    batch_bar: Option<ProgressBar>,
    /// 当前域名
    current: String,
}

static STATE: OnceLock<Arc<RwLock<UiState>>> = OnceLock::new();

fn get_state() -> &'static Arc<RwLock<UiState>> {
    STATE.get_or_init(|| Arc::new(RwLock::new(UiState::default())))
}

/// 进度协调器 (Progress Orchestrator)
pub struct Ui;

impl Ui {
    /// 激活事件监听循环；发送端全部关闭后任务自然结束
    pub fn run(receiver: EventReceiver) -> JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(event) = receiver.recv_async().await {
                Self::handle_event(event);
            }
        })
    }

    fn handle_event(event: QueryEvent) {
        let multi = get_multi();
        let state = get_state();
        let mut ui = state.write();

        match event {
            QueryEvent::BatchStarted { total } => {
                let style = ProgressStyle::default_bar()
                    .template("{spinner:.green} [{elapsed_precise}] [{bar:30.cyan/blue}] {pos}/{len} {msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_bar())
                    .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏")
                    .progress_chars("█▉▊▋▌▍▎▏  ");

                let bar = multi.add(ProgressBar::new(total as u64));
                bar.set_style(style);
                bar.enable_steady_tick(Duration::from_millis(100));
                ui.batch_bar = Some(bar);
            }
            QueryEvent::DomainStarted { domain, phase, .. } => {
                ui.current = truncate_string(&domain, 40);
                if let Some(ref bar) = ui.batch_bar {
                    bar.set_message(format!("🔍 {} ({})", ui.current, phase));
                }
            }
            QueryEvent::CaptchaAcquired { attempt, bytes } => {
                if let Some(ref bar) = ui.batch_bar {
                    bar.set_message(format!("📥 {} CAPTCHA #{} ({} B)", ui.current, attempt, bytes));
                }
            }
            QueryEvent::CaptchaSolved { attempt, code } => {
                if let Some(ref bar) = ui.batch_bar {
                    bar.set_message(format!("🤖 {} CAPTCHA #{}: {}", ui.current, attempt, code));
                }
            }
            QueryEvent::AttemptFailed {
                attempt,
                max_attempts,
                kind,
                ..
            } => {
                if let Some(ref bar) = ui.batch_bar {
                    bar.set_message(format!(
                        "⚠️ {} {} ({}/{})",
                        ui.current, kind, attempt, max_attempts
                    ));
                }
            }
            QueryEvent::DomainCompleted { domain, blocked } => {
                if let Some(ref bar) = ui.batch_bar {
                    let icon = if blocked { "🚫" } else { "✅" };
                    bar.set_message(format!("{} {}", icon, truncate_string(&domain, 40)));
                    bar.inc(1);
                }
            }
            QueryEvent::DomainFailed { domain, .. } => {
                if let Some(ref bar) = ui.batch_bar {
                    bar.set_message(format!("❌ {}", truncate_string(&domain, 40)));
                    bar.inc(1);
                }
            }
            QueryEvent::BatchFinished { summary } => {
                if let Some(bar) = ui.batch_bar.take() {
                    bar.finish_with_message(format!(
                        "🚫 {}  ✅ {}  ❓ {}",
                        summary.blocked, summary.not_blocked, summary.failed
                    ));
                }
            }
        }
    }
}

/// 执行语义化字符串截断
pub(crate) fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", truncated)
    }
}
