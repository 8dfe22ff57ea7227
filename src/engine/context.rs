//! 引擎运行时上下文 (Runtime Context)
//!
//! 聚合一次批量查询所需的协作者与只读参数。会话不在此处，由批次驱动器持有。

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::core::config::QueryConfig;
use crate::core::event::{EventSender, QueryEvent};
use crate::interfaces::{CaptchaSolver, LookupPortal};
use crate::utils::save_file;

/// 验证码调试图片文件名
pub const CAPTCHA_FILE: &str = "captcha.png";

/// 任务执行运行时上下文
pub struct RuntimeContext {
    /// 目标站点
    pub portal: Arc<dyn LookupPortal>,
    /// 验证码识别器
    pub solver: Arc<dyn CaptchaSolver>,
    /// 每个域名的尝试次数上限
    pub max_attempts: u32,
    /// 两次尝试之间的等待
    pub retry_delay: Duration,
    /// 相邻域名之间的节流间隔
    pub pace: Duration,
    /// 验证码图片落盘目录
    pub captcha_dir: Option<PathBuf>,
    /// 事件分发句柄
    pub events: Option<EventSender>,
}

impl RuntimeContext {
    pub fn new(
        portal: Arc<dyn LookupPortal>,
        solver: Arc<dyn CaptchaSolver>,
        config: &QueryConfig,
        events: Option<EventSender>,
    ) -> Self {
        Self {
            portal,
            solver,
            max_attempts: config.attempts(),
            retry_delay: config.retry_delay(),
            pace: config.pace(),
            captcha_dir: config.captcha_dir.clone(),
            events,
        }
    }

    /// 向事件总线推送消息
    pub fn emit(&self, event: QueryEvent) {
        if let Some(ref sender) = self.events {
            sender.emit(event);
        }
    }

    /// 按配置保存验证码图片，失败只记录警告
    pub async fn keep_captcha(&self, image: &[u8]) {
        let Some(dir) = &self.captcha_dir else {
            return;
        };
        let path = dir.join(CAPTCHA_FILE);
        match save_file(&path, image).await {
            Ok(()) => debug!("验证码图片已保存: {}", path.display()),
            Err(e) => warn!("无法保存验证码图片 {}: {}", path.display(), e),
        }
    }
}
