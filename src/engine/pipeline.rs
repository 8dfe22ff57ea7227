//! 批量查询驱动器
//!
//! 顺序处理域名列表：首个域名负责校验本次运行的第一个验证码并建立共享会话，
//! 其余域名在此会话上继续。共享会话只在此处持有，按值移入移出每个任务。

use std::time::Instant;

use tracing::{error, info};

use crate::core::error::{QueryError, Result};
use crate::core::event::{Phase, QueryEvent};
use crate::core::model::{BatchSummary, DecisionRecord, QueryOutcome};

use super::context::RuntimeContext;
use super::task::{QueryTask, TaskResult};

/// 批量查询引擎
pub struct BatchEngine {
    ctx: RuntimeContext,
}

impl BatchEngine {
    pub fn new(ctx: RuntimeContext) -> Self {
        Self { ctx }
    }

    /// 依次查询全部域名，结果顺序与输入一致
    ///
    /// 首个域名耗尽尝试次数时整批中止并返回 `BootstrapFailed`；
    /// 其余域名的失败只记录为 `QueryOutcome::Failure`。
    pub async fn run_batch(&self, domains: &[String], api_key: &str) -> Result<Vec<QueryOutcome>> {
        let Some((first, rest)) = domains.split_first() else {
            return Ok(Vec::new());
        };

        let total = domains.len();
        let mut outcomes = Vec::with_capacity(total);
        self.ctx.emit(QueryEvent::BatchStarted { total });
        info!("开始批量查询，共 {} 个域名", total);

        let started = Instant::now();
        self.announce(1, total, first, Phase::Bootstrap);
        let mut shared = match QueryTask::bootstrap(first.as_str(), self.ctx.max_attempts)
            .run(&self.ctx, api_key)
            .await
        {
            TaskResult::Success { record, session } => {
                self.record_success(first, record, started, &mut outcomes);
                Some(session)
            }
            TaskResult::Exhausted { attempts, error } => {
                error!("首个域名 {} 在 {} 次尝试后仍失败: {}", first, attempts, error);
                self.ctx.emit(QueryEvent::DomainFailed {
                    domain: first.clone(),
                    error: error.to_string(),
                });
                self.ctx.emit(QueryEvent::BatchFinished {
                    summary: BatchSummary::from_outcomes(total, &outcomes),
                });
                return Err(QueryError::BootstrapFailed {
                    domain: first.clone(),
                    attempts,
                    source: Box::new(error),
                });
            }
        };

        for (i, domain) in rest.iter().enumerate() {
            if !self.ctx.pace.is_zero() {
                tokio::time::sleep(self.ctx.pace).await;
            }

            let started = Instant::now();
            self.announce(i + 2, total, domain, Phase::Continuation);
            match QueryTask::continuation(domain.as_str(), self.ctx.max_attempts, shared.take())
                .run(&self.ctx, api_key)
                .await
            {
                TaskResult::Success { record, session } => {
                    shared = Some(session);
                    self.record_success(domain, record, started, &mut outcomes);
                }
                TaskResult::Exhausted { attempts, error } => {
                    error!("{} 在 {} 次尝试后仍失败: {}", domain, attempts, error);
                    self.ctx.emit(QueryEvent::DomainFailed {
                        domain: domain.clone(),
                        error: error.to_string(),
                    });
                    outcomes.push(QueryOutcome::Failure {
                        domain: domain.clone(),
                        reason: error.to_string(),
                        elapsed: started.elapsed(),
                    });
                }
            }
        }

        let summary = BatchSummary::from_outcomes(total, &outcomes);
        info!(
            "批量查询结束: {} 封禁, {} 未封禁, {} 失败",
            summary.blocked, summary.not_blocked, summary.failed
        );
        self.ctx.emit(QueryEvent::BatchFinished { summary });
        Ok(outcomes)
    }

    fn announce(&self, index: usize, total: usize, domain: &str, phase: Phase) {
        info!("[{}/{}] {} ({})", index, total, domain, phase);
        self.ctx.emit(QueryEvent::DomainStarted {
            index,
            total,
            domain: domain.to_string(),
            phase,
        });
    }

    fn record_success(
        &self,
        domain: &str,
        record: DecisionRecord,
        started: Instant,
        outcomes: &mut Vec<QueryOutcome>,
    ) {
        self.ctx.emit(QueryEvent::DomainCompleted {
            domain: domain.to_string(),
            blocked: record.blocked,
        });
        outcomes.push(QueryOutcome::Success {
            domain: domain.to_string(),
            record,
            elapsed: started.elapsed(),
        });
    }
}
