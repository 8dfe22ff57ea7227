//! 单域名查询状态机
//!
//! `NeedCaptcha -> Solving -> Submitting -> Done`，所有失败都经由同一个转移函数。

use tracing::{debug, info, warn};

use crate::core::error::QueryError;
use crate::core::event::{Phase, QueryEvent};
use crate::core::model::{CaptchaChallenge, DecisionRecord};
use crate::network::session::Session;

use super::context::RuntimeContext;

/// 状态机的当前状态
#[derive(Debug)]
pub enum Step {
    /// 需要一张新的验证码
    NeedCaptcha,
    /// 已拿到图片，等待识别
    Solving(CaptchaChallenge),
    /// 已拿到验证码，等待提交
    Submitting {
        challenge: CaptchaChallenge,
        code: String,
    },
    Done(TaskResult),
}

/// 任务执行结果
#[derive(Debug)]
pub enum TaskResult {
    /// 查询成功，附带提交后更新的会话
    Success {
        record: DecisionRecord,
        session: Session,
    },
    /// 尝试次数耗尽，附带最后一次失败的原因
    Exhausted { attempts: u32, error: QueryError },
}

/// 单个域名的查询任务
#[derive(Debug)]
pub struct QueryTask {
    pub domain: String,
    pub phase: Phase,
    attempt: u32,
    max_attempts: u32,
    session: Option<Session>,
}

impl QueryTask {
    /// 首个域名：每次尝试都建立新会话
    pub fn bootstrap(domain: impl Into<String>, max_attempts: u32) -> Self {
        Self::new(domain.into(), Phase::Bootstrap, max_attempts, None)
    }

    /// 后续域名：优先复用共享会话
    pub fn continuation(
        domain: impl Into<String>,
        max_attempts: u32,
        session: Option<Session>,
    ) -> Self {
        Self::new(domain.into(), Phase::Continuation, max_attempts, session)
    }

    fn new(domain: String, phase: Phase, max_attempts: u32, session: Option<Session>) -> Self {
        Self {
            domain,
            phase,
            attempt: 0,
            max_attempts: max_attempts.max(1),
            session,
        }
    }

    /// 驱动状态机直至完成
    pub async fn run(mut self, ctx: &RuntimeContext, api_key: &str) -> TaskResult {
        let mut step = Step::NeedCaptcha;
        loop {
            step = match step {
                Step::NeedCaptcha => self.acquire(ctx).await,
                Step::Solving(challenge) => self.solve(ctx, challenge, api_key).await,
                Step::Submitting { challenge, code } => self.submit(ctx, challenge, code).await,
                Step::Done(result) => return result,
            };
        }
    }

    async fn acquire(&mut self, ctx: &RuntimeContext) -> Step {
        if self.attempt > 0 && !ctx.retry_delay.is_zero() {
            tokio::time::sleep(ctx.retry_delay).await;
        }

        let existing = match self.phase {
            Phase::Bootstrap => None,
            Phase::Continuation => self.session.take(),
        };
        debug!(
            "[{}] 第 {} 次尝试，{}",
            self.domain,
            self.attempt + 1,
            if existing.is_some() { "复用会话" } else { "新会话" }
        );

        match ctx.portal.acquire_captcha(existing).await {
            Ok(challenge) => {
                ctx.emit(QueryEvent::CaptchaAcquired {
                    attempt: self.attempt + 1,
                    bytes: challenge.image.len(),
                });
                ctx.keep_captcha(&challenge.image).await;
                Step::Solving(challenge)
            }
            Err(e) => self.fail(ctx, e),
        }
    }

    async fn solve(&mut self, ctx: &RuntimeContext, challenge: CaptchaChallenge, api_key: &str) -> Step {
        match ctx.solver.recognize(&challenge.image, api_key).await {
            Ok(code) => {
                ctx.emit(QueryEvent::CaptchaSolved {
                    attempt: self.attempt + 1,
                    code: code.clone(),
                });
                Step::Submitting { challenge, code }
            }
            Err(e) => self.fail(ctx, e),
        }
    }

    async fn submit(&mut self, ctx: &RuntimeContext, challenge: CaptchaChallenge, code: String) -> Step {
        match ctx.portal.submit(&self.domain, &code, &challenge.session).await {
            Ok(sub) if ctx.portal.is_captcha_rejected(&sub.body) => {
                self.fail(ctx, QueryError::CaptchaRejected)
            }
            Ok(sub) => {
                let record = ctx.portal.extract(&sub.body);
                info!("[{}] 查询完成 (blocked = {})", self.domain, record.blocked);
                Step::Done(TaskResult::Success {
                    record,
                    session: sub.session,
                })
            }
            Err(e) => self.fail(ctx, e),
        }
    }

    fn fail(&mut self, ctx: &RuntimeContext, error: QueryError) -> Step {
        warn!(
            "[{}] 第 {}/{} 次尝试失败 ({}): {}",
            self.domain,
            self.attempt + 1,
            self.max_attempts,
            error.kind(),
            error
        );
        ctx.emit(QueryEvent::AttemptFailed {
            domain: self.domain.clone(),
            attempt: self.attempt + 1,
            max_attempts: self.max_attempts,
            kind: error.kind(),
            error: error.to_string(),
        });
        self.on_failure(error)
    }

    /// 唯一的失败转移：丢弃会话、计数，耗尽则结束
    fn on_failure(&mut self, error: QueryError) -> Step {
        self.session = None;
        self.attempt += 1;
        if self.attempt >= self.max_attempts {
            Step::Done(TaskResult::Exhausted {
                attempts: self.attempt,
                error,
            })
        } else {
            Step::NeedCaptcha
        }
    }
}
