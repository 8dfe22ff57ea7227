//! 状态机测试用的脚本化站点与识别器

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;

use crate::core::config::QueryConfig;
use crate::core::error::{QueryError, Result};
use crate::core::event::EventSender;
use crate::core::model::{CaptchaChallenge, DecisionRecord, Submission};
use crate::interfaces::{CaptchaSolver, LookupPortal};
use crate::network::session::Session;

use super::context::RuntimeContext;

pub const RIGHT_CODE: &str = "right";

/// 握手依次签发 `sid=S1`、`sid=S2`…；只有 `right` 能通过验证
#[derive(Default)]
pub struct FakePortal {
    handshakes: Mutex<u32>,
    acquired: Mutex<Vec<Option<Session>>>,
}

impl FakePortal {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// 每次获取验证码时收到的会话
    pub fn acquisitions(&self) -> Vec<Option<Session>> {
        self.acquired.lock().clone()
    }
}

#[async_trait]
impl LookupPortal for FakePortal {
    async fn acquire_captcha(&self, session: Option<Session>) -> Result<CaptchaChallenge> {
        self.acquired.lock().push(session.clone());
        let session = session.unwrap_or_else(|| {
            let mut n = self.handshakes.lock();
            *n += 1;
            let cookie = format!("sid=S{}", *n);
            Session::from_set_cookies([cookie.as_str()])
        });
        Ok(CaptchaChallenge {
            image: Bytes::from_static(b"png"),
            session,
        })
    }

    async fn submit(&self, domain: &str, code: &str, session: &Session) -> Result<Submission> {
        let body = if code == RIGHT_CODE {
            format!("RESULT {}", domain)
        } else {
            "Güvenlik kodu hatalı".to_string()
        };
        Ok(Submission {
            body,
            session: session.clone(),
        })
    }

    fn is_captcha_rejected(&self, body: &str) -> bool {
        body.contains("hatalı")
    }

    fn extract(&self, body: &str) -> DecisionRecord {
        let blocked = body.contains("yasak");
        DecisionRecord {
            blocked,
            local_description: blocked.then(|| body.to_string()),
            ..Default::default()
        }
    }
}

/// 按脚本依次返回验证码，脚本用尽后总返回 `right`；`ERR` 表示识别失败
pub struct FakeSolver {
    script: Mutex<VecDeque<&'static str>>,
}

impl FakeSolver {
    pub fn new(script: impl IntoIterator<Item = &'static str>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into_iter().collect()),
        })
    }
}

#[async_trait]
impl CaptchaSolver for FakeSolver {
    async fn recognize(&self, _image: &[u8], _api_key: &str) -> Result<String> {
        match self.script.lock().pop_front().unwrap_or(RIGHT_CODE) {
            "ERR" => Err(QueryError::RecognitionQuota),
            code => Ok(code.to_string()),
        }
    }
}

pub fn context(portal: &Arc<FakePortal>, solver: &Arc<FakeSolver>, max_attempts: u32) -> RuntimeContext {
    context_with_events(portal, solver, max_attempts, None)
}

pub fn context_with_events(
    portal: &Arc<FakePortal>,
    solver: &Arc<FakeSolver>,
    max_attempts: u32,
    events: Option<EventSender>,
) -> RuntimeContext {
    let config = QueryConfig::builder()
        .max_attempts(max_attempts)
        .retry_delay_ms(0)
        .pace_ms(0)
        .build();
    RuntimeContext::new(portal.clone(), solver.clone(), &config, events)
}
