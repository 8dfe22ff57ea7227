//! 查询站点定义
//!
//! 编排引擎通过此接口驱动验证码获取、提交与结果解析，不关心具体站点。

use async_trait::async_trait;

use crate::core::error::Result;
use crate::core::model::{CaptchaChallenge, DecisionRecord, Submission};
use crate::network::session::Session;

/// 带验证码保护的查询站点
#[async_trait]
pub trait LookupPortal: Send + Sync {
    /// 获取验证码挑战
    ///
    /// `session` 为空时先执行握手建立新会话；否则直接复用。
    async fn acquire_captcha(&self, session: Option<Session>) -> Result<CaptchaChallenge>;

    /// 提交域名与验证码，返回原始页面及更新后的会话
    async fn submit(&self, domain: &str, code: &str, session: &Session) -> Result<Submission>;

    /// 页面是否表示验证码错误。必须先于 `extract` 调用。
    fn is_captcha_rejected(&self, body: &str) -> bool;

    /// 从结果页面提取决定记录 (纯函数，永不失败)
    fn extract(&self, body: &str) -> DecisionRecord;
}
