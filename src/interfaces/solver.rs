use async_trait::async_trait;

use crate::core::error::Result;

/// 验证码识别接口
///
/// 返回的验证码区分大小写，调用方必须原样提交。
#[async_trait]
pub trait CaptchaSolver: Send + Sync {
    async fn recognize(&self, image: &[u8], api_key: &str) -> Result<String>;
}
