//! 错误处理体系 (Error Handling System)
//!
//! 定义查询链路上的全部错误类型以及全局 Result 别名。
//! 编排层只按变体分支，从不检查错误消息文本。

use std::time::Duration;

use reqwest::StatusCode;
use strum::IntoStaticStr;
use thiserror::Error;

/// 全局错误定义 (Query Domain Errors)
#[derive(Error, Debug, IntoStaticStr)]
pub enum QueryError {
    // ---- 传输层 ----
    #[error("Network error requesting {url}: {source}")]
    Network {
        url: String,
        #[source]
        source: reqwest_middleware::Error,
    },

    #[error("Request to {url} timed out after {timeout:?}")]
    Timeout { url: String, timeout: Duration },

    #[error("Too many redirects ({hops}) starting from {url}")]
    RedirectLoop { url: String, hops: usize },

    #[error("Failed to decode response body from {url}: {reason}")]
    Decompression { url: String, reason: String },

    // ---- 会话与验证码获取 ----
    #[error("Session handshake failed: HTTP {0}")]
    Session(StatusCode),

    #[error("Captcha fetch failed: {0}")]
    CaptchaFetch(String),

    // ---- 验证码识别 ----
    #[error("Recognition service rejected the credentials: HTTP {0}")]
    RecognitionAuth(StatusCode),

    #[error("Recognition service quota exceeded")]
    RecognitionQuota,

    #[error("Recognition service error: HTTP {status}: {message}")]
    RecognitionApi { status: u16, message: String },

    #[error("Recognition blocked by safety filter: {0}")]
    RecognitionSafety(String),

    #[error("Recognition returned no usable text: {0}")]
    RecognitionEmpty(String),

    #[error("Invalid captcha output: {raw:?} -> {cleaned:?} ({} chars)", .cleaned.chars().count())]
    RecognitionFormat { raw: String, cleaned: String },

    // ---- 查询提交 ----
    #[error("Query submission failed: HTTP {0}")]
    Submission(StatusCode),

    /// 站点判定验证码错误。由状态机根据响应正文生成，提交器本身从不返回。
    #[error("Captcha code was rejected by the site")]
    CaptchaRejected,

    /// 首个域名在重试预算内始终无法完成，整批任务中止
    #[error("Could not validate the first domain {domain} after {attempts} attempts: {source}")]
    BootstrapFailed {
        domain: String,
        attempts: u32,
        #[source]
        source: Box<QueryError>,
    },

    // ---- 环境 ----
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Form encoding error: {0}")]
    FormEncoding(#[from] serde_urlencoded::ser::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

/// 全局 Result 别名
pub type Result<T> = std::result::Result<T, QueryError>;

impl QueryError {
    /// 稳定的变体名称，用于日志与 JSON 输出
    pub fn kind(&self) -> &'static str {
        self.into()
    }

    /// 将一次发送/读取失败归类为传输层错误
    ///
    /// 超时与解压失败来自 reqwest 的错误分类位，其余一律视为网络错误。
    pub fn from_transport(url: &str, timeout: Duration, err: reqwest_middleware::Error) -> Self {
        match err {
            reqwest_middleware::Error::Reqwest(e) if e.is_timeout() => QueryError::Timeout {
                url: url.to_string(),
                timeout,
            },
            reqwest_middleware::Error::Reqwest(e) if e.is_decode() => QueryError::Decompression {
                url: url.to_string(),
                reason: e.to_string(),
            },
            other => QueryError::Network {
                url: url.to_string(),
                source: other,
            },
        }
    }

    /// 识别服务相关的失败
    pub fn is_recognition(&self) -> bool {
        matches!(
            self,
            QueryError::RecognitionAuth(_)
                | QueryError::RecognitionQuota
                | QueryError::RecognitionApi { .. }
                | QueryError::RecognitionSafety(_)
                | QueryError::RecognitionEmpty(_)
                | QueryError::RecognitionFormat { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_is_the_variant_name() {
        assert_eq!(QueryError::CaptchaRejected.kind(), "CaptchaRejected");
        assert_eq!(
            QueryError::Submission(StatusCode::BAD_GATEWAY).kind(),
            "Submission"
        );
    }

    #[test]
    fn format_error_reports_both_texts() {
        let err = QueryError::RecognitionFormat {
            raw: "12".into(),
            cleaned: "12".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("\"12\""));
        assert!(msg.contains("(2 chars)"));
        assert!(err.is_recognition());
    }

    #[test]
    fn bootstrap_failure_keeps_the_cause() {
        let err = QueryError::BootstrapFailed {
            domain: "example.com".into(),
            attempts: 3,
            source: Box::new(QueryError::CaptchaRejected),
        };
        assert!(err.to_string().contains("example.com"));
        assert!(std::error::Error::source(&err).is_some());
        assert!(!err.is_recognition());
    }
}
