pub mod gemini;
pub mod middleware;
pub mod redirect;
pub mod service;
pub mod session;

use bytes::Bytes;
use reqwest::StatusCode;
use reqwest::header::HeaderMap;
use url::Url;

/// 已完整读取并解压的响应
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
    /// 跟随重定向后的最终地址
    pub url: Url,
}

impl RawResponse {
    /// 以 UTF-8 (有损) 解码正文
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn is_ok(&self) -> bool {
        self.status == StatusCode::OK
    }
}
