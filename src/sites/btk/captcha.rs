//! BTK 验证码获取
//!
//! 握手 (或复用会话) -> 生成防缓存令牌 -> 拉取图片 -> 合并 Cookie。图片从不落盘。

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use reqwest::header::{ACCEPT, HeaderMap, HeaderValue, REFERER};
use tracing::{debug, info};
use url::Url;

use crate::core::error::{QueryError, Result};
use crate::core::model::CaptchaChallenge;
use crate::network::service::HttpService;
use crate::network::session::Session;

const HTML_ACCEPT: &str =
    "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8";
const IMAGE_ACCEPT: &str = "image/avif,image/webp,image/apng,image/svg+xml,image/*,*/*;q=0.8";

/// BTK 验证码获取器
pub struct CaptchaFetcher {
    http: Arc<HttpService>,
    root: Url,
    endpoint: Url,
}

impl CaptchaFetcher {
    pub fn new(http: Arc<HttpService>, root: Url, endpoint: Url) -> Self {
        Self {
            http,
            root,
            endpoint,
        }
    }

    /// 获取一张新的验证码
    ///
    /// 没有会话时先访问站点根路径建立会话。
    pub async fn acquire(&self, existing: Option<Session>) -> Result<CaptchaChallenge> {
        let session = match existing {
            Some(session) => session,
            None => self.handshake().await?,
        };

        let url = self.image_url(&freshness_token(SystemTime::now()));
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(IMAGE_ACCEPT));
        if let Ok(referer) = HeaderValue::from_str(self.root.as_str()) {
            headers.insert(REFERER, referer);
        }

        let resp = self.http.get(url, headers, Some(session.clone())).await?;
        if !resp.is_ok() {
            return Err(QueryError::CaptchaFetch(format!("HTTP {}", resp.status)));
        }
        if resp.body.is_empty() {
            return Err(QueryError::CaptchaFetch("empty image body".into()));
        }

        debug!("验证码图片已下载 ({} bytes)", resp.body.len());
        Ok(CaptchaChallenge {
            session: session.merge_headers(&resp.headers),
            image: resp.body,
        })
    }

    async fn handshake(&self) -> Result<Session> {
        info!("正在建立新会话...");

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(HTML_ACCEPT));

        let resp = self.http.get(self.root.clone(), headers, None).await?;
        if !resp.is_ok() {
            return Err(QueryError::Session(resp.status));
        }

        let session = Session::new().merge_headers(&resp.headers);
        debug!("会话已建立 ({} cookies)", session.len());
        Ok(session)
    }

    fn image_url(&self, token: &str) -> Url {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut()
            .append_pair("_CAPTCHA", "")
            .append_pair("t", token);
        url
    }
}

/// 防缓存令牌：`0.<8 位秒内小数> <unix 秒>`
pub fn freshness_token(now: SystemTime) -> String {
    let since = now.duration_since(UNIX_EPOCH).unwrap_or_default();
    format!("0.{:08} {}", since.subsec_nanos() / 10, since.as_secs())
}
