//! BTK 查询提交

use std::sync::Arc;

use reqwest::header::{HeaderMap, HeaderValue, ORIGIN, REFERER};
use serde::Serialize;
use tracing::info;
use url::Url;

use crate::core::error::{QueryError, Result};
use crate::core::model::Submission;
use crate::network::service::HttpService;
use crate::network::session::Session;

/// 验证码错误时页面中出现的任一表述
const REJECTION_MARKERS: [&str; 3] = ["Güvenlik kodu hatalı", "security code", "Doğrulama kodu"];

/// 查询表单，字段顺序即提交顺序
#[derive(Serialize)]
struct LookupForm<'a> {
    deger: &'a str,
    ipw: &'a str,
    kat: &'a str,
    tr: &'a str,
    eg: &'a str,
    ayrintili: &'a str,
    submit: &'a str,
    security_code: &'a str,
}

impl<'a> LookupForm<'a> {
    fn new(domain: &'a str, code: &'a str) -> Self {
        Self {
            deger: domain,
            ipw: "",
            kat: "",
            tr: "",
            eg: "",
            ayrintili: "0",
            submit: "Sorgula",
            security_code: code,
        }
    }
}

/// BTK 查询提交器
pub struct QuerySubmitter {
    http: Arc<HttpService>,
    root: Url,
}

impl QuerySubmitter {
    pub fn new(http: Arc<HttpService>, root: Url) -> Self {
        Self { http, root }
    }

    /// 提交域名与验证码
    ///
    /// 只检查 HTTP 状态；验证码是否被接受由调用方通过 [`is_captcha_rejected`] 判断。
    pub async fn submit(&self, domain: &str, code: &str, session: &Session) -> Result<Submission> {
        info!("正在查询: {}", domain);

        let mut headers = HeaderMap::new();
        if let Ok(origin) = HeaderValue::from_str(&self.root.origin().ascii_serialization()) {
            headers.insert(ORIGIN, origin);
        }
        if let Ok(referer) = HeaderValue::from_str(self.root.as_str()) {
            headers.insert(REFERER, referer);
        }

        let resp = self
            .http
            .post_form(
                self.root.clone(),
                &LookupForm::new(domain, code),
                headers,
                Some(session.clone()),
            )
            .await?;

        if !resp.is_ok() {
            return Err(QueryError::Submission(resp.status));
        }

        Ok(Submission {
            body: resp.text(),
            session: session.merge_headers(&resp.headers),
        })
    }
}

/// 页面是否表示验证码错误
pub fn is_captcha_rejected(body: &str) -> bool {
    REJECTION_MARKERS.iter().any(|m| body.contains(m))
}
