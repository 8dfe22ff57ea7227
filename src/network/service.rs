//! 传输层 (Transport Layer)
//!
//! 单次请求语义：发送、按需跟随重定向、透明解压。不包含任何重试逻辑。

use std::time::Duration;

use bon::Builder;
use bytes::Bytes;
use reqwest::header::{
    ACCEPT_LANGUAGE, CONTENT_ENCODING, CONTENT_TYPE, HeaderMap, HeaderValue, SET_COOKIE, USER_AGENT,
};
use reqwest::Method;
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware, RequestBuilder};
use serde::Serialize;
use url::Url;

use crate::core::config::TransportConfig;
use crate::core::error::{QueryError, Result};
use crate::network::RawResponse;
use crate::network::middleware::{SessionMiddleware, TraceMiddleware};
use crate::network::redirect::redirect_target;
use crate::network::session::Session;

/// 请求体
#[derive(Debug, Clone)]
pub enum Payload {
    /// application/x-www-form-urlencoded
    Form(Bytes),
    /// application/json
    Json(Bytes),
}

impl Payload {
    fn apply(&self, rb: RequestBuilder) -> RequestBuilder {
        match self {
            Payload::Form(body) => rb
                .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(body.clone()),
            Payload::Json(body) => rb.header(CONTENT_TYPE, "application/json").body(body.clone()),
        }
    }
}

/// 一次出站请求的完整描述
#[derive(Debug, Builder)]
pub struct Outbound {
    pub method: Method,
    pub url: Url,
    #[builder(default)]
    pub headers: HeaderMap,
    pub payload: Option<Payload>,
    pub session: Option<Session>,
}

#[derive(Clone)]
pub struct HttpService {
    client: ClientWithMiddleware,
    timeout: Duration,
    max_redirects: usize,
}

impl HttpService {
    pub fn new(config: &TransportConfig) -> Result<Self> {
        let timeout = config.timeout();
        let mut headers = HeaderMap::new();

        if let Ok(ua) = HeaderValue::from_str(&config.user_agent) {
            headers.insert(USER_AGENT, ua);
        }
        headers.insert(
            ACCEPT_LANGUAGE,
            HeaderValue::from_static("tr-TR,tr;q=0.9,en-US;q=0.8,en;q=0.7"),
        );

        // 重定向由本层手动处理，以便限制跳数并重发同一组请求头
        let client = reqwest::Client::builder()
            .default_headers(headers)
            .redirect(reqwest::redirect::Policy::none())
            .connect_timeout(timeout.min(Duration::from_secs(10)))
            .timeout(timeout)
            .build()
            .map_err(|e| QueryError::Network {
                url: "<client>".into(),
                source: e.into(),
            })?;

        Ok(Self {
            client: ClientBuilder::new(client)
                .with(TraceMiddleware)
                .with(SessionMiddleware)
                .build(),
            timeout,
            max_redirects: config.max_redirects,
        })
    }

    /// 执行一次请求
    ///
    /// GET 请求会跟随至多 `max_redirects` 次重定向；超过则返回 `RedirectLoop`。
    pub async fn execute(&self, outbound: Outbound) -> Result<RawResponse> {
        let Outbound {
            method,
            mut url,
            headers,
            payload,
            mut session,
        } = outbound;

        let origin = url.to_string();
        let mut hops = 0;
        // 中间跳设置的 Cookie：既带入下一跳，也并入最终响应头
        let mut carried: Vec<HeaderValue> = Vec::new();

        loop {
            let mut rb = self
                .client
                .request(method.clone(), url.clone())
                .headers(headers.clone());
            if let Some(session) = &session {
                rb = rb.with_extension(session.clone());
            }
            if let Some(payload) = &payload {
                rb = payload.apply(rb);
            }

            let resp = rb.send().await.map_err(|e| self.classify(&url, e))?;
            let status = resp.status();
            let mut resp_headers = resp.headers().clone();

            if method == Method::GET
                && let Some(target) = redirect_target(&url, status, &resp_headers)?
            {
                if hops >= self.max_redirects {
                    return Err(QueryError::RedirectLoop {
                        url: origin,
                        hops: hops + 1,
                    });
                }
                hops += 1;
                url = target;
                if resp_headers.contains_key(SET_COOKIE) {
                    session = Some(session.unwrap_or_default().merge_headers(&resp_headers));
                    carried.extend(resp_headers.get_all(SET_COOKIE).iter().cloned());
                }
                continue;
            }

            if let Some(coding) = unsupported_encoding(&resp_headers) {
                return Err(QueryError::Decompression {
                    url: url.to_string(),
                    reason: format!("unsupported content-encoding {:?}", coding),
                });
            }

            let body = resp
                .bytes()
                .await
                .map_err(|e| self.classify(&url, e.into()))?;

            if !carried.is_empty() {
                let own: Vec<HeaderValue> = resp_headers.get_all(SET_COOKIE).iter().cloned().collect();
                resp_headers.remove(SET_COOKIE);
                for value in carried.drain(..).chain(own) {
                    resp_headers.append(SET_COOKIE, value);
                }
            }

            return Ok(RawResponse {
                status,
                headers: resp_headers,
                body,
                url,
            });
        }
    }

    pub async fn get(&self, url: Url, headers: HeaderMap, session: Option<Session>) -> Result<RawResponse> {
        self.execute(
            Outbound::builder()
                .method(Method::GET)
                .url(url)
                .headers(headers)
                .maybe_session(session)
                .build(),
        )
        .await
    }

    pub async fn post_form<T: Serialize + ?Sized>(
        &self,
        url: Url,
        form: &T,
        headers: HeaderMap,
        session: Option<Session>,
    ) -> Result<RawResponse> {
        let body = serde_urlencoded::to_string(form)?;
        self.execute(
            Outbound::builder()
                .method(Method::POST)
                .url(url)
                .headers(headers)
                .payload(Payload::Form(Bytes::from(body)))
                .maybe_session(session)
                .build(),
        )
        .await
    }

    pub async fn post_json<T: Serialize + ?Sized>(
        &self,
        url: Url,
        json: &T,
        headers: HeaderMap,
    ) -> Result<RawResponse> {
        let body = serde_json::to_vec(json)?;
        self.execute(
            Outbound::builder()
                .method(Method::POST)
                .url(url)
                .headers(headers)
                .payload(Payload::Json(Bytes::from(body)))
                .build(),
        )
        .await
    }

    fn classify(&self, url: &Url, err: reqwest_middleware::Error) -> QueryError {
        QueryError::from_transport(url.as_str(), self.timeout, err)
    }
}

/// 解码器已剥离 gzip/deflate 的声明；仍残留的非 identity 编码无法解码
fn unsupported_encoding(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(CONTENT_ENCODING)
        .iter()
        .flat_map(|v| v.to_str().unwrap_or("?").split(','))
        .map(|token| token.trim().to_ascii_lowercase())
        .find(|token| {
            !token.is_empty() && !matches!(token.as_str(), "identity" | "gzip" | "x-gzip" | "deflate")
        })
}
