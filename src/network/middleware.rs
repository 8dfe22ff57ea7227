use std::time::Instant;

use reqwest::header::{COOKIE, HeaderValue};
use reqwest::{Request, Response};
use reqwest_middleware::{Middleware, Next, Result};
use tracing::debug;

use crate::network::session::Session;

/// 会话注入中间件
/// 负责在每次请求前，将请求扩展中携带的 Session 渲染为 Cookie 头
pub struct SessionMiddleware;

#[async_trait::async_trait]
impl Middleware for SessionMiddleware {
    async fn handle(
        &self,
        mut req: Request,
        extensions: &mut http::Extensions,
        next: Next<'_>,
    ) -> Result<Response> {
        if let Some(session) = extensions.get::<Session>()
            && !session.is_empty()
            && let Ok(val) = HeaderValue::from_str(&session.to_header_value())
        {
            req.headers_mut().insert(COOKIE, val);
        }
        next.run(req, extensions).await
    }
}

/// 请求追踪中间件
pub struct TraceMiddleware;

#[async_trait::async_trait]
impl Middleware for TraceMiddleware {
    async fn handle(
        &self,
        req: Request,
        extensions: &mut http::Extensions,
        next: Next<'_>,
    ) -> Result<Response> {
        let method = req.method().clone();
        let url = req.url().clone();
        let started = Instant::now();

        let result = next.run(req, extensions).await;
        match &result {
            Ok(resp) => debug!(
                "{} {} -> {} ({:?})",
                method,
                url,
                resp.status(),
                started.elapsed()
            ),
            Err(e) => debug!("{} {} 失败 ({:?}): {}", method, url, started.elapsed(), e),
        }
        result
    }
}
