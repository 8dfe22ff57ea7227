use reqwest::StatusCode;
use reqwest::header::{HeaderMap, LOCATION};
use tracing::debug;
use url::Url;

use crate::core::error::Result;

/// 计算重定向目标
///
/// 仅当状态码为 3xx 且携带 Location 时返回目标地址，相对路径基于当前 URL 解析。
pub fn redirect_target(current: &Url, status: StatusCode, headers: &HeaderMap) -> Result<Option<Url>> {
    if !status.is_redirection() {
        return Ok(None);
    }

    let Some(location) = headers.get(LOCATION) else {
        return Ok(None);
    };

    let location_str = String::from_utf8_lossy(location.as_bytes());
    let target = current.join(location_str.trim())?;

    debug!("重定向: {} -> {}", current, target);
    Ok(Some(target))
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    fn location(v: &'static str) -> HeaderMap {
        let mut h = HeaderMap::new();
        h.insert(LOCATION, HeaderValue::from_static(v));
        h
    }

    #[test]
    fn relative_location_resolves_against_current() {
        let cur = Url::parse("https://example.org/sitesorgu/index.php").unwrap();
        let t = redirect_target(&cur, StatusCode::FOUND, &location("../other/")).unwrap();
        assert_eq!(t.unwrap().as_str(), "https://example.org/other/");
    }

    #[test]
    fn absolute_location_wins() {
        let cur = Url::parse("https://example.org/a").unwrap();
        let t = redirect_target(&cur, StatusCode::MOVED_PERMANENTLY, &location("https://b.example/x")).unwrap();
        assert_eq!(t.unwrap().as_str(), "https://b.example/x");
    }

    #[test]
    fn non_redirect_or_missing_location_is_terminal() {
        let cur = Url::parse("https://example.org/a").unwrap();
        assert!(redirect_target(&cur, StatusCode::OK, &location("/b")).unwrap().is_none());
        assert!(redirect_target(&cur, StatusCode::FOUND, &HeaderMap::new()).unwrap().is_none());
    }
}
