//! 会话存储 (Session Store)
//!
//! 仅保存 Cookie 名值对，不处理 Path/Domain/Expires 等属性。
//! 合并总是生成新值：同名覆盖，其余保留。

use indexmap::IndexMap;
use reqwest::header::{HeaderMap, SET_COOKIE};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    cookies: IndexMap<String, String>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// 从 Set-Cookie 条目构建初始会话
    pub fn from_set_cookies<'a>(entries: impl IntoIterator<Item = &'a str>) -> Self {
        Self::new().merge(entries)
    }

    /// 合并一组 Set-Cookie 条目，返回新会话
    pub fn merge<'a>(&self, entries: impl IntoIterator<Item = &'a str>) -> Self {
        let mut cookies = self.cookies.clone();
        for (name, value) in entries.into_iter().filter_map(parse_set_cookie) {
            cookies.insert(name, value);
        }
        Self { cookies }
    }

    /// 合并响应头中的全部 Set-Cookie
    pub fn merge_headers(&self, headers: &HeaderMap) -> Self {
        self.merge(
            headers
                .get_all(SET_COOKIE)
                .iter()
                .filter_map(|v| v.to_str().ok()),
        )
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.cookies.get(name).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.cookies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty()
    }

    /// 渲染为 `Cookie` 请求头的值
    pub fn to_header_value(&self) -> String {
        self.cookies
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// 解析单条 Set-Cookie：先按首个 `;` 截断，再按首个 `=` 切分
fn parse_set_cookie(entry: &str) -> Option<(String, String)> {
    let pair = entry.split(';').next()?;
    let (name, value) = pair.split_once('=')?;
    let name = name.trim();
    if name.is_empty() {
        return None;
    }
    Some((name.to_string(), value.trim().to_string()))
}
