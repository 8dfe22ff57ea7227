//! 配置管理系统 (Configuration Management)
//!
//! 负责 `config.toml` 的反序列化及其层级结构映射，支持环境变量与默认值回退机制。
//! 配置在进程启动时构建一次，之后以只读形式注入各组件。

use std::path::{Path, PathBuf};
use std::time::Duration;

use bon::Builder;
use config::{Config, Environment, File};
use directories::ProjectDirs;
use serde::Deserialize;

use crate::core::error::Result;

/// 全局应用配置
#[derive(Debug, Deserialize, Builder, Clone, Default)]
pub struct AppConfig {
    /// 传输层参数
    #[serde(default)]
    #[builder(default)]
    pub transport: TransportConfig,

    /// 目标站点端点
    #[serde(default)]
    #[builder(default)]
    pub site: SiteConfig,

    /// 验证码识别服务
    #[serde(default)]
    #[builder(default)]
    pub recognizer: RecognizerConfig,

    /// 查询编排参数
    #[serde(default)]
    #[builder(default)]
    pub query: QueryConfig,
}

/// 传输层配置
#[derive(Debug, Deserialize, Builder, Clone)]
pub struct TransportConfig {
    /// 单次请求超时 (秒)
    #[serde(default = "default_timeout_secs")]
    #[builder(default = default_timeout_secs())]
    pub timeout_secs: u64,
    /// GET 请求允许跟随的最大重定向次数
    #[serde(default = "default_max_redirects")]
    #[builder(default = default_max_redirects())]
    pub max_redirects: usize,
    #[serde(default = "default_user_agent")]
    #[builder(default = default_user_agent(), into)]
    pub user_agent: String,
}

/// 站点端点配置
#[derive(Debug, Deserialize, Builder, Clone)]
pub struct SiteConfig {
    /// 查询表单根路径
    #[serde(default = "default_base_url")]
    #[builder(default = default_base_url(), into)]
    pub base_url: String,
    /// 相对于根路径的验证码图片地址
    #[serde(default = "default_captcha_path")]
    #[builder(default = default_captcha_path(), into)]
    pub captcha_path: String,
}

/// 识别服务配置
#[derive(Debug, Deserialize, Builder, Clone)]
pub struct RecognizerConfig {
    #[serde(default)]
    #[builder(default, into)]
    pub api_key: String,
    #[serde(default = "default_model")]
    #[builder(default = default_model(), into)]
    pub model: String,
    #[serde(default = "default_api_base")]
    #[builder(default = default_api_base(), into)]
    pub api_base: String,
    #[serde(default = "default_prompt")]
    #[builder(default = default_prompt(), into)]
    pub prompt: String,
    #[serde(default = "default_max_output_tokens")]
    #[builder(default = default_max_output_tokens())]
    pub max_output_tokens: u32,
}

/// 查询编排参数
#[derive(Debug, Deserialize, Builder, Clone)]
pub struct QueryConfig {
    /// 每个域名的尝试次数上限
    #[serde(default = "default_max_attempts")]
    #[builder(default = default_max_attempts())]
    pub max_attempts: u32,
    /// 两次尝试之间的等待 (毫秒)
    #[serde(default = "default_retry_delay_ms")]
    #[builder(default = default_retry_delay_ms())]
    pub retry_delay_ms: u64,
    /// 相邻域名之间的节流间隔 (毫秒)
    #[serde(default = "default_pace_ms")]
    #[builder(default = default_pace_ms())]
    pub pace_ms: u64,
    /// 验证码图片落盘目录 (调试用，可选)
    pub captcha_dir: Option<PathBuf>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl Default for RecognizerConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl TransportConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl QueryConfig {
    /// 尝试次数至少为 1
    pub fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn pace(&self) -> Duration {
        Duration::from_millis(self.pace_ms)
    }
}

fn default_timeout_secs() -> u64 {
    30
}
fn default_max_redirects() -> usize {
    5
}
fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".to_string()
}
fn default_base_url() -> String {
    "https://internet.btk.gov.tr/sitesorgu/".to_string()
}
fn default_captcha_path() -> String {
    "secureimage/captcha.php".to_string()
}
fn default_model() -> String {
    "gemini-2.5-flash".to_string()
}
fn default_api_base() -> String {
    "https://generativelanguage.googleapis.com/v1beta/models".to_string()
}
fn default_prompt() -> String {
    "Read the CAPTCHA text. Reply with ONLY the characters, nothing else.".to_string()
}
fn default_max_output_tokens() -> u32 {
    256
}
fn default_max_attempts() -> u32 {
    3
}
fn default_retry_delay_ms() -> u64 {
    1000
}
fn default_pace_ms() -> u64 {
    500
}

/// 约定俗成的环境变量到配置键的映射
const WELL_KNOWN_ENV: [(&str, &str); 3] = [
    ("GEMINI_API_KEY", "recognizer.api_key"),
    ("GEMINI_MODEL", "recognizer.model"),
    ("USER_AGENT", "transport.user_agent"),
];

impl AppConfig {
    /// 从文件系统与进程环境中加载并解析配置
    ///
    /// 优先级 (低 → 高)：默认值 < config.toml < `BTK_*` 环境变量 < 约定变量。
    pub fn load() -> Result<Self> {
        let builder = Config::builder();

        let builder = match Self::locate_file() {
            Some(path) => builder.add_source(File::from(path)),
            None => builder,
        };

        let mut builder = builder.add_source(
            Environment::with_prefix("BTK")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        for (var, key) in WELL_KNOWN_ENV {
            let value = std::env::var(var).ok().filter(|v| !v.trim().is_empty());
            builder = builder.set_override_option(key, value)?;
        }

        Ok(builder.build()?.try_deserialize()?)
    }

    /// 从 TOML 文本解析 (不读取环境)
    #[cfg(test)]
    pub fn from_toml(text: &str) -> Result<Self> {
        let settings = Config::builder()
            .add_source(File::from_str(text, config::FileFormat::Toml))
            .build()?;
        Ok(settings.try_deserialize()?)
    }

    /// 查找配置文件：当前目录优先，其次为平台配置目录
    fn locate_file() -> Option<PathBuf> {
        let local = Path::new("config.toml");
        if local.exists() {
            return Some(local.to_path_buf());
        }

        ProjectDirs::from("tr", "btk", "btk-sorgu")
            .map(|dirs| dirs.config_dir().join("config.toml"))
            .filter(|path| path.exists())
    }
}
