#![allow(dead_code)]

//! 应用程序入口 (Application Entrypoint)
//!
//! 负责 CLI 指令解析、遥测层初始化、依赖注入及结果输出。

mod core;
mod engine;
mod interfaces;
mod network;
mod sites;
mod ui;
mod utils;

use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, bail};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::fmt::MakeWriter;

use crate::core::config::AppConfig;
use crate::core::error::QueryError;
use crate::core::event::create_event_channel;
use crate::core::model::{BatchSummary, QueryOutcome};
use crate::engine::context::CAPTCHA_FILE;
use crate::engine::{BatchEngine, RuntimeContext};
use crate::network::gemini::GeminiSolver;
use crate::network::service::HttpService;
use crate::sites::btk::BtkPortal;
use crate::ui::interactive;
use crate::ui::report::{render_json, render_outcome, render_summary};
use crate::ui::{Ui, get_multi};
use crate::utils::{is_valid_domain, read_domain_list, remove_file_if_exists};

/// 进度条感知的日志写入器 (TUI-aware Log Writer)
///
/// 确保非同步日志输出不会破坏终端进度条的渲染布局。
struct IndicatifWriter;

impl io::Write for IndicatifWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let s = String::from_utf8_lossy(buf);
        let _ = get_multi().println(s.trim_end());
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for IndicatifWriter {
    type Writer = IndicatifWriter;

    fn make_writer(&self) -> Self::Writer {
        IndicatifWriter
    }
}

/// BTK 网站封禁决定查询工具
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// 待查询的域名
    domains: Vec<String>,
    /// 从文件读取域名列表 (每行一个，`#` 开头为注释)
    #[arg(short, long, value_name = "FILE")]
    list: Option<PathBuf>,
    /// 以 JSON 格式输出结果
    #[arg(long)]
    json: bool,
    /// 运行结束后保留验证码调试图片
    #[arg(long)]
    keep_captcha: bool,
    /// 交互模式：逐个输入域名查询，结果以表格列出
    #[arg(short, long, alias = "tui", conflicts_with_all = ["json", "list", "domains"])]
    interactive: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // 已存在的环境变量优先于 .env
    let _ = dotenvy::dotenv();

    // 遥测层初始化 (Telemetry Layer Initialization)
    if std::env::var("RUST_LOG").is_err() {
        let level = if cli.json { "warn" } else { "info" };
        unsafe {
            std::env::set_var("RUST_LOG", level);
        }
    }

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(IndicatifWriter)
        .with_target(false)
        .with_ansi(true)
        .init();

    // 依赖项初始化与注入 (Dependency Injection)
    let config = Arc::new(AppConfig::load()?);
    if config.recognizer.api_key.trim().is_empty() {
        bail!(
            "GEMINI_API_KEY is not set (export it, put it in .env, or set [recognizer] api_key in config.toml)"
        );
    }

    info!("识别模型: {}", config.recognizer.model);

    let http = Arc::new(HttpService::new(&config.transport)?);
    let portal = Arc::new(BtkPortal::new(&config.site, http.clone())?);
    let solver = Arc::new(GeminiSolver::new(&config.recognizer, http)?);

    if cli.interactive {
        let (sender, receiver) = create_event_channel();
        let ui_handle = Ui::run(receiver);
        let result = {
            let engine =
                BatchEngine::new(RuntimeContext::new(portal, solver, &config.query, Some(sender)));
            interactive::run(&engine, &config.recognizer.api_key).await
        };
        let _ = ui_handle.await;
        cleanup_captcha(&cli, &config).await;
        return result;
    }

    let domains = collect_domains(&cli).await?;
    info!("待查询 {} 个域名: {}", domains.len(), domains.join(", "));

    // 建立 UI 事件反馈链路 (Event feedback loop)
    let (events, ui_handle) = if cli.json {
        (None, None)
    } else {
        let (sender, receiver) = create_event_channel();
        (Some(sender), Some(Ui::run(receiver)))
    };

    let result = {
        let engine = BatchEngine::new(RuntimeContext::new(portal, solver, &config.query, events));
        engine.run_batch(&domains, &config.recognizer.api_key).await
    };

    // 引擎释放后发送端关闭，UI 任务随之退出
    if let Some(handle) = ui_handle {
        let _ = handle.await;
    }

    cleanup_captcha(&cli, &config).await;

    let outcomes = match result {
        Ok(outcomes) => outcomes,
        Err(e) => {
            if let QueryError::BootstrapFailed { source, .. } = &e
                && source.is_recognition()
            {
                warn!("验证码识别服务持续失败，请检查 GEMINI_API_KEY 与 GEMINI_MODEL 设置");
            }
            if cli.json
                && let QueryError::BootstrapFailed { domain, .. } = &e
            {
                let failure = QueryOutcome::Failure {
                    domain: domain.clone(),
                    reason: e.to_string(),
                    elapsed: Duration::ZERO,
                };
                println!("{}", render_json(&failure)?);
            }
            return Err(e.into());
        }
    };

    for outcome in &outcomes {
        match outcome {
            _ if cli.json => println!("{}", render_json(outcome)?),
            QueryOutcome::Success { .. } => print!("{}", render_outcome(outcome)),
            QueryOutcome::Failure { .. } => eprint!("{}", render_outcome(outcome)),
        }
    }

    if !cli.json && domains.len() > 1 {
        print!(
            "{}",
            render_summary(&BatchSummary::from_outcomes(domains.len(), &outcomes))
        );
    }

    Ok(())
}

/// 除非指定 `--keep-captcha`，否则删除调试用的验证码图片
async fn cleanup_captcha(cli: &Cli, config: &AppConfig) {
    if !cli.keep_captcha
        && let Some(dir) = &config.query.captcha_dir
        && let Err(e) = remove_file_if_exists(dir.join(CAPTCHA_FILE)).await
    {
        warn!("无法清理验证码图片: {}", e);
    }
}

/// 汇总列表文件与命令行中的域名，并剔除无效项
async fn collect_domains(cli: &Cli) -> anyhow::Result<Vec<String>> {
    let mut domains = match &cli.list {
        Some(path) => read_domain_list(path)
            .await
            .with_context(|| format!("cannot read domain list {}", path.display()))?,
        None => Vec::new(),
    };
    domains.extend(cli.domains.iter().cloned());

    if domains.is_empty() {
        bail!("no domain given (pass domains as arguments or use --list FILE)");
    }

    let (valid, invalid): (Vec<_>, Vec<_>) = domains.into_iter().partition(|d| is_valid_domain(d));
    for domain in &invalid {
        warn!("跳过无效域名: {}", domain);
    }
    if valid.is_empty() {
        bail!("no valid domain to query");
    }

    Ok(valid)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_accepts_domains_and_flags() {
        let cli = Cli::try_parse_from([
            "btk-sorgu",
            "twitter.com",
            "discord.com",
            "-l",
            "sites.txt",
            "--json",
            "--keep-captcha",
        ])
        .unwrap();
        assert_eq!(cli.domains, ["twitter.com", "discord.com"]);
        assert_eq!(cli.list, Some(PathBuf::from("sites.txt")));
        assert!(cli.json && cli.keep_captcha);
    }

    #[test]
    fn interactive_mode_takes_no_domains() {
        for flag in ["--interactive", "-i", "--tui"] {
            let cli = Cli::try_parse_from(["btk-sorgu", flag]).unwrap();
            assert!(cli.interactive && cli.domains.is_empty());
        }
        assert!(Cli::try_parse_from(["btk-sorgu", "-i", "--json"]).is_err());
        assert!(Cli::try_parse_from(["btk-sorgu", "-i", "ornek.com"]).is_err());
    }

    #[tokio::test]
    async fn invalid_domains_are_dropped() {
        let cli = Cli::try_parse_from(["btk-sorgu", "ornek.com", "not a domain", "bad-.com"]).unwrap();
        assert_eq!(collect_domains(&cli).await.unwrap(), ["ornek.com"]);

        let cli = Cli::try_parse_from(["btk-sorgu", "nope"]).unwrap();
        assert!(collect_domains(&cli).await.is_err());
    }

    #[tokio::test]
    async fn list_file_comes_before_arguments() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sites.txt");
        std::fs::write(&path, "a.com\n# b.com\nc.com\n").unwrap();

        let cli = Cli::try_parse_from(["btk-sorgu", "d.com", "--list", path.to_str().unwrap()]).unwrap();
        assert_eq!(collect_domains(&cli).await.unwrap(), ["a.com", "c.com", "d.com"]);
    }
}
