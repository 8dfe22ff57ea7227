//! 交互模式
//!
//! 逐行读取域名并立即查询。本次会话内的结果以表格列出，退出即丢弃，不写入磁盘。
//! 每次查询都是只含一个域名的独立批次，因此总是从新的会话握手开始。

use std::fmt::Write as _;
use std::time::Instant;

use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;

use crate::core::error::QueryError;
use crate::core::model::QueryOutcome;
use crate::engine::BatchEngine;
use crate::utils::{format_duration, is_valid_domain};

use super::progress::truncate_string;
use super::report::render_outcome;

const PROMPT: &str = "🔍 domain> ";
const COURT_WIDTH: usize = 31;

const COMMANDS: &[(&str, &str)] = &[
    ("<domain>", "Domaini sorgula"),
    ("/yenile N", "Tablodaki N. satırı yeniden sorgula"),
    ("/tablo", "Bu oturumdaki sorguları listele"),
    ("/temizle", "Tabloyu temizle"),
    ("/yardim", "Bu yardımı göster"),
    ("/q", "Çıkış"),
];

/// 一行输入对应的指令
#[derive(Debug, PartialEq, Eq)]
pub enum Command {
    Empty,
    Query(String),
    /// 重新查询表格中的一行 (从 0 起)
    Refresh(usize),
    Table,
    Clear,
    Help,
    Quit,
}

/// 解析一行输入；无效域名与未知指令以土耳其语提示返回
pub fn parse_command(line: &str) -> Result<Command, String> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(Command::Empty);
    }

    let Some(input) = line.strip_prefix('/') else {
        return match line {
            "q" | "quit" | "exit" => Ok(Command::Quit),
            domain if is_valid_domain(domain) => Ok(Command::Query(domain.to_string())),
            other => Err(format!("geçersiz domain: {}", other)),
        };
    };

    let mut parts = input.splitn(2, ' ');
    let cmd = parts.next().unwrap_or_default();
    let arg = parts.next().unwrap_or_default().trim();

    match cmd {
        "q" | "quit" | "exit" | "cikis" | "çıkış" => Ok(Command::Quit),
        "tablo" | "list" => Ok(Command::Table),
        "temizle" | "clear" => Ok(Command::Clear),
        "yardim" | "yardım" | "help" | "?" => Ok(Command::Help),
        "yenile" | "refresh" => arg
            .parse::<usize>()
            .ok()
            .filter(|n| *n > 0)
            .map(|n| Command::Refresh(n - 1))
            .ok_or_else(|| format!("geçersiz satır numarası: {:?}", arg)),
        other => Err(format!("bilinmeyen komut: /{}", other)),
    }
}

/// 本次会话的查询结果表
#[derive(Debug, Default)]
pub struct SessionTable {
    rows: Vec<QueryOutcome>,
}

impl SessionTable {
    /// 指定行存在时原位替换，否则追加
    pub fn record(&mut self, outcome: QueryOutcome, slot: Option<usize>) {
        match slot.and_then(|i| self.rows.get_mut(i)) {
            Some(row) => *row = outcome,
            None => self.rows.push(outcome),
        }
    }

    pub fn domain_at(&self, index: usize) -> Option<&str> {
        self.rows.get(index).map(QueryOutcome::domain)
    }

    pub fn clear(&mut self) {
        self.rows.clear();
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "\n {:>3}  {:<30} {:<16} {:>8}  {}",
            "#", "Domain", "Durum", "Süre", "Mahkeme"
        );
        let _ = writeln!(out, " {}", "─".repeat(90));

        for (i, row) in self.rows.iter().enumerate() {
            let (status, court) = match row.record() {
                Some(r) if r.blocked => ("🚫 Engelli", r.court.as_deref().unwrap_or("-")),
                Some(_) => ("✅ Erişilebilir", "-"),
                None => ("❌ Hata", "-"),
            };
            let _ = writeln!(
                out,
                " {:>3}  {:<30} {:<16} {:>8}  {}",
                i + 1,
                truncate_string(row.domain(), 30),
                status,
                format_duration(row.elapsed()),
                truncate_string(court, COURT_WIDTH)
            );
        }
        out
    }
}

/// 进入交互循环，直到用户退出或输入流结束
pub async fn run(engine: &BatchEngine, api_key: &str) -> anyhow::Result<()> {
    let mut rl = DefaultEditor::new()?;
    let mut table = SessionTable::default();

    println!(
        "\n 🔍 BTK Site Sorgulama Aracı v{}\n",
        env!("CARGO_PKG_VERSION")
    );
    print_help();

    loop {
        let line = match rl.readline(PROMPT) {
            Ok(line) => line,
            Err(ReadlineError::Interrupted) => {
                println!("(Ctrl+C) Çıkmak için /q yazın.");
                continue;
            }
            Err(ReadlineError::Eof) => break,
            Err(e) => return Err(e.into()),
        };

        let command = match parse_command(&line) {
            Ok(command) => command,
            Err(msg) => {
                eprintln!("❌ {}", msg);
                continue;
            }
        };

        match command {
            Command::Empty => {}
            Command::Quit => break,
            Command::Help => print_help(),
            Command::Clear => {
                table.clear();
                println!("🧹 Tablo temizlendi.");
            }
            Command::Table if table.is_empty() => println!("Henüz sorgu yapılmadı."),
            Command::Table => print!("{}", table.render()),
            Command::Query(domain) => {
                let _ = rl.add_history_entry(domain.as_str());
                let outcome = query_one(engine, &domain, api_key).await;
                print!("{}", render_outcome(&outcome));
                table.record(outcome, None);
                if table.len() > 1 {
                    print!("{}", table.render());
                }
            }
            Command::Refresh(index) => {
                let Some(domain) = table.domain_at(index).map(str::to_string) else {
                    eprintln!("❌ {}. satır yok", index + 1);
                    continue;
                };
                let outcome = query_one(engine, &domain, api_key).await;
                print!("{}", render_outcome(&outcome));
                table.record(outcome, Some(index));
                print!("{}", table.render());
            }
        }
    }

    println!("👋 Görüşmek üzere!");
    Ok(())
}

/// 查询单个域名；首个域名失败导致的批次中止在此折算为一条失败结果
pub async fn query_one(engine: &BatchEngine, domain: &str, api_key: &str) -> QueryOutcome {
    let started = Instant::now();
    let failure = |reason: String| QueryOutcome::Failure {
        domain: domain.to_string(),
        reason,
        elapsed: started.elapsed(),
    };

    match engine.run_batch(&[domain.to_string()], api_key).await {
        Ok(mut outcomes) => outcomes
            .pop()
            .unwrap_or_else(|| failure("no result".to_string())),
        Err(QueryError::BootstrapFailed { source, .. }) => failure(source.to_string()),
        Err(e) => failure(e.to_string()),
    }
}

fn print_help() {
    for (cmd, desc) in COMMANDS {
        println!("   {:<12} {}", cmd, desc);
    }
    println!();
}
