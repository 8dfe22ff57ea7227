//! 结果输出
//!
//! 人类可读的逐域名报告与批次汇总，以及机器可读的 JSON 信封。

use std::fmt::Write as _;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;

use crate::core::error::Result;
use crate::core::model::{BatchSummary, DecisionRecord, QueryOutcome};
use crate::sites::btk::NO_DECISION_TEXT;
use crate::utils::format_duration;

const WIDE: usize = 60;

/// 单个域名的 JSON 输出
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope<'a> {
    pub domain: &'a str,
    pub timestamp: String,
    pub status: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<&'a str>,
    pub elapsed_ms: u64,
    #[serde(flatten)]
    pub record: Option<&'a DecisionRecord>,
}

impl<'a> Envelope<'a> {
    pub fn new(outcome: &'a QueryOutcome, at: DateTime<Utc>) -> Self {
        let (error, record) = match outcome {
            QueryOutcome::Success { record, .. } => (None, Some(record)),
            QueryOutcome::Failure { reason, .. } => (Some(reason.as_str()), None),
        };
        Self {
            domain: outcome.domain(),
            timestamp: at.to_rfc3339_opts(SecondsFormat::Secs, true),
            status: record.is_some(),
            error,
            elapsed_ms: u64::try_from(outcome.elapsed().as_millis()).unwrap_or(u64::MAX),
            record,
        }
    }
}

/// 带缩进的 JSON 文本
pub fn render_json(outcome: &QueryOutcome) -> Result<String> {
    Ok(serde_json::to_string_pretty(&Envelope::new(outcome, Utc::now()))?)
}

/// 逐域名的文本报告
pub fn render_outcome(outcome: &QueryOutcome) -> String {
    let mut out = String::new();
    let heavy = "═".repeat(WIDE);
    let light = "─".repeat(WIDE);

    let record = match outcome {
        QueryOutcome::Failure { domain, reason, .. } => {
            let _ = writeln!(out, "❌ {} sorgulanırken hata: {}", domain, reason);
            return out;
        }
        QueryOutcome::Success { record, .. } => record,
    };

    let _ = writeln!(out, "\n{}", heavy);
    let _ = writeln!(out, "📌 Domain: {}", outcome.domain());
    let _ = writeln!(out, "⏱️  Sorgu Süresi: {}", format_duration(outcome.elapsed()));
    let _ = writeln!(out, "{}", heavy);

    if record.blocked {
        let _ = writeln!(out, "🚫 Durum: ENGELLİ");
        let _ = writeln!(out, "{}", light);

        let fields = [
            ("📅 Karar Tarihi", &record.decision_date),
            ("🔖 Karar Numarası", &record.decision_number),
            ("📋 Dosya Numarası", &record.case_number),
            ("📂 Dosya Türü", &record.case_type),
            ("⚖️  Mahkeme", &record.court),
        ];
        for (label, value) in fields {
            if let Some(value) = value {
                let _ = writeln!(out, "{}: {}", label, value);
            }
        }
        if !record.has_decision_details() {
            let _ = writeln!(out, "ℹ️  Karar ayrıntıları sayfadan ayrıştırılamadı.");
        }
        let _ = writeln!(out, "{}", light);

        if let Some(text) = &record.local_description {
            let _ = writeln!(out, "\n📝 Türkçe Açıklama:\n   {}", text);
        }
        if let Some(text) = &record.foreign_description {
            let _ = writeln!(out, "\n📝 English Description:\n   {}", text);
        }
    } else {
        let _ = writeln!(out, "✅ Durum: ERİŞİLEBİLİR");
        let _ = writeln!(out, "{}", light);
        let _ = writeln!(
            out,
            "ℹ️  {}",
            record
                .local_description
                .as_deref()
                .unwrap_or(NO_DECISION_TEXT)
        );
    }

    let _ = writeln!(out, "{}", heavy);
    out
}

/// 批次汇总
pub fn render_summary(summary: &BatchSummary) -> String {
    let mut out = String::new();
    let heavy = "═".repeat(WIDE);

    let _ = writeln!(out, "\n📊 ÖZET\n{}", heavy);
    let _ = writeln!(out, "   🚫 Engelli: {}", summary.blocked);
    let _ = writeln!(out, "   ✅ Erişilebilir: {}", summary.not_blocked);
    if summary.failed > 0 {
        let _ = writeln!(out, "   ❓ Hatalı: {}", summary.failed);
    }
    let _ = writeln!(out, "{}", heavy);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::time::Duration;

    fn blocked() -> QueryOutcome {
        QueryOutcome::Success {
            domain: "ornek.com".into(),
            record: DecisionRecord {
                blocked: true,
                decision_date: Some("12/03/2021".into()),
                court: Some("İstanbul 5. Sulh Ceza Hakimliği".into()),
                local_description: Some("... engellenmiştir.".into()),
                ..Default::default()
            },
            elapsed: Duration::from_millis(2340),
        }
    }

    #[test]
    fn blocked_report_lists_known_fields_only() {
        let text = render_outcome(&blocked());
        assert!(text.contains("ENGELLİ"));
        assert!(text.contains("Karar Tarihi: 12/03/2021"));
        assert!(text.contains("Mahkeme: İstanbul 5. Sulh Ceza Hakimliği"));
        assert!(text.contains("Sorgu Süresi: 2.34s"));
        assert!(!text.contains("Dosya Numarası"));
        assert!(!text.contains("English Description"));
    }

    #[test]
    fn missing_decision_details_are_pointed_out() {
        assert!(render_outcome(&blocked()).contains("ayrıştırılamadı"));

        let full = QueryOutcome::Success {
            domain: "ornek.com".into(),
            record: DecisionRecord {
                blocked: true,
                decision_date: Some("12/03/2021".into()),
                case_number: Some("2021/1234".into()),
                court: Some("İstanbul 5. Sulh Ceza Hakimliği".into()),
                ..Default::default()
            },
            elapsed: Duration::ZERO,
        };
        let text = render_outcome(&full);
        assert!(text.contains("Dosya Numarası: 2021/1234"));
        assert!(!text.contains("ayrıştırılamadı"));
    }

    #[test]
    fn failure_report_is_a_single_line() {
        let text = render_outcome(&QueryOutcome::Failure {
            domain: "b.com".into(),
            reason: "Captcha code was rejected by the site".into(),
            elapsed: Duration::ZERO,
        });
        assert_eq!(text.lines().count(), 1);
        assert!(text.contains("b.com"));
    }

    #[test]
    fn summary_hides_zero_failures() {
        let s = BatchSummary {
            requested: 2,
            blocked: 1,
            not_blocked: 1,
            failed: 0,
        };
        assert!(!render_summary(&s).contains("Hatalı"));
    }

    #[test]
    fn envelope_flattens_the_record() {
        let outcome = blocked();
        let at = Utc.with_ymd_and_hms(2024, 6, 10, 8, 30, 0).unwrap();
        let json = serde_json::to_value(Envelope::new(&outcome, at)).unwrap();

        assert_eq!(json["domain"], "ornek.com");
        assert_eq!(json["timestamp"], "2024-06-10T08:30:00Z");
        assert_eq!(json["status"], true);
        assert_eq!(json["elapsedMs"], 2340);
        assert!(json.get("elapsed_ms").is_none());
        assert_eq!(json["blocked"], true);
        assert_eq!(json["decisionDate"], "12/03/2021");
        assert!(json.get("error").is_none());
        assert!(json.get("caseNumber").is_none());
    }

    #[test]
    fn failed_envelope_carries_the_error() {
        let outcome = QueryOutcome::Failure {
            domain: "b.com".into(),
            reason: "boom".into(),
            elapsed: Duration::from_millis(15),
        };
        let json = serde_json::to_value(Envelope::new(&outcome, Utc::now())).unwrap();
        assert_eq!(json["status"], false);
        assert_eq!(json["error"], "boom");
        assert!(json.get("blocked").is_none());
    }
}
