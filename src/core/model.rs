use std::time::Duration;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::network::session::Session;

/// 一次验证码挑战：图片与获取时刻的会话快照
#[derive(Debug, Clone)]
pub struct CaptchaChallenge {
    pub image: Bytes,
    pub session: Session,
}

/// 查询提交后的原始结果
#[derive(Debug, Clone)]
pub struct Submission {
    pub body: String,
    /// 合并了提交响应 Set-Cookie 之后的会话
    pub session: Session,
}

/// 封禁决定记录
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecisionRecord {
    pub blocked: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decision_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decision_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub case_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub case_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub court: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub foreign_description: Option<String>,
}

impl DecisionRecord {
    /// 是否解析出了完整的法院/日期/编号信息
    pub fn has_decision_details(&self) -> bool {
        self.decision_date.is_some() && self.case_number.is_some() && self.court.is_some()
    }
}

/// 单个域名的查询结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryOutcome {
    Success {
        domain: String,
        record: DecisionRecord,
        elapsed: Duration,
    },
    Failure {
        domain: String,
        reason: String,
        elapsed: Duration,
    },
}

impl QueryOutcome {
    pub fn domain(&self) -> &str {
        match self {
            QueryOutcome::Success { domain, .. } | QueryOutcome::Failure { domain, .. } => domain,
        }
    }

    pub fn elapsed(&self) -> Duration {
        match self {
            QueryOutcome::Success { elapsed, .. } | QueryOutcome::Failure { elapsed, .. } => {
                *elapsed
            }
        }
    }

    pub fn record(&self) -> Option<&DecisionRecord> {
        match self {
            QueryOutcome::Success { record, .. } => Some(record),
            QueryOutcome::Failure { .. } => None,
        }
    }
}

/// 批量查询汇总
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub requested: usize,
    pub blocked: usize,
    pub not_blocked: usize,
    pub failed: usize,
}

impl BatchSummary {
    /// `failed` = 请求数 - 成功记录数
    pub fn from_outcomes(requested: usize, outcomes: &[QueryOutcome]) -> Self {
        let (blocked, not_blocked) = outcomes
            .iter()
            .filter_map(QueryOutcome::record)
            .fold((0, 0), |(b, n), r| if r.blocked { (b + 1, n) } else { (b, n + 1) });

        Self {
            requested,
            blocked,
            not_blocked,
            failed: requested.saturating_sub(blocked + not_blocked),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn success(domain: &str, blocked: bool) -> QueryOutcome {
        QueryOutcome::Success {
            domain: domain.into(),
            record: DecisionRecord {
                blocked,
                ..Default::default()
            },
            elapsed: Duration::ZERO,
        }
    }

    #[test]
    fn summary_counts_failures_as_missing_successes() {
        let outcomes = vec![
            success("a.com", true),
            QueryOutcome::Failure {
                domain: "b.com".into(),
                reason: "boom".into(),
                elapsed: Duration::ZERO,
            },
            success("c.com", false),
        ];
        let s = BatchSummary::from_outcomes(4, &outcomes);
        assert_eq!(
            s,
            BatchSummary {
                requested: 4,
                blocked: 1,
                not_blocked: 1,
                failed: 2
            }
        );
    }

    #[test]
    fn record_serializes_without_absent_fields() {
        let json = serde_json::to_value(DecisionRecord::default()).unwrap();
        assert_eq!(json, serde_json::json!({ "blocked": false }));
    }
}
