//! BTK 结果页解析
//!
//! 纯函数：任何输入都返回一条记录，从不失败。

use scraper::{Html, Selector};

use crate::core::model::DecisionRecord;

use super::SiteSelectors;

/// 页面声明"未找到决定"时使用的固定说明
pub const NO_DECISION_TEXT: &str = "Bu site hakkında herhangi bir engel kararı bulunmamaktadır.";

const BLOCKED_MARKER: &str = "engellenmiştir";

/// 从结果页面提取决定记录
pub fn extract(html: &str) -> DecisionRecord {
    let doc = Html::parse_document(html);
    let s = SiteSelectors::get();

    // "未找到决定" 的表述优先于任何封禁判定
    let page_text = doc.root_element().text().collect::<String>();
    if s.no_decision.is_match(&fold_case(html))
        || s.no_decision.is_match(&fold_case(&page_text))
    {
        return DecisionRecord {
            blocked: false,
            local_description: Some(NO_DECISION_TEXT.to_string()),
            ..Default::default()
        };
    }

    let Some(local) = first_text(&doc, &s.local_desc).filter(|t| t.contains(BLOCKED_MARKER))
    else {
        return DecisionRecord::default();
    };

    let mut record = DecisionRecord {
        blocked: true,
        foreign_description: first_text(&doc, &s.foreign_desc),
        ..Default::default()
    };

    if let Some(caps) = s.decision_clause.captures(&local) {
        let group = |i: usize| caps.get(i).map(|m| m.as_str().trim().to_string());
        record.decision_date = group(1);
        record.decision_number = group(2);
        record.case_number = group(3);
        record.case_type = group(4);
        record.court = group(5);
    }

    record.local_description = Some(local);
    record
}

/// 首个匹配元素的纯文本，空白折叠后为空则视为缺失
fn first_text(doc: &Html, selector: &Selector) -> Option<String> {
    doc.select(selector)
        .next()
        .map(|el| collapse_whitespace(&el.text().collect::<String>()))
        .filter(|t| !t.is_empty())
}

/// 按土耳其语习惯转为小写：`İ` 直接映射为 `i`，不留下组合点
fn fold_case(text: &str) -> String {
    text.replace('İ', "i").to_lowercase()
}

/// `&nbsp;` 解码后为 U+00A0，同样属于空白
fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
