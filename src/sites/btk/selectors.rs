//! BTK 选择器
//!
//! 预编译的 CSS 选择器与正则

use std::sync::OnceLock;

use regex::{Regex, RegexSet};
use scraper::Selector;

/// 站点选择器集合
pub struct SiteSelectors {
    /// 土耳其语说明
    pub local_desc: Selector,
    /// 英语说明
    pub foreign_desc: Selector,
    /// `<日期> tarihli ve <N/N 类型> sayılı <法院> kararıyla`
    pub decision_clause: Regex,
    /// 页面中任一"未找到决定"的表述，匹配前文本须先转为小写
    pub no_decision: RegexSet,
}

static SELECTORS: OnceLock<SiteSelectors> = OnceLock::new();

impl SiteSelectors {
    /// 获取全局选择器实例
    pub fn get() -> &'static SiteSelectors {
        SELECTORS.get_or_init(|| SiteSelectors {
            local_desc: Selector::parse("span.yazi2_2").unwrap(),
            foreign_desc: Selector::parse("span.yazi3_1").unwrap(),
            decision_clause: Regex::new(
                r"(\d{2}/\d{2}/\d{4}) tarihli ve ((\d+/\d+)\s+([A-Za-zİıÜüÖöÇçŞşĞğ.\s]+?)) sayılı (.+?) kararıyla",
            )
            .unwrap(),
            no_decision: RegexSet::new([
                r"herhangi bir idari karar",
                r"herhangi bir yarg[ıi] karar",
                r"uygulanan bir karar bulunamad[ıi]",
                r"karar bulunamad[ıi]",
            ])
            .unwrap(),
        })
    }
}
