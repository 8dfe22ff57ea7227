//! BTK 网站查询站点模块
//!
//! 按职责拆分为验证码获取、查询提交与结果解析三个子模块

mod captcha;
mod extractor;
mod query;
mod selectors;

use std::sync::Arc;

use async_trait::async_trait;
use url::Url;

use crate::core::config::SiteConfig;
use crate::core::error::Result;
use crate::core::model::{CaptchaChallenge, DecisionRecord, Submission};
use crate::interfaces::LookupPortal;
use crate::network::service::HttpService;
use crate::network::session::Session;

use self::captcha::CaptchaFetcher;
use self::extractor::extract;
use self::query::{QuerySubmitter, is_captcha_rejected};
use self::selectors::SiteSelectors;

pub use self::extractor::NO_DECISION_TEXT;

/// BTK 站点实现
pub struct BtkPortal {
    captcha: CaptchaFetcher,
    query: QuerySubmitter,
}

impl BtkPortal {
    pub fn new(config: &SiteConfig, http: Arc<HttpService>) -> Result<Self> {
        let root = site_root(&config.base_url)?;
        let endpoint = root.join(config.captcha_path.trim_start_matches('/'))?;

        Ok(Self {
            captcha: CaptchaFetcher::new(http.clone(), root.clone(), endpoint),
            query: QuerySubmitter::new(http, root),
        })
    }
}

/// 表单根路径总以 `/` 结尾，相对路径才能拼接到其下
fn site_root(base_url: &str) -> Result<Url> {
    if base_url.ends_with('/') {
        Ok(Url::parse(base_url)?)
    } else {
        Ok(Url::parse(&format!("{}/", base_url))?)
    }
}

#[async_trait]
impl LookupPortal for BtkPortal {
    async fn acquire_captcha(&self, session: Option<Session>) -> Result<CaptchaChallenge> {
        self.captcha.acquire(session).await
    }

    async fn submit(&self, domain: &str, code: &str, session: &Session) -> Result<Submission> {
        self.query.submit(domain, code, session).await
    }

    fn is_captcha_rejected(&self, body: &str) -> bool {
        is_captcha_rejected(body)
    }

    fn extract(&self, body: &str) -> DecisionRecord {
        extract(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::TransportConfig;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn root_gains_a_trailing_slash() {
        let root = site_root("https://internet.btk.gov.tr/sitesorgu").unwrap();
        assert_eq!(root.as_str(), "https://internet.btk.gov.tr/sitesorgu/");
        assert_eq!(
            root.join("secureimage/captcha.php").unwrap().as_str(),
            "https://internet.btk.gov.tr/sitesorgu/secureimage/captcha.php"
        );
    }

    #[tokio::test]
    async fn portal_drives_a_full_lookup() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/sitesorgu/"))
            .respond_with(ResponseTemplate::new(200).insert_header("set-cookie", "PHPSESSID=s1"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/sitesorgu/secureimage/captcha.php"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"png".to_vec()))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/sitesorgu/"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"<span class="yazi2_2">Bu site mahkeme kararıyla engellenmiştir.</span>"#,
            ))
            .mount(&server)
            .await;

        let http = Arc::new(HttpService::new(&TransportConfig::default()).unwrap());
        let site = SiteConfig::builder()
            .base_url(format!("{}/sitesorgu", server.uri()))
            .build();
        let portal = BtkPortal::new(&site, http).unwrap();

        let challenge = portal.acquire_captcha(None).await.unwrap();
        assert_eq!(challenge.session.get("PHPSESSID"), Some("s1"));

        let sub = portal
            .submit("ornek.com", "aB3dE", &challenge.session)
            .await
            .unwrap();
        assert!(!portal.is_captcha_rejected(&sub.body));

        let record = portal.extract(&sub.body);
        assert!(record.blocked);
        assert_eq!(
            record.local_description.as_deref(),
            Some("Bu site mahkeme kararıyla engellenmiştir.")
        );
    }
}
