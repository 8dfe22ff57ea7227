//! Gemini 验证码识别客户端
//!
//! 以单次多模态请求发送指令文本与验证码图片，并把返回文本规范化为 5~6 位验证码。
//! 站点对验证码大小写敏感，因此规范化过程绝不改变大小写。

use std::sync::Arc;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use reqwest::StatusCode;
use reqwest::header::{HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use url::Url;

use crate::core::config::RecognizerConfig;
use crate::core::error::{QueryError, Result};
use crate::interfaces::CaptchaSolver;
use crate::network::service::HttpService;

const CODE_LEN: std::ops::RangeInclusive<usize> = 5..=6;

/// 基于 Gemini REST API 的验证码识别器
pub struct GeminiSolver {
    http: Arc<HttpService>,
    endpoint: Url,
    prompt: String,
    max_output_tokens: u32,
}

impl GeminiSolver {
    pub fn new(config: &RecognizerConfig, http: Arc<HttpService>) -> Result<Self> {
        let endpoint = Url::parse(&format!(
            "{}/{}:generateContent",
            config.api_base.trim_end_matches('/'),
            config.model
        ))?;

        Ok(Self {
            http,
            endpoint,
            prompt: config.prompt.clone(),
            max_output_tokens: config.max_output_tokens,
        })
    }

    fn build_request(&self, image: &[u8]) -> GenerateContentRequest {
        GenerateContentRequest {
            contents: vec![Content {
                parts: vec![
                    Part::Text {
                        text: self.prompt.clone(),
                    },
                    Part::InlineData {
                        inline_data: InlineDataPayload {
                            mime_type: "image/png".to_string(),
                            data: BASE64_STANDARD.encode(image),
                        },
                    },
                ],
            }],
            generation_config: GenerationConfig {
                temperature: 0.0,
                max_output_tokens: self.max_output_tokens,
            },
        }
    }
}

#[async_trait]
impl CaptchaSolver for GeminiSolver {
    async fn recognize(&self, image: &[u8], api_key: &str) -> Result<String> {
        info!("正在识别验证码 ({} bytes)...", image.len());

        let mut headers = HeaderMap::new();
        let key = HeaderValue::from_str(api_key)
            .map_err(|_| QueryError::RecognitionAuth(StatusCode::UNAUTHORIZED))?;
        headers.insert("x-goog-api-key", key);

        let request = self.build_request(image);
        let resp = self
            .http
            .post_json(self.endpoint.clone(), &request, headers)
            .await?;

        let code = interpret_response(resp.status, &resp.body)?;
        info!("验证码识别成功: {}", code);
        Ok(code)
    }
}

/// 将识别服务的 HTTP 响应映射为验证码或错误
fn interpret_response(status: StatusCode, body: &[u8]) -> Result<String> {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            return Err(QueryError::RecognitionAuth(status));
        }
        StatusCode::TOO_MANY_REQUESTS => return Err(QueryError::RecognitionQuota),
        StatusCode::OK => {}
        _ => {
            return Err(QueryError::RecognitionApi {
                status: status.as_u16(),
                message: error_message(body),
            });
        }
    }

    let parsed: GenerateContentResponse = serde_json::from_slice(body)?;

    if let Some(reason) = parsed
        .prompt_feedback
        .and_then(|f| f.block_reason)
        .filter(|r| !r.is_empty())
    {
        return Err(QueryError::RecognitionSafety(reason));
    }

    let candidate = parsed
        .candidates
        .into_iter()
        .next()
        .ok_or_else(|| QueryError::RecognitionEmpty("no candidates".into()))?;

    match candidate.finish_reason.as_deref() {
        Some("SAFETY") => return Err(QueryError::RecognitionSafety("SAFETY".into())),
        Some(reason) if !reason.is_empty() && reason != "STOP" => {
            return Err(QueryError::RecognitionEmpty(format!(
                "generation finished with {}",
                reason
            )));
        }
        _ => {}
    }

    let text = candidate
        .content
        .and_then(|c| c.parts.into_iter().find_map(|p| p.text))
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| QueryError::RecognitionEmpty("no text in candidate".into()))?;

    debug!("识别原始输出: {:?}", text);
    normalize_code(&text)
}

/// 仅保留 ASCII 字母与数字，长度须在 5~6 之间
pub fn normalize_code(raw: &str) -> Result<String> {
    let cleaned: String = raw.chars().filter(char::is_ascii_alphanumeric).collect();

    if !CODE_LEN.contains(&cleaned.len()) {
        return Err(QueryError::RecognitionFormat {
            raw: raw.to_string(),
            cleaned,
        });
    }
    Ok(cleaned)
}

fn error_message(body: &[u8]) -> String {
    serde_json::from_slice::<ErrorWrapper>(body)
        .ok()
        .and_then(|w| w.error.message)
        .unwrap_or_else(|| String::from_utf8_lossy(body).trim().to_string())
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum Part {
    Text {
        text: String,
    },
    InlineData { inline_data: InlineDataPayload },
}

#[derive(Serialize)]
struct InlineDataPayload {
    mime_type: String,
    data: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<ContentResponse>,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct ContentResponse {
    #[serde(default)]
    parts: Vec<PartResponse>,
}

#[derive(Deserialize)]
struct PartResponse {
    text: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

#[derive(Deserialize)]
struct ErrorWrapper {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::TransportConfig;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn candidate_text(text: &str) -> Vec<u8> {
        json!({
            "candidates": [{
                "content": { "parts": [{ "text": text }] },
                "finishReason": "STOP"
            }]
        })
        .to_string()
        .into_bytes()
    }

    #[test]
    fn trailing_whitespace_is_stripped_and_case_kept() {
        assert_eq!(normalize_code("zQsmR\n").unwrap(), "zQsmR");
        assert_eq!(normalize_code(" A8k N2P ").unwrap(), "A8kN2P");
    }

    #[test]
    fn short_or_long_output_is_a_format_error() {
        let err = normalize_code("12").unwrap_err();
        assert!(
            matches!(&err, QueryError::RecognitionFormat { raw, cleaned } if raw == "12" && cleaned == "12")
        );
        assert!(matches!(
            normalize_code("The code is abc12").unwrap_err(),
            QueryError::RecognitionFormat { .. }
        ));
    }

    #[test]
    fn http_statuses_map_to_recognition_errors() {
        assert!(matches!(
            interpret_response(StatusCode::UNAUTHORIZED, b""),
            Err(QueryError::RecognitionAuth(_))
        ));
        assert!(matches!(
            interpret_response(StatusCode::FORBIDDEN, b""),
            Err(QueryError::RecognitionAuth(_))
        ));
        assert!(matches!(
            interpret_response(StatusCode::TOO_MANY_REQUESTS, b""),
            Err(QueryError::RecognitionQuota)
        ));

        let body = br#"{"error":{"code":500,"message":"backend down","status":"INTERNAL"}}"#;
        match interpret_response(StatusCode::INTERNAL_SERVER_ERROR, body) {
            Err(QueryError::RecognitionApi { status, message }) => {
                assert_eq!(status, 500);
                assert_eq!(message, "backend down");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn safety_blocks_are_reported() {
        let body = json!({ "promptFeedback": { "blockReason": "OTHER" } }).to_string();
        assert!(matches!(
            interpret_response(StatusCode::OK, body.as_bytes()),
            Err(QueryError::RecognitionSafety(r)) if r == "OTHER"
        ));

        let body = json!({ "candidates": [{ "finishReason": "SAFETY" }] }).to_string();
        assert!(matches!(
            interpret_response(StatusCode::OK, body.as_bytes()),
            Err(QueryError::RecognitionSafety(_))
        ));
    }

    #[test]
    fn unfinished_or_empty_generation_is_empty() {
        let body = json!({
            "candidates": [{
                "content": { "parts": [{ "text": "zQs" }] },
                "finishReason": "MAX_TOKENS"
            }]
        })
        .to_string();
        assert!(matches!(
            interpret_response(StatusCode::OK, body.as_bytes()),
            Err(QueryError::RecognitionEmpty(_))
        ));

        assert!(matches!(
            interpret_response(StatusCode::OK, br#"{"candidates":[]}"#),
            Err(QueryError::RecognitionEmpty(_))
        ));
        assert!(matches!(
            interpret_response(StatusCode::OK, &candidate_text("   ")),
            Err(QueryError::RecognitionEmpty(_))
        ));
    }

    #[tokio::test]
    async fn recognize_sends_key_image_and_deterministic_config() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/test-model:generateContent"))
            .and(header("x-goog-api-key", "secret"))
            .and(body_partial_json(json!({
                "generationConfig": { "temperature": 0.0, "maxOutputTokens": 16 },
                "contents": [{ "parts": [
                    { "text": "read it" },
                    { "inline_data": { "mime_type": "image/png", "data": "iVBORw==" } }
                ]}]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(candidate_text("aB3dE\n")))
            .expect(1)
            .mount(&server)
            .await;

        let http = Arc::new(HttpService::new(&TransportConfig::default()).unwrap());
        let cfg = RecognizerConfig::builder()
            .api_base(server.uri())
            .model("test-model")
            .prompt("read it")
            .max_output_tokens(16)
            .build();
        let solver = GeminiSolver::new(&cfg, http).unwrap();

        // 0x89 'P' 'N' 'G' -> "iVBORw=="
        let code = solver.recognize(&[0x89, b'P', b'N', b'G'], "secret").await.unwrap();
        assert_eq!(code, "aB3dE");
    }
}
