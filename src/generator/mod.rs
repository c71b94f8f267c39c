//! 답변 생성 게이트웨이 모듈
//!
//! 검색된 문서를 컨텍스트로 묶어 로컬 Ollama 서버에 프롬프트를
//! 전달합니다. 로컬 LLM 추론은 느리므로 긴 타임아웃과 고정 간격의
//! 재시도를 사용합니다.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::Settings;

/// 생성 요청 타임아웃
const GENERATE_TIMEOUT: Duration = Duration::from_secs(120);
/// 최대 시도 횟수
const MAX_ATTEMPTS: u32 = 3;
/// 시도 간 고정 딜레이 (백오프 증가 없음)
const RETRY_DELAY: Duration = Duration::from_secs(2);
/// 응답 최대 토큰 수
const MAX_TOKENS: u32 = 500;
/// 컨텍스트가 없을 때의 대체 문자열
const EMPTY_CONTEXT: &str = "No context provided.";
/// 응답 본문에 답변이 없을 때의 대체 문자열
const NO_ANSWER: &str = "No answer generated";

// ============================================================================
// Answer
// ============================================================================

/// 생성 결과
///
/// 성공과 실패를 구분하는 태그된 값입니다. 실패도 `Err`가 아닌 값으로
/// 반환되므로 호출자는 문자열 내용을 들여다보지 않고 분기할 수 있습니다.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Answer {
    /// 모델이 생성한 답변
    Generated(String),
    /// 재시도 소진
    Failed { attempts: u32, reason: String },
}

impl Answer {
    /// 실패 여부
    pub fn is_failure(&self) -> bool {
        matches!(self, Answer::Failed { .. })
    }

    /// 표시용 문자열로 변환
    ///
    /// 실패는 시도 횟수와 마지막 에러를 담은 메시지로 렌더링됩니다.
    pub fn into_text(self) -> String {
        match self {
            Answer::Generated(text) => text,
            Answer::Failed { attempts, reason } => {
                format!("Connection failed after {} attempts: {}", attempts, reason)
            }
        }
    }
}

// ============================================================================
// AnswerProvider Trait
// ============================================================================

/// 답변 생성 프로바이더 트레이트
#[async_trait]
pub trait AnswerProvider: Send + Sync {
    /// 질의와 컨텍스트 블록으로 답변 생성
    ///
    /// 네트워크 실패를 포함한 어떤 경우에도 패닉하거나 `Err`를
    /// 던지지 않고 태그된 값을 반환합니다.
    async fn answer(&self, query: &str, context_blocks: &[String]) -> Answer;

    /// 모델 식별자
    fn model(&self) -> &str;
}

// ============================================================================
// Ollama Generator
// ============================================================================

/// Ollama `/api/generate` 기반 생성기
pub struct OllamaGenerator {
    client: reqwest::Client,
    host: String,
    model: String,
}

impl OllamaGenerator {
    /// 설정에서 생성기 생성
    pub fn new(settings: &Settings) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(GENERATE_TIMEOUT)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            host: settings.ollama_host.trim_end_matches('/').to_string(),
            model: settings.ollama_model.clone(),
        })
    }

    /// 단일 생성 시도
    async fn try_generate(&self, prompt: &str) -> Result<String> {
        let request = GenerateRequest {
            model: self.model.clone(),
            prompt: prompt.to_string(),
            max_tokens: MAX_TOKENS,
            stream: false,
        };

        let url = format!("{}/api/generate", self.host);
        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .context("Failed to send generation request")?;

        let status = response.status();
        let body = response
            .text()
            .await
            .context("Failed to read generation response")?;

        if !status.is_success() {
            anyhow::bail!("generation endpoint returned {}: {}", status, body);
        }

        let parsed: GenerateResponse =
            serde_json::from_str(&body).context("Failed to parse generation response")?;
        Ok(parsed.response.unwrap_or_else(|| NO_ANSWER.to_string()))
    }
}

#[async_trait]
impl AnswerProvider for OllamaGenerator {
    async fn answer(&self, query: &str, context_blocks: &[String]) -> Answer {
        let prompt = build_prompt(query, context_blocks);
        let mut last_error = String::new();

        for attempt in 1..=MAX_ATTEMPTS {
            match self.try_generate(&prompt).await {
                Ok(text) => return Answer::Generated(text),
                Err(e) => {
                    last_error = format!("{:#}", e);
                    tracing::warn!(
                        "Generation attempt {}/{} failed: {}",
                        attempt,
                        MAX_ATTEMPTS,
                        last_error
                    );
                    if attempt < MAX_ATTEMPTS {
                        tokio::time::sleep(RETRY_DELAY).await;
                    }
                }
            }
        }

        Answer::Failed {
            attempts: MAX_ATTEMPTS,
            reason: last_error,
        }
    }

    fn model(&self) -> &str {
        &self.model
    }
}

// ============================================================================
// Prompt
// ============================================================================

/// RAG 프롬프트 조립
///
/// 컨텍스트 블록을 개행으로 연결하고, 비어있으면 대체 문자열을
/// 사용합니다.
fn build_prompt(query: &str, context_blocks: &[String]) -> String {
    let context = if context_blocks.is_empty() {
        EMPTY_CONTEXT.to_string()
    } else {
        context_blocks.join("\n")
    };

    format!(
        "Legal Query: {}\n\nRelevant Documents:\n{}\n\nAnswer:",
        query, context
    )
}

// ============================================================================
// API Types
// ============================================================================

#[derive(Debug, Serialize)]
struct GenerateRequest {
    model: String,
    prompt: String,
    max_tokens: u32,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: Option<String>,
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_prompt_joins_context_blocks() {
        let blocks = vec!["first document".to_string(), "second document".to_string()];
        let prompt = build_prompt("What is the holding?", &blocks);

        assert_eq!(
            prompt,
            "Legal Query: What is the holding?\n\n\
             Relevant Documents:\nfirst document\nsecond document\n\nAnswer:"
        );
    }

    #[test]
    fn test_build_prompt_empty_context_uses_placeholder() {
        let prompt = build_prompt("Anything?", &[]);
        assert!(prompt.contains("No context provided."));
        assert!(prompt.starts_with("Legal Query: Anything?"));
    }

    #[test]
    fn test_failed_answer_renders_attempt_count() {
        let answer = Answer::Failed {
            attempts: 3,
            reason: "connection refused".to_string(),
        };
        assert!(answer.is_failure());
        assert_eq!(
            answer.into_text(),
            "Connection failed after 3 attempts: connection refused"
        );
    }

    #[test]
    fn test_generated_answer_is_not_failure() {
        let answer = Answer::Generated("the court held...".to_string());
        assert!(!answer.is_failure());
        assert_eq!(answer.into_text(), "the court held...");
    }

    #[test]
    fn test_generate_response_missing_field() {
        let parsed: GenerateResponse = serde_json::from_str("{}").unwrap();
        assert!(parsed.response.is_none());
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_fails_after_three_attempts() {
        let settings = Settings {
            // 닫힌 포트 - 연결이 즉시 거부된다
            ollama_host: "http://127.0.0.1:9".to_string(),
            ..Settings::default()
        };
        let generator = OllamaGenerator::new(&settings).unwrap();

        let started = std::time::Instant::now();
        let answer = generator.answer("query", &[]).await;

        match answer {
            Answer::Failed { attempts, .. } => assert_eq!(attempts, 3),
            Answer::Generated(_) => panic!("expected failure against unreachable endpoint"),
        }
        // 시도 사이 2초 딜레이가 두 번 들어간다
        assert!(started.elapsed() >= Duration::from_secs(4));
    }
}
