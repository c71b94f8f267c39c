//! 설정 모듈
//!
//! 환경변수에서 외부 시스템 접속 정보를 읽어옵니다.
//! 시작 시 한 번 로드되며 이후에는 읽기 전용으로 공유됩니다.

// ============================================================================
// Settings
// ============================================================================

/// 기본 Elasticsearch 호스트
const DEFAULT_ELASTICSEARCH_HOST: &str = "http://localhost:9200";
/// 기본 Ollama 호스트
const DEFAULT_OLLAMA_HOST: &str = "http://127.0.0.1:11434";
/// 기본 생성 모델
const DEFAULT_OLLAMA_MODEL: &str = "gemma3:4b";

/// 런타임 설정
///
/// 모든 값은 환경변수에서 읽으며, 없으면 로컬 기본값을 사용합니다.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Elasticsearch 호스트 URL
    pub elasticsearch_host: String,
    /// Elasticsearch API 키 (base64 인코딩된 `id:secret`)
    pub elasticsearch_api_key: Option<String>,
    /// Elasticsearch 사용자명 (basic 인증용)
    pub elasticsearch_user: String,
    /// Elasticsearch 비밀번호 (basic 인증용)
    pub elasticsearch_password: Option<String>,
    /// Ollama 호스트 URL
    pub ollama_host: String,
    /// 생성 모델 식별자
    pub ollama_model: String,
}

impl Settings {
    /// 환경변수에서 설정 로드
    pub fn from_env() -> Self {
        Self {
            elasticsearch_host: env_or("ELASTICSEARCH_HOST", DEFAULT_ELASTICSEARCH_HOST),
            elasticsearch_api_key: env_opt("ELASTICSEARCH_API_KEY"),
            elasticsearch_user: env_or("ELASTICSEARCH_USER", "elastic"),
            elasticsearch_password: env_opt("ELASTICSEARCH_PASSWORD"),
            ollama_host: env_or("OLLAMA_HOST", DEFAULT_OLLAMA_HOST),
            ollama_model: env_or("OLLAMA_MODEL", DEFAULT_OLLAMA_MODEL),
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            elasticsearch_host: DEFAULT_ELASTICSEARCH_HOST.to_string(),
            elasticsearch_api_key: None,
            elasticsearch_user: "elastic".to_string(),
            elasticsearch_password: None,
            ollama_host: DEFAULT_OLLAMA_HOST.to_string(),
            ollama_model: DEFAULT_OLLAMA_MODEL.to_string(),
        }
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// 환경변수 조회, 없거나 비어있으면 기본값
fn env_or(key: &str, default: &str) -> String {
    match std::env::var(key) {
        Ok(v) if !v.is_empty() => v,
        _ => default.to_string(),
    }
}

/// 환경변수 조회, 없거나 비어있으면 None
fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_or_default() {
        std::env::remove_var("LEXRAG_TEST_MISSING");
        assert_eq!(env_or("LEXRAG_TEST_MISSING", "fallback"), "fallback");

        std::env::set_var("LEXRAG_TEST_PRESENT", "value");
        assert_eq!(env_or("LEXRAG_TEST_PRESENT", "fallback"), "value");
        std::env::remove_var("LEXRAG_TEST_PRESENT");
    }

    #[test]
    fn test_env_opt_empty_is_none() {
        std::env::set_var("LEXRAG_TEST_EMPTY", "");
        assert!(env_opt("LEXRAG_TEST_EMPTY").is_none());
        std::env::remove_var("LEXRAG_TEST_EMPTY");
    }

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.elasticsearch_host, "http://localhost:9200");
        assert_eq!(settings.ollama_host, "http://127.0.0.1:11434");
        assert_eq!(settings.ollama_model, "gemma3:4b");
        assert!(settings.elasticsearch_api_key.is_none());
    }
}
