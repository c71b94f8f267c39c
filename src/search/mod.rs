//! 검색 엔진 게이트웨이 모듈
//!
//! Elasticsearch HTTP API로 문서 색인과 전문 검색을 수행합니다.
//! 랭킹은 전적으로 외부 엔진의 match 스코어링에 위임하며,
//! 이 레이어는 재정렬, 필터링, 중복 제거를 하지 않습니다.
//!
//! 두 개의 논리 컬렉션을 사용합니다:
//! - `legal_docs`: 항상 최신 문서 하나만 유지하는 단일 컬렉션
//! - `caselaw_index`: doc_id를 키로 upsert하는 판례 컬렉션

use std::time::Duration;

use anyhow::{Context, Result};
use base64::{engine::general_purpose::STANDARD, Engine};
use chrono::Utc;
use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;
use tokio::sync::Mutex;

use crate::config::Settings;

/// 단일 최신 문서 컬렉션
pub const LEGAL_DOCS_INDEX: &str = "legal_docs";
/// 판례 컬렉션 (doc_id 키)
pub const CASELAW_INDEX: &str = "caselaw_index";

/// 최신 문서 검색 결과 수
const LATEST_SEARCH_SIZE: usize = 1;
/// HTTP 타임아웃
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

// ============================================================================
// Errors
// ============================================================================

/// 색인 계열 에러
///
/// 대량 색인 중에는 문서 단위로 복구 가능한 실패로 취급됩니다.
#[derive(Debug, Error)]
pub enum IndexError {
    /// 외부 저장소에 도달할 수 없음
    #[error("search engine unreachable: {0}")]
    Transport(#[from] reqwest::Error),

    /// 쓰기 거부 (비정상 상태 코드)
    #[error("index write rejected ({status}): {body}")]
    Rejected { status: u16, body: String },

    /// 응답 본문 파싱 실패
    #[error("malformed index response: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// 검색 계열 에러
///
/// 쓰기와 달리 호출자에게 그대로 드러냅니다.
#[derive(Debug, Error)]
pub enum RetrievalError {
    /// 외부 저장소에 도달할 수 없음
    #[error("search engine unreachable: {0}")]
    Transport(#[from] reqwest::Error),

    /// 검색 거부 (비정상 상태 코드)
    #[error("search rejected ({status}): {body}")]
    Rejected { status: u16, body: String },

    /// 응답 본문 파싱 실패
    #[error("malformed search response: {0}")]
    Malformed(#[from] serde_json::Error),
}

// ============================================================================
// Types
// ============================================================================

/// 검색 결과 항목
///
/// `doc_id`는 외부 엔진의 `_id`, 순서는 엔진의 랭킹 순서입니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    pub doc_id: String,
    pub content: String,
}

// ============================================================================
// Search Client
// ============================================================================

/// Elasticsearch 게이트웨이
pub struct SearchClient {
    client: reqwest::Client,
    host: String,
    auth_header: Option<String>,
    /// `replace_latest`의 delete+insert 시퀀스 직렬화용
    replace_lock: Mutex<()>,
}

impl SearchClient {
    /// 설정에서 클라이언트 생성
    pub fn new(settings: &Settings) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            host: settings.elasticsearch_host.trim_end_matches('/').to_string(),
            auth_header: build_auth_header(settings),
            replace_lock: Mutex::new(()),
        })
    }

    /// 요청 빌더 생성 (인증 헤더 포함)
    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}/{}", self.host, path);
        let mut builder = self.client.request(method, url);
        if let Some(ref auth) = self.auth_header {
            builder = builder.header(reqwest::header::AUTHORIZATION, auth);
        }
        builder
    }

    // ------------------------------------------------------------------
    // Index Gateway
    // ------------------------------------------------------------------

    /// 최신 문서 교체 색인
    ///
    /// `legal_docs`의 기존 문서를 모두 지우고 새 문서 하나를 넣습니다.
    /// 호출이 끝나면 컬렉션에는 최대 한 건만 남습니다. delete+insert
    /// 시퀀스는 락으로 직렬화되어 동시 호출이 서로를 지우지 않습니다.
    pub async fn replace_latest(&self, text: &str) -> Result<String, IndexError> {
        let _guard = self.replace_lock.lock().await;

        self.delete_all(LEGAL_DOCS_INDEX).await?;

        let doc = json!({
            "content": text,
            "indexed_at": Utc::now().to_rfc3339(),
        });

        let response = self
            .request(
                Method::POST,
                &format!("{}/_doc?refresh=true", LEGAL_DOCS_INDEX),
            )
            .json(&doc)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(IndexError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let indexed: IndexResponse = serde_json::from_str(&body)?;
        tracing::info!(
            "Replaced latest document in '{}' (id={})",
            LEGAL_DOCS_INDEX,
            indexed.id
        );
        Ok(indexed.id)
    }

    /// 판례 문서 upsert
    ///
    /// `doc_id`를 외부 저장소의 키로 사용하며, 같은 키는 덮어씁니다.
    /// 다른 문서는 건드리지 않습니다.
    pub async fn upsert_caselaw(&self, doc_id: &str, text: &str) -> Result<String, IndexError> {
        let doc = json!({
            "doc_id": doc_id,
            "content": text,
        });

        let response = self
            .request(
                Method::PUT,
                &format!("{}/_doc/{}?refresh=true", CASELAW_INDEX, doc_id),
            )
            .json(&doc)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(IndexError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let indexed: IndexResponse = serde_json::from_str(&body)?;
        Ok(indexed.id)
    }

    /// 판례 인덱스가 없으면 생성
    pub async fn ensure_caselaw_index(&self) -> Result<(), IndexError> {
        let response = self.request(Method::HEAD, CASELAW_INDEX).send().await?;
        if response.status().is_success() {
            return Ok(());
        }

        tracing::info!("Creating index '{}'", CASELAW_INDEX);
        let response = self
            .request(Method::PUT, CASELAW_INDEX)
            .json(&caselaw_mapping_body())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await?;
            return Err(IndexError::Rejected {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }

    /// 판례 인덱스 전체 비우기
    pub async fn clear_caselaw(&self) -> Result<u64, IndexError> {
        self.delete_all(CASELAW_INDEX).await
    }

    /// 인덱스의 모든 문서 삭제
    async fn delete_all(&self, index: &str) -> Result<u64, IndexError> {
        let response = self
            .request(
                Method::POST,
                &format!("{}/_delete_by_query?refresh=true", index),
            )
            .json(&match_all_body())
            .send()
            .await?;

        let status = response.status();
        // 인덱스가 아직 없으면 지울 것도 없다
        if status.as_u16() == 404 {
            return Ok(0);
        }

        let body = response.text().await?;
        if !status.is_success() {
            return Err(IndexError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let deleted: DeleteByQueryResponse = serde_json::from_str(&body)?;
        tracing::info!("Deleted {} documents from '{}'", deleted.deleted, index);
        Ok(deleted.deleted)
    }

    // ------------------------------------------------------------------
    // Retrieval Gateway
    // ------------------------------------------------------------------

    /// 최신 문서 검색
    ///
    /// `indexed_at` 내림차순으로 가장 최근 문서 한 건을 반환합니다.
    pub async fn search_latest(&self, query: &str) -> Result<Vec<SearchHit>, RetrievalError> {
        self.search(LEGAL_DOCS_INDEX, latest_query_body(query)).await
    }

    /// 판례 검색
    ///
    /// 엔진 랭킹 순으로 최대 `limit` 건을 반환합니다. 매칭이 그보다
    /// 적으면 있는 만큼만 반환하며, 빈 결과는 에러가 아닙니다.
    pub async fn search_caselaw(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<SearchHit>, RetrievalError> {
        self.search(CASELAW_INDEX, match_query_body(query, limit)).await
    }

    async fn search(&self, index: &str, body: Value) -> Result<Vec<SearchHit>, RetrievalError> {
        let response = self
            .request(Method::POST, &format!("{}/_search", index))
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(RetrievalError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: SearchResponse = serde_json::from_str(&body)?;
        Ok(parsed
            .hits
            .hits
            .into_iter()
            .map(|hit| SearchHit {
                doc_id: hit.id,
                content: hit.source.content,
            })
            .collect())
    }

    /// 인덱스 문서 수
    pub async fn count(&self, index: &str) -> Result<u64, RetrievalError> {
        let response = self
            .request(Method::GET, &format!("{}/_count", index))
            .send()
            .await?;

        let status = response.status();
        if status.as_u16() == 404 {
            return Ok(0);
        }

        let body = response.text().await?;
        if !status.is_success() {
            return Err(RetrievalError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: CountResponse = serde_json::from_str(&body)?;
        Ok(parsed.count)
    }

    /// 엔진 연결 확인
    pub async fn ping(&self) -> Result<(), RetrievalError> {
        let response = self.request(Method::GET, "").send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await?;
            return Err(RetrievalError::Rejected {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }
}

// ============================================================================
// Query Bodies
// ============================================================================

fn match_all_body() -> Value {
    json!({"query": {"match_all": {}}})
}

fn match_query_body(query: &str, size: usize) -> Value {
    json!({
        "query": {"match": {"content": query}},
        "size": size,
    })
}

fn latest_query_body(query: &str) -> Value {
    json!({
        "query": {"match": {"content": query}},
        "sort": [{"indexed_at": {"order": "desc"}}],
        "size": LATEST_SEARCH_SIZE,
    })
}

fn caselaw_mapping_body() -> Value {
    json!({
        "settings": {
            "analysis": {
                "analyzer": {
                    "default": {"type": "standard"}
                }
            }
        },
        "mappings": {
            "properties": {
                "content": {"type": "text"}
            }
        }
    })
}

/// 인증 헤더 구성
///
/// API 키가 있으면 우선하고, 없으면 비밀번호가 설정된 경우에만
/// basic 인증을 사용합니다.
fn build_auth_header(settings: &Settings) -> Option<String> {
    if let Some(ref key) = settings.elasticsearch_api_key {
        return Some(format!("ApiKey {}", key));
    }

    settings.elasticsearch_password.as_ref().map(|password| {
        let credentials = STANDARD.encode(format!(
            "{}:{}",
            settings.elasticsearch_user, password
        ));
        format!("Basic {}", credentials)
    })
}

// ============================================================================
// API Types
// ============================================================================

#[derive(Debug, Deserialize)]
struct IndexResponse {
    #[serde(rename = "_id")]
    id: String,
}

#[derive(Debug, Deserialize)]
struct DeleteByQueryResponse {
    #[serde(default)]
    deleted: u64,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    hits: SearchHits,
}

#[derive(Debug, Deserialize)]
struct SearchHits {
    hits: Vec<EsHit>,
}

#[derive(Debug, Deserialize)]
struct EsHit {
    #[serde(rename = "_id")]
    id: String,
    #[serde(rename = "_source")]
    source: EsSource,
}

#[derive(Debug, Deserialize)]
struct EsSource {
    content: String,
}

#[derive(Debug, Deserialize)]
struct CountResponse {
    count: u64,
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_match_query_body_carries_size() {
        let body = match_query_body("breach of contract", 5);
        assert_eq!(body["query"]["match"]["content"], "breach of contract");
        assert_eq!(body["size"], 5);
        assert!(body.get("sort").is_none());
    }

    #[test]
    fn test_latest_query_body_sorts_by_recency() {
        let body = latest_query_body("injunction");
        assert_eq!(body["query"]["match"]["content"], "injunction");
        assert_eq!(body["sort"][0]["indexed_at"]["order"], "desc");
        assert_eq!(body["size"], 1);
    }

    #[test]
    fn test_caselaw_mapping_declares_content_text() {
        let body = caselaw_mapping_body();
        assert_eq!(body["mappings"]["properties"]["content"]["type"], "text");
    }

    #[test]
    fn test_auth_header_prefers_api_key() {
        let settings = Settings {
            elasticsearch_api_key: Some("c2VjcmV0".to_string()),
            elasticsearch_password: Some("pw".to_string()),
            ..Settings::default()
        };
        assert_eq!(
            build_auth_header(&settings),
            Some("ApiKey c2VjcmV0".to_string())
        );
    }

    #[test]
    fn test_auth_header_basic_encoding() {
        let settings = Settings {
            elasticsearch_user: "elastic".to_string(),
            elasticsearch_password: Some("changeme".to_string()),
            ..Settings::default()
        };
        // base64("elastic:changeme")
        assert_eq!(
            build_auth_header(&settings),
            Some("Basic ZWxhc3RpYzpjaGFuZ2VtZQ==".to_string())
        );
    }

    #[test]
    fn test_auth_header_absent_without_credentials() {
        assert_eq!(build_auth_header(&Settings::default()), None);
    }

    #[test]
    fn test_search_response_deserialization() {
        let raw = r#"{
            "took": 2,
            "hits": {
                "total": {"value": 1},
                "hits": [
                    {"_id": "42", "_score": 1.3, "_source": {"doc_id": "42", "content": "CASE NO. 123"}}
                ]
            }
        }"#;

        let parsed: SearchResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.hits.hits.len(), 1);
        assert_eq!(parsed.hits.hits[0].id, "42");
        assert_eq!(parsed.hits.hits[0].source.content, "CASE NO. 123");
    }

    #[test]
    fn test_index_response_deserialization() {
        let raw = r#"{"_index": "legal_docs", "_id": "abc123", "result": "created"}"#;
        let parsed: IndexResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.id, "abc123");
    }

    #[test]
    fn test_delete_by_query_response_defaults_to_zero() {
        let parsed: DeleteByQueryResponse = serde_json::from_str(r#"{"took": 3}"#).unwrap();
        assert_eq!(parsed.deleted, 0);

        let parsed: DeleteByQueryResponse =
            serde_json::from_str(r#"{"took": 3, "deleted": 7}"#).unwrap();
        assert_eq!(parsed.deleted, 7);
    }
}
