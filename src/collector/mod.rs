//! 판례 데이터 수집 모듈
//!
//! `data/` 폴더 구조를 순회하며 대량 색인용 문서를 수집합니다.
//! 각 하위 폴더는 `html/`과 `json/` 디렉토리를 가질 수 있습니다:
//! - HTML 파일: DOM 텍스트를 추출하고 폴더명을 doc_id로 사용
//! - JSON 파일: `content` 필드(없으면 전체 값)를 쓰고 파일명을 doc_id로 사용
//!
//! 읽을 수 없거나 비어있는 파일은 경고 후 건너뜁니다.

use std::path::{Path, PathBuf};

use anyhow::{bail, Result};
use scraper::Html;
use serde_json::Value;
use walkdir::WalkDir;

// ============================================================================
// Types
// ============================================================================

/// 수집된 판례 문서
#[derive(Debug, Clone)]
pub struct CaselawDoc {
    /// 외부 저장소 키 (같은 키는 덮어쓴다)
    pub doc_id: String,
    /// 본문 텍스트
    pub content: String,
    /// 원본 파일 경로 (로그용)
    pub path: PathBuf,
}

// ============================================================================
// Caselaw Collector
// ============================================================================

/// 판례 수집기
#[derive(Debug, Default)]
pub struct CaselawCollector;

impl CaselawCollector {
    /// 새 수집기 생성
    pub fn new() -> Self {
        Self
    }

    /// data 디렉토리에서 문서 수집
    pub fn collect(&self, data_dir: &Path) -> Result<Vec<CaselawDoc>> {
        if !data_dir.is_dir() {
            bail!("data directory not found: {:?}", data_dir);
        }

        let mut docs = Vec::new();

        for entry in WalkDir::new(data_dir)
            .min_depth(1)
            .max_depth(1)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            if !entry.file_type().is_dir() {
                continue;
            }

            let folder_name = entry.file_name().to_string_lossy().to_string();
            let folder_path = entry.path();

            self.collect_html(&folder_path.join("html"), &folder_name, &mut docs);
            self.collect_json(&folder_path.join("json"), &mut docs);
        }

        Ok(docs)
    }

    /// 폴더의 HTML 파일 수집 (doc_id = 폴더명)
    fn collect_html(&self, html_dir: &Path, folder_name: &str, docs: &mut Vec<CaselawDoc>) {
        for path in list_files_with_extension(html_dir, "html") {
            let raw = match std::fs::read_to_string(&path) {
                Ok(raw) => raw,
                Err(e) => {
                    tracing::warn!("Failed to read HTML file {:?}: {}", path, e);
                    continue;
                }
            };

            let text = html_to_text(&raw);
            if text.trim().is_empty() {
                tracing::warn!("Skipping HTML file with no text: {:?}", path);
                continue;
            }

            docs.push(CaselawDoc {
                doc_id: folder_name.to_string(),
                content: text,
                path,
            });
        }
    }

    /// 폴더의 JSON 파일 수집 (doc_id = 파일명)
    fn collect_json(&self, json_dir: &Path, docs: &mut Vec<CaselawDoc>) {
        for path in list_files_with_extension(json_dir, "json") {
            let raw = match std::fs::read_to_string(&path) {
                Ok(raw) => raw,
                Err(e) => {
                    tracing::warn!("Failed to read JSON file {:?}: {}", path, e);
                    continue;
                }
            };

            let value: Value = match serde_json::from_str(&raw) {
                Ok(value) => value,
                Err(e) => {
                    tracing::warn!("Skipping malformed JSON file {:?}: {}", path, e);
                    continue;
                }
            };

            let text = json_to_text(&value);
            if text.trim().is_empty() {
                tracing::warn!("Skipping JSON file with no content: {:?}", path);
                continue;
            }

            let file_name = path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();

            docs.push(CaselawDoc {
                doc_id: file_name,
                content: text,
                path,
            });
        }
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// 디렉토리에서 특정 확장자 파일 나열 (정렬된 순서)
fn list_files_with_extension(dir: &Path, extension: &str) -> Vec<PathBuf> {
    if !dir.is_dir() {
        return Vec::new();
    }

    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.path().to_path_buf())
        .filter(|p| {
            p.extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| ext.eq_ignore_ascii_case(extension))
                .unwrap_or(false)
        })
        .collect();

    files.sort();
    files
}

/// HTML 문서에서 텍스트 노드만 추출
fn html_to_text(html: &str) -> String {
    let document = Html::parse_document(html);
    document
        .root_element()
        .text()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// JSON 값에서 본문 텍스트 추출
///
/// 객체에 문자열 `content` 필드가 있으면 그 값을, 아니면 전체 값을
/// 문자열로 직렬화하여 사용합니다.
fn json_to_text(value: &Value) -> String {
    value
        .get("content")
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .unwrap_or_else(|| value.to_string())
}

// ============================================================================
// Tests
// ============================================================================
