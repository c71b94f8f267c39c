//! CLI 모듈
//!
//! lexrag CLI 명령어 정의 및 구현

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use crate::collector::CaselawCollector;
use crate::config::Settings;
use crate::extractor::DocumentExtractor;
use crate::generator::{Answer, AnswerProvider, OllamaGenerator};
use crate::search::{SearchClient, CASELAW_INDEX, LEGAL_DOCS_INDEX};

// ============================================================================
// CLI Definition
// ============================================================================

#[derive(Parser)]
#[command(name = "lexrag")]
#[command(version, about = "법률 문서 OCR + RAG 분석 시스템", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// 문서 업로드 (OCR 후 최신 문서로 색인)
    Upload {
        /// 업로드할 파일 (PDF 또는 이미지)
        file: PathBuf,
    },

    /// 최신 업로드 문서 기반 질의응답
    Query {
        /// 질의 내용
        query: String,
    },

    /// 판례 데이터 폴더를 대량 색인
    IngestCaselaw {
        /// 판례 데이터 폴더
        #[arg(short, long, default_value = "data")]
        dir: PathBuf,
    },

    /// 판례 검색 기반 질의응답
    Ask {
        /// 질의 내용
        query: String,

        /// 검색할 문서 수
        #[arg(short, long, default_value = "3")]
        limit: usize,
    },

    /// 판례 인덱스 비우기
    ClearCaselaw,

    /// 외부 시스템 상태 확인
    Status,
}

// ============================================================================
// CLI Runner
// ============================================================================

/// CLI 명령어 실행
pub async fn run(cli: Cli) -> Result<()> {
    let settings = Settings::from_env();

    match cli.command {
        Commands::Upload { file } => cmd_upload(&settings, &file).await,
        Commands::Query { query } => cmd_query(&settings, &query).await,
        Commands::IngestCaselaw { dir } => cmd_ingest_caselaw(&settings, &dir).await,
        Commands::Ask { query, limit } => cmd_ask(&settings, &query, limit).await,
        Commands::ClearCaselaw => cmd_clear_caselaw(&settings).await,
        Commands::Status => cmd_status(&settings).await,
    }
}

// ============================================================================
// Command Implementations
// ============================================================================

/// 문서 업로드 명령어 (upload)
///
/// 파일에서 텍스트를 추출하여 `legal_docs`의 유일한 문서로 색인합니다.
async fn cmd_upload(settings: &Settings, file: &Path) -> Result<()> {
    let filename = file
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("unknown")
        .to_string();

    let bytes = tokio::fs::read(file)
        .await
        .with_context(|| format!("파일을 읽을 수 없습니다: {:?}", file))?;

    println!("[*] 텍스트 추출 중: {}", filename);

    let extractor = DocumentExtractor::new();
    let text = extractor
        .extract(bytes, &filename)
        .await
        .context("텍스트 추출 실패")?;

    // 추출 실패(에러)와 달리, 빈 텍스트는 색인 없이 보고만 한다
    if text.trim().is_empty() {
        println!("[!] 추출된 텍스트가 없습니다: {}", filename);
        return Ok(());
    }

    let client = SearchClient::new(settings).context("SearchClient 생성 실패")?;
    let doc_id = client
        .replace_latest(&text)
        .await
        .context("문서 색인 실패")?;

    println!("[OK] 문서가 색인되었습니다 (ID: {})", doc_id);
    println!("     추출된 텍스트: {} 자", text.chars().count());

    Ok(())
}

/// 최신 문서 질의 명령어 (query)
///
/// `legal_docs`에서 가장 최근 문서를 찾아 컨텍스트로 답변을 생성합니다.
async fn cmd_query(settings: &Settings, query: &str) -> Result<()> {
    let client = SearchClient::new(settings).context("SearchClient 생성 실패")?;

    println!("[*] 검색 중: \"{}\"", query);

    let hits = client.search_latest(query).await.context("검색 실패")?;

    if hits.is_empty() {
        println!("[!] 관련 문서가 없습니다.");
        return Ok(());
    }

    let context_blocks: Vec<String> = hits.into_iter().map(|h| h.content).collect();
    answer_and_print(settings, query, &context_blocks).await
}

/// 판례 대량 색인 명령어 (ingest-caselaw)
async fn cmd_ingest_caselaw(settings: &Settings, dir: &Path) -> Result<()> {
    let client = SearchClient::new(settings).context("SearchClient 생성 실패")?;
    client
        .ensure_caselaw_index()
        .await
        .context("판례 인덱스 생성 실패")?;

    let docs = CaselawCollector::new()
        .collect(dir)
        .context("판례 데이터 수집 실패")?;

    if docs.is_empty() {
        println!("[!] 수집할 문서가 없습니다: {:?}", dir);
        return Ok(());
    }

    println!("[*] 수집 대상: {} 건", docs.len());

    let mut indexed = 0usize;
    let mut skipped = 0usize;

    for doc in &docs {
        match client.upsert_caselaw(&doc.doc_id, &doc.content).await {
            Ok(_) => indexed += 1,
            Err(e) => {
                // 파일 하나의 실패가 배치 전체를 중단시키지 않는다
                tracing::warn!("Failed to index '{}' ({:?}): {}", doc.doc_id, doc.path, e);
                skipped += 1;
            }
        }
    }

    println!("[OK] 색인 완료: 성공 {}, 건너뜀 {}", indexed, skipped);

    Ok(())
}

/// 판례 질의 명령어 (ask)
///
/// `caselaw_index`에서 상위 매칭 문서를 찾아 하나의 컨텍스트로 묶어
/// 답변을 생성합니다.
async fn cmd_ask(settings: &Settings, query: &str, limit: usize) -> Result<()> {
    let client = SearchClient::new(settings).context("SearchClient 생성 실패")?;

    println!("[*] 판례 검색 중: \"{}\"", query);

    let hits = client
        .search_caselaw(query, limit)
        .await
        .context("판례 검색 실패")?;

    if hits.is_empty() {
        println!("[!] 관련 판례가 없습니다.");
        return Ok(());
    }

    println!("[OK] 판례 {} 건 검색됨:", hits.len());
    for hit in &hits {
        println!("    - {}", hit.doc_id);
    }

    // 검색된 판례들을 하나의 컨텍스트 블록으로 결합
    let combined = hits
        .iter()
        .map(|h| h.content.as_str())
        .collect::<Vec<_>>()
        .join("\n");

    answer_and_print(settings, query, &[combined]).await
}

/// 판례 인덱스 비우기 명령어 (clear-caselaw)
async fn cmd_clear_caselaw(settings: &Settings) -> Result<()> {
    let client = SearchClient::new(settings).context("SearchClient 생성 실패")?;
    let deleted = client
        .clear_caselaw()
        .await
        .context("판례 인덱스 비우기 실패")?;

    println!("[OK] 판례 {} 건이 삭제되었습니다.", deleted);
    Ok(())
}

/// 상태 확인 명령어 (status)
async fn cmd_status(settings: &Settings) -> Result<()> {
    println!("lexrag 상태");
    println!("  Elasticsearch: {}", settings.elasticsearch_host);

    let client = SearchClient::new(settings).context("SearchClient 생성 실패")?;
    match client.ping().await {
        Ok(()) => {
            println!("    연결: OK");
            for index in [LEGAL_DOCS_INDEX, CASELAW_INDEX] {
                match client.count(index).await {
                    Ok(count) => println!("    {}: {} 건", index, count),
                    Err(e) => println!("    {}: 조회 실패 ({})", index, e),
                }
            }
        }
        Err(e) => println!("    연결 실패: {}", e),
    }

    println!(
        "  Ollama: {} (모델: {})",
        settings.ollama_host, settings.ollama_model
    );

    Ok(())
}

// ============================================================================
// Helper Functions
// ============================================================================

/// 답변 생성 후 출력
async fn answer_and_print(settings: &Settings, query: &str, context_blocks: &[String]) -> Result<()> {
    let generator = OllamaGenerator::new(settings).context("생성기 초기화 실패")?;

    println!("[*] 답변 생성 중 (모델: {})...", generator.model());

    match generator.answer(query, context_blocks).await {
        Answer::Generated(text) => {
            println!("\n=== 답변 ===");
            println!("{}", text);
        }
        Answer::Failed { attempts, reason } => {
            println!("\n[!] 답변 생성 실패 ({} 회 시도): {}", attempts, reason);
        }
    }

    Ok(())
}
