//! lexrag - 법률 문서 OCR + RAG 분석 시스템
//!
//! 업로드된 문서(PDF/이미지)를 OCR로 텍스트화하여 Elasticsearch에
//! 색인하고, 자연어 질의에 대해 검색된 문서를 컨텍스트로
//! 로컬 Ollama LLM에 전달하는 오케스트레이션 레이어입니다.

pub mod cli;
pub mod collector;
pub mod config;
pub mod extractor;
pub mod generator;
pub mod search;

// Re-exports
pub use collector::{CaselawCollector, CaselawDoc};
pub use config::Settings;
pub use extractor::{DocumentExtractor, ExtractError};
pub use generator::{Answer, AnswerProvider, OllamaGenerator};
pub use search::{IndexError, RetrievalError, SearchClient, SearchHit};
