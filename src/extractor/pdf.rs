//! PDF OCR 모듈
//!
//! 스캔 문서를 다루므로 내장 텍스트 추출 대신 페이지를 래스터로
//! 렌더링한 뒤 OCR을 돌립니다. pdfium으로 각 페이지를 400 DPI로
//! 렌더링하고 ocrs 신경망 엔진(감지 + 인식)으로 텍스트를 읽습니다.

use std::path::PathBuf;

use anyhow::Result;
use image::RgbImage;
use ocrs::{ImageSource, OcrEngine, OcrEngineParams};
use pdfium_render::prelude::*;
use rten::Model;

use super::ExtractError;

/// 렌더링 해상도 (DPI)
const RENDER_DPI: f32 = 400.0;
/// PDF 좌표계 기준 해상도
const PDF_POINTS_PER_INCH: f32 = 72.0;

/// 텍스트 감지 모델 파일명
const DETECTION_MODEL: &str = "text-detection.rten";
/// 텍스트 인식 모델 파일명
const RECOGNITION_MODEL: &str = "text-recognition.rten";

/// PDF 바이트에서 텍스트 추출
///
/// 페이지 순서를 유지하며 페이지별 텍스트를 개행으로 연결합니다.
/// 개별 페이지의 OCR 실패는 경고 후 빈 세그먼트로 계속 진행하고,
/// 문서 자체를 열 수 없으면 에러를 반환합니다.
pub fn extract_text_from_pdf(bytes: &[u8], filename: &str) -> Result<String, ExtractError> {
    run_document_ocr(bytes, filename).map_err(|e| ExtractError::Extraction {
        filename: filename.to_string(),
        reason: format!("{:#}", e),
    })
}

fn run_document_ocr(bytes: &[u8], filename: &str) -> Result<String> {
    let engine = create_engine()?;

    let pdfium = Pdfium::new(
        Pdfium::bind_to_system_library()
            .map_err(|e| anyhow::anyhow!("Failed to bind pdfium library: {:?}", e))?,
    );
    let document = pdfium
        .load_pdf_from_byte_slice(bytes, None)
        .map_err(|e| anyhow::anyhow!("Failed to load PDF '{}': {:?}", filename, e))?;

    let render_config =
        PdfRenderConfig::new().scale_page_by_factor(RENDER_DPI / PDF_POINTS_PER_INCH);

    let mut pages = Vec::new();
    for (index, page) in document.pages().iter().enumerate() {
        let text = match render_and_recognize(&engine, &page, &render_config) {
            Ok(text) => text,
            Err(e) => {
                // 페이지 하나의 실패가 문서 전체를 버리게 하지 않는다
                tracing::warn!(
                    "OCR failed on page {} of '{}': {:#}",
                    index + 1,
                    filename,
                    e
                );
                String::new()
            }
        };
        tracing::info!("Processed page {} of PDF '{}'", index + 1, filename);
        pages.push(text);
    }

    let all_text = join_pages(&pages);
    if all_text.trim().is_empty() {
        tracing::warn!("No text extracted from PDF '{}'", filename);
    }
    Ok(all_text)
}

/// 페이지 하나를 렌더링하고 텍스트 인식
fn render_and_recognize(
    engine: &OcrEngine,
    page: &PdfPage,
    config: &PdfRenderConfig,
) -> Result<String> {
    let bitmap = page
        .render_with_config(config)
        .map_err(|e| anyhow::anyhow!("Failed to render page: {:?}", e))?;
    let image = bitmap.as_image().into_rgb8();
    recognize_page(engine, &image)
}

/// 렌더링된 페이지 이미지에서 텍스트 인식
fn recognize_page(engine: &OcrEngine, image: &RgbImage) -> Result<String> {
    let source = ImageSource::from_bytes(image.as_raw(), image.dimensions())
        .map_err(|e| anyhow::anyhow!("Failed to build OCR input: {}", e))?;
    let input = engine
        .prepare_input(source)
        .map_err(|e| anyhow::anyhow!("Failed to prepare OCR input: {}", e))?;

    let words = engine
        .detect_words(&input)
        .map_err(|e| anyhow::anyhow!("Text detection failed: {}", e))?;
    let lines = engine.find_text_lines(&input, &words);
    let recognized = engine
        .get_text_lines(&input, &lines)
        .map_err(|e| anyhow::anyhow!("Text recognition failed: {}", e))?;

    let line_texts: Vec<String> = recognized
        .iter()
        .map(|line| line.to_string())
        .filter(|line| !line.trim().is_empty())
        .collect();

    Ok(collapse_lines(&line_texts))
}

// ============================================================================
// OCR Engine
// ============================================================================

/// ocrs 모델 디렉토리
///
/// `OCRS_MODELS_DIR` 환경변수가 있으면 우선하고, 없으면 캐시 디렉토리를
/// 사용합니다 (ocrs CLI의 기본 다운로드 위치와 동일).
fn models_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("OCRS_MODELS_DIR") {
        if !dir.is_empty() {
            return PathBuf::from(dir);
        }
    }

    dirs::cache_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join("ocrs")
}

/// 신경망 OCR 엔진 초기화
fn create_engine() -> Result<OcrEngine> {
    let dir = models_dir();
    let detection_path = dir.join(DETECTION_MODEL);
    let recognition_path = dir.join(RECOGNITION_MODEL);

    if !detection_path.exists() || !recognition_path.exists() {
        anyhow::bail!(
            "OCR models not found in {:?}. Download {} and {} from \
             https://github.com/robertknight/ocrs-models or set OCRS_MODELS_DIR",
            dir,
            DETECTION_MODEL,
            RECOGNITION_MODEL
        );
    }

    let detection_model = Model::load_file(&detection_path)
        .map_err(|e| anyhow::anyhow!("Failed to load text detection model: {}", e))?;
    let recognition_model = Model::load_file(&recognition_path)
        .map_err(|e| anyhow::anyhow!("Failed to load text recognition model: {}", e))?;

    OcrEngine::new(OcrEngineParams {
        detection_model: Some(detection_model),
        recognition_model: Some(recognition_model),
        ..Default::default()
    })
    .map_err(|e| anyhow::anyhow!("Failed to initialize OCR engine: {}", e))
}

// ============================================================================
// Helper Functions
// ============================================================================

/// 페이지 내 인식된 줄들을 하나의 세그먼트로 연결
///
/// 페이지 세그먼트 자체에는 개행이 들어가지 않습니다. 개행은
/// 페이지 경계에만 사용됩니다.
fn collapse_lines(lines: &[String]) -> String {
    lines.join(" ")
}

/// 페이지별 텍스트를 페이지 순서대로 개행으로 연결
fn join_pages(pages: &[String]) -> String {
    pages.join("\n")
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_pages_preserves_count_and_order() {
        let pages = vec![
            "first page".to_string(),
            "second page".to_string(),
            "third page".to_string(),
        ];
        let joined = join_pages(&pages);

        let segments: Vec<&str> = joined.split('\n').collect();
        assert_eq!(segments.len(), 3);
        assert_eq!(segments[0], "first page");
        assert_eq!(segments[2], "third page");
    }

    #[test]
    fn test_join_pages_keeps_empty_segments() {
        // 인식에 실패한 페이지도 자리를 지켜야 한다
        let pages = vec!["a".to_string(), String::new(), "c".to_string()];
        let joined = join_pages(&pages);

        assert_eq!(joined.split('\n').count(), 3);
        assert_eq!(joined, "a\n\nc");
    }

    #[test]
    fn test_join_pages_empty_document() {
        assert_eq!(join_pages(&[]), "");
    }

    #[test]
    fn test_collapse_lines_introduces_no_newlines() {
        let lines = vec![
            "CASE NO. 123".to_string(),
            "IN THE SUPREME COURT".to_string(),
        ];
        let collapsed = collapse_lines(&lines);

        assert!(!collapsed.contains('\n'));
        assert_eq!(collapsed, "CASE NO. 123 IN THE SUPREME COURT");
    }

    #[test]
    fn test_models_dir_env_override() {
        std::env::set_var("OCRS_MODELS_DIR", "/tmp/lexrag-models");
        assert_eq!(models_dir(), PathBuf::from("/tmp/lexrag-models"));
        std::env::remove_var("OCRS_MODELS_DIR");
    }
}
