//! 문서 OCR 추출 모듈
//!
//! 업로드된 파일 바이트에서 텍스트를 추출합니다.
//! - PDF: pdfium으로 페이지별 400 DPI 렌더링 후 ocrs 신경망 OCR
//! - 이미지: 전처리(그레이스케일 + 적응 이진화) 후 Tesseract OCR
//!
//! 두 경로는 서로 다른 입력 형태에 최적화된 별개의 엔진을 사용하며,
//! 하나의 OCR 호출로 통합하지 않습니다.

pub mod image;
pub mod pdf;
pub mod preprocess;

use std::path::Path;

use thiserror::Error;

// ============================================================================
// Errors
// ============================================================================

/// 추출 에러
///
/// 빈 텍스트는 에러가 아닙니다. 호출자는 "추출 실패"와
/// "추출된 텍스트 없음"을 다르게 처리합니다.
#[derive(Debug, Error)]
pub enum ExtractError {
    /// 이미지 바이트 디코딩 실패
    #[error("unsupported or corrupted image file '{filename}'")]
    Decode { filename: String },

    /// OCR 엔진 또는 문서 디코딩 실패
    #[error("failed to extract text from '{filename}': {reason}")]
    Extraction { filename: String, reason: String },
}

// ============================================================================
// Document Extractor
// ============================================================================

/// 문서 OCR 추출기
///
/// 파일 확장자에 따라 PDF 경로와 이미지 경로로 분기합니다.
/// OCR은 CPU 바운드이므로 blocking 스레드 풀에서 실행됩니다.
#[derive(Debug, Default)]
pub struct DocumentExtractor;

impl DocumentExtractor {
    /// 새 추출기 생성
    pub fn new() -> Self {
        Self
    }

    /// 파일 바이트에서 텍스트 추출
    ///
    /// # Arguments
    /// * `bytes` - 원본 파일 바이트
    /// * `filename` - 확장자 판별 및 로그용 파일명
    pub async fn extract(&self, bytes: Vec<u8>, filename: &str) -> Result<String, ExtractError> {
        let name = filename.to_string();

        let result = if is_pdf_filename(filename) {
            tokio::task::spawn_blocking(move || pdf::extract_text_from_pdf(&bytes, &name)).await
        } else {
            tokio::task::spawn_blocking(move || image::extract_text_from_image(&bytes, &name)).await
        };

        match result {
            Ok(inner) => inner,
            Err(e) => Err(ExtractError::Extraction {
                filename: filename.to_string(),
                reason: format!("OCR task failed: {}", e),
            }),
        }
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// PDF 파일명 여부 (확장자 대소문자 무시)
fn is_pdf_filename(filename: &str) -> bool {
    Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("pdf"))
        .unwrap_or(false)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_pdf_filename() {
        assert!(is_pdf_filename("scan.pdf"));
        assert!(is_pdf_filename("SCAN.PDF"));
        assert!(is_pdf_filename("dir/judgment.Pdf"));
        assert!(!is_pdf_filename("scan.png"));
        assert!(!is_pdf_filename("pdf"));
        assert!(!is_pdf_filename(""));
    }

    #[tokio::test]
    async fn test_extract_garbage_image_is_decode_error() {
        let extractor = DocumentExtractor::new();
        let result = extractor.extract(vec![0u8, 1, 2, 3], "broken.png").await;

        match result {
            Err(ExtractError::Decode { filename }) => assert_eq!(filename, "broken.png"),
            other => panic!("expected decode error, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_extract_error_messages_carry_filename() {
        let decode = ExtractError::Decode {
            filename: "a.png".to_string(),
        };
        assert!(decode.to_string().contains("a.png"));

        let extraction = ExtractError::Extraction {
            filename: "b.pdf".to_string(),
            reason: "engine down".to_string(),
        };
        let msg = extraction.to_string();
        assert!(msg.contains("b.pdf"));
        assert!(msg.contains("engine down"));
    }
}
