//! 이미지 OCR 모듈
//!
//! 단일 이미지를 디코딩하고 전처리한 뒤 Tesseract로 텍스트를 인식합니다.
//! 스캔 문서용 신경망 경로와 달리 sparse text 페이지 분할 모드를
//! 사용하여 사진 속 흩어진 텍스트에 대응합니다.

use std::io::Cursor;

use anyhow::{Context, Result};
use image::{DynamicImage, GrayImage, ImageFormat};
use tesseract::{OcrEngineMode, PageSegMode, Tesseract};

use super::{preprocess, ExtractError};

/// OCR 언어
const OCR_LANG: &str = "eng";

/// 이미지 바이트에서 텍스트 추출
///
/// 디코딩 실패는 `Decode`, OCR 엔진 실패는 `Extraction`으로
/// 구분하여 반환합니다. 인식된 문자열은 트리밍하지 않습니다.
pub fn extract_text_from_image(bytes: &[u8], filename: &str) -> Result<String, ExtractError> {
    let img = image::load_from_memory(bytes).map_err(|_| ExtractError::Decode {
        filename: filename.to_string(),
    })?;

    let binary = preprocess::binarize_for_ocr(&img);

    let text = run_tesseract(binary).map_err(|e| ExtractError::Extraction {
        filename: filename.to_string(),
        reason: format!("{:#}", e),
    })?;

    if text.trim().is_empty() {
        tracing::warn!("No text extracted from image '{}'", filename);
    }
    Ok(text)
}

/// 이진화된 이미지에 Tesseract 실행
fn run_tesseract(binary: GrayImage) -> Result<String> {
    // Tesseract는 인코딩된 이미지 바이트를 입력으로 받는다
    let mut png = Vec::new();
    DynamicImage::ImageLuma8(binary)
        .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
        .context("Failed to encode preprocessed image")?;

    let mut tess = Tesseract::new_with_oem(
        None,
        Some(OCR_LANG),
        OcrEngineMode::TesseractLstmCombined,
    )
    .context("Failed to initialize Tesseract")?
    .set_image_from_mem(&png)
    .context("Failed to set OCR input image")?;

    tess.set_page_seg_mode(PageSegMode::PsmSparseText);

    let text = tess.get_text().context("Tesseract recognition failed")?;
    Ok(text)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_garbage_bytes_are_decode_error() {
        let result = extract_text_from_image(b"not an image at all", "corrupt.jpg");

        match result {
            Err(ExtractError::Decode { filename }) => assert_eq!(filename, "corrupt.jpg"),
            other => panic!("expected decode error, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_empty_bytes_are_decode_error() {
        assert!(matches!(
            extract_text_from_image(&[], "empty.png"),
            Err(ExtractError::Decode { .. })
        ));
    }
}
