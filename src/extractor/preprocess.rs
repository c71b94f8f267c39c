//! 이미지 전처리 모듈
//!
//! OCR 전에 이미지를 그레이스케일로 변환하고 적응 이진화를 적용합니다.
//! 지역 가우시안 평균 기반 임계값이라 조명이 고르지 않아도 견딥니다.

use image::{DynamicImage, GrayImage, Luma};
use imageproc::filter::gaussian_blur_f32;

/// 적응 임계값 윈도우 크기 (픽셀)
const BLOCK_SIZE: u32 = 11;
/// 지역 평균에서 빼는 상수 오프셋
const OFFSET: i16 = 2;

/// OCR용 이진 이미지 생성
///
/// 각 픽셀을 가우시안 가중 지역 평균과 비교하여 0 또는 255로
/// 이진화한 단일 채널 이미지를 반환합니다.
pub fn binarize_for_ocr(img: &DynamicImage) -> GrayImage {
    let gray = img.to_luma8();

    // 윈도우 크기에서 시그마 유도 (OpenCV getGaussianKernel과 동일한 식)
    let sigma = 0.3 * ((BLOCK_SIZE - 1) as f32 * 0.5 - 1.0) + 0.8;
    let local_mean = gaussian_blur_f32(&gray, sigma);

    let (width, height) = gray.dimensions();
    let mut binary = GrayImage::new(width, height);

    for (x, y, pixel) in gray.enumerate_pixels() {
        let mean = local_mean.get_pixel(x, y)[0] as i16;
        let value = if (pixel[0] as i16) > mean - OFFSET {
            255
        } else {
            0
        };
        binary.put_pixel(x, y, Luma([value]));
    }

    binary
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;

    /// 좌우로 밝기가 달라지는 합성 이미지
    fn gradient_image(width: u32, height: u32) -> DynamicImage {
        let img = RgbImage::from_fn(width, height, |x, _y| {
            let level = (x * 255 / width.max(1)) as u8;
            image::Rgb([level, level, level])
        });
        DynamicImage::ImageRgb8(img)
    }

    #[test]
    fn test_output_is_binary_valued() {
        let binary = binarize_for_ocr(&gradient_image(64, 32));

        for pixel in binary.pixels() {
            assert!(
                pixel[0] == 0 || pixel[0] == 255,
                "non-binary pixel value: {}",
                pixel[0]
            );
        }
    }

    #[test]
    fn test_output_preserves_dimensions() {
        let binary = binarize_for_ocr(&gradient_image(40, 25));
        assert_eq!(binary.dimensions(), (40, 25));
    }

    #[test]
    fn test_uniform_image_becomes_white() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(16, 16, image::Rgb([128, 128, 128])));
        let binary = binarize_for_ocr(&img);

        // 균일한 영역은 지역 평균과 같으므로 임계값(평균 - 오프셋)을 넘는다
        assert!(binary.pixels().all(|p| p[0] == 255));
    }
}
