//! 单帧质量指标：清晰度 / 局部对比质量 / 亮度，均归一化到 [0,1]

use crate::core::filters::{blur_separable, gaussian_kernel, mean_std, reflect101, to_f64};
use crate::core::video::Frame;
use image::GrayImage;
use once_cell::sync::Lazy;
use rayon::prelude::*;
use serde::Serialize;

/// Laplacian 方差的固定归一化常数（跨数据集可比，不做自适应）
pub const SHARPNESS_NORMALIZATION: f64 = 1000.0;

/// 7x7, sigma = 1.5 的局部统计窗口
static LOCAL_WINDOW: Lazy<Vec<f64>> = Lazy::new(|| gaussian_kernel(7, 1.5));

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct QualityRecord {
    pub sharpness: f64,
    pub local_quality: f64,
    pub brightness: f64,
}

impl QualityRecord {
    /// 终局奖励使用的单帧质量：sharpness + local_quality
    pub fn combined(&self) -> f64 {
        self.sharpness + self.local_quality
    }
}

/// Laplacian 方差 / 1000，截断到 1.0
pub fn sharpness(gray: &GrayImage) -> f64 {
    let (w, h) = (gray.width() as usize, gray.height() as usize);
    if w < 3 || h < 3 {
        return 0.0;
    }
    let data = gray.as_raw();
    let at = |x: isize, y: isize| data[reflect101(y, h) * w + reflect101(x, w)] as f64;

    // [0 1 0; 1 -4 1; 0 1 0]
    let mut values = Vec::with_capacity(w * h);
    for y in 0..h as isize {
        for x in 0..w as isize {
            let lap = at(x, y - 1) + at(x, y + 1) + at(x - 1, y) + at(x + 1, y) - 4.0 * at(x, y);
            values.push(lap);
        }
    }

    let (_, std) = mean_std(&values);
    (std * std / SHARPNESS_NORMALIZATION).min(1.0)
}

/// 简化 BRISQUE：局部标准差图的离散程度越小，质量越高
pub fn local_quality(gray: &GrayImage) -> f64 {
    let (w, h) = (gray.width() as usize, gray.height() as usize);
    if w == 0 || h == 0 {
        return 0.0;
    }
    let normalized = to_f64(gray, 1.0 / 255.0);
    let squared: Vec<f64> = normalized.iter().map(|v| v * v).collect();

    let mu = blur_separable(&normalized, w, h, &LOCAL_WINDOW);
    let mu_sq = blur_separable(&squared, w, h, &LOCAL_WINDOW);

    let sigma: Vec<f64> = mu
        .iter()
        .zip(mu_sq.iter())
        .map(|(m, m2)| (m2 - m * m).abs().sqrt())
        .collect();

    let (_, spread) = mean_std(&sigma);
    1.0 / (1.0 + spread)
}

pub fn brightness(gray: &GrayImage) -> f64 {
    let raw = gray.as_raw();
    if raw.is_empty() {
        return 0.0;
    }
    let sum: u64 = raw.iter().map(|&v| v as u64).sum();
    sum as f64 / raw.len() as f64 / 255.0
}

pub fn score_frame(frame: &Frame) -> QualityRecord {
    let gray = frame.to_gray();
    QualityRecord {
        sharpness: sharpness(&gray),
        local_quality: local_quality(&gray),
        brightness: brightness(&gray),
    }
}

/// 并行打分，输出顺序与输入一致
pub fn score_frames(frames: &[Frame]) -> Vec<QualityRecord> {
    frames.par_iter().map(score_frame).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    fn uniform(value: u8) -> GrayImage {
        GrayImage::from_pixel(32, 32, Luma([value]))
    }

    fn checkerboard(cell: u32) -> GrayImage {
        GrayImage::from_fn(32, 32, |x, y| {
            if (x / cell + y / cell) % 2 == 0 {
                Luma([0])
            } else {
                Luma([255])
            }
        })
    }

    #[test]
    fn test_uniform_frame_scores() {
        let gray = uniform(128);
        assert_eq!(sharpness(&gray), 0.0);
        assert!((local_quality(&gray) - 1.0).abs() < 1e-6);
        assert!((brightness(&gray) - 128.0 / 255.0).abs() < 1e-12);
    }

    #[test]
    fn test_sharp_frame_saturates() {
        let gray = checkerboard(1);
        assert_eq!(sharpness(&gray), 1.0);
    }

    #[test]
    fn test_blurred_frame_less_sharp() {
        let sharp = checkerboard(4);
        let blurred = image::imageops::blur(&sharp, 2.0);
        assert!(sharpness(&blurred) < sharpness(&sharp));
    }

    #[test]
    fn test_local_quality_in_unit_range() {
        for gray in [uniform(0), uniform(255), checkerboard(1), checkerboard(5)] {
            let q = local_quality(&gray);
            assert!(q > 0.0 && q <= 1.0);
        }
        assert!(local_quality(&checkerboard(5)) < local_quality(&uniform(40)));
    }

    #[test]
    fn test_tiny_frame_has_zero_sharpness() {
        let gray = GrayImage::from_pixel(2, 2, Luma([10]));
        assert_eq!(sharpness(&gray), 0.0);
    }

    #[test]
    fn test_score_frames_preserves_order() {
        let frames: Vec<Frame> = [0u8, 100, 200]
            .iter()
            .enumerate()
            .map(|(i, &v)| Frame::from_gray(16, 16, &[v; 256], i as u64).unwrap())
            .collect();
        let records = score_frames(&frames);
        assert_eq!(records.len(), 3);
        assert!(records[0].brightness < records[1].brightness);
        assert!(records[1].brightness < records[2].brightness);
    }
}
