//! 灰度图上的基础卷积工具（BORDER_REFLECT_101 边界）

use image::GrayImage;

/// 归一化的一维高斯核，长度 size（奇数）
pub fn gaussian_kernel(size: usize, sigma: f64) -> Vec<f64> {
    let radius = (size / 2) as isize;
    let weights: Vec<f64> = (-radius..=radius)
        .map(|i| (-((i * i) as f64) / (2.0 * sigma * sigma)).exp())
        .collect();
    let sum: f64 = weights.iter().sum();
    weights.into_iter().map(|w| w / sum).collect()
}

/// 边界镜像（不重复边缘像素）：-1 -> 1, n -> n-2
pub fn reflect101(index: isize, len: usize) -> usize {
    if len <= 1 {
        return 0;
    }
    let last = len as isize - 1;
    let mut i = index;
    while i < 0 || i > last {
        i = if i < 0 { -i } else { 2 * last - i };
    }
    i as usize
}

/// 可分离卷积：先水平后垂直
pub fn blur_separable(data: &[f64], width: usize, height: usize, kernel: &[f64]) -> Vec<f64> {
    let radius = (kernel.len() / 2) as isize;
    let mut horizontal = vec![0.0; data.len()];

    for y in 0..height {
        let row = &data[y * width..(y + 1) * width];
        for x in 0..width {
            horizontal[y * width + x] = kernel
                .iter()
                .enumerate()
                .map(|(k, w)| w * row[reflect101(x as isize + k as isize - radius, width)])
                .sum();
        }
    }

    let mut out = vec![0.0; data.len()];
    for y in 0..height {
        for x in 0..width {
            out[y * width + x] = kernel
                .iter()
                .enumerate()
                .map(|(k, w)| {
                    w * horizontal[reflect101(y as isize + k as isize - radius, height) * width + x]
                })
                .sum();
        }
    }
    out
}

pub fn to_f64(gray: &GrayImage, scale: f64) -> Vec<f64> {
    gray.as_raw().iter().map(|&v| v as f64 * scale).collect()
}

/// 总体均值与标准差（ddof = 0）
pub fn mean_std(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    (mean, variance.sqrt())
}
