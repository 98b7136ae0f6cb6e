//! 多尺度 Harris 角点 + 128 维梯度方向直方图描述子

use crate::core::filters::{blur_separable, gaussian_kernel, reflect101, to_f64};
use image::GrayImage;
use once_cell::sync::Lazy;

pub const DESCRIPTOR_LEN: usize = 128;

pub type Descriptor = [f32; DESCRIPTOR_LEN];

const HARRIS_K: f64 = 0.04;
/// 相对最大响应的阈值
const RESPONSE_THRESHOLD: f64 = 0.01;
/// 16x16 描述子窗口的半径
const PATCH_RADIUS: usize = 8;
const CELLS: usize = 4;
const ORIENTATION_BINS: usize = 8;
/// 单个分量截断，降低光照变化影响
const COMPONENT_CLAMP: f32 = 0.2;

static PRESMOOTH: Lazy<Vec<f64>> = Lazy::new(|| gaussian_kernel(5, 1.0));
static TENSOR_WINDOW: Lazy<Vec<f64>> = Lazy::new(|| gaussian_kernel(7, 1.5));

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Keypoint {
    /// 原图坐标
    pub x: f32,
    pub y: f32,
    pub octave: u8,
    pub response: f64,
}

#[derive(Debug, Clone, Default)]
pub struct Features {
    pub keypoints: Vec<Keypoint>,
    pub descriptors: Vec<Descriptor>,
}

impl Features {
    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}

struct Octave {
    width: usize,
    height: usize,
    gx: Vec<f64>,
    gy: Vec<f64>,
}

#[derive(Debug, Clone, Copy)]
struct Candidate {
    octave: usize,
    x: usize,
    y: usize,
    response: f64,
}

#[derive(Debug, Clone)]
pub struct FeatureDetector {
    max_features: usize,
    octaves: usize,
}

impl FeatureDetector {
    pub fn new(max_features: usize, octaves: usize) -> Self {
        Self {
            max_features,
            octaves: octaves.max(1),
        }
    }

    /// 检测角点并计算描述子；纹理不足的图片返回空集合
    pub fn detect_and_compute(&self, gray: &GrayImage) -> Features {
        let (w, h) = (gray.width() as usize, gray.height() as usize);
        let min_side = 2 * PATCH_RADIUS + 1;
        if w < min_side || h < min_side {
            return Features::default();
        }

        let mut octaves = Vec::with_capacity(self.octaves);
        let mut candidates = Vec::new();
        let mut level = blur_separable(&to_f64(gray, 1.0), w, h, &PRESMOOTH);
        let (mut lw, mut lh) = (w, h);

        for index in 0..self.octaves {
            if lw < min_side || lh < min_side {
                break;
            }
            let (gx, gy) = gradients(&level, lw, lh);
            let response = harris_response(&gx, &gy, lw, lh);
            candidates.extend(local_maxima(&response, lw, lh, index));
            octaves.push(Octave {
                width: lw,
                height: lh,
                gx,
                gy,
            });

            let (next, nw, nh) = downsample(&level, lw, lh);
            level = blur_separable(&next, nw, nh, &PRESMOOTH);
            lw = nw;
            lh = nh;
        }

        // 响应降序，坐标作为稳定的次序
        candidates.sort_by(|a, b| {
            b.response
                .total_cmp(&a.response)
                .then(a.octave.cmp(&b.octave))
                .then(a.y.cmp(&b.y))
                .then(a.x.cmp(&b.x))
        });
        candidates.truncate(self.max_features);

        let mut features = Features::default();
        for c in candidates {
            let Some(descriptor) = describe(&octaves[c.octave], c.x, c.y) else {
                continue;
            };
            let scale = (1usize << c.octave) as f32;
            features.keypoints.push(Keypoint {
                x: c.x as f32 * scale,
                y: c.y as f32 * scale,
                octave: c.octave as u8,
                response: c.response,
            });
            features.descriptors.push(descriptor);
        }
        features
    }
}

fn gradients(data: &[f64], w: usize, h: usize) -> (Vec<f64>, Vec<f64>) {
    let mut gx = vec![0.0; data.len()];
    let mut gy = vec![0.0; data.len()];
    for y in 0..h {
        for x in 0..w {
            let (xi, yi) = (x as isize, y as isize);
            let left = data[y * w + reflect101(xi - 1, w)];
            let right = data[y * w + reflect101(xi + 1, w)];
            let up = data[reflect101(yi - 1, h) * w + x];
            let down = data[reflect101(yi + 1, h) * w + x];
            gx[y * w + x] = (right - left) * 0.5;
            gy[y * w + x] = (down - up) * 0.5;
        }
    }
    (gx, gy)
}

/// det(M) - k * trace(M)^2
fn harris_response(gx: &[f64], gy: &[f64], w: usize, h: usize) -> Vec<f64> {
    let ixx: Vec<f64> = gx.iter().map(|v| v * v).collect();
    let iyy: Vec<f64> = gy.iter().map(|v| v * v).collect();
    let ixy: Vec<f64> = gx.iter().zip(gy).map(|(a, b)| a * b).collect();

    let sxx = blur_separable(&ixx, w, h, &TENSOR_WINDOW);
    let syy = blur_separable(&iyy, w, h, &TENSOR_WINDOW);
    let sxy = blur_separable(&ixy, w, h, &TENSOR_WINDOW);

    (0..w * h)
        .map(|i| {
            let trace = sxx[i] + syy[i];
            sxx[i] * syy[i] - sxy[i] * sxy[i] - HARRIS_K * trace * trace
        })
        .collect()
}

/// 3x3 严格极大值，且离边界足够放下描述子窗口
fn local_maxima(response: &[f64], w: usize, h: usize, octave: usize) -> Vec<Candidate> {
    let peak = response.iter().cloned().fold(0.0_f64, f64::max);
    if peak <= 0.0 {
        return Vec::new();
    }
    let threshold = peak * RESPONSE_THRESHOLD;

    let mut out = Vec::new();
    for y in PATCH_RADIUS..h - PATCH_RADIUS {
        for x in PATCH_RADIUS..w - PATCH_RADIUS {
            let r = response[y * w + x];
            if r <= threshold {
                continue;
            }
            let is_peak = (y - 1..=y + 1).all(|ny| {
                (x - 1..=x + 1).all(|nx| (nx == x && ny == y) || response[ny * w + nx] < r)
            });
            if is_peak {
                out.push(Candidate {
                    octave,
                    x,
                    y,
                    response: r,
                });
            }
        }
    }
    out
}

/// 2x2 平均降采样
fn downsample(data: &[f64], w: usize, h: usize) -> (Vec<f64>, usize, usize) {
    let (nw, nh) = (w / 2, h / 2);
    let mut out = Vec::with_capacity(nw * nh);
    for y in 0..nh {
        for x in 0..nw {
            let (sx, sy) = (2 * x, 2 * y);
            let sum = data[sy * w + sx]
                + data[sy * w + sx + 1]
                + data[(sy + 1) * w + sx]
                + data[(sy + 1) * w + sx + 1];
            out.push(sum * 0.25);
        }
    }
    (out, nw, nh)
}

/// 4x4 个格子 x 8 个方向，不做主方向旋转
fn describe(octave: &Octave, cx: usize, cy: usize) -> Option<Descriptor> {
    let mut hist = [0.0_f32; DESCRIPTOR_LEN];
    let cell_size = 2 * PATCH_RADIUS / CELLS;
    let sigma = PATCH_RADIUS as f64;

    for py in 0..2 * PATCH_RADIUS {
        for px in 0..2 * PATCH_RADIUS {
            let x = cx + px - PATCH_RADIUS;
            let y = cy + py - PATCH_RADIUS;
            if x >= octave.width || y >= octave.height {
                continue;
            }
            let idx = y * octave.width + x;
            let (gx, gy) = (octave.gx[idx], octave.gy[idx]);
            let magnitude = (gx * gx + gy * gy).sqrt();
            if magnitude == 0.0 {
                continue;
            }

            let dx = px as f64 - PATCH_RADIUS as f64 + 0.5;
            let dy = py as f64 - PATCH_RADIUS as f64 + 0.5;
            let weight = (-(dx * dx + dy * dy) / (2.0 * sigma * sigma)).exp();

            let angle = gy.atan2(gx) + std::f64::consts::PI;
            let bin = ((angle / std::f64::consts::TAU * ORIENTATION_BINS as f64) as usize)
                % ORIENTATION_BINS;
            let cell = (py / cell_size) * CELLS + px / cell_size;
            hist[cell * ORIENTATION_BINS + bin] += (magnitude * weight) as f32;
        }
    }

    if !normalize(&mut hist) {
        return None;
    }
    for v in hist.iter_mut() {
        *v = v.min(COMPONENT_CLAMP);
    }
    normalize(&mut hist).then_some(hist)
}

fn normalize(values: &mut [f32]) -> bool {
    let norm = values.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm <= f32::EPSILON {
        return false;
    }
    values.iter_mut().for_each(|v| *v /= norm);
    true
}
