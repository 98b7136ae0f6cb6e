//! 相邻帧几何重叠估计：特征匹配数 -> [0,1] 分数

pub mod features;
pub mod matcher;

pub use features::{Descriptor, FeatureDetector, Features, Keypoint};
pub use matcher::{Match, RatioMatcher};

use crate::core::config::OverlapConfig;
use crate::core::video::Frame;
use log::debug;
use rayon::prelude::*;

#[derive(Debug, Clone)]
pub struct OverlapScorer {
    config: OverlapConfig,
    detector: FeatureDetector,
    matcher: RatioMatcher,
}

impl OverlapScorer {
    pub fn new(config: &OverlapConfig) -> Self {
        Self {
            config: config.clone(),
            detector: FeatureDetector::new(config.max_features, config.octaves),
            matcher: RatioMatcher::new(config.ratio_threshold),
        }
    }

    pub fn config(&self) -> &OverlapConfig {
        &self.config
    }

    pub fn features(&self, frame: &Frame) -> Features {
        self.detector.detect_and_compute(&frame.to_gray())
    }

    /// 两帧之间通过 ratio test 的匹配数；退化情况返回 0
    pub fn pair_matches(&self, a: &Frame, b: &Frame) -> usize {
        let fa = self.features(a);
        let fb = self.features(b);
        self.matcher.count_matches(&fa.descriptors, &fb.descriptors)
    }

    /// 按顺序的相邻帧匹配数（只算相邻对，不算全部组合）
    ///
    /// 每帧特征只提取一次；越界下标按无特征处理。
    /// 在调用方的 rayon 线程池里并行执行，结果顺序与输入一致。
    pub fn consecutive_matches(&self, frames: &[Frame], indices: &[usize]) -> Vec<usize> {
        if indices.len() < 2 {
            return Vec::new();
        }

        let features: Vec<Features> = indices
            .par_iter()
            .map(|&i| frames.get(i).map(|f| self.features(f)).unwrap_or_default())
            .collect();

        features
            .par_windows(2)
            .map(|pair| {
                self.matcher
                    .count_matches(&pair[0].descriptors, &pair[1].descriptors)
            })
            .collect()
    }

    /// 平均相邻匹配数 / 饱和值，截断到 [0,1]；少于 2 帧为 0
    pub fn aggregate(&self, frames: &[Frame], indices: &[usize]) -> f64 {
        let counts = self.consecutive_matches(frames, indices);
        if counts.is_empty() {
            return 0.0;
        }
        let avg = counts.iter().sum::<usize>() as f64 / counts.len() as f64;
        debug!("🔗 Consecutive matches {:?} (avg {:.1})", counts, avg);
        (avg / self.config.saturation_matches as f64).clamp(0.0, 1.0)
    }

    /// 离线检查：所有相邻对都达到 min_matches 才算可重建
    pub fn is_feasible(&self, frames: &[Frame], indices: &[usize]) -> bool {
        if indices.len() < 2 {
            return false;
        }
        self.consecutive_matches(frames, indices)
            .iter()
            .all(|&count| count >= self.config.min_matches)
    }

    /// 启发式估计：用中间帧测出的平均匹配衰减线性外推安全间隔。
    ///
    /// 不是严格上界，结果截断到 `gap_range`。没有中间帧时衰减率无定义，
    /// 返回 `gap_range` 的下界。
    pub fn estimate_max_gap(&self, start: &Frame, end: &Frame, between: &[Frame]) -> usize {
        let (lo, hi) = self.config.gap_range;
        if between.is_empty() {
            return lo;
        }

        let mut chain: Vec<Frame> = Vec::with_capacity(between.len() + 2);
        chain.push(start.clone());
        chain.extend_from_slice(between);
        chain.push(end.clone());
        let indices: Vec<usize> = (0..chain.len()).collect();

        let counts = self.consecutive_matches(&chain, &indices);
        let avg = counts.iter().sum::<usize>() as f64 / counts.len() as f64;

        let estimate = if avg > self.config.min_matches as f64 {
            let decay = avg / between.len() as f64;
            (self.config.min_matches as f64 / decay).floor() as usize
        } else {
            lo
        };
        debug!("📏 Gap estimate {} from avg {:.1} matches", estimate, avg);
        estimate.clamp(lo, hi)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    const SIZE: u32 = 128;

    fn noise_frame(seed: u64, frame_number: u64) -> Frame {
        let mut rng = StdRng::seed_from_u64(seed);
        let data: Vec<u8> = (0..SIZE * SIZE).map(|_| rng.random::<u8>()).collect();
        Frame::from_gray(SIZE, SIZE, &data, frame_number).unwrap()
    }

    fn flat_frame(frame_number: u64) -> Frame {
        Frame::from_gray(SIZE, SIZE, &vec![120u8; (SIZE * SIZE) as usize], frame_number).unwrap()
    }

    fn scorer() -> OverlapScorer {
        OverlapScorer::new(&OverlapConfig::default())
    }

    #[test]
    fn test_identical_frames_match_every_descriptor() {
        let scorer = scorer();
        let frame = noise_frame(1, 0);
        let descriptors = scorer.features(&frame).len();
        assert!(descriptors > 50);
        assert!(descriptors <= 500);

        let matches = scorer.pair_matches(&frame, &frame.clone());
        assert!(matches * 10 >= descriptors * 9);
    }

    #[test]
    fn test_unrelated_noise_matches_near_zero() {
        let scorer = scorer();
        let matches = scorer.pair_matches(&noise_frame(1, 0), &noise_frame(2, 1));
        assert!(matches < 10, "unexpected {} matches", matches);
    }

    #[test]
    fn test_flat_frame_degenerates_to_zero() {
        let scorer = scorer();
        assert_eq!(scorer.pair_matches(&flat_frame(0), &noise_frame(3, 1)), 0);
        assert_eq!(scorer.pair_matches(&flat_frame(0), &flat_frame(1)), 0);
    }

    #[test]
    fn test_aggregate_bounds() {
        let scorer = scorer();
        let same = noise_frame(4, 0);
        let frames = vec![same.clone(), same.clone(), same, noise_frame(5, 3)];

        assert_eq!(scorer.aggregate(&frames, &[]), 0.0);
        assert_eq!(scorer.aggregate(&frames, &[2]), 0.0);

        let high = scorer.aggregate(&frames, &[0, 1, 2]);
        assert!(high > 0.5 && high <= 1.0);

        let low = scorer.aggregate(&frames, &[2, 3]);
        assert!(low < 0.1);
    }

    #[test]
    fn test_feasibility_gate() {
        let scorer = scorer();
        let same = noise_frame(6, 0);
        let frames = vec![same.clone(), same, noise_frame(7, 2)];

        assert!(scorer.is_feasible(&frames, &[0, 1]));
        assert!(!scorer.is_feasible(&frames, &[0, 1, 2]));
        assert!(!scorer.is_feasible(&frames, &[0]));
    }

    #[test]
    fn test_gap_estimate_is_clamped_heuristic() {
        let scorer = scorer();
        let same = noise_frame(8, 0);

        // 没有中间帧：返回下界
        assert_eq!(scorer.estimate_max_gap(&same, &same, &[]), 1);

        // 匹配不衰减的序列：外推值 min/(avg/n) 远小于上界，仍在范围内
        let between = vec![same.clone(); 4];
        let gap = scorer.estimate_max_gap(&same, &same, &between);
        assert!((1..=15).contains(&gap));

        // 匹配不足：保守地返回下界
        let unrelated: Vec<Frame> = (0..3).map(|i| noise_frame(100 + i, i)).collect();
        assert_eq!(scorer.estimate_max_gap(&noise_frame(9, 0), &noise_frame(10, 4), &unrelated), 1);
    }
}
