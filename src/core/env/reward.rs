//! 终局奖励：时间均匀性 + 平均质量 + 质量多样性 + 相邻重叠

use crate::core::filters::mean_std;
use crate::core::quality::QualityRecord;
use serde::Serialize;

/// 违反间隔约束的单步惩罚
pub const GAP_VIOLATION_PENALTY: f64 = -5.0;
/// 源帧耗尽仍未选满的惩罚
pub const FAILURE_PENALTY: f64 = -10.0;

pub const WEIGHT_UNIFORMITY: f64 = 0.2;
pub const WEIGHT_QUALITY: f64 = 0.3;
pub const WEIGHT_DIVERSITY: f64 = 0.1;
pub const WEIGHT_OVERLAP: f64 = 0.4;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RewardBreakdown {
    pub temporal_uniformity: f64,
    pub avg_quality: f64,
    pub quality_diversity: f64,
    pub overlap: f64,
    pub total: f64,
}

impl RewardBreakdown {
    pub fn compose(
        temporal_uniformity: f64,
        avg_quality: f64,
        quality_diversity: f64,
        overlap: f64,
    ) -> Self {
        let total = WEIGHT_UNIFORMITY * temporal_uniformity
            + WEIGHT_QUALITY * avg_quality
            + WEIGHT_DIVERSITY * quality_diversity
            + WEIGHT_OVERLAP * overlap;
        Self {
            temporal_uniformity,
            avg_quality,
            quality_diversity,
            overlap,
            total,
        }
    }
}

/// 1 / (1 + std(相邻间隔))；只有一帧时没有间隔，std 取 0
pub fn temporal_uniformity(accepted: &[usize]) -> f64 {
    let mut sorted = accepted.to_vec();
    sorted.sort_unstable();
    let gaps: Vec<f64> = sorted.windows(2).map(|w| (w[1] - w[0]) as f64).collect();
    let (_, std) = mean_std(&gaps);
    1.0 / (1.0 + std)
}

/// (平均质量, 质量多样性)，单帧质量 = sharpness + local_quality
pub fn quality_terms(quality: &[QualityRecord], accepted: &[usize]) -> (f64, f64) {
    let combined: Vec<f64> = accepted
        .iter()
        .filter_map(|&i| quality.get(i))
        .map(QualityRecord::combined)
        .collect();
    let (mean, std) = mean_std(&combined);
    let diversity = if combined.len() > 1 { std } else { 0.0 };
    (mean, diversity)
}

/// 空选择集返回 None，由调用方给失败惩罚
pub fn terminal_reward(
    accepted: &[usize],
    quality: &[QualityRecord],
    overlap: impl FnOnce(&[usize]) -> f64,
) -> Option<RewardBreakdown> {
    if accepted.is_empty() {
        return None;
    }
    let uniformity = temporal_uniformity(accepted);
    let (avg_quality, diversity) = quality_terms(quality, accepted);
    Some(RewardBreakdown::compose(
        uniformity,
        avg_quality,
        diversity,
        overlap(accepted),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(sharpness: f64, local_quality: f64) -> QualityRecord {
        QualityRecord {
            sharpness,
            local_quality,
            brightness: 0.5,
        }
    }

    #[test]
    fn test_uniform_gaps() {
        assert_eq!(temporal_uniformity(&[0, 3, 6, 9]), 1.0);
        assert_eq!(temporal_uniformity(&[4]), 1.0);
        // gaps [1, 3] -> std 1
        assert!((temporal_uniformity(&[0, 1, 4]) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_quality_terms() {
        let quality = vec![record(0.2, 0.8), record(0.5, 0.5), record(1.0, 1.0)];
        let (avg, diversity) = quality_terms(&quality, &[0, 1]);
        assert!((avg - 1.0).abs() < 1e-12);
        assert_eq!(diversity, 0.0);

        let (avg, diversity) = quality_terms(&quality, &[0, 2]);
        assert!((avg - 1.5).abs() < 1e-12);
        assert!((diversity - 0.5).abs() < 1e-12);

        let (_, single) = quality_terms(&quality, &[2]);
        assert_eq!(single, 0.0);
    }

    #[test]
    fn test_weights() {
        let r = RewardBreakdown::compose(1.0, 1.0, 1.0, 1.0);
        assert!((r.total - 1.0).abs() < 1e-12);
        let only_overlap = RewardBreakdown::compose(0.0, 0.0, 0.0, 1.0);
        assert!((only_overlap.total - 0.4).abs() < 1e-12);
    }

    #[test]
    fn test_empty_selection_has_no_reward() {
        let quality = vec![record(1.0, 1.0)];
        assert!(terminal_reward(&[], &quality, |_| 1.0).is_none());
    }

    #[test]
    fn test_overlap_dominates() {
        let quality = vec![record(0.5, 0.5); 3];
        let high = terminal_reward(&[0, 1, 2], &quality, |_| 0.9).unwrap();
        let low = terminal_reward(&[0, 1, 2], &quality, |_| 0.0).unwrap();
        assert!(high.total > low.total);
        assert!((high.total - low.total - 0.36).abs() < 1e-12);
    }
}
