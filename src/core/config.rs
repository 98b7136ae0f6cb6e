use crate::core::error::SelectorError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// 环境配置，所有参数显式传入（不读取进程环境变量）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvConfig {
    /// 图片目录；使用内存帧来源时可为空
    pub source: Option<PathBuf>,
    /// 选择前的均匀采样帧数
    pub num_source_frames: usize,
    /// 最终需要选中的帧数
    pub target_frames: usize,
    /// 相邻选中帧之间允许的最大下标间隔
    pub max_gap: usize,
    /// 抽帧时把长边缩到该尺寸以内
    pub max_frame_edge: Option<u32>,
    /// 单个环境的打分线程数，默认 min(CPU, 4)
    pub num_threads: Option<usize>,
    pub overlap: OverlapConfig,
}

impl Default for EnvConfig {
    fn default() -> Self {
        Self {
            source: None,
            num_source_frames: 300,
            target_frames: 60,
            max_gap: 10,
            max_frame_edge: None,
            num_threads: None,
            overlap: OverlapConfig::default(),
        }
    }
}

impl EnvConfig {
    /// 手持慢速环绕：帧多、间隔小
    pub fn for_dense_capture() -> Self {
        Self {
            num_source_frames: 400,
            target_frames: 80,
            max_gap: 6,
            ..Default::default()
        }
    }

    /// 稀疏拍摄（如 DTU 这类固定机位图片集）
    pub fn for_sparse_capture() -> Self {
        Self {
            num_source_frames: 64,
            target_frames: 24,
            max_gap: 4,
            ..Default::default()
        }
    }

    pub fn from_json5_str(text: &str) -> Result<Self, SelectorError> {
        let config: EnvConfig =
            json5::from_str(text).map_err(|e| SelectorError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, SelectorError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json5_str(&text)
    }

    pub fn worker_threads(&self) -> usize {
        self.num_threads
            .unwrap_or_else(|| num_cpus::get().min(4))
            .max(1)
    }

    /// 目标帧数超过实际帧数的情况在 reset 时检查
    pub fn validate(&self) -> Result<(), SelectorError> {
        let invalid = |msg: &str| Err(SelectorError::InvalidConfig(msg.to_string()));

        if self.num_source_frames == 0 {
            return invalid("num_source_frames must be > 0");
        }
        if self.target_frames == 0 {
            return invalid("target_frames must be > 0");
        }
        if self.max_gap == 0 {
            return invalid("max_gap must be >= 1");
        }
        if self.num_threads == Some(0) {
            return invalid("num_threads must be >= 1");
        }
        if self.max_frame_edge == Some(0) {
            return invalid("max_frame_edge must be > 0");
        }
        self.overlap.validate()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlapConfig {
    /// 每帧最多保留的特征点
    pub max_features: usize,
    /// Lowe ratio test 阈值
    pub ratio_threshold: f32,
    /// 平均匹配数达到该值时 overlap = 1
    pub saturation_matches: usize,
    /// 可行性检查 / 间隔估计要求的最少匹配数
    pub min_matches: usize,
    /// 间隔估计结果的截断范围 [min, max]
    pub gap_range: (usize, usize),
    /// 特征检测的金字塔层数
    pub octaves: usize,
}

impl Default for OverlapConfig {
    fn default() -> Self {
        Self {
            max_features: 500,
            ratio_threshold: 0.75,
            saturation_matches: 100,
            min_matches: 30,
            gap_range: (1, 15),
            octaves: 3,
        }
    }
}

impl OverlapConfig {
    pub fn validate(&self) -> Result<(), SelectorError> {
        let invalid = |msg: &str| Err(SelectorError::InvalidConfig(msg.to_string()));

        if self.max_features == 0 {
            return invalid("overlap.max_features must be > 0");
        }
        if !(self.ratio_threshold > 0.0 && self.ratio_threshold <= 1.0) {
            return invalid("overlap.ratio_threshold must be in (0, 1]");
        }
        if self.saturation_matches == 0 {
            return invalid("overlap.saturation_matches must be > 0");
        }
        let (lo, hi) = self.gap_range;
        if lo == 0 || lo > hi {
            return invalid("overlap.gap_range must satisfy 1 <= min <= max");
        }
        if self.octaves == 0 {
            return invalid("overlap.octaves must be > 0");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(EnvConfig::default().validate().is_ok());
        assert!(EnvConfig::for_dense_capture().validate().is_ok());
        assert!(EnvConfig::for_sparse_capture().validate().is_ok());
    }

    #[test]
    fn test_parse_json5_with_comments() {
        let text = r#"{
            // DTU scan
            source: "/data/dtu/scan14",
            num_source_frames: 49,
            target_frames: 20,
            max_gap: 4,
            overlap: { ratio_threshold: 0.7, gap_range: [2, 10], },
        }"#;
        let config = EnvConfig::from_json5_str(text).unwrap();
        assert_eq!(config.source, Some(PathBuf::from("/data/dtu/scan14")));
        assert_eq!(config.num_source_frames, 49);
        assert_eq!(config.max_gap, 4);
        assert_eq!(config.overlap.ratio_threshold, 0.7);
        assert_eq!(config.overlap.gap_range, (2, 10));
        assert_eq!(config.overlap.max_features, 500);
    }

    #[test]
    fn test_rejects_invalid_values() {
        let zero_gap = EnvConfig {
            max_gap: 0,
            ..Default::default()
        };
        assert!(matches!(
            zero_gap.validate(),
            Err(SelectorError::InvalidConfig(_))
        ));

        let bad_ratio = EnvConfig {
            overlap: OverlapConfig {
                ratio_threshold: 1.5,
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(bad_ratio.validate().is_err());

        assert!(EnvConfig::from_json5_str("{ target_frames: 0 }").is_err());
        assert!(matches!(
            EnvConfig::from_json5_str("{ target_frames: "),
            Err(SelectorError::ConfigParse(_))
        ));
    }

    #[test]
    fn test_unreachable_target_is_not_a_config_error() {
        let config = EnvConfig {
            num_source_frames: 5,
            target_frames: 10,
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_worker_threads_floor() {
        let config = EnvConfig {
            num_threads: Some(2),
            ..Default::default()
        };
        assert_eq!(config.worker_threads(), 2);
        assert!(EnvConfig::default().worker_threads() >= 1);
    }
}
