use super::reward::{self, RewardBreakdown, FAILURE_PENALTY, GAP_VIOLATION_PENALTY};
use super::state_machine::{EpisodeStatus, SelectionState, StepEvent};
use super::{
    Action, ActionSpace, Environment, Observation, ObservationSpace, ResetInfo, Step, StepInfo,
};
use crate::core::config::EnvConfig;
use crate::core::error::SelectorError;
use crate::core::overlap::OverlapScorer;
use crate::core::quality::{score_frames, QualityRecord};
use crate::core::video::{extract_uniform, open_source, Frame, FrameSource, ImageDirectorySource};
use log::{debug, info};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::time::Instant;

/// 一次 reset 到终止之间的全部数据，reset 时整体替换
struct Episode {
    source_name: String,
    frames: Vec<Frame>,
    quality: Vec<QualityRecord>,
    state: SelectionState,
}

impl Episode {
    fn observation(&self) -> Observation {
        let pointer = self.state.current_pointer();
        match self.quality.get(pointer) {
            Some(q) => Observation([
                q.sharpness as f32,
                q.local_quality as f32,
                q.brightness as f32,
                self.state.position() as f32,
                self.state.progress() as f32,
            ]),
            None => Observation::zeros(),
        }
    }
}

/// 帧选择环境：逐帧决定 跳过 / 选中
///
/// 单个实例不可并发调用；多个实例之间没有共享状态。
pub struct FrameSelectionEnv<S: FrameSource = ImageDirectorySource> {
    config: EnvConfig,
    sources: Vec<S>,
    rng: StdRng,
    pool: ThreadPool,
    scorer: OverlapScorer,
    episode: Option<Episode>,
}

impl FrameSelectionEnv<ImageDirectorySource> {
    /// 使用 config.source 指向的图片目录
    pub fn from_config(config: EnvConfig) -> Result<Self, SelectorError> {
        let path = config
            .source
            .clone()
            .ok_or_else(|| SelectorError::InvalidConfig("source path is required".into()))?;
        let source = open_source(&path)?;
        Self::new(config, source)
    }
}

impl<S: FrameSource> FrameSelectionEnv<S> {
    pub fn new(config: EnvConfig, source: S) -> Result<Self, SelectorError> {
        Self::with_sources(config, vec![source])
    }

    /// 多个数据源，每次 reset 随机选一个
    pub fn with_sources(config: EnvConfig, sources: Vec<S>) -> Result<Self, SelectorError> {
        config.validate()?;
        if sources.is_empty() {
            return Err(SelectorError::InvalidConfig(
                "at least one frame source is required".into(),
            ));
        }

        let pool = ThreadPoolBuilder::new()
            .num_threads(config.worker_threads())
            .build()?;
        let scorer = OverlapScorer::new(&config.overlap);

        info!(
            "🎯 Frame selection env: {} source(s), target {} of {} frames, max gap {}",
            sources.len(),
            config.target_frames,
            config.num_source_frames,
            config.max_gap
        );

        Ok(Self {
            config,
            sources,
            rng: StdRng::from_os_rng(),
            pool,
            scorer,
            episode: None,
        })
    }

    pub fn config(&self) -> &EnvConfig {
        &self.config
    }

    pub fn sources(&self) -> &[S] {
        &self.sources
    }

    pub fn status(&self) -> Option<EpisodeStatus> {
        self.episode.as_ref().map(|e| e.state.status())
    }

    pub fn selection(&self) -> Option<&SelectionState> {
        self.episode.as_ref().map(|e| &e.state)
    }

    pub fn accepted_indices(&self) -> &[usize] {
        self.episode
            .as_ref()
            .map(|e| e.state.accepted_indices())
            .unwrap_or(&[])
    }

    pub fn current_pointer(&self) -> usize {
        self.episode
            .as_ref()
            .map(|e| e.state.current_pointer())
            .unwrap_or(0)
    }

    /// 实际抽到的帧数（可能小于 num_source_frames）
    pub fn source_len(&self) -> usize {
        self.episode.as_ref().map(|e| e.frames.len()).unwrap_or(0)
    }

    pub fn source_name(&self) -> Option<&str> {
        self.episode.as_ref().map(|e| e.source_name.as_str())
    }

    pub fn frames(&self) -> &[Frame] {
        self.episode
            .as_ref()
            .map(|e| e.frames.as_slice())
            .unwrap_or(&[])
    }

    pub fn quality(&self) -> &[QualityRecord] {
        self.episode
            .as_ref()
            .map(|e| e.quality.as_slice())
            .unwrap_or(&[])
    }

    /// 当前已选帧的离线可重建性检查
    pub fn check_feasibility(&self) -> Result<bool, SelectorError> {
        let episode = self.episode.as_ref().ok_or(SelectorError::NotReset)?;
        let (scorer, accepted) = (&self.scorer, episode.state.accepted_indices());
        Ok(self
            .pool
            .install(|| scorer.is_feasible(&episode.frames, accepted)))
    }

    /// 用 start..=end 之间的帧估计安全间隔（启发式）
    pub fn estimate_max_gap(&self, start: usize, end: usize) -> Result<usize, SelectorError> {
        let episode = self.episode.as_ref().ok_or(SelectorError::NotReset)?;
        let frames = &episode.frames;
        if start >= end || end >= frames.len() {
            return Err(SelectorError::InvalidRange {
                start,
                end,
                len: frames.len(),
            });
        }
        let scorer = &self.scorer;
        Ok(self.pool.install(|| {
            scorer.estimate_max_gap(&frames[start], &frames[end], &frames[start + 1..end])
        }))
    }

    fn pick_source(&mut self) -> usize {
        // 单一数据源时不消耗随机数
        if self.sources.len() == 1 {
            0
        } else {
            self.rng.random_range(0..self.sources.len())
        }
    }
}

fn terminal_breakdown(
    pool: &ThreadPool,
    scorer: &OverlapScorer,
    episode: &Episode,
) -> Option<RewardBreakdown> {
    reward::terminal_reward(
        episode.state.accepted_indices(),
        &episode.quality,
        |accepted| pool.install(|| scorer.aggregate(&episode.frames, accepted)),
    )
}

impl<S: FrameSource> Environment for FrameSelectionEnv<S> {
    fn observation_space(&self) -> ObservationSpace {
        ObservationSpace::unit()
    }

    fn action_space(&self) -> ActionSpace {
        ActionSpace { n: 2 }
    }

    fn reset(&mut self, seed: Option<u64>) -> Result<(Observation, ResetInfo), SelectorError> {
        self.episode = None;
        if let Some(seed) = seed {
            self.rng = StdRng::seed_from_u64(seed);
        }

        let source_index = self.pick_source();
        let source = &mut self.sources[source_index];
        let source_name = source.name();
        let frames = extract_uniform(
            source,
            self.config.num_source_frames,
            self.config.max_frame_edge,
        );

        if frames.is_empty() {
            return Err(SelectorError::EmptySource(source_name));
        }
        if self.config.target_frames > frames.len() {
            return Err(SelectorError::TargetUnreachable {
                target: self.config.target_frames,
                available: frames.len(),
            });
        }

        let start = Instant::now();
        let quality = self.pool.install(|| score_frames(&frames));
        debug!(
            "⏱️ Quality precompute: {} frames in {:?}",
            frames.len(),
            start.elapsed()
        );

        let state = SelectionState::new(frames.len(), self.config.target_frames, self.config.max_gap);
        info!(
            "🔄 Episode reset: {} ({} frames, target {})",
            source_name,
            frames.len(),
            self.config.target_frames
        );

        let episode = Episode {
            source_name,
            frames,
            quality,
            state,
        };
        let observation = episode.observation();
        self.episode = Some(episode);
        Ok((observation, ResetInfo::default()))
    }

    fn step(&mut self, action: Action) -> Result<Step, SelectorError> {
        let episode = self.episode.as_mut().ok_or(SelectorError::NotReset)?;
        let transition = episode
            .state
            .apply(action)
            .ok_or(SelectorError::EpisodeFinished)?;

        let gap_violation = matches!(transition.event, StepEvent::GapViolation { .. });
        if let StepEvent::GapViolation { gap } = transition.event {
            debug!(
                "🚫 Gap violation at frame {}: gap {} > {}",
                episode.state.current_pointer() - 1,
                gap,
                episode.state.max_gap()
            );
        }

        let mut breakdown = None;
        let reward = match transition.status {
            EpisodeStatus::DoneSuccess => {
                match terminal_breakdown(&self.pool, &self.scorer, episode) {
                    Some(b) => {
                        info!(
                            "✅ Target reached: reward {:.4} (uniformity {:.3}, quality {:.3}, diversity {:.3}, overlap {:.3})",
                            b.total, b.temporal_uniformity, b.avg_quality, b.quality_diversity, b.overlap
                        );
                        breakdown = Some(b);
                        b.total
                    }
                    None => FAILURE_PENALTY,
                }
            }
            EpisodeStatus::DoneFailure => {
                info!(
                    "❌ Source exhausted with {}/{} frames selected",
                    episode.state.accepted_indices().len(),
                    episode.state.target_count()
                );
                // 最后一帧上的违规仍要付失败惩罚，不能比跳过更划算
                if gap_violation {
                    GAP_VIOLATION_PENALTY + FAILURE_PENALTY
                } else {
                    FAILURE_PENALTY
                }
            }
            EpisodeStatus::Active if gap_violation => GAP_VIOLATION_PENALTY,
            EpisodeStatus::Active => 0.0,
        };

        let status = transition.status;
        Ok(Step {
            observation: episode.observation(),
            reward,
            terminated: status == EpisodeStatus::DoneSuccess,
            truncated: status == EpisodeStatus::DoneFailure,
            info: StepInfo {
                selected_count: episode.state.accepted_indices().len(),
                current_step: episode.state.current_pointer(),
                gap_violation,
                reward_breakdown: breakdown,
            },
        })
    }
}
