//! 外部驱动入口：策略接口 + 跑完整个 episode

use crate::core::env::{
    Action, Environment, EpisodeStatus, FrameSelectionEnv, Observation, RewardBreakdown,
};
use crate::core::error::SelectorError;
use crate::core::video::FrameSource;
use log::info;
use serde::Serialize;

/// 决策策略；学习算法本身在 crate 之外
pub trait Policy {
    /// reset 之后、第一步之前调用
    fn begin_episode(&mut self, _source_len: usize, _target: usize, _max_gap: usize) {}

    fn act(&mut self, observation: &Observation) -> Action;
}

impl<F> Policy for F
where
    F: FnMut(&Observation) -> Action,
{
    fn act(&mut self, observation: &Observation) -> Action {
        self(observation)
    }
}

/// 等间隔选帧的基线策略
///
/// stride = clamp(floor((N-1)/(target-1)), 1, max_gap)
#[derive(Debug, Clone, Default)]
pub struct StridePolicy {
    stride: usize,
    step: usize,
}

impl StridePolicy {
    pub fn new() -> Self {
        Self { stride: 1, step: 0 }
    }

    pub fn stride(&self) -> usize {
        self.stride
    }
}

impl Policy for StridePolicy {
    fn begin_episode(&mut self, source_len: usize, target: usize, max_gap: usize) {
        let raw = if target > 1 {
            source_len.saturating_sub(1) / (target - 1)
        } else {
            1
        };
        self.stride = raw.clamp(1, max_gap.max(1));
        self.step = 0;
    }

    fn act(&mut self, _observation: &Observation) -> Action {
        let stride = self.stride.max(1);
        let action = if self.step % stride == 0 {
            Action::Select
        } else {
            Action::Skip
        };
        self.step += 1;
        action
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Outcome {
    Success,
    Failure,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EpisodeReport {
    pub source: String,
    pub accepted_indices: Vec<usize>,
    /// 选中帧在原始序列中的帧号
    pub frame_numbers: Vec<u64>,
    pub total_reward: f64,
    pub steps: usize,
    pub gap_violations: usize,
    pub outcome: Outcome,
    pub breakdown: Option<RewardBreakdown>,
}

impl EpisodeReport {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// reset 后用 policy 一直走到终止
pub fn run_episode<S, P>(
    env: &mut FrameSelectionEnv<S>,
    seed: Option<u64>,
    policy: &mut P,
) -> Result<EpisodeReport, SelectorError>
where
    S: FrameSource,
    P: Policy + ?Sized,
{
    let (mut observation, _) = env.reset(seed)?;
    policy.begin_episode(
        env.source_len(),
        env.config().target_frames,
        env.config().max_gap,
    );

    let mut total_reward = 0.0;
    let mut steps = 0;
    let mut gap_violations = 0;

    let breakdown = loop {
        let action = policy.act(&observation);
        let step = env.step(action)?;
        steps += 1;
        total_reward += step.reward;
        if step.info.gap_violation {
            gap_violations += 1;
        }
        observation = step.observation;

        if step.is_done() {
            break step.info.reward_breakdown;
        }
    };

    let outcome = match env.status() {
        Some(EpisodeStatus::DoneSuccess) => Outcome::Success,
        _ => Outcome::Failure,
    };
    let accepted_indices = env.accepted_indices().to_vec();
    let frames = env.frames();
    let frame_numbers = accepted_indices
        .iter()
        .filter_map(|&i| frames.get(i).map(|f| f.frame_number))
        .collect();

    let report = EpisodeReport {
        source: env.source_name().unwrap_or_default().to_string(),
        accepted_indices,
        frame_numbers,
        total_reward,
        steps,
        gap_violations,
        outcome,
        breakdown,
    };
    info!(
        "📊 Episode finished: {:?}, {} frames, reward {:.4}",
        report.outcome,
        report.accepted_indices.len(),
        report.total_reward
    );
    Ok(report)
}
