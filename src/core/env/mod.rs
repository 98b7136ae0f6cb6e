//! 帧选择环境：reset / step 接口与观测、动作类型

pub mod reward;
pub mod selection;
pub mod state_machine;

pub use reward::RewardBreakdown;
pub use selection::FrameSelectionEnv;
pub use state_machine::{EpisodeStatus, SelectionState, StepEvent, Transition};

use crate::core::error::SelectorError;
use serde::{Deserialize, Serialize};

/// 观测向量长度：[sharpness, local_quality, brightness, 时间位置, 选择进度]
pub const OBSERVATION_LEN: usize = 5;

/// 强化学习环境的四个能力：两个空间描述 + reset + step
pub trait Environment {
    fn observation_space(&self) -> ObservationSpace;

    fn action_space(&self) -> ActionSpace;

    /// seed 只影响多数据源时的随机选择
    fn reset(&mut self, seed: Option<u64>) -> Result<(Observation, ResetInfo), SelectorError>;

    /// 违反间隔约束与失败终止都不是错误，只有误用才返回 Err
    fn step(&mut self, action: Action) -> Result<Step, SelectorError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Action {
    Skip = 0,
    Select = 1,
}

impl TryFrom<i64> for Action {
    type Error = SelectorError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Action::Skip),
            1 => Ok(Action::Select),
            other => Err(SelectorError::InvalidAction(other)),
        }
    }
}

impl From<Action> for i64 {
    fn from(action: Action) -> Self {
        action as i64
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Observation(pub [f32; OBSERVATION_LEN]);

impl Observation {
    /// 序列结束后的哨兵值
    pub fn zeros() -> Self {
        Observation([0.0; OBSERVATION_LEN])
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    pub fn is_sentinel(&self) -> bool {
        self.0.iter().all(|v| *v == 0.0)
    }
}

/// Box(low, high, shape)
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ObservationSpace {
    pub low: [f32; OBSERVATION_LEN],
    pub high: [f32; OBSERVATION_LEN],
}

impl ObservationSpace {
    pub fn unit() -> Self {
        Self {
            low: [0.0; OBSERVATION_LEN],
            high: [1.0; OBSERVATION_LEN],
        }
    }

    pub fn shape(&self) -> [usize; 1] {
        [OBSERVATION_LEN]
    }

    pub fn contains(&self, obs: &Observation) -> bool {
        obs.0
            .iter()
            .zip(self.low.iter().zip(self.high.iter()))
            .all(|(v, (lo, hi))| v >= lo && v <= hi)
    }
}

/// Discrete(n)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ActionSpace {
    pub n: usize,
}

impl ActionSpace {
    pub fn contains(&self, value: i64) -> bool {
        value >= 0 && (value as usize) < self.n
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ResetInfo {}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepInfo {
    pub selected_count: usize,
    pub current_step: usize,
    pub gap_violation: bool,
    /// 只在成功终止的那一步给出
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reward_breakdown: Option<RewardBreakdown>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Step {
    pub observation: Observation,
    pub reward: f64,
    /// 达到目标帧数（DONE_SUCCESS）
    pub terminated: bool,
    /// 源帧耗尽仍未达到目标（DONE_FAILURE）
    pub truncated: bool,
    pub info: StepInfo,
}

impl Step {
    pub fn is_done(&self) -> bool {
        self.terminated || self.truncated
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_from_index() {
        assert_eq!(Action::try_from(0).unwrap(), Action::Skip);
        assert_eq!(Action::try_from(1).unwrap(), Action::Select);
        assert!(matches!(
            Action::try_from(2),
            Err(SelectorError::InvalidAction(2))
        ));
        assert!(Action::try_from(-1).is_err());
        assert_eq!(i64::from(Action::Select), 1);
    }

    #[test]
    fn test_spaces() {
        let space = ObservationSpace::unit();
        assert_eq!(space.shape(), [5]);
        assert!(space.contains(&Observation::zeros()));
        assert!(!space.contains(&Observation([0.0, 0.0, 0.0, 0.0, 1.5])));

        let actions = ActionSpace { n: 2 };
        assert!(actions.contains(1));
        assert!(!actions.contains(2));
    }

    #[test]
    fn test_step_info_json_keys() {
        let info = StepInfo {
            selected_count: 2,
            current_step: 7,
            gap_violation: true,
            reward_breakdown: None,
        };
        let json = serde_json::to_value(&info).unwrap();
        assert_eq!(json["selected_count"], 2);
        assert_eq!(json["current_step"], 7);
        assert_eq!(json["gap_violation"], true);
        assert!(json.get("reward_breakdown").is_none());
    }
}
