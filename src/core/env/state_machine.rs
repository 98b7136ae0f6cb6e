use super::Action;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EpisodeStatus {
    Active,
    /// 已选满目标帧数
    DoneSuccess,
    /// 源帧耗尽仍未选满
    DoneFailure,
}

impl EpisodeStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, EpisodeStatus::Active)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepEvent {
    Skipped,
    Accepted { index: usize },
    /// 与上一个选中帧的间隔超过 max_gap，选择被拒绝
    GapViolation { gap: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub event: StepEvent,
    pub status: EpisodeStatus,
}

/// 单个 episode 的选择状态
///
/// 不变量：accepted 严格递增、长度不超过 target_count、
/// 相邻下标差不超过 max_gap；current_pointer 不超过 source_len。
#[derive(Debug, Clone, PartialEq)]
pub struct SelectionState {
    current_pointer: usize,
    accepted: Vec<usize>,
    target_count: usize,
    max_gap: usize,
    source_len: usize,
    status: EpisodeStatus,
}

impl SelectionState {
    pub fn new(source_len: usize, target_count: usize, max_gap: usize) -> Self {
        let status = if source_len == 0 {
            EpisodeStatus::DoneFailure
        } else {
            EpisodeStatus::Active
        };
        Self {
            current_pointer: 0,
            accepted: Vec::with_capacity(target_count),
            target_count,
            max_gap,
            source_len,
            status,
        }
    }

    pub fn current_pointer(&self) -> usize {
        self.current_pointer
    }

    pub fn accepted_indices(&self) -> &[usize] {
        &self.accepted
    }

    pub fn target_count(&self) -> usize {
        self.target_count
    }

    pub fn max_gap(&self) -> usize {
        self.max_gap
    }

    pub fn source_len(&self) -> usize {
        self.source_len
    }

    pub fn status(&self) -> EpisodeStatus {
        self.status
    }

    /// current_pointer / N
    pub fn position(&self) -> f64 {
        if self.source_len == 0 {
            return 0.0;
        }
        self.current_pointer as f64 / self.source_len as f64
    }

    /// len(accepted) / target
    pub fn progress(&self) -> f64 {
        if self.target_count == 0 {
            return 0.0;
        }
        self.accepted.len() as f64 / self.target_count as f64
    }

    /// 当前位置若被选中，与上一个选中帧的间隔
    pub fn pending_gap(&self) -> Option<usize> {
        self.accepted
            .last()
            .map(|&last| self.current_pointer - last)
    }

    /// 执行一步；终止状态下返回 None
    pub fn apply(&mut self, action: Action) -> Option<Transition> {
        if self.status.is_terminal() {
            return None;
        }

        let event = match action {
            Action::Skip => StepEvent::Skipped,
            Action::Select => match self.pending_gap() {
                Some(gap) if gap > self.max_gap => StepEvent::GapViolation { gap },
                _ => {
                    let index = self.current_pointer;
                    if self.accepted.len() < self.target_count {
                        self.accepted.push(index);
                    }
                    StepEvent::Accepted { index }
                }
            },
        };

        self.current_pointer += 1;
        let exhausted = self.current_pointer >= self.source_len;

        self.status = match event {
            // 被拒绝的选择不会让选择数增加，只有耗尽才会终止
            StepEvent::GapViolation { .. } if exhausted => EpisodeStatus::DoneFailure,
            StepEvent::GapViolation { .. } => EpisodeStatus::Active,
            _ if self.accepted.len() == self.target_count => EpisodeStatus::DoneSuccess,
            _ if exhausted => EpisodeStatus::DoneFailure,
            _ => EpisodeStatus::Active,
        };

        Some(Transition {
            event,
            status: self.status,
        })
    }
}
