pub mod api;
pub mod core;

pub use crate::api::{run_episode, EpisodeReport, Outcome, Policy, StridePolicy};
pub use crate::core::config::{EnvConfig, OverlapConfig};
pub use crate::core::env::{Action, Environment, FrameSelectionEnv, Observation, Step, StepInfo};
pub use crate::core::error::SelectorError;

pub fn init_logging() {
    #[cfg(target_os = "android")]
    {
        android_logger::init_once(
            android_logger::Config::default()
                .with_max_level(log::LevelFilter::Debug)
                .with_tag("frame_selector"),
        );
    }

    #[cfg(not(target_os = "android"))]
    {
        // 重复调用时 try_init 返回 Err，忽略即可
        let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
            .try_init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_logging_twice() {
        init_logging();
        init_logging();
        log::info!("🧪 logging initialized");
    }
}
