pub mod selector;

pub use selector::{run_episode, EpisodeReport, Outcome, Policy, StridePolicy};
