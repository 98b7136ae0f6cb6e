pub mod config;
pub mod env;
pub mod error;
pub mod filters;
pub mod overlap;
pub mod quality;
pub mod video;
