// Library root: Sleeper client, snapshot cache, configuration and the
// workbook export pipeline. The binary in main.rs is a thin CLI over these.

pub mod cache;
pub mod config;
pub mod export;
pub mod league;
pub mod pipeline;
pub mod sleeper;
pub mod snapshot;
