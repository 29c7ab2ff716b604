use log::LevelFilter;
use std::time::Duration;

pub const DEFAULT_AGENT_LEVEL_FILTER: LevelFilter = LevelFilter::Info;
/// Set to anything other than `false` to log at debug level.
pub const DEBUG_ENV: &str = "DEBUG";

pub const DEFAULT_RETRY_ATTEMPTS: u32 = 10;
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(10);

/// Attempts the AWS SDK makes on its own before a call is reported as failed.
pub const AWS_SDK_MAX_ATTEMPTS: u32 = 15;
