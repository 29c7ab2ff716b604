/*!

`agent-utils` is a collection of functions used by the Rancher test environment controllers.
`aws` talks to EC2 and builds the environment for the node provisioning tool, `process` runs local
commands and `retry` repeats operations against remote systems.

!*/

use constants::{DEBUG_ENV, DEFAULT_AGENT_LEVEL_FILTER};
use env_logger::Builder;
pub use error::{Error, Result};
use log::LevelFilter;
use serde::Serialize;
use std::env;

pub mod aws;
pub mod constants;
mod error;
pub mod process;
pub mod retry;

/// Extract the value of `RUST_LOG` if it exists, otherwise log this application at `log_level`,
/// `DEFAULT_AGENT_LEVEL_FILTER`, or debug if `DEBUG` is set to anything but `false`.
pub fn init_agent_logger(bin_crate: &str, log_level: Option<LevelFilter>) {
    match env::var(env_logger::DEFAULT_FILTER_ENV).ok() {
        Some(_) => {
            // RUST_LOG exists; env_logger will use it.
            Builder::from_default_env().init();
        }
        None => {
            let log_level = log_level.unwrap_or_else(|| default_level(env::var(DEBUG_ENV).ok()));
            Builder::new()
                // Set log level to Error for crates other than our own.
                .filter_level(LevelFilter::Error)
                // Set all of our crates to the desired level.
                .filter(Some(bin_crate), log_level)
                .filter(Some("agent_utils"), log_level)
                .filter(Some("rancher_agents"), log_level)
                .filter(Some("rancher_types"), log_level)
                .init();
        }
    }
}

fn default_level(debug: Option<String>) -> LevelFilter {
    match debug {
        Some(value) if value.trim() != "false" => LevelFilter::Debug,
        _ => DEFAULT_AGENT_LEVEL_FILTER,
    }
}

/// Print a value using `serde_json` `to_string_pretty` for types that implement Serialize.
pub fn json_display<T: Serialize>(object: T) -> String {
    serde_json::to_string_pretty(&object).unwrap_or_else(|e| format!("Serialization failed: {}", e))
}
