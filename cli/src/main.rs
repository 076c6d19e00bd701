//! Pledge CLI - runs the canonical future scenarios and prints how each one
//! settled.
//!
//! ```text
//! main() -> PledgeConfig::load() -> init_tracing() -> EventLoop::with_config()
//!                                                          |
//!                                                          v
//!                         scenarios::schedule() -> run_until_idle() -> report
//! ```
//!
//! Results go to stdout, one line per scenario. Logs go to stderr.

mod scenarios;

use std::env;
use std::io;

use anyhow::Result;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use pledge_config::PledgeConfig;
use pledge_core::EventLoop;

const LOG_ENV_VAR: &str = "PLEDGE_LOG";
const DEFAULT_FILTER: &str = "warn";

/// `PLEDGE_LOG`, then `RUST_LOG`, then the config file's `log.filter`, then
/// `warn`. Invalid directives fall through to the next source.
fn init_tracing(config_filter: Option<&str>, init_warnings: Vec<String>) {
    let env_filter = env::var(LOG_ENV_VAR)
        .ok()
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .or_else(|| EnvFilter::try_from_default_env().ok())
        .or_else(|| config_filter.and_then(|directives| EnvFilter::try_new(directives).ok()))
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_FILTER));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(env_filter)
        .init();

    for warning in init_warnings {
        tracing::warn!("{warning}");
    }
}

fn load_config() -> (PledgeConfig, Vec<String>) {
    match PledgeConfig::load() {
        Ok(config) => (config.unwrap_or_default(), Vec::new()),
        Err(err) => (
            PledgeConfig::default(),
            vec![format!("{err}; using defaults")],
        ),
    }
}

fn main() -> Result<()> {
    let (config, init_warnings) = load_config();
    init_tracing(config.log_filter(), init_warnings);

    let event_loop = EventLoop::with_config(config.event_loop());
    let scheduled = scenarios::schedule(&event_loop);
    let stats = event_loop.run_until_idle()?;

    tracing::info!(
        microtasks = stats.microtasks_run,
        timers = stats.timers_fired,
        panicked = stats.panicked,
        now_ms = event_loop.now_ms(),
        "Event loop idle"
    );

    for scenario in &scheduled {
        println!("{:<16} {}", scenario.name, scenario.describe());
    }
    Ok(())
}
