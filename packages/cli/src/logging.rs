//! Logger setup and progress spinners.
//!
//! Log records are routed through `indicatif-log-bridge` so that lines
//! printed by `log::info!` and friends never tear a spinner mid-redraw.

use std::time::Duration;

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

/// Environment variable whose filter directives replace the `-v` level.
pub const LOG_FILTER_ENV: &str = "RUST_LOG";

/// Filter directives for a `-v` count. Directives match by module-path
/// prefix, so `road_guardian` covers every crate of the workspace while
/// dependencies stay at `warn`.
#[must_use]
pub const fn verbosity_filter(verbose: u8) -> &'static str {
    match verbose {
        0 => "warn,road_guardian=info",
        1 => "warn,road_guardian=debug",
        _ => "debug,road_guardian=trace",
    }
}

/// `RUST_LOG` if it is set and non-blank, else the filter for `verbose`.
#[must_use]
pub fn log_filter(env: Option<&str>, verbose: u8) -> String {
    env.map(str::trim)
        .filter(|v| !v.is_empty())
        .map_or_else(|| verbosity_filter(verbose).to_string(), ToString::to_string)
}

/// Initializes the global logger and returns the [`MultiProgress`] that
/// spinners must be added to.
#[must_use]
pub fn init_logger(verbose: u8) -> MultiProgress {
    let multi = MultiProgress::new();

    let filter = log_filter(std::env::var(LOG_FILTER_ENV).ok().as_deref(), verbose);
    let logger = pretty_env_logger::formatted_timed_builder()
        .parse_filters(&filter)
        .build();
    let level = logger.filter();

    if indicatif_log_bridge::LogWrapper::new(multi.clone(), logger)
        .try_init()
        .is_ok()
    {
        log::set_max_level(level);
    }

    multi
}

/// A steady-ticking spinner for a step of unknown length.
#[must_use]
pub fn spinner(multi: &MultiProgress, message: &str) -> ProgressBar {
    let bar = multi.add(ProgressBar::new_spinner());
    bar.enable_steady_tick(Duration::from_millis(100));
    bar.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {msg} [{elapsed}]")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    bar.set_message(message.to_string());
    bar
}
