//! Diagnostic logging. User-facing progress goes through [`crate::ui`] on
//! stdout; `log` records go to stderr so the two never interleave in pipes.

use env_logger::{Builder, Env, Target};

pub const LOG_LEVEL_ENV: &str = "FKS_LOG_LEVEL";
pub const LOG_STYLE_ENV: &str = "FKS_LOG_STYLE";

/// Install the global logger. `level` is the `--log-level` value; the
/// environment variables above take precedence over it.
pub fn init_logger(level: &str) {
    let env = Env::default()
        .filter_or(LOG_LEVEL_ENV, level)
        .write_style_or(LOG_STYLE_ENV, "auto");

    let installed = Builder::from_env(env)
        .target(Target::Stderr)
        .format_timestamp_secs()
        .format_module_path(false)
        .format_target(false)
        .try_init();
    if installed.is_err() {
        log::debug!("logger already installed");
    }
}
