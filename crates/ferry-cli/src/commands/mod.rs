//! Command implementations

pub mod enqueue;
pub mod parse;
pub mod status;
pub mod work;

use ferry_server::config::Config;

use crate::error::{CliError, Result};

/// Load server configuration the same way the server does.
pub(crate) fn load_config() -> Result<Config> {
    Config::load().map_err(CliError::config)
}
