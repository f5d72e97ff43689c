//! `set-config` CLI sub-command.

use crate::conf::{self, ConfTarget};
use crate::hooks::Paths;
use anyhow::Result;
use clap::Parser;

/// Set a value in a glance configuration file
#[derive(Debug, Parser)]
pub struct CliSetConfig {
    /// Configuration file: api, registry, api-paste or registry-paste
    #[arg(value_name = "target")]
    pub(crate) target: ConfTarget,
    /// Setting name
    #[arg(value_name = "key")]
    pub(crate) key: String,
    /// Setting value
    #[arg(value_name = "value")]
    pub(crate) value: String,
}

impl CliSetConfig {
    /// Run the `set-config` sub-command.
    pub(crate) fn run(self) -> Result<()> {
        let glance_dir = Paths::from_env().glance_dir;
        conf::set_or_update(&glance_dir, self.target, &self.key, &self.value)?;
        slog_scope::info!("configuration updated"; "target" => self.target.to_string(), "key" => &self.key);
        Ok(())
    }
}
