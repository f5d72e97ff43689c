//! `hook` CLI sub-command.

use crate::hooks::{self, Hook, HookContext, Paths};
use crate::host::SystemHost;
use crate::juju::{Framework, JujuCli};
use anyhow::{Context, Result};
use clap::Parser;
use slog_scope::info;

/// Handle a framework event
#[derive(Debug, Parser)]
pub struct CliHook {
    /// The event name, e.g. `config-changed`
    #[arg(value_name = "event")]
    pub(crate) event: String,
    /// Configure an existing relation instead of the current one
    #[arg(long, value_name = "rid")]
    pub(crate) relation_id: Option<String>,
}

impl CliHook {
    /// Run the `hook` sub-command.
    pub(crate) fn run(self) -> Result<()> {
        // Reject unknown events before touching anything.
        let hook: Hook = self.event.parse()?;

        let framework = JujuCli::default();
        let host = SystemHost::default();
        let ctx = HookContext {
            config: framework.config().context("reading charm configuration")?,
            framework: &framework,
            host: &host,
            paths: Paths::from_env(),
        };

        let outcome = hooks::dispatch(hook, &ctx, self.relation_id.as_deref())?;
        info!("hook finished"; "hook" => hook.name(), "outcome" => %outcome);
        Ok(())
    }
}
