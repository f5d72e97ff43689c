// Copyright 2024 Canonical Ltd.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Local machine operations: packages, services and external commands.

use crate::util::try_exec;
use anyhow::{Context, Result};
use slog_scope::{debug, info};
use std::fmt;
use std::process::Command;

/// Init system actions.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ServiceAction {
    Start,
    Stop,
    Restart,
}

impl fmt::Display for ServiceAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let action = match self {
            ServiceAction::Start => "start",
            ServiceAction::Stop => "stop",
            ServiceAction::Restart => "restart",
        };
        f.write_str(action)
    }
}

/// Side effects on the local machine.
pub trait Host {
    /// Install packages non-interactively.
    fn install_packages(&self, packages: &[&str]) -> Result<()>;

    /// Upgrade all installed packages, taking new configuration files.
    fn upgrade_packages(&self) -> Result<()>;

    /// Drive a system service.
    fn service(&self, action: ServiceAction, name: &str) -> Result<()>;

    /// Run a command to completion, returning its stdout.
    ///
    /// A non-zero exit status is an error.
    fn run(&self, program: &str, args: &[&str]) -> Result<String>;

    /// Local hostname.
    fn hostname(&self) -> Result<String>;
}

/// `Host` implementation acting on the running system.
#[derive(Clone, Debug, Default)]
pub struct SystemHost;

impl Host for SystemHost {
    fn install_packages(&self, packages: &[&str]) -> Result<()> {
        if packages.is_empty() {
            return Ok(());
        }
        info!("installing packages: {}", packages.join(" "));
        let mut cmd = Command::new("apt-get");
        cmd.env("DEBIAN_FRONTEND", "noninteractive")
            .args(["-y", "install"])
            .args(packages);
        try_exec(cmd).context("package installation failed")?;
        Ok(())
    }

    fn upgrade_packages(&self) -> Result<()> {
        info!("upgrading installed packages");
        let mut cmd = Command::new("apt-get");
        cmd.env("DEBIAN_FRONTEND", "noninteractive")
            .args(["-y", "--option", "Dpkg::Options::=--force-confnew", "dist-upgrade"]);
        try_exec(cmd).context("package upgrade failed")?;
        Ok(())
    }

    fn service(&self, action: ServiceAction, name: &str) -> Result<()> {
        debug!("service {} {}", name, action);
        let mut cmd = Command::new("service");
        cmd.arg(name).arg(action.to_string());
        try_exec(cmd).with_context(|| format!("failed to {action} service '{name}'"))?;
        Ok(())
    }

    fn run(&self, program: &str, args: &[&str]) -> Result<String> {
        let mut cmd = Command::new(program);
        cmd.args(args);
        try_exec(cmd)
    }

    fn hostname(&self) -> Result<String> {
        let hostname = nix::unistd::gethostname().context("failed to get hostname")?;
        Ok(hostname.to_string_lossy().into_owned())
    }
}
