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

//! haproxy load-balancing across peer units.
//!
//! All that is left to the hooks is to pick the ports; this module renders
//! the whole configuration and (re)starts haproxy.

use crate::cluster::CLUSTER_RELATION;
use crate::hooks::HookContext;
use crate::host::ServiceAction;
use anyhow::{Context, Result};
use slog_scope::{info, warn};
use std::fmt::Write;
use std::fs;

const HAPROXY_HEADER: &str = "\
global
    log 127.0.0.1 local0
    log 127.0.0.1 local1 notice
    maxconn 20000
    user haproxy
    group haproxy
    spread-checks 0

defaults
    log global
    mode http
    option httplog
    option dontlognull
    retries 3
    timeout queue 1000
    timeout connect 1000
    timeout client 30000
    timeout server 30000

listen stats :8888
    mode http
    stats enable
    stats hide-version
    stats realm Haproxy\\ Statistics
    stats uri /
    stats auth admin:password
";

/// A load-balanced service: haproxy listens on `frontend` and forwards to
/// `backend` on every unit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServicePorts {
    pub name: String,
    pub frontend: u16,
    pub backend: u16,
}

/// A backend server, named after its unit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Server {
    pub name: String,
    pub address: String,
}

impl Server {
    pub fn new(unit: &str, address: &str) -> Self {
        Self {
            name: unit.replace('/', "-"),
            address: address.to_string(),
        }
    }
}

/// Render a complete `haproxy.cfg`.
pub fn render_config(services: &[ServicePorts], servers: &[Server]) -> String {
    let mut config = String::from(HAPROXY_HEADER);
    for service in services {
        let _ = write!(
            config,
            "\nlisten {} 0.0.0.0:{}\n    balance roundrobin\n    option tcplog\n",
            service.name, service.frontend
        );
        for server in servers {
            let _ = writeln!(
                config,
                "    server {} {}:{} check",
                server.name, server.address, service.backend
            );
        }
    }
    config
}

/// This unit plus every peer with a known address.
fn cluster_servers(ctx: &HookContext<'_>) -> Result<Vec<Server>> {
    let framework = ctx.framework;
    let mut servers = vec![Server::new(
        &framework.unit_name()?,
        &framework.unit_get("private-address")?,
    )];
    for rid in framework.relation_ids(CLUSTER_RELATION)? {
        for unit in framework.relation_list(Some(&rid))? {
            match framework.relation_get("private-address", Some(&rid), Some(&unit))? {
                Some(address) => servers.push(Server::new(&unit, &address)),
                None => warn!("peer '{}' has no address yet, skipping", unit),
            }
        }
    }
    Ok(servers)
}

/// Write the haproxy configuration for `services`, enable and restart it.
pub fn configure_haproxy(ctx: &HookContext<'_>, services: &[ServicePorts]) -> Result<()> {
    let servers = cluster_servers(ctx)?;
    let names: Vec<_> = services.iter().map(|s| s.name.as_str()).collect();
    info!("configuring haproxy"; "servers" => servers.len(), "services" => names.join(","));

    let cfg_path = &ctx.paths.haproxy_cfg;
    if let Some(dir) = cfg_path.parent() {
        fs::create_dir_all(dir)
            .with_context(|| format!("failed to create '{}'", dir.display()))?;
    }
    fs::write(cfg_path, render_config(services, &servers))
        .with_context(|| format!("failed to write '{}'", cfg_path.display()))?;

    let default_path = &ctx.paths.haproxy_default;
    if let Some(dir) = default_path.parent() {
        fs::create_dir_all(dir)
            .with_context(|| format!("failed to create '{}'", dir.display()))?;
    }
    fs::write(default_path, "ENABLED=1\n")
        .with_context(|| format!("failed to write '{}'", default_path.display()))?;

    ctx.host.service(ServiceAction::Restart, "haproxy")
}
