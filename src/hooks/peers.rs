//! `cluster` peer relation: load-balance the API across units.

use super::{HookContext, Outcome, API_PORT};
use crate::cluster::{determine_api_port, determine_haproxy_port, peer_units};
use crate::conf::ConfTarget;
use crate::haproxy::{configure_haproxy, ServicePorts};
use crate::host::ServiceAction;
use anyhow::Result;
use slog_scope::info;

pub fn changed(ctx: &HookContext<'_>, _rid: Option<&str>) -> Result<Outcome> {
    if peer_units(ctx.framework)?.is_empty() {
        return Ok(Outcome::awaiting("no peers"));
    }

    let haproxy_port = determine_haproxy_port(ctx, API_PORT)?;
    let backend_port = determine_api_port(ctx, API_PORT)?;
    info!("rebalancing API"; "haproxy" => haproxy_port, "backend" => backend_port);

    ctx.host.service(ServiceAction::Stop, "glance-api")?;
    configure_haproxy(
        ctx,
        &[ServicePorts {
            name: "glance_api".to_string(),
            frontend: haproxy_port,
            backend: backend_port,
        }],
    )?;
    ctx.set(ConfTarget::Api, "bind_port", &backend_port.to_string())?;
    ctx.host.service(ServiceAction::Start, "glance-api")?;
    Ok(Outcome::Ready)
}
