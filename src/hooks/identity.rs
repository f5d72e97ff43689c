//! `identity-service` relation: keystone endpoint registration and
//! authentication middleware.

use super::{object_store, HookContext, Outcome, SERVICE, VIP_RESOURCE};
use crate::cluster::{canonical_url, eligible_leader};
use crate::conf::{set_paste_deploy_flavor, ConfTarget};
use crate::host::ServiceAction;
use crate::https::configure_https;
use crate::juju::RelationData;
use anyhow::{bail, Result};
use slog_scope::{error, info};

/// Sentinel keystone sends instead of a token when it refused us one.
const INVALID_TOKEN: &str = "-1";

/// Settings registering `url` as every endpoint of the image service.
pub fn endpoint_data(region: &str, url: &str) -> RelationData {
    let mut data = RelationData::new();
    data.insert("service".to_string(), SERVICE.to_string());
    data.insert("region".to_string(), region.to_string());
    for key in ["public_url", "admin_url", "internal_url"] {
        data.insert(key.to_string(), url.to_string());
    }
    data
}

/// Register the image service endpoint; only the leader does so.
pub fn joined(ctx: &HookContext<'_>, rid: Option<&str>) -> Result<Outcome> {
    if !eligible_leader(ctx, VIP_RESOURCE)? {
        info!("deferring keystone endpoint registration to service leader");
        return Ok(Outcome::Ready);
    }

    let url = canonical_url(ctx)?;
    info!("registering keystone endpoint"; "url" => &url, "relation-id" => rid);
    ctx.framework
        .relation_set(rid, &endpoint_data(&ctx.config.region, &url))?;
    Ok(Outcome::Ready)
}

/// Settings keystone must provide before the middleware can be configured.
const REQUIRED: [&str; 6] = [
    "admin_token",
    "service_port",
    "auth_port",
    "service_username",
    "service_password",
    "service_tenant",
];

/// Configure keystone authentication for both servers.
///
/// With `rid`, the first remote unit of that relation is used instead of
/// the unit of the current event.
pub fn changed(ctx: &HookContext<'_>, rid: Option<&str>) -> Result<Outcome> {
    let unit = match rid {
        Some(rid) => match ctx.framework.relation_list(Some(rid))?.into_iter().next() {
            Some(unit) => Some(unit),
            None => return Ok(Outcome::awaiting(format!("no remote unit on '{rid}'"))),
        },
        None => None,
    };
    let data = ctx.framework.relation_get_all(rid, unit.as_deref())?;

    let missing: Vec<_> = REQUIRED
        .iter()
        .copied()
        .filter(|k| !data.contains_key(*k))
        .collect();
    if !missing.is_empty() {
        return Ok(Outcome::awaiting(format!(
            "keystone has not provided {}",
            missing.join(", ")
        )));
    }

    let token = &data["admin_token"];
    if token == INVALID_TOKEN {
        error!("keystone refused to provide an admin token");
        bail!("admin token error");
    }
    info!("acquired admin token");

    let keystone_host = match data.get("auth_host").or_else(|| data.get("private-address")) {
        Some(host) => host,
        None => return Ok(Outcome::awaiting("keystone host unknown")),
    };
    let service_port = &data["service_port"];
    let auth_uri = format!("http://{keystone_host}:{service_port}/");

    let glance_dir = &ctx.paths.glance_dir;
    set_paste_deploy_flavor(glance_dir, ConfTarget::Api, "keystone")?;
    set_paste_deploy_flavor(glance_dir, ConfTarget::Registry, "keystone")?;

    let settings = [
        ("service_host", keystone_host.as_str()),
        ("service_port", service_port.as_str()),
        ("auth_host", keystone_host.as_str()),
        ("auth_port", data["auth_port"].as_str()),
        ("auth_uri", auth_uri.as_str()),
        ("admin_token", token.as_str()),
        ("admin_tenant_name", data["service_tenant"].as_str()),
        ("admin_user", data["service_username"].as_str()),
        ("admin_password", data["service_password"].as_str()),
    ];
    for target in [ConfTarget::ApiPaste, ConfTarget::RegistryPaste] {
        for (key, value) in settings {
            ctx.set(target, key, value)?;
        }
    }
    ctx.services(ServiceAction::Restart)?;

    // Swift credentials come from keystone too.
    if !ctx
        .framework
        .relation_ids(object_store::RELATION)?
        .is_empty()
    {
        object_store::joined(ctx, None)?;
    }

    configure_https(ctx)?;
    Ok(Outcome::Ready)
}
