//! `object-store` relation: store images in swift.
//!
//! Swift credentials are the service credentials keystone handed out, so
//! this needs an identity-service relation first.

use super::{HookContext, Outcome};
use crate::cluster::IDENTITY_RELATION;
use crate::conf::ConfTarget;
use crate::host::ServiceAction;
use anyhow::Result;
use slog_scope::info;

pub const RELATION: &str = "object-store";

pub fn joined(ctx: &HookContext<'_>, _rid: Option<&str>) -> Result<Outcome> {
    let identity_rids = ctx.framework.relation_ids(IDENTITY_RELATION)?;
    if identity_rids.is_empty() {
        return Ok(Outcome::awaiting(
            "swift store configuration needs an identity-service relation",
        ));
    }

    info!("configuring swift image store");
    ctx.set(ConfTarget::Api, "default_store", "swift")?;
    ctx.set(ConfTarget::Api, "swift_store_create_container_on_put", "true")?;

    for rid in &identity_rids {
        for unit in ctx.framework.relation_list(Some(rid))? {
            let data = ctx.framework.relation_get_all(Some(rid), Some(&unit))?;
            let get = |key: &str| data.get(key).map(String::as_str);

            if let (Some(tenant), Some(user)) = (get("service_tenant"), get("service_username")) {
                ctx.set(ConfTarget::Api, "swift_store_user", &format!("{tenant}:{user}"))?;
            }
            if let Some(password) = get("service_password") {
                ctx.set(ConfTarget::Api, "swift_store_key", password)?;
            }
            if let (Some(host), Some(port)) = (get("private-address"), get("service_port")) {
                let auth_url = format!("http://{host}:{port}/v2.0/");
                ctx.set(ConfTarget::Api, "swift_store_auth_address", &auth_url)?;
            }
        }
    }

    ctx.host.service(ServiceAction::Restart, "glance-api")?;
    Ok(Outcome::Ready)
}

/// Swift needs nothing beyond what `joined` configures.
pub fn changed(_ctx: &HookContext<'_>, _rid: Option<&str>) -> Result<Outcome> {
    Ok(Outcome::Ready)
}
