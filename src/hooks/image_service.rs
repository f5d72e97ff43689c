//! `image-service` relation: hand the API endpoint to image consumers.

use super::{HookContext, Outcome, VIP_RESOURCE};
use crate::cluster::{canonical_url, eligible_leader};
use crate::juju::RelationData;
use anyhow::Result;
use slog_scope::info;

pub const RELATION: &str = "image-service";

/// Settings announcing the API endpoint.
pub fn endpoint_data(url: &str) -> RelationData {
    let mut data = RelationData::new();
    data.insert("glance-api-server".to_string(), url.to_string());
    data
}

/// Publish the API URL; only the leader speaks for the service.
pub fn joined(ctx: &HookContext<'_>, rid: Option<&str>) -> Result<Outcome> {
    if !eligible_leader(ctx, VIP_RESOURCE)? {
        info!("deferring image-service endpoint to service leader");
        return Ok(Outcome::Ready);
    }

    let url = canonical_url(ctx)?;
    info!("announcing image service"; "glance-api-server" => &url, "relation-id" => rid);
    ctx.framework.relation_set(rid, &endpoint_data(&url))?;
    Ok(Outcome::Ready)
}

/// Nothing is consumed from image-service clients.
pub fn changed(_ctx: &HookContext<'_>, _rid: Option<&str>) -> Result<Outcome> {
    Ok(Outcome::Ready)
}
