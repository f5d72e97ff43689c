//! `shared-db` relation: database access for the registry and API servers.

use super::lifecycle::COMMON_PACKAGE;
use super::{HookContext, Outcome, VIP_RESOURCE};
use crate::cluster::eligible_leader;
use crate::conf::ConfTarget;
use crate::host::ServiceAction;
use crate::juju::RelationData;
use crate::openstack::os_codename_package;
use anyhow::Result;
use slog_scope::info;

pub const RELATION: &str = "shared-db";

/// Request a database and credentials for this unit.
pub fn joined(ctx: &HookContext<'_>, _rid: Option<&str>) -> Result<Outcome> {
    let hostname = ctx.framework.unit_get("private-address")?;
    info!(
        "requesting database access";
        "database" => &ctx.config.glance_db, "user" => &ctx.config.db_user, "host" => &hostname
    );
    let mut data = RelationData::new();
    data.insert("database".to_string(), ctx.config.glance_db.clone());
    data.insert("username".to_string(), ctx.config.db_user.clone());
    data.insert("hostname".to_string(), hostname);
    ctx.framework.relation_set(None, &data)?;
    Ok(Outcome::Ready)
}

/// Connection string for the glance database.
pub fn sql_connection(user: &str, password: &str, host: &str, database: &str) -> String {
    format!("mysql://{user}:{password}@{host}/{database}")
}

/// Point both servers at the database once the remote side granted access.
///
/// With `rid`, the first remote unit of that relation is used instead of
/// the unit of the current event.
pub fn changed(ctx: &HookContext<'_>, rid: Option<&str>) -> Result<Outcome> {
    let unit = match rid {
        Some(rid) => match ctx.framework.relation_list(Some(rid))?.into_iter().next() {
            Some(unit) => {
                info!("configuring existing relation"; "relation-id" => rid, "unit" => &unit);
                Some(unit)
            }
            None => return Ok(Outcome::awaiting(format!("no remote unit on '{rid}'"))),
        },
        None => None,
    };
    let unit = unit.as_deref();

    let db_host = ctx.framework.relation_get("db_host", rid, unit)?;
    let password = ctx.framework.relation_get("password", rid, unit)?;
    let (db_host, password) = match (db_host, password) {
        (Some(host), Some(password)) => (host, password),
        _ => return Ok(Outcome::awaiting("db_host or password not set yet")),
    };

    let release = os_codename_package(ctx.host, COMMON_PACKAGE)?;
    let database = &ctx.config.glance_db;
    info!("configuring database access"; "database" => database, "host" => &db_host);

    let url = sql_connection(&ctx.config.db_user, &password, &db_host, database);
    ctx.set(ConfTarget::Registry, "sql_connection", &url)?;
    // Since folsom the API server needs its own database connection.
    if release != Some("essex") {
        ctx.set(ConfTarget::Api, "sql_connection", &url)?;
    }

    if eligible_leader(ctx, VIP_RESOURCE)? {
        if release == Some("essex") && ctx.host.run("glance-manage", &["db_version"]).is_err() {
            info!("setting glance database version to 0");
            ctx.host.run("glance-manage", &["version_control", "0"])?;
        }
        info!("running database migrations"; "release" => release.unwrap_or("unknown"));
        ctx.host.run("glance-manage", &["db_sync"])?;
    }

    ctx.services(ServiceAction::Restart)?;
    Ok(Outcome::Ready)
}
