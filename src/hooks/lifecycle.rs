//! Unit lifecycle hooks: install, start/stop, configuration and upgrades.

use super::{ceph, identity, peers, shared_db, HookContext, Outcome, PACKAGES, SERVICES};
use crate::cluster::IDENTITY_RELATION;
use crate::host::ServiceAction;
use crate::https::configure_https;
use crate::openstack;
use anyhow::{Context, Result};
use slog_scope::{info, warn};

/// Package whose version tells the installed OpenStack release.
pub const COMMON_PACKAGE: &str = "glance-common";

pub fn install(ctx: &HookContext<'_>, _rid: Option<&str>) -> Result<Outcome> {
    info!("installing glance packages");
    openstack::configure_source(ctx, &ctx.config.openstack_origin)
        .context("configuring install source")?;
    ctx.host.install_packages(&PACKAGES)?;
    ctx.services(ServiceAction::Stop)?;
    configure_https(ctx).context("configuring HTTPS")?;
    Ok(Outcome::Ready)
}

pub fn start(ctx: &HookContext<'_>, _rid: Option<&str>) -> Result<Outcome> {
    ctx.services(ServiceAction::Start)?;
    Ok(Outcome::Ready)
}

pub fn stop(ctx: &HookContext<'_>, _rid: Option<&str>) -> Result<Outcome> {
    ctx.services(ServiceAction::Stop)?;
    Ok(Outcome::Ready)
}

pub fn config_changed(ctx: &HookContext<'_>, _rid: Option<&str>) -> Result<Outcome> {
    let source = &ctx.config.openstack_origin;
    let installed = openstack::os_codename_package(ctx.host, COMMON_PACKAGE)?;
    let available = openstack::os_codename_install_source(ctx.host, source)?;

    if let (Some(installed), Some(available)) = (installed, available) {
        if openstack::os_version_codename(available) > openstack::os_version_codename(installed) {
            info!("upgrading OpenStack release"; "from" => installed, "to" => available);
            do_openstack_upgrade(ctx, source).context("upgrading OpenStack release")?;
        }
    }

    configure_https(ctx).context("configuring HTTPS")?;
    ctx.services(ServiceAction::Restart)?;

    let env = maplit::btreemap! {
        "OPENSTACK_PORT_MCASTPORT" => ctx.config.ha_mcastport.clone().unwrap_or_default(),
        "OPENSTACK_SERVICE_API" => SERVICES[0].to_string(),
        "OPENSTACK_SERVICE_REGISTRY" => SERVICES[1].to_string(),
    };
    openstack::save_script_rc(ctx, &env)?;
    Ok(Outcome::Ready)
}

pub fn upgrade_charm(ctx: &HookContext<'_>, rid: Option<&str>) -> Result<Outcome> {
    peers::changed(ctx, rid)
}

/// Move to the release offered by `source`.
///
/// Package upgrades replace the configuration files, so relation hooks
/// are run again against every existing relation to restore them.
pub fn do_openstack_upgrade(ctx: &HookContext<'_>, source: &str) -> Result<()> {
    openstack::configure_source(ctx, source)?;
    ctx.host.upgrade_packages()?;
    ctx.host.install_packages(&PACKAGES)?;

    let rerun: [(&str, super::Handler); 3] = [
        (shared_db::RELATION, shared_db::changed),
        (IDENTITY_RELATION, identity::changed),
        (ceph::RELATION, ceph::changed),
    ];
    for (relation, handler) in rerun {
        for rid in ctx.framework.relation_ids(relation)? {
            info!("reconfiguring existing relation"; "relation-id" => &rid);
            if let Outcome::Awaiting(reason) = handler(ctx, Some(&rid))? {
                warn!("relation '{}' not ready after upgrade: {}", rid, reason);
            }
        }
    }
    Ok(())
}
