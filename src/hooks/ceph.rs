//! `ceph` relation: store images in an RBD pool.

use super::{HookContext, Outcome};
use crate::conf::ConfTarget;
use crate::host::ServiceAction;
use anyhow::{Context, Result};
use slog_scope::info;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;

pub const RELATION: &str = "ceph";
/// Pool holding the images.
const POOL: &str = "images";
/// Port of the ceph monitors.
const MON_PORT: u16 = 6789;

pub fn joined(ctx: &HookContext<'_>, _rid: Option<&str>) -> Result<Outcome> {
    let ceph_dir = &ctx.paths.ceph_dir;
    fs::create_dir_all(ceph_dir)
        .with_context(|| format!("failed to create '{}'", ceph_dir.display()))?;
    ctx.host.install_packages(&["ceph-common", "python-ceph"])?;
    Ok(Outcome::Ready)
}

/// Render `ceph.conf` for the given monitors.
pub fn render_ceph_conf(auth: &str, mon_hosts: &[String]) -> String {
    let mons: Vec<_> = mon_hosts
        .iter()
        .map(|host| format!("{host}:{MON_PORT}"))
        .collect();
    format!(
        "[global]\n auth supported = {auth}\n keyring = /etc/ceph/$cluster.$name.keyring\n mon host = {}\n",
        mons.join(",")
    )
}

/// Set up the ceph client, the images pool and the RBD store once the
/// monitors handed out a key.
pub fn changed(ctx: &HookContext<'_>, rid: Option<&str>) -> Result<Outcome> {
    let unit_name = ctx.framework.unit_name()?;
    let service = unit_name.split('/').next().unwrap_or(&unit_name);

    let unit = match rid {
        Some(rid) => match ctx.framework.relation_list(Some(rid))?.into_iter().next() {
            Some(unit) => Some(unit),
            None => return Ok(Outcome::awaiting(format!("no remote unit on '{rid}'"))),
        },
        None => None,
    };
    let unit = unit.as_deref();

    let key = ctx.framework.relation_get("key", rid, unit)?;
    let auth = ctx.framework.relation_get("auth", rid, unit)?;
    let (key, auth) = match (key, auth) {
        (Some(key), Some(auth)) => (key, auth),
        _ => return Ok(Outcome::awaiting("ceph key or auth not provided yet")),
    };

    let keyring = ctx
        .paths
        .ceph_dir
        .join(format!("ceph.client.{service}.keyring"));
    if !keyring.exists() {
        create_keyring(ctx, &keyring, service, &key)?;
    }

    let mut mon_hosts = Vec::new();
    for mon in ctx.framework.relation_list(rid)? {
        if let Some(address) = ctx.framework.relation_get("private-address", rid, Some(&mon))? {
            mon_hosts.push(address);
        }
    }
    let conf_path = ctx.paths.ceph_dir.join("ceph.conf");
    fs::write(&conf_path, render_ceph_conf(&auth, &mon_hosts))
        .with_context(|| format!("failed to write '{}'", conf_path.display()))?;

    let pools = ctx.host.run("rados", &["--id", service, "lspools"])?;
    if !pools.lines().any(|p| p.trim() == POOL) {
        info!("creating ceph pool"; "pool" => POOL);
        ctx.host.run("rados", &["--id", service, "mkpool", POOL])?;
    }

    let conf_path = conf_path.to_string_lossy();
    let settings = [
        ("default_store", "rbd"),
        ("rbd_store_ceph_conf", &*conf_path),
        ("rbd_store_user", service),
        ("rbd_store_pool", POOL),
        ("rbd_store_chunk_size", "8"),
    ];
    for (key, value) in settings {
        ctx.set(ConfTarget::Api, key, value)?;
    }
    ctx.host.service(ServiceAction::Restart, "glance-api")?;
    Ok(Outcome::Ready)
}

fn create_keyring(ctx: &HookContext<'_>, keyring: &Path, service: &str, key: &str) -> Result<()> {
    info!("creating ceph keyring"; "path" => keyring.display().to_string());
    let path = keyring.to_string_lossy();
    let name = format!("--name=client.{service}");
    let add_key = format!("--add-key={key}");
    ctx.host
        .run(
            "ceph-authtool",
            &[&*path, "--create-keyring", name.as_str(), add_key.as_str()],
        )
        .context("failed to create ceph keyring")?;
    if keyring.exists() {
        let mut permissions = fs::metadata(keyring)?.permissions();
        permissions.set_mode(permissions.mode() | 0o444);
        fs::set_permissions(keyring, permissions)
            .with_context(|| format!("failed to make '{}' readable", keyring.display()))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_ceph_conf() {
        let conf = render_ceph_conf("cephx", &["10.0.0.1".to_string(), "10.0.0.2".to_string()]);
        assert_eq!(
            conf,
            "[global]\n auth supported = cephx\n keyring = /etc/ceph/$cluster.$name.keyring\n \
             mon host = 10.0.0.1:6789,10.0.0.2:6789\n"
        );
    }
}
