//! `ha` relation: pacemaker resources for the VIP and haproxy.

use super::{identity, image_service, HookContext, Outcome, VIP_RESOURCE};
use crate::cluster::{canonical_url, eligible_leader, IDENTITY_RELATION};
use crate::juju::RelationData;
use anyhow::{Context, Result};
use ipnetwork::IpNetwork;
use slog_scope::info;
use std::collections::BTreeMap;
use std::net::IpAddr;

const HAPROXY_RESOURCE: &str = "res_glance_haproxy";

/// Render a map as a Python dict literal, the format hacluster parses.
pub fn python_dict(map: &BTreeMap<&str, String>) -> String {
    let quote = |s: &str| format!("'{}'", s.replace('\\', "\\\\").replace('\'', "\\'"));
    let items: Vec<_> = map
        .iter()
        .map(|(k, v)| format!("{}: {}", quote(k), quote(v)))
        .collect();
    format!("{{{}}}", items.join(", "))
}

/// Validated HA settings from the charm configuration.
#[derive(Clone, Debug)]
struct HaSettings {
    vip: IpNetwork,
    vip_iface: String,
    bindiface: String,
    mcastport: u16,
}

fn ha_settings(ctx: &HookContext<'_>) -> Result<HaSettings> {
    let config = &ctx.config;
    let require = |value: &Option<String>, name: &str| {
        value.clone().with_context(|| {
            format!("insufficient configuration to configure hacluster: '{name}' is not set")
        })
    };

    let vip: IpAddr = require(&config.vip, "vip")?
        .parse()
        .context("invalid 'vip'")?;
    let cidr: u8 = require(&config.vip_cidr, "vip_cidr")?
        .parse()
        .context("invalid 'vip_cidr'")?;
    let vip = IpNetwork::new(vip, cidr).context("invalid 'vip'/'vip_cidr' combination")?;
    let mcastport: u16 = require(&config.ha_mcastport, "ha-mcastport")?
        .parse()
        .context("invalid 'ha-mcastport'")?;

    Ok(HaSettings {
        vip,
        vip_iface: require(&config.vip_iface, "vip_iface")?,
        bindiface: require(&config.ha_bindiface, "ha-bindiface")?,
        mcastport,
    })
}

/// Describe the pacemaker resources to the hacluster subordinate.
pub fn joined(ctx: &HookContext<'_>, _rid: Option<&str>) -> Result<Outcome> {
    let settings = ha_settings(ctx)?;

    let resources = maplit::btreemap! {
        VIP_RESOURCE => "ocf:heartbeat:IPaddr2".to_string(),
        HAPROXY_RESOURCE => "lsb:haproxy".to_string(),
    };
    let resource_params = maplit::btreemap! {
        VIP_RESOURCE => format!(
            "params ip=\"{}\" cidr_netmask=\"{}\" nic=\"{}\"",
            settings.vip.ip(),
            settings.vip.prefix(),
            settings.vip_iface
        ),
        HAPROXY_RESOURCE => "op monitor interval=\"5s\"".to_string(),
    };
    let init_services = maplit::btreemap! {
        HAPROXY_RESOURCE => "haproxy".to_string(),
    };
    let clones = maplit::btreemap! {
        "cl_glance_haproxy" => HAPROXY_RESOURCE.to_string(),
    };

    info!("requesting HA resources"; "vip" => settings.vip.to_string());
    let mut data = RelationData::new();
    data.insert("init_services".to_string(), python_dict(&init_services));
    data.insert("resources".to_string(), python_dict(&resources));
    data.insert("resource_params".to_string(), python_dict(&resource_params));
    data.insert("clones".to_string(), python_dict(&clones));
    data.insert("corosync_bindiface".to_string(), settings.bindiface);
    data.insert("corosync_mcastport".to_string(), settings.mcastport.to_string());

    ctx.framework.relation_set(None, &data)?;
    Ok(Outcome::Ready)
}

/// Once clustered, move every consumer over to the VIP.
pub fn changed(ctx: &HookContext<'_>, _rid: Option<&str>) -> Result<Outcome> {
    let data = ctx.framework.relation_get_all(None, None)?;
    if !data.contains_key("clustered") {
        return Ok(Outcome::awaiting("hacluster has not formed the cluster yet"));
    }
    if !eligible_leader(ctx, VIP_RESOURCE)? {
        info!("cluster formed, leaving endpoint updates to the leader");
        return Ok(Outcome::Ready);
    }

    let url = canonical_url(ctx)?;
    info!("cluster configured, notifying related services"; "url" => &url);
    for rid in ctx.framework.relation_ids(IDENTITY_RELATION)? {
        ctx.framework
            .relation_set(Some(&rid), &identity::endpoint_data(&ctx.config.region, &url))?;
    }
    for rid in ctx.framework.relation_ids(image_service::RELATION)? {
        ctx.framework
            .relation_set(Some(&rid), &image_service::endpoint_data(&url))?;
    }
    Ok(Outcome::Ready)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_python_dict() {
        let map = maplit::btreemap! {
            "res_b" => "op monitor interval=\"5s\"".to_string(),
            "res_a" => "it's".to_string(),
        };
        assert_eq!(
            python_dict(&map),
            r#"{'res_a': 'it\'s', 'res_b': 'op monitor interval="5s"'}"#
        );
        assert_eq!(python_dict(&BTreeMap::new()), "{}");
    }
}
