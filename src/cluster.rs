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

//! Peer, leadership and HTTPS state of the service.
//!
//! Nothing here is cached: every query goes back to the framework or the
//! host, since another unit may have changed the answer since the last
//! event.

use crate::hooks::{HookContext, API_PORT};
use crate::host::Host;
use crate::juju::Framework;
use crate::util::split_unit_name;
use anyhow::{Context, Result};
use slog_scope::{debug, trace};

/// Peer relation between units of this service.
pub const CLUSTER_RELATION: &str = "cluster";
/// Relation to the hacluster subordinate.
pub const HA_RELATION: &str = "ha";
/// Relation to keystone.
pub const IDENTITY_RELATION: &str = "identity-service";

/// All remote units on the peer relation.
pub fn peer_units(framework: &dyn Framework) -> Result<Vec<String>> {
    let mut peers = Vec::new();
    for rid in framework.relation_ids(CLUSTER_RELATION)? {
        peers.extend(framework.relation_list(Some(&rid))?);
    }
    Ok(peers)
}

/// Whether hacluster reports the service as clustered behind the VIP.
pub fn is_clustered(framework: &dyn Framework) -> Result<bool> {
    for rid in framework.relation_ids(HA_RELATION)? {
        for unit in framework.relation_list(Some(&rid))? {
            if framework
                .relation_get("clustered", Some(&rid), Some(&unit))?
                .is_some()
            {
                return Ok(true);
            }
        }
    }
    Ok(false)
}

/// Whether pacemaker currently runs `resource` on this host.
pub fn is_crm_leader(host: &dyn Host, resource: &str) -> Result<bool> {
    let status = match host.run("crm", &["resource", "show", resource]) {
        Ok(status) => status,
        Err(e) => {
            debug!("crm status for '{}' unavailable: {}", resource, e);
            return Ok(false);
        }
    };
    let hostname = host.hostname()?;
    trace!("crm status for '{}': {}", resource, status.trim());
    Ok(status.contains(&hostname))
}

/// Whether `unit` has the lowest unit number among itself and `peers`.
pub fn oldest_peer(unit: &str, peers: &[String]) -> Result<bool> {
    let (_, local) = split_unit_name(unit)?;
    for peer in peers {
        let (_, remote) = split_unit_name(peer)?;
        if remote < local {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Whether this unit should perform service-wide actions.
///
/// When clustered, pacemaker decides through `resource`; otherwise the
/// oldest unit among its peers is the leader.
pub fn eligible_leader(ctx: &HookContext<'_>, resource: &str) -> Result<bool> {
    if is_clustered(ctx.framework)? {
        return is_crm_leader(ctx.host, resource);
    }
    let peers = peer_units(ctx.framework)?;
    if peers.is_empty() {
        return Ok(true);
    }
    oldest_peer(&ctx.framework.unit_name()?, &peers)
}

/// Whether the API is fronted by HTTPS.
///
/// Either a certificate is configured locally, or keystone hands out one
/// through the identity-service relation.
pub fn https_enabled(ctx: &HookContext<'_>) -> Result<bool> {
    if ctx.config.ssl_cert.is_some() && ctx.config.ssl_key.is_some() {
        return Ok(true);
    }
    for rid in ctx.framework.relation_ids(IDENTITY_RELATION)? {
        for unit in ctx.framework.relation_list(Some(&rid))? {
            let data = ctx.framework.relation_get_all(Some(&rid), Some(&unit))?;
            if ["https_keystone", "ssl_cert", "ssl_key", "ca_cert"]
                .iter()
                .all(|k| data.contains_key(*k))
            {
                return Ok(true);
            }
        }
    }
    Ok(false)
}

/// Port the API server listens on, shifted down by 10 for each proxy
/// layer (haproxy, apache) placed in front of it.
pub fn determine_api_port(ctx: &HookContext<'_>, public_port: u16) -> Result<u16> {
    let mut layers = 0;
    if !peer_units(ctx.framework)?.is_empty() || is_clustered(ctx.framework)? {
        layers += 1;
    }
    if https_enabled(ctx)? {
        layers += 1;
    }
    Ok(public_port - layers * 10)
}

/// Port haproxy listens on, below apache when HTTPS is enabled.
pub fn determine_haproxy_port(ctx: &HookContext<'_>, public_port: u16) -> Result<u16> {
    if https_enabled(ctx)? {
        Ok(public_port - 10)
    } else {
        Ok(public_port)
    }
}

/// Externally reachable URL of the image API.
pub fn canonical_url(ctx: &HookContext<'_>) -> Result<String> {
    let scheme = if https_enabled(ctx)? { "https" } else { "http" };
    let host = if is_clustered(ctx.framework)? {
        ctx.config
            .vip
            .clone()
            .context("service is clustered but no 'vip' is configured")?
    } else {
        ctx.framework.unit_get("private-address")?
    };
    Ok(format!("{scheme}://{host}:{API_PORT}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hooks::Paths;
    use crate::mock::{MockFramework, MockHost};

    fn context<'a>(framework: &'a MockFramework, host: &'a MockHost) -> HookContext<'a> {
        HookContext {
            config: framework.config.clone(),
            framework,
            host,
            paths: Paths::rooted(std::path::Path::new("/nonexistent"), "/nonexistent".into()),
        }
    }

    #[test]
    fn test_oldest_peer() {
        let peers = vec!["glance/1".to_string(), "glance/3".to_string()];
        assert!(oldest_peer("glance/0", &peers).unwrap());
        assert!(!oldest_peer("glance/2", &peers).unwrap());
        assert!(oldest_peer("glance/2", &[]).unwrap());
        oldest_peer("glance", &peers).unwrap_err();
    }

    #[test]
    fn test_eligible_leader_unclustered() {
        let host = MockHost::default();
        let mut framework = MockFramework::default();
        assert!(eligible_leader(&context(&framework, &host), "res_glance_vip").unwrap());

        framework.unit = "glance/2".to_string();
        framework.add_unit("cluster:1", "glance/1", &[]);
        assert!(!eligible_leader(&context(&framework, &host), "res_glance_vip").unwrap());

        framework.unit = "glance/0".to_string();
        assert!(eligible_leader(&context(&framework, &host), "res_glance_vip").unwrap());
    }

    #[test]
    fn test_eligible_leader_clustered() {
        let mut host = MockHost::default();
        let mut framework = MockFramework::default();
        framework.add_unit("ha:2", "hacluster/0", &[("clustered", "yes")]);
        // Unreachable crm: not the leader.
        host.script("crm resource show res_glance_vip", Err("not running"));
        assert!(!eligible_leader(&context(&framework, &host), "res_glance_vip").unwrap());

        host.script(
            "crm resource show res_glance_vip",
            Ok("resource res_glance_vip is running on: juju-glance-0\n"),
        );
        assert!(eligible_leader(&context(&framework, &host), "res_glance_vip").unwrap());

        host.hostname = "juju-glance-1".to_string();
        assert!(!eligible_leader(&context(&framework, &host), "res_glance_vip").unwrap());
    }

    #[test]
    fn test_https_enabled() {
        let host = MockHost::default();
        let mut framework = MockFramework::default();
        assert!(!https_enabled(&context(&framework, &host)).unwrap());

        framework.add_unit("identity-service:5", "keystone/0", &[("https_keystone", "True")]);
        assert!(!https_enabled(&context(&framework, &host)).unwrap());

        framework.add_unit(
            "identity-service:5",
            "keystone/0",
            &[
                ("https_keystone", "True"),
                ("ssl_cert", "Y2VydA=="),
                ("ssl_key", "a2V5"),
                ("ca_cert", "Y2E="),
            ],
        );
        assert!(https_enabled(&context(&framework, &host)).unwrap());

        let mut framework = MockFramework::default();
        framework.config.ssl_cert = Some("Y2VydA==".to_string());
        framework.config.ssl_key = Some("a2V5".to_string());
        assert!(https_enabled(&context(&framework, &host)).unwrap());
    }

    #[test]
    fn test_port_layout() {
        let host = MockHost::default();
        let mut framework = MockFramework::default();
        let ports = |framework: &MockFramework| {
            let ctx = context(framework, &host);
            (
                determine_api_port(&ctx, 9292).unwrap(),
                determine_haproxy_port(&ctx, 9292).unwrap(),
            )
        };
        assert_eq!(ports(&framework), (9292, 9292));

        framework.add_unit("cluster:1", "glance/1", &[]);
        assert_eq!(ports(&framework), (9282, 9292));

        framework.config.ssl_cert = Some("Y2VydA==".to_string());
        framework.config.ssl_key = Some("a2V5".to_string());
        assert_eq!(ports(&framework), (9272, 9282));
    }

    #[test]
    fn test_canonical_url() {
        let host = MockHost::default();
        let mut framework = MockFramework::default();
        assert_eq!(
            canonical_url(&context(&framework, &host)).unwrap(),
            "http://10.0.0.10:9292"
        );

        framework.add_unit("ha:2", "hacluster/0", &[("clustered", "yes")]);
        canonical_url(&context(&framework, &host)).unwrap_err();

        framework.config.vip = Some("10.0.0.100".to_string());
        framework.config.ssl_cert = Some("Y2VydA==".to_string());
        framework.config.ssl_key = Some("a2V5".to_string());
        assert_eq!(
            canonical_url(&context(&framework, &host)).unwrap(),
            "https://10.0.0.100:9292"
        );
    }
}
