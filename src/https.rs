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

//! SSL termination in front of the API.
//!
//! Request pipeline, depending on peers and HTTPS:
//!
//! ```text
//! plain, single unit:   glance-api (9292)
//! plain, clustered:     haproxy (9292) -> glance-api (9282)
//! https, single unit:   apache (9292) -> glance-api (9282)
//! https, clustered:     apache (9292) -> haproxy (9282) -> glance-api (9272)
//! ```

use crate::cluster::{self, IDENTITY_RELATION};
use crate::conf::ConfTarget;
use crate::haproxy::{self, ServicePorts};
use crate::hooks::{identity, image_service, HookContext, Outcome, API_PORT};
use crate::host::ServiceAction;
use anyhow::{bail, Context, Result};
use base64::Engine;
use slog_scope::{debug, info};
use std::fmt::Write;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;

/// Apache site proxying SSL to the local servers.
const SITE_NAME: &str = "openstack_https_frontend";

/// Set up the request pipeline for the current HTTPS and peer state, then
/// re-announce endpoints since their scheme or address may have changed.
pub fn configure_https(ctx: &HookContext<'_>) -> Result<()> {
    ctx.host.service(ServiceAction::Stop, "glance-api")?;

    let api_port = cluster::determine_api_port(ctx, API_PORT)?;
    let clustered = cluster::is_clustered(ctx.framework)?;
    let next_server = if clustered || !cluster::peer_units(ctx.framework)?.is_empty() {
        let haproxy_port = cluster::determine_haproxy_port(ctx, API_PORT)?;
        haproxy::configure_haproxy(
            ctx,
            &[ServicePorts {
                name: "glance_api".to_string(),
                frontend: haproxy_port,
                backend: api_port,
            }],
        )?;
        haproxy_port
    } else {
        api_port
    };

    setup_https(ctx, &[(API_PORT, next_server)])?;
    ctx.set(ConfTarget::Api, "bind_port", &api_port.to_string())?;
    ctx.services(ServiceAction::Start)?;

    for rid in ctx.framework.relation_ids(IDENTITY_RELATION)? {
        report("identity-service-relation-joined", &rid, identity::joined(ctx, Some(&rid))?);
    }
    for rid in ctx.framework.relation_ids(image_service::RELATION)? {
        report("image-service-relation-joined", &rid, image_service::joined(ctx, Some(&rid))?);
    }
    Ok(())
}

fn report(hook: &str, rid: &str, outcome: Outcome) {
    if let Outcome::Awaiting(reason) = outcome {
        info!("{} for '{}' waiting: {}", hook, rid, reason);
    }
}

/// Certificate and key, from charm configuration or keystone.
fn ssl_material(ctx: &HookContext<'_>) -> Result<Option<(Vec<u8>, Vec<u8>)>> {
    let (cert, key) = match (&ctx.config.ssl_cert, &ctx.config.ssl_key) {
        (Some(cert), Some(key)) => (cert.clone(), key.clone()),
        _ => {
            let mut found = None;
            'relations: for rid in ctx.framework.relation_ids(IDENTITY_RELATION)? {
                for unit in ctx.framework.relation_list(Some(&rid))? {
                    let data = ctx.framework.relation_get_all(Some(&rid), Some(&unit))?;
                    if let (Some(cert), Some(key)) = (data.get("ssl_cert"), data.get("ssl_key")) {
                        found = Some((cert.clone(), key.clone()));
                        break 'relations;
                    }
                }
            }
            match found {
                Some(pair) => pair,
                None => return Ok(None),
            }
        }
    };

    let engine = base64::engine::general_purpose::STANDARD;
    let cert = engine
        .decode(cert.trim())
        .context("failed to decode SSL certificate")?;
    let key = engine.decode(key.trim()).context("failed to decode SSL key")?;
    Ok(Some((cert, key)))
}

/// Render the apache site for `(external, internal)` port mappings.
pub fn render_site(mappings: &[(u16, u16)], server_name: &str, ssl_dir: &Path) -> String {
    let mut site = String::new();
    for (external, internal) in mappings {
        let _ = write!(
            site,
            "Listen {external}\n\
             <VirtualHost *:{external}>\n    \
             ServerName {server_name}\n    \
             SSLEngine on\n    \
             SSLCertificateFile {cert}\n    \
             SSLCertificateKeyFile {key}\n    \
             ProxyPass / http://localhost:{internal}/\n    \
             ProxyPassReverse / http://localhost:{internal}/\n    \
             ProxyPreserveHost on\n\
             </VirtualHost>\n",
            cert = ssl_dir.join("cert").display(),
            key = ssl_dir.join("key").display(),
        );
    }
    site.push_str(
        "<Proxy *>\n    Order deny,allow\n    Allow from all\n</Proxy>\n\
         <Location />\n    Order allow,deny\n    Allow from all\n</Location>\n",
    );
    site
}

/// Enable or disable the apache SSL frontend for the given port mappings.
fn setup_https(ctx: &HookContext<'_>, mappings: &[(u16, u16)]) -> Result<()> {
    let site_path = ctx
        .paths
        .apache_dir
        .join("sites-available")
        .join(SITE_NAME);

    if !cluster::https_enabled(ctx)? {
        if site_path.exists() {
            info!("disabling HTTPS frontend");
            ctx.host.run("a2dissite", &[SITE_NAME])?;
            fs::remove_file(&site_path)
                .with_context(|| format!("failed to remove '{}'", site_path.display()))?;
            ctx.host.service(ServiceAction::Restart, "apache2")?;
        }
        return Ok(());
    }

    let (cert, key) = match ssl_material(ctx)? {
        Some(material) => material,
        None => bail!("HTTPS is enabled but no certificate is available"),
    };
    info!("enabling HTTPS frontend"; "mappings" => format!("{mappings:?}"));

    ctx.host.install_packages(&["apache2"])?;
    let ssl_dir = ctx.paths.apache_dir.join("ssl").join(crate::hooks::SERVICE);
    fs::create_dir_all(&ssl_dir)
        .with_context(|| format!("failed to create '{}'", ssl_dir.display()))?;
    fs::write(ssl_dir.join("cert"), cert).context("failed to write SSL certificate")?;
    let key_path = ssl_dir.join("key");
    fs::write(&key_path, key).context("failed to write SSL key")?;
    fs::set_permissions(&key_path, fs::Permissions::from_mode(0o600))
        .context("failed to restrict SSL key permissions")?;

    let server_name = ctx.framework.unit_get("private-address")?;
    if let Some(dir) = site_path.parent() {
        fs::create_dir_all(dir).with_context(|| format!("failed to create '{}'", dir.display()))?;
    }
    fs::write(&site_path, render_site(mappings, &server_name, &ssl_dir))
        .with_context(|| format!("failed to write '{}'", site_path.display()))?;
    debug!("wrote '{}'", site_path.display());

    ctx.host.run("a2enmod", &["ssl", "proxy", "proxy_http"])?;
    ctx.host.run("a2ensite", &[SITE_NAME])?;
    ctx.host.service(ServiceAction::Restart, "apache2")
}
