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

//! Hooks
//!
//! These are the events the framework delivers to this charm. Each event
//! maps to exactly one handler; handlers read what they need from the
//! [`HookContext`], act, and report whether they completed or are still
//! waiting for a remote unit to provide data.
//!
//! To add a hook, add a variant to [`Hook`], list it in `Hook::ALL`, and
//! give it a name and a handler in the matching `match` arms.

use crate::host::{Host, ServiceAction};
use crate::juju::{CharmConfig, Framework};
use anyhow::{Context, Result};
use slog_scope::{info, warn};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

pub mod ceph;
pub mod ha;
pub mod identity;
pub mod image_service;
pub mod lifecycle;
pub mod object_store;
pub mod peers;
pub mod shared_db;


/// Service name used towards keystone and for the ceph client.
pub const SERVICE: &str = "glance";
/// Public port of the image API.
pub const API_PORT: u16 = 9292;
/// Pacemaker resource holding the virtual IP.
pub const VIP_RESOURCE: &str = "res_glance_vip";
/// Services managed by this charm.
pub const SERVICES: [&str; 2] = ["glance-api", "glance-registry"];
/// Packages making up the image service.
pub const PACKAGES: [&str; 6] = [
    "glance",
    "python-mysqldb",
    "python-swift",
    "python-keystone",
    "uuid",
    "haproxy",
];

/// Result of a hook run that did not fail.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// All work for this event is done.
    Ready,
    /// Required data is missing; the event will be delivered again.
    Awaiting(String),
}

impl Outcome {
    pub fn awaiting(reason: impl Into<String>) -> Self {
        Outcome::Awaiting(reason.into())
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Ready => f.write_str("ready"),
            Outcome::Awaiting(reason) => write!(f, "awaiting: {reason}"),
        }
    }
}

/// Filesystem locations touched by the hooks.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Paths {
    pub glance_dir: PathBuf,
    pub ceph_dir: PathBuf,
    pub haproxy_cfg: PathBuf,
    pub haproxy_default: PathBuf,
    pub apache_dir: PathBuf,
    pub apt_sources_dir: PathBuf,
    pub charm_dir: PathBuf,
}

impl Paths {
    /// Standard system locations, with the charm directory from `$CHARM_DIR`.
    pub fn from_env() -> Self {
        let charm_dir = std::env::var_os("CHARM_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));
        Self::rooted(Path::new("/"), charm_dir)
    }

    /// All system locations below `root`.
    pub fn rooted(root: &Path, charm_dir: PathBuf) -> Self {
        Self {
            glance_dir: root.join("etc/glance"),
            ceph_dir: root.join("etc/ceph"),
            haproxy_cfg: root.join("etc/haproxy/haproxy.cfg"),
            haproxy_default: root.join("etc/default/haproxy"),
            apache_dir: root.join("etc/apache2"),
            apt_sources_dir: root.join("etc/apt/sources.list.d"),
            charm_dir,
        }
    }
}

/// Everything a handler may use, read once per invocation.
pub struct HookContext<'a> {
    pub config: CharmConfig,
    pub framework: &'a dyn Framework,
    pub host: &'a dyn Host,
    pub paths: Paths,
}

impl HookContext<'_> {
    /// Apply a service action to every glance service.
    pub fn services(&self, action: ServiceAction) -> Result<()> {
        for service in SERVICES {
            self.host.service(action, service)?;
        }
        Ok(())
    }

    /// Set a glance configuration value.
    pub fn set(&self, target: crate::conf::ConfTarget, key: &str, value: &str) -> Result<()> {
        crate::conf::set_or_update(&self.paths.glance_dir, target, key, value)
    }
}

/// Signature shared by all handlers; the second argument is an optional
/// relation id overriding the relation of the current event.
pub type Handler = fn(&HookContext<'_>, Option<&str>) -> Result<Outcome>;

/// Events delivered by the framework.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Hook {
    Install,
    Start,
    Stop,
    ConfigChanged,
    UpgradeCharm,
    SharedDbJoined,
    SharedDbChanged,
    ImageServiceJoined,
    ImageServiceChanged,
    ObjectStoreJoined,
    ObjectStoreChanged,
    IdentityServiceJoined,
    IdentityServiceChanged,
    CephJoined,
    CephChanged,
    ClusterChanged,
    ClusterDeparted,
    HaJoined,
    HaChanged,
}

impl Hook {
    pub const ALL: [Hook; 19] = [
        Hook::Install,
        Hook::Start,
        Hook::Stop,
        Hook::ConfigChanged,
        Hook::UpgradeCharm,
        Hook::SharedDbJoined,
        Hook::SharedDbChanged,
        Hook::ImageServiceJoined,
        Hook::ImageServiceChanged,
        Hook::ObjectStoreJoined,
        Hook::ObjectStoreChanged,
        Hook::IdentityServiceJoined,
        Hook::IdentityServiceChanged,
        Hook::CephJoined,
        Hook::CephChanged,
        Hook::ClusterChanged,
        Hook::ClusterDeparted,
        Hook::HaJoined,
        Hook::HaChanged,
    ];

    /// Event name, as used for hook file names.
    pub fn name(self) -> &'static str {
        match self {
            Hook::Install => "install",
            Hook::Start => "start",
            Hook::Stop => "stop",
            Hook::ConfigChanged => "config-changed",
            Hook::UpgradeCharm => "upgrade-charm",
            Hook::SharedDbJoined => "shared-db-relation-joined",
            Hook::SharedDbChanged => "shared-db-relation-changed",
            Hook::ImageServiceJoined => "image-service-relation-joined",
            Hook::ImageServiceChanged => "image-service-relation-changed",
            Hook::ObjectStoreJoined => "object-store-relation-joined",
            Hook::ObjectStoreChanged => "object-store-relation-changed",
            Hook::IdentityServiceJoined => "identity-service-relation-joined",
            Hook::IdentityServiceChanged => "identity-service-relation-changed",
            Hook::CephJoined => "ceph-relation-joined",
            Hook::CephChanged => "ceph-relation-changed",
            Hook::ClusterChanged => "cluster-relation-changed",
            Hook::ClusterDeparted => "cluster-relation-departed",
            Hook::HaJoined => "ha-relation-joined",
            Hook::HaChanged => "ha-relation-changed",
        }
    }

    fn handler(self) -> Handler {
        match self {
            Hook::Install => lifecycle::install,
            Hook::Start => lifecycle::start,
            Hook::Stop => lifecycle::stop,
            Hook::ConfigChanged => lifecycle::config_changed,
            Hook::UpgradeCharm => lifecycle::upgrade_charm,
            Hook::SharedDbJoined => shared_db::joined,
            Hook::SharedDbChanged => shared_db::changed,
            Hook::ImageServiceJoined => image_service::joined,
            Hook::ImageServiceChanged => image_service::changed,
            Hook::ObjectStoreJoined => object_store::joined,
            Hook::ObjectStoreChanged => object_store::changed,
            Hook::IdentityServiceJoined => identity::joined,
            Hook::IdentityServiceChanged => identity::changed,
            Hook::CephJoined => ceph::joined,
            Hook::CephChanged => ceph::changed,
            Hook::ClusterChanged | Hook::ClusterDeparted => peers::changed,
            Hook::HaJoined => ha::joined,
            Hook::HaChanged => ha::changed,
        }
    }

    /// Whether the handler can be pointed at an existing relation by id.
    pub fn accepts_relation_id(self) -> bool {
        matches!(
            self,
            Hook::SharedDbChanged
                | Hook::ImageServiceJoined
                | Hook::IdentityServiceJoined
                | Hook::IdentityServiceChanged
                | Hook::CephChanged
        )
    }
}

impl fmt::Display for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Hook {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        Hook::ALL
            .iter()
            .copied()
            .find(|h| h.name() == s)
            .with_context(|| format!("unknown hook '{s}'"))
    }
}

/// Run the handler for `hook` once.
pub fn dispatch(hook: Hook, ctx: &HookContext<'_>, relation_id: Option<&str>) -> Result<Outcome> {
    let relation_id = match relation_id {
        Some(rid) if !hook.accepts_relation_id() => {
            warn!("hook '{}' does not take a relation id, ignoring '{}'", hook, rid);
            None
        }
        rid => rid,
    };

    info!("running hook"; "hook" => hook.name(), "relation-id" => relation_id);
    (hook.handler())(ctx, relation_id).with_context(|| format!("hook '{hook}' failed"))
}
