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

//! Orchestration framework access.
//!
//! Hooks never talk to the framework directly; they go through the
//! [`Framework`] trait, which is implemented on top of the hook tools
//! (`relation-get`, `relation-set`, ...) by [`JujuCli`].

use anyhow::Result;
use serde::{Deserialize, Deserializer};
use std::collections::BTreeMap;

mod cli;
pub use self::cli::JujuCli;

/// Key/value payload exchanged over a relation.
pub type RelationData = BTreeMap<String, String>;

/// Access to relation data and unit information.
pub trait Framework {
    /// Charm configuration for this service.
    fn config(&self) -> Result<CharmConfig>;

    /// Read a single relation setting, `None` if unset or empty.
    ///
    /// Without `rid`/`unit`, the relation and remote unit of the current
    /// event are used.
    fn relation_get(&self, key: &str, rid: Option<&str>, unit: Option<&str>)
        -> Result<Option<String>>;

    /// Read all settings of a remote unit on a relation.
    fn relation_get_all(&self, rid: Option<&str>, unit: Option<&str>) -> Result<RelationData>;

    /// Publish settings for the local unit on a relation.
    fn relation_set(&self, rid: Option<&str>, data: &RelationData) -> Result<()>;

    /// Identifiers of all established relations with the given name.
    fn relation_ids(&self, relation: &str) -> Result<Vec<String>>;

    /// Remote units on a relation (the current one without `rid`).
    fn relation_list(&self, rid: Option<&str>) -> Result<Vec<String>>;

    /// Unit attribute such as `private-address`.
    fn unit_get(&self, attribute: &str) -> Result<String>;

    /// Name of the local unit, e.g. `glance/0`.
    fn unit_name(&self) -> Result<String>;
}

/// Charm configuration, as returned by `config-get`.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct CharmConfig {
    #[serde(rename = "openstack-origin", default = "default_origin")]
    pub openstack_origin: String,
    #[serde(rename = "glance-db", default = "default_glance_db")]
    pub glance_db: String,
    #[serde(rename = "db-user", default = "default_db_user")]
    pub db_user: String,
    #[serde(default = "default_region")]
    pub region: String,
    #[serde(default, deserialize_with = "de_setting")]
    pub vip: Option<String>,
    #[serde(default, deserialize_with = "de_setting")]
    pub vip_iface: Option<String>,
    #[serde(default, deserialize_with = "de_setting")]
    pub vip_cidr: Option<String>,
    #[serde(rename = "ha-bindiface", default, deserialize_with = "de_setting")]
    pub ha_bindiface: Option<String>,
    #[serde(rename = "ha-mcastport", default, deserialize_with = "de_setting")]
    pub ha_mcastport: Option<String>,
    /// Base64-encoded PEM certificate for the HTTPS frontend.
    #[serde(default, deserialize_with = "de_setting")]
    pub ssl_cert: Option<String>,
    /// Base64-encoded PEM key for the HTTPS frontend.
    #[serde(default, deserialize_with = "de_setting")]
    pub ssl_key: Option<String>,
}

fn default_origin() -> String {
    "distro".to_string()
}

fn default_glance_db() -> String {
    "glance".to_string()
}

fn default_db_user() -> String {
    "glance".to_string()
}

fn default_region() -> String {
    "RegionOne".to_string()
}

impl Default for CharmConfig {
    fn default() -> Self {
        Self {
            openstack_origin: default_origin(),
            glance_db: default_glance_db(),
            db_user: default_db_user(),
            region: default_region(),
            vip: None,
            vip_iface: None,
            vip_cidr: None,
            ha_bindiface: None,
            ha_mcastport: None,
            ssl_cert: None,
            ssl_key: None,
        }
    }
}

impl CharmConfig {
    /// Parse the JSON output of `config-get --format=json`.
    pub fn from_json(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }
}

/// Settings may come as strings, numbers or null; empty means unset.
fn de_setting<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    let setting = match value {
        None | Some(serde_json::Value::Null) => None,
        Some(serde_json::Value::String(s)) => Some(s),
        Some(other) => Some(other.to_string()),
    };
    Ok(crate::util::non_empty(setting))
}
