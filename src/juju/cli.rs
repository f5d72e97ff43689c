//! Helpers for shelling out to the hook tools.

use super::{CharmConfig, Framework, RelationData};
use crate::util::{non_empty, try_exec};
use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::process::Command;

/// Environment variable naming the local unit.
const UNIT_NAME_ENV: &str = "JUJU_UNIT_NAME";

/// `Framework` implementation backed by the hook tools found in `$PATH`.
#[derive(Clone, Debug, Default)]
pub struct JujuCli;

/// Build a hook tool invocation, optionally scoped to a relation id.
fn tool(name: &str, rid: Option<&str>) -> Command {
    let mut cmd = Command::new(name);
    if let Some(rid) = rid {
        cmd.args(["-r", rid]);
    }
    cmd
}

/// Parse a JSON list, where `null` stands for an empty one.
fn parse_list(raw: &str) -> Result<Vec<String>> {
    let list: Option<Vec<String>> = serde_json::from_str(raw)?;
    Ok(list.unwrap_or_default())
}

/// Parse a JSON settings map, dropping empty values.
fn parse_settings(raw: &str) -> Result<RelationData> {
    let settings: Option<BTreeMap<String, serde_json::Value>> = serde_json::from_str(raw)?;
    let data = settings
        .unwrap_or_default()
        .into_iter()
        .filter_map(|(k, v)| {
            let value = match v {
                serde_json::Value::Null => None,
                serde_json::Value::String(s) => Some(s),
                other => Some(other.to_string()),
            };
            non_empty(value).map(|v| (k, v))
        })
        .collect();
    Ok(data)
}

impl Framework for JujuCli {
    fn config(&self) -> Result<CharmConfig> {
        let mut cmd = Command::new("config-get");
        cmd.arg("--format=json");
        let raw = try_exec(cmd).context("'config-get' failed")?;
        CharmConfig::from_json(&raw).context("failed to parse charm configuration")
    }

    fn relation_get(
        &self,
        key: &str,
        rid: Option<&str>,
        unit: Option<&str>,
    ) -> Result<Option<String>> {
        let mut cmd = tool("relation-get", rid);
        cmd.arg(key);
        if let Some(unit) = unit {
            cmd.arg(unit);
        }
        let out = try_exec(cmd).with_context(|| format!("'relation-get {key}' failed"))?;
        Ok(non_empty(Some(out)))
    }

    fn relation_get_all(&self, rid: Option<&str>, unit: Option<&str>) -> Result<RelationData> {
        let mut cmd = tool("relation-get", rid);
        cmd.args(["--format=json", "-"]);
        if let Some(unit) = unit {
            cmd.arg(unit);
        }
        let raw = try_exec(cmd).context("'relation-get -' failed")?;
        parse_settings(&raw).context("failed to parse relation settings")
    }

    fn relation_set(&self, rid: Option<&str>, data: &RelationData) -> Result<()> {
        let mut cmd = tool("relation-set", rid);
        cmd.args(data.iter().map(|(k, v)| format!("{k}={v}")));
        try_exec(cmd).context("'relation-set' failed")?;
        Ok(())
    }

    fn relation_ids(&self, relation: &str) -> Result<Vec<String>> {
        let mut cmd = Command::new("relation-ids");
        cmd.args(["--format=json", relation]);
        let raw = try_exec(cmd).with_context(|| format!("'relation-ids {relation}' failed"))?;
        parse_list(&raw).context("failed to parse relation ids")
    }

    fn relation_list(&self, rid: Option<&str>) -> Result<Vec<String>> {
        let mut cmd = tool("relation-list", rid);
        cmd.arg("--format=json");
        let raw = try_exec(cmd).context("'relation-list' failed")?;
        parse_list(&raw).context("failed to parse relation units")
    }

    fn unit_get(&self, attribute: &str) -> Result<String> {
        let mut cmd = Command::new("unit-get");
        cmd.arg(attribute);
        let out = try_exec(cmd).with_context(|| format!("'unit-get {attribute}' failed"))?;
        Ok(out.trim().to_string())
    }

    fn unit_name(&self) -> Result<String> {
        std::env::var(UNIT_NAME_ENV).with_context(|| format!("{UNIT_NAME_ENV} is not set"))
    }
}
