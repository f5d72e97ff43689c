//! Recording fakes for the framework and host seams.

use crate::host::{Host, ServiceAction};
use crate::juju::{CharmConfig, Framework, RelationData};
use anyhow::{anyhow, bail, Result};
use std::cell::RefCell;
use std::collections::HashMap;

/// In-memory framework: relations, units and published settings.
#[derive(Debug)]
pub(crate) struct MockFramework {
    pub config: CharmConfig,
    pub unit: String,
    pub private_address: String,
    /// Relation name -> relation ids.
    pub relations: HashMap<String, Vec<String>>,
    /// Relation id -> remote units.
    pub units: HashMap<String, Vec<String>>,
    /// (relation id, unit) -> settings.
    pub settings: HashMap<(String, String), RelationData>,
    /// Relation id and remote unit of the current event.
    pub current: Option<(String, String)>,
    /// Every `relation_set` call, in order.
    pub published: RefCell<Vec<(Option<String>, RelationData)>>,
}

impl Default for MockFramework {
    fn default() -> Self {
        Self {
            config: CharmConfig::default(),
            unit: "glance/0".to_string(),
            private_address: "10.0.0.10".to_string(),
            relations: HashMap::new(),
            units: HashMap::new(),
            settings: HashMap::new(),
            current: None,
            published: RefCell::new(Vec::new()),
        }
    }
}

impl MockFramework {
    /// Add a remote unit with its settings on relation `rid`.
    pub fn add_unit(&mut self, rid: &str, unit: &str, data: &[(&str, &str)]) {
        let name = rid.split(':').next().unwrap_or(rid).to_string();
        let ids = self.relations.entry(name).or_default();
        if !ids.iter().any(|r| r == rid) {
            ids.push(rid.to_string());
        }
        let units = self.units.entry(rid.to_string()).or_default();
        if !units.iter().any(|u| u == unit) {
            units.push(unit.to_string());
        }
        let settings = data
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        self.settings
            .insert((rid.to_string(), unit.to_string()), settings);
    }

    /// Make `rid`/`unit` the relation of the current event.
    pub fn trigger(&mut self, rid: &str, unit: &str, data: &[(&str, &str)]) {
        self.add_unit(rid, unit, data);
        self.current = Some((rid.to_string(), unit.to_string()));
    }

    pub fn published(&self) -> Vec<(Option<String>, RelationData)> {
        self.published.borrow().clone()
    }

    fn resolve(&self, rid: Option<&str>, unit: Option<&str>) -> Result<(String, String)> {
        let rid = match (rid, &self.current) {
            (Some(rid), _) => rid.to_string(),
            (None, Some((rid, _))) => rid.clone(),
            (None, None) => bail!("no relation in context"),
        };
        let unit = match (unit, &self.current) {
            (Some(unit), _) => unit.to_string(),
            (None, Some((current_rid, unit))) if *current_rid == rid => unit.clone(),
            _ => self
                .units
                .get(&rid)
                .and_then(|u| u.first().cloned())
                .ok_or_else(|| anyhow!("no remote unit on '{rid}'"))?,
        };
        Ok((rid, unit))
    }
}

impl Framework for MockFramework {
    fn config(&self) -> Result<CharmConfig> {
        Ok(self.config.clone())
    }

    fn relation_get(
        &self,
        key: &str,
        rid: Option<&str>,
        unit: Option<&str>,
    ) -> Result<Option<String>> {
        Ok(self.relation_get_all(rid, unit)?.get(key).cloned())
    }

    fn relation_get_all(&self, rid: Option<&str>, unit: Option<&str>) -> Result<RelationData> {
        let key = self.resolve(rid, unit)?;
        Ok(self.settings.get(&key).cloned().unwrap_or_default())
    }

    fn relation_set(&self, rid: Option<&str>, data: &RelationData) -> Result<()> {
        self.published
            .borrow_mut()
            .push((rid.map(String::from), data.clone()));
        Ok(())
    }

    fn relation_ids(&self, relation: &str) -> Result<Vec<String>> {
        Ok(self.relations.get(relation).cloned().unwrap_or_default())
    }

    fn relation_list(&self, rid: Option<&str>) -> Result<Vec<String>> {
        let rid = match (rid, &self.current) {
            (Some(rid), _) => rid.to_string(),
            (None, Some((rid, _))) => rid.clone(),
            (None, None) => bail!("no relation in context"),
        };
        Ok(self.units.get(&rid).cloned().unwrap_or_default())
    }

    fn unit_get(&self, attribute: &str) -> Result<String> {
        match attribute {
            "private-address" => Ok(self.private_address.clone()),
            _ => bail!("unknown unit attribute '{attribute}'"),
        }
    }

    fn unit_name(&self) -> Result<String> {
        Ok(self.unit.clone())
    }
}

/// Host fake recording every action as a flat command line.
#[derive(Debug)]
pub(crate) struct MockHost {
    pub hostname: String,
    /// Command line -> scripted result (stdout or error message).
    pub outputs: HashMap<String, std::result::Result<String, String>>,
    pub calls: RefCell<Vec<String>>,
}

impl Default for MockHost {
    fn default() -> Self {
        Self {
            hostname: "juju-glance-0".to_string(),
            outputs: HashMap::new(),
            calls: RefCell::new(Vec::new()),
        }
    }
}

impl MockHost {
    pub fn script(&mut self, cmdline: &str, result: std::result::Result<&str, &str>) {
        self.outputs.insert(
            cmdline.to_string(),
            result.map(String::from).map_err(String::from),
        );
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }

    /// Recorded service actions, e.g. `service restart glance-api`.
    pub fn service_calls(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|c| c.starts_with("service "))
            .collect()
    }
}

impl Host for MockHost {
    fn install_packages(&self, packages: &[&str]) -> Result<()> {
        self.calls
            .borrow_mut()
            .push(format!("install {}", packages.join(" ")));
        Ok(())
    }

    fn upgrade_packages(&self) -> Result<()> {
        self.calls.borrow_mut().push("upgrade".to_string());
        Ok(())
    }

    fn service(&self, action: ServiceAction, name: &str) -> Result<()> {
        self.calls
            .borrow_mut()
            .push(format!("service {action} {name}"));
        Ok(())
    }

    fn run(&self, program: &str, args: &[&str]) -> Result<String> {
        let cmdline = std::iter::once(program)
            .chain(args.iter().copied())
            .collect::<Vec<_>>()
            .join(" ");
        self.calls.borrow_mut().push(cmdline.clone());
        match self.outputs.get(&cmdline) {
            Some(Ok(out)) => Ok(out.clone()),
            Some(Err(e)) => bail!("{e}"),
            None => Ok(String::new()),
        }
    }

    fn hostname(&self) -> Result<String> {
        Ok(self.hostname.clone())
    }
}
