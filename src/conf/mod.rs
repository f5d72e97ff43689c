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

//! Glance configuration files and in-place setting updates.

use anyhow::{bail, Context, Result};
use slog_scope::{debug, trace};
use std::fmt;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

mod ini;
pub use self::ini::IniFile;

/// Section holding plain service settings.
const DEFAULT_SECTION: &str = "DEFAULT";
/// Section holding keystone middleware settings in paste files.
const AUTHTOKEN_SECTION: &str = "filter:authtoken";
/// Section selecting the paste pipeline flavor.
const PASTE_DEPLOY_SECTION: &str = "paste_deploy";

/// A glance configuration file.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConfTarget {
    Api,
    Registry,
    ApiPaste,
    RegistryPaste,
}

impl ConfTarget {
    pub const ALL: [ConfTarget; 4] = [
        ConfTarget::Api,
        ConfTarget::Registry,
        ConfTarget::ApiPaste,
        ConfTarget::RegistryPaste,
    ];

    /// File name under the glance configuration directory.
    pub fn file_name(self) -> &'static str {
        match self {
            ConfTarget::Api => "glance-api.conf",
            ConfTarget::Registry => "glance-registry.conf",
            ConfTarget::ApiPaste => "glance-api-paste.ini",
            ConfTarget::RegistryPaste => "glance-registry-paste.ini",
        }
    }

    /// Section where settings for this target live.
    pub fn section(self) -> &'static str {
        match self {
            ConfTarget::Api | ConfTarget::Registry => DEFAULT_SECTION,
            ConfTarget::ApiPaste | ConfTarget::RegistryPaste => AUTHTOKEN_SECTION,
        }
    }

    pub fn path(self, glance_dir: &Path) -> PathBuf {
        glance_dir.join(self.file_name())
    }
}

impl fmt::Display for ConfTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConfTarget::Api => "api",
            ConfTarget::Registry => "registry",
            ConfTarget::ApiPaste => "api-paste",
            ConfTarget::RegistryPaste => "registry-paste",
        };
        f.write_str(name)
    }
}

impl FromStr for ConfTarget {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        ConfTarget::ALL
            .iter()
            .copied()
            .find(|t| t.to_string() == s)
            .with_context(|| format!("unknown configuration target '{s}'"))
    }
}

/// Set `key = value` in the settings section of a glance configuration file.
pub fn set_or_update(glance_dir: &Path, target: ConfTarget, key: &str, value: &str) -> Result<()> {
    upsert_file(&target.path(glance_dir), target.section(), key, value)
        .with_context(|| format!("failed to set '{key}' in {target} configuration"))
}

/// Select the paste pipeline flavor of the api or registry server.
pub fn set_paste_deploy_flavor(glance_dir: &Path, target: ConfTarget, flavor: &str) -> Result<()> {
    match target {
        ConfTarget::Api | ConfTarget::Registry => {}
        _ => bail!("cannot set paste deploy flavor on {target} configuration"),
    }
    upsert_file(&target.path(glance_dir), PASTE_DEPLOY_SECTION, "flavor", flavor)
        .with_context(|| format!("failed to set paste deploy flavor in {target} configuration"))
}

/// Upsert a single entry into an INI file on disk.
///
/// A missing file is created, and an up to date one is not rewritten.
pub fn upsert_file(path: &Path, section: &str, key: &str, value: &str) -> Result<()> {
    let (content, permissions) = match fs::read_to_string(path) {
        Ok(content) => (content, Some(fs::metadata(path)?.permissions())),
        Err(e) if e.kind() == ErrorKind::NotFound => (String::new(), None),
        Err(e) => {
            return Err(e).with_context(|| format!("failed to read '{}'", path.display()))
        }
    };

    let mut ini = IniFile::parse(&content);
    if !ini.upsert(section, key, value) {
        trace!("'{}' already set in '{}'", key, path.display());
        return Ok(());
    }

    debug!("setting '{}' in [{}] of '{}'", key, section, path.display());
    write_atomic(path, ini.render().as_bytes(), permissions)
}

/// Replace `path` with `data` through a sibling temporary file.
pub(crate) fn write_atomic(
    path: &Path,
    data: &[u8],
    permissions: Option<fs::Permissions>,
) -> Result<()> {
    let dir = path
        .parent()
        .with_context(|| format!("'{}' has no parent directory", path.display()))?;
    let mut tmp = tempfile::Builder::new()
        .prefix(".glance-hooks-")
        .tempfile_in(dir)
        .with_context(|| format!("failed to create temporary file in '{}'", dir.display()))?;
    tmp.write_all(data)
        .with_context(|| format!("failed to write temporary file for '{}'", path.display()))?;
    if let Some(permissions) = permissions {
        fs::set_permissions(tmp.path(), permissions)
            .with_context(|| format!("failed to set permissions for '{}'", path.display()))?;
    }
    tmp.persist(path)
        .with_context(|| format!("failed to replace '{}'", path.display()))?;
    Ok(())
}
