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

//! OpenStack release tracking and package sources.

use crate::hooks::HookContext;
use crate::host::Host;
use anyhow::{bail, Context, Result};
use slog_scope::{debug, info};
use std::collections::BTreeMap;
use std::fs;

/// OpenStack release codenames, by version prefix.
const OPENSTACK_CODENAMES: [(&str, &str); 6] = [
    ("2011.2", "diablo"),
    ("2012.1", "essex"),
    ("2012.2", "folsom"),
    ("2013.1", "grizzly"),
    ("2013.2", "havana"),
    ("2014.1", "icehouse"),
];

/// Default OpenStack release of each Ubuntu series.
const UBUNTU_OPENSTACK_RELEASE: [(&str, &str); 6] = [
    ("oneiric", "diablo"),
    ("precise", "essex"),
    ("quantal", "folsom"),
    ("raring", "grizzly"),
    ("saucy", "havana"),
    ("trusty", "icehouse"),
];

const CLOUD_ARCHIVE_URL: &str = "http://ubuntu-cloud.archive.canonical.com/ubuntu";

/// Version prefix (`YYYY.N`) of a release codename.
pub fn os_version_codename(codename: &str) -> Option<&'static str> {
    OPENSTACK_CODENAMES
        .iter()
        .find(|(_, name)| *name == codename)
        .map(|(version, _)| *version)
}

/// Release codename of a package version string such as `1:2012.2.1-0ubuntu1`.
pub fn codename_for_version(version: &str) -> Option<&'static str> {
    let version = version.split_once(':').map_or(version, |(_, v)| v);
    let (year, rest) = version.split_once('.')?;
    let minor_len = rest.find(|c: char| !c.is_ascii_digit()).unwrap_or(rest.len());
    let prefix = format!("{}.{}", year, &rest[..minor_len]);
    OPENSTACK_CODENAMES
        .iter()
        .find(|(v, _)| *v == prefix)
        .map(|(_, name)| *name)
}

/// Release codename of an installed package, `None` if not installed.
pub fn os_codename_package(host: &dyn Host, package: &str) -> Result<Option<&'static str>> {
    let version = match host.run("dpkg-query", &["-W", "-f", "${Version}", package]) {
        Ok(version) => version,
        Err(e) => {
            debug!("package '{}' not installed: {}", package, e);
            return Ok(None);
        }
    };
    let version = version.trim();
    if version.is_empty() {
        return Ok(None);
    }
    match codename_for_version(version) {
        Some(codename) => Ok(Some(codename)),
        None => bail!("unknown OpenStack version '{version}' of package '{package}'"),
    }
}

/// Release codename offered by an install source.
pub fn os_codename_install_source(host: &dyn Host, source: &str) -> Result<Option<&'static str>> {
    if source == "distro" {
        let series = host
            .run("lsb_release", &["-cs"])
            .context("failed to determine Ubuntu series")?;
        let series = series.trim();
        return Ok(UBUNTU_OPENSTACK_RELEASE
            .iter()
            .find(|(s, _)| *s == series)
            .map(|(_, release)| *release));
    }

    if let Some(pocket) = source.strip_prefix("cloud:") {
        let pocket = pocket.split('/').next().unwrap_or(pocket);
        let release = pocket.rsplit('-').next().unwrap_or(pocket);
        return Ok(OPENSTACK_CODENAMES
            .iter()
            .find(|(_, name)| *name == release)
            .map(|(_, name)| *name));
    }

    // ppa:, deb and http sources usually carry the release in their name.
    Ok(OPENSTACK_CODENAMES
        .iter()
        .find(|(_, name)| source.contains(name))
        .map(|(_, name)| *name))
}

/// Render the apt line of a cloud archive source such as
/// `cloud:precise-folsom/proposed`.
pub fn cloud_archive_line(source: &str) -> Result<String> {
    let archive = source
        .strip_prefix("cloud:")
        .with_context(|| format!("not a cloud archive source '{source}'"))?;
    let (pocket, kind) = match archive.split_once('/') {
        Some((pocket, kind)) => (pocket, kind),
        None => (archive, "updates"),
    };
    let (series, release) = match pocket.split_once('-') {
        Some(parts) => parts,
        None => bail!("malformed cloud archive source '{source}'"),
    };
    let kind = match kind {
        "updates" => "updates",
        "proposed" => "proposed",
        other => bail!("unknown cloud archive pocket '{other}'"),
    };
    Ok(format!("deb {CLOUD_ARCHIVE_URL} {series}-{kind}/{release} main\n"))
}

/// Point apt at `source` and refresh package lists.
pub fn configure_source(ctx: &HookContext<'_>, source: &str) -> Result<()> {
    let sources_dir = &ctx.paths.apt_sources_dir;
    if source == "distro" {
        debug!("using distribution packages");
        return Ok(());
    } else if source.starts_with("ppa:") {
        ctx.host.run("add-apt-repository", &["-y", source])?;
    } else if source.starts_with("cloud:") {
        ctx.host.install_packages(&["ubuntu-cloud-keyring"])?;
        fs::create_dir_all(sources_dir)
            .with_context(|| format!("failed to create '{}'", sources_dir.display()))?;
        fs::write(sources_dir.join("cloud-archive.list"), cloud_archive_line(source)?)
            .context("failed to write cloud archive source")?;
    } else if source.starts_with("deb ") {
        fs::create_dir_all(sources_dir)
            .with_context(|| format!("failed to create '{}'", sources_dir.display()))?;
        fs::write(sources_dir.join("glance.list"), format!("{source}\n"))
            .context("failed to write apt source")?;
    } else {
        bail!("unknown install source '{source}'");
    }

    info!("configured install source"; "source" => source);
    ctx.host.run("apt-get", &["update"])?;
    Ok(())
}

/// Write the environment shared with the service helper scripts.
pub fn save_script_rc(ctx: &HookContext<'_>, env: &BTreeMap<&str, String>) -> Result<()> {
    let scripts_dir = ctx.paths.charm_dir.join("scripts");
    fs::create_dir_all(&scripts_dir)
        .with_context(|| format!("failed to create '{}'", scripts_dir.display()))?;
    let mut content = String::from("#!/bin/bash\n");
    for (key, value) in env {
        content.push_str(&format!("export {key}={value}\n"));
    }
    crate::conf::write_atomic(&scripts_dir.join("scriptrc"), content.as_bytes(), None)
        .context("failed to write scriptrc")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hooks::Paths;
    use crate::mock::{MockFramework, MockHost};

    #[test]
    fn test_codename_for_version() {
        let tests = vec![
            ("2012.1-0ubuntu2", Some("essex")),
            ("2012.2.1+stable-20121212-a99a802e-0ubuntu1", Some("folsom")),
            ("1:2013.1.4-0ubuntu1", Some("grizzly")),
            ("1:2013.1-0ubuntu1", Some("grizzly")),
            ("2012.1~rc1-0ubuntu1", Some("essex")),
            ("2012.2-0ubuntu1", Some("folsom")),
            ("2012.-0ubuntu1", None),
            ("2010.1", None),
            ("garbage", None),
        ];
        for (version, expected) in tests {
            assert_eq!(codename_for_version(version), expected, "{version}");
        }
        assert!(os_version_codename("grizzly") > os_version_codename("folsom"));
        assert_eq!(os_version_codename("kilo"), None);
    }

    #[test]
    fn test_os_codename_package() {
        let mut host = MockHost::default();
        host.script("dpkg-query -W -f ${Version} glance-common", Err("no packages found"));
        assert_eq!(os_codename_package(&host, "glance-common").unwrap(), None);

        host.script("dpkg-query -W -f ${Version} glance-common", Ok("2012.2-0ubuntu1"));
        assert_eq!(
            os_codename_package(&host, "glance-common").unwrap(),
            Some("folsom")
        );

        host.script("dpkg-query -W -f ${Version} glance-common", Ok("1999.1"));
        os_codename_package(&host, "glance-common").unwrap_err();
    }

    #[test]
    fn test_os_codename_install_source() {
        let mut host = MockHost::default();
        host.script("lsb_release -cs", Ok("precise\n"));
        let tests = vec![
            ("distro", Some("essex")),
            ("cloud:precise-folsom", Some("folsom")),
            ("cloud:precise-grizzly/proposed", Some("grizzly")),
            ("ppa:openstack-ubuntu-testing/havana-trunk", Some("havana")),
            ("deb http://archive.example.com/ubuntu precise main", None),
        ];
        for (source, expected) in tests {
            assert_eq!(
                os_codename_install_source(&host, source).unwrap(),
                expected,
                "{source}"
            );
        }
    }

    #[test]
    fn test_cloud_archive_line() {
        assert_eq!(
            cloud_archive_line("cloud:precise-folsom").unwrap(),
            "deb http://ubuntu-cloud.archive.canonical.com/ubuntu precise-updates/folsom main\n"
        );
        assert_eq!(
            cloud_archive_line("cloud:precise-grizzly/proposed").unwrap(),
            "deb http://ubuntu-cloud.archive.canonical.com/ubuntu precise-proposed/grizzly main\n"
        );
        cloud_archive_line("cloud:precise").unwrap_err();
        cloud_archive_line("cloud:precise-folsom/staging").unwrap_err();
        cloud_archive_line("ppa:foo").unwrap_err();
    }

    #[test]
    fn test_configure_source() {
        let root = tempfile::tempdir().unwrap();
        let host = MockHost::default();
        let framework = MockFramework::default();
        let ctx = HookContext {
            config: framework.config.clone(),
            framework: &framework,
            host: &host,
            paths: Paths::rooted(root.path(), root.path().join("charm")),
        };

        configure_source(&ctx, "distro").unwrap();
        assert!(host.calls().is_empty());

        configure_source(&ctx, "cloud:precise-folsom").unwrap();
        assert_eq!(
            host.calls(),
            vec!["install ubuntu-cloud-keyring", "apt-get update"]
        );
        let list = fs::read_to_string(ctx.paths.apt_sources_dir.join("cloud-archive.list")).unwrap();
        assert!(list.contains("precise-updates/folsom"));

        configure_source(&ctx, "ppa:glance-core/trunk").unwrap();
        assert!(host
            .calls()
            .contains(&"add-apt-repository -y ppa:glance-core/trunk".to_string()));

        configure_source(&ctx, "ftp://example.com").unwrap_err();
    }

    #[test]
    fn test_save_script_rc() {
        let root = tempfile::tempdir().unwrap();
        let host = MockHost::default();
        let framework = MockFramework::default();
        let ctx = HookContext {
            config: framework.config.clone(),
            framework: &framework,
            host: &host,
            paths: Paths::rooted(root.path(), root.path().join("charm")),
        };
        let env = maplit::btreemap! {
            "OPENSTACK_SERVICE_API" => "glance-api".to_string(),
            "OPENSTACK_PORT_MCASTPORT" => "5408".to_string(),
        };
        save_script_rc(&ctx, &env).unwrap();
        let rc = fs::read_to_string(root.path().join("charm/scripts/scriptrc")).unwrap();
        assert_eq!(
            rc,
            "#!/bin/bash\nexport OPENSTACK_PORT_MCASTPORT=5408\nexport OPENSTACK_SERVICE_API=glance-api\n"
        );
    }
}
