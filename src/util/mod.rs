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

//! utility functions

use anyhow::{bail, Context, Result};
use slog_scope::trace;
use std::process::Command;

/// Try to execute, returning stdout on success and stderr on failure.
pub(crate) fn try_exec(mut cmd: Command) -> Result<String> {
    trace!("{:?}", &cmd);

    let output = cmd
        .output()
        .with_context(|| format!("failed to execute {:?}", cmd.get_program()))?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        bail!("{:?} failed ({}): {}", cmd.get_program(), output.status, stderr.trim());
    };

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Map empty (or whitespace-only) strings to `None`.
pub(crate) fn non_empty<S: AsRef<str>>(value: Option<S>) -> Option<String> {
    value
        .map(|v| v.as_ref().trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Split a `service/N` unit name into service name and unit number.
pub(crate) fn split_unit_name(unit: &str) -> Result<(&str, u32)> {
    let (service, number) = match unit.split_once('/') {
        Some(parts) => parts,
        None => bail!("malformed unit name '{unit}'"),
    };
    let number = number
        .parse()
        .with_context(|| format!("malformed unit number in '{unit}'"))?;
    Ok((service, number))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_empty() {
        let tests = vec![
            (None, None),
            (Some(""), None),
            (Some("  \n"), None),
            (Some("10.0.0.5\n"), Some("10.0.0.5".to_string())),
        ];
        for (input, expected) in tests {
            assert_eq!(non_empty(input), expected, "input: {input:?}");
        }
    }

    #[test]
    fn test_split_unit_name() {
        assert_eq!(split_unit_name("glance/0").unwrap(), ("glance", 0));
        assert_eq!(split_unit_name("glance/12").unwrap(), ("glance", 12));
        split_unit_name("glance").unwrap_err();
        split_unit_name("glance/x").unwrap_err();
    }

    #[test]
    fn test_try_exec() {
        let mut cmd = Command::new("sh");
        cmd.args(["-c", "echo out; echo err >&2"]);
        assert_eq!(try_exec(cmd).unwrap(), "out\n");

        let mut cmd = Command::new("sh");
        cmd.args(["-c", "echo boom >&2; exit 3"]);
        let err = try_exec(cmd).unwrap_err();
        assert!(err.to_string().contains("boom"), "{err}");
    }
}
