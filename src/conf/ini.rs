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

//! Line-preserving INI editing.
//!
//! NOTE: this is not a complete INI parser. It understands just enough
//!  (section headers, `key = value` entries, `#`/`;` comments) to edit
//!  single entries in place while leaving every other line untouched.

/// An INI document kept as its raw lines.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct IniFile {
    lines: Vec<String>,
}

/// Return the section name if `line` is a `[section]` header.
fn section_header(line: &str) -> Option<&str> {
    let trimmed = line.trim();
    if trimmed.len() >= 2 && trimmed.starts_with('[') && trimmed.ends_with(']') {
        Some(trimmed[1..trimmed.len() - 1].trim())
    } else {
        None
    }
}

/// Return the key of a `key = value` entry, ignoring comments.
fn entry_key(line: &str) -> Option<&str> {
    let trimmed = line.trim_start();
    if trimmed.starts_with('#') || trimmed.starts_with(';') {
        return None;
    }
    trimmed.find('=').map(|index| trimmed[..index].trim())
}

impl IniFile {
    pub fn parse(content: &str) -> Self {
        Self {
            lines: content.lines().map(String::from).collect(),
        }
    }

    /// Render back to text, always newline-terminated.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for line in &self.lines {
            out.push_str(line);
            out.push('\n');
        }
        out
    }

    /// Line range `(header, end)` of a section, `end` being exclusive.
    fn section_bounds(&self, section: &str) -> Option<(usize, usize)> {
        let header = self
            .lines
            .iter()
            .position(|l| section_header(l) == Some(section))?;
        let end = self.lines[header + 1..]
            .iter()
            .position(|l| section_header(l).is_some())
            .map_or(self.lines.len(), |offset| header + 1 + offset);
        Some((header, end))
    }

    /// Look up the value of `key` inside `section`.
    #[cfg(test)]
    pub fn get(&self, section: &str, key: &str) -> Option<&str> {
        let (header, end) = self.section_bounds(section)?;
        self.lines[header + 1..end].iter().find_map(|line| {
            if entry_key(line) != Some(key) {
                return None;
            }
            line.find('=').map(|index| line[index + 1..].trim())
        })
    }

    /// Set `key = value` inside `section`, creating either as needed.
    ///
    /// The first existing entry for `key` is rewritten in place and any
    /// further duplicates in the same section are dropped. Returns whether
    /// the document changed.
    pub fn upsert(&mut self, section: &str, key: &str, value: &str) -> bool {
        let entry = format!("{key} = {value}");
        let before = self.lines.clone();

        match self.section_bounds(section) {
            Some((header, end)) => {
                let matches: Vec<usize> = (header + 1..end)
                    .filter(|&i| entry_key(&self.lines[i]) == Some(key))
                    .collect();
                match matches.split_first() {
                    Some((&first, duplicates)) => {
                        for &i in duplicates.iter().rev() {
                            self.lines.remove(i);
                        }
                        self.lines[first] = entry;
                    }
                    None => {
                        // Keep blank lines separating this section from the next one.
                        let mut insert_at = end;
                        while insert_at > header + 1 && self.lines[insert_at - 1].trim().is_empty()
                        {
                            insert_at -= 1;
                        }
                        self.lines.insert(insert_at, entry);
                    }
                }
            }
            None => {
                if self.lines.last().map_or(false, |l| !l.trim().is_empty()) {
                    self.lines.push(String::new());
                }
                self.lines.push(format!("[{section}]"));
                self.lines.push(entry);
            }
        }

        self.lines != before
    }
}
