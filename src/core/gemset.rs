//
//  Copyright (C) 2022-2024  Chase Ruskin
//
//  This program is free software: you can redistribute it and/or modify
//  it under the terms of the GNU General Public License as published by
//  the Free Software Foundation, either version 3 of the License, or
//  (at your option) any later version.
//
//  This program is distributed in the hope that it will be useful,
//  but WITHOUT ANY WARRANTY; without even the implied warranty of
//  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
//  GNU General Public License for more details.
//
//  You should have received a copy of the GNU General Public License
//  along with this program.  If not, see <http://www.gnu.org/licenses/>.
//

//! Collects resolved descriptors into the gemset consumed by `bundlerEnv`.

use crate::core::dependency::Dependency;
use crate::core::descriptor::SourceDescriptor;
use crate::core::source::Source;
use crate::error::Error;
use colored::Colorize;
use serde_derive::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt::Write;

pub const GEMSET_FILE: &str = "gemset.nix";

const INDENT: &str = "  ";

const NIX_KEYWORDS: [&str; 10] = [
    "assert", "else", "if", "in", "inherit", "let", "or", "rec", "then", "with",
];

#[derive(Debug, PartialEq, Serialize)]
pub struct GemEntry {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    dependencies: Vec<String>,
    /// Set for gems only published as a platform-specific build, whose
    /// digest covers `<name>-<version>-<platform>.gem`.
    #[serde(skip_serializing_if = "Option::is_none")]
    platform: Option<String>,
    platforms: Vec<String>,
    source: SourceDescriptor,
    version: String,
}

impl GemEntry {
    pub fn new(dep: &Dependency, source: SourceDescriptor) -> Self {
        let mut dependencies = dep.get_dependencies().clone();
        dependencies.sort();
        dependencies.dedup();
        Self {
            dependencies: dependencies,
            platform: dep.get_platform().map(|p| p.to_string()),
            platforms: Vec::new(),
            source: source,
            version: dep.get_version().to_string(),
        }
    }

    pub fn get_source(&self) -> &SourceDescriptor {
        &self.source
    }

    pub fn get_version(&self) -> &str {
        &self.version
    }

    pub fn get_platform(&self) -> Option<&str> {
        self.platform.as_deref()
    }
}

/// Resolved entries keyed by gem name.
#[derive(Debug, PartialEq, Default, Serialize)]
pub struct Gemset(BTreeMap<String, GemEntry>);

/// Dependencies that could not be resolved, with the reason for each.
pub type Failures = Vec<(String, Error)>;

impl Gemset {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Resolves every dependency in order.
    ///
    /// Stops at the first failure unless `keep_going` is set, in which case
    /// failed dependencies are left out and returned alongside the gemset.
    pub fn resolve(
        deps: &[Dependency],
        source: &Source,
        keep_going: bool,
    ) -> Result<(Self, Failures), Error> {
        let mut gemset = Self::new();
        let mut failures = Vec::new();
        for dep in deps {
            match source.convert(dep) {
                Ok(desc) => {
                    gemset.insert(dep.get_name(), GemEntry::new(dep, desc));
                }
                Err(e) => match keep_going {
                    true => {
                        eprintln!("{} skipping {}: {}", "warning:".yellow(), dep.get_name(), e);
                        failures.push((dep.get_name().to_string(), e));
                    }
                    false => return Err(e),
                },
            }
        }
        Ok((gemset, failures))
    }

    pub fn insert(&mut self, name: &str, entry: GemEntry) {
        self.0.insert(name.to_string(), entry);
    }

    pub fn get(&self, name: &str) -> Option<&GemEntry> {
        self.0.get(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        Ok(serde_json::to_string_pretty(&self.0)? + "\n")
    }

    /// Renders the gemset as a Nix attribute set.
    pub fn to_nix(&self) -> String {
        let mut attrs = BTreeMap::new();
        for (name, entry) in &self.0 {
            let mut node = NixValue::from(serde_json::to_value(entry).unwrap_or(Value::Null));
            // path sources are literals so Nix copies them into the store
            if let SourceDescriptor::Path { path } = &entry.source {
                if let NixValue::Attrs(fields) = &mut node {
                    if let Some(NixValue::Attrs(source)) = fields.get_mut("source") {
                        source.insert(String::from("path"), NixValue::Path(path.display().to_string()));
                    }
                }
            }
            attrs.insert(name.clone(), node);
        }
        let mut out = String::new();
        NixValue::Attrs(attrs).render(&mut out, 0);
        out.push('\n');
        out
    }
}

/// The subset of Nix expressions a gemset needs.
#[derive(Debug, PartialEq)]
enum NixValue {
    Null,
    Bool(bool),
    Int(String),
    Str(String),
    Path(String),
    List(Vec<NixValue>),
    Attrs(BTreeMap<String, NixValue>),
}

impl From<Value> for NixValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Bool(b),
            Value::Number(n) => Self::Int(n.to_string()),
            Value::String(s) => Self::Str(s),
            Value::Array(arr) => Self::List(arr.into_iter().map(Self::from).collect()),
            Value::Object(map) => Self::Attrs(map.into_iter().map(|(k, v)| (k, Self::from(v))).collect()),
        }
    }
}

impl NixValue {
    fn render(&self, out: &mut String, depth: usize) {
        match self {
            Self::Null => out.push_str("null"),
            Self::Bool(b) => out.push_str(if *b == true { "true" } else { "false" }),
            Self::Int(n) => out.push_str(n),
            Self::Str(s) => out.push_str(&quote(s)),
            Self::Path(p) => out.push_str(&path_literal(p)),
            Self::List(items) => {
                out.push('[');
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        out.push(' ');
                    }
                    item.render(out, depth);
                }
                out.push(']');
            }
            Self::Attrs(map) => {
                out.push_str("{\n");
                for (key, value) in map {
                    let _ = write!(out, "{}{} = ", INDENT.repeat(depth + 1), attr_name(key));
                    value.render(out, depth + 1);
                    out.push_str(";\n");
                }
                out.push_str(&INDENT.repeat(depth));
                out.push('}');
            }
        }
    }
}

/// Writes `s` as a double-quoted Nix string.
fn quote(s: &str) -> String {
    let mut result = String::with_capacity(s.len() + 2);
    result.push('"');
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '"' => result.push_str("\\\""),
            '\\' => result.push_str("\\\\"),
            '\n' => result.push_str("\\n"),
            '\r' => result.push_str("\\r"),
            '\t' => result.push_str("\\t"),
            '$' if chars.peek() == Some(&'{') => result.push_str("\\$"),
            _ => result.push(c),
        }
    }
    result.push('"');
    result
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => (),
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '\'' || c == '-')
        && NIX_KEYWORDS.contains(&s) == false
}

fn attr_name(s: &str) -> String {
    match is_identifier(s) {
        true => s.to_string(),
        false => quote(s),
    }
}

/// Writes `p` as a Nix path, falling back to a string when the literal
/// syntax cannot express it.
fn path_literal(p: &str) -> String {
    let plain = p
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || "._-+/".contains(c));
    if plain == false || p.is_empty() || p.ends_with('/') {
        return quote(p);
    }
    if p.starts_with('/') || p.starts_with("./") || p.starts_with("../") {
        p.to_string()
    } else if p == "." || p == ".." {
        format!("{}/.", p)
    } else {
        format!("./{}", p)
    }
}
