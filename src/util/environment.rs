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

use std::collections::btree_set::BTreeSet;
use std::collections::btree_set::Iter;
use std::hash::Hash;
use std::process::Command;

pub const XDG_CACHE_HOME: &str = "XDG_CACHE_HOME";
pub const HOME: &str = "HOME";
pub const GEM_HOME: &str = "GEM_HOME";
pub const BUNDLE_USER_CONFIG: &str = "BUNDLE_USER_CONFIG";
pub const BUNDLE_PREFIX: &str = "BUNDLE_";

/// A single variable set on a child process.
#[derive(Eq, Clone)]
pub struct EnvVar {
    key: String,
    value: String,
}

impl PartialEq for EnvVar {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Ord for EnvVar {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.key.cmp(&other.key)
    }
}

impl PartialOrd for EnvVar {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Hash for EnvVar {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        // only hash by the key name
        self.key.hash(state);
    }
}

impl EnvVar {
    pub fn with(key: &str, value: &str) -> Self {
        Self::new().key(key).value(value)
    }

    pub fn new() -> Self {
        Self {
            key: String::new(),
            value: String::new(),
        }
    }

    /// Sets the environment key.
    pub fn key(mut self, s: &str) -> Self {
        self.key = s.to_owned();
        self
    }

    /// Sets the environment value.
    pub fn value(mut self, s: &str) -> Self {
        self.value = s.to_owned();
        self
    }

    pub fn get_key(&self) -> &str {
        &self.key
    }

    pub fn get_value(&self) -> &str {
        &self.value
    }
}

impl std::fmt::Debug for EnvVar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}=\"{}\"", self.key, self.value)
    }
}

impl std::fmt::Display for EnvVar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}={}", self.key, self.value)
    }
}

/// A set of overrides that apply only to the child process they are handed
/// to; the parent's environment is never modified.
#[derive(Debug, PartialEq, Clone, Default)]
pub struct Environment(BTreeSet<EnvVar>);

impl Environment {
    pub fn new() -> Self {
        Self(BTreeSet::new())
    }

    /// Adds `var` to the set, replacing any previous value for the same key.
    pub fn overwrite(mut self, var: EnvVar) -> Self {
        self.0.replace(var);
        self
    }

    pub fn iter(&self) -> Iter<'_, EnvVar> {
        self.0.iter()
    }

    pub fn get(&self, key: &str) -> Option<&EnvVar> {
        self.0.iter().find(|p| p.key == key)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Places every override onto the process builder `cmd`.
    pub fn apply(&self, cmd: &mut Command) {
        self.0.iter().for_each(|var| {
            cmd.env(&var.key, &var.value);
        });
    }

    /// Reads a variable from the current process, treating an empty value as
    /// unset.
    pub fn read(key: &str) -> Option<String> {
        match std::env::var(key) {
            Ok(s) if s.is_empty() == false => Some(s),
            _ => None,
        }
    }
}
