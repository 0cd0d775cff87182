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

use crate::error::{Error, LastError};
use serde_derive::Deserialize;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

pub const CONFIG_FILE: &str = "gemnix.toml";

pub const NIX_PREFETCH_URL: &str = "nix-prefetch-url";
pub const NIX_HASH: &str = "nix-hash";
pub const NIX_PREFETCH_GIT: &str = "nix-prefetch-git";

#[derive(Debug, PartialEq, Deserialize, Default, Clone)]
#[serde(deny_unknown_fields)]
pub struct Config {
    commands: Option<Commands>,
    cache: Option<Cache>,
    network: Option<Network>,
    git: Option<Git>,
}

/// Names or paths of the external programs that are invoked.
#[derive(Debug, PartialEq, Deserialize, Default, Clone)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct Commands {
    nix_prefetch_url: Option<String>,
    nix_hash: Option<String>,
    nix_prefetch_git: Option<String>,
}

impl Commands {
    pub fn get_prefetch_url(&self) -> &str {
        self.nix_prefetch_url.as_deref().unwrap_or(NIX_PREFETCH_URL)
    }

    pub fn get_hash(&self) -> &str {
        self.nix_hash.as_deref().unwrap_or(NIX_HASH)
    }

    pub fn get_prefetch_git(&self) -> &str {
        self.nix_prefetch_git.as_deref().unwrap_or(NIX_PREFETCH_GIT)
    }
}

#[derive(Debug, PartialEq, Deserialize, Default, Clone)]
#[serde(deny_unknown_fields)]
pub struct Cache {
    root: Option<PathBuf>,
    dirs: Option<Vec<PathBuf>>,
}

#[derive(Debug, PartialEq, Deserialize, Default, Clone)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct Network {
    connect_timeout: Option<u64>,
    timeout: Option<u64>,
}

#[derive(Debug, PartialEq, Deserialize, Default, Clone)]
#[serde(deny_unknown_fields)]
pub struct Git {
    prefetch: Option<bool>,
}

impl FromStr for Config {
    type Err = toml::de::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        toml::from_str(s)
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_file(path: &Path) -> Result<Self, Error> {
        let contents = std::fs::read_to_string(&path)
            .map_err(|e| Error::ConfigInvalid(path.to_path_buf(), LastError(e.to_string())))?;
        Self::from_str(&contents)
            .map_err(|e| Error::ConfigInvalid(path.to_path_buf(), LastError(e.to_string())))
    }

    pub fn get_commands(&self) -> Commands {
        self.commands.clone().unwrap_or_default()
    }

    pub fn get_cache_root(&self) -> Option<&PathBuf> {
        self.cache.as_ref().and_then(|c| c.root.as_ref())
    }

    /// Extra local gem caches listed by the user, in the order given.
    pub fn get_cache_dirs(&self) -> Vec<&PathBuf> {
        match self.cache.as_ref().and_then(|c| c.dirs.as_ref()) {
            Some(dirs) => dirs.iter().collect(),
            None => Vec::new(),
        }
    }

    pub fn get_connect_timeout(&self) -> Option<Duration> {
        self.network
            .as_ref()
            .and_then(|n| n.connect_timeout)
            .map(Duration::from_secs)
    }

    pub fn get_timeout(&self) -> Option<Duration> {
        self.network
            .as_ref()
            .and_then(|n| n.timeout)
            .map(Duration::from_secs)
    }

    pub fn is_git_prefetch(&self) -> bool {
        self.git.as_ref().and_then(|g| g.prefetch).unwrap_or(false)
    }
}
