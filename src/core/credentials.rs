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

//! Host credentials looked up the same way Bundler resolves its settings.

use crate::error::{Error, LastError};
use crate::util::environment::{self, Environment};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;

pub const LOCAL_SETTINGS: &str = ".bundle/config";

#[derive(Debug, PartialEq, Clone)]
pub struct Credentials {
    username: String,
    password: Option<String>,
}

impl Credentials {
    pub fn new(username: &str, password: Option<&str>) -> Self {
        Self {
            username: username.to_string(),
            password: password.map(|p| p.to_string()),
        }
    }

    pub fn get_username(&self) -> &str {
        &self.username
    }

    pub fn get_password(&self) -> Option<&str> {
        self.password.as_deref()
    }
}

impl FromStr for Credentials {
    type Err = std::convert::Infallible;

    /// Splits `username:password` on the first colon.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.split_once(':') {
            Some((user, pass)) => Self::new(user, Some(pass)),
            None => Self::new(s, None),
        })
    }
}

/// Answers which credentials, if any, should be attached to requests for a
/// host.
pub trait CredentialStore {
    fn lookup(&self, host: &str) -> Option<Credentials>;
}

type Settings = HashMap<String, String>;

/// Bundler's layered configuration: environment variables take precedence
/// over the project's `.bundle/config`, which takes precedence over the
/// user's global config.
#[derive(Debug, PartialEq, Default)]
pub struct BundlerSettings {
    env: Settings,
    local: Settings,
    global: Settings,
}

impl BundlerSettings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads all layers for the project living at `root`.
    pub fn load(root: &Path) -> Result<Self, Error> {
        let env: Settings = std::env::vars()
            .filter(|(k, _)| k.starts_with(environment::BUNDLE_PREFIX))
            .collect();
        let global_path = match Environment::read(environment::BUNDLE_USER_CONFIG) {
            Some(p) => Some(PathBuf::from(p)),
            None => home::home_dir().map(|h| h.join(LOCAL_SETTINGS)),
        };
        Ok(Self {
            env: env,
            local: Self::read_file(&root.join(LOCAL_SETTINGS))?,
            global: match global_path {
                Some(p) => Self::read_file(&p)?,
                None => Settings::new(),
            },
        })
    }

    pub fn with_env(mut self, key: &str, value: &str) -> Self {
        self.env.insert(key.to_string(), value.to_string());
        self
    }

    pub fn with_local(mut self, local: Settings) -> Self {
        self.local = local;
        self
    }

    pub fn with_global(mut self, global: Settings) -> Self {
        self.global = global;
        self
    }

    /// Reads a Bundler config file; a missing file is an empty layer.
    pub fn read_file(path: &Path) -> Result<Settings, Error> {
        if path.is_file() == false {
            return Ok(Settings::new());
        }
        let contents = std::fs::read_to_string(path)
            .map_err(|e| Error::SettingsInvalid(path.to_path_buf(), LastError(e.to_string())))?;
        Self::parse(&contents).map_err(|e| Error::SettingsInvalid(path.to_path_buf(), LastError(e.to_string())))
    }

    /// Parses the YAML mapping Bundler writes, keeping scalar values only.
    pub fn parse(s: &str) -> Result<Settings, serde_yaml::Error> {
        let trimmed = s.trim();
        if trimmed.is_empty() || trimmed == "---" {
            return Ok(Settings::new());
        }
        let map: HashMap<String, serde_yaml::Value> = serde_yaml::from_str(s)?;
        Ok(map
            .into_iter()
            .filter_map(|(k, v)| {
                let value = match v {
                    serde_yaml::Value::String(s) => s,
                    serde_yaml::Value::Number(n) => n.to_string(),
                    serde_yaml::Value::Bool(b) => b.to_string(),
                    _ => return None,
                };
                Some((k, value))
            })
            .collect())
    }

    /// Computes the settings key Bundler uses for `name`.
    ///
    /// `packages.example-corp.io` becomes `BUNDLE_PACKAGES__EXAMPLE___CORP__IO`.
    pub fn key_for(name: &str) -> String {
        format!(
            "{}{}",
            environment::BUNDLE_PREFIX,
            name.replace('.', "__").replace('-', "___").to_ascii_uppercase()
        )
    }

    pub fn get(&self, name: &str) -> Option<&String> {
        let key = Self::key_for(name);
        self.env
            .get(&key)
            .or_else(|| self.local.get(&key))
            .or_else(|| self.global.get(&key))
    }
}

impl CredentialStore for BundlerSettings {
    fn lookup(&self, host: &str) -> Option<Credentials> {
        self.get(host)
            .and_then(|value| Credentials::from_str(value).ok())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const LOCAL: &str = r#"---
BUNDLE_PACKAGES__EXAMPLE__IO: "local-user:local-pass"
BUNDLE_JOBS: 4
BUNDLE_FROZEN: true
"#;

    #[test]
    fn key_for_host() {
        assert_eq!(BundlerSettings::key_for("packages.example.io"), "BUNDLE_PACKAGES__EXAMPLE__IO");
        assert_eq!(
            BundlerSettings::key_for("gems.my-corp.com"),
            "BUNDLE_GEMS__MY___CORP__COM"
        );
    }

    #[test]
    fn parse_config_file() {
        let settings = BundlerSettings::parse(LOCAL).unwrap();
        assert_eq!(settings.get("BUNDLE_JOBS").unwrap(), "4");
        assert_eq!(settings.get("BUNDLE_FROZEN").unwrap(), "true");
        assert_eq!(BundlerSettings::parse("---\n").unwrap().len(), 0);
    }

    #[test]
    fn environment_wins_over_files() {
        let settings = BundlerSettings::new()
            .with_local(BundlerSettings::parse(LOCAL).unwrap())
            .with_env("BUNDLE_PACKAGES__EXAMPLE__IO", "env-user:env:pass");
        assert_eq!(
            settings.lookup("packages.example.io"),
            Some(Credentials::new("env-user", Some("env:pass")))
        );
    }

    #[test]
    fn local_wins_over_global() {
        let mut global = HashMap::new();
        global.insert(
            String::from("BUNDLE_PACKAGES__EXAMPLE__IO"),
            String::from("global-user:global-pass"),
        );
        let settings = BundlerSettings::new()
            .with_global(global.clone())
            .with_local(BundlerSettings::parse(LOCAL).unwrap());
        assert_eq!(
            settings.lookup("packages.example.io"),
            Some(Credentials::new("local-user", Some("local-pass")))
        );
        let settings = BundlerSettings::new().with_global(global);
        assert_eq!(
            settings.lookup("packages.example.io").unwrap().get_username(),
            "global-user"
        );
        assert_eq!(settings.lookup("rubygems.org"), None);
    }

    #[test]
    fn load_reads_project_config() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join(".bundle")).unwrap();
        std::fs::write(dir.path().join(LOCAL_SETTINGS), LOCAL).unwrap();
        let settings = BundlerSettings::load(dir.path()).unwrap();
        assert_eq!(
            settings.local.get("BUNDLE_PACKAGES__EXAMPLE__IO").unwrap(),
            "local-user:local-pass"
        );
    }
}
