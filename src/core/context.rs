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

use crate::core::config::{Config, CONFIG_FILE};
use crate::error::{Error, LastError};
use crate::util::environment::{self, Environment};
use crate::util::filesystem;
use std::path::{Path, PathBuf};

/// Name of the directory created under the user's cache home.
pub const CACHE_DIR_NAME: &str = "gemnix";

/// Directory (relative to the project) where Bundler packages gems.
pub const VENDOR_CACHE: &str = "vendor/cache";

/// The runtime state shared by every stage of a conversion.
#[derive(Debug)]
pub struct Context {
    root_path: PathBuf,
    cache_path: PathBuf,
    config: Config,
}

impl Context {
    pub fn new() -> Context {
        Context {
            root_path: PathBuf::from("."),
            cache_path: std::env::temp_dir().join(CACHE_DIR_NAME),
            config: Config::new(),
        }
    }

    /// Sets the project directory the lockfile and settings are resolved from.
    pub fn root(mut self, path: PathBuf) -> Context {
        self.root_path = path;
        self
    }

    /// Loads the configuration file at `path`, or `gemnix.toml` under the
    /// project root when it exists.
    pub fn settings(mut self, path: Option<&PathBuf>) -> Result<Context, Error> {
        self.config = match path {
            Some(p) => Config::from_file(&filesystem::resolve_rel_path(&self.root_path, p))?,
            None => {
                let default = self.root_path.join(CONFIG_FILE);
                match default.is_file() {
                    true => Config::from_file(&default)?,
                    false => Config::new(),
                }
            }
        };
        Ok(self)
    }

    /// Resolves the download cache directory and creates it if missing.
    pub fn cache(mut self) -> Result<Context, Error> {
        self.cache_path = match self.config.get_cache_root() {
            Some(p) => filesystem::resolve_rel_path(&self.root_path, p),
            None => Self::default_cache_root(
                Environment::read(environment::XDG_CACHE_HOME),
                home::home_dir(),
            ),
        };
        std::fs::create_dir_all(&self.cache_path)
            .map_err(|e| Error::CacheUnavailable(self.cache_path.clone(), LastError(e.to_string())))?;
        Ok(self)
    }

    /// Picks `$XDG_CACHE_HOME/gemnix`, then `~/.cache/gemnix`, then a
    /// directory under the system's temporary location.
    pub fn default_cache_root(xdg_cache: Option<String>, home: Option<PathBuf>) -> PathBuf {
        match (xdg_cache, home) {
            (Some(xdg), _) => PathBuf::from(xdg).join(CACHE_DIR_NAME),
            (None, Some(home)) => home.join(".cache").join(CACHE_DIR_NAME),
            (None, None) => std::env::temp_dir().join(CACHE_DIR_NAME),
        }
    }

    /// Lists the local directories probed for `<name>-<version>.gem` before
    /// any remote is contacted, in probing order.
    pub fn local_caches(&self) -> Vec<PathBuf> {
        let mut caches = vec![self.root_path.join(VENDOR_CACHE)];
        if let Some(gem_home) = Environment::read(environment::GEM_HOME) {
            caches.push(PathBuf::from(gem_home).join("cache"));
        }
        self.config
            .get_cache_dirs()
            .into_iter()
            .for_each(|d| caches.push(filesystem::resolve_rel_path(&self.root_path, d)));
        caches
    }

    pub fn get_root(&self) -> &Path {
        &self.root_path
    }

    pub fn get_cache_path(&self) -> &Path {
        &self.cache_path
    }

    pub fn get_config(&self) -> &Config {
        &self.config
    }
}
