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

//! Resolved dependency records as read from a lockfile.

use std::path::PathBuf;

/// Platform name Bundler uses for pure-ruby gems.
pub const RUBY_PLATFORM: &str = "ruby";

/// A single pinned gem and where it comes from.
#[derive(Debug, PartialEq, Clone)]
pub struct Dependency {
    name: String,
    version: String,
    platform: Option<String>,
    dependencies: Vec<String>,
    origin: Origin,
}

impl Dependency {
    pub fn new(name: &str, version: &str, origin: Origin) -> Self {
        Self {
            name: name.to_string(),
            version: version.to_string(),
            platform: None,
            dependencies: Vec::new(),
            origin: origin,
        }
    }

    /// Sets the platform; `ruby` is the generic platform and is not recorded.
    pub fn platform(mut self, platform: Option<&str>) -> Self {
        self.platform = platform
            .filter(|p| *p != RUBY_PLATFORM)
            .map(|p| p.to_string());
        self
    }

    pub fn dependencies(mut self, deps: Vec<String>) -> Self {
        self.dependencies = deps;
        self
    }

    pub fn get_name(&self) -> &str {
        &self.name
    }

    pub fn get_version(&self) -> &str {
        &self.version
    }

    pub fn get_platform(&self) -> Option<&str> {
        self.platform.as_deref()
    }

    pub fn get_dependencies(&self) -> &Vec<String> {
        &self.dependencies
    }

    pub fn get_origin(&self) -> &Origin {
        &self.origin
    }

    pub fn get_origin_mut(&mut self) -> &mut Origin {
        &mut self.origin
    }

    /// The artifact's base name: `<name>-<version>[-<platform>]`.
    pub fn full_name(&self) -> String {
        match &self.platform {
            Some(p) => format!("{}-{}-{}", self.name, self.version, p),
            None => format!("{}-{}", self.name, self.version),
        }
    }
}

/// Where a dependency's artifact is obtained from.
#[derive(Debug, PartialEq, Clone)]
pub enum Origin {
    Registry(Registry),
    Git(GitRepo),
    Path(PathBuf),
    /// A source section the lockfile declared but this tool does not know.
    Unknown(String),
}

impl Origin {
    pub fn kind(&self) -> &str {
        match self {
            Self::Registry(_) => "GEM",
            Self::Git(_) => "GIT",
            Self::Path(_) => "PATH",
            Self::Unknown(k) => k.as_ref(),
        }
    }
}

/// A gem index and its mirrors.
#[derive(Debug, PartialEq, Clone, Default)]
pub struct Registry {
    remotes: Vec<String>,
    caches: Vec<PathBuf>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn remote(mut self, url: &str) -> Self {
        self.remotes.push(url.to_string());
        self
    }

    pub fn caches(mut self, dirs: Vec<PathBuf>) -> Self {
        self.caches = dirs;
        self
    }

    pub fn set_caches(&mut self, dirs: Vec<PathBuf>) {
        self.caches = dirs;
    }

    pub fn get_remotes(&self) -> &Vec<String> {
        &self.remotes
    }

    pub fn get_caches(&self) -> &Vec<PathBuf> {
        &self.caches
    }
}

/// A repository pinned to a commit.
#[derive(Debug, PartialEq, Clone, Default)]
pub struct GitRepo {
    uri: Option<String>,
    revision: Option<String>,
    reference: Option<String>,
    branch: Option<String>,
    tag: Option<String>,
    submodules: bool,
}

impl GitRepo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn uri(mut self, s: &str) -> Self {
        self.uri = Some(s.to_string());
        self
    }

    pub fn revision(mut self, s: &str) -> Self {
        self.revision = Some(s.to_string());
        self
    }

    pub fn reference(mut self, s: &str) -> Self {
        self.reference = Some(s.to_string());
        self
    }

    pub fn branch(mut self, s: &str) -> Self {
        self.branch = Some(s.to_string());
        self
    }

    pub fn tag(mut self, s: &str) -> Self {
        self.tag = Some(s.to_string());
        self
    }

    pub fn submodules(mut self, b: bool) -> Self {
        self.submodules = b;
        self
    }

    pub fn get_uri(&self) -> Option<&str> {
        self.uri.as_deref()
    }

    pub fn get_revision(&self) -> Option<&str> {
        self.revision.as_deref()
    }

    pub fn get_reference(&self) -> Option<&str> {
        self.reference.as_deref()
    }

    pub fn get_branch(&self) -> Option<&str> {
        self.branch.as_deref()
    }

    pub fn get_tag(&self) -> Option<&str> {
        self.tag.as_deref()
    }

    pub fn has_submodules(&self) -> bool {
        self.submodules
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn full_name_with_platform() {
        let dep = Dependency::new("nokogiri", "1.15.4", Origin::Registry(Registry::new()))
            .platform(Some("x86_64-linux"));
        assert_eq!(dep.full_name(), "nokogiri-1.15.4-x86_64-linux");

        let dep = Dependency::new("rake", "13.0.6", Origin::Registry(Registry::new()))
            .platform(Some(RUBY_PLATFORM));
        assert_eq!(dep.get_platform(), None);
        assert_eq!(dep.full_name(), "rake-13.0.6");
    }
}
