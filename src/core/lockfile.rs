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

//! Reads the sections of a Bundler `Gemfile.lock` into dependency records.

use crate::core::dependency::{Dependency, GitRepo, Origin, Registry};
use crate::error::{Error, LastError};
use crate::util::filesystem;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;

pub const LOCK_FILE: &str = "Gemfile.lock";

const SPECS_KEY: &str = "specs";

/// Indentation of a source's attribute lines.
const ATTR_INDENT: usize = 2;
/// Indentation of a resolved spec line.
const SPEC_INDENT: usize = 4;
/// Indentation of a spec's dependency line.
const DEP_INDENT: usize = 6;

#[derive(Debug, PartialEq)]
pub struct LockFile {
    deps: Vec<Dependency>,
    platforms: Vec<String>,
    bundled_with: Option<String>,
}

/// The section currently being read.
#[derive(Debug, PartialEq)]
enum Section {
    Source(Header),
    Platforms,
    BundledWith,
    Other,
}

/// Accumulates the attributes of a source section before its specs appear.
#[derive(Debug, PartialEq)]
struct Header {
    name: String,
    attrs: Vec<(String, String)>,
    in_specs: bool,
}

impl Header {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            attrs: Vec::new(),
            in_specs: false,
        }
    }

    fn get(&self, key: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Builds the origin shared by every spec listed under this section.
    fn to_origin(&self) -> Origin {
        match self.name.as_str() {
            "GEM" => Origin::Registry(
                self.attrs
                    .iter()
                    .filter(|(k, _)| k == "remote")
                    .fold(Registry::new(), |reg, (_, v)| reg.remote(v)),
            ),
            "GIT" => {
                let mut repo = GitRepo::new();
                if let Some(v) = self.get("remote") {
                    repo = repo.uri(v);
                }
                if let Some(v) = self.get("revision") {
                    repo = repo.revision(v);
                }
                if let Some(v) = self.get("ref") {
                    repo = repo.reference(v);
                }
                if let Some(v) = self.get("branch") {
                    repo = repo.branch(v);
                }
                if let Some(v) = self.get("tag") {
                    repo = repo.tag(v);
                }
                Origin::Git(repo.submodules(self.get("submodules") == Some("true")))
            }
            "PATH" => Origin::Path(PathBuf::from(self.get("remote").unwrap_or("."))),
            other => Origin::Unknown(other.to_string()),
        }
    }
}

impl FromStr for LockFile {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut deps: Vec<Dependency> = Vec::new();
        let mut platforms = Vec::new();
        let mut bundled_with = None;
        // position of each gem name within `deps`
        let mut seen: HashMap<String, usize> = HashMap::new();

        let mut section = Section::Other;
        let mut origin: Option<Origin> = None;

        for (i, line) in s.lines().enumerate() {
            let line_no = i + 1;
            let text = line.trim_end();
            if text.trim().is_empty() == true {
                continue;
            }
            let indent = text.len() - text.trim_start().len();
            let body = text.trim_start();
            let syntax_err = || Error::LockfileSyntax(line_no, line.to_string());

            if indent == 0 {
                origin = None;
                section = match body {
                    "PLATFORMS" => Section::Platforms,
                    "BUNDLED WITH" => Section::BundledWith,
                    "DEPENDENCIES" | "RUBY VERSION" | "CHECKSUMS" => Section::Other,
                    _ => Section::Source(Header::new(body)),
                };
                continue;
            }

            match &mut section {
                Section::Platforms => platforms.push(body.to_string()),
                Section::BundledWith => bundled_with = Some(body.to_string()),
                Section::Other => (),
                Section::Source(header) => match indent {
                    ATTR_INDENT => {
                        let (key, value) = body.split_once(':').ok_or_else(syntax_err)?;
                        if key == SPECS_KEY {
                            header.in_specs = true;
                            origin = Some(header.to_origin());
                        } else if header.in_specs == true {
                            return Err(syntax_err());
                        } else {
                            header.attrs.push((key.to_string(), value.trim().to_string()));
                        }
                    }
                    SPEC_INDENT => {
                        let origin = origin.as_ref().ok_or_else(syntax_err)?;
                        let (name, version) = split_spec(body).ok_or_else(syntax_err)?;
                        let (version, platform) = match version.split_once('-') {
                            Some((v, p)) => (v, Some(p)),
                            None => (version, None),
                        };
                        let dep = Dependency::new(name, version, origin.clone()).platform(platform);
                        match seen.get(name) {
                            Some(&pos) => {
                                // a plain variant replaces any platform-specific one
                                if deps[pos].get_platform().is_some() && dep.get_platform().is_none() {
                                    deps[pos] = dep;
                                }
                            }
                            None => {
                                seen.insert(name.to_string(), deps.len());
                                deps.push(dep);
                            }
                        }
                    }
                    DEP_INDENT => {
                        if origin.is_none() {
                            return Err(syntax_err());
                        }
                        let parent = deps.last_mut().ok_or_else(syntax_err)?;
                        let name = body.split_whitespace().next().ok_or_else(syntax_err)?;
                        let mut list = parent.get_dependencies().clone();
                        if list.iter().any(|d| d == name) == false {
                            list.push(name.to_string());
                        }
                        *parent = parent.clone().dependencies(list);
                    }
                    _ => return Err(syntax_err()),
                },
            }
        }
        Ok(Self {
            deps: deps,
            platforms: platforms,
            bundled_with: bundled_with,
        })
    }
}

/// Splits `name (version)` into its two parts.
fn split_spec(s: &str) -> Option<(&str, &str)> {
    let (name, rest) = s.split_once(' ')?;
    let version = rest.strip_prefix('(')?.strip_suffix(')')?;
    match name.is_empty() || version.is_empty() || version.contains(' ') {
        true => None,
        false => Some((name, version)),
    }
}

impl LockFile {
    /// Loads and parses the lockfile at `path`.
    pub fn from_path(path: &Path) -> Result<Self, Error> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| Error::LockfileUnreadable(path.to_path_buf(), LastError(e.to_string())))?;
        contents.parse::<Self>()
    }

    /// Sets the local gem caches to search for every registry record.
    pub fn attach_caches(&mut self, dirs: &[PathBuf]) {
        self.deps.iter_mut().for_each(|dep| {
            if let Origin::Registry(reg) = dep.get_origin_mut() {
                reg.set_caches(dirs.to_vec());
            }
        });
    }

    /// Rewrites relative `PATH` sources, which are written relative to the
    /// lockfile's directory `lock_dir`, to be relative to `out_dir` instead.
    pub fn rebase_paths(&mut self, lock_dir: &Path, out_dir: &Path) {
        if filesystem::dot_relative(lock_dir, out_dir) == "./." {
            return;
        }
        self.deps.iter_mut().for_each(|dep| {
            if let Origin::Path(path) = dep.get_origin_mut() {
                if path.is_relative() == true {
                    *path = PathBuf::from(filesystem::dot_relative(&lock_dir.join(path.as_path()), out_dir));
                }
            }
        });
    }

    pub fn inner(&self) -> &Vec<Dependency> {
        &self.deps
    }

    pub fn len(&self) -> usize {
        self.deps.len()
    }

    pub fn get_platforms(&self) -> &Vec<String> {
        &self.platforms
    }

    pub fn get_bundled_with(&self) -> Option<&str> {
        self.bundled_with.as_deref()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const LOCK: &str = r#"GIT
  remote: https://example.test/beta.git
  revision: deadbeefdeadbeefdeadbeefdeadbeefdeadbeef
  branch: main
  specs:
    beta (0.3.0)
      rack (>= 2.0)

PATH
  remote: ../gems/gamma
  specs:
    gamma (0.1.0)

GEM
  remote: https://example.test/a/
  remote: https://example.test/b/
  specs:
    alpha (1.0.0)
      rack (~> 3.0)
      zeta
    nokogiri (1.15.4-x86_64-linux)
      racc (~> 1.4)
    nokogiri (1.15.4)
      racc (~> 1.4)
    rack (3.0.8)

PLATFORMS
  ruby
  x86_64-linux

DEPENDENCIES
  alpha
  beta!
  gamma!

RUBY VERSION
   ruby 3.2.2p53

BUNDLED WITH
   2.4.10
"#;

    #[test]
    fn parse_sections() {
        let lock = LockFile::from_str(LOCK).unwrap();
        let names: Vec<&str> = lock.inner().iter().map(|d| d.get_name()).collect();
        assert_eq!(names, vec!["beta", "gamma", "alpha", "nokogiri", "rack"]);
        assert_eq!(lock.get_platforms(), &vec![String::from("ruby"), String::from("x86_64-linux")]);
        assert_eq!(lock.get_bundled_with(), Some("2.4.10"));

        let beta = &lock.inner()[0];
        assert_eq!(
            beta.get_origin(),
            &Origin::Git(
                GitRepo::new()
                    .uri("https://example.test/beta.git")
                    .revision("deadbeefdeadbeefdeadbeefdeadbeefdeadbeef")
                    .branch("main")
            )
        );
        assert_eq!(beta.get_dependencies(), &vec![String::from("rack")]);

        let gamma = &lock.inner()[1];
        assert_eq!(gamma.get_origin(), &Origin::Path(PathBuf::from("../gems/gamma")));

        let alpha = &lock.inner()[2];
        assert_eq!(
            alpha.get_origin(),
            &Origin::Registry(
                Registry::new()
                    .remote("https://example.test/a/")
                    .remote("https://example.test/b/")
            )
        );
        assert_eq!(alpha.get_dependencies(), &vec![String::from("rack"), String::from("zeta")]);
    }

    #[test]
    fn plain_platform_variant_preferred() {
        let lock = LockFile::from_str(LOCK).unwrap();
        let nokogiri = &lock.inner()[3];
        assert_eq!(nokogiri.get_platform(), None);
        assert_eq!(nokogiri.full_name(), "nokogiri-1.15.4");
    }

    #[test]
    fn platform_only_variant_kept() {
        let lock = LockFile::from_str(
            "GEM\n  remote: https://rubygems.org/\n  specs:\n    ffi (1.16.3-x86_64-linux)\n    ffi (1.16.3-arm64-darwin)\n",
        )
        .unwrap();
        assert_eq!(lock.len(), 1);
        assert_eq!(lock.inner()[0].full_name(), "ffi-1.16.3-x86_64-linux");
    }

    #[test]
    fn unrecognized_source_section() {
        let lock = LockFile::from_str(
            "PLUGIN SOURCE\n  remote: https://example.test/\n  type: custom\n  specs:\n    delta (1.0)\n",
        )
        .unwrap();
        assert_eq!(
            lock.inner()[0].get_origin(),
            &Origin::Unknown(String::from("PLUGIN SOURCE"))
        );
    }

    #[test]
    fn git_submodules_and_ref() {
        let lock = LockFile::from_str(
            "GIT\n  remote: https://example.test/e.git\n  revision: abc\n  ref: abc\n  submodules: true\n  specs:\n    epsilon (2.0)\n",
        )
        .unwrap();
        assert_eq!(
            lock.inner()[0].get_origin(),
            &Origin::Git(
                GitRepo::new()
                    .uri("https://example.test/e.git")
                    .revision("abc")
                    .reference("abc")
                    .submodules(true)
            )
        );
    }

    #[test]
    fn attach_caches_to_registry_only() {
        let mut lock = LockFile::from_str(LOCK).unwrap();
        lock.attach_caches(&[PathBuf::from("vendor/cache")]);
        for dep in lock.inner() {
            match dep.get_origin() {
                Origin::Registry(reg) => {
                    assert_eq!(reg.get_caches(), &vec![PathBuf::from("vendor/cache")])
                }
                _ => (),
            }
        }
    }

    #[test]
    fn path_sources_follow_the_output_directory() {
        let text = "PATH\n  remote: gems/gamma\n  specs:\n    gamma (0.1.0)\n\nPATH\n  remote: /opt/gems/eta\n  specs:\n    eta (1.0)\n";

        let mut lock = LockFile::from_str(text).unwrap();
        lock.rebase_paths(Path::new("/work/app/ruby"), Path::new("/work/app/nix"));
        assert_eq!(
            lock.inner()[0].get_origin(),
            &Origin::Path(PathBuf::from("../ruby/gems/gamma"))
        );
        assert_eq!(
            lock.inner()[1].get_origin(),
            &Origin::Path(PathBuf::from("/opt/gems/eta"))
        );

        // same directory leaves the lockfile's text alone
        let mut lock = LockFile::from_str(text).unwrap();
        lock.rebase_paths(Path::new("/work/app"), Path::new("/work/app/."));
        assert_eq!(
            lock.inner()[0].get_origin(),
            &Origin::Path(PathBuf::from("gems/gamma"))
        );
    }

    #[test]
    fn syntax_errors_report_line() {
        assert_eq!(
            LockFile::from_str("GEM\n  remote: x\n  specs:\n    alpha 1.0.0\n").unwrap_err(),
            Error::LockfileSyntax(4, String::from("    alpha 1.0.0"))
        );
        assert_eq!(
            LockFile::from_str("GEM\n  remote: x\n    alpha (1.0.0)\n").unwrap_err(),
            Error::LockfileSyntax(3, String::from("    alpha (1.0.0)"))
        );
        assert_eq!(
            LockFile::from_str("GEM\n  specs:\n     alpha (1.0.0)\n").unwrap_err(),
            Error::LockfileSyntax(3, String::from("     alpha (1.0.0)"))
        );
        assert_eq!(
            LockFile::from_str("GEM\n  remote\n").unwrap_err(),
            Error::LockfileSyntax(2, String::from("  remote"))
        );
    }

    #[test]
    fn missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(LOCK_FILE);
        assert!(matches!(
            LockFile::from_path(&path),
            Err(Error::LockfileUnreadable(_, _))
        ));
        std::fs::write(&path, LOCK).unwrap();
        assert_eq!(LockFile::from_path(&path).unwrap().len(), 5);
    }
}
