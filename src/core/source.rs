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

//! Classifies each dependency by origin and produces its [SourceDescriptor].

use crate::core::dependency::{Dependency, GitRepo, Origin, Registry};
use crate::core::descriptor::{SourceDescriptor, DEFAULT_BRANCH};
use crate::core::fetcher::Fetcher;
use crate::error::{Error, Hint};
use std::path::PathBuf;

/// Length of a full SHA-1 commit hash in hexadecimal.
const FULL_SHA_LEN: usize = 40;

pub struct Source<'a> {
    fetcher: &'a Fetcher<'a>,
    git_prefetch: bool,
    verbose: bool,
}

impl<'a> Source<'a> {
    pub fn new(fetcher: &'a Fetcher<'a>) -> Self {
        Self {
            fetcher: fetcher,
            git_prefetch: false,
            verbose: false,
        }
    }

    /// Hash git checkouts too, instead of relying on the builtin fetcher.
    pub fn git_prefetch(mut self, enable: bool) -> Self {
        self.git_prefetch = enable;
        self
    }

    pub fn verbose(mut self, enable: bool) -> Self {
        self.verbose = enable;
        self
    }

    pub fn convert(&self, dep: &Dependency) -> Result<SourceDescriptor, Error> {
        let desc = match dep.get_origin() {
            Origin::Registry(reg) => self.convert_registry(dep, reg)?,
            Origin::Git(repo) => self.convert_git(dep, repo)?,
            Origin::Path(path) => Self::convert_path(path),
            Origin::Unknown(kind) => {
                return Err(Error::UnknownSource(
                    dep.get_name().to_string(),
                    dep.get_version().to_string(),
                    kind.clone(),
                ))
            }
        };
        if self.verbose == true {
            println!(
                "info: resolved {} ({}) => {}",
                dep.get_name(),
                dep.get_version(),
                desc.summary()
            );
        }
        Ok(desc)
    }

    /// Local paths are trusted as-is.
    fn convert_path(path: &PathBuf) -> SourceDescriptor {
        SourceDescriptor::Path { path: path.clone() }
    }

    /// Finds a digest for the gem, preferring local caches over remotes.
    ///
    /// A hash from a local cache keeps every remote; a hash from a remote
    /// narrows the list to that remote.
    fn convert_registry(&self, dep: &Dependency, reg: &Registry) -> Result<SourceDescriptor, Error> {
        let remotes: Vec<String> = reg
            .get_remotes()
            .iter()
            .map(|r| r.trim_end_matches('/').to_string())
            .collect();

        if let Some(sha256) = self.fetch_local_hash(dep, reg)? {
            return Ok(SourceDescriptor::Gem {
                remotes: remotes,
                sha256: sha256,
            });
        }
        match self.fetch_remotes_hash(dep, &remotes)? {
            Some((remote, sha256)) => Ok(SourceDescriptor::Gem {
                remotes: vec![remote],
                sha256: sha256,
            }),
            None => Err(Error::GemHashNotFound(
                dep.get_name().to_string(),
                match dep.get_platform() {
                    Some(p) => format!("{}-{}", dep.get_version(), p),
                    None => dep.get_version().to_string(),
                },
                Hint::CheckRemotes,
            )),
        }
    }

    /// Probes each local cache directory, in order, for the packaged gem.
    fn fetch_local_hash(&self, dep: &Dependency, reg: &Registry) -> Result<Option<String>, Error> {
        let file_name = format!("{}.gem", dep.full_name());
        for cache in reg.get_caches() {
            let path = cache.join(&file_name);
            if path.is_file() == false {
                continue;
            }
            if let Some(token) = self.fetcher.prefetch_url(&path.display().to_string()) {
                return Ok(Some(self.fetcher.normalize_digest(&token)?));
            }
        }
        Ok(None)
    }

    /// Tries each remote, in order, returning the first one that serves the
    /// gem along with its digest.
    fn fetch_remotes_hash(
        &self,
        dep: &Dependency,
        remotes: &[String],
    ) -> Result<Option<(String, String)>, Error> {
        for remote in remotes {
            let url = format!("{}/gems/{}.gem", remote, dep.full_name());
            if let Some(token) = self.fetcher.prefetch_url(&url) {
                return Ok(Some((remote.clone(), self.fetcher.normalize_digest(&token)?)));
            }
        }
        Ok(None)
    }

    /// Pins a git dependency to its commit.
    ///
    /// The ref is chosen from branch, then tag, then an explicit full commit
    /// hash, then the default branch. Short refs are rejected since they
    /// cannot be told apart from branch or tag names.
    fn convert_git(&self, dep: &Dependency, repo: &GitRepo) -> Result<SourceDescriptor, Error> {
        let name = dep.get_name().to_string();
        let version = dep.get_version().to_string();
        let revision = repo
            .get_revision()
            .ok_or_else(|| Error::MissingGitField(name.clone(), version.clone(), "revision"))?;
        let uri = repo
            .get_uri()
            .ok_or_else(|| Error::MissingGitField(name.clone(), version.clone(), "uri"))?;

        let reference = match (repo.get_branch(), repo.get_tag(), repo.get_reference()) {
            (Some(branch), _, _) => branch,
            (None, Some(tag), _) => tag,
            (None, None, Some(r)) => match is_full_sha(r) {
                true => r,
                false => {
                    return Err(Error::AmbiguousGitRef(
                        name,
                        version,
                        r.to_string(),
                        Hint::GitRefFullSha,
                    ))
                }
            },
            (None, None, None) => DEFAULT_BRANCH,
        };

        match self.git_prefetch {
            true => {
                let result = self
                    .fetcher
                    .prefetch_git(uri, revision, repo.has_submodules())?;
                Ok(SourceDescriptor::Git {
                    url: uri.to_string(),
                    rev: revision.to_string(),
                    sha256: result.sha256,
                    fetch_submodules: repo.has_submodules(),
                })
            }
            false => Ok(SourceDescriptor::BuiltinsGit {
                url: uri.to_string(),
                rev: revision.to_string(),
                reference: reference.to_string(),
                submodules: repo.has_submodules(),
            }),
        }
    }
}

fn is_full_sha(s: &str) -> bool {
    s.len() == FULL_SHA_LEN && s.chars().all(|c| c.is_ascii_hexdigit())
}
