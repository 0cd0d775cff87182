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

//! Obtains trustworthy SHA-256 digests for artifacts.
//!
//! Every artifact is first placed in a local cache keyed by its url, and the
//! external prefetch tool only ever sees that local copy. This keeps
//! credentials off command lines and avoids repeated network traffic.

use crate::core::config::Commands;
use crate::core::credentials::{CredentialStore, Credentials};
use crate::core::toolchain::{Invocation, ScratchHome, ToolError, Toolchain};
use crate::core::transport::{FetchError, Transport};
use crate::error::{Error, LastError};
use crate::util::filesystem;
use crate::util::nixbase32;
use crate::util::sha256::Sha256Hash;
use colored::Colorize;
use serde_derive::Deserialize;
use std::io::IsTerminal;
use std::io::Write;
use std::path::{Path, PathBuf};
use url::Url;

/// Fields read from the JSON object `nix-prefetch-git` prints last.
#[derive(Debug, PartialEq, Deserialize)]
pub struct GitPrefetch {
    pub url: String,
    pub rev: String,
    pub sha256: String,
}

/// Where a candidate artifact is read from.
#[derive(Debug, PartialEq)]
enum Locator {
    Remote(Url),
    Local(PathBuf),
}

impl Locator {
    fn parse(s: &str) -> Result<Self, FetchError> {
        match Url::parse(s) {
            Ok(url) if url.scheme() == "file" => match url.to_file_path() {
                Ok(p) => Ok(Self::Local(p)),
                Err(_) => Ok(Self::Remote(url)),
            },
            Ok(url) => Ok(Self::Remote(url)),
            // plain filesystem paths have no scheme
            Err(url::ParseError::RelativeUrlWithoutBase) => Ok(Self::Local(PathBuf::from(s))),
            Err(e) => Err(FetchError::BadUrl(s.to_string(), e)),
        }
    }
}

pub struct Fetcher<'a> {
    cache: PathBuf,
    transport: &'a dyn Transport,
    tools: &'a dyn Toolchain,
    credentials: &'a dyn CredentialStore,
    commands: Commands,
}

impl<'a> Fetcher<'a> {
    pub fn new(
        cache: &Path,
        transport: &'a dyn Transport,
        tools: &'a dyn Toolchain,
        credentials: &'a dyn CredentialStore,
    ) -> Self {
        Self {
            cache: cache.to_path_buf(),
            transport: transport,
            tools: tools,
            credentials: credentials,
            commands: Commands::default(),
        }
    }

    pub fn commands(mut self, commands: Commands) -> Self {
        self.commands = commands;
        self
    }

    /// Computes where the artifact for `url` is cached.
    pub fn cache_file(&self, url: &str) -> PathBuf {
        self.cache.join(filesystem::sanitize(url))
    }

    /// Produces the raw digest token for the artifact at `url`, which may be
    /// a remote url or a local file path.
    ///
    /// Returns `None` whenever the artifact could not be obtained or hashed;
    /// the reason is reported on the console and the caller is free to try
    /// its next candidate.
    pub fn prefetch_url(&self, url: &str) -> Option<String> {
        let file = self.cache_file(url);
        if is_populated(&file) == false {
            if let Err(e) = self.download(&file, url) {
                eprintln!("{} {}", "warning:".yellow(), e);
            }
        }
        if is_populated(&file) == false {
            return None;
        }

        let inv = Invocation::new(self.commands.get_prefetch_url())
            .args(["--type", "sha256", "--name"])
            .arg(basename(url))
            .arg(format!("file://{}", file.display()));
        let token = match self.tools.run(&inv) {
            Ok(out) => match extract_token(&out) {
                Some(t) => t,
                None => {
                    let e = ToolError::Output(inv.to_string(), out.trim().to_string());
                    eprintln!("{} {}", "warning:".yellow(), e);
                    return None;
                }
            },
            Err(e) => {
                eprintln!("{} {}", "warning:".yellow(), e);
                return None;
            }
        };
        self.verify(&file, token)
    }

    /// Converts a raw digest token into the 52-character base-32 form.
    ///
    /// Fails loudly: the token was produced by this program, so a failure
    /// here is a bug rather than an environment problem.
    pub fn normalize_digest(&self, token: &str) -> Result<String, Error> {
        let inv = Invocation::new(self.commands.get_hash()).args([
            "--type",
            "sha256",
            "--to-base32",
            token,
        ]);
        let out = self
            .tools
            .run(&inv)
            .map_err(|e| Error::DigestFormat(token.to_string(), LastError(e.to_string())))?;
        match out.lines().map(|l| l.trim()).find(|l| nixbase32::is_sha256(l)) {
            Some(digest) => Ok(digest.to_string()),
            None => Err(Error::DigestFormat(
                token.to_string(),
                LastError(format!("unexpected output {:?}", out.trim())),
            )),
        }
    }

    /// Hashes a repository checkout at `rev` with `nix-prefetch-git`.
    ///
    /// The child process runs with an empty, temporary `HOME`.
    pub fn prefetch_git(&self, uri: &str, rev: &str, submodules: bool) -> Result<GitPrefetch, Error> {
        let fail = |reason: String| Error::GitPrefetchFailed(uri.to_string(), rev.to_string(), LastError(reason));

        let home = ScratchHome::new().map_err(|e| fail(e.to_string()))?;
        let mut inv = Invocation::new(self.commands.get_prefetch_git())
            .args(["--url", uri, "--rev", rev, "--hash", "sha256"])
            .env(home.to_env());
        if submodules == true {
            inv = inv.arg("--fetch-submodules");
        }
        let out = self.tools.run(&inv).map_err(|e| fail(e.to_string()))?;
        // progress output precedes the final JSON object
        let json = match out.rfind("\n{") {
            Some(i) => &out[i + 1..],
            None => out.trim_start(),
        };
        let mut result: GitPrefetch = serde_json::from_str(json.trim()).map_err(|e| fail(e.to_string()))?;
        result.sha256 = self.normalize_digest(&result.sha256)?;
        Ok(result)
    }

    /// Places the artifact at `url` into the cache `file`.
    ///
    /// Bytes are written to a temporary file next to `file` and only renamed
    /// into place once complete, so an interrupted run never leaves a
    /// truncated artifact behind.
    fn download(&self, file: &Path, url: &str) -> Result<(), FetchError> {
        eprintln!("info: downloading {} from {}", file.display(), url);
        let dir = file.parent().unwrap_or(Path::new("."));
        let mut temp = tempfile::NamedTempFile::new_in(dir)?;
        match Locator::parse(url)? {
            Locator::Local(path) => {
                let mut src = std::fs::File::open(&path)?;
                std::io::copy(&mut src, temp.as_file_mut())?;
            }
            Locator::Remote(mut remote) => {
                let creds = self.take_credentials(&mut remote);
                let host = remote.host_str().unwrap_or_default().to_string();
                match self.transport.download(&remote, creds.as_ref(), temp.as_file_mut()) {
                    Ok(()) => (),
                    Err(e) => {
                        if let FetchError::Unauthorized(_, _) = e {
                            debrief_access_denied(&host);
                        }
                        return Err(e);
                    }
                }
            }
        }
        temp.as_file_mut().flush()?;
        temp.persist(file).map_err(|e| FetchError::Io(e.error))?;
        Ok(())
    }

    /// Removes userinfo from `url` and returns the credentials to use for it.
    ///
    /// Explicit credentials in the url win; otherwise the credential store is
    /// consulted for the url's host.
    fn take_credentials(&self, url: &mut Url) -> Option<Credentials> {
        if url.username().is_empty() == false || url.password().is_some() {
            let creds = Credentials::new(url.username(), url.password());
            // only fails for urls that cannot carry userinfo at all
            let _ = url.set_username("");
            let _ = url.set_password(None);
            Some(creds)
        } else {
            url.host_str().and_then(|host| self.credentials.lookup(host))
        }
    }

    /// Checks the prefetch tool's digest against our own hash of the cached
    /// file, discarding the file on disagreement.
    fn verify(&self, file: &Path, token: String) -> Option<String> {
        let reported = match Sha256Hash::from_any(&token) {
            Ok(h) => h,
            Err(e) => {
                eprintln!("{} unrecognized digest {:?}: {}", "warning:".yellow(), token, e);
                return None;
            }
        };
        match Sha256Hash::from_file(file) {
            Ok(actual) if actual == reported => Some(token),
            Ok(actual) => {
                eprintln!(
                    "{} digest mismatch for {}: tool reported {} but contents hash to {}",
                    "warning:".yellow(),
                    file.display(),
                    reported.to_nix_base32(),
                    actual.to_nix_base32()
                );
                let _ = std::fs::remove_file(file);
                None
            }
            Err(e) => {
                eprintln!("{} failed to read {}: {}", "warning:".yellow(), file.display(), e);
                None
            }
        }
    }
}

/// Checks the file exists and is not empty.
fn is_populated(path: &Path) -> bool {
    std::fs::metadata(path)
        .map(|m| m.is_file() && m.len() > 0)
        .unwrap_or(false)
}

/// The last path segment of `url`, used as the store name for the artifact.
fn basename(url: &str) -> &str {
    let trimmed = url.trim_end_matches('/');
    match trimmed.rsplit_once('/') {
        Some((_, name)) if name.is_empty() == false => name,
        _ => trimmed,
    }
}

/// Picks the digest out of the prefetch tool's output.
fn extract_token(out: &str) -> Option<String> {
    out.lines()
        .map(|l| l.trim())
        .filter(|l| nixbase32::is_sha256(l) || (l.len() == 64 && l.chars().all(|c| c.is_ascii_hexdigit())))
        .last()
        .map(|l| l.to_string())
}

/// Explains how to supply credentials after a host refused access.
fn debrief_access_denied(host: &str) {
    let msg = format!(
        "Authentication is required for {0}.\nPlease supply credentials for this source. You can do this by running:\n bundle config {0} username:password",
        host
    );
    match std::io::stderr().is_terminal() {
        true => eprintln!("{}", msg.red()),
        false => eprintln!("{}", msg),
    }
}
